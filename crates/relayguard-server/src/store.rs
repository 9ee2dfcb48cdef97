//! The allow-set: shared, lock-guarded, persisted on mutation.

use crate::config::PersistFn;
use relayguard_core::{GuardResult, RejectReason, Verdict};
use std::collections::HashSet;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Shared ownership of the trusted-token set.
///
/// All mutation goes through [`TokenStore::learn`], which holds the write
/// lock across the re-check, the insert, and the persistence write. A
/// first-run race between two connections therefore resolves to exactly one
/// stored token, with the loser re-evaluated against the winner.
pub struct TokenStore {
    tokens: RwLock<HashSet<String>>,
    persist: PersistFn,
}

impl TokenStore {
    pub fn new(initial: Vec<String>, persist: PersistFn) -> Self {
        Self {
            tokens: RwLock::new(initial.into_iter().collect()),
            persist,
        }
    }

    /// Cloned snapshot of the current allow-set, for the validator's
    /// comparison path.
    ///
    /// A snapshot may be stale by the time it is compared against; that is
    /// fine because the mutation path in [`learn`](Self::learn) re-evaluates
    /// under the write lock.
    pub async fn snapshot(&self) -> HashSet<String> {
        self.tokens.read().await.clone()
    }

    /// Number of trusted tokens.
    pub async fn len(&self) -> usize {
        self.tokens.read().await.len()
    }

    /// Apply a first-run learn instruction.
    ///
    /// Persistence is synchronous: the verdict is not returned until the
    /// backing store write succeeded. On write failure the in-memory insert
    /// is rolled back and the error propagated, so the caller fails closed
    /// and memory never disagrees with the backing store.
    pub async fn learn(&self, token: String) -> GuardResult<Verdict> {
        let mut tokens = self.tokens.write().await;

        if !tokens.is_empty() {
            // Lost the first-run race. Re-evaluate against the winner instead
            // of accepting unconditionally.
            return Ok(if tokens.contains(&token) {
                Verdict::Accepted
            } else {
                Verdict::Rejected(RejectReason::InvalidToken)
            });
        }

        tokens.insert(token.clone());
        let listed: Vec<String> = tokens.iter().cloned().collect();
        if let Err(e) = (self.persist)(&listed) {
            tokens.remove(&token);
            warn!(error = %e, "allow-set persistence failed, rolling back learned token");
            return Err(e);
        }

        info!("learned first token into the allow-set and saved it to the config");
        Ok(Verdict::Accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relayguard_core::GuardError;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    fn noop_persist() -> PersistFn {
        Box::new(|_| Ok(()))
    }

    #[tokio::test]
    async fn learn_on_empty_set_persists_single_token() {
        let persisted: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = persisted.clone();
        let store = TokenStore::new(
            Vec::new(),
            Box::new(move |tokens| {
                *sink.lock().unwrap() = tokens.to_vec();
                Ok(())
            }),
        );

        let verdict = store.learn("abc123".to_string()).await.unwrap();
        assert_eq!(verdict, Verdict::Accepted);
        assert_eq!(*persisted.lock().unwrap(), vec!["abc123".to_string()]);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn racing_first_learns_keep_exactly_one_token() {
        let store = Arc::new(TokenStore::new(Vec::new(), noop_persist()));

        let (a, b) = tokio::join!(
            store.learn("t1".to_string()),
            store.learn("t2".to_string())
        );
        let verdicts = [a.unwrap(), b.unwrap()];

        let snapshot = store.snapshot().await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(verdicts.iter().filter(|v| v.is_accepted()).count(), 1);
        assert!(verdicts.contains(&Verdict::Rejected(RejectReason::InvalidToken)));

        // The accepted attempt is the one whose token was retained.
        let winner = snapshot.iter().next().unwrap().clone();
        let tokens = ["t1", "t2"];
        for (token, verdict) in tokens.iter().zip(verdicts.iter()) {
            if verdict.is_accepted() {
                assert_eq!(*token, winner);
            }
        }
    }

    #[tokio::test]
    async fn race_loser_with_matching_token_is_accepted() {
        let store = Arc::new(TokenStore::new(Vec::new(), noop_persist()));

        let (a, b) = tokio::join!(
            store.learn("same".to_string()),
            store.learn("same".to_string())
        );
        assert_eq!(a.unwrap(), Verdict::Accepted);
        assert_eq!(b.unwrap(), Verdict::Accepted);
        assert_eq!(store.snapshot().await.len(), 1);
    }

    #[tokio::test]
    async fn persistence_failure_rolls_back_and_fails_closed() {
        let failing = Arc::new(AtomicBool::new(true));
        let flag = failing.clone();
        let store = TokenStore::new(
            Vec::new(),
            Box::new(move |_| {
                if flag.load(Ordering::SeqCst) {
                    Err(GuardError::Persistence("disk full".into()))
                } else {
                    Ok(())
                }
            }),
        );

        assert!(store.learn("abc".to_string()).await.is_err());
        assert!(store.snapshot().await.is_empty());

        // Once persistence recovers, learning proceeds normally.
        failing.store(false, Ordering::SeqCst);
        assert_eq!(
            store.learn("abc".to_string()).await.unwrap(),
            Verdict::Accepted
        );
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn learn_on_populated_set_never_mutates() {
        let persisted = Arc::new(Mutex::new(0usize));
        let count = persisted.clone();
        let store = TokenStore::new(
            vec!["configured".to_string()],
            Box::new(move |_| {
                *count.lock().unwrap() += 1;
                Ok(())
            }),
        );

        let verdict = store.learn("other".to_string()).await.unwrap();
        assert_eq!(verdict, Verdict::Rejected(RejectReason::InvalidToken));
        assert_eq!(*persisted.lock().unwrap(), 0);
        assert_eq!(store.snapshot().await.len(), 1);
    }
}
