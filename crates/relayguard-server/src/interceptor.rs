//! The two-phase handshake gate.
//!
//! Phase 1 turns away identities that already have a live session, before the
//! token path is consulted at all. Phase 2 extracts the connection's metadata
//! and validates the relay token against the allow-set. Both phases are
//! terminal: once a verdict is reached the attempt's fate is final, and a
//! rejected attempt never receives backend state.

use crate::extract::{MetadataExtractor, RawHandshake};
use crate::sessions::DuplicateSessionGuard;
use crate::store::TokenStore;
use relayguard_core::{validate, ConnectionProfile, KickMessages, RejectReason, Verdict};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Terminal outcome of the gate for one connection attempt.
#[derive(Debug)]
pub enum Outcome {
    /// The attempt may proceed to a full session.
    Accept(ConnectionProfile),
    /// The attempt is aborted; `message` is shown to the client.
    Kick {
        reason: RejectReason,
        message: String,
    },
}

pub struct HandshakeInterceptor {
    store: Arc<TokenStore>,
    guard: DuplicateSessionGuard,
    extractor: Box<dyn MetadataExtractor>,
    messages: KickMessages,
}

impl HandshakeInterceptor {
    pub fn new(
        store: Arc<TokenStore>,
        guard: DuplicateSessionGuard,
        extractor: Box<dyn MetadataExtractor>,
        messages: KickMessages,
    ) -> Self {
        Self {
            store,
            guard,
            extractor,
            messages,
        }
    }

    /// Phase 1: reject an identity that already has a live session.
    ///
    /// Returns `None` when the attempt may proceed to phase 2.
    pub fn pre_login(&self, identity: &Uuid) -> Option<Outcome> {
        if self.guard.check(identity) {
            warn!(identity = %identity, "denied connection: identity already has an active session");
            return Some(self.kick(RejectReason::AlreadyOnline));
        }
        None
    }

    /// Run both phases for a raw connection attempt.
    ///
    /// A fault while extracting metadata or persisting a learned token never
    /// admits the connection: the gate fails closed with a generic rejection.
    pub async fn intercept(&self, raw: &RawHandshake) -> Outcome {
        let profile = match self.extractor.extract(raw) {
            Ok(p) => p,
            Err(e) => {
                error!(remote = %raw.remote_addr, error = %e, "metadata extraction failed, rejecting");
                return self.kick(RejectReason::Internal);
            }
        };

        if let Some(outcome) = self.pre_login(&profile.identity) {
            return outcome;
        }

        self.login(profile).await
    }

    /// Phase 2: validate the extracted profile's token.
    pub async fn login(&self, profile: ConnectionProfile) -> Outcome {
        let snapshot = self.store.snapshot().await;
        let decision = validate(&profile.properties, &snapshot);

        let verdict = match decision.learn {
            Some(token) => {
                info!(
                    identity = %profile.identity,
                    origin = %profile.origin,
                    "no token configured, saving the one from this connection"
                );
                match self.store.learn(token).await {
                    Ok(v) => v,
                    Err(e) => {
                        error!(
                            identity = %profile.identity,
                            origin = %profile.origin,
                            error = %e,
                            "could not persist learned token, rejecting"
                        );
                        return self.kick(RejectReason::Internal);
                    }
                }
            }
            None => decision.verdict,
        };

        match verdict {
            Verdict::Accepted => {
                info!(identity = %profile.identity, origin = %profile.origin, "connection admitted");
                Outcome::Accept(profile)
            }
            Verdict::Rejected(reason) => {
                warn!(
                    identity = %profile.identity,
                    origin = %profile.origin,
                    reason = reason.as_str(),
                    "denied connection"
                );
                self.kick(reason)
            }
        }
    }

    fn kick(&self, reason: RejectReason) -> Outcome {
        Outcome::Kick {
            reason,
            message: self.messages.for_reason(reason).to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sessions::SessionDirectory;
    use relayguard_core::{GuardError, GuardResult, PropertyRecord, TOKEN_PROPERTY};
    use std::net::SocketAddr;

    struct FixedExtractor(ConnectionProfile);

    impl MetadataExtractor for FixedExtractor {
        fn extract(&self, _raw: &RawHandshake) -> GuardResult<ConnectionProfile> {
            Ok(self.0.clone())
        }
    }

    struct FailingExtractor;

    impl MetadataExtractor for FailingExtractor {
        fn extract(&self, _raw: &RawHandshake) -> GuardResult<ConnectionProfile> {
            Err(GuardError::Extraction("cannot resolve profile".into()))
        }
    }

    struct NobodyOnline;

    impl SessionDirectory for NobodyOnline {
        fn is_online(&self, _identity: &Uuid) -> bool {
            false
        }
    }

    struct EveryoneOnline;

    impl SessionDirectory for EveryoneOnline {
        fn is_online(&self, _identity: &Uuid) -> bool {
            true
        }
    }

    fn messages() -> KickMessages {
        KickMessages {
            no_properties: "no properties".into(),
            no_token: "no token".into(),
            invalid_token: "invalid token".into(),
            already_online: "already online".into(),
            internal_error: "internal".into(),
        }
    }

    fn profile(properties: Vec<PropertyRecord>) -> ConnectionProfile {
        ConnectionProfile {
            identity: Uuid::new_v4(),
            origin: "203.0.113.9".into(),
            properties,
        }
    }

    fn raw() -> RawHandshake {
        let addr: SocketAddr = "127.0.0.1:50000".parse().unwrap();
        RawHandshake {
            remote_addr: addr,
            payload: String::new(),
        }
    }

    fn interceptor(
        tokens: Vec<String>,
        directory: Arc<dyn SessionDirectory>,
        extractor: Box<dyn MetadataExtractor>,
    ) -> HandshakeInterceptor {
        let store = Arc::new(TokenStore::new(tokens, Box::new(|_| Ok(()))));
        HandshakeInterceptor::new(
            store,
            DuplicateSessionGuard::new(directory),
            extractor,
            messages(),
        )
    }

    #[tokio::test]
    async fn valid_token_is_admitted() {
        let p = profile(vec![PropertyRecord::new(TOKEN_PROPERTY, "abc123")]);
        let gate = interceptor(
            vec!["abc123".into()],
            Arc::new(NobodyOnline),
            Box::new(FixedExtractor(p)),
        );
        assert!(matches!(gate.intercept(&raw()).await, Outcome::Accept(_)));
    }

    #[tokio::test]
    async fn invalid_token_is_kicked_with_configured_message() {
        let p = profile(vec![PropertyRecord::new(TOKEN_PROPERTY, "xyz")]);
        let gate = interceptor(
            vec!["abc123".into()],
            Arc::new(NobodyOnline),
            Box::new(FixedExtractor(p)),
        );
        match gate.intercept(&raw()).await {
            Outcome::Kick { reason, message } => {
                assert_eq!(reason, RejectReason::InvalidToken);
                assert_eq!(message, "invalid token");
            }
            other => panic!("expected kick, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_properties_are_kicked_with_configured_message() {
        let gate = interceptor(
            vec!["abc123".into()],
            Arc::new(NobodyOnline),
            Box::new(FixedExtractor(profile(Vec::new()))),
        );
        match gate.intercept(&raw()).await {
            Outcome::Kick { reason, message } => {
                assert_eq!(reason, RejectReason::NoProperties);
                assert_eq!(message, "no properties");
            }
            other => panic!("expected kick, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_token_property_is_kicked() {
        let p = profile(vec![PropertyRecord::new("textures", "blob")]);
        let gate = interceptor(
            vec!["abc123".into()],
            Arc::new(NobodyOnline),
            Box::new(FixedExtractor(p)),
        );
        match gate.intercept(&raw()).await {
            Outcome::Kick { reason, .. } => assert_eq!(reason, RejectReason::NoToken),
            other => panic!("expected kick, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn duplicate_identity_is_kicked_before_validation() {
        // Token is valid, but the duplicate guard fires first.
        let p = profile(vec![PropertyRecord::new(TOKEN_PROPERTY, "abc123")]);
        let gate = interceptor(
            vec!["abc123".into()],
            Arc::new(EveryoneOnline),
            Box::new(FixedExtractor(p)),
        );
        match gate.intercept(&raw()).await {
            Outcome::Kick { reason, message } => {
                assert_eq!(reason, RejectReason::AlreadyOnline);
                assert_eq!(message, "already online");
            }
            other => panic!("expected kick, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn extraction_failure_fails_closed() {
        let gate = interceptor(
            vec!["abc123".into()],
            Arc::new(NobodyOnline),
            Box::new(FailingExtractor),
        );
        match gate.intercept(&raw()).await {
            Outcome::Kick { reason, message } => {
                assert_eq!(reason, RejectReason::Internal);
                assert_eq!(message, "internal");
            }
            other => panic!("expected kick, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn first_connection_learns_token_and_is_admitted() {
        let p = profile(vec![PropertyRecord::new(TOKEN_PROPERTY, "fresh")]);
        let store = Arc::new(TokenStore::new(Vec::new(), Box::new(|_| Ok(()))));
        let gate = HandshakeInterceptor::new(
            store.clone(),
            DuplicateSessionGuard::new(Arc::new(NobodyOnline)),
            Box::new(FixedExtractor(p)),
            messages(),
        );

        assert!(matches!(gate.intercept(&raw()).await, Outcome::Accept(_)));
        assert!(store.snapshot().await.contains("fresh"));
    }

    #[tokio::test]
    async fn persistence_failure_during_learn_fails_closed() {
        let p = profile(vec![PropertyRecord::new(TOKEN_PROPERTY, "fresh")]);
        let store = Arc::new(TokenStore::new(
            Vec::new(),
            Box::new(|_| Err(GuardError::Persistence("disk full".into()))),
        ));
        let gate = HandshakeInterceptor::new(
            store.clone(),
            DuplicateSessionGuard::new(Arc::new(NobodyOnline)),
            Box::new(FixedExtractor(p)),
            messages(),
        );

        match gate.intercept(&raw()).await {
            Outcome::Kick { reason, .. } => assert_eq!(reason, RejectReason::Internal),
            other => panic!("expected kick, got {other:?}"),
        }
        assert!(store.snapshot().await.is_empty());
    }
}
