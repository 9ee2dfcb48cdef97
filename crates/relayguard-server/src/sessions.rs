//! Active-session directory and the duplicate-login guard.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;
use tracing::info;
use uuid::Uuid;

/// Snapshot view of live sessions, queried before token validation.
pub trait SessionDirectory: Send + Sync {
    /// Whether this identity currently has a live session.
    fn is_online(&self, identity: &Uuid) -> bool;
}

/// One admitted session held by the host process.
#[derive(Debug, Clone)]
pub struct SessionEntry {
    pub session_id: String,
    pub identity: Uuid,
    pub origin: String,
    pub remote_addr: SocketAddr,
    pub connected_at: Instant,
}

/// Registry of currently admitted sessions, keyed by identity.
#[derive(Default)]
pub struct ActiveSessions {
    sessions: RwLock<HashMap<Uuid, SessionEntry>>,
}

impl ActiveSessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an admitted session. Returns the assigned session id.
    pub fn register(&self, identity: Uuid, origin: String, remote_addr: SocketAddr) -> String {
        let session_id = generate_session_id();
        let entry = SessionEntry {
            session_id: session_id.clone(),
            identity,
            origin,
            remote_addr,
            connected_at: Instant::now(),
        };
        self.write().insert(identity, entry);
        info!(session_id = %session_id, identity = %identity, "session registered");
        session_id
    }

    /// Drop the session for `identity`, if one exists.
    pub fn unregister(&self, identity: &Uuid) {
        if let Some(entry) = self.write().remove(identity) {
            info!(session_id = %entry.session_id, identity = %identity, "session removed");
        }
    }

    /// Number of live sessions.
    pub fn count(&self) -> usize {
        self.read().len()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<Uuid, SessionEntry>> {
        self.sessions.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<Uuid, SessionEntry>> {
        self.sessions.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl SessionDirectory for ActiveSessions {
    fn is_online(&self, identity: &Uuid) -> bool {
        self.read().contains_key(identity)
    }
}

/// Pre-login duplicate check.
///
/// Advisory and best-effort: it inspects a snapshot of live sessions and is
/// not a security boundary against a concurrently completing duplicate login.
pub struct DuplicateSessionGuard {
    directory: Arc<dyn SessionDirectory>,
}

impl DuplicateSessionGuard {
    pub fn new(directory: Arc<dyn SessionDirectory>) -> Self {
        Self { directory }
    }

    /// True when the identity already has an active session.
    pub fn check(&self, identity: &Uuid) -> bool {
        self.directory.is_online(identity)
    }
}

/// Generate a random session id (hex-encoded, 16 bytes = 32 hex chars).
fn generate_session_id() -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let bytes: Vec<u8> = (0..16).map(|_| rng.gen()).collect();
    hex::encode(bytes)
}
