//! Verdict taxonomy for a connection attempt.

use serde::{Deserialize, Serialize};

/// Why a connection attempt was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RejectReason {
    /// The handshake carried no properties at all — the relay path was
    /// bypassed, not merely a client that forgot the token.
    NoProperties,
    /// Properties were present but none carried the token.
    NoToken,
    /// A token was supplied but is not in the allow-set.
    InvalidToken,
    /// The identity already has an active session.
    AlreadyOnline,
    /// The gate could not evaluate the attempt; fail closed.
    Internal,
}

impl RejectReason {
    /// Short label for log lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::NoProperties => "no-properties",
            RejectReason::NoToken => "no-token",
            RejectReason::InvalidToken => "invalid-token",
            RejectReason::AlreadyOnline => "already-online",
            RejectReason::Internal => "internal",
        }
    }
}

/// Terminal decision for one connection attempt. Never revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    Rejected(RejectReason),
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted)
    }
}
