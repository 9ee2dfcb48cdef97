//! The pure accept/reject decision for one extracted property set.

use std::collections::HashSet;

use crate::profile::{first_property, PropertyRecord, TOKEN_PROPERTY};
use crate::verdict::{RejectReason, Verdict};

/// Outcome of validating one property set against an allow-set snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub verdict: Verdict,
    /// Token to add to the allow-set, set only on a first-run auto-learn.
    ///
    /// The caller must apply this through the authoritative store path, which
    /// re-evaluates under the write lock if another attempt won the race.
    pub learn: Option<String>,
}

impl Decision {
    fn terminal(verdict: Verdict) -> Self {
        Self {
            verdict,
            learn: None,
        }
    }
}

/// Decide the fate of a connection attempt from its relay-attached properties.
///
/// Pure: consults only its arguments. Mutation of the allow-set is expressed
/// as a learn instruction rather than performed here.
pub fn validate(properties: &[PropertyRecord], allow_set: &HashSet<String>) -> Decision {
    // No properties at all means the relay path was bypassed entirely.
    // Distinct reason so operators can tell it apart from a missing token.
    if properties.is_empty() {
        return Decision::terminal(Verdict::Rejected(RejectReason::NoProperties));
    }

    let token = match first_property(properties, TOKEN_PROPERTY) {
        Some(t) => t,
        None => return Decision::terminal(Verdict::Rejected(RejectReason::NoToken)),
    };

    if allow_set.is_empty() {
        // First run: no token configured yet. The first one observed becomes
        // the sole trusted value.
        return Decision {
            verdict: Verdict::Accepted,
            learn: Some(token.to_string()),
        };
    }

    if allow_set.contains(token) {
        Decision::terminal(Verdict::Accepted)
    } else {
        Decision::terminal(Verdict::Rejected(RejectReason::InvalidToken))
    }
}
