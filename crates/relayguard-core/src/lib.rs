//! relayguard-core: shared gatekeeper library.
//!
//! Connection-attempt profiles, the verdict taxonomy, kick-message templates,
//! and the pure token validator used by the backend-side daemon to admit only
//! connections forwarded by a trusted relay.

pub mod error;
pub mod messages;
pub mod profile;
pub mod validator;
pub mod verdict;

// Re-export commonly used items at crate root.
pub use error::{GuardError, GuardResult};
pub use messages::{translate_color_codes, KickMessages};
pub use profile::{first_property, ConnectionProfile, PropertyRecord, TOKEN_PROPERTY};
pub use validator::{validate, Decision};
pub use verdict::{RejectReason, Verdict};
