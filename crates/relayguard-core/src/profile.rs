//! Connection-attempt metadata: identity, origin, and relay-attached properties.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Property name under which the relay attaches the shared secret.
///
/// The relay strips this property from anything reaching the original client,
/// so its presence proves the connection came through the relay path.
pub const TOKEN_PROPERTY: &str = "bungeeguard-token";

/// A single name/value property attached to a connection attempt by the relay.
///
/// Multiple records may share a name. The optional signature is carried
/// through from the wire but never consulted when deciding a verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyRecord {
    pub name: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl PropertyRecord {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
            signature: None,
        }
    }
}

/// Metadata for one in-flight connection attempt.
///
/// Transient: created when the attempt reaches the handshake phase, dropped
/// once a verdict is issued. Never persisted.
#[derive(Debug, Clone)]
pub struct ConnectionProfile {
    /// Stable unique id claimed for this connection.
    pub identity: Uuid,
    /// Claimed network origin (hostname or address string).
    pub origin: String,
    /// Properties attached by the relay.
    pub properties: Vec<PropertyRecord>,
}

/// First non-null value recorded under `name`, if any.
pub fn first_property<'a>(properties: &'a [PropertyRecord], name: &str) -> Option<&'a str> {
    properties
        .iter()
        .filter(|p| p.name == name)
        .find_map(|p| p.value.as_deref())
}
