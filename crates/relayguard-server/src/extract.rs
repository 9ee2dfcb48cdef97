//! Metadata extraction: one implementation per supported handshake format.
//!
//! The format is fixed at startup by the `handshake-format` config key (or
//! the CLI override); there is no runtime sniffing of the host version.

use clap::ValueEnum;
use relayguard_core::{ConnectionProfile, GuardError, GuardResult, PropertyRecord};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use uuid::Uuid;

/// Raw material for one connection attempt: the peer address plus the single
/// handshake payload line it sent.
#[derive(Debug, Clone)]
pub struct RawHandshake {
    pub remote_addr: SocketAddr,
    pub payload: String,
}

/// Supported relay handshake formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum HandshakeFormat {
    /// Legacy `\0`-separated handshake string with an embedded JSON property
    /// list, as produced by BungeeCord-style relays.
    Bungee,
    /// A single JSON object with `identity`, `origin`, and `properties`.
    Json,
}

/// Reads identity, origin, and relay-attached properties out of a raw
/// connection attempt.
///
/// Any shape or parse fault is reported as [`GuardError::Extraction`]; the
/// caller treats that as grounds to reject, never to admit.
pub trait MetadataExtractor: Send + Sync {
    fn extract(&self, raw: &RawHandshake) -> GuardResult<ConnectionProfile>;
}

/// Extractor for the configured format.
pub fn extractor_for(format: HandshakeFormat) -> Box<dyn MetadataExtractor> {
    match format {
        HandshakeFormat::Bungee => Box::new(BungeeHandshakeExtractor),
        HandshakeFormat::Json => Box::new(JsonHandshakeExtractor),
    }
}

/// Legacy relay wire form:
/// `virtual_host \0 client_addr \0 identity \0 properties_json`
/// where `properties_json` is a JSON array of name/value/signature objects.
pub struct BungeeHandshakeExtractor;

impl MetadataExtractor for BungeeHandshakeExtractor {
    fn extract(&self, raw: &RawHandshake) -> GuardResult<ConnectionProfile> {
        let mut parts = raw.payload.split('\0');
        let _virtual_host = parts.next();
        let client_addr = parts.next();
        let identity = parts
            .next()
            .ok_or_else(|| GuardError::Extraction("handshake missing identity segment".into()))?;
        let properties_json = parts.next();

        // Relays send the identity undashed; Uuid::parse_str takes both forms.
        let identity = Uuid::parse_str(identity)
            .map_err(|e| GuardError::Extraction(format!("malformed identity {identity:?}: {e}")))?;

        let properties: Vec<PropertyRecord> = match properties_json {
            Some(json) if !json.is_empty() => serde_json::from_str(json)
                .map_err(|e| GuardError::Extraction(format!("malformed property list: {e}")))?,
            _ => Vec::new(),
        };

        let origin = client_addr
            .filter(|a| !a.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| raw.remote_addr.to_string());

        Ok(ConnectionProfile {
            identity,
            origin,
            properties,
        })
    }
}

/// Structured form for hosts that forward metadata as one JSON object.
pub struct JsonHandshakeExtractor;

#[derive(Deserialize)]
struct JsonHandshake {
    identity: Uuid,
    #[serde(default)]
    origin: Option<String>,
    #[serde(default)]
    properties: Vec<PropertyRecord>,
}

impl MetadataExtractor for JsonHandshakeExtractor {
    fn extract(&self, raw: &RawHandshake) -> GuardResult<ConnectionProfile> {
        let parsed: JsonHandshake = serde_json::from_str(&raw.payload)
            .map_err(|e| GuardError::Extraction(format!("malformed JSON handshake: {e}")))?;
        Ok(ConnectionProfile {
            identity: parsed.identity,
            origin: parsed
                .origin
                .unwrap_or_else(|| raw.remote_addr.to_string()),
            properties: parsed.properties,
        })
    }
}
