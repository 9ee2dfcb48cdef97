use thiserror::Error;

/// Errors produced by the relayguard gatekeeper layer.
#[derive(Debug, Error)]
pub enum GuardError {
    #[error("config error: {0}")]
    Config(String),

    #[error("invalid handshake: {0}")]
    InvalidHandshake(String),

    #[error("metadata extraction failed: {0}")]
    Extraction(String),

    #[error("persistence failed: {0}")]
    Persistence(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type GuardResult<T> = Result<T, GuardError>;
