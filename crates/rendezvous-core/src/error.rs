//! Error types for the Rendezvous Core.

use thiserror::Error;

/// Errors produced while constructing or decoding core values.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("cohort size must be at least 1")]
    EmptyCohort,

    #[error("sequence numbers start at 1, got {0}")]
    InvalidSequenceNumber(u64),

    #[error("unknown sync state: {0}")]
    UnknownState(String),

    #[error("invalid peer id: {0}")]
    InvalidPeerId(String),

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid multiaddr {addr:?}: {reason}")]
    InvalidMultiaddr { addr: String, reason: String },

    #[error("malformed announcement: {0}")]
    MalformedAnnouncement(String),

    #[error("encoding error: {0}")]
    EncodingError(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
