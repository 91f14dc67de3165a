//! Error types for the protocol layer.
//!
//! Parsing an inbound frame is the main thing that fails here. Those
//! failures are never fatal: the connection handler logs them and keeps
//! reading.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust type).
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The frame named a trigger this server does not know.
    #[error("unknown event: {0:?}")]
    UnknownEvent(String),

    /// The frame is not valid JSON, lacks its headers, or carries a
    /// payload that does not fit its trigger.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// A client id is empty or too long.
    #[error("invalid client id: {0}")]
    InvalidClientId(String),

    /// A PIN is not exactly four decimal digits.
    #[error("invalid PIN: {0:?}")]
    InvalidPin(String),
}
