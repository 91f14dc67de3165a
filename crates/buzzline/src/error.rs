//! Unified error type for the Buzzline server.

use buzzline_lobby::{LobbyError, QuizStoreError, RegistryError};
use buzzline_protocol::ProtocolError;
use buzzline_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant generates the `From` impl, so
/// `?` converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum BuzzlineError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, bad frame).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A lobby rejected a connection or an event.
    #[error(transparent)]
    Lobby(#[from] LobbyError),

    /// Lobby lookup or creation failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The quiz for a new lobby could not be loaded.
    #[error(transparent)]
    QuizStore(#[from] QuizStoreError),

    /// The WebSocket request path is not `/lobbies/<pin>/ws?client_id=<id>`.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// An environment variable holds a value that does not parse.
    #[error("invalid configuration: {0}")]
    Config(String),
}
