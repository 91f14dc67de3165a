//! Error types for the lobby layer.

use buzzline_game::GameError;
use buzzline_protocol::{ClientId, Pin, ProtocolError};

use crate::{PastGameId, QuizId};

/// Errors from handling a lobby event or admitting a connection.
///
/// When a client's command fails, the lobby sends the `Display` text back
/// to that client as an `error-alert`, so most messages are user-facing.
#[derive(Debug, thiserror::Error)]
pub enum LobbyError {
    /// A non-host client sent a host-only command.
    #[error("Only the host can do that")]
    NotHost,

    /// The host sent a command reserved for players (answering, picking
    /// a username).
    #[error("The host cannot do that")]
    PlayersOnly,

    /// A client sent an event that only the lobby itself may raise.
    #[error("internal event sent by a client")]
    SystemOnly,

    /// A player without a username tried to play.
    #[error("Choose a username first")]
    UsernameRequired,

    /// The answer names a question other than the live one.
    #[error("That answer is for question {got}, the current question is {expected}")]
    WrongQuestion { expected: usize, got: usize },

    /// The client id is not attached to this lobby.
    #[error("client {0} is not in this lobby")]
    UnknownClient(ClientId),

    /// The game is over and archived; the lobby accepts nothing more.
    #[error("This game is over")]
    Finished,

    #[error(transparent)]
    Game(#[from] GameError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("Could not save the game: {0}")]
    Archive(#[from] ArchiveError),
}

/// Errors from the lobby registry.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("a lobby with PIN {0} already exists")]
    AlreadyExists(Pin),

    #[error("no lobby with PIN {0}")]
    NotFound(Pin),

    /// Every one of the 10 000 PINs is taken.
    #[error("no free lobby PIN left")]
    Full,
}

/// Errors from an [`Archive`](crate::Archive) implementation.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("past game {0} not found")]
    NotFound(PastGameId),

    /// The backing store could not be reached or refused the write.
    #[error("archive unavailable: {0}")]
    Unavailable(String),
}

/// Errors from a [`QuizStore`](crate::QuizStore) implementation.
#[derive(Debug, thiserror::Error)]
pub enum QuizStoreError {
    #[error("quiz {0} not found")]
    NotFound(QuizId),

    #[error(transparent)]
    Invalid(#[from] GameError),
}
