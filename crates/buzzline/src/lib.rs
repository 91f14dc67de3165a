//! # Buzzline
//!
//! Real-time multiplayer quiz server.
//!
//! A host opens a lobby for a quiz and shares its 4-digit PIN. Players
//! connect over WebSocket, pick usernames, and answer timed questions.
//! Faster correct answers earn more points. When the host ends the game,
//! the final scores go to an [`Archive`](buzzline_lobby::Archive).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use buzzline::prelude::*;
//!
//! # async fn demo(quiz: Quiz) -> Result<(), BuzzlineError> {
//! let quizzes = InMemoryQuizStore::new();
//! quizzes.insert(QuizId(1), quiz)?;
//!
//! let server = BuzzlineServerBuilder::new()
//!     .bind("0.0.0.0:8080")
//!     .build(quizzes, Arc::new(InMemoryArchive::new()))
//!     .await?;
//! let lobby = server.create_lobby(QuizId(1), None).await?;
//! println!("PIN: {}", lobby.pin());
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod logging;
mod server;

pub use config::{ServerConfig, ENV_ANSWER_SECS, ENV_BIND, ENV_READING_SECS};
pub use error::BuzzlineError;
pub use logging::{default_filter, setup_logger};
pub use server::{BuzzlineServer, BuzzlineServerBuilder};

/// Everything needed to embed a server, in one import.
pub mod prelude {
    pub use crate::{BuzzlineError, BuzzlineServer, BuzzlineServerBuilder, ServerConfig};
    pub use buzzline_game::{Answer, GameError, Question, Quiz, RoundSettings, Username};
    pub use buzzline_lobby::{
        Archive, ArchiveError, InMemoryArchive, InMemoryQuizStore, Lobby, LobbyError,
        LobbyRegistry, PastGame, PastGameId, PastScore, QuizId, QuizStore, QuizStoreError,
        RegistryError,
    };
    pub use buzzline_protocol::{
        trigger, ClientId, LobbyPhase, Pin, ProtocolError, ViewBlob, ViewData,
    };
}
