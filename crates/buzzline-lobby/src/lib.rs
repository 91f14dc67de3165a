//! Lobby runtime for Buzzline.
//!
//! A lobby joins a [`Game`](buzzline_game::Game) with the clients playing
//! it. It takes inbound frames, decides who may do what, drives rounds
//! forward, and pushes a fresh view to every client after each change.
//!
//! # Key types
//!
//! - [`Lobby`]: one game and its clients, guarded by one async mutex
//! - [`LobbyRegistry`]: creates lobbies and finds them by PIN
//! - [`Archive`]: where finished games go ([`InMemoryArchive`] built in)
//! - [`QuizStore`]: where quizzes come from ([`InMemoryQuizStore`] built in)
//! - [`Outbound`]: what a lobby sends down a client's channel

#![allow(async_fn_in_trait)]

mod archive;
mod error;
mod events;
mod lobby;
mod quiz_store;
mod registry;
mod views;

pub use archive::{Archive, InMemoryArchive, PastGame, PastGameId, PastScore};
pub use error::{ArchiveError, LobbyError, QuizStoreError, RegistryError};
pub use lobby::{ClientSender, Initiator, Lobby, Outbound};
pub use quiz_store::{InMemoryQuizStore, QuizId, QuizStore};
pub use registry::{LobbyOptions, LobbyRegistry};
