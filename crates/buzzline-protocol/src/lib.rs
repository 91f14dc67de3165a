//! Wire protocol for Buzzline.
//!
//! This crate defines the "language" between browser clients and a lobby:
//!
//! - **Types** ([`ClientId`], [`Pin`], [`LobbyPhase`]): identifiers that
//!   show up in URLs, logs, and view data.
//! - **Events** ([`LobbyEvent`]): the closed set of things a lobby reacts
//!   to, parsed from inbound htmx frames.
//! - **Views** ([`ViewBlob`] and its payloads): plain values describing
//!   what a client should display.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how views become bytes.
//! - **Errors** ([`ProtocolError`]).
//!
//! # Architecture
//!
//! ```text
//! Transport (bytes) → Protocol (LobbyEvent) → Lobby → Protocol (ViewBlob) → Transport
//! ```

mod codec;
mod error;
mod event;
mod types;
mod view;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use event::{LobbyEvent, trigger};
pub use types::{ClientId, LobbyPhase, MAX_CLIENT_ID_LEN, Pin};
pub use view::{
    AnswerSnapshot, ErrorAlert, FinalResultsData, LobbySnapshot, PlayerCount,
    QuestionSnapshot, ScoreEntry, UserSnapshot, ViewBlob, ViewData,
};
