//! Socket layer for Buzzline.
//!
//! [`Transport`] accepts clients and [`Connection`] moves frames in both
//! directions. Lobbies never see these types: the server bridges each
//! connection to a lobby through an in-process channel.
//!
//! # Feature Flags
//!
//! - `websocket` (default): the tokio-tungstenite transport the server runs on

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketTransport};

use std::fmt;
use std::net::SocketAddr;

/// Process-unique number for one accepted socket.
///
/// This is NOT the client's identity. A browser that reconnects gets a new
/// `ConnectionId` but presents the same client id; the id only tells
/// concurrent sockets apart in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A listener handing out upgraded client sockets.
pub trait Transport: Send + Sync + 'static {
    type Connection: Connection;
    type Error: std::error::Error + Send + Sync;

    /// Waits for the next client and completes its upgrade.
    ///
    /// A failed upgrade is returned as an error; the listener stays usable.
    async fn accept(&mut self) -> Result<Self::Connection, Self::Error>;

    /// The address clients should dial.
    fn local_addr(&self) -> Result<SocketAddr, Self::Error>;
}

/// One client socket carrying JSON frames both ways.
///
/// All methods take `&self` so one task can sit in [`recv`](Self::recv)
/// while another pushes views through [`send`](Self::send).
/// Implementations must not hold a shared lock across both directions.
pub trait Connection: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync;

    /// Sends one frame. Valid UTF-8 goes out as a text frame, anything
    /// else as binary.
    async fn send(&self, frame: &[u8]) -> Result<(), Self::Error>;

    /// Waits for the next data frame. `Ok(None)` means the peer closed.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Starts the closing handshake.
    async fn close(&self) -> Result<(), Self::Error>;

    /// Path and query of the upgrade request, e.g.
    /// `/lobbies/0042/ws?client_id=abc`. Lobby routing reads it.
    fn request_path(&self) -> &str;

    fn id(&self) -> ConnectionId;
}
