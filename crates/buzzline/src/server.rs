//! `BuzzlineServer` builder and server loop.
//!
//! This is the entry point for running a Buzzline quiz server. It ties
//! the layers together: transport → lobby registry → lobby.

use std::net::SocketAddr;
use std::sync::Arc;

use buzzline_game::RoundSettings;
use buzzline_lobby::{Archive, Lobby, LobbyOptions, LobbyRegistry, QuizId, QuizStore};
use buzzline_protocol::{Codec, JsonCodec, Pin};
use buzzline_transport::{Transport, WebSocketTransport};

use crate::handler::handle_connection;
use crate::{BuzzlineError, ServerConfig};

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<A: Archive, Q: QuizStore, C: Codec> {
    pub(crate) registry: LobbyRegistry<A>,
    pub(crate) quizzes: Q,
    pub(crate) codec: C,
}

/// Builder for configuring and starting a Buzzline server.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use buzzline::prelude::*;
///
/// let server = BuzzlineServer::builder()
///     .bind("0.0.0.0:8080")
///     .build(quizzes, Arc::new(InMemoryArchive::new()))
///     .await?;
/// let lobby = server.create_lobby(QuizId(1), None).await?;
/// println!("join with PIN {}", lobby.pin());
/// server.run().await
/// ```
pub struct BuzzlineServerBuilder {
    config: ServerConfig,
}

impl BuzzlineServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Sets the round timing for lobbies this server creates.
    pub fn round_settings(mut self, round: RoundSettings) -> Self {
        self.config.round = round;
        self
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Binds the listener and builds the server.
    ///
    /// Views are encoded with [`JsonCodec`] and sent over
    /// [`WebSocketTransport`].
    pub async fn build<A: Archive, Q: QuizStore>(
        self,
        quizzes: Q,
        archive: Arc<A>,
    ) -> Result<BuzzlineServer<A, Q, JsonCodec>, BuzzlineError> {
        let transport = WebSocketTransport::bind(&self.config.bind_addr).await?;

        let state = Arc::new(ServerState {
            registry: LobbyRegistry::new(archive),
            quizzes,
            codec: JsonCodec,
        });

        Ok(BuzzlineServer {
            transport,
            state,
            round: self.config.round,
        })
    }
}

impl Default for BuzzlineServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Buzzline server.
///
/// Create lobbies with [`create_lobby`](Self::create_lobby), then call
/// [`run`](Self::run) to start accepting connections.
pub struct BuzzlineServer<A: Archive, Q: QuizStore, C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<A, Q, C>>,
    round: RoundSettings,
}

impl<A, Q, C> BuzzlineServer<A, Q, C>
where
    A: Archive,
    Q: QuizStore,
    C: Codec,
{
    /// Creates a new builder.
    pub fn builder() -> BuzzlineServerBuilder {
        BuzzlineServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, BuzzlineError> {
        Ok(self.transport.local_addr()?)
    }

    /// The registry of live lobbies. Clones share state with the server.
    pub fn registry(&self) -> &LobbyRegistry<A> {
        &self.state.registry
    }

    /// Creates a lobby for a stored quiz.
    ///
    /// `pin` picks a fixed PIN; `None` draws a free random one.
    pub async fn create_lobby(
        &self,
        quiz_id: QuizId,
        pin: Option<Pin>,
    ) -> Result<Arc<Lobby<A>>, BuzzlineError> {
        let quiz = self.state.quizzes.get_quiz(quiz_id).await?;
        let mut options = LobbyOptions::new(quiz).with_settings(self.round);
        options.pin = pin;
        let lobby = self.state.registry.add(options)?;
        tracing::info!(%quiz_id, pin = %lobby.pin(), "lobby opened");
        Ok(lobby)
    }

    /// Runs the server accept loop.
    ///
    /// Spawns a handler task for each accepted connection. Runs until the
    /// process is terminated.
    pub async fn run(mut self) -> Result<(), BuzzlineError> {
        tracing::info!(addr = ?self.transport.local_addr().ok(), "Buzzline server running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
