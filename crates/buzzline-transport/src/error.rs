/// Errors raised while accepting sockets or moving frames.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("could not bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("accept failed: {0}")]
    Accept(#[source] std::io::Error),

    /// The WebSocket upgrade was rejected or broke off.
    #[error("upgrade failed: {0}")]
    Upgrade(String),

    /// The peer or this side already closed the socket.
    #[error("connection closed")]
    Closed,

    #[error("send failed: {0}")]
    Send(String),

    #[error("receive failed: {0}")]
    Receive(String),
}
