//! Per-connection handler: lobby admission and frame pumping.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Read the lobby PIN and client id from the request path
//!   2. Attach to the lobby with a fresh outbound channel
//!   3. Spawn a writer that drains the channel into the socket
//!   4. Loop: feed inbound frames to the lobby until the socket closes
//!   5. Detach, so a later reconnect can take over

use std::sync::Arc;

use buzzline_lobby::{Archive, Outbound, QuizStore};
use buzzline_protocol::{ClientId, Codec, Pin, ViewBlob};
use buzzline_transport::{Connection, WebSocketConnection};
use tokio::sync::mpsc;

use crate::server::ServerState;
use crate::BuzzlineError;

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<A, Q, C>(
    conn: WebSocketConnection,
    state: Arc<ServerState<A, Q, C>>,
) -> Result<(), BuzzlineError>
where
    A: Archive,
    Q: QuizStore,
    C: Codec,
{
    let conn_id = conn.id();
    let conn = Arc::new(conn);
    tracing::debug!(%conn_id, path = conn.request_path(), "handling new connection");

    // --- Step 1: Admission ---
    let (pin, client_id) = match parse_lobby_path(conn.request_path()) {
        Ok(target) => target,
        Err(e) => {
            reject(&conn, &state.codec, "Invalid lobby URL").await;
            return Err(e);
        }
    };
    let lobby = match state.registry.get(pin) {
        Ok(lobby) => lobby,
        Err(e) => {
            reject(&conn, &state.codec, "Lobby not found").await;
            return Err(e.into());
        }
    };

    let (tx, rx) = mpsc::unbounded_channel();
    if let Err(e) = lobby.attach_connection(client_id.clone(), tx.clone()).await {
        reject(&conn, &state.codec, &e.to_string()).await;
        return Err(e.into());
    }
    tracing::info!(%conn_id, %pin, %client_id, "client connected");

    // --- Step 2: Writer ---
    let writer = tokio::spawn(write_views(Arc::clone(&conn), rx, Arc::clone(&state)));

    // --- Step 3: Reader ---
    loop {
        match conn.recv().await {
            Ok(Some(data)) => {
                if let Err(e) = lobby.handle_frame(&client_id, &data).await {
                    tracing::debug!(%conn_id, %client_id, error = %e, "frame not applied");
                }
            }
            Ok(None) => {
                tracing::info!(%conn_id, %client_id, "connection closed cleanly");
                break;
            }
            Err(e) => {
                tracing::debug!(%conn_id, %client_id, error = %e, "recv error");
                break;
            }
        }
    }

    // Once detached, the lobby holds no sender for this channel and the
    // writer drains what is left and stops.
    lobby.detach_connection(&client_id, &tx).await;
    drop(tx);
    if let Err(e) = writer.await {
        tracing::debug!(%conn_id, error = %e, "writer task failed");
    }
    Ok(())
}

/// Drains a client's outbound channel into its socket.
async fn write_views<A, Q, C>(
    conn: Arc<WebSocketConnection>,
    mut rx: mpsc::UnboundedReceiver<Outbound>,
    state: Arc<ServerState<A, Q, C>>,
) where
    A: Archive,
    Q: QuizStore,
    C: Codec,
{
    while let Some(msg) = rx.recv().await {
        match msg {
            Outbound::View(view) => {
                let bytes = match state.codec.encode(&view) {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        tracing::warn!(view = view.name(), error = %e, "failed to encode view");
                        continue;
                    }
                };
                if let Err(e) = conn.send(&bytes).await {
                    tracing::debug!(conn_id = %conn.id(), error = %e, "send failed");
                    break;
                }
            }
            Outbound::Close => {
                if let Err(e) = conn.close().await {
                    tracing::debug!(conn_id = %conn.id(), error = %e, "close failed");
                }
                break;
            }
        }
    }
}

/// Sends an `error-alert` and closes. Used before the client is attached.
async fn reject(conn: &WebSocketConnection, codec: &impl Codec, message: &str) {
    tracing::info!(conn_id = %conn.id(), path = conn.request_path(), reason = message, "connection rejected");
    if let Ok(bytes) = codec.encode(&ViewBlob::error(message)) {
        let _ = conn.send(&bytes).await;
    }
    let _ = conn.close().await;
}

/// Parses `/lobbies/<pin>/ws?client_id=<id>`.
pub(crate) fn parse_lobby_path(path: &str) -> Result<(Pin, ClientId), BuzzlineError> {
    let bad = || BuzzlineError::BadRequest(format!("unexpected path {path:?}"));

    let (route, query) = path.split_once('?').unwrap_or((path, ""));
    let segments: Vec<&str> = route.trim_matches('/').split('/').collect();
    let pin = match segments.as_slice() {
        ["lobbies", pin, "ws"] => pin.parse::<Pin>()?,
        _ => return Err(bad()),
    };

    let client_id = query
        .split('&')
        .find_map(|pair| pair.strip_prefix("client_id="))
        .ok_or_else(|| BuzzlineError::BadRequest("missing client_id".into()))?;
    Ok((pin, ClientId::new(decode_query_value(client_id)?)?))
}

/// Decodes a form-encoded query value: `%XX` escapes and `+` for space.
fn decode_query_value(raw: &str) -> Result<String, BuzzlineError> {
    let bad = || BuzzlineError::BadRequest(format!("malformed query value {raw:?}"));
    let hex = |b: u8| (b as char).to_digit(16);

    let mut bytes = Vec::with_capacity(raw.len());
    let mut rest = raw.bytes();
    while let Some(b) = rest.next() {
        match b {
            b'%' => {
                let hi = rest.next().and_then(hex).ok_or_else(bad)?;
                let lo = rest.next().and_then(hex).ok_or_else(bad)?;
                // Two hex digits always fit a byte.
                bytes.push((hi * 16 + lo) as u8);
            }
            b'+' => bytes.push(b' '),
            other => bytes.push(other),
        }
    }
    String::from_utf8(bytes).map_err(|_| bad())
}
