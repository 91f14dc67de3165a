//! The lobby: one running game plus the clients attached to it.
//!
//! Every mutation of a lobby happens under its single async mutex, so
//! events for one lobby are handled strictly one at a time no matter how
//! many connection tasks feed it. Different lobbies never share a lock.
//!
//! Views leave the lobby through per-client unbounded channels. A send
//! never blocks, and a send to a client whose connection is gone is
//! silently dropped.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, Weak};
use std::time::SystemTime;

use buzzline_game::{Game, Quiz, RoundSettings, Username};
use buzzline_protocol::{ClientId, LobbyEvent, LobbyPhase, Pin, ViewBlob};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::registry::LobbyMap;
use crate::views::millis;
use crate::{Archive, LobbyError, PastGameId};

/// Something the lobby wants a client's connection task to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// Encode and send this view.
    View(ViewBlob),
    /// The lobby is done with this client; close the connection.
    Close,
}

/// Per-client outbound channel.
pub type ClientSender = mpsc::UnboundedSender<Outbound>;

/// Who raised an event. Authorization is decided on this, never on the
/// event payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Initiator {
    Host,
    Player(ClientId),
    /// The lobby itself, e.g. the round-end waiter.
    System,
}

/// A client known to the lobby, connected or not.
#[derive(Debug)]
pub(crate) struct User {
    pub(crate) client_id: ClientId,
    /// `None` until a player picks a name. Always `HOST` for the host.
    pub(crate) username: Option<Username>,
    /// `None` while the client is disconnected.
    pub(crate) sender: Option<ClientSender>,
}

impl User {
    fn new(client_id: ClientId, username: Option<Username>, sender: ClientSender) -> Self {
        Self {
            client_id,
            username,
            sender: Some(sender),
        }
    }

    /// Pushes one message. Dropped if the client is not connected.
    pub(crate) fn send(&self, msg: Outbound) {
        let Some(sender) = &self.sender else {
            return;
        };
        if sender.send(msg).is_err() {
            tracing::debug!(client_id = %self.client_id, "outbound channel closed, message dropped");
        }
    }
}

/// Everything behind the lobby mutex.
pub(crate) struct LobbyState {
    pub(crate) host: Option<User>,
    pub(crate) users: HashMap<ClientId, User>,
    pub(crate) game: Game,
    /// Set once the archive has accepted the finished game.
    pub(crate) past_game_id: Option<PastGameId>,
    /// Task waiting for the current round to end.
    pub(crate) round_waiter: Option<JoinHandle<()>>,
}

impl LobbyState {
    pub(crate) fn phase(&self) -> LobbyPhase {
        if self.past_game_id.is_some() {
            LobbyPhase::Finished
        } else if !self.game.is_started() && !self.game.is_finished() {
            LobbyPhase::WaitingForPlayers
        } else if self.game.in_round() {
            LobbyPhase::Question
        } else {
            LobbyPhase::Answer
        }
    }

    /// Host first, then players in no particular order.
    pub(crate) fn everyone(&self) -> impl Iterator<Item = &User> {
        self.host.iter().chain(self.users.values())
    }

    pub(crate) fn user(&self, initiator: &Initiator) -> Option<&User> {
        match initiator {
            Initiator::Host => self.host.as_ref(),
            Initiator::Player(client_id) => self.users.get(client_id),
            Initiator::System => None,
        }
    }
}

/// A live quiz lobby.
///
/// Created through [`LobbyRegistry::add`](crate::LobbyRegistry::add) and
/// shared as `Arc<Lobby<A>>` between the registry, connection tasks, and
/// the lobby's own round-end waiter.
pub struct Lobby<A: Archive> {
    pin: Pin,
    created_at: SystemTime,
    /// The first client to attach. Never changes afterwards.
    host_id: OnceLock<ClientId>,
    pub(crate) state: Mutex<LobbyState>,
    pub(crate) archive: Arc<A>,
    registry: Weak<LobbyMap<A>>,
}

impl<A: Archive> Lobby<A> {
    pub(crate) fn new(
        pin: Pin,
        quiz: Quiz,
        settings: RoundSettings,
        archive: Arc<A>,
        registry: Weak<LobbyMap<A>>,
    ) -> Self {
        Self {
            pin,
            created_at: SystemTime::now(),
            host_id: OnceLock::new(),
            state: Mutex::new(LobbyState {
                host: None,
                users: HashMap::new(),
                game: Game::new(Arc::new(quiz), settings),
                past_game_id: None,
                round_waiter: None,
            }),
            archive,
            registry,
        }
    }

    pub fn pin(&self) -> Pin {
        self.pin
    }

    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    /// The host's client id, once a client has attached.
    pub fn host_id(&self) -> Option<&ClientId> {
        self.host_id.get()
    }

    // -----------------------------------------------------------------------
    // Connections
    // -----------------------------------------------------------------------

    /// Attaches a connection for `client_id` and pushes its current view.
    ///
    /// - The first client ever to attach becomes the host.
    /// - The host reattaching replaces its old connection.
    /// - A known player reattaching keeps its username and score.
    /// - Anyone else becomes a new player without a username.
    ///
    /// # Errors
    /// [`LobbyError::Finished`] once the game has been archived.
    pub async fn attach_connection(
        &self,
        client_id: ClientId,
        sender: ClientSender,
    ) -> Result<(), LobbyError> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        if state.past_game_id.is_some() {
            return Err(LobbyError::Finished);
        }

        let host_id = self.host_id.get_or_init(|| client_id.clone());
        let initiator = if *host_id == client_id {
            match state.host.as_mut() {
                Some(host) => host.sender = Some(sender),
                None => {
                    state.host = Some(User::new(client_id.clone(), Some(Username::host()), sender));
                }
            }
            tracing::info!(pin = %self.pin, %client_id, "host attached");
            Initiator::Host
        } else {
            match state.users.get_mut(&client_id) {
                Some(user) => {
                    user.sender = Some(sender);
                    tracing::info!(pin = %self.pin, %client_id, "player reattached");
                }
                None => {
                    state
                        .users
                        .insert(client_id.clone(), User::new(client_id.clone(), None, sender));
                    tracing::info!(
                        pin = %self.pin,
                        %client_id,
                        users = state.users.len(),
                        "player attached"
                    );
                }
            }
            Initiator::Player(client_id)
        };

        self.push_current_view(state, &initiator);
        Ok(())
    }

    /// Marks `client_id` disconnected if `sender` is still its current
    /// connection. A stale connection closing after a reattach is ignored.
    ///
    /// The user record stays so the client can come back.
    pub async fn detach_connection(&self, client_id: &ClientId, sender: &ClientSender) {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let user = if self.host_id.get() == Some(client_id) {
            state.host.as_mut()
        } else {
            state.users.get_mut(client_id)
        };
        let Some(user) = user else {
            return;
        };
        if user.sender.as_ref().is_some_and(|s| s.same_channel(sender)) {
            user.sender = None;
            tracing::info!(pin = %self.pin, %client_id, "client detached");
        }
    }

    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------

    /// Parses one inbound frame from `client_id` and handles it.
    ///
    /// Frames that do not parse are logged and dropped without any reply.
    pub async fn handle_frame(
        self: &Arc<Self>,
        client_id: &ClientId,
        data: &[u8],
    ) -> Result<(), LobbyError> {
        let event = match LobbyEvent::parse(data) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(pin = %self.pin, %client_id, error = %e, "dropping inbound frame");
                return Err(e.into());
            }
        };
        self.handle_event(client_id, event).await
    }

    /// Handles one event from an attached client.
    ///
    /// If the handler fails, the client gets an `error-alert` with the
    /// error's message and the lobby state is left as it was before the
    /// failing step.
    pub async fn handle_event(
        self: &Arc<Self>,
        client_id: &ClientId,
        event: LobbyEvent,
    ) -> Result<(), LobbyError> {
        let mut state = self.state.lock().await;
        let initiator = if self.host_id.get() == Some(client_id) {
            Initiator::Host
        } else if state.users.contains_key(client_id) {
            Initiator::Player(client_id.clone())
        } else {
            return Err(LobbyError::UnknownClient(client_id.clone()));
        };

        tracing::debug!(pin = %self.pin, %client_id, event = event.name(), "handling event");
        let result = self.dispatch(&mut state, event, &initiator).await;
        if let Err(e) = &result {
            tracing::debug!(pin = %self.pin, %client_id, error = %e, "event rejected");
            if let Some(user) = state.user(&initiator) {
                user.send(Outbound::View(ViewBlob::error(e.to_string())));
            }
        }
        result
    }

    /// Reveals the answer of the round that just ended. Called by the
    /// round-end waiter.
    pub(crate) async fn show_answer(self: &Arc<Self>) {
        let mut state = self.state.lock().await;
        if let Err(e) = self
            .dispatch(&mut state, LobbyEvent::ShowAnswerRequested, &Initiator::System)
            .await
        {
            tracing::warn!(pin = %self.pin, error = %e, "could not reveal answer");
        }
    }

    // -----------------------------------------------------------------------
    // Settings and inspection
    // -----------------------------------------------------------------------

    /// Changes reading and answer time. Only before the game starts.
    pub async fn update_settings(&self, settings: RoundSettings) -> Result<(), LobbyError> {
        let mut state = self.state.lock().await;
        state.game.update_settings(settings)?;
        tracing::info!(
            pin = %self.pin,
            reading_ms = millis(settings.reading_time),
            answer_ms = millis(settings.answer_time),
            "round settings updated"
        );
        Ok(())
    }

    pub async fn settings(&self) -> RoundSettings {
        self.state.lock().await.game.settings()
    }

    pub async fn phase(&self) -> LobbyPhase {
        self.state.lock().await.phase()
    }

    /// Usernames of players in the game roster, in join order.
    pub async fn players(&self) -> Vec<String> {
        let state = self.state.lock().await;
        state.game.players().map(|u| u.to_string()).collect()
    }

    /// Cumulative score of a player, `None` if no such player.
    pub async fn score_of(&self, username: &str) -> Option<u64> {
        let username = Username::new(username).ok()?;
        self.state.lock().await.game.score_of(&username)
    }

    /// Whether `client_id` currently has a live connection.
    pub async fn is_connected(&self, client_id: &ClientId) -> bool {
        let state = self.state.lock().await;
        state
            .everyone()
            .any(|u| &u.client_id == client_id && u.sender.is_some())
    }

    /// The archive id, once the game has been archived.
    pub async fn past_game_id(&self) -> Option<PastGameId> {
        self.state.lock().await.past_game_id
    }

    // -----------------------------------------------------------------------
    // Registry link
    // -----------------------------------------------------------------------

    /// Removes this lobby from the registry, unless the registry entry
    /// under this PIN is already some other lobby.
    pub(crate) fn unregister(&self) {
        let Some(map) = self.registry.upgrade() else {
            return;
        };
        let mut map = map.write().unwrap_or_else(PoisonError::into_inner);
        let is_self = map
            .get(&self.pin)
            .is_some_and(|entry| std::ptr::eq(Arc::as_ptr(entry), self));
        if is_self {
            map.remove(&self.pin);
            tracing::info!(pin = %self.pin, lobbies = map.len(), "lobby unregistered");
        }
    }
}

impl<A: Archive> std::fmt::Debug for Lobby<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lobby")
            .field("pin", &self.pin)
            .field("host_id", &self.host_id.get())
            .finish_non_exhaustive()
    }
}
