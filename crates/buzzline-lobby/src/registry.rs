//! Lobby registry: creates lobbies and finds them by PIN.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use buzzline_game::{Quiz, RoundSettings};
use buzzline_protocol::{ClientId, Pin};
use rand::Rng;

use crate::{Archive, Lobby, RegistryError};

/// Shared PIN → lobby map. Lobbies hold a weak reference to it so they can
/// remove themselves when their game is archived.
pub(crate) type LobbyMap<A> = RwLock<HashMap<Pin, Arc<Lobby<A>>>>;

/// What a new lobby is made of.
#[derive(Debug, Clone)]
pub struct LobbyOptions {
    /// Fixed PIN, or `None` to pick a free random one.
    pub pin: Option<Pin>,
    pub quiz: Quiz,
    pub settings: RoundSettings,
}

impl LobbyOptions {
    pub fn new(quiz: Quiz) -> Self {
        Self {
            pin: None,
            quiz,
            settings: RoundSettings::default(),
        }
    }

    pub fn with_pin(mut self, pin: Pin) -> Self {
        self.pin = Some(pin);
        self
    }

    pub fn with_settings(mut self, settings: RoundSettings) -> Self {
        self.settings = settings;
        self
    }
}

/// All live lobbies of one server.
///
/// Cheap to clone; clones share the same map. The map lock is only ever
/// held for plain map operations, never across an `.await` and never
/// while waiting on a lobby's own lock.
pub struct LobbyRegistry<A: Archive> {
    lobbies: Arc<LobbyMap<A>>,
    archive: Arc<A>,
}

impl<A: Archive> Clone for LobbyRegistry<A> {
    fn clone(&self) -> Self {
        Self {
            lobbies: Arc::clone(&self.lobbies),
            archive: Arc::clone(&self.archive),
        }
    }
}

impl<A: Archive> LobbyRegistry<A> {
    /// Creates an empty registry. Every lobby it creates archives its
    /// finished game into `archive`.
    pub fn new(archive: Arc<A>) -> Self {
        Self {
            lobbies: Arc::new(RwLock::new(HashMap::new())),
            archive,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<Pin, Arc<Lobby<A>>>> {
        self.lobbies.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<Pin, Arc<Lobby<A>>>> {
        self.lobbies.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Creates and registers a lobby.
    ///
    /// # Errors
    /// - [`RegistryError::AlreadyExists`] if `options.pin` is taken.
    /// - [`RegistryError::Full`] if no PIN is free.
    pub fn add(&self, options: LobbyOptions) -> Result<Arc<Lobby<A>>, RegistryError> {
        let mut lobbies = self.write();
        let pin = match options.pin {
            Some(pin) if lobbies.contains_key(&pin) => {
                return Err(RegistryError::AlreadyExists(pin));
            }
            Some(pin) => pin,
            None => free_pin(&lobbies)?,
        };

        let title = options.quiz.title.clone();
        let lobby = Arc::new(Lobby::new(
            pin,
            options.quiz,
            options.settings,
            Arc::clone(&self.archive),
            Arc::downgrade(&self.lobbies),
        ));
        lobbies.insert(pin, Arc::clone(&lobby));
        tracing::info!(
            %pin,
            quiz = %title,
            lobbies = lobbies.len(),
            "lobby created"
        );
        Ok(lobby)
    }

    /// Stores `lobby` under its PIN, replacing the entry there.
    ///
    /// # Errors
    /// [`RegistryError::NotFound`] if nothing is registered under the PIN.
    pub fn update(&self, lobby: Arc<Lobby<A>>) -> Result<(), RegistryError> {
        let pin = lobby.pin();
        let mut lobbies = self.write();
        let entry = lobbies.get_mut(&pin).ok_or(RegistryError::NotFound(pin))?;
        *entry = lobby;
        Ok(())
    }

    pub fn get(&self, pin: Pin) -> Result<Arc<Lobby<A>>, RegistryError> {
        self.read().get(&pin).cloned().ok_or(RegistryError::NotFound(pin))
    }

    /// Removes a lobby. Its connections stay up until they drop it.
    pub fn delete(&self, pin: Pin) -> Result<Arc<Lobby<A>>, RegistryError> {
        let removed = self.write().remove(&pin).ok_or(RegistryError::NotFound(pin))?;
        tracing::info!(%pin, "lobby deleted");
        Ok(removed)
    }

    /// Every live lobby, ordered by PIN.
    pub fn all(&self) -> Vec<Arc<Lobby<A>>> {
        let mut lobbies: Vec<_> = self.read().values().cloned().collect();
        lobbies.sort_by_key(|l| l.pin());
        lobbies
    }

    /// The lobby hosted by `host_id`, if any.
    pub fn get_by_host(&self, host_id: &ClientId) -> Option<Arc<Lobby<A>>> {
        self.read()
            .values()
            .find(|l| l.host_id() == Some(host_id))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

/// Picks a random PIN not in `lobbies`.
fn free_pin<A: Archive>(lobbies: &HashMap<Pin, Arc<Lobby<A>>>) -> Result<Pin, RegistryError> {
    if lobbies.len() > usize::from(Pin::MAX) {
        return Err(RegistryError::Full);
    }
    let mut rng = rand::rng();
    loop {
        let candidate = rng.random_range(0..=Pin::MAX);
        let Ok(pin) = Pin::new(candidate) else {
            continue;
        };
        if !lobbies.contains_key(&pin) {
            return Ok(pin);
        }
    }
}
