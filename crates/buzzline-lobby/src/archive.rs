//! Past-game archive: where finished games are recorded.
//!
//! The lobby does not store anything itself. When a game ends it builds a
//! [`PastGame`] value and hands it to an [`Archive`], which must have
//! made it durable by the time `insert` returns.

use std::fmt;
use std::time::SystemTime;

use buzzline_game::Game;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::ArchiveError;

/// Id the archive assigns to a stored game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PastGameId(pub u64);

impl fmt::Display for PastGameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "G-{}", self.0)
    }
}

/// The record of a finished game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PastGame {
    pub started_at: SystemTime,
    pub ended_at: SystemTime,
    pub quiz_title: String,
    /// Final scores, highest first.
    pub scores: Vec<PastScore>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PastScore {
    pub username: String,
    pub score: u64,
}

impl PastGame {
    /// Builds the record from a game's final leaderboard.
    ///
    /// A game ended before it ever started gets `started_at == ended_at`.
    pub fn from_game(game: &Game) -> Self {
        let ended_at = game.ended_at().unwrap_or_else(SystemTime::now);
        Self {
            started_at: game.started_at().unwrap_or(ended_at),
            ended_at,
            quiz_title: game.quiz().title.clone(),
            scores: game
                .leaderboard()
                .into_iter()
                .map(|p| PastScore {
                    username: p.username.to_string(),
                    score: p.score,
                })
                .collect(),
        }
    }
}

/// Durable sink for finished games, plus read access for history pages.
///
/// # Example
///
/// ```rust
/// use buzzline_lobby::{Archive, ArchiveError, PastGame, PastGameId};
///
/// /// Drops every game on the floor.
/// struct NullArchive;
///
/// impl Archive for NullArchive {
///     async fn insert(&self, _game: PastGame) -> Result<PastGameId, ArchiveError> {
///         Ok(PastGameId(0))
///     }
///
///     async fn get(&self, id: PastGameId) -> Result<PastGame, ArchiveError> {
///         Err(ArchiveError::NotFound(id))
///     }
/// }
/// ```
pub trait Archive: Send + Sync + 'static {
    /// Stores a finished game and returns its id.
    ///
    /// The lobby calls this exactly once per successfully finished game.
    /// An `Err` leaves the lobby alive so the host can retry.
    fn insert(
        &self,
        game: PastGame,
    ) -> impl std::future::Future<Output = Result<PastGameId, ArchiveError>> + Send;

    /// Looks up a stored game.
    fn get(
        &self,
        id: PastGameId,
    ) -> impl std::future::Future<Output = Result<PastGame, ArchiveError>> + Send;
}

/// Process-local [`Archive`]. Ids start at 1.
#[derive(Debug, Default)]
pub struct InMemoryArchive {
    games: Mutex<Vec<PastGame>>,
}

impl InMemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored game with its id, oldest first.
    pub async fn all(&self) -> Vec<(PastGameId, PastGame)> {
        self.games
            .lock()
            .await
            .iter()
            .enumerate()
            .map(|(i, g)| (PastGameId(i as u64 + 1), g.clone()))
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.games.lock().await.len()
    }
}

impl Archive for InMemoryArchive {
    async fn insert(&self, game: PastGame) -> Result<PastGameId, ArchiveError> {
        let mut games = self.games.lock().await;
        games.push(game);
        Ok(PastGameId(games.len() as u64))
    }

    async fn get(&self, id: PastGameId) -> Result<PastGame, ArchiveError> {
        let idx = usize::try_from(id.0)
            .ok()
            .and_then(|n| n.checked_sub(1))
            .ok_or(ArchiveError::NotFound(id))?;
        self.games
            .lock()
            .await
            .get(idx)
            .cloned()
            .ok_or(ArchiveError::NotFound(id))
    }
}
