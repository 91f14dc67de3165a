//! A sequence of rounds over one quiz, with a roster and cumulative scores.

use std::cmp::Reverse;
use std::sync::Arc;
use std::time::SystemTime;

use tracing::debug;

use crate::{GameError, Quiz, Round, RoundScore, RoundSettings, Username};

/// A player's cumulative score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerScore {
    pub username: Username,
    pub score: u64,
}

/// Game state for one lobby.
///
/// The roster is kept in join order; [`Game::leaderboard`] sorts by score
/// and breaks ties by that order. Players can only be added, renamed or
/// removed before [`Game::start`] or [`Game::finish`].
#[derive(Debug)]
pub struct Game {
    quiz: Arc<Quiz>,
    settings: RoundSettings,
    points: Vec<PlayerScore>,
    started_at: Option<SystemTime>,
    ended_at: Option<SystemTime>,
    current_round: Option<Round>,
    current_round_idx: Option<usize>,
    /// Results of the current round once folded into `points`.
    applied_results: Option<Vec<RoundScore>>,
}

impl Game {
    pub fn new(quiz: Arc<Quiz>, settings: RoundSettings) -> Self {
        Self {
            quiz,
            settings,
            points: Vec::new(),
            started_at: None,
            ended_at: None,
            current_round: None,
            current_round_idx: None,
            applied_results: None,
        }
    }

    // -----------------------------------------------------------------------
    // Roster
    // -----------------------------------------------------------------------

    pub fn add_player(&mut self, username: Username) -> Result<(), GameError> {
        self.require_open_roster()?;
        if self.position(&username).is_some() {
            return Err(GameError::DuplicateUsername(username.to_string()));
        }
        self.points.push(PlayerScore { username, score: 0 });
        Ok(())
    }

    /// Renames a player in place, keeping their points and roster slot.
    pub fn change_username(
        &mut self,
        old: &Username,
        new: Username,
    ) -> Result<(), GameError> {
        self.require_open_roster()?;
        let idx = self
            .position(old)
            .ok_or_else(|| GameError::UnknownUsername(old.to_string()))?;
        if self.position(&new).is_some() {
            return Err(GameError::DuplicateUsername(new.to_string()));
        }
        self.points[idx].username = new;
        Ok(())
    }

    pub fn remove_player(&mut self, username: &Username) -> Result<(), GameError> {
        self.require_open_roster()?;
        let idx = self
            .position(username)
            .ok_or_else(|| GameError::UnknownUsername(username.to_string()))?;
        self.points.remove(idx);
        Ok(())
    }

    /// The roster is frozen once the game starts or is finished, even if
    /// it finished without ever starting.
    fn require_open_roster(&self) -> Result<(), GameError> {
        if self.is_started() {
            return Err(GameError::AlreadyStarted);
        }
        if self.is_finished() {
            return Err(GameError::AlreadyFinished);
        }
        Ok(())
    }

    fn position(&self, username: &Username) -> Option<usize> {
        self.points.iter().position(|p| &p.username == username)
    }

    pub fn has_player(&self, username: &Username) -> bool {
        self.position(username).is_some()
    }

    /// Usernames in join order.
    pub fn players(&self) -> impl Iterator<Item = &Username> {
        self.points.iter().map(|p| &p.username)
    }

    pub fn player_count(&self) -> usize {
        self.points.len()
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Changes round timing. Only allowed before the game starts.
    pub fn update_settings(&mut self, settings: RoundSettings) -> Result<(), GameError> {
        if self.is_started() {
            return Err(GameError::AlreadyStarted);
        }
        if self.is_finished() {
            return Err(GameError::AlreadyFinished);
        }
        settings.validate()?;
        self.settings = settings;
        Ok(())
    }

    /// Starts the game and its first round.
    pub fn start(&mut self) -> Result<(), GameError> {
        if self.is_started() {
            return Err(GameError::AlreadyStarted);
        }
        if self.is_finished() {
            return Err(GameError::AlreadyFinished);
        }
        if self.points.is_empty() {
            return Err(GameError::NoPlayers);
        }
        if self.quiz.questions.is_empty() {
            return Err(GameError::EmptyQuiz);
        }
        self.settings.validate()?;
        // The game only counts as started once its first round is running.
        self.open_round(0)?;
        self.started_at = Some(SystemTime::now());
        Ok(())
    }

    /// Starts the round after the current one.
    pub fn start_next_round(&mut self) -> Result<(), GameError> {
        if self.is_finished() {
            return Err(GameError::AlreadyFinished);
        }
        let next = self.current_round_idx.map_or(0, |idx| idx + 1);
        if next >= self.quiz.questions.len() {
            return Err(GameError::NoMoreQuestions);
        }
        self.start_round(next)
    }

    /// Starts the round for question `idx` with the current roster.
    ///
    /// Fails if the previous round is still live or its results have not
    /// been applied yet.
    pub fn start_round(&mut self, idx: usize) -> Result<(), GameError> {
        if self.is_finished() {
            return Err(GameError::AlreadyFinished);
        }
        if !self.is_started() {
            return Err(GameError::NotStarted);
        }
        if let Some(round) = &self.current_round {
            if !round.is_ended() {
                return Err(GameError::RoundInProgress);
            }
            if self.applied_results.is_none() {
                return Err(GameError::ResultsPending);
            }
        }
        self.open_round(idx)
    }

    fn open_round(&mut self, idx: usize) -> Result<(), GameError> {
        let question = self
            .quiz
            .question(idx)
            .cloned()
            .ok_or(GameError::NoMoreQuestions)?;

        let round = Round::new(self.players().cloned(), question, self.settings);
        round.start()?;
        debug!(question = idx, players = self.points.len(), "round started");
        self.current_round = Some(round);
        self.current_round_idx = Some(idx);
        self.applied_results = None;
        Ok(())
    }

    pub fn finish_round_early(&self) -> Result<(), GameError> {
        self.current_round
            .as_ref()
            .ok_or(GameError::NotInRound)?
            .finish_early()
    }

    /// Adds the ended round's points to the cumulative scores.
    ///
    /// # Errors
    /// - [`GameError::NotInRound`] if no round was ever started.
    /// - [`GameError::NotEnded`] if the round is still live.
    /// - [`GameError::ResultsAlreadyApplied`] on a second call for the
    ///   same round.
    pub fn apply_round_results(&mut self) -> Result<&[RoundScore], GameError> {
        let round = self.current_round.as_ref().ok_or(GameError::NotInRound)?;
        if self.applied_results.is_some() {
            return Err(GameError::ResultsAlreadyApplied);
        }
        let results = round.results()?;
        for result in &results {
            if let Some(entry) =
                self.points.iter_mut().find(|p| p.username == result.username)
            {
                entry.score += u64::from(result.points);
            }
        }
        let applied = self.applied_results.insert(results);
        Ok(applied.as_slice())
    }

    pub fn finish(&mut self) -> Result<(), GameError> {
        if self.is_finished() {
            return Err(GameError::AlreadyFinished);
        }
        self.ended_at = Some(SystemTime::now());
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Cumulative scores, highest first; ties keep join order.
    pub fn leaderboard(&self) -> Vec<PlayerScore> {
        let mut board = self.points.clone();
        board.sort_by_key(|p| Reverse(p.score));
        board
    }

    pub fn score_of(&self, username: &Username) -> Option<u64> {
        self.points
            .iter()
            .find(|p| &p.username == username)
            .map(|p| p.score)
    }

    /// Points `username` earned in the last applied round.
    pub fn round_points_of(&self, username: &Username) -> u32 {
        self.applied_results
            .iter()
            .flatten()
            .find(|r| &r.username == username)
            .map_or(0, |r| r.points)
    }

    pub fn round_results_applied(&self) -> bool {
        self.applied_results.is_some()
    }

    pub fn is_started(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn is_finished(&self) -> bool {
        self.ended_at.is_some()
    }

    /// Whether a round is currently live.
    pub fn in_round(&self) -> bool {
        self.current_round.as_ref().is_some_and(|r| !r.is_ended())
    }

    /// Whether the current question is the quiz's last.
    pub fn is_last_round(&self) -> bool {
        self.current_round_idx
            .is_some_and(|idx| idx + 1 >= self.quiz.questions.len())
    }

    pub fn current_round(&self) -> Option<&Round> {
        self.current_round.as_ref()
    }

    /// `None` before the first round (the "-1" state).
    pub fn current_round_idx(&self) -> Option<usize> {
        self.current_round_idx
    }

    pub fn quiz(&self) -> &Quiz {
        &self.quiz
    }

    pub fn settings(&self) -> RoundSettings {
        self.settings
    }

    pub fn started_at(&self) -> Option<SystemTime> {
        self.started_at
    }

    pub fn ended_at(&self) -> Option<SystemTime> {
        self.ended_at
    }
}
