//! A single timed question.
//!
//! # Lifecycle
//!
//! ```text
//! Pending ──start()──→ Running ──deadline / finish_early()──→ Ended
//! ```
//!
//! `start()` spawns a deadline task that sleeps until
//! `start + reading_time + answer_time`. Whichever comes first, the
//! deadline or [`Round::finish_early`], ends the round; the other path
//! sees [`GameError::AlreadyEnded`] and does nothing. Ending the round
//! flips the [`FinishedSignal`], which also wakes the deadline task so it
//! drops its timer instead of sleeping out the full duration.
//!
//! # Locking
//!
//! A `Round` is shared (`Clone` is an `Arc` bump) between the game and the
//! deadline task. Its internal mutex only settles the deadline-versus-early
//! race; callers are expected to hold the lobby lock for everything else.

use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::{GameError, Question, RoundSettings, Username};

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

/// Points for a correct answer inside [`FULL_POINTS_WINDOW`].
pub const MAX_POINTS: u32 = 1000;

/// Correct answers faster than this (measured from when answering opens)
/// get [`MAX_POINTS`]. The comparison is strict: exactly 500 ms already
/// decays.
pub const FULL_POINTS_WINDOW: Duration = Duration::from_millis(500);

/// Points for a correct answer submitted `elapsed` after answering opened.
///
/// `floor((1 - elapsed / (2 * answer_time)) * 1000)`, clamped at zero.
/// Computed in integer nanoseconds so boundary values are exact.
pub fn score_for(elapsed: Duration, answer_time: Duration) -> u32 {
    if elapsed < FULL_POINTS_WINDOW {
        return MAX_POINTS;
    }
    let window = answer_time.as_nanos() * 2;
    let elapsed = elapsed.as_nanos();
    if elapsed >= window {
        return 0;
    }
    // floor(1000 * (2A - t) / 2A); always in 0..=1000.
    (u128::from(MAX_POINTS) * (window - elapsed) / window) as u32
}

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Where a round is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundPhase {
    Pending,
    Running,
    Ended,
}

/// One recorded answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Submission {
    pub answer_idx: usize,
    pub submitted_at: Instant,
}

/// A player's points for one round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundScore {
    pub username: Username,
    pub points: u32,
}

/// Completion signal for a round.
///
/// Any number of these can be taken from one round, and all of them are
/// released when it ends. A signal taken after the round ended resolves
/// immediately.
#[derive(Debug, Clone)]
pub struct FinishedSignal {
    rx: watch::Receiver<bool>,
}

impl FinishedSignal {
    /// Waits until the round has ended.
    pub async fn wait(&mut self) {
        // Err only means the round itself was dropped, which also ends
        // any interest in it.
        let _ = self.rx.wait_for(|ended| *ended).await;
    }

    pub fn is_finished(&self) -> bool {
        *self.rx.borrow()
    }
}

// ---------------------------------------------------------------------------
// Round
// ---------------------------------------------------------------------------

/// The timed contest for one question.
#[derive(Debug, Clone)]
pub struct Round {
    inner: Arc<RoundInner>,
}

#[derive(Debug)]
struct RoundInner {
    question: Question,
    settings: RoundSettings,
    players: Vec<Username>,
    state: Mutex<RoundState>,
    finished: watch::Sender<bool>,
}

#[derive(Debug, Default)]
struct RoundState {
    start_at: Option<Instant>,
    ended_at: Option<Instant>,
    answers: HashMap<Username, Submission>,
}

impl RoundInner {
    fn lock(&self) -> MutexGuard<'_, RoundState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The single transition into `Ended`, shared by both finishing paths.
    fn end(&self) -> Result<(), GameError> {
        {
            let mut state = self.lock();
            if state.ended_at.is_some() {
                return Err(GameError::AlreadyEnded);
            }
            state.ended_at = Some(Instant::now());
        }
        self.finished.send_replace(true);
        Ok(())
    }
}

impl Round {
    /// Creates a round in the `Pending` phase.
    pub fn new(
        players: impl IntoIterator<Item = Username>,
        question: Question,
        settings: RoundSettings,
    ) -> Self {
        let (finished, _) = watch::channel(false);
        Self {
            inner: Arc::new(RoundInner {
                question,
                settings,
                players: players.into_iter().collect(),
                state: Mutex::new(RoundState::default()),
                finished,
            }),
        }
    }

    /// Starts the round and arms its deadline.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) -> Result<(), GameError> {
        let deadline = {
            let mut state = self.inner.lock();
            if state.start_at.is_some() {
                return Err(GameError::AlreadyStarted);
            }
            if state.ended_at.is_some() {
                return Err(GameError::AlreadyEnded);
            }
            let now = Instant::now();
            let deadline = now
                .checked_add(self.inner.settings.total())
                .ok_or_else(|| GameError::InvalidSettings("round deadline out of range".into()))?;
            state.start_at = Some(now);
            deadline
        };

        let inner = Arc::clone(&self.inner);
        let mut finished = self.finished_signal();
        tokio::spawn(async move {
            tokio::select! {
                () = tokio::time::sleep_until(deadline) => {
                    if inner.end().is_ok() {
                        debug!(question = %inner.question.text, "round deadline reached");
                    }
                }
                () = finished.wait() => {
                    trace!("round ended early, deadline dropped");
                }
            }
        });
        Ok(())
    }

    /// Ends the round now.
    ///
    /// # Errors
    /// [`GameError::AlreadyEnded`] if the deadline or another call got
    /// there first. A round that was never started can still be ended.
    pub fn finish_early(&self) -> Result<(), GameError> {
        self.inner.end()
    }

    /// Records `username`'s answer.
    ///
    /// Answers are accepted only in `[start + reading_time, ended_at)`.
    /// The reading window is checked first, so an answer sent while
    /// reading still gets `BeforeAnsweringOpens` after an early finish.
    /// Past the deadline an answer is rejected even if the deadline task
    /// has not run yet.
    pub fn submit_answer(
        &self,
        username: &Username,
        answer_idx: usize,
    ) -> Result<(), GameError> {
        if !self.inner.players.contains(username) {
            return Err(GameError::NotAPlayer(username.to_string()));
        }
        let mut state = self.inner.lock();
        let Some(start_at) = state.start_at else {
            return Err(GameError::NotStarted);
        };
        let now = Instant::now();
        let settings = &self.inner.settings;
        if now < start_at + settings.reading_time {
            return Err(GameError::BeforeAnsweringOpens);
        }
        if state.ended_at.is_some() || now >= start_at + settings.total() {
            return Err(GameError::AfterRoundEnded);
        }
        if state.answers.contains_key(username) {
            return Err(GameError::AlreadyAnswered);
        }
        if answer_idx >= self.inner.question.answers.len() {
            return Err(GameError::InvalidAnswer(answer_idx));
        }
        state.answers.insert(
            username.clone(),
            Submission { answer_idx, submitted_at: now },
        );
        Ok(())
    }

    /// Returns a fresh completion signal.
    pub fn finished_signal(&self) -> FinishedSignal {
        FinishedSignal { rx: self.inner.finished.subscribe() }
    }

    /// Points for every player, highest first. Equal points keep roster
    /// order.
    pub fn results(&self) -> Result<Vec<RoundScore>, GameError> {
        let state = self.inner.lock();
        if state.ended_at.is_none() {
            return Err(GameError::NotEnded);
        }
        let opens_at =
            state.start_at.map(|s| s + self.inner.settings.reading_time);

        let mut scores: Vec<RoundScore> = self
            .inner
            .players
            .iter()
            .map(|username| {
                let points = match (state.answers.get(username), opens_at) {
                    (Some(sub), Some(opens_at))
                        if self.inner.question.is_correct(sub.answer_idx) =>
                    {
                        score_for(
                            sub.submitted_at.saturating_duration_since(opens_at),
                            self.inner.settings.answer_time,
                        )
                    }
                    _ => 0,
                };
                RoundScore { username: username.clone(), points }
            })
            .collect();
        scores.sort_by_key(|s| Reverse(s.points));
        Ok(scores)
    }

    /// Players who have not answered yet, in roster order.
    pub fn still_answering(&self) -> Vec<Username> {
        let state = self.inner.lock();
        self.inner
            .players
            .iter()
            .filter(|p| !state.answers.contains_key(*p))
            .cloned()
            .collect()
    }

    pub fn answer_of(&self, username: &Username) -> Option<Submission> {
        self.inner.lock().answers.get(username).copied()
    }

    pub fn phase(&self) -> RoundPhase {
        let state = self.inner.lock();
        match (state.start_at, state.ended_at) {
            (_, Some(_)) => RoundPhase::Ended,
            (Some(_), None) => RoundPhase::Running,
            (None, None) => RoundPhase::Pending,
        }
    }

    pub fn is_ended(&self) -> bool {
        self.phase() == RoundPhase::Ended
    }

    pub fn started_at(&self) -> Option<Instant> {
        self.inner.lock().start_at
    }

    pub fn ended_at(&self) -> Option<Instant> {
        self.inner.lock().ended_at
    }

    pub fn question(&self) -> &Question {
        &self.inner.question
    }

    pub fn players(&self) -> &[Username] {
        &self.inner.players
    }

    pub fn settings(&self) -> RoundSettings {
        self.inner.settings
    }
}
