//! Round timing configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::GameError;

/// How long each phase of a round lasts.
///
/// A round opens with `reading_time` during which answers are rejected,
/// then accepts answers for `answer_time`. The deadline is the sum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundSettings {
    pub reading_time: Duration,
    pub answer_time: Duration,
}

impl Default for RoundSettings {
    fn default() -> Self {
        Self {
            reading_time: Duration::from_secs(5),
            answer_time: Duration::from_secs(30),
        }
    }
}

impl RoundSettings {
    /// Longest round a lobby accepts, reading and answering together.
    pub const MAX_TOTAL: Duration = Duration::from_secs(60 * 60);

    pub fn new(reading_time: Duration, answer_time: Duration) -> Self {
        Self { reading_time, answer_time }
    }

    /// Checks the settings can arm a deadline.
    ///
    /// # Errors
    /// [`GameError::InvalidSettings`] if `answer_time` is zero or the round
    /// would last longer than [`MAX_TOTAL`](Self::MAX_TOTAL).
    pub fn validate(&self) -> Result<(), GameError> {
        if self.answer_time.is_zero() {
            return Err(GameError::InvalidSettings("answer time must be positive".into()));
        }
        match self.reading_time.checked_add(self.answer_time) {
            Some(total) if total <= Self::MAX_TOTAL => Ok(()),
            _ => Err(GameError::InvalidSettings(format!(
                "a round may last at most {} s",
                Self::MAX_TOTAL.as_secs()
            ))),
        }
    }

    /// Time from round start to its deadline. Saturates instead of
    /// overflowing; [`validate`](Self::validate) keeps it in range.
    pub fn total(&self) -> Duration {
        self.reading_time.saturating_add(self.answer_time)
    }
}
