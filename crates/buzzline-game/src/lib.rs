//! Quiz rounds and games for Buzzline.
//!
//! - [`Round`] is one timed question. It accepts answers inside its window,
//!   ends on a deadline or early, scores by answer latency.
//! - [`Game`] is a sequence of rounds over a [`Quiz`], with a roster and
//!   cumulative points.
//!
//! Neither type knows about connections or views. The lobby crate drives
//! them under its own lock.
//!
//! # Timing
//!
//! Rounds read the clock through `tokio::time::Instant`, so tests can run
//! on a paused runtime and step time with `tokio::time::advance`:
//!
//! ```ignore
//! #[tokio::test(start_paused = true)]
//! async fn answers_open_after_reading() {
//!     round.start()?;
//!     tokio::time::advance(settings.reading_time).await;
//!     round.submit_answer(&alice, 0)?;
//! }
//! ```

mod error;
mod game;
mod quiz;
mod round;
mod settings;

pub use error::GameError;
pub use game::{Game, PlayerScore};
pub use quiz::{Answer, HOST_USERNAME, MAX_USERNAME_CHARS, Question, Quiz, Username};
pub use round::{
    FULL_POINTS_WINDOW, FinishedSignal, MAX_POINTS, Round, RoundPhase, RoundScore,
    Submission, score_for,
};
pub use settings::RoundSettings;
