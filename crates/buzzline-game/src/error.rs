//! Error types for rounds and games.
//!
//! Each variant is a distinct kind the lobby can match on. The `Display`
//! text doubles as the message shown to players in an error alert, so it
//! is written for people, not for logs.

/// Errors returned by [`Round`](crate::Round) and [`Game`](crate::Game).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    // -- Lifecycle ----------------------------------------------------------
    #[error("Game already started")]
    AlreadyStarted,

    #[error("Game already finished")]
    AlreadyFinished,

    /// The round was already ended, by its deadline or by an earlier
    /// early finish.
    #[error("Round already ended")]
    AlreadyEnded,

    #[error("Round has not started")]
    NotStarted,

    #[error("Round has not ended yet")]
    NotEnded,

    #[error("No more questions")]
    NoMoreQuestions,

    #[error("Not enough players")]
    NoPlayers,

    #[error("Quiz has no questions")]
    EmptyQuiz,

    #[error("Invalid quiz: {0}")]
    InvalidQuiz(String),

    #[error("Invalid round settings: {0}")]
    InvalidSettings(String),

    /// A new round was requested while the current one is still live.
    #[error("A round is still in progress")]
    RoundInProgress,

    /// The current round's points were already added to the scores.
    #[error("Round results were already applied")]
    ResultsAlreadyApplied,

    /// The ended round's points have not been added to the scores yet.
    #[error("Round results have not been applied")]
    ResultsPending,

    /// There is no current round (game not started, or between games).
    #[error("No round in progress")]
    NotInRound,

    // -- Membership ---------------------------------------------------------
    #[error("Username already in the lobby: {0}")]
    DuplicateUsername(String),

    #[error("Unknown username: {0}")]
    UnknownUsername(String),

    #[error("{0} is not playing in this round")]
    NotAPlayer(String),

    #[error("Invalid username: {0}")]
    InvalidUsername(String),

    // -- Timing -------------------------------------------------------------
    #[error("Answering has not opened yet")]
    BeforeAnsweringOpens,

    #[error("Round has ended")]
    AfterRoundEnded,

    #[error("You have already answered")]
    AlreadyAnswered,

    /// The chosen index is outside the question's answer list.
    #[error("Answer {0} does not exist")]
    InvalidAnswer(usize),
}
