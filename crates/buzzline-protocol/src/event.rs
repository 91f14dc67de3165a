//! Inbound frames and the closed set of lobby events.
//!
//! Clients send htmx-style JSON frames: a `HEADERS` object naming the
//! element that fired, plus any form fields at the top level.
//!
//! ```json
//! {
//!   "HEADERS": { "HX-Trigger-Name": "answer", "HX-Trigger": "answer-q0-a2" },
//!   "username": "Alice"
//! }
//! ```
//!
//! [`LobbyEvent::parse`] turns such a frame into a typed [`LobbyEvent`].
//! Parsing never produces [`LobbyEvent::ShowAnswerRequested`]: that event
//! is raised internally when a round ends.

use serde::Deserialize;

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Trigger names
// ---------------------------------------------------------------------------

/// Trigger names recognized in the `HX-Trigger-Name` header.
pub mod trigger {
    pub const NEW_USERNAME_FORM: &str = "new-username-form";
    pub const CHANGE_USERNAME_BTN: &str = "change-username-btn";
    pub const START_GAME_BTN: &str = "start-game-btn";
    pub const ANSWER: &str = "answer";
    pub const SKIP_TO_ANSWER_BTN: &str = "skip-to-answer-btn";
    pub const NEXT_QUESTION_BTN: &str = "next-question-btn";
    pub const FINISH_GAME_BTN: &str = "finish-game-btn";
}

// ---------------------------------------------------------------------------
// LobbyEvent
// ---------------------------------------------------------------------------

/// Every event a lobby handles.
///
/// Seven arrive from clients; [`ShowAnswerRequested`](Self::ShowAnswerRequested)
/// comes from the round-end waiter. Because the set is closed, the lobby's
/// dispatcher matches on it exhaustively and the host/player/system gate
/// for each variant is checked by the compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LobbyEvent {
    /// A player submitted the username form.
    UsernameSubmitted { username: String },
    /// A player wants to go back to the username form.
    ChangeUsernameRequested,
    /// The host pressed start.
    StartGameRequested,
    /// A player picked an answer for a question.
    AnswerSubmitted { question_idx: usize, answer_idx: usize },
    /// The host cut the current round short.
    SkipToAnswerRequested,
    /// Internal: the current round ended, reveal the answer.
    ShowAnswerRequested,
    /// The host asked for the next question.
    NextQuestionRequested,
    /// The host ended the game.
    EndGameRequested,
}

impl LobbyEvent {
    /// Parses one inbound frame.
    ///
    /// # Errors
    /// - [`ProtocolError::MalformedFrame`] if the bytes are not a JSON
    ///   object with `HEADERS`, or the payload does not fit the trigger.
    /// - [`ProtocolError::UnknownEvent`] if the trigger name is not one of
    ///   the names in [`trigger`].
    pub fn parse(data: &[u8]) -> Result<Self, ProtocolError> {
        let frame: Frame = serde_json::from_slice(data)
            .map_err(|e| ProtocolError::MalformedFrame(e.to_string()))?;
        let name = frame.headers.trigger_name.unwrap_or_default();

        match name.as_str() {
            trigger::NEW_USERNAME_FORM => {
                let username = frame.username.ok_or_else(|| {
                    ProtocolError::MalformedFrame(
                        "new-username-form without a username field".into(),
                    )
                })?;
                Ok(Self::UsernameSubmitted { username })
            }
            trigger::CHANGE_USERNAME_BTN => Ok(Self::ChangeUsernameRequested),
            trigger::START_GAME_BTN => Ok(Self::StartGameRequested),
            trigger::ANSWER => {
                let id = frame.headers.trigger.unwrap_or_default();
                let (question_idx, answer_idx) = parse_answer_id(&id)?;
                Ok(Self::AnswerSubmitted { question_idx, answer_idx })
            }
            trigger::SKIP_TO_ANSWER_BTN => Ok(Self::SkipToAnswerRequested),
            trigger::NEXT_QUESTION_BTN => Ok(Self::NextQuestionRequested),
            trigger::FINISH_GAME_BTN => Ok(Self::EndGameRequested),
            _ => Err(ProtocolError::UnknownEvent(name)),
        }
    }

    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::UsernameSubmitted { .. } => "UsernameSubmitted",
            Self::ChangeUsernameRequested => "ChangeUsernameRequested",
            Self::StartGameRequested => "StartGameRequested",
            Self::AnswerSubmitted { .. } => "AnswerSubmitted",
            Self::SkipToAnswerRequested => "SkipToAnswerRequested",
            Self::ShowAnswerRequested => "ShowAnswerRequested",
            Self::NextQuestionRequested => "NextQuestionRequested",
            Self::EndGameRequested => "EndGameRequested",
        }
    }
}

/// Parses `answer-q<question>-a<answer>` into its two indices.
fn parse_answer_id(id: &str) -> Result<(usize, usize), ProtocolError> {
    let malformed = || {
        ProtocolError::MalformedFrame(format!(
            "answer trigger {id:?} is not answer-q<N>-a<M>"
        ))
    };
    let rest = id.strip_prefix("answer-q").ok_or_else(malformed)?;
    let (question, answer) = rest.split_once("-a").ok_or_else(malformed)?;
    let question = question.parse().map_err(|_| malformed())?;
    let answer = answer.parse().map_err(|_| malformed())?;
    Ok((question, answer))
}

// ---------------------------------------------------------------------------
// Wire shape
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Frame {
    #[serde(rename = "HEADERS")]
    headers: FrameHeaders,
    #[serde(default, alias = "Username")]
    username: Option<String>,
}

/// Only the two headers we dispatch on; htmx also sends `HX-Current-URL`,
/// `HX-Request`, and `HX-Target`, which serde skips.
#[derive(Debug, Deserialize)]
struct FrameHeaders {
    #[serde(rename = "HX-Trigger-Name", default)]
    trigger_name: Option<String>,
    #[serde(rename = "HX-Trigger", default)]
    trigger: Option<String>,
}

// ===========================================================================
// Tests
// ===========================================================================
