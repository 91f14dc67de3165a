//! The quiz a game is played over, and player usernames.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::GameError;

// ---------------------------------------------------------------------------
// Quiz
// ---------------------------------------------------------------------------

/// An ordered list of multiple-choice questions.
///
/// A lobby receives its quiz from the quiz store once, at creation, and
/// treats it as immutable from then on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quiz {
    pub title: String,
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub text: String,
    pub answers: Vec<Answer>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    pub is_correct: bool,
}

impl Quiz {
    /// Checks that every question has at least one correct answer.
    ///
    /// An empty question list is allowed here; starting a game over it
    /// fails with [`GameError::EmptyQuiz`] instead.
    pub fn validate(&self) -> Result<(), GameError> {
        for (idx, question) in self.questions.iter().enumerate() {
            if !question.answers.iter().any(|a| a.is_correct) {
                return Err(GameError::InvalidQuiz(format!(
                    "question {idx} has no correct answer"
                )));
            }
        }
        Ok(())
    }

    /// Returns the question at `idx`, if any.
    pub fn question(&self, idx: usize) -> Option<&Question> {
        self.questions.get(idx)
    }
}

impl Question {
    /// Whether `idx` names a correct answer. Out-of-range is `false`.
    pub fn is_correct(&self, idx: usize) -> bool {
        self.answers.get(idx).is_some_and(|a| a.is_correct)
    }
}

// ---------------------------------------------------------------------------
// Username
// ---------------------------------------------------------------------------

/// Longest username accepted, in characters.
pub const MAX_USERNAME_CHARS: usize = 40;

/// Display name the host is shown under. Players may not take it.
pub const HOST_USERNAME: &str = "HOST";

/// A validated player name.
///
/// Construction trims surrounding whitespace, then rejects empty names,
/// names over [`MAX_USERNAME_CHARS`] characters, and the reserved
/// [`HOST_USERNAME`] (in any letter case).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Username(String);

impl Username {
    pub fn new(name: &str) -> Result<Self, GameError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(GameError::InvalidUsername(
                "Username cannot be empty".into(),
            ));
        }
        if name.chars().count() > MAX_USERNAME_CHARS {
            return Err(GameError::InvalidUsername(format!(
                "Username cannot be longer than {MAX_USERNAME_CHARS} characters"
            )));
        }
        if name.eq_ignore_ascii_case(HOST_USERNAME) {
            return Err(GameError::InvalidUsername(format!(
                "{HOST_USERNAME} is reserved"
            )));
        }
        Ok(Self(name.to_owned()))
    }

    /// The host's fixed name. Never enters a game's roster.
    pub fn host() -> Self {
        Self(HOST_USERNAME.to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
