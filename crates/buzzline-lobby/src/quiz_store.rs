//! Read access to quizzes.
//!
//! Quiz authoring lives elsewhere. A lobby only needs one immutable
//! snapshot of a quiz, fetched when the lobby is created.

use std::collections::HashMap;
use std::fmt;
use std::sync::{PoisonError, RwLock};

use buzzline_game::Quiz;
use serde::{Deserialize, Serialize};

use crate::QuizStoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuizId(pub u64);

impl fmt::Display for QuizId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Q-{}", self.0)
    }
}

/// Source of quizzes for new lobbies.
pub trait QuizStore: Send + Sync + 'static {
    /// Returns a snapshot of the quiz. Later edits to the stored quiz do
    /// not reach lobbies that already fetched it.
    fn get_quiz(
        &self,
        id: QuizId,
    ) -> impl std::future::Future<Output = Result<Quiz, QuizStoreError>> + Send;
}

/// Process-local [`QuizStore`], filled at startup.
#[derive(Debug, Default)]
pub struct InMemoryQuizStore {
    quizzes: RwLock<HashMap<QuizId, Quiz>>,
}

impl InMemoryQuizStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores (or replaces) a quiz after checking that every question has
    /// a correct answer.
    pub fn insert(&self, id: QuizId, quiz: Quiz) -> Result<(), QuizStoreError> {
        quiz.validate()?;
        self.quizzes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, quiz);
        Ok(())
    }
}

impl QuizStore for InMemoryQuizStore {
    async fn get_quiz(&self, id: QuizId) -> Result<Quiz, QuizStoreError> {
        self.quizzes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
            .ok_or(QuizStoreError::NotFound(id))
    }
}
