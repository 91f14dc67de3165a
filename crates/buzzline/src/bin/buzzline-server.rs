//! Runs a Buzzline server with one demo quiz and one open lobby.
//!
//! Configuration comes from `BUZZLINE_BIND`, `BUZZLINE_READING_SECS`, and
//! `BUZZLINE_ANSWER_SECS`; logging from `RUST_LOG`.

use std::sync::Arc;

use buzzline::prelude::*;

const DEMO_QUIZ: QuizId = QuizId(1);

fn demo_quiz() -> Quiz {
    let question = |text: &str, answers: &[(&str, bool)]| Question {
        text: text.into(),
        answers: answers
            .iter()
            .map(|&(text, is_correct)| Answer { text: text.into(), is_correct })
            .collect(),
    };

    Quiz {
        title: "Warm-up".into(),
        questions: vec![
            question("2 + 2 = ?", &[("4", true), ("5", false), ("22", false)]),
            question(
                "Which planet is closest to the Sun?",
                &[("Venus", false), ("Mercury", true), ("Mars", false)],
            ),
            question(
                "Which of these are prime?",
                &[("7", true), ("9", false), ("11", true)],
            ),
        ],
    }
}

#[tokio::main]
async fn main() -> Result<(), BuzzlineError> {
    buzzline::setup_logger("info");

    let config = ServerConfig::from_env()?;
    let quizzes = InMemoryQuizStore::new();
    quizzes.insert(DEMO_QUIZ, demo_quiz())?;

    let server = BuzzlineServerBuilder::new()
        .config(config)
        .build(quizzes, Arc::new(InMemoryArchive::new()))
        .await?;
    let lobby = server.create_lobby(DEMO_QUIZ, None).await?;
    tracing::info!(
        addr = %server.local_addr()?,
        pin = %lobby.pin(),
        "demo lobby ready; connect to /lobbies/<pin>/ws?client_id=<id>"
    );

    server.run().await
}
