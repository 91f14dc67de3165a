//! Outbound view values.
//!
//! A lobby never renders anything. After each state change it decides
//! which [`ViewBlob`] each client should see and hands those values to the
//! transport, which encodes them (see [`Codec`](crate::Codec)). Tests can
//! therefore assert on views directly.
//!
//! On the wire a blob is adjacently tagged:
//!
//! ```json
//! { "view": "waiting-room", "data": { "lobby": { ... }, "user": { ... } } }
//! ```

use serde::{Deserialize, Serialize};

use crate::{LobbyPhase, Pin};

// ---------------------------------------------------------------------------
// ViewBlob
// ---------------------------------------------------------------------------

/// One unit of UI pushed to one client.
///
/// The first five variants are full views. The last three are inline
/// fragments that patch part of a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "view", content = "data", rename_all = "kebab-case")]
pub enum ViewBlob {
    ChooseUsername(ViewData),
    WaitingRoom(ViewData),
    Question(ViewData),
    Answer(ViewData),
    FinalResults(FinalResultsData),
    /// Inline error shown to the client whose command failed.
    ErrorAlert(ErrorAlert),
    /// The answer buttons re-rendered for the player who just answered.
    AnswerOptions(ViewData),
    /// How many players still have to answer.
    PlayerCount(PlayerCount),
}

impl ViewBlob {
    /// The wire name of the view or fragment.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ChooseUsername(_) => "choose-username",
            Self::WaitingRoom(_) => "waiting-room",
            Self::Question(_) => "question",
            Self::Answer(_) => "answer",
            Self::FinalResults(_) => "final-results",
            Self::ErrorAlert(_) => "error-alert",
            Self::AnswerOptions(_) => "answer-options",
            Self::PlayerCount(_) => "player-count",
        }
    }

    /// Builds an `error-alert` fragment.
    pub fn error(message: impl Into<String>) -> Self {
        Self::ErrorAlert(ErrorAlert { message: message.into() })
    }

    /// Whether this is one of the five full views.
    pub fn is_full_view(&self) -> bool {
        !matches!(
            self,
            Self::ErrorAlert(_) | Self::AnswerOptions(_) | Self::PlayerCount(_)
        )
    }
}

// ---------------------------------------------------------------------------
// View payloads
// ---------------------------------------------------------------------------

/// The `{lobby, user}` pair every full view carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewData {
    pub lobby: LobbySnapshot,
    pub user: UserSnapshot,
}

/// `FinalResults` data: the usual pair plus the archive's id for the game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalResultsData {
    pub past_game_id: u64,
    #[serde(flatten)]
    pub view: ViewData,
}

/// A point-in-time copy of the lobby state a client is allowed to see.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LobbySnapshot {
    pub pin: Pin,
    pub phase: LobbyPhase,
    pub quiz_title: String,
    pub question_count: usize,
    /// Usernames of players, in join order. The host is not listed.
    pub players: Vec<String>,
    pub reading_time_ms: u64,
    pub answer_time_ms: u64,
    pub current_question: Option<QuestionSnapshot>,
    /// Usernames that have not answered the live question yet.
    pub still_answering: Vec<String>,
    /// Cumulative scores, highest first.
    pub leaderboard: Vec<ScoreEntry>,
}

/// The question of the current round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionSnapshot {
    pub index: usize,
    pub text: String,
    pub answers: Vec<AnswerSnapshot>,
    pub is_last: bool,
}

/// One answer option. `is_correct` is `None` while the round is live so
/// clients cannot read the solution out of the payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerSnapshot {
    pub text: String,
    pub is_correct: Option<bool>,
}

/// A leaderboard row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreEntry {
    pub username: String,
    pub score: u64,
    /// Points earned in the most recently revealed round.
    pub round_points: u32,
}

/// What the receiving client needs to know about itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSnapshot {
    /// Empty until the player picks a name; `HOST` for the host.
    pub username: String,
    pub is_host: bool,
    /// Index the player chose in the current round, if any.
    pub chosen_answer: Option<usize>,
    pub score: u64,
    pub round_points: u32,
}

// ---------------------------------------------------------------------------
// Fragment payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorAlert {
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerCount {
    pub still_answering: usize,
    pub total: usize,
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_data() -> ViewData {
        ViewData {
            lobby: LobbySnapshot {
                pin: Pin::new(42).unwrap(),
                phase: LobbyPhase::WaitingForPlayers,
                quiz_title: "Capitals".into(),
                question_count: 2,
                players: vec!["Alice".into()],
                reading_time_ms: 5_000,
                answer_time_ms: 30_000,
                current_question: None,
                still_answering: vec![],
                leaderboard: vec![],
            },
            user: UserSnapshot {
                username: "Alice".into(),
                is_host: false,
                chosen_answer: None,
                score: 0,
                round_points: 0,
            },
        }
    }

    #[test]
    fn test_view_blob_json_is_adjacently_tagged() {
        let json = serde_json::to_value(ViewBlob::WaitingRoom(sample_data())).unwrap();
        assert_eq!(json["view"], "waiting-room");
        assert_eq!(json["data"]["lobby"]["pin"], "0042");
        assert_eq!(json["data"]["lobby"]["phase"], "waiting-for-players");
        assert_eq!(json["data"]["user"]["username"], "Alice");
    }

    #[test]
    fn test_view_blob_tag_matches_name() {
        let blobs = [
            ViewBlob::ChooseUsername(sample_data()),
            ViewBlob::Question(sample_data()),
            ViewBlob::FinalResults(FinalResultsData { past_game_id: 1, view: sample_data() }),
            ViewBlob::error("boom"),
            ViewBlob::PlayerCount(PlayerCount { still_answering: 1, total: 2 }),
        ];
        for blob in blobs {
            let json = serde_json::to_value(&blob).unwrap();
            assert_eq!(json["view"], blob.name());
        }
    }

    #[test]
    fn test_final_results_flattens_view_data() {
        let blob = ViewBlob::FinalResults(FinalResultsData {
            past_game_id: 17,
            view: sample_data(),
        });
        let json = serde_json::to_value(&blob).unwrap();
        assert_eq!(json["data"]["past_game_id"], 17);
        assert_eq!(json["data"]["lobby"]["quiz_title"], "Capitals");
    }

    #[test]
    fn test_error_alert_payload() {
        let json = serde_json::to_value(ViewBlob::error("Game already started")).unwrap();
        assert_eq!(json["view"], "error-alert");
        assert_eq!(json["data"]["message"], "Game already started");
    }

    #[test]
    fn test_is_full_view_excludes_fragments() {
        assert!(ViewBlob::Answer(sample_data()).is_full_view());
        assert!(!ViewBlob::error("x").is_full_view());
        assert!(!ViewBlob::AnswerOptions(sample_data()).is_full_view());
    }
}
