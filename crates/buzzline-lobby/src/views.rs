//! Picking and building the view each client should see.

use std::time::Duration;

use buzzline_protocol::{
    AnswerSnapshot, FinalResultsData, LobbyPhase, LobbySnapshot, PlayerCount,
    QuestionSnapshot, ScoreEntry, UserSnapshot, ViewBlob, ViewData,
};

use crate::lobby::{Initiator, LobbyState, Outbound, User};
use crate::{Archive, Lobby};

pub(crate) fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

impl<A: Archive> Lobby<A> {
    fn is_host(&self, user: &User) -> bool {
        self.host_id() == Some(&user.client_id)
    }

    pub(crate) fn lobby_snapshot(&self, state: &LobbyState) -> LobbySnapshot {
        let game = &state.game;
        let phase = state.phase();
        let settings = game.settings();
        let round = game.current_round();

        // Correct answers stay hidden while the round is live.
        let reveal = phase != LobbyPhase::Question;
        let current_question = round.zip(game.current_round_idx()).map(|(round, index)| {
            let question = round.question();
            QuestionSnapshot {
                index,
                text: question.text.clone(),
                answers: question
                    .answers
                    .iter()
                    .map(|a| AnswerSnapshot {
                        text: a.text.clone(),
                        is_correct: reveal.then_some(a.is_correct),
                    })
                    .collect(),
                is_last: game.is_last_round(),
            }
        });

        let still_answering = match round {
            Some(round) if game.in_round() => round
                .still_answering()
                .iter()
                .map(ToString::to_string)
                .collect(),
            _ => Vec::new(),
        };

        LobbySnapshot {
            pin: self.pin(),
            phase,
            quiz_title: game.quiz().title.clone(),
            question_count: game.quiz().questions.len(),
            players: game.players().map(ToString::to_string).collect(),
            reading_time_ms: millis(settings.reading_time),
            answer_time_ms: millis(settings.answer_time),
            current_question,
            still_answering,
            leaderboard: game
                .leaderboard()
                .into_iter()
                .map(|p| ScoreEntry {
                    round_points: game.round_points_of(&p.username),
                    username: p.username.to_string(),
                    score: p.score,
                })
                .collect(),
        }
    }

    fn user_snapshot(&self, state: &LobbyState, user: &User) -> UserSnapshot {
        let game = &state.game;
        let is_host = self.is_host(user);
        let player = user.username.as_ref().filter(|_| !is_host);

        UserSnapshot {
            username: user
                .username
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default(),
            is_host,
            chosen_answer: player.and_then(|name| {
                game.current_round()
                    .and_then(|r| r.answer_of(name))
                    .map(|s| s.answer_idx)
            }),
            score: player.and_then(|name| game.score_of(name)).unwrap_or(0),
            round_points: player.map_or(0, |name| game.round_points_of(name)),
        }
    }

    pub(crate) fn view_data(&self, state: &LobbyState, user: &User) -> ViewData {
        ViewData {
            lobby: self.lobby_snapshot(state),
            user: self.user_snapshot(state, user),
        }
    }

    /// The full view `user` should be looking at right now.
    pub(crate) fn current_view(&self, state: &LobbyState, user: &User) -> ViewBlob {
        let data = self.view_data(state, user);
        match state.phase() {
            LobbyPhase::WaitingForPlayers if !self.is_host(user) && user.username.is_none() => {
                ViewBlob::ChooseUsername(data)
            }
            LobbyPhase::WaitingForPlayers => ViewBlob::WaitingRoom(data),
            LobbyPhase::Question => ViewBlob::Question(data),
            LobbyPhase::Answer => ViewBlob::Answer(data),
            LobbyPhase::Finished => ViewBlob::FinalResults(FinalResultsData {
                past_game_id: state.past_game_id.map_or(0, |id| id.0),
                view: data,
            }),
        }
    }

    pub(crate) fn player_count(&self, state: &LobbyState) -> Option<PlayerCount> {
        let round = state.game.current_round()?;
        Some(PlayerCount {
            still_answering: round.still_answering().len(),
            total: round.players().len(),
        })
    }

    // -----------------------------------------------------------------------
    // Pushing
    // -----------------------------------------------------------------------

    pub(crate) fn push_current_view(&self, state: &LobbyState, initiator: &Initiator) {
        if let Some(user) = state.user(initiator) {
            user.send(Outbound::View(self.current_view(state, user)));
        }
    }

    pub(crate) fn push_current_view_to_all(&self, state: &LobbyState) {
        for user in state.everyone() {
            user.send(Outbound::View(self.current_view(state, user)));
        }
    }

    /// Waiting room for the host and for every player who has a name.
    /// Players still on the username form are left alone.
    pub(crate) fn push_waiting_room(&self, state: &LobbyState) {
        for user in state.everyone().filter(|u| u.username.is_some()) {
            user.send(Outbound::View(ViewBlob::WaitingRoom(self.view_data(state, user))));
        }
    }

    pub(crate) fn push_to_all(&self, state: &LobbyState, blob: &ViewBlob) {
        for user in state.everyone() {
            user.send(Outbound::View(blob.clone()));
        }
    }
}
