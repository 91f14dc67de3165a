//! Event handlers.
//!
//! Each handler runs with the lobby mutex held and either completes its
//! change or returns an error before touching state. Pushing views is
//! always the last step.

use std::sync::Arc;

use buzzline_game::{GameError, Username};
use buzzline_protocol::{LobbyEvent, ViewBlob};

use crate::lobby::{Initiator, LobbyState, Outbound};
use crate::{Archive, Lobby, LobbyError, PastGame};

impl<A: Archive> Lobby<A> {
    pub(crate) async fn dispatch(
        self: &Arc<Self>,
        state: &mut LobbyState,
        event: LobbyEvent,
        initiator: &Initiator,
    ) -> Result<(), LobbyError> {
        if state.past_game_id.is_some() {
            return Err(LobbyError::Finished);
        }

        match event {
            LobbyEvent::UsernameSubmitted { username } => {
                self.on_username_submitted(state, initiator, &username)
            }
            LobbyEvent::ChangeUsernameRequested => self.on_change_username(state, initiator),
            LobbyEvent::StartGameRequested => self.on_start_game(state, initiator),
            LobbyEvent::AnswerSubmitted { question_idx, answer_idx } => {
                self.on_answer_submitted(state, initiator, question_idx, answer_idx)
            }
            LobbyEvent::SkipToAnswerRequested => {
                require_host(initiator)?;
                finish_round(state)
            }
            LobbyEvent::ShowAnswerRequested => self.on_show_answer(state, initiator),
            LobbyEvent::NextQuestionRequested => {
                require_host(initiator)?;
                self.on_next_question(state).await
            }
            LobbyEvent::EndGameRequested => {
                require_host(initiator)?;
                self.end_game(state).await
            }
        }
    }

    // -----------------------------------------------------------------------
    // Waiting room
    // -----------------------------------------------------------------------

    fn on_username_submitted(
        &self,
        state: &mut LobbyState,
        initiator: &Initiator,
        raw: &str,
    ) -> Result<(), LobbyError> {
        let client_id = require_player(initiator)?;
        require_open_roster(state)?;
        let username = Username::new(raw)?;
        let current = state
            .users
            .get(client_id)
            .ok_or_else(|| LobbyError::UnknownClient(client_id.clone()))?
            .username
            .clone();

        match current {
            None => state.game.add_player(username.clone())?,
            Some(old) if old == username => {}
            Some(old) => state.game.change_username(&old, username.clone())?,
        }
        tracing::info!(pin = %self.pin(), %client_id, %username, "username set");

        if let Some(user) = state.users.get_mut(client_id) {
            user.username = Some(username);
        }
        self.push_waiting_room(state);
        Ok(())
    }

    fn on_change_username(
        &self,
        state: &LobbyState,
        initiator: &Initiator,
    ) -> Result<(), LobbyError> {
        require_player(initiator)?;
        require_open_roster(state)?;
        if let Some(user) = state.user(initiator) {
            user.send(Outbound::View(ViewBlob::ChooseUsername(self.view_data(state, user))));
        }
        Ok(())
    }

    fn on_start_game(
        self: &Arc<Self>,
        state: &mut LobbyState,
        initiator: &Initiator,
    ) -> Result<(), LobbyError> {
        require_host(initiator)?;
        state.game.start()?;
        tracing::info!(
            pin = %self.pin(),
            players = state.game.player_count(),
            questions = state.game.quiz().questions.len(),
            "game started"
        );
        self.spawn_round_waiter(state);
        self.push_current_view_to_all(state);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Rounds
    // -----------------------------------------------------------------------

    fn on_answer_submitted(
        &self,
        state: &mut LobbyState,
        initiator: &Initiator,
        question_idx: usize,
        answer_idx: usize,
    ) -> Result<(), LobbyError> {
        let client_id = require_player(initiator)?;
        let username = state
            .users
            .get(client_id)
            .and_then(|u| u.username.clone())
            .ok_or(LobbyError::UsernameRequired)?;
        let expected = state.game.current_round_idx().ok_or(GameError::NotInRound)?;
        if question_idx != expected {
            return Err(LobbyError::WrongQuestion { expected, got: question_idx });
        }
        let round = state.game.current_round().ok_or(GameError::NotInRound)?;
        round.submit_answer(&username, answer_idx)?;
        tracing::debug!(pin = %self.pin(), %username, question_idx, answer_idx, "answer recorded");

        if let Some(user) = state.user(initiator) {
            user.send(Outbound::View(ViewBlob::AnswerOptions(self.view_data(state, user))));
        }
        if let Some(count) = self.player_count(state) {
            self.push_to_all(state, &ViewBlob::PlayerCount(count));
        }

        // Everyone has answered: no point waiting for the deadline.
        if round.still_answering().is_empty() {
            match round.finish_early() {
                Ok(()) | Err(GameError::AlreadyEnded) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn on_show_answer(
        &self,
        state: &mut LobbyState,
        initiator: &Initiator,
    ) -> Result<(), LobbyError> {
        if *initiator != Initiator::System {
            return Err(LobbyError::SystemOnly);
        }
        // A waiter may fire after the game was ended or the round was
        // already revealed.
        if state.game.is_finished() || state.game.current_round().is_none() {
            return Ok(());
        }
        finish_round(state)?;
        if state.game.round_results_applied() {
            return Ok(());
        }

        let scored = state
            .game
            .apply_round_results()?
            .iter()
            .filter(|r| r.points > 0)
            .count();
        tracing::info!(
            pin = %self.pin(),
            question = state.game.current_round_idx().unwrap_or_default(),
            scored,
            "answer revealed"
        );
        self.push_current_view_to_all(state);
        Ok(())
    }

    async fn on_next_question(self: &Arc<Self>, state: &mut LobbyState) -> Result<(), LobbyError> {
        match state.game.start_next_round() {
            Ok(()) => {}
            Err(GameError::NoMoreQuestions) => return self.end_game(state).await,
            Err(e) => return Err(e.into()),
        }
        tracing::info!(
            pin = %self.pin(),
            question = state.game.current_round_idx().unwrap_or_default(),
            "next question"
        );
        self.spawn_round_waiter(state);
        self.push_current_view_to_all(state);
        Ok(())
    }

    /// Spawns the task that turns the current round's end into a
    /// `ShowAnswerRequested`. Replaces any previous waiter.
    fn spawn_round_waiter(self: &Arc<Self>, state: &mut LobbyState) {
        let Some(round) = state.game.current_round() else {
            return;
        };
        let mut finished = round.finished_signal();
        let lobby = Arc::clone(self);
        let waiter = tokio::spawn(async move {
            finished.wait().await;
            lobby.show_answer().await;
        });
        if let Some(old) = state.round_waiter.replace(waiter) {
            old.abort();
        }
    }

    // -----------------------------------------------------------------------
    // Ending
    // -----------------------------------------------------------------------

    /// Ends the game, archives it, and sends everyone final results.
    ///
    /// If archiving fails, the lobby stays registered and the game stays
    /// finished but unarchived; a retry only repeats the archive step.
    async fn end_game(&self, state: &mut LobbyState) -> Result<(), LobbyError> {
        if let Some(waiter) = state.round_waiter.take() {
            waiter.abort();
        }

        // Fold a live or unrevealed round into the final scores.
        if state.game.current_round().is_some() && !state.game.round_results_applied() {
            finish_round(state)?;
            state.game.apply_round_results()?;
        }
        if !state.game.is_finished() {
            state.game.finish()?;
        }

        let past_game = PastGame::from_game(&state.game);
        let past_game_id = match self.archive.insert(past_game).await {
            Ok(id) => id,
            Err(e) => {
                tracing::error!(pin = %self.pin(), error = %e, "failed to archive game");
                return Err(e.into());
            }
        };
        state.past_game_id = Some(past_game_id);
        self.unregister();
        tracing::info!(pin = %self.pin(), %past_game_id, "game archived");

        self.push_current_view_to_all(state);
        for user in state.everyone() {
            user.send(Outbound::Close);
        }
        for user in state.host.iter_mut().chain(state.users.values_mut()) {
            user.sender = None;
        }
        Ok(())
    }
}

/// Ends the current round now. A round that already ended is fine.
fn finish_round(state: &LobbyState) -> Result<(), LobbyError> {
    match state.game.finish_round_early() {
        Ok(()) | Err(GameError::AlreadyEnded) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Usernames can only change while the game has neither started nor
/// finished. A game ended before its start stays finished while its
/// archive insert is retried.
fn require_open_roster(state: &LobbyState) -> Result<(), LobbyError> {
    if state.game.is_started() {
        return Err(GameError::AlreadyStarted.into());
    }
    if state.game.is_finished() {
        return Err(GameError::AlreadyFinished.into());
    }
    Ok(())
}

fn require_host(initiator: &Initiator) -> Result<(), LobbyError> {
    match initiator {
        Initiator::Host => Ok(()),
        _ => Err(LobbyError::NotHost),
    }
}

fn require_player(initiator: &Initiator) -> Result<&buzzline_protocol::ClientId, LobbyError> {
    match initiator {
        Initiator::Player(client_id) => Ok(client_id),
        Initiator::Host => Err(LobbyError::PlayersOnly),
        Initiator::System => Err(LobbyError::SystemOnly),
    }
}
