//! Integration tests for the lobby: admission, event handling, round
//! timing, and archiving, driven through inbound frames.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use buzzline_game::{Answer, GameError, Question, Quiz, RoundSettings};
use buzzline_lobby::{
    Archive, ArchiveError, ClientSender, InMemoryArchive, Lobby, LobbyError, LobbyOptions,
    LobbyRegistry, Outbound, PastGame, PastGameId, RegistryError,
};
use buzzline_protocol::{
    trigger, ClientId, LobbyEvent, LobbyPhase, PlayerCount, ProtocolError, ViewBlob,
};
use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::{advance, Instant};

// =========================================================================
// Helpers
// =========================================================================

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

fn settings(reading_ms: u64, answer_ms: u64) -> RoundSettings {
    RoundSettings::new(ms(reading_ms), ms(answer_ms))
}

/// Every question has answer 0 correct and answer 1 wrong.
fn quiz(questions: usize) -> Quiz {
    Quiz {
        title: "Geography".into(),
        questions: (0..questions)
            .map(|i| Question {
                text: format!("Question {i}"),
                answers: vec![
                    Answer { text: "right".into(), is_correct: true },
                    Answer { text: "wrong".into(), is_correct: false },
                ],
            })
            .collect(),
    }
}

struct Setup<A: Archive> {
    registry: LobbyRegistry<A>,
    archive: Arc<A>,
    lobby: Arc<Lobby<A>>,
}

fn setup_with<A: Archive>(archive: A, questions: usize, round: RoundSettings) -> Setup<A> {
    let archive = Arc::new(archive);
    let registry = LobbyRegistry::new(Arc::clone(&archive));
    let lobby = registry
        .add(LobbyOptions::new(quiz(questions)).with_settings(round))
        .unwrap();
    Setup { registry, archive, lobby }
}

fn setup(questions: usize, round: RoundSettings) -> Setup<InMemoryArchive> {
    setup_with(InMemoryArchive::new(), questions, round)
}

fn frame(name: &str) -> serde_json::Value {
    json!({ "HEADERS": { "HX-Trigger-Name": name } })
}

fn username_frame(username: &str) -> serde_json::Value {
    json!({
        "username": username,
        "HEADERS": { "HX-Trigger-Name": trigger::NEW_USERNAME_FORM }
    })
}

fn answer_frame(question: usize, answer: usize) -> serde_json::Value {
    json!({
        "HEADERS": {
            "HX-Trigger-Name": trigger::ANSWER,
            "HX-Trigger": format!("answer-q{question}-a{answer}")
        }
    })
}

/// One attached client and the receiving end of its channel.
struct Client {
    id: ClientId,
    tx: ClientSender,
    rx: mpsc::UnboundedReceiver<Outbound>,
}

impl Client {
    async fn next(&mut self) -> Outbound {
        tokio::time::timeout(Duration::from_secs(600), self.rx.recv())
            .await
            .expect("timed out waiting for outbound message")
            .expect("outbound channel closed")
    }

    async fn view(&mut self) -> ViewBlob {
        match self.next().await {
            Outbound::View(view) => view,
            Outbound::Close => panic!("{}: unexpected close", self.id),
        }
    }

    /// Next message must be the view named `name`.
    async fn expect(&mut self, name: &str) -> ViewBlob {
        let view = self.view().await;
        assert_eq!(view.name(), name, "{}: got {view:?}", self.id);
        view
    }

    /// Skips ahead to the next view named `name`.
    async fn wait_for(&mut self, name: &str) -> ViewBlob {
        loop {
            let view = self.view().await;
            if view.name() == name {
                return view;
            }
        }
    }

    /// Everything already queued.
    fn drain(&mut self) -> Vec<Outbound> {
        std::iter::from_fn(|| self.rx.try_recv().ok()).collect()
    }

    fn assert_idle(&mut self) {
        let queued = self.drain();
        assert!(queued.is_empty(), "{}: unexpected {queued:?}", self.id);
    }

    async fn send<A: Archive>(
        &self,
        lobby: &Arc<Lobby<A>>,
        frame: serde_json::Value,
    ) -> Result<(), LobbyError> {
        lobby.handle_frame(&self.id, frame.to_string().as_bytes()).await
    }
}

async fn connect<A: Archive>(lobby: &Lobby<A>, id: &str) -> Client {
    let id = ClientId::new(id).unwrap();
    let (tx, rx) = mpsc::unbounded_channel();
    lobby.attach_connection(id.clone(), tx.clone()).await.unwrap();
    Client { id, tx, rx }
}

/// Connects a player and picks `username` for them.
async fn join<A: Archive>(lobby: &Arc<Lobby<A>>, id: &str, username: &str) -> Client {
    let mut client = connect(lobby, id).await;
    client.expect("choose-username").await;
    client.send(lobby, username_frame(username)).await.unwrap();
    client.expect("waiting-room").await;
    client
}

fn data(view: &ViewBlob) -> &buzzline_protocol::ViewData {
    match view {
        ViewBlob::ChooseUsername(d)
        | ViewBlob::WaitingRoom(d)
        | ViewBlob::Question(d)
        | ViewBlob::Answer(d)
        | ViewBlob::AnswerOptions(d) => d,
        ViewBlob::FinalResults(f) => &f.view,
        other => panic!("no view data in {other:?}"),
    }
}

fn alert(view: &ViewBlob) -> &str {
    match view {
        ViewBlob::ErrorAlert(a) => &a.message,
        other => panic!("expected error-alert, got {other:?}"),
    }
}

/// Archive that fails the first `failures` inserts.
struct FlakyArchive {
    inner: InMemoryArchive,
    failures: AtomicUsize,
    calls: AtomicUsize,
}

impl FlakyArchive {
    fn new(failures: usize) -> Self {
        Self {
            inner: InMemoryArchive::new(),
            failures: AtomicUsize::new(failures),
            calls: AtomicUsize::new(0),
        }
    }
}

impl Archive for FlakyArchive {
    async fn insert(&self, game: PastGame) -> Result<PastGameId, ArchiveError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let left = self.failures.load(Ordering::SeqCst);
        if left > 0 {
            self.failures.store(left - 1, Ordering::SeqCst);
            return Err(ArchiveError::Unavailable("database is down".into()));
        }
        self.inner.insert(game).await
    }

    async fn get(&self, id: PastGameId) -> Result<PastGame, ArchiveError> {
        self.inner.get(id).await
    }
}

// =========================================================================
// Admission
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_first_client_becomes_host() {
    let s = setup(1, settings(0, 1000));
    let mut host = connect(&s.lobby, "H").await;

    let view = host.expect("waiting-room").await;
    assert!(data(&view).user.is_host);
    assert_eq!(data(&view).user.username, "HOST");
    assert_eq!(data(&view).lobby.phase, LobbyPhase::WaitingForPlayers);
    assert_eq!(s.lobby.host_id(), Some(&host.id));

    let mut alice = connect(&s.lobby, "A").await;
    let view = alice.expect("choose-username").await;
    assert!(!data(&view).user.is_host);
    assert_eq!(data(&view).user.username, "");
    assert_eq!(s.lobby.host_id(), Some(&host.id));
}

#[tokio::test(start_paused = true)]
async fn test_host_reattach_replaces_connection() {
    let s = setup(1, settings(0, 1000));
    let mut old_host = connect(&s.lobby, "H").await;
    old_host.expect("waiting-room").await;

    let mut new_host = connect(&s.lobby, "H").await;
    assert!(data(&new_host.expect("waiting-room").await).user.is_host);

    join(&s.lobby, "A", "Alice").await;
    let view = new_host.expect("waiting-room").await;
    assert_eq!(data(&view).lobby.players, ["Alice"]);
    old_host.assert_idle();
}

#[tokio::test(start_paused = true)]
async fn test_detach_then_stale_detach_ignored() {
    let s = setup(1, settings(0, 1000));
    let _host = connect(&s.lobby, "H").await;
    let alice = join(&s.lobby, "A", "Alice").await;
    assert!(s.lobby.is_connected(&alice.id).await);

    let mut again = connect(&s.lobby, "A").await;
    again.expect("waiting-room").await;

    // The first connection closing must not disconnect the second.
    s.lobby.detach_connection(&alice.id, &alice.tx).await;
    assert!(s.lobby.is_connected(&alice.id).await);

    s.lobby.detach_connection(&again.id, &again.tx).await;
    assert!(!s.lobby.is_connected(&again.id).await);
    assert_eq!(s.lobby.players().await, ["Alice"]);
}

/// S5: a player that reconnects mid-game keeps name and points.
#[tokio::test(start_paused = true)]
async fn test_reconnect_preserves_identity() {
    let s = setup(2, settings(0, 1000));
    let mut host = connect(&s.lobby, "H").await;
    let alice = join(&s.lobby, "A", "Alice").await;
    host.send(&s.lobby, frame(trigger::START_GAME_BTN)).await.unwrap();
    alice.send(&s.lobby, answer_frame(0, 0)).await.unwrap();

    // Alice's transport goes away.
    s.lobby.detach_connection(&alice.id, &alice.tx).await;
    drop(alice);
    host.wait_for("answer").await;

    let mut alice = connect(&s.lobby, "A").await;
    let view = alice.expect("answer").await;
    assert_eq!(data(&view).user.username, "Alice");
    assert_eq!(data(&view).user.score, 1000);
    assert_eq!(s.lobby.players().await, ["Alice"]);

    host.send(&s.lobby, frame(trigger::NEXT_QUESTION_BTN)).await.unwrap();
    let view = alice.expect("question").await;
    assert_eq!(data(&view).lobby.current_question.as_ref().unwrap().index, 1);
}

#[tokio::test(start_paused = true)]
async fn test_attach_after_archive_finished() {
    let s = setup(1, settings(0, 1000));
    let host = connect(&s.lobby, "H").await;
    host.send(&s.lobby, frame(trigger::FINISH_GAME_BTN)).await.unwrap();

    let (tx, _rx) = mpsc::unbounded_channel();
    let result = s.lobby.attach_connection(ClientId::new("late").unwrap(), tx).await;
    assert!(matches!(result, Err(LobbyError::Finished)));
}

// =========================================================================
// Usernames
// =========================================================================

/// S6: a taken username is refused and the roster is unchanged.
#[tokio::test(start_paused = true)]
async fn test_duplicate_username_rejected() {
    let s = setup(1, settings(0, 1000));
    let mut host = connect(&s.lobby, "H").await;
    join(&s.lobby, "A", "Jack").await;
    host.drain();

    let mut bob = connect(&s.lobby, "B").await;
    bob.expect("choose-username").await;
    let result = bob.send(&s.lobby, username_frame("Jack")).await;
    assert!(matches!(
        result,
        Err(LobbyError::Game(GameError::DuplicateUsername(ref n))) if n == "Jack"
    ));
    assert!(alert(&bob.expect("error-alert").await).contains("Jack"));
    assert_eq!(s.lobby.players().await, ["Jack"]);
    host.assert_idle();
}

#[tokio::test(start_paused = true)]
async fn test_rename_before_start_updates_roster() {
    let s = setup(1, settings(0, 1000));
    let mut host = connect(&s.lobby, "H").await;
    let mut alice = join(&s.lobby, "A", "Al").await;

    alice.send(&s.lobby, frame(trigger::CHANGE_USERNAME_BTN)).await.unwrap();
    let view = alice.expect("choose-username").await;
    assert_eq!(data(&view).user.username, "Al");

    alice.send(&s.lobby, username_frame("  Alice ")).await.unwrap();
    let view = alice.expect("waiting-room").await;
    assert_eq!(data(&view).user.username, "Alice");
    assert_eq!(s.lobby.players().await, ["Alice"]);

    host.drain();
    let mut bob = join(&s.lobby, "B", "Bob").await;
    assert_eq!(data(&host.expect("waiting-room").await).lobby.players, ["Alice", "Bob"]);
    bob.assert_idle();
}

#[tokio::test(start_paused = true)]
async fn test_invalid_usernames_rejected() {
    let s = setup(1, settings(0, 1000));
    let _host = connect(&s.lobby, "H").await;
    let mut alice = connect(&s.lobby, "A").await;
    alice.drain();

    let too_long = "x".repeat(41);
    for bad in ["   ", "host", too_long.as_str()] {
        let result = alice.send(&s.lobby, username_frame(bad)).await;
        assert!(
            matches!(result, Err(LobbyError::Game(GameError::InvalidUsername(_)))),
            "{bad:?} accepted"
        );
        alice.expect("error-alert").await;
    }
    assert!(s.lobby.players().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_username_changes_after_start_rejected() {
    let s = setup(1, settings(0, 1000));
    let host = connect(&s.lobby, "H").await;
    let mut alice = join(&s.lobby, "A", "Alice").await;
    host.send(&s.lobby, frame(trigger::START_GAME_BTN)).await.unwrap();
    alice.drain();

    let result = alice.send(&s.lobby, frame(trigger::CHANGE_USERNAME_BTN)).await;
    assert!(matches!(result, Err(LobbyError::Game(GameError::AlreadyStarted))));
    alice.expect("error-alert").await;

    let result = alice.send(&s.lobby, username_frame("Alicia")).await;
    assert!(matches!(result, Err(LobbyError::Game(GameError::AlreadyStarted))));
    assert_eq!(s.lobby.players().await, ["Alice"]);
}

// =========================================================================
// Authorization and malformed input
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_host_only_commands_rejected_for_players() {
    let s = setup(1, settings(0, 1000));
    let _host = connect(&s.lobby, "H").await;
    let mut alice = join(&s.lobby, "A", "Alice").await;

    for name in [
        trigger::START_GAME_BTN,
        trigger::SKIP_TO_ANSWER_BTN,
        trigger::NEXT_QUESTION_BTN,
        trigger::FINISH_GAME_BTN,
    ] {
        let result = alice.send(&s.lobby, frame(name)).await;
        assert!(matches!(result, Err(LobbyError::NotHost)), "{name} allowed");
        assert_eq!(alert(&alice.expect("error-alert").await), "Only the host can do that");
    }
    assert_eq!(s.lobby.phase().await, LobbyPhase::WaitingForPlayers);
}

#[tokio::test(start_paused = true)]
async fn test_host_cannot_play() {
    let s = setup(1, settings(0, 1000));
    let mut host = connect(&s.lobby, "H").await;
    join(&s.lobby, "A", "Alice").await;
    host.drain();

    let result = host.send(&s.lobby, username_frame("Sneaky")).await;
    assert!(matches!(result, Err(LobbyError::PlayersOnly)));
    host.expect("error-alert").await;

    host.send(&s.lobby, frame(trigger::START_GAME_BTN)).await.unwrap();
    host.drain();
    let result = host.send(&s.lobby, answer_frame(0, 0)).await;
    assert!(matches!(result, Err(LobbyError::PlayersOnly)));
    host.expect("error-alert").await;
}

#[tokio::test(start_paused = true)]
async fn test_show_answer_from_client_system_only() {
    let s = setup(1, settings(0, 1000));
    let mut host = connect(&s.lobby, "H").await;
    host.drain();
    let result = s
        .lobby
        .handle_event(&host.id, LobbyEvent::ShowAnswerRequested)
        .await;
    assert!(matches!(result, Err(LobbyError::SystemOnly)));
    host.expect("error-alert").await;
}

#[tokio::test(start_paused = true)]
async fn test_bad_frames_dropped_without_reply() {
    let s = setup(1, settings(0, 1000));
    let mut host = connect(&s.lobby, "H").await;
    host.drain();

    let result = host.send(&s.lobby, frame("self-destruct-btn")).await;
    assert!(matches!(
        result,
        Err(LobbyError::Protocol(ProtocolError::UnknownEvent(ref n))) if n == "self-destruct-btn"
    ));
    let result = s.lobby.handle_frame(&host.id, b"not json").await;
    assert!(matches!(result, Err(LobbyError::Protocol(ProtocolError::MalformedFrame(_)))));
    host.assert_idle();
}

#[tokio::test(start_paused = true)]
async fn test_unknown_client_rejected() {
    let s = setup(1, settings(0, 1000));
    let _host = connect(&s.lobby, "H").await;
    let stranger = ClientId::new("nobody").unwrap();
    let result = s
        .lobby
        .handle_frame(&stranger, frame(trigger::START_GAME_BTN).to_string().as_bytes())
        .await;
    assert!(matches!(result, Err(LobbyError::UnknownClient(ref id)) if *id == stranger));
}

// =========================================================================
// Starting
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_start_without_players_rejected() {
    let s = setup(1, settings(0, 1000));
    let mut host = connect(&s.lobby, "H").await;
    // Connected but unnamed clients are not players.
    let _lurker = connect(&s.lobby, "L").await;
    host.drain();

    let result = host.send(&s.lobby, frame(trigger::START_GAME_BTN)).await;
    assert!(matches!(result, Err(LobbyError::Game(GameError::NoPlayers))));
    assert_eq!(alert(&host.expect("error-alert").await), "Not enough players");
    assert_eq!(s.lobby.phase().await, LobbyPhase::WaitingForPlayers);
}

#[tokio::test(start_paused = true)]
async fn test_start_pushes_question_without_solution() {
    let s = setup(2, settings(0, 1000));
    let mut host = connect(&s.lobby, "H").await;
    let mut alice = join(&s.lobby, "A", "Alice").await;
    host.drain();

    host.send(&s.lobby, frame(trigger::START_GAME_BTN)).await.unwrap();
    for client in [&mut host, &mut alice] {
        let view = client.expect("question").await;
        let lobby = &data(&view).lobby;
        assert_eq!(lobby.phase, LobbyPhase::Question);
        let question = lobby.current_question.as_ref().unwrap();
        assert_eq!(question.index, 0);
        assert!(!question.is_last);
        assert!(question.answers.iter().all(|a| a.is_correct.is_none()));
        assert_eq!(lobby.still_answering, ["Alice"]);
    }

    let again = host.send(&s.lobby, frame(trigger::START_GAME_BTN)).await;
    assert!(matches!(again, Err(LobbyError::Game(GameError::AlreadyStarted))));
}

#[tokio::test(start_paused = true)]
async fn test_update_settings_only_before_start() {
    let s = setup(1, settings(0, 1000));
    let host = connect(&s.lobby, "H").await;
    join(&s.lobby, "A", "Alice").await;

    s.lobby.update_settings(settings(3000, 20_000)).await.unwrap();
    assert_eq!(s.lobby.settings().await, settings(3000, 20_000));

    host.send(&s.lobby, frame(trigger::START_GAME_BTN)).await.unwrap();
    let result = s.lobby.update_settings(settings(0, 1000)).await;
    assert!(matches!(result, Err(LobbyError::Game(GameError::AlreadyStarted))));
}

#[tokio::test(start_paused = true)]
async fn test_update_settings_out_of_range_keeps_lobby_startable() {
    let s = setup(1, settings(0, 1000));
    let mut host = connect(&s.lobby, "H").await;
    let mut alice = join(&s.lobby, "A", "Alice").await;

    let huge = RoundSettings::new(Duration::from_secs(u64::MAX), Duration::from_secs(1));
    let result = s.lobby.update_settings(huge).await;
    assert!(matches!(result, Err(LobbyError::Game(GameError::InvalidSettings(_)))));
    assert_eq!(s.lobby.settings().await, settings(0, 1000));

    host.send(&s.lobby, frame(trigger::START_GAME_BTN)).await.unwrap();
    host.wait_for("question").await;
    alice.wait_for("question").await;
    assert_eq!(s.lobby.phase().await, LobbyPhase::Question);
}

// =========================================================================
// Rounds and scoring
// =========================================================================

/// S1: one player, one question, answered fast and right, then archived.
#[tokio::test(start_paused = true)]
async fn test_happy_path_one_question() {
    let s = setup(1, settings(0, 1000));
    let mut host = connect(&s.lobby, "H").await;
    let mut alice = join(&s.lobby, "A", "Alice").await;
    host.drain();

    host.send(&s.lobby, frame(trigger::START_GAME_BTN)).await.unwrap();
    host.expect("question").await;
    alice.expect("question").await;

    advance(ms(400)).await;
    alice.send(&s.lobby, answer_frame(0, 0)).await.unwrap();
    let view = alice.expect("answer-options").await;
    assert_eq!(data(&view).user.chosen_answer, Some(0));
    let count = ViewBlob::PlayerCount(PlayerCount { still_answering: 0, total: 1 });
    assert_eq!(alice.expect("player-count").await, count);
    assert_eq!(host.expect("player-count").await, count);

    let view = alice.expect("answer").await;
    let d = data(&view);
    assert_eq!(d.lobby.phase, LobbyPhase::Answer);
    assert_eq!(d.user.score, 1000);
    assert_eq!(d.user.round_points, 1000);
    let answers = &d.lobby.current_question.as_ref().unwrap().answers;
    assert_eq!(answers[0].is_correct, Some(true));
    assert_eq!(answers[1].is_correct, Some(false));
    host.expect("answer").await;

    host.send(&s.lobby, frame(trigger::FINISH_GAME_BTN)).await.unwrap();
    for client in [&mut host, &mut alice] {
        match client.expect("final-results").await {
            ViewBlob::FinalResults(f) => {
                assert_eq!(f.past_game_id, 1);
                assert_eq!(f.view.lobby.phase, LobbyPhase::Finished);
            }
            other => panic!("{other:?}"),
        }
        assert_eq!(client.next().await, Outbound::Close);
    }

    let archived = s.archive.all().await;
    assert_eq!(archived.len(), 1);
    let (id, game) = &archived[0];
    assert_eq!(*id, PastGameId(1));
    assert_eq!(game.quiz_title, "Geography");
    assert_eq!(game.scores.len(), 1);
    assert_eq!((game.scores[0].username.as_str(), game.scores[0].score), ("Alice", 1000));

    assert_eq!(s.lobby.past_game_id().await, Some(PastGameId(1)));
    assert!(matches!(s.registry.get(s.lobby.pin()), Err(RegistryError::NotFound(_))));
    assert!(!s.lobby.is_connected(&alice.id).await);
}

/// S2: a wrong answer scores nothing.
#[tokio::test(start_paused = true)]
async fn test_wrong_answer_scores_zero() {
    let s = setup(1, settings(0, 1000));
    let host = connect(&s.lobby, "H").await;
    let mut alice = join(&s.lobby, "A", "Alice").await;
    host.send(&s.lobby, frame(trigger::START_GAME_BTN)).await.unwrap();
    alice.drain();

    advance(ms(500)).await;
    alice.send(&s.lobby, answer_frame(0, 1)).await.unwrap();
    alice.expect("answer-options").await;
    alice.expect("player-count").await;
    let view = alice.expect("answer").await;
    assert_eq!(data(&view).user.score, 0);
    assert_eq!(s.lobby.score_of("Alice").await, Some(0));
}

/// S3: a correct answer late in the window decays linearly.
#[tokio::test(start_paused = true)]
async fn test_late_correct_answer_decays() {
    let s = setup(1, settings(0, 2000));
    let host = connect(&s.lobby, "H").await;
    let mut alice = join(&s.lobby, "A", "Alice").await;
    host.send(&s.lobby, frame(trigger::START_GAME_BTN)).await.unwrap();
    alice.drain();

    advance(ms(1900)).await;
    alice.send(&s.lobby, answer_frame(0, 0)).await.unwrap();
    let view = alice.wait_for("answer").await;
    assert_eq!(data(&view).user.round_points, 525);
    assert_eq!(s.lobby.score_of("Alice").await, Some(525));
}

#[tokio::test(start_paused = true)]
async fn test_deadline_reveals_answer() {
    let s = setup(1, settings(0, 1000));
    let mut host = connect(&s.lobby, "H").await;
    let mut alice = join(&s.lobby, "A", "Alice").await;
    let _bob = join(&s.lobby, "B", "Bob").await;
    host.send(&s.lobby, frame(trigger::START_GAME_BTN)).await.unwrap();
    let started = Instant::now();
    host.drain();
    alice.drain();

    alice.send(&s.lobby, answer_frame(0, 0)).await.unwrap();
    alice.drain();
    host.expect("player-count").await;

    // Bob never answers; the deadline ends the round.
    let view = host.expect("answer").await;
    assert!(started.elapsed() >= ms(1000));
    let board: Vec<_> = data(&view)
        .lobby
        .leaderboard
        .iter()
        .map(|e| (e.username.as_str(), e.score))
        .collect();
    assert_eq!(board, [("Alice", 1000), ("Bob", 0)]);
    assert!(data(&view).lobby.still_answering.is_empty());

    let late = alice.send(&s.lobby, answer_frame(0, 1)).await;
    assert!(matches!(late, Err(LobbyError::Game(GameError::AfterRoundEnded))));
}

#[tokio::test(start_paused = true)]
async fn test_answer_during_reading_time_rejected() {
    let s = setup(1, settings(2000, 10_000));
    let host = connect(&s.lobby, "H").await;
    let mut alice = join(&s.lobby, "A", "Alice").await;
    host.send(&s.lobby, frame(trigger::START_GAME_BTN)).await.unwrap();
    alice.drain();

    advance(ms(1000)).await;
    let early = alice.send(&s.lobby, answer_frame(0, 0)).await;
    assert!(matches!(early, Err(LobbyError::Game(GameError::BeforeAnsweringOpens))));
    alice.expect("error-alert").await;

    advance(ms(1200)).await;
    alice.send(&s.lobby, answer_frame(0, 0)).await.unwrap();
    alice.wait_for("answer").await;
    assert_eq!(s.lobby.score_of("Alice").await, Some(1000));
}

#[tokio::test(start_paused = true)]
async fn test_answer_validation() {
    let s = setup(2, settings(0, 1000));
    let host = connect(&s.lobby, "H").await;
    let mut alice = join(&s.lobby, "A", "Alice").await;
    let mut lurker = connect(&s.lobby, "L").await;
    let _bob = join(&s.lobby, "B", "Bob").await;
    host.send(&s.lobby, frame(trigger::START_GAME_BTN)).await.unwrap();
    alice.drain();
    lurker.drain();

    let wrong_q = alice.send(&s.lobby, answer_frame(1, 0)).await;
    assert!(matches!(wrong_q, Err(LobbyError::WrongQuestion { expected: 0, got: 1 })));
    let bad_idx = alice.send(&s.lobby, answer_frame(0, 9)).await;
    assert!(matches!(bad_idx, Err(LobbyError::Game(GameError::InvalidAnswer(9)))));
    let unnamed = lurker.send(&s.lobby, answer_frame(0, 0)).await;
    assert!(matches!(unnamed, Err(LobbyError::UsernameRequired)));

    alice.send(&s.lobby, answer_frame(0, 0)).await.unwrap();
    let twice = alice.send(&s.lobby, answer_frame(0, 1)).await;
    assert!(matches!(twice, Err(LobbyError::Game(GameError::AlreadyAnswered))));
}

/// S4: skip ends the round once; the deadline firing later changes nothing.
#[tokio::test(start_paused = true)]
async fn test_skip_then_deadline_applies_once() {
    let s = setup(2, settings(0, 10_000));
    let mut host = connect(&s.lobby, "H").await;
    let mut alice = join(&s.lobby, "A", "Alice").await;
    let mut bob = join(&s.lobby, "B", "Bob").await;
    host.send(&s.lobby, frame(trigger::START_GAME_BTN)).await.unwrap();

    advance(ms(50)).await;
    alice.send(&s.lobby, answer_frame(0, 0)).await.unwrap();
    advance(ms(50)).await;
    host.send(&s.lobby, frame(trigger::SKIP_TO_ANSWER_BTN)).await.unwrap();
    for client in [&mut host, &mut alice, &mut bob] {
        client.wait_for("answer").await;
    }
    // Skipping again, and the original deadline passing, are no-ops.
    host.send(&s.lobby, frame(trigger::SKIP_TO_ANSWER_BTN)).await.unwrap();
    advance(ms(11_000)).await;
    tokio::task::yield_now().await;
    host.assert_idle();
    assert_eq!(s.lobby.score_of("Alice").await, Some(1000));
    assert_eq!(s.lobby.score_of("Bob").await, Some(0));
}

#[tokio::test(start_paused = true)]
async fn test_next_question_flow_and_fold_into_end() {
    let s = setup(2, settings(0, 1000));
    let mut host = connect(&s.lobby, "H").await;
    let mut alice = join(&s.lobby, "A", "Alice").await;
    host.send(&s.lobby, frame(trigger::START_GAME_BTN)).await.unwrap();

    let early = host.send(&s.lobby, frame(trigger::NEXT_QUESTION_BTN)).await;
    assert!(matches!(early, Err(LobbyError::Game(GameError::RoundInProgress))));

    alice.send(&s.lobby, answer_frame(0, 0)).await.unwrap();
    host.wait_for("answer").await;
    alice.wait_for("answer").await;

    host.send(&s.lobby, frame(trigger::NEXT_QUESTION_BTN)).await.unwrap();
    let view = alice.expect("question").await;
    let question = data(&view).lobby.current_question.clone().unwrap();
    assert_eq!(question.index, 1);
    assert!(question.is_last);
    assert_eq!(data(&view).user.chosen_answer, None);
    host.drain();

    alice.send(&s.lobby, answer_frame(1, 0)).await.unwrap();
    alice.wait_for("answer").await;
    host.wait_for("answer").await;

    // No questions left: "next" ends the game.
    host.send(&s.lobby, frame(trigger::NEXT_QUESTION_BTN)).await.unwrap();
    host.expect("final-results").await;
    assert_eq!(host.next().await, Outbound::Close);
    let game = s.archive.get(PastGameId(1)).await.unwrap();
    assert_eq!(game.scores[0].score, 2000);
}

// =========================================================================
// Ending
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_end_mid_round_counts_answers_so_far() {
    let s = setup(3, settings(0, 10_000));
    let mut host = connect(&s.lobby, "H").await;
    let alice = join(&s.lobby, "A", "Alice").await;
    let _bob = join(&s.lobby, "B", "Bob").await;
    host.send(&s.lobby, frame(trigger::START_GAME_BTN)).await.unwrap();
    alice.send(&s.lobby, answer_frame(0, 0)).await.unwrap();
    host.drain();

    host.send(&s.lobby, frame(trigger::FINISH_GAME_BTN)).await.unwrap();
    host.expect("final-results").await;

    let game = s.archive.get(PastGameId(1)).await.unwrap();
    let scores: Vec<_> = game.scores.iter().map(|p| (p.username.as_str(), p.score)).collect();
    assert_eq!(scores, [("Alice", 1000), ("Bob", 0)]);
    assert_eq!(s.archive.len().await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_end_before_start_archives_empty_game() {
    let s = setup(1, settings(0, 1000));
    let mut host = connect(&s.lobby, "H").await;
    host.drain();
    host.send(&s.lobby, frame(trigger::FINISH_GAME_BTN)).await.unwrap();
    host.expect("final-results").await;

    let game = s.archive.get(PastGameId(1)).await.unwrap();
    assert!(game.scores.is_empty());
    assert_eq!(game.started_at, game.ended_at);
}

#[tokio::test(start_paused = true)]
async fn test_archive_failure_keeps_lobby_and_retry_succeeds() {
    let s = setup_with(FlakyArchive::new(1), 1, settings(0, 1000));
    let mut host = connect(&s.lobby, "H").await;
    let mut alice = join(&s.lobby, "A", "Alice").await;
    host.send(&s.lobby, frame(trigger::START_GAME_BTN)).await.unwrap();
    alice.send(&s.lobby, answer_frame(0, 0)).await.unwrap();
    alice.wait_for("answer").await;
    host.wait_for("answer").await;

    let failed = host.send(&s.lobby, frame(trigger::FINISH_GAME_BTN)).await;
    assert!(matches!(failed, Err(LobbyError::Archive(ArchiveError::Unavailable(_)))));
    assert!(alert(&host.expect("error-alert").await).starts_with("Could not save the game"));
    alice.assert_idle();
    assert!(s.registry.get(s.lobby.pin()).is_ok());
    assert_eq!(s.lobby.phase().await, LobbyPhase::Answer);
    assert_eq!(s.lobby.past_game_id().await, None);

    host.send(&s.lobby, frame(trigger::FINISH_GAME_BTN)).await.unwrap();
    host.expect("final-results").await;
    alice.expect("final-results").await;
    assert_eq!(s.archive.calls.load(Ordering::SeqCst), 2);
    let game = s.archive.get(PastGameId(1)).await.unwrap();
    assert_eq!(game.scores[0].score, 1000);
    assert!(s.registry.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_archive_failure_before_start_freezes_roster() {
    let s = setup_with(FlakyArchive::new(1), 1, settings(0, 1000));
    let mut host = connect(&s.lobby, "H").await;
    let mut alice = join(&s.lobby, "A", "Alice").await;
    host.drain();

    let failed = host.send(&s.lobby, frame(trigger::FINISH_GAME_BTN)).await;
    assert!(matches!(failed, Err(LobbyError::Archive(ArchiveError::Unavailable(_)))));
    host.expect("error-alert").await;
    assert_eq!(s.lobby.phase().await, LobbyPhase::Answer);

    // A newcomer is no longer offered the username form and cannot join.
    let mut bob = connect(&s.lobby, "B").await;
    bob.expect("answer").await;
    let joined = bob.send(&s.lobby, username_frame("Bob")).await;
    assert!(matches!(joined, Err(LobbyError::Game(GameError::AlreadyFinished))));
    bob.expect("error-alert").await;
    let renamed = alice.send(&s.lobby, username_frame("Alicia")).await;
    assert!(matches!(renamed, Err(LobbyError::Game(GameError::AlreadyFinished))));

    host.send(&s.lobby, frame(trigger::FINISH_GAME_BTN)).await.unwrap();
    host.wait_for("final-results").await;
    alice.wait_for("final-results").await;
    let game = s.archive.get(PastGameId(1)).await.unwrap();
    let players: Vec<_> = game.scores.iter().map(|s| s.username.as_str()).collect();
    assert_eq!(players, ["Alice"]);
}

#[tokio::test(start_paused = true)]
async fn test_events_after_archive_rejected() {
    let s = setup(1, settings(0, 1000));
    let host = connect(&s.lobby, "H").await;
    host.send(&s.lobby, frame(trigger::FINISH_GAME_BTN)).await.unwrap();
    let again = host.send(&s.lobby, frame(trigger::FINISH_GAME_BTN)).await;
    assert!(matches!(again, Err(LobbyError::Finished)));
    assert_eq!(s.archive.len().await, 1);
}
