#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Integration tests for the SpyWord client.
//!
//! The first half drives a [`Dispatcher`] directly with server frames; the
//! second half runs the whole path through a [`SpyWordConnection`] on a
//! scripted [`MockTransport`].

mod common;

use std::time::Duration;

use common::*;
use serde_json::json;
use spyword_client::protocol::{Ballot, ClientMessage, Phase};
use spyword_client::sound::RenderBackend;
use spyword_client::timer::TimerZone;
use spyword_client::{
    ConnectionEvent, Dispatcher, SoundEngine, SpyWordConfig, SpyWordConnection, SpyWordError,
    Subscription, ValidationError,
};

// ════════════════════════════════════════════════════════════════════
// Helpers
// ════════════════════════════════════════════════════════════════════

fn dispatcher_as(self_id: &str) -> (Dispatcher<RecordingSink>, RecordingSink) {
    let sink = RecordingSink::new();
    let config = SpyWordConfig::new().with_connection_id(self_id);
    let dispatcher = Dispatcher::new(sink.clone(), SoundEngine::silent(), &config);
    (dispatcher, sink)
}

fn feed(dispatcher: &mut Dispatcher<RecordingSink>, frames: &[String]) {
    for frame in frames {
        dispatcher.dispatch_json(frame);
    }
}

const ROSTER: &[(&str, &str)] = &[("s1", "Ana"), ("s2", "Bo"), ("s3", "Cy")];

/// A dispatcher sitting in LOBBY of room AB12 with three players, `s1` host.
fn in_lobby(self_id: &str) -> (Dispatcher<RecordingSink>, RecordingSink) {
    let (mut dispatcher, sink) = dispatcher_as(self_id);
    feed(
        &mut dispatcher,
        &[update_room_json("AB12", "s1", "LOBBY", ROSTER)],
    );
    assert_eq!(dispatcher.phase(), Phase::Lobby);
    (dispatcher, sink)
}

fn in_voting(self_id: &str) -> (Dispatcher<RecordingSink>, RecordingSink) {
    let (mut dispatcher, sink) = in_lobby(self_id);
    feed(
        &mut dispatcher,
        &[
            game_started_json("CITIZEN", Some("Banana"), "Fruits"),
            phase_change_json("VOTING"),
        ],
    );
    assert_eq!(dispatcher.phase(), Phase::Voting);
    (dispatcher, sink)
}

/// Pumps buffered events until `done` holds or two seconds pass.
async fn settle<S, F>(dispatcher: &mut Dispatcher<S>, done: F)
where
    S: spyword_client::IntentSink,
    F: Fn(&Dispatcher<S>) -> bool,
{
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            dispatcher.pump();
            if done(dispatcher) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("dispatcher did not reach the expected state");
}

// ════════════════════════════════════════════════════════════════════
// Acceptance scenarios
// ════════════════════════════════════════════════════════════════════

#[test]
fn create_room_then_snapshot_lands_in_lobby() {
    let (mut dispatcher, sink) = dispatcher_as("s1");
    dispatcher.set_username("Ana");
    dispatcher.set_avatar("🐺");
    dispatcher.create_room().unwrap();

    assert_eq!(
        sink.sent(),
        vec![ClientMessage::CreateRoom {
            username: "Ana".into(),
            avatar: "🐺".into(),
        }]
    );

    feed(
        &mut dispatcher,
        &[
            room_created_json("AB12"),
            update_room_json("AB12", "s1", "LOBBY", &[("s1", "Ana")]),
        ],
    );
    assert_eq!(dispatcher.phase(), Phase::Lobby);
    assert_eq!(dispatcher.session().room_id, "AB12");
    assert_eq!(
        dispatcher.machine().room_badge().as_deref(),
        Some("Room AB12 · 🐺 Ana")
    );
    assert!(dispatcher.machine().is_host());
}

#[test]
fn imposter_deal_starts_playing_with_word_hidden() {
    let (mut dispatcher, _sink) = in_lobby("s2");
    assert!(dispatcher.dispatch_json(&game_started_json("IMPOSTER", Some("Banana"), "Fruits")));

    let session = dispatcher.session();
    assert_eq!(session.phase, Phase::Playing);
    assert!(!session.word_revealed);
    assert_eq!(session.my_role.as_deref(), Some("IMPOSTER"));
    assert_eq!(session.my_category.as_deref(), Some("Fruits"));
}

#[test]
fn timer_zone_thresholds_are_inclusive() {
    let (mut dispatcher, _sink) = in_lobby("s1");
    feed(
        &mut dispatcher,
        &[game_started_json("CITIZEN", Some("Banana"), "Fruits")],
    );

    dispatcher.dispatch_json(&timer_tick_json(15));
    assert_eq!(dispatcher.machine().timer_zone(), TimerZone::Warning);
    assert_eq!(dispatcher.machine().timer_zone().as_str(), "warning");

    dispatcher.dispatch_json(&timer_tick_json(10));
    assert_eq!(dispatcher.machine().timer_zone(), TimerZone::Urgent);
    assert_eq!(dispatcher.machine().timer_zone().as_str(), "urgent");
}

#[test]
fn game_over_during_voting_reveals_players() {
    let (mut dispatcher, _sink) = dispatcher_as("s1");
    feed(
        &mut dispatcher,
        &[update_room_json(
            "AB12",
            "s1",
            "LOBBY",
            &[("p1", "Ana"), ("p2", "Bo"), ("p3", "Cy")],
        )],
    );
    feed(
        &mut dispatcher,
        &[
            game_started_json("CITIZEN", Some("Banana"), "Fruits"),
            phase_change_json("VOTING"),
            game_over_json(
                "Citizens",
                json!([{"id": "p1", "role": "IMPOSTER", "word": "Banana"}]),
            ),
        ],
    );

    let session = dispatcher.session();
    assert_eq!(session.phase, Phase::Ended);
    assert!(session.notification.as_deref().unwrap().contains("Citizens"));
    let p1 = session.room.as_ref().unwrap().player("p1").unwrap();
    assert_eq!(p1.role.as_deref(), Some("IMPOSTER"));
    assert_eq!(p1.word.as_deref(), Some("Banana"));
    assert_eq!(p1.username, "Ana");
}

// ════════════════════════════════════════════════════════════════════
// Phase and vote invariants
// ════════════════════════════════════════════════════════════════════

#[test]
fn phase_tracks_last_phase_change_and_clears_vote() {
    let sequences: &[&[&str]] = &[
        &["VOTING"],
        &["VOTING", "PLAYING"],
        &["PLAYING", "VOTING", "PLAYING", "VOTING"],
        &["VOTING", "VOTING", "LOBBY"],
        &["PLAYING", "LOBBY", "VOTING"],
    ];

    for sequence in sequences {
        let (mut dispatcher, _sink) = in_lobby("s1");
        feed(
            &mut dispatcher,
            &[game_started_json("CITIZEN", Some("Banana"), "Fruits")],
        );
        for name in *sequence {
            // Vote whenever voting is open so the next transition has
            // something to clear.
            let _ = dispatcher.cast_skip().unwrap();
            dispatcher.dispatch_json(&phase_change_json(name));
            assert!(
                !dispatcher.machine().has_voted(),
                "vote survived phaseChange to {name} in {sequence:?}"
            );
        }
        let last: Phase = serde_json::from_value(json!(sequence.last().unwrap())).unwrap();
        assert_eq!(dispatcher.phase(), last, "sequence {sequence:?}");
    }
}

#[test]
fn timer_shows_last_tick_received() {
    let (mut dispatcher, _sink) = in_lobby("s1");
    feed(
        &mut dispatcher,
        &[game_started_json("CITIZEN", Some("Banana"), "Fruits")],
    );
    let sequences: &[&[i32]] = &[&[30, 29, 28], &[5, 12], &[3, 2, 1, 0], &[1, -1]];
    for ticks in sequences {
        for t in ticks.iter() {
            dispatcher.dispatch_json(&timer_tick_json(*t));
        }
        assert_eq!(
            dispatcher.machine().turn_timer_remaining(),
            *ticks.last().unwrap()
        );
    }
}

#[test]
fn timer_resets_to_full_round_on_phase_entry() {
    let (mut dispatcher, _sink) = in_voting("s1");
    dispatcher.dispatch_json(&timer_tick_json(4));
    dispatcher.dispatch_json(&phase_change_json("PLAYING"));
    assert_eq!(dispatcher.machine().turn_timer_remaining(), 30);
}

#[test]
fn second_vote_in_a_round_is_not_sent() {
    let (mut dispatcher, sink) = in_voting("s1");

    assert!(dispatcher.cast_vote("s2").unwrap());
    assert!(!dispatcher.cast_vote("s3").unwrap());
    assert!(!dispatcher.cast_skip().unwrap());

    assert_eq!(
        sink.sent(),
        vec![ClientMessage::Vote {
            room_id: "AB12".into(),
            suspect_id: Ballot::Suspect("s2".into()),
        }]
    );
}

#[test]
fn new_voting_round_allows_another_vote() {
    let (mut dispatcher, sink) = in_voting("s1");
    assert!(dispatcher.cast_skip().unwrap());
    feed(
        &mut dispatcher,
        &[phase_change_json("PLAYING"), phase_change_json("VOTING")],
    );
    assert!(dispatcher.cast_vote("s3").unwrap());
    assert_eq!(sink.len(), 2);
}

#[test]
fn word_is_hidden_again_when_a_new_round_starts() {
    let (mut dispatcher, _sink) = in_voting("s1");
    feed(&mut dispatcher, &[phase_change_json("PLAYING")]);
    assert!(dispatcher.reveal_word());
    feed(&mut dispatcher, &[phase_change_json("VOTING")]);
    assert!(dispatcher.session().word_revealed);

    feed(&mut dispatcher, &[phase_change_json("PLAYING")]);
    assert_eq!(dispatcher.phase(), Phase::Playing);
    assert!(!dispatcher.session().word_revealed);
}

#[test]
fn vote_outside_voting_sends_nothing() {
    let (mut dispatcher, sink) = in_lobby("s1");
    assert!(!dispatcher.cast_vote("s2").unwrap());
    assert!(!dispatcher.cast_skip().unwrap());
    assert_eq!(sink.len(), 0);
}

#[test]
fn vote_candidates_exclude_self_and_eliminated() {
    let (mut dispatcher, _sink) = dispatcher_as("s1");
    let snapshot = json!({
        "event": "updateRoom",
        "data": {
            "roomId": "AB12",
            "host": "s1",
            "gameState": "LOBBY",
            "players": [
                player_json("s1", "Ana"),
                player_json("s2", "Bo"),
                {"id": "s3", "username": "Cy", "avatar": "🦊", "isAlive": false}
            ]
        }
    });
    dispatcher.dispatch_json(&snapshot.to_string());
    let candidates: Vec<_> = dispatcher
        .machine()
        .vote_candidates()
        .map(|p| p.id.as_str())
        .collect();
    assert_eq!(candidates, ["s2"]);
}

// ════════════════════════════════════════════════════════════════════
// Game log
// ════════════════════════════════════════════════════════════════════

#[test]
fn log_keeps_arrival_order_and_only_grows_during_a_game() {
    let (mut dispatcher, _sink) = in_lobby("s1");
    let frames = [
        game_started_json("CITIZEN", Some("Banana"), "Fruits"),
        player_action_json("Ana", "WORD", "yellow"),
        player_action_json("Bo", "WORD", "curved"),
        player_action_json("Cy", "EMOTE", "🤔"),
        phase_change_json("VOTING"),
        vote_update_json(1, 3),
        round_result_json("Cy was eliminated", Some("CITIZEN")),
        phase_change_json("PLAYING"),
        player_action_json("Bo", "WORD", "peel"),
    ];

    let mut previous = 0;
    for frame in &frames {
        dispatcher.dispatch_json(frame);
        let len = dispatcher.machine().log().len();
        assert!(len >= previous, "log shrank after {frame}");
        previous = len;
    }

    let texts: Vec<_> = dispatcher.machine().log().texts().collect();
    assert_eq!(
        texts,
        [
            "🎮 Game started! You are a CITIZEN",
            "Ana: \"yellow\"",
            "Bo: \"curved\"",
            "🗳️ Voting phase! Who is the spy?",
            "Cy was eliminated · CITIZEN",
            "🔄 New round starting...",
            "Bo: \"peel\"",
        ]
    );
    let seqs: Vec<_> = dispatcher
        .machine()
        .log()
        .entries()
        .iter()
        .map(|e| e.seq)
        .collect();
    assert!(seqs.windows(2).all(|w| w[0] < w[1]));
}

// ════════════════════════════════════════════════════════════════════
// Intents and validation
// ════════════════════════════════════════════════════════════════════

#[test]
fn bootstrap_prefills_upper_cased_code_without_sending() {
    let (mut dispatcher, sink) = dispatcher_as("s9");
    assert!(dispatcher.bootstrap("https://play.example/?room=ab12"));
    assert_eq!(dispatcher.session().room_id, "AB12");
    assert_eq!(dispatcher.phase(), Phase::Login);
    assert_eq!(sink.len(), 0);

    dispatcher.set_username("Bo");
    dispatcher.join_room().unwrap();
    assert_eq!(
        sink.sent(),
        vec![ClientMessage::JoinRoom {
            room_id: "AB12".into(),
            username: "Bo".into(),
            avatar: "🐺".into(),
        }]
    );
    // Still on the login screen until the server answers.
    assert_eq!(dispatcher.phase(), Phase::Login);
}

#[test]
fn bootstrap_without_room_param_changes_nothing() {
    let (mut dispatcher, _sink) = dispatcher_as("s9");
    assert!(!dispatcher.bootstrap("https://play.example/?lang=en"));
    assert!(dispatcher.session().room_id.is_empty());
}

#[test]
fn shared_link_cannot_redirect_a_game_in_progress() {
    let (mut dispatcher, sink) = in_voting("s1");
    assert!(!dispatcher.bootstrap("https://play.example/?room=zz99"));
    assert!(!dispatcher.set_room_code("zz99"));
    assert_eq!(dispatcher.session().room_id, "AB12");

    assert!(dispatcher.cast_vote("s2").unwrap());
    assert_eq!(
        sink.sent(),
        vec![ClientMessage::Vote {
            room_id: "AB12".into(),
            suspect_id: Ballot::Suspect("s2".into()),
        }]
    );
}

#[test]
fn typed_code_survives_a_snapshot_of_a_running_game() {
    let (mut dispatcher, _sink) = dispatcher_as("s9");
    assert!(dispatcher.set_room_code("qq11"));
    feed(
        &mut dispatcher,
        &[update_room_json("AB12", "s1", "PLAYING", ROSTER)],
    );
    assert_eq!(dispatcher.phase(), Phase::Login);
    assert_eq!(dispatcher.session().room_id, "QQ11");
}

#[test]
fn intents_are_validated_before_sending() {
    let (mut dispatcher, sink) = dispatcher_as("s1");

    let err = dispatcher.create_room().unwrap_err();
    assert!(matches!(
        err,
        SpyWordError::Validation(ValidationError::MissingUsername)
    ));

    dispatcher.set_username("Ana");
    let err = dispatcher.join_room().unwrap_err();
    assert!(matches!(
        err,
        SpyWordError::Validation(ValidationError::MissingRoomCode)
    ));

    assert_eq!(sink.len(), 0);
}

#[test]
fn only_host_with_enough_players_can_start() {
    let (mut guest, guest_sink) = in_lobby("s2");
    assert!(matches!(
        guest.start_game().unwrap_err(),
        SpyWordError::Validation(ValidationError::NotHost)
    ));
    assert_eq!(guest_sink.len(), 0);

    let (mut small, _sink) = dispatcher_as("s1");
    feed(
        &mut small,
        &[update_room_json("AB12", "s1", "LOBBY", &[("s1", "Ana")])],
    );
    assert!(matches!(
        small.start_game().unwrap_err(),
        SpyWordError::Validation(ValidationError::NotEnoughPlayers { have: 1, need: 3 })
    ));

    let (mut host, host_sink) = in_lobby("s1");
    assert!(host.machine().can_start());
    host.start_game().unwrap();
    assert_eq!(
        host_sink.sent(),
        vec![ClientMessage::StartGame {
            room_id: "AB12".into()
        }]
    );
}

#[test]
fn word_is_submitted_only_on_own_turn() {
    let (mut dispatcher, sink) = in_lobby("s1");
    feed(
        &mut dispatcher,
        &[
            game_started_json("CITIZEN", Some("Banana"), "Fruits"),
            turn_update_json("s2"),
        ],
    );
    assert!(matches!(
        dispatcher.submit_word("yellow").unwrap_err(),
        SpyWordError::Validation(ValidationError::NotYourTurn)
    ));

    dispatcher.dispatch_json(&turn_update_json("s1"));
    assert!(dispatcher.machine().is_my_turn());
    assert!(matches!(
        dispatcher.submit_word("   ").unwrap_err(),
        SpyWordError::Validation(ValidationError::EmptyWord)
    ));
    dispatcher.submit_word("  yellow ").unwrap();
    assert_eq!(
        sink.sent(),
        vec![ClientMessage::SubmitWord {
            room_id: "AB12".into(),
            word: "yellow".into(),
        }]
    );
}

#[test]
fn server_error_sets_notice_until_dismissed() {
    let (mut dispatcher, _sink) = dispatcher_as("s1");
    dispatcher.dispatch_json(&error_json("Room not found"));
    assert_eq!(dispatcher.session().notice.as_deref(), Some("Room not found"));
    assert_eq!(dispatcher.phase(), Phase::Login);
    dispatcher.dispatch_json(&error_json("Name taken"));
    assert_eq!(dispatcher.session().notice.as_deref(), Some("Name taken"));
    dispatcher.dismiss_notice();
    assert!(dispatcher.session().notice.is_none());
}

#[test]
fn reset_returns_to_login_but_keeps_connection_id() {
    let (mut dispatcher, _sink) = in_voting("s1");
    dispatcher.reset();
    let session = dispatcher.session();
    assert_eq!(session.phase, Phase::Login);
    assert!(session.room.is_none());
    assert!(session.my_role.is_none());
    assert_eq!(session.self_id.as_deref(), Some("s1"));
    assert!(dispatcher.machine().log().is_empty());
}

// ════════════════════════════════════════════════════════════════════
// Ignored and malformed events
// ════════════════════════════════════════════════════════════════════

#[test]
fn malformed_and_unknown_frames_are_dropped() {
    let (mut dispatcher, _sink) = in_lobby("s1");
    let before = dispatcher.session().clone();

    for frame in [
        "not json at all",
        r#"{"event":"confetti","data":{}}"#,
        r#"{"event":"timerTick","data":{"remainingSeconds":"ten"}}"#,
        r#"{"event":"gameStarted","data":{}}"#,
        r#"{"data":{"roomId":"ZZ"}}"#,
    ] {
        assert!(!dispatcher.dispatch_json(frame), "applied {frame}");
    }
    assert_eq!(dispatcher.session(), &before);
}

#[test]
fn game_started_outside_lobby_is_ignored() {
    let (mut dispatcher, _sink) = in_voting("s1");
    assert!(!dispatcher.dispatch_json(&game_started_json("IMPOSTER", None, "Animals")));
    assert_eq!(dispatcher.phase(), Phase::Voting);
    assert_eq!(dispatcher.session().my_role.as_deref(), Some("CITIZEN"));
}

#[test]
fn events_after_game_over_are_ignored() {
    let (mut dispatcher, _sink) = in_voting("s1");
    dispatcher.dispatch_json(&game_over_json("Imposter", json!([])));
    let ended = dispatcher.session().clone();

    for frame in [
        game_over_json("Citizens", json!([])),
        phase_change_json("PLAYING"),
        timer_tick_json(3),
        update_room_json("AB12", "s1", "LOBBY", ROSTER),
    ] {
        assert!(!dispatcher.dispatch_json(&frame));
    }
    assert_eq!(dispatcher.session(), &ended);
    assert!(ended.notification.unwrap().contains("Imposter"));
}

#[test]
fn events_after_teardown_are_ignored() {
    let (mut dispatcher, _sink) = in_lobby("s1");
    let (tx, subscription) = Subscription::channel(8);
    dispatcher.attach(subscription).unwrap();
    dispatcher.teardown();

    assert!(!dispatcher.is_attached());
    assert!(tx.is_closed());
    assert!(!dispatcher.dispatch_json(&game_started_json("IMPOSTER", None, "Animals")));
    assert!(!dispatcher.handle(ConnectionEvent::Disconnected { reason: None }));
    assert_eq!(dispatcher.phase(), Phase::Lobby);
}

#[test]
fn second_subscription_is_rejected_and_released() {
    let (mut dispatcher, _sink) = dispatcher_as("s1");
    let (_tx1, first) = Subscription::channel(8);
    let (tx2, second) = Subscription::channel(8);
    dispatcher.attach(first).unwrap();

    assert!(matches!(
        dispatcher.attach(second),
        Err(SpyWordError::AlreadySubscribed)
    ));
    assert!(tx2.is_closed());
    assert!(dispatcher.is_attached());
}

// ════════════════════════════════════════════════════════════════════
// Sound cues
// ════════════════════════════════════════════════════════════════════

#[test]
fn game_events_schedule_tones() {
    let render = RenderBackend::new(8_000);
    let config = SpyWordConfig::new().with_connection_id("s1");
    let mut dispatcher = Dispatcher::new(
        RecordingSink::new(),
        SoundEngine::with_backend(render.clone()),
        &config,
    );
    dispatcher.dispatch_json(&update_room_json("AB12", "s1", "LOBBY", ROSTER));

    // Ticks outside a game are silent.
    dispatcher.dispatch_json(&timer_tick_json(9));
    assert_eq!(render.tone_count(), 0);

    dispatcher.dispatch_json(&game_started_json("CITIZEN", Some("Banana"), "Fruits"));
    let after_start = render.tone_count();
    assert!(after_start > 0);

    dispatcher.dispatch_json(&timer_tick_json(9));
    assert!(render.tone_count() > after_start);
    assert!(render.peak() > 0.0);
}

#[test]
fn tones_still_play_after_teardown_and_reattach() {
    let render = RenderBackend::new(8_000);
    let config = SpyWordConfig::new().with_connection_id("s1");
    let mut dispatcher = Dispatcher::new(
        RecordingSink::new(),
        SoundEngine::with_backend(render.clone()),
        &config,
    );
    let (_tx, subscription) = Subscription::channel(8);
    dispatcher.attach(subscription).unwrap();
    dispatcher.teardown();
    let (_tx, subscription) = Subscription::channel(8);
    dispatcher.attach(subscription).unwrap();

    dispatcher.dispatch_json(&update_room_json("AB12", "s1", "LOBBY", ROSTER));
    dispatcher.dispatch_json(&game_started_json("CITIZEN", Some("Banana"), "Fruits"));
    assert_eq!(render.tone_count(), 4);
}

#[test]
fn muted_config_keeps_backend_silent() {
    let render = RenderBackend::new(8_000);
    let config = SpyWordConfig::new()
        .with_connection_id("s1")
        .with_muted(true);
    let mut dispatcher = Dispatcher::new(
        RecordingSink::new(),
        SoundEngine::with_backend(render.clone()),
        &config,
    );
    dispatcher.dispatch_json(&update_room_json("AB12", "s1", "LOBBY", ROSTER));
    dispatcher.dispatch_json(&game_started_json("CITIZEN", Some("Banana"), "Fruits"));
    assert_eq!(render.tone_count(), 0);

    assert!(!dispatcher.toggle_muted());
    dispatcher.dispatch_json(&phase_change_json("VOTING"));
    assert!(render.tone_count() > 0);
}

// ════════════════════════════════════════════════════════════════════
// End to end through a connection
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn full_round_over_mock_transport() {
    let frames = vec![
        room_created_json("AB12"),
        update_room_json("AB12", "s1", "LOBBY", ROSTER),
        game_started_json("CITIZEN", Some("Banana"), "Fruits"),
        turn_update_json("s1"),
    ];
    let (transport, sent, closed) = MockTransport::new(script(frames));
    let transport = transport.with_connection_id("s1");

    let config = SpyWordConfig::new();
    let (mut connection, subscription) = SpyWordConnection::start(transport, &config);
    let mut dispatcher = Dispatcher::new(connection.sender(), SoundEngine::silent(), &config);
    dispatcher.attach(subscription).unwrap();

    dispatcher.set_username("Ana");
    dispatcher.create_room().unwrap();

    settle(&mut dispatcher, |d| d.machine().is_my_turn()).await;
    assert!(dispatcher.is_connected());
    assert_eq!(dispatcher.session().self_id.as_deref(), Some("s1"));
    assert_eq!(dispatcher.phase(), Phase::Playing);

    dispatcher.submit_word("yellow").unwrap();
    tokio::time::timeout(Duration::from_secs(2), async {
        while sent.lock().unwrap().len() < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("intents were not written to the transport");

    assert_eq!(
        sent_messages(&sent),
        vec![
            ClientMessage::CreateRoom {
                username: "Ana".into(),
                avatar: "🐺".into(),
            },
            ClientMessage::SubmitWord {
                room_id: "AB12".into(),
                word: "yellow".into(),
            },
        ]
    );

    connection.shutdown().await;
    settle(&mut dispatcher, |d| !d.is_connected()).await;
    assert!(closed.load(std::sync::atomic::Ordering::Relaxed));
    assert!(matches!(
        dispatcher.cast_skip(),
        Ok(false) | Err(SpyWordError::NotConnected)
    ));
}

#[tokio::test]
async fn run_handles_every_event_until_server_closes() {
    let mut incoming = script(vec![
        room_created_json("AB12"),
        update_room_json("AB12", "s1", "LOBBY", ROSTER),
        "garbage".to_string(),
        game_started_json("IMPOSTER", None, "Animals"),
        r#"{"event":"confetti","data":{}}"#.to_string(),
        phase_change_json("VOTING"),
        timer_tick_json(7),
    ]);
    incoming.push(None);
    let (transport, _sent, _closed) = MockTransport::new(incoming);

    let config = SpyWordConfig::new().with_connection_id("s2");
    let (_connection, subscription) = SpyWordConnection::start(transport, &config);
    let mut dispatcher = Dispatcher::new(RecordingSink::new(), SoundEngine::silent(), &config);
    dispatcher.attach(subscription).unwrap();

    let handled = tokio::time::timeout(Duration::from_secs(2), dispatcher.run())
        .await
        .expect("run did not finish");

    // Connected, five decodable frames, Disconnected.
    assert_eq!(handled, 7);
    assert!(!dispatcher.is_attached());
    assert!(!dispatcher.is_connected());
    assert_eq!(dispatcher.session().self_id.as_deref(), Some("s2"));
    assert_eq!(dispatcher.phase(), Phase::Voting);
    assert_eq!(dispatcher.machine().turn_timer_remaining(), 7);
    assert!(dispatcher.session().my_word.is_none());
}

#[tokio::test]
async fn sender_rejects_intents_after_disconnect() {
    let (transport, _sent, _closed) = MockTransport::new(vec![None]);
    let config = SpyWordConfig::new();
    let (connection, mut subscription) = SpyWordConnection::start(transport, &config);

    let mut saw_disconnect = false;
    while let Some(event) = subscription.recv().await {
        if matches!(event, ConnectionEvent::Disconnected { reason: None }) {
            saw_disconnect = true;
        }
    }
    assert!(saw_disconnect);
    assert!(!connection.is_connected());
    assert!(matches!(
        connection.send(ClientMessage::StartGame {
            room_id: "AB12".into()
        }),
        Err(SpyWordError::NotConnected)
    ));
}
