#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Protocol serialization tests for the SpyWord client.
//!
//! Server fixtures are the JSON the game server actually sends; outbound
//! intents are checked field by field against what the server reads.

use serde_json::json;
use spyword_client::protocol::{
    Ballot, ClientMessage, GameState, Phase, Player, RevealedPlayer, RoomSnapshot, ServerMessage,
};

// ════════════════════════════════════════════════════════════════════
// Helper
// ════════════════════════════════════════════════════════════════════

fn parse(value: serde_json::Value) -> ServerMessage {
    serde_json::from_value(value).expect("deserialize")
}

fn encode(msg: &ClientMessage) -> serde_json::Value {
    serde_json::to_value(msg).expect("serialize")
}

// ════════════════════════════════════════════════════════════════════
// Outbound intents
// ════════════════════════════════════════════════════════════════════

#[test]
fn create_room_wire_shape() {
    let value = encode(&ClientMessage::CreateRoom {
        username: "Ana".into(),
        avatar: "🦊".into(),
    });
    assert_eq!(
        value,
        json!({"event": "createRoom", "data": {"username": "Ana", "avatar": "🦊"}})
    );
}

#[test]
fn join_room_wire_shape() {
    let value = encode(&ClientMessage::JoinRoom {
        room_id: "AB12".into(),
        username: "Bo".into(),
        avatar: "🐺".into(),
    });
    assert_eq!(value["event"], "joinRoom");
    assert_eq!(value["data"]["roomId"], "AB12");
    assert_eq!(value["data"]["username"], "Bo");
}

#[test]
fn start_game_and_submit_word_wire_shape() {
    assert_eq!(
        encode(&ClientMessage::StartGame {
            room_id: "AB12".into()
        }),
        json!({"event": "startGame", "data": {"roomId": "AB12"}})
    );
    assert_eq!(
        encode(&ClientMessage::SubmitWord {
            room_id: "AB12".into(),
            word: "yellow".into()
        }),
        json!({"event": "submitWord", "data": {"roomId": "AB12", "word": "yellow"}})
    );
}

#[test]
fn vote_carries_player_id_or_skip_sentinel() {
    let suspect = encode(&ClientMessage::Vote {
        room_id: "AB12".into(),
        suspect_id: Ballot::Suspect("p2".into()),
    });
    assert_eq!(suspect["data"]["suspectId"], "p2");

    let skip = encode(&ClientMessage::Vote {
        room_id: "AB12".into(),
        suspect_id: Ballot::Skip,
    });
    assert_eq!(
        skip,
        json!({"event": "vote", "data": {"roomId": "AB12", "suspectId": "SKIP"}})
    );
}

#[test]
fn intent_names_match_tags() {
    let intents = [
        ClientMessage::CreateRoom {
            username: "a".into(),
            avatar: "b".into(),
        },
        ClientMessage::StartGame {
            room_id: "c".into(),
        },
        ClientMessage::Vote {
            room_id: "c".into(),
            suspect_id: Ballot::Skip,
        },
    ];
    for intent in intents {
        assert_eq!(encode(&intent)["event"], intent.name());
    }
}

// ════════════════════════════════════════════════════════════════════
// Server JSON fixture tests
// ════════════════════════════════════════════════════════════════════

#[test]
fn fixture_update_room_from_server() {
    let msg = parse(json!({
        "event": "updateRoom",
        "data": {
            "roomId": "AB12",
            "host": "s1",
            "gameState": "LOBBY",
            "players": [
                {"id": "s1", "username": "Ana", "avatar": "🐺", "isAlive": true},
                {"id": "s2", "username": "Bo", "avatar": "🦊", "isAlive": true}
            ]
        }
    }));
    let ServerMessage::UpdateRoom(RoomSnapshot {
        room_id,
        host_id,
        game_state,
        players,
    }) = msg
    else {
        panic!("expected updateRoom");
    };
    assert_eq!(room_id, "AB12");
    assert_eq!(host_id, "s1");
    assert_eq!(game_state, GameState::Lobby);
    assert_eq!(players.len(), 2);
    assert_eq!(players[1].username, "Bo");
    assert!(players[1].role.is_none());
}

#[test]
fn fixture_update_room_with_unknown_state() {
    let msg = parse(json!({
        "event": "updateRoom",
        "data": {"roomId": "AB12", "host": "s1", "gameState": "REVEAL", "players": []}
    }));
    let ServerMessage::UpdateRoom(snapshot) = msg else {
        panic!("expected updateRoom");
    };
    assert_eq!(snapshot.game_state, GameState::Other);
}

#[test]
fn fixture_game_started_for_citizen_and_imposter() {
    let citizen = parse(json!({
        "event": "gameStarted",
        "data": {"role": "CITIZEN", "word": "Banana", "category": "Fruits"}
    }));
    assert_eq!(
        citizen,
        ServerMessage::GameStarted {
            role: "CITIZEN".into(),
            word: Some("Banana".into()),
            category: Some("Fruits".into()),
        }
    );

    let imposter = parse(json!({
        "event": "gameStarted",
        "data": {"role": "IMPOSTER", "word": null, "category": "Fruits"}
    }));
    let ServerMessage::GameStarted { word, .. } = imposter else {
        panic!("expected gameStarted");
    };
    assert!(word.is_none());
}

#[test]
fn fixture_turn_and_action_events() {
    assert_eq!(
        parse(json!({"event": "turnUpdate", "data": {"currentPlayerId": "s2"}})),
        ServerMessage::TurnUpdate {
            current_player_id: "s2".into()
        }
    );
    assert_eq!(
        parse(json!({
            "event": "playerAction",
            "data": {"username": "Bo", "action": "WORD", "payload": "yellow"}
        })),
        ServerMessage::PlayerAction {
            username: "Bo".into(),
            action: "WORD".into(),
            payload: "yellow".into(),
        }
    );
}

#[test]
fn fixture_phase_change_uses_screaming_case() {
    for (wire, phase) in [
        ("LOBBY", Phase::Lobby),
        ("PLAYING", Phase::Playing),
        ("VOTING", Phase::Voting),
        ("ENDED", Phase::Ended),
    ] {
        assert_eq!(
            parse(json!({"event": "phaseChange", "data": {"phaseName": wire}})),
            ServerMessage::PhaseChange { phase_name: phase }
        );
    }
}

#[test]
fn fixture_timer_tick_accepts_zero_and_negative() {
    for seconds in [30, 0, -1] {
        assert_eq!(
            parse(json!({"event": "timerTick", "data": {"remainingSeconds": seconds}})),
            ServerMessage::TimerTick {
                remaining_seconds: seconds
            }
        );
    }
}

#[test]
fn fixture_votes_and_round_result() {
    assert_eq!(
        parse(json!({"event": "voteUpdate", "data": {"votesCast": 2, "total": 4}})),
        ServerMessage::VoteUpdate {
            votes_cast: 2,
            total: 4
        }
    );
    assert_eq!(
        parse(json!({
            "event": "roundResult",
            "data": {"message": "Bo was eliminated", "role": "CITIZEN"}
        })),
        ServerMessage::RoundResult {
            message: "Bo was eliminated".into(),
            role: Some("CITIZEN".into()),
        }
    );
    assert_eq!(
        parse(json!({"event": "roundResult", "data": {"message": "Tie, nobody leaves"}})),
        ServerMessage::RoundResult {
            message: "Tie, nobody leaves".into(),
            role: None,
        }
    );
}

#[test]
fn fixture_game_over_with_partial_players() {
    let msg = parse(json!({
        "event": "gameOver",
        "data": {
            "winner": "Imposter",
            "players": [
                {"id": "s2", "role": "IMPOSTER"},
                {"id": "s3", "role": "CITIZEN", "word": "Banana", "isAlive": false}
            ]
        }
    }));
    let ServerMessage::GameOver { winner, players } = msg else {
        panic!("expected gameOver");
    };
    assert_eq!(winner, "Imposter");
    let players = players.unwrap();
    assert_eq!(
        players[0],
        RevealedPlayer {
            id: "s2".into(),
            role: Some("IMPOSTER".into()),
            ..Default::default()
        }
    );
    assert_eq!(players[1].is_alive, Some(false));
}

#[test]
fn fixture_game_over_without_players() {
    let msg = parse(json!({"event": "gameOver", "data": {"winner": "Citizens"}}));
    assert_eq!(
        msg,
        ServerMessage::GameOver {
            winner: "Citizens".into(),
            players: None
        }
    );
}

#[test]
fn fixture_error_and_room_created() {
    assert_eq!(
        parse(json!({"event": "error", "data": {"message": "Room not found"}})),
        ServerMessage::Error {
            message: "Room not found".into()
        }
    );
    assert_eq!(
        parse(json!({"event": "roomCreated", "data": {"roomId": "ZX81"}})),
        ServerMessage::RoomCreated {
            room_id: "ZX81".into()
        }
    );
}

// ════════════════════════════════════════════════════════════════════
// Rejected frames
// ════════════════════════════════════════════════════════════════════

#[test]
fn unknown_event_name_is_rejected() {
    let result: Result<ServerMessage, _> =
        serde_json::from_value(json!({"event": "confetti", "data": {}}));
    assert!(result.is_err());
}

#[test]
fn missing_required_field_is_rejected() {
    for frame in [
        json!({"event": "turnUpdate", "data": {}}),
        json!({"event": "voteUpdate", "data": {"votesCast": 1}}),
        json!({"event": "gameOver", "data": {"players": []}}),
        json!({"event": "updateRoom", "data": {"roomId": "AB12"}}),
        json!({"event": "gameOver", "data": {"winner": "X", "players": [{"role": "IMPOSTER"}]}}),
    ] {
        let result: Result<ServerMessage, _> = serde_json::from_value(frame.clone());
        assert!(result.is_err(), "accepted malformed frame {frame}");
    }
}

#[test]
fn wrong_field_type_is_rejected() {
    let result: Result<ServerMessage, _> = serde_json::from_value(
        json!({"event": "timerTick", "data": {"remainingSeconds": "ten"}}),
    );
    assert!(result.is_err());
}

#[test]
fn player_serializes_without_hidden_fields() {
    let player = Player {
        id: "s1".into(),
        username: "Ana".into(),
        avatar: "🐺".into(),
        is_alive: true,
        role: None,
        word: None,
    };
    assert_eq!(
        serde_json::to_value(&player).unwrap(),
        json!({"id": "s1", "username": "Ana", "avatar": "🐺", "isAlive": true})
    );
}
