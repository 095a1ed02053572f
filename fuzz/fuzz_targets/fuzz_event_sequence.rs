#![no_main]

use libfuzzer_sys::fuzz_target;
use spyword_client::phase::PhaseStateMachine;
use spyword_client::protocol::{Phase, ServerMessage};

// One frame per line; undecodable lines are skipped like the client does.
fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    let mut machine = PhaseStateMachine::new(30, 3);
    machine.set_self_id(Some("s1".to_string()));
    let mut log_len = 0;

    for line in text.lines() {
        let Ok(msg) = serde_json::from_str::<ServerMessage>(line) else {
            continue;
        };
        let was_ended = machine.phase() == Phase::Ended;
        let phase_change = match &msg {
            ServerMessage::PhaseChange { phase_name } => Some(*phase_name),
            _ => None,
        };
        let resets_log = matches!(msg, ServerMessage::GameStarted { .. });

        let outcome = machine.apply(msg);

        if was_ended {
            assert!(!outcome.applied, "event applied after game over");
            assert_eq!(machine.phase(), Phase::Ended);
        }
        if let (Some(phase), true) = (phase_change, outcome.applied) {
            assert_eq!(machine.phase(), phase);
            assert!(!machine.has_voted());
        }
        if !(resets_log && outcome.applied) {
            assert!(machine.log().len() >= log_len, "log shrank");
        }
        log_len = machine.log().len();

        let _ = machine.cast_skip();
    }
});
