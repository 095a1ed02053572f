#![no_main]

use libfuzzer_sys::fuzz_target;
use spyword_client::phase::PhaseStateMachine;
use spyword_client::protocol::ServerMessage;

fuzz_target!(|data: &[u8]| {
    // Raw-byte path, including serde_json's own UTF-8 validation.
    let _ = serde_json::from_slice::<ServerMessage>(data);

    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(msg) = serde_json::from_str::<ServerMessage>(s) {
            // Whatever decodes must apply without panicking.
            let mut machine = PhaseStateMachine::new(30, 3);
            let _ = machine.apply(msg);
        }
    }
});
