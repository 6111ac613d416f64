#![no_main]
use barbot_core::protocol::{self, HeartbeatFilter};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Any received line decodes to some message; re-decoding its rendering is stable.
    let msg = protocol::decode(data);
    let _ = HeartbeatFilter::default().should_log(&msg);
    let again = protocol::decode(&msg.to_string());
    assert_eq!(again.kind, msg.kind);
});
