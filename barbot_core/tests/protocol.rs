use barbot_core::protocol::{self, MessageType, ProtocolMessage};
use proptest::prelude::*;

fn token() -> impl Strategy<Value = String> {
    "[A-Za-z0-9_.\\-]{1,12}"
}

fn kind() -> impl Strategy<Value = MessageType> {
    prop_oneof![
        Just(MessageType::Ack),
        Just(MessageType::Nak),
        Just(MessageType::Error),
        Just(MessageType::Status),
        Just(MessageType::Done),
    ]
}

proptest! {
    #[test]
    fn received_lines_survive_display_and_decode(
        kind in kind(),
        command in token(),
        params in prop::collection::vec(token(), 0..4),
    ) {
        let msg = ProtocolMessage::new(kind, command, params);
        let line = format!("{msg}\r\n");
        prop_assert_eq!(protocol::decode(&line), msg);
    }

    #[test]
    fn decode_never_panics(line in "\\PC{0,64}") {
        let _ = protocol::decode(&line);
    }

    #[test]
    fn encoded_commands_are_single_terminated_lines(
        command in token(),
        params in prop::collection::vec(token(), 0..3),
    ) {
        let line = protocol::encode_command(&command, &params);
        prop_assert!(line.ends_with('\r'));
        prop_assert_eq!(line.matches('\r').count(), 1);
        prop_assert_eq!(line.trim_end().split(' ').count(), params.len() + 1);
    }
}

#[test]
fn weight_reply_round_trip() {
    let m = protocol::decode("ACK GetWeight 123.4\r\n");
    assert_eq!(m.kind, MessageType::Ack);
    assert_eq!(m.first_parameter(), Some("123.4"));
    assert_eq!(m.to_string(), "ACK GetWeight 123.4");
}

#[test]
fn error_frame_keeps_payload_order() {
    let m = protocol::decode("ERROR Draft 33 57");
    assert!(m.is(MessageType::Error, "Draft"));
    assert_eq!(m.parameters, vec!["33", "57"]);
}
