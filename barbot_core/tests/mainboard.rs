use barbot_core::mainboard::{MAX_RETRIES, Mainboard};
use barbot_core::mocks::{Scripted, ScriptedTransport};
use barbot_core::{ErrorCode, FirmwareVersion};
use barbot_traits::catalog::CommandKind;
use rstest::rstest;

fn board() -> (Mainboard, ScriptedTransport) {
    let t = ScriptedTransport::new();
    (Mainboard::new(Box::new(t.clone())), t)
}

#[rstest]
#[case::set(CommandKind::Set, "SetLED", &["3"], "SetLED 3")]
#[case::do_command(CommandKind::Do, "Draft", &["2", "100"], "Draft 2 100")]
#[case::get(CommandKind::Get, "GetWeight", &[], "GetWeight")]
fn silent_board_gets_exactly_three_attempts(
    #[case] kind: CommandKind,
    #[case] command: &str,
    #[case] params: &[&str],
    #[case] line: &str,
) {
    let (mut mb, t) = board();
    let params: Vec<String> = params.iter().map(ToString::to_string).collect();
    let r = mb.execute(kind, command, &params);
    assert!(!r.success);
    assert_eq!(r.return_parameters, None);
    assert_eq!(t.sent(), vec![line; MAX_RETRIES]);
    // A timeout does not drop the link.
    assert!(mb.is_connected());
}

#[rstest]
fn draft_runs_through_status_to_done() {
    let (mut mb, t) = board();
    t.push_lines(&["ACK Draft", "STATUS Draft", "STATUS Draft", "DONE Draft"]);
    let r = mb.do_command("Draft", &[&2, &100]);
    assert!(r.success);
    assert_eq!(t.sent(), vec!["Draft 2 100"]);
    assert_eq!(t.remaining(), 0);
}

#[rstest]
fn do_error_is_returned_without_retry() {
    let (mut mb, t) = board();
    t.push_lines(&["ACK Crush", "STATUS Crush", "ERROR Crush 33 10"]);
    let r = mb.do_command("Crush", &[&100]);
    assert!(!r.success);
    assert_eq!(
        r.return_parameters,
        Some(vec!["33".to_string(), "10".to_string()])
    );
    assert_eq!(r.error(), Some(ErrorCode::IngredientEmpty));
    assert_eq!(r.error_extra(), Some(10));
    assert_eq!(t.sent().len(), 1);
}

#[rstest]
fn get_returns_first_value() {
    let (mut mb, t) = board();
    t.push_line("ACK GetWeight 123.4");
    let r = mb.get("GetWeight", &[]);
    assert!(r.success);
    assert_eq!(r.first(), Some("123.4"));
}

#[rstest]
fn get_without_value_fails_every_attempt() {
    let (mut mb, t) = board();
    t.push_lines(&["ACK GetWeight", "ACK GetWeight", "ACK GetWeight"]);
    let r = mb.get("GetWeight", &[]);
    assert!(!r.success);
    assert_eq!(t.sent().len(), MAX_RETRIES);
}

#[rstest]
fn get_with_two_values_is_retried() {
    let (mut mb, t) = board();
    t.push_lines(&["ACK GetWeight 1 2", "ACK GetWeight 7"]);
    let r = mb.get("GetWeight", &[]);
    assert!(r.success);
    assert_eq!(r.return_parameters, Some(vec!["7".to_string()]));
    assert_eq!(t.sent().len(), 2);
}

#[rstest]
#[case::nak(&["NAK SetSpeed", "ACK SetSpeed"], 2)]
#[case::wrong_echo(&["ACK SetAccel", "ACK SetSpeed"], 2)]
#[case::timeout_then_ack(&["ACK SetSpeed"], 1)]
fn set_retries_until_acknowledged(#[case] replies: &[&str], #[case] sends: usize) {
    let (mut mb, t) = board();
    t.push_lines(replies);
    let r = mb.set("SetSpeed", &[&200]);
    assert!(r.success);
    assert_eq!(t.sent().len(), sends);
}

#[rstest]
fn one_heartbeat_before_the_reply_is_skipped() {
    let (mut mb, t) = board();
    t.push_lines(&["STATUS IDLE", "ACK HasGlas 1"]);
    let r = mb.get("HasGlas", &[]);
    assert_eq!(r.first(), Some("1"));
    assert_eq!(t.sent().len(), 1);
}

#[rstest]
fn two_heartbeats_fail_the_attempt() {
    let (mut mb, t) = board();
    t.push_lines(&["STATUS IDLE", "STATUS IDLE", "ACK HasGlas 0"]);
    let r = mb.get("HasGlas", &[]);
    assert_eq!(r.first(), Some("0"));
    assert_eq!(t.sent().len(), 2);
}

#[rstest]
fn foreign_frame_during_do_fails_the_attempt() {
    let (mut mb, t) = board();
    t.push_lines(&["ACK Home", "STATUS Move", "ACK Home", "DONE Home"]);
    let r = mb.do_command("Home", &[]);
    assert!(r.success);
    assert_eq!(t.sent(), vec!["Home", "Home"]);
}

#[rstest]
fn link_failure_disconnects() {
    let (mut mb, t) = board();
    t.push(Scripted::Fail("device vanished".into()));
    let r = mb.do_command("Straw", &[]);
    assert!(!r.success);
    assert!(!mb.is_connected());
    // Later attempts cannot even send.
    assert_eq!(t.sent(), vec!["Straw"]);
}

#[rstest]
fn read_on_closed_link_is_comm_error() {
    let (mut mb, _t) = board();
    mb.disconnect();
    let m = mb.read_message();
    assert_eq!(m.kind, barbot_core::MessageType::CommError);
    assert_eq!(m.command, "port not open");
}

#[rstest]
#[case("40400", FirmwareVersion::new(4, 4, 0))]
#[case("30201", FirmwareVersion::new(3, 2, 1))]
fn connect_reads_firmware_version(#[case] raw: &str, #[case] expected: FirmwareVersion) {
    let (mut mb, t) = board();
    t.push_line(&format!("ACK GetFirmwareVersion {raw}"));
    mb.connect("00:11:22:33:44:55").unwrap();
    assert_eq!(mb.firmware_version(), expected);
}

#[rstest]
fn legacy_board_without_version_getter() {
    let (mut mb, t) = board();
    t.push_lines(&["NAK GetFirmwareVersion"; 3]);
    mb.connect("00:11:22:33:44:55").unwrap();
    assert_eq!(mb.firmware_version(), FirmwareVersion::default());
    assert!(!mb.firmware_version().supports_is_idle());
}

#[rstest]
#[case(CommandKind::Set, "SetLED", &["4"], "ACK SetLED", true)]
#[case(CommandKind::Get, "GetWeight", &[], "ACK GetWeight 7", true)]
#[case(CommandKind::Get, "GetWeight", &[], "ERROR GetWeight 34", false)]
fn execute_dispatches_by_kind(
    #[case] kind: CommandKind,
    #[case] command: &str,
    #[case] params: &[&str],
    #[case] reply: &str,
    #[case] ok: bool,
) {
    let (mut mb, t) = board();
    for _ in 0..MAX_RETRIES {
        t.push_line(reply);
    }
    let params: Vec<String> = params.iter().map(ToString::to_string).collect();
    assert_eq!(mb.execute(kind, command, &params).success, ok);
}
