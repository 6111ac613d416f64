use std::sync::Arc;
use std::thread;
use std::time::Duration;

use barbot_hardware::{ForcedReply, SimulatedMainboard};
use barbot_traits::Transport;
use barbot_traits::clock::ManualClock;
use rstest::rstest;

fn board() -> (SimulatedMainboard, ManualClock) {
    let clock = ManualClock::new();
    let mut sim = SimulatedMainboard::with_clock(Arc::new(clock.clone()));
    sim.connect("sim").unwrap();
    (sim, clock)
}

#[rstest]
#[case("SetLED 3", "ACK SetLED")]
#[case("PlatformLED 5", "ACK PlatformLED")]
#[case("HasGlas", "ACK HasGlas 1")]
#[case("GetConnectedBoards", "ACK GetConnectedBoards 31")]
#[case("GetFirmwareVersion", "ACK GetFirmwareVersion 40400")]
#[case("IsIdle", "ACK IsIdle 1")]
#[case("Straw", "ACK Straw")]
#[case("Warp 9", "NAK Warp")]
#[case("SetLED", "NAK SetLED")]
#[case("HasGlas 1", "NAK HasGlas")]
fn first_reply_by_command(#[case] line: &str, #[case] expected: &str) {
    let (mut sim, _clock) = board();
    sim.send(&format!("{line}\r")).unwrap();
    assert_eq!(sim.read_line().unwrap(), expected);
}

#[rstest]
fn is_idle_reports_zero_while_a_do_runs() {
    let (mut sim, _clock) = board();
    sim.set_duration("Home", Duration::from_secs(5));
    sim.send("Home\r").unwrap();
    assert_eq!(sim.read_line().unwrap(), "ACK Home");
    sim.send("IsIdle\r").unwrap();
    assert_eq!(sim.read_line().unwrap(), "ACK IsIdle 0");
}

#[rstest]
fn second_do_while_running_is_refused() {
    let (mut sim, _clock) = board();
    sim.set_duration("Mix", Duration::from_secs(5));
    sim.send("Mix 3\r").unwrap();
    assert_eq!(sim.read_line().unwrap(), "ACK Mix");
    sim.send("Move 0\r").unwrap();
    assert_eq!(sim.read_line().unwrap(), "NAK Move");
}

#[rstest]
fn forced_do_error_carries_payload_after_ack() {
    let (mut sim, _clock) = board();
    sim.force_reply("Draft", ForcedReply::Error(vec!["33".into(), "40".into()]));
    sim.send("Draft 2 100\r").unwrap();
    assert_eq!(sim.read_line().unwrap(), "ACK Draft");
    assert_eq!(sim.read_line().unwrap(), "ERROR Draft 33 40");
    // one-shot
    sim.send("Draft 2 40\r").unwrap();
    assert_eq!(sim.read_line().unwrap(), "ACK Draft");
}

#[rstest]
fn abort_from_another_thread_ends_the_do() {
    let mut sim = SimulatedMainboard::new().instant();
    sim.connect("sim").unwrap();
    sim.set_duration("Draft", Duration::from_secs(30));
    sim.send("Draft 1 200\r").unwrap();
    assert_eq!(sim.read_line().unwrap(), "ACK Draft");

    let mut sender = sim.sender().expect("simulator provides a sender");
    let t = thread::spawn(move || {
        thread::sleep(Duration::from_millis(10));
        sender.send_line("ABORT\r").unwrap();
    });

    let mut last = String::new();
    for _ in 0..10_000 {
        last = sim.read_line().unwrap();
        if !last.starts_with("STATUS") {
            break;
        }
    }
    t.join().unwrap();
    assert_eq!(last, "ERROR Draft 41 0");
    assert!(sim.history().iter().any(|l| l == "ABORT"));
}

#[rstest]
fn history_records_lines_in_order() {
    let (mut sim, _clock) = board();
    for line in ["SetLED 3\r", "Move 0\r"] {
        sim.send(line).unwrap();
        while sim.read_line().unwrap().starts_with("STATUS") {}
    }
    sim.send("Home\r").unwrap();
    assert_eq!(sim.commands(), vec!["SetLED", "Move", "Home"]);
    assert_eq!(sim.history()[1], "Move 0");
}
