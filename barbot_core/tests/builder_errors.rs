use std::time::Duration;

use barbot_core::error::BuildError;
use barbot_core::mocks::ScriptedTransport;
use barbot_core::{BarBot, BarBotState, MachineCfg, TimingCfg};
use rstest::rstest;

#[rstest]
fn builder_missing_transport_yields_typed_build_error() {
    let err = BarBot::builder()
        // missing with_transport()
        .with_timing(TimingCfg::fast())
        .try_build()
        .expect_err("should fail with MissingTransport");

    match err.downcast_ref::<BuildError>() {
        Some(BuildError::MissingTransport) => {}
        other => panic!("expected MissingTransport, got: {other:?}"),
    }
}

#[rstest]
#[case::zero_poll(
    TimingCfg { poll_interval: Duration::ZERO, ..TimingCfg::fast() },
    MachineCfg::default()
)]
#[case::zero_idle_timeouts(
    TimingCfg { max_idle_timeouts: 0, ..TimingCfg::fast() },
    MachineCfg::default()
)]
#[case::zero_sugar_unit(
    TimingCfg::fast(),
    MachineCfg { sugar_per_unit: 0, ..MachineCfg::default() }
)]
#[case::nan_calibration(
    TimingCfg::fast(),
    MachineCfg { balance_calibration: f32::NAN, ..MachineCfg::default() }
)]
fn invalid_settings_are_rejected(#[case] timing: TimingCfg, #[case] machine: MachineCfg) {
    let err = BarBot::builder()
        .with_transport(ScriptedTransport::new())
        .with_timing(timing)
        .with_machine(machine)
        .build()
        .expect_err("should be rejected");
    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::InvalidConfig(_))
    ));
}

#[rstest]
fn fresh_bot_starts_connecting() {
    let bot = BarBot::builder()
        .with_transport(ScriptedTransport::new())
        .build()
        .unwrap();
    assert_eq!(bot.state(), BarBotState::Connecting);
    assert_eq!(bot.handle().state(), BarBotState::Connecting);
    assert!(!bot.handle().snapshot().connected);
}

#[rstest]
fn demo_bot_starts_idle_and_connected() {
    let t = ScriptedTransport::new();
    t.push_line("ACK GetFirmwareVersion 40400");
    let bot = BarBot::builder()
        .with_transport(t.clone())
        .with_address(Some("demo".into()))
        .demo_mode(true)
        .build()
        .unwrap();
    assert_eq!(bot.state(), BarBotState::Idle);
    let snap = bot.handle().snapshot();
    assert!(snap.connected);
    assert_eq!(snap.firmware.to_string(), "v4.4.0");
    assert_eq!(t.sent(), vec!["GetFirmwareVersion"]);
}
