mod common;

use std::sync::{Arc, Mutex, OnceLock};

use barbot_core::{
    BarBot, BarBotHandle, BarBotState, BoardType, MachineCfg, RecipeItem, TimingCfg, UserInput,
    UserMessageType, Worker,
};
use barbot_hardware::ForcedReply;
use barbot_hardware::SimulatedMainboard;
use barbot_hardware::sim::SIMULATOR_ID;
use common::*;

fn builder(sim: &SimulatedMainboard, machine: MachineCfg) -> barbot_core::BarBotBuilder<barbot_core::Set> {
    BarBot::builder()
        .with_transport(sim.clone())
        .with_machine(machine)
        .with_timing(TimingCfg::fast())
        .with_address(Some(SIMULATOR_ID.to_string()))
}

#[test]
fn startup_pushes_machine_config_and_goes_idle() {
    let sim = SimulatedMainboard::new().instant();
    let (states, on_state) = recorder();
    let worker = Worker::spawn(
        builder(&sim, MachineCfg::default())
            .on_state_changed(on_state)
            .build()
            .unwrap(),
    )
    .unwrap();
    let h = worker.handle();

    assert!(eventually(|| h.state() == BarBotState::Idle));
    assert_eq!(
        *states.lock().unwrap(),
        vec![BarBotState::Startup, BarBotState::Idle]
    );
    let history = sim.history();
    let tail: Vec<&str> = history
        .iter()
        .skip_while(|l| !l.starts_with("SetLED"))
        .take(6)
        .map(String::as_str)
        .collect();
    assert_eq!(
        tail,
        vec![
            "SetLED 3",
            "SetSpeed 200",
            "SetAccel 300",
            "SetPumpPower 100",
            "SetBalanceCalibration -1040",
            "SetBalanceOffset -119",
        ]
    );
    assert_eq!(h.connected_boards().len(), 5);
    assert!(h.firmware_version().supports_is_idle());
    assert!(h.snapshot().connected);
}

#[test]
fn missing_crusher_waits_for_acknowledge() {
    let sim = SimulatedMainboard::new().instant();
    sim.set_getter("GetConnectedBoards", 0b00111);
    let machine = MachineCfg {
        ice_crusher_connected: true,
        ..MachineCfg::default()
    };
    let worker = Worker::spawn(builder(&sim, machine).build().unwrap()).unwrap();
    let h = worker.handle();

    assert!(eventually(|| h.message() == UserMessageType::BoardNotConnectedCrusher));
    assert_eq!(h.state(), BarBotState::Startup);
    assert!(!h.connected_boards().contains(&BoardType::Crusher));
    assert!(sent(&sim, "SetSpeed").is_empty());

    h.set_user_input(UserInput::Yes);
    assert!(eventually(|| h.state() == BarBotState::Idle));
    assert_eq!(h.message(), UserMessageType::None);
    assert_eq!(sent(&sim, "SetSpeed"), vec!["SetSpeed 200"]);
}

#[test]
fn missing_balance_is_shown_without_blocking() {
    let sim = SimulatedMainboard::new().instant();
    sim.set_getter("GetConnectedBoards", 0b00010);
    let (messages, on_message) = recorder();
    let worker = Worker::spawn(
        builder(&sim, MachineCfg::default())
            .on_message_changed(on_message)
            .build()
            .unwrap(),
    )
    .unwrap();
    let h = worker.handle();

    assert!(eventually(|| h.state() == BarBotState::Idle));
    assert_eq!(
        *messages.lock().unwrap(),
        vec![UserMessageType::BoardNotConnectedBalance, UserMessageType::None]
    );
}

#[test]
fn search_reports_the_found_device() {
    let sim = SimulatedMainboard::new().instant();
    let (found, on_found) = recorder::<String>();
    let bot = BarBot::builder()
        .with_transport(sim.clone())
        .with_timing(TimingCfg::fast())
        .on_device_found(move |a: &str| on_found(a.to_string()))
        .build()
        .unwrap();
    let worker = Worker::spawn(bot).unwrap();
    let h = worker.handle();

    assert!(eventually(|| h.state() == BarBotState::Idle));
    assert_eq!(*found.lock().unwrap(), vec![SIMULATOR_ID.to_string()]);
}

#[test]
fn lost_link_reconnects() {
    let sim = SimulatedMainboard::new().instant();
    let (states, on_state) = recorder();
    let worker = Worker::spawn(
        builder(&sim, MachineCfg::default())
            .on_state_changed(on_state)
            .build()
            .unwrap(),
    )
    .unwrap();
    let h = worker.handle();

    assert!(eventually(|| h.state() == BarBotState::Idle));
    sim.drop_link();
    assert!(eventually(|| {
        states
            .lock()
            .unwrap()
            .iter()
            .filter(|s| **s == BarBotState::Idle)
            .count()
            == 2
    }));
    assert!(
        states
            .lock()
            .unwrap()
            .contains(&BarBotState::Connecting)
    );
    assert_eq!(sent(&sim, "SetSpeed").len(), 2);
}

#[test]
fn reconnect_request_restarts_the_connection() {
    let sim = SimulatedMainboard::new().instant();
    let worker = Worker::spawn(builder(&sim, MachineCfg::default()).build().unwrap()).unwrap();
    let h = worker.handle();

    assert!(eventually(|| h.state() == BarBotState::Idle));
    h.reconnect();
    assert!(eventually(|| sent(&sim, "SetSpeed").len() == 2 && h.state() == BarBotState::Idle));
}

#[test]
fn demo_mode_ignores_reconnect() {
    let sim = SimulatedMainboard::new().instant();
    let (states, on_state) = recorder();
    let worker = Worker::spawn(demo(&sim).on_state_changed(on_state).build().unwrap()).unwrap();
    let h = worker.handle();

    assert_eq!(h.state(), BarBotState::Idle);
    h.reconnect();
    h.start_straw().unwrap();
    assert!(eventually(|| !sent(&sim, "Home").is_empty()));
    assert!(!states.lock().unwrap().contains(&BarBotState::Connecting));
    assert!(sent(&sim, "SetSpeed").is_empty());
}

type ConnectionLog = Arc<Mutex<Vec<(BarBotState, bool)>>>;

/// Worker that records every state together with the published `connected` flag.
fn spawn_logging_connection(sim: &SimulatedMainboard) -> (Worker, ConnectionLog) {
    let slot: Arc<OnceLock<BarBotHandle>> = Arc::new(OnceLock::new());
    let log: ConnectionLog = Arc::new(Mutex::new(Vec::new()));
    let (handle, sink) = (Arc::clone(&slot), Arc::clone(&log));
    let bot = builder(sim, MachineCfg::default())
        .with_ports(ports())
        .on_state_changed(move |state| {
            let connected = handle.get().is_some_and(|h| h.snapshot().connected);
            sink.lock().unwrap().push((state, connected));
        })
        .build()
        .unwrap();
    slot.set(bot.handle()).unwrap();
    (Worker::spawn(bot).unwrap(), log)
}

fn recovered_after_link_loss(log: &ConnectionLog) -> bool {
    let log = log.lock().unwrap();
    log.windows(2).any(|w| {
        w == [(BarBotState::Mixing, true), (BarBotState::Connecting, false)]
    }) && log.last() == Some(&(BarBotState::Idle, true))
}

#[test]
fn link_lost_while_waiting_for_the_glass() {
    let sim = SimulatedMainboard::new().instant();
    sim.set_getter("HasGlas", 0);
    let (worker, log) = spawn_logging_connection(&sim);
    let h = worker.handle();

    assert!(eventually(|| h.state() == BarBotState::Idle));
    h.start_mixing(mix(vec![RecipeItem::new(rum(), 4.0)])).unwrap();
    assert!(eventually(|| h.message() == UserMessageType::PlaceGlas));
    sim.drop_link();

    assert!(eventually(|| recovered_after_link_loss(&log)));
    assert_eq!(h.message(), UserMessageType::None);
    assert_eq!(h.pending_actions(), 0);
    assert!(sent(&sim, "Draft").is_empty());
}

#[test]
fn link_lost_while_a_prompt_is_open() {
    let sim = SimulatedMainboard::new().instant();
    sim.force_reply("Draft", ForcedReply::Error(vec!["33".into(), "10".into()]));
    let (worker, log) = spawn_logging_connection(&sim);
    let h = worker.handle();

    assert!(eventually(|| h.state() == BarBotState::Idle));
    h.start_mixing(mix(vec![RecipeItem::new(rum(), 4.0)])).unwrap();
    assert!(eventually(|| h.message() == UserMessageType::IngredientEmpty));
    sim.drop_link();

    assert!(eventually(|| recovered_after_link_loss(&log)));
    assert!(h.snapshot().connected);
    assert_eq!(sent(&sim, "Draft").len(), 1);
}
