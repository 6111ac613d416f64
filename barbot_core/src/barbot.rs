//! The orchestrating state machine.
//!
//! `BarBot::run` owns the mainboard link and drives one state handler per
//! tick. Action states (mixing, cleaning, crushing, straw, single
//! ingredient) run to completion inside a single tick; afterwards the loop
//! returns to idle, or to connecting when the link went down on the way.

use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use barbot_traits::catalog::CommandKind;
use barbot_traits::clock::Clock;
use crossbeam_channel as xch;

use crate::config::{MachineCfg, TimingCfg};
use crate::handle::{BarBotHandle, IdleTask, Queued, Request, Shared};
use crate::hw_error;
use crate::mainboard::Mainboard;
use crate::notify::Callbacks;
use crate::protocol::MessageType;
use crate::recipe::{IngredientType, MixingOptions, PortConfiguration, RecipeItem};
use crate::status::{BarBotState, UserInput, UserMessageType};
use crate::types::{BoardType, CommandResult, ErrorCode};

/// Where a draft goes: a pump port or the sugar dispenser.
#[derive(Debug, Clone, Copy)]
enum DraftTarget {
    Port(u8),
    Sugar,
}

pub struct BarBot {
    pub(crate) board: Mainboard,
    pub(crate) machine: MachineCfg,
    pub(crate) ports: PortConfiguration,
    pub(crate) timing: TimingCfg,
    pub(crate) clock: Arc<dyn Clock + Send + Sync>,
    pub(crate) address: Option<String>,
    pub(crate) demo_mode: bool,
    pub(crate) callbacks: Callbacks,
    pub(crate) shared: Arc<Shared>,
    pub(crate) requests: xch::Receiver<Request>,
    pub(crate) tasks: xch::Receiver<Queued>,
    pub(crate) request_tx: xch::Sender<Request>,
    pub(crate) task_tx: xch::Sender<Queued>,
    pub(crate) state: BarBotState,
    pub(crate) state_changed: bool,
    pub(crate) pending: VecDeque<IdleTask>,
    pub(crate) mixing: Option<MixingOptions>,
    pub(crate) item: Option<RecipeItem>,
    pub(crate) ports_to_clean: Vec<u8>,
    pub(crate) idle_timeouts: u32,
}

impl std::fmt::Debug for BarBot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BarBot")
            .field("state", &self.state)
            .field("board", &self.board)
            .field("address", &self.address)
            .field("demo_mode", &self.demo_mode)
            .finish()
    }
}

impl BarBot {
    /// A new handle for the UI side.
    pub fn handle(&self) -> BarBotHandle {
        BarBotHandle {
            shared: Arc::clone(&self.shared),
            requests: self.request_tx.clone(),
            tasks: self.task_tx.clone(),
        }
    }

    pub fn state(&self) -> BarBotState {
        self.state
    }

    pub fn machine(&self) -> &MachineCfg {
        &self.machine
    }

    /// Drive the state machine until shutdown.
    pub fn run(&mut self) {
        tracing::info!(state = %self.state, demo = self.demo_mode, "orchestrator started");
        while !self.shared.is_shutdown() {
            self.tick();
        }
        self.board.disconnect();
        self.shared.update(|s| s.connected = false);
        tracing::info!("orchestrator stopped");
    }

    /// One pass of the loop: run the current state's handler once.
    pub fn tick(&mut self) {
        self.shared.clear_abort();
        // A running action finishes before the link is restarted.
        if !self.state.is_action() && self.shared.take_reconnect() {
            if self.demo_mode {
                tracing::debug!("reconnect ignored in demo mode");
            } else {
                self.board.disconnect();
                self.set_state(BarBotState::Connecting);
            }
        }
        self.state_changed = false;
        match self.state {
            BarBotState::Connecting => self.on_connecting(),
            BarBotState::Searching => self.on_searching(),
            BarBotState::Startup => self.on_startup(),
            BarBotState::Idle => self.on_idle(),
            BarBotState::Mixing => self.on_mixing(),
            BarBotState::Cleaning => self.on_cleaning(),
            BarBotState::CleaningCycle => self.on_cleaning_cycle(),
            BarBotState::SingleIngredient => self.on_single_ingredient(),
            BarBotState::Crushing => {
                self.crush();
            }
            BarBotState::Straw => {
                self.straw();
            }
        }
        if !self.state_changed && self.state.is_action() {
            self.finish_action();
        }
    }

    // ── Publishing ──────────────────────────────────────────────────────────

    pub(crate) fn set_state(&mut self, state: BarBotState) {
        tracing::debug!(from = %self.state, to = %state, "state changed");
        self.state = state;
        self.state_changed = true;
        let connected = self.board.is_connected();
        self.shared.update(|s| {
            s.state = state;
            s.connected = connected;
        });
        self.callbacks.state_changed(state);
    }

    fn set_message(&mut self, message: UserMessageType) {
        if message == UserMessageType::None {
            tracing::debug!("user message cleared");
        } else {
            tracing::info!(?message, "showing user message");
        }
        self.shared.update(|s| s.message = message);
        self.callbacks.message_changed(message);
    }

    fn set_progress(&mut self, progress: u32) {
        self.shared.update(|s| s.progress = progress);
        self.callbacks.progress_changed(progress);
    }

    pub(crate) fn publish_connection(&self) {
        let firmware = self.board.firmware_version();
        let connected = self.board.is_connected();
        self.shared.update(|s| {
            s.connected = connected;
            s.firmware = firmware;
        });
        self.shared.install_abort_line(self.board.abort_sender());
    }

    // ── Waiting ─────────────────────────────────────────────────────────────

    fn aborted(&self) -> bool {
        self.shared.is_aborted()
    }

    fn interrupted(&self) -> bool {
        self.shared.is_shutdown() || self.shared.is_aborted()
    }

    /// Aborted, or the link is gone.
    fn halted(&self) -> bool {
        self.aborted() || !self.board.is_connected()
    }

    /// Show `message` and block until the user answers it.
    /// False when interrupted by abort, shutdown or link loss.
    fn ask(&mut self, message: UserMessageType) -> bool {
        // Cleared before the prompt is visible so an early answer is kept.
        self.shared.reset_user_input();
        self.set_message(message);
        self.wait_for(|bb| bb.shared.user_input() != UserInput::Undefined)
    }

    /// Re-check `cond` every poll interval (or on user input) until it holds.
    /// False when interrupted by abort, shutdown or link loss.
    fn wait_for(&mut self, mut cond: impl FnMut(&mut Self) -> bool) -> bool {
        loop {
            if self.interrupted() {
                return false;
            }
            if !self.board.is_connected() {
                tracing::warn!(state = %self.state, "link lost while waiting");
                return false;
            }
            if cond(self) {
                return true;
            }
            self.shared.wait_input(self.timing.poll_interval);
            if self.shared.user_input() == UserInput::Undefined {
                // Drains heartbeats; a dead port shows up here.
                self.board.read_message();
            }
        }
    }

    /// Sleep on the clock in poll-interval slices; cut short by abort or shutdown.
    fn pause(&self, d: Duration) {
        let start = self.clock.now();
        loop {
            if self.interrupted() {
                return;
            }
            let left = d.saturating_sub(self.clock.since(start));
            if left.is_zero() {
                return;
            }
            self.clock.sleep(left.min(self.timing.poll_interval));
        }
    }

    fn answered_yes(&self) -> bool {
        self.shared.user_input() == UserInput::Yes
    }

    // ── Connection states ───────────────────────────────────────────────────

    fn on_connecting(&mut self) {
        let address = self
            .address
            .clone()
            .filter(|a| barbot_config::is_valid_address(a));
        let Some(address) = address else {
            self.set_state(BarBotState::Searching);
            return;
        };
        match self.board.connect(&address) {
            Ok(()) => {
                self.publish_connection();
                self.set_state(BarBotState::Startup);
            }
            Err(e) => {
                tracing::warn!(error = %e, "connection failed, retrying");
                self.pause(self.timing.reconnect_delay);
            }
        }
    }

    fn on_searching(&mut self) {
        tracing::info!("searching for the mainboard");
        match self.board.find_device() {
            Some(address) => {
                tracing::info!(%address, "mainboard found");
                self.callbacks.device_found(&address);
                self.address = Some(address);
                self.set_state(BarBotState::Connecting);
            }
            None => self.pause(self.timing.reconnect_delay),
        }
    }

    fn on_startup(&mut self) {
        if !self.board.is_connected() {
            self.set_state(BarBotState::Connecting);
            return;
        }
        // The board starts talking once it has booted.
        let msg = self.board.read_message();
        if msg.kind != MessageType::Status {
            if hw_error::is_link_failure(&msg) || !self.board.is_connected() {
                self.set_state(BarBotState::Connecting);
            }
            return;
        }

        let boards = self.refresh_boards();
        if !boards.contains(&BoardType::Balance) {
            self.set_message(UserMessageType::BoardNotConnectedBalance);
        }
        let required = [
            (
                self.machine.stirrer_connected,
                BoardType::Mixer,
                UserMessageType::BoardNotConnectedMixer,
            ),
            (
                self.machine.straw_dispenser_connected,
                BoardType::Straw,
                UserMessageType::BoardNotConnectedStraw,
            ),
            (
                self.machine.ice_crusher_connected,
                BoardType::Crusher,
                UserMessageType::BoardNotConnectedCrusher,
            ),
            (
                self.machine.sugar_dispenser_connected,
                BoardType::Sugar,
                UserMessageType::BoardNotConnectedSugar,
            ),
        ];
        for (configured, board, message) in required {
            if configured && !boards.contains(&board) {
                tracing::warn!(?board, "configured board is not connected");
                if !self.ask(message) {
                    return;
                }
            }
        }
        self.set_message(UserMessageType::None);

        self.push_machine_config();
        self.set_state(BarBotState::Idle);
    }

    fn refresh_boards(&mut self) -> BTreeSet<BoardType> {
        let res = self.board.get("GetConnectedBoards", &[]);
        let mask = res.first().and_then(|v| v.parse::<u32>().ok()).unwrap_or(0);
        let boards = BoardType::decode_mask(mask);
        tracing::info!(?boards, "connected boards");
        let published = boards.clone();
        self.shared.update(|s| s.boards = published);
        boards
    }

    fn push_machine_config(&mut self) {
        let m = self.machine.clone();
        self.board.set("SetLED", &[&3]);
        self.board.set("SetSpeed", &[&m.max_speed]);
        self.board.set("SetAccel", &[&m.max_accel]);
        self.board.set("SetPumpPower", &[&m.pump_power]);
        self.push_balance(&m);
    }

    fn push_balance(&mut self, m: &MachineCfg) {
        // Firmware takes whole numbers.
        self.board
            .set("SetBalanceCalibration", &[&(m.balance_calibration as i32)]);
        self.board.set("SetBalanceOffset", &[&(m.balance_offset as i32)]);
    }

    // ── Idle ────────────────────────────────────────────────────────────────

    fn on_idle(&mut self) {
        let msg = self.board.read_message();
        if !self.board.is_connected() {
            self.set_state(BarBotState::Connecting);
            return;
        }
        if msg.kind == MessageType::Timeout {
            self.idle_timeouts += 1;
            if self.idle_timeouts >= self.timing.max_idle_timeouts {
                tracing::warn!(timeouts = self.idle_timeouts, "mainboard went silent");
                self.idle_timeouts = 0;
                self.board.disconnect();
                self.set_state(BarBotState::Connecting);
                return;
            }
        } else {
            self.idle_timeouts = 0;
        }

        if let Ok(request) = self.requests.try_recv() {
            self.begin(request);
            return;
        }

        while let Ok(queued) = self.tasks.try_recv() {
            match queued {
                Queued::Task(task) => self.pending.push_back(task),
                Queued::Calibrate {
                    offset,
                    calibration,
                } => {
                    tracing::info!(offset, calibration, "updating balance calibration");
                    self.machine.balance_offset = offset;
                    self.machine.balance_calibration = calibration;
                    self.pending.push_back(IdleTask::new(
                        CommandKind::Set,
                        "SetBalanceCalibration",
                        vec![(calibration as i32).to_string()],
                    ));
                    self.pending.push_back(IdleTask::new(
                        CommandKind::Set,
                        "SetBalanceOffset",
                        vec![(offset as i32).to_string()],
                    ));
                }
            }
        }
        if let Some(task) = self.pending.pop_front() {
            task.execute(&mut self.board);
        }
    }

    fn begin(&mut self, request: Request) {
        tracing::info!(?request, "starting action");
        self.shared.update(|s| {
            s.aborted = false;
            s.progress = 0;
        });
        match request {
            Request::Mix(options) => {
                let recipe = options.recipe.clone();
                self.shared.update(|s| s.recipe = Some(recipe));
                self.mixing = Some(options);
                self.set_state(BarBotState::Mixing);
            }
            Request::SingleIngredient(item) => {
                self.item = Some(item);
                self.set_state(BarBotState::SingleIngredient);
            }
            Request::Crush => self.set_state(BarBotState::Crushing),
            Request::Straw => self.set_state(BarBotState::Straw),
            Request::Clean(item) => {
                self.item = Some(item);
                self.set_state(BarBotState::Cleaning);
            }
            Request::CleaningCycle(ports) => {
                self.ports_to_clean = ports;
                self.set_state(BarBotState::CleaningCycle);
            }
        }
    }

    fn finish_action(&mut self) {
        if self.board.is_connected() {
            self.go_to_idle();
        } else {
            tracing::warn!(state = %self.state, "link lost during action");
            self.clear_current();
            self.set_message(UserMessageType::None);
            self.set_state(BarBotState::Connecting);
        }
        self.shared.action_done();
    }

    fn clear_current(&mut self) {
        self.mixing = None;
        self.item = None;
        self.ports_to_clean.clear();
        self.shared.update(|s| s.recipe = None);
    }

    fn go_to_idle(&mut self) {
        self.set_message(UserMessageType::None);
        self.board.set("SetLED", &[&3]);
        self.board.do_command("Move", &[&0]);
        self.board.do_command("Home", &[]);
        self.clear_current();
        self.set_state(BarBotState::Idle);
    }

    // ── Actions ─────────────────────────────────────────────────────────────

    fn has_glas(&mut self) -> bool {
        let res = self.board.get("HasGlas", &[]);
        res.success && res.first() == Some("1")
    }

    /// Ask for a glass and wait for it. False if the user cancelled or the wait was interrupted.
    fn await_glass(&mut self) -> bool {
        self.shared.reset_user_input();
        self.set_message(UserMessageType::PlaceGlas);
        if !self.has_glas() {
            self.board.set("PlatformLED", &[&2]);
            let ok = self.wait_for(|bb| {
                bb.shared.user_input() != UserInput::Undefined || bb.has_glas()
            });
            if !ok || self.shared.user_input() != UserInput::Undefined || self.halted() {
                return false;
            }
        }
        self.set_message(UserMessageType::None);
        true
    }

    fn on_mixing(&mut self) {
        let Some(options) = self.mixing.clone() else {
            tracing::warn!("mixing started without a recipe");
            return;
        };
        tracing::info!(recipe = %options.recipe.name, items = options.recipe.items.len(), "mixing");
        if !self.await_glass() {
            tracing::info!("mixing cancelled before start");
            return;
        }
        self.board.set("PlatformLED", &[&3]);
        let Some(add_ice) = self.choose(
            options.add_ice,
            self.machine.ice_crusher_connected,
            UserMessageType::AskForIce,
        ) else {
            return;
        };
        let Some(add_straw) = self.choose(
            options.add_straw,
            self.machine.straw_dispenser_connected,
            UserMessageType::AskForStraw,
        ) else {
            return;
        };
        self.pause(self.timing.settle);
        self.board.set("PlatformLED", &[&5]);
        self.board.set("SetLED", &[&5]);

        let mut progress = 0;
        for item in &options.recipe.items {
            if self.halted() {
                break;
            }
            self.item = Some(item.clone());
            if !self.draft_one(item) {
                break;
            }
            progress += 1;
            self.set_progress(progress);
        }

        if add_ice && !self.halted() {
            self.crush();
            progress += 1;
            self.set_progress(progress);
        }
        self.board.do_command("Move", &[&0]);
        if add_straw && !self.halted() {
            self.straw();
            progress += 1;
            self.set_progress(progress);
        }
        if self.halted() {
            tracing::info!(aborted = self.aborted(), "mixing stopped");
            return;
        }

        self.set_message(UserMessageType::MixingDoneRemoveGlas);
        self.board.set("PlatformLED", &[&2]);
        self.board.set("SetLED", &[&4]);
        self.pause(self.timing.done_display);
        self.board.set("PlatformLED", &[&0]);
        self.set_message(UserMessageType::None);
        tracing::info!(recipe = %options.recipe.name, "mixing finished");
        self.callbacks.mixing_finished(&options.recipe);
    }

    /// The caller's choice, or the user's answer when it was left open and
    /// the module is configured. `None` when the prompt was interrupted.
    fn choose(&mut self, given: Option<bool>, module: bool, prompt: UserMessageType) -> Option<bool> {
        match given {
            Some(choice) => Some(choice),
            None if !module => Some(false),
            None => {
                self.board.set("PlatformLED", &[&4]);
                if !self.ask(prompt) {
                    return None;
                }
                self.set_message(UserMessageType::None);
                Some(self.answered_yes())
            }
        }
    }

    fn on_single_ingredient(&mut self) {
        let Some(item) = self.item.clone() else {
            tracing::warn!("single ingredient started without an item");
            return;
        };
        if !self.await_glass() {
            return;
        }
        self.draft_one(&item);
    }

    /// Dispense one recipe item. False when the mixing run should stop.
    fn draft_one(&mut self, item: &RecipeItem) -> bool {
        if self.aborted() {
            return false;
        }
        let (target, mut weight) = match item.ingredient.kind {
            IngredientType::Stirr => {
                tracing::info!("stirring");
                let seconds = self.machine.stirring_time_ms / 1000;
                self.board.do_command("Mix", &[&seconds]);
                return !self.aborted();
            }
            IngredientType::Sugar => (
                DraftTarget::Sugar,
                item.sugar_weight(self.machine.sugar_per_unit),
            ),
            _ => match self.ports.port_of_ingredient(&item.ingredient) {
                Some(port) => (DraftTarget::Port(port), item.liquid_weight()),
                None => {
                    tracing::error!(ingredient = %item.ingredient.identifier, "ingredient is not connected to any port");
                    return false;
                }
            },
        };
        let power = if item.ingredient.kind == IngredientType::Sirup {
            self.machine.pump_power_sirup
        } else {
            self.machine.pump_power
        };

        loop {
            tracing::info!(ingredient = %item.ingredient.identifier, ?target, weight, "drafting");
            let result = match target {
                DraftTarget::Sugar => self.board.do_command("Sugar", &[&weight]),
                DraftTarget::Port(port) => {
                    self.board.set("SetPumpPower", &[&power]);
                    self.board.do_command("Draft", &[&port, &weight])
                }
            };
            if self.aborted() {
                return false;
            }
            if result.success {
                return true;
            }
            if !self.board.is_connected() {
                return false;
            }
            match result.error() {
                Some(ErrorCode::IngredientEmpty) => {
                    let Some(remaining) = result.error_extra() else {
                        self.report_unknown_error(&result, Some(ErrorCode::IngredientEmpty));
                        return false;
                    };
                    weight = remaining;
                    tracing::warn!(ingredient = %item.ingredient.identifier, remaining = weight, "ingredient empty");
                    if !self.ask(UserMessageType::IngredientEmpty) {
                        return false;
                    }
                    self.set_message(UserMessageType::None);
                    if !self.answered_yes() {
                        return false;
                    }
                }
                Some(ErrorCode::GlasRemoved) => {
                    tracing::warn!("glass removed while drafting");
                    self.ask(UserMessageType::GlasRemovedWhileDrafting);
                    return false;
                }
                other => {
                    self.report_unknown_error(&result, other);
                    return false;
                }
            }
        }
    }

    fn report_unknown_error(&mut self, result: &CommandResult, code: Option<ErrorCode>) {
        tracing::error!(?code, payload = ?result.return_parameters, "unhandled mainboard error");
        self.ask(UserMessageType::UnknownError);
    }

    /// Run the ice crusher until it reports success or the user gives up.
    fn crush(&mut self) -> bool {
        let mut amount = self.machine.ice_amount;
        loop {
            tracing::info!(amount, "crushing ice");
            let result = self.board.do_command("Crush", &[&amount]);
            if result.success {
                return true;
            }
            if self.halted() {
                return false;
            }
            let message = match result.error() {
                Some(ErrorCode::IngredientEmpty) => {
                    let Some(remaining) = result.error_extra() else {
                        self.report_unknown_error(&result, Some(ErrorCode::IngredientEmpty));
                        return false;
                    };
                    tracing::warn!(remaining, "ice empty");
                    amount = remaining;
                    UserMessageType::IceEmpty
                }
                Some(ErrorCode::GlasRemoved) => {
                    tracing::warn!("glass removed while crushing");
                    self.ask(UserMessageType::GlasRemovedWhileDrafting);
                    return false;
                }
                Some(ErrorCode::CrusherCoverOpen) => UserMessageType::CrusherCoverOpen,
                Some(ErrorCode::CrusherTimeout) => UserMessageType::CrusherTimeout,
                Some(ErrorCode::I2c) => {
                    self.ask(UserMessageType::I2cError);
                    return false;
                }
                other => {
                    self.report_unknown_error(&result, other);
                    return false;
                }
            };
            if !self.ask(message) {
                return false;
            }
            self.set_message(UserMessageType::None);
            if !self.answered_yes() {
                return false;
            }
        }
    }

    /// Dispense a straw; on an empty magazine ask to refill and retry.
    fn straw(&mut self) -> bool {
        loop {
            let result = self.board.do_command("Straw", &[]);
            if result.success {
                return true;
            }
            if self.halted() {
                return false;
            }
            tracing::warn!(payload = ?result.return_parameters, "straw dispensing failed");
            if !self.ask(UserMessageType::StrawsEmpty) {
                return false;
            }
            self.set_message(UserMessageType::None);
            if !self.answered_yes() {
                return false;
            }
        }
    }

    fn on_cleaning_cycle(&mut self) {
        if !self.ask(UserMessageType::CleaningAdapter) {
            return;
        }
        self.set_message(UserMessageType::None);
        if !self.answered_yes() {
            tracing::info!("cleaning cancelled");
            return;
        }
        let ports = std::mem::take(&mut self.ports_to_clean);
        let duration = self.machine.cleaning_time_ms;
        for port in ports {
            if self.halted() {
                return;
            }
            tracing::info!(port, duration, "cleaning port");
            self.board.do_command("Clean", &[&port, &duration]);
        }
    }

    fn on_cleaning(&mut self) {
        let Some(item) = self.item.clone() else {
            tracing::warn!("cleaning started without an item");
            return;
        };
        let Some(port) = self.ports.port_of_ingredient(&item.ingredient) else {
            tracing::error!(ingredient = %item.ingredient.identifier, "ingredient is not connected to any port");
            return;
        };
        let weight = item.liquid_weight();
        tracing::info!(port, weight, "cleaning");
        self.board.do_command("Clean", &[&port, &weight]);
    }
}
