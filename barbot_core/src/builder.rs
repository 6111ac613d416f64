//! Type-state builder for `BarBot`.
//!
//! `build()` only exists once a transport was provided; `try_build()` is
//! always available and reports the missing piece at runtime.

use std::collections::VecDeque;
use std::marker::PhantomData;
use std::sync::Arc;

use barbot_traits::Transport;
use barbot_traits::clock::{Clock, MonotonicClock};
use crossbeam_channel as xch;

use crate::barbot::BarBot;
use crate::config::{MachineCfg, TimingCfg};
use crate::error::{BuildError, Result};
use crate::handle::Shared;
use crate::mainboard::Mainboard;
use crate::notify::Callbacks;
use crate::recipe::{PortConfiguration, Recipe};
use crate::status::{BarBotState, UserMessageType};

impl BarBot {
    /// Start building a BarBot.
    pub fn builder() -> BarBotBuilder<Missing> {
        BarBotBuilder::default()
    }
}

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

pub struct BarBotBuilder<T> {
    transport: Option<Box<dyn Transport>>,
    machine: Option<MachineCfg>,
    ports: Option<PortConfiguration>,
    timing: Option<TimingCfg>,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    address: Option<String>,
    demo_mode: bool,
    callbacks: Callbacks,
    _t: PhantomData<T>,
}

impl Default for BarBotBuilder<Missing> {
    fn default() -> Self {
        Self {
            transport: None,
            machine: None,
            ports: None,
            timing: None,
            clock: None,
            address: None,
            demo_mode: false,
            callbacks: Callbacks::default(),
            _t: PhantomData,
        }
    }
}

impl BarBotBuilder<Missing> {
    pub fn with_transport(self, transport: impl Transport + 'static) -> BarBotBuilder<Set> {
        BarBotBuilder {
            transport: Some(Box::new(transport)),
            machine: self.machine,
            ports: self.ports,
            timing: self.timing,
            clock: self.clock,
            address: self.address,
            demo_mode: self.demo_mode,
            callbacks: self.callbacks,
            _t: PhantomData,
        }
    }
}

impl BarBotBuilder<Set> {
    pub fn build(self) -> Result<BarBot> {
        self.try_build()
    }
}

/// Chainable setters that do not affect type-state.
impl<T> BarBotBuilder<T> {
    pub fn with_machine(mut self, machine: MachineCfg) -> Self {
        self.machine = Some(machine);
        self
    }
    pub fn with_ports(mut self, ports: PortConfiguration) -> Self {
        self.ports = Some(ports);
        self
    }
    pub fn with_timing(mut self, timing: TimingCfg) -> Self {
        self.timing = Some(timing);
        self
    }
    /// Defaults to `MonotonicClock`.
    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }
    /// Last known mainboard address; searched for when absent or invalid.
    pub fn with_address(mut self, address: Option<String>) -> Self {
        self.address = address;
        self
    }
    /// Connect immediately and start idle, skipping discovery and startup checks.
    pub fn demo_mode(mut self, demo: bool) -> Self {
        self.demo_mode = demo;
        self
    }
    pub fn on_state_changed(mut self, f: impl Fn(BarBotState) + Send + 'static) -> Self {
        self.callbacks.on_state_changed = Some(Box::new(f));
        self
    }
    pub fn on_message_changed(mut self, f: impl Fn(UserMessageType) + Send + 'static) -> Self {
        self.callbacks.on_message_changed = Some(Box::new(f));
        self
    }
    pub fn on_mixing_progress_changed(mut self, f: impl Fn(u32) + Send + 'static) -> Self {
        self.callbacks.on_mixing_progress_changed = Some(Box::new(f));
        self
    }
    pub fn on_mixing_finished(mut self, f: impl Fn(&Recipe) + Send + 'static) -> Self {
        self.callbacks.on_mixing_finished = Some(Box::new(f));
        self
    }
    pub fn on_device_found(mut self, f: impl Fn(&str) + Send + 'static) -> Self {
        self.callbacks.on_device_found = Some(Box::new(f));
        self
    }

    /// Fallible build available in any type-state.
    pub fn try_build(self) -> Result<BarBot> {
        let transport = self
            .transport
            .ok_or_else(|| eyre::Report::new(BuildError::MissingTransport))?;
        let machine = self.machine.unwrap_or_default();
        let timing = self.timing.unwrap_or_default();

        if timing.poll_interval.is_zero() {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "poll_interval must be > 0",
            )));
        }
        if timing.max_idle_timeouts == 0 {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "max_idle_timeouts must be >= 1",
            )));
        }
        if machine.sugar_per_unit == 0 {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "sugar_per_unit must be > 0",
            )));
        }
        if !machine.balance_calibration.is_finite() || !machine.balance_offset.is_finite() {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "balance parameters must be finite",
            )));
        }

        let initial = if self.demo_mode {
            BarBotState::Idle
        } else {
            BarBotState::Connecting
        };
        let (request_tx, requests) = xch::unbounded();
        let (task_tx, tasks) = xch::unbounded();
        let clock: Arc<dyn Clock + Send + Sync> = match self.clock {
            Some(c) => c,
            None => Arc::new(MonotonicClock::new()),
        };

        let mut bot = BarBot {
            board: Mainboard::new(transport),
            machine,
            ports: self.ports.unwrap_or_default(),
            timing,
            clock,
            address: self.address,
            demo_mode: self.demo_mode,
            callbacks: self.callbacks,
            shared: Arc::new(Shared::new(initial)),
            requests,
            tasks,
            request_tx,
            task_tx,
            state: initial,
            state_changed: false,
            pending: VecDeque::new(),
            mixing: None,
            item: None,
            ports_to_clean: Vec::new(),
            idle_timeouts: 0,
        };

        if bot.demo_mode {
            let address = bot
                .address
                .clone()
                .or_else(|| bot.board.find_device())
                .unwrap_or_else(|| "demo".to_string());
            bot.board.connect(&address)?;
            bot.publish_connection();
        }
        Ok(bot)
    }
}
