//! Deterministic stand-in for the BarBot mainboard firmware.
//!
//! Speaks the same line protocol as the real board: ACK right after a
//! command, STATUS frames while a DO is running, then DONE. Getter values,
//! durations and one-shot failures are configurable, and every received
//! command is recorded for inspection.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use barbot_traits::catalog::{self, ABORT, CommandKind};
use barbot_traits::{BoxError, Clock, LineSender, MonotonicClock, Transport};

use crate::error::HwError;

/// Error code the firmware reports for a DO interrupted by `ABORT`.
pub const COMMAND_ABORTED: u16 = 41;

/// Identifier returned by `find_device`.
pub const SIMULATOR_ID: &str = "sim:barbot";

/// One-shot reply override for the next matching command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForcedReply {
    /// DO: ACK then `ERROR <cmd> <params..>`. SET/GET: `ERROR <cmd> <params..>` instead of ACK.
    Error(Vec<String>),
    Nak,
    /// No reply at all; the next read times out.
    Silence,
    /// Arbitrary raw line instead of the normal reply.
    Raw(String),
}

#[derive(Debug)]
struct Pending {
    line: Option<String>,
    ready_at: Instant,
}

#[derive(Debug)]
struct Running {
    command: String,
    started: Instant,
    duration: Duration,
    aborted: bool,
}

#[derive(Debug)]
struct SimState {
    connected: bool,
    link_lost: bool,
    outbox: VecDeque<Pending>,
    running: Option<Running>,
    getters: HashMap<String, String>,
    forced: HashMap<String, VecDeque<ForcedReply>>,
    history: Vec<String>,
    kind_durations: HashMap<CommandKind, Duration>,
    durations: HashMap<String, Duration>,
    status_interval: Duration,
    read_timeout: Duration,
}

impl Default for SimState {
    fn default() -> Self {
        let getters = [
            ("HasGlas", "1"),
            ("GetConnectedBoards", "31"),
            ("GetFirmwareVersion", "40400"),
            ("GetWeight", "0"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        let kind_durations = [
            (CommandKind::Do, Duration::from_millis(500)),
            (CommandKind::Set, Duration::from_millis(100)),
            (CommandKind::Get, Duration::from_millis(100)),
        ]
        .into_iter()
        .collect();
        Self {
            connected: false,
            link_lost: false,
            outbox: VecDeque::new(),
            running: None,
            getters,
            forced: HashMap::new(),
            history: Vec::new(),
            kind_durations,
            durations: HashMap::new(),
            status_interval: Duration::from_millis(300),
            read_timeout: Duration::from_secs(1),
        }
    }
}

impl SimState {
    fn duration_for(&self, command: &str, kind: CommandKind) -> Duration {
        self.durations
            .get(command)
            .or_else(|| self.kind_durations.get(&kind))
            .copied()
            .unwrap_or(Duration::ZERO)
    }

    fn queue(&mut self, line: Option<String>, ready_at: Instant) {
        self.outbox.push_back(Pending { line, ready_at });
    }
}

/// Cloneable handle; all clones share one simulated board.
#[derive(Clone)]
pub struct SimulatedMainboard {
    state: Arc<Mutex<SimState>>,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl Default for SimulatedMainboard {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SimulatedMainboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = self.lock();
        f.debug_struct("SimulatedMainboard")
            .field("connected", &st.connected)
            .field("running", &st.running.as_ref().map(|r| r.command.clone()))
            .field("received", &st.history.len())
            .finish()
    }
}

impl SimulatedMainboard {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(MonotonicClock::new()))
    }

    pub fn with_clock(clock: Arc<dyn Clock + Send + Sync>) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState::default())),
            clock,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Value the next (and every following) call of `getter` answers with.
    pub fn set_getter(&self, getter: &str, value: impl ToString) {
        self.lock().getters.insert(getter.to_string(), value.to_string());
    }

    /// Queue a one-shot reply override for the next `command`.
    pub fn force_reply(&self, command: &str, reply: ForcedReply) {
        self.lock()
            .forced
            .entry(command.to_string())
            .or_default()
            .push_back(reply);
    }

    pub fn set_kind_duration(&self, kind: CommandKind, d: Duration) {
        self.lock().kind_durations.insert(kind, d);
    }

    pub fn set_duration(&self, command: &str, d: Duration) {
        self.lock().durations.insert(command.to_string(), d);
    }

    pub fn set_status_interval(&self, d: Duration) {
        self.lock().status_interval = d;
    }

    /// How long a silenced request blocks before reporting a timeout.
    pub fn set_read_timeout(&self, d: Duration) {
        self.lock().read_timeout = d;
    }

    /// All zero durations and a short heartbeat; for tests.
    pub fn instant(self) -> Self {
        {
            let mut st = self.lock();
            for d in st.kind_durations.values_mut() {
                *d = Duration::ZERO;
            }
            st.status_interval = Duration::from_millis(2);
            st.read_timeout = Duration::from_millis(5);
        }
        self
    }

    /// Break the link: the next read fails and the board reports disconnected.
    pub fn drop_link(&self) {
        self.lock().link_lost = true;
    }

    /// Received lines (terminator stripped), oldest first.
    pub fn history(&self) -> Vec<String> {
        self.lock().history.clone()
    }

    /// Command names of the received lines.
    pub fn commands(&self) -> Vec<String> {
        self.lock()
            .history
            .iter()
            .filter_map(|l| l.split_whitespace().next().map(str::to_string))
            .collect()
    }

    pub fn clear_history(&self) {
        self.lock().history.clear();
    }

    /// Command name of the DO currently running, if any.
    pub fn running(&self) -> Option<String> {
        self.lock().running.as_ref().map(|r| r.command.clone())
    }

    fn accept(&self, raw: &str) -> Result<(), HwError> {
        let now = self.clock.now();
        let mut st = self.lock();
        if !st.connected {
            return Err(HwError::NotConnected);
        }
        let line = raw.trim_end_matches(['\r', '\n']);
        st.history.push(line.to_string());

        if line == ABORT {
            if let Some(r) = st.running.as_mut() {
                tracing::debug!(command = %r.command, "sim: abort requested");
                r.aborted = true;
            }
            return Ok(());
        }

        let mut tokens = line.split_whitespace();
        let Some(name) = tokens.next() else {
            return Ok(());
        };
        let params: Vec<&str> = tokens.collect();
        let Some(spec) = catalog::lookup(name) else {
            tracing::warn!(command = name, "sim: unknown command");
            st.queue(Some(format!("NAK {name}")), now);
            return Ok(());
        };
        if params.len() != spec.params {
            tracing::warn!(
                command = name,
                expected = spec.params,
                got = params.len(),
                "sim: wrong parameter count"
            );
            st.queue(Some(format!("NAK {name}")), now);
            return Ok(());
        }

        let ready_at = now + st.duration_for(name, spec.kind);
        let forced = st.forced.get_mut(name).and_then(VecDeque::pop_front);
        match forced {
            Some(ForcedReply::Nak) => st.queue(Some(format!("NAK {name}")), now),
            Some(ForcedReply::Silence) => st.queue(None, now),
            Some(ForcedReply::Raw(l)) => st.queue(Some(l), now),
            Some(ForcedReply::Error(payload)) => {
                let err = format!("ERROR {name} {}", payload.join(" "));
                if spec.kind == CommandKind::Do {
                    st.queue(Some(format!("ACK {name}")), now);
                    st.queue(Some(err), ready_at);
                } else {
                    st.queue(Some(err), ready_at);
                }
            }
            None => match spec.kind {
                CommandKind::Do => {
                    if st.running.is_some() {
                        st.queue(Some(format!("NAK {name}")), now);
                    } else {
                        st.queue(Some(format!("ACK {name}")), now);
                        let duration = st.duration_for(name, CommandKind::Do);
                        st.running = Some(Running {
                            command: name.to_string(),
                            started: now,
                            duration,
                            aborted: false,
                        });
                    }
                }
                CommandKind::Set => st.queue(Some(format!("ACK {name}")), ready_at),
                CommandKind::Get => {
                    let value = if name == "IsIdle" {
                        let idle = if st.running.is_some() { "0" } else { "1" };
                        idle.to_string()
                    } else {
                        st.getters.get(name).cloned().unwrap_or_else(|| "0".into())
                    };
                    st.queue(Some(format!("ACK {name} {value}")), ready_at);
                }
            },
        }
        Ok(())
    }

    fn next_line(&self) -> Result<String, HwError> {
        let mut st = self.lock();
        if st.link_lost {
            st.link_lost = false;
            st.connected = false;
            st.outbox.clear();
            st.running = None;
            return Err(HwError::LinkLost);
        }
        if !st.connected {
            return Err(HwError::NotConnected);
        }

        if let Some(p) = st.outbox.pop_front() {
            let read_timeout = st.read_timeout;
            drop(st);
            let wait = p.ready_at.saturating_duration_since(self.clock.now());
            self.clock.sleep(wait);
            return match p.line {
                Some(line) => Ok(line),
                None => {
                    self.clock.sleep(read_timeout);
                    Err(HwError::Timeout)
                }
            };
        }

        let Some(r) = st.running.as_ref() else {
            let interval = st.status_interval;
            drop(st);
            self.clock.sleep(interval);
            return Ok("STATUS IDLE".into());
        };
        if r.aborted {
            let command = r.command.clone();
            st.running = None;
            return Ok(format!("ERROR {command} {COMMAND_ABORTED} 0"));
        }
        let remaining = r.duration.saturating_sub(self.clock.since(r.started));
        let interval = st.status_interval;
        drop(st);
        if !remaining.is_zero() {
            self.clock.sleep(remaining.min(interval));
        }

        let mut st = self.lock();
        let Some(r) = st.running.as_ref() else {
            // Link dropped while sleeping.
            return Err(HwError::LinkLost);
        };
        let command = r.command.clone();
        if r.aborted {
            st.running = None;
            Ok(format!("ERROR {command} {COMMAND_ABORTED} 0"))
        } else if self.clock.since(r.started) >= r.duration {
            st.running = None;
            Ok(format!("DONE {command}"))
        } else {
            Ok(format!("STATUS {command}"))
        }
    }
}

impl Transport for SimulatedMainboard {
    fn connect(&mut self, identifier: &str) -> Result<(), BoxError> {
        let mut st = self.lock();
        st.connected = true;
        st.link_lost = false;
        st.outbox.clear();
        tracing::debug!(identifier, "sim: connected");
        Ok(())
    }

    fn disconnect(&mut self) {
        let mut st = self.lock();
        st.connected = false;
        st.outbox.clear();
        st.running = None;
    }

    fn is_connected(&self) -> bool {
        self.lock().connected
    }

    fn send(&mut self, line: &str) -> Result<(), BoxError> {
        self.accept(line).map_err(Into::into)
    }

    fn read_line(&mut self) -> Result<String, BoxError> {
        self.next_line().map_err(Into::into)
    }

    fn find_device(&mut self) -> Option<String> {
        Some(SIMULATOR_ID.to_string())
    }

    fn clear_input(&mut self) {
        self.lock().outbox.clear();
    }

    fn sender(&self) -> Option<Box<dyn LineSender>> {
        Some(Box::new(self.clone()))
    }
}

impl LineSender for SimulatedMainboard {
    fn send_line(&mut self, line: &str) -> Result<(), BoxError> {
        self.accept(line).map_err(Into::into)
    }
}
