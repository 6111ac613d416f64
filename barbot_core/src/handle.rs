//! UI-side handle to a running orchestrator.
//!
//! The UI never touches hardware. Start requests and idle tasks travel to
//! the worker over channels; the user's answer lives behind a mutex and
//! condvar; abort and shutdown are atomics. Observable fields are published
//! by the worker into a `Snapshot`.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use barbot_traits::LineSender;
use barbot_traits::catalog::{ABORT, CommandKind};
use crossbeam_channel as xch;

use crate::error::BarBotError;
use crate::mainboard::Mainboard;
use crate::recipe::{MixingOptions, Recipe, RecipeItem};
use crate::status::{BarBotState, UserInput, UserMessageType};
use crate::types::{BoardType, CommandResult, FirmwareVersion};

pub type IdleCallback = Box<dyn FnOnce(CommandResult) + Send>;

/// A single command executed by the worker while idle.
pub struct IdleTask {
    pub kind: CommandKind,
    pub command: String,
    pub params: Vec<String>,
    callback: Option<IdleCallback>,
}

impl std::fmt::Debug for IdleTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdleTask")
            .field("kind", &self.kind)
            .field("command", &self.command)
            .field("params", &self.params)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

impl IdleTask {
    pub fn new(kind: CommandKind, command: impl Into<String>, params: Vec<String>) -> Self {
        Self {
            kind,
            command: command.into(),
            params,
            callback: None,
        }
    }

    pub fn with_callback(mut self, cb: impl FnOnce(CommandResult) + Send + 'static) -> Self {
        self.callback = Some(Box::new(cb));
        self
    }

    pub(crate) fn execute(self, board: &mut Mainboard) {
        tracing::debug!(command = %self.command, kind = %self.kind, "running idle task");
        let result = board.execute(self.kind, &self.command, &self.params);
        if let Some(cb) = self.callback {
            cb(result);
        }
    }
}

#[derive(Debug)]
pub(crate) enum Request {
    Mix(MixingOptions),
    SingleIngredient(RecipeItem),
    Crush,
    Straw,
    Clean(RecipeItem),
    CleaningCycle(Vec<u8>),
}

pub(crate) enum Queued {
    Task(IdleTask),
    Calibrate { offset: f32, calibration: f32 },
}

/// Everything the UI may observe.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub state: BarBotState,
    pub message: UserMessageType,
    pub progress: u32,
    pub aborted: bool,
    pub connected: bool,
    pub firmware: FirmwareVersion,
    pub boards: BTreeSet<BoardType>,
    pub recipe: Option<Recipe>,
}

impl Snapshot {
    pub(crate) fn new(state: BarBotState) -> Self {
        Self {
            state,
            message: UserMessageType::None,
            progress: 0,
            aborted: false,
            connected: false,
            firmware: FirmwareVersion::default(),
            boards: BTreeSet::new(),
            recipe: None,
        }
    }
}

pub(crate) struct Shared {
    abort_mixing: AtomicBool,
    shutdown: AtomicBool,
    reconnect: AtomicBool,
    /// Start requests sent but not yet finished.
    outstanding: AtomicUsize,
    input: Mutex<UserInput>,
    input_cv: Condvar,
    snapshot: Mutex<Snapshot>,
    snapshot_cv: Condvar,
    abort_line: Mutex<Option<Box<dyn LineSender>>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    pub(crate) fn new(initial: BarBotState) -> Self {
        Self {
            abort_mixing: AtomicBool::new(false),
            shutdown: AtomicBool::new(false),
            reconnect: AtomicBool::new(false),
            outstanding: AtomicUsize::new(0),
            input: Mutex::new(UserInput::Undefined),
            input_cv: Condvar::new(),
            snapshot: Mutex::new(Snapshot::new(initial)),
            snapshot_cv: Condvar::new(),
            abort_line: Mutex::new(None),
        }
    }

    pub(crate) fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    pub(crate) fn is_aborted(&self) -> bool {
        self.abort_mixing.load(Ordering::Acquire)
    }

    pub(crate) fn clear_abort(&self) {
        self.abort_mixing.store(false, Ordering::Release);
    }

    pub(crate) fn take_reconnect(&self) -> bool {
        self.reconnect.swap(false, Ordering::AcqRel)
    }

    pub(crate) fn action_done(&self) {
        let _ = self
            .outstanding
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }

    pub(crate) fn user_input(&self) -> UserInput {
        *lock(&self.input)
    }

    pub(crate) fn reset_user_input(&self) {
        *lock(&self.input) = UserInput::Undefined;
    }

    /// Block until the user answers or `timeout` passes.
    pub(crate) fn wait_input(&self, timeout: Duration) {
        let guard = lock(&self.input);
        if *guard == UserInput::Undefined {
            let _ = self
                .input_cv
                .wait_timeout(guard, timeout)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn wake(&self) {
        let _guard = lock(&self.input);
        self.input_cv.notify_all();
    }

    pub(crate) fn update(&self, f: impl FnOnce(&mut Snapshot)) {
        f(&mut lock(&self.snapshot));
        self.snapshot_cv.notify_all();
    }

    pub(crate) fn install_abort_line(&self, sender: Option<Box<dyn LineSender>>) {
        *lock(&self.abort_line) = sender;
    }
}

/// Cloneable, thread-safe handle for the UI.
#[derive(Clone)]
pub struct BarBotHandle {
    pub(crate) shared: Arc<Shared>,
    pub(crate) requests: xch::Sender<Request>,
    pub(crate) tasks: xch::Sender<Queued>,
}

impl std::fmt::Debug for BarBotHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BarBotHandle")
            .field("snapshot", &self.snapshot())
            .finish()
    }
}

impl BarBotHandle {
    fn request(&self, r: Request) -> Result<(), BarBotError> {
        self.shared.outstanding.fetch_add(1, Ordering::AcqRel);
        self.requests.send(r).map_err(|_| {
            self.shared.action_done();
            BarBotError::Stopped
        })
    }

    fn queue(&self, q: Queued) -> Result<(), BarBotError> {
        self.tasks.send(q).map_err(|_| BarBotError::Stopped)
    }

    /// Requests run in order once the machine is idle.
    pub fn start_mixing(&self, options: MixingOptions) -> Result<(), BarBotError> {
        self.request(Request::Mix(options))
    }

    pub fn start_single_ingredient(&self, item: RecipeItem) -> Result<(), BarBotError> {
        self.request(Request::SingleIngredient(item))
    }

    pub fn start_crushing(&self) -> Result<(), BarBotError> {
        self.request(Request::Crush)
    }

    pub fn start_straw(&self) -> Result<(), BarBotError> {
        self.request(Request::Straw)
    }

    /// Clean one port (with the cleaning-adapter prompt).
    pub fn start_cleaning(&self, port: u8) -> Result<(), BarBotError> {
        self.request(Request::CleaningCycle(vec![port]))
    }

    pub fn start_cleaning_cycle(&self, ports: Vec<u8>) -> Result<(), BarBotError> {
        self.request(Request::CleaningCycle(ports))
    }

    /// Run `Clean` on the port of `item` for the item's weight, without a prompt.
    pub fn start_cleaning_item(&self, item: RecipeItem) -> Result<(), BarBotError> {
        self.request(Request::Clean(item))
    }

    /// Abort the running action and interrupt the mainboard right away.
    pub fn abort_mixing(&self) {
        tracing::warn!("mixing aborted");
        self.shared.abort_mixing.store(true, Ordering::Release);
        self.shared.update(|s| s.aborted = true);
        if let Some(sender) = lock(&self.shared.abort_line).as_mut()
            && let Err(e) = sender.send_line(&format!("{ABORT}\r"))
        {
            tracing::warn!(error = %e, "sending ABORT failed");
        }
        self.shared.wake();
    }

    pub fn set_user_input(&self, input: UserInput) {
        *lock(&self.shared.input) = input;
        self.shared.input_cv.notify_all();
    }

    /// Restart the connection procedure (ignored in demo mode).
    pub fn reconnect(&self) {
        self.shared.reconnect.store(true, Ordering::Release);
    }

    /// Stop the orchestrator loop; pending waits return immediately.
    pub fn shutdown(&self) {
        self.shared.shutdown.store(true, Ordering::Release);
        self.shared.abort_mixing.store(true, Ordering::Release);
        self.shared.wake();
    }

    pub fn enqueue(&self, task: IdleTask) -> Result<(), BarBotError> {
        self.queue(Queued::Task(task))
    }

    /// Read the balance once idle; `None` when the read failed.
    pub fn get_weight(&self, cb: impl FnOnce(Option<f32>) + Send + 'static) -> Result<(), BarBotError> {
        let task = IdleTask::new(CommandKind::Get, "GetWeight", Vec::new()).with_callback(move |r| {
            let weight = if r.success { r.first().and_then(|v| v.parse().ok()) } else { None };
            cb(weight);
        });
        self.enqueue(task)
    }

    /// Query attached boards once idle; also refreshes the snapshot.
    pub fn get_boards_connected(
        &self,
        cb: impl FnOnce(BTreeSet<BoardType>) + Send + 'static,
    ) -> Result<(), BarBotError> {
        let shared = Arc::clone(&self.shared);
        let task = IdleTask::new(CommandKind::Get, "GetConnectedBoards", Vec::new()).with_callback(
            move |r| {
                let mask = r.first().and_then(|v| v.parse::<u32>().ok()).unwrap_or(0);
                let boards = BoardType::decode_mask(mask);
                shared.update(|s| s.boards = boards.clone());
                cb(boards);
            },
        );
        self.enqueue(task)
    }

    /// Store new balance parameters and push them to the board once idle.
    pub fn set_balance_calibration(&self, offset: f32, calibration: f32) -> Result<(), BarBotError> {
        self.queue(Queued::Calibrate {
            offset,
            calibration,
        })
    }

    pub fn snapshot(&self) -> Snapshot {
        lock(&self.shared.snapshot).clone()
    }

    pub fn state(&self) -> BarBotState {
        lock(&self.shared.snapshot).state
    }

    pub fn message(&self) -> UserMessageType {
        lock(&self.shared.snapshot).message
    }

    pub fn progress(&self) -> u32 {
        lock(&self.shared.snapshot).progress
    }

    pub fn is_busy(&self) -> bool {
        self.state() != BarBotState::Idle
    }

    /// Actions requested and not yet finished, the running one included.
    pub fn pending_actions(&self) -> usize {
        self.shared.outstanding.load(Ordering::Acquire)
    }

    pub fn was_aborted(&self) -> bool {
        lock(&self.shared.snapshot).aborted
    }

    pub fn firmware_version(&self) -> FirmwareVersion {
        lock(&self.shared.snapshot).firmware
    }

    pub fn connected_boards(&self) -> BTreeSet<BoardType> {
        lock(&self.shared.snapshot).boards.clone()
    }

    pub fn current_recipe(&self) -> Option<Recipe> {
        lock(&self.shared.snapshot).recipe.clone()
    }

    /// Block until `pred` holds for the published snapshot; false on timeout.
    pub fn wait_until(&self, timeout: Duration, mut pred: impl FnMut(&Snapshot) -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        let mut guard = lock(&self.shared.snapshot);
        loop {
            if pred(&guard) {
                return true;
            }
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                return false;
            }
            guard = self
                .shared
                .snapshot_cv
                .wait_timeout(guard, left)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }
}
