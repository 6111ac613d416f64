//! UI notification hooks, invoked synchronously on the orchestrator thread.

use crate::recipe::Recipe;
use crate::status::{BarBotState, UserMessageType};

pub type StateCallback = Box<dyn Fn(BarBotState) + Send>;
pub type MessageCallback = Box<dyn Fn(UserMessageType) + Send>;
pub type ProgressCallback = Box<dyn Fn(u32) + Send>;
pub type FinishedCallback = Box<dyn Fn(&Recipe) + Send>;
pub type DeviceCallback = Box<dyn Fn(&str) + Send>;

/// Unset hooks are no-ops.
#[derive(Default)]
pub struct Callbacks {
    pub on_state_changed: Option<StateCallback>,
    pub on_message_changed: Option<MessageCallback>,
    pub on_mixing_progress_changed: Option<ProgressCallback>,
    pub on_mixing_finished: Option<FinishedCallback>,
    /// A mainboard was discovered while searching; the address may be persisted.
    pub on_device_found: Option<DeviceCallback>,
}

impl std::fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_state_changed", &self.on_state_changed.is_some())
            .field("on_message_changed", &self.on_message_changed.is_some())
            .field("on_mixing_progress_changed", &self.on_mixing_progress_changed.is_some())
            .field("on_mixing_finished", &self.on_mixing_finished.is_some())
            .field("on_device_found", &self.on_device_found.is_some())
            .finish()
    }
}

impl Callbacks {
    pub(crate) fn state_changed(&self, state: BarBotState) {
        if let Some(cb) = &self.on_state_changed {
            cb(state);
        }
    }

    pub(crate) fn message_changed(&self, message: UserMessageType) {
        if let Some(cb) = &self.on_message_changed {
            cb(message);
        }
    }

    pub(crate) fn progress_changed(&self, progress: u32) {
        if let Some(cb) = &self.on_mixing_progress_changed {
            cb(progress);
        }
    }

    pub(crate) fn mixing_finished(&self, recipe: &Recipe) {
        if let Some(cb) = &self.on_mixing_finished {
            cb(recipe);
        }
    }

    pub(crate) fn device_found(&self, address: &str) {
        if let Some(cb) = &self.on_device_found {
            cb(address);
        }
    }
}
