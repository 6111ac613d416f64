#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! BarBot host logic (hardware-agnostic).
//!
//! All mainboard traffic goes through `barbot_traits::Transport`; the serial
//! port and the simulator live in `barbot_hardware`.
//!
//! ## Architecture
//!
//! - **Protocol**: line codec for the mainboard's text protocol (`protocol`)
//! - **Dispatcher**: DO/SET/GET exchanges with retries (`mainboard`)
//! - **Orchestrator**: the state machine driving connection, startup,
//!   idle polling and the mixing/cleaning actions (`barbot`)
//! - **Handle**: thread-safe UI surface: start requests, abort, user
//!   answers, idle tasks and an observable snapshot (`handle`)
//! - **Runner**: background thread owning the orchestrator (`runner`)
//!
//! The UI never blocks on hardware: the orchestrator runs on its own thread
//! and reports through `notify::Callbacks` and `handle::Snapshot`.

pub mod barbot;
pub mod builder;
pub mod config;
pub mod conversions;
pub mod error;
pub mod handle;
pub mod hw_error;
pub mod mainboard;
pub mod mocks;
pub mod notify;
pub mod protocol;
pub mod recipe;
pub mod runner;
pub mod status;
pub mod types;

pub use barbot::BarBot;
pub use builder::{BarBotBuilder, Missing, Set};
pub use config::{MachineCfg, TimingCfg};
pub use error::{BarBotError, BuildError, Report, Result};
pub use handle::{BarBotHandle, IdleTask, Snapshot};
pub use mainboard::Mainboard;
pub use notify::Callbacks;
pub use protocol::{MessageType, ProtocolMessage};
pub use recipe::{Ingredient, IngredientType, MixingOptions, PortConfiguration, Recipe, RecipeItem};
pub use runner::Worker;
pub use status::{BarBotState, Responses, UserInput, UserMessageType};
pub use types::{BoardType, CommandResult, ErrorCode, FirmwareVersion};
