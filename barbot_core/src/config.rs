//! Runtime configuration of the orchestrator.
//!
//! Separate from the TOML-deserialized config in `barbot_config`; see
//! `conversions` for the mapping.

use std::time::Duration;

/// Machine parameters pushed to the mainboard or used while mixing.
#[derive(Debug, Clone, PartialEq)]
pub struct MachineCfg {
    pub max_speed: u32,
    pub max_accel: u32,
    pub pump_power: u8,
    pub pump_power_sirup: u8,
    pub balance_offset: f32,
    pub balance_calibration: f32,
    pub cleaning_time_ms: u32,
    pub stirrer_connected: bool,
    /// Sent to `Mix` in whole seconds.
    pub stirring_time_ms: u32,
    pub ice_crusher_connected: bool,
    pub ice_amount: u32,
    pub straw_dispenser_connected: bool,
    pub sugar_dispenser_connected: bool,
    pub sugar_per_unit: u32,
}

impl Default for MachineCfg {
    fn default() -> Self {
        Self {
            max_speed: 200,
            max_accel: 300,
            pump_power: 100,
            pump_power_sirup: 255,
            balance_offset: -119.1,
            balance_calibration: -1040.0,
            cleaning_time_ms: 3000,
            stirrer_connected: true,
            stirring_time_ms: 3000,
            ice_crusher_connected: false,
            ice_amount: 100,
            straw_dispenser_connected: false,
            sugar_dispenser_connected: false,
            sugar_per_unit: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimingCfg {
    /// Re-check interval of blocking waits.
    pub poll_interval: Duration,
    /// Pause after the glass was detected.
    pub settle: Duration,
    /// How long "mixing done" stays on screen.
    pub done_display: Duration,
    /// Pause between failed connection attempts.
    pub reconnect_delay: Duration,
    /// Consecutive idle read timeouts treated as link loss.
    pub max_idle_timeouts: u32,
}

impl Default for TimingCfg {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            settle: Duration::from_secs(1),
            done_display: Duration::from_secs(4),
            reconnect_delay: Duration::from_secs(1),
            max_idle_timeouts: 10,
        }
    }
}

impl TimingCfg {
    /// No pauses and a short poll interval; for tests and the self-check.
    pub fn fast() -> Self {
        Self {
            poll_interval: Duration::from_millis(5),
            settle: Duration::ZERO,
            done_display: Duration::ZERO,
            reconnect_delay: Duration::from_millis(5),
            max_idle_timeouts: 10,
        }
    }
}
