#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the BarBot host.
//!
//! `Config` and its sections are deserialized from TOML; every section has
//! defaults matching the stock machine so an empty file is a valid config.
//! `validate()` rejects out-of-range values with a message naming the field.
use serde::Deserialize;

/// Number of pump ports on the mainboard.
pub const PORT_COUNT: u8 = 12;

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Connection {
    /// Serial device / RFCOMM path of the mainboard. Absent: search on startup.
    pub address: Option<String>,
    pub baud_rate: u32,
    /// Max wait for a single reply line (ms)
    pub read_timeout_ms: u64,
    /// Pause between failed connection attempts (ms)
    pub reconnect_delay_ms: u64,
    /// Consecutive silent idle reads before the link counts as lost
    pub max_idle_timeouts: u32,
}

impl Default for Connection {
    fn default() -> Self {
        Self {
            address: None,
            baud_rate: 115_200,
            read_timeout_ms: 1000,
            reconnect_delay_ms: 1000,
            max_idle_timeouts: 10,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Machine {
    pub max_speed: u32,
    pub max_accel: u32,
    pub pump_power: u8,
    pub pump_power_sirup: u8,
    pub balance_offset: f32,
    pub balance_calibration: f32,
    pub cleaning_time_ms: u32,
    pub stirrer_connected: bool,
    pub stirring_time_ms: u32,
    pub ice_crusher_connected: bool,
    /// Grams of crushed ice per drink
    pub ice_amount: u32,
    pub straw_dispenser_connected: bool,
    pub sugar_dispenser_connected: bool,
    /// Grams of sugar per recipe unit
    pub sugar_per_unit: u32,
}

impl Default for Machine {
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

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Timing {
    /// Re-check interval of every blocking wait (ms)
    pub poll_interval_ms: u64,
    /// Pause after the glass was detected, before drafting starts (ms)
    pub settle_ms: u64,
    /// How long "mixing done" is shown before homing (ms)
    pub done_display_ms: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            settle_ms: 1000,
            done_display_ms: 4000,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IngredientKind {
    Spirit,
    Juice,
    Sirup,
    Other,
    Stirr,
    Sugar,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngredientCfg {
    pub id: String,
    pub name: String,
    pub kind: IngredientKind,
    #[serde(default = "default_density")]
    pub density: f32,
}

fn default_density() -> f32 {
    1.0
}

#[derive(Debug, Deserialize, Clone)]
pub struct PortCfg {
    pub port: u8,
    /// `id` of an entry in `[[ingredients]]`
    pub ingredient: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub connection: Connection,
    #[serde(default)]
    pub machine: Machine,
    #[serde(default)]
    pub timing: Timing,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub ingredients: Vec<IngredientCfg>,
    #[serde(default)]
    pub ports: Vec<PortCfg>,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// An address is usable when it is non-empty and free of whitespace.
pub fn is_valid_address(address: &str) -> bool {
    !address.is_empty() && !address.chars().any(char::is_whitespace)
}

impl Config {
    pub fn ingredient(&self, id: &str) -> Option<&IngredientCfg> {
        self.ingredients.iter().find(|i| i.id == id)
    }

    pub fn validate(&self) -> eyre::Result<()> {
        // Connection
        if let Some(addr) = &self.connection.address
            && !is_valid_address(addr)
        {
            eyre::bail!("connection.address must be a non-empty path without whitespace");
        }
        if self.connection.baud_rate == 0 {
            eyre::bail!("connection.baud_rate must be > 0");
        }
        if self.connection.read_timeout_ms == 0 {
            eyre::bail!("connection.read_timeout_ms must be >= 1");
        }
        if self.connection.read_timeout_ms > 60_000 {
            eyre::bail!("connection.read_timeout_ms is unreasonably large (>60s)");
        }
        if self.connection.max_idle_timeouts == 0 {
            eyre::bail!("connection.max_idle_timeouts must be >= 1");
        }

        // Machine
        if self.machine.max_speed == 0 {
            eyre::bail!("machine.max_speed must be > 0");
        }
        if self.machine.max_accel == 0 {
            eyre::bail!("machine.max_accel must be > 0");
        }
        if !self.machine.balance_offset.is_finite() {
            eyre::bail!("machine.balance_offset must be finite");
        }
        if !self.machine.balance_calibration.is_finite() || self.machine.balance_calibration == 0.0
        {
            eyre::bail!("machine.balance_calibration must be finite and non-zero");
        }
        if self.machine.cleaning_time_ms == 0 {
            eyre::bail!("machine.cleaning_time_ms must be > 0");
        }
        if self.machine.stirrer_connected && self.machine.stirring_time_ms < 1000 {
            eyre::bail!("machine.stirring_time_ms must be >= 1000 when a stirrer is connected");
        }
        if self.machine.sugar_per_unit == 0 {
            eyre::bail!("machine.sugar_per_unit must be > 0");
        }

        // Timing
        if self.timing.poll_interval_ms == 0 {
            eyre::bail!("timing.poll_interval_ms must be >= 1");
        }
        if self.timing.done_display_ms > 60_000 {
            eyre::bail!("timing.done_display_ms is unreasonably large (>60s)");
        }

        // Logging
        if let Some(r) = self.logging.rotation.as_deref()
            && !matches!(r, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly, got '{r}'");
        }

        // Ingredients
        for (i, ing) in self.ingredients.iter().enumerate() {
            if ing.id.trim().is_empty() {
                eyre::bail!("ingredients[{i}].id must not be empty");
            }
            if !(ing.density.is_finite() && ing.density > 0.0) {
                eyre::bail!("ingredients[{i}].density must be > 0");
            }
            if self.ingredients[..i].iter().any(|o| o.id == ing.id) {
                eyre::bail!("ingredients[{i}].id '{}' is defined twice", ing.id);
            }
        }

        // Ports
        for (i, p) in self.ports.iter().enumerate() {
            if p.port >= PORT_COUNT {
                eyre::bail!("ports[{i}].port must be < {PORT_COUNT}");
            }
            if self.ports[..i].iter().any(|o| o.port == p.port) {
                eyre::bail!("ports[{i}].port {} is assigned twice", p.port);
            }
            if self.ingredient(&p.ingredient).is_none() {
                eyre::bail!(
                    "ports[{i}].ingredient '{}' is not listed in [[ingredients]]",
                    p.ingredient
                );
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_machine_defaults() {
        let cfg = load_toml("").unwrap();
        assert_eq!(cfg.machine.max_speed, 200);
        assert_eq!(cfg.machine.pump_power_sirup, 255);
        assert_eq!(cfg.timing.poll_interval_ms, 100);
        assert!(cfg.connection.address.is_none());
        cfg.validate().unwrap();
    }

    #[test]
    fn address_rules() {
        assert!(is_valid_address("/dev/rfcomm0"));
        assert!(is_valid_address("00:11:22:33:44:55"));
        assert!(!is_valid_address(""));
        assert!(!is_valid_address("/dev/tty USB0"));
    }
}
