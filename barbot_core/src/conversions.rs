//! `From` implementations bridging `barbot_config` types to `barbot_core` types.

use std::time::Duration;

use crate::config::{MachineCfg, TimingCfg};
use crate::recipe::{Ingredient, IngredientType, PortConfiguration};

// ── MachineCfg ───────────────────────────────────────────────────────────────

impl From<&barbot_config::Machine> for MachineCfg {
    fn from(c: &barbot_config::Machine) -> Self {
        Self {
            max_speed: c.max_speed,
            max_accel: c.max_accel,
            pump_power: c.pump_power,
            pump_power_sirup: c.pump_power_sirup,
            balance_offset: c.balance_offset,
            balance_calibration: c.balance_calibration,
            cleaning_time_ms: c.cleaning_time_ms,
            stirrer_connected: c.stirrer_connected,
            stirring_time_ms: c.stirring_time_ms,
            ice_crusher_connected: c.ice_crusher_connected,
            ice_amount: c.ice_amount,
            straw_dispenser_connected: c.straw_dispenser_connected,
            sugar_dispenser_connected: c.sugar_dispenser_connected,
            sugar_per_unit: c.sugar_per_unit,
        }
    }
}

// ── TimingCfg ────────────────────────────────────────────────────────────────

impl From<&barbot_config::Config> for TimingCfg {
    fn from(c: &barbot_config::Config) -> Self {
        Self {
            poll_interval: Duration::from_millis(c.timing.poll_interval_ms),
            settle: Duration::from_millis(c.timing.settle_ms),
            done_display: Duration::from_millis(c.timing.done_display_ms),
            reconnect_delay: Duration::from_millis(c.connection.reconnect_delay_ms),
            max_idle_timeouts: c.connection.max_idle_timeouts,
        }
    }
}

// ── Ingredients ──────────────────────────────────────────────────────────────

impl From<barbot_config::IngredientKind> for IngredientType {
    fn from(k: barbot_config::IngredientKind) -> Self {
        use barbot_config::IngredientKind as K;
        match k {
            K::Spirit => IngredientType::Spirit,
            K::Juice => IngredientType::Juice,
            K::Sirup => IngredientType::Sirup,
            K::Other => IngredientType::Other,
            K::Stirr => IngredientType::Stirr,
            K::Sugar => IngredientType::Sugar,
        }
    }
}

impl From<&barbot_config::IngredientCfg> for Ingredient {
    fn from(c: &barbot_config::IngredientCfg) -> Self {
        Ingredient::new(c.id.clone(), c.name.clone(), c.kind.into()).with_density(c.density)
    }
}

// ── PortConfiguration ────────────────────────────────────────────────────────

impl From<&barbot_config::Config> for PortConfiguration {
    fn from(c: &barbot_config::Config) -> Self {
        let mut ports = PortConfiguration::new();
        for p in &c.ports {
            if !ports.set(p.port, p.ingredient.clone()) {
                tracing::warn!(port = p.port, "ignoring out-of-range port assignment");
            }
        }
        ports
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_maps_onto_runtime_types() {
        let cfg = barbot_config::load_toml(
            r#"
[machine]
pump_power = 90
[timing]
settle_ms = 0
[[ingredients]]
id = "lime"
name = "Lime"
kind = "juice"
[[ports]]
port = 5
ingredient = "lime"
"#,
        )
        .unwrap();
        let machine = MachineCfg::from(&cfg.machine);
        assert_eq!(machine.pump_power, 90);
        let timing = TimingCfg::from(&cfg);
        assert_eq!(timing.settle, Duration::ZERO);
        assert_eq!(timing.done_display, Duration::from_secs(4));
        let lime = Ingredient::from(&cfg.ingredients[0]);
        assert_eq!(lime.kind, IngredientType::Juice);
        assert_eq!(PortConfiguration::from(&cfg).port_of_ingredient(&lime), Some(5));
    }
}
