#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use barbot_core::{
    BarBot, BarBotBuilder, Ingredient, IngredientType, MixingOptions, PortConfiguration, Recipe,
    RecipeItem, Set, TimingCfg,
};
use barbot_hardware::SimulatedMainboard;

pub const WAIT: Duration = Duration::from_secs(5);

pub fn rum() -> Ingredient {
    Ingredient::new("rum", "White Rum", IngredientType::Spirit)
}

pub fn lime() -> Ingredient {
    Ingredient::new("lime", "Lime Juice", IngredientType::Juice)
}

pub fn sirup() -> Ingredient {
    Ingredient::new("sirup", "Sugar Sirup", IngredientType::Sirup).with_density(1.3)
}

pub fn stir() -> Ingredient {
    Ingredient::new("stir", "Stir", IngredientType::Stirr)
}

/// rum on 0, lime on 1, sirup on 2.
pub fn ports() -> PortConfiguration {
    let mut p = PortConfiguration::new();
    p.set(0, "rum");
    p.set(1, "lime");
    p.set(2, "sirup");
    p
}

pub fn mix(items: Vec<RecipeItem>) -> MixingOptions {
    MixingOptions {
        recipe: Recipe {
            name: "Test".into(),
            items,
        },
        add_ice: Some(false),
        add_straw: Some(false),
    }
}

/// Demo-mode builder on a zero-latency simulator.
pub fn demo(sim: &SimulatedMainboard) -> BarBotBuilder<Set> {
    BarBot::builder()
        .with_transport(sim.clone())
        .with_ports(ports())
        .with_timing(TimingCfg::fast())
        .demo_mode(true)
}

/// Poll `f` until it holds or `WAIT` passes.
pub fn eventually(f: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        if f() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    f()
}

/// Shared log a callback can push into.
pub fn recorder<T: Send + 'static>() -> (Arc<Mutex<Vec<T>>>, impl Fn(T) + Send + 'static) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    (log, move |v| sink.lock().unwrap().push(v))
}

/// Lines the simulator received whose command is `name`.
pub fn sent(sim: &SimulatedMainboard, name: &str) -> Vec<String> {
    sim.history()
        .into_iter()
        .filter(|l| l.split_whitespace().next() == Some(name))
        .collect()
}
