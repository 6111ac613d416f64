#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parsing and validation may reject the input but must never panic,
    // and a validated config must convert into runtime settings.
    let Ok(cfg) = barbot_config::load_toml(data) else {
        return;
    };
    if cfg.validate().is_ok() {
        let _ = barbot_core::MachineCfg::from(&cfg.machine);
        let _ = barbot_core::TimingCfg::from(&cfg);
        let _ = barbot_core::PortConfiguration::from(&cfg);
    }
});
