#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parsing and validation may reject the input but must never panic.
    if let Ok(cfg) = feeder_config::load_toml(data) {
        if cfg.validate().is_ok() {
            // A valid config must also convert into runtime settings.
            let _ = feeder_core::FeederSettings::from(&cfg);
        }
    }
});
