#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(cmd) = feeder_core::parse_command(data) {
        // A message with no recognised key can never be valid.
        if cmd.requests.is_empty() && cmd.dispense_amount.is_none() && !cmd.heartbeat {
            assert!(!cmd.valid);
        }
    }
});
