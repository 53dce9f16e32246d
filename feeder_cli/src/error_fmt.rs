//! Human-readable error descriptions and structured JSON error formatting.

use feeder_core::error::{BuildError, FeederError};

fn find_feeder_error(err: &eyre::Report) -> Option<&FeederError> {
    err.chain().find_map(|e| e.downcast_ref::<FeederError>())
}

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun. See etc/feeder_config.toml for a sample."
            ),
            missing => format!(
                "What happened: The feeder could not be assembled ({missing}).\nLikely causes: A device failed to initialize or was not wired into the builder.\nHow to fix: Run `petfeeder self-check` with --log-level=debug to see which device is missing."
            ),
        };
    }

    if let Some(fe) = find_feeder_error(err) {
        return match fe {
            FeederError::Network(detail) => format!(
                "What happened: The broker connection failed ({detail}).\nLikely causes: Broker unreachable, expired or mismatched TLS certificates, or the policy rejects the client id.\nHow to fix: Check [mqtt] host/port/client_id and the certificate paths, or use `run --offline` to test without a broker."
            ),
            FeederError::Timeout => "What happened: The load cell did not answer in time.\nLikely causes: HX711 not wired correctly, no power/ground, or weight.read_timeout_ms too low.\nHow to fix: Verify the hx711_dt/hx711_sck pins and power, and consider increasing weight.read_timeout_ms.".to_string(),
            FeederError::Hardware(detail) | FeederError::HardwareFault(detail) => format!(
                "What happened: A device reported an error ({detail}).\nLikely causes: Wrong pin numbers in [pins] or missing GPIO permissions.\nHow to fix: Fix the [pins] values; ensure the process may access /dev/gpiomem."
            ),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("read config") || lower.contains("no such file") {
        return format!(
            "What happened: The config file could not be read.\nLikely causes: Wrong --config path.\nHow to fix: Pass --config pointing at a TOML file (see etc/feeder_config.toml). Original: {msg}"
        );
    }

    if lower.contains("parse config")
        || lower.contains("must be")
        || lower.contains("must not")
        || lower.contains("missing field")
        || lower.contains("is not hh:mm")
    {
        return format!(
            "What happened: Configuration is invalid or incomplete.\nLikely causes: Missing [pins] entries (weight_enable, hx711_dt, hx711_sck, servo_enable, servo_left, servo_right, motion) or out-of-range values.\nHow to fix: Edit the TOML config and try again. Original: {msg}"
        );
    }

    if lower.contains("open ") && lower.contains("gpio") {
        return "What happened: Failed to initialize hardware pins.\nLikely causes: Incorrect pin numbers or insufficient GPIO permissions.\nHow to fix: Fix the [pins] values in the config; ensure the process has permission to access GPIO.".to_string();
    }

    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes: 3 broker, 4 device, 5 sensor timeout, 1 anything else.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match find_feeder_error(err) {
        Some(FeederError::Network(_)) => 3,
        Some(FeederError::Hardware(_) | FeederError::HardwareFault(_)) => 4,
        Some(FeederError::Timeout) => 5,
        _ => 1,
    }
}

fn reason_name(err: &eyre::Report) -> &'static str {
    if err.downcast_ref::<BuildError>().is_some() {
        return "Build";
    }
    match find_feeder_error(err) {
        Some(FeederError::Network(_)) => "Network",
        Some(FeederError::Hardware(_) | FeederError::HardwareFault(_)) => "Hardware",
        Some(FeederError::Timeout) => "Timeout",
        Some(FeederError::Config(_)) => "Config",
        Some(FeederError::State(_)) => "State",
        None => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    serde_json::json!({
        "reason": reason_name(err),
        "exit_code": exit_code_for_error(err),
        "message": humanize(err),
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_errors_survive_context() {
        let err = eyre::Report::new(FeederError::Network("publish to t: link disconnected".into()))
            .wrap_err("feeder stopped");
        assert_eq!(exit_code_for_error(&err), 3);
        assert!(humanize(&err).contains("broker connection failed"));
    }

    #[test]
    fn json_error_has_reason_and_message() {
        let err = eyre::Report::new(BuildError::InvalidConfig("topics must not be empty"));
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&err)).unwrap();
        assert_eq!(v["reason"], "Build");
        assert_eq!(v["exit_code"], 1);
        assert!(v["message"].as_str().unwrap().contains("topics must not be empty"));
    }

    #[test]
    fn unknown_errors_fall_back_to_generic_text() {
        let err = eyre::eyre!("something odd");
        assert!(humanize(&err).starts_with("Something went wrong."));
        assert_eq!(exit_code_for_error(&err), 1);
    }
}
