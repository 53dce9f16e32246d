use feeder_config::{load_file, load_toml};
use rstest::rstest;
use std::fs;

const BASE: &str = r#"
[pins]
weight_enable = 21
hx711_dt = 5
hx711_sck = 6
servo_enable = 17
servo_left = 18
servo_right = 19
motion = 4
amp_enable = 22
"#;

fn with_section(extra: &str) -> String {
    format!("{BASE}\n{extra}")
}

#[rstest]
#[case("[pwm]\nfrequency_hz = 0", "pwm.frequency_hz must be > 0")]
#[case("[pwm]\nresolution_bits = 0", "pwm.resolution_bits")]
#[case(
    "[servo.left]\nmin_pulse_us = 2700\nmax_pulse_us = 320",
    "servo.left.min_pulse_us must be < max_pulse_us"
)]
#[case(
    "[servo.demo]\nmin_pulse_us = 500\nmax_pulse_us = 25000",
    "servo.demo.max_pulse_us must not exceed"
)]
#[case("[dispense]\nopen_angle = 200", "dispense.open_angle")]
#[case("[dispense]\nclose_step_deg = 0", "dispense.close_step_deg must be >= 1")]
#[case("[weight]\nsamples = 0", "weight.samples must be >= 1")]
#[case(
    "[weight.calibration]\ngain_g_per_count = 0.0\nzero_counts = 0",
    "gain_g_per_count must be finite and non-zero"
)]
#[case("[heartbeat]\ntimeout_ms = 0", "heartbeat.timeout_ms must be >= 1")]
#[case("[queues]\ntx_capacity = 0", "queues.tx_capacity must be >= 1")]
#[case("[mqtt]\ntopic_pub = \"\"", "must not be empty")]
#[case("[mqtt]\nroot_ca = \"certs/ca.pem\"", "must be set together")]
#[case(
    "[mqtt]\nkeep_alive_s = 5\npublish_interval_ms = 5000",
    "mqtt.publish_interval_ms must be shorter than mqtt.keep_alive_s"
)]
#[case("[schedule]\ntimes = [\"7:30pm\"]", "schedule.times entry")]
#[case("[schedule]\ntimes = [\"25:00\"]", "is not HH:MM")]
#[case("[schedule]\nweight_poll_ms = 0", "schedule.weight_poll_ms must be >= 1")]
#[case("[schedule]\nclient_id = \"pet-feeder\"", "differ from mqtt.client_id")]
#[case("[logging]\nrotation = \"weekly\"", "logging.rotation")]
fn rejects_out_of_range_values(#[case] section: &str, #[case] needle: &str) {
    let cfg = load_toml(&with_section(section)).expect("parse TOML");
    let err = cfg.validate().expect_err("should be rejected");
    let msg = format!("{err}");
    assert!(msg.contains(needle), "expected {needle:?} in {msg:?}");
}

#[test]
fn accepts_full_config() {
    let toml = with_section(
        r#"
[pwm]
frequency_hz = 50
resolution_bits = 15

[servo.left]
min_pulse_us = 320
max_pulse_us = 2700

[servo.right]
min_pulse_us = 320
max_pulse_us = 2650
max_degree = 180

[dispense]
open_angle = 141
open_step_deg = 5
close_step_deg = 15
step_delay_ms = 2
hold_ms = 500

[weight]
samples = 64
settle_us = 20

[weight.calibration]
gain_g_per_count = 0.000125
zero_counts = 0

[mqtt]
host = "example-ats.iot.us-east-1.amazonaws.com"
port = 8883
client_id = "petfeeder123456"
root_ca = "certs/aws-root-ca.pem"
certificate = "certs/certificate.pem.crt"
private_key = "certs/private.pem.key"

[schedule]
times = ["07:30", "18:00"]
amount_g = 40

[logging]
file = "feeder.log"
rotation = "daily"
"#,
    );
    let cfg = load_toml(&toml).expect("parse TOML");
    cfg.validate().expect("valid config should pass");
    assert_eq!(cfg.servo.left.max_degree, 180);
    assert_eq!(cfg.pins.amp_enable, Some(22));
    let cal = cfg.weight.calibration.expect("calibration present");
    assert_eq!(cal.offset_g, 0.0);
    let times = cfg.schedule.parsed_times().expect("times parse");
    assert_eq!(times.len(), 2);
    assert_eq!(cfg.schedule.amount_g, Some(40));
}

#[test]
fn load_file_reports_path_on_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.toml");
    fs::write(&path, "[pins\n").unwrap();
    let err = load_file(&path).expect_err("broken TOML");
    assert!(format!("{err}").contains("broken.toml"));
}

#[test]
fn load_file_validates() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cfg.toml");
    fs::write(&path, with_section("[weight]\nsamples = 0")).unwrap();
    let err = load_file(&path).expect_err("invalid");
    assert!(format!("{err}").contains("weight.samples"));
}
