#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas for the pet feeder.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - Every section except `[pins]` has defaults matching the reference board.
use chrono::NaiveTime;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Pins {
    /// Load-cell enable (active low)
    pub weight_enable: u8,
    pub hx711_dt: u8,
    pub hx711_sck: u8,
    /// Servo power rail enable
    pub servo_enable: u8,
    pub servo_left: u8,
    pub servo_right: u8,
    pub motion: u8,
    /// Audio amplifier enable; driven low at startup when present
    pub amp_enable: Option<u8>,
    /// Output used by the `sweep` demo; defaults to `servo_left`
    pub demo_servo: Option<u8>,
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct PwmCfg {
    pub frequency_hz: u32,
    pub resolution_bits: u8,
}

impl Default for PwmCfg {
    fn default() -> Self {
        Self {
            frequency_hz: 50,
            resolution_bits: 15,
        }
    }
}

/// Pulse-width limits of one servo.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct ServoLimits {
    pub min_pulse_us: u32,
    pub max_pulse_us: u32,
    #[serde(default = "default_max_degree")]
    pub max_degree: u32,
}

fn default_max_degree() -> u32 {
    180
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct ServoCfg {
    pub left: ServoLimits,
    pub right: ServoLimits,
    pub demo: ServoLimits,
}

impl Default for ServoCfg {
    fn default() -> Self {
        Self {
            left: ServoLimits {
                min_pulse_us: 320,
                max_pulse_us: 2700,
                max_degree: 180,
            },
            right: ServoLimits {
                min_pulse_us: 320,
                max_pulse_us: 2650,
                max_degree: 180,
            },
            demo: ServoLimits {
                min_pulse_us: 500,
                max_pulse_us: 2500,
                max_degree: 180,
            },
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DispenseCfg {
    /// Gate angle at the end of the opening sweep (degrees)
    pub open_angle: u32,
    pub open_step_deg: u32,
    pub close_step_deg: u32,
    pub step_delay_ms: u64,
    /// Time the gate stays open between the two sweeps
    pub hold_ms: u64,
    /// Finish the close sweep at 0 degrees even when the step skips it
    pub close_to_zero: bool,
    /// Initial dispense amount in grams until the cloud sends an update
    pub default_amount_g: u32,
}

impl Default for DispenseCfg {
    fn default() -> Self {
        Self {
            open_angle: 141,
            open_step_deg: 5,
            close_step_deg: 15,
            step_delay_ms: 2,
            hold_ms: 500,
            close_to_zero: false,
            default_amount_g: 0,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct WeightCalibrationCfg {
    /// grams per count
    pub gain_g_per_count: f32,
    /// tare zero in raw counts
    pub zero_counts: i32,
    /// additive offset in grams (rarely needed; default 0.0)
    #[serde(default)]
    pub offset_g: f32,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct WeightCfg {
    /// Readings averaged per sample
    pub samples: u32,
    /// Delay after enabling the load cell before the first read
    pub settle_us: u64,
    /// Max time to wait for a single conversion
    pub read_timeout_ms: u64,
    /// Optional raw-to-grams conversion; raw averages are reported when absent.
    pub calibration: Option<WeightCalibrationCfg>,
}

impl Default for WeightCfg {
    fn default() -> Self {
        Self {
            samples: 64,
            settle_us: 20,
            read_timeout_ms: 150,
            calibration: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MotionCfg {
    /// How long each wait on the sensor may block
    pub wait_ms: u64,
    /// Pause between waits
    pub poll_ms: u64,
}

impl Default for MotionCfg {
    fn default() -> Self {
        Self {
            wait_ms: 100,
            poll_ms: 1000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HeartbeatCfg {
    /// Dispense automatically when no valid message arrives for this long
    pub timeout_ms: u64,
}

impl Default for HeartbeatCfg {
    fn default() -> Self {
        Self {
            timeout_ms: 15 * 60 * 1000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct QueuesCfg {
    pub rx_capacity: usize,
    /// Inbound payloads larger than this are dropped
    pub rx_message_bytes: usize,
    pub tx_capacity: usize,
    pub motion_capacity: usize,
    /// Receive timeout of the command task
    pub command_poll_ms: u64,
}

impl Default for QueuesCfg {
    fn default() -> Self {
        Self {
            rx_capacity: 5,
            rx_message_bytes: 200,
            tx_capacity: 10,
            motion_capacity: 10,
            command_poll_ms: 10,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MqttCfg {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub topic_pub: String,
    pub topic_sub: String,
    pub keep_alive_s: u64,
    /// Upper bound for one connect call (capped at 250 ms)
    pub command_timeout_ms: u64,
    /// Max time each loop iteration waits for inbound messages
    pub yield_ms: u64,
    pub publish_interval_ms: u64,
    pub connect_retry_ms: u64,
    pub root_ca: Option<String>,
    pub certificate: Option<String>,
    pub private_key: Option<String>,
}

impl Default for MqttCfg {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8883,
            client_id: "pet-feeder".to_string(),
            topic_pub: "pet-feeder/to_aws".to_string(),
            topic_sub: "pet-feeder/from_aws".to_string(),
            keep_alive_s: 10,
            command_timeout_ms: 20_000,
            yield_ms: 100,
            publish_interval_ms: 5_000,
            connect_retry_ms: 1_000,
            root_ca: None,
            certificate: None,
            private_key: None,
        }
    }
}

/// Controlling side of the link (`petfeeder schedule`).
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ScheduleCfg {
    /// Daily dispense times, "HH:MM" in UTC
    pub times: Vec<String>,
    /// Interval between weight requests
    pub weight_poll_ms: u64,
    /// Max wait for an inbound report per loop iteration
    pub tick_ms: u64,
    /// Sent to the feeder as `{"update": amount}` at startup when set
    pub amount_g: Option<u32>,
    /// Must differ from `mqtt.client_id` when both run against one broker
    pub client_id: String,
}

impl Default for ScheduleCfg {
    fn default() -> Self {
        Self {
            times: Vec::new(),
            weight_poll_ms: 60_000,
            tick_ms: 500,
            amount_g: None,
            client_id: "pet-feeder-controller".to_string(),
        }
    }
}

impl ScheduleCfg {
    /// Parsed `times`, in the order given.
    pub fn parsed_times(&self) -> eyre::Result<Vec<NaiveTime>> {
        self.times
            .iter()
            .map(|t| {
                NaiveTime::parse_from_str(t.trim(), "%H:%M")
                    .map_err(|e| eyre::eyre!("schedule.times entry {t:?} is not HH:MM: {e}"))
            })
            .collect()
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub pins: Pins,
    #[serde(default)]
    pub pwm: PwmCfg,
    #[serde(default)]
    pub servo: ServoCfg,
    #[serde(default)]
    pub dispense: DispenseCfg,
    #[serde(default)]
    pub weight: WeightCfg,
    #[serde(default)]
    pub motion: MotionCfg,
    #[serde(default)]
    pub heartbeat: HeartbeatCfg,
    #[serde(default)]
    pub queues: QueuesCfg,
    #[serde(default)]
    pub mqtt: MqttCfg,
    #[serde(default)]
    pub schedule: ScheduleCfg,
    #[serde(default)]
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Read, parse and validate a config file.
pub fn load_file(path: &std::path::Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read config {:?}: {}", path, e))?;
    let cfg = load_toml(&text).map_err(|e| eyre::eyre!("parse config {:?}: {}", path, e))?;
    cfg.validate()?;
    Ok(cfg)
}

fn validate_servo(name: &str, s: &ServoLimits, period_us: u32) -> eyre::Result<()> {
    if s.max_degree == 0 {
        eyre::bail!("servo.{name}.max_degree must be >= 1");
    }
    if s.min_pulse_us >= s.max_pulse_us {
        eyre::bail!("servo.{name}.min_pulse_us must be < max_pulse_us");
    }
    if s.max_pulse_us > period_us {
        eyre::bail!("servo.{name}.max_pulse_us must not exceed the PWM period ({period_us} us)");
    }
    Ok(())
}

impl PwmCfg {
    /// PWM period in microseconds (frequency clamped to >= 1 Hz).
    pub fn period_us(&self) -> u32 {
        1_000_000 / self.frequency_hz.max(1)
    }
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // PWM
        if self.pwm.frequency_hz == 0 {
            eyre::bail!("pwm.frequency_hz must be > 0");
        }
        if self.pwm.frequency_hz > 1_000 {
            eyre::bail!("pwm.frequency_hz is unreasonably high for servos (>1kHz)");
        }
        if !(1..=20).contains(&self.pwm.resolution_bits) {
            eyre::bail!("pwm.resolution_bits must be in [1, 20]");
        }

        // Servos
        let period_us = self.pwm.period_us();
        validate_servo("left", &self.servo.left, period_us)?;
        validate_servo("right", &self.servo.right, period_us)?;
        validate_servo("demo", &self.servo.demo, period_us)?;

        // Dispense
        let d = &self.dispense;
        if d.open_angle > self.servo.left.max_degree || d.open_angle > self.servo.right.max_degree
        {
            eyre::bail!("dispense.open_angle must not exceed the servos' max_degree");
        }
        if d.open_step_deg == 0 {
            eyre::bail!("dispense.open_step_deg must be >= 1");
        }
        if d.close_step_deg == 0 {
            eyre::bail!("dispense.close_step_deg must be >= 1");
        }
        if d.hold_ms > 60 * 1000 {
            eyre::bail!("dispense.hold_ms is unreasonably large (>1min)");
        }

        // Weight
        if self.weight.samples == 0 {
            eyre::bail!("weight.samples must be >= 1");
        }
        if self.weight.read_timeout_ms == 0 {
            eyre::bail!("weight.read_timeout_ms must be >= 1");
        }
        if let Some(cal) = self.weight.calibration
            && (!cal.gain_g_per_count.is_finite() || cal.gain_g_per_count == 0.0)
        {
            eyre::bail!("weight.calibration.gain_g_per_count must be finite and non-zero");
        }

        // Motion
        if self.motion.wait_ms == 0 {
            eyre::bail!("motion.wait_ms must be >= 1");
        }

        // Heartbeat
        if self.heartbeat.timeout_ms == 0 {
            eyre::bail!("heartbeat.timeout_ms must be >= 1");
        }

        // Queues
        if self.queues.rx_capacity == 0 {
            eyre::bail!("queues.rx_capacity must be >= 1");
        }
        if self.queues.tx_capacity == 0 {
            eyre::bail!("queues.tx_capacity must be >= 1");
        }
        if self.queues.motion_capacity == 0 {
            eyre::bail!("queues.motion_capacity must be >= 1");
        }
        if self.queues.rx_message_bytes < 2 {
            eyre::bail!("queues.rx_message_bytes must be >= 2");
        }
        if self.queues.command_poll_ms == 0 {
            eyre::bail!("queues.command_poll_ms must be >= 1");
        }

        // MQTT
        if self.mqtt.topic_pub.is_empty() || self.mqtt.topic_sub.is_empty() {
            eyre::bail!("mqtt.topic_pub and mqtt.topic_sub must not be empty");
        }
        if self.mqtt.client_id.is_empty() {
            eyre::bail!("mqtt.client_id must not be empty");
        }
        if self.mqtt.publish_interval_ms == 0 {
            eyre::bail!("mqtt.publish_interval_ms must be >= 1");
        }
        if self.mqtt.connect_retry_ms == 0 {
            eyre::bail!("mqtt.connect_retry_ms must be >= 1");
        }
        if self.mqtt.keep_alive_s == 0 {
            eyre::bail!("mqtt.keep_alive_s must be >= 1");
        }
        if self.mqtt.publish_interval_ms >= self.mqtt.keep_alive_s.saturating_mul(1000) {
            eyre::bail!("mqtt.publish_interval_ms must be shorter than mqtt.keep_alive_s");
        }
        let tls = [
            self.mqtt.root_ca.is_some(),
            self.mqtt.certificate.is_some(),
            self.mqtt.private_key.is_some(),
        ];
        if tls.iter().any(|b| *b) && !tls.iter().all(|b| *b) {
            eyre::bail!("mqtt.root_ca, mqtt.certificate and mqtt.private_key must be set together");
        }

        // Schedule
        self.schedule.parsed_times()?;
        if self.schedule.weight_poll_ms == 0 {
            eyre::bail!("schedule.weight_poll_ms must be >= 1");
        }
        if self.schedule.tick_ms == 0 {
            eyre::bail!("schedule.tick_ms must be >= 1");
        }
        if self.schedule.client_id.is_empty() || self.schedule.client_id == self.mqtt.client_id {
            eyre::bail!("schedule.client_id must be non-empty and differ from mqtt.client_id");
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PINS_ONLY: &str = r#"
[pins]
weight_enable = 21
hx711_dt = 5
hx711_sck = 6
servo_enable = 17
servo_left = 18
servo_right = 19
motion = 4
"#;

    #[test]
    fn defaults_match_reference_board() {
        let cfg = load_toml(PINS_ONLY).expect("parse");
        cfg.validate().expect("defaults are valid");
        assert_eq!(cfg.pwm.period_us(), 20_000);
        assert_eq!(cfg.servo.right.max_pulse_us, 2650);
        assert_eq!(cfg.dispense.open_angle, 141);
        assert_eq!(cfg.weight.samples, 64);
        assert_eq!(cfg.heartbeat.timeout_ms, 900_000);
        assert_eq!(cfg.mqtt.topic_sub, "pet-feeder/from_aws");
        assert_eq!(cfg.queues.rx_message_bytes, 200);
    }

    #[test]
    fn missing_pins_is_a_parse_error() {
        assert!(load_toml("[pwm]\nfrequency_hz = 50\n").is_err());
    }
}
