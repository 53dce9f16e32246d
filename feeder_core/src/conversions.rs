//! `From` implementations bridging `feeder_config` types to `feeder_core` types.

use std::time::Duration;

use crate::calibration::WeightCalibration;
use crate::config::{
    ControllerSettings, DispenseSettings, FeederSettings, MotionSettings, NetworkSettings,
    PwmTiming, QueueSettings, ServoCalibration, WeightSettings,
};

// ── PwmTiming ────────────────────────────────────────────────────────────────

impl From<&feeder_config::PwmCfg> for PwmTiming {
    fn from(c: &feeder_config::PwmCfg) -> Self {
        Self {
            frequency_hz: c.frequency_hz,
            resolution_bits: c.resolution_bits,
        }
    }
}

// ── ServoCalibration ─────────────────────────────────────────────────────────

impl From<&feeder_config::ServoLimits> for ServoCalibration {
    fn from(c: &feeder_config::ServoLimits) -> Self {
        Self {
            min_pulse_us: c.min_pulse_us,
            max_pulse_us: c.max_pulse_us,
            max_degree: c.max_degree,
        }
    }
}

// ── DispenseSettings ─────────────────────────────────────────────────────────

impl From<&feeder_config::DispenseCfg> for DispenseSettings {
    fn from(c: &feeder_config::DispenseCfg) -> Self {
        Self {
            open_angle: c.open_angle,
            open_step_deg: c.open_step_deg,
            close_step_deg: c.close_step_deg,
            step_delay: Duration::from_millis(c.step_delay_ms),
            hold: Duration::from_millis(c.hold_ms),
            close_to_zero: c.close_to_zero,
        }
    }
}

// ── WeightSettings ───────────────────────────────────────────────────────────

impl From<&feeder_config::WeightCalibrationCfg> for WeightCalibration {
    fn from(c: &feeder_config::WeightCalibrationCfg) -> Self {
        Self {
            gain_g_per_count: c.gain_g_per_count,
            zero_counts: c.zero_counts,
            offset_g: c.offset_g,
        }
    }
}

impl From<&feeder_config::WeightCfg> for WeightSettings {
    fn from(c: &feeder_config::WeightCfg) -> Self {
        Self {
            samples: c.samples,
            settle: Duration::from_micros(c.settle_us),
            read_timeout: Duration::from_millis(c.read_timeout_ms),
            calibration: c.calibration.as_ref().map(WeightCalibration::from),
        }
    }
}

// ── MotionSettings ───────────────────────────────────────────────────────────

impl From<&feeder_config::MotionCfg> for MotionSettings {
    fn from(c: &feeder_config::MotionCfg) -> Self {
        Self {
            wait: Duration::from_millis(c.wait_ms),
            poll: Duration::from_millis(c.poll_ms),
        }
    }
}

// ── NetworkSettings ──────────────────────────────────────────────────────────

/// The inbound size limit lives under `[queues]`, so this needs the whole config.
impl From<&feeder_config::Config> for NetworkSettings {
    fn from(c: &feeder_config::Config) -> Self {
        Self {
            topic_pub: c.mqtt.topic_pub.clone(),
            topic_sub: c.mqtt.topic_sub.clone(),
            yield_timeout: Duration::from_millis(c.mqtt.yield_ms),
            publish_interval: Duration::from_millis(c.mqtt.publish_interval_ms),
            connect_retry: Duration::from_millis(c.mqtt.connect_retry_ms),
            max_message_bytes: c.queues.rx_message_bytes,
        }
    }
}

// ── QueueSettings ────────────────────────────────────────────────────────────

impl From<&feeder_config::QueuesCfg> for QueueSettings {
    fn from(c: &feeder_config::QueuesCfg) -> Self {
        Self {
            rx_capacity: c.rx_capacity,
            tx_capacity: c.tx_capacity,
            command_poll: Duration::from_millis(c.command_poll_ms),
        }
    }
}

// ── FeederSettings ───────────────────────────────────────────────────────────

impl From<&feeder_config::Config> for FeederSettings {
    fn from(c: &feeder_config::Config) -> Self {
        Self {
            pwm: PwmTiming::from(&c.pwm),
            left: ServoCalibration::from(&c.servo.left),
            right: ServoCalibration::from(&c.servo.right),
            dispense: DispenseSettings::from(&c.dispense),
            weight: WeightSettings::from(&c.weight),
            motion: MotionSettings::from(&c.motion),
            network: NetworkSettings::from(c),
            queues: QueueSettings::from(&c.queues),
            heartbeat_timeout: Duration::from_millis(c.heartbeat.timeout_ms),
            default_amount_g: c.dispense.default_amount_g,
        }
    }
}

// ── ControllerSettings ───────────────────────────────────────────────────────

/// Fails only on malformed `schedule.times`, which `validate()` already rejects.
impl TryFrom<&feeder_config::Config> for ControllerSettings {
    type Error = eyre::Report;

    fn try_from(c: &feeder_config::Config) -> eyre::Result<Self> {
        Ok(Self {
            command_topic: c.mqtt.topic_sub.clone(),
            report_topic: c.mqtt.topic_pub.clone(),
            times: c.schedule.parsed_times()?,
            weight_poll: Duration::from_millis(c.schedule.weight_poll_ms),
            tick: Duration::from_millis(c.schedule.tick_ms),
            amount_g: c.schedule.amount_g,
            connect_retry: Duration::from_millis(c.mqtt.connect_retry_ms),
        })
    }
}
