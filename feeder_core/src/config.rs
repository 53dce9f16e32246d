//! Runtime settings for the feeder tasks.
//!
//! These are the structs consumed by `feeder_core`. They are separate from the
//! TOML-deserialized config in `feeder_config`; `conversions` bridges the two.

use chrono::NaiveTime;
use std::time::Duration;

use crate::calibration::WeightCalibration;

/// PWM timer shared by the servo channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PwmTiming {
    pub frequency_hz: u32,
    /// Counter width; duty values range over `0..=2^bits - 1`.
    pub resolution_bits: u8,
}

impl Default for PwmTiming {
    fn default() -> Self {
        Self {
            frequency_hz: 50,
            resolution_bits: 15,
        }
    }
}

/// Pulse-width range of one servo and the angle it maps onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServoCalibration {
    pub min_pulse_us: u32,
    pub max_pulse_us: u32,
    pub max_degree: u32,
}

impl ServoCalibration {
    /// Left gate servo of the feeder.
    pub const FEEDER_LEFT: Self = Self {
        min_pulse_us: 320,
        max_pulse_us: 2700,
        max_degree: 180,
    };
    /// Right gate servo of the feeder.
    pub const FEEDER_RIGHT: Self = Self {
        min_pulse_us: 320,
        max_pulse_us: 2650,
        max_degree: 180,
    };
    /// Generic hobby servo used by the sweep demo.
    pub const DEMO: Self = Self {
        min_pulse_us: 500,
        max_pulse_us: 2500,
        max_degree: 180,
    };
}

/// Shape and pacing of one dispense cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispenseSettings {
    pub open_angle: u32,
    pub open_step_deg: u32,
    pub close_step_deg: u32,
    pub step_delay: Duration,
    pub hold: Duration,
    /// Add a final 0 degree step when the close sweep stops short of it.
    pub close_to_zero: bool,
}

impl Default for DispenseSettings {
    fn default() -> Self {
        Self {
            open_angle: 141,
            open_step_deg: 5,
            close_step_deg: 15,
            step_delay: Duration::from_millis(2),
            hold: Duration::from_millis(500),
            close_to_zero: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WeightSettings {
    pub samples: u32,
    pub settle: Duration,
    pub read_timeout: Duration,
    pub calibration: Option<WeightCalibration>,
}

impl Default for WeightSettings {
    fn default() -> Self {
        Self {
            samples: 64,
            settle: Duration::from_micros(20),
            read_timeout: Duration::from_millis(150),
            calibration: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MotionSettings {
    pub wait: Duration,
    pub poll: Duration,
}

impl Default for MotionSettings {
    fn default() -> Self {
        Self {
            wait: Duration::from_millis(100),
            poll: Duration::from_millis(1000),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NetworkSettings {
    pub topic_pub: String,
    pub topic_sub: String,
    /// Max time per loop iteration spent collecting inbound messages.
    pub yield_timeout: Duration,
    pub publish_interval: Duration,
    pub connect_retry: Duration,
    /// Inbound payloads above this size are dropped.
    pub max_message_bytes: usize,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            topic_pub: "pet-feeder/to_aws".to_string(),
            topic_sub: "pet-feeder/from_aws".to_string(),
            yield_timeout: Duration::from_millis(100),
            publish_interval: Duration::from_millis(5000),
            connect_retry: Duration::from_millis(1000),
            max_message_bytes: 200,
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueueSettings {
    pub rx_capacity: usize,
    pub tx_capacity: usize,
    pub command_poll: Duration,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            rx_capacity: 5,
            tx_capacity: 10,
            command_poll: Duration::from_millis(10),
        }
    }
}

/// Everything `Feeder` needs besides its devices.
#[derive(Debug, Clone)]
pub struct FeederSettings {
    pub pwm: PwmTiming,
    pub left: ServoCalibration,
    pub right: ServoCalibration,
    pub dispense: DispenseSettings,
    pub weight: WeightSettings,
    pub motion: MotionSettings,
    pub network: NetworkSettings,
    pub queues: QueueSettings,
    /// Dispense on our own when no valid message arrives for this long.
    pub heartbeat_timeout: Duration,
    pub default_amount_g: u32,
}

impl Default for FeederSettings {
    fn default() -> Self {
        Self {
            pwm: PwmTiming::default(),
            left: ServoCalibration::FEEDER_LEFT,
            right: ServoCalibration::FEEDER_RIGHT,
            dispense: DispenseSettings::default(),
            weight: WeightSettings::default(),
            motion: MotionSettings::default(),
            network: NetworkSettings::default(),
            queues: QueueSettings::default(),
            heartbeat_timeout: Duration::from_millis(900_000),
            default_amount_g: 0,
        }
    }
}

/// Controlling side of the link: topics are the feeder's, mirrored.
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    /// Where the feeder listens; the controller publishes here.
    pub command_topic: String,
    /// Where the feeder reports; the controller subscribes here.
    pub report_topic: String,
    pub times: Vec<NaiveTime>,
    pub weight_poll: Duration,
    pub tick: Duration,
    pub amount_g: Option<u32>,
    pub connect_retry: Duration,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            command_topic: "pet-feeder/from_aws".to_string(),
            report_topic: "pet-feeder/to_aws".to_string(),
            times: Vec::new(),
            weight_poll: Duration::from_secs(60),
            tick: Duration::from_millis(500),
            amount_g: None,
            connect_retry: Duration::from_millis(1000),
        }
    }
}
