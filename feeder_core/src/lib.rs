#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Pet feeder logic (hardware-agnostic).
//!
//! All device access goes through the traits in `feeder_traits`, so the same
//! tasks run against Raspberry Pi GPIO, an MQTT broker, or the simulated
//! devices in `feeder_hardware`.
//!
//! ## Architecture
//!
//! - **Duty**: angle → PWM duty counts (`duty`)
//! - **Dispenser**: mirrored two-servo gate cycle (`dispenser`)
//! - **Weight**: averaged load-cell burst (`weight`)
//! - **Commands**: inbound JSON interpreter (`command`)
//! - **Reports**: periodic outbound JSON (`report`)
//! - **Tasks**: one thread per task, bounded queues and atomics between them
//!   (`worker`, `tasks`, `heartbeat`, `network`)
//! - **Assembly**: `Feeder::builder()` → `Feeder::start()` (`feeder`)
//! - **Controller**: daily schedule and weight polling for the other end of
//!   the link (`schedule`, `controller`)

pub mod calibration;
pub mod command;
pub mod config;
pub mod controller;
pub mod conversions;
pub mod dispenser;
pub mod duty;
pub mod error;
pub mod feeder;
pub mod heartbeat;
pub mod hw_error;
pub mod network;
pub mod report;
pub mod schedule;
pub mod state;
pub mod sweep;
pub mod tasks;
pub mod weight;
pub mod worker;

pub use calibration::WeightCalibration;
pub use command::{Command, CommandInterpreter, Outcome, Request, parse_command};
pub use config::{
    ControllerSettings, DispenseSettings, FeederSettings, MotionSettings, NetworkSettings,
    PwmTiming, QueueSettings, ServoCalibration, WeightSettings,
};
pub use controller::{Controller, ControllerStatus};
pub use dispenser::{DispensePlan, Dispenser};
pub use duty::{calculate_duty, sweep_angles};
pub use error::{BuildError, FeederError, Result};
pub use feeder::{Feeder, FeederBuilder, RunningFeeder};
pub use heartbeat::{HeartbeatHandle, HeartbeatWatchdog};
pub use hw_error::map_hw_error;
pub use report::{Report, ReportId};
pub use schedule::Schedule;
pub use state::{FeederState, StateSnapshot};
pub use sweep::ServoSweep;
pub use weight::{WeightReading, WeightSampler};
pub use worker::{Shutdown, Worker};
