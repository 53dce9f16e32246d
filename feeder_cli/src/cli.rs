//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "petfeeder", version, about = "Pet feeder controller")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/feeder_config.toml")]
    pub config: PathBuf,

    /// Log and report as JSON lines instead of pretty text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Log level (error|warn|info|debug|trace); overrides [logging].level
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

/// Which servo calibration to use.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum ServoArg {
    /// Left gate servo
    Left,
    /// Right gate servo
    Right,
    /// Sweep demo servo
    Demo,
}

impl ServoArg {
    pub fn name(self) -> &'static str {
        match self {
            ServoArg::Left => "left",
            ServoArg::Right => "right",
            ServoArg::Demo => "demo",
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the feeder until Ctrl-C (or for --duration-ms)
    Run {
        /// Use an in-process broker instead of MQTT; published reports go to stdout
        #[arg(long, action = ArgAction::SetTrue)]
        offline: bool,
        /// JSON-lines file of inbound messages to deliver (implies --offline)
        #[arg(long, value_name = "FILE")]
        inbox: Option<PathBuf>,
        /// Stop after this many milliseconds
        #[arg(long, value_name = "MS")]
        duration_ms: Option<u64>,
    },
    /// Sweep the demo servo from 0° to its maximum angle and back
    Sweep {
        /// Number of full sweeps (default: until Ctrl-C)
        #[arg(long, value_name = "N")]
        cycles: Option<u64>,
        /// Delay after each one-degree step
        #[arg(long, value_name = "MS", default_value_t = 20)]
        step_delay_ms: u64,
    },
    /// Print the PWM duty for an angle
    Duty {
        /// Angle in degrees
        #[arg(long)]
        angle: u32,
        /// Servo calibration to apply
        #[arg(long, value_enum, default_value = "left")]
        servo: ServoArg,
    },
    /// Drive a feeder over the link: scheduled dispenses and weight polling
    Schedule {
        /// Daily dispense time "HH:MM" (UTC); repeatable, replaces [schedule].times
        #[arg(long = "at", value_name = "HH:MM")]
        at: Vec<String>,
        /// Dispense amount to send at startup; overrides [schedule].amount_g
        #[arg(long, value_name = "GRAMS")]
        amount: Option<u32>,
        /// Use an in-process broker; requests go to stdout
        #[arg(long, action = ArgAction::SetTrue)]
        offline: bool,
        /// JSON-lines file of feeder reports to deliver (implies --offline)
        #[arg(long, value_name = "FILE")]
        inbox: Option<PathBuf>,
        /// Stop after this many milliseconds
        #[arg(long, value_name = "MS")]
        duration_ms: Option<u64>,
    },
    /// Validate the config and construct every device without starting tasks
    SelfCheck,
}
