#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! `petfeeder`: run the pet feeder or its controller, sweep the demo servo, or
//! inspect duty values.

mod cli;
mod error_fmt;
mod hw;
mod logging;
mod run;

use clap::Parser;

use crate::cli::{Cli, Commands, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

fn real_main(cli: Cli) -> eyre::Result<()> {
    let cfg = feeder_config::load_file(&cli.config)?;
    logging::init(cli.log_level.as_deref(), cli.json, &cfg.logging)?;
    tracing::debug!(config = %cli.config.display(), backend = hw::backend_name(), "config loaded");

    match cli.cmd {
        Commands::Run {
            offline,
            inbox,
            duration_ms,
        } => run::run(&cfg, offline, inbox.as_deref(), duration_ms, cli.json),
        Commands::Sweep {
            cycles,
            step_delay_ms,
        } => run::sweep(&cfg, cycles, step_delay_ms, cli.json),
        Commands::Duty { angle, servo } => run::duty(&cfg, angle, servo, cli.json),
        Commands::Schedule {
            at,
            amount,
            offline,
            inbox,
            duration_ms,
        } => {
            let mut cfg = cfg;
            if !at.is_empty() {
                cfg.schedule.times = at;
                cfg.validate()?;
            }
            if amount.is_some() {
                cfg.schedule.amount_g = amount;
            }
            run::schedule(&cfg, offline, inbox.as_deref(), duration_ms, cli.json)
        }
        Commands::SelfCheck => run::self_check(&cfg, cli.json),
    }
}

fn main() {
    let _ = color_eyre::install();
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    if let Err(err) = real_main(cli) {
        tracing::error!(error = %err, "exiting with error");
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", format_error_json(&err));
        } else {
            eprintln!("{}", humanize(&err));
        }
        std::process::exit(exit_code_for_error(&err));
    }
}
