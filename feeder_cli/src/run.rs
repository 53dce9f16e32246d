//! Subcommand implementations.

use crossbeam_channel as xch;
use eyre::WrapErr;
use feeder_config::Config;
use feeder_core::feeder::{BoxedLine, BoxedLink};
use feeder_core::{
    Controller, ControllerSettings, Feeder, FeederSettings, PwmTiming, ServoCalibration,
    ServoSweep, Worker, calculate_duty,
};
use feeder_traits::MonotonicClock;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::cli::ServoArg;
use crate::hw;

/// Wire devices and link into a feeder. The amplifier line, if any, is
/// returned so the caller keeps it driven for the whole run.
fn assemble(cfg: &Config, link: BoxedLink) -> eyre::Result<(Feeder, Option<BoxedLine>)> {
    let hw::Devices {
        left,
        right,
        servo_enable,
        load_cell,
        weight_enable,
        motion,
        amp_enable,
    } = hw::make_devices(cfg)?;
    let feeder = Feeder::builder()
        .with_left_servo(left)
        .with_right_servo(right)
        .with_servo_enable(servo_enable)
        .with_load_cell(load_cell)
        .with_weight_enable(weight_enable)
        .with_motion(motion)
        .with_link(link)
        .with_settings(FeederSettings::from(cfg))
        .build()?;
    Ok((feeder, amp_enable))
}

/// Ctrl-C arrives on the returned channel.
fn ctrlc_channel() -> eyre::Result<xch::Receiver<()>> {
    let (tx, rx) = xch::bounded(1);
    ctrlc::set_handler(move || {
        let _ = tx.try_send(());
    })
    .wrap_err("install Ctrl-C handler")?;
    Ok(rx)
}

pub fn run(
    cfg: &Config,
    offline: bool,
    inbox: Option<&Path>,
    duration_ms: Option<u64>,
    json: bool,
) -> eyre::Result<()> {
    let link = if offline || inbox.is_some() {
        hw::offline_link(inbox)?
    } else {
        hw::mqtt_link(cfg, &cfg.mqtt.client_id)?
    };
    let (feeder, _amp) = assemble(cfg, link)?;
    let running = feeder.start()?;
    let stop = ctrlc_channel()?;
    let deadline = duration_ms.map_or_else(xch::never, |ms| xch::after(Duration::from_millis(ms)));

    let fault = xch::select! {
        recv(running.faults()) -> f => f.ok(),
        recv(stop) -> _ => {
            tracing::info!("Ctrl-C received; stopping");
            None
        }
        recv(deadline) -> _ => {
            tracing::info!(duration_ms, "run duration elapsed");
            None
        }
    };

    let snapshot = running.state().snapshot();
    running.shutdown();
    if let Some(e) = fault {
        return Err(eyre::Report::new(e)).wrap_err("feeder stopped");
    }
    if json {
        println!(
            "{}",
            serde_json::json!({ "stopped": true, "state": snapshot })
        );
    }
    Ok(())
}

pub fn schedule(
    cfg: &Config,
    offline: bool,
    inbox: Option<&Path>,
    duration_ms: Option<u64>,
    json: bool,
) -> eyre::Result<()> {
    let link = if offline || inbox.is_some() {
        hw::offline_link(inbox)?
    } else {
        hw::mqtt_link(cfg, &cfg.schedule.client_id)?
    };
    let settings = ControllerSettings::try_from(cfg)?;
    let mut controller = Controller::new(link, settings, chrono::Utc::now());
    let (done_tx, done_rx) = xch::bounded(1);
    let mut worker = Worker::spawn("controller", move |shutdown| {
        let _ = done_tx.send(controller.run(&shutdown));
    })
    .wrap_err("spawn controller task")?;
    let stop = ctrlc_channel()?;
    let deadline = duration_ms.map_or_else(xch::never, |ms| xch::after(Duration::from_millis(ms)));

    let finished = xch::select! {
        recv(done_rx) -> r => r.ok(),
        recv(stop) -> _ => {
            tracing::info!("Ctrl-C received; stopping");
            None
        }
        recv(deadline) -> _ => {
            tracing::info!(duration_ms, "run duration elapsed");
            None
        }
    };
    worker.stop();
    let outcome = match finished {
        Some(r) => r,
        None => done_rx
            .recv()
            .map_err(|_| eyre::eyre!("controller task ended without a result"))?,
    };
    let status = outcome
        .map_err(eyre::Report::new)
        .wrap_err("controller stopped")?;
    if json {
        println!(
            "{}",
            serde_json::json!({ "stopped": true, "controller": status })
        );
    }
    Ok(())
}

pub fn sweep(
    cfg: &Config,
    cycles: Option<u64>,
    step_delay_ms: u64,
    json: bool,
) -> eyre::Result<()> {
    let servo = hw::make_demo_servo(cfg)?;
    let stop = Arc::new(AtomicBool::new(false));
    let flag = stop.clone();
    ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed))
        .wrap_err("install Ctrl-C handler")?;

    let mut demo = ServoSweep::new(
        servo,
        MonotonicClock::new(),
        ServoCalibration::from(&cfg.servo.demo),
        PwmTiming::from(&cfg.pwm),
        Duration::from_millis(step_delay_ms),
    );
    tracing::info!(?cycles, step_delay_ms, "starting servo sweep");
    let done = demo.run(cycles, &stop)?;
    if json {
        println!("{}", serde_json::json!({ "cycles": done }));
    } else {
        println!("sweep complete: {done} cycle(s)");
    }
    Ok(())
}

pub fn duty(cfg: &Config, angle: u32, servo: ServoArg, json: bool) -> eyre::Result<()> {
    let limits = match servo {
        ServoArg::Left => &cfg.servo.left,
        ServoArg::Right => &cfg.servo.right,
        ServoArg::Demo => &cfg.servo.demo,
    };
    let cal = ServoCalibration::from(limits);
    if angle > cal.max_degree {
        tracing::warn!(angle, max_degree = cal.max_degree, "angle clamped");
    }
    let duty = calculate_duty(angle, &cal, &PwmTiming::from(&cfg.pwm));
    if json {
        println!(
            "{}",
            serde_json::json!({ "servo": servo.name(), "angle": angle, "duty": duty })
        );
    } else {
        println!("{duty}");
    }
    Ok(())
}

pub fn self_check(cfg: &Config, json: bool) -> eyre::Result<()> {
    let link = hw::offline_link(None)?;
    let (feeder, _amp) = assemble(cfg, link)?;
    tracing::debug!(?feeder, "feeder assembled");
    if json {
        println!(
            "{}",
            serde_json::json!({ "status": "ok", "backend": hw::backend_name() })
        );
    } else {
        println!("self-check ok ({} backend)", hw::backend_name());
    }
    Ok(())
}
