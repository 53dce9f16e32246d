//! Task bodies for the command, dispense, weight and motion workers.
//!
//! Dispense and weight tasks sleep on a `bounded(1)` wake channel, so several
//! wake-ups before the task gets to run collapse into one. The shared flag,
//! not the wake-up, decides whether work is done.

use crossbeam_channel as xch;
use feeder_traits::clock::Clock;
use feeder_traits::{LoadCell, MotionSensor, OutputLine, PwmChannel};
use std::sync::Arc;
use std::time::Duration;

use crate::command::CommandInterpreter;
use crate::config::MotionSettings;
use crate::dispenser::Dispenser;
use crate::hw_error::map_boxed;
use crate::report::ReportId;
use crate::state::FeederState;
use crate::weight::WeightSampler;
use crate::worker::Shutdown;

fn queue_report(reports: &xch::Sender<ReportId>, id: ReportId) {
    if reports.try_send(id).is_err() {
        tracing::warn!(id = %id.as_char(), "tx queue full; report dropped");
    }
}

pub fn command_loop(
    interpreter: &CommandInterpreter,
    inbox: &xch::Receiver<Vec<u8>>,
    poll: Duration,
    shutdown: &Shutdown,
) {
    loop {
        xch::select! {
            recv(shutdown.receiver()) -> _ => break,
            recv(inbox) -> msg => match msg {
                Ok(payload) => {
                    interpreter.handle(&payload);
                }
                Err(_) => {
                    if shutdown.wait(poll) {
                        break;
                    }
                }
            },
            default(poll) => {}
        }
    }
    tracing::trace!("command task exiting");
}

pub fn dispense_loop<L, R, E, C>(
    mut dispenser: Dispenser<L, R, E, C>,
    state: &FeederState,
    wake: &xch::Receiver<()>,
    reports: &xch::Sender<ReportId>,
    shutdown: &Shutdown,
) where
    L: PwmChannel,
    R: PwmChannel,
    E: OutputLine,
    C: Clock,
{
    loop {
        xch::select! {
            recv(shutdown.receiver()) -> _ => break,
            recv(wake) -> msg => {
                if msg.is_err() {
                    break;
                }
                if !state.dispense_requested() {
                    continue;
                }
                match dispenser.dispense(state.dispense_amount()) {
                    Ok(()) => {
                        state.clear_dispense();
                        queue_report(reports, ReportId::Dispensed);
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "dispense failed");
                        state.clear_dispense();
                    }
                }
            }
        }
    }
    tracing::trace!("dispense task exiting");
}

pub fn weight_loop<S, E, C>(
    mut sampler: WeightSampler<S, E, C>,
    state: &FeederState,
    wake: &xch::Receiver<()>,
    reports: &xch::Sender<ReportId>,
    shutdown: &Shutdown,
) where
    S: LoadCell,
    E: OutputLine,
    C: Clock,
{
    loop {
        xch::select! {
            recv(shutdown.receiver()) -> _ => break,
            recv(wake) -> msg => {
                if msg.is_err() {
                    break;
                }
                if !state.weight_requested() {
                    continue;
                }
                match sampler.sample() {
                    Ok(reading) => {
                        state.set_weight(reading.value);
                        state.clear_weight_request();
                        queue_report(reports, ReportId::Weight);
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "weight sample failed");
                        state.clear_weight_request();
                    }
                }
            }
        }
    }
    tracing::trace!("weight task exiting");
}

pub fn motion_loop<M: MotionSensor>(
    mut sensor: M,
    settings: &MotionSettings,
    state: &Arc<FeederState>,
    reports: &xch::Sender<ReportId>,
    shutdown: &Shutdown,
) {
    while !shutdown.is_requested() {
        match sensor.wait_for_motion(settings.wait) {
            Ok(true) => {
                tracing::info!("motion tripped");
                state.mark_motion();
                queue_report(reports, ReportId::Motion);
            }
            Ok(false) => {}
            Err(e) => tracing::warn!(error = %map_boxed(e), "motion sensor error"),
        }
        if shutdown.wait(settings.poll) {
            break;
        }
    }
    tracing::trace!("motion task exiting");
}
