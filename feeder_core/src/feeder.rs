//! Feeder assembly: builder, task start-up and the running handle.

use crossbeam_channel as xch;
use std::sync::Arc;
use std::time::Duration;

use feeder_traits::clock::{Clock, MonotonicClock};
use feeder_traits::{LoadCell, MotionSensor, MqttLink, OutputLine, PwmChannel};

use crate::command::CommandInterpreter;
use crate::config::FeederSettings;
use crate::dispenser::Dispenser;
use crate::error::{BuildError, FeederError, Result};
use crate::heartbeat::HeartbeatWatchdog;
use crate::hw_error::map_boxed;
use crate::network::NetworkTask;
use crate::state::FeederState;
use crate::tasks;
use crate::weight::WeightSampler;
use crate::worker::Worker;

pub type BoxedServo = Box<dyn PwmChannel + Send>;
pub type BoxedLine = Box<dyn OutputLine + Send>;
pub type BoxedLoadCell = Box<dyn LoadCell + Send>;
pub type BoxedMotion = Box<dyn MotionSensor + Send>;
pub type BoxedLink = Box<dyn MqttLink + Send>;
pub type SharedClock = Arc<dyn Clock + Send + Sync>;

// ── Builder ──────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FeederBuilder {
    left: Option<BoxedServo>,
    right: Option<BoxedServo>,
    servo_enable: Option<BoxedLine>,
    load_cell: Option<BoxedLoadCell>,
    weight_enable: Option<BoxedLine>,
    motion: Option<BoxedMotion>,
    link: Option<BoxedLink>,
    clock: Option<SharedClock>,
    settings: Option<FeederSettings>,
}

impl FeederBuilder {
    pub fn with_left_servo(mut self, servo: impl PwmChannel + Send + 'static) -> Self {
        self.left = Some(Box::new(servo));
        self
    }

    pub fn with_right_servo(mut self, servo: impl PwmChannel + Send + 'static) -> Self {
        self.right = Some(Box::new(servo));
        self
    }

    pub fn with_servo_enable(mut self, line: impl OutputLine + Send + 'static) -> Self {
        self.servo_enable = Some(Box::new(line));
        self
    }

    pub fn with_load_cell(mut self, cell: impl LoadCell + Send + 'static) -> Self {
        self.load_cell = Some(Box::new(cell));
        self
    }

    pub fn with_weight_enable(mut self, line: impl OutputLine + Send + 'static) -> Self {
        self.weight_enable = Some(Box::new(line));
        self
    }

    pub fn with_motion(mut self, sensor: impl MotionSensor + Send + 'static) -> Self {
        self.motion = Some(Box::new(sensor));
        self
    }

    pub fn with_link(mut self, link: impl MqttLink + Send + 'static) -> Self {
        self.link = Some(Box::new(link));
        self
    }

    /// Clock used for servo pacing and load-cell settling. Defaults to real time.
    pub fn with_clock(mut self, clock: impl Clock + Send + Sync + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    pub fn with_settings(mut self, settings: FeederSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn build(self) -> Result<Feeder> {
        let settings = self.settings.unwrap_or_default();
        validate(&settings)?;
        Ok(Feeder {
            left: self.left.ok_or(BuildError::MissingLeftServo)?,
            right: self.right.ok_or(BuildError::MissingRightServo)?,
            servo_enable: self.servo_enable.ok_or(BuildError::MissingServoEnable)?,
            load_cell: self.load_cell.ok_or(BuildError::MissingLoadCell)?,
            weight_enable: self.weight_enable.ok_or(BuildError::MissingWeightEnable)?,
            motion: self.motion.ok_or(BuildError::MissingMotion)?,
            link: self.link.ok_or(BuildError::MissingLink)?,
            clock: self.clock.unwrap_or_else(|| Arc::new(MonotonicClock::new())),
            settings,
        })
    }
}

fn invalid(msg: &'static str) -> eyre::Report {
    eyre::Report::new(BuildError::InvalidConfig(msg))
}

fn validate(s: &FeederSettings) -> Result<()> {
    if s.pwm.frequency_hz == 0 {
        return Err(invalid("pwm frequency must be > 0"));
    }
    if s.dispense.open_angle > s.left.max_degree || s.dispense.open_angle > s.right.max_degree {
        return Err(invalid("open angle exceeds servo range"));
    }
    if s.dispense.open_step_deg == 0 || s.dispense.close_step_deg == 0 {
        return Err(invalid("dispense steps must be >= 1"));
    }
    if s.weight.samples == 0 {
        return Err(invalid("weight samples must be >= 1"));
    }
    if s.heartbeat_timeout.is_zero() {
        return Err(invalid("heartbeat timeout must be > 0"));
    }
    if s.queues.rx_capacity == 0 || s.queues.tx_capacity == 0 {
        return Err(invalid("queue capacities must be >= 1"));
    }
    if s.network.topic_pub.is_empty() || s.network.topic_sub.is_empty() {
        return Err(invalid("topics must not be empty"));
    }
    Ok(())
}

// ── Feeder ───────────────────────────────────────────────────────────────────

/// A fully wired feeder that has not started its tasks yet.
pub struct Feeder {
    left: BoxedServo,
    right: BoxedServo,
    servo_enable: BoxedLine,
    load_cell: BoxedLoadCell,
    weight_enable: BoxedLine,
    motion: BoxedMotion,
    link: BoxedLink,
    clock: SharedClock,
    settings: FeederSettings,
}

impl core::fmt::Debug for Feeder {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Feeder")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Feeder {
    pub fn builder() -> FeederBuilder {
        FeederBuilder::default()
    }

    pub fn settings(&self) -> &FeederSettings {
        &self.settings
    }

    /// Put the outputs in their idle state and spawn every task.
    pub fn start(self) -> Result<RunningFeeder> {
        let Feeder {
            left,
            right,
            mut servo_enable,
            load_cell,
            mut weight_enable,
            motion,
            link,
            clock,
            settings,
        } = self;

        weight_enable.set_high().map_err(map_boxed)?;
        servo_enable.set_low().map_err(map_boxed)?;

        let state = Arc::new(FeederState::new(settings.default_amount_g));
        let (rx_tx, rx_rx) = xch::bounded::<Vec<u8>>(settings.queues.rx_capacity);
        let (report_tx, report_rx) = xch::bounded(settings.queues.tx_capacity);
        let (dispense_wake_tx, dispense_wake_rx) = xch::bounded::<()>(1);
        let (weight_wake_tx, weight_wake_rx) = xch::bounded::<()>(1);
        let (fault_tx, fault_rx) = xch::bounded::<FeederError>(1);

        let (watchdog, heartbeat) = HeartbeatWatchdog::new(
            settings.heartbeat_timeout,
            state.clone(),
            dispense_wake_tx.clone(),
        );
        let interpreter = CommandInterpreter::new(
            state.clone(),
            dispense_wake_tx,
            weight_wake_tx,
            report_tx.clone(),
            heartbeat,
        );
        let dispenser = Dispenser::new(
            left,
            right,
            servo_enable,
            clock.clone(),
            settings.left,
            settings.right,
            settings.pwm,
            settings.dispense.clone(),
        );
        let sampler = WeightSampler::new(load_cell, weight_enable, clock, settings.weight.clone());
        let mut network = NetworkTask::new(
            link,
            settings.network.clone(),
            state.clone(),
            rx_tx,
            report_rx,
        );

        let mut workers = Vec::with_capacity(6);

        let poll = settings.queues.command_poll;
        workers.push(Worker::spawn("command", move |shutdown| {
            tasks::command_loop(&interpreter, &rx_rx, poll, &shutdown);
        })?);

        let (st, reports) = (state.clone(), report_tx.clone());
        workers.push(Worker::spawn("dispense", move |shutdown| {
            tasks::dispense_loop(dispenser, &st, &dispense_wake_rx, &reports, &shutdown);
        })?);

        let (st, reports) = (state.clone(), report_tx.clone());
        workers.push(Worker::spawn("weight", move |shutdown| {
            tasks::weight_loop(sampler, &st, &weight_wake_rx, &reports, &shutdown);
        })?);

        let (st, motion_settings) = (state.clone(), settings.motion.clone());
        workers.push(Worker::spawn("motion", move |shutdown| {
            tasks::motion_loop(motion, &motion_settings, &st, &report_tx, &shutdown);
        })?);

        workers.push(Worker::spawn("heartbeat", move |shutdown| {
            watchdog.run(&shutdown);
        })?);

        workers.push(Worker::spawn("network", move |shutdown| {
            if let Err(e) = network.run(&shutdown) {
                tracing::error!(error = %e, "network task stopped");
                let _ = fault_tx.try_send(e);
            }
        })?);

        tracing::info!(
            dispense_amount_g = settings.default_amount_g,
            heartbeat_timeout_ms = settings.heartbeat_timeout.as_millis() as u64,
            "feeder started"
        );
        Ok(RunningFeeder {
            state,
            faults: fault_rx,
            workers,
        })
    }
}

// ── Running handle ───────────────────────────────────────────────────────────

pub struct RunningFeeder {
    state: Arc<FeederState>,
    faults: xch::Receiver<FeederError>,
    workers: Vec<Worker>,
}

impl RunningFeeder {
    pub fn state(&self) -> &Arc<FeederState> {
        &self.state
    }

    /// Fatal task errors arrive here; disconnects once the network task ends.
    pub fn faults(&self) -> &xch::Receiver<FeederError> {
        &self.faults
    }

    /// Block until a task fails, or until `timeout` passes (`None` waits for
    /// the network task to end). `Ok` means nothing failed.
    pub fn wait(&self, timeout: Option<Duration>) -> std::result::Result<(), FeederError> {
        let fault = match timeout {
            Some(t) => self.faults.recv_timeout(t).ok(),
            None => self.faults.recv().ok(),
        };
        match fault {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Stop every task and wait for the threads to exit.
    pub fn shutdown(mut self) {
        self.stop_all();
    }

    fn stop_all(&mut self) {
        for w in &mut self.workers {
            w.signal();
        }
        for mut w in self.workers.drain(..) {
            w.stop();
        }
        tracing::info!("feeder stopped");
    }
}

impl Drop for RunningFeeder {
    fn drop(&mut self) {
        if !self.workers.is_empty() {
            self.stop_all();
        }
    }
}
