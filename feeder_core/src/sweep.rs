//! Servo-sweep demo: one servo from 0° to its maximum and back, a degree per step.

use feeder_traits::PwmChannel;
use feeder_traits::clock::Clock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::config::{PwmTiming, ServoCalibration};
use crate::duty::{calculate_duty, sweep_angles};
use crate::error::FeederError;
use crate::hw_error::map_boxed;

pub struct ServoSweep<P, C> {
    servo: P,
    clock: C,
    cal: ServoCalibration,
    timing: PwmTiming,
    step_delay: Duration,
}

impl<P: PwmChannel, C: Clock> ServoSweep<P, C> {
    pub fn new(
        servo: P,
        clock: C,
        cal: ServoCalibration,
        timing: PwmTiming,
        step_delay: Duration,
    ) -> Self {
        Self {
            servo,
            clock,
            cal,
            timing,
            step_delay,
        }
    }

    /// Sweep `cycles` times, or until `stop` is raised when `cycles` is `None`.
    /// Returns the number of completed cycles.
    pub fn run(&mut self, cycles: Option<u64>, stop: &AtomicBool) -> Result<u64, FeederError> {
        let mut done = 0u64;
        while cycles.is_none_or(|n| done < n) {
            for angle in sweep_angles(self.cal.max_degree) {
                if stop.load(Ordering::Relaxed) {
                    return Ok(done);
                }
                let duty = calculate_duty(angle, &self.cal, &self.timing);
                tracing::trace!(angle, duty, "sweep step");
                self.servo.set_duty(duty).map_err(map_boxed)?;
                self.clock.sleep(self.step_delay);
            }
            done += 1;
            tracing::debug!(cycle = done, "sweep cycle complete");
        }
        Ok(done)
    }
}
