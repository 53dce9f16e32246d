//! Gate servo choreography for one dispense cycle.
//!
//! The two gate servos move mirror-wise: when the left one is at `a` degrees
//! the right one is at `open_angle - a`. The servo rail is only powered while
//! a cycle runs.

use feeder_traits::clock::Clock;
use feeder_traits::{OutputLine, PwmChannel};

use crate::config::{DispenseSettings, PwmTiming, ServoCalibration};
use crate::duty::calculate_duty;
use crate::error::FeederError;
use crate::hw_error::map_boxed;

/// Left/right angle pairs for the open and close phases of a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispensePlan {
    pub open: Vec<(u32, u32)>,
    pub close: Vec<(u32, u32)>,
}

impl DispensePlan {
    pub fn new(s: &DispenseSettings) -> Self {
        let open_step = s.open_step_deg.max(1) as usize;
        let close_step = s.close_step_deg.max(1);
        let pair = |a: u32| (a, s.open_angle - a);

        let open = (0..s.open_angle).step_by(open_step).map(pair).collect();

        let mut close = Vec::new();
        let mut a = s.open_angle;
        loop {
            close.push(pair(a));
            match a.checked_sub(close_step) {
                Some(next) => a = next,
                None => break,
            }
        }
        if s.close_to_zero && a != 0 {
            close.push(pair(0));
        }
        Self { open, close }
    }
}

pub struct Dispenser<L, R, E, C> {
    left: L,
    right: R,
    enable: E,
    clock: C,
    left_cal: ServoCalibration,
    right_cal: ServoCalibration,
    timing: PwmTiming,
    settings: DispenseSettings,
    plan: DispensePlan,
}

impl<L, R, E, C> Dispenser<L, R, E, C>
where
    L: PwmChannel,
    R: PwmChannel,
    E: OutputLine,
    C: Clock,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        left: L,
        right: R,
        enable: E,
        clock: C,
        left_cal: ServoCalibration,
        right_cal: ServoCalibration,
        timing: PwmTiming,
        settings: DispenseSettings,
    ) -> Self {
        let plan = DispensePlan::new(&settings);
        Self {
            left,
            right,
            enable,
            clock,
            left_cal,
            right_cal,
            timing,
            settings,
            plan,
        }
    }

    pub fn plan(&self) -> &DispensePlan {
        &self.plan
    }

    /// Run one open/hold/close cycle. The servo rail is switched off again
    /// even when a servo write fails.
    pub fn dispense(&mut self, amount_g: u32) -> Result<(), FeederError> {
        tracing::info!(amount_g, "dispensing");
        self.enable.set_high().map_err(map_boxed)?;
        let outcome = self.run_cycle();
        let off = self.enable.set_low().map_err(map_boxed);
        outcome?;
        off?;
        tracing::debug!(amount_g, "dispense cycle complete");
        Ok(())
    }

    fn run_cycle(&mut self) -> Result<(), FeederError> {
        let plan = self.plan.clone();
        for &(l, r) in &plan.open {
            self.move_to(l, r)?;
        }
        self.clock.sleep(self.settings.hold);
        for &(l, r) in &plan.close {
            self.move_to(l, r)?;
        }
        Ok(())
    }

    fn move_to(&mut self, left_deg: u32, right_deg: u32) -> Result<(), FeederError> {
        let l = calculate_duty(left_deg, &self.left_cal, &self.timing);
        let r = calculate_duty(right_deg, &self.right_cal, &self.timing);
        tracing::trace!(left_deg, right_deg, l, r, "gate step");
        self.left.set_duty(l).map_err(map_boxed)?;
        self.right.set_duty(r).map_err(map_boxed)?;
        self.clock.sleep(self.settings.step_delay);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_plan_shape() {
        let plan = DispensePlan::new(&DispenseSettings::default());
        assert_eq!(plan.open.len(), 29);
        assert_eq!(plan.open.first(), Some(&(0, 141)));
        assert_eq!(plan.open.last(), Some(&(140, 1)));
        let lefts: Vec<u32> = plan.close.iter().map(|p| p.0).collect();
        assert_eq!(lefts, vec![141, 126, 111, 96, 81, 66, 51, 36, 21, 6]);
        assert_eq!(plan.close.last(), Some(&(6, 135)));
    }

    #[test]
    fn close_to_zero_appends_final_step() {
        let s = DispenseSettings {
            close_to_zero: true,
            ..DispenseSettings::default()
        };
        let plan = DispensePlan::new(&s);
        assert_eq!(plan.close.len(), 11);
        assert_eq!(plan.close.last(), Some(&(0, 141)));
    }

    #[test]
    fn close_does_not_repeat_zero() {
        let s = DispenseSettings {
            open_angle: 30,
            close_step_deg: 15,
            close_to_zero: true,
            ..DispenseSettings::default()
        };
        let plan = DispensePlan::new(&s);
        let lefts: Vec<u32> = plan.close.iter().map(|p| p.0).collect();
        assert_eq!(lefts, vec![30, 15, 0]);
    }
}
