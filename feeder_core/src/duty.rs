//! Angle → PWM duty conversion for hobby servos.
//!
//! The pulse span is scaled with integer division before it is turned into a
//! duty fraction, so results match the firmware tables exactly
//! (e.g. 90° on the left gate servo is 2473, not 2474).

use crate::config::{PwmTiming, ServoCalibration};

impl PwmTiming {
    /// PWM period in microseconds (20 000 at 50 Hz).
    pub fn period_us(&self) -> u32 {
        1_000_000 / self.frequency_hz.max(1)
    }

    /// Largest duty value the timer accepts.
    pub fn max_count(&self) -> u32 {
        let bits = u32::from(self.resolution_bits.clamp(1, 31));
        (1u32 << bits) - 1
    }
}

/// Duty count that positions a servo at `angle` degrees.
///
/// Angles above `cal.max_degree` are clamped.
pub fn calculate_duty(angle: u32, cal: &ServoCalibration, timing: &PwmTiming) -> u32 {
    let max_degree = cal.max_degree.max(1);
    let angle = angle.min(max_degree);
    let range = u64::from(cal.max_pulse_us.saturating_sub(cal.min_pulse_us));
    let span = range * u64::from(angle) / u64::from(max_degree);

    let period = f64::from(timing.period_us());
    let fraction = f64::from(cal.min_pulse_us) / period + span as f64 / period;
    let duty = (fraction * f64::from(timing.max_count())).floor();
    if duty <= 0.0 {
        0
    } else if duty >= f64::from(timing.max_count()) {
        timing.max_count()
    } else {
        duty as u32
    }
}

/// Angles visited by the demo: 0 up to `max_degree - 1`, then back down to 0.
pub fn sweep_angles(max_degree: u32) -> impl Iterator<Item = u32> {
    (0..max_degree).chain((0..=max_degree).rev())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_timing() {
        let t = PwmTiming::default();
        assert_eq!(t.period_us(), 20_000);
        assert_eq!(t.max_count(), 32_767);
    }

    #[test]
    fn left_servo_table() {
        let t = PwmTiming::default();
        let cal = ServoCalibration::FEEDER_LEFT;
        assert_eq!(calculate_duty(0, &cal, &t), 524);
        assert_eq!(calculate_duty(90, &cal, &t), 2473);
    }

    #[test]
    fn clamps_past_max_degree() {
        let t = PwmTiming::default();
        let cal = ServoCalibration::DEMO;
        assert_eq!(calculate_duty(500, &cal, &t), calculate_duty(180, &cal, &t));
    }

    #[test]
    fn sweep_turns_at_max() {
        let angles: Vec<u32> = sweep_angles(3).collect();
        assert_eq!(angles, vec![0, 1, 2, 3, 2, 1, 0]);
    }
}
