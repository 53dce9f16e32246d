use feeder_core::{PwmTiming, ServoCalibration, calculate_duty, sweep_angles};
use proptest::prelude::*;
use rstest::rstest;

#[rstest]
#[case(ServoCalibration::FEEDER_LEFT, 0, 524)]
#[case(ServoCalibration::FEEDER_LEFT, 90, 2473)]
#[case(ServoCalibration::DEMO, 0, 819)]
#[case(ServoCalibration::DEMO, 90, 2457)]
#[case(ServoCalibration::DEMO, 180, 4095)]
fn reference_duties(#[case] cal: ServoCalibration, #[case] angle: u32, #[case] expected: u32) {
    assert_eq!(calculate_duty(angle, &cal, &PwmTiming::default()), expected);
}

#[test]
fn right_servo_uses_its_own_range() {
    let t = PwmTiming::default();
    let left = calculate_duty(180, &ServoCalibration::FEEDER_LEFT, &t);
    let right = calculate_duty(180, &ServoCalibration::FEEDER_RIGHT, &t);
    assert!(right < left);
}

#[test]
fn sweep_visits_every_degree_twice_except_the_top() {
    let angles: Vec<u32> = sweep_angles(180).collect();
    assert_eq!(angles.len(), 180 + 181);
    assert_eq!(angles[179], 179);
    assert_eq!(angles[180], 180);
    assert_eq!(angles.last(), Some(&0));
}

fn any_cal() -> impl Strategy<Value = ServoCalibration> {
    (100u32..1500, 1u32..2000, 1u32..360).prop_map(|(min, width, max_degree)| ServoCalibration {
        min_pulse_us: min,
        max_pulse_us: min + width,
        max_degree,
    })
}

proptest! {
    #[test]
    fn duty_is_monotonic_in_angle(cal in any_cal(), a in 0u32..400, b in 0u32..400) {
        let t = PwmTiming::default();
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(calculate_duty(lo, &cal, &t) <= calculate_duty(hi, &cal, &t));
    }

    #[test]
    fn duty_stays_within_pulse_range(cal in any_cal(), angle in 0u32..400) {
        let t = PwmTiming::default();
        let duty = calculate_duty(angle, &cal, &t);
        let min = calculate_duty(0, &cal, &t);
        let max = calculate_duty(cal.max_degree, &cal, &t);
        prop_assert!(duty >= min && duty <= max);
        prop_assert!(duty <= t.max_count());
    }
}
