use feeder_core::{
    DispenseSettings, Dispenser, FeederError, PwmTiming, ServoCalibration, calculate_duty,
};
use feeder_hardware::{SimulatedLine, SimulatedServo};
use feeder_traits::{ManualClock, PwmChannel};
use std::time::Duration;

fn dispenser(
    left: &SimulatedServo,
    right: &SimulatedServo,
    enable: &SimulatedLine,
    clock: &ManualClock,
) -> Dispenser<SimulatedServo, SimulatedServo, SimulatedLine, ManualClock> {
    Dispenser::new(
        left.clone(),
        right.clone(),
        enable.clone(),
        clock.clone(),
        ServoCalibration::FEEDER_LEFT,
        ServoCalibration::FEEDER_RIGHT,
        PwmTiming::default(),
        DispenseSettings::default(),
    )
}

#[test]
fn cycle_opens_holds_and_closes() {
    let (left, right, enable) = (
        SimulatedServo::new(),
        SimulatedServo::new(),
        SimulatedLine::new(),
    );
    let clock = ManualClock::new();
    let mut d = dispenser(&left, &right, &enable, &clock);
    d.dispense(30).unwrap();

    let t = PwmTiming::default();
    let l = left.duties();
    let r = right.duties();
    // 29 open steps + 10 close steps
    assert_eq!(l.len(), 39);
    assert_eq!(r.len(), 39);
    assert_eq!(l[0], calculate_duty(0, &ServoCalibration::FEEDER_LEFT, &t));
    assert_eq!(r[0], calculate_duty(141, &ServoCalibration::FEEDER_RIGHT, &t));
    assert_eq!(l[29], calculate_duty(141, &ServoCalibration::FEEDER_LEFT, &t));
    // the close sweep stops at 6 degrees, 135 on the mirrored side
    assert_eq!(left.last_duty(), Some(calculate_duty(6, &ServoCalibration::FEEDER_LEFT, &t)));
    assert_eq!(right.last_duty(), Some(calculate_duty(135, &ServoCalibration::FEEDER_RIGHT, &t)));

    assert_eq!(enable.levels(), vec![true, false]);
    // 39 steps * 2 ms + 500 ms hold
    assert_eq!(clock.elapsed(), Duration::from_millis(578));
}

struct BrokenServo;

impl PwmChannel for BrokenServo {
    fn set_duty(&mut self, _duty: u32) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Err("pwm channel unavailable".into())
    }
}

#[test]
fn servo_rail_is_released_when_a_write_fails() {
    let enable = SimulatedLine::new();
    let mut d = Dispenser::new(
        BrokenServo,
        SimulatedServo::new(),
        enable.clone(),
        ManualClock::new(),
        ServoCalibration::FEEDER_LEFT,
        ServoCalibration::FEEDER_RIGHT,
        PwmTiming::default(),
        DispenseSettings::default(),
    );
    let err = d.dispense(0).expect_err("broken servo");
    assert!(matches!(err, FeederError::Hardware(_)));
    assert_eq!(enable.is_high(), Some(false));
}
