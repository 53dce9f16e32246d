use feeder_core::error::BuildError;
use feeder_core::{Feeder, FeederSettings};
use feeder_hardware::{
    SimulatedLine, SimulatedLink, SimulatedLoadCell, SimulatedMotion, SimulatedServo,
};
use rstest::rstest;

#[rstest]
fn missing_link_yields_typed_build_error() {
    let (motion, _trigger) = SimulatedMotion::new(10);
    let err = Feeder::builder()
        .with_left_servo(SimulatedServo::new())
        .with_right_servo(SimulatedServo::new())
        .with_servo_enable(SimulatedLine::new())
        .with_load_cell(SimulatedLoadCell::new(0))
        .with_weight_enable(SimulatedLine::new())
        .with_motion(motion)
        .build()
        .expect_err("should fail with MissingLink");

    match err.downcast_ref::<BuildError>() {
        Some(BuildError::MissingLink) => {}
        other => panic!("expected MissingLink, got: {other:?}"),
    }
}

#[rstest]
fn missing_servo_is_reported_first() {
    let err = Feeder::builder().build().expect_err("empty builder");
    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::MissingLeftServo)
    ));
}

fn complete() -> feeder_core::FeederBuilder {
    let (motion, _trigger) = SimulatedMotion::new(10);
    let (link, _remote) = SimulatedLink::new();
    Feeder::builder()
        .with_left_servo(SimulatedServo::new())
        .with_right_servo(SimulatedServo::new())
        .with_servo_enable(SimulatedLine::new())
        .with_load_cell(SimulatedLoadCell::new(0))
        .with_weight_enable(SimulatedLine::new())
        .with_motion(motion)
        .with_link(link)
}

#[rstest]
#[case::open_angle(|s: &mut FeederSettings| s.dispense.open_angle = 200, "open angle")]
#[case::samples(|s: &mut FeederSettings| s.weight.samples = 0, "samples")]
#[case::queue(|s: &mut FeederSettings| s.queues.tx_capacity = 0, "queue")]
#[case::topic(|s: &mut FeederSettings| s.network.topic_sub.clear(), "topics")]
fn invalid_settings_are_rejected(#[case] tweak: fn(&mut FeederSettings), #[case] needle: &str) {
    let mut settings = FeederSettings::default();
    tweak(&mut settings);
    let err = complete()
        .with_settings(settings)
        .build()
        .expect_err("invalid settings");
    match err.downcast_ref::<BuildError>() {
        Some(BuildError::InvalidConfig(msg)) => assert!(msg.contains(needle), "{msg}"),
        other => panic!("expected InvalidConfig, got: {other:?}"),
    }
}

#[rstest]
fn defaults_build() {
    complete().build().expect("default settings are valid");
}
