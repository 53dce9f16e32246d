use feeder_core::{FeederError, WeightCalibration, WeightSampler, WeightSettings};
use feeder_hardware::{SimulatedLine, SimulatedLoadCell};
use feeder_traits::ManualClock;
use std::time::Duration;

fn sampler(
    cell: &SimulatedLoadCell,
    enable: &SimulatedLine,
    calibration: Option<WeightCalibration>,
) -> WeightSampler<SimulatedLoadCell, SimulatedLine, ManualClock> {
    WeightSampler::new(
        cell.clone(),
        enable.clone(),
        ManualClock::new(),
        WeightSettings {
            calibration,
            ..WeightSettings::default()
        },
    )
}

#[test]
fn averages_sixty_four_raw_reads() {
    // 1000, 1001, ..., 1063 → mean 1031.5, truncated
    let cell = SimulatedLoadCell::new(1000).with_step(1);
    let enable = SimulatedLine::new();
    let reading = sampler(&cell, &enable, None).sample().unwrap();
    assert_eq!(cell.reads(), 64);
    assert_eq!(reading.raw_avg, 1031);
    assert_eq!(reading.value, 1031.0);
}

#[test]
fn enable_is_pulled_low_for_the_burst() {
    let cell = SimulatedLoadCell::new(0);
    let enable = SimulatedLine::new();
    sampler(&cell, &enable, None).sample().unwrap();
    assert_eq!(enable.levels(), vec![false, true]);
}

#[test]
fn calibration_converts_to_grams() {
    let cell = SimulatedLoadCell::new(108_000);
    let enable = SimulatedLine::new();
    let cal = WeightCalibration {
        gain_g_per_count: 0.01,
        zero_counts: 100_000,
        offset_g: 2.0,
    };
    let reading = sampler(&cell, &enable, Some(cal)).sample().unwrap();
    assert!((reading.value - 82.0).abs() < 1e-3);
}

#[test]
fn read_failure_releases_enable_and_maps_to_timeout() {
    let cell = SimulatedLoadCell::new(0);
    cell.set_failing(true);
    let enable = SimulatedLine::new();
    let err = sampler(&cell, &enable, None).sample().unwrap_err();
    assert!(matches!(err, FeederError::Timeout));
    assert_eq!(enable.is_high(), Some(true));
}

#[test]
fn settle_time_is_waited() {
    let cell = SimulatedLoadCell::new(0);
    let enable = SimulatedLine::new();
    let clock = ManualClock::new();
    let mut s = WeightSampler::new(cell, enable, clock.clone(), WeightSettings::default());
    s.sample().unwrap();
    assert_eq!(clock.elapsed(), Duration::from_micros(20));
}
