use std::time::{Duration, Instant};

use feeder_hardware::{SimulatedLine, SimulatedLink, SimulatedMotion};
use feeder_traits::{MotionSensor, MqttLink, OutputLine};
use rstest::rstest;

#[test]
fn motion_trigger_is_seen_once() {
    let (mut sensor, trigger) = SimulatedMotion::new(10);
    assert!(trigger.trigger());
    assert!(sensor.wait_for_motion(Duration::from_millis(10)).unwrap());
    assert!(!sensor.wait_for_motion(Duration::from_millis(10)).unwrap());
}

#[rstest]
#[case(1, 1)]
#[case(3, 3)]
#[case(10, 10)]
fn motion_queue_drops_edges_when_full(#[case] capacity: usize, #[case] accepted: usize) {
    let (_sensor, trigger) = SimulatedMotion::new(capacity);
    let ok = (0..capacity + 5).filter(|_| trigger.trigger()).count();
    assert_eq!(ok, accepted);
}

#[test]
fn motion_wait_respects_timeout_after_trigger_dropped() {
    let (mut sensor, trigger) = SimulatedMotion::new(1);
    drop(trigger);
    let t0 = Instant::now();
    assert!(!sensor.wait_for_motion(Duration::from_millis(20)).unwrap());
    assert!(t0.elapsed() >= Duration::from_millis(15));
}

#[test]
fn line_records_levels() {
    let line = SimulatedLine::new();
    let mut out = line.clone();
    out.set_low().unwrap();
    out.set_high().unwrap();
    assert_eq!(line.levels(), vec![false, true]);
    assert_eq!(line.is_high(), Some(true));
}

#[test]
fn link_delivers_inbox_then_injected() {
    let (link, remote) = SimulatedLink::new();
    let mut link = link.with_inbox([br#"{"status":1}"#.to_vec()]);
    link.connect().unwrap();
    link.subscribe("pet-feeder/from_aws").unwrap();
    remote.inject(r#"{"request":["weight"]}"#);

    let first = link.poll(Duration::from_millis(10)).unwrap().expect("inbox message");
    assert_eq!(first.topic, "pet-feeder/from_aws");
    assert_eq!(first.payload, br#"{"status":1}"#.to_vec());
    let second = link.poll(Duration::from_millis(10)).unwrap().expect("injected message");
    assert_eq!(second.payload, br#"{"request":["weight"]}"#.to_vec());
    assert!(link.poll(Duration::from_millis(5)).unwrap().is_none());
}

#[test]
fn link_connect_failures_and_publish_failures() {
    let (mut link, remote) = SimulatedLink::new();
    remote.fail_connects(2);
    assert!(link.connect().is_err());
    assert!(link.connect().is_err());
    assert!(link.connect().is_ok());
    assert_eq!(remote.connects(), 3);

    link.publish("t", b"{\"heartbeat\":1}").unwrap();
    remote.fail_publish(true);
    assert!(link.publish("t", b"x").is_err());
    assert_eq!(remote.published(), vec!["{\"heartbeat\":1}".to_string()]);
    assert_eq!(remote.published_topics(), vec!["t".to_string()]);
}
