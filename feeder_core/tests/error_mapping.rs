use feeder_core::{FeederError, map_hw_error};
use feeder_hardware::error::HwError;

#[test]
fn typed_hardware_errors_map_precisely() {
    assert!(matches!(map_hw_error(&HwError::Timeout), FeederError::Timeout));
    assert!(matches!(
        map_hw_error(&HwError::DataReadyTimeout),
        FeederError::Timeout
    ));
    assert!(matches!(
        map_hw_error(&HwError::Disconnected),
        FeederError::Network(_)
    ));
    assert!(matches!(
        map_hw_error(&HwError::Gpio("pin 17 busy".into())),
        FeederError::HardwareFault(_)
    ));
}

#[test]
fn foreign_errors_fall_back_to_message_text() {
    let timeout: Box<dyn std::error::Error + Send + Sync> = "sensor timeout".into();
    assert!(matches!(map_hw_error(timeout.as_ref()), FeederError::Timeout));
    let other: Box<dyn std::error::Error + Send + Sync> = "bus glitch".into();
    match map_hw_error(other.as_ref()) {
        FeederError::Hardware(msg) => assert_eq!(msg, "bus glitch"),
        e => panic!("unexpected {e:?}"),
    }
}
