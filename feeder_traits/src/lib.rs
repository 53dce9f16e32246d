pub mod clock;

pub use clock::{Clock, ManualClock, MonotonicClock};

use std::time::Duration;

/// One PWM output driving a hobby servo. `duty` is in timer counts.
pub trait PwmChannel {
    fn set_duty(&mut self, duty: u32) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// A digital output line (enable pins for the servo rail and the load cell).
pub trait OutputLine {
    fn set_high(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
    fn set_low(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Load-cell amplifier returning raw conversion counts.
pub trait LoadCell {
    fn read_raw(
        &mut self,
        timeout: Duration,
    ) -> Result<i32, Box<dyn std::error::Error + Send + Sync>>;
}

/// Motion detector with edge-triggered events.
pub trait MotionSensor {
    /// Block up to `timeout` for a rising edge. Returns `true` when one was seen.
    fn wait_for_motion(
        &mut self,
        timeout: Duration,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>>;
}

/// A publication received from the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Publish/subscribe link to the cloud broker.
///
/// Implementations own reconnection: `poll` should return `Ok(None)` while the
/// transport is re-establishing itself and reserve `Err` for failures the
/// caller cannot recover from.
pub trait MqttLink {
    fn connect(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
    fn subscribe(&mut self, topic: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
    fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
    /// Wait up to `timeout` for the next inbound publication.
    fn poll(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<InboundMessage>, Box<dyn std::error::Error + Send + Sync>>;
}

impl<T: PwmChannel + ?Sized> PwmChannel for Box<T> {
    fn set_duty(&mut self, duty: u32) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).set_duty(duty)
    }
}

impl<T: OutputLine + ?Sized> OutputLine for Box<T> {
    fn set_high(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).set_high()
    }
    fn set_low(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).set_low()
    }
}

impl<T: LoadCell + ?Sized> LoadCell for Box<T> {
    fn read_raw(
        &mut self,
        timeout: Duration,
    ) -> Result<i32, Box<dyn std::error::Error + Send + Sync>> {
        (**self).read_raw(timeout)
    }
}

impl<T: MotionSensor + ?Sized> MotionSensor for Box<T> {
    fn wait_for_motion(
        &mut self,
        timeout: Duration,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        (**self).wait_for_motion(timeout)
    }
}

impl<T: MqttLink + ?Sized> MqttLink for Box<T> {
    fn connect(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).connect()
    }
    fn subscribe(&mut self, topic: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).subscribe(topic)
    }
    fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).publish(topic, payload)
    }
    fn poll(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<InboundMessage>, Box<dyn std::error::Error + Send + Sync>> {
        (**self).poll(timeout)
    }
}
