//! Raspberry Pi backends built on `rppal`.
//!
//! Servos use rppal's software PWM on any GPIO; duty counts are converted back
//! into a pulse width using the configured timer resolution.
use crossbeam_channel as xch;
use feeder_traits::{LoadCell, MotionSensor, OutputLine, PwmChannel};
use rppal::gpio::{Gpio, InputPin, Level, OutputPin, Trigger};
use std::time::Duration;

use crate::error::{HwError, Result};
use crate::hx711::Hx711;

fn gpio_err(e: rppal::gpio::Error) -> HwError {
    HwError::Gpio(e.to_string())
}

fn open_gpio() -> Result<Gpio> {
    Gpio::new().map_err(gpio_err)
}

pub struct RpiServo {
    pin: OutputPin,
    period: Duration,
    max_count: u32,
}

impl RpiServo {
    pub fn new(pin: u8, frequency_hz: u32, resolution_bits: u8) -> Result<Self> {
        let gpio = open_gpio()?;
        let mut pin = gpio.get(pin).map_err(gpio_err)?.into_output();
        pin.set_low();
        Ok(Self {
            pin,
            period: Duration::from_micros(u64::from(1_000_000 / frequency_hz.max(1))),
            max_count: (1u32 << resolution_bits.min(31)) - 1,
        })
    }

    fn pulse_for(&self, duty: u32) -> Duration {
        let duty = u64::from(duty.min(self.max_count));
        let period_ns = self.period.as_nanos() as u64;
        Duration::from_nanos(period_ns * duty / u64::from(self.max_count.max(1)))
    }
}

impl PwmChannel for RpiServo {
    fn set_duty(&mut self, duty: u32) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if duty == 0 {
            self.pin.clear_pwm().map_err(gpio_err)?;
            return Ok(());
        }
        let pulse = self.pulse_for(duty);
        tracing::trace!(duty, pulse_us = pulse.as_micros() as u64, "servo pulse");
        self.pin.set_pwm(self.period, pulse).map_err(|e| HwError::Pwm(e.to_string()))?;
        Ok(())
    }
}

pub struct RpiLine {
    pin: OutputPin,
}

impl RpiLine {
    pub fn new(pin: u8) -> Result<Self> {
        let gpio = open_gpio()?;
        let pin = gpio.get(pin).map_err(gpio_err)?.into_output();
        Ok(Self { pin })
    }
}

impl OutputLine for RpiLine {
    fn set_high(&mut self) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.pin.set_high();
        Ok(())
    }
    fn set_low(&mut self) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.pin.set_low();
        Ok(())
    }
}

/// PIR sensor on a pulled-down input; rising edges are queued by rppal's
/// interrupt thread into a bounded channel and dropped when it is full.
pub struct RpiMotion {
    _pin: InputPin,
    rx: xch::Receiver<()>,
}

impl RpiMotion {
    pub fn new(pin: u8, capacity: usize) -> Result<Self> {
        let gpio = open_gpio()?;
        let mut pin = gpio.get(pin).map_err(gpio_err)?.into_input_pulldown();
        let (tx, rx) = xch::bounded(capacity.max(1));
        pin.set_async_interrupt(Trigger::RisingEdge, move |_level: Level| {
            let _ = tx.try_send(());
        })
        .map_err(gpio_err)?;
        Ok(Self { _pin: pin, rx })
    }
}

impl MotionSensor for RpiMotion {
    fn wait_for_motion(
        &mut self,
        timeout: Duration,
    ) -> std::result::Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        match self.rx.recv_timeout(timeout) {
            Ok(()) => Ok(true),
            Err(xch::RecvTimeoutError::Timeout) => Ok(false),
            Err(xch::RecvTimeoutError::Disconnected) => Err(Box::new(HwError::Gpio(
                "motion interrupt handler detached".into(),
            ))),
        }
    }
}

pub struct Hx711LoadCell {
    hx711: Hx711,
}

impl Hx711LoadCell {
    /// Channel A, gain 128.
    pub fn new(dt_pin: u8, sck_pin: u8) -> Result<Self> {
        let gpio = open_gpio()?;
        let dt = gpio.get(dt_pin).map_err(gpio_err)?.into_input();
        let sck = gpio.get(sck_pin).map_err(gpio_err)?.into_output();
        Ok(Self {
            hx711: Hx711::new(dt, sck, 1)?,
        })
    }
}

impl LoadCell for Hx711LoadCell {
    fn read_raw(
        &mut self,
        timeout: Duration,
    ) -> std::result::Result<i32, Box<dyn std::error::Error + Send + Sync>> {
        let mut attempts = 0;
        let max_attempts = 3;
        loop {
            match self.hx711.read_with_timeout(timeout) {
                Ok(raw) => {
                    tracing::debug!(raw, "hx711 sample");
                    return Ok(raw);
                }
                Err(HwError::Timeout) if attempts < max_attempts => {
                    attempts += 1;
                    tracing::warn!(retries = attempts, "load cell timeout, retrying");
                }
                Err(e) => {
                    tracing::error!("Load cell read error: {}", e);
                    return Err(Box::new(e));
                }
            }
        }
    }
}
