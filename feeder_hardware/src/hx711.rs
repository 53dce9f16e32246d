use std::time::Duration;
use tracing::trace;

use crate::error::{HwError, Result};
use crate::util::{delay_us, wait_until_low_with_timeout};

/// Bit-banged HX711 load-cell amplifier.
pub struct Hx711 {
    dt: rppal::gpio::InputPin,
    sck: rppal::gpio::OutputPin,
    gain_pulses: u8, // 1, 2 or 3 extra clocks select gain/channel for the next conversion
}

impl Hx711 {
    pub fn new(
        dt_pin: rppal::gpio::InputPin,
        mut sck_pin: rppal::gpio::OutputPin,
        gain_pulses: u8,
    ) -> Result<Self> {
        sck_pin.set_low(); // clock idle low
        Ok(Self {
            dt: dt_pin,
            sck: sck_pin,
            gain_pulses,
        })
    }

    pub fn read_with_timeout(&mut self, timeout: Duration) -> Result<i32> {
        // Data ready when DT goes low
        let dt = &self.dt;
        wait_until_low_with_timeout(|| dt.is_high(), timeout, Duration::from_micros(200))
            .map_err(|_| HwError::Timeout)?;

        // Clock out 24 bits
        let mut value: i32 = 0;
        for _ in 0..24 {
            self.sck.set_high();
            delay_us(1);
            value = (value << 1) | i32::from(self.dt.is_high());
            self.sck.set_low();
            delay_us(1);
        }

        for _ in 0..self.gain_pulses {
            self.sck.set_high();
            delay_us(1);
            self.sck.set_low();
            delay_us(1);
        }

        // Sign extend 24-bit
        if (value & 0x80_0000) != 0 {
            value |= !0xFF_FFFF;
        }
        trace!(raw = value, "hx711 raw read");
        Ok(value)
    }
}

