//! Averaged load-cell sampling.
//!
//! The amplifier's enable line is active-low: it is pulled low for the burst
//! and released (high) afterwards, also when a read fails.

use feeder_traits::clock::Clock;
use feeder_traits::{LoadCell, OutputLine};

use crate::config::WeightSettings;
use crate::error::FeederError;
use crate::hw_error::map_boxed;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightReading {
    /// Integer mean of the raw burst.
    pub raw_avg: i32,
    /// Grams when calibrated, otherwise `raw_avg` as a float.
    pub value: f32,
}

pub struct WeightSampler<S, E, C> {
    cell: S,
    enable: E,
    clock: C,
    settings: WeightSettings,
}

impl<S, E, C> WeightSampler<S, E, C>
where
    S: LoadCell,
    E: OutputLine,
    C: Clock,
{
    pub fn new(cell: S, enable: E, clock: C, settings: WeightSettings) -> Self {
        Self {
            cell,
            enable,
            clock,
            settings,
        }
    }

    pub fn sample(&mut self) -> Result<WeightReading, FeederError> {
        self.enable.set_low().map_err(map_boxed)?;
        self.clock.sleep(self.settings.settle);
        let burst = self.read_burst();
        let release = self.enable.set_high().map_err(map_boxed);
        let raw_avg = burst?;
        release?;

        let value = match &self.settings.calibration {
            Some(cal) => cal.to_grams(raw_avg),
            None => raw_avg as f32,
        };
        tracing::debug!(raw_avg, value, "weight sampled");
        Ok(WeightReading { raw_avg, value })
    }

    fn read_burst(&mut self) -> Result<i32, FeederError> {
        let n = self.settings.samples.max(1);
        let mut sum: i64 = 0;
        for _ in 0..n {
            let raw = self
                .cell
                .read_raw(self.settings.read_timeout)
                .map_err(map_boxed)?;
            sum += i64::from(raw);
        }
        // The mean of i32 values always fits in i32.
        Ok((sum / i64::from(n)) as i32)
    }
}
