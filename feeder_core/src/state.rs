//! Flags and values shared between the feeder tasks.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

#[derive(Debug, Default)]
pub struct FeederState {
    time_dispense: AtomicBool,
    sample_weight: AtomicBool,
    dispense_amount: AtomicU32,
    /// `f32` bit pattern.
    weight: AtomicU32,
    motion_seen: AtomicBool,
}

/// Point-in-time copy of [`FeederState`], for logs and `--json` output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StateSnapshot {
    pub time_dispense: bool,
    pub sample_weight: bool,
    pub dispense_amount: u32,
    pub weight: f32,
    pub motion_seen: bool,
}

impl FeederState {
    pub fn new(dispense_amount: u32) -> Self {
        let s = Self::default();
        s.set_dispense_amount(dispense_amount);
        s
    }

    pub fn request_dispense(&self) {
        self.time_dispense.store(true, Ordering::Release);
    }
    pub fn dispense_requested(&self) -> bool {
        self.time_dispense.load(Ordering::Acquire)
    }
    pub fn clear_dispense(&self) {
        self.time_dispense.store(false, Ordering::Release);
    }

    pub fn request_weight(&self) {
        self.sample_weight.store(true, Ordering::Release);
    }
    pub fn weight_requested(&self) -> bool {
        self.sample_weight.load(Ordering::Acquire)
    }
    pub fn clear_weight_request(&self) {
        self.sample_weight.store(false, Ordering::Release);
    }

    pub fn set_dispense_amount(&self, grams: u32) {
        self.dispense_amount.store(grams, Ordering::Relaxed);
    }
    pub fn dispense_amount(&self) -> u32 {
        self.dispense_amount.load(Ordering::Relaxed)
    }

    pub fn set_weight(&self, value: f32) {
        self.weight.store(value.to_bits(), Ordering::Relaxed);
    }
    pub fn weight(&self) -> f32 {
        f32::from_bits(self.weight.load(Ordering::Relaxed))
    }

    pub fn mark_motion(&self) {
        self.motion_seen.store(true, Ordering::Release);
    }
    /// Read and clear the motion latch.
    pub fn take_motion(&self) -> bool {
        self.motion_seen.swap(false, Ordering::AcqRel)
    }

    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            time_dispense: self.dispense_requested(),
            sample_weight: self.weight_requested(),
            dispense_amount: self.dispense_amount(),
            weight: self.weight(),
            motion_seen: self.motion_seen.load(Ordering::Acquire),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weight_round_trips_through_bits() {
        let s = FeederState::new(0);
        s.set_weight(-12.5);
        assert_eq!(s.weight(), -12.5);
    }

    #[test]
    fn motion_latch_clears_on_take() {
        let s = FeederState::new(0);
        assert!(!s.take_motion());
        s.mark_motion();
        s.mark_motion();
        assert!(s.take_motion());
        assert!(!s.take_motion());
    }
}
