//! Daily dispense schedule kept by the controlling side of the link.
//!
//! Slots fire in time order. After a slot fires nothing else fires until the
//! feeder acknowledges with a `status` report; the acknowledgement moves on to
//! the next slot, and past the last slot every slot moves one day ahead.

use chrono::{DateTime, NaiveTime, TimeDelta, Utc};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    slots: Vec<DateTime<Utc>>,
    next: usize,
    awaiting_ack: bool,
}

impl Schedule {
    /// Next occurrence (at or after `now`) of each time of day, in UTC.
    pub fn daily(times: &[NaiveTime], now: DateTime<Utc>) -> Self {
        let today = now.date_naive();
        let mut slots: Vec<DateTime<Utc>> = times
            .iter()
            .map(|t| {
                let at = today.and_time(*t).and_utc();
                if at < now { at + TimeDelta::days(1) } else { at }
            })
            .collect();
        slots.sort_unstable();
        slots.dedup();
        Self {
            slots,
            next: 0,
            awaiting_ack: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        self.slots.get(self.next).copied()
    }

    pub fn awaiting_ack(&self) -> bool {
        self.awaiting_ack
    }

    /// True exactly once per slot, when `now` has reached it.
    pub fn poll_due(&mut self, now: DateTime<Utc>) -> bool {
        if self.awaiting_ack {
            return false;
        }
        match self.next_due() {
            Some(at) if now >= at => {
                self.awaiting_ack = true;
                true
            }
            _ => false,
        }
    }

    /// The feeder reported a completed dispense for the pending slot.
    pub fn acknowledge(&mut self) {
        if !self.awaiting_ack {
            return;
        }
        self.awaiting_ack = false;
        self.next += 1;
        if self.next >= self.slots.len() {
            for slot in &mut self.slots {
                *slot += TimeDelta::days(1);
            }
            self.next = 0;
            tracing::info!(next = ?self.next_due(), "last dispense of the day done; schedule rolled over");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn past_times_start_tomorrow() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let s = Schedule::daily(&[hm(7, 0), hm(18, 0)], now);
        assert_eq!(
            s.next_due(),
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 18, 0, 0).unwrap())
        );
    }

    #[test]
    fn empty_schedule_never_fires() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let mut s = Schedule::daily(&[], now);
        assert!(s.is_empty());
        assert!(!s.poll_due(now + TimeDelta::days(3)));
        s.acknowledge();
        assert_eq!(s.next_due(), None);
    }
}
