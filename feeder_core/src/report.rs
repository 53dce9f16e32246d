//! Periodic outbound message.

use serde::Serialize;

use crate::state::FeederState;

/// Item on the outbound queue: what happened since the last report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportId {
    Weight,
    Dispensed,
    Motion,
}

impl ReportId {
    pub fn as_char(self) -> char {
        match self {
            ReportId::Weight => 'w',
            ReportId::Dispensed => 'd',
            ReportId::Motion => 'm',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'w' => Some(ReportId::Weight),
            'd' => Some(ReportId::Dispensed),
            'm' => Some(ReportId::Motion),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub heartbeat: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub motion: Option<u8>,
}

impl Default for Report {
    fn default() -> Self {
        Self {
            heartbeat: 1,
            weight: None,
            status: None,
            motion: None,
        }
    }
}

impl Report {
    /// Fold queued ids into a report, reading values from `state`.
    ///
    /// A motion id consumes the motion latch; several of them in one report
    /// still yield 1 if any edge was seen.
    pub fn build(ids: impl IntoIterator<Item = ReportId>, state: &FeederState) -> Self {
        let mut report = Self::default();
        for id in ids {
            tracing::debug!(id = %id.as_char(), "report item");
            match id {
                ReportId::Weight => report.weight = Some(state.weight()),
                ReportId::Dispensed => report.status = Some("ready"),
                ReportId::Motion => {
                    let seen = u8::from(state.take_motion());
                    report.motion = Some(report.motion.unwrap_or(0).max(seen));
                }
            }
        }
        report
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_report_is_heartbeat_only() {
        let state = FeederState::new(0);
        let json = Report::build([], &state).to_json().unwrap();
        assert_eq!(json, r#"{"heartbeat":1}"#);
    }

    #[test]
    fn ids_round_trip_through_chars() {
        for id in [ReportId::Weight, ReportId::Dispensed, ReportId::Motion] {
            assert_eq!(ReportId::from_char(id.as_char()), Some(id));
        }
        assert_eq!(ReportId::from_char('x'), None);
    }
}
