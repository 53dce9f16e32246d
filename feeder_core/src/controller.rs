//! The controlling side of the link.
//!
//! Publishes a dispense-and-weigh request whenever a schedule slot comes due,
//! asks for the bowl weight at a fixed interval in between, and reads the
//! feeder's periodic reports. A `status` report acknowledges the pending slot.

use chrono::{DateTime, Utc};
use feeder_traits::MqttLink;
use serde::Serialize;
use serde_json::Value;

use crate::command::Outcome;
use crate::config::ControllerSettings;
use crate::error::FeederError;
use crate::hw_error::map_hw_error;
use crate::schedule::Schedule;
use crate::worker::Shutdown;

pub const DISPENSE_REQUEST: &str = r#"{"request":["dispense","weight"]}"#;
pub const WEIGHT_REQUEST: &str = r#"{"request":["weight"]}"#;

/// What the controller knows about the feeder.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControllerStatus {
    pub weight: Option<f64>,
    pub amount_g: Option<u32>,
    pub next_dispense: Option<DateTime<Utc>>,
    pub awaiting_ack: bool,
    pub dispenses_requested: u64,
}

pub struct Controller<M> {
    link: M,
    settings: ControllerSettings,
    schedule: Schedule,
    amount_g: Option<u32>,
    weight: Option<f64>,
    last_weight_poll: Option<DateTime<Utc>>,
    dispenses_requested: u64,
}

impl<M: MqttLink> Controller<M> {
    pub fn new(link: M, settings: ControllerSettings, now: DateTime<Utc>) -> Self {
        let schedule = Schedule::daily(&settings.times, now);
        Self {
            link,
            amount_g: settings.amount_g,
            settings,
            schedule,
            weight: None,
            last_weight_poll: None,
            dispenses_requested: 0,
        }
    }

    pub fn status(&self) -> ControllerStatus {
        ControllerStatus {
            weight: self.weight,
            amount_g: self.amount_g,
            next_dispense: self.schedule.next_due(),
            awaiting_ack: self.schedule.awaiting_ack(),
            dispenses_requested: self.dispenses_requested,
        }
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Runs until shutdown or an unrecoverable broker error.
    pub fn run(&mut self, shutdown: &Shutdown) -> Result<ControllerStatus, FeederError> {
        if !self.connect(shutdown) {
            return Ok(self.status());
        }
        self.link
            .subscribe(&self.settings.report_topic)
            .map_err(|e| {
                FeederError::Network(format!("subscribe to {}: {e}", self.settings.report_topic))
            })?;
        tracing::info!(
            slots = ?self.settings.times,
            next = ?self.schedule.next_due(),
            "controller running"
        );
        if let Some(g) = self.amount_g {
            self.send_update(g)?;
        }

        while !shutdown.is_requested() {
            match self.link.poll(self.settings.tick) {
                Ok(Some(msg)) => {
                    self.handle(&msg.payload)?;
                }
                Ok(None) => {}
                Err(e) => return Err(FeederError::Network(format!("poll: {e}"))),
            }
            self.tick(Utc::now())?;
        }
        Ok(self.status())
    }

    fn connect(&mut self, shutdown: &Shutdown) -> bool {
        loop {
            if shutdown.is_requested() {
                return false;
            }
            match self.link.connect() {
                Ok(()) => return true,
                Err(e) => {
                    tracing::warn!(error = %e, "broker connection failed; retrying");
                    if shutdown.wait(self.settings.connect_retry) {
                        return false;
                    }
                }
            }
        }
    }

    /// Publish whatever is due at `now`: a scheduled dispense takes
    /// precedence over the periodic weight request.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Result<(), FeederError> {
        if self.schedule.poll_due(now) {
            tracing::info!(slot = ?now, "dispense time");
            self.dispenses_requested += 1;
            return self.publish(DISPENSE_REQUEST);
        }
        let last = *self.last_weight_poll.get_or_insert(now);
        let poll_every = chrono::TimeDelta::from_std(self.settings.weight_poll)
            .unwrap_or(chrono::TimeDelta::MAX);
        if now - last >= poll_every {
            self.last_weight_poll = Some(now);
            tracing::debug!("requesting bowl weight");
            return self.publish(WEIGHT_REQUEST);
        }
        Ok(())
    }

    /// Apply one report from the feeder.
    pub fn handle(&mut self, payload: &[u8]) -> Result<Outcome, FeederError> {
        let Ok(Value::Object(msg)) = serde_json::from_slice::<Value>(payload) else {
            tracing::warn!(payload = %String::from_utf8_lossy(payload), "malformed report");
            return Ok(Outcome::Malformed);
        };
        let mut valid = false;

        if msg.contains_key("heartbeat") {
            tracing::trace!("heartbeat from feeder");
            valid = true;
        }
        if let Some(w) = msg.get("weight") {
            valid = true;
            match w.as_f64() {
                Some(w) => {
                    tracing::info!(weight = w, "bowl weight");
                    self.weight = Some(w);
                }
                None => tracing::warn!(%w, "weight is not a number"),
            }
        }
        if let Some(update) = msg.get("update") {
            valid = true;
            let amount = update
                .get("amount")
                .unwrap_or(update)
                .as_u64()
                .and_then(|a| u32::try_from(a).ok());
            match amount {
                Some(g) => {
                    self.amount_g = Some(g);
                    self.send_update(g)?;
                }
                None => tracing::warn!(%update, "update without a usable amount"),
            }
        }
        if let Some(status) = msg.get("status") {
            valid = true;
            if self.schedule.awaiting_ack() {
                tracing::info!(%status, "scheduled dispense acknowledged");
                self.schedule.acknowledge();
            } else {
                tracing::info!(%status, "unscheduled dispense reported");
            }
        }
        if let Some(m) = msg.get("motion") {
            tracing::info!(motion = %m, "motion sensor report");
        }

        if valid {
            Ok(Outcome::Valid)
        } else {
            tracing::warn!(payload = %String::from_utf8_lossy(payload), "report has no known keys");
            Ok(Outcome::Invalid)
        }
    }

    fn send_update(&mut self, grams: u32) -> Result<(), FeederError> {
        tracing::info!(amount_g = grams, "sending dispense amount");
        self.publish(&serde_json::json!({ "update": grams }).to_string())
    }

    fn publish(&mut self, json: &str) -> Result<(), FeederError> {
        tracing::debug!(%json, topic = %self.settings.command_topic, "publishing");
        let Err(e) = self
            .link
            .publish(&self.settings.command_topic, json.as_bytes())
        else {
            return Ok(());
        };
        if matches!(map_hw_error(e.as_ref()), FeederError::Timeout) {
            tracing::warn!("publish acknowledgement timed out");
            return Ok(());
        }
        Err(FeederError::Network(format!(
            "publish to {}: {e}",
            self.settings.command_topic
        )))
    }
}
