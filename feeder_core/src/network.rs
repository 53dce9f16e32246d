//! Broker session: inbound forwarding and the periodic report.

use crossbeam_channel as xch;
use feeder_traits::{InboundMessage, MqttLink};
use std::sync::Arc;
use std::time::Instant;

use crate::config::NetworkSettings;
use crate::error::FeederError;
use crate::hw_error::map_hw_error;
use crate::report::{Report, ReportId};
use crate::state::FeederState;
use crate::worker::Shutdown;

pub struct NetworkTask<M> {
    link: M,
    settings: NetworkSettings,
    state: Arc<FeederState>,
    inbox: xch::Sender<Vec<u8>>,
    reports: xch::Receiver<ReportId>,
}

impl<M: MqttLink> NetworkTask<M> {
    pub fn new(
        link: M,
        settings: NetworkSettings,
        state: Arc<FeederState>,
        inbox: xch::Sender<Vec<u8>>,
        reports: xch::Receiver<ReportId>,
    ) -> Self {
        Self {
            link,
            settings,
            state,
            inbox,
            reports,
        }
    }

    /// Runs until shutdown (`Ok`) or an unrecoverable broker error.
    pub fn run(&mut self, shutdown: &Shutdown) -> Result<(), FeederError> {
        if !self.connect(shutdown) {
            return Ok(());
        }
        tracing::info!(topic = %self.settings.topic_sub, "subscribing");
        self.link
            .subscribe(&self.settings.topic_sub)
            .map_err(|e| {
                FeederError::Network(format!("subscribe to {}: {e}", self.settings.topic_sub))
            })?;

        loop {
            self.drain_inbound()?;
            if shutdown.wait(self.settings.publish_interval) {
                return Ok(());
            }
            self.publish_report()?;
        }
    }

    /// Returns false when shutdown arrived before a connection.
    fn connect(&mut self, shutdown: &Shutdown) -> bool {
        let mut attempt: u32 = 0;
        loop {
            if shutdown.is_requested() {
                return false;
            }
            attempt += 1;
            match self.link.connect() {
                Ok(()) => {
                    tracing::info!(attempt, "connected to broker");
                    return true;
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "broker connection failed; retrying");
                    if shutdown.wait(self.settings.connect_retry) {
                        return false;
                    }
                }
            }
        }
    }

    fn drain_inbound(&mut self) -> Result<(), FeederError> {
        let deadline = Instant::now() + self.settings.yield_timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(());
            }
            match self.link.poll(remaining) {
                Ok(Some(msg)) => self.forward(msg),
                Ok(None) => return Ok(()),
                Err(e) => return Err(FeederError::Network(format!("poll: {e}"))),
            }
        }
    }

    fn forward(&self, msg: InboundMessage) {
        let len = msg.payload.len();
        if len > self.settings.max_message_bytes {
            tracing::warn!(
                topic = %msg.topic,
                len,
                max = self.settings.max_message_bytes,
                "inbound message too large; dropped"
            );
            return;
        }
        tracing::debug!(topic = %msg.topic, len, "inbound message");
        if self.inbox.try_send(msg.payload).is_err() {
            tracing::warn!("rx queue full; inbound message dropped");
        }
    }

    fn publish_report(&mut self) -> Result<(), FeederError> {
        let report = Report::build(self.reports.try_iter(), &self.state);
        let json = report
            .to_json()
            .map_err(|e| FeederError::State(format!("report serialization: {e}")))?;
        tracing::debug!(%json, topic = %self.settings.topic_pub, "publishing");
        let Err(e) = self.link.publish(&self.settings.topic_pub, json.as_bytes()) else {
            return Ok(());
        };
        if matches!(map_hw_error(e.as_ref()), FeederError::Timeout) {
            tracing::warn!("publish acknowledgement timed out");
            return Ok(());
        }
        Err(FeederError::Network(format!(
            "publish to {}: {e}",
            self.settings.topic_pub
        )))
    }
}
