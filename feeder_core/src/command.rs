//! Inbound JSON command interpreter.
//!
//! Messages look like `{"request": ["dispense", "weight"], "update": 40, "status": 1}`;
//! every key is optional. Parsing ([`parse_command`]) is pure; applying the
//! result to the shared state is done by [`CommandInterpreter`].
//!
//! Validity is folded over the keys in the order `request`, `update`,
//! `status`, each present key overwriting the verdict of the previous one.
//! A message without `request` starts out invalid. Recognised actions are
//! applied whatever the final verdict is.

use crossbeam_channel as xch;
use serde_json::Value;
use std::sync::Arc;

use crate::heartbeat::HeartbeatHandle;
use crate::report::ReportId;
use crate::state::FeederState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    Dispense,
    Weight,
    Motion,
}

impl Request {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "dispense" => Some(Request::Dispense),
            "weight" => Some(Request::Weight),
            "motion" => Some(Request::Motion),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Command {
    pub requests: Vec<Request>,
    pub dispense_amount: Option<u32>,
    pub heartbeat: bool,
    pub valid: bool,
}

/// Parse a raw payload. Only malformed JSON is an error; semantic problems
/// end up as `valid == false`.
pub fn parse_command(payload: &[u8]) -> Result<Command, serde_json::Error> {
    let root: Value = serde_json::from_slice(payload)?;
    let mut cmd = Command::default();

    match root.get("request") {
        Some(Value::Array(items)) => {
            for item in items {
                match item.as_str().and_then(Request::from_name) {
                    Some(r) => {
                        cmd.requests.push(r);
                        cmd.valid = true;
                    }
                    None => cmd.valid = false,
                }
            }
        }
        Some(Value::String(name)) => match Request::from_name(name) {
            Some(r) => {
                cmd.requests.push(r);
                cmd.valid = true;
            }
            None => cmd.valid = false,
        },
        Some(_) | None => cmd.valid = false,
    }

    if let Some(update) = root.get("update") {
        match update.as_f64().map(f64::trunc) {
            Some(n) if n >= 0.0 => {
                cmd.dispense_amount = Some(if n >= f64::from(u32::MAX) {
                    u32::MAX
                } else {
                    n as u32
                });
                cmd.valid = true;
            }
            _ => cmd.valid = false,
        }
    }

    if let Some(status) = root.get("status") {
        if status.as_f64().map(f64::trunc) == Some(1.0) {
            cmd.heartbeat = true;
            cmd.valid = true;
        } else {
            cmd.valid = false;
        }
    }

    Ok(cmd)
}

/// What happened to one inbound payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Valid,
    Invalid,
    Malformed,
}

/// Applies parsed commands to the shared state and wakes the tasks involved.
pub struct CommandInterpreter {
    state: Arc<FeederState>,
    dispense_wake: xch::Sender<()>,
    weight_wake: xch::Sender<()>,
    reports: xch::Sender<ReportId>,
    heartbeat: HeartbeatHandle,
}

impl CommandInterpreter {
    pub fn new(
        state: Arc<FeederState>,
        dispense_wake: xch::Sender<()>,
        weight_wake: xch::Sender<()>,
        reports: xch::Sender<ReportId>,
        heartbeat: HeartbeatHandle,
    ) -> Self {
        Self {
            state,
            dispense_wake,
            weight_wake,
            reports,
            heartbeat,
        }
    }

    pub fn handle(&self, payload: &[u8]) -> Outcome {
        tracing::info!(json = %String::from_utf8_lossy(payload), "message received");
        let cmd = match parse_command(payload) {
            Ok(cmd) => cmd,
            Err(e) => {
                tracing::error!(error = %e, "could not parse inbound JSON");
                return Outcome::Malformed;
            }
        };

        for request in &cmd.requests {
            match request {
                Request::Dispense => {
                    tracing::info!("dispense requested");
                    self.state.request_dispense();
                    let _ = self.dispense_wake.try_send(());
                }
                Request::Weight => {
                    tracing::info!("weight requested");
                    self.state.request_weight();
                    let _ = self.weight_wake.try_send(());
                }
                Request::Motion => {
                    tracing::info!("motion status requested");
                    if self.reports.try_send(ReportId::Motion).is_err() {
                        tracing::warn!("tx queue full; motion report dropped");
                    }
                }
            }
        }
        if let Some(amount) = cmd.dispense_amount {
            tracing::info!(amount_g = amount, "dispense amount updated");
            self.state.set_dispense_amount(amount);
        }
        if cmd.heartbeat {
            tracing::info!("heartbeat received");
        }

        if cmd.valid {
            let s = self.state.snapshot();
            tracing::info!(
                time_dispense = s.time_dispense,
                sample_weight = s.sample_weight,
                dispense_amount = s.dispense_amount,
                "state"
            );
            self.heartbeat.reset();
            Outcome::Valid
        } else {
            tracing::error!("invalid request from the cloud");
            Outcome::Invalid
        }
    }
}
