//! Cloud heartbeat watchdog.
//!
//! Every valid inbound message resets the timer. When it runs out the feeder
//! dispenses on its own and the timer re-arms.

use crossbeam_channel as xch;
use std::sync::Arc;
use std::time::Duration;

use crate::state::FeederState;
use crate::worker::Shutdown;

/// Cheap cloneable handle used to reset the watchdog.
#[derive(Clone)]
pub struct HeartbeatHandle {
    tx: xch::Sender<()>,
}

impl HeartbeatHandle {
    pub fn reset(&self) {
        // A pending reset already re-arms the timer.
        let _ = self.tx.try_send(());
    }
}

pub struct HeartbeatWatchdog {
    timeout: Duration,
    resets: xch::Receiver<()>,
    state: Arc<FeederState>,
    dispense_wake: xch::Sender<()>,
}

impl HeartbeatWatchdog {
    pub fn new(
        timeout: Duration,
        state: Arc<FeederState>,
        dispense_wake: xch::Sender<()>,
    ) -> (Self, HeartbeatHandle) {
        let (tx, resets) = xch::bounded(1);
        (
            Self {
                timeout,
                resets,
                state,
                dispense_wake,
            },
            HeartbeatHandle { tx },
        )
    }

    pub fn run(self, shutdown: &Shutdown) {
        loop {
            xch::select! {
                recv(shutdown.receiver()) -> _ => break,
                recv(self.resets) -> msg => {
                    if msg.is_err() {
                        // All handles gone; keep the timer alive until shutdown.
                        if shutdown.wait(self.timeout) {
                            break;
                        }
                        self.expire();
                    }
                }
                default(self.timeout) => self.expire(),
            }
        }
        tracing::trace!("heartbeat watchdog exiting");
    }

    fn expire(&self) {
        tracing::warn!(
            timeout_ms = self.timeout.as_millis() as u64,
            "no heartbeat from the cloud; dispensing now"
        );
        self.state.request_dispense();
        let _ = self.dispense_wake.try_send(());
    }
}
