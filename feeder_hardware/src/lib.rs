//! Device backends for the pet feeder.
//!
//! Simulated devices are always available and are what the CLI uses unless
//! it is built with the `hardware` feature. Each simulated device hands out a
//! cloneable handle so tests and the CLI can observe what the core did.
pub mod error;
pub mod util;

#[cfg(feature = "hardware")]
pub mod hx711;
#[cfg(feature = "hardware")]
pub mod rpi;

#[cfg(feature = "mqtt")]
pub mod mqtt;

use crossbeam_channel as xch;
use feeder_traits::{InboundMessage, LoadCell, MotionSensor, MqttLink, OutputLine, PwmChannel};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::HwError;

/// Simulated servo output; remembers every duty written.
#[derive(Debug, Default, Clone)]
pub struct SimulatedServo {
    duties: Arc<Mutex<Vec<u32>>>,
}

impl SimulatedServo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Duties written so far, oldest first.
    pub fn duties(&self) -> Vec<u32> {
        self.duties.lock().map(|d| d.clone()).unwrap_or_default()
    }

    pub fn last_duty(&self) -> Option<u32> {
        self.duties.lock().ok().and_then(|d| d.last().copied())
    }
}

impl PwmChannel for SimulatedServo {
    fn set_duty(&mut self, duty: u32) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        tracing::trace!(duty, "servo duty (simulated)");
        self.duties
            .lock()
            .map_err(|_| HwError::Pwm("duty log poisoned".into()))?
            .push(duty);
        Ok(())
    }
}

/// Simulated digital output; remembers every level driven (`true` = high).
#[derive(Debug, Default, Clone)]
pub struct SimulatedLine {
    levels: Arc<Mutex<Vec<bool>>>,
}

impl SimulatedLine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn levels(&self) -> Vec<bool> {
        self.levels.lock().map(|l| l.clone()).unwrap_or_default()
    }

    pub fn is_high(&self) -> Option<bool> {
        self.levels.lock().ok().and_then(|l| l.last().copied())
    }

    fn push(&self, level: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.levels
            .lock()
            .map_err(|_| HwError::Gpio("level log poisoned".into()))?
            .push(level);
        Ok(())
    }
}

impl OutputLine for SimulatedLine {
    fn set_high(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.push(true)
    }
    fn set_low(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.push(false)
    }
}

/// Simulated load cell returning `raw`, then `raw + step`, `raw + 2*step`, ...
#[derive(Debug, Clone)]
pub struct SimulatedLoadCell {
    raw: Arc<AtomicI32>,
    step: i32,
    reads: Arc<AtomicU32>,
    fail: Arc<AtomicBool>,
}

impl SimulatedLoadCell {
    pub fn new(raw: i32) -> Self {
        Self {
            raw: Arc::new(AtomicI32::new(raw)),
            step: 0,
            reads: Arc::new(AtomicU32::new(0)),
            fail: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Add `step` counts after every read.
    pub fn with_step(mut self, step: i32) -> Self {
        self.step = step;
        self
    }

    pub fn set_raw(&self, raw: i32) {
        self.raw.store(raw, Ordering::Relaxed);
    }

    /// Make subsequent reads time out.
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::Relaxed);
    }

    pub fn reads(&self) -> u32 {
        self.reads.load(Ordering::Relaxed)
    }
}

impl LoadCell for SimulatedLoadCell {
    fn read_raw(
        &mut self,
        _timeout: Duration,
    ) -> Result<i32, Box<dyn std::error::Error + Send + Sync>> {
        if self.fail.load(Ordering::Relaxed) {
            return Err(Box::new(HwError::Timeout));
        }
        self.reads.fetch_add(1, Ordering::Relaxed);
        Ok(self.raw.fetch_add(self.step, Ordering::Relaxed))
    }
}

/// Simulated motion sensor; edges are injected through [`MotionTrigger`].
pub struct SimulatedMotion {
    rx: xch::Receiver<()>,
}

/// Producer side of a [`SimulatedMotion`], playing the role of the edge interrupt.
#[derive(Clone)]
pub struct MotionTrigger {
    tx: xch::Sender<()>,
}

impl MotionTrigger {
    /// Queue one rising edge. Returns false when the interrupt queue is full.
    pub fn trigger(&self) -> bool {
        self.tx.try_send(()).is_ok()
    }
}

impl SimulatedMotion {
    pub fn new(capacity: usize) -> (Self, MotionTrigger) {
        let (tx, rx) = xch::bounded(capacity.max(1));
        (Self { rx }, MotionTrigger { tx })
    }
}

impl MotionSensor for SimulatedMotion {
    fn wait_for_motion(
        &mut self,
        timeout: Duration,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        match self.rx.recv_timeout(timeout) {
            Ok(()) => Ok(true),
            Err(xch::RecvTimeoutError::Timeout) => Ok(false),
            // Every trigger handle dropped: the sensor is simply quiet from now on.
            Err(xch::RecvTimeoutError::Disconnected) => {
                std::thread::sleep(timeout);
                Ok(false)
            }
        }
    }
}

#[derive(Debug, Default)]
struct LinkShared {
    published: Mutex<Vec<(String, Vec<u8>)>>,
    subscriptions: Mutex<Vec<String>>,
    connect_failures: AtomicU32,
    connects: AtomicU32,
    fail_publish: AtomicBool,
}

/// In-process broker stand-in.
///
/// Inbound messages are either preloaded (`with_inbox`) or injected at runtime
/// through a [`LinkHandle`]. Published payloads are recorded and, when `echo`
/// is on, printed to stdout one per line.
pub struct SimulatedLink {
    inbox: VecDeque<Vec<u8>>,
    rx: xch::Receiver<Vec<u8>>,
    shared: Arc<LinkShared>,
    echo: bool,
}

/// Observer/controller handle for a [`SimulatedLink`].
#[derive(Clone)]
pub struct LinkHandle {
    tx: xch::Sender<Vec<u8>>,
    shared: Arc<LinkShared>,
}

impl SimulatedLink {
    pub fn new() -> (Self, LinkHandle) {
        let (tx, rx) = xch::unbounded();
        let shared = Arc::new(LinkShared::default());
        (
            Self {
                inbox: VecDeque::new(),
                rx,
                shared: shared.clone(),
                echo: false,
            },
            LinkHandle { tx, shared },
        )
    }

    /// Messages delivered in order once subscribed.
    pub fn with_inbox(mut self, messages: impl IntoIterator<Item = Vec<u8>>) -> Self {
        self.inbox.extend(messages);
        self
    }

    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    fn topic(&self) -> String {
        self.shared
            .subscriptions
            .lock()
            .ok()
            .and_then(|s| s.first().cloned())
            .unwrap_or_default()
    }
}

impl LinkHandle {
    /// Deliver a payload as if the broker published it on the subscribed topic.
    pub fn inject(&self, payload: impl Into<Vec<u8>>) {
        let _ = self.tx.send(payload.into());
    }

    /// Fail the next `n` connect attempts.
    pub fn fail_connects(&self, n: u32) {
        self.shared.connect_failures.store(n, Ordering::Relaxed);
    }

    pub fn fail_publish(&self, fail: bool) {
        self.shared.fail_publish.store(fail, Ordering::Relaxed);
    }

    pub fn connects(&self) -> u32 {
        self.shared.connects.load(Ordering::Relaxed)
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.shared
            .subscriptions
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    /// Payloads published so far as UTF-8 strings.
    pub fn published(&self) -> Vec<String> {
        self.shared
            .published
            .lock()
            .map(|p| {
                p.iter()
                    .map(|(_, body)| String::from_utf8_lossy(body).into_owned())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn published_topics(&self) -> Vec<String> {
        self.shared
            .published
            .lock()
            .map(|p| p.iter().map(|(t, _)| t.clone()).collect())
            .unwrap_or_default()
    }
}

impl MqttLink for SimulatedLink {
    fn connect(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.shared.connects.fetch_add(1, Ordering::Relaxed);
        let pending = self.shared.connect_failures.load(Ordering::Relaxed);
        if pending > 0 {
            self.shared
                .connect_failures
                .store(pending - 1, Ordering::Relaxed);
            return Err(Box::new(HwError::Mqtt("connection refused (simulated)".into())));
        }
        Ok(())
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.shared
            .subscriptions
            .lock()
            .map_err(|_| HwError::Mqtt("subscription list poisoned".into()))?
            .push(topic.to_string());
        Ok(())
    }

    fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if self.shared.fail_publish.load(Ordering::Relaxed) {
            return Err(Box::new(HwError::Disconnected));
        }
        if self.echo {
            println!("{}", String::from_utf8_lossy(payload));
        }
        self.shared
            .published
            .lock()
            .map_err(|_| HwError::Mqtt("publish log poisoned".into()))?
            .push((topic.to_string(), payload.to_vec()));
        Ok(())
    }

    fn poll(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<InboundMessage>, Box<dyn std::error::Error + Send + Sync>> {
        let payload = match self.inbox.pop_front() {
            Some(p) => Some(p),
            None => match self.rx.recv_timeout(timeout) {
                Ok(p) => Some(p),
                Err(xch::RecvTimeoutError::Timeout) => None,
                Err(xch::RecvTimeoutError::Disconnected) => {
                    std::thread::sleep(timeout);
                    None
                }
            },
        };
        Ok(payload.map(|payload| InboundMessage {
            topic: self.topic(),
            payload,
        }))
    }
}
