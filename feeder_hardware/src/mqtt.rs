//! MQTT link over `rumqttc`'s synchronous client.
//!
//! An `mqtt-io` thread drives the rumqttc event loop for the life of the
//! link, so keep-alive pings keep flowing while the network task sleeps
//! between reports. rumqttc reconnects on the next poll after a connection
//! error. The session is clean, so the broker forgets subscriptions on every
//! reconnect; the io thread subscribes again to each known topic on ConnAck.
use crossbeam_channel as xch;
use feeder_traits::{InboundMessage, MqttLink};
use rumqttc::{
    Client, Connection, Event, MqttOptions, Outgoing, Packet, QoS, TlsConfiguration, Transport,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::{HwError, Result};

/// Longest a single `connect` call blocks, so callers can check for shutdown.
const CONNECT_SLICE: Duration = Duration::from_millis(250);
const INBOUND_CAPACITY: usize = 16;
const REQUEST_CAPACITY: usize = 10;

/// Paths to the PEM files used for mutual TLS.
#[derive(Debug, Clone)]
pub struct TlsFiles {
    pub root_ca: PathBuf,
    pub certificate: PathBuf,
    pub private_key: PathBuf,
}

#[derive(Debug, Clone)]
pub struct MqttSettings {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub keep_alive: Duration,
    /// Upper bound for one `connect` call; capped at 250 ms.
    pub command_timeout: Duration,
    /// Pause after a connection error before rumqttc dials again.
    pub reconnect_backoff: Duration,
    pub tls: Option<TlsFiles>,
}

#[derive(Default)]
struct Shared {
    topics: Mutex<Vec<String>>,
    connected: AtomicBool,
    last_error: Mutex<Option<String>>,
    stop: AtomicBool,
}

impl Shared {
    fn set_error(&self, e: Option<String>) {
        if let Ok(mut slot) = self.last_error.lock() {
            *slot = e;
        }
    }

    fn last_error(&self) -> Option<String> {
        self.last_error.lock().ok().and_then(|e| e.clone())
    }
}

pub struct RumqttLink {
    client: Client,
    shared: Arc<Shared>,
    inbound: xch::Receiver<InboundMessage>,
    connack: xch::Receiver<()>,
    connect_wait: Duration,
}

impl RumqttLink {
    pub fn new(settings: &MqttSettings) -> Result<Self> {
        let mut opts = MqttOptions::new(
            settings.client_id.clone(),
            settings.host.clone(),
            settings.port,
        );
        opts.set_keep_alive(settings.keep_alive);
        opts.set_clean_session(true);
        if let Some(tls) = &settings.tls {
            let ca = std::fs::read(&tls.root_ca)?;
            let cert = std::fs::read(&tls.certificate)?;
            let key = std::fs::read(&tls.private_key)?;
            opts.set_transport(Transport::tls_with_config(TlsConfiguration::Simple {
                ca,
                alpn: None,
                client_auth: Some((cert, key)),
            }));
        }
        let (client, connection) = Client::new(opts, REQUEST_CAPACITY);
        let shared = Arc::new(Shared::default());
        let (inbound_tx, inbound) = xch::bounded(INBOUND_CAPACITY);
        let (connack_tx, connack) = xch::bounded(1);
        let io = IoLoop {
            connection,
            client: client.clone(),
            shared: shared.clone(),
            inbound: inbound_tx,
            connack: connack_tx,
            backoff: settings.reconnect_backoff,
        };
        std::thread::Builder::new()
            .name("mqtt-io".to_string())
            .spawn(move || io.run())?;
        tracing::info!(host = %settings.host, port = settings.port, tls = settings.tls.is_some(), "mqtt client created");
        Ok(Self {
            client,
            shared,
            inbound,
            connack,
            connect_wait: settings.command_timeout.min(CONNECT_SLICE),
        })
    }

    fn failure(&self) -> HwError {
        self.shared
            .last_error()
            .map_or(HwError::Timeout, HwError::Mqtt)
    }
}

impl Drop for RumqttLink {
    fn drop(&mut self) {
        self.shared.stop.store(true, Ordering::Release);
        let _ = self.client.try_disconnect();
    }
}

impl MqttLink for RumqttLink {
    fn connect(&mut self) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if self.shared.connected.load(Ordering::Acquire) {
            return Ok(());
        }
        match self.connack.recv_timeout(self.connect_wait) {
            Ok(()) if self.shared.connected.load(Ordering::Acquire) => Ok(()),
            Ok(()) | Err(xch::RecvTimeoutError::Timeout) => Err(Box::new(self.failure())),
            Err(xch::RecvTimeoutError::Disconnected) => Err(Box::new(HwError::Disconnected)),
        }
    }

    fn subscribe(
        &mut self,
        topic: &str,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        {
            let mut topics = self
                .shared
                .topics
                .lock()
                .map_err(|_| HwError::Mqtt("topic list poisoned".into()))?;
            if !topics.iter().any(|t| t == topic) {
                topics.push(topic.to_string());
            }
        }
        self.client
            .subscribe(topic, QoS::AtMostOnce)
            .map_err(|e| HwError::Mqtt(e.to_string()))?;
        Ok(())
    }

    fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let Err(e) = self
            .client
            .try_publish(topic, QoS::AtMostOnce, false, payload.to_vec())
        else {
            return Ok(());
        };
        // The request queue only backs up while rumqttc is redialing.
        if self.shared.connected.load(Ordering::Acquire) {
            Err(Box::new(HwError::Mqtt(e.to_string())))
        } else {
            Err(Box::new(HwError::Timeout))
        }
    }

    fn poll(
        &mut self,
        timeout: Duration,
    ) -> std::result::Result<Option<InboundMessage>, Box<dyn std::error::Error + Send + Sync>>
    {
        match self.inbound.recv_timeout(timeout) {
            Ok(msg) => Ok(Some(msg)),
            Err(xch::RecvTimeoutError::Timeout) => Ok(None),
            Err(xch::RecvTimeoutError::Disconnected) => Err(Box::new(HwError::Disconnected)),
        }
    }
}

struct IoLoop {
    connection: Connection,
    client: Client,
    shared: Arc<Shared>,
    inbound: xch::Sender<InboundMessage>,
    connack: xch::Sender<()>,
    backoff: Duration,
}

impl IoLoop {
    fn run(mut self) {
        while !self.shared.stop.load(Ordering::Acquire) {
            match self.connection.recv() {
                Ok(Ok(Event::Incoming(Packet::ConnAck(ack)))) => {
                    tracing::debug!(code = ?ack.code, "connack");
                    self.on_connack();
                }
                Ok(Ok(Event::Incoming(Packet::Publish(p)))) => {
                    let msg = InboundMessage {
                        topic: p.topic,
                        payload: p.payload.to_vec(),
                    };
                    match self.inbound.try_send(msg) {
                        Ok(()) => {}
                        Err(xch::TrySendError::Full(_)) => {
                            tracing::warn!("mqtt inbound buffer full; message dropped");
                        }
                        Err(xch::TrySendError::Disconnected(_)) => break,
                    }
                }
                Ok(Ok(Event::Incoming(Packet::Disconnect))) => {
                    self.shared.connected.store(false, Ordering::Release);
                    tracing::warn!("MQTT disconnect from broker; reconnecting");
                }
                Ok(Ok(Event::Outgoing(Outgoing::Disconnect))) => break,
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    self.shared.connected.store(false, Ordering::Release);
                    if self.shared.stop.load(Ordering::Acquire) {
                        break;
                    }
                    tracing::warn!(error = %e, "MQTT connection error; reconnecting");
                    self.shared.set_error(Some(e.to_string()));
                    std::thread::sleep(self.backoff);
                }
                Err(_) => break,
            }
        }
        tracing::debug!("mqtt io thread exiting");
    }

    fn on_connack(&self) {
        self.shared.connected.store(true, Ordering::Release);
        self.shared.set_error(None);
        let topics = self
            .shared
            .topics
            .lock()
            .map(|t| t.clone())
            .unwrap_or_default();
        // `try_` because this thread is the one draining the request queue.
        for topic in topics {
            match self.client.try_subscribe(topic.as_str(), QoS::AtMostOnce) {
                Ok(()) => tracing::info!(%topic, "resubscribed after reconnect"),
                Err(e) => tracing::warn!(%topic, error = %e, "resubscribe failed"),
            }
        }
        let _ = self.connack.try_send(());
    }
}
