//! `RumqttLink` against a minimal MQTT 3.1.1 broker on loopback.
#![cfg(feature = "mqtt")]

use feeder_hardware::error::HwError;
use feeder_hardware::mqtt::{MqttSettings, RumqttLink, TlsFiles};
use feeder_traits::MqttLink;
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

const SUB_TOPIC: &str = "pet-feeder/from_aws";
const PUB_TOPIC: &str = "pet-feeder/to_aws";

const CONNECT: u8 = 1;
const PUBLISH: u8 = 3;
const SUBSCRIBE: u8 = 8;
const PINGREQ: u8 = 12;
const DISCONNECT: u8 = 14;

fn settings(port: u16) -> MqttSettings {
    MqttSettings {
        host: "127.0.0.1".to_string(),
        port,
        client_id: "feeder-test".to_string(),
        keep_alive: Duration::from_secs(5),
        command_timeout: Duration::from_secs(20),
        reconnect_backoff: Duration::from_millis(50),
        tls: None,
    }
}

fn read_packet(stream: &mut TcpStream) -> io::Result<(u8, Vec<u8>)> {
    let mut head = [0u8; 1];
    stream.read_exact(&mut head)?;
    let (mut len, mut mult) = (0usize, 1usize);
    loop {
        let mut b = [0u8; 1];
        stream.read_exact(&mut b)?;
        len += usize::from(b[0] & 0x7f) * mult;
        if b[0] & 0x80 == 0 {
            break;
        }
        mult *= 128;
    }
    let mut body = vec![0u8; len];
    stream.read_exact(&mut body)?;
    Ok((head[0] >> 4, body))
}

fn publish_packet(topic: &str, payload: &[u8]) -> Vec<u8> {
    let remaining = 2 + topic.len() + payload.len();
    assert!(remaining < 128);
    let mut p = vec![0x30, remaining as u8, 0, topic.len() as u8];
    p.extend_from_slice(topic.as_bytes());
    p.extend_from_slice(payload);
    p
}

#[derive(Debug, Default)]
struct SessionLog {
    subscribes: usize,
    published: Vec<(String, Vec<u8>)>,
}

/// Serve one client session. With `deliver` set, a message is pushed to the
/// client after its SUBSCRIBE and the session ends after the client's first
/// PUBLISH; otherwise the connection is dropped right after the SUBACK.
fn serve(mut stream: TcpStream, deliver: Option<&[u8]>) -> io::Result<SessionLog> {
    stream.set_read_timeout(Some(Duration::from_secs(5)))?;
    let mut log = SessionLog::default();
    loop {
        let (kind, body) = match read_packet(&mut stream) {
            Ok(p) => p,
            Err(_) => return Ok(log),
        };
        match kind {
            CONNECT => stream.write_all(&[0x20, 0x02, 0x00, 0x00])?,
            SUBSCRIBE => {
                log.subscribes += 1;
                stream.write_all(&[0x90, 0x03, body[0], body[1], 0x00])?;
                match deliver {
                    Some(payload) => stream.write_all(&publish_packet(SUB_TOPIC, payload))?,
                    None => {
                        let _ = stream.shutdown(Shutdown::Both);
                        return Ok(log);
                    }
                }
            }
            PUBLISH => {
                let n = (usize::from(body[0]) << 8) | usize::from(body[1]);
                let topic = String::from_utf8_lossy(&body[2..2 + n]).into_owned();
                log.published.push((topic, body[2 + n..].to_vec()));
                return Ok(log);
            }
            PINGREQ => stream.write_all(&[0xD0, 0x00])?,
            DISCONNECT => return Ok(log),
            _ => {}
        }
    }
}

fn connect_within(link: &mut RumqttLink, limit: Duration) {
    let deadline = Instant::now() + limit;
    while link.connect().is_err() {
        assert!(Instant::now() < deadline, "no ConnAck from test broker");
    }
}

#[test]
fn resubscribes_and_receives_after_reconnect() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let broker = thread::spawn(move || {
        let (first, _) = listener.accept().unwrap();
        let dropped = serve(first, None).unwrap();
        let (second, _) = listener.accept().unwrap();
        let resumed = serve(second, Some(br#"{"status":1}"#)).unwrap();
        (dropped, resumed)
    });

    let mut link = RumqttLink::new(&settings(port)).unwrap();
    connect_within(&mut link, Duration::from_secs(5));
    link.subscribe(SUB_TOPIC).unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    let msg = loop {
        if let Some(msg) = link.poll(Duration::from_millis(100)).unwrap() {
            break msg;
        }
        assert!(Instant::now() < deadline, "no command delivered after reconnect");
    };
    assert_eq!(msg.topic, SUB_TOPIC);
    assert_eq!(msg.payload, br#"{"status":1}"#);

    link.publish(PUB_TOPIC, br#"{"heartbeat":1}"#).unwrap();
    let (dropped, resumed) = broker.join().unwrap();
    assert_eq!(dropped.subscribes, 1);
    assert_eq!(resumed.subscribes, 1, "topic must be subscribed again");
    assert_eq!(
        resumed.published,
        vec![(PUB_TOPIC.to_string(), br#"{"heartbeat":1}"#.to_vec())]
    );
}

#[test]
fn connect_returns_promptly_when_broker_is_down() {
    let port = {
        let l = TcpListener::bind("127.0.0.1:0").unwrap();
        l.local_addr().unwrap().port()
    };
    let mut link = RumqttLink::new(&settings(port)).unwrap();
    let started = Instant::now();
    assert!(link.connect().is_err());
    assert!(
        started.elapsed() < Duration::from_secs(2),
        "connect blocked for {:?}",
        started.elapsed()
    );
}

#[test]
fn missing_tls_files_fail_construction() {
    let dir = std::env::temp_dir().join("petfeeder-no-such-certs");
    let mut s = settings(8883);
    s.tls = Some(TlsFiles {
        root_ca: dir.join("ca.pem"),
        certificate: dir.join("cert.pem"),
        private_key: dir.join("key.pem"),
    });
    assert!(matches!(RumqttLink::new(&s), Err(HwError::Io(_))));
}

#[test]
fn keep_alive_pings_flow_without_polling() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let broker = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        while let Ok((kind, _)) = read_packet(&mut stream) {
            match kind {
                CONNECT => stream.write_all(&[0x20, 0x02, 0x00, 0x00]).unwrap(),
                PINGREQ => {
                    stream.write_all(&[0xD0, 0x00]).unwrap();
                    return true;
                }
                _ => {}
            }
        }
        false
    });

    let mut s = settings(port);
    s.keep_alive = Duration::from_secs(1);
    let mut link = RumqttLink::new(&s).unwrap();
    connect_within(&mut link, Duration::from_secs(5));
    // No poll/publish calls: the link must still keep the session alive.
    assert!(broker.join().unwrap(), "no PINGREQ while the caller was idle");
}
