//! Device and link assembly for the selected backend.
//!
//! Built with `hardware`, devices are Raspberry Pi GPIO; otherwise they are
//! simulated. The broker link is MQTT unless the run is offline.

use eyre::WrapErr;
use feeder_config::Config;
use feeder_core::feeder::{BoxedLine, BoxedLink, BoxedLoadCell, BoxedMotion, BoxedServo};
use feeder_hardware::SimulatedLink;
use std::path::Path;

/// Raw counts returned by the simulated load cell.
pub const SIM_RAW_ENV: &str = "PETFEEDER_SIM_RAW";

pub struct Devices {
    pub left: BoxedServo,
    pub right: BoxedServo,
    pub servo_enable: BoxedLine,
    pub load_cell: BoxedLoadCell,
    pub weight_enable: BoxedLine,
    pub motion: BoxedMotion,
    /// Held for the life of the process so the audio amplifier stays off.
    pub amp_enable: Option<BoxedLine>,
}

pub fn backend_name() -> &'static str {
    if cfg!(feature = "hardware") {
        "hardware"
    } else {
        "sim"
    }
}

#[cfg(not(feature = "hardware"))]
pub fn make_devices(cfg: &Config) -> eyre::Result<Devices> {
    use feeder_hardware::{SimulatedLine, SimulatedLoadCell, SimulatedMotion, SimulatedServo};

    let raw = match std::env::var(SIM_RAW_ENV) {
        Ok(v) => v
            .trim()
            .parse::<i32>()
            .wrap_err_with(|| format!("{SIM_RAW_ENV} must be an integer, got '{v}'"))?,
        Err(_) => 0,
    };
    // No trigger handle is kept: the simulated sensor stays quiet.
    let (motion, _trigger) = SimulatedMotion::new(cfg.queues.motion_capacity);
    Ok(Devices {
        left: Box::new(SimulatedServo::new()),
        right: Box::new(SimulatedServo::new()),
        servo_enable: Box::new(SimulatedLine::new()),
        load_cell: Box::new(SimulatedLoadCell::new(raw)),
        weight_enable: Box::new(SimulatedLine::new()),
        motion: Box::new(motion),
        amp_enable: None,
    })
}

#[cfg(feature = "hardware")]
pub fn make_devices(cfg: &Config) -> eyre::Result<Devices> {
    use feeder_hardware::rpi::{Hx711LoadCell, RpiLine, RpiMotion, RpiServo};
    use feeder_traits::OutputLine;

    let p = &cfg.pins;
    let (hz, bits) = (cfg.pwm.frequency_hz, cfg.pwm.resolution_bits);
    let left = RpiServo::new(p.servo_left, hz, bits)
        .wrap_err_with(|| format!("open left servo on GPIO {}", p.servo_left))?;
    let right = RpiServo::new(p.servo_right, hz, bits)
        .wrap_err_with(|| format!("open right servo on GPIO {}", p.servo_right))?;
    let servo_enable = RpiLine::new(p.servo_enable).wrap_err("open servo enable pin")?;
    let weight_enable = RpiLine::new(p.weight_enable).wrap_err("open weight enable pin")?;
    let load_cell = Hx711LoadCell::new(p.hx711_dt, p.hx711_sck).wrap_err("open hx711")?;
    let motion = RpiMotion::new(p.motion, cfg.queues.motion_capacity)
        .wrap_err_with(|| format!("open motion sensor on GPIO {}", p.motion))?;
    let amp_enable: Option<BoxedLine> = match p.amp_enable {
        Some(pin) => {
            let mut amp = RpiLine::new(pin).wrap_err("open amplifier enable pin")?;
            amp.set_low()
                .map_err(|e| eyre::eyre!("hold amplifier enable low: {e}"))?;
            Some(Box::new(amp))
        }
        None => None,
    };
    tracing::info!(
        servo_left = p.servo_left,
        servo_right = p.servo_right,
        motion = p.motion,
        hx711_dt = p.hx711_dt,
        hx711_sck = p.hx711_sck,
        "hardware devices ready"
    );
    Ok(Devices {
        left: Box::new(left),
        right: Box::new(right),
        servo_enable: Box::new(servo_enable),
        load_cell: Box::new(load_cell),
        weight_enable: Box::new(weight_enable),
        motion: Box::new(motion),
        amp_enable,
    })
}

/// Servo used by the sweep demo.
pub fn make_demo_servo(cfg: &Config) -> eyre::Result<BoxedServo> {
    #[cfg(feature = "hardware")]
    {
        let pin = cfg.pins.demo_servo.unwrap_or(cfg.pins.servo_left);
        let servo = feeder_hardware::rpi::RpiServo::new(
            pin,
            cfg.pwm.frequency_hz,
            cfg.pwm.resolution_bits,
        )
        .wrap_err_with(|| format!("open demo servo on GPIO {pin}"))?;
        Ok(Box::new(servo))
    }
    #[cfg(not(feature = "hardware"))]
    {
        let _ = cfg;
        Ok(Box::new(feeder_hardware::SimulatedServo::new()))
    }
}

/// In-process broker that echoes published messages to stdout.
pub fn offline_link(inbox: Option<&Path>) -> eyre::Result<BoxedLink> {
    let messages = match inbox {
        Some(path) => read_inbox(path)?,
        None => Vec::new(),
    };
    tracing::info!(messages = messages.len(), "using offline link");
    let (link, _remote) = SimulatedLink::new();
    Ok(Box::new(link.with_inbox(messages).with_echo(true)))
}

/// One message per non-empty line; lines starting with `#` are skipped.
fn read_inbox(path: &Path) -> eyre::Result<Vec<Vec<u8>>> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("read inbox {}", path.display()))?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(|l| l.as_bytes().to_vec())
        .collect())
}

#[cfg(feature = "mqtt")]
pub fn mqtt_link(cfg: &Config, client_id: &str) -> eyre::Result<BoxedLink> {
    use feeder_hardware::mqtt::{MqttSettings, RumqttLink, TlsFiles};
    use std::time::Duration;

    let m = &cfg.mqtt;
    let tls = match (&m.root_ca, &m.certificate, &m.private_key) {
        (Some(ca), Some(cert), Some(key)) => Some(TlsFiles {
            root_ca: ca.into(),
            certificate: cert.into(),
            private_key: key.into(),
        }),
        _ => None,
    };
    let settings = MqttSettings {
        host: m.host.clone(),
        port: m.port,
        client_id: client_id.to_string(),
        keep_alive: Duration::from_secs(m.keep_alive_s),
        command_timeout: Duration::from_millis(m.command_timeout_ms),
        reconnect_backoff: Duration::from_millis(m.connect_retry_ms),
        tls,
    };
    let link = RumqttLink::new(&settings)
        .wrap_err_with(|| format!("set up MQTT client for {}:{}", m.host, m.port))?;
    Ok(Box::new(link))
}

#[cfg(not(feature = "mqtt"))]
pub fn mqtt_link(_cfg: &Config, _client_id: &str) -> eyre::Result<BoxedLink> {
    eyre::bail!("this build has no MQTT support; use `run --offline` or `run --inbox FILE`")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn inbox_skips_blank_and_comment_lines() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "# greeting").unwrap();
        writeln!(f, r#"{{"status":1}}"#).unwrap();
        writeln!(f).unwrap();
        writeln!(f, r#"  {{"request":["weight"]}}  "#).unwrap();
        let msgs = read_inbox(f.path()).unwrap();
        assert_eq!(
            msgs,
            vec![
                br#"{"status":1}"#.to_vec(),
                br#"{"request":["weight"]}"#.to_vec()
            ]
        );
    }
}
