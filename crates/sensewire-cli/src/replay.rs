//! Capture replay
//!
//! Streams a capture file into the registry through a bounded channel. One
//! consumer drains the channel, so each buffer is decoded, committed and
//! dispatched before the next one is looked at.
//!
//! Capture format, one packet per line:
//!
//! ```text
//! # comment
//! stroke 01000000 02000000 4040c0c0...
//! 4798e0f2-300b-4d68-af64-8a8f5258404e 03
//! ```
//!
//! The first token is a sensor name or characteristic UUID; the rest of the
//! line is the packet in hex (whitespace and `:` separators are ignored).

use anyhow::{Context, Result};
use bytes::Bytes;
use colored::Colorize;
use parking_lot::Mutex;
use sensewire_core::gesture::{self, PredictionTracker, Stroke, StrokeState};
use sensewire_core::{SensorRegistry, SensorState, Value};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::Config;

/// Where a captured packet is delivered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Sensor(String),
    Uuid(Uuid),
}

/// One captured packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureEntry {
    pub line: usize,
    pub target: Target,
    pub payload: Bytes,
}

/// Outcome of a replay run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub delivered: u64,
    pub rejected: u64,
    pub malformed: u64,
}

/// Parse one capture line. Blank lines and comments yield `None`.
pub fn parse_capture_line(line_no: usize, line: &str) -> Result<Option<CaptureEntry>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let (target, rest) = line
        .split_once(char::is_whitespace)
        .unwrap_or((line, ""));
    let hex_digits: String = rest
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .collect();
    let payload = hex::decode(&hex_digits)
        .with_context(|| format!("line {}: invalid hex payload", line_no))?;

    let target = match Uuid::parse_str(target) {
        Ok(uuid) => Target::Uuid(uuid),
        Err(_) => Target::Sensor(target.to_string()),
    };

    Ok(Some(CaptureEntry {
        line: line_no,
        target,
        payload: Bytes::from(payload),
    }))
}

/// Deliver one entry to the registry
pub fn deliver(registry: &SensorRegistry, entry: &CaptureEntry) -> sensewire_core::Result<()> {
    match &entry.target {
        Target::Sensor(id) => registry.on_raw_buffer(id, &entry.payload).map(|_| ()),
        Target::Uuid(uuid) => registry.on_uuid_buffer(uuid, &entry.payload).map(|_| ()),
    }
}

/// Replay a capture file into `registry`.
///
/// `interval` spaces deliveries out to mimic the peripheral's poll cadence.
pub async fn run_replay(
    registry: Arc<SensorRegistry>,
    path: &Path,
    interval: Duration,
    shutdown_rx: &mut mpsc::Receiver<()>,
) -> Result<ReplaySummary> {
    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("Failed to open capture {}", path.display()))?;

    let (tx, mut rx) = mpsc::channel::<Result<CaptureEntry>>(64);

    let reader = tokio::spawn(async move {
        let mut lines = BufReader::new(file).lines();
        let mut line_no = 0usize;
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    let _ = tx.send(Err(e.into())).await;
                    break;
                }
            };
            line_no += 1;
            match parse_capture_line(line_no, &line) {
                Ok(Some(entry)) => {
                    if tx.send(Ok(entry)).await.is_err() {
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    if tx.send(Err(e)).await.is_err() {
                        break;
                    }
                }
            }
        }
        debug!("Capture reader finished after {} lines", line_no);
    });

    let mut summary = ReplaySummary::default();
    loop {
        tokio::select! {
            entry = rx.recv() => {
                let Some(entry) = entry else { break };
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        warn!("Skipping capture line: {:#}", e);
                        summary.malformed += 1;
                        continue;
                    }
                };
                match deliver(&registry, &entry) {
                    Ok(()) => summary.delivered += 1,
                    Err(e) => {
                        warn!("line {}: {}", entry.line, e);
                        summary.rejected += 1;
                    }
                }
                if !interval.is_zero() {
                    tokio::time::sleep(interval).await;
                }
            }
            Some(()) = shutdown_rx.recv() => {
                println!("{}", "Replay interrupted".yellow());
                break;
            }
        }
    }

    reader.abort();
    Ok(summary)
}

/// Build a registry from `config` with console handlers attached
pub fn build_registry(config: &Config) -> Result<SensorRegistry> {
    let mut registry = SensorRegistry::with_capacity(config.max_records);
    for schema in config.schemas()? {
        let id = schema.id().to_string();
        let result = match id.as_str() {
            gesture::STROKE_SENSOR => registry.register_schema(schema, stroke_printer()),
            gesture::PREDICTION_SENSOR => registry.register_schema(schema, prediction_printer()),
            _ => registry.register_schema(schema, record_printer),
        };
        result.with_context(|| format!("Failed to register {}", id))?;
    }
    Ok(registry)
}

fn stroke_printer() -> impl Fn(&SensorState) + Send + Sync {
    let last: Mutex<Option<(StrokeState, usize)>> = Mutex::new(None);
    move |state: &SensorState| {
        let stroke = match Stroke::from_state(state) {
            Ok(stroke) => stroke,
            Err(e) => {
                warn!("Unreadable stroke: {}", e);
                return;
            }
        };
        let key = (stroke.state, stroke.points.len());
        let mut last = last.lock();
        if *last == Some(key) {
            return;
        }
        *last = Some(key);
        println!(
            "{} {:<20} {} points",
            "stroke".cyan().bold(),
            stroke.state.label(),
            stroke.points.len()
        );
    }
}

fn prediction_printer() -> impl Fn(&SensorState) + Send + Sync {
    let tracker = Mutex::new(PredictionTracker::new());
    move |state: &SensorState| match tracker.lock().observe_state(state) {
        Ok(Some(change)) => {
            let label = change.class.map(|c| c.label()).unwrap_or("none");
            println!(
                "{} index {} -> {}",
                "prediction".cyan().bold(),
                change.index,
                label.green()
            );
        }
        Ok(None) => {}
        Err(e) => warn!("Unreadable prediction: {}", e),
    }
}

fn record_printer(state: &SensorState) {
    match state.snapshot() {
        Ok(fields) => {
            let rendered: Vec<String> = fields
                .iter()
                .map(|f| format!("{}={}", f.name, describe(&f.value)))
                .collect();
            println!("{} {}", state.id().to_string().cyan().bold(), rendered.join(" "));
        }
        Err(e) => warn!("Unreadable record for {}: {}", state.id(), e),
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Points(points) => format!("[{} points]", points.len()),
        other => other
            .as_f64()
            .map(|v| v.to_string())
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_lines() {
        assert_eq!(parse_capture_line(1, "   ").unwrap(), None);
        assert_eq!(parse_capture_line(2, "# header").unwrap(), None);

        let entry = parse_capture_line(3, "prediction 03").unwrap().unwrap();
        assert_eq!(entry.target, Target::Sensor("prediction".into()));
        assert_eq!(&entry.payload[..], &[3]);

        let entry = parse_capture_line(4, "4798e0f2-300b-4d68-af64-8a8f5258404e 0a:0b 0c")
            .unwrap()
            .unwrap();
        assert_eq!(entry.target, Target::Uuid(gesture::PREDICTION_UUID));
        assert_eq!(&entry.payload[..], &[0x0a, 0x0b, 0x0c]);

        assert!(parse_capture_line(5, "stroke 0g").is_err());
        assert!(parse_capture_line(6, "stroke 012").is_err());
    }

    #[test]
    fn test_deliver_reports_errors() {
        let registry = build_registry(&Config::gesture_profile()).unwrap();
        let ok = parse_capture_line(1, "prediction 02").unwrap().unwrap();
        let short = parse_capture_line(2, "stroke 0100").unwrap().unwrap();
        let unknown = parse_capture_line(3, "gyro 00").unwrap().unwrap();

        assert!(deliver(&registry, &ok).is_ok());
        assert!(deliver(&registry, &short).is_err());
        assert!(deliver(&registry, &unknown).is_err());
        assert_eq!(
            registry.latest(gesture::PREDICTION_SENSOR, "index").unwrap(),
            Value::UInt8(2)
        );
    }

    #[tokio::test]
    async fn test_replay_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let stroke_hex = {
            let mut packet = vec![1u8, 0, 0, 0, 2, 0, 0, 0, 0x40, 0x40, 0xc0, 0xc0];
            packet.resize(8 + 2 * gesture::STROKE_POINT_COUNT, 0);
            hex::encode(packet)
        };
        writeln!(file, "# gesture capture").unwrap();
        writeln!(file, "stroke {}", stroke_hex).unwrap();
        writeln!(file, "prediction 03").unwrap();
        writeln!(file, "prediction zz").unwrap();
        writeln!(file, "stroke 0100").unwrap();
        file.flush().unwrap();

        let registry = Arc::new(build_registry(&Config::gesture_profile()).unwrap());
        let (_shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let summary = run_replay(
            Arc::clone(&registry),
            file.path(),
            Duration::ZERO,
            &mut shutdown_rx,
        )
        .await
        .unwrap();

        assert_eq!(
            summary,
            ReplaySummary {
                delivered: 2,
                rejected: 1,
                malformed: 1,
            }
        );
        let stroke = Stroke::from_registry(&registry).unwrap();
        assert_eq!(stroke.points.len(), 2);
        assert_eq!(registry.stats().packets_decoded, 2);
    }
}
