//! # Telemetry Module
//!
//! Persists decoded bus events as JSONL (JSON Lines) records.
//!
//! This is the default consumer on the bus boundary: it drains the event
//! channel and appends one timestamped JSON object per line to a log file
//! named after the startup time. A real middleware adapter would replace
//! this sink and republish the events instead.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::Serialize;
use tracing::{info, warn};

use crate::bus::{BusEvent, BusReceiver};
use crate::error::Result;

/// One JSONL record: a wall-clock timestamp wrapped around a bus event.
#[derive(Debug, Serialize)]
struct Record<'a> {
    timestamp: String,
    #[serde(flatten)]
    event: &'a BusEvent,
}

/// Append-only JSONL event log.
pub struct EventLog {
    writer: BufWriter<File>,
    path: PathBuf,
    records: u64,
}

impl std::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLog")
            .field("path", &self.path)
            .field("records", &self.records)
            .finish_non_exhaustive()
    }
}

impl EventLog {
    /// Create a log file in `dir`, named for the current local time.
    ///
    /// The directory is created if missing.
    pub fn create(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let stamp = Local::now().format("%Y-%m-%d-%H-%M-%S");
        let path = dir.join(format!("events-{}.jsonl", stamp));
        let file = File::create(&path)?;
        info!("logging bus events to {}", path.display());
        Ok(Self {
            writer: BufWriter::new(file),
            path,
            records: 0,
        })
    }

    /// Append one event, flushing so a crash loses at most the current line.
    pub fn append(&mut self, event: &BusEvent) -> Result<()> {
        let record = Record {
            timestamp: Local::now().to_rfc3339(),
            event,
        };
        let line = serde_json::to_string(&record)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        self.records += 1;
        Ok(())
    }

    /// Path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records written so far.
    pub fn records(&self) -> u64 {
        self.records
    }
}

/// Drain the bus into the log until every sender is gone.
///
/// With `log` absent the sink still drains the channel so handlers never
/// see a closed bus while the loop is alive.
pub async fn run_sink(mut rx: BusReceiver, mut log: Option<EventLog>) {
    while let Some(event) = rx.recv().await {
        if let Some(log) = log.as_mut() {
            if let Err(e) = log.append(&event) {
                warn!(error = %e, "failed to append telemetry record");
            }
        }
    }
    if let Some(log) = log {
        info!("telemetry sink closed after {} records", log.records());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{BusEvent, IdleEvent, SonarEvent};

    #[test]
    fn test_append_writes_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = EventLog::create(dir.path()).unwrap();

        log.append(&BusEvent::Idle(IdleEvent { count: 7 })).unwrap();
        log.append(&BusEvent::Sonar(SonarEvent {
            ranges: [1, 2, 3, 4, 5],
        }))
        .unwrap();
        assert_eq!(log.records(), 2);

        let contents = fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["event"], "idle");
        assert_eq!(first["count"], 7);
        assert!(first["timestamp"].is_string());

        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["event"], "sonar");
    }

    #[test]
    fn test_create_makes_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("logs/deep");
        let log = EventLog::create(&nested).unwrap();
        assert!(log.path().starts_with(&nested));
    }

    #[tokio::test]
    async fn test_sink_drains_until_senders_drop() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::create(dir.path()).unwrap();
        let path = log.path().to_path_buf();

        let (tx, rx) = crate::bus::channel();
        let sink = tokio::spawn(run_sink(rx, Some(log)));

        tx.send(BusEvent::Idle(IdleEvent { count: 1 })).unwrap();
        tx.send(BusEvent::Idle(IdleEvent { count: 2 })).unwrap();
        drop(tx);
        sink.await.unwrap();

        let contents = fs::read_to_string(path).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }
}
