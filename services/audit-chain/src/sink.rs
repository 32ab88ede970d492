//! Audit event sinks
//!
//! Sealed events fan out to every registered sink inside the chain's
//! critical section so sink order matches chain order. The file sink is the
//! source of truth: one JSON object per line, flushed per event. Advisory
//! sinks may fail without blocking the admission.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::event::AuditEvent;

/// Sink delivery errors
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// How a sink failure is treated
///
/// A `Primary` sink must succeed: its failure is fatal to the admission,
/// because the file log plus the hash chain is the source of truth. An
/// `Advisory` sink (e.g. a database mirror) is logged and skipped; it can
/// be rebuilt from the primary log later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SinkRole {
    Primary,
    Advisory,
}

/// Destination for sealed audit events
pub trait AuditSink: Send {
    /// Deliver one sealed event
    fn deliver(&mut self, event: &AuditEvent) -> Result<(), SinkError>;

    /// Sink name for diagnostics
    fn name(&self) -> &str;
}

/// JSON-lines file sink
///
/// Appends one serialized event per line and flushes after every write so
/// the log is complete up to the last acknowledged admission.
pub struct FileSink {
    writer: BufWriter<File>,
    path: PathBuf,
}

impl FileSink {
    /// Open (or create) the log file in append mode
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            path,
        })
    }

    /// Path of the underlying log file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditSink for FileSink {
    fn deliver(&mut self, event: &AuditEvent) -> Result<(), SinkError> {
        let line = serde_json::to_string(event)?;
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }

    fn name(&self) -> &str {
        "file"
    }
}

/// In-memory sink for tests and replay consumers
///
/// Clones share the same backing store, so a handle kept by the caller sees
/// every event delivered to the copy registered with the log.
#[derive(Clone, Default)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all delivered events in chain order
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().clone()
    }

    /// Number of delivered events
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditSink for MemorySink {
    fn deliver(&mut self, event: &AuditEvent) -> Result<(), SinkError> {
        self.events.lock().push(event.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::AuditEventType;
    use tempfile::TempDir;

    fn sample_event() -> AuditEvent {
        AuditEvent::builder(AuditEventType::SystemStart).build()
    }

    #[test]
    fn test_file_sink_writes_json_lines() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("audit.log");
        let mut sink = FileSink::open(&path).unwrap();

        sink.deliver(&sample_event()).unwrap();
        sink.deliver(&sample_event()).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        for line in lines {
            let parsed: AuditEvent = serde_json::from_str(line).unwrap();
            assert_eq!(parsed.event_type, AuditEventType::SystemStart);
        }
    }

    #[test]
    fn test_file_sink_appends_across_reopen() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("audit.log");

        {
            let mut sink = FileSink::open(&path).unwrap();
            sink.deliver(&sample_event()).unwrap();
        }
        {
            let mut sink = FileSink::open(&path).unwrap();
            sink.deliver(&sample_event()).unwrap();
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }

    #[test]
    fn test_file_sink_creates_parent_dirs() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested/dir/audit.log");
        let mut sink = FileSink::open(&path).unwrap();
        sink.deliver(&sample_event()).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_memory_sink_shares_store_across_clones() {
        let sink = MemorySink::new();
        let mut registered = sink.clone();

        registered.deliver(&sample_event()).unwrap();
        registered.deliver(&sample_event()).unwrap();

        assert_eq!(sink.len(), 2);
        assert_eq!(sink.events().len(), 2);
    }

    #[test]
    fn test_memory_sink_empty() {
        let sink = MemorySink::new();
        assert!(sink.is_empty());
    }
}
