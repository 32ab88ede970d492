//! Hash chain and the audit log facade
//!
//! The chain holds a single running `previous_hash`. Appending seals the
//! event (back-link, canonical JSON, SHA-256) and advances the chain, then
//! delivers the frozen event to every sink. The whole append is serialized
//! on one mutex, independent of any book lock; a thread holding a book lock
//! may append, never the reverse.

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, warn};

use crate::event::AuditEvent;
use crate::sink::{AuditSink, SinkError, SinkRole};

/// `previous_hash` of the first event in a chain
pub const GENESIS_HASH: &str = "0";

/// Audit failures surfaced to the admission path
#[derive(Error, Debug)]
pub enum AuditError {
    #[error("primary audit sink '{sink}' failed: {source}")]
    PrimarySinkFailure {
        sink: String,
        #[source]
        source: SinkError,
    },
}

/// Running digest across all audit events
#[derive(Debug)]
pub struct HashChain {
    previous_hash: String,
}

impl HashChain {
    pub fn new() -> Self {
        Self {
            previous_hash: GENESIS_HASH.to_string(),
        }
    }

    /// Seal an event onto the chain
    ///
    /// Sets the event's `previous_hash`, computes its hash over
    /// `previous_hash || canonical_json`, and advances the chain head.
    pub fn append(&mut self, event: &mut AuditEvent) {
        event.previous_hash = self.previous_hash.clone();
        event.hash = event.compute_hash(&self.previous_hash);
        self.previous_hash = event.hash.clone();
    }

    /// Hash of the most recently sealed event (`"0"` if none)
    pub fn current_hash(&self) -> &str {
        &self.previous_hash
    }
}

impl Default for HashChain {
    fn default() -> Self {
        Self::new()
    }
}

struct RegisteredSink {
    sink: Box<dyn AuditSink>,
    role: SinkRole,
}

/// Chain plus sink fan-out, the engine's single audit entry point
///
/// One `AuditLog` serves every instrument, so the chain induces a total
/// order over all audit events in the process.
pub struct AuditLog {
    inner: Mutex<AuditLogInner>,
}

struct AuditLogInner {
    chain: HashChain,
    sinks: Vec<RegisteredSink>,
}

impl AuditLog {
    /// Create a log with no sinks (events are sealed but not persisted)
    pub fn new() -> Self {
        Self::with_sinks(Vec::new())
    }

    /// Create a log with an initial set of sinks
    pub fn with_sinks(sinks: Vec<(Box<dyn AuditSink>, SinkRole)>) -> Self {
        Self {
            inner: Mutex::new(AuditLogInner {
                chain: HashChain::new(),
                sinks: sinks
                    .into_iter()
                    .map(|(sink, role)| RegisteredSink { sink, role })
                    .collect(),
            }),
        }
    }

    /// Register an additional sink
    pub fn register_sink(&self, sink: Box<dyn AuditSink>, role: SinkRole) {
        self.inner.lock().sinks.push(RegisteredSink { sink, role });
    }

    /// Seal and deliver one event
    ///
    /// Returns the sealed event. A primary sink failure aborts the append
    /// with an error the caller must treat as fatal; advisory sink failures
    /// are logged and swallowed.
    pub fn append(&self, mut event: AuditEvent) -> Result<AuditEvent, AuditError> {
        let mut inner = self.inner.lock();
        inner.chain.append(&mut event);

        for registered in inner.sinks.iter_mut() {
            if let Err(err) = registered.sink.deliver(&event) {
                match registered.role {
                    SinkRole::Primary => {
                        return Err(AuditError::PrimarySinkFailure {
                            sink: registered.sink.name().to_string(),
                            source: err,
                        });
                    }
                    SinkRole::Advisory => {
                        warn!(
                            sink = registered.sink.name(),
                            error = %err,
                            "advisory audit sink failed; continuing"
                        );
                    }
                }
            }
        }

        debug!(
            event_type = %event.event_type,
            event_id = %event.event_id,
            "audit event sealed"
        );
        Ok(event)
    }

    /// Hash of the most recently sealed event (`"0"` if none)
    pub fn current_hash(&self) -> String {
        self.inner.lock().chain.current_hash().to_string()
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}
