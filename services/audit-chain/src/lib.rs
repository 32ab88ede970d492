//! Tamper-evident audit trail
//!
//! Every state transition in the engine is recorded as an immutable
//! [`AuditEvent`] chained to its predecessor by a SHA-256 digest: each
//! event's hash covers the previous event's hash plus the event's own
//! canonical JSON. Any edit to a persisted event breaks both its own hash
//! and the next event's back-link.
//!
//! The chain induces a total order over all audit events across every
//! instrument; external consumers (dashboards, replayers, backtesters)
//! observe that order.

pub mod chain;
pub mod event;
pub mod sink;
pub mod verify;

pub use chain::{AuditError, AuditLog, HashChain, GENESIS_HASH};
pub use event::{AuditEvent, AuditEventBuilder, AuditEventType, DataValue};
pub use sink::{AuditSink, FileSink, MemorySink, SinkError, SinkRole};
pub use verify::{read_events, verify_chain, verify_file, ChainFault, FaultKind, VerificationReport};
