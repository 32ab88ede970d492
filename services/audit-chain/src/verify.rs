//! Chain verification and replay reading
//!
//! Verification walks an append-ordered sequence, recomputes every hash and
//! checks every back-link against the *recomputed* predecessor hash, so a
//! single tampered event surfaces twice: once as its own hash mismatch and
//! once as the successor's broken link. Errors accumulate; verification
//! never short-circuits, to aid forensics.

use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use thiserror::Error;

use crate::chain::GENESIS_HASH;
use crate::event::AuditEvent;

/// Errors reading a persisted audit log
#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// What went wrong at one offset of the chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaultKind {
    /// Stored hash does not match the recomputed hash
    HashMismatch,
    /// Stored previous_hash does not match the predecessor's recomputed hash
    BrokenLink,
    /// Line could not be parsed as an audit event
    Parse,
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultKind::HashMismatch => f.write_str("hash mismatch"),
            FaultKind::BrokenLink => f.write_str("broken link"),
            FaultKind::Parse => f.write_str("parse failure"),
        }
    }
}

/// A single verification failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainFault {
    /// Zero-based offset of the event in the sequence
    pub offset: usize,
    /// Event id if the event parsed
    pub event_id: Option<String>,
    pub kind: FaultKind,
    pub expected: String,
    pub observed: String,
}

impl fmt::Display for ChainFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "event {}: {} (expected {}, observed {})",
            self.offset, self.kind, self.expected, self.observed
        )
    }
}

/// Outcome of walking a chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationReport {
    pub events_checked: usize,
    pub faults: Vec<ChainFault>,
}

impl VerificationReport {
    pub fn is_valid(&self) -> bool {
        self.faults.is_empty()
    }

    /// Offset of the first failing event, if any
    pub fn first_fault_offset(&self) -> Option<usize> {
        self.faults.first().map(|f| f.offset)
    }
}

/// Verify an append-ordered sequence of sealed events
pub fn verify_chain(events: &[AuditEvent]) -> VerificationReport {
    let mut faults = Vec::new();
    let mut expected_previous = GENESIS_HASH.to_string();

    for (offset, event) in events.iter().enumerate() {
        if event.previous_hash != expected_previous {
            faults.push(ChainFault {
                offset,
                event_id: Some(event.event_id.to_string()),
                kind: FaultKind::BrokenLink,
                expected: expected_previous.clone(),
                observed: event.previous_hash.clone(),
            });
        }

        let recomputed = event.compute_hash(&event.previous_hash);
        if recomputed != event.hash {
            faults.push(ChainFault {
                offset,
                event_id: Some(event.event_id.to_string()),
                kind: FaultKind::HashMismatch,
                expected: recomputed.clone(),
                observed: event.hash.clone(),
            });
        }

        // Carry the recomputed hash forward: a tampered event also breaks
        // its successor's link even when the stored hashes were re-chained.
        expected_previous = recomputed;
    }

    VerificationReport {
        events_checked: events.len(),
        faults,
    }
}

/// Load events back from a JSON-lines audit log
///
/// Blank lines are skipped; parse failures abort the read since offsets
/// past a corrupt line cannot be trusted.
pub fn read_events(path: impl AsRef<Path>) -> Result<Vec<AuditEvent>, VerifyError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut events = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let event: AuditEvent = serde_json::from_str(&line)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        events.push(event);
    }
    Ok(events)
}

/// Verify a persisted JSON-lines audit log
///
/// Unparseable lines are recorded as `Parse` faults and skipped, so the
/// report still covers the rest of the file.
pub fn verify_file(path: impl AsRef<Path>) -> Result<VerificationReport, VerifyError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let mut events = Vec::new();
    let mut parse_faults = Vec::new();
    let mut offset = 0usize;
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<AuditEvent>(&line) {
            Ok(event) => events.push(event),
            Err(err) => parse_faults.push(ChainFault {
                offset,
                event_id: None,
                kind: FaultKind::Parse,
                expected: "valid audit event JSON".to_string(),
                observed: err.to_string(),
            }),
        }
        offset += 1;
    }

    let mut report = verify_chain(&events);
    report.events_checked += parse_faults.len();
    report.faults.extend(parse_faults);
    report.faults.sort_by_key(|f| f.offset);
    Ok(report)
}
