//! Per-admission processing timeline
//!
//! Checkpoints, all monotonic-clock nanoseconds:
//! - T0 arrival at the admission coordinator
//! - T1 request deserialized
//! - T2 validation complete
//! - T3 book write lock acquired
//! - T4 matching begins
//! - T5 matching complete (all fills determined and applied)
//! - T6 post-match effects begin (linkage, top-of-book recompute, publish)
//! - T7 post-match effects done
//! - T8 final audit write for the admission begins
//! - T9 final audit write complete
//! - T10 response sent to the caller

use serde::{Deserialize, Serialize};
use std::fmt;

/// Latency thresholds in nanoseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatencyThresholds {
    pub e2e_ns: u64,
    pub matching_ns: u64,
    pub audit_ns: u64,
}

impl Default for LatencyThresholds {
    fn default() -> Self {
        Self {
            e2e_ns: 1_000_000,   // 1 ms
            matching_ns: 100_000, // 100 µs
            audit_ns: 500_000,   // 500 µs
        }
    }
}

/// A breached latency threshold
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatencyViolation {
    pub order_id: String,
    pub instrument: String,
    pub phase: &'static str,
    pub actual_ns: u64,
    pub threshold_ns: u64,
}

impl fmt::Display for LatencyViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} phase exceeded on {} ({}): {:.2} µs (threshold {:.2} µs)",
            self.phase,
            self.instrument,
            self.order_id,
            self.actual_ns as f64 / 1000.0,
            self.threshold_ns as f64 / 1000.0,
        )
    }
}

/// Timeline of one admission through the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionTimeline {
    pub order_id: String,
    pub instrument: String,
    pub t0_arrival: u64,
    pub t1_deserialized: u64,
    pub t2_validated: u64,
    pub t3_lock_acquired: u64,
    pub t4_matching_begins: u64,
    pub t5_matching_complete: u64,
    pub t6_execution_begins: u64,
    pub t7_execution_done: u64,
    pub t8_audit_begins: u64,
    pub t9_audit_complete: u64,
    pub t10_response_sent: u64,
}

impl AdmissionTimeline {
    /// Start a timeline at the given arrival instant
    pub fn start(order_id: impl Into<String>, instrument: impl Into<String>, arrival_ns: u64) -> Self {
        Self {
            order_id: order_id.into(),
            instrument: instrument.into(),
            t0_arrival: arrival_ns,
            t1_deserialized: arrival_ns,
            t2_validated: arrival_ns,
            t3_lock_acquired: arrival_ns,
            t4_matching_begins: arrival_ns,
            t5_matching_complete: arrival_ns,
            t6_execution_begins: arrival_ns,
            t7_execution_done: arrival_ns,
            t8_audit_begins: arrival_ns,
            t9_audit_complete: arrival_ns,
            t10_response_sent: arrival_ns,
        }
    }

    /// Stamp T10 and forward-fill checkpoints skipped by early exits
    ///
    /// A rejected admission never reaches the later phases; their
    /// checkpoints are pulled up to the preceding one (zero-length phase)
    /// so the completed timeline is always monotonic.
    pub fn finish(&mut self, response_ns: u64) {
        self.t10_response_sent = response_ns;
        let mut previous = self.t0_arrival;
        for checkpoint in [
            &mut self.t1_deserialized,
            &mut self.t2_validated,
            &mut self.t3_lock_acquired,
            &mut self.t4_matching_begins,
            &mut self.t5_matching_complete,
            &mut self.t6_execution_begins,
            &mut self.t7_execution_done,
            &mut self.t8_audit_begins,
            &mut self.t9_audit_complete,
            &mut self.t10_response_sent,
        ] {
            if *checkpoint < previous {
                *checkpoint = previous;
            }
            previous = *checkpoint;
        }
    }

    /// End-to-end latency (T10 - T0)
    pub fn end_to_end(&self) -> u64 {
        self.t10_response_sent.saturating_sub(self.t0_arrival)
    }

    /// Matching-phase latency (T5 - T4)
    pub fn matching_latency(&self) -> u64 {
        self.t5_matching_complete.saturating_sub(self.t4_matching_begins)
    }

    /// Audit-phase latency (T9 - T8)
    pub fn audit_latency(&self) -> u64 {
        self.t9_audit_complete.saturating_sub(self.t8_audit_begins)
    }

    /// Lock acquisition latency (T3 - T2)
    pub fn lock_wait(&self) -> u64 {
        self.t3_lock_acquired.saturating_sub(self.t2_validated)
    }

    /// All checkpoints in index order
    pub fn checkpoints(&self) -> [u64; 11] {
        [
            self.t0_arrival,
            self.t1_deserialized,
            self.t2_validated,
            self.t3_lock_acquired,
            self.t4_matching_begins,
            self.t5_matching_complete,
            self.t6_execution_begins,
            self.t7_execution_done,
            self.t8_audit_begins,
            self.t9_audit_complete,
            self.t10_response_sent,
        ]
    }

    /// Check that checkpoints never decrease in index order
    pub fn is_monotonic(&self) -> bool {
        self.checkpoints().windows(2).all(|w| w[0] <= w[1])
    }

    /// Named per-phase durations
    pub fn phase_breakdown(&self) -> Vec<(&'static str, u64)> {
        vec![
            ("deserialization", self.t1_deserialized.saturating_sub(self.t0_arrival)),
            ("validation", self.t2_validated.saturating_sub(self.t1_deserialized)),
            ("lock_acquisition", self.lock_wait()),
            ("matching", self.matching_latency()),
            ("execution", self.t7_execution_done.saturating_sub(self.t6_execution_begins)),
            ("audit", self.audit_latency()),
            ("response", self.t10_response_sent.saturating_sub(self.t9_audit_complete)),
        ]
    }

    /// First breached threshold, if any
    pub fn check_thresholds(&self, thresholds: &LatencyThresholds) -> Option<LatencyViolation> {
        let violation = |phase, actual_ns, threshold_ns| LatencyViolation {
            order_id: self.order_id.clone(),
            instrument: self.instrument.clone(),
            phase,
            actual_ns,
            threshold_ns,
        };

        if self.end_to_end() > thresholds.e2e_ns {
            return Some(violation("e2e", self.end_to_end(), thresholds.e2e_ns));
        }
        if self.matching_latency() > thresholds.matching_ns {
            return Some(violation("matching", self.matching_latency(), thresholds.matching_ns));
        }
        if self.audit_latency() > thresholds.audit_ns {
            return Some(violation("audit", self.audit_latency(), thresholds.audit_ns));
        }
        None
    }
}
