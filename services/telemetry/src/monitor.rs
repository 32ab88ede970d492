//! Latency aggregation across admissions

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt::Write as _;
use tracing::warn;

use crate::timeline::{AdmissionTimeline, LatencyThresholds, LatencyViolation};

const DEFAULT_RESERVOIR: usize = 10_000;
const MAX_VIOLATIONS: usize = 1_000;

/// Summary statistics over the reservoir, in nanoseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LatencyStats {
    pub min: u64,
    pub mean: u64,
    pub max: u64,
    pub p50: u64,
    pub p95: u64,
    pub p99: u64,
    pub p99_9: u64,
}

struct MonitorInner {
    samples: VecDeque<u64>,
    violations: VecDeque<LatencyViolation>,
    total_recorded: u64,
}

/// Receives completed timelines and aggregates end-to-end latency
///
/// Keeps the most recent N samples (default 10,000) and a bounded log of
/// threshold violations.
pub struct LatencyMonitor {
    inner: Mutex<MonitorInner>,
    capacity: usize,
    thresholds: LatencyThresholds,
}

impl LatencyMonitor {
    pub fn new(thresholds: LatencyThresholds) -> Self {
        Self::with_capacity(thresholds, DEFAULT_RESERVOIR)
    }

    pub fn with_capacity(thresholds: LatencyThresholds, capacity: usize) -> Self {
        Self {
            inner: Mutex::new(MonitorInner {
                samples: VecDeque::with_capacity(capacity.min(DEFAULT_RESERVOIR)),
                violations: VecDeque::new(),
                total_recorded: 0,
            }),
            capacity,
            thresholds,
        }
    }

    /// Record a completed timeline
    pub fn record(&self, timeline: &AdmissionTimeline) {
        let violation = timeline.check_thresholds(&self.thresholds);

        let mut inner = self.inner.lock();
        if inner.samples.len() >= self.capacity {
            inner.samples.pop_front();
        }
        inner.samples.push_back(timeline.end_to_end());
        inner.total_recorded += 1;

        if let Some(violation) = violation {
            warn!(%violation, "latency threshold breached");
            if inner.violations.len() >= MAX_VIOLATIONS {
                inner.violations.pop_front();
            }
            inner.violations.push_back(violation);
        }
    }

    /// Statistics over the current reservoir (zeros when empty)
    pub fn stats(&self) -> LatencyStats {
        let inner = self.inner.lock();
        if inner.samples.is_empty() {
            return LatencyStats::default();
        }

        let mut sorted: Vec<u64> = inner.samples.iter().copied().collect();
        sorted.sort_unstable();

        let sum: u64 = sorted.iter().sum();
        LatencyStats {
            min: sorted[0],
            mean: sum / sorted.len() as u64,
            max: sorted[sorted.len() - 1],
            p50: percentile(&sorted, 50.0),
            p95: percentile(&sorted, 95.0),
            p99: percentile(&sorted, 99.0),
            p99_9: percentile(&sorted, 99.9),
        }
    }

    /// Violations retained in the bounded log, oldest first
    pub fn violations(&self) -> Vec<LatencyViolation> {
        self.inner.lock().violations.iter().cloned().collect()
    }

    /// Total timelines recorded since creation
    pub fn total_recorded(&self) -> u64 {
        self.inner.lock().total_recorded
    }

    /// Configured thresholds
    pub fn thresholds(&self) -> &LatencyThresholds {
        &self.thresholds
    }

    /// Human-readable report of current statistics
    pub fn report(&self) -> String {
        let stats = self.stats();
        let (violations, total) = {
            let inner = self.inner.lock();
            (inner.violations.len(), inner.total_recorded)
        };

        let mut out = String::new();
        let _ = writeln!(out, "========== LATENCY REPORT ==========");
        let _ = writeln!(out, "orders processed: {}", total);
        let _ = writeln!(out, "latency percentiles (ns):");
        let _ = writeln!(out, "  min:   {:>12}", stats.min);
        let _ = writeln!(out, "  p50:   {:>12}", stats.p50);
        let _ = writeln!(out, "  p95:   {:>12}", stats.p95);
        let _ = writeln!(out, "  p99:   {:>12}", stats.p99);
        let _ = writeln!(out, "  p99.9: {:>12}", stats.p99_9);
        let _ = writeln!(out, "  max:   {:>12}", stats.max);
        let _ = writeln!(out, "violations retained: {}", violations);
        out
    }
}

/// Percentile from a sorted slice: ceil(p/100 * n) - 1, clamped
fn percentile(sorted: &[u64], p: f64) -> u64 {
    let index = ((p / 100.0) * sorted.len() as f64).ceil() as usize;
    sorted[index.saturating_sub(1).min(sorted.len() - 1)]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timeline_with_e2e(e2e_ns: u64) -> AdmissionTimeline {
        let mut t = AdmissionTimeline::start("order", "AAPL", 0);
        t.t10_response_sent = e2e_ns;
        t
    }

    #[test]
    fn test_empty_stats_are_zero() {
        let monitor = LatencyMonitor::new(LatencyThresholds::default());
        assert_eq!(monitor.stats(), LatencyStats::default());
    }

    #[test]
    fn test_percentiles_over_uniform_samples() {
        let monitor = LatencyMonitor::new(LatencyThresholds::default());
        for i in 1..=100u64 {
            monitor.record(&timeline_with_e2e(i * 1_000));
        }

        let stats = monitor.stats();
        assert_eq!(stats.min, 1_000);
        assert_eq!(stats.max, 100_000);
        assert_eq!(stats.p50, 50_000);
        assert_eq!(stats.p95, 95_000);
        assert_eq!(stats.p99, 99_000);
        assert_eq!(stats.mean, 50_500);
    }

    #[test]
    fn test_reservoir_keeps_most_recent() {
        let monitor = LatencyMonitor::with_capacity(LatencyThresholds::default(), 3);
        for e2e in [10, 20, 30, 40u64] {
            monitor.record(&timeline_with_e2e(e2e));
        }

        let stats = monitor.stats();
        assert_eq!(stats.min, 20);
        assert_eq!(stats.max, 40);
        assert_eq!(monitor.total_recorded(), 4);
    }

    #[test]
    fn test_violation_recorded() {
        let monitor = LatencyMonitor::new(LatencyThresholds {
            e2e_ns: 100,
            matching_ns: u64::MAX,
            audit_ns: u64::MAX,
        });

        monitor.record(&timeline_with_e2e(50));
        assert!(monitor.violations().is_empty());

        monitor.record(&timeline_with_e2e(500));
        let violations = monitor.violations();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].phase, "e2e");
    }

    #[test]
    fn test_violation_log_bounded() {
        let monitor = LatencyMonitor::new(LatencyThresholds {
            e2e_ns: 0,
            matching_ns: u64::MAX,
            audit_ns: u64::MAX,
        });

        for i in 0..(MAX_VIOLATIONS + 10) {
            monitor.record(&timeline_with_e2e(1 + i as u64));
        }
        assert_eq!(monitor.violations().len(), MAX_VIOLATIONS);
    }

    #[test]
    fn test_report_renders() {
        let monitor = LatencyMonitor::new(LatencyThresholds::default());
        monitor.record(&timeline_with_e2e(1_000));
        let report = monitor.report();
        assert!(report.contains("orders processed: 1"));
        assert!(report.contains("p99"));
    }
}
