//! Latency instrumentation for the admission path
//!
//! Every admission carries an [`AdmissionTimeline`] with eleven fixed
//! checkpoints (T0..T10) stamped on the monotonic clock. Completed
//! timelines feed the [`LatencyMonitor`], which keeps a bounded reservoir
//! of recent end-to-end samples, computes percentiles, and retains
//! threshold violations in a bounded log.

pub mod clock;
pub mod monitor;
pub mod timeline;

pub use clock::MonotonicClock;
pub use monitor::{LatencyMonitor, LatencyStats};
pub use timeline::{AdmissionTimeline, LatencyThresholds, LatencyViolation};
