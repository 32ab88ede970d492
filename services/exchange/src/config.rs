//! Engine configuration
//!
//! Read from the environment (or built programmatically for tests):
//!
//! | Variable | Meaning | Default |
//! |---|---|---|
//! | `PRODUCTS` | comma-separated instrument list | empty |
//! | `STP_MODE` | self-trade prevention mode | `CANCEL_RESTING` |
//! | `LATENCY_THRESHOLD_E2E_NS` | end-to-end threshold | 1,000,000 |
//! | `LATENCY_THRESHOLD_MATCHING_NS` | matching threshold | 100,000 |
//! | `LATENCY_THRESHOLD_AUDIT_NS` | audit threshold | 500,000 |
//! | `AUDIT_SINKS` | comma-separated subset of `file`, `memory` | `file` |
//! | `AUDIT_DIR` | directory for the audit log file | `audit` |

use matching_engine::StpMode;
use std::path::PathBuf;
use std::str::FromStr;
use telemetry::LatencyThresholds;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    Invalid { key: String, message: String },
}

/// Kind of audit sink to register at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    /// JSON-lines file sink (primary)
    File,
    /// In-memory sink (advisory; useful for tests and inspection)
    Memory,
}

impl FromStr for SinkKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "file" => Ok(SinkKind::File),
            "memory" => Ok(SinkKind::Memory),
            other => Err(format!("unknown audit sink: {}", other)),
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Initial instrument list
    pub products: Vec<String>,
    pub stp_mode: StpMode,
    pub thresholds: LatencyThresholds,
    pub audit_sinks: Vec<SinkKind>,
    pub audit_dir: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            products: Vec::new(),
            stp_mode: StpMode::default(),
            thresholds: LatencyThresholds::default(),
            audit_sinks: vec![SinkKind::File],
            audit_dir: PathBuf::from("audit"),
        }
    }
}

impl EngineConfig {
    /// Load configuration from process environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup (tests)
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(products) = lookup("PRODUCTS") {
            config.products = products
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        if let Some(mode) = lookup("STP_MODE") {
            config.stp_mode = mode
                .parse()
                .map_err(|message| ConfigError::Invalid {
                    key: "STP_MODE".to_string(),
                    message,
                })?;
        }

        config.thresholds.e2e_ns =
            parse_or(&lookup, "LATENCY_THRESHOLD_E2E_NS", config.thresholds.e2e_ns)?;
        config.thresholds.matching_ns = parse_or(
            &lookup,
            "LATENCY_THRESHOLD_MATCHING_NS",
            config.thresholds.matching_ns,
        )?;
        config.thresholds.audit_ns =
            parse_or(&lookup, "LATENCY_THRESHOLD_AUDIT_NS", config.thresholds.audit_ns)?;

        if let Some(sinks) = lookup("AUDIT_SINKS") {
            config.audit_sinks = sinks
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(|s| {
                    s.parse().map_err(|message| ConfigError::Invalid {
                        key: "AUDIT_SINKS".to_string(),
                        message,
                    })
                })
                .collect::<Result<_, _>>()?;
        }

        if let Some(dir) = lookup("AUDIT_DIR") {
            config.audit_dir = PathBuf::from(dir);
        }

        Ok(config)
    }
}

fn parse_or(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: u64,
) -> Result<u64, ConfigError> {
    match lookup(key) {
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
            key: key.to_string(),
            message: format!("not a nanosecond count: {}", value),
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::from_lookup(|_| None).unwrap();
        assert!(config.products.is_empty());
        assert_eq!(config.stp_mode, StpMode::CancelResting);
        assert_eq!(config.thresholds.e2e_ns, 1_000_000);
        assert_eq!(config.audit_sinks, vec![SinkKind::File]);
        assert_eq!(config.audit_dir, PathBuf::from("audit"));
    }

    #[test]
    fn test_full_configuration() {
        let config = EngineConfig::from_lookup(lookup(&[
            ("PRODUCTS", "AAPL, MSFT,GOOG"),
            ("STP_MODE", "CANCEL_BOTH"),
            ("LATENCY_THRESHOLD_E2E_NS", "2000000"),
            ("LATENCY_THRESHOLD_MATCHING_NS", "50000"),
            ("AUDIT_SINKS", "file,memory"),
            ("AUDIT_DIR", "/var/log/exchange"),
        ]))
        .unwrap();

        assert_eq!(config.products, vec!["AAPL", "MSFT", "GOOG"]);
        assert_eq!(config.stp_mode, StpMode::CancelBoth);
        assert_eq!(config.thresholds.e2e_ns, 2_000_000);
        assert_eq!(config.thresholds.matching_ns, 50_000);
        assert_eq!(config.thresholds.audit_ns, 500_000);
        assert_eq!(config.audit_sinks, vec![SinkKind::File, SinkKind::Memory]);
        assert_eq!(config.audit_dir, PathBuf::from("/var/log/exchange"));
    }

    #[test]
    fn test_invalid_stp_mode() {
        let result = EngineConfig::from_lookup(lookup(&[("STP_MODE", "NOPE")]));
        assert!(matches!(result, Err(ConfigError::Invalid { key, .. }) if key == "STP_MODE"));
    }

    #[test]
    fn test_invalid_threshold() {
        let result =
            EngineConfig::from_lookup(lookup(&[("LATENCY_THRESHOLD_E2E_NS", "fast")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_sink() {
        let result = EngineConfig::from_lookup(lookup(&[("AUDIT_SINKS", "file,kafka")]));
        assert!(matches!(result, Err(ConfigError::Invalid { key, .. }) if key == "AUDIT_SINKS"));
    }
}
