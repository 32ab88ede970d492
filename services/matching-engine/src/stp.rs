//! Self-trade prevention
//!
//! Two tradables are a self-trade when their trader identities are equal.
//! Trader identity is a pluggable capability so the engine is not coupled
//! to any id scheme; the default extractor returns the tradable's user.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use types::tradable::Tradable;

/// Action taken when a self-trade is detected in the crossing loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StpMode {
    /// Let the trade through (escape hatch, not recommended)
    Allow,
    /// Cancel the incoming tradable and stop crossing
    CancelIncoming,
    /// Cancel the resting tradable and keep crossing
    CancelResting,
    /// Cancel both and stop crossing
    CancelBoth,
}

impl Default for StpMode {
    fn default() -> Self {
        StpMode::CancelResting
    }
}

impl StpMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StpMode::Allow => "ALLOW",
            StpMode::CancelIncoming => "CANCEL_INCOMING",
            StpMode::CancelResting => "CANCEL_RESTING",
            StpMode::CancelBoth => "CANCEL_BOTH",
        }
    }
}

impl fmt::Display for StpMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StpMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ALLOW" => Ok(StpMode::Allow),
            "CANCEL_INCOMING" => Ok(StpMode::CancelIncoming),
            "CANCEL_RESTING" => Ok(StpMode::CancelResting),
            "CANCEL_BOTH" => Ok(StpMode::CancelBoth),
            other => Err(format!("unknown STP mode: {}", other)),
        }
    }
}

/// Runtime-switchable STP mode shared across admission threads
#[derive(Debug)]
pub struct StpConfig {
    mode: RwLock<StpMode>,
}

impl StpConfig {
    pub fn new(mode: StpMode) -> Self {
        Self {
            mode: RwLock::new(mode),
        }
    }

    pub fn mode(&self) -> StpMode {
        *self.mode.read()
    }

    /// Switch the mode atomically; admissions in flight keep the mode they
    /// loaded at the top of their crossing loop iteration
    pub fn set_mode(&self, mode: StpMode) {
        *self.mode.write() = mode;
    }
}

impl Default for StpConfig {
    fn default() -> Self {
        Self::new(StpMode::default())
    }
}

/// Capability to extract trader identity from a tradable
pub trait TraderIdExtractor: Send + Sync {
    fn trader_id<'a>(&self, tradable: &'a Tradable) -> &'a str;
}

/// Default extractor: trader identity is the tradable's user
#[derive(Debug, Clone, Copy, Default)]
pub struct UserIdExtractor;

impl TraderIdExtractor for UserIdExtractor {
    fn trader_id<'a>(&self, tradable: &'a Tradable) -> &'a str {
        tradable.user.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::ids::{InstrumentId, UserId};
    use types::numeric::Price;
    use types::tradable::Side;

    #[test]
    fn test_default_mode_is_cancel_resting() {
        assert_eq!(StpMode::default(), StpMode::CancelResting);
        assert_eq!(StpConfig::default().mode(), StpMode::CancelResting);
    }

    #[test]
    fn test_mode_swaps_at_runtime() {
        let config = StpConfig::new(StpMode::Allow);
        assert_eq!(config.mode(), StpMode::Allow);

        config.set_mode(StpMode::CancelBoth);
        assert_eq!(config.mode(), StpMode::CancelBoth);

        config.set_mode(StpMode::CancelIncoming);
        assert_eq!(config.mode(), StpMode::CancelIncoming);
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("ALLOW".parse::<StpMode>().unwrap(), StpMode::Allow);
        assert_eq!(
            "CANCEL_RESTING".parse::<StpMode>().unwrap(),
            StpMode::CancelResting
        );
        assert!("BOGUS".parse::<StpMode>().is_err());
    }

    #[test]
    fn test_user_extractor() {
        let tradable = Tradable::limit_order(
            UserId::try_new("ALICE").unwrap(),
            InstrumentId::try_new("AAPL").unwrap(),
            Price::from_cents(100),
            1,
            Side::BUY,
            0,
        )
        .unwrap();
        assert_eq!(UserIdExtractor.trader_id(&tradable), "ALICE");
    }
}
