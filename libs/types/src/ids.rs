//! Unique identifier types for exchange entities
//!
//! Tradable ids use UUID v7 for time-sortable ordering, so equal-timestamp
//! ties in the crossing loop resolve deterministically by lexicographic
//! comparison. Instrument and user identifiers are validated strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::errors::ValidationError;

/// Unique identifier for a tradable (an order or one side of a quote)
///
/// Uses UUID v7 for time-based sorting. The id is opaque; trader identity
/// lives on the tradable's `user` field, never inside the id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TradableId(Uuid);

impl TradableId {
    /// Create a new TradableId with current timestamp
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Create from existing UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get inner UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TradableId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TradableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Instrument identifier
///
/// Format: 1-5 characters from `[a-zA-Z0-9.]` (e.g. "AAPL", "BRK.A")
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstrumentId(String);

impl InstrumentId {
    /// Try to create an InstrumentId, validating the symbol format
    pub fn try_new(symbol: impl Into<String>) -> Result<Self, ValidationError> {
        let s = symbol.into();
        if s.is_empty() || s.len() > 5 {
            return Err(ValidationError::InvalidInstrument(s));
        }
        if !s.chars().all(|c| c.is_ascii_alphanumeric() || c == '.') {
            return Err(ValidationError::InvalidInstrument(s));
        }
        Ok(Self(s))
    }

    /// Get the symbol string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// User identifier
///
/// Format: 3-20 characters from `[a-zA-Z0-9_]`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Try to create a UserId, validating the name format
    pub fn try_new(name: impl Into<String>) -> Result<Self, ValidationError> {
        let s = name.into();
        if s.len() < 3 || s.len() > 20 {
            return Err(ValidationError::InvalidUser(s));
        }
        if !s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(ValidationError::InvalidUser(s));
        }
        Ok(Self(s))
    }

    /// Get the name string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tradable_id_unique() {
        let id1 = TradableId::new();
        let id2 = TradableId::new();
        assert_ne!(id1, id2, "TradableIds should be unique");
    }

    #[test]
    fn test_tradable_id_serialization() {
        let id = TradableId::new();
        let json = serde_json::to_string(&id).unwrap();
        let deserialized: TradableId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, deserialized);
    }

    #[test]
    fn test_tradable_id_time_sortable() {
        let id1 = TradableId::new();
        let id2 = TradableId::new();
        assert!(id1.to_string() <= id2.to_string());
    }

    #[test]
    fn test_instrument_id_valid() {
        assert!(InstrumentId::try_new("AAPL").is_ok());
        assert!(InstrumentId::try_new("BRK.A").is_ok());
        assert!(InstrumentId::try_new("X").is_ok());
    }

    #[test]
    fn test_instrument_id_invalid() {
        assert!(InstrumentId::try_new("").is_err());
        assert!(InstrumentId::try_new("TOOLONG").is_err());
        assert!(InstrumentId::try_new("AA/PL").is_err());
    }

    #[test]
    fn test_user_id_valid() {
        assert!(UserId::try_new("ALICE").is_ok());
        assert!(UserId::try_new("mm_1").is_ok());
        assert!(UserId::try_new("abc").is_ok());
    }

    #[test]
    fn test_user_id_invalid() {
        assert!(UserId::try_new("ab").is_err());
        assert!(UserId::try_new("a".repeat(21)).is_err());
        assert!(UserId::try_new("bad name").is_err());
    }

    #[test]
    fn test_instrument_id_serialization() {
        let instrument = InstrumentId::try_new("MSFT").unwrap();
        let json = serde_json::to_string(&instrument).unwrap();
        assert_eq!(json, "\"MSFT\"");
    }
}
