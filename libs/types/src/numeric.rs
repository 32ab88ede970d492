//! Exact monetary arithmetic
//!
//! Prices are nonnegative integer counts of minor units (cents), giving total
//! ordering and exact arithmetic with no floating-point drift. rust_decimal
//! is used only at the boundary: parsing external decimal strings and
//! rounding them HALF-UP to two fractional digits before conversion.

use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::ValidationError;

/// Monetary value in integer cents
///
/// Serialized as a decimal string ("150.00") to prevent JSON number
/// precision loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Price(i64);

impl Price {
    /// Zero price
    pub const ZERO: Price = Price(0);

    /// Create a Price from a cent count
    ///
    /// # Panics
    /// Panics if the amount is negative
    pub fn from_cents(cents: i64) -> Self {
        assert!(cents >= 0, "Price must be nonnegative");
        Self(cents)
    }

    /// Try to create a Price from a cent count, returning None if negative
    pub fn try_from_cents(cents: i64) -> Option<Self> {
        (cents >= 0).then_some(Self(cents))
    }

    /// Create a Price from an external decimal, rounding HALF-UP to cents
    pub fn try_from_decimal(value: Decimal) -> Result<Self, ValidationError> {
        if value.is_sign_negative() {
            return Err(ValidationError::InvalidPrice(value.to_string()));
        }
        let rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        let cents = (rounded * Decimal::from(100))
            .to_i64()
            .ok_or_else(|| ValidationError::InvalidPrice(value.to_string()))?;
        Ok(Self(cents))
    }

    /// Parse from a decimal string ("150.00")
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        let decimal = Decimal::from_str(s)
            .map_err(|_| ValidationError::InvalidPrice(s.to_string()))?;
        Self::try_from_decimal(decimal)
    }

    /// Get the cent count
    pub fn as_cents(&self) -> i64 {
        self.0
    }

    /// Get the value as an exact two-place decimal
    pub fn as_decimal(&self) -> Decimal {
        Decimal::new(self.0, 2)
    }
}

// Custom serialization to preserve precision
impl Serialize for Price {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Price {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}
