//! Audit event structure and canonical serialization
//!
//! The canonical JSON an event hashes over is a hard contract: the set of
//! hashed fields and their lexicographic key order must never change, or
//! historical logs stop verifying. serde_json's map type keeps keys sorted,
//! which gives the lexicographic ordering for free.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Fixed set of audit event types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEventType {
    OrderPlaced,
    OrderCancelled,
    OrderFilled,
    OrderPartiallyFilled,
    OrderRejected,
    QuoteSubmitted,
    TradeExecuted,
    MarketUpdate,
    SystemStart,
    SystemShutdown,
}

impl AuditEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventType::OrderPlaced => "ORDER_PLACED",
            AuditEventType::OrderCancelled => "ORDER_CANCELLED",
            AuditEventType::OrderFilled => "ORDER_FILLED",
            AuditEventType::OrderPartiallyFilled => "ORDER_PARTIALLY_FILLED",
            AuditEventType::OrderRejected => "ORDER_REJECTED",
            AuditEventType::QuoteSubmitted => "QUOTE_SUBMITTED",
            AuditEventType::TradeExecuted => "TRADE_EXECUTED",
            AuditEventType::MarketUpdate => "MARKET_UPDATE",
            AuditEventType::SystemStart => "SYSTEM_START",
            AuditEventType::SystemShutdown => "SYSTEM_SHUTDOWN",
        }
    }
}

impl fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value in an event's data map: string, integer, or decimal
///
/// Decimals are rendered as strings on the wire so the canonical JSON is
/// byte-stable across parse/serialize round trips.
#[derive(Debug, Clone, PartialEq)]
pub enum DataValue {
    Str(String),
    Int(i64),
    Dec(Decimal),
}

impl Serialize for DataValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            DataValue::Str(s) => serializer.serialize_str(s),
            DataValue::Int(i) => serializer.serialize_i64(*i),
            DataValue::Dec(d) => serializer.serialize_str(&d.to_string()),
        }
    }
}

impl<'de> Deserialize<'de> for DataValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct ValueVisitor;

        impl serde::de::Visitor<'_> for ValueVisitor {
            type Value = DataValue;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a string or an integer")
            }

            fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<DataValue, E> {
                Ok(DataValue::Int(v))
            }

            fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<DataValue, E> {
                i64::try_from(v)
                    .map(DataValue::Int)
                    .map_err(|_| E::custom("integer out of range"))
            }

            fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<DataValue, E> {
                Ok(DataValue::Str(v.to_string()))
            }
        }

        deserializer.deserialize_any(ValueVisitor)
    }
}

impl From<&str> for DataValue {
    fn from(v: &str) -> Self {
        DataValue::Str(v.to_string())
    }
}

impl From<String> for DataValue {
    fn from(v: String) -> Self {
        DataValue::Str(v)
    }
}

impl From<i64> for DataValue {
    fn from(v: i64) -> Self {
        DataValue::Int(v)
    }
}

impl From<u32> for DataValue {
    fn from(v: u32) -> Self {
        DataValue::Int(v as i64)
    }
}

impl From<u64> for DataValue {
    fn from(v: u64) -> Self {
        DataValue::Int(v as i64)
    }
}

impl From<Decimal> for DataValue {
    fn from(v: Decimal) -> Self {
        DataValue::Dec(v)
    }
}

/// Immutable audit record
///
/// `hash` and `previous_hash` are empty until the event is sealed by a
/// [`crate::HashChain`]; once sealed and published the event is never
/// mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    pub event_id: Uuid,
    pub event_type: AuditEventType,
    pub timestamp: DateTime<Utc>,
    pub user_id: Option<String>,
    pub product: Option<String>,
    pub data: BTreeMap<String, DataValue>,
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub previous_hash: String,
}

impl AuditEvent {
    /// Start building an event of the given type
    pub fn builder(event_type: AuditEventType) -> AuditEventBuilder {
        AuditEventBuilder {
            event_type,
            user_id: None,
            product: None,
            data: BTreeMap::new(),
        }
    }

    /// Canonical JSON over the stable fields, keys in lexicographic order
    ///
    /// Covers everything except `hash` and `previous_hash`.
    pub fn canonical_json(&self) -> String {
        let value = serde_json::json!({
            "data": self.data,
            "eventId": self.event_id,
            "eventType": self.event_type,
            "product": self.product,
            "timestamp": self.timestamp,
            "userId": self.user_id,
        });
        value.to_string()
    }

    /// SHA-256 over `previous_hash || canonical_json`, hex-encoded
    pub fn compute_hash(&self, previous_hash: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(previous_hash.as_bytes());
        hasher.update(self.canonical_json().as_bytes());
        let digest = hasher.finalize();
        digest.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

/// Builder for [`AuditEvent`]
pub struct AuditEventBuilder {
    event_type: AuditEventType,
    user_id: Option<String>,
    product: Option<String>,
    data: BTreeMap<String, DataValue>,
}

impl AuditEventBuilder {
    pub fn user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn product(mut self, product: impl Into<String>) -> Self {
        self.product = Some(product.into());
        self
    }

    pub fn data(mut self, key: impl Into<String>, value: impl Into<DataValue>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Finalize with a fresh v4 event id and the current UTC timestamp
    pub fn build(self) -> AuditEvent {
        AuditEvent {
            event_id: Uuid::new_v4(),
            event_type: self.event_type,
            timestamp: Utc::now(),
            user_id: self.user_id,
            product: self.product,
            data: self.data,
            hash: String::new(),
            previous_hash: String::new(),
        }
    }
}
