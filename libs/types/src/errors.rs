//! Validation error taxonomy
//!
//! Malformed input is rejected before it enters the system: no book state
//! changes and no audit event is written for these errors.

use thiserror::Error;

/// Input validation errors surfaced at the admission boundary
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid user id: {0} (must be 3-20 chars of [a-zA-Z0-9_])")]
    InvalidUser(String),

    #[error("invalid instrument: {0} (must be 1-5 chars of [a-zA-Z0-9.])")]
    InvalidInstrument(String),

    #[error("invalid price: {0}")]
    InvalidPrice(String),

    #[error("invalid volume: {0} (must be in 1..=9999)")]
    InvalidVolume(i64),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}
