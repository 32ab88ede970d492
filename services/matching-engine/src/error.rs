//! Engine error taxonomy

use thiserror::Error;
use types::errors::ValidationError;
use types::ids::TradableId;

/// Errors surfaced by book operations
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("fill-or-kill rejected: order {order_id} requested {requested}, eligible {available}")]
    RejectedFok {
        order_id: TradableId,
        requested: u32,
        available: u64,
    },

    #[error("tradable not found: {id}")]
    NotFound { id: TradableId },

    #[error("unknown instrument: {symbol}")]
    UnknownInstrument { symbol: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_converts() {
        let err: EngineError = ValidationError::InvalidVolume(0).into();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn test_rejected_fok_display() {
        let err = EngineError::RejectedFok {
            order_id: TradableId::new(),
            requested: 60,
            available: 30,
        };
        let rendered = err.to_string();
        assert!(rendered.contains("requested 60"));
        assert!(rendered.contains("eligible 30"));
    }
}
