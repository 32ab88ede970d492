//! Instrument registry
//!
//! Owns the instrument → ProductBook mapping. Instruments are registered at
//! startup and never removed at runtime, so lookups need no locking.

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;
use types::ids::InstrumentId;

use crate::error::EngineError;
use crate::product_book::{BookDeps, ProductBook};

/// All product books in the process, keyed by symbol
pub struct ProductManager {
    books: BTreeMap<String, Arc<ProductBook>>,
}

impl ProductManager {
    /// Create a book for every instrument, sharing the same collaborators
    pub fn new(instruments: &[InstrumentId], deps: BookDeps) -> Self {
        let books = instruments
            .iter()
            .map(|instrument| {
                (
                    instrument.as_str().to_string(),
                    Arc::new(ProductBook::new(instrument.clone(), deps.clone())),
                )
            })
            .collect::<BTreeMap<_, _>>();
        info!(instruments = books.len(), "product manager initialized");
        Self { books }
    }

    /// Look up the book for a symbol
    pub fn book(&self, symbol: &str) -> Result<&Arc<ProductBook>, EngineError> {
        self.books.get(symbol).ok_or_else(|| EngineError::UnknownInstrument {
            symbol: symbol.to_string(),
        })
    }

    /// All books in symbol order
    pub fn books(&self) -> impl Iterator<Item = &Arc<ProductBook>> {
        self.books.values()
    }

    /// Registered instruments in symbol order
    pub fn instruments(&self) -> Vec<InstrumentId> {
        self.books
            .values()
            .map(|book| book.instrument().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::product_book::NoopDelivery;
    use crate::registry::OrderRelationshipRegistry;
    use crate::stp::{StpConfig, UserIdExtractor};
    use audit_chain::AuditLog;
    use market_data::TopOfBookPublisher;
    use telemetry::MonotonicClock;

    fn deps() -> BookDeps {
        BookDeps {
            audit: Arc::new(AuditLog::new()),
            publisher: Arc::new(TopOfBookPublisher::default()),
            registry: Arc::new(OrderRelationshipRegistry::new()),
            stp: Arc::new(StpConfig::default()),
            extractor: Arc::new(UserIdExtractor),
            delivery: Arc::new(NoopDelivery),
            clock: MonotonicClock::new(),
        }
    }

    fn instruments(symbols: &[&str]) -> Vec<InstrumentId> {
        symbols
            .iter()
            .map(|s| InstrumentId::try_new(*s).unwrap())
            .collect()
    }

    #[test]
    fn test_books_created_at_startup() {
        let manager = ProductManager::new(&instruments(&["AAPL", "MSFT"]), deps());
        assert_eq!(manager.len(), 2);
        assert!(manager.book("AAPL").is_ok());
        assert!(manager.book("MSFT").is_ok());
    }

    #[test]
    fn test_unknown_instrument() {
        let manager = ProductManager::new(&instruments(&["AAPL"]), deps());
        let result = manager.book("TSLA");
        assert!(matches!(
            result,
            Err(EngineError::UnknownInstrument { symbol }) if symbol == "TSLA"
        ));
    }

    #[test]
    fn test_iteration_in_symbol_order() {
        let manager = ProductManager::new(&instruments(&["MSFT", "AAPL", "GOOG"]), deps());
        let symbols: Vec<String> = manager
            .instruments()
            .iter()
            .map(|i| i.as_str().to_string())
            .collect();
        assert_eq!(symbols, vec!["AAPL", "GOOG", "MSFT"]);
    }
}
