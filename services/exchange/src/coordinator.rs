//! The exchange admission coordinator

use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

use audit_chain::{
    AuditError, AuditEvent, AuditEventType, AuditLog, AuditSink, FileSink, MemorySink, SinkError,
    SinkRole,
};
use market_data::{TopOfBook, TopOfBookPublisher};
use matching_engine::{
    BookDeps, EngineError, OrderRelationshipRegistry, ProductManager, StpConfig, UserIdExtractor,
};
use telemetry::{AdmissionTimeline, LatencyMonitor, MonotonicClock};
use types::errors::ValidationError;
use types::ids::{InstrumentId, TradableId, UserId};
use types::numeric::Price;
use types::tradable::{LinkType, OrderType, Quote, Side, Tradable, TradableSnapshot};

/// Errors constructing the exchange
#[derive(Error, Debug)]
pub enum SetupError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("audit sink setup failed: {0}")]
    Sink(#[from] SinkError),

    #[error(transparent)]
    Audit(#[from] AuditError),
}

/// OCO/OSO/OTO linkage on an order request
#[derive(Debug, Clone, Copy)]
pub struct OrderLink {
    pub linked_order_id: TradableId,
    pub link_type: LinkType,
}

/// Boundary representation of an order submission
#[derive(Debug, Clone)]
pub struct OrderRequest {
    pub user: String,
    pub instrument: String,
    pub side: Side,
    /// External decimal price; rounded HALF-UP to cents at the boundary
    pub price: Decimal,
    pub volume: u32,
    pub order_type: OrderType,
    pub link: Option<OrderLink>,
}

impl OrderRequest {
    /// Convenience constructor for a standalone limit order
    pub fn limit(
        user: impl Into<String>,
        instrument: impl Into<String>,
        side: Side,
        price: Decimal,
        volume: u32,
    ) -> Self {
        Self {
            user: user.into(),
            instrument: instrument.into(),
            side,
            price,
            volume,
            order_type: OrderType::LIMIT,
            link: None,
        }
    }
}

/// Boundary representation of a two-sided quote submission
#[derive(Debug, Clone)]
pub struct QuoteRequest {
    pub user: String,
    pub instrument: String,
    pub buy_price: Decimal,
    pub buy_volume: u32,
    pub sell_price: Decimal,
    pub sell_volume: u32,
}

/// The matching core behind a single admission surface
pub struct Exchange {
    products: ProductManager,
    audit: Arc<AuditLog>,
    publisher: Arc<TopOfBookPublisher>,
    registry: Arc<OrderRelationshipRegistry>,
    monitor: Arc<LatencyMonitor>,
    users: Arc<crate::users::UserManager>,
    stp: Arc<StpConfig>,
    clock: MonotonicClock,
    shut_down: AtomicBool,
}

impl Exchange {
    /// Build an exchange with sinks from the configuration
    pub fn new(config: crate::config::EngineConfig) -> Result<Self, SetupError> {
        let mut sinks: Vec<(Box<dyn AuditSink>, SinkRole)> = Vec::new();
        for kind in &config.audit_sinks {
            match kind {
                crate::config::SinkKind::File => {
                    let sink = FileSink::open(config.audit_dir.join("audit.log"))?;
                    sinks.push((Box::new(sink), SinkRole::Primary));
                }
                crate::config::SinkKind::Memory => {
                    sinks.push((Box::new(MemorySink::new()), SinkRole::Advisory));
                }
            }
        }
        Self::with_audit_log(config, Arc::new(AuditLog::with_sinks(sinks)))
    }

    /// Build an exchange around an existing audit log (tests inject a
    /// memory-backed log here)
    pub fn with_audit_log(
        config: crate::config::EngineConfig,
        audit: Arc<AuditLog>,
    ) -> Result<Self, SetupError> {
        let instruments = config
            .products
            .iter()
            .map(InstrumentId::try_new)
            .collect::<Result<Vec<_>, _>>()?;

        let publisher = Arc::new(TopOfBookPublisher::default());
        let registry = Arc::new(OrderRelationshipRegistry::new());
        let stp = Arc::new(StpConfig::new(config.stp_mode));
        let users = Arc::new(crate::users::UserManager::new());
        let monitor = Arc::new(LatencyMonitor::new(config.thresholds));
        let clock = MonotonicClock::new();

        let deps = BookDeps {
            audit: Arc::clone(&audit),
            publisher: Arc::clone(&publisher),
            registry: Arc::clone(&registry),
            stp: Arc::clone(&stp),
            extractor: Arc::new(UserIdExtractor),
            delivery: Arc::clone(&users) as Arc<dyn matching_engine::FillDelivery>,
            clock,
        };
        let products = ProductManager::new(&instruments, deps);

        audit.append(
            AuditEvent::builder(AuditEventType::SystemStart)
                .data("products", instruments.len() as u64)
                .data("stpMode", config.stp_mode.as_str())
                .build(),
        )?;
        info!(products = instruments.len(), "exchange started");

        Ok(Self {
            products,
            audit,
            publisher,
            registry,
            monitor,
            users,
            stp,
            clock,
            shut_down: AtomicBool::new(false),
        })
    }

    /// Submit a single-sided order
    pub fn submit_order(&self, request: OrderRequest) -> Result<TradableId, EngineError> {
        let arrival = self.clock.now_ns();

        let user = UserId::try_new(request.user.as_str())?;
        let instrument = InstrumentId::try_new(request.instrument.as_str())?;
        let price = Price::try_from_decimal(request.price)?;
        let (link_type, linked_order_id) = match request.link {
            Some(link) => (link.link_type, Some(link.linked_order_id)),
            None => (LinkType::STANDALONE, None),
        };
        let tradable = Tradable::order(
            user,
            instrument.clone(),
            price,
            request.volume,
            request.side,
            request.order_type,
            link_type,
            linked_order_id,
            arrival as i64,
        )?;
        let id = tradable.id;

        let mut timeline = AdmissionTimeline::start(id.to_string(), instrument.as_str(), arrival);
        timeline.t1_deserialized = arrival;
        timeline.t2_validated = self.clock.now_ns();

        let book = self.products.book(instrument.as_str())?;
        let result = book.add(tradable, &mut timeline);

        timeline.finish(self.clock.now_ns());
        self.monitor.record(&timeline);

        result.map(|_| id)
    }

    /// Submit a two-sided quote; returns (buy id, sell id)
    pub fn submit_quote(
        &self,
        request: QuoteRequest,
    ) -> Result<(TradableId, TradableId), EngineError> {
        let arrival = self.clock.now_ns();

        let user = UserId::try_new(request.user.as_str())?;
        let instrument = InstrumentId::try_new(request.instrument.as_str())?;
        let quote = Quote::new(
            user,
            instrument.clone(),
            Price::try_from_decimal(request.buy_price)?,
            request.buy_volume,
            Price::try_from_decimal(request.sell_price)?,
            request.sell_volume,
            arrival as i64,
        )?;
        let buy_id = quote.side(Side::BUY).id;
        let sell_id = quote.side(Side::SELL).id;

        let mut timeline =
            AdmissionTimeline::start(buy_id.to_string(), instrument.as_str(), arrival);
        timeline.t1_deserialized = arrival;
        timeline.t2_validated = self.clock.now_ns();

        let book = self.products.book(instrument.as_str())?;
        let result = book.add_quote(quote, &mut timeline);

        timeline.finish(self.clock.now_ns());
        self.monitor.record(&timeline);

        result.map(|_| (buy_id, sell_id))
    }

    /// Cancel a resting tradable
    ///
    /// The boundary carries no instrument, so books are probed in symbol
    /// order; the instrument set is small and fixed.
    pub fn cancel_order(
        &self,
        side: Side,
        id: TradableId,
    ) -> Result<TradableSnapshot, EngineError> {
        for book in self.products.books() {
            match book.cancel(side, id) {
                Ok(snapshot) => return Ok(snapshot),
                Err(EngineError::NotFound { .. }) => continue,
                Err(other) => return Err(other),
            }
        }
        Err(EngineError::NotFound { id })
    }

    /// Pull both sides of a user's quote for one instrument
    pub fn cancel_quote(
        &self,
        user: &str,
        instrument: &str,
    ) -> Result<Vec<TradableSnapshot>, EngineError> {
        let user = UserId::try_new(user)?;
        let book = self.products.book(instrument)?;
        Ok(book.remove_quotes_for_user(&user))
    }

    /// Current top of book for an instrument
    pub fn query_top_of_book(&self, instrument: &str) -> Result<TopOfBook, EngineError> {
        Ok(self.products.book(instrument)?.top_of_book())
    }

    /// Emit SYSTEM_SHUTDOWN once; further calls are no-ops
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        let stats = self.monitor.stats();
        if let Err(err) = self.audit.append(
            AuditEvent::builder(AuditEventType::SystemShutdown)
                .data("ordersProcessed", self.monitor.total_recorded())
                .data("p99LatencyNs", stats.p99)
                .build(),
        ) {
            error!(error = %err, "failed to record shutdown event");
        }
        info!("exchange shut down");
    }

    pub fn users(&self) -> &crate::users::UserManager {
        &self.users
    }

    pub fn monitor(&self) -> &LatencyMonitor {
        &self.monitor
    }

    pub fn publisher(&self) -> &TopOfBookPublisher {
        &self.publisher
    }

    pub fn registry(&self) -> &OrderRelationshipRegistry {
        &self.registry
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    pub fn stp(&self) -> &StpConfig {
        &self.stp
    }

    /// Registered instruments in symbol order
    pub fn instruments(&self) -> Vec<InstrumentId> {
        self.products.instruments()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use rust_decimal::Decimal;

    fn exchange(products: &[&str]) -> (Exchange, MemorySink) {
        let memory = MemorySink::new();
        let audit = Arc::new(AuditLog::with_sinks(vec![(
            Box::new(memory.clone()),
            SinkRole::Primary,
        )]));
        let config = EngineConfig {
            products: products.iter().map(|s| s.to_string()).collect(),
            ..EngineConfig::default()
        };
        (
            Exchange::with_audit_log(config, audit).unwrap(),
            memory,
        )
    }

    fn price(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_system_start_emitted() {
        let (_exchange, memory) = exchange(&["AAPL"]);
        let events = memory.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, AuditEventType::SystemStart);
    }

    #[test]
    fn test_submit_and_query() {
        let (exchange, _memory) = exchange(&["AAPL"]);
        exchange
            .submit_order(OrderRequest::limit("ALICE", "AAPL", Side::SELL, price("150.00"), 100))
            .unwrap();

        let top = exchange.query_top_of_book("AAPL").unwrap();
        assert_eq!(top.ask_price(), Some(Price::from_cents(15_000)));
        assert_eq!(top.ask.unwrap().volume, 100);
        assert!(top.bid.is_none());
    }

    #[test]
    fn test_boundary_price_rounding() {
        let (exchange, _memory) = exchange(&["AAPL"]);
        exchange
            .submit_order(OrderRequest::limit("ALICE", "AAPL", Side::SELL, price("150.005"), 10))
            .unwrap();

        let top = exchange.query_top_of_book("AAPL").unwrap();
        assert_eq!(top.ask_price(), Some(Price::from_cents(15_001)));
    }

    #[test]
    fn test_invalid_user_rejected_without_audit() {
        let (exchange, memory) = exchange(&["AAPL"]);
        let before = memory.len();
        let result = exchange.submit_order(OrderRequest::limit(
            "ab",
            "AAPL",
            Side::BUY,
            price("1.00"),
            1,
        ));
        assert!(matches!(result, Err(EngineError::Validation(_))));
        assert_eq!(memory.len(), before, "malformed input leaves no audit trace");
    }

    #[test]
    fn test_unknown_instrument() {
        let (exchange, _memory) = exchange(&["AAPL"]);
        let result = exchange.submit_order(OrderRequest::limit(
            "ALICE",
            "TSLA",
            Side::BUY,
            price("1.00"),
            1,
        ));
        assert!(matches!(result, Err(EngineError::UnknownInstrument { .. })));
        assert!(exchange.query_top_of_book("TSLA").is_err());
    }

    #[test]
    fn test_cancel_probes_books() {
        let (exchange, _memory) = exchange(&["AAPL", "MSFT"]);
        let id = exchange
            .submit_order(OrderRequest::limit("ALICE", "MSFT", Side::BUY, price("310.00"), 10))
            .unwrap();

        let snapshot = exchange.cancel_order(Side::BUY, id).unwrap();
        assert_eq!(snapshot.id, id);
        assert!(exchange.query_top_of_book("MSFT").unwrap().is_empty());
    }

    #[test]
    fn test_cancel_unknown_not_found() {
        let (exchange, _memory) = exchange(&["AAPL"]);
        let result = exchange.cancel_order(Side::BUY, TradableId::new());
        assert!(matches!(result, Err(EngineError::NotFound { .. })));
    }

    #[test]
    fn test_quote_lifecycle() {
        let (exchange, _memory) = exchange(&["AAPL"]);
        let (buy_id, sell_id) = exchange
            .submit_quote(QuoteRequest {
                user: "MM_01".to_string(),
                instrument: "AAPL".to_string(),
                buy_price: price("149.50"),
                buy_volume: 50,
                sell_price: price("150.50"),
                sell_volume: 50,
            })
            .unwrap();
        assert_ne!(buy_id, sell_id);

        let top = exchange.query_top_of_book("AAPL").unwrap();
        assert_eq!(top.bid_price(), Some(Price::from_cents(14_950)));
        assert_eq!(top.ask_price(), Some(Price::from_cents(15_050)));

        let removed = exchange.cancel_quote("MM_01", "AAPL").unwrap();
        assert_eq!(removed.len(), 2);
        assert!(exchange.query_top_of_book("AAPL").unwrap().is_empty());
    }

    #[test]
    fn test_timeline_recorded_per_admission() {
        let (exchange, _memory) = exchange(&["AAPL"]);
        exchange
            .submit_order(OrderRequest::limit("ALICE", "AAPL", Side::BUY, price("1.00"), 1))
            .unwrap();
        exchange
            .submit_order(OrderRequest::limit("BOB_1", "AAPL", Side::BUY, price("1.00"), 1))
            .unwrap();
        assert_eq!(exchange.monitor().total_recorded(), 2);
    }

    #[test]
    fn test_shutdown_idempotent() {
        let (exchange, memory) = exchange(&["AAPL"]);
        exchange.shutdown();
        exchange.shutdown();

        let shutdowns = memory
            .events()
            .into_iter()
            .filter(|e| e.event_type == AuditEventType::SystemShutdown)
            .count();
        assert_eq!(shutdowns, 1);
    }

    #[test]
    fn test_fills_delivered_to_users() {
        let (exchange, _memory) = exchange(&["AAPL"]);
        exchange
            .submit_order(OrderRequest::limit("ALICE", "AAPL", Side::SELL, price("150.00"), 100))
            .unwrap();
        exchange
            .submit_order(OrderRequest::limit("BOB_1", "AAPL", Side::BUY, price("150.00"), 100))
            .unwrap();

        let alice = exchange.users().latest("ALICE").unwrap();
        assert_eq!(alice.filled_volume, 100);
        let bob = exchange.users().latest("BOB_1").unwrap();
        assert_eq!(bob.filled_volume, 100);
    }
}
