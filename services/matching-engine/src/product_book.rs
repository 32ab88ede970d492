//! Per-instrument matching unit
//!
//! Composes the two book sides under one exclusive/shared lock and runs the
//! admission flow: FOK gate, insertion, the crossing loop with STP and the
//! OCO cascade, top-of-book publication, and audit emission. All collaborators
//! (audit log, publisher, registry, user delivery) are injected, so tests
//! build fresh isolated books.
//!
//! Lock ordering: the book's write lock may be held while appending to the
//! audit chain; the reverse never happens. A thread never holds two book
//! locks.

use parking_lot::RwLock;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{debug, error, info};

use audit_chain::{AuditEvent, AuditEventType, AuditLog};
use market_data::{BookLevel, TopOfBook, TopOfBookPublisher};
use telemetry::{AdmissionTimeline, MonotonicClock};
use types::errors::ValidationError;
use types::ids::{InstrumentId, TradableId, UserId};
use types::tradable::{FillType, Quote, Side, Tradable, TradableSnapshot, TradableStatus};

use crate::book::{BookSide, Fill};
use crate::error::EngineError;
use crate::fok;
use crate::registry::OrderRelationshipRegistry;
use crate::stp::{StpConfig, StpMode, TraderIdExtractor};

/// Receives post-mutation snapshots after fills and cancellations
///
/// The user manager is an external collaborator; this capability is its
/// only coupling to the core.
pub trait FillDelivery: Send + Sync {
    fn deliver(&self, snapshot: &TradableSnapshot);
}

/// Delivery that drops every snapshot (tests, headless runs)
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDelivery;

impl FillDelivery for NoopDelivery {
    fn deliver(&self, _snapshot: &TradableSnapshot) {}
}

/// Collaborators injected into every product book
#[derive(Clone)]
pub struct BookDeps {
    pub audit: Arc<AuditLog>,
    pub publisher: Arc<TopOfBookPublisher>,
    pub registry: Arc<OrderRelationshipRegistry>,
    pub stp: Arc<StpConfig>,
    pub extractor: Arc<dyn TraderIdExtractor>,
    pub delivery: Arc<dyn FillDelivery>,
    pub clock: MonotonicClock,
}

struct BookPair {
    buy: BookSide,
    sell: BookSide,
}

impl BookPair {
    fn side_mut(&mut self, side: Side) -> &mut BookSide {
        match side {
            Side::BUY => &mut self.buy,
            Side::SELL => &mut self.sell,
        }
    }

    fn side(&self, side: Side) -> &BookSide {
        match side {
            Side::BUY => &self.buy,
            Side::SELL => &self.sell,
        }
    }
}

/// A single instrument's order book and matching logic
pub struct ProductBook {
    instrument: InstrumentId,
    sides: RwLock<BookPair>,
    deps: BookDeps,
}

impl ProductBook {
    pub fn new(instrument: InstrumentId, deps: BookDeps) -> Self {
        Self {
            instrument,
            sides: RwLock::new(BookPair {
                buy: BookSide::new(Side::BUY),
                sell: BookSide::new(Side::SELL),
            }),
            deps,
        }
    }

    pub fn instrument(&self) -> &InstrumentId {
        &self.instrument
    }

    /// Admit an order
    ///
    /// Runs the FOK gate, inserts the tradable, crosses, publishes the
    /// top of book, and registers any OCO link that survived crossing.
    /// Returns the snapshot taken at insertion time.
    pub fn add(
        &self,
        mut tradable: Tradable,
        timeline: &mut AdmissionTimeline,
    ) -> Result<TradableSnapshot, EngineError> {
        if tradable.instrument != self.instrument {
            return Err(ValidationError::InvalidInput(format!(
                "tradable for {} admitted to book {}",
                tradable.instrument, self.instrument
            ))
            .into());
        }
        if tradable.status() != TradableStatus::Pending {
            return Err(ValidationError::InvalidInput(format!(
                "tradable {} already admitted (status {:?})",
                tradable.id,
                tradable.status()
            ))
            .into());
        }

        let clock = self.deps.clock;
        let mut pair = self.sides.write();
        timeline.t3_lock_acquired = clock.now_ns();

        // FOK gate: consistent with the crossing below because both run
        // under the same lock hold.
        if tradable.is_fok() {
            let requested = tradable.remaining_volume();
            let trader = self.deps.extractor.trader_id(&tradable).to_string();
            let available = fok::eligible_volume(
                pair.side(tradable.side.opposite()),
                tradable.price,
                &trader,
                self.deps.stp.mode(),
                self.deps.extractor.as_ref(),
            );
            if available < requested as u64 {
                tradable.reject(TradableStatus::RejectedFok);
                info!(
                    order_id = %tradable.id,
                    requested,
                    available,
                    "FOK rejected: insufficient eligible liquidity"
                );
                self.append_audit(
                    AuditEvent::builder(AuditEventType::OrderRejected)
                        .user(tradable.user.as_str())
                        .product(self.instrument.as_str())
                        .data("orderId", tradable.id.to_string())
                        .data("reason", "FOK")
                        .data("requested", requested)
                        .data("available", available)
                        .build(),
                );
                return Err(EngineError::RejectedFok {
                    order_id: tradable.id,
                    requested,
                    available,
                });
            }
        }

        let id = tradable.id;
        let side = tradable.side;
        let is_fok = tradable.is_fok();
        let oco_link = tradable.oco_link();
        let created_ts = tradable.created_ts;

        self.append_audit(
            AuditEvent::builder(AuditEventType::OrderPlaced)
                .user(tradable.user.as_str())
                .product(self.instrument.as_str())
                .data("side", side.to_string())
                .data("price", tradable.price.as_decimal())
                .data("quantity", tradable.original_volume())
                .data("orderId", id.to_string())
                .build(),
        );
        debug!(order_id = %id, %side, "tradable admitted");

        let snapshot = pair.side_mut(side).add(tradable);

        timeline.t4_matching_begins = clock.now_ns();
        self.try_trade(&mut pair);
        timeline.t5_matching_complete = clock.now_ns();

        // A gated FOK must have filled to zero remaining.
        if is_fok && pair.side(side).contains(id) {
            error!(order_id = %id, "FOK passed the gate but did not fully fill");
            std::process::abort();
        }

        timeline.t6_execution_begins = clock.now_ns();
        let changed = self.refresh_market(&pair);
        if let Some(linked) = oco_link {
            if pair.side(side).contains(id) {
                if let Err(err) = self.deps.registry.link(
                    id,
                    linked,
                    types::tradable::LinkType::OCO,
                    created_ts,
                ) {
                    error!(order_id = %id, error = %err, "OCO registration rejected");
                }
            }
        }
        timeline.t7_execution_done = clock.now_ns();

        timeline.t8_audit_begins = clock.now_ns();
        if let Some(top) = changed {
            self.emit_market_update(&top);
        }
        timeline.t9_audit_complete = clock.now_ns();

        Ok(snapshot)
    }

    /// Admit a two-sided quote
    ///
    /// Any existing quote sides for the same user are removed first, inside
    /// the same exclusive section, then both new sides are admitted and the
    /// book crosses once.
    pub fn add_quote(
        &self,
        quote: Quote,
        timeline: &mut AdmissionTimeline,
    ) -> Result<[TradableSnapshot; 2], EngineError> {
        if quote.instrument != self.instrument {
            return Err(ValidationError::InvalidInput(format!(
                "quote for {} admitted to book {}",
                quote.instrument, self.instrument
            ))
            .into());
        }

        let clock = self.deps.clock;
        let user = quote.user.clone();
        let mut pair = self.sides.write();
        timeline.t3_lock_acquired = clock.now_ns();

        // A user has at most one active quote per instrument.
        let replaced: Vec<TradableSnapshot> = pair
            .buy
            .remove_quotes_for_user(&user)
            .into_iter()
            .chain(pair.sell.remove_quotes_for_user(&user))
            .collect();
        for snapshot in &replaced {
            self.emit_cancelled(snapshot, "QUOTE_REPLACED");
            self.deps.registry.deactivate(snapshot.id);
            self.deps.delivery.deliver(snapshot);
        }

        let (buy, sell) = quote.into_sides();
        self.append_audit(
            AuditEvent::builder(AuditEventType::QuoteSubmitted)
                .user(user.as_str())
                .product(self.instrument.as_str())
                .data("buyPrice", buy.price.as_decimal())
                .data("buyQuantity", buy.original_volume())
                .data("sellPrice", sell.price.as_decimal())
                .data("sellQuantity", sell.original_volume())
                .data("buyOrderId", buy.id.to_string())
                .data("sellOrderId", sell.id.to_string())
                .build(),
        );

        let buy_snapshot = pair.buy.add(buy);
        let sell_snapshot = pair.sell.add(sell);

        timeline.t4_matching_begins = clock.now_ns();
        self.try_trade(&mut pair);
        timeline.t5_matching_complete = clock.now_ns();

        timeline.t6_execution_begins = clock.now_ns();
        let changed = self.refresh_market(&pair);
        timeline.t7_execution_done = clock.now_ns();

        timeline.t8_audit_begins = clock.now_ns();
        if let Some(top) = changed {
            self.emit_market_update(&top);
        }
        timeline.t9_audit_complete = clock.now_ns();

        Ok([buy_snapshot, sell_snapshot])
    }

    /// Cancel a tradable by id
    ///
    /// An OCO relationship is deactivated but never cascaded here: only a
    /// fill cancels the counterpart.
    pub fn cancel(&self, side: Side, id: TradableId) -> Result<TradableSnapshot, EngineError> {
        let mut pair = self.sides.write();
        let Some(snapshot) = pair.side_mut(side).cancel(id) else {
            return Err(EngineError::NotFound { id });
        };

        self.emit_cancelled(&snapshot, "USER");
        self.deps.registry.deactivate(id);
        self.deps.delivery.deliver(&snapshot);
        info!(order_id = %id, %side, "order cancelled");

        if let Some(top) = self.refresh_market(&pair) {
            self.emit_market_update(&top);
        }
        Ok(snapshot)
    }

    /// Remove both quote sides for a user atomically
    pub fn remove_quotes_for_user(&self, user: &UserId) -> Vec<TradableSnapshot> {
        let mut pair = self.sides.write();
        let removed: Vec<TradableSnapshot> = pair
            .buy
            .remove_quotes_for_user(user)
            .into_iter()
            .chain(pair.sell.remove_quotes_for_user(user))
            .collect();

        for snapshot in &removed {
            self.emit_cancelled(snapshot, "USER");
            self.deps.registry.deactivate(snapshot.id);
            self.deps.delivery.deliver(snapshot);
        }
        if !removed.is_empty() {
            if let Some(top) = self.refresh_market(&pair) {
                self.emit_market_update(&top);
            }
        }
        removed
    }

    /// Point-in-time top of book under the shared lock
    pub fn top_of_book(&self) -> TopOfBook {
        let pair = self.sides.read();
        self.compute_top(&pair)
    }

    /// Cross the book while the best bid meets the best ask
    ///
    /// Each iteration either trades volume off both heads, or removes a
    /// tradable via STP, so the loop always terminates. Trade price is the
    /// resting side's price: the head admitted earlier, ties broken by id.
    fn try_trade(&self, pair: &mut BookPair) {
        loop {
            let (Some(bid_price), Some(ask_price)) =
                (pair.buy.top_of_book_price(), pair.sell.top_of_book_price())
            else {
                break;
            };
            if bid_price < ask_price {
                break;
            }

            let (buy_id, buy_ts, buy_remaining, buy_trader) = {
                let head = pair.buy.head_at_best().expect("best bid level is nonempty");
                (
                    head.id,
                    head.created_ts,
                    head.remaining_volume(),
                    self.deps.extractor.trader_id(head).to_string(),
                )
            };
            let (sell_id, sell_ts, sell_remaining, sell_trader) = {
                let head = pair.sell.head_at_best().expect("best ask level is nonempty");
                (
                    head.id,
                    head.created_ts,
                    head.remaining_volume(),
                    self.deps.extractor.trader_id(head).to_string(),
                )
            };

            let buy_is_resting = resting_is_buy(buy_ts, sell_ts, buy_id, sell_id);

            if buy_trader == sell_trader {
                let mode = self.deps.stp.mode();
                if mode != StpMode::Allow {
                    let exit = self.apply_stp(pair, mode, buy_is_resting);
                    if exit {
                        break;
                    }
                    continue;
                }
            }

            let trade_volume = buy_remaining.min(sell_remaining);
            let trade_price = if buy_is_resting { bid_price } else { ask_price };

            self.append_audit(
                AuditEvent::builder(AuditEventType::TradeExecuted)
                    .product(self.instrument.as_str())
                    .data("price", trade_price.as_decimal())
                    .data("quantity", trade_volume)
                    .data("buyOrderId", buy_id.to_string())
                    .data("sellOrderId", sell_id.to_string())
                    .build(),
            );
            info!(
                instrument = %self.instrument,
                price = %trade_price,
                quantity = trade_volume,
                "trade executed"
            );

            let buy_fills = pair.buy.trade_out(bid_price, trade_volume);
            let sell_fills = pair.sell.trade_out(ask_price, trade_volume);

            // Both sides' fills are audited and delivered before any OCO
            // cascade runs, so the cancel always follows the fills.
            for fill in buy_fills.iter().chain(sell_fills.iter()) {
                self.emit_fill(fill);
            }
            for fill in buy_fills.iter().chain(sell_fills.iter()) {
                if fill.fill_type == FillType::Full {
                    self.cascade_oco(pair, fill.snapshot.id);
                }
            }
        }
    }

    /// Audit and deliver one fill
    fn emit_fill(&self, fill: &Fill) {
        let event_type = match fill.fill_type {
            FillType::Full => AuditEventType::OrderFilled,
            FillType::Partial => AuditEventType::OrderPartiallyFilled,
        };
        self.append_audit(
            AuditEvent::builder(event_type)
                .user(fill.snapshot.user.as_str())
                .product(self.instrument.as_str())
                .data("side", fill.snapshot.side.to_string())
                .data("price", fill.snapshot.price.as_decimal())
                .data("quantity", fill.quantity)
                .data("fillType", fill.fill_type.as_str())
                .data("orderId", fill.snapshot.id.to_string())
                .build(),
        );
        self.deps.delivery.deliver(&fill.snapshot);
    }

    /// Cancel the OCO counterpart of a fully filled order
    fn cascade_oco(&self, pair: &mut BookPair, filled_id: TradableId) {
        if !self.deps.registry.has_active(filled_id) {
            return;
        }
        let Some(counterpart) = self.deps.registry.counterpart_of(filled_id) else {
            return;
        };

        let cancelled = pair
            .buy
            .cancel_with_status(counterpart, TradableStatus::CancelledOco)
            .or_else(|| {
                pair.sell
                    .cancel_with_status(counterpart, TradableStatus::CancelledOco)
            });
        if let Some(snapshot) = cancelled {
            info!(
                filled = %filled_id,
                cancelled = %counterpart,
                "OCO cascade: counterpart cancelled"
            );
            self.append_audit(
                AuditEvent::builder(AuditEventType::OrderCancelled)
                    .user(snapshot.user.as_str())
                    .product(self.instrument.as_str())
                    .data("side", snapshot.side.to_string())
                    .data("orderId", snapshot.id.to_string())
                    .data("cancelledQuantity", snapshot.cancelled_volume)
                    .data("linkedOrderId", filled_id.to_string())
                    .data("reason", "OCO")
                    .build(),
            );
            self.deps.delivery.deliver(&snapshot);
        }
        self.deps.registry.remove(filled_id);
    }

    /// Apply the configured STP action; returns true when crossing must stop
    fn apply_stp(&self, pair: &mut BookPair, mode: StpMode, buy_is_resting: bool) -> bool {
        let (resting_side, incoming_side) = if buy_is_resting {
            (Side::BUY, Side::SELL)
        } else {
            (Side::SELL, Side::BUY)
        };

        match mode {
            StpMode::Allow => false,
            StpMode::CancelIncoming => {
                self.stp_cancel_head(pair, incoming_side, resting_side);
                true
            }
            StpMode::CancelResting => {
                self.stp_cancel_head(pair, resting_side, incoming_side);
                false
            }
            StpMode::CancelBoth => {
                self.stp_cancel_head(pair, incoming_side, resting_side);
                self.stp_cancel_head(pair, resting_side, incoming_side);
                true
            }
        }
    }

    /// Cancel the head of `target_side` with status CANCELLED_STP
    fn stp_cancel_head(&self, pair: &mut BookPair, target_side: Side, other_side: Side) {
        let other_id = pair.side(other_side).head_at_best().map(|t| t.id);
        let Some(snapshot) = pair
            .side_mut(target_side)
            .cancel_head_at_best(TradableStatus::CancelledStp)
        else {
            return;
        };

        info!(
            order_id = %snapshot.id,
            side = %target_side,
            "self-trade prevented: tradable cancelled"
        );
        let mut builder = AuditEvent::builder(AuditEventType::OrderCancelled)
            .user(snapshot.user.as_str())
            .product(self.instrument.as_str())
            .data("side", snapshot.side.to_string())
            .data("orderId", snapshot.id.to_string())
            .data("cancelledQuantity", snapshot.cancelled_volume)
            .data("reason", "STP");
        if let Some(other_id) = other_id {
            builder = builder.data("matchedOrderId", other_id.to_string());
        }
        self.append_audit(builder.build());

        self.deps.registry.deactivate(snapshot.id);
        self.deps.delivery.deliver(&snapshot);
    }

    fn emit_cancelled(&self, snapshot: &TradableSnapshot, reason: &str) {
        self.append_audit(
            AuditEvent::builder(AuditEventType::OrderCancelled)
                .user(snapshot.user.as_str())
                .product(self.instrument.as_str())
                .data("side", snapshot.side.to_string())
                .data("orderId", snapshot.id.to_string())
                .data("cancelledQuantity", snapshot.cancelled_volume)
                .data("reason", reason)
                .build(),
        );
    }

    /// Recompute and publish the top of book; Some(top) when it changed
    fn refresh_market(&self, pair: &BookPair) -> Option<TopOfBook> {
        let top = self.compute_top(pair);
        self.deps.publisher.publish(top.clone()).then_some(top)
    }

    fn compute_top(&self, pair: &BookPair) -> TopOfBook {
        TopOfBook {
            instrument: self.instrument.clone(),
            bid: pair.buy.top_of_book_price().map(|price| BookLevel {
                price,
                volume: pair.buy.top_of_book_volume(),
            }),
            ask: pair.sell.top_of_book_price().map(|price| BookLevel {
                price,
                volume: pair.sell.top_of_book_volume(),
            }),
        }
    }

    fn emit_market_update(&self, top: &TopOfBook) {
        let mut builder = AuditEvent::builder(AuditEventType::MarketUpdate)
            .product(self.instrument.as_str())
            .data("bidVolume", top.bid.map(|l| l.volume).unwrap_or(0))
            .data("askVolume", top.ask.map(|l| l.volume).unwrap_or(0));
        if let Some(bid) = top.bid {
            builder = builder.data("bestBid", bid.price.as_decimal());
        }
        if let Some(ask) = top.ask {
            builder = builder.data("bestAsk", ask.price.as_decimal());
        }
        self.append_audit(builder.build());
    }

    /// Append to the chain; a primary sink failure is fatal by policy
    fn append_audit(&self, event: AuditEvent) {
        if let Err(err) = self.deps.audit.append(event) {
            error!(error = %err, "primary audit sink failed; aborting to preserve chain integrity");
            std::process::abort();
        }
    }

    /// Verify side bookkeeping and that the book is uncrossed (tests)
    pub fn check_invariants(&self) -> bool {
        let pair = self.sides.read();
        let uncrossed = match (pair.buy.top_of_book_price(), pair.sell.top_of_book_price()) {
            (Some(bid), Some(ask)) => bid < ask,
            _ => true,
        };
        uncrossed && pair.buy.check_invariants() && pair.sell.check_invariants()
    }
}

/// Decide which head is the resting side: earlier admission wins, ties
/// break by lexicographic id
fn resting_is_buy(buy_ts: i64, sell_ts: i64, buy_id: TradableId, sell_id: TradableId) -> bool {
    match buy_ts.cmp(&sell_ts) {
        Ordering::Less => true,
        Ordering::Greater => false,
        Ordering::Equal => buy_id <= sell_id,
    }
}
