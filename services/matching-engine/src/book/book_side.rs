//! One side (BUY or SELL) of a product book
//!
//! Levels live in a `BTreeMap` keyed by price, so best-price extraction is
//! the last key for BUY and the first for SELL, and iteration order is
//! deterministic. Empty levels are removed from the map immediately.
//!
//! The side is a pure data structure: it reports fills and cancellations to
//! the caller and emits no audit events itself.

use std::collections::BTreeMap;
use tracing::error;
use types::ids::{TradableId, UserId};
use types::numeric::Price;
use types::tradable::{Side, Tradable, TradableSnapshot, TradableStatus};

use super::price_level::{Fill, PriceLevel};

/// All resting tradables on one side of one instrument
#[derive(Debug)]
pub struct BookSide {
    side: Side,
    levels: BTreeMap<Price, PriceLevel>,
}

impl BookSide {
    pub fn new(side: Side) -> Self {
        Self {
            side,
            levels: BTreeMap::new(),
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    /// Admit a tradable: mark it accepted and append it to its price level
    pub fn add(&mut self, mut tradable: Tradable) -> TradableSnapshot {
        tradable.accept();
        let snapshot = tradable.snapshot();
        self.levels
            .entry(tradable.price)
            .or_default()
            .push_back(tradable);
        snapshot
    }

    /// Cancel a tradable by id with status `CANCELLED`
    pub fn cancel(&mut self, id: TradableId) -> Option<TradableSnapshot> {
        self.cancel_with_status(id, TradableStatus::Cancelled)
    }

    /// Cancel a tradable by id with an explicit terminal status
    ///
    /// Moves the entire remaining volume to cancelled, removes the tradable
    /// from its level, and drops the level if it became empty.
    pub fn cancel_with_status(
        &mut self,
        id: TradableId,
        status: TradableStatus,
    ) -> Option<TradableSnapshot> {
        let price = self
            .levels
            .iter()
            .find(|(_, level)| level.iter().any(|t| t.id == id))
            .map(|(price, _)| *price)?;

        let level = self.levels.get_mut(&price)?;
        let mut tradable = level.remove(id)?;
        tradable.cancel_remaining(status);
        if level.is_empty() {
            self.levels.remove(&price);
        }
        Some(tradable.snapshot())
    }

    /// Remove every quote side belonging to `user`
    ///
    /// Ids are collected in a first pass and removed in a second so the
    /// level iteration is never invalidated mid-walk. Regular orders are
    /// untouched; only quote sides are swept.
    pub fn remove_quotes_for_user(&mut self, user: &UserId) -> Vec<TradableSnapshot> {
        let ids: Vec<TradableId> = self
            .levels
            .values()
            .flat_map(|level| level.iter())
            .filter(|t| t.is_quote_side() && &t.user == user)
            .map(|t| t.id)
            .collect();

        ids.into_iter()
            .filter_map(|id| self.cancel_with_status(id, TradableStatus::Cancelled))
            .collect()
    }

    /// Best price on this side, or None if empty
    pub fn top_of_book_price(&self) -> Option<Price> {
        match self.side {
            Side::BUY => self.levels.keys().next_back().copied(),
            Side::SELL => self.levels.keys().next().copied(),
        }
    }

    /// Total remaining volume at the best price (0 if empty)
    pub fn top_of_book_volume(&self) -> u64 {
        self.top_of_book_price()
            .and_then(|price| self.levels.get(&price))
            .map(|level| level.total_volume())
            .unwrap_or(0)
    }

    /// Head tradable at the best price
    pub fn head_at_best(&self) -> Option<&Tradable> {
        self.top_of_book_price()
            .and_then(|price| self.levels.get(&price))
            .and_then(|level| level.front())
    }

    /// Cancel the head tradable at the best price (self-trade prevention)
    pub fn cancel_head_at_best(&mut self, status: TradableStatus) -> Option<TradableSnapshot> {
        let id = self.head_at_best()?.id;
        self.cancel_with_status(id, status)
    }

    /// Remove `volume` units at exactly `price`, consuming in time priority
    ///
    /// The caller guarantees the level holds at least `volume`; anything
    /// else is an invariant violation and the process aborts, because the
    /// book's integrity cannot be partially repaired.
    pub fn trade_out(&mut self, price: Price, volume: u32) -> Vec<Fill> {
        let Some(level) = self.levels.get_mut(&price) else {
            error!(side = %self.side, %price, volume, "trade_out: no level at price");
            std::process::abort();
        };
        if level.total_volume() < volume as u64 {
            error!(
                side = %self.side,
                %price,
                volume,
                available = level.total_volume(),
                "trade_out: insufficient volume at level"
            );
            std::process::abort();
        }

        let mut fills = Vec::new();
        let mut remaining = volume;
        while remaining > 0 {
            let head_remaining = level
                .front()
                .map(|t| t.remaining_volume())
                .unwrap_or_else(|| {
                    error!(side = %self.side, %price, remaining, "trade_out: level drained early");
                    std::process::abort();
                });
            let quantity = remaining.min(head_remaining);
            fills.push(level.fill_front(quantity));
            remaining -= quantity;
        }

        if level.is_empty() {
            self.levels.remove(&price);
        }
        fills
    }

    /// Check whether a tradable with this id is resting on the side
    pub fn contains(&self, id: TradableId) -> bool {
        self.levels
            .values()
            .any(|level| level.iter().any(|t| t.id == id))
    }

    /// Tradables at `limit` or better, in consumption order
    ///
    /// Consumption order is best price first, time priority within a level:
    /// descending prices for BUY, ascending for SELL.
    pub fn tradables_in_range(&self, limit: Price) -> Box<dyn Iterator<Item = &Tradable> + '_> {
        match self.side {
            Side::BUY => Box::new(
                self.levels
                    .range(limit..)
                    .rev()
                    .flat_map(|(_, level)| level.iter()),
            ),
            Side::SELL => Box::new(
                self.levels
                    .range(..=limit)
                    .flat_map(|(_, level)| level.iter()),
            ),
        }
    }

    /// Number of price levels
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Verify level bookkeeping: no empty levels, level totals match queues
    pub fn check_invariants(&self) -> bool {
        self.levels.values().all(|level| {
            !level.is_empty()
                && level.total_volume()
                    == level.iter().map(|t| t.remaining_volume() as u64).sum::<u64>()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::ids::InstrumentId;
    use types::tradable::FillType;

    fn order(user: &str, price_cents: i64, volume: u32, side: Side) -> Tradable {
        Tradable::limit_order(
            UserId::try_new(user).unwrap(),
            InstrumentId::try_new("AAPL").unwrap(),
            Price::from_cents(price_cents),
            volume,
            side,
            0,
        )
        .unwrap()
    }

    fn quote_side(user: &str, price_cents: i64, volume: u32, side: Side) -> Tradable {
        Tradable::quote_side(
            UserId::try_new(user).unwrap(),
            InstrumentId::try_new("AAPL").unwrap(),
            Price::from_cents(price_cents),
            volume,
            side,
            0,
        )
        .unwrap()
    }

    #[test]
    fn test_add_accepts_and_snapshots() {
        let mut side = BookSide::new(Side::BUY);
        let snapshot = side.add(order("ALICE", 15_000, 100, Side::BUY));

        assert_eq!(snapshot.status, TradableStatus::Accepted);
        assert_eq!(side.level_count(), 1);
        assert!(side.contains(snapshot.id));
    }

    #[test]
    fn test_best_price_buy_is_highest() {
        let mut side = BookSide::new(Side::BUY);
        side.add(order("ALICE", 15_000, 10, Side::BUY));
        side.add(order("ALICE", 15_200, 10, Side::BUY));
        side.add(order("ALICE", 14_900, 10, Side::BUY));

        assert_eq!(side.top_of_book_price(), Some(Price::from_cents(15_200)));
    }

    #[test]
    fn test_best_price_sell_is_lowest() {
        let mut side = BookSide::new(Side::SELL);
        side.add(order("ALICE", 15_000, 10, Side::SELL));
        side.add(order("ALICE", 15_200, 10, Side::SELL));
        side.add(order("ALICE", 14_900, 10, Side::SELL));

        assert_eq!(side.top_of_book_price(), Some(Price::from_cents(14_900)));
    }

    #[test]
    fn test_top_of_book_volume_sums_level() {
        let mut side = BookSide::new(Side::SELL);
        side.add(order("ALICE", 15_000, 30, Side::SELL));
        side.add(order("BOB_1", 15_000, 20, Side::SELL));
        side.add(order("CAROL", 15_100, 99, Side::SELL));

        assert_eq!(side.top_of_book_volume(), 50);
    }

    #[test]
    fn test_cancel_moves_remaining_to_cancelled() {
        let mut side = BookSide::new(Side::BUY);
        let snapshot = side.add(order("ALICE", 15_000, 100, Side::BUY));

        let cancelled = side.cancel(snapshot.id).unwrap();
        assert_eq!(cancelled.status, TradableStatus::Cancelled);
        assert_eq!(cancelled.remaining_volume, 0);
        assert_eq!(cancelled.cancelled_volume, 100);
        assert!(side.is_empty(), "empty level must be dropped");
    }

    #[test]
    fn test_cancel_unknown_returns_none() {
        let mut side = BookSide::new(Side::BUY);
        side.add(order("ALICE", 15_000, 100, Side::BUY));
        assert!(side.cancel(TradableId::new()).is_none());
    }

    #[test]
    fn test_remove_quotes_only_sweeps_quote_sides() {
        let mut side = BookSide::new(Side::BUY);
        let order_snap = side.add(order("ALICE", 15_000, 100, Side::BUY));
        let quote_snap = side.add(quote_side("ALICE", 14_900, 50, Side::BUY));
        side.add(quote_side("BOB_1", 14_800, 50, Side::BUY));

        let removed = side.remove_quotes_for_user(&UserId::try_new("ALICE").unwrap());
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].id, quote_snap.id);
        assert!(side.contains(order_snap.id));
        assert_eq!(side.level_count(), 2);
    }

    #[test]
    fn test_trade_out_partial_head() {
        let mut side = BookSide::new(Side::SELL);
        side.add(order("ALICE", 15_000, 100, Side::SELL));

        let fills = side.trade_out(Price::from_cents(15_000), 40);
        assert_eq!(fills.len(), 1);
        assert_eq!(fills[0].fill_type, FillType::Partial);
        assert_eq!(fills[0].quantity, 40);
        assert_eq!(side.top_of_book_volume(), 60);
    }

    #[test]
    fn test_trade_out_consumes_in_time_priority() {
        let mut side = BookSide::new(Side::SELL);
        let first = side.add(order("ALICE", 15_000, 30, Side::SELL));
        let second = side.add(order("BOB_1", 15_000, 30, Side::SELL));

        let fills = side.trade_out(Price::from_cents(15_000), 45);
        assert_eq!(fills.len(), 2);
        assert_eq!(fills[0].snapshot.id, first.id);
        assert_eq!(fills[0].fill_type, FillType::Full);
        assert_eq!(fills[1].snapshot.id, second.id);
        assert_eq!(fills[1].fill_type, FillType::Partial);
        assert_eq!(fills[1].quantity, 15);
    }

    #[test]
    fn test_trade_out_drops_empty_level() {
        let mut side = BookSide::new(Side::SELL);
        side.add(order("ALICE", 15_000, 30, Side::SELL));

        side.trade_out(Price::from_cents(15_000), 30);
        assert!(side.is_empty());
        assert_eq!(side.top_of_book_volume(), 0);
    }

    #[test]
    fn test_cancel_head_at_best() {
        let mut side = BookSide::new(Side::SELL);
        let first = side.add(order("ALICE", 15_000, 30, Side::SELL));
        side.add(order("BOB_1", 15_000, 30, Side::SELL));

        let cancelled = side.cancel_head_at_best(TradableStatus::CancelledStp).unwrap();
        assert_eq!(cancelled.id, first.id);
        assert_eq!(cancelled.status, TradableStatus::CancelledStp);
        assert_eq!(side.top_of_book_volume(), 30);
    }

    #[test]
    fn test_tradables_in_range_sell() {
        let mut side = BookSide::new(Side::SELL);
        side.add(order("ALICE", 10_000, 30, Side::SELL));
        side.add(order("ALICE", 10_100, 20, Side::SELL));
        side.add(order("ALICE", 10_200, 10, Side::SELL));

        let eligible: u64 = side
            .tradables_in_range(Price::from_cents(10_100))
            .map(|t| t.remaining_volume() as u64)
            .sum();
        assert_eq!(eligible, 50);
    }

    #[test]
    fn test_tradables_in_range_buy_order() {
        let mut side = BookSide::new(Side::BUY);
        side.add(order("ALICE", 10_000, 30, Side::BUY));
        side.add(order("ALICE", 10_200, 10, Side::BUY));

        let prices: Vec<i64> = side
            .tradables_in_range(Price::from_cents(10_000))
            .map(|t| t.price.as_cents())
            .collect();
        // Best (highest) bid first
        assert_eq!(prices, vec![10_200, 10_000]);
    }

    #[test]
    fn test_invariants_hold_through_mutation() {
        let mut side = BookSide::new(Side::SELL);
        let a = side.add(order("ALICE", 15_000, 30, Side::SELL));
        side.add(order("BOB_1", 15_000, 20, Side::SELL));
        side.add(order("CAROL", 15_100, 10, Side::SELL));
        assert!(side.check_invariants());

        side.trade_out(Price::from_cents(15_000), 35);
        assert!(side.check_invariants());

        assert!(side.cancel(a.id).is_none(), "fully consumed tradable is gone");
        assert!(side.check_invariants());
    }
}
