//! Tradable lifecycle types
//!
//! A tradable is anything that can rest on the book: a single-sided order or
//! one side of a two-sided quote. The common volume ledger
//! (`remaining + filled + cancelled == original`) lives on the shared record;
//! the `kind` tag carries the order-only fields (order type, OCO linkage).

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::ValidationError;
use crate::ids::{InstrumentId, TradableId, UserId};
use crate::numeric::Price;

/// Maximum original volume accepted at construction
pub const MAX_ORDER_VOLUME: u32 = 9999;

/// Book side (buyer or seller)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    /// Buy side (bid); best price is the highest
    BUY,
    /// Sell side (ask); best price is the lowest
    SELL,
}

impl Side {
    /// Get the opposite side
    pub fn opposite(&self) -> Self {
        match self {
            Side::BUY => Side::SELL,
            Side::SELL => Side::BUY,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::BUY => write!(f, "BUY"),
            Side::SELL => write!(f, "SELL"),
        }
    }
}

/// Tradable lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradableStatus {
    /// Received, not yet admitted to a book
    Pending,
    /// Resting on the book
    Accepted,
    /// Matched against part of its volume
    PartiallyFilled,
    /// Matched completely (terminal)
    FullyFilled,
    /// Cancelled by the user or the system (terminal)
    Cancelled,
    /// Cancelled because its OCO counterpart filled (terminal)
    CancelledOco,
    /// Cancelled by self-trade prevention (terminal)
    CancelledStp,
    /// Fill-or-kill rejected for insufficient liquidity (terminal)
    RejectedFok,
    /// Rejected by validation (terminal)
    Rejected,
}

impl TradableStatus {
    /// Check if the status is terminal (no further transitions possible)
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            TradableStatus::FullyFilled
                | TradableStatus::Cancelled
                | TradableStatus::CancelledOco
                | TradableStatus::CancelledStp
                | TradableStatus::RejectedFok
                | TradableStatus::Rejected
        )
    }

    /// Check if the tradable can still match on the book
    pub fn is_executable(&self) -> bool {
        matches!(self, TradableStatus::Accepted | TradableStatus::PartiallyFilled)
    }
}

/// Order execution type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderType {
    /// Rest at the limit until filled or cancelled
    LIMIT,
    /// Fill completely on admission or reject with no trades
    FOK,
}

/// Order linkage type
///
/// Only OCO drives engine behavior (the fill cascade); OSO and OTO are
/// representable for registry bookkeeping but carry no engine semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinkType {
    /// No linkage
    STANDALONE,
    /// One-Cancels-Other: a fill on one cancels the other
    OCO,
    /// One-Sends-Other
    OSO,
    /// One-Triggers-Other
    OTO,
}

/// How much of a tradable a single fill consumed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FillType {
    /// Part of the remaining volume
    Partial,
    /// All of the remaining volume
    Full,
}

impl FillType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FillType::Partial => "PARTIAL",
            FillType::Full => "FULL",
        }
    }
}

/// Variant-specific fields of a tradable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TradableKind {
    /// A single-sided order
    Order {
        order_type: OrderType,
        link_type: LinkType,
        linked_order_id: Option<TradableId>,
    },
    /// One side of a two-sided quote
    QuoteSide,
}

/// A resting order or one side of a quote
///
/// The volume ledger is private: the owning book side is the sole mutator
/// while the tradable rests, and `remaining + filled + cancelled == original`
/// holds after every mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tradable {
    pub id: TradableId,
    pub user: UserId,
    pub instrument: InstrumentId,
    pub price: Price,
    pub side: Side,
    original_volume: u32,
    remaining_volume: u32,
    filled_volume: u32,
    cancelled_volume: u32,
    status: TradableStatus,
    /// Monotonic-clock nanoseconds at admission; decides the resting side
    pub created_ts: i64,
    pub kind: TradableKind,
}

impl Tradable {
    /// Create a standalone limit order
    pub fn limit_order(
        user: UserId,
        instrument: InstrumentId,
        price: Price,
        volume: u32,
        side: Side,
        created_ts: i64,
    ) -> Result<Self, ValidationError> {
        Self::order(
            user,
            instrument,
            price,
            volume,
            side,
            OrderType::LIMIT,
            LinkType::STANDALONE,
            None,
            created_ts,
        )
    }

    /// Create an order with explicit type and linkage
    #[allow(clippy::too_many_arguments)]
    pub fn order(
        user: UserId,
        instrument: InstrumentId,
        price: Price,
        volume: u32,
        side: Side,
        order_type: OrderType,
        link_type: LinkType,
        linked_order_id: Option<TradableId>,
        created_ts: i64,
    ) -> Result<Self, ValidationError> {
        Self::with_kind(
            user,
            instrument,
            price,
            volume,
            side,
            created_ts,
            TradableKind::Order {
                order_type,
                link_type,
                linked_order_id,
            },
        )
    }

    /// Create one side of a quote
    pub fn quote_side(
        user: UserId,
        instrument: InstrumentId,
        price: Price,
        volume: u32,
        side: Side,
        created_ts: i64,
    ) -> Result<Self, ValidationError> {
        Self::with_kind(
            user,
            instrument,
            price,
            volume,
            side,
            created_ts,
            TradableKind::QuoteSide,
        )
    }

    fn with_kind(
        user: UserId,
        instrument: InstrumentId,
        price: Price,
        volume: u32,
        side: Side,
        created_ts: i64,
        kind: TradableKind,
    ) -> Result<Self, ValidationError> {
        if volume == 0 || volume > MAX_ORDER_VOLUME {
            return Err(ValidationError::InvalidVolume(volume as i64));
        }
        Ok(Self {
            id: TradableId::new(),
            user,
            instrument,
            price,
            side,
            original_volume: volume,
            remaining_volume: volume,
            filled_volume: 0,
            cancelled_volume: 0,
            status: TradableStatus::Pending,
            created_ts,
            kind,
        })
    }

    pub fn original_volume(&self) -> u32 {
        self.original_volume
    }

    pub fn remaining_volume(&self) -> u32 {
        self.remaining_volume
    }

    pub fn filled_volume(&self) -> u32 {
        self.filled_volume
    }

    pub fn cancelled_volume(&self) -> u32 {
        self.cancelled_volume
    }

    pub fn status(&self) -> TradableStatus {
        self.status
    }

    /// Check if this is a fill-or-kill order
    pub fn is_fok(&self) -> bool {
        matches!(
            self.kind,
            TradableKind::Order {
                order_type: OrderType::FOK,
                ..
            }
        )
    }

    /// Get the OCO linkage, if this is an OCO-linked order
    pub fn oco_link(&self) -> Option<TradableId> {
        match self.kind {
            TradableKind::Order {
                link_type: LinkType::OCO,
                linked_order_id,
                ..
            } => linked_order_id,
            _ => None,
        }
    }

    /// Check if this tradable is a quote side
    pub fn is_quote_side(&self) -> bool {
        matches!(self.kind, TradableKind::QuoteSide)
    }

    /// Mark the tradable as resting on the book
    pub fn accept(&mut self) {
        self.status = TradableStatus::Accepted;
    }

    /// Mark the tradable as rejected with the given terminal status
    pub fn reject(&mut self, status: TradableStatus) {
        debug_assert!(status.is_final());
        self.status = status;
    }

    /// Move volume from remaining to filled
    ///
    /// # Panics
    /// Panics if the fill is zero or exceeds the remaining volume; the book's
    /// integrity cannot be partially repaired, so this is fatal.
    pub fn fill(&mut self, volume: u32) -> FillType {
        assert!(volume > 0, "fill volume must be positive");
        assert!(
            volume <= self.remaining_volume,
            "fill {} exceeds remaining {} on {}",
            volume,
            self.remaining_volume,
            self.id
        );

        self.remaining_volume -= volume;
        self.filled_volume += volume;
        let fill_type = if self.remaining_volume == 0 {
            self.status = TradableStatus::FullyFilled;
            FillType::Full
        } else {
            self.status = TradableStatus::PartiallyFilled;
            FillType::Partial
        };

        assert!(self.check_invariant(), "volume ledger violated after fill");
        fill_type
    }

    /// Move the entire remaining volume to cancelled
    ///
    /// Returns the cancelled quantity.
    pub fn cancel_remaining(&mut self, status: TradableStatus) -> u32 {
        debug_assert!(status.is_final());
        let cancelled = self.remaining_volume;
        self.cancelled_volume += cancelled;
        self.remaining_volume = 0;
        self.status = status;

        assert!(self.check_invariant(), "volume ledger violated after cancel");
        cancelled
    }

    /// Check the permanent volume invariant
    pub fn check_invariant(&self) -> bool {
        self.remaining_volume + self.filled_volume + self.cancelled_volume == self.original_volume
    }

    /// Produce an immutable snapshot of the current state
    pub fn snapshot(&self) -> TradableSnapshot {
        TradableSnapshot {
            id: self.id,
            user: self.user.clone(),
            instrument: self.instrument.clone(),
            price: self.price,
            side: self.side,
            original_volume: self.original_volume,
            remaining_volume: self.remaining_volume,
            filled_volume: self.filled_volume,
            cancelled_volume: self.cancelled_volume,
            status: self.status,
        }
    }
}

impl fmt::Display for Tradable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} at {}, orig {}, rem {}, fill {}, cxl {}, id {}",
            self.user,
            self.side,
            self.instrument,
            self.price,
            self.original_volume,
            self.remaining_volume,
            self.filled_volume,
            self.cancelled_volume,
            self.id
        )
    }
}

/// Immutable point-in-time copy of a tradable's state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradableSnapshot {
    pub id: TradableId,
    pub user: UserId,
    pub instrument: InstrumentId,
    pub price: Price,
    pub side: Side,
    pub original_volume: u32,
    pub remaining_volume: u32,
    pub filled_volume: u32,
    pub cancelled_volume: u32,
    pub status: TradableStatus,
}

/// A two-sided quote submitted atomically under one user
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub user: UserId,
    pub instrument: InstrumentId,
    buy: Tradable,
    sell: Tradable,
}

impl Quote {
    /// Create a quote from its two sides
    ///
    /// The buy price must be strictly below the sell price: a crossed quote
    /// would trade against itself on admission.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user: UserId,
        instrument: InstrumentId,
        buy_price: Price,
        buy_volume: u32,
        sell_price: Price,
        sell_volume: u32,
        created_ts: i64,
    ) -> Result<Self, ValidationError> {
        if buy_price >= sell_price {
            return Err(ValidationError::InvalidInput(format!(
                "quote is crossed: buy {} >= sell {}",
                buy_price, sell_price
            )));
        }
        let buy = Tradable::quote_side(
            user.clone(),
            instrument.clone(),
            buy_price,
            buy_volume,
            Side::BUY,
            created_ts,
        )?;
        let sell = Tradable::quote_side(
            user.clone(),
            instrument.clone(),
            sell_price,
            sell_volume,
            Side::SELL,
            created_ts,
        )?;
        Ok(Self {
            user,
            instrument,
            buy,
            sell,
        })
    }

    /// Borrow a quote side
    pub fn side(&self, side: Side) -> &Tradable {
        match side {
            Side::BUY => &self.buy,
            Side::SELL => &self.sell,
        }
    }

    /// Consume the quote into its (buy, sell) sides
    pub fn into_sides(self) -> (Tradable, Tradable) {
        (self.buy, self.sell)
    }
}
