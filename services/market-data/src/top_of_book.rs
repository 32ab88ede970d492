//! Top-of-book snapshot type

use serde::{Deserialize, Serialize};
use std::fmt;
use types::ids::InstrumentId;
use types::numeric::Price;

/// One side of the top of book: best price and aggregate resting volume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: Price,
    /// Sum of remaining volume across all tradables at the best price
    pub volume: u64,
}

/// Point-in-time top of book for a single instrument
///
/// A side is `None` when that side of the book is empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopOfBook {
    pub instrument: InstrumentId,
    pub bid: Option<BookLevel>,
    pub ask: Option<BookLevel>,
}

impl TopOfBook {
    /// Snapshot of an empty book
    pub fn empty(instrument: InstrumentId) -> Self {
        Self {
            instrument,
            bid: None,
            ask: None,
        }
    }

    /// Check whether both sides are empty
    pub fn is_empty(&self) -> bool {
        self.bid.is_none() && self.ask.is_none()
    }

    /// Best bid price, if any
    pub fn bid_price(&self) -> Option<Price> {
        self.bid.map(|level| level.price)
    }

    /// Best ask price, if any
    pub fn ask_price(&self) -> Option<Price> {
        self.ask.map(|level| level.price)
    }
}

impl fmt::Display for TopOfBook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ", self.instrument)?;
        match self.bid {
            Some(level) => write!(f, "bid {}x{}", level.price, level.volume)?,
            None => write!(f, "bid empty")?,
        }
        write!(f, " / ")?;
        match self.ask {
            Some(level) => write!(f, "ask {}x{}", level.price, level.volume),
            None => write!(f, "ask empty"),
        }
    }
}
