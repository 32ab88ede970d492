//! Fill-or-kill liquidity gate
//!
//! An FOK order is admitted only if the opposite side holds enough eligible
//! volume at the limit or better. Eligibility accounts for self-trade
//! prevention: volume the STP policy would skip cannot fill the order, so
//! counting it would let an FOK pass the gate and then fail to fill.
//!
//! The gate runs inside the book's exclusive lock so its snapshot is
//! consistent with the crossing that follows.

use types::numeric::Price;

use crate::book::BookSide;
use crate::stp::{StpMode, TraderIdExtractor};

/// Volume on `counter_side` an incoming FOK from `incoming_trader` can fill
///
/// - `Allow`: every tradable at the limit or better counts.
/// - `CancelResting`: same-trader tradables are cancelled off the book as
///   the loop reaches them, so they are excluded but everything behind
///   them still counts.
/// - `CancelIncoming` / `CancelBoth`: the incoming order dies the moment it
///   meets a same-trader head, so only volume strictly ahead of the first
///   same-trader tradable (in consumption order) counts.
pub fn eligible_volume(
    counter_side: &BookSide,
    limit: Price,
    incoming_trader: &str,
    mode: StpMode,
    extractor: &dyn TraderIdExtractor,
) -> u64 {
    let mut eligible = 0u64;
    for tradable in counter_side.tradables_in_range(limit) {
        let self_trade = extractor.trader_id(tradable) == incoming_trader;
        match mode {
            StpMode::Allow => eligible += tradable.remaining_volume() as u64,
            StpMode::CancelResting => {
                if !self_trade {
                    eligible += tradable.remaining_volume() as u64;
                }
            }
            StpMode::CancelIncoming | StpMode::CancelBoth => {
                if self_trade {
                    return eligible;
                }
                eligible += tradable.remaining_volume() as u64;
            }
        }
    }
    eligible
}
