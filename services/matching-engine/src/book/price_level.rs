//! Price level with FIFO queue
//!
//! A price level owns every tradable resting at one price. Insertion order
//! defines time priority. The level maintains a running total of remaining
//! volume so top-of-book volume queries never walk the queue.

use std::collections::VecDeque;
use types::ids::TradableId;
use types::tradable::{FillType, Tradable, TradableSnapshot};

/// Outcome of consuming volume from one tradable
#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    /// State of the tradable after the fill was applied
    pub snapshot: TradableSnapshot,
    /// Quantity consumed by this fill
    pub quantity: u32,
    pub fill_type: FillType,
}

/// All tradables resting at a single price, in time priority
#[derive(Debug, Default)]
pub struct PriceLevel {
    queue: VecDeque<Tradable>,
    total_volume: u64,
}

impl PriceLevel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a tradable at the back of the queue (time priority)
    pub fn push_back(&mut self, tradable: Tradable) {
        self.total_volume += tradable.remaining_volume() as u64;
        self.queue.push_back(tradable);
    }

    /// Remove a tradable by id, wherever it sits in the queue
    pub fn remove(&mut self, id: TradableId) -> Option<Tradable> {
        let position = self.queue.iter().position(|t| t.id == id)?;
        let tradable = self.queue.remove(position)?;
        self.total_volume -= tradable.remaining_volume() as u64;
        Some(tradable)
    }

    /// Peek the head of the queue
    pub fn front(&self) -> Option<&Tradable> {
        self.queue.front()
    }

    /// Consume `quantity` from the head tradable
    ///
    /// A full consumption removes the head from the queue; the returned
    /// snapshot reflects the post-fill state either way.
    ///
    /// # Panics
    /// Panics if the level is empty or the quantity exceeds the head's
    /// remaining volume; callers guarantee liquidity before trading out.
    pub fn fill_front(&mut self, quantity: u32) -> Fill {
        let head = self.queue.front_mut().expect("fill_front on empty level");
        let fill_type = head.fill(quantity);
        self.total_volume -= quantity as u64;

        let snapshot = head.snapshot();
        if fill_type == FillType::Full {
            self.queue.pop_front();
        }
        Fill {
            snapshot,
            quantity,
            fill_type,
        }
    }

    /// Total remaining volume across all tradables at this price
    pub fn total_volume(&self) -> u64 {
        self.total_volume
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Iterate tradables in time priority
    pub fn iter(&self) -> impl Iterator<Item = &Tradable> {
        self.queue.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::ids::{InstrumentId, UserId};
    use types::numeric::Price;
    use types::tradable::Side;

    fn tradable(user: &str, volume: u32) -> Tradable {
        Tradable::limit_order(
            UserId::try_new(user).unwrap(),
            InstrumentId::try_new("AAPL").unwrap(),
            Price::from_cents(15_000),
            volume,
            Side::BUY,
            0,
        )
        .unwrap()
    }

    #[test]
    fn test_push_back_tracks_volume() {
        let mut level = PriceLevel::new();
        level.push_back(tradable("ALICE", 100));
        level.push_back(tradable("BOB_1", 50));

        assert_eq!(level.len(), 2);
        assert_eq!(level.total_volume(), 150);
    }

    #[test]
    fn test_fifo_order_preserved() {
        let mut level = PriceLevel::new();
        let first = tradable("ALICE", 10);
        let first_id = first.id;
        level.push_back(first);
        level.push_back(tradable("BOB_1", 20));

        assert_eq!(level.front().unwrap().id, first_id);
    }

    #[test]
    fn test_remove_by_id() {
        let mut level = PriceLevel::new();
        let a = tradable("ALICE", 10);
        let b = tradable("BOB_1", 20);
        let a_id = a.id;
        level.push_back(a);
        level.push_back(b);

        let removed = level.remove(a_id).unwrap();
        assert_eq!(removed.id, a_id);
        assert_eq!(level.len(), 1);
        assert_eq!(level.total_volume(), 20);

        assert!(level.remove(a_id).is_none());
    }

    #[test]
    fn test_fill_front_partial() {
        let mut level = PriceLevel::new();
        level.push_back(tradable("ALICE", 100));

        let fill = level.fill_front(30);
        assert_eq!(fill.fill_type, FillType::Partial);
        assert_eq!(fill.quantity, 30);
        assert_eq!(fill.snapshot.remaining_volume, 70);
        assert_eq!(level.total_volume(), 70);
        assert_eq!(level.len(), 1);
    }

    #[test]
    fn test_fill_front_full_removes_head() {
        let mut level = PriceLevel::new();
        level.push_back(tradable("ALICE", 100));
        level.push_back(tradable("BOB_1", 50));

        let fill = level.fill_front(100);
        assert_eq!(fill.fill_type, FillType::Full);
        assert_eq!(fill.snapshot.remaining_volume, 0);
        assert_eq!(level.len(), 1);
        assert_eq!(level.total_volume(), 50);
        assert_eq!(level.front().unwrap().user.as_str(), "BOB_1");
    }

    #[test]
    #[should_panic(expected = "fill_front on empty level")]
    fn test_fill_front_empty_panics() {
        PriceLevel::new().fill_front(1);
    }
}
