//! User records
//!
//! Owns per-user history of tradable snapshots. Independent of the core
//! except for snapshot delivery after fills and cancels, which arrives
//! through the engine's `FillDelivery` capability.

use dashmap::DashMap;
use matching_engine::FillDelivery;
use types::tradable::TradableSnapshot;

/// Per-user tradable history
#[derive(Debug, Default)]
pub struct UserManager {
    users: DashMap<String, Vec<TradableSnapshot>>,
}

impl UserManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshots delivered for a user, in delivery order
    pub fn history(&self, user: &str) -> Vec<TradableSnapshot> {
        self.users
            .get(user)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    /// Most recent snapshot delivered for a user
    pub fn latest(&self, user: &str) -> Option<TradableSnapshot> {
        self.users
            .get(user)
            .and_then(|entry| entry.value().last().cloned())
    }

    /// Number of users with at least one delivered snapshot
    pub fn user_count(&self) -> usize {
        self.users.len()
    }
}

impl FillDelivery for UserManager {
    fn deliver(&self, snapshot: &TradableSnapshot) {
        self.users
            .entry(snapshot.user.as_str().to_string())
            .or_default()
            .push(snapshot.clone());
    }
}
