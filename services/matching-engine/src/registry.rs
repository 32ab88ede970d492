//! Order relationship registry (OCO linkage)
//!
//! Each relationship is stored under both order ids so lookup is O(1) from
//! either side; the two entries share one `Arc`, so deactivation is seen
//! from both and removal drops both together. The map is lock-free
//! (per-key entries), independent of any book lock.

use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;
use types::errors::ValidationError;
use types::ids::TradableId;
use types::tradable::LinkType;

/// A link between two orders
#[derive(Debug)]
pub struct OrderRelationship {
    pub primary_id: TradableId,
    pub linked_id: TradableId,
    pub link_type: LinkType,
    active: AtomicBool,
    pub created_ts: i64,
}

impl OrderRelationship {
    fn new(primary_id: TradableId, linked_id: TradableId, link_type: LinkType, created_ts: i64) -> Self {
        Self {
            primary_id,
            linked_id,
            link_type,
            active: AtomicBool::new(true),
            created_ts,
        }
    }

    /// Check whether the given order participates in this relationship
    pub fn involves(&self, id: TradableId) -> bool {
        self.primary_id == id || self.linked_id == id
    }

    /// The other order of the pair, if `id` participates
    pub fn counterpart_of(&self, id: TradableId) -> Option<TradableId> {
        if self.primary_id == id {
            Some(self.linked_id)
        } else if self.linked_id == id {
            Some(self.primary_id)
        } else {
            None
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }
}

/// Registry statistics for dashboards
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryStats {
    pub total: usize,
    pub active: usize,
}

/// Lock-free registry of order relationships
#[derive(Debug, Default)]
pub struct OrderRelationshipRegistry {
    entries: DashMap<TradableId, Arc<OrderRelationship>>,
}

impl OrderRelationshipRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a relationship between two orders
    pub fn link(
        &self,
        primary_id: TradableId,
        linked_id: TradableId,
        link_type: LinkType,
        created_ts: i64,
    ) -> Result<(), ValidationError> {
        if primary_id == linked_id {
            return Err(ValidationError::InvalidInput(
                "cannot link an order to itself".to_string(),
            ));
        }
        let relationship = Arc::new(OrderRelationship::new(
            primary_id, linked_id, link_type, created_ts,
        ));
        self.entries.insert(primary_id, Arc::clone(&relationship));
        self.entries.insert(linked_id, relationship);
        debug!(%primary_id, %linked_id, ?link_type, "orders linked");
        Ok(())
    }

    /// Relationship a given order participates in, if any
    pub fn relationship_of(&self, id: TradableId) -> Option<Arc<OrderRelationship>> {
        self.entries.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// The other order of the pair, if `id` is linked
    pub fn counterpart_of(&self, id: TradableId) -> Option<TradableId> {
        self.relationship_of(id)
            .and_then(|rel| rel.counterpart_of(id))
    }

    /// Mark the relationship inactive without removing it
    pub fn deactivate(&self, id: TradableId) {
        if let Some(rel) = self.relationship_of(id) {
            rel.deactivate();
            debug!(%id, "relationship deactivated");
        }
    }

    /// Remove the relationship under both ids
    pub fn remove(&self, id: TradableId) {
        if let Some((_, rel)) = self.entries.remove(&id) {
            if let Some(counterpart) = rel.counterpart_of(id) {
                self.entries.remove(&counterpart);
            }
            debug!(%id, "relationship removed");
        }
    }

    /// Check whether the order has an active relationship
    pub fn has_active(&self, id: TradableId) -> bool {
        self.relationship_of(id)
            .map(|rel| rel.is_active())
            .unwrap_or(false)
    }

    /// Current relationship counts (each pair stored twice)
    pub fn stats(&self) -> RegistryStats {
        let total = self.entries.len() / 2;
        let active = self
            .entries
            .iter()
            .filter(|entry| entry.value().is_active())
            .count()
            / 2;
        RegistryStats { total, active }
    }

    /// Drop every relationship
    pub fn clear(&self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_and_lookup_from_both_sides() {
        let registry = OrderRelationshipRegistry::new();
        let a = TradableId::new();
        let b = TradableId::new();
        registry.link(a, b, LinkType::OCO, 100).unwrap();

        assert_eq!(registry.counterpart_of(a), Some(b));
        assert_eq!(registry.counterpart_of(b), Some(a));
        assert!(registry.has_active(a));
        assert!(registry.has_active(b));
    }

    #[test]
    fn test_self_link_rejected() {
        let registry = OrderRelationshipRegistry::new();
        let a = TradableId::new();
        assert!(registry.link(a, a, LinkType::OCO, 0).is_err());
    }

    #[test]
    fn test_deactivate_seen_from_both_sides() {
        let registry = OrderRelationshipRegistry::new();
        let a = TradableId::new();
        let b = TradableId::new();
        registry.link(a, b, LinkType::OCO, 0).unwrap();

        registry.deactivate(b);
        assert!(!registry.has_active(a));
        assert!(!registry.has_active(b));
        // Deactivated but not removed
        assert!(registry.relationship_of(a).is_some());
    }

    #[test]
    fn test_remove_drops_both_entries() {
        let registry = OrderRelationshipRegistry::new();
        let a = TradableId::new();
        let b = TradableId::new();
        registry.link(a, b, LinkType::OCO, 0).unwrap();

        registry.remove(a);
        assert!(registry.relationship_of(a).is_none());
        assert!(registry.relationship_of(b).is_none());
        assert!(!registry.has_active(b));
    }

    #[test]
    fn test_stats_count_pairs_once() {
        let registry = OrderRelationshipRegistry::new();
        let a = TradableId::new();
        let b = TradableId::new();
        let c = TradableId::new();
        let d = TradableId::new();
        registry.link(a, b, LinkType::OCO, 0).unwrap();
        registry.link(c, d, LinkType::OSO, 0).unwrap();

        assert_eq!(registry.stats(), RegistryStats { total: 2, active: 2 });

        registry.deactivate(a);
        assert_eq!(registry.stats(), RegistryStats { total: 2, active: 1 });
    }

    #[test]
    fn test_unknown_id_has_no_relationship() {
        let registry = OrderRelationshipRegistry::new();
        assert!(registry.counterpart_of(TradableId::new()).is_none());
        assert!(!registry.has_active(TradableId::new()));
    }
}
