use std::collections::HashMap;

use tap_core::{keys, TapConfigSnapshot};
use uuid::Uuid;

use crate::entity::{EntityId, EntityKind};

/// How new entity ids are minted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdStrategy {
    /// Random v4 UUIDs.
    #[default]
    Uuid,
    /// `customer-1`, `customer-2`, ... counted per kind.
    Sequential,
}

impl IdStrategy {
    /// Reads `ids.strategy`; unknown values fall back to UUIDs.
    pub fn from_config(config: &TapConfigSnapshot) -> Self {
        match config.get(keys::IDS_STRATEGY) {
            Some(v) if v.eq_ignore_ascii_case("sequential") => IdStrategy::Sequential,
            _ => IdStrategy::Uuid,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct IdAllocator {
    strategy: IdStrategy,
    counters: HashMap<EntityKind, u64>,
}

impl IdAllocator {
    pub fn new(strategy: IdStrategy) -> Self {
        Self {
            strategy,
            counters: HashMap::new(),
        }
    }

    /// Mint an id for `kind` that `taken` does not already know.
    pub fn allocate(&mut self, kind: EntityKind, taken: impl Fn(&str) -> bool) -> EntityId {
        loop {
            let id = match self.strategy {
                IdStrategy::Uuid => Uuid::new_v4().to_string(),
                IdStrategy::Sequential => {
                    let counter = self.counters.entry(kind).or_insert(0);
                    *counter += 1;
                    format!("{}-{}", kind.singular(), counter)
                }
            };
            if !taken(&id) {
                return id;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use tap_core::TapConfig;

    use super::*;

    #[test]
    fn sequential_ids_skip_taken_values() {
        let mut ids = IdAllocator::new(IdStrategy::Sequential);
        assert_eq!(ids.allocate(EntityKind::Customer, |_| false), "customer-1");
        assert_eq!(ids.allocate(EntityKind::Customer, |id| id == "customer-2"), "customer-3");
        assert_eq!(ids.allocate(EntityKind::AccessToken, |_| false), "token-1");
    }

    #[test]
    fn uuid_ids_are_distinct() {
        let mut ids = IdAllocator::default();
        let a = ids.allocate(EntityKind::User, |_| false);
        let b = ids.allocate(EntityKind::User, |_| false);
        assert_ne!(a, b);
        assert!(Uuid::parse_str(&a).is_ok());
    }

    #[test]
    fn strategy_comes_from_config() {
        let config = TapConfig::new().with(keys::IDS_STRATEGY, "Sequential");
        assert_eq!(IdStrategy::from_config(&config.snapshot()), IdStrategy::Sequential);
        assert_eq!(IdStrategy::from_config(&TapConfig::new().snapshot()), IdStrategy::Uuid);
    }
}
