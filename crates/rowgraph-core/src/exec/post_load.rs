use crate::context::{CollectionKey, EntityKey, PersistenceContext};
use std::collections::{BTreeMap, HashSet};

///
/// PendingLoad
///
/// Entity left as a proxy that an eager select must load after the result
/// set is processed.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PendingLoad {
    pub key: EntityKey,
    pub batched: bool,
}

///
/// PendingCollectionLoad
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PendingCollectionLoad {
    pub key: CollectionKey,
    pub batched: bool,
}

///
/// PostLoadActions
///
/// Loads the row driver could not perform from the current result set,
/// de-duplicated in first-seen order. Executing them is the caller's job.
///

#[derive(Clone, Debug)]
pub struct PostLoadActions {
    entities: Vec<PendingLoad>,
    collections: Vec<PendingCollectionLoad>,
    seen_entities: HashSet<EntityKey>,
    seen_collections: HashSet<CollectionKey>,
    batch_size: usize,
}

impl PostLoadActions {
    #[must_use]
    pub fn new(batch_size: u32) -> Self {
        Self {
            entities: Vec::new(),
            collections: Vec::new(),
            seen_entities: HashSet::new(),
            seen_collections: HashSet::new(),
            batch_size: usize::try_from(batch_size).unwrap_or(usize::MAX).max(1),
        }
    }

    pub fn add_entity(&mut self, key: EntityKey, batched: bool) {
        if self.seen_entities.insert(key.clone()) {
            self.entities.push(PendingLoad { key, batched });
        }
    }

    pub fn add_collection(&mut self, key: CollectionKey, batched: bool) {
        if self.seen_collections.insert(key.clone()) {
            self.collections.push(PendingCollectionLoad { key, batched });
        }
    }

    #[must_use]
    pub fn entities(&self) -> &[PendingLoad] {
        &self.entities
    }

    #[must_use]
    pub fn collections(&self) -> &[PendingCollectionLoad] {
        &self.collections
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.collections.is_empty()
    }

    /// Entity keys grouped per entity name; batched loads are chunked by
    /// the batch size, the others are loaded one key at a time.
    #[must_use]
    pub fn entity_batches(&self) -> Vec<Vec<EntityKey>> {
        let mut by_entity: BTreeMap<(&str, bool), Vec<EntityKey>> = BTreeMap::new();
        for load in &self.entities {
            by_entity
                .entry((load.key.entity.as_str(), load.batched))
                .or_default()
                .push(load.key.clone());
        }

        self.chunk(by_entity)
    }

    /// Collection keys grouped per role, chunked like `entity_batches`.
    #[must_use]
    pub fn collection_batches(&self) -> Vec<Vec<CollectionKey>> {
        let mut by_role: BTreeMap<(&str, bool), Vec<CollectionKey>> = BTreeMap::new();
        for load in &self.collections {
            by_role
                .entry((load.key.role.as_str(), load.batched))
                .or_default()
                .push(load.key.clone());
        }

        self.chunk(by_role)
    }

    /// Drop loads that became unnecessary: entities hydrated later in the
    /// same result set and collections already initialized.
    pub fn prune(&mut self, pc: &PersistenceContext) {
        self.entities.retain(|load| {
            pc.find(&load.key)
                .and_then(|id| pc.entity(id))
                .is_none_or(|entity| entity.is_proxy())
        });
        self.collections.retain(|load| {
            pc.find_collection(&load.key)
                .and_then(|id| pc.collection(id))
                .is_none_or(|collection| !collection.initialized)
        });
    }

    fn chunk<K: Clone>(&self, groups: BTreeMap<(&str, bool), Vec<K>>) -> Vec<Vec<K>> {
        let mut batches = Vec::new();
        for ((_, batched), keys) in groups {
            let size = if batched { self.batch_size } else { 1 };
            batches.extend(keys.chunks(size).map(<[K]>::to_vec));
        }

        batches
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_are_deduplicated_in_first_seen_order() {
        let mut actions = PostLoadActions::new(10);
        actions.add_entity(EntityKey::new("Country", "DE"), false);
        actions.add_entity(EntityKey::new("Country", "FR"), false);
        actions.add_entity(EntityKey::new("Country", "DE"), false);
        actions.add_collection(CollectionKey::new("Customer.orders", 1), true);
        actions.add_collection(CollectionKey::new("Customer.orders", 1), true);

        let keys: Vec<_> = actions.entities().iter().map(|l| l.key.to_string()).collect();
        assert_eq!(keys, ["Country['DE']", "Country['FR']"]);
        assert_eq!(actions.collections().len(), 1);
        assert!(!actions.is_empty());
    }

    #[test]
    fn batched_loads_are_chunked_by_batch_size() {
        let mut actions = PostLoadActions::new(2);
        for id in 1..=5 {
            actions.add_entity(EntityKey::new("User", id), true);
        }
        actions.add_entity(EntityKey::new("Country", "DE"), false);
        actions.add_entity(EntityKey::new("Country", "FR"), false);

        let sizes: Vec<_> = actions.entity_batches().iter().map(Vec::len).collect();
        // Country (unbatched) sorts before User (batched)
        assert_eq!(sizes, [1, 1, 2, 2, 1]);
    }

    #[test]
    fn zero_batch_size_loads_one_key_at_a_time() {
        let mut actions = PostLoadActions::new(0);
        actions.add_collection(CollectionKey::new("Customer.orders", 1), true);
        actions.add_collection(CollectionKey::new("Customer.orders", 2), true);

        assert_eq!(actions.collection_batches().len(), 2);
    }
}
