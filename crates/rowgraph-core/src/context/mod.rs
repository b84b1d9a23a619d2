//! Module: context
//! Responsibility: the unit-of-work identity map that owns every
//! materialized entity and collection, addressed by arena handles.
//! Does not own: row reading or hydration order (exec).
//! Boundary: initializers claim, hydrate and link objects only through
//! this API; callers read the finished graph through it.

mod collection;
mod entity;
mod field;
mod key;


use crate::{
    error::InternalError,
    model::{CollectionSemantics, EntityModel},
    value::Value,
};
use std::{collections::HashMap, sync::Arc};

// re-exports
pub use collection::{CollectionClaim, ElementAdd, PersistentCollection};
pub use entity::{EntityClaim, EntityStatus, ManagedEntity};
pub use field::{EmbeddedValue, FieldValue};
pub use key::{CollectionId, CollectionKey, EntityKey, ExecutionId, InstanceId, LoadingClaim};

///
/// PersistenceContext
///
/// Single-threaded identity map: one `InstanceId` per `EntityKey` and one
/// `CollectionId` per `CollectionKey` for the lifetime of the context.
///

#[derive(Debug, Default)]
pub struct PersistenceContext {
    entities: Vec<ManagedEntity>,
    entity_index: HashMap<EntityKey, InstanceId>,
    collections: Vec<PersistentCollection>,
    collection_index: HashMap<CollectionKey, CollectionId>,
    next_execution: u64,
}

impl PersistenceContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new execution; claims made under it are settled by
    /// `finish_loading`.
    pub fn begin_execution(&mut self) -> ExecutionId {
        self.next_execution += 1;

        ExecutionId(self.next_execution)
    }

    // ─────────────────────────────────────────────
    // ENTITIES
    // ─────────────────────────────────────────────

    #[must_use]
    pub fn find(&self, key: &EntityKey) -> Option<InstanceId> {
        self.entity_index.get(key).copied()
    }

    #[must_use]
    pub fn entity(&self, id: InstanceId) -> Option<&ManagedEntity> {
        self.entities.get(id.0)
    }

    /// Attribute of a managed entity by name.
    #[must_use]
    pub fn attribute(&self, id: InstanceId, name: &str) -> Option<&FieldValue> {
        self.entity(id).and_then(|entity| entity.attribute(name))
    }

    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Existing instance for `key`, or a new proxy.
    ///
    /// Returns whether a proxy was created.
    pub fn proxy_for(&mut self, key: EntityKey, model: &Arc<EntityModel>) -> (InstanceId, bool) {
        if let Some(id) = self.find(&key) {
            return (id, false);
        }

        let id = self.insert_entity(ManagedEntity::new(
            key,
            Arc::clone(model),
            EntityStatus::Proxy,
        ));

        (id, true)
    }

    /// Ask to hydrate the entity for `key` under `claim`.
    pub fn claim_entity(
        &mut self,
        key: EntityKey,
        model: &Arc<EntityModel>,
        claim: LoadingClaim,
    ) -> (InstanceId, EntityClaim) {
        let Some(id) = self.find(&key) else {
            let mut entity = ManagedEntity::new(key, Arc::clone(model), EntityStatus::Loading);
            entity.claim = Some(claim);

            return (self.insert_entity(entity), EntityClaim::Created);
        };

        let entity = &mut self.entities[id.0];
        let outcome = match entity.status {
            EntityStatus::Managed => EntityClaim::Managed,
            EntityStatus::Proxy => {
                entity.status = EntityStatus::Loading;
                entity.claim = Some(claim);
                EntityClaim::ClaimedProxy
            }
            EntityStatus::Loading if entity.claim == Some(claim) => EntityClaim::Owned {
                hydrated: entity.hydrated,
            },
            EntityStatus::Loading => EntityClaim::LoadingByOther,
        };

        (id, outcome)
    }

    /// Write the state of a claimed entity.
    pub fn hydrate(
        &mut self,
        id: InstanceId,
        state: Vec<FieldValue>,
        version: Option<Value>,
    ) -> Result<(), InternalError> {
        let entity = self
            .entities
            .get_mut(id.0)
            .ok_or_else(|| InternalError::context_not_found(format!("no instance {id}")))?;

        if entity.status != EntityStatus::Loading {
            return Err(InternalError::context_invariant(format!(
                "instance {id} ({}) hydrated without a loading claim",
                entity.key
            )));
        }
        if state.len() != entity.model.attributes.len() {
            return Err(InternalError::context_invariant(format!(
                "instance {id} ({}) hydrated with {} field(s), model declares {}",
                entity.key,
                state.len(),
                entity.model.attributes.len()
            )));
        }

        entity.state = state;
        entity.version = version;
        entity.hydrated = true;

        Ok(())
    }

    /// Embedded value reached from an entity's state by slot path.
    #[must_use]
    pub fn embedded_at(&self, id: InstanceId, slot_path: &[usize]) -> Option<&EmbeddedValue> {
        let (first, rest) = slot_path.split_first()?;
        let mut current = self.entity(id)?.state.get(*first)?.as_embedded()?;
        for slot in rest {
            current = current.field(*slot)?.as_embedded()?;
        }

        Some(current)
    }

    fn insert_entity(&mut self, entity: ManagedEntity) -> InstanceId {
        let id = InstanceId(self.entities.len());
        self.entity_index.insert(entity.key.clone(), id);
        self.entities.push(entity);

        id
    }

    // ─────────────────────────────────────────────
    // COLLECTIONS
    // ─────────────────────────────────────────────

    #[must_use]
    pub fn find_collection(&self, key: &CollectionKey) -> Option<CollectionId> {
        self.collection_index.get(key).copied()
    }

    #[must_use]
    pub fn collection(&self, id: CollectionId) -> Option<&PersistentCollection> {
        self.collections.get(id.0)
    }

    #[must_use]
    pub fn collection_count(&self) -> usize {
        self.collections.len()
    }

    /// Existing collection for `key`, or a new uninitialized one.
    pub fn lazy_collection(
        &mut self,
        key: CollectionKey,
        semantics: &CollectionSemantics,
    ) -> CollectionId {
        if let Some(id) = self.find_collection(&key) {
            return id;
        }

        self.insert_collection(PersistentCollection::new(key, semantics.clone()))
    }

    /// Ask to populate the collection for `key` under `claim`.
    pub fn claim_collection(
        &mut self,
        key: CollectionKey,
        semantics: &CollectionSemantics,
        claim: LoadingClaim,
    ) -> (CollectionId, CollectionClaim) {
        let id = self.lazy_collection(key, semantics);
        let collection = &mut self.collections[id.0];

        let outcome = if collection.initialized {
            CollectionClaim::Initialized
        } else {
            match collection.claim {
                None => {
                    collection.claim = Some(claim);
                    CollectionClaim::Claimed
                }
                Some(existing) if existing == claim => CollectionClaim::Owned,
                Some(_) => CollectionClaim::LoadingByOther,
            }
        };

        (id, outcome)
    }

    /// Add one element to a claimed collection.
    pub fn add_element(
        &mut self,
        id: CollectionId,
        element: FieldValue,
        index: Option<usize>,
    ) -> Result<ElementAdd, InternalError> {
        let collection = self
            .collections
            .get_mut(id.0)
            .ok_or_else(|| InternalError::context_not_found(format!("no collection {id}")))?;

        if collection.claim.is_none() {
            return Err(InternalError::context_invariant(format!(
                "collection {id} ({}) populated without a loading claim",
                collection.key
            )));
        }

        Ok(collection.add(element, index))
    }

    fn insert_collection(&mut self, collection: PersistentCollection) -> CollectionId {
        let id = CollectionId(self.collections.len());
        self.collection_index.insert(collection.key.clone(), id);
        self.collections.push(collection);

        id
    }

    // ─────────────────────────────────────────────
    // LOADING
    // ─────────────────────────────────────────────

    /// Settle every claim made under `execution`.
    ///
    /// Hydrated entities become managed; claimed but unhydrated ones fall
    /// back to proxies. Claimed collections are initialized only when the
    /// execution succeeded; otherwise their partial elements are dropped.
    pub fn finish_loading(&mut self, execution: ExecutionId, succeeded: bool) {
        for entity in &mut self.entities {
            if entity.claim.is_some_and(|c| c.execution == execution) {
                entity.status = if entity.hydrated {
                    EntityStatus::Managed
                } else {
                    EntityStatus::Proxy
                };
                entity.claim = None;
                entity.hydrated = false;
            }
        }

        for collection in &mut self.collections {
            if collection.claim.is_some_and(|c| c.execution == execution) {
                if succeeded {
                    collection.initialized = true;
                } else {
                    collection.clear();
                }
                collection.claim = None;
            }
        }
    }
}
