use crate::{
    context::{EntityKey, FieldValue, LoadingClaim},
    model::EntityModel,
    value::Value,
};
use std::sync::Arc;

///
/// EntityStatus
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EntityStatus {
    /// Identity known, state not loaded.
    Proxy,
    /// Claimed by an execution that is hydrating it.
    Loading,
    Managed,
}

///
/// ManagedEntity
///
/// Canonical object for one entity key. `state` holds one field per mapped
/// attribute, in attribute order, once hydrated; proxies carry none.
///

#[derive(Clone, Debug)]
pub struct ManagedEntity {
    pub key: EntityKey,
    pub model: Arc<EntityModel>,
    pub status: EntityStatus,
    pub state: Vec<FieldValue>,
    pub version: Option<Value>,
    pub(crate) claim: Option<LoadingClaim>,
    pub(crate) hydrated: bool,
}

impl ManagedEntity {
    pub(crate) const fn new(key: EntityKey, model: Arc<EntityModel>, status: EntityStatus) -> Self {
        Self {
            key,
            model,
            status,
            state: Vec::new(),
            version: None,
            claim: None,
            hydrated: false,
        }
    }

    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&FieldValue> {
        self.model
            .slot_of(name)
            .and_then(|slot| self.state.get(slot))
    }

    #[must_use]
    pub fn is_proxy(&self) -> bool {
        self.status == EntityStatus::Proxy
    }
}

///
/// EntityClaim
///
/// Outcome of an initializer asking to hydrate an entity key.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EntityClaim {
    /// New instance; the caller hydrates it.
    Created,
    /// Existing proxy; the caller hydrates it.
    ClaimedProxy,
    /// Already claimed by the same initializer of the same execution.
    Owned { hydrated: bool },
    /// Being hydrated by another initializer or execution.
    LoadingByOther,
    /// Already fully loaded.
    Managed,
}

impl EntityClaim {
    /// True when the caller must hydrate the instance on this row.
    #[must_use]
    pub const fn must_hydrate(self) -> bool {
        matches!(
            self,
            Self::Created | Self::ClaimedProxy | Self::Owned { hydrated: false }
        )
    }
}
