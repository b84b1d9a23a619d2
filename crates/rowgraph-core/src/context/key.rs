use crate::value::IdValue;
use serde::Serialize;
use std::fmt;

///
/// InstanceId
///
/// Arena handle of a managed entity. Two handles are equal iff they name
/// the same object, so handle equality is reference identity.
///

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct InstanceId(pub(crate) usize);

impl InstanceId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

///
/// CollectionId
///

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct CollectionId(pub(crate) usize);

impl CollectionId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

///
/// ExecutionId
///
/// One result-set processing run against a context.
///

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ExecutionId(pub(crate) u64);

///
/// LoadingClaim
///
/// Which initializer slot of which execution is hydrating an entity or
/// populating a collection.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LoadingClaim {
    pub execution: ExecutionId,
    pub initializer: usize,
}

///
/// EntityKey
///
/// Logical row identity: entity name plus identifier value.
///

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct EntityKey {
    pub entity: String,
    pub id: IdValue,
}

impl EntityKey {
    #[must_use]
    pub fn new(entity: impl Into<String>, id: impl Into<IdValue>) -> Self {
        Self {
            entity: entity.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.entity, self.id)
    }
}

///
/// CollectionKey
///
/// Collection identity: role (`Entity.attribute`) plus owner identifier.
///

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct CollectionKey {
    pub role: String,
    pub owner: IdValue,
}

impl CollectionKey {
    #[must_use]
    pub fn new(role: impl Into<String>, owner: impl Into<IdValue>) -> Self {
        Self {
            role: role.into(),
            owner: owner.into(),
        }
    }
}

impl fmt::Display for CollectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.role, self.owner)
    }
}
