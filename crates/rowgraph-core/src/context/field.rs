use crate::{
    context::{CollectionId, InstanceId},
    value::Value,
};
use serde::Serialize;

///
/// FieldValue
///
/// Content of one attribute slot of managed state, an embedded value, or a
/// collection element.
///

#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize)]
pub enum FieldValue {
    /// Not yet loaded; the attribute was excluded from the fetch.
    Unfetched,
    Basic(Value),
    /// Association target; `None` when the association is absent.
    Entity(Option<InstanceId>),
    /// Embedded value; `None` when every part of it is absent.
    Embedded(Option<EmbeddedValue>),
    Collection(CollectionId),
}

impl FieldValue {
    #[must_use]
    pub const fn is_unfetched(&self) -> bool {
        matches!(self, Self::Unfetched)
    }

    #[must_use]
    pub const fn as_basic(&self) -> Option<&Value> {
        match self {
            Self::Basic(value) => Some(value),
            _ => None,
        }
    }

    /// Association target, flattening an absent association to `None`.
    #[must_use]
    pub const fn as_entity(&self) -> Option<InstanceId> {
        match self {
            Self::Entity(instance) => *instance,
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_embedded(&self) -> Option<&EmbeddedValue> {
        match self {
            Self::Embedded(Some(value)) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_collection(&self) -> Option<CollectionId> {
        match self {
            Self::Collection(id) => Some(*id),
            _ => None,
        }
    }
}

///
/// EmbeddedValue
///
/// Materialized embeddable: its name and one field per attribute, in
/// mapping order.
///

#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize)]
pub struct EmbeddedValue {
    pub name: String,
    pub fields: Vec<FieldValue>,
}

impl EmbeddedValue {
    #[must_use]
    pub fn field(&self, slot: usize) -> Option<&FieldValue> {
        self.fields.get(slot)
    }
}
