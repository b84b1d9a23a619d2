use crate::model::{
    attribute::{AttributeKind, AttributeModel, EmbeddableModel, FetchOptions},
    entity::EntityModel,
};
use serde::Serialize;
use std::fmt;

///
/// Fetchable
///
/// Capability of a mapping-model part that can be selected or fetched.
///

pub trait Fetchable {
    fn fetchable_name(&self) -> &str;

    /// Fetch strategy declared by the mapping.
    fn mapped_fetch_options(&self) -> FetchOptions;

    /// Associations count toward the maximum fetch depth; values do not.
    fn increments_fetch_depth(&self) -> bool;

    /// Physical foreign key backing this part, if it is an association.
    /// `owner_table` is the table of the entity that declares the part.
    fn association_key(&self, owner_table: &str) -> Option<AssociationKey>;
}

///
/// FetchableContainer
///
/// A mapping-model type that owns an ordered list of fetchable parts.
///

pub trait FetchableContainer {
    fn container_name(&self) -> &str;

    fn fetchables(&self) -> &[AttributeModel];

    fn find_fetchable(&self, name: &str) -> Option<&AttributeModel> {
        self.fetchables().iter().find(|f| f.fetchable_name() == name)
    }

    fn fetchable_count(&self) -> usize {
        self.fetchables().len()
    }
}

impl Fetchable for AttributeModel {
    fn fetchable_name(&self) -> &str {
        &self.name
    }

    fn mapped_fetch_options(&self) -> FetchOptions {
        self.fetch
    }

    fn increments_fetch_depth(&self) -> bool {
        self.is_association()
    }

    fn association_key(&self, owner_table: &str) -> Option<AssociationKey> {
        match &self.kind {
            AttributeKind::ToOne(to_one) => Some(AssociationKey {
                table: owner_table.to_string(),
                columns: to_one.foreign_key.clone(),
            }),
            AttributeKind::Collection(collection) => Some(AssociationKey {
                table: collection.table.clone(),
                columns: collection.key_columns.clone(),
            }),
            AttributeKind::Any(any) => Some(AssociationKey {
                table: owner_table.to_string(),
                columns: vec![any.discriminator_column.clone(), any.key_column.clone()],
            }),
            AttributeKind::Basic { .. } | AttributeKind::Embedded(_) => None,
        }
    }
}

impl FetchableContainer for EntityModel {
    fn container_name(&self) -> &str {
        &self.name
    }

    fn fetchables(&self) -> &[AttributeModel] {
        &self.attributes
    }
}

impl FetchableContainer for EmbeddableModel {
    fn container_name(&self) -> &str {
        &self.name
    }

    fn fetchables(&self) -> &[AttributeModel] {
        &self.attributes
    }
}

///
/// AssociationKey
///
/// Identity of one physical foreign key. Both sides of a bidirectional
/// mapping produce equal keys: the to-one side names its own table and FK
/// columns, the collection side names the element table and key columns.
///

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct AssociationKey {
    pub table: String,
    pub columns: Vec<String>,
}

impl fmt::Display for AssociationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.table, self.columns.join(", "))
    }
}
