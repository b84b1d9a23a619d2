//! Runtime mapping model.
//!
//! Types in `model` are the static, read-only description of what columns
//! and associations exist. Plan construction walks them through the
//! `Fetchable` / `FetchableContainer` capabilities; nothing here changes
//! once a `MappingModel` has been built.
//!
//! In general:
//! - metadata discovery decides *what exists*
//! - `model` records *what can be fetched*

pub mod attribute;
pub mod entity;
pub mod fetchable;
pub mod profile;

#[cfg(test)]
mod tests;

use crate::error::PlanError;
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};
use thiserror::Error as ThisError;

// re-exports
pub use attribute::{
    AnyModel, AttributeKind, AttributeModel, CollectionElement, CollectionModel,
    CollectionSemantics, EmbeddableModel, FetchOptions, FetchStyle, FetchTiming, NotFoundAction,
    ToOneModel,
};
pub use entity::{EntityModel, IdentifierModel, VersionModel};
pub use fetchable::{AssociationKey, Fetchable, FetchableContainer};
pub use profile::{FetchProfile, ProfileFetch};

///
/// ModelError
///
/// Mapping inconsistencies detected while building a `MappingModel`.
///

#[derive(Debug, ThisError)]
pub enum ModelError {
    #[error("entity '{entity}' is declared more than once")]
    DuplicateEntity { entity: String },

    #[error("'{container}' declares attribute '{attribute}' more than once")]
    DuplicateAttribute { container: String, attribute: String },

    #[error("entity '{entity}' declares no identifier columns")]
    EmptyIdentifier { entity: String },

    #[error("'{container}.{attribute}' targets unknown entity '{target}'")]
    UnknownTarget {
        container: String,
        attribute: String,
        target: String,
    },

    #[error(
        "'{container}.{attribute}' has {found} key column(s) but '{target}' is identified by {expected}"
    )]
    KeyArity {
        container: String,
        attribute: String,
        target: String,
        expected: usize,
        found: usize,
    },

    #[error("fetch profile '{profile}' names unknown role '{entity}.{attribute}'")]
    UnknownProfileRole {
        profile: String,
        entity: String,
        attribute: String,
    },

    #[error("fetch profile '{profile}' is declared more than once")]
    DuplicateProfile { profile: String },
}

///
/// MappingModel
///
/// Registry of entity mappings and fetch profiles.
///

#[derive(Debug, Default)]
pub struct MappingModel {
    entities: BTreeMap<String, Arc<EntityModel>>,
    profiles: BTreeMap<String, FetchProfile>,
}

impl MappingModel {
    #[must_use]
    pub fn builder() -> MappingModelBuilder {
        MappingModelBuilder::default()
    }

    #[must_use]
    pub fn entity(&self, name: &str) -> Option<&Arc<EntityModel>> {
        self.entities.get(name)
    }

    /// Look up an entity, failing plan construction when it is unmapped.
    pub fn require_entity(&self, name: &str) -> Result<&Arc<EntityModel>, PlanError> {
        self.entity(name).ok_or_else(|| PlanError::UnknownEntity {
            entity: name.to_string(),
        })
    }

    #[must_use]
    pub fn profile(&self, name: &str) -> Option<&FetchProfile> {
        self.profiles.get(name)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Arc<EntityModel>> {
        self.entities.values()
    }
}

///
/// MappingModelBuilder
///

#[derive(Debug, Default)]
pub struct MappingModelBuilder {
    entities: Vec<EntityModel>,
    profiles: Vec<FetchProfile>,
}

impl MappingModelBuilder {
    #[must_use]
    pub fn entity(mut self, entity: EntityModel) -> Self {
        self.entities.push(entity);
        self
    }

    #[must_use]
    pub fn profile(mut self, profile: FetchProfile) -> Self {
        self.profiles.push(profile);
        self
    }

    /// Validate cross-entity references and freeze the model.
    pub fn build(self) -> Result<MappingModel, ModelError> {
        let mut entities = BTreeMap::new();
        for entity in self.entities {
            if entity.identifier.columns.is_empty() {
                return Err(ModelError::EmptyIdentifier {
                    entity: entity.name,
                });
            }
            if entities.contains_key(&entity.name) {
                return Err(ModelError::DuplicateEntity {
                    entity: entity.name,
                });
            }
            entities.insert(entity.name.clone(), Arc::new(entity));
        }

        for entity in entities.values() {
            validate_container(&entities, entity, &entity.name, &entity.attributes)?;
        }

        let mut profiles = BTreeMap::new();
        for profile in self.profiles {
            for fetch in &profile.fetches {
                let known = entities
                    .get(&fetch.entity)
                    .is_some_and(|e| e.slot_of(&fetch.attribute).is_some());
                if !known {
                    return Err(ModelError::UnknownProfileRole {
                        profile: profile.name.clone(),
                        entity: fetch.entity.clone(),
                        attribute: fetch.attribute.clone(),
                    });
                }
            }
            if profiles.contains_key(&profile.name) {
                return Err(ModelError::DuplicateProfile {
                    profile: profile.name,
                });
            }
            profiles.insert(profile.name.clone(), profile);
        }

        Ok(MappingModel { entities, profiles })
    }
}

// Validate one attribute list; embeddables recurse with the same owner.
fn validate_container(
    entities: &BTreeMap<String, Arc<EntityModel>>,
    owner: &EntityModel,
    container: &str,
    attributes: &[AttributeModel],
) -> Result<(), ModelError> {
    let mut seen = BTreeSet::new();

    for attribute in attributes {
        if !seen.insert(attribute.name.as_str()) {
            return Err(ModelError::DuplicateAttribute {
                container: container.to_string(),
                attribute: attribute.name.clone(),
            });
        }

        match &attribute.kind {
            AttributeKind::Basic { .. } => {}
            AttributeKind::Embedded(embeddable) => {
                validate_container(entities, owner, &embeddable.name, &embeddable.attributes)?;
            }
            AttributeKind::ToOne(to_one) => {
                let target = require_target(entities, container, attribute, &to_one.target)?;
                check_arity(
                    container,
                    attribute,
                    target,
                    target.identifier.columns.len(),
                    to_one.foreign_key.len(),
                )?;
            }
            AttributeKind::Collection(collection) => {
                check_arity(
                    container,
                    attribute,
                    owner,
                    owner.identifier.columns.len(),
                    collection.key_columns.len(),
                )?;
                match &collection.element {
                    CollectionElement::Entity { target } => {
                        require_target(entities, container, attribute, target)?;
                    }
                    CollectionElement::Embeddable(embeddable) => {
                        validate_container(
                            entities,
                            owner,
                            &embeddable.name,
                            &embeddable.attributes,
                        )?;
                    }
                    CollectionElement::Basic { .. } => {}
                }
            }
            AttributeKind::Any(any) => {
                for (_, target) in &any.targets {
                    let target = require_target(entities, container, attribute, target)?;
                    check_arity(
                        container,
                        attribute,
                        target,
                        target.identifier.columns.len(),
                        1,
                    )?;
                }
            }
        }
    }

    Ok(())
}

fn require_target<'a>(
    entities: &'a BTreeMap<String, Arc<EntityModel>>,
    container: &str,
    attribute: &AttributeModel,
    target: &str,
) -> Result<&'a EntityModel, ModelError> {
    entities
        .get(target)
        .map(AsRef::as_ref)
        .ok_or_else(|| ModelError::UnknownTarget {
            container: container.to_string(),
            attribute: attribute.name.clone(),
            target: target.to_string(),
        })
}

fn check_arity(
    container: &str,
    attribute: &AttributeModel,
    target: &EntityModel,
    expected: usize,
    found: usize,
) -> Result<(), ModelError> {
    if expected == found {
        return Ok(());
    }

    Err(ModelError::KeyArity {
        container: container.to_string(),
        attribute: attribute.name.clone(),
        target: target.name.clone(),
        expected,
        found,
    })
}
