use crate::{
    context::{EntityKey, FieldValue},
    error::{InternalError, RowError},
    exec::{
        InitializerData, InitializerId, InitializerState,
        initializer::{Initializer, RowProcessingState, link_target},
    },
    model::{EntityModel, FetchTiming},
    path::NavigablePath,
    value::IdValue,
};
use std::sync::Arc;

///
/// AnyInitializer
///
/// Polymorphic to-one. The discriminator column picks the target entity and
/// the key column its identifier; the target is never joined.
///

#[derive(Clone, Debug)]
pub(crate) struct AnyInitializer {
    pub(crate) id: InitializerId,
    pub(crate) parent: Option<InitializerId>,
    pub(crate) path: NavigablePath,
    pub(crate) discriminator: usize,
    pub(crate) key: usize,
    pub(crate) key_column: String,
    pub(crate) targets: Vec<(String, Arc<EntityModel>)>,
    pub(crate) timing: FetchTiming,
}

impl AnyInitializer {
    // Target named by the discriminator; `None` when the column is NULL.
    fn target(&self, rs: &RowProcessingState<'_>) -> Result<Option<&Arc<EntityModel>>, RowError> {
        let value = rs.column(self.discriminator);
        if value.is_null() {
            return Ok(None);
        }

        let label = value.as_text().map_or_else(|| value.to_string(), str::to_string);
        self.targets
            .iter()
            .find(|(discriminator, _)| *discriminator == label)
            .map(|(_, entity)| Some(entity))
            .ok_or_else(|| RowError::UnknownDiscriminator {
                path: self.path.full_path(),
                value: label,
            })
    }
}

impl Initializer for AnyInitializer {
    fn id(&self) -> InitializerId {
        self.id
    }

    fn parent(&self) -> Option<InitializerId> {
        self.parent
    }

    fn navigable_path(&self) -> &NavigablePath {
        &self.path
    }

    fn field_value(&self, data: &InitializerData) -> FieldValue {
        FieldValue::Entity(data.instance)
    }

    fn resolve_key(&self, rs: &mut RowProcessingState<'_>) -> Result<(), InternalError> {
        let target = self.target(rs)?;
        let key = IdValue::from_columns(
            &self.path.full_path(),
            std::slice::from_ref(&self.key_column),
            &[rs.column(self.key)],
        )?;

        let data = rs.data_mut(self.id);
        data.counters.resolve_key += 1;

        match (target, key) {
            (Some(_), Some(key)) => {
                data.key = Some(key);
                data.advance(InitializerState::KeyResolved)
            }
            _ => data.advance(InitializerState::Missing),
        }
    }

    fn resolve_instance(&self, rs: &mut RowProcessingState<'_>) -> Result<(), InternalError> {
        let target = self.target(rs)?.cloned().ok_or_else(|| {
            InternalError::initializer_invariant(format!(
                "'{}' resolved without a discriminator",
                self.path
            ))
        })?;
        let key = EntityKey {
            entity: target.name.clone(),
            id: rs.resolved_key(self.id, &self.path)?,
        };
        let pending = (self.timing == FetchTiming::Immediate).then_some(false);

        link_target(rs, self.id, key, &target, pending)
    }
}
