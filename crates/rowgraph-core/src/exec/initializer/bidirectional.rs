use crate::{
    context::{EntityKey, FieldValue},
    error::InternalError,
    exec::{
        InitializerData, InitializerId, InitializerState,
        initializer::{Initializer, RowProcessingState, link_target, resolve_foreign_key},
    },
    model::{EntityModel, FetchTiming},
    path::NavigablePath,
};
use std::sync::Arc;

///
/// BiDirectionalInitializer
///
/// Runtime side of a circular fetch. When the foreign key names the entity
/// the canonical (referenced) initializer already resolved on this row, the
/// same instance is reused; otherwise the target is linked by key.
///

#[derive(Clone, Debug)]
pub(crate) struct BiDirectionalInitializer {
    pub(crate) id: InitializerId,
    pub(crate) parent: Option<InitializerId>,
    pub(crate) path: NavigablePath,
    pub(crate) target: Arc<EntityModel>,
    pub(crate) foreign_key: Vec<usize>,
    pub(crate) foreign_key_columns: Vec<String>,
    pub(crate) timing: FetchTiming,
    pub(crate) referenced: InitializerId,
}

impl Initializer for BiDirectionalInitializer {
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
        resolve_foreign_key(
            rs,
            self.id,
            &self.path,
            &self.foreign_key_columns,
            &self.foreign_key,
        )
    }

    fn resolve_instance(&self, rs: &mut RowProcessingState<'_>) -> Result<(), InternalError> {
        let key = rs.resolved_key(self.id, &self.path)?;

        let canonical = rs.data(self.referenced);
        let shared = canonical
            .instance
            .filter(|_| canonical.key.as_ref() == Some(&key));

        if let Some(instance) = shared {
            let data = rs.data_mut(self.id);
            data.instance = Some(instance);
            data.counters.copied_from_canonical += 1;

            return data.advance(InitializerState::Initialized);
        }

        let key = EntityKey {
            entity: self.target.name.clone(),
            id: key,
        };
        let pending = (self.timing == FetchTiming::Immediate).then_some(false);

        link_target(rs, self.id, key, &self.target, pending)
    }
}
