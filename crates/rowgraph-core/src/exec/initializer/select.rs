use crate::{
    context::{EntityKey, FieldValue},
    error::InternalError,
    exec::{
        InitializerData, InitializerId,
        initializer::{Initializer, RowProcessingState, link_target, resolve_foreign_key},
    },
    model::{EntityModel, FetchTiming},
    path::NavigablePath,
};
use std::sync::Arc;

///
/// EntitySelectInitializer
///
/// To-one whose target columns are not in the row. Only the foreign key is
/// read; the target is linked as the managed instance or a proxy.
///

#[derive(Clone, Debug)]
pub(crate) struct EntitySelectInitializer {
    pub(crate) id: InitializerId,
    pub(crate) parent: Option<InitializerId>,
    pub(crate) path: NavigablePath,
    pub(crate) target: Arc<EntityModel>,
    pub(crate) foreign_key: Vec<usize>,
    pub(crate) foreign_key_columns: Vec<String>,
    pub(crate) timing: FetchTiming,
    pub(crate) batched: bool,
}

impl Initializer for EntitySelectInitializer {
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
        let key = EntityKey {
            entity: self.target.name.clone(),
            id: rs.resolved_key(self.id, &self.path)?,
        };
        let pending = (self.timing == FetchTiming::Immediate).then_some(self.batched);

        link_target(rs, self.id, key, &self.target, pending)
    }
}
