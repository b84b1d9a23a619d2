//! Initializer kinds and the row-scoped state they operate on.
//!
//! Every kind implements the same lifecycle. The row driver runs one step
//! for every initializer of the graph before starting the next step.

mod any;
mod bidirectional;
mod collection;
mod embeddable;
mod entity;
mod select;

use crate::{
    context::{EntityKey, ExecutionId, FieldValue, InstanceId, LoadingClaim, PersistenceContext},
    error::{InternalError, RowError},
    exec::{
        ExecutionStats, InitializerData, InitializerGraph, InitializerId, InitializerState,
        PostLoadActions,
    },
    model::EntityModel,
    path::NavigablePath,
    value::{IdValue, Value},
};
use std::sync::Arc;

pub(crate) use any::AnyInitializer;
pub(crate) use bidirectional::BiDirectionalInitializer;
pub(crate) use collection::{CollectionInitializer, CollectionInitializerKind, ElementAssembly};
pub(crate) use embeddable::EmbeddableInitializer;
pub(crate) use entity::{EntityInitializer, EntityInitializerKind};
pub(crate) use select::EntitySelectInitializer;

///
/// RowProcessingState
///
/// Everything one lifecycle step may touch for the current row: the raw
/// row, the data table of the whole graph, and the persistence context.
///

pub(crate) struct RowProcessingState<'a> {
    pub(crate) graph: &'a InitializerGraph,
    pub(crate) row: &'a [Value],
    pub(crate) data: &'a mut [InitializerData],
    pub(crate) pc: &'a mut PersistenceContext,
    pub(crate) execution: ExecutionId,
    pub(crate) post_load: &'a mut PostLoadActions,
    pub(crate) stats: &'a mut ExecutionStats,
}

impl RowProcessingState<'_> {
    pub(crate) fn data(&self, id: InitializerId) -> &InitializerData {
        &self.data[id.0]
    }

    pub(crate) fn data_mut(&mut self, id: InitializerId) -> &mut InitializerData {
        &mut self.data[id.0]
    }

    pub(crate) fn column(&self, position: usize) -> &Value {
        &self.row[position]
    }

    pub(crate) const fn claim(&self, id: InitializerId) -> LoadingClaim {
        LoadingClaim {
            execution: self.execution,
            initializer: id.0,
        }
    }

    /// Identifier read from key columns; `None` when all are NULL.
    pub(crate) fn read_key(
        &self,
        path: &NavigablePath,
        columns: &[String],
        positions: &[usize],
    ) -> Result<Option<IdValue>, RowError> {
        let values: Vec<&Value> = positions.iter().map(|p| self.column(*p)).collect();

        IdValue::from_columns(&path.full_path(), columns, &values)
    }

    /// Children of `parent` take part in this row.
    pub(crate) fn is_active(&self, parent: Option<InitializerId>) -> bool {
        parent.is_none_or(|parent| self.data(parent).state.is_active())
    }

    /// Key resolved on this row, required once past `resolve_key`.
    pub(crate) fn resolved_key(
        &self,
        id: InitializerId,
        path: &NavigablePath,
    ) -> Result<IdValue, InternalError> {
        self.data(id).key.clone().ok_or_else(|| {
            InternalError::initializer_invariant(format!("'{path}' has no resolved key"))
        })
    }
}

///
/// Initializer
///
/// Lifecycle shared by every initializer kind. Steps receive the whole
/// row-processing state because a node may read its parent's key or a
/// canonical node's instance.
///

pub(crate) trait Initializer {
    fn id(&self) -> InitializerId;

    fn parent(&self) -> Option<InitializerId>;

    fn navigable_path(&self) -> &NavigablePath;

    /// Value this node contributes to its parent's slot.
    fn field_value(&self, data: &InitializerData) -> FieldValue;

    fn start_loading(&self, data: &mut InitializerData) {
        *data = InitializerData::default();
    }

    /// Read key columns and move to `KeyResolved` or `Missing`.
    fn resolve_key(&self, rs: &mut RowProcessingState<'_>) -> Result<(), InternalError>;

    /// Reuse the previous row's resolution when the key is unchanged.
    fn resolve_from_previous_row(
        &self,
        _rs: &mut RowProcessingState<'_>,
    ) -> Result<bool, InternalError> {
        Ok(false)
    }

    fn resolve_instance(&self, rs: &mut RowProcessingState<'_>) -> Result<(), InternalError>;

    fn resolve_instance_with(
        &self,
        _instance: InstanceId,
        _rs: &mut RowProcessingState<'_>,
    ) -> Result<(), InternalError> {
        Err(InternalError::initializer_invariant(format!(
            "'{}' does not accept an explicit instance",
            self.navigable_path()
        )))
    }

    fn resolve_state(&self, _rs: &mut RowProcessingState<'_>) -> Result<(), InternalError> {
        Ok(())
    }

    fn initialize_instance(&self, rs: &mut RowProcessingState<'_>) -> Result<(), InternalError> {
        rs.data_mut(self.id()).advance(InitializerState::Initialized)
    }

    fn initialize_instance_from_parent(
        &self,
        _parent: InstanceId,
        _rs: &mut RowProcessingState<'_>,
    ) -> Result<(), InternalError> {
        Err(InternalError::initializer_invariant(format!(
            "'{}' cannot be initialized from its parent",
            self.navigable_path()
        )))
    }

    fn finish_up_row(&self, data: &mut InitializerData) {
        data.remember_row();
    }

    fn end_loading(&self, data: &mut InitializerData) {
        data.reset_row();
        data.previous = None;
    }
}

/// Link a non-joined to-one target: the managed instance or a proxy.
/// Immediate targets that are still proxies become pending loads.
pub(super) fn link_target(
    rs: &mut RowProcessingState<'_>,
    id: InitializerId,
    key: EntityKey,
    target: &Arc<EntityModel>,
    pending: Option<bool>,
) -> Result<(), InternalError> {
    let (instance, created) = rs.pc.proxy_for(key.clone(), target);
    if created {
        rs.stats.proxies_created += 1;
    }

    if let Some(batched) = pending
        && rs.pc.entity(instance).is_some_and(|e| e.is_proxy())
    {
        rs.post_load.add_entity(key, batched);
    }

    let data = rs.data_mut(id);
    data.instance = Some(instance);
    data.counters.resolve_instance += 1;
    data.advance(InitializerState::Initialized)
}

/// Move to `KeyResolved` or `Missing` from a foreign key.
pub(super) fn resolve_foreign_key(
    rs: &mut RowProcessingState<'_>,
    id: InitializerId,
    path: &NavigablePath,
    columns: &[String],
    positions: &[usize],
) -> Result<(), InternalError> {
    let key = rs.read_key(path, columns, positions)?;
    let data = rs.data_mut(id);
    data.counters.resolve_key += 1;

    match key {
        Some(key) => {
            data.key = Some(key);
            data.advance(InitializerState::KeyResolved)
        }
        None => data.advance(InitializerState::Missing),
    }
}
