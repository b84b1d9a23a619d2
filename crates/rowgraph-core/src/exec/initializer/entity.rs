use crate::{
    context::{EntityClaim, EntityKey, FieldValue, InstanceId},
    error::{ErrorOrigin, InternalError, RowError},
    exec::{
        DomainResultAssembler, InitializerData, InitializerId, InitializerState,
        initializer::{Initializer, RowProcessingState},
    },
    model::{EntityModel, NotFoundAction},
    path::NavigablePath,
};
use std::sync::Arc;

///
/// EntityInitializerKind
///

#[derive(Clone, Debug)]
pub(crate) enum EntityInitializerKind {
    Root,
    /// Joined to-one target; the owner's foreign key tells a dangling
    /// reference apart from a NULL association.
    JoinedToOne {
        foreign_key: Vec<usize>,
        foreign_key_columns: Vec<String>,
        not_found: NotFoundAction,
    },
    /// Element of a joined entity collection.
    Element,
}

///
/// EntityInitializer
///
/// Entity whose identifier and state columns are present in the row.
/// Resolves identity through the persistence context and hydrates the
/// instance when this initializer holds the loading claim.
///

#[derive(Clone, Debug)]
pub(crate) struct EntityInitializer {
    pub(crate) id: InitializerId,
    pub(crate) parent: Option<InitializerId>,
    pub(crate) path: NavigablePath,
    pub(crate) entity: Arc<EntityModel>,
    pub(crate) identifier: Vec<usize>,
    pub(crate) version: Option<usize>,
    pub(crate) kind: EntityInitializerKind,
    /// One assembler per attribute slot of the entity.
    pub(crate) slots: Vec<DomainResultAssembler>,
}

impl EntityInitializer {
    fn entity_key(&self, rs: &RowProcessingState<'_>) -> Result<EntityKey, InternalError> {
        Ok(EntityKey {
            entity: self.entity.name.clone(),
            id: rs.resolved_key(self.id, &self.path)?,
        })
    }

    // NULL identifier: MISSING, unless a joined to-one's foreign key says
    // the target row should have been there.
    fn resolve_absent(&self, rs: &mut RowProcessingState<'_>) -> Result<(), InternalError> {
        if let EntityInitializerKind::JoinedToOne {
            foreign_key,
            foreign_key_columns,
            not_found,
        } = &self.kind
            && let Some(dangling) = rs.read_key(&self.path, foreign_key_columns, foreign_key)?
        {
            match not_found {
                NotFoundAction::Exception => {
                    return Err(RowError::FetchNotFound {
                        path: self.path.full_path(),
                        entity: self.entity.name.clone(),
                        key: dangling.to_string(),
                    }
                    .into());
                }
                NotFoundAction::Ignore => {
                    tracing::debug!(
                        path = %self.path,
                        entity = %self.entity.name,
                        key = %dangling,
                        "dangling foreign key ignored"
                    );
                }
            }
        }

        rs.data_mut(self.id).advance(InitializerState::Missing)
    }

    fn accept_claim(
        &self,
        rs: &mut RowProcessingState<'_>,
        instance: InstanceId,
        outcome: EntityClaim,
    ) -> Result<(), InternalError> {
        if outcome == EntityClaim::Created {
            rs.stats.entities_created += 1;
            tracing::trace!(path = %self.path, instance = %instance, "instance created");
        }
        if outcome == EntityClaim::LoadingByOther {
            tracing::debug!(
                path = %self.path,
                instance = %instance,
                "instance is being loaded by another initializer"
            );
        }

        let data = rs.data_mut(self.id);
        data.instance = Some(instance);

        if outcome.must_hydrate() {
            data.owner = true;
            data.advance(InitializerState::Resolved)
        } else {
            data.advance(InitializerState::Initialized)
        }
    }
}

impl Initializer for EntityInitializer {
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
        let key = rs.read_key(&self.path, &self.entity.identifier.columns, &self.identifier)?;
        rs.data_mut(self.id).counters.resolve_key += 1;

        let Some(key) = key else {
            return self.resolve_absent(rs);
        };
        rs.data_mut(self.id).key = Some(key);

        if self.resolve_from_previous_row(rs)? {
            return Ok(());
        }

        rs.data_mut(self.id).advance(InitializerState::KeyResolved)
    }

    fn resolve_from_previous_row(
        &self,
        rs: &mut RowProcessingState<'_>,
    ) -> Result<bool, InternalError> {
        let data = rs.data(self.id);
        let Some(instance) = data
            .key
            .as_ref()
            .and_then(|key| data.previous_for(key))
            .and_then(|previous| previous.instance)
        else {
            return Ok(false);
        };

        let data = rs.data_mut(self.id);
        data.instance = Some(instance);
        data.counters.from_previous_row += 1;
        data.advance(InitializerState::Initialized)?;
        rs.stats.reuses += 1;

        tracing::trace!(path = %self.path, instance = %instance, "reused previous row");

        Ok(true)
    }

    fn resolve_instance(&self, rs: &mut RowProcessingState<'_>) -> Result<(), InternalError> {
        let key = self.entity_key(rs)?;
        let claim = rs.claim(self.id);
        let (instance, outcome) = rs.pc.claim_entity(key, &self.entity, claim);
        rs.data_mut(self.id).counters.resolve_instance += 1;

        self.accept_claim(rs, instance, outcome)
    }

    fn resolve_instance_with(
        &self,
        instance: InstanceId,
        rs: &mut RowProcessingState<'_>,
    ) -> Result<(), InternalError> {
        let key = self.entity_key(rs)?;
        if rs.pc.find(&key) != Some(instance) {
            return Err(InternalError::row(
                ErrorOrigin::Initializer,
                RowError::ExplicitInstanceMismatch {
                    path: self.path.full_path(),
                    instance: instance.to_string(),
                    key: key.to_string(),
                },
            ));
        }

        let claim = rs.claim(self.id);
        let (instance, outcome) = rs.pc.claim_entity(key, &self.entity, claim);
        rs.data_mut(self.id).counters.explicit += 1;

        self.accept_claim(rs, instance, outcome)
    }

    // Child slots are staged as placeholders and filled in
    // `initialize_instance`, after the children themselves are complete.
    fn resolve_state(&self, rs: &mut RowProcessingState<'_>) -> Result<(), InternalError> {
        let mut staged = Vec::with_capacity(self.slots.len());
        for slot in &self.slots {
            if slot.is_child() {
                staged.push(FieldValue::Unfetched);
            } else {
                staged.push(slot.assemble(rs)?);
            }
        }
        let version = self.version.map(|position| rs.column(position).clone());

        let data = rs.data_mut(self.id);
        data.staged = staged;
        data.version = version;

        Ok(())
    }

    fn initialize_instance(&self, rs: &mut RowProcessingState<'_>) -> Result<(), InternalError> {
        let mut state = std::mem::take(&mut rs.data_mut(self.id).staged);
        if state.len() != self.slots.len() {
            return Err(InternalError::initializer_invariant(format!(
                "'{}' initialized without resolved state",
                self.path
            )));
        }
        for (staged, slot) in state.iter_mut().zip(&self.slots) {
            if slot.is_child() {
                *staged = slot.assemble(rs)?;
            }
        }

        let data = rs.data_mut(self.id);
        let instance = data.instance.ok_or_else(|| {
            InternalError::initializer_invariant(format!("'{}' resolved without an instance", self.path))
        })?;
        let version = data.version.take();

        rs.pc.hydrate(instance, state, version)?;
        tracing::trace!(path = %self.path, instance = %instance, "instance hydrated");

        let data = rs.data_mut(self.id);
        data.counters.initialize += 1;
        data.advance(InitializerState::Initialized)
    }
}
