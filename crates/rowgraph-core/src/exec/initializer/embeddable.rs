use crate::{
    context::{EmbeddedValue, FieldValue, InstanceId},
    error::InternalError,
    exec::{
        DomainResultAssembler, InitializerData, InitializerId, InitializerState,
        initializer::{Initializer, RowProcessingState},
    },
    path::NavigablePath,
};

///
/// EmbeddableInitializer
///
/// Composite value stored in its container's columns. An embeddable whose
/// columns are all NULL is absent. When the owning entity is already
/// managed, the value is taken from the instance instead of the row.
///

#[derive(Clone, Debug)]
pub(crate) struct EmbeddableInitializer {
    pub(crate) id: InitializerId,
    pub(crate) parent: Option<InitializerId>,
    pub(crate) path: NavigablePath,
    pub(crate) name: String,
    /// Entity whose state holds this value; `None` inside collection elements.
    pub(crate) owner: Option<InitializerId>,
    /// Slots from the owning entity's state down to this value.
    pub(crate) slot_path: Vec<usize>,
    pub(crate) slots: Vec<DomainResultAssembler>,
}

impl EmbeddableInitializer {
    pub(crate) fn is_absent(&self, rs: &RowProcessingState<'_>) -> bool {
        self.slots.iter().all(|slot| match slot {
            DomainResultAssembler::Basic { position, .. } => rs.column(*position).is_null(),
            DomainResultAssembler::UnfetchedBasic
            | DomainResultAssembler::Unfetched
            | DomainResultAssembler::Collection(_) => true,
            DomainResultAssembler::Entity(id) => {
                rs.data(*id).state == InitializerState::Missing
            }
            DomainResultAssembler::Embeddable(id) => rs
                .graph
                .embeddable(*id)
                .is_none_or(|nested| nested.is_absent(rs)),
        })
    }

    // Owner instance to copy from: resolved, but hydrated elsewhere.
    fn preloaded_owner(&self, rs: &RowProcessingState<'_>) -> Option<InstanceId> {
        let data = rs.data(self.owner?);

        if data.owner { None } else { data.instance }
    }
}

impl Initializer for EmbeddableInitializer {
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
        FieldValue::Embedded(data.embedded.clone())
    }

    fn resolve_key(&self, rs: &mut RowProcessingState<'_>) -> Result<(), InternalError> {
        let data = rs.data_mut(self.id);
        data.counters.resolve_key += 1;

        data.advance(InitializerState::KeyResolved)
    }

    fn resolve_instance(&self, rs: &mut RowProcessingState<'_>) -> Result<(), InternalError> {
        let absent = self.is_absent(rs);

        let data = rs.data_mut(self.id);
        data.counters.resolve_instance += 1;
        if absent {
            data.advance(InitializerState::Missing)
        } else {
            data.advance(InitializerState::Resolved)
        }
    }

    fn initialize_instance(&self, rs: &mut RowProcessingState<'_>) -> Result<(), InternalError> {
        if let Some(instance) = self.preloaded_owner(rs) {
            return self.initialize_instance_from_parent(instance, rs);
        }

        let fields = self
            .slots
            .iter()
            .map(|slot| slot.assemble(rs))
            .collect::<Result<Vec<_>, _>>()?;

        let data = rs.data_mut(self.id);
        data.embedded = Some(EmbeddedValue {
            name: self.name.clone(),
            fields,
        });
        data.counters.initialize += 1;
        data.advance(InitializerState::Initialized)
    }

    fn initialize_instance_from_parent(
        &self,
        parent: InstanceId,
        rs: &mut RowProcessingState<'_>,
    ) -> Result<(), InternalError> {
        let embedded = rs.pc.embedded_at(parent, &self.slot_path).cloned();

        let data = rs.data_mut(self.id);
        data.embedded = embedded;
        data.preloaded = true;
        data.counters.initialize_from_parent += 1;
        data.advance(InitializerState::Initialized)
    }
}
