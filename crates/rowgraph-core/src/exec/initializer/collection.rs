use crate::{
    context::{CollectionClaim, CollectionKey, ElementAdd, FieldValue},
    error::{InternalError, RowError},
    exec::{
        InitializerData, InitializerId, InitializerState,
        initializer::{Initializer, RowProcessingState},
    },
    model::CollectionSemantics,
    path::NavigablePath,
};

///
/// CollectionInitializerKind
///

#[derive(Clone, Debug)]
pub(crate) enum CollectionInitializerKind {
    Joined {
        key: Vec<usize>,
        index: Option<usize>,
        element: ElementAssembly,
    },
    /// Loaded eagerly by a subsequent select.
    Select { batched: bool },
    Delayed,
}

///
/// ElementAssembly
///
/// Where the element of a joined collection comes from on each row.
///

#[derive(Clone, Debug)]
pub(crate) enum ElementAssembly {
    Entity(InitializerId),
    Embeddable(InitializerId),
    Basic { position: usize },
}

///
/// CollectionInitializer
///
/// Resolves the collection of the owning entity and, for joined
/// collections, adds one element per row while it holds the loading claim.
///

#[derive(Clone, Debug)]
pub(crate) struct CollectionInitializer {
    pub(crate) id: InitializerId,
    pub(crate) parent: Option<InitializerId>,
    pub(crate) path: NavigablePath,
    pub(crate) role: String,
    pub(crate) semantics: CollectionSemantics,
    /// Nearest entity initializer; its key is the collection key.
    pub(crate) owner: InitializerId,
    pub(crate) kind: CollectionInitializerKind,
}

impl CollectionInitializer {
    fn element_value(
        element: &ElementAssembly,
        rs: &RowProcessingState<'_>,
    ) -> Option<FieldValue> {
        match element {
            ElementAssembly::Entity(id) => rs
                .data(*id)
                .instance
                .map(|instance| FieldValue::Entity(Some(instance))),
            ElementAssembly::Embeddable(id) => rs
                .data(*id)
                .embedded
                .clone()
                .map(|embedded| FieldValue::Embedded(Some(embedded))),
            ElementAssembly::Basic { position } => {
                let value = rs.column(*position);

                (!value.is_null()).then(|| FieldValue::Basic(value.clone()))
            }
        }
    }

    fn list_index(
        &self,
        rs: &RowProcessingState<'_>,
        index: Option<usize>,
    ) -> Result<Option<usize>, RowError> {
        let (CollectionSemantics::List { index_column }, Some(position)) = (&self.semantics, index)
        else {
            return Ok(None);
        };

        let value = rs.column(position);
        value
            .as_index()
            .map(Some)
            .ok_or_else(|| RowError::KeyTypeMismatch {
                path: self.path.full_path(),
                column: index_column.clone(),
                found: value.type_label(),
            })
    }
}

impl Initializer for CollectionInitializer {
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
        data.collection
            .map_or(FieldValue::Unfetched, FieldValue::Collection)
    }

    fn resolve_key(&self, rs: &mut RowProcessingState<'_>) -> Result<(), InternalError> {
        let owner = rs.data(self.owner);
        let owner_key = owner.key.clone().filter(|_| owner.state.is_active());

        let data = rs.data_mut(self.id);
        data.counters.resolve_key += 1;
        let Some(owner_key) = owner_key else {
            return data.advance(InitializerState::Missing);
        };
        data.key = Some(owner_key);

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
        let Some((collection, owner)) = data
            .key
            .as_ref()
            .and_then(|key| data.previous_for(key))
            .and_then(|previous| previous.collection.map(|c| (c, previous.owner)))
        else {
            return Ok(false);
        };

        let data = rs.data_mut(self.id);
        data.collection = Some(collection);
        data.owner = owner;
        data.counters.from_previous_row += 1;
        data.advance(if owner {
            InitializerState::Resolved
        } else {
            InitializerState::Initialized
        })?;
        rs.stats.reuses += 1;

        Ok(true)
    }

    fn resolve_instance(&self, rs: &mut RowProcessingState<'_>) -> Result<(), InternalError> {
        let key = CollectionKey {
            role: self.role.clone(),
            owner: rs.resolved_key(self.id, &self.path)?,
        };
        rs.data_mut(self.id).counters.resolve_instance += 1;

        match &self.kind {
            CollectionInitializerKind::Joined { .. } => {
                let claim = rs.claim(self.id);
                let (collection, outcome) = rs.pc.claim_collection(key, &self.semantics, claim);
                if outcome == CollectionClaim::Claimed {
                    rs.stats.collections_loaded += 1;
                }

                let data = rs.data_mut(self.id);
                data.collection = Some(collection);
                if outcome.must_populate() {
                    data.owner = true;
                    data.advance(InitializerState::Resolved)
                } else {
                    data.advance(InitializerState::Initialized)
                }
            }
            CollectionInitializerKind::Select { batched } => {
                let collection = rs.pc.lazy_collection(key.clone(), &self.semantics);
                if !rs.pc.collection(collection).is_some_and(|c| c.initialized) {
                    rs.post_load.add_collection(key, *batched);
                }

                let data = rs.data_mut(self.id);
                data.collection = Some(collection);
                data.advance(InitializerState::Initialized)
            }
            CollectionInitializerKind::Delayed => {
                let collection = rs.pc.lazy_collection(key, &self.semantics);

                let data = rs.data_mut(self.id);
                data.collection = Some(collection);
                data.advance(InitializerState::Initialized)
            }
        }
    }

    fn initialize_instance(&self, rs: &mut RowProcessingState<'_>) -> Result<(), InternalError> {
        if let CollectionInitializerKind::Joined {
            key,
            index,
            element,
        } = &self.kind
        {
            let present = key.iter().any(|position| !rs.column(*position).is_null());
            let value = if present {
                Self::element_value(element, rs)
            } else {
                None
            };

            if let Some(value) = value {
                let index = self.list_index(rs, *index)?;
                let collection = rs.data(self.id).collection.ok_or_else(|| {
                    InternalError::initializer_invariant(format!(
                        "'{}' resolved without a collection",
                        self.path
                    ))
                })?;

                if let (ElementAdd::IndexConflict, Some(index)) =
                    (rs.pc.add_element(collection, value, index)?, index)
                {
                    return Err(RowError::ListIndexConflict {
                        path: self.path.full_path(),
                        index,
                    }
                    .into());
                }
            }
        }

        let data = rs.data_mut(self.id);
        data.counters.initialize += 1;
        data.advance(InitializerState::Initialized)
    }
}
