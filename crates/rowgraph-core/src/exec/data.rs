use crate::{
    context::{CollectionId, EmbeddedValue, FieldValue, InstanceId},
    error::InternalError,
    exec::InitializerState,
    value::{IdValue, Value},
};

///
/// InitializerCounters
///
/// How often each lifecycle path ran for one initializer over an execution.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct InitializerCounters {
    pub resolve_key: u64,
    pub resolve_instance: u64,
    pub from_previous_row: u64,
    pub explicit: u64,
    pub initialize: u64,
    pub initialize_from_parent: u64,
    pub copied_from_canonical: u64,
}

///
/// PreviousRow
///

#[derive(Clone, Debug)]
pub(crate) struct PreviousRow {
    pub(crate) key: IdValue,
    pub(crate) instance: Option<InstanceId>,
    pub(crate) collection: Option<CollectionId>,
    pub(crate) owner: bool,
}

///
/// InitializerData
///
/// Row-scoped state of one initializer, kept in the processor's data
/// table at the initializer's id. Plan nodes never hold per-row state.
///

#[derive(Clone, Debug, Default)]
pub struct InitializerData {
    pub(crate) state: InitializerState,
    pub(crate) key: Option<IdValue>,
    pub(crate) instance: Option<InstanceId>,
    pub(crate) collection: Option<CollectionId>,
    pub(crate) embedded: Option<EmbeddedValue>,

    /// This initializer hydrates its instance (or populates its collection).
    pub(crate) owner: bool,

    /// Embedded value was read from the parent instance, not the row.
    pub(crate) preloaded: bool,

    pub(crate) staged: Vec<FieldValue>,
    pub(crate) version: Option<Value>,
    pub(crate) previous: Option<PreviousRow>,
    pub(crate) counters: InitializerCounters,
}

impl InitializerData {
    #[must_use]
    pub const fn state(&self) -> InitializerState {
        self.state
    }

    #[must_use]
    pub const fn key(&self) -> Option<&IdValue> {
        self.key.as_ref()
    }

    #[must_use]
    pub const fn instance(&self) -> Option<InstanceId> {
        self.instance
    }

    #[must_use]
    pub const fn collection(&self) -> Option<CollectionId> {
        self.collection
    }

    #[must_use]
    pub const fn embedded(&self) -> Option<&EmbeddedValue> {
        self.embedded.as_ref()
    }

    #[must_use]
    pub const fn is_owner(&self) -> bool {
        self.owner
    }

    #[must_use]
    pub const fn is_preloaded(&self) -> bool {
        self.preloaded
    }

    #[must_use]
    pub const fn counters(&self) -> InitializerCounters {
        self.counters
    }

    /// Advance the state, keeping the instance consistent with it:
    /// `KeyResolved` never carries an instance and `Missing` clears it.
    pub(crate) fn advance(&mut self, next: InitializerState) -> Result<(), InternalError> {
        if next == InitializerState::KeyResolved && self.instance.is_some() {
            return Err(InternalError::initializer_invariant(
                "KEY_RESOLVED initializer already carries an instance",
            ));
        }
        self.state.advance(next)?;

        if next == InitializerState::Missing {
            self.instance = None;
            self.collection = None;
            self.embedded = None;
            self.owner = false;
        }

        Ok(())
    }

    /// Row-scoped reset before the next row; keeps the previous-row memo
    /// and the counters.
    pub(crate) fn reset_row(&mut self) {
        self.state = InitializerState::Uninitialized;
        self.key = None;
        self.instance = None;
        self.collection = None;
        self.embedded = None;
        self.owner = false;
        self.preloaded = false;
        self.staged.clear();
        self.version = None;
    }

    /// Remember this row's resolution for the next row.
    pub(crate) fn remember_row(&mut self) {
        let resolved = matches!(
            self.state,
            InitializerState::Resolved | InitializerState::Initialized
        );

        self.previous = match (&self.key, resolved) {
            (Some(key), true) => Some(PreviousRow {
                key: key.clone(),
                instance: self.instance,
                collection: self.collection,
                owner: self.owner,
            }),
            _ => None,
        };
        self.staged.clear();
    }

    /// Previous-row resolution for the same key, if any.
    pub(crate) fn previous_for(&self, key: &IdValue) -> Option<&PreviousRow> {
        self.previous.as_ref().filter(|previous| previous.key == *key)
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use InitializerState::{Initialized, KeyResolved, Missing, Resolved, Uninitialized};

    #[test]
    fn states_only_move_forward() {
        let all = [Uninitialized, KeyResolved, Missing, Resolved, Initialized];
        let legal = [
            (Uninitialized, KeyResolved),
            (Uninitialized, Missing),
            (Uninitialized, Resolved),
            (Uninitialized, Initialized),
            (KeyResolved, Resolved),
            (KeyResolved, Missing),
            (KeyResolved, Initialized),
            (Resolved, Initialized),
        ];

        for from in all {
            for to in all {
                assert_eq!(
                    from.can_advance_to(to),
                    legal.contains(&(from, to)),
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn key_resolved_never_carries_an_instance() {
        let mut data = InitializerData {
            instance: Some(InstanceId(0)),
            ..InitializerData::default()
        };

        let err = data
            .advance(KeyResolved)
            .expect_err("instance before KEY_RESOLVED should be rejected");
        assert_eq!(err.class, crate::error::ErrorClass::InvariantViolation);
    }

    #[test]
    fn missing_clears_the_instance() {
        let mut data = InitializerData::default();
        data.advance(KeyResolved).expect("U -> KR should be legal");
        data.instance = Some(InstanceId(2));
        data.owner = true;

        data.advance(Missing).expect("KR -> M should be legal");
        assert_eq!(data.instance(), None);
        assert!(!data.is_owner());
        assert!(data.advance(Initialized).is_err());
    }

    #[test]
    fn previous_row_is_remembered_only_when_resolved() {
        let mut data = InitializerData {
            key: Some(IdValue::Int(1)),
            instance: Some(InstanceId(5)),
            state: Initialized,
            ..InitializerData::default()
        };
        data.remember_row();
        data.reset_row();

        assert_eq!(
            data.previous_for(&IdValue::Int(1)).and_then(|p| p.instance),
            Some(InstanceId(5))
        );
        assert!(data.previous_for(&IdValue::Int(2)).is_none());

        data.advance(Missing).expect("U -> M should be legal");
        data.remember_row();
        assert!(data.previous_for(&IdValue::Int(1)).is_none());
    }
}
