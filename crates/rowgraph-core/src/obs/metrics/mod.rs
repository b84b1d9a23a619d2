use serde::{Deserialize, Serialize};
use std::{cell::RefCell, collections::BTreeMap};

///
/// EventState
/// Ephemeral, in-memory counters for plan building and row processing.
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub(crate) struct EventState {
    pub(crate) ops: EventOps,
    pub(crate) entities: BTreeMap<String, EntityCounters>,
}

///
/// EventOps
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct EventOps {
    // Plan compilation
    pub plans_built: u64,
    pub plan_cache_hits: u64,
    pub plan_cache_misses: u64,
    pub circular_fetches: u64,

    // Executions
    pub executions: u64,
    pub failed_executions: u64,
    pub rows_processed: u64,

    // Materialization
    pub entities_instantiated: u64,
    pub proxies_created: u64,
    pub collections_loaded: u64,
    pub previous_row_reuses: u64,
}

///
/// EntityCounters
///
/// Counters keyed by the root entity of the plan or execution.
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct EntityCounters {
    pub plans_built: u64,
    pub executions: u64,
    pub failed_executions: u64,
    pub rows_processed: u64,
    pub entities_instantiated: u64,
}

///
/// MetricsReport
/// Point-in-time snapshot of the process-local counters.
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct MetricsReport {
    pub ops: EventOps,
    pub entities: BTreeMap<String, EntityCounters>,
}

impl MetricsReport {
    #[must_use]
    pub fn entity(&self, name: &str) -> Option<&EntityCounters> {
        self.entities.get(name)
    }
}

thread_local! {
    static EVENT_STATE: RefCell<EventState> = RefCell::new(EventState::default());
}

/// Borrow metrics immutably.
pub(crate) fn with_state<R>(f: impl FnOnce(&EventState) -> R) -> R {
    EVENT_STATE.with(|m| f(&m.borrow()))
}

/// Borrow metrics mutably.
pub(crate) fn with_state_mut<R>(f: impl FnOnce(&mut EventState) -> R) -> R {
    EVENT_STATE.with(|m| f(&mut m.borrow_mut()))
}

/// Mutable counters for one root entity, created on first use.
pub(crate) fn entity_entry<'a>(state: &'a mut EventState, root: &str) -> &'a mut EntityCounters {
    state.entities.entry(root.to_string()).or_default()
}

/// Reset all counters.
pub(crate) fn reset_all() {
    with_state_mut(|m| *m = EventState::default());
}

pub(crate) fn report() -> MetricsReport {
    with_state(|m| MetricsReport {
        ops: m.ops.clone(),
        entities: m.entities.clone(),
    })
}
