//! Metrics sink boundary.
//!
//! Plan and row-processing logic MUST NOT depend on obs::metrics directly.
//! All instrumentation flows through MetricsEvent and MetricsSink.
//!
//! This module is the only allowed bridge between execution logic
//! and the process-local metrics state.
use crate::obs::metrics::{self, MetricsReport};
use std::{cell::RefCell, rc::Rc};

thread_local! {
    static SINK_OVERRIDE: RefCell<Option<Rc<dyn MetricsSink>>> = RefCell::new(None);
}

///
/// MetricsEvent
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MetricsEvent {
    PlanBuilt {
        root: String,
        fetches: usize,
        circular: usize,
    },
    PlanCache {
        hit: bool,
    },
    ExecStart {
        root: String,
    },
    ExecFinish {
        root: String,
        rows: u64,
        succeeded: bool,
    },
    Materialized {
        root: String,
        entities: u64,
        proxies: u64,
        collections: u64,
        reuses: u64,
    },
}

///
/// MetricsSink
///

pub trait MetricsSink {
    fn record(&self, event: MetricsEvent);
}

/// GlobalMetricsSink
/// Default process-local sink that writes into the thread-local metrics state.
/// Acts as the concrete sink when no scoped override is installed.

pub(crate) struct GlobalMetricsSink;

impl MetricsSink for GlobalMetricsSink {
    fn record(&self, event: MetricsEvent) {
        match event {
            MetricsEvent::PlanBuilt {
                root,
                fetches: _,
                circular,
            } => {
                metrics::with_state_mut(|m| {
                    m.ops.plans_built = m.ops.plans_built.saturating_add(1);
                    m.ops.circular_fetches =
                        m.ops.circular_fetches.saturating_add(circular as u64);

                    let entry = metrics::entity_entry(m, &root);
                    entry.plans_built = entry.plans_built.saturating_add(1);
                });
            }

            MetricsEvent::PlanCache { hit } => {
                metrics::with_state_mut(|m| {
                    if hit {
                        m.ops.plan_cache_hits = m.ops.plan_cache_hits.saturating_add(1);
                    } else {
                        m.ops.plan_cache_misses = m.ops.plan_cache_misses.saturating_add(1);
                    }
                });
            }

            MetricsEvent::ExecStart { root } => {
                metrics::with_state_mut(|m| {
                    m.ops.executions = m.ops.executions.saturating_add(1);

                    let entry = metrics::entity_entry(m, &root);
                    entry.executions = entry.executions.saturating_add(1);
                });
            }

            MetricsEvent::ExecFinish {
                root,
                rows,
                succeeded,
            } => {
                metrics::with_state_mut(|m| {
                    m.ops.rows_processed = m.ops.rows_processed.saturating_add(rows);
                    if !succeeded {
                        m.ops.failed_executions = m.ops.failed_executions.saturating_add(1);
                    }

                    let entry = metrics::entity_entry(m, &root);
                    entry.rows_processed = entry.rows_processed.saturating_add(rows);
                    if !succeeded {
                        entry.failed_executions = entry.failed_executions.saturating_add(1);
                    }
                });
            }

            MetricsEvent::Materialized {
                root,
                entities,
                proxies,
                collections,
                reuses,
            } => {
                metrics::with_state_mut(|m| {
                    m.ops.entities_instantiated =
                        m.ops.entities_instantiated.saturating_add(entities);
                    m.ops.proxies_created = m.ops.proxies_created.saturating_add(proxies);
                    m.ops.collections_loaded =
                        m.ops.collections_loaded.saturating_add(collections);
                    m.ops.previous_row_reuses = m.ops.previous_row_reuses.saturating_add(reuses);

                    let entry = metrics::entity_entry(m, &root);
                    entry.entities_instantiated =
                        entry.entities_instantiated.saturating_add(entities);
                });
            }
        }
    }
}

pub(crate) const GLOBAL_METRICS_SINK: GlobalMetricsSink = GlobalMetricsSink;

pub(crate) fn record(event: MetricsEvent) {
    // Clone the override out so a sink may itself record without
    // re-borrowing the slot.
    let sink = SINK_OVERRIDE.with(|cell| cell.borrow().clone());
    match sink {
        Some(sink) => sink.record(event),
        None => GLOBAL_METRICS_SINK.record(event),
    }
}

/// Snapshot the current metrics state.
#[must_use]
pub fn metrics_report() -> MetricsReport {
    metrics::report()
}

/// Reset all metrics state.
pub fn metrics_reset_all() {
    metrics::reset_all();
}

/// Run a closure with a temporary metrics sink override.
///
/// The previous sink is restored on every exit, including unwind.
pub fn with_metrics_sink<T>(sink: Rc<dyn MetricsSink>, f: impl FnOnce() -> T) -> T {
    struct Guard(Option<Rc<dyn MetricsSink>>);

    impl Drop for Guard {
        fn drop(&mut self) {
            let prev = self.0.take();
            SINK_OVERRIDE.with(|cell| {
                *cell.borrow_mut() = prev;
            });
        }
    }

    let prev = SINK_OVERRIDE.with(|cell| cell.borrow_mut().replace(sink));
    let _guard = Guard(prev);

    f()
}

///
/// ExecSpan
/// RAII guard that emits start/finish metrics events for one execution.
/// Ensures finish accounting happens even on unwind; an execution that
/// never calls `succeed` is reported as failed.
///

pub(crate) struct ExecSpan {
    root: String,
    enabled: bool,
    rows: u64,
    succeeded: bool,
}

impl ExecSpan {
    #[must_use]
    pub(crate) fn new(root: &str, enabled: bool) -> Self {
        if enabled {
            record(MetricsEvent::ExecStart {
                root: root.to_string(),
            });
        }

        Self {
            root: root.to_string(),
            enabled,
            rows: 0,
            succeeded: false,
        }
    }

    pub(crate) const fn set_rows(&mut self, rows: u64) {
        self.rows = rows;
    }

    pub(crate) const fn succeed(&mut self) {
        self.succeeded = true;
    }
}

impl Drop for ExecSpan {
    fn drop(&mut self) {
        if self.enabled {
            record(MetricsEvent::ExecFinish {
                root: std::mem::take(&mut self.root),
                rows: self.rows,
                succeeded: self.succeeded,
            });
        }
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{AssertUnwindSafe, catch_unwind};

    #[derive(Default)]
    struct RecordingSink {
        events: RefCell<Vec<MetricsEvent>>,
    }

    impl MetricsSink for RecordingSink {
        fn record(&self, event: MetricsEvent) {
            self.events.borrow_mut().push(event);
        }
    }

    fn cache_event(hit: bool) -> MetricsEvent {
        MetricsEvent::PlanCache { hit }
    }

    #[test]
    fn with_metrics_sink_routes_and_restores_nested_overrides() {
        metrics_reset_all();
        let outer = Rc::new(RecordingSink::default());
        let inner = Rc::new(RecordingSink::default());

        with_metrics_sink(outer.clone(), || {
            record(cache_event(true));

            with_metrics_sink(inner.clone(), || {
                record(cache_event(false));
            });

            // Inner override was restored to outer override.
            record(cache_event(true));
        });

        assert_eq!(outer.events.borrow().len(), 2);
        assert_eq!(inner.events.borrow().as_slice(), &[cache_event(false)]);

        // Outer override was restored to the global sink.
        SINK_OVERRIDE.with(|cell| assert!(cell.borrow().is_none()));
        assert_eq!(metrics_report().ops.plan_cache_hits, 0);

        record(cache_event(true));
        assert_eq!(metrics_report().ops.plan_cache_hits, 1);
        assert_eq!(outer.events.borrow().len(), 2);
    }

    #[test]
    fn with_metrics_sink_restores_override_on_panic() {
        let sink = Rc::new(RecordingSink::default());

        let panicked = catch_unwind(AssertUnwindSafe(|| {
            with_metrics_sink(sink.clone(), || {
                record(cache_event(true));
                panic!("intentional panic for guard test");
            });
        }))
        .is_err();

        assert!(panicked);
        assert_eq!(sink.events.borrow().len(), 1);
        SINK_OVERRIDE.with(|cell| assert!(cell.borrow().is_none()));
    }

    #[test]
    fn exec_span_reports_failure_unless_marked_succeeded() {
        let sink = Rc::new(RecordingSink::default());

        with_metrics_sink(sink.clone(), || {
            let mut span = ExecSpan::new("Order", true);
            span.set_rows(3);
            drop(span);

            let mut span = ExecSpan::new("Order", true);
            span.set_rows(2);
            span.succeed();
        });

        let events = sink.events.borrow();
        assert_eq!(events.len(), 4);
        assert_eq!(
            events[1],
            MetricsEvent::ExecFinish {
                root: "Order".to_string(),
                rows: 3,
                succeeded: false,
            }
        );
        assert_eq!(
            events[3],
            MetricsEvent::ExecFinish {
                root: "Order".to_string(),
                rows: 2,
                succeeded: true,
            }
        );
    }

    #[test]
    fn disabled_exec_span_records_nothing() {
        let sink = Rc::new(RecordingSink::default());

        with_metrics_sink(sink.clone(), || {
            let mut span = ExecSpan::new("Order", false);
            span.succeed();
        });

        assert!(sink.events.borrow().is_empty());
    }

    #[test]
    fn global_sink_accumulates_per_entity_counters() {
        metrics_reset_all();

        record(MetricsEvent::PlanBuilt {
            root: "Order".to_string(),
            fetches: 7,
            circular: 1,
        });
        record(MetricsEvent::ExecStart {
            root: "Order".to_string(),
        });
        record(MetricsEvent::ExecFinish {
            root: "Order".to_string(),
            rows: 4,
            succeeded: false,
        });
        record(MetricsEvent::Materialized {
            root: "Order".to_string(),
            entities: 3,
            proxies: 1,
            collections: 1,
            reuses: 2,
        });

        let report = metrics_report();
        assert_eq!(report.ops.plans_built, 1);
        assert_eq!(report.ops.circular_fetches, 1);
        assert_eq!(report.ops.failed_executions, 1);
        assert_eq!(report.ops.rows_processed, 4);
        assert_eq!(report.ops.previous_row_reuses, 2);

        let order = report
            .entity("Order")
            .expect("entity counters should be present");
        assert_eq!(order.executions, 1);
        assert_eq!(order.failed_executions, 1);
        assert_eq!(order.entities_instantiated, 3);

        metrics_reset_all();
        assert_eq!(metrics_report(), MetricsReport::default());
    }
}
