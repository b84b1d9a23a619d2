//! Plan cache keyed by query shape; failed builds are never cached.

use crate::{
    error::InternalError,
    obs::sink::{self, MetricsEvent},
    plan::{QueryPlan, QueryPlanBuilder},
};
use std::{
    collections::BTreeMap,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicUsize, Ordering},
    },
};

///
/// PlanCacheKey
///
/// Query shape: root entity, result selection, entity graph rendering,
/// enabled profiles, and fetch depth limit.
///

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct PlanCacheKey {
    pub(crate) root: String,
    pub(crate) results: Vec<String>,
    pub(crate) graph: Option<String>,
    pub(crate) profiles: Vec<String>,
    pub(crate) max_fetch_depth: Option<u32>,
}

///
/// CacheStats
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub size: usize,
}

///
/// PlanCache
///
/// Shared cache of compiled plans for one mapping model. Plans are
/// immutable once built, so a hit hands out the same `Arc` to every caller.
///

#[derive(Debug, Default)]
pub struct PlanCache {
    plans: Mutex<BTreeMap<PlanCacheKey, Arc<QueryPlan>>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl PlanCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached plan for the builder's shape, building it on miss.
    pub fn get_or_build(
        &self,
        builder: &QueryPlanBuilder<'_>,
    ) -> Result<Arc<QueryPlan>, InternalError> {
        let key = builder.cache_key();

        if let Some(plan) = self.plans().get(&key).cloned() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            if builder.metrics_enabled() {
                sink::record(MetricsEvent::PlanCache { hit: true });
            }
            return Ok(plan);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        if builder.metrics_enabled() {
            sink::record(MetricsEvent::PlanCache { hit: false });
        }

        // Build outside the lock; a concurrent builder of the same shape
        // may win the insert, in which case its plan is returned.
        let plan = Arc::new(builder.build()?);
        let cached = Arc::clone(self.plans().entry(key).or_insert(plan));

        Ok(cached)
    }

    // Cache statistics are best-effort only.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            size: self.plans().len(),
        }
    }

    pub fn clear(&self) {
        self.plans().clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    // Cached plans are immutable, so a panic while holding the lock cannot
    // leave the map half-updated.
    fn plans(&self) -> MutexGuard<'_, BTreeMap<PlanCacheKey, Arc<QueryPlan>>> {
        self.plans.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
