use crate::{
    config::MaterializeConfig,
    context::{ExecutionId, InstanceId, PersistenceContext},
    error::{ErrorOrigin, InternalError, RowError},
    exec::{
        InitializerCounters, InitializerData, InitializerGraph, InitializerState, JdbcValues,
        PostLoadActions, ResultListConsumer, ResultRow, UniqueSemantic,
        initializer::RowProcessingState,
    },
    obs::sink::{self, ExecSpan, MetricsEvent},
    path::NavigablePath,
    plan::QueryPlan,
    value::Value,
};

///
/// ExecutionOptions
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ExecutionOptions {
    /// Overrides the plan-derived de-duplication policy.
    pub unique_semantic: Option<UniqueSemantic>,
    pub batch_fetch_size: u32,
    /// Existing instance the root result must resolve to.
    pub instance_to_load: Option<InstanceId>,
    pub metrics: bool,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            unique_semantic: None,
            batch_fetch_size: 1,
            instance_to_load: None,
            metrics: true,
        }
    }
}

impl ExecutionOptions {
    #[must_use]
    pub const fn from_config(config: &MaterializeConfig) -> Self {
        Self {
            unique_semantic: config.unique_semantic,
            batch_fetch_size: config.batch_fetch_size,
            instance_to_load: None,
            metrics: config.metrics,
        }
    }

    #[must_use]
    pub const fn with_instance_to_load(mut self, instance: InstanceId) -> Self {
        self.instance_to_load = Some(instance);
        self
    }

    #[must_use]
    pub const fn with_unique_semantic(mut self, semantic: UniqueSemantic) -> Self {
        self.unique_semantic = Some(semantic);
        self
    }

    #[must_use]
    pub const fn without_metrics(mut self) -> Self {
        self.metrics = false;
        self
    }
}

///
/// ExecutionStats
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ExecutionStats {
    pub rows: u64,
    pub results: u64,
    pub entities_created: u64,
    pub proxies_created: u64,
    pub collections_loaded: u64,
    pub reuses: u64,
}

///
/// ExecutionOutcome
///

#[derive(Debug)]
pub struct ExecutionOutcome {
    pub rows: Vec<ResultRow>,
    pub post_load: PostLoadActions,
    pub stats: ExecutionStats,
}

///
/// ResultSetProcessor
///
/// Row driver for one execution of a plan. Owns the initializer graph and
/// its row-scoped data table; every row runs each lifecycle step across
/// the whole graph before the next step starts.
///

#[derive(Debug)]
pub struct ResultSetProcessor<'p> {
    plan: &'p QueryPlan,
    graph: InitializerGraph,
    data: Vec<InitializerData>,
    options: ExecutionOptions,
    consumer: ResultListConsumer,
    post_load: PostLoadActions,
    stats: ExecutionStats,
    execution: Option<ExecutionId>,
}

impl<'p> ResultSetProcessor<'p> {
    pub fn new(plan: &'p QueryPlan, options: ExecutionOptions) -> Result<Self, InternalError> {
        let graph = InitializerGraph::build(plan)?;
        let semantic = options
            .unique_semantic
            .unwrap_or_else(|| UniqueSemantic::for_plan(plan));

        Ok(Self {
            plan,
            data: vec![InitializerData::default(); graph.len()],
            graph,
            options,
            consumer: ResultListConsumer::new(semantic),
            post_load: PostLoadActions::new(options.batch_fetch_size),
            stats: ExecutionStats::default(),
            execution: None,
        })
    }

    #[must_use]
    pub const fn graph(&self) -> &InitializerGraph {
        &self.graph
    }

    #[must_use]
    pub const fn is_loading(&self) -> bool {
        self.execution.is_some()
    }

    pub fn start_loading(&mut self, pc: &mut PersistenceContext) -> Result<(), InternalError> {
        if self.execution.is_some() {
            return Err(InternalError::driver_invariant(
                "result set processing already started",
            ));
        }

        let execution = pc.begin_execution();
        for (node, data) in self.graph.nodes().iter().zip(&mut self.data) {
            node.as_initializer().start_loading(data);
        }
        self.execution = Some(execution);

        tracing::debug!(
            root = %self.plan.root_path(),
            initializers = self.graph.len(),
            "loading started"
        );

        Ok(())
    }

    pub fn process_row(
        &mut self,
        pc: &mut PersistenceContext,
        row: &[Value],
    ) -> Result<(), InternalError> {
        let execution = self
            .execution
            .ok_or_else(|| InternalError::driver_invariant("row processed outside of loading"))?;

        let expected = self.plan.selections().width();
        if row.len() != expected {
            return Err(InternalError::row(
                ErrorOrigin::Driver,
                RowError::RowWidth {
                    expected,
                    found: row.len(),
                },
            ));
        }

        for data in &mut self.data {
            data.reset_row();
        }

        let nodes = self.graph.nodes();
        let mut rs = RowProcessingState {
            graph: &self.graph,
            row,
            data: &mut self.data,
            pc,
            execution,
            post_load: &mut self.post_load,
            stats: &mut self.stats,
        };

        // keys: a node whose parent is MISSING is never visited on this row
        for node in nodes {
            let init = node.as_initializer();
            if rs.is_active(init.parent()) {
                init.resolve_key(&mut rs)?;
            }
        }

        // instances
        for node in nodes {
            let init = node.as_initializer();
            if rs.data(init.id()).state != InitializerState::KeyResolved
                || !rs.is_active(init.parent())
            {
                continue;
            }

            match self.options.instance_to_load {
                Some(instance) if self.graph.root() == Some(init.id()) => {
                    init.resolve_instance_with(instance, &mut rs)?;
                }
                _ => init.resolve_instance(&mut rs)?,
            }
        }

        // state
        for node in nodes {
            let init = node.as_initializer();
            if rs.data(init.id()).state == InitializerState::Resolved {
                init.resolve_state(&mut rs)?;
            }
        }
        for assembler in self.graph.results() {
            assembler.resolve_state(&rs)?;
        }

        // children complete before their parents are written
        for node in nodes.iter().rev() {
            let init = node.as_initializer();
            if rs.data(init.id()).state == InitializerState::Resolved {
                init.initialize_instance(&mut rs)?;
            }
        }

        let result = self
            .graph
            .results()
            .iter()
            .map(|assembler| assembler.assemble(&rs))
            .collect::<Result<ResultRow, _>>()?;

        for node in nodes {
            let init = node.as_initializer();
            init.finish_up_row(rs.data_mut(init.id()));
        }

        let index = usize::try_from(self.stats.rows).unwrap_or(usize::MAX);
        self.consumer.consume(result, index)?;
        self.stats.rows += 1;
        self.stats.results = self.consumer.rows().len() as u64;

        tracing::trace!(row = index, "row processed");

        Ok(())
    }

    /// Settle the execution. Safe to call more than once; only the first
    /// call after `start_loading` has an effect.
    pub fn end_loading(&mut self, pc: &mut PersistenceContext, succeeded: bool) {
        let Some(execution) = self.execution.take() else {
            return;
        };

        for (node, data) in self.graph.nodes().iter().zip(&mut self.data) {
            node.as_initializer().end_loading(data);
        }
        pc.finish_loading(execution, succeeded);
        self.post_load.prune(pc);

        if self.options.metrics {
            sink::record(MetricsEvent::Materialized {
                root: self.plan.root_path().root_name().to_string(),
                entities: self.stats.entities_created,
                proxies: self.stats.proxies_created,
                collections: self.stats.collections_loaded,
                reuses: self.stats.reuses,
            });
        }

        tracing::debug!(
            root = %self.plan.root_path(),
            rows = self.stats.rows,
            succeeded,
            "loading finished"
        );
    }

    // ─────────────────────────────────────────────
    // INSPECTION
    // ─────────────────────────────────────────────

    #[must_use]
    pub fn data(&self, path: &NavigablePath) -> Option<&InitializerData> {
        self.graph.find(path).and_then(|id| self.data.get(id.0))
    }

    /// Every initializer with its row data, in pre-order.
    pub fn initializers(&self) -> impl Iterator<Item = (&NavigablePath, &InitializerData)> {
        self.graph
            .nodes()
            .iter()
            .zip(&self.data)
            .map(|(node, data)| (node.as_initializer().navigable_path(), data))
    }

    /// State of the initializer at `path` after the last processed row.
    #[must_use]
    pub fn state(&self, path: &NavigablePath) -> Option<InitializerState> {
        self.data(path).map(InitializerData::state)
    }

    #[must_use]
    pub fn instance(&self, path: &NavigablePath) -> Option<InstanceId> {
        self.data(path).and_then(InitializerData::instance)
    }

    #[must_use]
    pub fn counters(&self, path: &NavigablePath) -> Option<InitializerCounters> {
        self.data(path).map(InitializerData::counters)
    }

    #[must_use]
    pub fn rows(&self) -> &[ResultRow] {
        self.consumer.rows()
    }

    #[must_use]
    pub const fn stats(&self) -> ExecutionStats {
        self.stats
    }

    #[must_use]
    pub const fn post_load(&self) -> &PostLoadActions {
        &self.post_load
    }

    #[must_use]
    pub fn finish(self) -> ExecutionOutcome {
        ExecutionOutcome {
            rows: self.consumer.into_rows(),
            post_load: self.post_load,
            stats: self.stats,
        }
    }
}

/// Process every row of `values` against `plan`.
///
/// The execution is settled in `pc` on every exit; on failure, partially
/// loaded collections are discarded and unhydrated entities stay proxies.
pub fn execute(
    plan: &QueryPlan,
    pc: &mut PersistenceContext,
    values: &mut dyn JdbcValues,
    options: ExecutionOptions,
) -> Result<ExecutionOutcome, InternalError> {
    let mut span = ExecSpan::new(plan.root_path().root_name(), options.metrics);
    let mut processor = ResultSetProcessor::new(plan, options)?;

    processor.start_loading(pc)?;
    let pumped = pump(&mut processor, pc, values);
    processor.end_loading(pc, pumped.is_ok());
    span.set_rows(processor.stats().rows);

    if let Err(err) = pumped {
        tracing::debug!(
            root = %plan.root_path(),
            error = %err,
            "execution failed"
        );
        return Err(err);
    }
    span.succeed();

    Ok(processor.finish())
}

fn pump(
    processor: &mut ResultSetProcessor<'_>,
    pc: &mut PersistenceContext,
    values: &mut dyn JdbcValues,
) -> Result<(), InternalError> {
    while values.next()? {
        processor.process_row(pc, values.current())?;
    }

    Ok(())
}
