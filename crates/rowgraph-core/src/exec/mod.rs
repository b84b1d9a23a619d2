//! Module: exec
//! Responsibility: the per-execution runtime. Builds the initializer graph
//! for a plan, drives the initializer lifecycle row by row, and collects
//! result rows and pending loads.
//! Does not own: plan construction (plan) or object storage (context).
//! Boundary: rows arrive through `JdbcValues`; materialized state leaves
//! through `PersistenceContext`.

mod assembler;
mod consumer;
mod data;
mod graph;
mod initializer;
mod post_load;
mod processor;
mod source;
mod state;

#[cfg(test)]
mod tests;

// re-exports
pub use assembler::DomainResultAssembler;
pub use consumer::{ResultListConsumer, ResultRow, UniqueSemantic};
pub use data::{InitializerCounters, InitializerData};
pub use graph::InitializerGraph;
pub use post_load::{PendingCollectionLoad, PendingLoad, PostLoadActions};
pub use processor::{
    ExecutionOptions, ExecutionOutcome, ExecutionStats, ResultSetProcessor, execute,
};
pub use source::{JdbcValues, VecJdbcValues};
pub use state::{InitializerId, InitializerState};
