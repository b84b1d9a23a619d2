//! ## Crate layout
//! - `core`: mapping model, fetch plans, the persistence context, and the
//!   row driver that materializes joined rows into an object graph.
//! - `error`: public error type with a stable kind + origin taxonomy.
//!
//! The `prelude` module carries what a caller needs to build a model, plan a
//! query, and run rows through it.

pub use rowgraph_core as core;

pub mod error;

pub use error::Error;

//
// Consts
//

/// Workspace version re-export for downstream tooling/tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

///
/// Prelude
///

pub mod prelude {
    pub use crate::{
        Error,
        core::{
            config::MaterializeConfig,
            context::{EntityKey, FieldValue, InstanceId, PersistenceContext},
            exec::{
                ExecutionOptions, ExecutionOutcome, JdbcValues, UniqueSemantic, VecJdbcValues,
                execute,
            },
            graph::EntityGraph,
            model::{
                AttributeModel, CollectionSemantics, EmbeddableModel, EntityModel, FetchOptions,
                MappingModel, NotFoundAction,
            },
            path::NavigablePath,
            plan::{PlanCache, QueryPlan, QueryPlanBuilder},
            value::{IdValue, Value},
        },
    };
}
