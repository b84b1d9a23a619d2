//! Core runtime for rowgraph: navigable paths, the mapping model, fetch plans,
//! the initializer state machine, and the row driver that turns flat joined
//! rows into an identity-preserving object graph.
#![warn(unreachable_pub)]

// public exports are one module level down
pub mod config;
pub mod context;
pub mod error;
pub mod exec;
pub mod graph;
pub mod model;
pub mod obs;
pub mod path;
pub mod plan;
pub mod value;

// test
#[cfg(test)]
pub(crate) mod test_support;

///
/// CONSTANTS
///

/// Segment appended to an entity path to address its identifier.
pub const IDENTIFIER_SEGMENT: &str = "{id}";

/// Segment appended to a collection path to address its element.
pub const ELEMENT_SEGMENT: &str = "{element}";

///
/// Prelude
///
/// Prelude contains only domain vocabulary.
/// No errors, processors, caches, or helpers are re-exported here.
///

pub mod prelude {
    pub use crate::{
        context::{InstanceId, PersistenceContext},
        model::{AttributeModel, EntityModel, FetchOptions, FetchTiming, MappingModel},
        path::NavigablePath,
        value::{IdValue, Value},
    };
}
