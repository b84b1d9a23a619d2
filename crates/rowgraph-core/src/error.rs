use crate::{config::ConfigError, model::ModelError};
use std::fmt;
use thiserror::Error as ThisError;

///
/// InternalError
///
/// Structured runtime error with a stable internal classification.
/// Plan-construction and row-resolution failures carry their structured
/// cause in `detail`; everything else is an invariant or internal fault.
///

#[derive(Debug, ThisError)]
#[error("{message}")]
pub struct InternalError {
    pub class: ErrorClass,
    pub origin: ErrorOrigin,
    pub message: String,

    /// Optional structured error detail.
    /// The variant (if present) must correspond to `origin`.
    pub detail: Option<ErrorDetail>,
}

impl InternalError {
    /// Construct an InternalError without structured detail.
    pub fn new(class: ErrorClass, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            class,
            origin,
            message: message.into(),
            detail: None,
        }
    }

    /// Construct a plan-origin invariant violation.
    pub(crate) fn plan_invariant(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::InvariantViolation, ErrorOrigin::Plan, message)
    }

    /// Construct an entity-graph-origin invariant violation.
    pub(crate) fn graph_invariant(message: impl Into<String>) -> Self {
        Self::new(
            ErrorClass::InvariantViolation,
            ErrorOrigin::EntityGraph,
            message,
        )
    }

    /// Construct an initializer-origin invariant violation.
    pub(crate) fn initializer_invariant(message: impl Into<String>) -> Self {
        Self::new(
            ErrorClass::InvariantViolation,
            ErrorOrigin::Initializer,
            message,
        )
    }

    /// Construct a driver-origin invariant violation.
    pub(crate) fn driver_invariant(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::InvariantViolation, ErrorOrigin::Driver, message)
    }

    /// Construct a persistence-context-origin invariant violation.
    pub(crate) fn context_invariant(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::InvariantViolation, ErrorOrigin::Context, message)
    }

    /// Construct a persistence-context-origin not-found error.
    pub(crate) fn context_not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::NotFound, ErrorOrigin::Context, message)
    }

    /// Attach a row-resolution cause raised at a specific origin.
    pub(crate) fn row(origin: ErrorOrigin, err: RowError) -> Self {
        Self {
            class: err.class(),
            origin,
            message: err.to_string(),
            detail: Some(ErrorDetail::Row(err)),
        }
    }

    #[must_use]
    pub const fn is_plan_error(&self) -> bool {
        matches!(self.detail, Some(ErrorDetail::Plan(_)))
    }

    #[must_use]
    pub const fn is_row_error(&self) -> bool {
        matches!(self.detail, Some(ErrorDetail::Row(_)))
    }

    /// Borrow the row-resolution cause, if this error carries one.
    #[must_use]
    pub const fn row_error(&self) -> Option<&RowError> {
        match &self.detail {
            Some(ErrorDetail::Row(err)) => Some(err),
            _ => None,
        }
    }

    /// Borrow the plan-construction cause, if this error carries one.
    #[must_use]
    pub const fn plan_error(&self) -> Option<&PlanError> {
        match &self.detail {
            Some(ErrorDetail::Plan(err)) => Some(err),
            _ => None,
        }
    }

    #[must_use]
    pub fn display_with_class(&self) -> String {
        format!("{}:{}: {}", self.origin, self.class, self.message)
    }
}

///
/// ErrorDetail
///
/// Structured, origin-specific error detail carried by [`InternalError`].
///

#[derive(Debug, ThisError)]
pub enum ErrorDetail {
    #[error("{0}")]
    Model(ModelError),
    #[error("{0}")]
    Plan(PlanError),
    #[error("{0}")]
    Row(RowError),
    #[error("{0}")]
    Config(ConfigError),
}

impl From<ModelError> for InternalError {
    fn from(err: ModelError) -> Self {
        Self {
            class: ErrorClass::InvariantViolation,
            origin: ErrorOrigin::Model,
            message: err.to_string(),
            detail: Some(ErrorDetail::Model(err)),
        }
    }
}

impl From<PlanError> for InternalError {
    fn from(err: PlanError) -> Self {
        let origin = err.origin();

        Self {
            class: err.class(),
            origin,
            message: err.to_string(),
            detail: Some(ErrorDetail::Plan(err)),
        }
    }
}

impl From<RowError> for InternalError {
    fn from(err: RowError) -> Self {
        Self::row(ErrorOrigin::Initializer, err)
    }
}

impl From<ConfigError> for InternalError {
    fn from(err: ConfigError) -> Self {
        Self {
            class: ErrorClass::Unsupported,
            origin: ErrorOrigin::Config,
            message: err.to_string(),
            detail: Some(ErrorDetail::Config(err)),
        }
    }
}

///
/// PlanError
///
/// Plan-construction failure. Fatal for the query compilation that raised
/// it; the partially built plan is discarded and never cached.
///

#[derive(Debug, ThisError)]
pub enum PlanError {
    #[error("no persister for entity '{entity}'")]
    UnknownEntity { entity: String },

    #[error("entity '{entity}' has no attribute '{attribute}'")]
    UnknownAttribute { entity: String, attribute: String },

    #[error(
        "inconsistent identifier shape at '{path}': expected {expected} column(s), found {found}"
    )]
    InconsistentIdentifier {
        path: String,
        expected: usize,
        found: usize,
    },

    #[error("attribute '{attribute}' cannot be selected as a scalar result: {reason}")]
    UnsupportedResult { attribute: String, reason: String },

    #[error("entity graph for '{graph_root}' cannot be applied to '{entity}'")]
    GraphRootMismatch { graph_root: String, entity: String },

    #[error("entity graph names unknown attribute '{attribute}' on '{container}'")]
    GraphAttributeNotFound { container: String, attribute: String },

    #[error("malformed entity graph at offset {offset}: {message}")]
    GraphSyntax { offset: usize, message: String },

    #[error("re-entered circular fetch resolution at '{path}'")]
    CircularResolutionReentry { path: String },

    #[error("unknown fetch profile '{profile}'")]
    UnknownFetchProfile { profile: String },
}

impl PlanError {
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::UnknownEntity { .. }
            | Self::UnknownAttribute { .. }
            | Self::UnknownFetchProfile { .. } => ErrorClass::NotFound,
            Self::InconsistentIdentifier { .. } | Self::CircularResolutionReentry { .. } => {
                ErrorClass::InvariantViolation
            }
            Self::UnsupportedResult { .. }
            | Self::GraphRootMismatch { .. }
            | Self::GraphAttributeNotFound { .. }
            | Self::GraphSyntax { .. } => ErrorClass::Unsupported,
        }
    }

    #[must_use]
    pub const fn origin(&self) -> ErrorOrigin {
        match self {
            Self::GraphRootMismatch { .. }
            | Self::GraphAttributeNotFound { .. }
            | Self::GraphSyntax { .. } => ErrorOrigin::EntityGraph,
            _ => ErrorOrigin::Plan,
        }
    }
}

///
/// RowError
///
/// Row-resolution failure. Fatal for the execution that raised it: the row
/// driver stops pumping rows and the execution is reported as failed.
///

#[derive(Debug, Eq, PartialEq, ThisError)]
pub enum RowError {
    #[error("malformed key at '{path}': {reason}")]
    MalformedKey { path: String, reason: String },

    #[error("key column '{column}' at '{path}' holds unsupported {found} value")]
    KeyTypeMismatch {
        path: String,
        column: String,
        found: &'static str,
    },

    #[error("unexpected null in not-null column '{column}' at '{path}'")]
    UnexpectedNull { path: String, column: String },

    #[error("row width mismatch: plan selects {expected} column(s), row carries {found}")]
    RowWidth { expected: usize, found: usize },

    #[error("unknown discriminator {value} for any-valued association '{path}'")]
    UnknownDiscriminator { path: String, value: String },

    #[error("no row of '{entity}' with identifier {key} for association '{path}'")]
    FetchNotFound {
        path: String,
        entity: String,
        key: String,
    },

    #[error("list index {index} at '{path}' already holds a different element")]
    ListIndexConflict { path: String, index: usize },

    #[error("duplicate result row {row} under unique-result assertion")]
    DuplicateResult { row: usize },

    #[error("explicit instance {instance} does not match row key {key} at '{path}'")]
    ExplicitInstanceMismatch {
        path: String,
        instance: String,
        key: String,
    },
}

impl RowError {
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::MalformedKey { .. } | Self::RowWidth { .. } => ErrorClass::InvariantViolation,
            Self::KeyTypeMismatch { .. } | Self::UnexpectedNull { .. } => {
                ErrorClass::TypeMismatch
            }
            Self::UnknownDiscriminator { .. } | Self::FetchNotFound { .. } => {
                ErrorClass::NotFound
            }
            Self::ListIndexConflict { .. }
            | Self::DuplicateResult { .. }
            | Self::ExplicitInstanceMismatch { .. } => ErrorClass::Conflict,
        }
    }
}

///
/// ErrorClass
/// Internal error taxonomy for runtime classification.
/// Not a stable API; may change without notice.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    Unsupported,
    InvariantViolation,
    NotFound,
    TypeMismatch,
    Conflict,
    Internal,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Unsupported => "unsupported",
            Self::InvariantViolation => "invariant_violation",
            Self::NotFound => "not_found",
            Self::TypeMismatch => "type_mismatch",
            Self::Conflict => "conflict",
            Self::Internal => "internal",
        };
        write!(f, "{label}")
    }
}

///
/// ErrorOrigin
/// Internal origin taxonomy for runtime classification.
/// Not a stable API; may change without notice.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorOrigin {
    Model,
    Plan,
    EntityGraph,
    Initializer,
    Assembler,
    Driver,
    Context,
    Config,
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Model => "model",
            Self::Plan => "plan",
            Self::EntityGraph => "entity_graph",
            Self::Initializer => "initializer",
            Self::Assembler => "assembler",
            Self::Driver => "driver",
            Self::Context => "context",
            Self::Config => "config",
        };
        write!(f, "{label}")
    }
}

///
/// TESTS
///
