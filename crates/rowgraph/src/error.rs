use derive_more::Display;
use rowgraph_core::{
    config::ConfigError,
    error::{ErrorClass, ErrorOrigin as CoreErrorOrigin, InternalError},
    model::ModelError,
};
use serde::Serialize;
use thiserror::Error as ThisError;

///
/// Error
/// Public error type with a stable kind + origin taxonomy.
///

#[derive(Debug, Serialize, ThisError)]
#[error("{message}")]
pub struct Error {
    pub kind: ErrorKind,
    pub origin: ErrorOrigin,
    pub message: String,
}

impl Error {
    pub fn new(kind: ErrorKind, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            kind,
            origin,
            message: message.into(),
        }
    }
}

impl From<InternalError> for Error {
    fn from(err: InternalError) -> Self {
        let kind = if err.is_plan_error() {
            match err.class {
                ErrorClass::NotFound => ErrorKind::Plan(PlanErrorKind::Unknown),
                ErrorClass::Unsupported => ErrorKind::Plan(PlanErrorKind::Unsupported),
                _ => ErrorKind::Plan(PlanErrorKind::Invalid),
            }
        } else if err.is_row_error() {
            match err.class {
                ErrorClass::NotFound => ErrorKind::Row(RowErrorKind::NotFound),
                ErrorClass::Conflict => ErrorKind::Row(RowErrorKind::Conflict),
                _ => ErrorKind::Row(RowErrorKind::Invalid),
            }
        } else {
            match err.origin {
                CoreErrorOrigin::Model => ErrorKind::Model,
                CoreErrorOrigin::Config => ErrorKind::Config,
                _ => ErrorKind::Internal,
            }
        };

        Self::new(kind, err.origin.into(), err.message)
    }
}

impl From<ModelError> for Error {
    fn from(err: ModelError) -> Self {
        InternalError::from(err).into()
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        InternalError::from(err).into()
    }
}

///
/// ErrorKind
/// Public error taxonomy for callers.
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub enum ErrorKind {
    /// Mapping model failed validation.
    Model,
    Plan(PlanErrorKind),
    Row(RowErrorKind),
    Config,

    /// The caller cannot remediate this.
    Internal,
}

///
/// PlanErrorKind
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub enum PlanErrorKind {
    /// Unknown entity, attribute, or fetch profile.
    Unknown,

    /// The mapping asks for a fetch this engine does not support.
    Unsupported,

    /// Inconsistent identifier shape or graph misuse.
    Invalid,
}

///
/// RowErrorKind
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub enum RowErrorKind {
    /// Dangling foreign key or unknown discriminator.
    NotFound,

    /// Duplicate result, list index conflict, or explicit instance mismatch.
    Conflict,

    /// Row values do not fit the plan.
    Invalid,
}

///
/// ErrorOrigin
/// Public origin taxonomy for callers.
///

#[derive(Clone, Copy, Debug, Display, Eq, PartialEq, Serialize)]
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

impl From<CoreErrorOrigin> for ErrorOrigin {
    fn from(origin: CoreErrorOrigin) -> Self {
        match origin {
            CoreErrorOrigin::Model => Self::Model,
            CoreErrorOrigin::Plan => Self::Plan,
            CoreErrorOrigin::EntityGraph => Self::EntityGraph,
            CoreErrorOrigin::Initializer => Self::Initializer,
            CoreErrorOrigin::Assembler => Self::Assembler,
            CoreErrorOrigin::Driver => Self::Driver,
            CoreErrorOrigin::Context => Self::Context,
            CoreErrorOrigin::Config => Self::Config,
        }
    }
}

///
/// TESTS
///
