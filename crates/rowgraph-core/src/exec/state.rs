use crate::error::InternalError;
use std::fmt;

///
/// InitializerId
///
/// Stable slot of an initializer in its graph and in the row-scoped data
/// table. Ids are assigned in pre-order, so a parent always precedes its
/// children.
///

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct InitializerId(pub(crate) usize);

impl InitializerId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for InitializerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "i{}", self.0)
    }
}

///
/// InitializerState
///
/// Per-row progress of one initializer. Within a row the state only moves
/// forward; `Missing` and `Initialized` are terminal.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum InitializerState {
    #[default]
    Uninitialized,
    KeyResolved,
    Missing,
    Resolved,
    Initialized,
}

impl InitializerState {
    /// Whether `next` is a legal forward step from this state.
    #[must_use]
    pub const fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (
                Self::Uninitialized,
                Self::KeyResolved | Self::Missing | Self::Resolved | Self::Initialized
            ) | (
                Self::KeyResolved,
                Self::Resolved | Self::Missing | Self::Initialized
            ) | (Self::Resolved, Self::Initialized)
        )
    }

    /// Move to `next`, rejecting backward or repeated transitions.
    pub fn advance(&mut self, next: Self) -> Result<(), InternalError> {
        if !self.can_advance_to(next) {
            return Err(InternalError::initializer_invariant(format!(
                "illegal initializer transition {self} -> {next}"
            )));
        }
        *self = next;

        Ok(())
    }

    /// Children of a node in this state take part in the row.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::KeyResolved | Self::Resolved | Self::Initialized)
    }
}

impl fmt::Display for InitializerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Uninitialized => "UNINITIALIZED",
            Self::KeyResolved => "KEY_RESOLVED",
            Self::Missing => "MISSING",
            Self::Resolved => "RESOLVED",
            Self::Initialized => "INITIALIZED",
        };
        f.write_str(label)
    }
}
