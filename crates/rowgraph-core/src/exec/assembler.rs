use crate::{
    context::FieldValue,
    error::{ErrorOrigin, InternalError, RowError},
    exec::{InitializerId, initializer::RowProcessingState},
    path::NavigablePath,
    value::Value,
};

///
/// DomainResultAssembler
///
/// Pulls one value for the current row: a top-level result value or one
/// attribute slot of an entity or embeddable. Child kinds read their
/// initializer's row data, so repeated calls within a row return the same
/// value without touching the row again.
///

#[derive(Clone, Debug)]
pub enum DomainResultAssembler {
    Basic {
        path: NavigablePath,
        column: String,
        position: usize,
        nullable: bool,
    },
    /// Basic attribute excluded from the fetch.
    UnfetchedBasic,
    /// Embeddable excluded from the fetch.
    Unfetched,
    Entity(InitializerId),
    Collection(InitializerId),
    Embeddable(InitializerId),
}

impl DomainResultAssembler {
    pub(crate) fn assemble(&self, rs: &RowProcessingState<'_>) -> Result<FieldValue, InternalError> {
        let value = match self {
            Self::Basic { .. } => FieldValue::Basic(self.read_basic(rs)?.clone()),
            Self::UnfetchedBasic | Self::Unfetched => FieldValue::Unfetched,
            Self::Entity(id) | Self::Collection(id) | Self::Embeddable(id) => {
                let node = rs.graph.node(*id).ok_or_else(|| {
                    InternalError::initializer_invariant(format!("assembler reads unknown initializer {id}"))
                })?;

                node.as_initializer().field_value(rs.data(*id))
            }
        };

        Ok(value)
    }

    /// Validate the row value without materializing it.
    pub(crate) fn resolve_state(&self, rs: &RowProcessingState<'_>) -> Result<(), InternalError> {
        if matches!(self, Self::Basic { .. }) {
            self.read_basic(rs)?;
        }

        Ok(())
    }

    /// Value comes from a child initializer rather than the row.
    #[must_use]
    pub const fn is_child(&self) -> bool {
        matches!(
            self,
            Self::Entity(_) | Self::Collection(_) | Self::Embeddable(_)
        )
    }

    fn read_basic<'r>(&self, rs: &'r RowProcessingState<'_>) -> Result<&'r Value, InternalError> {
        let Self::Basic {
            path,
            column,
            position,
            nullable,
        } = self
        else {
            return Err(InternalError::initializer_invariant(
                "column read through a non-basic assembler",
            ));
        };

        let value = rs.column(*position);
        if value.is_null() && !nullable {
            return Err(InternalError::row(
                ErrorOrigin::Assembler,
                RowError::UnexpectedNull {
                    path: path.full_path(),
                    column: column.clone(),
                },
            ));
        }

        Ok(value)
    }
}
