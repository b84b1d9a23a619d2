use crate::{
    context::FieldValue,
    error::{ErrorOrigin, InternalError, RowError},
    plan::QueryPlan,
};
use serde::Deserialize;
use std::collections::HashSet;

///
/// UniqueSemantic
///
/// How repeated result rows are treated. Join-fetching a collection repeats
/// the owner once per element, so such plans filter by default.
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum UniqueSemantic {
    #[default]
    None,
    Filter,
    Assert,
}

impl UniqueSemantic {
    #[must_use]
    pub const fn for_plan(plan: &QueryPlan) -> Self {
        if plan.has_joined_collection() {
            Self::Filter
        } else {
            Self::None
        }
    }
}

/// Top-level values of one result row, in result order.
pub type ResultRow = Vec<FieldValue>;

///
/// ResultListConsumer
///

#[derive(Debug)]
pub struct ResultListConsumer {
    semantic: UniqueSemantic,
    rows: Vec<ResultRow>,
    seen: HashSet<ResultRow>,
}

impl ResultListConsumer {
    #[must_use]
    pub fn new(semantic: UniqueSemantic) -> Self {
        Self {
            semantic,
            rows: Vec::new(),
            seen: HashSet::new(),
        }
    }

    #[must_use]
    pub const fn semantic(&self) -> UniqueSemantic {
        self.semantic
    }

    /// Accept the row assembled from source row `index`.
    pub fn consume(&mut self, row: ResultRow, index: usize) -> Result<(), InternalError> {
        match self.semantic {
            UniqueSemantic::None => {}
            UniqueSemantic::Filter => {
                if !self.seen.insert(row.clone()) {
                    return Ok(());
                }
            }
            UniqueSemantic::Assert => {
                if !self.seen.insert(row.clone()) {
                    return Err(InternalError::row(
                        ErrorOrigin::Driver,
                        RowError::DuplicateResult { row: index },
                    ));
                }
            }
        }
        self.rows.push(row);

        Ok(())
    }

    #[must_use]
    pub fn rows(&self) -> &[ResultRow] {
        &self.rows
    }

    #[must_use]
    pub fn into_rows(self) -> Vec<ResultRow> {
        self.rows
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::InstanceId;

    fn row(instance: usize) -> ResultRow {
        vec![FieldValue::Entity(Some(InstanceId(instance)))]
    }

    #[test]
    fn filter_keeps_first_occurrence_in_order() {
        let mut consumer = ResultListConsumer::new(UniqueSemantic::Filter);
        for (index, instance) in [2, 1, 2, 1, 3].into_iter().enumerate() {
            consumer.consume(row(instance), index).expect("filter should accept duplicates");
        }

        assert_eq!(consumer.into_rows(), vec![row(2), row(1), row(3)]);
    }

    #[test]
    fn none_keeps_every_row() {
        let mut consumer = ResultListConsumer::new(UniqueSemantic::None);
        consumer.consume(row(1), 0).expect("consume should succeed");
        consumer.consume(row(1), 1).expect("consume should succeed");

        assert_eq!(consumer.rows().len(), 2);
    }

    #[test]
    fn assert_rejects_the_second_occurrence() {
        let mut consumer = ResultListConsumer::new(UniqueSemantic::Assert);
        consumer.consume(row(1), 0).expect("first row should be accepted");

        let err = consumer
            .consume(row(1), 1)
            .expect_err("duplicate should be rejected");
        assert_eq!(err.row_error(), Some(&RowError::DuplicateResult { row: 1 }));
        assert_eq!(err.origin, ErrorOrigin::Driver);
    }
}
