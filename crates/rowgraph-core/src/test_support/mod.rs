//! Shared fixtures and row builders for unit tests.

pub(crate) mod fixtures;

use crate::{path::NavigablePath, plan::QueryPlan, value::Value};

///
/// RowBuilder
///
/// Lays out one row for a plan by navigable path and column name.
/// Columns that are not set stay NULL.
///

pub(crate) struct RowBuilder<'p> {
    plan: &'p QueryPlan,
    row: Vec<Value>,
}

impl<'p> RowBuilder<'p> {
    pub(crate) fn new(plan: &'p QueryPlan) -> Self {
        Self {
            plan,
            row: vec![Value::Null; plan.selections().width()],
        }
    }

    /// Set `column` of the joined node at `path` (e.g. `Order.lineItems.{element}`).
    pub(crate) fn set(mut self, path: &str, column: &str, value: impl Into<Value>) -> Self {
        let position = self
            .plan
            .position_of(path, column)
            .unwrap_or_else(|| panic!("plan selects no column '{column}' at '{path}'"));
        self.row[position] = value.into();
        self
    }

    pub(crate) fn build(self) -> Vec<Value> {
        self.row
    }
}

/// Parse a rendered path such as `Order.lineItems.{element}`.
pub(crate) fn path(rendered: &str) -> NavigablePath {
    let mut segments = rendered.split('.');
    let root = segments.next().unwrap_or_default();

    segments.fold(NavigablePath::root(root), |path, segment| path.append(segment))
}
