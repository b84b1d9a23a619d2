use crate::{path::NavigablePath, plan::TableAlias};
use derive_more::Deref;
use std::collections::HashMap;

///
/// SqlSelection
///
/// One column of the row, addressed by its position. `path` is the first
/// navigable that selected the column.
///

#[derive(Clone, Debug)]
pub struct SqlSelection {
    pub position: usize,
    pub alias: TableAlias,
    pub column: String,
    pub path: NavigablePath,
}

///
/// SelectionList
///
/// Ordered row layout of a plan. Each (alias, column) pair appears once.
///

#[derive(Clone, Debug, Default, Deref)]
pub struct SelectionList(Vec<SqlSelection>);

impl SelectionList {
    /// Row position of `column` on table alias `alias`.
    #[must_use]
    pub fn position(&self, alias: &str, column: &str) -> Option<usize> {
        self.0
            .iter()
            .find(|s| s.alias.as_str() == alias && s.column == column)
            .map(|s| s.position)
    }

    /// Row width the driver must deliver.
    #[must_use]
    pub fn width(&self) -> usize {
        self.0.len()
    }
}

///
/// SelectionListBuilder
///

#[derive(Debug, Default)]
pub(crate) struct SelectionListBuilder {
    selections: Vec<SqlSelection>,
    index: HashMap<(TableAlias, String), usize>,
}

impl SelectionListBuilder {
    /// Select one column, reusing the position of an earlier identical pick.
    pub(crate) fn select(&mut self, alias: &TableAlias, column: &str, path: &NavigablePath) -> usize {
        let key = (alias.clone(), column.to_string());
        if let Some(position) = self.index.get(&key) {
            return *position;
        }

        let position = self.selections.len();
        self.selections.push(SqlSelection {
            position,
            alias: alias.clone(),
            column: column.to_string(),
            path: path.clone(),
        });
        self.index.insert(key, position);

        position
    }

    pub(crate) fn select_all(
        &mut self,
        alias: &TableAlias,
        columns: &[String],
        path: &NavigablePath,
    ) -> Vec<usize> {
        columns
            .iter()
            .map(|column| self.select(alias, column, path))
            .collect()
    }

    pub(crate) fn finish(self) -> SelectionList {
        SelectionList(self.selections)
    }
}
