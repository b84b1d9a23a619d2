use crate::{error::InternalError, value::Value};

///
/// JdbcValues
///
/// Forward-only row cursor owned by the driver. `current` is only valid
/// after `next` returned `true`.
///

pub trait JdbcValues {
    /// Advance to the next row; `false` once the source is exhausted.
    fn next(&mut self) -> Result<bool, InternalError>;

    fn current(&self) -> &[Value];
}

///
/// VecJdbcValues
///
/// In-memory row source.
///

#[derive(Clone, Debug, Default)]
pub struct VecJdbcValues {
    rows: Vec<Vec<Value>>,
    cursor: Option<usize>,
}

impl VecJdbcValues {
    #[must_use]
    pub const fn new(rows: Vec<Vec<Value>>) -> Self {
        Self { rows, cursor: None }
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl FromIterator<Vec<Value>> for VecJdbcValues {
    fn from_iter<I: IntoIterator<Item = Vec<Value>>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl JdbcValues for VecJdbcValues {
    fn next(&mut self) -> Result<bool, InternalError> {
        let next = self.cursor.map_or(0, |cursor| cursor + 1);
        if next >= self.rows.len() {
            self.cursor = Some(self.rows.len());
            return Ok(false);
        }
        self.cursor = Some(next);

        Ok(true)
    }

    fn current(&self) -> &[Value] {
        self.cursor
            .and_then(|cursor| self.rows.get(cursor))
            .map_or(&[], Vec::as_slice)
    }
}

///
/// TESTS
///
