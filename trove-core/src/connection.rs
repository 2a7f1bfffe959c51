use crate::{Result, Value};
use std::sync::Arc;

/// Effect of a data modification statement.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowsAffected {
    /// Total number of rows impacted.
    pub rows_affected: u64,
    /// Backend-specific last inserted identifier when available.
    pub last_affected_id: Option<i64>,
}

impl RowsAffected {
    pub fn new(rows_affected: u64) -> Self {
        Self {
            rows_affected,
            last_affected_id: None,
        }
    }
}

impl Extend<RowsAffected> for RowsAffected {
    fn extend<T: IntoIterator<Item = RowsAffected>>(&mut self, iter: T) {
        for elem in iter {
            self.rows_affected += elem.rows_affected;
            if elem.last_affected_id.is_some() {
                self.last_affected_id = elem.last_affected_id;
            }
        }
    }
}

pub type RowNames = Arc<[String]>;
/// Owned row value slice matching `RowNames` length.
pub type Row = Box<[Value]>;

/// A result row with its corresponding column labels.
#[derive(Debug, Clone)]
pub struct RowLabeled {
    /// Column names.
    pub labels: RowNames,
    /// Data values (aligned by index with `labels`).
    pub values: Row,
}

impl RowLabeled {
    pub fn new(names: RowNames, values: Row) -> Self {
        Self {
            labels: names,
            values,
        }
    }

    pub fn names(&self) -> &[String] {
        &self.labels
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.labels
            .iter()
            .position(|v| v.eq_ignore_ascii_case(name))
            .map(|i| &self.values[i])
    }
}

/// Blocking connection to one database.
///
/// A transaction is implicitly open from the first statement until `commit`
/// or `rollback`. Placeholders are `?`, bound left to right.
pub trait Connection {
    fn execute(&mut self, sql: &str, values: &[Value]) -> Result<RowsAffected>;

    /// Run a query, `max_rows` stops the fetch early and `fetch_size` is a hint.
    fn query(
        &mut self,
        sql: &str,
        values: &[Value],
        max_rows: Option<u64>,
        fetch_size: Option<u32>,
    ) -> Result<Vec<RowLabeled>>;

    fn commit(&mut self) -> Result<()>;

    fn rollback(&mut self) -> Result<()>;

    fn close(self: Box<Self>) -> Result<()>;
}
