//! Values crossing the adapter boundary: bound parameters, result rows and
//! write outcomes.

use chrono::NaiveDateTime;
use serde::Serialize;

/// A result row keyed by column name.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// A positional query parameter, bound in order.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Null,
    Int(i64),
    Real(f64),
    Text(String),
    Bool(bool),
    Timestamp(NaiveDateTime),
}

impl From<i64> for SqlParam {
    fn from(v: i64) -> Self {
        SqlParam::Int(v)
    }
}

impl From<i32> for SqlParam {
    fn from(v: i32) -> Self {
        SqlParam::Int(v.into())
    }
}

impl From<f64> for SqlParam {
    fn from(v: f64) -> Self {
        SqlParam::Real(v)
    }
}

impl From<bool> for SqlParam {
    fn from(v: bool) -> Self {
        SqlParam::Bool(v)
    }
}

impl From<String> for SqlParam {
    fn from(v: String) -> Self {
        SqlParam::Text(v)
    }
}

impl From<&str> for SqlParam {
    fn from(v: &str) -> Self {
        SqlParam::Text(v.to_string())
    }
}

impl From<NaiveDateTime> for SqlParam {
    fn from(v: NaiveDateTime) -> Self {
        SqlParam::Timestamp(v)
    }
}

impl<T: Into<SqlParam>> From<Option<T>> for SqlParam {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlParam::Null)
    }
}

/// Build a `Vec<SqlParam>` from heterogeneous values.
#[macro_export]
macro_rules! params {
    () => { Vec::<$crate::db::SqlParam>::new() };
    ($($value:expr),+ $(,)?) => {
        vec![$($crate::db::SqlParam::from($value)),+]
    };
}

/// Outcome of a write statement.
///
/// `id` is the generated identifier when the backend reports one: the `id`
/// column of a `RETURNING` row, or for SQLite the rowid of the row an
/// insert added. Updates and deletes leave it `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunResult {
    pub id: Option<i64>,
    pub rows_affected: u64,
}
