//! Typed SQL values crossing the [`Database`](crate::Database) boundary.
//!
//! Parameters and result cells are both [`SqlValue`]s so callers never
//! touch driver types. Timestamps travel as text; queries that read
//! timestamp columns cast them to `VARCHAR`.

use crate::error::{DbError, DbResult};
use duckdb::types::{ToSql, ToSqlOutput, Value};

/// One SQL parameter or result cell.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Double(f64),
    Text(String),
    Bool(bool),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Integer view. Booleans read back as integers on some column types,
    /// so both are accepted.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Integer(n) => Some(*n),
            SqlValue::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SqlValue::Bool(b) => Some(*b),
            SqlValue::Integer(n) => Some(*n != 0),
            _ => None,
        }
    }

    pub fn into_string(self) -> Option<String> {
        match self {
            SqlValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Integer(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Double(v)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<&String> for SqlValue {
    fn from(v: &String) -> Self {
        SqlValue::Text(v.clone())
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(SqlValue::Null, Into::into)
    }
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> duckdb::Result<ToSqlOutput<'_>> {
        let value = match self {
            SqlValue::Null => Value::Null,
            SqlValue::Integer(n) => Value::BigInt(*n),
            SqlValue::Double(f) => Value::Double(*f),
            SqlValue::Text(s) => Value::Text(s.clone()),
            SqlValue::Bool(b) => Value::Boolean(*b),
        };
        Ok(ToSqlOutput::Owned(value))
    }
}

/// Read one result cell, trying text, integer, float, then boolean.
///
/// DuckDB rejects a typed read on a mismatched column rather than
/// converting, so the first type that succeeds decides the variant.
pub(crate) fn read_cell(row: &duckdb::Row<'_>, idx: usize) -> SqlValue {
    if let Ok(Some(s)) = row.get::<_, Option<String>>(idx) {
        return SqlValue::Text(s);
    }
    if let Ok(Some(n)) = row.get::<_, Option<i64>>(idx) {
        return SqlValue::Integer(n);
    }
    if let Ok(Some(f)) = row.get::<_, Option<f64>>(idx) {
        return SqlValue::Double(f);
    }
    if let Ok(Some(b)) = row.get::<_, Option<bool>>(idx) {
        return SqlValue::Bool(b);
    }
    SqlValue::Null
}

/// Non-null integer at `idx`.
pub fn required_i64(row: &[SqlValue], idx: usize, column: &str) -> DbResult<i64> {
    row.get(idx)
        .and_then(SqlValue::as_i64)
        .ok_or_else(|| DbError::TypeMismatch {
            column: column.to_string(),
            expected: "integer",
        })
}

/// Non-null text at `idx`.
pub fn required_string(row: &[SqlValue], idx: usize, column: &str) -> DbResult<String> {
    optional_string(row, idx).ok_or_else(|| DbError::TypeMismatch {
        column: column.to_string(),
        expected: "text",
    })
}

/// Integer at `idx`, or `None` for NULL or a missing cell.
pub fn optional_i64(row: &[SqlValue], idx: usize) -> Option<i64> {
    row.get(idx).and_then(SqlValue::as_i64)
}

/// Text at `idx`, or `None` for NULL or a missing cell.
pub fn optional_string(row: &[SqlValue], idx: usize) -> Option<String> {
    row.get(idx).and_then(SqlValue::as_str).map(str::to_string)
}

/// Boolean at `idx`; NULL reads as false.
pub fn bool_or_false(row: &[SqlValue], idx: usize) -> bool {
    row.get(idx).and_then(SqlValue::as_bool).unwrap_or(false)
}
