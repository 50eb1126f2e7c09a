//! DuckDB database backend implementation

use crate::error::{DbError, DbResult};
use crate::traits::Database;
use crate::value::{read_cell, SqlValue};
use async_trait::async_trait;
use duckdb::{params_from_iter, Connection};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// DuckDB database backend
pub struct DuckDbBackend {
    conn: Mutex<Connection>,
}

impl DuckDbBackend {
    /// Create a new in-memory DuckDB connection
    pub fn in_memory() -> DbResult<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| DbError::ConnectionError(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create a new DuckDB connection from a file path
    pub fn from_path(path: &Path) -> DbResult<Self> {
        let conn = Connection::open(path)
            .map_err(|e| DbError::ConnectionError(format!("{}: {}", e, path.display())))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create from path string (handles :memory: special case)
    pub fn new(path: &str) -> DbResult<Self> {
        if path == ":memory:" {
            Self::in_memory()
        } else {
            Self::from_path(Path::new(path))
        }
    }

    fn lock(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| DbError::MutexPoisoned(e.to_string()))
    }

    fn execute_sync(&self, sql: &str, params: &[SqlValue]) -> DbResult<usize> {
        let conn = self.lock()?;
        conn.execute(sql, params_from_iter(params.iter()))
            .map_err(|e| DbError::ExecutionError(format!("{}: {}", e, sql)))
    }

    fn execute_batch_sync(&self, sql: &str) -> DbResult<()> {
        let conn = self.lock()?;
        conn.execute_batch(sql)
            .map_err(|e| DbError::ExecutionError(e.to_string()))
    }

    fn query_rows_sync(&self, sql: &str, params: &[SqlValue]) -> DbResult<Vec<Vec<SqlValue>>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql)?;
        let mut rows = stmt.query(params_from_iter(params.iter()))?;

        // Column count is only reliable once the statement has executed.
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let width = row.as_ref().column_count();
            out.push((0..width).map(|i| read_cell(row, i)).collect());
        }
        Ok(out)
    }

    fn query_count_sync(&self, sql: &str) -> DbResult<usize> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row(&format!("SELECT COUNT(*) FROM ({})", sql), [], |row| {
                row.get(0)
            })
            .map_err(|e| DbError::ExecutionError(e.to_string()))?;
        Ok(count as usize)
    }

    fn relation_exists_sync(&self, name: &str) -> DbResult<bool> {
        let conn = self.lock()?;

        let (schema, table) = match name.rsplit_once('.') {
            Some((schema, table)) => (schema, table),
            None => ("main", name),
        };

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM information_schema.tables WHERE table_schema = ? AND table_name = ?",
                duckdb::params![schema, table],
                |row| row.get(0),
            )
            .map_err(|e| DbError::ExecutionError(e.to_string()))?;

        Ok(count > 0)
    }
}

/// Build `INSERT INTO t (a, b) VALUES (?, ?), (?, ?)` for `row_count` rows.
pub(crate) fn multi_row_insert_sql(table: &str, columns: &[&str], row_count: usize) -> String {
    let placeholders = format!("({})", vec!["?"; columns.len()].join(", "));
    let values = vec![placeholders.as_str(); row_count].join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES {}",
        table,
        columns.join(", "),
        values
    )
}

#[async_trait]
impl Database for DuckDbBackend {
    async fn execute(&self, sql: &str) -> DbResult<usize> {
        self.execute_sync(sql, &[])
    }

    async fn execute_batch(&self, sql: &str) -> DbResult<()> {
        self.execute_batch_sync(sql)
    }

    async fn execute_params(&self, sql: &str, params: &[SqlValue]) -> DbResult<usize> {
        self.execute_sync(sql, params)
    }

    async fn query_rows(&self, sql: &str, params: &[SqlValue]) -> DbResult<Vec<Vec<SqlValue>>> {
        self.query_rows_sync(sql, params)
    }

    async fn query_one(&self, sql: &str, params: &[SqlValue]) -> DbResult<Option<Vec<SqlValue>>> {
        Ok(self.query_rows_sync(sql, params)?.into_iter().next())
    }

    async fn query_count(&self, sql: &str) -> DbResult<usize> {
        self.query_count_sync(sql)
    }

    async fn relation_exists(&self, name: &str) -> DbResult<bool> {
        self.relation_exists_sync(name)
    }

    async fn insert_rows(
        &self,
        table: &str,
        columns: &[&str],
        rows: &[Vec<SqlValue>],
    ) -> DbResult<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        if let Some(bad) = rows.iter().find(|r| r.len() != columns.len()) {
            return Err(DbError::ExecutionError(format!(
                "insert into {}: row has {} values for {} columns",
                table,
                bad.len(),
                columns.len()
            )));
        }
        let sql = multi_row_insert_sql(table, columns, rows.len());
        let conn = self.lock()?;
        conn.execute(&sql, params_from_iter(rows.iter().flatten()))
            .map_err(|e| DbError::ExecutionError(format!("insert into {}: {}", table, e)))
    }

    async fn begin(&self) -> DbResult<()> {
        self.execute_batch_sync("BEGIN TRANSACTION")
            .map_err(|e| DbError::TransactionError(format!("BEGIN failed: {e}")))
    }

    async fn commit(&self) -> DbResult<()> {
        self.execute_batch_sync("COMMIT")
            .map_err(|e| DbError::TransactionError(format!("COMMIT failed: {e}")))
    }

    async fn rollback(&self) -> DbResult<()> {
        self.execute_batch_sync("ROLLBACK")
            .map_err(|e| DbError::TransactionError(format!("ROLLBACK failed: {e}")))
    }

    fn db_type(&self) -> &'static str {
        "duckdb"
    }
}

#[cfg(test)]
#[path = "duckdb_test.rs"]
mod tests;
