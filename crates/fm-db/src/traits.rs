//! Database trait definition

use crate::error::DbResult;
use crate::value::SqlValue;
use async_trait::async_trait;

/// Database abstraction trait for Fundmerge
///
/// Implementations must be Send + Sync for async operation. Every call is
/// a single statement or batch; callers needing atomicity across calls
/// wrap them with [`Database::begin`] / [`Database::commit`].
#[async_trait]
pub trait Database: Send + Sync {
    /// Execute SQL that modifies data, returns affected rows
    async fn execute(&self, sql: &str) -> DbResult<usize>;

    /// Execute multiple SQL statements
    async fn execute_batch(&self, sql: &str) -> DbResult<()>;

    /// Execute one parameterized statement, returns affected rows
    async fn execute_params(&self, sql: &str, params: &[SqlValue]) -> DbResult<usize>;

    /// Run a parameterized query and collect every row
    async fn query_rows(&self, sql: &str, params: &[SqlValue]) -> DbResult<Vec<Vec<SqlValue>>>;

    /// Run a parameterized query and return its first row, if any
    async fn query_one(&self, sql: &str, params: &[SqlValue]) -> DbResult<Option<Vec<SqlValue>>>;

    /// Execute query returning row count
    async fn query_count(&self, sql: &str) -> DbResult<usize>;

    /// Check if a table or view exists
    async fn relation_exists(&self, name: &str) -> DbResult<bool>;

    /// Insert `rows` into `table` with one multi-row statement
    ///
    /// Each row must have one value per entry in `columns`.
    async fn insert_rows(
        &self,
        table: &str,
        columns: &[&str],
        rows: &[Vec<SqlValue>],
    ) -> DbResult<usize>;

    /// Open a transaction on the connection
    async fn begin(&self) -> DbResult<()>;

    /// Commit the open transaction
    async fn commit(&self) -> DbResult<()>;

    /// Roll back the open transaction
    async fn rollback(&self) -> DbResult<()>;

    /// Database type identifier for logging
    fn db_type(&self) -> &'static str;
}
