//! Statement execution.
//!
//! Binds parameters positionally and runs the statement on a routed handle
//! under a statement timeout. Driver errors are normalized into [`DbError`]
//! with the failing SQL and parameters attached.
//!
//! # Architecture
//!
//! Per-driver code lives in the `mysql`, `postgres` and `sqlite` submodules,
//! generated by `impl_driver_executor!`. PostgreSQL placeholders are rewritten
//! from `?` to `$n` before preparing.

use crate::db::pool::DbPool;
use crate::db::types::RowToJson;
use crate::error::{DbError, DbResult};
use crate::models::{
    DEFAULT_QUERY_TIMEOUT_SECS, Driver, ExecuteResult, JsonRow, QueryParam, Statement,
};
use crate::sql::scan;
use futures_util::StreamExt;
use serde_json::Value as JsonValue;
use std::borrow::Cow;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::debug;

/// Runs statements on a handle.
#[derive(Debug, Clone, Copy)]
pub struct QueryExecutor {
    timeout: Duration,
}

impl QueryExecutor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Fetch every row.
    pub async fn fetch_all(&self, pool: &DbPool, stmt: &Statement) -> DbResult<Vec<JsonRow>> {
        self.fetch(pool, stmt, None).await
    }

    /// Fetch the first row, if any.
    pub async fn fetch_optional(
        &self,
        pool: &DbPool,
        stmt: &Statement,
    ) -> DbResult<Option<JsonRow>> {
        Ok(self.fetch(pool, stmt, Some(1)).await?.into_iter().next())
    }

    /// Fetch a single integer from the first column of the first row.
    pub async fn fetch_count(&self, pool: &DbPool, stmt: &Statement) -> DbResult<u64> {
        let row = self.fetch_optional(pool, stmt).await?;
        let value = row.and_then(|r| r.into_iter().next().map(|(_, v)| v));

        let count = match &value {
            Some(JsonValue::Number(n)) => n.as_u64(),
            Some(JsonValue::String(s)) => s.trim().parse::<u64>().ok(),
            _ => None,
        };

        count.ok_or_else(|| {
            DbError::statement(
                format!("Count statement returned {:?} instead of a row count", value),
                &stmt.sql,
                &stmt.params,
                None,
            )
        })
    }

    /// Run a statement that returns no rows.
    pub async fn execute(&self, pool: &DbPool, stmt: &Statement) -> DbResult<ExecuteResult> {
        let start = Instant::now();
        debug!(
            sql = %stmt.sql,
            params = stmt.params.len(),
            driver = %pool.driver(),
            "Executing statement"
        );

        let result = impl_db_dispatch!(pool, {
            MySql(p) => mysql::execute(p, &stmt.sql, &stmt.params, self.timeout).await,
            Postgres(p) => postgres::execute(p, &stmt.sql, &stmt.params, self.timeout).await,
            SQLite(p) => sqlite::execute(p, &stmt.sql, &stmt.params, self.timeout).await,
        })?;

        debug!(
            rows_affected = result.rows_affected,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Statement executed"
        );
        Ok(result)
    }

    async fn fetch(
        &self,
        pool: &DbPool,
        stmt: &Statement,
        limit: Option<usize>,
    ) -> DbResult<Vec<JsonRow>> {
        let start = Instant::now();
        debug!(
            sql = %stmt.sql,
            params = stmt.params.len(),
            driver = %pool.driver(),
            "Executing query"
        );

        let rows = impl_db_dispatch!(pool, {
            MySql(p) => mysql::fetch_rows(p, &stmt.sql, &stmt.params, limit, self.timeout).await,
            Postgres(p) => {
                postgres::fetch_rows(p, &stmt.sql, &stmt.params, limit, self.timeout).await
            },
            SQLite(p) => sqlite::fetch_rows(p, &stmt.sql, &stmt.params, limit, self.timeout).await,
        })?;

        debug!(
            rows = rows.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Query returned"
        );
        Ok(rows)
    }
}

impl Default for QueryExecutor {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_QUERY_TIMEOUT_SECS))
    }
}

/// SQL text as the driver expects it.
fn prepare_sql(driver: Driver, sql: &str) -> DbResult<Cow<'_, str>> {
    match driver {
        Driver::Postgres => Ok(Cow::Owned(scan::to_numbered_placeholders(sql)?)),
        Driver::MySql | Driver::Sqlite => Ok(Cow::Borrowed(sql)),
    }
}

fn timeout_error(sql: &str, params: &[QueryParam], query_timeout: Duration) -> DbError {
    DbError::statement(
        format!("Statement timed out after {:?}", query_timeout),
        sql,
        params,
        None,
    )
}

impl_driver_executor!(
    mysql,
    db = sqlx::MySql,
    pool = sqlx::MySqlPool,
    driver = Driver::MySql,
    last_id = |r: &sqlx::mysql::MySqlQueryResult| i64::try_from(r.last_insert_id()).ok(),
);

impl_driver_executor!(
    postgres,
    db = sqlx::Postgres,
    pool = sqlx::PgPool,
    driver = Driver::Postgres,
    last_id = |_: &sqlx::postgres::PgQueryResult| None,
);

impl_driver_executor!(
    sqlite,
    db = sqlx::Sqlite,
    pool = sqlx::SqlitePool,
    driver = Driver::Sqlite,
    last_id = |r: &sqlx::sqlite::SqliteQueryResult| Some(r.last_insert_rowid()),
);
