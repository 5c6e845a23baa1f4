//! Caller-facing database facade.
//!
//! Every operation runs validate -> route -> connect -> execute, and read
//! paths then hydrate rows through the schema registry. Validation happens
//! before any handle is touched, so a rejected statement never opens a
//! connection.

use crate::config::DbConfig;
use crate::db::{ConnectionPool, DbPool, QueryExecutor, route};
use crate::error::{DbError, DbResult};
use crate::models::{
    ConnectionSettings, Driver, Entity, ExecuteResult, JsonRow, Page, PageRequest, Pagination,
    QueryParam, Statement,
};
use crate::schema::{Hydrator, SchemaRegistry, contributing_tables, field_name};
use crate::sql::{self, Verb};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Key used for page items when the root table cannot be determined.
const FALLBACK_COLLECTION_KEY: &str = "items";

/// Read/write-split access to one database.
///
/// Cloning is cheap: clones share the connection pool and the registry.
#[derive(Debug, Clone)]
pub struct Database {
    pool: Arc<ConnectionPool>,
    registry: Arc<SchemaRegistry>,
    executor: QueryExecutor,
    force_read_write: bool,
}

impl Database {
    pub fn new(settings: ConnectionSettings, registry: SchemaRegistry) -> Self {
        Self::with_pool(Arc::new(ConnectionPool::new(settings)), Arc::new(registry))
    }

    /// Share an existing pool and registry.
    pub fn with_pool(pool: Arc<ConnectionPool>, registry: Arc<SchemaRegistry>) -> Self {
        Self {
            pool,
            registry,
            executor: QueryExecutor::default(),
            force_read_write: false,
        }
    }

    /// Build from CLI/environment configuration.
    pub fn from_config(config: &DbConfig, registry: SchemaRegistry) -> DbResult<Self> {
        let settings = config.connection_settings().map_err(|e| {
            DbError::driver(
                format!("Invalid connection configuration: {}", e),
                "Check the DB_* environment variables or the matching flags",
            )
        })?;
        Ok(Self::new(settings, registry).with_timeout(config.query_timeout_duration()))
    }

    /// Set the statement timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.executor = QueryExecutor::new(timeout);
        self
    }

    /// A facade on the same pool that sends reads to the read-write handle.
    pub fn force_read_write(&self) -> Self {
        Self {
            force_read_write: true,
            ..self.clone()
        }
    }

    pub fn is_read_write_forced(&self) -> bool {
        self.force_read_write
    }

    /// A facade that renders statements instead of executing them.
    pub fn debug(&self) -> DebugDatabase {
        DebugDatabase { db: self.clone() }
    }

    pub fn driver(&self) -> Driver {
        self.pool.driver()
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Close both handles.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Fetch rows without hydration.
    pub async fn fetch_rows(&self, stmt: &Statement) -> DbResult<Vec<JsonRow>> {
        let pool = self.connect(stmt).await?;
        self.executor.fetch_all(pool, stmt).await
    }

    /// Fetch the first row as an entity.
    pub async fn fetch_one(&self, stmt: &Statement) -> DbResult<Option<Entity>> {
        let pool = self.connect(stmt).await?;
        match self.executor.fetch_optional(pool, stmt).await? {
            Some(row) => Ok(Some(self.hydrator(stmt)?.hydrate(&row))),
            None => Ok(None),
        }
    }

    /// Fetch every row as an entity.
    pub async fn fetch_all(&self, stmt: &Statement) -> DbResult<Vec<Entity>> {
        let pool = self.connect(stmt).await?;
        let rows = self.executor.fetch_all(pool, stmt).await?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.hydrator(stmt)?.hydrate_all(&rows))
    }

    /// Fetch the first row as a caller-defined record.
    pub async fn fetch_one_as<T: DeserializeOwned>(&self, stmt: &Statement) -> DbResult<Option<T>> {
        self.fetch_one(stmt)
            .await?
            .map(|entity| entity.deserialize())
            .transpose()
    }

    /// Fetch every row as a caller-defined record.
    pub async fn fetch_all_as<T: DeserializeOwned>(&self, stmt: &Statement) -> DbResult<Vec<T>> {
        self.fetch_all(stmt)
            .await?
            .iter()
            .map(Entity::deserialize)
            .collect()
    }

    /// Run a statement; `Ok` means it succeeded.
    pub async fn execute(&self, stmt: &Statement) -> DbResult<ExecuteResult> {
        let pool = self.connect(stmt).await?;
        self.executor.execute(pool, stmt).await
    }

    /// Number of rows a SELECT would return, ignoring its LIMIT.
    pub async fn count(&self, stmt: &Statement) -> DbResult<u64> {
        sql::validate(stmt, self.driver())?;
        let count = sql::count_statement(stmt, self.driver())?;
        debug!(strategy = ?count.strategy, sql = %count.statement.sql, "Derived count statement");

        let pool = self.connect(&count.statement).await?;
        self.executor.fetch_count(pool, &count.statement).await
    }

    /// One page of entities plus pagination metadata.
    ///
    /// Pages past the end are not clamped: they come back empty with the true
    /// totals.
    pub async fn paginate(&self, stmt: &Statement, request: PageRequest) -> DbResult<Page<Entity>> {
        let (pagination, page_stmt) = self.page_window(stmt, request).await?;
        let items = self.fetch_all(&page_stmt).await?;
        Ok(Page {
            pagination,
            key: self.page_key(&page_stmt),
            items,
        })
    }

    /// Like [`Database::paginate`] but without hydration.
    pub async fn paginate_rows(
        &self,
        stmt: &Statement,
        request: PageRequest,
    ) -> DbResult<Page<JsonRow>> {
        let (pagination, page_stmt) = self.page_window(stmt, request).await?;
        let items = self.fetch_rows(&page_stmt).await?;
        Ok(Page {
            pagination,
            key: self.page_key(&page_stmt),
            items,
        })
    }

    /// Insert an entity, mapping its fields to columns.
    pub async fn insert(&self, entity: &Entity) -> DbResult<ExecuteResult> {
        self.execute(&self.insert_statement(entity)?).await
    }

    /// Update an entity identified by `key_field`.
    pub async fn update(&self, entity: &Entity, key_field: &str) -> DbResult<ExecuteResult> {
        self.execute(&self.update_statement(entity, key_field)?).await
    }

    /// Delete the row of `table` whose `key_column` equals `key`.
    pub async fn delete(
        &self,
        table: &str,
        key_column: &str,
        key: impl Into<QueryParam>,
    ) -> DbResult<ExecuteResult> {
        self.execute(&sql::delete(self.driver(), table, key_column, key))
            .await
    }

    async fn connect(&self, stmt: &Statement) -> DbResult<&DbPool> {
        let verb = sql::validate(stmt, self.driver())?;
        let access = route(verb, self.force_read_write);
        debug!(verb = verb.as_str(), access = %access, "Routing statement");
        self.pool.handle(access).await
    }

    /// Count the full result, then derive the page statement.
    async fn page_window(
        &self,
        stmt: &Statement,
        request: PageRequest,
    ) -> DbResult<(Pagination, Statement)> {
        let page_stmt = page_statement(stmt, request, self.driver())?;
        let total_items = self.count(stmt).await?;
        Ok((Pagination::new(total_items, request), page_stmt))
    }

    fn page_key(&self, stmt: &Statement) -> String {
        contributing_tables(stmt, self.driver())
            .first()
            .map(|table| self.collection_key(table))
            .unwrap_or_else(|| FALLBACK_COLLECTION_KEY.to_string())
    }

    fn hydrator(&self, stmt: &Statement) -> DbResult<Hydrator<'_>> {
        let tables = contributing_tables(stmt, self.driver());
        Hydrator::new(&self.registry, &tables)
    }

    fn collection_key(&self, table: &str) -> String {
        self.registry
            .get(table)
            .map(|descriptor| descriptor.collection_key())
            .unwrap_or_else(|| field_name(table))
    }

    fn insert_statement(&self, entity: &Entity) -> DbResult<Statement> {
        let values = self.column_values(entity, None)?;
        sql::insert(self.driver(), entity.table(), values)
    }

    fn update_statement(&self, entity: &Entity, key_field: &str) -> DbResult<Statement> {
        let descriptor = self.descriptor(entity.table())?;
        let key_column = descriptor.column_for_field(key_field).ok_or_else(|| {
            DbError::schema(
                format!("Field '{}' has no column in '{}'", key_field, entity.table()),
                entity.table(),
            )
        })?;
        let key = entity.get(key_field).ok_or_else(|| {
            DbError::invalid_params(format!("Entity has no value for key field '{}'", key_field))
        })?;

        let values = self.column_values(entity, Some(key_field))?;
        sql::update(
            self.driver(),
            entity.table(),
            values,
            key_column,
            QueryParam::from_json(key)?,
        )
    }

    fn descriptor(&self, table: &str) -> DbResult<&crate::schema::TableDescriptor> {
        self.registry.get(table).ok_or_else(|| {
            DbError::schema(format!("Table '{}' is not registered", table), table)
        })
    }

    /// Entity fields as (column, param) pairs, skipping `except`.
    fn column_values(
        &self,
        entity: &Entity,
        except: Option<&str>,
    ) -> DbResult<Vec<(String, QueryParam)>> {
        let descriptor = self.descriptor(entity.table())?;
        entity
            .fields()
            .iter()
            .filter(|(field, _)| Some(field.as_str()) != except)
            .map(|(field, value)| {
                let column = descriptor.column_for_field(field).ok_or_else(|| {
                    DbError::schema(
                        format!("Field '{}' has no column in '{}'", field, entity.table()),
                        entity.table(),
                    )
                })?;
                Ok((column.to_string(), QueryParam::from_json(value)?))
            })
            .collect()
    }
}

/// The page query: `stmt` without its trailing LIMIT plus `LIMIT ? OFFSET ?`.
fn page_statement(stmt: &Statement, request: PageRequest, driver: Driver) -> DbResult<Statement> {
    request.validate()?;
    let limit = i64::try_from(request.per_page)
        .map_err(|_| DbError::invalid_params("per_page is too large"))?;
    let offset = i64::try_from(request.offset())
        .map_err(|_| DbError::invalid_params("page is too large"))?;

    let base = sql::strip_limit(stmt, driver)?;
    Ok(Statement {
        sql: format!("{} LIMIT ? OFFSET ?", base.sql),
        params: base.params,
        tables: base.tables,
    }
    .bind(limit)
    .bind(offset))
}

/// Rendered statements of a paginated listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    pub count_sql: String,
    pub page_sql: String,
}

/// Renders statements with their parameters interpolated instead of running
/// them. Statements are validated first; no connection is ever opened.
#[derive(Debug, Clone)]
pub struct DebugDatabase {
    db: Database,
}

impl DebugDatabase {
    pub fn fetch_rows(&self, stmt: &Statement) -> DbResult<String> {
        self.render(stmt)
    }

    pub fn fetch_one(&self, stmt: &Statement) -> DbResult<String> {
        self.render(stmt)
    }

    pub fn fetch_all(&self, stmt: &Statement) -> DbResult<String> {
        self.render(stmt)
    }

    pub fn execute(&self, stmt: &Statement) -> DbResult<String> {
        self.render(stmt)
    }

    pub fn count(&self, stmt: &Statement) -> DbResult<String> {
        let driver = self.db.driver();
        sql::validate(stmt, driver)?;
        self.render(&sql::count_statement(stmt, driver)?.statement)
    }

    pub fn paginate(&self, stmt: &Statement, request: PageRequest) -> DbResult<RenderedPage> {
        let page_stmt = page_statement(stmt, request, self.db.driver())?;
        Ok(RenderedPage {
            count_sql: self.count(stmt)?,
            page_sql: self.render(&page_stmt)?,
        })
    }

    pub fn insert(&self, entity: &Entity) -> DbResult<String> {
        self.render(&self.db.insert_statement(entity)?)
    }

    pub fn update(&self, entity: &Entity, key_field: &str) -> DbResult<String> {
        self.render(&self.db.update_statement(entity, key_field)?)
    }

    pub fn delete(&self, table: &str, key_column: &str, key: impl Into<QueryParam>) -> DbResult<String> {
        self.render(&sql::delete(self.db.driver(), table, key_column, key))
    }

    fn render(&self, stmt: &Statement) -> DbResult<String> {
        let verb: Verb = sql::validate(stmt, self.db.driver())?;
        let rendered = sql::interpolate(stmt, self.db.driver())?;
        debug!(verb = verb.as_str(), sql = %rendered, "Rendered statement");
        Ok(rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Endpoint;
    use crate::schema::TableDescriptor;

    fn database() -> Database {
        let settings = ConnectionSettings::new(
            Driver::MySql,
            Endpoint::sqlite("unused"),
            Endpoint::sqlite("unused"),
        );
        Database::new(
            settings,
            SchemaRegistry::new().with_table(TableDescriptor::new("users", ["id", "first_name"])),
        )
    }

    #[test]
    fn test_page_statement() {
        let stmt = Statement::new("SELECT * FROM users WHERE a = ? LIMIT 5").bind(1);
        let page = page_statement(&stmt, PageRequest::new(3, 10), Driver::MySql).unwrap();
        assert_eq!(page.sql, "SELECT * FROM users WHERE a = ? LIMIT ? OFFSET ?");
        assert_eq!(
            page.params,
            vec![QueryParam::Int(1), QueryParam::Int(10), QueryParam::Int(20)]
        );
    }

    #[test]
    fn test_page_statement_rejects_zero() {
        let stmt = Statement::new("SELECT * FROM users");
        assert!(matches!(
            page_statement(&stmt, PageRequest::new(0, 10), Driver::MySql),
            Err(DbError::InvalidParams { .. })
        ));
    }

    #[test]
    fn test_force_read_write_shares_pool() {
        let db = database();
        let forced = db.force_read_write();
        assert!(forced.is_read_write_forced());
        assert!(!db.is_read_write_forced());
        assert!(std::ptr::eq(db.pool(), forced.pool()));
    }

    #[test]
    fn test_debug_render_never_connects() {
        let db = database();
        let rendered = db
            .debug()
            .fetch_all(&Statement::new("SELECT * FROM users WHERE first_name = ?").bind("a"))
            .unwrap();
        assert_eq!(rendered, "SELECT * FROM users WHERE first_name = 'a'");
        assert!(!db.pool().is_open(crate::models::Access::ReadOnly));
        assert!(!db.pool().is_open(crate::models::Access::ReadWrite));
    }

    #[test]
    fn test_debug_validates_first() {
        let db = database();
        assert!(matches!(
            db.debug().execute(&Statement::new("DROP TABLE users")),
            Err(DbError::InvalidQuery { .. })
        ));
        assert!(matches!(
            db.debug().fetch_one(&Statement::new("SELECT * FROM users WHERE id = ?")),
            Err(DbError::InvalidParams { .. })
        ));
    }

    #[test]
    fn test_debug_paginate() {
        let db = database();
        let rendered = db
            .debug()
            .paginate(
                &Statement::new("SELECT id FROM users WHERE id > ? ORDER BY id").bind(5),
                PageRequest::new(2, 10),
            )
            .unwrap();
        assert_eq!(rendered.count_sql, "SELECT COUNT(*) FROM users WHERE id > 5");
        assert_eq!(
            rendered.page_sql,
            "SELECT id FROM users WHERE id > 5 ORDER BY id LIMIT 10 OFFSET 10"
        );
    }

    #[test]
    fn test_debug_insert_and_update_map_fields() {
        let db = database();
        let entity = Entity::new("users").with("id", 4).with("firstName", "Ann");
        assert_eq!(
            db.debug().insert(&entity).unwrap(),
            "INSERT INTO `users` (`first_name`, `id`) VALUES ('Ann', 4)"
        );
        assert_eq!(
            db.debug().update(&entity, "id").unwrap(),
            "UPDATE `users` SET `first_name` = 'Ann' WHERE `id` = 4"
        );
        assert_eq!(
            db.debug().delete("users", "id", 4).unwrap(),
            "DELETE FROM `users` WHERE `id` = 4"
        );
    }

    #[test]
    fn test_unknown_field_rejected() {
        let db = database();
        let entity = Entity::new("users").with("nickname", "x");
        assert!(matches!(db.debug().insert(&entity), Err(DbError::Schema { .. })));
        let ghost = Entity::new("ghosts").with("id", 1);
        assert!(matches!(db.debug().insert(&ghost), Err(DbError::Schema { .. })));
    }
}
