//! Connection pool management.
//!
//! Each logical target (read-only, read-write) gets one database-specific
//! pool (MySqlPool, PgPool, SqlitePool), created on first use and kept for the
//! lifetime of the [`ConnectionPool`].

use crate::error::{DbError, DbResult};
use crate::models::{Access, ConnectionSettings, Driver, Endpoint};
use sqlx::{
    MySqlPool, PgPool, SqlitePool, mysql::MySqlConnectOptions, mysql::MySqlPoolOptions,
    postgres::PgConnectOptions, postgres::PgPoolOptions, sqlite::SqliteConnectOptions,
    sqlite::SqlitePoolOptions,
};
use std::str::FromStr;
use tokio::sync::OnceCell;
use tracing::info;

/// Database-specific connection pool (avoids AnyPool limitations).
#[derive(Debug, Clone)]
pub enum DbPool {
    MySql(MySqlPool),
    Postgres(PgPool),
    SQLite(SqlitePool),
}

impl DbPool {
    /// Close the connection pool.
    pub async fn close(&self) {
        match self {
            DbPool::MySql(pool) => pool.close().await,
            DbPool::Postgres(pool) => pool.close().await,
            DbPool::SQLite(pool) => pool.close().await,
        }
    }

    /// Get the driver for this pool.
    pub fn driver(&self) -> Driver {
        match self {
            DbPool::MySql(_) => Driver::MySql,
            DbPool::Postgres(_) => Driver::Postgres,
            DbPool::SQLite(_) => Driver::Sqlite,
        }
    }
}

/// The read-only and read-write handles of one database.
///
/// Handle creation is serialized per target: racing callers wait for the
/// first one, and a created handle is never replaced.
#[derive(Debug)]
pub struct ConnectionPool {
    settings: ConnectionSettings,
    read_only: OnceCell<DbPool>,
    read_write: OnceCell<DbPool>,
}

impl ConnectionPool {
    pub fn new(settings: ConnectionSettings) -> Self {
        Self {
            settings,
            read_only: OnceCell::new(),
            read_write: OnceCell::new(),
        }
    }

    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    pub fn driver(&self) -> Driver {
        self.settings.driver
    }

    /// Get the handle for `access`, connecting on first use.
    pub async fn handle(&self, access: Access) -> DbResult<&DbPool> {
        self.cell(access)
            .get_or_try_init(|| self.create_pool(access))
            .await
    }

    /// Whether the handle for `access` has been created.
    pub fn is_open(&self, access: Access) -> bool {
        self.cell(access).initialized()
    }

    /// Close every created handle.
    pub async fn close(&self) {
        for cell in [&self.read_only, &self.read_write] {
            if let Some(pool) = cell.get() {
                pool.close().await;
            }
        }
    }

    fn cell(&self, access: Access) -> &OnceCell<DbPool> {
        match access {
            Access::ReadOnly => &self.read_only,
            Access::ReadWrite => &self.read_write,
        }
    }

    async fn create_pool(&self, access: Access) -> DbResult<DbPool> {
        let driver = self.settings.driver;
        let endpoint = self.settings.endpoint(access);
        let pool_opts = &self.settings.pool;
        let min_connections = pool_opts.min_connections_or_default();
        let max_connections = pool_opts.max_connections_or_default(driver);
        let acquire_timeout = pool_opts.acquire_timeout_or_default();
        let idle_timeout = Some(pool_opts.idle_timeout_or_default());

        info!(
            access = %access,
            driver = %driver,
            target = %endpoint.masked(driver),
            "Opening database handle"
        );

        let connect_failed = |e: sqlx::Error| {
            DbError::driver(
                format!("Failed to open {} connection: {}", access, e),
                connection_suggestion(driver, &e),
            )
        };

        match driver {
            Driver::MySql => {
                let url = connection_url(driver, endpoint)?;
                let options = MySqlConnectOptions::from_str(url.as_str())
                    .map_err(|e| {
                        DbError::driver(
                            format!("Invalid MySQL connection settings: {}", e),
                            "Check DB_HOST, DB_USER, DB_NAME and the port settings",
                        )
                    })?
                    .charset("utf8mb4");

                let pool = MySqlPoolOptions::new()
                    .min_connections(min_connections)
                    .max_connections(max_connections)
                    .acquire_timeout(acquire_timeout)
                    .idle_timeout(idle_timeout)
                    .connect_with(options)
                    .await
                    .map_err(connect_failed)?;
                Ok(DbPool::MySql(pool))
            }
            Driver::Postgres => {
                let url = connection_url(driver, endpoint)?;
                let options = PgConnectOptions::from_str(url.as_str())
                    .map_err(|e| {
                        DbError::driver(
                            format!("Invalid PostgreSQL connection settings: {}", e),
                            "Check DB_HOST, DB_USER, DB_NAME and the port settings",
                        )
                    })?;

                let pool = PgPoolOptions::new()
                    .min_connections(min_connections)
                    .max_connections(max_connections)
                    .acquire_timeout(acquire_timeout)
                    .idle_timeout(idle_timeout)
                    .connect_with(options)
                    .await
                    .map_err(connect_failed)?;
                Ok(DbPool::Postgres(pool))
            }
            Driver::Sqlite => {
                let mut options = SqliteConnectOptions::new().filename(&endpoint.database);

                options = match access {
                    Access::ReadWrite => options.create_if_missing(true).read_only(false),
                    Access::ReadOnly => options.read_only(true),
                };

                let pool = SqlitePoolOptions::new()
                    .min_connections(min_connections)
                    .max_connections(max_connections)
                    .acquire_timeout(acquire_timeout)
                    .idle_timeout(idle_timeout)
                    .connect_with(options)
                    .await
                    .map_err(connect_failed)?;
                Ok(DbPool::SQLite(pool))
            }
        }
    }
}

fn connection_url(driver: Driver, endpoint: &Endpoint) -> DbResult<url::Url> {
    endpoint.connection_url(driver).map_err(|e| {
        DbError::driver(
            format!("Invalid {} host '{}': {}", driver, endpoint.host, e),
            "Check DB_HOST (and DB_HOST_RO) for a valid host name",
        )
    })
}

/// Generate a helpful suggestion for connection errors.
fn connection_suggestion(driver: Driver, error: &sqlx::Error) -> String {
    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") {
        return format!("Check that the {} server is running and accessible", driver);
    }

    if error_str.contains("authentication") || error_str.contains("password") {
        return "Verify DB_USER and DB_PASS".to_string();
    }

    if error_str.contains("does not exist") || error_str.contains("unknown database") {
        return "Check that DB_NAME names an existing database".to_string();
    }

    if error_str.contains("tls") || error_str.contains("ssl") {
        return "Check TLS/SSL configuration or try disabling it".to_string();
    }

    match driver {
        Driver::Postgres => "Check DB_HOST and DB_PORT_RO / DB_PORT_RW (default 5432)".to_string(),
        Driver::MySql => "Check DB_HOST and DB_PORT_RO / DB_PORT_RW (default 3306)".to_string(),
        Driver::Sqlite => "Verify DB_NAME points to an existing, readable SQLite file".to_string(),
    }
}
