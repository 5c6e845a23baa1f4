//! Configuration handling for dualdb.
//!
//! Connection parameters come from CLI arguments with environment fallbacks
//! (`DB_HOST`, `DB_USER`, `DB_PASS`, `DB_NAME`, `DB_PORT_RO`, `DB_PORT_RW`, ...).

use crate::models::{ConnectionSettings, Driver, Endpoint};
use clap::Parser;
use std::time::Duration;

pub const DEFAULT_DB_HOST: &str = "127.0.0.1";
pub const DEFAULT_DB_USER: &str = "root";
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = crate::models::DEFAULT_QUERY_TIMEOUT_SECS;

// Pool configuration defaults
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_MAX_CONNECTIONS_SQLITE: u32 = 1;
pub const DEFAULT_MIN_CONNECTIONS: u32 = 1;
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;

/// Connection pool options applied to both handles.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PoolOptions {
    /// Maximum connections per handle (default: 10 for MySQL/PostgreSQL, 1 for SQLite)
    pub max_connections: Option<u32>,
    /// Minimum connections per handle (default: 1)
    pub min_connections: Option<u32>,
    /// Idle timeout in seconds (default: 600)
    pub idle_timeout_secs: Option<u64>,
    /// Connection acquire timeout in seconds (default: 30)
    pub acquire_timeout_secs: Option<u64>,
}

impl PoolOptions {
    /// Get max_connections with default value based on driver.
    pub fn max_connections_or_default(&self, driver: Driver) -> u32 {
        self.max_connections.unwrap_or(match driver {
            Driver::Sqlite => DEFAULT_MAX_CONNECTIONS_SQLITE,
            _ => DEFAULT_MAX_CONNECTIONS,
        })
    }

    /// Get min_connections with default value.
    pub fn min_connections_or_default(&self) -> u32 {
        self.min_connections.unwrap_or(DEFAULT_MIN_CONNECTIONS)
    }

    /// Get idle_timeout with default value.
    pub fn idle_timeout_or_default(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs.unwrap_or(DEFAULT_IDLE_TIMEOUT_SECS))
    }

    /// Get acquire_timeout with default value.
    pub fn acquire_timeout_or_default(&self) -> Duration {
        Duration::from_secs(
            self.acquire_timeout_secs
                .unwrap_or(DEFAULT_ACQUIRE_TIMEOUT_SECS),
        )
    }

    /// Validate pool options.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(max) = self.max_connections {
            if max == 0 {
                return Err("max_connections must be greater than 0".to_string());
            }
        }
        if let Some(min) = self.min_connections {
            if let Some(max) = self.max_connections {
                if min > max {
                    return Err(format!(
                        "min_connections ({}) cannot exceed max_connections ({})",
                        min, max
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Connection configuration for the read-only and read-write targets.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "dualdb",
    about = "Run statements against a read/write-split database",
    version
)]
pub struct DbConfig {
    /// Database driver
    #[arg(long, value_enum, default_value = "mysql", env = "DB_DRIVER")]
    pub driver: Driver,

    /// Database host (read-write target, and read-only unless --host-ro is set)
    #[arg(long, default_value = DEFAULT_DB_HOST, env = "DB_HOST")]
    pub host: String,

    /// Read-only replica host
    #[arg(long = "host-ro", env = "DB_HOST_RO")]
    pub host_ro: Option<String>,

    /// Database user
    #[arg(long, default_value = DEFAULT_DB_USER, env = "DB_USER")]
    pub user: String,

    /// Database password
    #[arg(long, default_value = "", env = "DB_PASS", hide_env_values = true)]
    pub password: String,

    /// Database name (file path for SQLite)
    #[arg(long, env = "DB_NAME")]
    pub database: String,

    /// Port of the read-only target
    #[arg(long = "port-ro", env = "DB_PORT_RO")]
    pub port_ro: Option<u16>,

    /// Port of the read-write target
    #[arg(long = "port-rw", env = "DB_PORT_RW")]
    pub port_rw: Option<u16>,

    /// Statement timeout in seconds
    #[arg(
        long,
        default_value_t = DEFAULT_QUERY_TIMEOUT_SECS,
        env = "DB_QUERY_TIMEOUT"
    )]
    pub query_timeout: u64,

    /// Maximum connections per handle
    #[arg(long, env = "DB_MAX_CONNECTIONS")]
    pub max_connections: Option<u32>,

    /// Minimum connections per handle
    #[arg(long, env = "DB_MIN_CONNECTIONS")]
    pub min_connections: Option<u32>,

    /// Seconds to wait for a pooled connection
    #[arg(long, env = "DB_ACQUIRE_TIMEOUT")]
    pub acquire_timeout: Option<u64>,

    /// Seconds before an idle connection is closed
    #[arg(long, env = "DB_IDLE_TIMEOUT")]
    pub idle_timeout: Option<u64>,
}

impl DbConfig {
    /// Read the configuration from the environment only.
    pub fn from_env() -> Result<Self, clap::Error> {
        Self::try_parse_from(["dualdb"])
    }

    /// Pool options assembled from the individual settings.
    pub fn pool_options(&self) -> PoolOptions {
        PoolOptions {
            max_connections: self.max_connections,
            min_connections: self.min_connections,
            idle_timeout_secs: self.idle_timeout,
            acquire_timeout_secs: self.acquire_timeout,
        }
    }

    /// Resolve both connection targets.
    pub fn connection_settings(&self) -> Result<ConnectionSettings, String> {
        let pool = self.pool_options();
        pool.validate()?;

        if self.database.trim().is_empty() {
            return Err("DB_NAME must not be empty".to_string());
        }

        let endpoint = |host: &str, port: Option<u16>| Endpoint {
            host: host.to_string(),
            port,
            user: self.user.clone(),
            password: self.password.clone(),
            database: self.database.clone(),
        };

        let read_write = endpoint(&self.host, self.port_rw);
        let read_only = endpoint(self.host_ro.as_deref().unwrap_or(&self.host), self.port_ro);

        Ok(ConnectionSettings {
            driver: self.driver,
            read_only,
            read_write,
            pool,
        })
    }

    /// Get the statement timeout as a Duration.
    pub fn query_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.query_timeout)
    }
}
