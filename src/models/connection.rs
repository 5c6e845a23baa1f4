//! Connection-related data models.
//!
//! This module defines the supported drivers and the two logical connection
//! targets (read-only and read-write).

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use url::Url;

/// Supported database drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Driver {
    /// Includes MariaDB
    #[default]
    #[value(name = "mysql")]
    MySql,
    #[value(name = "postgres", alias = "postgresql")]
    Postgres,
    #[value(name = "sqlite")]
    Sqlite,
}

impl Driver {
    /// Get the display name for this driver.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::MySql => "MySQL",
            Self::Postgres => "PostgreSQL",
            Self::Sqlite => "SQLite",
        }
    }

    /// Get the default port for this driver.
    pub fn default_port(&self) -> Option<u16> {
        match self {
            Self::Postgres => Some(5432),
            Self::MySql => Some(3306),
            Self::Sqlite => None,
        }
    }

    fn scheme(&self) -> &'static str {
        match self {
            Self::MySql => "mysql",
            Self::Postgres => "postgres",
            Self::Sqlite => "sqlite",
        }
    }

    /// Quote an identifier for this driver.
    pub fn quote_ident(&self, ident: &str) -> String {
        match self {
            Self::MySql => format!("`{}`", ident.replace('`', "``")),
            Self::Postgres | Self::Sqlite => format!("\"{}\"", ident.replace('"', "\"\"")),
        }
    }
}

impl std::fmt::Display for Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Which logical connection a statement runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    ReadOnly,
    ReadWrite,
}

impl std::fmt::Display for Access {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ReadOnly => write!(f, "read-only"),
            Self::ReadWrite => write!(f, "read-write"),
        }
    }
}

/// Host, port and credentials of one connection target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: Option<u16>,
    pub user: String,
    /// Contains sensitive data - never log
    #[serde(skip_serializing)]
    pub password: String,
    /// Database name, or the file path for SQLite
    pub database: String,
}

impl Endpoint {
    /// Endpoint for a SQLite file.
    pub fn sqlite(path: impl Into<String>) -> Self {
        Self {
            host: String::new(),
            port: None,
            user: String::new(),
            password: String::new(),
            database: path.into(),
        }
    }

    /// Build a driver connection URL (MySQL and PostgreSQL).
    pub fn connection_url(&self, driver: Driver) -> Result<Url, url::ParseError> {
        let mut url = Url::parse(&format!("{}://{}", driver.scheme(), self.host))?;
        // set_* only fail for cannot-be-a-base URLs, which a host URL never is
        let _ = url.set_username(&self.user);
        if !self.password.is_empty() {
            let _ = url.set_password(Some(&self.password));
        }
        let _ = url.set_port(self.port.or(driver.default_port()));
        url.set_path(&self.database);
        Ok(url)
    }

    /// Display-safe target description (credentials masked).
    pub fn masked(&self, driver: Driver) -> String {
        if driver == Driver::Sqlite {
            return format!("sqlite:{}", self.database);
        }
        match self.connection_url(driver) {
            Ok(mut url) => {
                if url.password().is_some() {
                    let _ = url.set_password(Some("****"));
                }
                url.to_string()
            }
            Err(_) => format!("{}://{}", driver.scheme(), self.host),
        }
    }
}

/// Resolved settings for both connection targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSettings {
    pub driver: Driver,
    pub read_only: Endpoint,
    pub read_write: Endpoint,
    #[serde(default)]
    pub pool: crate::config::PoolOptions,
}

impl ConnectionSettings {
    pub fn new(driver: Driver, read_only: Endpoint, read_write: Endpoint) -> Self {
        Self {
            driver,
            read_only,
            read_write,
            pool: Default::default(),
        }
    }

    pub fn endpoint(&self, access: Access) -> &Endpoint {
        match access {
            Access::ReadOnly => &self.read_only,
            Access::ReadWrite => &self.read_write,
        }
    }
}
