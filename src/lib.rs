//! dualdb
//!
//! Data access over a read/write-split database (MySQL, PostgreSQL, SQLite).
//! Reads go to a read-only handle and writes to a read-write handle, both
//! opened lazily. On top of that sit count-query derivation, pagination and
//! hydration of flat rows into entities through a static schema registry.
//!
//! ```no_run
//! use dualdb::{Database, PageRequest, Statement};
//! # async fn run(db: Database) -> dualdb::DbResult<()> {
//! let stmt = Statement::new("SELECT * FROM users WHERE active = ?").bind(true);
//! let page = db.paginate(&stmt, PageRequest::new(2, 10)).await?;
//! println!("{} users in total", page.pagination.total_items);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod database;
pub mod db;
pub mod error;
pub mod models;
pub mod schema;
pub mod sql;

pub use config::DbConfig;
pub use database::{Database, DebugDatabase, RenderedPage};
pub use error::{DbError, DbResult};
pub use models::{
    Access, ConnectionSettings, Driver, Endpoint, Entity, ExecuteResult, JsonRow, Page,
    PageRequest, Pagination, QueryParam, Statement,
};
pub use schema::{SchemaRegistry, TableDescriptor};
