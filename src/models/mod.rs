//! Data models for dualdb.
//!
//! This module re-exports all model types used throughout the crate.

pub mod connection;
pub mod entity;
pub mod pagination;
pub mod query;

// Re-export commonly used types
pub use connection::{Access, ConnectionSettings, Driver, Endpoint};
pub use entity::Entity;
pub use pagination::{DEFAULT_PAGE, DEFAULT_PER_PAGE, Page, PageRequest, Pagination};
pub use query::{DEFAULT_QUERY_TIMEOUT_SECS, ExecuteResult, JsonRow, QueryParam, Statement};
