//! Database layer.
//!
//! - Lazily created read-only and read-write handles
//! - Read/write routing
//! - Statement execution and per-driver dispatch macros
//! - Column decoding

#[macro_use]
mod macros;
pub mod executor;
pub mod pool;
pub mod router;
pub mod types;

pub use executor::QueryExecutor;
pub use pool::{ConnectionPool, DbPool};
pub use router::route;
pub use types::{ColumnKind, RowToJson};
