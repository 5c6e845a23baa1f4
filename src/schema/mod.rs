//! Schema metadata and result mapping.
//!
//! - Table descriptors and the static registry
//! - Contributing-table discovery
//! - Row hydration into entities

pub mod descriptor;
pub mod hydrator;
pub mod introspect;
pub mod registry;

pub use descriptor::{ColumnMapping, TableDescriptor, field_name};
pub use hydrator::Hydrator;
pub use introspect::contributing_tables;
pub use registry::SchemaRegistry;
