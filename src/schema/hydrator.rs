//! Row hydration.
//!
//! Each flat row becomes a root entity (first contributing table) with one
//! nested entity per further table. A column is copied into every entity
//! whose descriptor declares a matching field, so a shared column such as
//! `id` lands in both the root and the nested entity.

use crate::error::{DbError, DbResult};
use crate::models::{Entity, JsonRow};
use crate::schema::{SchemaRegistry, TableDescriptor};
use tracing::warn;

/// Turns rows into entities for a fixed list of contributing tables.
#[derive(Debug)]
pub struct Hydrator<'a> {
    root: &'a TableDescriptor,
    nested: Vec<&'a TableDescriptor>,
}

impl<'a> Hydrator<'a> {
    /// Resolve `tables` (root first) against the registry.
    ///
    /// The root table must be registered. Unregistered joined tables are
    /// skipped with a warning.
    pub fn new(registry: &'a SchemaRegistry, tables: &[String]) -> DbResult<Self> {
        let (root_name, rest) = tables.split_first().ok_or_else(|| {
            DbError::schema("Cannot determine the root table of the statement", "")
        })?;

        let root = registry.get(root_name).ok_or_else(|| {
            DbError::schema(
                format!("Table '{}' is not registered", root_name),
                root_name.clone(),
            )
        })?;

        let nested = rest
            .iter()
            .filter(|name| *name != root_name)
            .filter_map(|name| {
                let descriptor = registry.get(name);
                if descriptor.is_none() {
                    warn!(table = %name, root = %root_name, "Skipping unregistered joined table");
                }
                descriptor
            })
            .collect();

        Ok(Self { root, nested })
    }

    pub fn root(&self) -> &TableDescriptor {
        self.root
    }

    /// Build the entity for one row.
    pub fn hydrate(&self, row: &JsonRow) -> Entity {
        let mut entity = fill(self.root, row);
        for table in &self.nested {
            entity.attach(fill(table, row));
        }
        entity
    }

    pub fn hydrate_all(&self, rows: &[JsonRow]) -> Vec<Entity> {
        rows.iter().map(|row| self.hydrate(row)).collect()
    }
}

fn fill(table: &TableDescriptor, row: &JsonRow) -> Entity {
    let mut entity = table.empty_entity();
    for (column, value) in row {
        if let Some(field) = table.field_for_column(column) {
            entity.set(field, value.clone());
        }
    }
    entity
}
