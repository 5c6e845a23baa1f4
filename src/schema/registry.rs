//! Static schema registry.
//!
//! Populated once at startup (in code or from a JSON schema file), then
//! shared read-only. A schema file looks like:
//!
//! ```json
//! {"tables": [{"name": "users", "columns": ["id", "first_name"],
//!              "fields": {"first_name": "givenName"}}]}
//! ```

use crate::error::{DbError, DbResult};
use crate::schema::TableDescriptor;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

#[derive(Debug, Deserialize)]
struct SchemaFile {
    tables: Vec<TableSpec>,
}

#[derive(Debug, Deserialize)]
struct TableSpec {
    name: String,
    columns: Vec<String>,
    /// column -> field overrides
    #[serde(default)]
    fields: BTreeMap<String, String>,
}

/// Table name -> descriptor.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    tables: HashMap<String, TableDescriptor>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a descriptor (builder style). A later registration of the same
    /// table replaces the earlier one.
    pub fn with_table(mut self, table: TableDescriptor) -> Self {
        self.register(table);
        self
    }

    pub fn register(&mut self, table: TableDescriptor) {
        self.tables.insert(table.name().to_string(), table);
    }

    pub fn get(&self, table: &str) -> Option<&TableDescriptor> {
        self.tables.get(table)
    }

    pub fn contains(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Registered table names, sorted.
    pub fn table_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tables.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Parse a JSON schema document.
    pub fn from_json(json: &str) -> DbResult<Self> {
        let file: SchemaFile = serde_json::from_str(json)
            .map_err(|e| DbError::schema(format!("Invalid schema document: {}", e), ""))?;

        let mut registry = Self::new();
        for spec in file.tables {
            if spec.columns.is_empty() {
                return Err(DbError::schema(
                    format!("Table '{}' declares no columns", spec.name),
                    spec.name,
                ));
            }
            if registry.contains(&spec.name) {
                return Err(DbError::schema(
                    format!("Table '{}' is declared twice", spec.name),
                    spec.name,
                ));
            }

            let table = spec
                .fields
                .into_iter()
                .fold(TableDescriptor::new(spec.name, spec.columns), |t, (c, f)| {
                    t.field_as(c, f)
                });
            registry.register(table);
        }
        Ok(registry)
    }

    /// Load a JSON schema file.
    pub fn load(path: impl AsRef<Path>) -> DbResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            DbError::schema(
                format!("Cannot read schema file {}: {}", path.display(), e),
                "",
            )
        })?;
        Self::from_json(&json)
    }
}
