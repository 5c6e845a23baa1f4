//! Table descriptors.

use crate::models::Entity;
use convert_case::{Case, Casing};
use serde::{Deserialize, Serialize};

/// camelCase form of a column or table name (`user_id` -> `userId`).
pub fn field_name(column: &str) -> String {
    column.to_case(Case::Camel)
}

/// One column and the entity field it populates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub column: String,
    pub field: String,
}

/// A table name plus its ordered column -> field mappings.
///
/// Field names default to the camelCase form of the column. The descriptor is
/// also the constructor for empty entities of its table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDescriptor {
    name: String,
    columns: Vec<ColumnMapping>,
}

impl TableDescriptor {
    pub fn new<I, S>(name: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns = columns
            .into_iter()
            .map(|column| {
                let column = column.into();
                ColumnMapping {
                    field: field_name(&column),
                    column,
                }
            })
            .collect();
        Self {
            name: name.into(),
            columns,
        }
    }

    /// Map `column` to an explicit field name, adding the column if needed.
    pub fn field_as(mut self, column: impl Into<String>, field: impl Into<String>) -> Self {
        let column = column.into();
        let field = field.into();
        match self.columns.iter_mut().find(|m| m.column == column) {
            Some(mapping) => mapping.field = field,
            None => self.columns.push(ColumnMapping { column, field }),
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[ColumnMapping] {
        &self.columns
    }

    /// Key for this table in serialized pages (camelCase table name).
    pub fn collection_key(&self) -> String {
        field_name(&self.name)
    }

    /// Field populated by a result column.
    ///
    /// A declared column maps to its field. Any other result column (e.g. an
    /// alias) matches when its camelCase form is a declared field name.
    pub fn field_for_column(&self, column: &str) -> Option<&str> {
        if let Some(mapping) = self.columns.iter().find(|m| m.column == column) {
            return Some(&mapping.field);
        }
        let camel = field_name(column);
        self.columns
            .iter()
            .find(|m| m.field == camel)
            .map(|m| m.field.as_str())
    }

    /// Column backing an entity field.
    pub fn column_for_field(&self, field: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|m| m.field == field)
            .map(|m| m.column.as_str())
    }

    /// An entity of this table with no fields set.
    pub fn empty_entity(&self) -> Entity {
        Entity::new(self.name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> TableDescriptor {
        TableDescriptor::new("users", ["id", "first_name", "created_at"])
    }

    #[test]
    fn test_default_field_names() {
        let table = users();
        assert_eq!(table.field_for_column("first_name"), Some("firstName"));
        assert_eq!(table.field_for_column("created_at"), Some("createdAt"));
        assert_eq!(table.column_for_field("firstName"), Some("first_name"));
        assert_eq!(table.field_for_column("unknown"), None);
    }

    #[test]
    fn test_alias_matches_by_camel_case() {
        let table = users();
        assert_eq!(table.field_for_column("firstName"), Some("firstName"));
    }

    #[test]
    fn test_field_override() {
        let table = users().field_as("first_name", "givenName").field_as("email", "mail");
        assert_eq!(table.field_for_column("first_name"), Some("givenName"));
        assert_eq!(table.column_for_field("mail"), Some("email"));
        assert_eq!(table.columns().len(), 4);
    }

    #[test]
    fn test_collection_key_and_empty_entity() {
        let table = TableDescriptor::new("event_logs", ["id"]);
        assert_eq!(table.collection_key(), "eventLogs");
        let entity = table.empty_entity();
        assert_eq!(entity.table(), "event_logs");
        assert!(entity.fields().is_empty());
    }
}
