//! Hydrated records.

use crate::error::{DbError, DbResult};
use crate::models::JsonRow;
use serde::de::DeserializeOwned;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value as JsonValue;

/// A record of one registered table, owning the records of joined tables.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Entity {
    table: String,
    fields: JsonRow,
    nested: Vec<Entity>,
}

impl Entity {
    /// Create an empty entity for `table`.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            fields: JsonRow::new(),
            nested: Vec::new(),
        }
    }

    /// Set a field, returning the entity (builder style).
    pub fn with(mut self, field: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.set(field, value);
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn get(&self, field: &str) -> Option<&JsonValue> {
        self.fields.get(field)
    }

    pub fn fields(&self) -> &JsonRow {
        &self.fields
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<JsonValue>) {
        self.fields.insert(field.into(), value.into());
    }

    /// Nested entity for a joined table.
    pub fn nested(&self, table: &str) -> Option<&Entity> {
        self.nested.iter().find(|e| e.table == table)
    }

    pub fn nested_entities(&self) -> &[Entity] {
        &self.nested
    }

    /// Attach a nested entity, replacing any previous one for the same table.
    pub fn attach(&mut self, entity: Entity) {
        match self.nested.iter_mut().find(|e| e.table == entity.table) {
            Some(existing) => *existing = entity,
            None => self.nested.push(entity),
        }
    }

    /// JSON object of the fields, with nested entities under their table name.
    pub fn to_json(&self) -> JsonValue {
        let mut map = self.fields.clone();
        for nested in &self.nested {
            map.insert(nested.table.clone(), nested.to_json());
        }
        JsonValue::Object(map)
    }

    /// Deserialize into a caller-defined record type.
    pub fn deserialize<T: DeserializeOwned>(&self) -> DbResult<T> {
        serde_json::from_value(self.to_json()).map_err(|e| {
            DbError::schema(
                format!("Cannot map row onto {}: {}", std::any::type_name::<T>(), e),
                self.table.clone(),
            )
        })
    }
}

impl Serialize for Entity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len() + self.nested.len()))?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        for nested in &self.nested {
            map.serialize_entry(&nested.table, nested)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Order {
        order_id: i64,
        total: f64,
    }

    #[derive(Debug, Deserialize)]
    struct User {
        id: i64,
        name: String,
        orders: Option<Order>,
    }

    fn sample() -> Entity {
        let mut user = Entity::new("users").with("id", 1).with("name", "a");
        user.attach(Entity::new("orders").with("orderId", 7).with("total", 9.5));
        user
    }

    #[test]
    fn test_nested_lookup() {
        let user = sample();
        assert_eq!(user.get("id"), Some(&json!(1)));
        assert_eq!(user.nested("orders").unwrap().get("total"), Some(&json!(9.5)));
        assert!(user.nested("missing").is_none());
    }

    #[test]
    fn test_attach_replaces_same_table() {
        let mut user = sample();
        user.attach(Entity::new("orders").with("orderId", 8));
        assert_eq!(user.nested_entities().len(), 1);
        assert_eq!(user.nested("orders").unwrap().get("orderId"), Some(&json!(8)));
    }

    #[test]
    fn test_serialize_matches_to_json() {
        let user = sample();
        let serialized = serde_json::to_value(&user).unwrap();
        assert_eq!(serialized, user.to_json());
        assert_eq!(serialized["orders"]["orderId"], json!(7));
    }

    #[test]
    fn test_deserialize_typed() {
        let user: User = sample().deserialize().unwrap();
        assert_eq!(user.id, 1);
        assert_eq!(user.name, "a");
        let order = user.orders.unwrap();
        assert_eq!(order.order_id, 7);
        assert_eq!(order.total, 9.5);
    }

    #[test]
    fn test_deserialize_mismatch_is_schema_error() {
        let result = Entity::new("users").with("id", "x").deserialize::<User>();
        assert!(matches!(result, Err(DbError::Schema { .. })));
    }
}
