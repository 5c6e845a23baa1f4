//! Integration tests for entity hydration and entity writes.

use dualdb::sql::Select;
use dualdb::{
    ConnectionSettings, Database, DbError, Driver, Endpoint, Entity, SchemaRegistry, Statement,
    TableDescriptor,
};
use serde::Deserialize;
use serde_json::json;
use tempfile::NamedTempFile;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct User {
    id: i64,
    display_name: String,
}

fn registry() -> SchemaRegistry {
    SchemaRegistry::new()
        .with_table(TableDescriptor::new("users", ["id", "display_name"]))
        .with_table(TableDescriptor::new("orders", ["id", "user_id", "total"]))
}

async fn setup() -> (NamedTempFile, Database) {
    let file = NamedTempFile::new().unwrap();
    let path = file.path().display().to_string();
    let db = Database::new(
        ConnectionSettings::new(Driver::Sqlite, Endpoint::sqlite(&path), Endpoint::sqlite(&path)),
        registry(),
    );

    for sql in [
        "CREATE TABLE users (id INTEGER PRIMARY KEY, display_name TEXT NOT NULL)",
        "CREATE TABLE orders (id INTEGER PRIMARY KEY, user_id INTEGER NOT NULL, total REAL)",
        "CREATE TABLE audit (id INTEGER PRIMARY KEY, note TEXT)",
        "INSERT INTO users (id, display_name) VALUES (1, 'Ann'), (2, 'Bob')",
        "INSERT INTO orders (id, user_id, total) VALUES (10, 1, 9.5), (11, 2, 20.0)",
    ] {
        db.execute(&Statement::new(sql)).await.unwrap();
    }

    (file, db)
}

#[tokio::test]
async fn test_fetch_one_hydrates_root() {
    let (_file, db) = setup().await;

    let user = db
        .fetch_one(&Statement::new("SELECT * FROM users WHERE id = ?").bind(2))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user.table(), "users");
    assert_eq!(user.get("displayName"), Some(&json!("Bob")));
    assert!(user.get("display_name").is_none());

    let none = db
        .fetch_one(&Statement::new("SELECT * FROM users WHERE id = ?").bind(99))
        .await
        .unwrap();
    assert!(none.is_none());
    db.close().await;
}

#[tokio::test]
async fn test_join_hydrates_nested_entity() {
    let (_file, db) = setup().await;
    let stmt = Statement::new(
        "SELECT users.id, users.display_name, orders.user_id, orders.total \
         FROM users JOIN orders ON orders.user_id = users.id ORDER BY orders.id",
    );

    let users = db.fetch_all(&stmt).await.unwrap();
    assert_eq!(users.len(), 2);

    let ann = &users[0];
    assert_eq!(ann.get("displayName"), Some(&json!("Ann")));
    let order = ann.nested("orders").unwrap();
    assert_eq!(order.get("userId"), Some(&json!(1)));
    assert_eq!(order.get("total"), Some(&json!(9.5)));
    assert!(order.get("displayName").is_none());
    db.close().await;
}

#[tokio::test]
async fn test_select_builder_declares_tables() {
    let (_file, db) = setup().await;
    let stmt = Select::from("users")
        .columns(["users.id", "users.display_name", "orders.total"])
        .left_join("orders", "orders.user_id = users.id")
        .filter("users.id = ?")
        .bind(1)
        .build();

    let users = db.fetch_all(&stmt).await.unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].nested("orders").unwrap().get("total"), Some(&json!(9.5)));
    db.close().await;
}

#[tokio::test]
async fn test_unregistered_root_table() {
    let (_file, db) = setup().await;
    db.execute(&Statement::new("INSERT INTO audit (note) VALUES ('x')"))
        .await
        .unwrap();

    let result = db.fetch_all(&Statement::new("SELECT * FROM audit")).await;
    assert!(matches!(result, Err(DbError::Schema { .. })));

    // Nothing to hydrate, nothing to resolve
    let empty = db
        .fetch_all(&Statement::new("SELECT * FROM audit WHERE id < ?").bind(0))
        .await
        .unwrap();
    assert!(empty.is_empty());
    db.close().await;
}

#[tokio::test]
async fn test_typed_fetch() {
    let (_file, db) = setup().await;

    let users: Vec<User> = db
        .fetch_all_as(&Statement::new("SELECT * FROM users ORDER BY id"))
        .await
        .unwrap();
    assert_eq!(users.len(), 2);
    assert_eq!(users[1].display_name, "Bob");

    let ann: Option<User> = db
        .fetch_one_as(&Statement::new("SELECT * FROM users WHERE id = ?").bind(1))
        .await
        .unwrap();
    assert_eq!(ann.unwrap().id, 1);
    db.close().await;
}

#[tokio::test]
async fn test_entity_insert_update_delete() {
    let (_file, db) = setup().await;

    let created = db
        .insert(&Entity::new("users").with("displayName", "Cy"))
        .await
        .unwrap();
    assert_eq!(created.rows_affected, 1);
    let id = created.last_insert_id.unwrap();
    assert_eq!(id, 3);

    let renamed = Entity::new("users").with("id", id).with("displayName", "Cyd");
    assert_eq!(db.update(&renamed, "id").await.unwrap().rows_affected, 1);

    let user: User = db
        .fetch_one_as(&Statement::new("SELECT * FROM users WHERE id = ?").bind(id))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user.display_name, "Cyd");

    assert_eq!(db.delete("users", "id", id).await.unwrap().rows_affected, 1);
    assert_eq!(
        db.count(&Statement::new("SELECT * FROM users")).await.unwrap(),
        2
    );
    db.close().await;
}

#[tokio::test]
async fn test_update_requires_key_value() {
    let (_file, db) = setup().await;
    let entity = Entity::new("users").with("displayName", "Nobody");
    assert!(matches!(
        db.update(&entity, "id").await,
        Err(DbError::InvalidParams { .. })
    ));
}

#[tokio::test]
async fn test_debug_renders_without_running() {
    let (_file, db) = setup().await;
    let debug = db.debug();

    let sql = debug
        .execute(&Statement::new("DELETE FROM users WHERE display_name = ?").bind("Ann"))
        .unwrap();
    assert_eq!(sql, "DELETE FROM users WHERE display_name = 'Ann'");

    // The row is still there
    assert_eq!(
        db.count(&Statement::new("SELECT * FROM users")).await.unwrap(),
        2
    );
    db.close().await;
}
