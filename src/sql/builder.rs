//! Statement builders.
//!
//! Write builders quote identifiers for the target driver. The SELECT builder
//! takes raw expressions and declares its contributing tables (FROM table
//! first, then joins in order) so hydration never has to derive them.

use crate::error::{DbError, DbResult};
use crate::models::{Driver, QueryParam, Statement};

fn quote_path(driver: Driver, path: &str) -> String {
    path.split('.')
        .map(|part| driver.quote_ident(part))
        .collect::<Vec<_>>()
        .join(".")
}

fn split_values<I, S>(driver: Driver, values: I) -> (Vec<String>, Vec<QueryParam>)
where
    I: IntoIterator<Item = (S, QueryParam)>,
    S: AsRef<str>,
{
    values
        .into_iter()
        .map(|(column, value)| (driver.quote_ident(column.as_ref()), value))
        .unzip()
}

/// `INSERT INTO table (cols...) VALUES (?, ...)`.
pub fn insert<I, S>(driver: Driver, table: &str, values: I) -> DbResult<Statement>
where
    I: IntoIterator<Item = (S, QueryParam)>,
    S: AsRef<str>,
{
    let (columns, params) = split_values(driver, values);
    if columns.is_empty() {
        return Err(DbError::invalid_params(format!(
            "INSERT into '{}' needs at least one column",
            table
        )));
    }

    let placeholders = vec!["?"; columns.len()].join(", ");
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_path(driver, table),
        columns.join(", "),
        placeholders
    );
    Ok(Statement::with_params(sql, params).with_tables([table]))
}

/// `UPDATE table SET col = ?, ... WHERE key = ?`.
pub fn update<I, S>(
    driver: Driver,
    table: &str,
    values: I,
    key_column: &str,
    key: impl Into<QueryParam>,
) -> DbResult<Statement>
where
    I: IntoIterator<Item = (S, QueryParam)>,
    S: AsRef<str>,
{
    let (columns, mut params) = split_values(driver, values);
    if columns.is_empty() {
        return Err(DbError::invalid_params(format!(
            "UPDATE of '{}' needs at least one column",
            table
        )));
    }

    let assignments = columns
        .iter()
        .map(|c| format!("{} = ?", c))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "UPDATE {} SET {} WHERE {} = ?",
        quote_path(driver, table),
        assignments,
        driver.quote_ident(key_column)
    );
    params.push(key.into());
    Ok(Statement::with_params(sql, params).with_tables([table]))
}

/// `DELETE FROM table WHERE key = ?`.
pub fn delete(
    driver: Driver,
    table: &str,
    key_column: &str,
    key: impl Into<QueryParam>,
) -> Statement {
    let sql = format!(
        "DELETE FROM {} WHERE {} = ?",
        quote_path(driver, table),
        driver.quote_ident(key_column)
    );
    Statement::new(sql).bind(key).with_tables([table])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JoinKind {
    Inner,
    Left,
}

#[derive(Debug, Clone)]
struct Join {
    kind: JoinKind,
    table: String,
    on: String,
}

/// SELECT builder.
///
/// ```
/// use dualdb::sql::Select;
///
/// let stmt = Select::from("users")
///     .columns(["users.id", "users.name", "orders.total"])
///     .join("orders", "orders.user_id = users.id")
///     .filter("users.id = ?")
///     .bind(1)
///     .build();
/// assert_eq!(stmt.tables, ["users", "orders"]);
/// ```
#[derive(Debug, Clone)]
pub struct Select {
    table: String,
    columns: Vec<String>,
    joins: Vec<Join>,
    filters: Vec<String>,
    params: Vec<QueryParam>,
    order_by: Vec<String>,
    limit: Option<u64>,
}

impl Select {
    pub fn from(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            joins: Vec::new(),
            filters: Vec::new(),
            params: Vec::new(),
            order_by: Vec::new(),
            limit: None,
        }
    }

    /// Select-list expressions. Defaults to `*`.
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns.extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn join(self, table: impl Into<String>, on: impl Into<String>) -> Self {
        self.push_join(JoinKind::Inner, table.into(), on.into())
    }

    pub fn left_join(self, table: impl Into<String>, on: impl Into<String>) -> Self {
        self.push_join(JoinKind::Left, table.into(), on.into())
    }

    fn push_join(mut self, kind: JoinKind, table: String, on: String) -> Self {
        self.joins.push(Join { kind, table, on });
        self
    }

    /// Add a WHERE condition; conditions are joined with AND.
    pub fn filter(mut self, condition: impl Into<String>) -> Self {
        self.filters.push(condition.into());
        self
    }

    /// Bind the next placeholder used in a filter.
    pub fn bind(mut self, param: impl Into<QueryParam>) -> Self {
        self.params.push(param.into());
        self
    }

    pub fn order_by(mut self, expr: impl Into<String>) -> Self {
        self.order_by.push(expr.into());
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn build(self) -> Statement {
        let mut sql = String::from("SELECT ");
        if self.columns.is_empty() {
            sql.push('*');
        } else {
            sql.push_str(&self.columns.join(", "));
        }
        sql.push_str(" FROM ");
        sql.push_str(&self.table);

        for join in &self.joins {
            let keyword = match join.kind {
                JoinKind::Inner => "JOIN",
                JoinKind::Left => "LEFT JOIN",
            };
            sql.push_str(&format!(" {} {} ON {}", keyword, join.table, join.on));
        }

        if !self.filters.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.filters.join(" AND "));
        }

        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.order_by.join(", "));
        }

        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let tables = std::iter::once(self.table).chain(self.joins.into_iter().map(|j| j.table));
        Statement::with_params(sql, self.params).with_tables(tables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert() {
        let stmt = insert(
            Driver::MySql,
            "users",
            [("name", QueryParam::from("a")), ("age", QueryParam::from(30))],
        )
        .unwrap();
        assert_eq!(stmt.sql, "INSERT INTO `users` (`name`, `age`) VALUES (?, ?)");
        assert_eq!(stmt.params.len(), 2);
        assert_eq!(stmt.tables, ["users"]);
    }

    #[test]
    fn test_insert_requires_columns() {
        let empty: Vec<(String, QueryParam)> = Vec::new();
        assert!(matches!(
            insert(Driver::Sqlite, "users", empty),
            Err(DbError::InvalidParams { .. })
        ));
    }

    #[test]
    fn test_update_binds_values_then_key() {
        let stmt = update(
            Driver::Postgres,
            "app.users",
            [("name", QueryParam::from("b"))],
            "id",
            7,
        )
        .unwrap();
        assert_eq!(
            stmt.sql,
            "UPDATE \"app\".\"users\" SET \"name\" = ? WHERE \"id\" = ?"
        );
        assert_eq!(stmt.params, vec![QueryParam::from("b"), QueryParam::Int(7)]);
    }

    #[test]
    fn test_delete() {
        let stmt = delete(Driver::Sqlite, "users", "id", 3);
        assert_eq!(stmt.sql, "DELETE FROM \"users\" WHERE \"id\" = ?");
        assert_eq!(stmt.params, vec![QueryParam::Int(3)]);
    }

    #[test]
    fn test_select_builder() {
        let stmt = Select::from("users")
            .columns(["users.id", "users.name", "orders.total"])
            .join("orders", "orders.user_id = users.id")
            .left_join("addresses", "addresses.user_id = users.id")
            .filter("users.age > ?")
            .filter("orders.total > ?")
            .bind(18)
            .bind(9.5)
            .order_by("users.id")
            .limit(5)
            .build();
        assert_eq!(
            stmt.sql,
            "SELECT users.id, users.name, orders.total FROM users \
             JOIN orders ON orders.user_id = users.id \
             LEFT JOIN addresses ON addresses.user_id = users.id \
             WHERE users.age > ? AND orders.total > ? ORDER BY users.id LIMIT 5"
        );
        assert_eq!(stmt.tables, ["users", "orders", "addresses"]);
        assert_eq!(stmt.params.len(), 2);
    }

    #[test]
    fn test_select_defaults_to_star() {
        assert_eq!(Select::from("t").build().sql, "SELECT * FROM t");
    }
}
