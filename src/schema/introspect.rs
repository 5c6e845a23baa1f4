//! Contributing-table discovery.
//!
//! Tables come from the statement's own declaration when it has one. Otherwise
//! they are derived statically from the SQL text with [sqlparser](https://docs.rs/sqlparser/):
//! the FROM relations, then every joined relation, in order. No database
//! round trip is made.
//!
//! Known gaps: for set operations only the left-most SELECT is inspected, and
//! derived tables (subqueries in FROM) contribute nothing.

use crate::models::{Driver, Statement};
use crate::sql::scan::{self, TokenKind};
use sqlparser::ast::{self, SetExpr, TableFactor, TableWithJoins};
use sqlparser::parser::Parser;
use tracing::debug;

/// Ordered, de-duplicated contributing tables of `stmt`, root table first.
pub fn contributing_tables(stmt: &Statement, driver: Driver) -> Vec<String> {
    if !stmt.tables.is_empty() {
        return dedup(stmt.tables.iter().cloned());
    }

    match parse_tables(&stmt.sql, driver) {
        Some(tables) if !tables.is_empty() => tables,
        _ => {
            debug!(sql = %stmt.sql, "Falling back to scanner for table discovery");
            first_from_table(&stmt.sql, driver).into_iter().collect()
        }
    }
}

fn parse_tables(sql: &str, driver: Driver) -> Option<Vec<String>> {
    // PostgreSQL reads `?` as an operator, so parse its numbered form
    let text = match driver {
        Driver::Postgres => scan::to_numbered_placeholders(sql).ok()?,
        Driver::MySql | Driver::Sqlite => sql.to_string(),
    };

    let dialect = scan::dialect(driver);
    let statements = match Parser::parse_sql(dialect.as_ref(), &text) {
        Ok(statements) => statements,
        Err(e) => {
            debug!(error = %e, "Statement not parseable for table discovery");
            return None;
        }
    };

    let query = match statements.first()? {
        ast::Statement::Query(query) => query,
        _ => return None,
    };

    let mut tables = Vec::new();
    collect_set_expr(&query.body, &mut tables);
    Some(dedup(tables))
}

fn collect_set_expr(expr: &SetExpr, out: &mut Vec<String>) {
    match expr {
        SetExpr::Select(select) => {
            for from in &select.from {
                collect_table_with_joins(from, out);
            }
        }
        SetExpr::Query(query) => collect_set_expr(&query.body, out),
        SetExpr::SetOperation { left, .. } => collect_set_expr(left, out),
        _ => {}
    }
}

fn collect_table_with_joins(twj: &TableWithJoins, out: &mut Vec<String>) {
    collect_factor(&twj.relation, out);
    for join in &twj.joins {
        collect_factor(&join.relation, out);
    }
}

fn collect_factor(factor: &TableFactor, out: &mut Vec<String>) {
    match factor {
        TableFactor::Table { name, .. } => out.push(bare_name(&name.to_string())),
        TableFactor::NestedJoin {
            table_with_joins, ..
        } => collect_table_with_joins(table_with_joins, out),
        _ => {}
    }
}

/// Last segment of a possibly qualified, possibly quoted name.
fn bare_name(qualified: &str) -> String {
    let last = qualified.rsplit('.').next().unwrap_or(qualified);
    last.trim_matches(|c| matches!(c, '"' | '`' | '[' | ']'))
        .to_string()
}

fn dedup(tables: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for table in tables {
        if !out.contains(&table) {
            out.push(table);
        }
    }
    out
}

/// Identifier following the first top-level FROM.
fn first_from_table(sql: &str, driver: Driver) -> Option<String> {
    let tokens = scan::tokenize(sql, driver).ok()?;
    let from = tokens
        .iter()
        .position(|t| t.is_top_level() && t.is_word("FROM"))?;
    let next = tokens.get(from + 1)?;
    match next.kind {
        TokenKind::Word | TokenKind::QuotedIdent => Some(next.unquoted().to_string()),
        _ => None,
    }
}
