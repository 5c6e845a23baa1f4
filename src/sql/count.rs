//! SELECT to row-counting SELECT.
//!
//! A plain SELECT is counted by swapping its select-list for `COUNT(*)`.
//! Anything that can change the row multiplicity is wrapped in a derived
//! table instead: DISTINCT, GROUP BY, HAVING, set operations, and any
//! select-list function call that is not a window call, since aggregates
//! cannot be told apart from scalar functions by name. Placeholders that disappear with the select-list or with the
//! stripped ORDER BY / LIMIT tail are pruned from the parameter list.

use crate::error::{DbError, DbResult};
use crate::models::{Driver, Statement};
use crate::sql::scan::{self, Token, TokenKind};

/// How the count statement was derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountStrategy {
    /// `SELECT COUNT(*) FROM ...` reusing the statement's FROM tail
    Direct,
    /// `SELECT COUNT(*) FROM (<query>) AS count_rows`
    Subquery,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CountQuery {
    pub statement: Statement,
    pub strategy: CountStrategy,
}

const SET_OPERATORS: [&str; 3] = ["UNION", "INTERSECT", "EXCEPT"];

/// Derive the row-counting form of a SELECT statement.
pub fn count_statement(stmt: &Statement, driver: Driver) -> DbResult<CountQuery> {
    let sql = trim_terminator(&stmt.sql);
    let tokens = scan::tokenize(sql, driver)?;

    let select = tokens
        .iter()
        .position(|t| t.kind == TokenKind::Word)
        .filter(|&i| tokens[i].is_word("SELECT"))
        .ok_or_else(|| DbError::invalid_query("Count queries must start with SELECT"))?;

    let from = tokens
        .iter()
        .position(|t| t.is_top_level() && t.is_word("FROM"))
        .ok_or_else(|| DbError::invalid_query("Count queries need a top-level FROM clause"))?;

    let from_start = tokens[from].start;
    let cut = tail_start(&tokens, &[("ORDER", Some("BY")), ("LIMIT", None)])
        .filter(|&cut| cut > from_start)
        .unwrap_or(sql.len());
    let body = sql[..cut].trim_end();
    let kept = scan::placeholders_between(&tokens, 0, cut);

    if needs_subquery(&tokens[select + 1..], from - select - 1, cut) {
        let statement = Statement::with_params(
            format!("SELECT COUNT(*) FROM ({}) AS count_rows", body),
            stmt.params.iter().take(kept).cloned().collect(),
        );
        return Ok(CountQuery {
            statement,
            strategy: CountStrategy::Subquery,
        });
    }

    let skipped = scan::placeholders_between(&tokens, 0, from_start);
    let statement = Statement::with_params(
        format!("SELECT COUNT(*) {}", &sql[from_start..body.len()]),
        stmt.params
            .iter()
            .take(kept)
            .skip(skipped)
            .cloned()
            .collect(),
    );
    Ok(CountQuery {
        statement,
        strategy: CountStrategy::Direct,
    })
}

/// Remove a trailing top-level `LIMIT` clause (and any `OFFSET`), keeping
/// `ORDER BY`. Parameters bound inside the removed clause are dropped.
pub fn strip_limit(stmt: &Statement, driver: Driver) -> DbResult<Statement> {
    let sql = trim_terminator(&stmt.sql);
    let tokens = scan::tokenize(sql, driver)?;

    let stripped = match tail_start(&tokens, &[("LIMIT", None), ("OFFSET", None)]) {
        Some(cut) => {
            let kept = scan::placeholders_between(&tokens, 0, cut);
            Statement {
                sql: sql[..cut].trim_end().to_string(),
                params: stmt.params.iter().take(kept).cloned().collect(),
                tables: stmt.tables.clone(),
            }
        }
        None => Statement {
            sql: sql.to_string(),
            ..stmt.clone()
        },
    };
    Ok(stripped)
}

fn trim_terminator(sql: &str) -> &str {
    sql.trim_end().trim_end_matches(';').trim_end()
}

/// Byte offset of the earliest top-level clause among `clauses`.
fn tail_start(tokens: &[Token<'_>], clauses: &[(&str, Option<&str>)]) -> Option<usize> {
    // Clauses after the last set operator belong to the whole compound query
    let floor = tokens
        .iter()
        .rposition(|t| t.is_top_level() && SET_OPERATORS.iter().any(|op| t.is_word(op)))
        .unwrap_or(0);

    tokens
        .iter()
        .enumerate()
        .skip(floor)
        .find(|(i, t)| {
            t.is_top_level()
                && clauses.iter().any(|(first, second)| {
                    t.is_word(first)
                        && second.is_none_or(|s| tokens.get(i + 1).is_some_and(|n| n.is_word(s)))
                })
        })
        .map(|(_, t)| t.start)
}

/// `after_select` are the tokens following SELECT; the first `list_len` of
/// them form the select-list. Tokens at or past byte `cut` are ignored.
fn needs_subquery(after_select: &[Token<'_>], list_len: usize, cut: usize) -> bool {
    let (list, rest) = after_select.split_at(list_len);

    let distinct = list
        .iter()
        .any(|t| t.is_top_level() && (t.is_word("DISTINCT") || t.is_word("DISTINCTROW")));
    if distinct || has_non_window_call(list) {
        return true;
    }

    let rest: Vec<Token<'_>> = rest.iter().filter(|t| t.start < cut).copied().collect();
    scan::find_pair(&rest, "GROUP", "BY").is_some()
        || rest.iter().any(|t| {
            t.is_top_level()
                && (t.is_word("HAVING") || SET_OPERATORS.iter().any(|op| t.is_word(op)))
        })
}

/// Whether `list` calls a function that is not followed by `OVER (...)`.
fn has_non_window_call(list: &[Token<'_>]) -> bool {
    list.windows(2).enumerate().any(|(i, w)| {
        let callee = matches!(w[0].kind, TokenKind::Word | TokenKind::QuotedIdent)
            && !w[0].is_word("OVER");
        if !callee || w[1].kind != TokenKind::LParen {
            return false;
        }
        let close = list[i + 2..]
            .iter()
            .position(|t| t.kind == TokenKind::RParen && t.depth == w[1].depth)
            .map(|p| i + 2 + p);
        match close {
            Some(close) => !list.get(close + 1).is_some_and(|t| t.is_word("OVER")),
            None => true,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::QueryParam;

    fn count(stmt: Statement) -> CountQuery {
        count_statement(&stmt, Driver::MySql).unwrap()
    }

    #[test]
    fn test_direct_count_strips_order_and_limit() {
        let q = count(
            Statement::new("SELECT id, name FROM users WHERE age > ? ORDER BY name LIMIT 10")
                .bind(18),
        );
        assert_eq!(q.strategy, CountStrategy::Direct);
        assert_eq!(q.statement.sql, "SELECT COUNT(*) FROM users WHERE age > ?");
        assert_eq!(q.statement.params, vec![QueryParam::Int(18)]);
    }

    #[test]
    fn test_select_list_and_limit_params_pruned() {
        let q = count(
            Statement::new("SELECT a > ? AS flag FROM t WHERE b = ? LIMIT ? OFFSET ?")
                .bind(5)
                .bind("x")
                .bind(10)
                .bind(20),
        );
        assert_eq!(q.statement.sql, "SELECT COUNT(*) FROM t WHERE b = ?");
        assert_eq!(q.statement.params, vec![QueryParam::from("x")]);
    }

    #[test]
    fn test_distinct_uses_subquery() {
        let q = count(Statement::new("SELECT DISTINCT country FROM users ORDER BY country"));
        assert_eq!(q.strategy, CountStrategy::Subquery);
        assert_eq!(
            q.statement.sql,
            "SELECT COUNT(*) FROM (SELECT DISTINCT country FROM users) AS count_rows"
        );
    }

    #[test]
    fn test_group_by_having_keeps_params() {
        let q = count(
            Statement::new(
                "SELECT user_id, SUM(total) AS s FROM orders WHERE status = ? \
                 GROUP BY user_id HAVING SUM(total) > ? LIMIT ?",
            )
            .bind("paid")
            .bind(100)
            .bind(5),
        );
        assert_eq!(q.strategy, CountStrategy::Subquery);
        assert!(q.statement.sql.starts_with("SELECT COUNT(*) FROM (SELECT user_id"));
        assert!(q.statement.sql.ends_with("HAVING SUM(total) > ?) AS count_rows"));
        assert_eq!(
            q.statement.params,
            vec![QueryParam::from("paid"), QueryParam::Int(100)]
        );
    }

    #[test]
    fn test_union_uses_subquery() {
        let q = count(Statement::new(
            "SELECT id FROM a UNION SELECT id FROM b ORDER BY id",
        ));
        assert_eq!(q.strategy, CountStrategy::Subquery);
        assert_eq!(
            q.statement.sql,
            "SELECT COUNT(*) FROM (SELECT id FROM a UNION SELECT id FROM b) AS count_rows"
        );
    }

    #[test]
    fn test_nested_clauses_do_not_trigger_subquery() {
        let q = count(Statement::new(
            "SELECT u.id FROM users u WHERE u.id IN (SELECT user_id FROM orders GROUP BY user_id)",
        ));
        assert_eq!(q.strategy, CountStrategy::Direct);
        assert_eq!(
            q.statement.sql,
            "SELECT COUNT(*) FROM users u WHERE u.id IN (SELECT user_id FROM orders GROUP BY user_id)"
        );
    }

    #[test]
    fn test_window_order_by_is_kept() {
        let q = count(Statement::new(
            "SELECT id, ROW_NUMBER() OVER (ORDER BY id) AS n FROM t",
        ));
        assert_eq!(q.statement.sql, "SELECT COUNT(*) FROM t");
    }

    #[test]
    fn test_aggregate_select_list_uses_subquery() {
        let q = count(Statement::new("SELECT MAX(id) FROM t"));
        assert_eq!(q.strategy, CountStrategy::Subquery);
    }

    #[test]
    fn test_trailing_semicolon() {
        let q = count(Statement::new("SELECT * FROM t;"));
        assert_eq!(q.statement.sql, "SELECT COUNT(*) FROM t");
    }

    #[test]
    fn test_rejects_non_select() {
        assert!(matches!(
            count_statement(&Statement::new("DELETE FROM t"), Driver::MySql),
            Err(DbError::InvalidQuery { .. })
        ));
        assert!(matches!(
            count_statement(&Statement::new("SELECT 1"), Driver::MySql),
            Err(DbError::InvalidQuery { .. })
        ));
    }

    #[test]
    fn test_strip_limit() {
        let stmt = Statement::new("SELECT * FROM t WHERE a = ? ORDER BY a LIMIT ?, ?")
            .bind(1)
            .bind(0)
            .bind(10)
            .with_tables(["t"]);
        let stripped = strip_limit(&stmt, Driver::MySql).unwrap();
        assert_eq!(stripped.sql, "SELECT * FROM t WHERE a = ? ORDER BY a");
        assert_eq!(stripped.params, vec![QueryParam::Int(1)]);
        assert_eq!(stripped.tables, vec!["t".to_string()]);
    }

    #[test]
    fn test_strip_limit_without_limit() {
        let stmt = Statement::new("SELECT * FROM t ORDER BY a");
        assert_eq!(strip_limit(&stmt, Driver::Postgres).unwrap(), stmt);
    }

    #[test]
    fn test_any_function_call_uses_subquery() {
        for sql in [
            "SELECT GROUP_CONCAT(name) FROM users",
            "SELECT string_agg(name, ',') FROM users",
            "SELECT COALESCE(MAX(id), 0) FROM users",
            "SELECT \"my_agg\"(id) FROM users",
        ] {
            let q = count_statement(&Statement::new(sql), Driver::Postgres).unwrap();
            assert_eq!(q.strategy, CountStrategy::Subquery, "{sql}");
        }
    }

    #[test]
    fn test_window_call_stays_direct() {
        let q = count(Statement::new("SELECT id, SUM(total) OVER (PARTITION BY user_id) FROM orders"));
        assert_eq!(q.strategy, CountStrategy::Direct);
    }

    #[test]
    fn test_distinct_after_modifier_uses_subquery() {
        for sql in [
            "SELECT SQL_NO_CACHE DISTINCT country FROM users",
            "SELECT DISTINCTROW country FROM users",
            "SELECT HIGH_PRIORITY DISTINCTROW country FROM users",
        ] {
            assert_eq!(count(Statement::new(sql)).strategy, CountStrategy::Subquery, "{sql}");
        }
        // DISTINCT inside a call is not a row-level DISTINCT
        let q = count(Statement::new("SELECT id FROM t WHERE id IN (SELECT DISTINCT a FROM u)"));
        assert_eq!(q.strategy, CountStrategy::Direct);
    }
}
