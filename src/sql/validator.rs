//! Statement validation.
//!
//! Runs before any connection is touched, so malformed calls never reach the
//! driver. Checks the leading verb and the placeholder/parameter arity.
//! Parameter scalarity is guaranteed by [`QueryParam`] itself.

use crate::error::{DbError, DbResult};
use crate::models::{Driver, QueryParam, Statement};
use crate::sql::scan::{self, Token};

/// Accepted leading SQL verbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Select,
    Insert,
    Update,
    Delete,
    Create,
    Truncate,
}

impl Verb {
    /// Parse a leading keyword (case-insensitive).
    pub fn parse(keyword: &str) -> Option<Self> {
        const VERBS: [(&str, Verb); 6] = [
            ("SELECT", Verb::Select),
            ("INSERT", Verb::Insert),
            ("UPDATE", Verb::Update),
            ("DELETE", Verb::Delete),
            ("CREATE", Verb::Create),
            ("TRUNCATE", Verb::Truncate),
        ];
        VERBS
            .iter()
            .find(|(name, _)| keyword.eq_ignore_ascii_case(name))
            .map(|(_, verb)| *verb)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Select => "SELECT",
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Create => "CREATE",
            Self::Truncate => "TRUNCATE",
        }
    }

    pub fn is_read(&self) -> bool {
        matches!(self, Self::Select)
    }
}

/// Determine and check the statement's leading verb.
pub fn statement_verb(sql: &str, driver: Driver) -> DbResult<Verb> {
    verb_of(&scan::tokenize(sql, driver)?)
}

/// Check that `params` matches the placeholders in `sql`.
pub fn validate_params(sql: &str, params: &[QueryParam], driver: Driver) -> DbResult<()> {
    check_arity(&scan::tokenize(sql, driver)?, params)
}

/// Validate a statement for `driver` and return its verb.
///
/// Only a single statement is accepted; a trailing `;` is allowed.
pub fn validate(stmt: &Statement, driver: Driver) -> DbResult<Verb> {
    let tokens = scan::tokenize(&stmt.sql, driver)?;
    let verb = verb_of(&tokens)?;
    if scan::has_trailing_statement(&tokens) {
        return Err(DbError::invalid_query(
            "Multiple statements are not allowed; submit one statement per call",
        ));
    }
    check_arity(&tokens, &stmt.params)?;
    Ok(verb)
}

fn verb_of(tokens: &[Token<'_>]) -> DbResult<Verb> {
    let keyword = scan::leading_keyword(tokens)
        .ok_or_else(|| DbError::invalid_query("Empty SQL statement"))?;

    Verb::parse(keyword).ok_or_else(|| {
        DbError::invalid_query(format!(
            "Unsupported statement '{}'. Allowed: SELECT, INSERT, UPDATE, DELETE, CREATE, TRUNCATE",
            keyword.to_ascii_uppercase()
        ))
    })
}

fn check_arity(tokens: &[Token<'_>], params: &[QueryParam]) -> DbResult<()> {
    let placeholders = scan::count_placeholders(tokens);
    if placeholders != params.len() {
        return Err(DbError::invalid_params(format!(
            "Statement has {} placeholder(s) but {} parameter(s) were bound",
            placeholders,
            params.len()
        )));
    }
    Ok(())
}
