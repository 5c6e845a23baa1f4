//! Parameter interpolation for debug output.
//!
//! The rendered text is for humans only. It is never sent to a driver.

use crate::error::DbResult;
use crate::models::{Driver, Statement};
use crate::sql::scan;

/// Render `stmt` with every placeholder replaced by its literal parameter.
/// Placeholders without a bound parameter are left as `?`.
pub fn interpolate(stmt: &Statement, driver: Driver) -> DbResult<String> {
    scan::replace_placeholders(&stmt.sql, driver, |n| {
        stmt.params
            .get(n)
            .map_or_else(|| "?".to_string(), ToString::to_string)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpolate() {
        let stmt = Statement::new("SELECT * FROM users WHERE name = ? AND age > ? AND note = '?'")
            .bind("O'Brien")
            .bind(30);
        assert_eq!(
            interpolate(&stmt, Driver::Sqlite).unwrap(),
            "SELECT * FROM users WHERE name = 'O''Brien' AND age > 30 AND note = '?'"
        );
    }

    #[test]
    fn test_interpolate_missing_param() {
        let stmt = Statement::new("SELECT * FROM t WHERE a = ? AND b = ?").bind(None::<i64>);
        assert_eq!(
            interpolate(&stmt, Driver::Postgres).unwrap(),
            "SELECT * FROM t WHERE a = NULL AND b = ?"
        );
    }

    #[test]
    fn test_interpolate_backslash_literal() {
        let stmt = Statement::new(r"SELECT * FROM users WHERE name <> 'C:\' AND id = ?").bind(1);
        assert_eq!(
            interpolate(&stmt, Driver::Sqlite).unwrap(),
            r"SELECT * FROM users WHERE name <> 'C:\' AND id = 1"
        );
    }
}
