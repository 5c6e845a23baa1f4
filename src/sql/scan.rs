//! Dialect-aware SQL token scanning.
//!
//! Statements are tokenized with the [sqlparser](https://docs.rs/sqlparser/)
//! tokenizer for the target driver, so quoting, comments, backslash escapes
//! (MySQL only) and dollar-quoting follow the driver's rules. Each token is
//! reduced to a [`Token`] carrying its byte span in the source text and its
//! parenthesis depth, which is all the statement rewrites need.
//!
//! PostgreSQL scans `?|`, `?&`, `?-` and `?#` as jsonb/geometric operators, so
//! a placeholder directly followed by one of those characters needs a space.

use crate::error::{DbError, DbResult};
use crate::models::Driver;
use sqlparser::dialect::{Dialect, MySqlDialect, PostgreSqlDialect, SQLiteDialect};
use sqlparser::tokenizer::{Location, Token as SqlToken, Tokenizer};

/// Kind of a scanned token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Keyword or unquoted identifier
    Word,
    /// Quoted identifier
    QuotedIdent,
    /// Anonymous positional placeholder (`?`)
    Placeholder,
    /// String or numeric literal
    Literal,
    LParen,
    RParen,
    Semicolon,
    /// Operators, commas and anything else
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    pub start: usize,
    pub end: usize,
    /// Parenthesis nesting depth at the token (0 = top level)
    pub depth: u32,
}

impl Token<'_> {
    /// Case-insensitive keyword comparison.
    pub fn is_word(&self, keyword: &str) -> bool {
        self.kind == TokenKind::Word && self.text.eq_ignore_ascii_case(keyword)
    }

    pub fn is_top_level(&self) -> bool {
        self.depth == 0
    }

    /// Identifier text with any quoting removed.
    pub fn unquoted(&self) -> &str {
        match self.kind {
            TokenKind::QuotedIdent if self.text.len() >= 2 => &self.text[1..self.text.len() - 1],
            _ => self.text,
        }
    }
}

/// Get the appropriate sqlparser dialect for a driver.
pub fn dialect(driver: Driver) -> Box<dyn Dialect> {
    match driver {
        Driver::Postgres => Box::new(PostgreSqlDialect {}),
        Driver::MySql => Box::new(MySqlDialect {}),
        Driver::Sqlite => Box::new(SQLiteDialect {}),
    }
}

/// Tokenize `sql` for `driver`. Whitespace and comments are dropped.
pub fn tokenize(sql: &str, driver: Driver) -> DbResult<Vec<Token<'_>>> {
    let dialect = dialect(driver);
    let spanned = Tokenizer::new(dialect.as_ref(), sql)
        .tokenize_with_location()
        .map_err(|e| DbError::invalid_query(format!("Cannot tokenize statement: {}", e)))?;

    let mut cursor = ByteCursor::new(sql);
    let mut tokens = Vec::with_capacity(spanned.len());
    let mut depth: u32 = 0;

    for item in &spanned {
        let Some(kind) = classify(&item.token) else {
            continue;
        };
        let start = cursor.seek(item.span.start);
        let end = cursor.seek(item.span.end);

        if kind == TokenKind::RParen {
            depth = depth.saturating_sub(1);
        }
        tokens.push(Token {
            kind,
            text: &sql[start..end],
            start,
            end,
            depth,
        });
        if kind == TokenKind::LParen {
            depth += 1;
        }
    }

    Ok(tokens)
}

fn classify(token: &SqlToken) -> Option<TokenKind> {
    let kind = match token {
        SqlToken::Whitespace(_) | SqlToken::EOF => return None,
        SqlToken::Word(word) if word.quote_style.is_some() => TokenKind::QuotedIdent,
        SqlToken::Word(_) => TokenKind::Word,
        SqlToken::Placeholder(p) if p == "?" => TokenKind::Placeholder,
        // PostgreSQL scans a lone `?` as an operator
        SqlToken::Question => TokenKind::Placeholder,
        SqlToken::LParen => TokenKind::LParen,
        SqlToken::RParen => TokenKind::RParen,
        SqlToken::SemiColon => TokenKind::Semicolon,
        SqlToken::Number(..)
        | SqlToken::SingleQuotedString(_)
        | SqlToken::DoubleQuotedString(_)
        | SqlToken::TripleSingleQuotedString(_)
        | SqlToken::TripleDoubleQuotedString(_)
        | SqlToken::DollarQuotedString(_)
        | SqlToken::SingleQuotedByteStringLiteral(_)
        | SqlToken::DoubleQuotedByteStringLiteral(_)
        | SqlToken::TripleSingleQuotedByteStringLiteral(_)
        | SqlToken::TripleDoubleQuotedByteStringLiteral(_)
        | SqlToken::SingleQuotedRawStringLiteral(_)
        | SqlToken::DoubleQuotedRawStringLiteral(_)
        | SqlToken::TripleSingleQuotedRawStringLiteral(_)
        | SqlToken::TripleDoubleQuotedRawStringLiteral(_)
        | SqlToken::NationalStringLiteral(_)
        | SqlToken::EscapedStringLiteral(_)
        | SqlToken::UnicodeStringLiteral(_)
        | SqlToken::HexStringLiteral(_) => TokenKind::Literal,
        _ => TokenKind::Other,
    };
    Some(kind)
}

/// Maps tokenizer locations (1-based line and column, counted in chars) to
/// byte offsets. Locations must be sought in ascending order.
struct ByteCursor<'a> {
    sql: &'a str,
    offset: usize,
    line: u64,
    column: u64,
}

impl<'a> ByteCursor<'a> {
    fn new(sql: &'a str) -> Self {
        Self {
            sql,
            offset: 0,
            line: 1,
            column: 1,
        }
    }

    fn seek(&mut self, target: Location) -> usize {
        while (self.line, self.column) < (target.line, target.column) {
            let Some(ch) = self.sql[self.offset..].chars().next() else {
                break;
            };
            self.offset += ch.len_utf8();
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        self.offset
    }
}

/// First keyword of the statement, skipping opening parentheses.
pub fn leading_keyword<'a>(tokens: &[Token<'a>]) -> Option<&'a str> {
    tokens
        .iter()
        .find(|t| t.kind != TokenKind::LParen)
        .filter(|t| t.kind == TokenKind::Word)
        .map(|t| t.text)
}

/// Whether anything but further terminators follows the first `;`.
pub fn has_trailing_statement(tokens: &[Token<'_>]) -> bool {
    tokens
        .iter()
        .skip_while(|t| t.kind != TokenKind::Semicolon)
        .any(|t| t.kind != TokenKind::Semicolon)
}

/// Number of `?` placeholders among `tokens`.
pub fn count_placeholders(tokens: &[Token<'_>]) -> usize {
    tokens
        .iter()
        .filter(|t| t.kind == TokenKind::Placeholder)
        .count()
}

/// Count placeholders among `tokens` whose start lies in `[from, to)`.
pub fn placeholders_between(tokens: &[Token<'_>], from: usize, to: usize) -> usize {
    tokens
        .iter()
        .filter(|t| t.kind == TokenKind::Placeholder && t.start >= from && t.start < to)
        .count()
}

/// Index of the first top-level `first second` keyword pair (e.g. `GROUP BY`).
pub fn find_pair(tokens: &[Token<'_>], first: &str, second: &str) -> Option<usize> {
    tokens.windows(2).position(|w| {
        w[0].is_top_level() && w[0].is_word(first) && w[1].is_word(second)
    })
}

/// Replace each placeholder, in order, with the output of `replace(n)` where
/// `n` is the zero-based placeholder index.
pub fn replace_placeholders(
    sql: &str,
    driver: Driver,
    mut replace: impl FnMut(usize) -> String,
) -> DbResult<String> {
    let mut out = String::with_capacity(sql.len() + 16);
    let mut last = 0;
    let mut index = 0;
    for token in tokenize(sql, driver)? {
        if token.kind == TokenKind::Placeholder {
            out.push_str(&sql[last..token.start]);
            out.push_str(&replace(index));
            last = token.end;
            index += 1;
        }
    }
    out.push_str(&sql[last..]);
    Ok(out)
}

/// Rewrite `?` placeholders to PostgreSQL's numbered `$n` form.
pub fn to_numbered_placeholders(sql: &str) -> DbResult<String> {
    replace_placeholders(sql, Driver::Postgres, |n| format!("${}", n + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DRIVERS: [Driver; 3] = [Driver::MySql, Driver::Postgres, Driver::Sqlite];

    fn placeholders(sql: &str, driver: Driver) -> usize {
        count_placeholders(&tokenize(sql, driver).unwrap())
    }

    #[test]
    fn test_tokenize_depth() {
        let tokens = tokenize("SELECT a FROM (SELECT b FROM t) x", Driver::MySql).unwrap();
        let inner_from = tokens.iter().filter(|t| t.is_word("FROM")).nth(1).unwrap();
        assert_eq!(inner_from.depth, 1);
        let outer_from = tokens.iter().find(|t| t.is_word("FROM")).unwrap();
        assert!(outer_from.is_top_level());
        assert!(tokens.last().unwrap().is_top_level());
    }

    #[test]
    fn test_byte_spans_survive_multibyte_and_newlines() {
        let sql = "SELECT 'é€'\n  , name FROM t WHERE x = ?";
        for driver in DRIVERS {
            let tokens = tokenize(sql, driver).unwrap();
            let literal = tokens.iter().find(|t| t.kind == TokenKind::Literal).unwrap();
            assert_eq!(literal.text, "'é€'");
            let name = tokens.iter().find(|t| t.is_word("name")).unwrap();
            assert_eq!(&sql[name.start..name.end], "name");
            assert_eq!(tokens.last().unwrap().text, "?");
        }
    }

    #[test]
    fn test_placeholders_ignore_literals_and_comments() {
        let sql = "SELECT '?', `b?` FROM t -- trailing ?\nWHERE x = ? /* ? */ AND y = ?";
        assert_eq!(placeholders(sql, Driver::MySql), 2);
        assert_eq!(placeholders(sql, Driver::Sqlite), 2);

        let pg = "SELECT '?', \"a?\" FROM t -- trailing ?\nWHERE x = ? /* ? */ AND y IN (?, ?)";
        assert_eq!(placeholders(pg, Driver::Postgres), 3);
    }

    #[test]
    fn test_backslash_is_literal_outside_mysql() {
        let sql = r"SELECT * FROM users WHERE name <> 'C:\' AND id = ?";
        assert_eq!(placeholders(sql, Driver::Sqlite), 1);
        assert_eq!(placeholders(sql, Driver::Postgres), 1);
        // MySQL reads `\'` as an escaped quote, leaving the string open
        assert!(matches!(
            tokenize(sql, Driver::MySql),
            Err(DbError::InvalidQuery { .. })
        ));
    }

    #[test]
    fn test_mysql_backslash_escapes() {
        assert_eq!(
            placeholders(r"SELECT 'it\'s ?' FROM t WHERE a = ?", Driver::MySql),
            1
        );
        assert_eq!(
            placeholders(r"SELECT 'C:\\' FROM t WHERE a = ?", Driver::MySql),
            1
        );
    }

    #[test]
    fn test_doubled_quotes() {
        for driver in DRIVERS {
            assert_eq!(placeholders("SELECT 'it''s ?' FROM t WHERE a = ?", driver), 1);
        }
    }

    #[test]
    fn test_postgres_dollar_quoting() {
        let sql = "SELECT $$ ? $$, $tag$ it's ? $tag$ FROM t WHERE a = ?";
        assert_eq!(placeholders(sql, Driver::Postgres), 1);
    }

    #[test]
    fn test_unterminated_literal_rejected() {
        for driver in DRIVERS {
            assert!(tokenize("SELECT 'abc", driver).is_err());
        }
    }

    #[test]
    fn test_leading_keyword() {
        let keyword = |sql| leading_keyword(&tokenize(sql, Driver::MySql).unwrap()).map(str::to_string);
        assert_eq!(keyword("  select * from t").as_deref(), Some("select"));
        assert_eq!(
            keyword("/* hint */ INSERT INTO t VALUES (1)").as_deref(),
            Some("INSERT")
        );
        assert_eq!(keyword("(SELECT 1) UNION (SELECT 2)").as_deref(), Some("SELECT"));
        assert_eq!(keyword(""), None);
        assert_eq!(keyword("'abc'"), None);
    }

    #[test]
    fn test_trailing_statement() {
        let trailing = |sql| has_trailing_statement(&tokenize(sql, Driver::Sqlite).unwrap());
        assert!(!trailing("SELECT 1"));
        assert!(!trailing("SELECT 1;"));
        assert!(!trailing("SELECT 1; -- done"));
        assert!(!trailing("SELECT ';' FROM t"));
        assert!(trailing("SELECT 1; DROP TABLE t"));
    }

    #[test]
    fn test_find_pair() {
        let tokens = tokenize("SELECT a FROM t GROUP  BY a", Driver::MySql).unwrap();
        let idx = find_pair(&tokens, "GROUP", "BY").unwrap();
        assert_eq!(tokens[idx].text, "GROUP");
        assert!(find_pair(&tokens, "ORDER", "BY").is_none());
    }

    #[test]
    fn test_numbered_placeholders() {
        assert_eq!(
            to_numbered_placeholders("SELECT * FROM t WHERE a = ? AND b = '?' AND c IN (?, ?)")
                .unwrap(),
            "SELECT * FROM t WHERE a = $1 AND b = '?' AND c IN ($2, $3)"
        );
    }

    #[test]
    fn test_unquoted() {
        let tokens = tokenize("SELECT * FROM `order_items`", Driver::MySql).unwrap();
        assert_eq!(tokens.last().unwrap().unquoted(), "order_items");
    }
}
