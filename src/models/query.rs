//! Statement-related data models.
//!
//! This module defines bound parameters, statements and execution results.

use crate::error::{DbError, DbResult};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

/// Default statement timeout in seconds.
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;

/// One result row, keyed by column name.
pub type JsonRow = serde_json::Map<String, JsonValue>;

/// A scalar parameter value for positional placeholders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryParam {
    /// NULL value
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value (stored as i64 for maximum range)
    Int(i64),
    /// Floating point value
    Float(f64),
    /// String value
    String(String),
}

impl QueryParam {
    /// Check if this parameter is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the type name of this parameter for debugging.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
        }
    }

    /// Convert a JSON value, rejecting arrays and objects.
    pub fn from_json(value: &JsonValue) -> DbResult<Self> {
        match value {
            JsonValue::Null => Ok(Self::Null),
            JsonValue::Bool(v) => Ok(Self::Bool(*v)),
            JsonValue::Number(n) => match n.as_i64() {
                Some(v) => Ok(Self::Int(v)),
                None => n.as_f64().map(Self::Float).ok_or_else(|| {
                    DbError::invalid_params(format!("Number {} is out of range", n))
                }),
            },
            JsonValue::String(v) => Ok(Self::String(v.clone())),
            JsonValue::Array(_) => Err(DbError::invalid_params(
                "Array parameters are not supported; bind each element separately",
            )),
            JsonValue::Object(_) => Err(DbError::invalid_params(
                "Object parameters are not supported; bind scalar values only",
            )),
        }
    }

    /// Convert back into a JSON value.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Null => JsonValue::Null,
            Self::Bool(v) => JsonValue::Bool(*v),
            Self::Int(v) => JsonValue::from(*v),
            Self::Float(v) => serde_json::Number::from_f64(*v)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Self::String(v) => JsonValue::String(v.clone()),
        }
    }
}

impl fmt::Display for QueryParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Bool(true) => write!(f, "TRUE"),
            Self::Bool(false) => write!(f, "FALSE"),
            Self::Int(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::String(v) => write!(f, "'{}'", v.replace('\'', "''")),
        }
    }
}

impl From<bool> for QueryParam {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for QueryParam {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<i64> for QueryParam {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u32> for QueryParam {
    fn from(v: u32) -> Self {
        Self::Int(v.into())
    }
}

impl From<f64> for QueryParam {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for QueryParam {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for QueryParam {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl<T: Into<QueryParam>> From<Option<T>> for QueryParam {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// SQL text plus its ordered parameters.
///
/// `tables` optionally declares the contributing tables, root first. When it
/// is empty they are derived from the SQL text at hydration time.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Statement {
    pub sql: String,
    #[serde(default)]
    pub params: Vec<QueryParam>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tables: Vec<String>,
}

impl Statement {
    /// Create a statement without parameters.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
            tables: Vec::new(),
        }
    }

    /// Create a statement with a full parameter list.
    pub fn with_params(sql: impl Into<String>, params: Vec<QueryParam>) -> Self {
        Self {
            sql: sql.into(),
            params,
            tables: Vec::new(),
        }
    }

    /// Create a statement from JSON parameter values.
    pub fn from_json(sql: impl Into<String>, values: &[JsonValue]) -> DbResult<Self> {
        let params = values
            .iter()
            .map(QueryParam::from_json)
            .collect::<DbResult<Vec<_>>>()?;
        Ok(Self::with_params(sql, params))
    }

    /// Bind the next positional parameter.
    pub fn bind(mut self, param: impl Into<QueryParam>) -> Self {
        self.params.push(param.into());
        self
    }

    /// Declare the contributing tables, root table first.
    pub fn with_tables<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tables = tables.into_iter().map(Into::into).collect();
        self
    }
}

impl From<&str> for Statement {
    fn from(sql: &str) -> Self {
        Self::new(sql)
    }
}

/// Outcome of a write statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExecuteResult {
    pub rows_affected: u64,
    /// Reported by MySQL and SQLite only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_insert_id: Option<i64>,
}
