//! Column decoding.
//!
//! Rows are turned into [`JsonRow`]s keyed by column name. Decoding is done
//! in two steps: [`ColumnKind::classify`] maps the driver's type name onto a
//! logical kind, then a per-driver decoder extracts the value. Duplicate
//! column names (e.g. `id` from two joined tables) keep the last value.

use crate::models::{Driver, JsonRow};
use serde_json::Value as JsonValue;
use sqlx::mysql::{MySqlRow, MySqlTypeInfo, MySqlValueRef};
use sqlx::postgres::{PgRow, PgTypeInfo, PgValueRef};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, ColumnIndex, Decode, Row, Type, TypeInfo};
use tracing::warn;

/// Logical kind of a result column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Float,
    /// Exact numerics, kept as strings
    Decimal,
    Boolean,
    Json,
    Binary,
    Timestamp,
    TimestampTz,
    Date,
    Time,
    Text,
}

impl ColumnKind {
    /// Classify a driver type name such as `BIGINT UNSIGNED` or `timestamptz`.
    pub fn classify(type_name: &str, driver: Driver) -> Self {
        let lower = type_name.to_lowercase();
        let base = lower.split_whitespace().next().unwrap_or("");

        if base.starts_with("decimal") || base.starts_with("numeric") {
            // SQLite's NUMERIC affinity stores plain floats
            return if driver == Driver::Sqlite {
                ColumnKind::Float
            } else {
                ColumnKind::Decimal
            };
        }

        match base {
            "tinyint" | "smallint" | "mediumint" | "int" | "integer" | "bigint" | "int2"
            | "int4" | "int8" | "serial" | "smallserial" | "bigserial" | "year" => {
                ColumnKind::Integer
            }
            "bool" | "boolean" => ColumnKind::Boolean,
            "float" | "float4" | "float8" | "double" | "real" => ColumnKind::Float,
            "json" | "jsonb" => ColumnKind::Json,
            "bytea" => ColumnKind::Binary,
            "timestamptz" => ColumnKind::TimestampTz,
            "timestamp" if lower.contains("with time zone") => ColumnKind::TimestampTz,
            "datetime" | "timestamp" => ColumnKind::Timestamp,
            "date" => ColumnKind::Date,
            "time" => ColumnKind::Time,
            _ if base.contains("blob") || base.contains("binary") => ColumnKind::Binary,
            _ => ColumnKind::Text,
        }
    }
}

/// Wrapper type for raw DECIMAL/NUMERIC values as strings.
/// This preserves the exact database representation.
#[derive(Debug)]
pub struct RawDecimal(pub String);

impl Type<sqlx::MySql> for RawDecimal {
    fn type_info() -> MySqlTypeInfo {
        <String as Type<sqlx::MySql>>::type_info()
    }

    fn compatible(ty: &MySqlTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("decimal") || name.contains("numeric")
    }
}

impl<'r> Decode<'r, sqlx::MySql> for RawDecimal {
    fn decode(value: MySqlValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::MySql>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

impl Type<sqlx::Postgres> for RawDecimal {
    fn type_info() -> PgTypeInfo {
        <String as Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("numeric") || name.contains("decimal")
    }
}

impl<'r> Decode<'r, sqlx::Postgres> for RawDecimal {
    fn decode(value: PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::Postgres>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

/// Binary values become text when they are valid UTF-8, base64 otherwise.
pub fn binary_to_json(bytes: &[u8]) -> JsonValue {
    use base64::{Engine as _, engine::general_purpose::STANDARD};

    match std::str::from_utf8(bytes) {
        Ok(s) => JsonValue::String(s.to_string()),
        Err(_) => JsonValue::String(STANDARD.encode(bytes)),
    }
}

fn float_to_json(v: f64) -> JsonValue {
    serde_json::Number::from_f64(v)
        .map(JsonValue::Number)
        .unwrap_or_else(|| JsonValue::String(v.to_string()))
}

/// Decode column `idx` as `T`. A failed decode reads as NULL but is logged.
fn decoded<'r, T, R>(row: &'r R, idx: usize, kind: ColumnKind) -> Option<T>
where
    R: Row,
    usize: ColumnIndex<R>,
    T: Decode<'r, R::Database> + Type<R::Database>,
{
    match row.try_get::<Option<T>, _>(idx) {
        Ok(v) => v,
        Err(e) => {
            let column = row.columns().get(idx).map_or("?", |c| c.name());
            warn!(column, ?kind, error = %e, "Column decode failed, returning null");
            None
        }
    }
}

fn display_to_json<T: ToString>(v: Option<T>) -> JsonValue {
    v.map_or(JsonValue::Null, |v| JsonValue::String(v.to_string()))
}

/// Conversion of a driver row into a [`JsonRow`].
pub trait RowToJson {
    fn to_json_row(&self) -> JsonRow;
}

impl RowToJson for MySqlRow {
    fn to_json_row(&self) -> JsonRow {
        self.columns()
            .iter()
            .map(|col| {
                let kind = ColumnKind::classify(col.type_info().name(), Driver::MySql);
                (col.name().to_string(), mysql::decode(self, col.ordinal(), kind))
            })
            .collect()
    }
}

impl RowToJson for PgRow {
    fn to_json_row(&self) -> JsonRow {
        self.columns()
            .iter()
            .map(|col| {
                let kind = ColumnKind::classify(col.type_info().name(), Driver::Postgres);
                (col.name().to_string(), postgres::decode(self, col.ordinal(), kind))
            })
            .collect()
    }
}

impl RowToJson for SqliteRow {
    fn to_json_row(&self) -> JsonRow {
        self.columns()
            .iter()
            .map(|col| {
                let kind = ColumnKind::classify(col.type_info().name(), Driver::Sqlite);
                (col.name().to_string(), sqlite::decode(self, col.ordinal(), kind))
            })
            .collect()
    }
}

mod mysql {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

    pub fn decode(row: &MySqlRow, idx: usize, kind: ColumnKind) -> JsonValue {
        match kind {
            ColumnKind::Integer => decode_integer(row, idx),
            ColumnKind::Decimal => match row.try_get::<Option<RawDecimal>, _>(idx) {
                Ok(v) => v.map_or(JsonValue::Null, |d| JsonValue::String(d.0)),
                Err(e) => {
                    tracing::error!("Failed to decode DECIMAL: {:?}", e);
                    JsonValue::Null
                }
            },
            ColumnKind::Float => decode_float(row, idx),
            ColumnKind::Boolean => decoded::<bool, _>(row, idx, kind)
                .map_or(JsonValue::Null, JsonValue::Bool),
            ColumnKind::Json => decoded::<JsonValue, _>(row, idx, kind)
                .unwrap_or(JsonValue::Null),
            ColumnKind::Binary => decode_bytes(row, idx),
            ColumnKind::Timestamp | ColumnKind::TimestampTz => {
                display_to_json(decoded::<NaiveDateTime, _>(row, idx, kind))
            }
            ColumnKind::Date => {
                display_to_json(decoded::<NaiveDate, _>(row, idx, kind))
            }
            ColumnKind::Time => {
                display_to_json(decoded::<NaiveTime, _>(row, idx, kind))
            }
            ColumnKind::Text => decode_text(row, idx),
        }
    }

    fn decode_integer(row: &MySqlRow, idx: usize) -> JsonValue {
        // Signed first, then UNSIGNED columns, then the narrower widths
        if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
            return v.map_or(JsonValue::Null, JsonValue::from);
        }
        if let Ok(v) = row.try_get::<Option<u64>, _>(idx) {
            return v.map_or(JsonValue::Null, JsonValue::from);
        }
        if let Ok(v) = row.try_get::<Option<i32>, _>(idx) {
            return v.map_or(JsonValue::Null, JsonValue::from);
        }
        if let Ok(v) = row.try_get::<Option<u32>, _>(idx) {
            return v.map_or(JsonValue::Null, JsonValue::from);
        }
        if let Ok(v) = row.try_get::<Option<i16>, _>(idx) {
            return v.map_or(JsonValue::Null, JsonValue::from);
        }
        if let Ok(v) = row.try_get::<Option<u16>, _>(idx) {
            return v.map_or(JsonValue::Null, JsonValue::from);
        }
        if let Ok(v) = row.try_get::<Option<i8>, _>(idx) {
            return v.map_or(JsonValue::Null, JsonValue::from);
        }
        decoded::<u8, _>(row, idx, ColumnKind::Integer).map_or(JsonValue::Null, JsonValue::from)
    }

    fn decode_float(row: &MySqlRow, idx: usize) -> JsonValue {
        if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
            return v.map_or(JsonValue::Null, float_to_json);
        }
        decoded::<f32, _>(row, idx, ColumnKind::Float)
            .map_or(JsonValue::Null, |v| float_to_json(f64::from(v)))
    }

    fn decode_bytes(row: &MySqlRow, idx: usize) -> JsonValue {
        decoded::<Vec<u8>, _>(row, idx, ColumnKind::Binary)
            .map_or(JsonValue::Null, |v| binary_to_json(&v))
    }

    fn decode_text(row: &MySqlRow, idx: usize) -> JsonValue {
        // VARCHAR columns with a binary collation arrive as bytes
        match row.try_get::<Option<String>, _>(idx) {
            Ok(v) => v.map_or(JsonValue::Null, JsonValue::String),
            Err(_) => decode_bytes(row, idx),
        }
    }
}

mod postgres {
    use super::*;
    use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

    pub fn decode(row: &PgRow, idx: usize, kind: ColumnKind) -> JsonValue {
        match kind {
            ColumnKind::Integer => decode_integer(row, idx),
            ColumnKind::Decimal => match row.try_get::<Option<RawDecimal>, _>(idx) {
                Ok(v) => v.map_or(JsonValue::Null, |d| JsonValue::String(d.0)),
                Err(e) => {
                    tracing::error!("Failed to decode NUMERIC: {:?}", e);
                    JsonValue::Null
                }
            },
            ColumnKind::Float => {
                if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
                    return v.map_or(JsonValue::Null, float_to_json);
                }
                decoded::<f32, _>(row, idx, kind)
                    .map_or(JsonValue::Null, |v| float_to_json(f64::from(v)))
            }
            ColumnKind::Boolean => decoded::<bool, _>(row, idx, kind)
                .map_or(JsonValue::Null, JsonValue::Bool),
            ColumnKind::Json => decoded::<JsonValue, _>(row, idx, kind)
                .unwrap_or(JsonValue::Null),
            ColumnKind::Binary => decoded::<Vec<u8>, _>(row, idx, kind)
                .map_or(JsonValue::Null, |v| binary_to_json(&v)),
            ColumnKind::TimestampTz => decoded::<DateTime<Utc>, _>(row, idx, kind)
                .map_or(JsonValue::Null, |v| JsonValue::String(v.to_rfc3339())),
            ColumnKind::Timestamp => {
                display_to_json(decoded::<NaiveDateTime, _>(row, idx, kind))
            }
            ColumnKind::Date => {
                display_to_json(decoded::<NaiveDate, _>(row, idx, kind))
            }
            ColumnKind::Time => {
                display_to_json(decoded::<NaiveTime, _>(row, idx, kind))
            }
            ColumnKind::Text => decoded::<String, _>(row, idx, kind)
                .map_or(JsonValue::Null, JsonValue::String),
        }
    }

    fn decode_integer(row: &PgRow, idx: usize) -> JsonValue {
        if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
            return v.map_or(JsonValue::Null, JsonValue::from);
        }
        if let Ok(v) = row.try_get::<Option<i32>, _>(idx) {
            return v.map_or(JsonValue::Null, JsonValue::from);
        }
        decoded::<i16, _>(row, idx, ColumnKind::Integer).map_or(JsonValue::Null, JsonValue::from)
    }
}

mod sqlite {
    use super::*;

    // SQLite is dynamically typed: the declared type is only a hint, so every
    // path falls back to whatever storage class the value actually has.
    pub fn decode(row: &SqliteRow, idx: usize, kind: ColumnKind) -> JsonValue {
        match kind {
            ColumnKind::Boolean => match row.try_get::<Option<bool>, _>(idx) {
                Ok(v) => v.map_or(JsonValue::Null, JsonValue::Bool),
                Err(_) => decode_dynamic(row, idx, kind),
            },
            ColumnKind::Json => match row.try_get::<Option<String>, _>(idx) {
                Ok(Some(v)) => serde_json::from_str(&v).unwrap_or(JsonValue::String(v)),
                Ok(None) => JsonValue::Null,
                Err(_) => decode_dynamic(row, idx, kind),
            },
            _ => decode_dynamic(row, idx, kind),
        }
    }

    fn decode_dynamic(row: &SqliteRow, idx: usize, kind: ColumnKind) -> JsonValue {
        if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
            return v.map_or(JsonValue::Null, JsonValue::from);
        }
        if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
            return v.map_or(JsonValue::Null, float_to_json);
        }
        if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
            return v.map_or(JsonValue::Null, JsonValue::String);
        }
        decoded::<Vec<u8>, _>(row, idx, kind)
            .map_or(JsonValue::Null, |v| binary_to_json(&v))
    }
}
