//! Conversion between JSON values and sqlx `Any` rows and arguments

use serde_json::{Number, Value};
use sqlx::any::{AnyArguments, AnyRow};
use sqlx::query::Query;
use sqlx::{Any, Column, Row, TypeInfo, ValueRef};

use crate::backends::Document;
use crate::error::{OrmError, OrmResult};

pub type AnyQuery<'q> = Query<'q, Any, AnyArguments<'q>>;

/// Bind JSON parameters in order. Arrays and objects travel as JSON text.
pub fn bind_params<'q>(mut query: AnyQuery<'q>, params: &[Value]) -> AnyQuery<'q> {
    for param in params {
        query = match param {
            Value::Null => query.bind(Option::<String>::None),
            Value::Bool(b) => query.bind(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    query.bind(i)
                } else if let Some(f) = n.as_f64() {
                    query.bind(f)
                } else {
                    query.bind(n.to_string())
                }
            }
            Value::String(s) => query.bind(s.clone()),
            other => query.bind(other.to_string()),
        };
    }
    query
}

/// Decode every column of a row into a document
pub fn decode_row(row: &AnyRow) -> OrmResult<Document> {
    let mut document = Document::new();
    for (index, column) in row.columns().iter().enumerate() {
        document.insert(column.name().to_string(), decode_column(row, index, column.name())?);
    }
    Ok(document)
}

fn decode_column(row: &AnyRow, index: usize, name: &str) -> OrmResult<Value> {
    // The Any driver reports SQL NULL through the value's type, not always
    // through `is_null`
    let raw = row.try_get_raw(index)?;
    if raw.is_null() || raw.type_info().is_null() {
        return Ok(Value::Null);
    }
    if let Ok(Some(i)) = row.try_get::<Option<i64>, _>(index) {
        return Ok(Value::Number(i.into()));
    }
    if let Ok(Some(i)) = row.try_get::<Option<i32>, _>(index) {
        return Ok(Value::Number(i.into()));
    }
    if let Ok(Some(f)) = row.try_get::<Option<f64>, _>(index) {
        return Ok(Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null));
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(index) {
        return Ok(Value::Bool(b));
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(index) {
        return Ok(Value::String(s));
    }
    if let Ok(Some(bytes)) = row.try_get::<Option<Vec<u8>>, _>(index) {
        return Ok(match String::from_utf8(bytes) {
            Ok(text) => Value::String(text),
            Err(e) => Value::String(hex::encode(e.into_bytes())),
        });
    }
    if let Ok(None) = row.try_get::<Option<String>, _>(index) {
        return Ok(Value::Null);
    }
    Err(OrmError::Serialization(format!(
        "column '{}' has a type that cannot be decoded",
        name
    )))
}

/// Read the `aggregate` column produced by count queries
pub fn decode_count(row: &AnyRow) -> OrmResult<u64> {
    let count: i64 = row.try_get("aggregate")?;
    Ok(count.max(0) as u64)
}
