//! Attribute casts
//!
//! A cast converts a stored value into its semantic form on hydration and
//! back on save. Null passes through every cast untouched.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{OrmError, OrmResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cast {
    String,
    Integer,
    Float,
    Boolean,
    /// RFC 3339 text
    Date,
    /// A JSON array, stored as JSON text by relational backends
    Array,
    /// Any JSON value, stored as JSON text by relational backends
    Json,
    /// Text encrypted at rest through the registry's [`Encrypter`]
    EncryptedString,
}

/// Encryption collaborator for [`Cast::EncryptedString`] attributes
pub trait Encrypter: Send + Sync {
    fn encrypt(&self, plain: &str) -> anyhow::Result<String>;
    fn decrypt(&self, cipher: &str) -> anyhow::Result<String>;
}

impl Cast {
    /// Stored value to semantic value
    pub fn from_storage(
        &self,
        field: &str,
        value: Value,
        encrypter: Option<&dyn Encrypter>,
    ) -> OrmResult<Value> {
        if value.is_null() {
            return Ok(value);
        }
        match self {
            Cast::Array => match value {
                Value::String(text) => match serde_json::from_str::<Value>(&text) {
                    Ok(parsed @ Value::Array(_)) => Ok(parsed),
                    _ => Err(OrmError::cast(field, "stored text is not a JSON array")),
                },
                array @ Value::Array(_) => Ok(array),
                _ => Err(OrmError::cast(field, "expected an array")),
            },
            Cast::Json => match value {
                Value::String(text) => serde_json::from_str(&text)
                    .map_err(|e| OrmError::cast(field, format!("stored text is not JSON: {}", e))),
                other => Ok(other),
            },
            Cast::EncryptedString => {
                let cipher = value
                    .as_str()
                    .ok_or_else(|| OrmError::cast(field, "encrypted value must be text"))?;
                let encrypter = require_encrypter(field, encrypter)?;
                encrypter
                    .decrypt(cipher)
                    .map(Value::String)
                    .map_err(|e| OrmError::cast(field, format!("decryption failed: {}", e)))
            }
            _ => self.coerce(field, &value),
        }
    }

    /// Semantic value to stored value
    pub fn to_storage(
        &self,
        field: &str,
        value: &Value,
        encrypter: Option<&dyn Encrypter>,
    ) -> OrmResult<Value> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        match self {
            Cast::Array => match value {
                Value::Array(_) => Ok(value.clone()),
                _ => Err(OrmError::cast(field, "expected an array")),
            },
            Cast::Json => Ok(value.clone()),
            Cast::EncryptedString => {
                let plain = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                let encrypter = require_encrypter(field, encrypter)?;
                encrypter
                    .encrypt(&plain)
                    .map(Value::String)
                    .map_err(|e| OrmError::cast(field, format!("encryption failed: {}", e)))
            }
            _ => self.coerce(field, value),
        }
    }

    /// Scalar conversions shared by both directions
    fn coerce(&self, field: &str, value: &Value) -> OrmResult<Value> {
        match self {
            Cast::String => Ok(match value {
                Value::String(_) => value.clone(),
                other => Value::String(other.to_string()),
            }),
            Cast::Integer => match value {
                Value::Number(n) => match (n.as_i64(), n.as_f64()) {
                    (Some(i), _) => Ok(Value::from(i)),
                    (None, Some(f)) if f.fract() != 0.0 => Err(OrmError::cast(
                        field,
                        format!("{} is not a whole number", f),
                    )),
                    // i64::MAX as f64 rounds up to 2^63, which no i64 holds
                    (None, Some(f)) if f >= i64::MIN as f64 && f < i64::MAX as f64 => {
                        Ok(Value::from(f as i64))
                    }
                    _ => Err(OrmError::cast(field, "integer out of range")),
                },
                Value::String(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(Value::from)
                    .map_err(|_| OrmError::cast(field, format!("'{}' is not an integer", s))),
                Value::Bool(b) => Ok(Value::from(i64::from(*b))),
                _ => Err(OrmError::cast(field, "expected an integer")),
            },
            Cast::Float => match value {
                Value::Number(n) => n
                    .as_f64()
                    .map(Value::from)
                    .ok_or_else(|| OrmError::cast(field, "number out of range")),
                Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .map(Value::from)
                    .map_err(|_| OrmError::cast(field, format!("'{}' is not a number", s))),
                _ => Err(OrmError::cast(field, "expected a number")),
            },
            Cast::Boolean => match value {
                Value::Bool(_) => Ok(value.clone()),
                Value::Number(n) => Ok(Value::Bool(n.as_f64().map_or(false, |f| f != 0.0))),
                Value::String(s) => match s.trim().to_lowercase().as_str() {
                    "true" | "1" | "yes" => Ok(Value::Bool(true)),
                    "false" | "0" | "no" | "" => Ok(Value::Bool(false)),
                    _ => Err(OrmError::cast(field, format!("'{}' is not a boolean", s))),
                },
                _ => Err(OrmError::cast(field, "expected a boolean")),
            },
            Cast::Date => normalize_date(value)
                .map(|date| Value::String(date.to_rfc3339()))
                .ok_or_else(|| OrmError::cast(field, format!("{} is not a date", value))),
            Cast::Array | Cast::Json | Cast::EncryptedString => Ok(value.clone()),
        }
    }
}

fn require_encrypter<'a>(
    field: &str,
    encrypter: Option<&'a dyn Encrypter>,
) -> OrmResult<&'a dyn Encrypter> {
    encrypter.ok_or_else(|| OrmError::cast(field, "no encrypter is registered"))
}

/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DD`, unix seconds and
/// MongoDB's extended-JSON `{"$date": ...}`
fn normalize_date(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if let Ok(parsed) = DateTime::parse_from_rfc3339(s) {
                return Some(parsed.with_timezone(&Utc));
            }
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
                return Some(Utc.from_utc_datetime(&naive));
            }
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
                .map(|naive| Utc.from_utc_datetime(&naive))
        }
        Value::Number(n) => n
            .as_i64()
            .and_then(|seconds| Utc.timestamp_opt(seconds, 0).single()),
        Value::Object(map) => match map.get("$date") {
            Some(Value::Object(inner)) => inner
                .get("$numberLong")
                .and_then(Value::as_str)
                .and_then(|ms| ms.parse::<i64>().ok())
                .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
            Some(inner) => normalize_date(inner),
            None => None,
        },
        _ => None,
    }
}
