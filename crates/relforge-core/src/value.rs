use chrono::{DateTime, FixedOffset, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::ValueKind;

/// Runtime value bound to a procedure parameter or read from a result row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Value {
    Null,
    Bool(bool),
    Byte(u8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Single(f32),
    Double(f64),
    /// Exact decimal kept as text to avoid binary rounding.
    Decimal(String),
    Text(String),
    DateTime(NaiveDateTime),
    DateTimeOffset(DateTime<FixedOffset>),
    Time(NaiveTime),
    Guid(Uuid),
    Bytes(Vec<u8>),
    TextArray(Vec<String>),
}

impl Value {
    /// Kind of the value; `None` for NULL, which every column type accepts.
    pub fn kind(&self) -> Option<ValueKind> {
        match self {
            Value::Null => None,
            Value::Bool(_) => Some(ValueKind::Bool),
            Value::Byte(_) => Some(ValueKind::Byte),
            Value::Int16(_) => Some(ValueKind::Int16),
            Value::Int32(_) => Some(ValueKind::Int32),
            Value::Int64(_) => Some(ValueKind::Int64),
            Value::Single(_) => Some(ValueKind::Single),
            Value::Double(_) => Some(ValueKind::Double),
            Value::Decimal(_) => Some(ValueKind::Decimal),
            Value::Text(_) => Some(ValueKind::String),
            Value::DateTime(_) => Some(ValueKind::DateTime),
            Value::DateTimeOffset(_) => Some(ValueKind::DateTimeOffset),
            Value::Time(_) => Some(ValueKind::TimeSpan),
            Value::Guid(_) => Some(ValueKind::Guid),
            Value::Bytes(_) => Some(ValueKind::Bytes),
            Value::TextArray(_) => Some(ValueKind::StringArray),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(value) | Value::Decimal(value) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Text used when the value travels inside a JSON array parameter or a
    /// status message.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(value) => value.to_string(),
            Value::Byte(value) => value.to_string(),
            Value::Int16(value) => value.to_string(),
            Value::Int32(value) => value.to_string(),
            Value::Int64(value) => value.to_string(),
            Value::Single(value) => value.to_string(),
            Value::Double(value) => value.to_string(),
            Value::Decimal(value) | Value::Text(value) => value.clone(),
            Value::DateTime(value) => value.format("%Y-%m-%dT%H:%M:%S%.3f").to_string(),
            Value::DateTimeOffset(value) => value.to_rfc3339(),
            Value::Time(value) => value.format("%H:%M:%S%.f").to_string(),
            Value::Guid(value) => value.to_string(),
            Value::Bytes(value) => value.iter().map(|byte| format!("{byte:02x}")).collect(),
            Value::TextArray(values) => {
                let quoted: Vec<String> = values
                    .iter()
                    .map(|value| format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\"")))
                    .collect();
                format!("[{}]", quoted.join(","))
            }
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int32(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int64(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Value::DateTime(value)
    }
}

impl From<Uuid> for Value {
    fn from(value: Uuid) -> Self {
        Value::Guid(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}
