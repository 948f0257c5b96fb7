use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{
    record::{DecodeError, FromValue},
    value::Value,
};

use super::{Converter, ParseError, ShapeError};

/// `json` and `jsonb`.
#[derive(Debug, Clone, Copy)]
pub struct JsonConverter {
    name: &'static str,
}

impl JsonConverter {
    pub const fn json() -> Self {
        Self { name: "json" }
    }

    pub const fn jsonb() -> Self {
        Self { name: "jsonb" }
    }
}

impl Converter for JsonConverter {
    fn name(&self) -> &str {
        self.name
    }

    fn parse(&self, text: &str) -> Result<Value, ParseError> {
        serde_json::from_str(text).map(Value::Json).map_err(|e| {
            let offset = char_offset(text, e.line(), e.column());
            ParseError::new(self.name, "valid json", text, offset)
        })
    }

    fn format(&self, value: &Value) -> Result<String, ShapeError> {
        match value {
            Value::Json(json) => Ok(json.to_string()),
            other => Err(ShapeError::mismatch(self.name, "json", other)),
        }
    }
}

/// `serde_json` reports 1-based line and column.
fn char_offset(text: &str, line: usize, column: usize) -> usize {
    let mut offset = 0;
    for (i, l) in text.split('\n').enumerate() {
        if i + 1 == line {
            return offset + column.saturating_sub(1).min(l.chars().count());
        }
        offset += l.chars().count() + 1;
    }
    text.chars().count()
}

/// Map a [`Value::Json`] from and to any serde type.
///
/// ```
/// use pgcore::{types::Json, record::Record};
///
/// #[derive(serde::Deserialize)]
/// struct Tag { name: String }
///
/// let record = Record::new().with("tag", serde_json::json!({ "name": "rust" }));
/// let Json(tag) = record.try_get::<Json<Tag>>("tag").unwrap();
/// assert_eq!(tag.name, "rust");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Json<T>(pub T);

impl<T: Serialize> Json<T> {
    /// Serialize inner value into [`Value::Json`].
    pub fn into_value(self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self.0).map(Value::Json)
    }
}

impl<T: DeserializeOwned> FromValue for Json<T> {
    fn from_value(value: Value) -> Result<Self, DecodeError> {
        match value {
            Value::Json(json) => Ok(Json(serde_json::from_value(json)?)),
            Value::Text(text) => Ok(Json(serde_json::from_str(&text)?)),
            Value::Null => Err(DecodeError::Null),
            other => Err(DecodeError::Mismatch { expected: "json", found: other.kind() }),
        }
    }
}

impl<T: Serialize> Serialize for Json<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Json<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Ok(Self(T::deserialize(deserializer)?))
    }
}
