use crate::{
    common::Cursor,
    value::{Numeric, Value},
};

use super::{Converter, ParseError, ShapeError};

/// `bool`.
///
/// Accepts `t`, `true`, `yes`, `on`, `1` and their false counterpart, in any case.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoolConverter;

impl Converter for BoolConverter {
    fn name(&self) -> &str {
        "bool"
    }

    fn parse(&self, text: &str) -> Result<Value, ParseError> {
        match text.trim().to_ascii_lowercase().as_str() {
            "t" | "true" | "y" | "yes" | "on" | "1" => Ok(Value::Bool(true)),
            "f" | "false" | "n" | "no" | "off" | "0" => Ok(Value::Bool(false)),
            _ => Err(ParseError::new(self.name(), "boolean literal", text, 0)),
        }
    }

    fn format(&self, value: &Value) -> Result<String, ShapeError> {
        match value {
            Value::Bool(true) => Ok("t".into()),
            Value::Bool(false) => Ok("f".into()),
            other => Err(ShapeError::mismatch(self.name(), "bool", other)),
        }
    }
}

/// Integer types, `int2`, `int4`, `int8` and the `oid` family.
#[derive(Debug, Clone, Copy)]
pub struct IntConverter {
    name: &'static str,
    min: i64,
    max: i64,
}

impl IntConverter {
    pub const fn new(name: &'static str, min: i64, max: i64) -> Self {
        Self { name, min, max }
    }

    pub const fn int2() -> Self {
        Self::new("int2", i16::MIN as i64, i16::MAX as i64)
    }

    pub const fn int4() -> Self {
        Self::new("int4", i32::MIN as i64, i32::MAX as i64)
    }

    pub const fn int8() -> Self {
        Self::new("int8", i64::MIN, i64::MAX)
    }

    /// Unsigned four-byte identifier, `oid`, `xid`, `regtype`, etc.
    pub const fn oid(name: &'static str) -> Self {
        Self::new(name, 0, u32::MAX as i64)
    }
}

impl Converter for IntConverter {
    fn name(&self) -> &str {
        self.name
    }

    fn parse(&self, text: &str) -> Result<Value, ParseError> {
        let mut cursor = Cursor::new(text, self.name);
        cursor.skip_ws();
        let start = cursor.pos();
        if !cursor.eat('-') {
            cursor.eat('+');
        }
        let digits = cursor.take_while(|c| c.is_ascii_digit() || c == '_');
        if digits.is_empty() || digits.starts_with('_') {
            return Err(cursor.error("digit"));
        }
        let end = cursor.pos();
        cursor.expect_eof()?;

        let literal: String = text[start..end].chars().filter(|&c| c != '_').collect();
        match literal.parse::<i64>() {
            Ok(i) if (self.min..=self.max).contains(&i) => Ok(Value::Int(i)),
            _ => Err(cursor.error_at(start, format!("value in range {}..={}", self.min, self.max))),
        }
    }

    fn format(&self, value: &Value) -> Result<String, ShapeError> {
        match value {
            Value::Int(i) if (self.min..=self.max).contains(i) => {
                Ok(itoa::Buffer::new().format(*i).to_owned())
            }
            Value::Int(i) => Err(ShapeError::new(self.name, format!("{i} out of range"))),
            other => Err(ShapeError::mismatch(self.name, "integer", other)),
        }
    }
}

/// `float4` and `float8`.
#[derive(Debug, Clone, Copy)]
pub struct FloatConverter {
    name: &'static str,
}

impl FloatConverter {
    pub const fn float4() -> Self {
        Self { name: "float4" }
    }

    pub const fn float8() -> Self {
        Self { name: "float8" }
    }
}

impl Converter for FloatConverter {
    fn name(&self) -> &str {
        self.name
    }

    fn parse(&self, text: &str) -> Result<Value, ParseError> {
        let trimmed = text.trim();
        let unsigned = trimmed.strip_prefix(['+', '-']).unwrap_or(trimmed);
        let negative = trimmed.starts_with('-');
        let value = if unsigned.eq_ignore_ascii_case("infinity") || unsigned.eq_ignore_ascii_case("inf") {
            match negative {
                true => f64::NEG_INFINITY,
                false => f64::INFINITY,
            }
        } else if trimmed.eq_ignore_ascii_case("nan") {
            f64::NAN
        } else {
            match trimmed.parse::<f64>() {
                Ok(f) if f.is_finite() => f,
                _ => return Err(ParseError::new(self.name, "floating point literal", text, 0)),
            }
        };
        Ok(Value::Float(value))
    }

    fn format(&self, value: &Value) -> Result<String, ShapeError> {
        let f = match value {
            Value::Float(f) => *f,
            Value::Int(i) => *i as f64,
            other => return Err(ShapeError::mismatch(self.name, "float", other)),
        };
        Ok(match f {
            f if f.is_nan() => "NaN".into(),
            f if f == f64::INFINITY => "Infinity".into(),
            f if f == f64::NEG_INFINITY => "-Infinity".into(),
            f => f.to_string(),
        })
    }
}

/// `numeric`, also used for `money` text.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumericConverter;

impl Converter for NumericConverter {
    fn name(&self) -> &str {
        "numeric"
    }

    fn parse(&self, text: &str) -> Result<Value, ParseError> {
        Numeric::parse(text).map(Value::Numeric).map_err(|e| {
            let offset = text.trim_start().len().abs_diff(text.len()) + e.position;
            let offset = text[..offset.min(text.len())].chars().count();
            ParseError::new(self.name(), "numeric literal", text, offset)
        })
    }

    fn format(&self, value: &Value) -> Result<String, ShapeError> {
        match value {
            Value::Numeric(n) => Ok(n.as_str().to_owned()),
            Value::Int(i) => Ok(itoa::Buffer::new().format(*i).to_owned()),
            Value::Float(f) => FloatConverter::float8().format(&Value::Float(*f)),
            other => Err(ShapeError::mismatch(self.name(), "numeric", other)),
        }
    }
}

/// Character types, and every type whose text is taken as is.
#[derive(Debug, Clone)]
pub struct TextConverter {
    name: String,
}

impl TextConverter {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for TextConverter {
    fn default() -> Self {
        Self::new("text")
    }
}

impl Converter for TextConverter {
    fn name(&self) -> &str {
        &self.name
    }

    fn parse(&self, text: &str) -> Result<Value, ParseError> {
        Ok(Value::Text(text.to_owned()))
    }

    fn format(&self, value: &Value) -> Result<String, ShapeError> {
        match value {
            Value::Text(s) => Ok(s.clone()),
            Value::Numeric(n) => Ok(n.as_str().to_owned()),
            other => Err(ShapeError::mismatch(&self.name, "text", other)),
        }
    }
}

/// User defined enum.
///
/// With no labels, any label is accepted.
#[derive(Debug, Clone)]
pub struct EnumConverter {
    name: String,
    labels: Vec<String>,
}

impl EnumConverter {
    pub fn new<I, S>(name: impl Into<String>, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            labels: labels.into_iter().map(Into::into).collect(),
        }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    fn is_label(&self, label: &str) -> bool {
        self.labels.is_empty() || self.labels.iter().any(|l| l == label)
    }
}

impl Converter for EnumConverter {
    fn name(&self) -> &str {
        &self.name
    }

    fn parse(&self, text: &str) -> Result<Value, ParseError> {
        match self.is_label(text) {
            true => Ok(Value::Text(text.to_owned())),
            false => Err(ParseError::new(&self.name, format!("one of {:?}", self.labels), text, 0)),
        }
    }

    fn format(&self, value: &Value) -> Result<String, ShapeError> {
        match value {
            Value::Text(s) if self.is_label(s) => Ok(s.clone()),
            Value::Text(s) => Err(ShapeError::new(&self.name, format!("{s:?} is not a label"))),
            other => Err(ShapeError::mismatch(&self.name, "text", other)),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn bool_literals() {
        for t in ["t", "TRUE", "yes", "On", "1"] {
            assert_eq!(BoolConverter.parse(t).unwrap(), Value::Bool(true));
        }
        for f in ["f", "false", "NO", "off", "0"] {
            assert_eq!(BoolConverter.parse(f).unwrap(), Value::Bool(false));
        }
        assert!(BoolConverter.parse("maybe").is_err());
        assert_eq!(BoolConverter.format(&Value::Bool(false)).unwrap(), "f");
    }

    #[test]
    fn int_bounds() {
        let int2 = IntConverter::int2();
        assert_eq!(int2.parse(" -32768 ").unwrap(), Value::Int(-32768));
        let err = int2.parse("32768").unwrap_err();
        assert_eq!(err.offset(), 0);
        assert!(int2.format(&Value::Int(40000)).is_err());
        assert_eq!(IntConverter::int8().parse("1_000").unwrap(), Value::Int(1000));
        let err = IntConverter::int4().parse("12a").unwrap_err();
        assert_eq!(err.offset(), 2);
        assert!(IntConverter::oid("oid").parse("-1").is_err());
    }

    #[test]
    fn float_special_values() {
        let f = FloatConverter::float8();
        assert!(matches!(f.parse("NaN").unwrap(), Value::Float(v) if v.is_nan()));
        assert_eq!(f.parse("-Infinity").unwrap(), Value::Float(f64::NEG_INFINITY));
        assert_eq!(f.parse("1.5e3").unwrap(), Value::Float(1500.0));
        assert_eq!(f.format(&Value::Float(f64::INFINITY)).unwrap(), "Infinity");
        assert_eq!(f.format(&Value::Float(0.1)).unwrap(), "0.1");
        assert!(f.parse("1.5x").is_err());
    }

    #[test]
    fn numeric_keeps_text() {
        let n = NumericConverter.parse("12.3400").unwrap();
        assert_eq!(NumericConverter.format(&n).unwrap(), "12.3400");
        assert_eq!(NumericConverter.parse(" 1.x").unwrap_err().offset(), 3);
    }

    #[test]
    fn enum_labels() {
        let mood = EnumConverter::new("mood", ["sad", "ok"]);
        assert_eq!(mood.parse("ok").unwrap(), Value::from("ok"));
        assert!(mood.parse("happy").is_err());
        assert!(mood.format(&Value::from("happy")).is_err());
    }
}
