//! Text format converters.
//!
//! Every postgres type handled by this crate is represented by a [`Converter`],
//! which translates between postgres text format and [`Value`].
//!
//! Scalar converters:
//!
//! - [`BoolConverter`], [`IntConverter`], [`FloatConverter`], [`NumericConverter`]
//! - [`TextConverter`], [`ByteaConverter`], [`EnumConverter`], [`JsonConverter`]
//! - [`DateConverter`], [`TimeConverter`], [`TimeTzConverter`],
//!   [`TimestampConverter`], [`TimestampTzConverter`], [`IntervalConverter`]
//! - [`PointConverter`], [`TidConverter`]
//!
//! Container converters, which delegate to nested converters:
//!
//! - [`ArrayConverter`], [`CompositeConverter`], [`RangeConverter`],
//!   [`MultiRangeConverter`], [`HstoreConverter`]
use std::{fmt, sync::Arc};

use crate::{client::Session, common::Cursor, value::Value};

mod error;
mod scalar;
mod bytea;
mod json;
mod geo;
mod datetime;
mod interval;
mod array;
mod composite;
mod range;
mod hstore;

pub use error::{ParseError, ShapeError};
pub use scalar::{BoolConverter, EnumConverter, FloatConverter, IntConverter, NumericConverter, TextConverter};
pub use bytea::ByteaConverter;
pub use json::{Json, JsonConverter};
pub use geo::{PointConverter, TidConverter};
pub use datetime::{DateConverter, TimeConverter, TimeTzConverter, TimestampConverter, TimestampTzConverter};
pub use interval::IntervalConverter;
pub use array::{ArrayConverter, Bounds};
pub use composite::CompositeConverter;
pub use range::{MultiRangeConverter, RangeConverter};
pub use hstore::HstoreConverter;

/// Shared converter handle.
pub type DynConverter = Arc<dyn Converter>;

/// Translation between postgres text format and [`Value`].
///
/// Implementor only handle non NULL values, [`input`][1] and [`output`][2]
/// pass NULL through without calling [`parse`][3] or [`format`][4].
///
/// [1]: Converter::input
/// [2]: Converter::output
/// [3]: Converter::parse
/// [4]: Converter::format
pub trait Converter: Send + Sync + fmt::Debug {
    /// Name used in error messages, usually the postgres type name.
    fn name(&self) -> &str;

    /// Parse non NULL postgres text.
    fn parse(&self, text: &str) -> Result<Value, ParseError>;

    /// Serialize non NULL value.
    fn format(&self, value: &Value) -> Result<String, ShapeError>;

    /// Levels of array nesting a single value of this converter occupies.
    ///
    /// `0` for scalars. A converter whose value may itself be written as an
    /// array, like `point` as `[x, y]`, returns the levels it consumes, which
    /// [`ArrayConverter`] uses to tell elements apart from subarrays.
    fn dimensions(&self) -> usize {
        0
    }

    /// Return a copy adapted to session settings.
    ///
    /// [`None`] means the converter does not depend on the connection.
    fn bind(&self, session: &Session) -> Option<DynConverter> {
        let _ = session;
        None
    }

    /// Parse postgres text, NULL is returned as [`Value::Null`].
    fn input(&self, text: Option<&str>) -> Result<Value, ParseError> {
        match text {
            Some(text) => self.parse(text),
            None => Ok(Value::Null),
        }
    }

    /// Serialize value, [`Value::Null`] is returned as [`None`].
    fn output(&self, value: &Value) -> Result<Option<String>, ShapeError> {
        match value {
            Value::Null => Ok(None),
            value => self.format(value).map(Some),
        }
    }
}

/// Bind `converter` to session, or return it as is if it is not session dependent.
pub fn bind(converter: &DynConverter, session: &Session) -> DynConverter {
    converter.bind(session).unwrap_or_else(|| converter.clone())
}

/// Write `text` in double quotes.
///
/// With `doubled`, quotes are escaped by doubling them, otherwise by backslash.
/// Backslashes are always doubled.
pub(crate) fn write_quoted(out: &mut String, text: &str, doubled: bool) {
    out.push('"');
    for ch in text.chars() {
        match ch {
            '"' if doubled => out.push_str("\"\""),
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            ch => out.push(ch),
        }
    }
    out.push('"');
}

/// Read one delimited slot of a composite or range literal.
///
/// Double quotes may enclose any part of the slot, inside them `""` is a
/// literal quote. A backslash escapes the next character anywhere. Returns
/// [`None`] for an empty slot, which is NULL or an unbounded side.
pub(crate) fn read_slot(cursor: &mut Cursor<'_>, ends: &[char]) -> Result<Option<String>, ParseError> {
    let mut text = String::new();
    let mut present = false;
    let mut quoted = false;
    loop {
        match cursor.peek() {
            Some(ch) if !quoted && ends.contains(&ch) => break,
            Some('"') => {
                cursor.bump();
                present = true;
                if quoted && cursor.peek() == Some('"') {
                    cursor.bump();
                    text.push('"');
                } else {
                    quoted = !quoted;
                }
            }
            Some('\\') => {
                cursor.bump();
                match cursor.bump() {
                    Some(ch) => text.push(ch),
                    None => return Err(cursor.error("escaped character")),
                }
                present = true;
            }
            Some(ch) => {
                cursor.bump();
                text.push(ch);
                present = true;
            }
            None if quoted => return Err(cursor.error("closing `\"`")),
            None => return Err(cursor.error("delimiter")),
        }
    }
    Ok(present.then_some(text))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn null_passthrough() {
        let conv = IntConverter::int4();
        assert_eq!(conv.input(None).unwrap(), Value::Null);
        assert_eq!(conv.output(&Value::Null).unwrap(), None);
        assert_eq!(conv.output(&Value::Int(3)).unwrap().as_deref(), Some("3"));
    }

    #[test]
    fn quoting() {
        let mut out = String::new();
        write_quoted(&mut out, r#"a"b\c"#, false);
        assert_eq!(out, r#""a\"b\\c""#);
        out.clear();
        write_quoted(&mut out, r#"a"b\c"#, true);
        assert_eq!(out, r#""a""b\\c""#);
    }

    /// Float NaN is the only value not equal to itself.
    fn same(a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Float(a), Value::Float(b)) if a.is_nan() => b.is_nan(),
            (a, b) => a == b,
        }
    }

    #[test]
    fn parse_inverts_format() {
        use crate::value::{Hstore, Interval, Numeric, Point, Tid};
        use bytes::Bytes;
        use time::macros::{date, datetime, offset, time};

        let numeric = |s: &str| Value::Numeric(Numeric::parse(s).unwrap());
        let hstore = |pairs: &[(&str, Option<&str>)]| {
            Value::Hstore(pairs.iter().map(|(k, v)| (k.to_string(), v.map(str::to_owned))).collect::<Hstore>())
        };
        let bc = time::Date::from_calendar_date(-43, time::Month::March, 15).unwrap();

        let cases: Vec<(DynConverter, Vec<Value>)> = vec![
            (Arc::new(BoolConverter), vec![Value::Bool(true), Value::Bool(false)]),
            (Arc::new(IntConverter::int2()), vec![Value::Int(i16::MIN.into()), Value::Int(i16::MAX.into())]),
            (Arc::new(IntConverter::int4()), vec![Value::Int(i32::MIN.into()), Value::Int(0)]),
            (Arc::new(IntConverter::int8()), vec![Value::Int(i64::MIN), Value::Int(i64::MAX)]),
            (Arc::new(IntConverter::oid("oid")), vec![Value::Int(u32::MAX.into())]),
            (Arc::new(FloatConverter::float4()), vec![Value::Float(1.5), Value::Float(-0.25)]),
            (
                Arc::new(FloatConverter::float8()),
                vec![
                    Value::Float(0.1),
                    Value::Float(-1e300),
                    Value::Float(f64::MIN_POSITIVE),
                    Value::Float(f64::NAN),
                    Value::Float(f64::INFINITY),
                    Value::Float(f64::NEG_INFINITY),
                ],
            ),
            (
                Arc::new(NumericConverter),
                vec![numeric("-12.3400"), numeric("1.5e-20"), numeric("NaN"), numeric("-Infinity")],
            ),
            (
                Arc::new(TextConverter::default()),
                vec!["".into(), "héllo wörld ✓".into(), "  a\"b\\c  ".into(), "NULL".into()],
            ),
            (Arc::new(EnumConverter::new("mood", ["sad", "ok"])), vec!["ok".into()]),
            (
                Arc::new(ByteaConverter::new()),
                vec![Value::Bytes(Bytes::new()), Value::Bytes(Bytes::from_static(&[0, 255, b'\\', b'\n']))],
            ),
            (
                Arc::new(ByteaConverter::escape()),
                vec![Value::Bytes(Bytes::new()), Value::Bytes(Bytes::from_static(&[0, 255, b'\\', b'\'']))],
            ),
            (
                Arc::new(JsonConverter::json()),
                vec![Value::Json(serde_json::json!({"a": [1, null, "ü"], "b": {"c": true}}))],
            ),
            (Arc::new(JsonConverter::jsonb()), vec![Value::Json(serde_json::json!("text"))]),
            (
                Arc::new(DateConverter::default()),
                vec![Value::Date(date!(2024 - 02 - 29)), Value::Date(bc), Value::Infinity, Value::NegInfinity],
            ),
            (
                Arc::new(TimeConverter::default()),
                vec![Value::Time(time!(0:00)), Value::Time(time!(23:59:59.999999)), Value::EndOfDay(None)],
            ),
            (
                Arc::new(TimeTzConverter::default()),
                vec![Value::TimeTz(time!(12:30), offset!(-3:30)), Value::EndOfDay(Some(offset!(+14)))],
            ),
            (
                Arc::new(TimestampConverter::default()),
                vec![Value::Timestamp(datetime!(1999-12-31 23:59:59.5)), Value::Infinity],
            ),
            (
                Arc::new(TimestampTzConverter::default()),
                vec![Value::TimestampTz(datetime!(2024-06-01 12:00 +2)), Value::NegInfinity],
            ),
            (
                Arc::new(IntervalConverter),
                vec![
                    Value::Interval(Interval::new(14, 3, 4_005_006)),
                    Value::Interval(Interval::new(-1, -2, -500)),
                    Value::Interval(Interval::new(0, 0, 0)),
                ],
            ),
            (
                Arc::new(PointConverter),
                vec![Value::Point(Point::new(1.5, -2.0)), Value::Point(Point::new(0.0, 1e-9))],
            ),
            (
                Arc::new(TidConverter),
                vec![Value::Tid(Tid::new(0, 1)), Value::Tid(Tid::new(u32::MAX, u16::MAX))],
            ),
            (
                Arc::new(HstoreConverter),
                vec![hstore(&[]), hstore(&[("a\"b", Some("c\\d")), ("ключ", None), ("", Some(""))])],
            ),
        ];

        for (conv, values) in cases {
            for value in values {
                let text = conv.format(&value).unwrap();
                let back = conv.parse(&text).unwrap_or_else(|e| panic!("{}: {text:?}: {e}", conv.name()));
                assert!(same(&back, &value), "{}: {value:?} became {back:?} through {text:?}", conv.name());
            }
        }
    }
}
