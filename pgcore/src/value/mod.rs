//! Dynamic host value exchanged with converters.
//!
//! - [`Value`]
//! - [`ValueKind`]
//! - [`Range`], [`MultiRange`]
//! - [`Interval`], [`Numeric`], [`Point`], [`Tid`]
use bytes::Bytes;
use std::{cmp::Ordering, collections::BTreeMap, fmt};
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};

use crate::record::Record;

mod geo;
mod interval;
mod numeric;
mod range;

pub use geo::{Point, Tid};
pub use interval::Interval;
pub(crate) use interval::{MICROS_PER_HOUR, MICROS_PER_MINUTE, MICROS_PER_SECOND};
pub use numeric::{InvalidNumeric, Numeric};
pub use range::{MultiRange, Range, RangeError};

/// Key/value map of an `hstore`, values may be NULL.
pub type Hstore = BTreeMap<String, Option<String>>;

/// A value on the rust side of a conversion.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Numeric(Numeric),
    Text(String),
    Bytes(Bytes),
    Date(Date),
    Time(Time),
    TimeTz(Time, UtcOffset),
    Timestamp(PrimitiveDateTime),
    TimestampTz(OffsetDateTime),
    /// `infinity` of a date or timestamp, above every other one.
    Infinity,
    /// `-infinity` of a date or timestamp, below every other one.
    NegInfinity,
    /// `24:00:00` of a time, with the offset of a `timetz`.
    EndOfDay(Option<UtcOffset>),
    Interval(Interval),
    Point(Point),
    Tid(Tid),
    Json(serde_json::Value),
    /// Possibly nested array, nesting is one level per dimension.
    Array(Vec<Value>),
    Record(Record),
    Hstore(Hstore),
    Range(Box<Range>),
    MultiRange(MultiRange),
}

/// Tag of a [`Value`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValueKind {
    Null,
    Bool,
    Int,
    Float,
    Numeric,
    Text,
    Bytes,
    Date,
    Time,
    TimeTz,
    Timestamp,
    TimestampTz,
    Infinity,
    NegInfinity,
    EndOfDay,
    Interval,
    Point,
    Tid,
    Json,
    Array,
    Record,
    Hstore,
    Range,
    MultiRange,
}

impl Value {
    pub const fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub const fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
            Value::Numeric(_) => ValueKind::Numeric,
            Value::Text(_) => ValueKind::Text,
            Value::Bytes(_) => ValueKind::Bytes,
            Value::Date(_) => ValueKind::Date,
            Value::Time(_) => ValueKind::Time,
            Value::TimeTz(..) => ValueKind::TimeTz,
            Value::Timestamp(_) => ValueKind::Timestamp,
            Value::TimestampTz(_) => ValueKind::TimestampTz,
            Value::Infinity => ValueKind::Infinity,
            Value::NegInfinity => ValueKind::NegInfinity,
            Value::EndOfDay(_) => ValueKind::EndOfDay,
            Value::Interval(_) => ValueKind::Interval,
            Value::Point(_) => ValueKind::Point,
            Value::Tid(_) => ValueKind::Tid,
            Value::Json(_) => ValueKind::Json,
            Value::Array(_) => ValueKind::Array,
            Value::Record(_) => ValueKind::Record,
            Value::Hstore(_) => ValueKind::Hstore,
            Value::Range(_) => ValueKind::Range,
            Value::MultiRange(_) => ValueKind::MultiRange,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_range(&self) -> Option<&Range> {
        match self {
            Value::Range(r) => Some(r),
            _ => None,
        }
    }

    /// Build a range value.
    pub fn range(range: Range) -> Value {
        Value::Range(Box::new(range))
    }
}

impl PartialOrd for Value {
    /// Only values of the same family are ordered: numbers (integer, float and
    /// numeric mixed), text, temporal values of the same kind, intervals and
    /// booleans. Infinities order against dates and timestamps, `24:00:00`
    /// against times.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        use Value::*;

        match (self, other) {
            (Null, Null) => Some(Ordering::Equal),
            (Bool(a), Bool(b)) => a.partial_cmp(b),
            (Int(a), Int(b)) => a.partial_cmp(b),
            (Float(a), Float(b)) => a.partial_cmp(b),
            (Int(a), Float(b)) => (*a as f64).partial_cmp(b),
            (Float(a), Int(b)) => a.partial_cmp(&(*b as f64)),
            (Numeric(a), Numeric(b)) => Some(a.compare(b)),
            (Numeric(a), Int(b)) => Some(a.compare(&(*b).into())),
            (Int(a), Numeric(b)) => Some(numeric::Numeric::from(*a).compare(b)),
            (Numeric(a), Float(b)) => a.to_f64().partial_cmp(b),
            (Float(a), Numeric(b)) => a.partial_cmp(&b.to_f64()),
            (Text(a), Text(b)) => a.partial_cmp(b),
            (Bytes(a), Bytes(b)) => a.partial_cmp(b),
            (Date(a), Date(b)) => a.partial_cmp(b),
            (Time(a), Time(b)) => a.partial_cmp(b),
            (Timestamp(a), Timestamp(b)) => a.partial_cmp(b),
            (TimestampTz(a), TimestampTz(b)) => a.partial_cmp(b),
            (Infinity, Infinity) | (NegInfinity, NegInfinity) => Some(Ordering::Equal),
            (NegInfinity, Infinity) => Some(Ordering::Less),
            (Infinity, NegInfinity) => Some(Ordering::Greater),
            (NegInfinity, Date(_) | Timestamp(_) | TimestampTz(_)) => Some(Ordering::Less),
            (Infinity, Date(_) | Timestamp(_) | TimestampTz(_)) => Some(Ordering::Greater),
            (Date(_) | Timestamp(_) | TimestampTz(_), NegInfinity) => Some(Ordering::Greater),
            (Date(_) | Timestamp(_) | TimestampTz(_), Infinity) => Some(Ordering::Less),
            (EndOfDay(None), EndOfDay(None)) => Some(Ordering::Equal),
            (Time(_), EndOfDay(None)) => Some(Ordering::Less),
            (EndOfDay(None), Time(_)) => Some(Ordering::Greater),
            (Interval(a), Interval(b)) => Some(a.compare(b)),
            (Tid(a), Tid(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ValueKind::Null => "null",
            ValueKind::Bool => "bool",
            ValueKind::Int => "integer",
            ValueKind::Float => "float",
            ValueKind::Numeric => "numeric",
            ValueKind::Text => "text",
            ValueKind::Bytes => "bytes",
            ValueKind::Date => "date",
            ValueKind::Time => "time",
            ValueKind::TimeTz => "time with offset",
            ValueKind::Timestamp => "timestamp",
            ValueKind::TimestampTz => "timestamp with offset",
            ValueKind::Infinity => "infinity",
            ValueKind::NegInfinity => "-infinity",
            ValueKind::EndOfDay => "end of day",
            ValueKind::Interval => "interval",
            ValueKind::Point => "point",
            ValueKind::Tid => "tid",
            ValueKind::Json => "json",
            ValueKind::Array => "array",
            ValueKind::Record => "record",
            ValueKind::Hstore => "hstore",
            ValueKind::Range => "range",
            ValueKind::MultiRange => "multirange",
        })
    }
}

macro_rules! from {
    (<$ty:ty>$pat:pat => $body:expr) => {
        impl From<$ty> for Value {
            fn from($pat: $ty) -> Self {
                $body
            }
        }
    };
}

from!(<bool>v => Value::Bool(v));
from!(<i16>v => Value::Int(v.into()));
from!(<i32>v => Value::Int(v.into()));
from!(<i64>v => Value::Int(v));
from!(<u32>v => Value::Int(v.into()));
from!(<f32>v => Value::Float(v.into()));
from!(<f64>v => Value::Float(v));
from!(<Numeric>v => Value::Numeric(v));
from!(<&str>v => Value::Text(v.to_owned()));
from!(<String>v => Value::Text(v));
from!(<Bytes>v => Value::Bytes(v));
from!(<Date>v => Value::Date(v));
from!(<Time>v => Value::Time(v));
from!(<PrimitiveDateTime>v => Value::Timestamp(v));
from!(<OffsetDateTime>v => Value::TimestampTz(v));
from!(<Interval>v => Value::Interval(v));
from!(<Point>v => Value::Point(v));
from!(<Tid>v => Value::Tid(v));
from!(<serde_json::Value>v => Value::Json(v));
from!(<Record>v => Value::Record(v));
from!(<Hstore>v => Value::Hstore(v));
from!(<Range>v => Value::Range(Box::new(v)));
from!(<MultiRange>v => Value::MultiRange(v));

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        Value::Array(value.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn orders_within_family_only() {
        assert!(Value::Int(1) < Value::Float(1.5));
        assert!(Value::from("a") < Value::from("b"));
        assert_eq!(Value::Int(1).partial_cmp(&Value::from("1")), None);
        assert_eq!(Value::Bool(true).partial_cmp(&Value::Int(1)), None);
    }

    #[test]
    fn infinities_bound_dates() {
        let day = Value::Date(time::macros::date!(2024 - 01 - 01));
        assert!(Value::NegInfinity < day && day < Value::Infinity);
        assert!(Value::NegInfinity < Value::Infinity);
        assert_eq!(Value::Infinity.partial_cmp(&Value::Int(1)), None);
        assert!(Value::Time(Time::MIDNIGHT) < Value::EndOfDay(None));
    }

    #[test]
    fn nested_vec_is_array() {
        let v = Value::from(vec![vec![1, 2], vec![3, 4]]);
        let Value::Array(outer) = v else { panic!("not an array") };
        assert_eq!(outer.len(), 2);
        assert_eq!(outer[1], Value::Array(vec![Value::Int(3), Value::Int(4)]));
    }
}
