//! Composite value operation.
//!
//! - [`Record`]
//! - [`FromRecord`]
//! - [`IntoRecord`]
//! - [`FromValue`]
//! - [`DecodeError`]
use bytes::Bytes;
use std::{borrow::Cow, fmt};
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time};

use crate::value::{Hstore, Interval, MultiRange, Numeric, Point, Range, Tid, Value, ValueKind};

/// Ordered list of named fields, the rust side of a composite value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    pub const fn new() -> Self {
        Self { fields: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { fields: Vec::with_capacity(capacity) }
    }

    /// Returns `true` if record contains no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns the number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Set field value, replacing the existing one in place.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, v)) => *v = value,
            None => self.fields.push((name, value)),
        }
    }

    /// Builder version of [`insert`][Record::insert].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn get_index(&self, index: usize) -> Option<&Value> {
        self.fields.get(index).map(|(_, v)| v)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let idx = self.fields.iter().position(|(n, _)| n == name)?;
        Some(self.fields.remove(idx).1)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Try get and decode field.
    pub fn try_get<R: FromValue>(&self, name: &str) -> Result<R, DecodeError> {
        match self.get(name) {
            Some(value) => R::from_value(value.clone()),
            None => Err(DecodeError::FieldNotFound(String::from(name).into())),
        }
    }

    /// Try decode type using [`FromRecord`] implementation.
    pub fn decode<D: FromRecord>(self) -> Result<D, DecodeError> {
        D::from_record(self)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut record = Record::new();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);

    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

// ===== Traits =====

/// Type that can be constructed from a record.
pub trait FromRecord: Sized {
    /// Construct self from record.
    fn from_record(record: Record) -> Result<Self, DecodeError>;
}

/// Type that can be turned into a record, for composite serialization.
pub trait IntoRecord {
    fn into_record(self) -> Record;
}

impl FromRecord for Record {
    fn from_record(record: Record) -> Result<Self, DecodeError> {
        Ok(record)
    }
}

impl IntoRecord for Record {
    fn into_record(self) -> Record {
        self
    }
}

macro_rules! from_record_tuple {
    ($($t:ident $i:literal),*) => {
        impl<$($t),*> FromRecord for ($($t),*,)
        where
            $($t: FromValue),*
        {
            fn from_record(record: Record) -> Result<Self, DecodeError> {
                let mut iter = record.into_iter();
                Ok((
                    $(match iter.next() {
                        Some((_, value)) => $t::from_value(value)?,
                        None => return Err(DecodeError::IndexOutOfBounds($i)),
                    }),*,
                ))
            }
        }
    };
}

from_record_tuple!(T0 0);
from_record_tuple!(T0 0, T1 1);
from_record_tuple!(T0 0, T1 1, T2 2);
from_record_tuple!(T0 0, T1 1, T2 2, T3 3);

/// A type that can be extracted from a [`Value`].
pub trait FromValue: Sized {
    /// Try extract self from value.
    fn from_value(value: Value) -> Result<Self, DecodeError>;
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self, DecodeError> {
        Ok(value)
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self, DecodeError> {
        match value.is_null() {
            true => Ok(None),
            false => T::from_value(value).map(Some),
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: Value) -> Result<Self, DecodeError> {
        match value {
            Value::Array(items) => items.into_iter().map(T::from_value).collect(),
            Value::Null => Err(DecodeError::Null),
            other => Err(DecodeError::mismatch("array", &other)),
        }
    }
}

macro_rules! from_value {
    ($ty:ty, $expected:literal, $($pat:pat => $body:expr),* $(,)?) => {
        impl FromValue for $ty {
            fn from_value(value: Value) -> Result<Self, DecodeError> {
                match value {
                    $($pat => $body,)*
                    Value::Null => Err(DecodeError::Null),
                    other => Err(DecodeError::mismatch($expected, &other)),
                }
            }
        }
    };
}

macro_rules! from_value_int {
    ($($ty:ty),*) => {$(
        from_value!($ty, "integer", Value::Int(i) => <$ty>::try_from(i).map_err(|_| DecodeError::OutOfRange(stringify!($ty))));
    )*};
}

from_value_int!(i16, i32, u16, u32, u64);

from_value!(bool, "bool", Value::Bool(b) => Ok(b));
from_value!(i64, "integer", Value::Int(i) => Ok(i));
from_value!(f64, "float", Value::Float(f) => Ok(f), Value::Int(i) => Ok(i as f64));
from_value!(f32, "float", Value::Float(f) => Ok(f as f32));
from_value!(String, "text", Value::Text(s) => Ok(s));
from_value!(Numeric, "numeric", Value::Numeric(n) => Ok(n), Value::Int(i) => Ok(i.into()));
from_value!(Bytes, "bytes", Value::Bytes(b) => Ok(b));
from_value!(Date, "date", Value::Date(d) => Ok(d));
from_value!(Time, "time", Value::Time(t) => Ok(t));
from_value!(PrimitiveDateTime, "timestamp", Value::Timestamp(t) => Ok(t));
from_value!(OffsetDateTime, "timestamptz", Value::TimestampTz(t) => Ok(t));
from_value!(Interval, "interval", Value::Interval(i) => Ok(i));
from_value!(Point, "point", Value::Point(p) => Ok(p));
from_value!(Tid, "tid", Value::Tid(t) => Ok(t));
from_value!(serde_json::Value, "json", Value::Json(j) => Ok(j));
from_value!(Hstore, "hstore", Value::Hstore(h) => Ok(h));
from_value!(Range, "range", Value::Range(r) => Ok(*r));
from_value!(MultiRange, "multirange", Value::MultiRange(m) => Ok(m));

from_value!(Record, "record", Value::Record(r) => Ok(r));

/// Decode a record field into a [`FromRecord`] type.
///
/// Used by `#[derive(FromRecord)]` to also implement [`FromValue`].
pub fn record_from_value<T: FromRecord>(value: Value) -> Result<T, DecodeError> {
    match value {
        Value::Record(r) => T::from_record(r),
        Value::Null => Err(DecodeError::Null),
        other => Err(DecodeError::mismatch("record", &other)),
    }
}

/// An error when extracting rust value from [`Value`].
pub enum DecodeError {
    /// Field requested not found.
    FieldNotFound(Cow<'static, str>),
    /// Index requested is out of bounds.
    IndexOutOfBounds(usize),
    /// Value kind missmatch.
    Mismatch {
        expected: &'static str,
        found: ValueKind,
    },
    /// Integer does not fit.
    OutOfRange(&'static str),
    /// Value is null.
    Null,
    /// Failed to deserialize using `serde_json`.
    Json(serde_json::Error),
}

impl DecodeError {
    fn mismatch(expected: &'static str, found: &Value) -> Self {
        Self::Mismatch { expected, found: found.kind() }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("failed to decode value, ")?;
        match self {
            Self::FieldNotFound(name) => write!(f, "field not found: {name:?}"),
            Self::IndexOutOfBounds(u) => write!(f, "index out of bounds: {u:?}"),
            Self::Mismatch { expected, found } => write!(f, "expected {expected}, found {found}"),
            Self::OutOfRange(ty) => write!(f, "integer out of range for {ty}"),
            Self::Null => write!(f, "unexpected NULL value"),
            Self::Json(e) => write!(f, "{e}"),
        }
    }
}

impl From<serde_json::Error> for DecodeError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

impl std::error::Error for DecodeError { }

impl fmt::Debug for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}
