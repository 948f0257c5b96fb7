//! Postgres type of a runtime value.
use std::sync::Arc;

use crate::{
    Result,
    client::Client,
    error::AmbiguousType,
    types::{ArrayConverter, CompositeConverter, DynConverter},
    value::{Range, Value, ValueKind},
};

use super::{TypeRegistry, TypeSpec, bind};

pub(super) fn defaults() -> Vec<(ValueKind, TypeSpec)> {
    [
        (ValueKind::Null, "text"),
        (ValueKind::Bool, "bool"),
        (ValueKind::Int, "int8"),
        (ValueKind::Float, "float8"),
        (ValueKind::Numeric, "numeric"),
        (ValueKind::Text, "text"),
        (ValueKind::Bytes, "bytea"),
        (ValueKind::Date, "date"),
        (ValueKind::Time, "time"),
        (ValueKind::TimeTz, "timetz"),
        (ValueKind::Timestamp, "timestamp"),
        (ValueKind::TimestampTz, "timestamptz"),
        (ValueKind::Interval, "interval"),
        (ValueKind::Point, "point"),
        (ValueKind::Tid, "tid"),
        (ValueKind::Json, "jsonb"),
        (ValueKind::Hstore, "public.hstore"),
    ]
    .into_iter()
    .map(|(kind, name)| (kind, TypeSpec::from(name)))
    .collect()
}

/// `(bound kind, range, multirange)`
static RANGES: &[(ValueKind, &str, &str)] = &[
    (ValueKind::Int, "int8range", "int8multirange"),
    (ValueKind::Numeric, "numrange", "nummultirange"),
    (ValueKind::Float, "numrange", "nummultirange"),
    (ValueKind::Date, "daterange", "datemultirange"),
    (ValueKind::Timestamp, "tsrange", "tsmultirange"),
    (ValueKind::TimestampTz, "tstzrange", "tstzmultirange"),
];

impl TypeRegistry {
    /// Converter for a value whose postgres type is not known.
    ///
    /// Scalars use the type registered for their [`ValueKind`], see
    /// [`register_value_type`][TypeRegistry::register_value_type]. Arrays
    /// follow their first non NULL element, and are `text[]` without one.
    /// Ranges follow their bounds and records become anonymous composites.
    pub fn resolve_for_value(&mut self, value: &Value, mut client: Option<&mut (dyn Client + '_)>) -> Result<DynConverter> {
        let converter = self.infer(value, client.as_deref_mut())?;
        Ok(bind(converter, client))
    }

    /// Use `spec` for values of `kind`, replacing the previous mapping.
    pub fn register_value_type(&mut self, kind: ValueKind, spec: impl Into<TypeSpec>) {
        let spec = spec.into();
        match self.value_types.iter_mut().find(|(k, _)| *k == kind) {
            Some((_, old)) => *old = spec,
            None => self.value_types.push((kind, spec)),
        }
    }

    fn infer(&mut self, value: &Value, mut client: Option<&mut (dyn Client + '_)>) -> Result<DynConverter> {
        let kind = value.kind();
        if let Some((_, spec)) = self.value_types.iter().find(|(k, _)| *k == kind) {
            return self.resolve_spec(spec.clone(), client);
        }

        match value {
            Value::Array(items) => match first_leaf(items) {
                Some(item) => {
                    let item = self.infer(item, client)?;
                    Ok(Arc::new(ArrayConverter::new(item)))
                }
                None => self.resolve_spec("text[]".into(), client),
            },
            Value::Range(range) => {
                let name = range_type(range, kind, |&(_, range, _)| range)?;
                self.resolve_spec(name.into(), client)
            }
            Value::MultiRange(ranges) => {
                let range = ranges
                    .iter()
                    .find(|r| r.any_bound().is_some())
                    .ok_or(AmbiguousType::new(kind, "no range has a bound"))?;
                let name = range_type(range, kind, |&(_, _, multirange)| multirange)?;
                self.resolve_spec(name.into(), client)
            }
            Value::Record(record) => {
                let mut fields = Vec::with_capacity(record.len());
                for (name, value) in record.iter() {
                    fields.push((name.to_owned(), self.infer(value, client.as_deref_mut())?));
                }
                Ok(Arc::new(CompositeConverter::new("record", fields)))
            }
            _ => Err(AmbiguousType::new(kind, "no type is registered for it").into()),
        }
    }
}

/// First non NULL element, looking into nested arrays.
fn first_leaf(items: &[Value]) -> Option<&Value> {
    items.iter().find_map(|item| match item {
        Value::Null => None,
        Value::Array(nested) => first_leaf(nested),
        item => Some(item),
    })
}

fn range_type(
    range: &Range,
    kind: ValueKind,
    pick: impl Fn(&(ValueKind, &'static str, &'static str)) -> &'static str,
) -> Result<&'static str, AmbiguousType> {
    let bound = range.any_bound().ok_or(AmbiguousType::new(kind, "range has no bound"))?;
    RANGES
        .iter()
        .find(|(k, ..)| *k == bound.kind())
        .map(pick)
        .ok_or(AmbiguousType::new(kind, "no range type for its bounds"))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        ErrorKind,
        record::Record,
        types::Converter,
        value::{Hstore, MultiRange},
    };
    use time::macros::date;

    fn format(registry: &mut TypeRegistry, value: Value) -> String {
        let conv = registry.resolve_for_value(&value, None).unwrap();
        conv.format(&value).unwrap()
    }

    #[test]
    fn scalars() {
        let mut registry = TypeRegistry::new();
        assert_eq!(registry.resolve_for_value(&Value::Null, None).unwrap().name(), "text");
        assert_eq!(registry.resolve_for_value(&Value::Int(1), None).unwrap().name(), "int8");
        assert_eq!(format(&mut registry, Value::Bool(true)), "t");
        assert_eq!(format(&mut registry, Value::Date(date!(2024 - 01 - 15))), "2024-01-15");

        let mut hstore = Hstore::new();
        hstore.insert("a".into(), None);
        assert_eq!(format(&mut registry, Value::Hstore(hstore)), r#""a"=>NULL"#);
    }

    #[test]
    fn arrays() {
        let mut registry = TypeRegistry::new();
        let value = Value::Array(vec![Value::Null, Value::Array(vec![Value::Null, Value::Int(2)])]);
        let conv = registry.resolve_for_value(&value, None).unwrap();
        assert_eq!(conv.name(), "int8[]");

        let conv = registry.resolve_for_value(&Value::Array(vec![Value::Null]), None).unwrap();
        assert_eq!(conv.format(&Value::Array(vec![Value::Null])).unwrap(), "{NULL}");
        assert_eq!(conv.name(), "text[]");
    }

    #[test]
    fn ranges() {
        let mut registry = TypeRegistry::new();
        let range = Range::new(None, Some(Value::Int(5)), false, false).unwrap();
        let conv = registry.resolve_for_value(&Value::range(range), None).unwrap();
        assert_eq!(conv.name(), "int8range");

        let january = Range::closed_open(date!(2024 - 01 - 01), date!(2024 - 02 - 01)).unwrap();
        let ranges = MultiRange::from(vec![Range::empty(), january]);
        let conv = registry.resolve_for_value(&Value::MultiRange(ranges), None).unwrap();
        assert_eq!(conv.name(), "datemultirange");

        let since = Range::new(Some(Value::NegInfinity), Some(Value::Date(date!(2024 - 01 - 01))), false, false).unwrap();
        assert_eq!(registry.resolve_for_value(&Value::range(since), None).unwrap().name(), "daterange");

        let err = registry.resolve_for_value(&Value::range(Range::empty()), None).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::AmbiguousType(e) if e.value_kind() == ValueKind::Range));
    }

    #[test]
    fn records() {
        let mut registry = TypeRegistry::new();
        let record = Record::new().with("id", 1).with("tags", Value::Array(vec!["a".into()]));
        assert_eq!(format(&mut registry, Value::Record(record)), r#"("1","{""a""}")"#);
    }

    #[test]
    fn override_mapping() {
        let mut registry = TypeRegistry::new();
        registry.register_value_type(ValueKind::Int, "int4");
        registry.register_value_type(ValueKind::Json, "json");
        assert_eq!(registry.resolve_for_value(&Value::Int(1), None).unwrap().name(), "int4");
        assert_eq!(registry.resolve_for_value(&Value::Json(serde_json::json!(1)), None).unwrap().name(), "json");
    }
}
