//! Converter registry.
//!
//! [`TypeRegistry`] turns a type name, an oid, or a runtime [`Value`] into a
//! [`DynConverter`]. Registered converters win, anything else is composed
//! from [`TypeCatalog`] metadata: enums, arrays, ranges, multiranges,
//! domains and composites.
//!
//! [`Value`]: crate::value::Value
use lru::LruCache;
use std::{collections::HashMap, fmt, sync::Arc};

use crate::{
    Result,
    catalog::{CompositeLayout, TypeCatalog, TypeClass},
    client::Client,
    common::verbose,
    connection::Config,
    error::UnknownType,
    postgres::Oid,
    types::{
        self, ArrayConverter, BoolConverter, ByteaConverter, CompositeConverter, DateConverter, DynConverter,
        EnumConverter, FloatConverter, HstoreConverter, IntConverter, IntervalConverter, JsonConverter,
        MultiRangeConverter, NumericConverter, PointConverter, RangeConverter, TextConverter, TidConverter,
        TimeConverter, TimeTzConverter, TimestampConverter, TimestampTzConverter,
    },
    value::ValueKind,
};

mod infer;
mod name;

pub use name::TypeName;

/// What to resolve a converter from.
#[derive(Clone)]
pub enum TypeSpec {
    /// Used as is.
    Converter(DynConverter),
    /// Type name, parsed with [`TypeName::parse`].
    Name(String),
    Oid(Oid),
    /// Anonymous record with named fields.
    Composite(Vec<(String, TypeSpec)>),
}

impl TypeSpec {
    pub fn composite<I, S, T>(fields: I) -> Self
    where
        I: IntoIterator<Item = (S, T)>,
        S: Into<String>,
        T: Into<TypeSpec>,
    {
        Self::Composite(fields.into_iter().map(|(n, t)| (n.into(), t.into())).collect())
    }
}

impl From<&str> for TypeSpec {
    fn from(value: &str) -> Self {
        Self::Name(value.to_owned())
    }
}

impl From<String> for TypeSpec {
    fn from(value: String) -> Self {
        Self::Name(value)
    }
}

impl From<Oid> for TypeSpec {
    fn from(value: Oid) -> Self {
        Self::Oid(value)
    }
}

impl From<DynConverter> for TypeSpec {
    fn from(value: DynConverter) -> Self {
        Self::Converter(value)
    }
}

impl fmt::Debug for TypeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Converter(c) => write!(f, "Converter({})", c.name()),
            Self::Name(name) => write!(f, "Name({name:?})"),
            Self::Oid(oid) => write!(f, "Oid({oid})"),
            Self::Composite(fields) => f.debug_map().entries(fields.iter().map(|(n, t)| (n, t))).finish(),
        }
    }
}

/// Converter provided by this crate, constructed on first use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Bool,
    Int2,
    Int4,
    Int8,
    /// Unsigned 32 bit identifiers, `oid`, `xid`, `regclass` and the like.
    Oid(&'static str),
    Float4,
    Float8,
    Numeric,
    /// Text taken as is.
    Text(&'static str),
    Bytea,
    Json,
    Jsonb,
    Date,
    Time,
    TimeTz,
    Timestamp,
    TimestampTz,
    Interval,
    Point,
    Tid,
    Hstore,
}

impl Builtin {
    pub fn build(self) -> DynConverter {
        match self {
            Self::Bool => Arc::new(BoolConverter),
            Self::Int2 => Arc::new(IntConverter::int2()),
            Self::Int4 => Arc::new(IntConverter::int4()),
            Self::Int8 => Arc::new(IntConverter::int8()),
            Self::Oid(name) => Arc::new(IntConverter::oid(name)),
            Self::Float4 => Arc::new(FloatConverter::float4()),
            Self::Float8 => Arc::new(FloatConverter::float8()),
            Self::Numeric => Arc::new(NumericConverter),
            Self::Text(name) => Arc::new(TextConverter::new(name)),
            Self::Bytea => Arc::new(ByteaConverter::new()),
            Self::Json => Arc::new(JsonConverter::json()),
            Self::Jsonb => Arc::new(JsonConverter::jsonb()),
            Self::Date => Arc::new(DateConverter::default()),
            Self::Time => Arc::new(TimeConverter::default()),
            Self::TimeTz => Arc::new(TimeTzConverter::default()),
            Self::Timestamp => Arc::new(TimestampConverter::default()),
            Self::TimestampTz => Arc::new(TimestampTzConverter::default()),
            Self::Interval => Arc::new(IntervalConverter),
            Self::Point => Arc::new(PointConverter),
            Self::Tid => Arc::new(TidConverter),
            Self::Hstore => Arc::new(HstoreConverter),
        }
    }
}

/// `(schema, name, converter)` registered by [`TypeRegistry::new`].
static BUILTINS: &[(&str, &str, Builtin)] = &[
    ("pg_catalog", "bool", Builtin::Bool),
    ("pg_catalog", "int2", Builtin::Int2),
    ("pg_catalog", "int4", Builtin::Int4),
    ("pg_catalog", "int8", Builtin::Int8),
    ("pg_catalog", "oid", Builtin::Oid("oid")),
    ("pg_catalog", "xid", Builtin::Oid("xid")),
    ("pg_catalog", "cid", Builtin::Oid("cid")),
    ("pg_catalog", "regproc", Builtin::Oid("regproc")),
    ("pg_catalog", "regclass", Builtin::Oid("regclass")),
    ("pg_catalog", "regtype", Builtin::Oid("regtype")),
    ("pg_catalog", "float4", Builtin::Float4),
    ("pg_catalog", "float8", Builtin::Float8),
    ("pg_catalog", "numeric", Builtin::Numeric),
    ("pg_catalog", "text", Builtin::Text("text")),
    ("pg_catalog", "varchar", Builtin::Text("varchar")),
    ("pg_catalog", "bpchar", Builtin::Text("bpchar")),
    ("pg_catalog", "char", Builtin::Text("char")),
    ("pg_catalog", "name", Builtin::Text("name")),
    ("pg_catalog", "uuid", Builtin::Text("uuid")),
    ("pg_catalog", "xml", Builtin::Text("xml")),
    ("pg_catalog", "inet", Builtin::Text("inet")),
    ("pg_catalog", "cidr", Builtin::Text("cidr")),
    ("pg_catalog", "macaddr", Builtin::Text("macaddr")),
    ("pg_catalog", "bit", Builtin::Text("bit")),
    ("pg_catalog", "varbit", Builtin::Text("varbit")),
    ("pg_catalog", "money", Builtin::Text("money")),
    ("pg_catalog", "unknown", Builtin::Text("unknown")),
    ("pg_catalog", "bytea", Builtin::Bytea),
    ("pg_catalog", "json", Builtin::Json),
    ("pg_catalog", "jsonb", Builtin::Jsonb),
    ("pg_catalog", "date", Builtin::Date),
    ("pg_catalog", "time", Builtin::Time),
    ("pg_catalog", "timetz", Builtin::TimeTz),
    ("pg_catalog", "timestamp", Builtin::Timestamp),
    ("pg_catalog", "timestamptz", Builtin::TimestampTz),
    ("pg_catalog", "interval", Builtin::Interval),
    ("pg_catalog", "point", Builtin::Point),
    ("pg_catalog", "tid", Builtin::Tid),
    ("public", "hstore", Builtin::Hstore),
    ("public", "citext", Builtin::Text("citext")),
];

/// How a registered converter is obtained.
#[derive(Clone)]
pub enum Registration {
    Instance(DynConverter),
    /// Called once, on first use.
    Factory(Arc<dyn Fn() -> DynConverter + Send + Sync>),
    Builtin(Builtin),
}

impl Registration {
    pub fn factory(f: impl Fn() -> DynConverter + Send + Sync + 'static) -> Self {
        Self::Factory(Arc::new(f))
    }

    fn build(&self) -> DynConverter {
        match self {
            Self::Instance(converter) => converter.clone(),
            Self::Factory(f) => f(),
            Self::Builtin(builtin) => builtin.build(),
        }
    }
}

impl From<DynConverter> for Registration {
    fn from(value: DynConverter) -> Self {
        Self::Instance(value)
    }
}

impl From<Builtin> for Registration {
    fn from(value: Builtin) -> Self {
        Self::Builtin(value)
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Instance(c) => write!(f, "Instance({})", c.name()),
            Self::Factory(_) => f.write_str("Factory"),
            Self::Builtin(b) => write!(f, "Builtin({b:?})"),
        }
    }
}

struct Entry {
    registration: Registration,
    instance: Option<DynConverter>,
}

/// Maps types to converters.
pub struct TypeRegistry {
    catalog: TypeCatalog,
    /// `name -> schema -> entry`
    entries: HashMap<String, HashMap<String, Entry>>,
    by_oid: LruCache<Oid, DynConverter>,
    value_types: Vec<(ValueKind, TypeSpec)>,
    search_path: Vec<String>,
    composite_cache: bool,
}

impl TypeRegistry {
    /// Registry with builtin converters and an offline catalog.
    pub fn new() -> Self {
        Self::with_config(&Config::default())
    }

    pub fn with_config(config: &Config) -> Self {
        let catalog = TypeCatalog::new()
            .with_composite_cache(config.composite_cache)
            .with_preload_composites(config.preload_composites);
        let mut me = Self {
            catalog,
            entries: HashMap::new(),
            by_oid: LruCache::new(config.converter_cache),
            value_types: infer::defaults(),
            search_path: config.search_path.clone(),
            composite_cache: config.composite_cache,
        };
        for (schema, name, builtin) in BUILTINS {
            me.insert(schema, name, Registration::Builtin(*builtin));
        }
        me
    }

    pub fn catalog(&self) -> &TypeCatalog {
        &self.catalog
    }

    pub fn catalog_mut(&mut self) -> &mut TypeCatalog {
        &mut self.catalog
    }

    pub fn search_path(&self) -> &[String] {
        &self.search_path
    }

    /// Register a converter for type `name`.
    ///
    /// Unqualified name is registered in the `public` schema. Replacing an
    /// existing registration drops converters composed from it.
    pub fn register(&mut self, name: &str, registration: impl Into<Registration>) -> Result<()> {
        let name = TypeName::parse(name)?;
        if name.dims > 0 {
            return Err(UnknownType::array_registration(&name).into());
        }
        let schema = name.schema.as_deref().unwrap_or("public");
        self.insert(schema, &name.name, registration.into());
        self.by_oid.clear();
        Ok(())
    }

    fn insert(&mut self, schema: &str, name: &str, registration: Registration) {
        self.entries
            .entry(name.to_owned())
            .or_default()
            .insert(schema.to_owned(), Entry { registration, instance: None });
    }

    /// Resolve a converter, bound to the client session if one is given.
    pub fn resolve(&mut self, spec: impl Into<TypeSpec>, mut client: Option<&mut (dyn Client + '_)>) -> Result<DynConverter> {
        let converter = self.resolve_spec(spec.into(), client.as_deref_mut())?;
        Ok(bind(converter, client))
    }

    /// Converter of the type with `oid`, bound to the client session if one is given.
    pub fn resolve_oid(&mut self, oid: Oid, mut client: Option<&mut (dyn Client + '_)>) -> Result<DynConverter> {
        let converter = self.by_oid(oid, client.as_deref_mut())?;
        Ok(bind(converter, client))
    }

    /// Drop everything derived from the database.
    ///
    /// Called when the underlying physical connection changed.
    pub fn connection_changed(&mut self, client: &mut dyn Client) -> Result<()> {
        self.by_oid.clear();
        self.catalog.connection_changed(client)
    }

    fn resolve_spec(&mut self, spec: TypeSpec, mut client: Option<&mut (dyn Client + '_)>) -> Result<DynConverter> {
        match spec {
            TypeSpec::Converter(converter) => Ok(converter),
            TypeSpec::Name(name) => self.resolve_name(&name, client),
            TypeSpec::Oid(oid) => self.by_oid(oid, client),
            TypeSpec::Composite(fields) => {
                let mut resolved = Vec::with_capacity(fields.len());
                for (name, spec) in fields {
                    resolved.push((name, self.resolve_spec(spec, client.as_deref_mut())?));
                }
                Ok(Arc::new(CompositeConverter::new("record", resolved)))
            }
        }
    }

    fn resolve_name(&mut self, text: &str, mut client: Option<&mut (dyn Client + '_)>) -> Result<DynConverter> {
        let name = TypeName::parse(text)?;
        let schema = name.schema.as_deref();

        let mut converter = match self.registered(schema, &name.name) {
            Some(converter) => converter,
            None => {
                let oid = self.catalog.find(schema, &name.name, &self.search_path, client.as_deref_mut())?;
                self.by_oid(oid, client)?
            }
        };
        for _ in 0..name.dims {
            converter = Arc::new(ArrayConverter::new(converter));
        }
        Ok(converter)
    }

    /// Registered converter, instantiated on first use.
    fn registered(&mut self, schema: Option<&str>, name: &str) -> Option<DynConverter> {
        let schemas = self.entries.get_mut(name)?;
        let schema = match schema {
            Some(schema) => schema,
            None => self.search_path.iter().map(String::as_str).find(|s| schemas.contains_key(*s))?,
        };
        let entry = schemas.get_mut(schema)?;
        Some(entry.instance.get_or_insert_with(|| entry.registration.build()).clone())
    }

    fn by_oid(&mut self, oid: Oid, client: Option<&mut (dyn Client + '_)>) -> Result<DynConverter> {
        if let Some(converter) = self.by_oid.get(&oid) {
            return Ok(converter.clone());
        }
        let (converter, stable) = self.compose(oid, client)?;
        if stable {
            self.by_oid.put(oid, converter.clone());
        }
        Ok(converter)
    }

    /// Build the converter of `oid` from catalog metadata.
    ///
    /// The flag is `false` when the result depends on a table layout that is
    /// not cached, it must not be memoized then.
    fn compose(&mut self, oid: Oid, mut client: Option<&mut (dyn Client + '_)>) -> Result<(DynConverter, bool)> {
        if let Some(converter) = self.by_oid.get(&oid) {
            return Ok((converter.clone(), true));
        }
        let entry = self.catalog.entry(oid, client.as_deref_mut())?;
        if let Some(converter) = self.registered(Some(&entry.schema), &entry.name) {
            return Ok((converter, true));
        }
        verbose!(oid, name = %entry.name, "composing converter");

        let composed: (DynConverter, bool) = match entry.class {
            TypeClass::Base => return Err(UnknownType::unsupported(entry.qualified_name()).into()),
            TypeClass::Enum(labels) => (Arc::new(EnumConverter::new(entry.name, labels)), true),
            TypeClass::Array(item) => {
                let (item, stable) = self.compose(item, client)?;
                (Arc::new(ArrayConverter::new(item)), stable)
            }
            TypeClass::Domain(base) => self.compose(base, client)?,
            TypeClass::Range { subtype, .. } => {
                let (subtype, stable) = self.compose(subtype, client)?;
                (Arc::new(RangeConverter::new(entry.name, subtype)), stable)
            }
            TypeClass::MultiRange { range } => {
                let range_entry = self.catalog.entry(range, client.as_deref_mut())?;
                let TypeClass::Range { subtype, .. } = range_entry.class else {
                    return Err(UnknownType::oid(range).into());
                };
                let (subtype, stable) = self.compose(subtype, client)?;
                let range = RangeConverter::new(range_entry.name, subtype);
                (Arc::new(MultiRangeConverter::new(entry.name, range)), stable)
            }
            TypeClass::Composite(layout) => {
                let mut stable = self.composite_cache || matches!(layout, CompositeLayout::Fields(_));
                let fields = self.catalog.composite_fields(oid, client.as_deref_mut())?;
                let mut resolved = Vec::with_capacity(fields.len());
                for field in fields {
                    let (converter, field_stable) = self.compose(field.type_oid, client.as_deref_mut())?;
                    stable &= field_stable;
                    resolved.push((field.name, converter));
                }
                (Arc::new(CompositeConverter::new(entry.name, resolved)), stable)
            }
        };
        Ok(composed)
    }
}

fn bind(converter: DynConverter, client: Option<&mut (dyn Client + '_)>) -> DynConverter {
    match client {
        Some(client) => types::bind(&converter, &client.session()),
        None => converter,
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("catalog", &self.catalog)
            .field("registered", &self.entries.values().map(HashMap::len).sum::<usize>())
            .field("memoized", &self.by_oid.len())
            .field("search_path", &self.search_path)
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        ErrorKind,
        catalog::{COMPOSITE_QUERY, COMPOSITES_QUERY, ENUMS_QUERY, RANGES_QUERY, TYPES_QUERY},
        client::{DateStyle, Session},
        postgres::oid,
        record::Record,
        testing::{MockClient, table},
        types::Converter,
        value::{Range, Value},
    };

    fn database() -> MockClient {
        let mut mock = MockClient::new();
        mock.respond(TYPES_QUERY, table("\
            16385|public|mood|e|E|0|0|0|\\N\n\
            16386|public|_mood|b|A|16385|0|0|\\N\n\
            16390|public|pair|c|C|0|0|16388|c\n\
            16400|public|account|c|C|0|0|16398|r\n\
            16410|public|posint|d|N|0|23|0|\\N\n\
            16420|public|floatrange|r|R|0|0|0|\\N\n\
            16421|public|floatmultirange|m|R|0|0|0|\\N\n\
            16430|public|ltree|b|U|0|0|0|\\N"));
        mock.respond(RANGES_QUERY, table("16420|701|16421"));
        mock.respond(ENUMS_QUERY, table("16385|sad\n16385|happy"));
        mock.respond(COMPOSITES_QUERY, table("16388|a|23\n16388|b|16385"));
        mock.respond(COMPOSITE_QUERY, table("id|20\nname|25"));
        mock
    }

    #[test]
    fn builtin_names_offline() {
        let mut registry = TypeRegistry::new();
        let conv = registry.resolve("integer", None).unwrap();
        assert_eq!(conv.parse("42").unwrap(), Value::Int(42));
        assert_eq!(registry.resolve("int4", None).unwrap().name(), "int4");

        let conv = registry.resolve("text[]", None).unwrap();
        assert_eq!(conv.parse("{a,NULL}").unwrap(), Value::Array(vec!["a".into(), Value::Null]));

        let conv = registry.resolve(oid::INT4RANGE, None).unwrap();
        assert_eq!(conv.format(&Value::range(Range::closed_open(1, 5).unwrap())).unwrap(), "[\"1\",\"5\")");

        let err = registry.resolve("public.mood", None).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::ConnectionRequired(_)));
    }

    #[test]
    fn composed_from_catalog() {
        let mut mock = database();
        let mut registry = TypeRegistry::new();

        let conv = registry.resolve("mood[]", Some(&mut mock)).unwrap();
        assert_eq!(conv.parse("{happy}").unwrap(), Value::Array(vec!["happy".into()]));
        assert!(conv.parse("{angry}").is_err());

        let conv = registry.resolve("posint", Some(&mut mock)).unwrap();
        assert_eq!(conv.name(), "int4");

        let conv = registry.resolve("floatmultirange", Some(&mut mock)).unwrap();
        assert_eq!(conv.parse("{[1.5,2)}").unwrap().kind(), ValueKind::MultiRange);

        let conv = registry.resolve("pair", Some(&mut mock)).unwrap();
        let record = Record::new().with("a", 1).with("b", "sad");
        assert_eq!(conv.format(&Value::Record(record)).unwrap(), r#"("1","sad")"#);

        let err = registry.resolve("ltree", Some(&mut mock)).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::UnknownType(_)));
    }

    #[test]
    fn registration_wins() {
        let mut mock = database();
        let mut registry = TypeRegistry::new();
        let text: DynConverter = Arc::new(TextConverter::new("ltree"));
        registry.register("ltree", text).unwrap();
        assert_eq!(registry.resolve("ltree", Some(&mut mock)).unwrap().parse("a.b").unwrap(), "a.b".into());
        assert_eq!(registry.resolve(TypeSpec::Oid(16430), Some(&mut mock)).unwrap().name(), "ltree");

        registry
            .register("pg_catalog.int4", Registration::factory(|| Arc::new(TextConverter::new("int4"))))
            .unwrap();
        assert_eq!(registry.resolve("integer", None).unwrap().parse("7").unwrap(), "7".into());
        // composed converters see the replacement
        let conv = registry.resolve(oid::INT4_ARRAY, None).unwrap();
        assert_eq!(conv.parse("{7}").unwrap(), Value::Array(vec!["7".into()]));
    }

    #[test]
    fn array_registration_rejected() {
        let mut registry = TypeRegistry::new();
        let text: DynConverter = Arc::new(TextConverter::new("ltree"));
        let err = registry.register("ltree[]", text.clone()).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::UnknownType(_)));
        assert!(err.to_string().contains("ltree[]"));
        assert!(matches!(registry.resolve("ltree", None).unwrap_err().kind(), ErrorKind::ConnectionRequired(_)));

        registry.register("ltree", text).unwrap();
        let conv = registry.resolve("ltree[]", None).unwrap();
        assert_eq!(conv.parse("{a.b}").unwrap(), Value::Array(vec!["a.b".into()]));
    }

    #[test]
    fn table_composite_memoization() {
        let mut mock = database();
        let mut registry = TypeRegistry::new();
        registry.resolve(TypeSpec::Oid(16400), Some(&mut mock)).unwrap();
        registry.resolve(TypeSpec::Oid(16400), Some(&mut mock)).unwrap();
        assert_eq!(mock.count(COMPOSITE_QUERY), 1);

        let mut mock = database();
        let mut registry = TypeRegistry::with_config(&Config::default().composite_cache(false));
        registry.resolve("account", Some(&mut mock)).unwrap();
        registry.resolve("account", Some(&mut mock)).unwrap();
        assert_eq!(mock.count(COMPOSITE_QUERY), 2);
        // free standing composite layouts are loaded with the catalog
        registry.resolve("pair", Some(&mut mock)).unwrap();
        assert_eq!(mock.count(COMPOSITE_QUERY), 2);
    }

    #[test]
    fn inline_composite() {
        let mut registry = TypeRegistry::new();
        let spec = TypeSpec::composite([("id", "int8"), ("tags", "text[]")]);
        let conv = registry.resolve(spec, None).unwrap();
        let value = conv.parse(r#"(1,"{a,b}")"#).unwrap();
        let record = value.as_record().unwrap();
        assert_eq!(record.get("id"), Some(&Value::Int(1)));
        assert_eq!(record.get("tags"), Some(&Value::Array(vec!["a".into(), "b".into()])));
    }

    #[test]
    fn bound_to_session() {
        let mut mock = database().with_session(Session {
            date_style: DateStyle::parse("SQL, DMY"),
            ..Session::default()
        });
        let mut registry = TypeRegistry::new();
        let conv = registry.resolve("date", Some(&mut mock)).unwrap();
        let dmy = conv.parse("03/04/2024").unwrap();
        let conv = registry.resolve("date", None).unwrap();
        assert_ne!(conv.parse("03/04/2024").unwrap(), dmy);
    }
}
