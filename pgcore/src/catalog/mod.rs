//! Type metadata resolver.
//!
//! [`TypeCatalog`] classifies oids and maps them to names. It starts from a
//! builtin snapshot of every type `initdb` creates, so common types resolve
//! without a connection. A lookup miss reloads, first from the configured
//! [`CacheStore`], then from the database catalog.
use bytes::Bytes;
use std::{collections::HashMap, fmt, sync::Arc};

use crate::{
    Result,
    cache::{self, CacheStore},
    client::Client,
    common::{debug, span, verbose},
    error::{ConnectionRequired, UnknownType},
    postgres::Oid,
};

mod builtin;
mod load;
mod snapshot;

pub use snapshot::{CompositeLayout, Field, TypeClass, TypeEntry, TypeSnapshot};
#[cfg(test)]
pub(crate) use load::{COMPOSITE_QUERY, COMPOSITES_QUERY, ENUMS_QUERY, RANGES_QUERY, TYPES_QUERY};

/// Where the loaded metadata came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Static snapshot, no connection involved.
    Builtin,
    /// Snapshot read from [`CacheStore`].
    Cache,
    /// Loaded from the database catalog.
    Database,
}

/// Type metadata resolver.
pub struct TypeCatalog {
    snapshot: TypeSnapshot,
    /// `name -> [(schema, oid)]`
    names: HashMap<String, Vec<(String, Oid)>>,
    source: Source,
    cache: Option<Arc<dyn CacheStore>>,
    composite_cache: bool,
    preload_composites: bool,
}

impl TypeCatalog {
    /// Catalog with only builtin types.
    pub fn new() -> Self {
        let mut me = Self {
            snapshot: TypeSnapshot::new(),
            names: HashMap::new(),
            source: Source::Builtin,
            cache: None,
            composite_cache: true,
            preload_composites: true,
        };
        me.install(builtin::snapshot(), Source::Builtin);
        me
    }

    /// Persist loaded metadata to `cache`.
    pub fn with_cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Keep loaded table composite layouts, default `true`.
    ///
    /// Table columns may change over the type lifetime, when disabled, the
    /// fields of a table composite are queried every time they are needed.
    pub fn with_composite_cache(mut self, enabled: bool) -> Self {
        self.composite_cache = enabled;
        self
    }

    /// Load free standing composite layouts along with the full catalog, default `true`.
    pub fn with_preload_composites(mut self, enabled: bool) -> Self {
        self.preload_composites = enabled;
        self
    }

    pub fn set_cache(&mut self, cache: Option<Arc<dyn CacheStore>>) {
        self.cache = cache;
    }

    pub fn source(&self) -> Source {
        self.source
    }

    pub fn snapshot(&self) -> &TypeSnapshot {
        &self.snapshot
    }

    /// Loaded entry, without any reload.
    pub fn get(&self, oid: Oid) -> Option<&TypeEntry> {
        self.snapshot.get(oid)
    }

    /// Entry of `oid`, reloading metadata on miss.
    pub fn entry(&mut self, oid: Oid, client: Option<&mut (dyn Client + '_)>) -> Result<TypeEntry> {
        self.ensure(client, |me| me.snapshot.get(oid).cloned(), || UnknownType::oid(oid))
    }

    /// Oid of a type name, reloading metadata on miss.
    ///
    /// Unqualified name is looked up in `search_path` order, then accepted if
    /// exactly one schema has it.
    pub fn find(
        &mut self,
        schema: Option<&str>,
        name: &str,
        search_path: &[String],
        client: Option<&mut (dyn Client + '_)>,
    ) -> Result<Oid> {
        self.ensure(
            client,
            |me| me.find_loaded(schema, name, search_path),
            || match schema {
                Some(schema) => UnknownType::name(format_args!("{schema}.{name}")),
                None => UnknownType::name(name),
            },
        )
    }

    /// Fields of composite type `oid`.
    pub fn composite_fields(&mut self, oid: Oid, mut client: Option<&mut (dyn Client + '_)>) -> Result<Vec<Field>> {
        let entry = self.entry(oid, client.as_deref_mut())?;
        let relid = match entry.class {
            TypeClass::Composite(CompositeLayout::Fields(fields)) => return Ok(fields),
            TypeClass::Composite(CompositeLayout::Relation(relid)) => relid,
            _ => return Err(UnknownType::not_composite(entry.qualified_name()).into()),
        };
        let Some(client) = client else {
            return Err(ConnectionRequired.into());
        };

        span!("composite_fields", oid);
        let key = cache::composite_key(client.connection_id(), oid);
        if self.composite_cache {
            if let Some(fields) = self.read_cache::<Vec<Field>>(&key) {
                verbose!(oid, "composite layout from cache");
                self.memoize(oid, fields.clone());
                return Ok(fields);
            }
        }

        let fields = load::composite(client, relid)?;
        verbose!(oid, count = fields.len(), "composite layout from database");
        if self.composite_cache {
            self.memoize(oid, fields.clone());
            if let Some(cache) = &self.cache {
                cache.set(&key, Bytes::from(serde_json::to_vec(&fields)?))?;
            }
        }
        Ok(fields)
    }

    /// Reload metadata for a different physical connection.
    ///
    /// Another database may reuse oids for different types, so anything
    /// beyond the builtin snapshot is dropped and loaded again.
    pub fn connection_changed(&mut self, client: &mut dyn Client) -> Result<()> {
        if self.source == Source::Builtin {
            return Ok(());
        }
        debug!("connection changed, reloading type catalog");
        self.install(builtin::snapshot(), Source::Builtin);
        self.reload(client)
    }

    /// Reload from cache, or from database on cache miss.
    pub fn reload(&mut self, client: &mut dyn Client) -> Result<()> {
        if self.load_cache(client) {
            return Ok(());
        }
        self.load_database(client)
    }

    /// Resolve with `probe`, reloading until it succeeds or nothing is left to load.
    fn ensure<T>(
        &mut self,
        client: Option<&mut (dyn Client + '_)>,
        probe: impl Fn(&Self) -> Option<T>,
        missing: impl FnOnce() -> UnknownType,
    ) -> Result<T> {
        if let Some(found) = probe(self) {
            return Ok(found);
        }
        let Some(client) = client else {
            return Err(ConnectionRequired.into());
        };

        if self.source == Source::Builtin && self.load_cache(client) {
            if let Some(found) = probe(self) {
                return Ok(found);
            }
        }

        self.load_database(client)?;
        probe(self).ok_or_else(|| missing().into())
    }

    fn find_loaded(&self, schema: Option<&str>, name: &str, search_path: &[String]) -> Option<Oid> {
        let candidates = self.names.get(name)?;
        let in_schema = |schema: &str| {
            candidates
                .iter()
                .find(|(s, _)| s == schema)
                .map(|(_, oid)| *oid)
        };
        match schema {
            Some(schema) => in_schema(schema),
            None => search_path
                .iter()
                .find_map(|schema| in_schema(schema.as_str()))
                .or_else(|| match candidates.as_slice() {
                    [(_, oid)] => Some(*oid),
                    _ => None,
                }),
        }
    }

    fn load_cache(&mut self, client: &mut dyn Client) -> bool {
        let key = cache::types_key(client.connection_id());
        match self.read_cache::<TypeSnapshot>(&key) {
            Some(snapshot) => {
                debug!("type catalog loaded from cache `{key}`");
                self.install(snapshot, Source::Cache);
                true
            }
            None => false,
        }
    }

    fn load_database(&mut self, client: &mut dyn Client) -> Result<()> {
        span!("load_database");
        let snapshot = load::database(client, self.preload_composites)?;
        debug!("type catalog loaded from database, {} types", snapshot.len());
        self.install(snapshot, Source::Database);

        if let Some(cache) = &self.cache {
            let key = cache::types_key(client.connection_id());
            cache.set(&key, Bytes::from(serde_json::to_vec(&self.snapshot)?))?;
        }
        Ok(())
    }

    /// Read and decode a cache entry, failures are a miss.
    fn read_cache<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        let cache = self.cache.as_ref()?;
        let bytes = match cache.get(key) {
            Ok(bytes) => bytes?,
            Err(_err) => {
                debug!("cache read of `{key}` failed: {_err}");
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(_err) => {
                debug!("cache entry `{key}` is malformed: {_err}");
                None
            }
        }
    }

    fn memoize(&mut self, oid: Oid, fields: Vec<Field>) {
        if let Some(entry) = self.snapshot.get_mut(oid) {
            entry.class = TypeClass::Composite(CompositeLayout::Fields(fields));
        }
    }

    fn install(&mut self, snapshot: TypeSnapshot, source: Source) {
        self.names.clear();
        for (oid, entry) in snapshot.iter() {
            self.names
                .entry(entry.name.clone())
                .or_default()
                .push((entry.schema.clone(), oid));
        }
        self.snapshot = snapshot;
        self.source = source;
    }
}

impl Default for TypeCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TypeCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeCatalog")
            .field("types", &self.snapshot.len())
            .field("source", &self.source)
            .field("cache", &self.cache)
            .field("composite_cache", &self.composite_cache)
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        ErrorKind,
        cache::MemoryCache,
        error::CacheError,
        postgres::oid,
        testing::{MockClient, table},
    };

    /// Store that refuses reads, writes, or both.
    #[derive(Debug)]
    struct BrokenCache {
        read: bool,
        write: bool,
    }

    impl CacheStore for BrokenCache {
        fn get(&self, _key: &str) -> Result<Option<Bytes>> {
            match self.read {
                true => Err(CacheError::new("read refused").into()),
                false => Ok(None),
            }
        }

        fn set(&self, _key: &str, _value: Bytes) -> Result<()> {
            match self.write {
                true => Err(CacheError::new("write refused").into()),
                false => Ok(()),
            }
        }
    }

    fn search_path() -> Vec<String> {
        vec!["pg_catalog".into(), "public".into()]
    }

    /// A database with enum `mood`, composite `pair`, table `account`, and a domain over int4.
    fn database() -> MockClient {
        let mut mock = MockClient::new();
        mock.respond(TYPES_QUERY, table("\
            16385|public|mood|e|E|0|0|0|\\N\n\
            16390|public|pair|c|C|0|0|16388|c\n\
            16391|public|_pair|b|A|16390|0|0|\\N\n\
            16400|public|account|c|C|0|0|16398|r\n\
            16410|public|posint|d|N|0|23|0|\\N\n\
            16420|app|mood|e|E|0|0|0|\\N"));
        mock.respond(RANGES_QUERY, table(""));
        mock.respond(ENUMS_QUERY, table("16385|sad\n16385|ok\n16385|happy"));
        mock.respond(COMPOSITES_QUERY, table("16388|a|23\n16388|b|25"));
        mock.respond(COMPOSITE_QUERY, table("id|20\nname|25"));
        mock
    }

    #[test]
    fn builtin_without_connection() {
        let mut catalog = TypeCatalog::new();
        assert_eq!(catalog.find(None, "int4", &search_path(), None).unwrap(), oid::INT4);
        assert_eq!(catalog.entry(oid::TEXT_ARRAY, None).unwrap().class, TypeClass::Array(oid::TEXT));

        let err = catalog.entry(99999, None).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::ConnectionRequired(_)));
        assert_eq!(catalog.source(), Source::Builtin);
    }

    #[test]
    fn miss_loads_database() {
        let mut mock = database();
        let mut catalog = TypeCatalog::new();

        let oid = catalog.find(Some("public"), "mood", &search_path(), Some(&mut mock)).unwrap();
        assert_eq!(oid, 16385);
        assert_eq!(catalog.source(), Source::Database);
        assert_eq!(
            catalog.get(16385).map(|e| &e.class),
            Some(&TypeClass::Enum(vec!["sad".into(), "ok".into(), "happy".into()])),
        );
        assert_eq!(catalog.get(16410).map(|e| &e.class), Some(&TypeClass::Domain(23)));
        assert_eq!(catalog.get(16391).map(|e| &e.class), Some(&TypeClass::Array(16390)));

        // loaded entries need no further query
        let queries = mock.log().len();
        assert_eq!(catalog.entry(16391, None).unwrap().name, "_pair");
        assert_eq!(mock.log().len(), queries);

        let err = catalog.entry(99999, Some(&mut mock)).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::UnknownType(_)));
    }

    #[test]
    fn ambiguous_unqualified_name() {
        let mut mock = database();
        let mut catalog = TypeCatalog::new();
        let err = catalog.find(None, "mood", &["pg_catalog".into()], Some(&mut mock)).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::UnknownType(_)));
        let oid = catalog.find(None, "mood", &["app".into()], Some(&mut mock)).unwrap();
        assert_eq!(oid, 16420);
        assert_eq!(catalog.find(None, "posint", &[], None).unwrap(), 16410);
    }

    #[test]
    fn composites() {
        let mut mock = database();
        let mut catalog = TypeCatalog::new();

        let fields = catalog.composite_fields(16390, Some(&mut mock)).unwrap();
        assert_eq!(fields, vec![Field::new("a", 23), Field::new("b", 25)]);

        let fields = catalog.composite_fields(16400, Some(&mut mock)).unwrap();
        assert_eq!(fields, vec![Field::new("id", 20), Field::new("name", 25)]);
        assert_eq!(mock.count(COMPOSITE_QUERY), 1);

        // memoized
        catalog.composite_fields(16400, Some(&mut mock)).unwrap();
        assert_eq!(mock.count(COMPOSITE_QUERY), 1);

        let err = catalog.composite_fields(oid::INT4, None).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::UnknownType(_)));
    }

    #[test]
    fn composite_cache_disabled() {
        let mut mock = database();
        let mut catalog = TypeCatalog::new().with_composite_cache(false);
        catalog.composite_fields(16400, Some(&mut mock)).unwrap();
        catalog.composite_fields(16400, Some(&mut mock)).unwrap();
        assert_eq!(mock.count(COMPOSITE_QUERY), 2);
    }

    #[test]
    fn cache_round_trip() {
        let cache = Arc::new(MemoryCache::new());

        let mut mock = database();
        let mut catalog = TypeCatalog::new().with_cache(cache.clone());
        catalog.entry(16385, Some(&mut mock)).unwrap();
        catalog.composite_fields(16400, Some(&mut mock)).unwrap();
        assert!(cache.contains("mock-1-types"));
        assert!(cache.contains("mock-1-composite-16400"));

        // a second process reads everything from cache
        let mut mock = database();
        let mut catalog = TypeCatalog::new().with_cache(cache);
        assert_eq!(catalog.entry(16385, Some(&mut mock)).unwrap().name, "mood");
        assert_eq!(catalog.source(), Source::Cache);
        assert_eq!(catalog.composite_fields(16400, Some(&mut mock)).unwrap().len(), 2);
        assert_eq!(mock.count(TYPES_QUERY), 0);
        assert_eq!(mock.count(COMPOSITE_QUERY), 0);
    }

    #[test]
    fn cache_miss_after_hit_loads_database() {
        let cache = Arc::new(MemoryCache::new());
        cache.set("mock-1-types", Bytes::from(serde_json::to_vec(&builtin::snapshot()).unwrap())).unwrap();

        let mut mock = database();
        let mut catalog = TypeCatalog::new().with_cache(cache);
        catalog.entry(16385, Some(&mut mock)).unwrap();
        assert_eq!(catalog.source(), Source::Database);
        assert_eq!(mock.count(TYPES_QUERY), 1);
    }

    #[test]
    fn malformed_cache_is_a_miss() {
        let cache = Arc::new(MemoryCache::new());
        cache.set("mock-1-types", Bytes::from_static(b"{not json")).unwrap();

        let mut mock = database();
        let mut catalog = TypeCatalog::new().with_cache(cache);
        catalog.entry(16385, Some(&mut mock)).unwrap();
        assert_eq!(catalog.source(), Source::Database);
    }

    #[test]
    fn cache_read_failure_is_a_miss() {
        let mut mock = database();
        let cache = Arc::new(BrokenCache { read: true, write: false });
        let mut catalog = TypeCatalog::new().with_cache(cache);
        assert_eq!(catalog.entry(16385, Some(&mut mock)).unwrap().name, "mood");
        assert_eq!(catalog.source(), Source::Database);
        assert_eq!(catalog.composite_fields(16400, Some(&mut mock)).unwrap().len(), 2);
    }

    #[test]
    fn cache_write_failure_propagates() {
        let mut mock = database();
        let cache = Arc::new(BrokenCache { read: false, write: true });
        let mut catalog = TypeCatalog::new().with_cache(cache);
        let err = catalog.entry(16385, Some(&mut mock)).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Cache(_)));

        // the loaded snapshot is kept
        assert_eq!(catalog.entry(16385, None).unwrap().name, "mood");
        let err = catalog.composite_fields(16400, Some(&mut mock)).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Cache(_)));
    }

    #[test]
    fn connection_change_reloads() {
        let mut mock = database();
        let mut catalog = TypeCatalog::new();
        catalog.connection_changed(&mut mock).unwrap();
        assert_eq!(mock.count(TYPES_QUERY), 0);

        catalog.entry(16385, Some(&mut mock)).unwrap();
        let mut other = MockClient::new().with_id("mock-2");
        other.respond(TYPES_QUERY, table("16385|public|point2|b|U|0|0|0|\\N"));
        catalog.connection_changed(&mut other).unwrap();
        assert_eq!(other.count(TYPES_QUERY), 1);
        assert_eq!(catalog.get(16385).map(|e| e.name.as_str()), Some("point2"));
        assert_eq!(catalog.get(16390), None);
    }
}
