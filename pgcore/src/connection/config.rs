//! Connection configuration.
use std::{env::var, num::NonZeroUsize};

use crate::types::{BoolConverter, Converter};
use crate::value::Value;

const DEFAULT_CONVERTER_CACHE: NonZeroUsize = match NonZeroUsize::new(256) {
    Some(n) => n,
    None => NonZeroUsize::MIN,
};

/// Type resolution and transaction settings of a [`Connection`][super::Connection].
#[derive(Clone, Debug)]
pub struct Config {
    pub(crate) composite_cache: bool,
    pub(crate) preload_composites: bool,
    pub(crate) search_path: Vec<String>,
    pub(crate) converter_cache: NonZeroUsize,
    pub(crate) savepoint_prefix: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            composite_cache: true,
            preload_composites: true,
            search_path: vec!["pg_catalog".into(), "public".into()],
            converter_cache: DEFAULT_CONVERTER_CACHE,
            savepoint_prefix: "pgcore_sp".into(),
        }
    }
}

impl Config {
    /// Retrieve configuration from environment variable.
    ///
    /// It reads:
    /// - `PGCORE_COMPOSITE_CACHE`
    /// - `PGCORE_PRELOAD_COMPOSITES`
    /// - `PGCORE_SEARCH_PATH`, comma separated
    /// - `PGCORE_CONVERTER_CACHE`
    /// - `PGCORE_SAVEPOINT_PREFIX`
    ///
    /// Missing or invalid value fallback to the default.
    pub fn from_env() -> Config {
        let def = Config::default();

        macro_rules! env {
            ($name:literal, $parse:expr, $def:expr) => {
                match var($name).ok().and_then($parse) {
                    Some(ok) => ok,
                    None => $def,
                }
            };
        }

        let composite_cache = env!("PGCORE_COMPOSITE_CACHE", |v| parse_bool(&v), def.composite_cache);
        let preload_composites = env!("PGCORE_PRELOAD_COMPOSITES", |v| parse_bool(&v), def.preload_composites);
        let search_path = env!("PGCORE_SEARCH_PATH", |v| parse_list(&v), def.search_path);
        let converter_cache = env!("PGCORE_CONVERTER_CACHE", |v| v.trim().parse().ok(), def.converter_cache);
        let savepoint_prefix = env!(
            "PGCORE_SAVEPOINT_PREFIX",
            |v| (!v.is_empty()).then_some(v),
            def.savepoint_prefix
        );

        Self { composite_cache, preload_composites, search_path, converter_cache, savepoint_prefix }
    }

    /// Keep loaded table composite layouts, default `true`.
    pub fn composite_cache(mut self, enabled: bool) -> Self {
        self.composite_cache = enabled;
        self
    }

    /// Load free standing composite layouts with the full catalog, default `true`.
    pub fn preload_composites(mut self, enabled: bool) -> Self {
        self.preload_composites = enabled;
        self
    }

    /// Schemas tried for unqualified type names, default `pg_catalog, public`.
    pub fn search_path<I, S>(mut self, schemas: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.search_path = schemas.into_iter().map(Into::into).collect();
        self
    }

    /// Capacity of converters memoized by oid, default 256.
    pub fn converter_cache(mut self, capacity: NonZeroUsize) -> Self {
        self.converter_cache = capacity;
        self
    }

    /// Prefix of generated savepoint names, default `pgcore_sp`.
    pub fn savepoint_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.savepoint_prefix = prefix.into();
        self
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    match BoolConverter.parse(text) {
        Ok(Value::Bool(b)) => Some(b),
        _ => None,
    }
}

fn parse_list(text: &str) -> Option<Vec<String>> {
    let list: Vec<String> = text
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect();
    (!list.is_empty()).then_some(list)
}
