//! The [`CacheStore`] trait.
use bytes::Bytes;
use std::{collections::HashMap, fmt, sync::Mutex};

use crate::{Result, error::CacheError};

/// External key/value store used to persist type metadata between processes.
///
/// The store may be shared and is not required to be consistent: a read after
/// a write may or may not observe it.
pub trait CacheStore: Send + Sync + fmt::Debug {
    /// Read a value, [`None`] on miss.
    fn get(&self, key: &str) -> Result<Option<Bytes>>;

    /// Write a value, replacing any previous one.
    fn set(&self, key: &str, value: Bytes) -> Result<()>;
}

/// In process [`CacheStore`].
#[derive(Debug, Default)]
pub struct MemoryCache {
    map: Mutex<HashMap<String, Bytes>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.map.lock().map(|m| m.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &str) -> bool {
        self.map.lock().is_ok_and(|m| m.contains_key(key))
    }
}

impl CacheStore for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<Bytes>> {
        let map = self.map.lock().map_err(CacheError::new)?;
        Ok(map.get(key).cloned())
    }

    fn set(&self, key: &str, value: Bytes) -> Result<()> {
        let mut map = self.map.lock().map_err(CacheError::new)?;
        map.insert(key.to_owned(), value);
        Ok(())
    }
}

/// Key of the full type snapshot of a connection.
pub(crate) fn types_key(connection_id: &str) -> String {
    format!("{connection_id}-types")
}

/// Key of a single composite layout.
pub(crate) fn composite_key(connection_id: &str, oid: crate::postgres::Oid) -> String {
    let mut b = itoa::Buffer::new();
    format!("{connection_id}-composite-{}", b.format(oid))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn memory_cache() {
        let cache = MemoryCache::new();
        assert_eq!(cache.get("a").unwrap(), None);
        cache.set("a", Bytes::from_static(b"1")).unwrap();
        cache.set("a", Bytes::from_static(b"2")).unwrap();
        assert_eq!(cache.get("a").unwrap().as_deref(), Some(&b"2"[..]));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn keys() {
        assert_eq!(types_key("db1"), "db1-types");
        assert_eq!(composite_key("db1", 16384), "db1-composite-16384");
    }
}
