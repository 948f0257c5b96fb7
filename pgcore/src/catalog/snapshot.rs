use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::postgres::Oid;

/// Type metadata keyed by oid, the unit persisted to a cache.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeSnapshot {
    types: BTreeMap<Oid, TypeEntry>,
}

/// Name and classification of one type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeEntry {
    pub schema: String,
    pub name: String,
    pub class: TypeClass,
}

/// What a type is made of.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeClass {
    /// Needs a registered converter.
    Base,
    /// Enum with its labels in sort order.
    Enum(Vec<String>),
    /// Array of the element oid.
    Array(Oid),
    /// Range over subtype, `multirange` is `0` before postgres 14.
    Range { subtype: Oid, multirange: Oid },
    MultiRange { range: Oid },
    /// Domain over the base oid.
    Domain(Oid),
    Composite(CompositeLayout),
}

/// Fields of a composite type.
///
/// Table row types start as [`Relation`][CompositeLayout::Relation] and are
/// replaced by their fields when first loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositeLayout {
    Relation(Oid),
    Fields(Vec<Field>),
}

/// One field of a composite type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub type_oid: Oid,
}

impl TypeEntry {
    pub fn new(schema: impl Into<String>, name: impl Into<String>, class: TypeClass) -> Self {
        Self { schema: schema.into(), name: name.into(), class }
    }

    /// `schema.name`.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }
}

impl Field {
    pub fn new(name: impl Into<String>, type_oid: Oid) -> Self {
        Self { name: name.into(), type_oid }
    }
}

impl TypeSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn get(&self, oid: Oid) -> Option<&TypeEntry> {
        self.types.get(&oid)
    }

    pub(crate) fn get_mut(&mut self, oid: Oid) -> Option<&mut TypeEntry> {
        self.types.get_mut(&oid)
    }

    pub fn insert(&mut self, oid: Oid, entry: TypeEntry) {
        self.types.insert(oid, entry);
    }

    pub fn iter(&self) -> impl Iterator<Item = (Oid, &TypeEntry)> {
        self.types.iter().map(|(oid, e)| (*oid, e))
    }

    /// Overlay every entry of `other`, entries of `other` win.
    pub fn merge(&mut self, other: TypeSnapshot) {
        self.types.extend(other.types);
    }
}
