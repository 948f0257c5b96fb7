//! Catalog queries.
use std::collections::HashMap;

use crate::{
    Result,
    client::{Client, ResultSet},
    common::verbose,
    postgres::Oid,
    types::ParseError,
};

use super::{CompositeLayout, Field, TypeClass, TypeEntry, TypeSnapshot, builtin};

pub(crate) const TYPES_QUERY: &str = "\
SELECT t.oid, n.nspname, t.typname, t.typtype, t.typcategory, t.typelem, t.typbasetype, t.typrelid, c.relkind \
FROM pg_catalog.pg_type t \
JOIN pg_catalog.pg_namespace n ON n.oid = t.typnamespace \
LEFT JOIN pg_catalog.pg_class c ON c.oid = t.typrelid";

pub(crate) const RANGES_QUERY: &str = "SELECT rngtypid, rngsubtype, rngmultitypid FROM pg_catalog.pg_range";

/// `pg_range` before postgres 14 has no multirange.
pub(crate) const RANGES_QUERY_LEGACY: &str = "SELECT rngtypid, rngsubtype, 0 FROM pg_catalog.pg_range";

pub(crate) const ENUMS_QUERY: &str =
    "SELECT enumtypid, enumlabel FROM pg_catalog.pg_enum ORDER BY enumtypid, enumsortorder";

/// Fields of every free standing composite type.
pub(crate) const COMPOSITES_QUERY: &str = "\
SELECT a.attrelid, a.attname, a.atttypid \
FROM pg_catalog.pg_attribute a \
JOIN pg_catalog.pg_class c ON c.oid = a.attrelid \
WHERE c.relkind = 'c' AND a.attnum > 0 AND NOT a.attisdropped \
ORDER BY a.attrelid, a.attnum";

/// Fields of one relation, `$1` is the relation oid.
pub(crate) const COMPOSITE_QUERY: &str = "\
SELECT a.attname, a.atttypid \
FROM pg_catalog.pg_attribute a \
WHERE a.attrelid = $1 AND a.attnum > 0 AND NOT a.attisdropped \
ORDER BY a.attnum";

struct Row<'a>(&'a [Option<String>]);

impl<'a> Row<'a> {
    fn text(&self, i: usize) -> Result<&'a str, ParseError> {
        match self.0.get(i) {
            Some(Some(text)) => Ok(text),
            _ => Err(ParseError::new("catalog row", format!("non NULL column {i}"), "", 0)),
        }
    }

    fn opt(&self, i: usize) -> Option<&'a str> {
        self.0.get(i).and_then(Option::as_deref)
    }

    fn oid(&self, i: usize) -> Result<Oid, ParseError> {
        let text = self.text(i)?;
        text.parse().map_err(|_| ParseError::new("oid", "unsigned integer", text, 0))
    }
}

fn rows(set: &ResultSet) -> impl Iterator<Item = Row<'_>> {
    set.rows.iter().map(|r| Row(r))
}

/// Load every type of the database, on top of the builtin snapshot.
pub(crate) fn database(client: &mut dyn Client, preload_composites: bool) -> Result<TypeSnapshot> {
    let types = client.execute(TYPES_QUERY)?;

    let ranges_query = match client.session().server_version >= 140000 {
        true => RANGES_QUERY,
        false => RANGES_QUERY_LEGACY,
    };
    let mut ranges = HashMap::new();
    let mut multiranges = HashMap::new();
    for row in rows(&client.execute(ranges_query)?) {
        let (range, subtype, multirange) = (row.oid(0)?, row.oid(1)?, row.oid(2)?);
        ranges.insert(range, (subtype, multirange));
        if multirange != 0 {
            multiranges.insert(multirange, range);
        }
    }

    let mut labels = HashMap::<Oid, Vec<String>>::new();
    for row in rows(&client.execute(ENUMS_QUERY)?) {
        labels.entry(row.oid(0)?).or_default().push(row.text(1)?.to_owned());
    }

    let mut composites = HashMap::<Oid, Vec<Field>>::new();
    if preload_composites {
        for row in rows(&client.execute(COMPOSITES_QUERY)?) {
            composites.entry(row.oid(0)?).or_default().push(Field::new(row.text(1)?, row.oid(2)?));
        }
        verbose!(count = composites.len(), "preloaded composite layouts");
    }

    let mut snapshot = builtin::snapshot();
    for row in rows(&types) {
        let oid = row.oid(0)?;
        let class = match row.text(3)? {
            "d" => TypeClass::Domain(row.oid(6)?),
            "e" => TypeClass::Enum(labels.remove(&oid).unwrap_or_default()),
            "r" => match ranges.get(&oid) {
                Some(&(subtype, multirange)) => TypeClass::Range { subtype, multirange },
                None => TypeClass::Base,
            },
            "m" => match multiranges.get(&oid) {
                Some(&range) => TypeClass::MultiRange { range },
                None => TypeClass::Base,
            },
            "c" => {
                let relid = row.oid(7)?;
                TypeClass::Composite(match (row.opt(8), composites.remove(&relid)) {
                    (Some("c"), Some(fields)) => CompositeLayout::Fields(fields),
                    _ => CompositeLayout::Relation(relid),
                })
            }
            _ if row.text(4)? == "A" && row.oid(5)? != 0 => TypeClass::Array(row.oid(5)?),
            _ => TypeClass::Base,
        };
        snapshot.insert(oid, TypeEntry::new(row.text(1)?, row.text(2)?, class));
    }
    Ok(snapshot)
}

/// Fields of a table row type.
pub(crate) fn composite(client: &mut dyn Client, relid: Oid) -> Result<Vec<Field>> {
    let mut b = itoa::Buffer::new();
    let set = client.execute_params(COMPOSITE_QUERY, &[Some(b.format(relid).to_owned())])?;
    rows(&set)
        .map(|row| -> Result<Field> { Ok(Field::new(row.text(0)?, row.oid(1)?)) })
        .collect()
}
