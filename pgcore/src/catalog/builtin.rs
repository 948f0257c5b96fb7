//! Types assigned by `initdb`, identical in every database.
use crate::postgres::Oid;

use super::{CompositeLayout, TypeClass, TypeEntry, TypeSnapshot};

enum Kind {
    Base,
    Array(Oid),
    Range(Oid, Oid),
    MultiRange(Oid),
    Table(Oid),
}

use Kind::*;

#[rustfmt::skip]
static TYPES: &[(Oid, &str, Kind)] = &[
    // base
    (16, "bool", Base),
    (17, "bytea", Base),
    (18, "char", Base),
    (19, "name", Base),
    (20, "int8", Base),
    (21, "int2", Base),
    (22, "int2vector", Base),
    (23, "int4", Base),
    (24, "regproc", Base),
    (25, "text", Base),
    (26, "oid", Base),
    (27, "tid", Base),
    (28, "xid", Base),
    (29, "cid", Base),
    (30, "oidvector", Base),
    (114, "json", Base),
    (142, "xml", Base),
    (194, "pg_node_tree", Base),
    (600, "point", Base),
    (601, "lseg", Base),
    (602, "path", Base),
    (603, "box", Base),
    (604, "polygon", Base),
    (628, "line", Base),
    (650, "cidr", Base),
    (700, "float4", Base),
    (701, "float8", Base),
    (705, "unknown", Base),
    (718, "circle", Base),
    (774, "macaddr8", Base),
    (790, "money", Base),
    (829, "macaddr", Base),
    (869, "inet", Base),
    (1033, "aclitem", Base),
    (1042, "bpchar", Base),
    (1043, "varchar", Base),
    (1082, "date", Base),
    (1083, "time", Base),
    (1114, "timestamp", Base),
    (1184, "timestamptz", Base),
    (1186, "interval", Base),
    (1266, "timetz", Base),
    (1560, "bit", Base),
    (1562, "varbit", Base),
    (1700, "numeric", Base),
    (1790, "refcursor", Base),
    (2202, "regprocedure", Base),
    (2203, "regoper", Base),
    (2204, "regoperator", Base),
    (2205, "regclass", Base),
    (2206, "regtype", Base),
    (2950, "uuid", Base),
    (2970, "txid_snapshot", Base),
    (3220, "pg_lsn", Base),
    (3614, "tsvector", Base),
    (3615, "tsquery", Base),
    (3642, "gtsvector", Base),
    (3734, "regconfig", Base),
    (3769, "regdictionary", Base),
    (3802, "jsonb", Base),
    (4072, "jsonpath", Base),
    (4089, "regnamespace", Base),
    (4096, "regrole", Base),
    (4191, "regcollation", Base),
    (5038, "pg_snapshot", Base),
    (5069, "xid8", Base),
    // pseudo
    (2249, "record", Base),
    (2275, "cstring", Base),
    (2276, "any", Base),
    (2277, "anyarray", Base),
    (2278, "void", Base),
    (2279, "trigger", Base),
    (2281, "internal", Base),
    (2283, "anyelement", Base),
    (3831, "anyrange", Base),
    (4537, "anymultirange", Base),
    // arrays
    (143, "_xml", Array(142)),
    (199, "_json", Array(114)),
    (271, "_xid8", Array(5069)),
    (629, "_line", Array(628)),
    (651, "_cidr", Array(650)),
    (719, "_circle", Array(718)),
    (775, "_macaddr8", Array(774)),
    (791, "_money", Array(790)),
    (1000, "_bool", Array(16)),
    (1001, "_bytea", Array(17)),
    (1002, "_char", Array(18)),
    (1003, "_name", Array(19)),
    (1005, "_int2", Array(21)),
    (1006, "_int2vector", Array(22)),
    (1007, "_int4", Array(23)),
    (1008, "_regproc", Array(24)),
    (1009, "_text", Array(25)),
    (1010, "_tid", Array(27)),
    (1011, "_xid", Array(28)),
    (1012, "_cid", Array(29)),
    (1013, "_oidvector", Array(30)),
    (1014, "_bpchar", Array(1042)),
    (1015, "_varchar", Array(1043)),
    (1016, "_int8", Array(20)),
    (1017, "_point", Array(600)),
    (1018, "_lseg", Array(601)),
    (1019, "_path", Array(602)),
    (1020, "_box", Array(603)),
    (1021, "_float4", Array(700)),
    (1022, "_float8", Array(701)),
    (1027, "_polygon", Array(604)),
    (1028, "_oid", Array(26)),
    (1034, "_aclitem", Array(1033)),
    (1040, "_macaddr", Array(829)),
    (1041, "_inet", Array(869)),
    (1115, "_timestamp", Array(1114)),
    (1182, "_date", Array(1082)),
    (1183, "_time", Array(1083)),
    (1185, "_timestamptz", Array(1184)),
    (1187, "_interval", Array(1186)),
    (1231, "_numeric", Array(1700)),
    (1263, "_cstring", Array(2275)),
    (1270, "_timetz", Array(1266)),
    (1561, "_bit", Array(1560)),
    (1563, "_varbit", Array(1562)),
    (2201, "_refcursor", Array(1790)),
    (2207, "_regprocedure", Array(2202)),
    (2208, "_regoper", Array(2203)),
    (2209, "_regoperator", Array(2204)),
    (2210, "_regclass", Array(2205)),
    (2211, "_regtype", Array(2206)),
    (2287, "_record", Array(2249)),
    (2949, "_txid_snapshot", Array(2970)),
    (2951, "_uuid", Array(2950)),
    (3221, "_pg_lsn", Array(3220)),
    (3643, "_tsvector", Array(3614)),
    (3644, "_gtsvector", Array(3642)),
    (3645, "_tsquery", Array(3615)),
    (3735, "_regconfig", Array(3734)),
    (3770, "_regdictionary", Array(3769)),
    (3807, "_jsonb", Array(3802)),
    (4073, "_jsonpath", Array(4072)),
    (4090, "_regnamespace", Array(4089)),
    (4097, "_regrole", Array(4096)),
    (4192, "_regcollation", Array(4191)),
    (5039, "_pg_snapshot", Array(5038)),
    // ranges, with their multirange
    (3904, "int4range", Range(23, 4451)),
    (3906, "numrange", Range(1700, 4532)),
    (3908, "tsrange", Range(1114, 4533)),
    (3910, "tstzrange", Range(1184, 4534)),
    (3912, "daterange", Range(1082, 4535)),
    (3926, "int8range", Range(20, 4536)),
    (3905, "_int4range", Array(3904)),
    (3907, "_numrange", Array(3906)),
    (3909, "_tsrange", Array(3908)),
    (3911, "_tstzrange", Array(3910)),
    (3913, "_daterange", Array(3912)),
    (3927, "_int8range", Array(3926)),
    (4451, "int4multirange", MultiRange(3904)),
    (4532, "nummultirange", MultiRange(3906)),
    (4533, "tsmultirange", MultiRange(3908)),
    (4534, "tstzmultirange", MultiRange(3910)),
    (4535, "datemultirange", MultiRange(3912)),
    (4536, "int8multirange", MultiRange(3926)),
    (6150, "_int4multirange", Array(4451)),
    (6151, "_nummultirange", Array(4532)),
    (6152, "_tsmultirange", Array(4533)),
    (6153, "_tstzmultirange", Array(4534)),
    (6155, "_datemultirange", Array(4535)),
    (6157, "_int8multirange", Array(4536)),
    // system catalog row types, fields are loaded on demand
    (71, "pg_type", Table(1247)),
    (75, "pg_attribute", Table(1249)),
    (81, "pg_proc", Table(1255)),
    (83, "pg_class", Table(1259)),
    (210, "_pg_type", Array(71)),
    (270, "_pg_attribute", Array(75)),
    (272, "_pg_proc", Array(81)),
    (273, "_pg_class", Array(83)),
];

/// Snapshot of every builtin type, all in `pg_catalog`.
pub(crate) fn snapshot() -> TypeSnapshot {
    let mut snapshot = TypeSnapshot::new();
    for (oid, name, kind) in TYPES {
        let class = match *kind {
            Base => TypeClass::Base,
            Array(elem) => TypeClass::Array(elem),
            Range(subtype, multirange) => TypeClass::Range { subtype, multirange },
            MultiRange(range) => TypeClass::MultiRange { range },
            Table(relid) => TypeClass::Composite(CompositeLayout::Relation(relid)),
        };
        snapshot.insert(*oid, TypeEntry::new("pg_catalog", *name, class));
    }
    snapshot
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::postgres::oid;

    #[test]
    fn references_resolve() {
        let snapshot = snapshot();
        for (oid, entry) in snapshot.iter() {
            assert!(oid < oid::FIRST_NORMAL);
            let target = match entry.class {
                TypeClass::Array(elem) => elem,
                TypeClass::Range { subtype, multirange } => {
                    assert!(snapshot.get(multirange).is_some(), "{}", entry.name);
                    subtype
                }
                TypeClass::MultiRange { range } => range,
                _ => continue,
            };
            assert!(snapshot.get(target).is_some(), "{} refers to missing {target}", entry.name);
        }
    }

    #[test]
    fn known_oids() {
        let snapshot = snapshot();
        assert_eq!(snapshot.get(oid::INT4).map(|e| e.name.as_str()), Some("int4"));
        assert_eq!(snapshot.get(oid::INT4_ARRAY).map(|e| &e.class), Some(&TypeClass::Array(oid::INT4)));
        assert_eq!(
            snapshot.get(oid::INT4MULTIRANGE).map(|e| &e.class),
            Some(&TypeClass::MultiRange { range: oid::INT4RANGE }),
        );
    }
}
