use time::{Date, OffsetDateTime, PrimitiveDateTime, Time};

use crate::value::{Interval, Numeric, Point, Tid};

/// Postgres object identifier.
///
/// The oid type is implemented as an unsigned four-byte integer.
///
/// <https://www.postgresql.org/docs/current/datatype-oid.html>
pub type Oid = u32;

/// A type that have corresponding postgres oid.
pub trait PgType {
    const OID: Oid;
}

/// Oids of the types this crate handles without any catalog lookup.
pub mod oid {
    use super::Oid;

    pub const BOOL: Oid = 16;
    pub const BYTEA: Oid = 17;
    pub const CHAR: Oid = 18;
    pub const NAME: Oid = 19;
    pub const INT8: Oid = 20;
    pub const INT2: Oid = 21;
    pub const INT4: Oid = 23;
    pub const TEXT: Oid = 25;
    pub const OID: Oid = 26;
    pub const TID: Oid = 27;
    pub const JSON: Oid = 114;
    pub const POINT: Oid = 600;
    pub const FLOAT4: Oid = 700;
    pub const FLOAT8: Oid = 701;
    pub const UNKNOWN: Oid = 705;
    pub const BPCHAR: Oid = 1042;
    pub const VARCHAR: Oid = 1043;
    pub const DATE: Oid = 1082;
    pub const TIME: Oid = 1083;
    pub const TIMESTAMP: Oid = 1114;
    pub const TIMESTAMPTZ: Oid = 1184;
    pub const INTERVAL: Oid = 1186;
    pub const TIMETZ: Oid = 1266;
    pub const NUMERIC: Oid = 1700;
    pub const RECORD: Oid = 2249;
    pub const UUID: Oid = 2950;
    pub const JSONB: Oid = 3802;
    pub const INT4RANGE: Oid = 3904;
    pub const NUMRANGE: Oid = 3906;
    pub const TSRANGE: Oid = 3908;
    pub const TSTZRANGE: Oid = 3910;
    pub const DATERANGE: Oid = 3912;
    pub const INT8RANGE: Oid = 3926;
    pub const INT4MULTIRANGE: Oid = 4451;
    pub const INT8MULTIRANGE: Oid = 4536;
    pub const INT4_ARRAY: Oid = 1007;
    pub const TEXT_ARRAY: Oid = 1009;

    /// Every oid below this one is assigned by `initdb` and stable across databases.
    pub const FIRST_NORMAL: Oid = 10000;
}

macro_rules! oid {
    ($ty:ty, $oid:expr $(, $doc:literal)? ) => {
        impl PgType for $ty {
            $(#[doc = $doc])?
            const OID: Oid = $oid;
        }
    };
}

oid!(bool, oid::BOOL);
oid!(i64, oid::INT8, "`int8` ~18 digit integer, 8-byte storage");
oid!(i16, oid::INT2, "`int2` -32 thousand to 32 thousand, 2-byte storage");
oid!(i32, oid::INT4, "`int4` -2 billion to 2 billion integer, 4-byte storage");
oid!(str, oid::TEXT, "`text` variable-length string, no limit specified");
oid!(String, oid::TEXT, "`text` variable-length string, no limit specified");
oid!(f32, oid::FLOAT4, "`float4` single-precision floating point number, 4-byte storage");
oid!(f64, oid::FLOAT8, "`float8` double-precision floating point number, 8-byte storage");
oid!(Numeric, oid::NUMERIC, "`numeric` arbitrary precision number");
oid!(bytes::Bytes, oid::BYTEA, "`bytea` variable-length string, binary values escaped");
oid!(Date, oid::DATE, "`date` calendar date");
oid!(Time, oid::TIME, "`time` time of day");
oid!(PrimitiveDateTime, oid::TIMESTAMP, "`timestamp` date and time");
oid!(OffsetDateTime, oid::TIMESTAMPTZ, "`timestamptz` date and time with timezone");
oid!(Interval, oid::INTERVAL, "`interval` time span");
oid!(Point, oid::POINT, "`point` geometric point");
oid!(Tid, oid::TID, "`tid` tuple physical location");
oid!(serde_json::Value, oid::JSONB, "`jsonb` binary JSON");
