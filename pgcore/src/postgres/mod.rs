//! Postgres facts shared by every module: oids and server errors.
mod pg_type;
mod sqlstate;

pub use pg_type::{Oid, PgType, oid};
pub use sqlstate::{DatabaseError, ServerErrorKind, SqlState};
