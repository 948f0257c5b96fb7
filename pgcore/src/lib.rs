//! Postgres text format types and nested transactions.
//!
//! `pgcore` sits on top of a [`Client`] that speaks the simple text protocol.
//! It converts postgres text values to and from [`Value`], resolves converters
//! for every type of the database, and coordinates nested atomic blocks with
//! savepoints.
//!
//! # Examples
//!
//! Converters:
//!
//! ```
//! use pgcore::{Value, registry::TypeRegistry, types::Converter};
//!
//! # fn app() -> pgcore::Result<()> {
//! let mut registry = TypeRegistry::new();
//! let ints = registry.resolve("integer[]", None)?;
//!
//! assert_eq!(ints.parse("{1,2,3}")?, Value::Array(vec![1.into(), 2.into(), 3.into()]));
//! assert_eq!(ints.format(&Value::Array(vec![4.into(), Value::Null]))?, r#"{"4",NULL}"#);
//! # Ok(())
//! # }
//! # app().unwrap();
//! ```
//!
//! Nested transaction:
//!
//! ```no_run
//! # fn app(client: impl pgcore::Client) -> pgcore::Result<()> {
//! use pgcore::{Connection, Value};
//!
//! let mut conn = Connection::new(client);
//!
//! conn.atomic(true, |conn| {
//!     conn.execute("INSERT INTO account(id) VALUES($1)", &[Value::Int(1)])?;
//!
//!     // failure only rolls back to the savepoint
//!     let _ = conn.atomic(true, |conn| {
//!         conn.execute("INSERT INTO account(id) VALUES($1)", &[Value::Int(1)])?;
//!         Ok::<_, pgcore::Error>(())
//!     });
//!
//!     Ok::<_, pgcore::Error>(())
//! })?;
//! # Ok(())
//! # }
//! ```
mod common;
mod statement;

// Values
pub mod value;
pub mod record;

// Conversion
pub mod types;
pub mod postgres;
pub mod catalog;
pub mod registry;
pub mod cache;

// Operation
pub mod client;
pub mod transaction;
pub mod connection;

mod error;

#[cfg(test)]
mod testing;

pub use value::{Value, ValueKind};
pub use record::{DecodeError, FromRecord, FromValue, IntoRecord, Record};
pub use client::Client;
pub use connection::{Config, Connection};
pub use error::{
    AmbiguousType, CacheError, ConnectionClosed, ConnectionRequired, Error, ErrorKind, Result, TransactionUsage,
    UnknownType,
};

#[cfg(feature = "macros")]
pub use pgcore_macros::{FromRecord, IntoRecord};
