//! `pgcore` error types.
use std::{backtrace::Backtrace, borrow::Cow, fmt};

use crate::{
    common::unit_error,
    postgres::{DatabaseError, Oid, ServerErrorKind},
    record::DecodeError,
    types::{ParseError, ShapeError},
    value::ValueKind,
};

/// A specialized [`Result`] type for `pgcore` operation.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// All possible error from `pgcore` library.
pub struct Error {
    context: String,
    backtrace: Backtrace,
    kind: ErrorKind,
}

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn into_kind(self) -> ErrorKind {
        self.kind
    }

    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }

    /// Prefix the error message with `context`.
    pub fn context(mut self, context: impl fmt::Display) -> Self {
        self.context = if self.context.is_empty() {
            context.to_string()
        } else {
            format!("{context}: {}", self.context)
        };
        self
    }

    /// Category of the server error, if this is one.
    pub fn server_kind(&self) -> Option<ServerErrorKind> {
        match &self.kind {
            ErrorKind::Database(e) => Some(e.kind()),
            _ => None,
        }
    }
}

/// All possible error kind from `pgcore` library.
pub enum ErrorKind {
    Parse(ParseError),
    Shape(ShapeError),
    UnknownType(UnknownType),
    ConnectionRequired(ConnectionRequired),
    AmbiguousType(AmbiguousType),
    TransactionUsage(TransactionUsage),
    Closed(ConnectionClosed),
    Database(DatabaseError),
    Cache(CacheError),
    Json(serde_json::Error),
    Decode(DecodeError),
}

macro_rules! from {
    (<$ty:ty>$pat:pat => $body:expr) => {
        impl From<$ty> for Error {
            fn from($pat: $ty) -> Self {
                let backtrace = std::backtrace::Backtrace::capture();
                Self { context: String::new(), backtrace, kind: $body }
            }
        }
    };
}

from!(<ErrorKind>e => e);
from!(<ParseError>e => ErrorKind::Parse(e));
from!(<ShapeError>e => ErrorKind::Shape(e));
from!(<UnknownType>e => ErrorKind::UnknownType(e));
from!(<ConnectionRequired>e => ErrorKind::ConnectionRequired(e));
from!(<AmbiguousType>e => ErrorKind::AmbiguousType(e));
from!(<TransactionUsage>e => ErrorKind::TransactionUsage(e));
from!(<ConnectionClosed>e => ErrorKind::Closed(e));
from!(<DatabaseError>e => ErrorKind::Database(e));
from!(<CacheError>e => ErrorKind::Cache(e));
from!(<serde_json::Error>e => ErrorKind::Json(e));
from!(<DecodeError>e => ErrorKind::Decode(e));

impl std::error::Error for Error { }

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.context.is_empty() {
            write!(f, "{}: ", self.context)?;
        }

        fmt::Display::fmt(&self.kind, f)?;

        if let std::backtrace::BacktraceStatus::Captured = self.backtrace.status() {
            let mut backtrace = self.backtrace.to_string();
            write!(f, "\n\n")?;
            writeln!(f, "Stack backtrace:")?;
            backtrace.truncate(backtrace.trim_end().len());
            write!(f, "{}", backtrace)?;
        }

        Ok(())
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

impl std::error::Error for ErrorKind { }

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(e) => e.fmt(f),
            Self::Shape(e) => e.fmt(f),
            Self::UnknownType(e) => e.fmt(f),
            Self::ConnectionRequired(e) => e.fmt(f),
            Self::AmbiguousType(e) => e.fmt(f),
            Self::TransactionUsage(e) => e.fmt(f),
            Self::Closed(e) => e.fmt(f),
            Self::Database(e) => e.fmt(f),
            Self::Cache(e) => e.fmt(f),
            Self::Json(e) => e.fmt(f),
            Self::Decode(e) => e.fmt(f),
        }
    }
}

impl fmt::Debug for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

// ===== Leaf errors =====

/// Type name or oid could not be resolved to a converter.
#[derive(Clone, PartialEq, Eq)]
pub struct UnknownType {
    what: Cow<'static, str>,
}

impl UnknownType {
    pub fn name(name: impl fmt::Display) -> Self {
        Self { what: format!("type `{name}` does not exist").into() }
    }

    pub fn oid(oid: Oid) -> Self {
        Self { what: format!("type with oid {oid} does not exist").into() }
    }

    pub fn not_composite(name: impl fmt::Display) -> Self {
        Self { what: format!("type `{name}` is not a composite type").into() }
    }

    /// Array types are composed from their element type, never registered.
    pub fn array_registration(name: impl fmt::Display) -> Self {
        Self { what: format!("cannot register array type `{name}`, register its element type").into() }
    }

    /// Type exists, but it is a base type without registered converter.
    pub fn unsupported(name: impl fmt::Display) -> Self {
        Self { what: format!("no converter registered for base type `{name}`").into() }
    }
}

impl std::error::Error for UnknownType { }

impl fmt::Display for UnknownType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.what)
    }
}

impl fmt::Debug for UnknownType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

unit_error! {
    /// Type metadata lookup requires a live connection, and none is available.
    pub struct ConnectionRequired("type metadata lookup requires a live connection");
}

unit_error! {
    /// Operation on a connection after [`close`][crate::Connection::close].
    pub struct ConnectionClosed("connection is closed");
}

/// Postgres type of a value could not be inferred.
#[derive(Clone, PartialEq, Eq)]
pub struct AmbiguousType {
    kind: ValueKind,
    reason: &'static str,
}

impl AmbiguousType {
    pub(crate) fn new(kind: ValueKind, reason: &'static str) -> Self {
        Self { kind, reason }
    }

    pub fn value_kind(&self) -> ValueKind {
        self.kind
    }
}

impl std::error::Error for AmbiguousType { }

impl fmt::Display for AmbiguousType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot infer postgres type of {} value, {}", self.kind, self.reason)
    }
}

impl fmt::Debug for AmbiguousType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

/// Transaction control used where the atomic block forbids it.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum TransactionUsage {
    /// `begin`, `commit` or `rollback` called inside an atomic block.
    ManualControl,
    /// `on_commit` or `on_rollback` called outside an atomic block.
    OutsideAtomic,
    /// Statement issued after a nested block failed without a savepoint.
    RollbackPending,
    /// Outermost block completed, but a nested block forced a rollback.
    RolledBack,
}

impl std::error::Error for TransactionUsage { }

impl fmt::Display for TransactionUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ManualControl => "transaction is managed by an atomic block",
            Self::OutsideAtomic => "transaction callbacks require an atomic block",
            Self::RollbackPending => {
                "current transaction is marked for rollback, statements are refused until the atomic block ends"
            }
            Self::RolledBack => "transaction was rolled back because a nested block failed",
        })
    }
}

impl fmt::Debug for TransactionUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

/// Failure reported by a [`CacheStore`][crate::cache::CacheStore].
#[derive(Clone)]
pub struct CacheError {
    reason: String,
}

impl CacheError {
    pub fn new(reason: impl fmt::Display) -> Self {
        Self { reason: reason.to_string() }
    }
}

impl std::error::Error for CacheError { }

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cache error: {}", self.reason)
    }
}

impl fmt::Debug for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::postgres::SqlState;

    #[test]
    fn context_prefix() {
        let err = Error::from(UnknownType::oid(99999)).context("loading column `a`");
        assert!(err.to_string().starts_with("loading column `a`: type with oid 99999 does not exist"));
    }

    #[test]
    fn server_kind() {
        let err = Error::from(DatabaseError::new(SqlState::DEADLOCK_DETECTED, "deadlock detected"));
        assert_eq!(err.server_kind(), Some(ServerErrorKind::TransactionRollback));
        assert_eq!(Error::from(ConnectionRequired).server_kind(), None);
    }
}
