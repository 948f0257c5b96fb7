//! The [`Client`] trait.
use std::fmt;

use crate::{Result, postgres::Oid};

/// A synchronous postgres connection that speaks the simple text protocol.
///
/// Socket io, authentication and row materialization are left to the
/// implementor. Every parameter handed to [`execute_params`][1] is already
/// serialized to its postgres text form.
///
/// Implementor should return server errors as [`DatabaseError`][2] so callers
/// can match on [`ServerErrorKind`][3].
///
/// [1]: Client::execute_params
/// [2]: crate::postgres::DatabaseError
/// [3]: crate::postgres::ServerErrorKind
pub trait Client {
    /// Execute statement without parameters.
    fn execute(&mut self, sql: &str) -> Result<ResultSet>;

    /// Execute statement with text parameters, [`None`] is sent as NULL.
    fn execute_params(&mut self, sql: &str, params: &[Option<String>]) -> Result<ResultSet>;

    /// Identity of the physical connection.
    ///
    /// Stable for the lifetime of one connection, used as cache key prefix.
    fn connection_id(&self) -> &str;

    /// Negotiated session settings.
    fn session(&self) -> Session;

    /// Transaction state as reported by the last `ReadyForQuery`.
    fn transaction_status(&self) -> TransactionStatus;

    /// Release the physical connection, called once by [`Connection::close`][1].
    ///
    /// [1]: crate::Connection::close
    fn close(&mut self) { }
}

impl<C> Client for &mut C where C: Client + ?Sized {
    fn execute(&mut self, sql: &str) -> Result<ResultSet> {
        C::execute(self, sql)
    }

    fn execute_params(&mut self, sql: &str, params: &[Option<String>]) -> Result<ResultSet> {
        C::execute_params(self, sql, params)
    }

    fn connection_id(&self) -> &str {
        C::connection_id(self)
    }

    fn session(&self) -> Session {
        C::session(self)
    }

    fn transaction_status(&self) -> TransactionStatus {
        C::transaction_status(self)
    }

    fn close(&mut self) {
        C::close(self);
    }
}

/// Rows of a statement, every value in text format.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl ResultSet {
    pub fn new(columns: Vec<Column>, rows: Vec<Vec<Option<String>>>) -> Self {
        Self { columns, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of column with given name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }
}

/// Column description of a [`ResultSet`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub type_oid: Oid,
    /// `0` when the column is not a table column.
    pub table_oid: Oid,
}

impl Column {
    pub fn new(name: impl Into<String>, type_oid: Oid) -> Self {
        Self { name: name.into(), type_oid, table_oid: 0 }
    }
}

/// Transaction state of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Not in a transaction block.
    Idle,
    /// In a transaction block.
    InTransaction,
    /// In a failed transaction block, queries are rejected until block is ended.
    Failed,
}

/// Session settings converters adapt to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    pub date_style: DateStyle,
    /// `server_version_num`, e.g. `160002`.
    pub server_version: u32,
}

impl Default for Session {
    fn default() -> Self {
        Self { date_style: DateStyle::default(), server_version: 160000 }
    }
}

/// `DateStyle` output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DateFormat {
    #[default]
    Iso,
    Sql,
    Postgres,
    German,
}

/// `DateStyle` field order, for the formats where it is ambiguous.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DateOrder {
    #[default]
    Mdy,
    Dmy,
    Ymd,
}

/// The `DateStyle` parameter, e.g. `ISO, MDY`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateStyle {
    pub format: DateFormat,
    pub order: DateOrder,
}

impl DateStyle {
    /// Parse the value of `DateStyle` as reported by `ParameterStatus`.
    ///
    /// Unknown words are ignored, like the server does for the missing half.
    pub fn parse(value: &str) -> DateStyle {
        let mut style = DateStyle::default();
        for word in value.split(',').map(str::trim) {
            match word.to_ascii_uppercase().as_str() {
                "ISO" => style.format = DateFormat::Iso,
                "SQL" => style.format = DateFormat::Sql,
                "POSTGRES" => style.format = DateFormat::Postgres,
                "GERMAN" => {
                    style.format = DateFormat::German;
                    style.order = DateOrder::Dmy;
                }
                "MDY" | "US" | "NONEURO" | "NONEUROPEAN" => style.order = DateOrder::Mdy,
                "DMY" | "EURO" | "EUROPEAN" => style.order = DateOrder::Dmy,
                "YMD" => style.order = DateOrder::Ymd,
                _ => {}
            }
        }
        style
    }
}

impl fmt::Display for DateStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let format = match self.format {
            DateFormat::Iso => "ISO",
            DateFormat::Sql => "SQL",
            DateFormat::Postgres => "Postgres",
            DateFormat::German => "German",
        };
        let order = match self.order {
            DateOrder::Mdy => "MDY",
            DateOrder::Dmy => "DMY",
            DateOrder::Ymd => "YMD",
        };
        write!(f, "{format}, {order}")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_date_style() {
        let style = DateStyle::parse("SQL, DMY");
        assert_eq!(style.format, DateFormat::Sql);
        assert_eq!(style.order, DateOrder::Dmy);
        assert_eq!(DateStyle::parse("iso").to_string(), "ISO, MDY");
        assert_eq!(DateStyle::parse("German").order, DateOrder::Dmy);
    }
}
