//! Server reported errors and their `SQLSTATE` classification.
use std::{borrow::Cow, fmt};

/// Five character standardized error code.
///
/// <https://www.postgresql.org/docs/current/errcodes-appendix.html>
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SqlState(Cow<'static, str>);

impl SqlState {
    pub const SUCCESSFUL_COMPLETION: SqlState = SqlState::from_static("00000");
    pub const CONNECTION_FAILURE: SqlState = SqlState::from_static("08006");
    pub const FEATURE_NOT_SUPPORTED: SqlState = SqlState::from_static("0A000");
    pub const INVALID_TEXT_REPRESENTATION: SqlState = SqlState::from_static("22P02");
    pub const UNIQUE_VIOLATION: SqlState = SqlState::from_static("23505");
    pub const IN_FAILED_SQL_TRANSACTION: SqlState = SqlState::from_static("25P02");
    pub const INVALID_SAVEPOINT_SPECIFICATION: SqlState = SqlState::from_static("3B001");
    pub const SERIALIZATION_FAILURE: SqlState = SqlState::from_static("40001");
    pub const DEADLOCK_DETECTED: SqlState = SqlState::from_static("40P01");
    pub const SYNTAX_ERROR: SqlState = SqlState::from_static("42601");
    pub const INSUFFICIENT_PRIVILEGE: SqlState = SqlState::from_static("42501");
    pub const UNDEFINED_OBJECT: SqlState = SqlState::from_static("42704");
    pub const INTERNAL_ERROR: SqlState = SqlState::from_static("XX000");

    pub const fn from_static(code: &'static str) -> SqlState {
        SqlState(Cow::Borrowed(code))
    }

    pub fn new(code: impl Into<String>) -> SqlState {
        SqlState(Cow::Owned(code.into()))
    }

    pub fn code(&self) -> &str {
        &self.0
    }

    /// First two characters, the error class.
    pub fn class(&self) -> &str {
        self.0.get(..2).unwrap_or(&self.0)
    }

    pub fn kind(&self) -> ServerErrorKind {
        use ServerErrorKind::*;

        match (self.class(), self.code()) {
            ("08", _) => ConnectionLost,
            ("23", _) => IntegrityViolation,
            ("22", _) => DataException,
            ("0A", _) => FeatureNotSupported,
            (_, "42501") | ("28", _) => InsufficientPrivilege,
            ("42" | "3D" | "3F" | "26" | "34", _) => Programming,
            ("40", _) => TransactionRollback,
            ("XX" | "P0", _) => Internal,
            _ => Operational,
        }
    }
}

impl fmt::Display for SqlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for SqlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SqlState").field(&self.code()).finish()
    }
}

/// Category of a server error, derived from its [`SqlState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerErrorKind {
    /// Class `08`.
    ConnectionLost,
    /// Class `23`.
    IntegrityViolation,
    /// Class `22`.
    DataException,
    /// Class `0A`.
    FeatureNotSupported,
    /// `42501` and class `28`.
    InsufficientPrivilege,
    /// Remaining class `42`, and `3D`, `3F`, `26`, `34`.
    Programming,
    /// Class `40`, serialization failure and deadlock included.
    TransactionRollback,
    /// Classes `XX` and `P0`.
    Internal,
    /// Anything else.
    Operational,
}

/// Error reported by the server.
#[derive(Clone)]
pub struct DatabaseError {
    code: SqlState,
    severity: Cow<'static, str>,
    message: String,
    detail: Option<String>,
    hint: Option<String>,
}

impl DatabaseError {
    pub fn new(code: SqlState, message: impl Into<String>) -> Self {
        Self {
            code,
            severity: Cow::Borrowed("ERROR"),
            message: message.into(),
            detail: None,
            hint: None,
        }
    }

    pub fn with_severity(mut self, severity: impl Into<Cow<'static, str>>) -> Self {
        self.severity = severity.into();
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn code(&self) -> &SqlState {
        &self.code
    }

    pub fn severity(&self) -> &str {
        &self.severity
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    pub fn kind(&self) -> ServerErrorKind {
        self.code.kind()
    }
}

impl std::error::Error for DatabaseError { }

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({})", self.severity, self.message, self.code)?;
        if let Some(detail) = &self.detail {
            write!(f, "\nDETAIL: {detail}")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, "\nHINT: {hint}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn classify() {
        use ServerErrorKind::*;

        let kind = |code: &str| SqlState::new(code).kind();
        assert_eq!(kind("08006"), ConnectionLost);
        assert_eq!(kind("23505"), IntegrityViolation);
        assert_eq!(kind("22P02"), DataException);
        assert_eq!(kind("0A000"), FeatureNotSupported);
        assert_eq!(kind("42501"), InsufficientPrivilege);
        assert_eq!(kind("28P01"), InsufficientPrivilege);
        assert_eq!(kind("42P01"), Programming);
        assert_eq!(kind("3D000"), Programming);
        assert_eq!(kind("40001"), TransactionRollback);
        assert_eq!(kind("40P01"), TransactionRollback);
        assert_eq!(kind("XX000"), Internal);
        assert_eq!(kind("P0001"), Internal);
        assert_eq!(kind("53300"), Operational);
    }

    #[test]
    fn display() {
        let err = DatabaseError::new(SqlState::UNIQUE_VIOLATION, "duplicate key")
            .with_detail("Key (id)=(1) already exists.");
        assert_eq!(err.to_string(), "ERROR: duplicate key (23505)\nDETAIL: Key (id)=(1) already exists.");
        assert_eq!(err.code().class(), "23");
    }
}
