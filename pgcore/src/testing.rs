//! In memory [`Client`] for tests.
use crate::{
    Result,
    client::{Client, Column, ResultSet, Session, TransactionStatus},
    postgres::{DatabaseError, SqlState},
};

/// Simulates transaction control over a single integer table.
///
/// `INSERT <n>` adds a row, `BEGIN`, `COMMIT`, `ROLLBACK`, and the savepoint
/// statements behave like the server does, including refusing statements in
/// a failed transaction. Any other statement answers with the rows given to
/// [`respond`][MockClient::respond], or nothing.
#[derive(Debug)]
pub(crate) struct MockClient {
    id: String,
    session: Session,
    committed: Vec<i64>,
    tx: Option<Vec<i64>>,
    savepoints: Vec<(String, Vec<i64>)>,
    failed: bool,
    log: Vec<String>,
    failing: Vec<String>,
    responses: Vec<(String, ResultSet)>,
    closed: usize,
}

impl MockClient {
    pub(crate) fn new() -> Self {
        Self {
            id: "mock-1".into(),
            session: Session::default(),
            committed: Vec::new(),
            tx: None,
            savepoints: Vec::new(),
            failed: false,
            log: Vec::new(),
            failing: Vec::new(),
            responses: Vec::new(),
            closed: 0,
        }
    }

    pub(crate) fn with_id(mut self, id: &str) -> Self {
        self.id = id.into();
        self
    }

    pub(crate) fn with_session(mut self, session: Session) -> Self {
        self.session = session;
        self
    }

    /// Answer `sql` with `rows`.
    pub(crate) fn respond(&mut self, sql: &str, rows: ResultSet) {
        self.responses.push((sql.into(), rows));
    }

    /// Fail every statement starting with `prefix`.
    pub(crate) fn fail(&mut self, prefix: &str) {
        self.failing.push(prefix.into());
    }

    pub(crate) fn heal(&mut self) {
        self.failing.clear();
    }

    /// Committed rows.
    pub(crate) fn rows(&self) -> &[i64] {
        &self.committed
    }

    pub(crate) fn log(&self) -> &[String] {
        &self.log
    }

    /// Statements executed since the last call.
    pub(crate) fn take_log(&mut self) -> Vec<String> {
        std::mem::take(&mut self.log)
    }

    pub(crate) fn count(&self, sql: &str) -> usize {
        self.log.iter().filter(|s| *s == sql).count()
    }

    pub(crate) fn closed(&self) -> usize {
        self.closed
    }

    fn error(code: SqlState, message: &str) -> crate::Error {
        DatabaseError::new(code, message).into()
    }

    fn savepoint(&self, name: &str) -> Result<usize> {
        self.savepoints
            .iter()
            .rposition(|(n, _)| n == name)
            .ok_or_else(|| Self::error(SqlState::INVALID_SAVEPOINT_SPECIFICATION, "savepoint does not exist"))
    }

    fn run(&mut self, sql: &str) -> Result<ResultSet> {
        self.log.push(sql.into());

        let ends_failure = sql == "ROLLBACK" || sql == "COMMIT" || sql.starts_with("ROLLBACK TO SAVEPOINT ");
        if self.failed && !ends_failure {
            return Err(Self::error(
                SqlState::IN_FAILED_SQL_TRANSACTION,
                "current transaction is aborted, commands ignored until end of transaction block",
            ));
        }

        let result = match self.failing.iter().any(|f| sql.starts_with(f.as_str())) {
            true => Err(Self::error(SqlState::SYNTAX_ERROR, "statement failed")),
            false => self.dispatch(sql),
        };
        if result.is_err() && self.tx.is_some() {
            self.failed = true;
        }
        result
    }

    fn dispatch(&mut self, sql: &str) -> Result<ResultSet> {
        if sql == "BEGIN" {
            self.tx = Some(self.committed.clone());
        } else if sql == "COMMIT" {
            // COMMIT of a failed transaction rolls back
            if let Some(rows) = self.tx.take().filter(|_| !self.failed) {
                self.committed = rows;
            }
            self.savepoints.clear();
            self.failed = false;
        } else if sql == "ROLLBACK" {
            self.tx = None;
            self.savepoints.clear();
            self.failed = false;
        } else if let Some(name) = sql.strip_prefix("ROLLBACK TO SAVEPOINT ") {
            let at = self.savepoint(name)?;
            self.tx = Some(self.savepoints[at].1.clone());
            self.savepoints.truncate(at + 1);
            self.failed = false;
        } else if let Some(name) = sql.strip_prefix("RELEASE SAVEPOINT ") {
            let at = self.savepoint(name)?;
            self.savepoints.truncate(at);
        } else if let Some(name) = sql.strip_prefix("SAVEPOINT ") {
            let Some(rows) = &self.tx else {
                return Err(Self::error(SqlState::new("25P01"), "SAVEPOINT can only be used in transaction blocks"));
            };
            self.savepoints.push((name.into(), rows.clone()));
        } else if let Some(n) = sql.strip_prefix("INSERT ") {
            let n = n.parse().map_err(|_| Self::error(SqlState::SYNTAX_ERROR, "bad insert"))?;
            match &mut self.tx {
                Some(rows) => rows.push(n),
                None => self.committed.push(n),
            }
        } else if let Some((_, rows)) = self.responses.iter().find(|(s, _)| s == sql) {
            return Ok(rows.clone());
        }
        Ok(ResultSet::default())
    }
}

impl Client for MockClient {
    fn execute(&mut self, sql: &str) -> Result<ResultSet> {
        self.run(sql)
    }

    fn execute_params(&mut self, sql: &str, params: &[Option<String>]) -> Result<ResultSet> {
        match (sql, params) {
            ("INSERT $1", [Some(n)]) => self.run(&format!("INSERT {n}")),
            _ => self.run(sql),
        }
    }

    fn connection_id(&self) -> &str {
        &self.id
    }

    fn session(&self) -> Session {
        self.session
    }

    fn transaction_status(&self) -> TransactionStatus {
        match (&self.tx, self.failed) {
            (None, _) => TransactionStatus::Idle,
            (Some(_), true) => TransactionStatus::Failed,
            (Some(_), false) => TransactionStatus::InTransaction,
        }
    }

    fn close(&mut self) {
        self.closed += 1;
    }
}

/// Result set from `|` separated lines, `\N` is NULL.
pub(crate) fn table(text: &str) -> ResultSet {
    let rows: Vec<Vec<Option<String>>> = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            line.split('|')
                .map(|col| (col != "\\N").then(|| col.to_owned()))
                .collect()
        })
        .collect();
    let width = rows.first().map_or(0, Vec::len);
    let columns = (0..width).map(|i| Column::new(format!("c{i}"), 25)).collect();
    ResultSet::new(columns, rows)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn savepoints() {
        let mut mock = MockClient::new();
        mock.execute("INSERT 1").unwrap();
        mock.execute("BEGIN").unwrap();
        mock.execute("INSERT 2").unwrap();
        mock.execute("SAVEPOINT a").unwrap();
        mock.execute("INSERT 3").unwrap();
        mock.execute("ROLLBACK TO SAVEPOINT a").unwrap();
        mock.execute("RELEASE SAVEPOINT a").unwrap();
        assert!(mock.execute("RELEASE SAVEPOINT a").is_err());
        assert_eq!(mock.transaction_status(), TransactionStatus::Failed);
        mock.execute("ROLLBACK").unwrap();
        assert_eq!(mock.rows(), &[1]);

        mock.execute("BEGIN").unwrap();
        mock.execute("INSERT 2").unwrap();
        mock.execute("COMMIT").unwrap();
        assert_eq!(mock.rows(), &[1, 2]);
    }

    #[test]
    fn table_rows() {
        let set = table("1|a\n2|\\N");
        assert_eq!(set.rows[1], vec![Some("2".to_owned()), None]);
        assert_eq!(set.columns.len(), 2);
        assert!(table("").is_empty());
    }
}
