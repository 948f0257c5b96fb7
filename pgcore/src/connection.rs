//! The [`Connection`] type.
use std::{
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use crate::{
    Error, Result,
    cache::CacheStore,
    client::{Client, ResultSet},
    common::{debug, span},
    error::ConnectionClosed,
    record::{FromRecord, Record},
    registry::{TypeRegistry, TypeSpec},
    transaction::Atomic,
    types::{Converter, DynConverter, TextConverter},
    value::Value,
};

mod config;

pub use config::Config;

/// A [`Client`] with type conversion and atomic blocks.
///
/// # Example
///
/// ```no_run
/// # fn app(client: impl pgcore::client::Client) -> pgcore::Result<()> {
/// use pgcore::{Connection, Value};
///
/// let mut conn = Connection::new(client);
///
/// conn.atomic(true, |conn| {
///     conn.execute("INSERT INTO post(name) VALUES($1)", &[Value::from("foo")])?;
///     conn.on_commit(|| println!("post created"))?;
///     Ok::<_, pgcore::Error>(())
/// })?;
///
/// let posts = conn.query("SELECT id, name FROM post", &[])?;
/// # Ok(())
/// # }
/// ```
pub struct Connection<C: Client> {
    client: C,
    registry: TypeRegistry,
    atomic: Atomic,
    closed: bool,
}

impl<C: Client> Connection<C> {
    /// Create [`Connection`] with default configuration.
    pub fn new(client: C) -> Self {
        Self::with_config(client, Config::default())
    }

    /// Create [`Connection`] with configuration from environment.
    ///
    /// See [`Config::from_env`] for more details on env.
    pub fn new_env(client: C) -> Self {
        Self::with_config(client, Config::from_env())
    }

    pub fn with_config(client: C, config: Config) -> Self {
        Self {
            client,
            registry: TypeRegistry::with_config(&config),
            atomic: Atomic::new(&config.savepoint_prefix),
            closed: false,
        }
    }

    /// Persist type metadata to `cache`.
    pub fn with_cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.registry.catalog_mut().set_cache(Some(cache));
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn client_mut(&mut self) -> &mut C {
        &mut self.client
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut TypeRegistry {
        &mut self.registry
    }

    /// State of atomic blocks.
    pub fn transaction(&self) -> &Atomic {
        &self.atomic
    }

    pub fn in_atomic_block(&self) -> bool {
        self.atomic.in_block()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn check_open(&self) -> Result<()> {
        match self.closed {
            true => Err(ConnectionClosed.into()),
            false => Ok(()),
        }
    }

    // ===== Types =====

    /// Converter for `spec`, bound to this connection session.
    pub fn resolve(&mut self, spec: impl Into<TypeSpec>) -> Result<DynConverter> {
        self.check_open()?;
        self.registry.resolve(spec, Some(&mut self.client))
    }

    /// Serialize `value` as type `spec`.
    pub fn convert_param(&mut self, value: &Value, spec: impl Into<TypeSpec>) -> Result<Option<String>> {
        let converter = self.resolve(spec)?;
        Ok(converter.output(value)?)
    }

    /// Parse postgres text of type `spec`, [`None`] is NULL.
    pub fn convert_column(&mut self, text: Option<&str>, spec: impl Into<TypeSpec>) -> Result<Value> {
        let converter = self.resolve(spec)?;
        Ok(converter.input(text)?)
    }

    /// Swap the physical connection, returning the previous one.
    ///
    /// Types loaded from the previous database are dropped and loaded again,
    /// a failed reload is retried on the next lookup.
    pub fn set_client(&mut self, client: C) -> C {
        let previous = std::mem::replace(&mut self.client, client);
        if let Err(_err) = self.registry.connection_changed(&mut self.client) {
            debug!("type catalog reload after connection change failed: {_err}");
        }
        self.closed = false;
        previous
    }

    // ===== Statements =====

    /// Execute statement, parameters are serialized by their inferred type.
    pub fn execute(&mut self, sql: &str, params: &[Value]) -> Result<ResultSet> {
        self.check_open()?;
        self.atomic.check_usable()?;
        if params.is_empty() {
            return self.client.execute(sql);
        }

        let mut texts = Vec::with_capacity(params.len());
        for (i, param) in params.iter().enumerate() {
            let text = self
                .registry
                .resolve_for_value(param, Some(&mut self.client))
                .and_then(|conv| Ok(conv.output(param)?))
                .map_err(|e| e.context(format_args!("parameter ${}", i + 1)))?;
            texts.push(text);
        }
        self.client.execute_params(sql, &texts)
    }

    /// Execute statement and decode every row by column type.
    pub fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Record>> {
        let set = self.execute(sql, params)?;
        span!("decode", rows = set.rows.len());

        let mut converters = Vec::with_capacity(set.columns.len());
        for column in &set.columns {
            let converter = match column.type_oid {
                0 => Arc::new(TextConverter::default()) as DynConverter,
                oid => self
                    .registry
                    .resolve_oid(oid, Some(&mut self.client))
                    .map_err(|e| e.context(format_args!("column `{}`", column.name)))?,
            };
            converters.push(converter);
        }

        let mut records = Vec::with_capacity(set.rows.len());
        for row in &set.rows {
            let mut record = Record::with_capacity(converters.len());
            for ((column, converter), text) in set.columns.iter().zip(&converters).zip(row) {
                let value = converter
                    .input(text.as_deref())
                    .map_err(|e| Error::from(e).context(format_args!("column `{}`", column.name)))?;
                record.insert(column.name.clone(), value);
            }
            records.push(record);
        }
        Ok(records)
    }

    /// Execute statement and decode every row into `T`.
    pub fn query_as<T: FromRecord>(&mut self, sql: &str, params: &[Value]) -> Result<Vec<T>> {
        self.query(sql, params)?
            .into_iter()
            .map(|record| Ok(T::from_record(record)?))
            .collect()
    }

    // ===== Transaction =====

    /// Run `f` atomically.
    ///
    /// The outermost call begins a transaction, or adopts one that is already
    /// open, and commits when `f` succeeds. A nested call with `savepoint`
    /// runs inside a savepoint, so its failure only undoes its own work.
    /// Without `savepoint`, its failure rolls back the enclosing block.
    ///
    /// Error or panic of `f` is passed through after the rollback.
    pub fn atomic<T, E, F>(&mut self, savepoint: bool, f: F) -> Result<T, E>
    where
        E: From<Error>,
        F: FnOnce(&mut Self) -> Result<T, E>,
    {
        self.check_open()?;
        self.atomic.enter(&mut self.client, savepoint)?;

        let result = panic::catch_unwind(AssertUnwindSafe(|| f(&mut *self)));
        let failed = !matches!(result, Ok(Ok(_)));
        let exit = self.atomic.exit(&mut self.client, failed);
        if self.atomic.take_broken() {
            self.closed = true;
        }

        match result {
            Ok(Ok(value)) => {
                exit?;
                Ok(value)
            }
            Ok(Err(err)) => Err(err),
            Err(payload) => panic::resume_unwind(payload),
        }
    }

    /// Run `callback` after the outermost atomic block commits.
    ///
    /// Discarded if the transaction, or a savepoint active at registration,
    /// rolls back.
    pub fn on_commit(&mut self, callback: impl FnOnce() + Send + 'static) -> Result<()> {
        Ok(self.atomic.on_commit(Box::new(callback))?)
    }

    /// Run `callback` when the transaction, or a savepoint active at
    /// registration, rolls back.
    pub fn on_rollback(&mut self, callback: impl FnOnce() + Send + 'static) -> Result<()> {
        Ok(self.atomic.on_rollback(Box::new(callback))?)
    }

    /// Begin transaction manually, rejected inside an atomic block.
    pub fn begin(&mut self) -> Result<()> {
        self.check_open()?;
        self.atomic.check_manual()?;
        self.client.execute("BEGIN")?;
        Ok(())
    }

    /// Commit transaction manually, rejected inside an atomic block.
    pub fn commit(&mut self) -> Result<()> {
        self.check_open()?;
        self.atomic.check_manual()?;
        self.client.execute("COMMIT")?;
        self.atomic.committed();
        Ok(())
    }

    /// Roll back transaction manually, rejected inside an atomic block.
    pub fn rollback(&mut self) -> Result<()> {
        self.check_open()?;
        self.atomic.check_manual()?;
        self.client.execute("ROLLBACK")?;
        self.atomic.rolled_back();
        Ok(())
    }

    /// Close the connection.
    ///
    /// Pending rollback callbacks run, then the client is closed. Calling it
    /// again does nothing, it is also called on drop.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.atomic.close();
        self.client.close();
    }
}

impl<C: Client> Drop for Connection<C> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<C: Client + std::fmt::Debug> std::fmt::Debug for Connection<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("client", &self.client)
            .field("registry", &self.registry)
            .field("atomic", &self.atomic)
            .field("closed", &self.closed)
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        ErrorKind,
        client::Column,
        error::TransactionUsage,
        postgres::{DatabaseError, SqlState, oid},
        testing::MockClient,
    };
    use std::sync::Mutex;

    fn insert(conn: &mut Connection<MockClient>, n: i64) -> Result<()> {
        conn.execute("INSERT $1", &[Value::Int(n)])?;
        Ok(())
    }

    fn duplicate() -> Error {
        DatabaseError::new(SqlState::UNIQUE_VIOLATION, "duplicate key").into()
    }

    fn fired() -> (Arc<Mutex<Vec<&'static str>>>, impl Fn(&'static str) -> Box<dyn FnOnce() + Send>) {
        let fired = Arc::new(Mutex::new(Vec::new()));
        let f = fired.clone();
        (fired, move |tag: &'static str| -> Box<dyn FnOnce() + Send> {
            let f = f.clone();
            Box::new(move || f.lock().unwrap().push(tag))
        })
    }

    #[test]
    fn savepoint_failure_keeps_outer() {
        let (fired, hook) = fired();
        let mut conn = Connection::new(MockClient::new());

        let result: Result<()> = conn.atomic(true, |c| {
            insert(c, 1)?;
            let inner: Result<()> = c.atomic(true, |c| {
                insert(c, 2)?;
                c.on_commit(hook("inner commit"))?;
                c.on_rollback(hook("inner rollback"))?;
                Err(duplicate())
            });
            assert_eq!(inner.unwrap_err().server_kind(), Some(crate::postgres::ServerErrorKind::IntegrityViolation));
            c.on_commit(hook("outer commit"))?;
            Ok(())
        });
        result.unwrap();

        assert_eq!(conn.client().rows(), &[1]);
        assert_eq!(*fired.lock().unwrap(), ["inner rollback", "outer commit"]);
        assert!(!conn.in_atomic_block());
    }

    #[test]
    fn merged_failure_rolls_back_outer() {
        let mut conn = Connection::new(MockClient::new());
        let result: Result<()> = conn.atomic(true, |c| {
            insert(c, 1)?;
            let inner: Result<()> = c.atomic(false, |c| {
                insert(c, 2)?;
                Err(duplicate())
            });
            assert!(inner.is_err());

            let err = insert(c, 3).unwrap_err();
            assert!(matches!(err.kind(), ErrorKind::TransactionUsage(TransactionUsage::RollbackPending)));
            Ok(())
        });

        let err = result.unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::TransactionUsage(TransactionUsage::RolledBack)));
        assert!(conn.client().rows().is_empty());
        assert_eq!(conn.client().count("INSERT 3"), 0);
    }

    #[test]
    fn panic_rolls_back() {
        let mut conn = Connection::new(MockClient::new());
        let unwind = panic::catch_unwind(AssertUnwindSafe(|| {
            let _: Result<()> = conn.atomic(true, |c| {
                insert(c, 1)?;
                panic!("boom");
            });
        }));
        assert!(unwind.is_err());
        assert!(conn.client().rows().is_empty());
        assert!(!conn.in_atomic_block());
        assert_eq!(conn.client().log().last().map(String::as_str), Some("ROLLBACK"));
    }

    #[test]
    fn custom_error_type() {
        #[derive(Debug)]
        enum AppError {
            Db,
            Invalid,
        }
        impl From<Error> for AppError {
            fn from(_: Error) -> Self {
                AppError::Db
            }
        }

        let mut conn = Connection::new(MockClient::new());
        let result = conn.atomic(true, |c| {
            c.execute("INSERT $1", &[Value::Int(1)])?;
            Err::<(), _>(AppError::Invalid)
        });
        assert!(matches!(result, Err(AppError::Invalid)));
        assert!(conn.client().rows().is_empty());
    }

    #[test]
    fn manual_control_rejected_inside_block() {
        let mut conn = Connection::new(MockClient::new());
        let result: Result<()> = conn.atomic(true, |c| {
            for err in [c.begin(), c.commit(), c.rollback()] {
                assert!(matches!(err.unwrap_err().kind(), ErrorKind::TransactionUsage(TransactionUsage::ManualControl)));
            }
            Ok(())
        });
        result.unwrap();

        let err = conn.on_rollback(|| {}).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::TransactionUsage(TransactionUsage::OutsideAtomic)));

        conn.begin().unwrap();
        insert(&mut conn, 5).unwrap();
        conn.commit().unwrap();
        assert_eq!(conn.client().rows(), &[5]);
    }

    #[test]
    fn query_decodes_columns() {
        let mut mock = MockClient::new();
        mock.respond(
            "SELECT",
            ResultSet::new(
                vec![Column::new("id", oid::INT8), Column::new("tags", oid::TEXT_ARRAY), Column::new("raw", 0)],
                vec![
                    vec![Some("1".into()), Some("{a,b}".into()), Some("x".into())],
                    vec![Some("2".into()), None, None],
                ],
            ),
        );
        let mut conn = Connection::new(mock);

        let records = conn.query("SELECT", &[]).unwrap();
        assert_eq!(records[0].get("tags"), Some(&Value::Array(vec!["a".into(), "b".into()])));
        assert_eq!(records[1].get("tags"), Some(&Value::Null));

        let rows: Vec<(i64, Option<Vec<String>>, Option<String>)> = conn.query_as("SELECT", &[]).unwrap();
        assert_eq!(rows[0], (1, Some(vec!["a".into(), "b".into()]), Some("x".into())));
        assert_eq!(rows[1], (2, None, None));
    }

    #[test]
    fn bad_column_text_names_column() {
        let mut mock = MockClient::new();
        mock.respond(
            "SELECT",
            ResultSet::new(vec![Column::new("n", oid::INT4)], vec![vec![Some("x".into())]]),
        );
        let mut conn = Connection::new(mock);
        let err = conn.query("SELECT", &[]).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Parse(_)));
        assert!(err.to_string().starts_with("column `n`: "));
    }

    #[test]
    fn convert_by_spec() {
        let mut conn = Connection::new(MockClient::new());
        assert_eq!(conn.convert_param(&Value::Bool(true), "boolean").unwrap(), Some("t".into()));
        assert_eq!(conn.convert_param(&Value::Null, "int4").unwrap(), None);
        assert_eq!(conn.convert_column(Some("{1,2}"), "int[]").unwrap(), Value::Array(vec![1.into(), 2.into()]));
        assert!(conn.convert_param(&Value::Text("x".into()), "int4").is_err());
    }

    #[test]
    fn close_is_idempotent() {
        let (fired, hook) = fired();
        let mut conn = Connection::new(MockClient::new());
        let _: Result<()> = conn.atomic(true, |c| {
            c.on_rollback(hook("rollback"))?;
            c.close();
            Ok(())
        });
        assert_eq!(*fired.lock().unwrap(), ["rollback"]);
        assert!(conn.is_closed());
        conn.close();
        assert_eq!(conn.client().closed(), 1);

        let err = conn.execute("SELECT 1", &[]).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Closed(_)));
    }

    #[test]
    fn set_client_reloads_types() {
        let mut conn = Connection::new(MockClient::new());
        conn.resolve(oid::INT4).unwrap();
        let previous = conn.set_client(MockClient::new().with_id("mock-2"));
        assert_eq!(previous.connection_id(), "mock-1");
        assert_eq!(conn.client().connection_id(), "mock-2");
        assert!(!conn.is_closed());
    }
}
