//! The database handle.

use crate::attribute::{Attribute, AttributeValue, ConnectionState, ErrorInfo};
use crate::config::ConnectOptions;
use crate::dsn::{self, ConnectionParams, DRIVER_PREFIX};
use crate::fetch::{FetchMode, FetchStyle};
use crate::statement::Statement;
use crate::validate::{validate, Arg, CallSite};
use mysqlite_core::{ConnectionError, ConnectionErrorKind, Error, QueryError, Result};
use mysqlite_sqlite::{OpenFlags, SqliteConfig, SqliteConnection};
use std::cell::RefCell;
use std::rc::Rc;

/// State shared between a connection and the statements it created.
///
/// The engine handle closes when the last owner is dropped.
pub(crate) struct Shared {
    pub(crate) engine: SqliteConnection,
    pub(crate) state: RefCell<ConnectionState>,
}

impl Drop for Shared {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if state.in_transaction() {
            tracing::warn!(path = %self.engine.path(), "rolling back unfinished transaction");
            if let Err(e) = state.transaction.rollback(&self.engine) {
                tracing::warn!(error = %e, "rollback on close failed");
            }
        }
    }
}

/// A MySQL-API connection backed by an embedded SQLite database.
///
/// ```
/// use mysqlite::Connection;
///
/// let conn = Connection::connect("mysql-on-sqlite:path=:memory:;dbname=wp").unwrap();
/// let mut stmt = conn.query("SELECT DATABASE()").unwrap().unwrap();
/// let row = stmt.fetch(None).unwrap().unwrap();
/// assert_eq!(row.get(0), Some("wp".into()));
/// ```
pub struct Connection {
    shared: Rc<Shared>,
    params: ConnectionParams,
}

impl Connection {
    /// Connect with default options.
    pub fn connect(dsn: &str) -> Result<Self> {
        Self::connect_with(dsn, ConnectOptions::default())
    }

    /// Connect to the database a `mysql-on-sqlite:` DSN describes.
    ///
    /// Connection failures are always returned as errors, whatever error
    /// mode the options select.
    pub fn connect_with(dsn: &str, options: ConnectOptions) -> Result<Self> {
        let (prefix, body) = dsn::split_prefix(dsn)
            .ok_or_else(|| connect_error(ConnectionErrorKind::Driver, "could not find driver"))?;
        if prefix != DRIVER_PREFIX {
            return Err(connect_error(ConnectionErrorKind::Driver, "could not find driver"));
        }

        let params = dsn::parse(body);
        let path = params
            .path()
            .ok_or_else(|| missing_key("path"))?
            .to_string();
        let dbname = params
            .dbname()
            .ok_or_else(|| missing_key("dbname"))?
            .to_string();

        let flags = if options.read_only {
            OpenFlags::read_only()
        } else {
            OpenFlags::create_read_write()
        };
        let config = SqliteConfig::file(path)
            .flags(flags)
            .busy_timeout(options.busy_timeout_ms);
        let engine = SqliteConnection::open(&config)?;
        engine.register_text_function("DATABASE", &dbname)?;

        tracing::debug!(
            path = %config.path,
            dbname = %dbname,
            compat = ?options.compat,
            "connected"
        );

        Ok(Self {
            shared: Rc::new(Shared {
                engine,
                state: RefCell::new(ConnectionState::new(&options)),
            }),
            params,
        })
    }

    /// The parameters parsed from the DSN.
    pub fn params(&self) -> &ConnectionParams {
        &self.params
    }

    /// Set an attribute; `false` when it is read-only or the value does not fit.
    pub fn set_attribute(&self, attr: Attribute, value: impl Into<AttributeValue>) -> bool {
        self.shared.state.borrow_mut().set(attr, value.into())
    }

    pub fn get_attribute(&self, attr: Attribute) -> Option<AttributeValue> {
        self.shared.state.borrow().get(attr)
    }

    /// Run SQL and return the number of rows it changed.
    pub fn exec(&self, sql: &str) -> Result<Option<u64>> {
        tracing::trace!(sql, "exec");
        let result = self.shared.engine.run(sql, &[]).map(|set| set.changes);
        self.shared.state.borrow_mut().dispatch("PDO::exec()", result)
    }

    /// Run a query; rows are fetched with the connection's default mode.
    pub fn query(&self, sql: &str) -> Result<Option<Statement>> {
        self.run_query(sql, None)
    }

    /// Run a query whose rows are fetched with `mode` unless a fetch names another.
    pub fn query_as(&self, sql: &str, mode: FetchMode) -> Result<Option<Statement>> {
        self.run_query(sql, Some(mode))
    }

    /// Run a query with a fetch mode given in its dynamic form.
    ///
    /// `mode` and `args` are validated before the engine sees the SQL. A
    /// `None` mode selects the default fetch mode and skips validation, so
    /// any trailing arguments are ignored. Before compat level V81 a `None`
    /// mode is an engine-style error instead.
    pub fn query_with(
        &self,
        sql: &str,
        mode: Option<FetchStyle>,
        args: &[Arg],
    ) -> Result<Option<Statement>> {
        let validated = {
            let mut state = self.shared.state.borrow_mut();
            if mode.is_none() && !state.compat().accepts_null_mode() {
                let rejected: Result<()> = Err(QueryError::general("mode must be an integer").into());
                return state.dispatch("PDO::query()", rejected).map(|_| None);
            }
            validate(CallSite::QUERY, mode, args, state.classes())?
        };
        self.run_query(sql, validated)
    }

    fn run_query(&self, sql: &str, mode: Option<FetchMode>) -> Result<Option<Statement>> {
        tracing::trace!(sql, "query");
        let result = self.shared.engine.run(sql, &[]);
        let Some(set) = self.shared.state.borrow_mut().dispatch("PDO::query()", result)? else {
            return Ok(None);
        };
        let mut stmt = Statement::new(Rc::clone(&self.shared), sql, mode);
        stmt.load(set);
        Ok(Some(stmt))
    }

    /// Compile `sql` for later execution with [`Statement::execute`].
    pub fn prepare(&self, sql: &str) -> Result<Option<Statement>> {
        tracing::trace!(sql, "prepare");
        let result = self.shared.engine.check(sql);
        let checked = self.shared.state.borrow_mut().dispatch("PDO::prepare()", result)?;
        Ok(checked.map(|()| Statement::new(Rc::clone(&self.shared), sql, None)))
    }

    pub fn begin_transaction(&self) -> Result<bool> {
        let mut state = self.shared.state.borrow_mut();
        let result = state.transaction.begin(&self.shared.engine);
        let done = state.dispatch("PDO::beginTransaction()", result)?;
        Ok(done.is_some())
    }

    pub fn commit(&self) -> Result<bool> {
        let mut state = self.shared.state.borrow_mut();
        let result = state.transaction.commit(&self.shared.engine);
        let done = state.dispatch("PDO::commit()", result)?;
        Ok(done.is_some())
    }

    pub fn roll_back(&self) -> Result<bool> {
        let mut state = self.shared.state.borrow_mut();
        let result = state.transaction.rollback(&self.shared.engine);
        let done = state.dispatch("PDO::rollBack()", result)?;
        Ok(done.is_some())
    }

    pub fn in_transaction(&self) -> bool {
        self.shared.state.borrow().in_transaction()
    }

    /// Rowid of the most recent successful INSERT.
    pub fn last_insert_id(&self) -> i64 {
        self.shared.engine.last_insert_rowid()
    }

    /// SQLSTATE of the last operation on this handle; `"00000"` after success.
    pub fn error_code(&self) -> String {
        self.shared.state.borrow().last_error().sqlstate.clone()
    }

    pub fn error_info(&self) -> ErrorInfo {
        self.shared.state.borrow().last_error().clone()
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("params", &self.params)
            .field("state", &self.shared.state.borrow())
            .finish()
    }
}

fn connect_error(kind: ConnectionErrorKind, message: &str) -> Error {
    Error::Connection(ConnectionError {
        kind,
        code: None,
        message: message.to_string(),
        source: None,
    })
}

fn missing_key(key: &str) -> Error {
    connect_error(
        ConnectionErrorKind::Dsn,
        &format!("The \"{}\" option is required in the DSN", key),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::ErrorMode;
    use crate::config::CompatLevel;

    const DSN: &str = "mysql-on-sqlite:path=:memory:;dbname=wp;";

    #[test]
    fn test_unknown_driver() {
        for dsn in ["sqlite::memory:", "mysql:host=localhost", "no prefix here"] {
            let err = Connection::connect(dsn).unwrap_err();
            assert_eq!(err.to_string(), "could not find driver");
        }
    }

    #[test]
    fn test_missing_keys() {
        let err = Connection::connect("mysql-on-sqlite:dbname=wp").unwrap_err();
        assert_eq!(err.to_string(), "The \"path\" option is required in the DSN");
        let err = Connection::connect("mysql-on-sqlite:path=:memory:").unwrap_err();
        assert_eq!(err.to_string(), "The \"dbname\" option is required in the DSN");
    }

    #[test]
    fn test_connect_fails_for_missing_directory() {
        let err = Connection::connect("mysql-on-sqlite:path=/nonexistent/dir/x.db;dbname=wp")
            .unwrap_err();
        assert!(matches!(err, Error::Connection(ref c) if c.kind == ConnectionErrorKind::Open));
        assert!(err.to_string().starts_with("SQLSTATE[HY000] [14]"));
    }

    #[test]
    fn test_query_runs_before_fetch() {
        let conn = Connection::connect(DSN).unwrap();
        conn.exec("CREATE TABLE t (id INT)").unwrap();
        let mut stmt = conn.query("INSERT INTO t VALUES (1)").unwrap().unwrap();
        assert_eq!(stmt.row_count(), 1);
        assert_eq!(stmt.column_count(), 0);
        assert!(stmt.fetch(None).unwrap().is_none());
    }

    #[test]
    fn test_null_mode_rejected_before_v81() {
        let options = ConnectOptions::new()
            .compat(CompatLevel::V80)
            .error_mode(ErrorMode::Silent);
        let conn = Connection::connect_with(DSN, options).unwrap();
        let result = conn
            .query_with("SELECT 1", None, &[Arg::Int(1), Arg::Int(2)])
            .unwrap();
        assert!(result.is_none());
        let info = conn.error_info();
        assert_eq!(info.sqlstate, "HY000");
        assert_eq!(info.code, None);
        assert_eq!(info.message.as_deref(), Some("mode must be an integer"));
    }

    #[test]
    fn test_shared_state_outlives_connection() {
        let conn = Connection::connect(DSN).unwrap();
        let mut stmt = conn.query("SELECT 1 AS one").unwrap().unwrap();
        drop(conn);
        let row = stmt.fetch(Some(FetchMode::Assoc)).unwrap().unwrap();
        assert_eq!(row.get("one"), Some("1".into()));
    }
}
