//! SQLite connection implementation.
//!
//! Safe wrappers around the SQLite C API: opening a handle, running SQL into
//! a [`ResultSet`], scalar-function registration and transaction primitives.

// Allow casts in FFI code where we need to match C types exactly
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::borrow_as_ptr)]
#![allow(clippy::result_large_err)]

use crate::ffi;
use crate::types;
use mysqlite_core::{
    ColumnInfo, Error, ResultSet, Row, Value,
    error::{ConnectionError, ConnectionErrorKind, QueryError, QueryErrorKind},
};
use std::ffi::{CStr, CString, c_char, c_int, c_void};
use std::ptr;
use std::sync::Arc;

/// Configuration for opening SQLite connections.
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    /// Path to the database file, or ":memory:" for in-memory database.
    pub path: String,
    /// Open flags (read-only, read-write, create, etc.)
    pub flags: OpenFlags,
    /// Busy timeout in milliseconds.
    pub busy_timeout_ms: u32,
}

/// Flags controlling how the database is opened.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenFlags {
    /// Open for reading only.
    pub read_only: bool,
    /// Open for reading and writing.
    pub read_write: bool,
    /// Create the database if it doesn't exist.
    pub create: bool,
    /// Enable URI filename interpretation.
    pub uri: bool,
}

impl OpenFlags {
    /// Create flags for read-only access.
    pub fn read_only() -> Self {
        Self {
            read_only: true,
            ..Default::default()
        }
    }

    /// Create flags for read-write access (database must exist).
    pub fn read_write() -> Self {
        Self {
            read_write: true,
            ..Default::default()
        }
    }

    /// Create flags for read-write access with creation if needed.
    pub fn create_read_write() -> Self {
        Self {
            read_write: true,
            create: true,
            ..Default::default()
        }
    }

    fn to_sqlite_flags(self) -> c_int {
        // Handles never leave their owning thread
        let mut flags = ffi::SQLITE_OPEN_NOMUTEX;

        if self.read_only {
            flags |= ffi::SQLITE_OPEN_READONLY;
        }
        if self.read_write {
            flags |= ffi::SQLITE_OPEN_READWRITE;
        }
        if self.create {
            flags |= ffi::SQLITE_OPEN_CREATE;
        }
        if self.uri {
            flags |= ffi::SQLITE_OPEN_URI;
        }

        // Default to read-write if no mode specified
        if flags & (ffi::SQLITE_OPEN_READONLY | ffi::SQLITE_OPEN_READWRITE) == 0 {
            flags |= ffi::SQLITE_OPEN_READWRITE | ffi::SQLITE_OPEN_CREATE;
        }

        flags
    }
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: ":memory:".to_string(),
            flags: OpenFlags::create_read_write(),
            busy_timeout_ms: 5000,
        }
    }
}

impl SqliteConfig {
    /// Create a new config for a file-based database.
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Create a new config for an in-memory database.
    pub fn memory() -> Self {
        Self::default()
    }

    /// Set open flags.
    pub fn flags(mut self, flags: OpenFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Set busy timeout.
    pub fn busy_timeout(mut self, ms: u32) -> Self {
        self.busy_timeout_ms = ms;
        self
    }

    fn is_memory(&self) -> bool {
        self.path == ":memory:"
    }
}

/// A connection to a SQLite database.
///
/// The raw handle makes this type `!Send` and `!Sync`; a connection is owned
/// by one thread for its whole life. The handle is closed exactly once, on drop.
pub struct SqliteConnection {
    db: *mut ffi::sqlite3,
    path: String,
}

/// Finalizes a prepared statement when it goes out of scope.
struct StmtGuard(*mut ffi::sqlite3_stmt);

impl Drop for StmtGuard {
    fn drop(&mut self) {
        if !self.0.is_null() {
            // SAFETY: the pointer came from sqlite3_prepare_v2 and is finalized once
            unsafe {
                ffi::sqlite3_finalize(self.0);
            }
        }
    }
}

impl SqliteConnection {
    /// Open a new SQLite connection with the given configuration.
    pub fn open(config: &SqliteConfig) -> Result<Self, Error> {
        let c_path = CString::new(config.path.as_str()).map_err(|_| {
            Error::Connection(ConnectionError {
                kind: ConnectionErrorKind::Open,
                code: None,
                message: "Invalid path: contains null byte".to_string(),
                source: None,
            })
        })?;

        let mut flags = config.flags.to_sqlite_flags();
        if config.is_memory() {
            flags |= ffi::SQLITE_OPEN_MEMORY;
        }

        let mut db: *mut ffi::sqlite3 = ptr::null_mut();
        // SAFETY: We pass valid pointers and check the return value
        let rc = unsafe { ffi::sqlite3_open_v2(c_path.as_ptr(), &mut db, flags, ptr::null()) };

        if rc != ffi::SQLITE_OK {
            let msg = if db.is_null() {
                ffi::error_string(rc).to_string()
            } else {
                // SAFETY: db is a handle sqlite3_open_v2 allocated; it must be
                // closed even though opening failed
                unsafe {
                    let msg = errmsg(db);
                    ffi::sqlite3_close_v2(db);
                    msg
                }
            };
            tracing::debug!(path = %config.path, code = rc, error = %msg, "sqlite open failed");

            return Err(Error::Connection(ConnectionError {
                kind: ConnectionErrorKind::Open,
                code: Some(rc),
                message: msg,
                source: None,
            }));
        }

        // From here on Drop owns the handle
        let conn = Self {
            db,
            path: config.path.clone(),
        };

        if config.busy_timeout_ms > 0 {
            let ms = c_int::try_from(config.busy_timeout_ms).unwrap_or(c_int::MAX);
            // SAFETY: db is valid
            unsafe {
                ffi::sqlite3_busy_timeout(conn.db, ms);
            }
        }

        tracing::debug!(path = %conn.path, read_only = config.flags.read_only, "sqlite connection opened");
        Ok(conn)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, Error> {
        Self::open(&SqliteConfig::memory())
    }

    /// Open a file-based database.
    pub fn open_file(path: impl Into<String>) -> Result<Self, Error> {
        Self::open(&SqliteConfig::file(path))
    }

    /// Get the database path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Execute SQL directly without preparing (for DDL, etc.)
    pub fn execute_raw(&self, sql: &str) -> Result<(), Error> {
        tracing::trace!(sql, "execute_raw");
        let c_sql = c_string(sql)?;
        let mut errmsg_ptr: *mut c_char = ptr::null_mut();

        // SAFETY: All pointers are valid
        let rc = unsafe {
            ffi::sqlite3_exec(self.db, c_sql.as_ptr(), None, ptr::null_mut(), &mut errmsg_ptr)
        };

        if rc != ffi::SQLITE_OK {
            let msg = if errmsg_ptr.is_null() {
                ffi::error_string(rc).to_string()
            } else {
                // SAFETY: errmsg_ptr was allocated by sqlite3_exec
                unsafe {
                    let msg = CStr::from_ptr(errmsg_ptr).to_string_lossy().into_owned();
                    ffi::sqlite3_free(errmsg_ptr.cast());
                    msg
                }
            };
            return Err(query_error(rc, msg, sql));
        }

        Ok(())
    }

    /// Run every statement in `sql`, binding `params` to the first one.
    ///
    /// The returned set carries the columns and rows of the last statement
    /// that was executed. `changes` is 0 unless that statement inserted,
    /// updated or deleted rows.
    pub fn run(&self, sql: &str, params: &[Value]) -> Result<ResultSet, Error> {
        tracing::trace!(sql, params = params.len(), "run");
        let c_sql = c_string(sql)?;
        let bytes = c_sql.as_bytes();
        let mut offset = 0usize;
        let mut result = ResultSet::default();
        let mut first = true;

        while offset < bytes.len() {
            let (stmt, consumed) = self.prepare_at(&c_sql, offset, sql)?;
            offset += consumed;
            let Some(stmt) = stmt else {
                // Only whitespace or comments remained
                continue;
            };

            let bound = if first { params } else { &[] };
            first = false;
            result = self.step_all(&stmt, sql, bound)?;
        }

        Ok(result)
    }

    /// Compile every statement in `sql` without running any of them.
    pub fn check(&self, sql: &str) -> Result<(), Error> {
        tracing::trace!(sql, "check");
        let c_sql = c_string(sql)?;
        let len = c_sql.as_bytes().len();
        let mut offset = 0usize;
        while offset < len {
            let (_stmt, consumed) = self.prepare_at(&c_sql, offset, sql)?;
            offset += consumed;
        }
        Ok(())
    }

    /// Prepare the statement starting at byte `offset`, returning it (if any)
    /// together with the number of bytes it consumed.
    fn prepare_at(
        &self,
        c_sql: &CString,
        offset: usize,
        sql: &str,
    ) -> Result<(Option<StmtGuard>, usize), Error> {
        let rest = &c_sql.as_bytes()[offset..];
        let n_byte = c_int::try_from(rest.len())
            .map_err(|_| query_error(ffi::SQLITE_TOOBIG, "statement too long", sql))?;
        let mut stmt: *mut ffi::sqlite3_stmt = ptr::null_mut();
        let start: *const c_char = rest.as_ptr().cast();
        let mut tail: *const c_char = ptr::null();

        // SAFETY: start points into c_sql, which outlives this call
        let rc = unsafe { ffi::sqlite3_prepare_v2(self.db, start, n_byte, &mut stmt, &mut tail) };
        let guard = StmtGuard(stmt);
        if rc != ffi::SQLITE_OK {
            return Err(self.last_error(sql));
        }

        let consumed = if tail.is_null() {
            rest.len()
        } else {
            // SAFETY: tail points into the same buffer as start
            let diff = unsafe { tail.offset_from(start) };
            usize::try_from(diff).unwrap_or(rest.len()).max(1)
        };

        let stmt = if guard.0.is_null() { None } else { Some(guard) };
        Ok((stmt, consumed))
    }

    fn step_all(&self, stmt: &StmtGuard, sql: &str, params: &[Value]) -> Result<ResultSet, Error> {
        let raw = stmt.0;

        // SAFETY: raw is a live prepared statement for the whole function
        let expected = unsafe { ffi::sqlite3_bind_parameter_count(raw) };
        for (i, param) in params.iter().enumerate() {
            let index = c_int::try_from(i + 1).unwrap_or(c_int::MAX);
            if index > expected {
                return Err(query_error(
                    ffi::SQLITE_RANGE,
                    "column index out of range",
                    sql,
                ));
            }
            // SAFETY: index is within 1..=expected
            let rc = unsafe { types::bind_value(raw, index, param) };
            if rc != ffi::SQLITE_OK {
                return Err(self.last_error(sql));
            }
        }

        // SAFETY: raw is valid
        let col_count = unsafe { ffi::sqlite3_column_count(raw) };
        let mut names = Vec::with_capacity(col_count.max(0) as usize);
        let mut decl_types = Vec::with_capacity(names.capacity());
        for i in 0..col_count {
            // SAFETY: i is a valid column index
            let name = unsafe { types::column_name(raw, i) }.unwrap_or_default();
            // SAFETY: i is a valid column index
            let decl = unsafe { types::column_decltype(raw, i) };
            names.push(name);
            decl_types.push(decl);
        }
        let columns = Arc::new(ColumnInfo::with_decl_types(names, decl_types));

        let before = self.total_changes();
        let mut rows = Vec::new();
        loop {
            // SAFETY: raw is valid
            let rc = unsafe { ffi::sqlite3_step(raw) };
            match rc {
                ffi::SQLITE_ROW => {
                    let mut values = Vec::with_capacity(columns.len());
                    for i in 0..col_count {
                        // SAFETY: we just got SQLITE_ROW
                        values.push(unsafe { types::read_column(raw, i) });
                    }
                    rows.push(Row::with_columns(Arc::clone(&columns), values));
                }
                ffi::SQLITE_DONE => break,
                _ => return Err(self.last_error(sql)),
            }
        }

        let changes = if self.total_changes() == before {
            0
        } else {
            self.changes()
        };

        Ok(ResultSet {
            columns,
            rows,
            changes,
        })
    }

    /// Get the last insert rowid.
    pub fn last_insert_rowid(&self) -> i64 {
        // SAFETY: db is valid
        unsafe { ffi::sqlite3_last_insert_rowid(self.db) }
    }

    /// Get the number of rows changed by the most recent INSERT, UPDATE or DELETE.
    pub fn changes(&self) -> u64 {
        // SAFETY: db is valid
        let n = unsafe { ffi::sqlite3_changes(self.db) };
        u64::try_from(n).unwrap_or(0)
    }

    /// Get the number of rows changed since the connection was opened.
    pub fn total_changes(&self) -> u64 {
        // SAFETY: db is valid
        let n = unsafe { ffi::sqlite3_total_changes(self.db) };
        u64::try_from(n).unwrap_or(0)
    }

    /// Is the engine in autocommit mode (no transaction open)?
    pub fn is_autocommit(&self) -> bool {
        // SAFETY: db is valid
        unsafe { ffi::sqlite3_get_autocommit(self.db) != 0 }
    }

    /// Register a zero-argument SQL function that always returns `value`.
    ///
    /// Used to answer `DATABASE()` with the logical database name.
    pub fn register_text_function(&self, name: &str, value: &str) -> Result<(), Error> {
        let c_name = c_string(name)?;
        let data = Box::into_raw(Box::new(c_string(value)?));

        // SAFETY: ownership of `data` passes to SQLite, which calls
        // `drop_text` exactly once, also when registration fails
        let rc = unsafe {
            ffi::sqlite3_create_function_v2(
                self.db,
                c_name.as_ptr(),
                0,
                ffi::SQLITE_UTF8 | ffi::SQLITE_DETERMINISTIC,
                data.cast(),
                Some(text_function),
                None,
                None,
                Some(drop_text),
            )
        };

        if rc != ffi::SQLITE_OK {
            return Err(Error::Connection(ConnectionError {
                kind: ConnectionErrorKind::Setup,
                code: Some(rc),
                // SAFETY: db is valid
                message: unsafe { errmsg(self.db) },
                source: None,
            }));
        }
        tracing::debug!(function = name, "registered sql function");
        Ok(())
    }

    /// Begin a transaction.
    pub fn begin(&self) -> Result<(), Error> {
        self.execute_raw("BEGIN")?;
        tracing::debug!(path = %self.path, "BEGIN");
        Ok(())
    }

    /// Commit the current transaction.
    pub fn commit(&self) -> Result<(), Error> {
        self.execute_raw("COMMIT")?;
        tracing::debug!(path = %self.path, "COMMIT");
        Ok(())
    }

    /// Rollback the current transaction.
    pub fn rollback(&self) -> Result<(), Error> {
        self.execute_raw("ROLLBACK")?;
        tracing::debug!(path = %self.path, "ROLLBACK");
        Ok(())
    }

    fn last_error(&self, sql: &str) -> Error {
        // SAFETY: db is valid
        let (code, msg) = unsafe { (ffi::sqlite3_errcode(self.db), errmsg(self.db)) };
        query_error(code, msg, sql)
    }
}

impl Drop for SqliteConnection {
    fn drop(&mut self) {
        if !self.db.is_null() {
            // SAFETY: db is valid and closed only here
            unsafe {
                ffi::sqlite3_close_v2(self.db);
            }
            self.db = ptr::null_mut();
            tracing::debug!(path = %self.path, "sqlite connection closed");
        }
    }
}

unsafe extern "C" fn text_function(
    ctx: *mut ffi::sqlite3_context,
    _argc: c_int,
    _argv: *mut *mut ffi::sqlite3_value,
) {
    // SAFETY: user data is the CString registered alongside this function
    unsafe {
        let data = ffi::sqlite3_user_data(ctx).cast::<CString>();
        match data.as_ref() {
            Some(text) => {
                let bytes = text.as_bytes();
                let len = c_int::try_from(bytes.len()).unwrap_or(c_int::MAX);
                ffi::sqlite3_result_text(ctx, bytes.as_ptr().cast(), len, ffi::SQLITE_TRANSIENT);
            }
            None => ffi::sqlite3_result_null(ctx),
        }
    }
}

unsafe extern "C" fn drop_text(data: *mut c_void) {
    if !data.is_null() {
        // SAFETY: data came from Box::into_raw in register_text_function
        drop(unsafe { Box::from_raw(data.cast::<CString>()) });
    }
}

// Helper functions

unsafe fn errmsg(db: *mut ffi::sqlite3) -> String {
    // SAFETY: db is valid; errmsg returns a NUL-terminated string
    unsafe {
        let ptr = ffi::sqlite3_errmsg(db);
        if ptr.is_null() {
            return String::new();
        }
        CStr::from_ptr(ptr).to_string_lossy().into_owned()
    }
}

fn c_string(sql: &str) -> Result<CString, Error> {
    CString::new(sql).map_err(|_| {
        Error::Query(QueryError {
            kind: QueryErrorKind::Syntax,
            sql: Some(sql.to_string()),
            sqlstate: "HY000".to_string(),
            code: None,
            message: "SQL contains null byte".to_string(),
        })
    })
}

fn query_error(code: c_int, message: impl Into<String>, sql: &str) -> Error {
    Error::Query(QueryError {
        kind: error_code_to_kind(code),
        sql: Some(sql.to_string()),
        sqlstate: sqlstate_for_code(code).to_string(),
        code: Some(code),
        message: message.into(),
    })
}

fn error_code_to_kind(code: c_int) -> QueryErrorKind {
    match code & 0xff {
        ffi::SQLITE_CONSTRAINT => QueryErrorKind::Constraint,
        ffi::SQLITE_BUSY | ffi::SQLITE_LOCKED => QueryErrorKind::Busy,
        ffi::SQLITE_PERM | ffi::SQLITE_AUTH | ffi::SQLITE_READONLY => QueryErrorKind::Permission,
        ffi::SQLITE_NOTFOUND => QueryErrorKind::NotFound,
        ffi::SQLITE_TOOBIG => QueryErrorKind::DataTruncation,
        ffi::SQLITE_INTERRUPT => QueryErrorKind::Cancelled,
        _ => QueryErrorKind::Database,
    }
}

/// SQLSTATE reported for an engine result code.
pub fn sqlstate_for_code(code: c_int) -> &'static str {
    match code & 0xff {
        ffi::SQLITE_NOTFOUND => "42S02",
        ffi::SQLITE_INTERRUPT => "01002",
        ffi::SQLITE_NOLFS => "HYC00",
        ffi::SQLITE_TOOBIG => "22001",
        ffi::SQLITE_CONSTRAINT => "23000",
        _ => "HY000",
    }
}
