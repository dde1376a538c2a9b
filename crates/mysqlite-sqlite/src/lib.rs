//! SQLite engine binding for mysqlite.
//!
//! This crate owns the embedded engine: it opens handles, runs SQL into
//! [`mysqlite_core::ResultSet`]s, registers scalar functions and exposes the
//! begin/commit/rollback primitives the emulation layer builds on.
//!
//! # Example
//!
//! ```rust
//! use mysqlite_sqlite::SqliteConnection;
//! use mysqlite_core::Value;
//!
//! let conn = SqliteConnection::open_memory().unwrap();
//! conn.execute_raw("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)").unwrap();
//! let inserted = conn
//!     .run("INSERT INTO users (name) VALUES (?)", &[Value::from("Alice")])
//!     .unwrap();
//! assert_eq!(inserted.changes, 1);
//! ```
//!
//! # Type Mapping
//!
//! | SQLite storage class | `Value` |
//! |----------------------|---------|
//! | INTEGER | `Int` |
//! | REAL | `Float` |
//! | TEXT | `Text` |
//! | BLOB | `Text` (lossy UTF-8) |
//! | NULL | `Null` |
//!
//! # Thread Safety
//!
//! `SqliteConnection` holds a raw engine handle and is neither `Send` nor
//! `Sync`. Handles are opened with `SQLITE_OPEN_NOMUTEX`.

// FFI calls into the engine
#![allow(unsafe_code)]

// The bundled engine is linked through this crate
use libsqlite3_sys as _;

pub mod connection;
pub mod ffi;
pub mod types;

pub use connection::{OpenFlags, SqliteConfig, SqliteConnection, sqlstate_for_code};

/// Re-export the SQLite library version.
pub fn sqlite_version() -> &'static str {
    ffi::version()
}

/// Re-export the SQLite library version number.
pub fn sqlite_version_number() -> i32 {
    ffi::version_number()
}
