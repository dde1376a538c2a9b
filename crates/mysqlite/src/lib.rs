//! MySQL-API database access on top of an embedded SQLite engine.
//!
//! `mysqlite` reproduces the observable behavior of the reference MySQL-API
//! driver (DSN handling, fetch modes, attribute flags, transaction verbs and
//! error reporting) while every statement runs on SQLite. SQL is passed to the
//! engine as written; no dialect translation takes place.
//!
//! # Quick start
//!
//! ```
//! use mysqlite::{Connection, FetchMode};
//!
//! let conn = Connection::connect("mysql-on-sqlite:path=:memory:;dbname=app").unwrap();
//! conn.exec("CREATE TABLE t (id INTEGER, name TEXT)").unwrap();
//! assert_eq!(conn.exec("INSERT INTO t VALUES (1, 'a'), (2, 'b')").unwrap(), Some(2));
//!
//! let mut stmt = conn.query_as("SELECT id, name FROM t", FetchMode::Assoc).unwrap().unwrap();
//! let first = stmt.fetch(None).unwrap().unwrap();
//! assert_eq!(first.get("name"), Some("a".into()));
//! ```
//!
//! # Compatibility levels
//!
//! Three generations of the reference driver are emulated, selected with
//! [`ConnectOptions::compat`]. They differ in BOTH-row layout, native typing
//! of fetched values, handling of an explicit null fetch mode and the default
//! error mode. See [`CompatLevel`].
//!
//! # Errors
//!
//! Argument, state and class-lookup failures are always returned as `Err`.
//! Engine failures follow the connection's [`ErrorMode`]: returned, logged
//! through `tracing` and swallowed, or swallowed silently. In every mode the
//! failure is kept for [`Connection::error_info`].
//!
//! Connections and statements are single-threaded (`!Send`).

pub mod attribute;
pub mod config;
pub mod connection;
pub mod dsn;
pub mod fetch;
pub mod object;
pub mod statement;
pub mod transaction;
pub mod validate;

pub use attribute::{Attribute, AttributeValue, ErrorInfo, ErrorMode};
pub use config::{CompatLevel, ConnectOptions};
pub use connection::Connection;
pub use dsn::{ConnectionParams, DRIVER_PREFIX};
pub use fetch::{
    shape, ArrayKey, FetchMode, FetchStyle, NamedValue, ShapeContext, ShapedRow, FETCH_ASSOC,
    FETCH_BOTH, FETCH_CLASS, FETCH_INTO, FETCH_NAMED, FETCH_NUM, FETCH_OBJ, FETCH_PROPS_LATE,
};
pub use object::{ClassDef, ClassRegistry, Object, ObjectRef, STD_CLASS};
pub use statement::{ColumnMeta, Statement};
pub use transaction::{TransactionPrimitives, TransactionState, TransactionTracker};
pub use validate::{validate, Arg, CallSite};

pub use mysqlite_core::{Error, Result, Row, Value};
