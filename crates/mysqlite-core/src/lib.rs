//! Core types for the mysqlite driver.
//!
//! This crate provides the data model shared by the engine binding and the
//! MySQL-API emulation layer:
//!
//! - `Value` for the scalar values an engine row can hold
//! - `Row` and `ColumnInfo` for one raw result row and its column metadata
//! - `ResultSet` for everything a single statement execution produced
//! - `Error` for the driver's error taxonomy

pub mod error;
pub mod row;
pub mod value;

pub use error::{
    ArityBound, ArityError, ConnectionError, ConnectionErrorKind, Error, QueryError,
    QueryErrorKind, Result, StateError, TypeError,
};
pub use row::{ColumnInfo, FromValue, ResultSet, Row};
pub use value::{Value, format_float};
