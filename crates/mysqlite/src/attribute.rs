//! Connection attributes and per-connection mutable state.

use crate::config::{CompatLevel, ConnectOptions};
use crate::fetch::{FetchMode, FetchStyle, ShapeContext};
use crate::object::ClassRegistry;
use crate::transaction::TransactionTracker;
use mysqlite_core::{Error, Result};
use std::fmt;

/// Driver name reported through [`Attribute::DriverName`].
pub const DRIVER_NAME: &str = "mysql";

/// How engine failures are reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorMode {
    /// Record the error and return a failure value
    Silent,
    /// Record, log at warn level and return a failure value
    Warning,
    /// Return the error
    Exception,
}

impl ErrorMode {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(ErrorMode::Silent),
            1 => Some(ErrorMode::Warning),
            2 => Some(ErrorMode::Exception),
            _ => None,
        }
    }

    pub fn code(self) -> i64 {
        match self {
            ErrorMode::Silent => 0,
            ErrorMode::Warning => 1,
            ErrorMode::Exception => 2,
        }
    }
}

/// Connection attributes, with their numeric codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    ErrorMode,
    ServerVersion,
    ClientVersion,
    DriverName,
    StringifyFetches,
    DefaultFetchMode,
    /// Any code this driver does not know
    Other(i64),
}

impl Attribute {
    pub fn from_code(code: i64) -> Self {
        match code {
            3 => Attribute::ErrorMode,
            4 => Attribute::ServerVersion,
            5 => Attribute::ClientVersion,
            16 => Attribute::DriverName,
            17 => Attribute::StringifyFetches,
            19 => Attribute::DefaultFetchMode,
            other => Attribute::Other(other),
        }
    }

    pub fn code(self) -> i64 {
        match self {
            Attribute::ErrorMode => 3,
            Attribute::ServerVersion => 4,
            Attribute::ClientVersion => 5,
            Attribute::DriverName => 16,
            Attribute::StringifyFetches => 17,
            Attribute::DefaultFetchMode => 19,
            Attribute::Other(code) => code,
        }
    }

    pub fn is_read_only(self) -> bool {
        matches!(
            self,
            Attribute::ServerVersion | Attribute::ClientVersion | Attribute::DriverName
        )
    }
}

/// A value read from or written to an attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Int(i64),
    Bool(bool),
    Str(String),
    ErrorMode(ErrorMode),
    FetchMode(FetchMode),
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        AttributeValue::Int(v)
    }
}

impl From<bool> for AttributeValue {
    fn from(v: bool) -> Self {
        AttributeValue::Bool(v)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        AttributeValue::Str(v.to_string())
    }
}

impl From<ErrorMode> for AttributeValue {
    fn from(v: ErrorMode) -> Self {
        AttributeValue::ErrorMode(v)
    }
}

impl From<FetchMode> for AttributeValue {
    fn from(v: FetchMode) -> Self {
        AttributeValue::FetchMode(v)
    }
}

/// SQLSTATE, driver code and message of the most recent engine failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub sqlstate: String,
    pub code: Option<i64>,
    pub message: Option<String>,
}

impl Default for ErrorInfo {
    fn default() -> Self {
        Self {
            sqlstate: "00000".to_string(),
            code: None,
            message: None,
        }
    }
}

impl ErrorInfo {
    pub fn from_error(err: &Error) -> Self {
        match err {
            Error::Query(q) => Self {
                sqlstate: q.sqlstate.clone(),
                code: q.code.map(i64::from),
                message: Some(q.message.clone()),
            },
            Error::Connection(c) => Self {
                sqlstate: "HY000".to_string(),
                code: c.code.map(i64::from),
                message: Some(c.message.clone()),
            },
            other => Self {
                sqlstate: "HY000".to_string(),
                code: None,
                message: Some(other.to_string()),
            },
        }
    }

    pub fn is_ok(&self) -> bool {
        self.sqlstate == "00000"
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}", self.sqlstate)?;
        if let Some(code) = self.code {
            write!(f, ", {}", code)?;
        }
        if let Some(message) = &self.message {
            write!(f, ", {}", message)?;
        }
        f.write_str("]")
    }
}

/// Apply the error mode to the outcome of an engine call.
///
/// Success clears `slot`. Engine failures are recorded in `slot`, then either
/// returned (EXCEPTION) or turned into `Ok(None)`, with a warn-level log line
/// under WARNING. Argument, type and state errors are returned as they are.
pub(crate) fn route<T>(
    mode: ErrorMode,
    method: &str,
    result: Result<T>,
    slot: &mut ErrorInfo,
) -> Result<Option<T>> {
    match result {
        Ok(value) => {
            *slot = ErrorInfo::default();
            Ok(Some(value))
        }
        Err(err) if err.is_engine_error() => {
            *slot = ErrorInfo::from_error(&err);
            match mode {
                ErrorMode::Exception => Err(err),
                ErrorMode::Warning => {
                    tracing::warn!(method, sqlstate = %slot.sqlstate, "{}: {}", method, err);
                    Ok(None)
                }
                ErrorMode::Silent => Ok(None),
            }
        }
        Err(err) => Err(err),
    }
}

/// Mutable state owned by one connection.
#[derive(Debug)]
pub struct ConnectionState {
    compat: CompatLevel,
    error_mode: ErrorMode,
    default_fetch_mode: FetchMode,
    stringify_fetches: bool,
    classes: ClassRegistry,
    last_error: ErrorInfo,
    pub(crate) transaction: TransactionTracker,
}

impl ConnectionState {
    pub fn new(options: &ConnectOptions) -> Self {
        Self {
            compat: options.compat,
            error_mode: options.effective_error_mode(),
            default_fetch_mode: options.default_fetch_mode.clone(),
            stringify_fetches: options.stringify_fetches,
            classes: options.classes.clone(),
            last_error: ErrorInfo::default(),
            transaction: TransactionTracker::new(),
        }
    }

    pub fn compat(&self) -> CompatLevel {
        self.compat
    }

    pub fn error_mode(&self) -> ErrorMode {
        self.error_mode
    }

    pub fn default_fetch_mode(&self) -> &FetchMode {
        &self.default_fetch_mode
    }

    pub fn stringify_fetches(&self) -> bool {
        self.stringify_fetches
    }

    pub fn classes(&self) -> &ClassRegistry {
        &self.classes
    }

    pub fn last_error(&self) -> &ErrorInfo {
        &self.last_error
    }

    pub fn in_transaction(&self) -> bool {
        self.transaction.is_active()
    }

    /// Settings for shaping rows as of right now.
    pub fn shape_context(&self) -> ShapeContext<'_> {
        ShapeContext {
            stringify: self.stringify_fetches,
            compat: self.compat,
            classes: &self.classes,
        }
    }

    /// Set an attribute; `false` when it is read-only or the value does not fit.
    pub fn set(&mut self, attr: Attribute, value: AttributeValue) -> bool {
        let applied = match (attr, value) {
            (Attribute::ErrorMode, AttributeValue::ErrorMode(mode)) => {
                self.error_mode = mode;
                true
            }
            (Attribute::ErrorMode, AttributeValue::Int(code)) => match ErrorMode::from_code(code) {
                Some(mode) => {
                    self.error_mode = mode;
                    true
                }
                None => false,
            },
            (
                Attribute::DefaultFetchMode,
                AttributeValue::FetchMode(FetchMode::Class { ref class, .. }),
            ) if !self.classes.contains(class) => false,
            (Attribute::DefaultFetchMode, AttributeValue::FetchMode(mode)) => {
                self.default_fetch_mode = mode;
                true
            }
            (Attribute::DefaultFetchMode, AttributeValue::Int(code)) => {
                match FetchStyle::from_code(code).and_then(FetchMode::from_style) {
                    Some(mode) => {
                        self.default_fetch_mode = mode;
                        true
                    }
                    None => false,
                }
            }
            (Attribute::StringifyFetches, AttributeValue::Bool(flag)) => {
                self.stringify_fetches = flag;
                true
            }
            (Attribute::StringifyFetches, AttributeValue::Int(flag)) => {
                self.stringify_fetches = flag != 0;
                true
            }
            _ => false,
        };

        if applied {
            tracing::debug!(attribute = attr.code(), "attribute set");
        } else {
            tracing::warn!(
                attribute = attr.code(),
                read_only = attr.is_read_only(),
                "attribute not set"
            );
        }
        applied
    }

    /// Read an attribute; `None` for codes this driver does not know.
    pub fn get(&self, attr: Attribute) -> Option<AttributeValue> {
        match attr {
            Attribute::ErrorMode => Some(AttributeValue::ErrorMode(self.error_mode)),
            Attribute::DefaultFetchMode => {
                Some(AttributeValue::FetchMode(self.default_fetch_mode.clone()))
            }
            Attribute::StringifyFetches => Some(AttributeValue::Bool(self.stringify_fetches)),
            Attribute::DriverName => Some(AttributeValue::from(DRIVER_NAME)),
            Attribute::ServerVersion | Attribute::ClientVersion => {
                Some(AttributeValue::from(mysqlite_sqlite::sqlite_version()))
            }
            Attribute::Other(_) => None,
        }
    }

    /// Route an engine outcome through the error mode, recording failures as
    /// this connection's last error.
    pub(crate) fn dispatch<T>(&mut self, method: &str, result: Result<T>) -> Result<Option<T>> {
        route(self.error_mode, method, result, &mut self.last_error)
    }
}
