//! Error types for mysqlite operations.
//!
//! Errors fall into two groups. Argument, type and state errors are detected
//! before the engine is contacted and always carry code 0. Connection and
//! query errors come from the engine and carry its code and message verbatim.

use std::fmt;

/// The primary error type for all mysqlite operations.
#[derive(Debug)]
pub enum Error {
    /// The engine could not be opened or the DSN was unusable
    Connection(ConnectionError),
    /// The engine reported a failure executing SQL
    Query(QueryError),
    /// Wrong number of fetch-mode arguments
    Arity(ArityError),
    /// Wrong type or shape of a fetch-mode argument or target
    Type(TypeError),
    /// A CLASS fetch named a class the registry does not know
    ClassNotFound(String),
    /// A transaction verb was called out of sequence
    State(StateError),
}

#[derive(Debug)]
pub struct ConnectionError {
    pub kind: ConnectionErrorKind,
    /// Engine result code, when the engine produced one
    pub code: Option<i32>,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionErrorKind {
    /// No driver is registered for the DSN prefix
    Driver,
    /// A required DSN key is missing
    Dsn,
    /// The engine refused to open the storage path
    Open,
    /// Post-open setup of the engine handle failed
    Setup,
}

#[derive(Debug)]
pub struct QueryError {
    pub kind: QueryErrorKind,
    pub sql: Option<String>,
    /// Five character SQLSTATE, "HY000" when nothing more specific applies
    pub sqlstate: String,
    /// Engine result code, absent for driver-level failures
    pub code: Option<i32>,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    /// Syntax error in SQL
    Syntax,
    /// Constraint violation (unique, foreign key, etc.)
    Constraint,
    /// Table or column not found
    NotFound,
    /// Permission denied
    Permission,
    /// Data too large for column
    DataTruncation,
    /// Database busy or locked
    Busy,
    /// Interrupted
    Cancelled,
    /// Other database error
    Database,
    /// Driver-level failure without an engine code
    General,
}

/// Which side of the allowed argument range a call fell outside of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArityBound {
    Exactly,
    AtLeast,
    AtMost,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArityError {
    /// Method as the reference driver names it, e.g. `PDO::query()`
    pub method: &'static str,
    pub bound: ArityBound,
    pub expected: usize,
    pub given: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeError {
    /// 1-based position of the offending argument, if one is to blame
    pub argument: Option<usize>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateError {
    pub message: String,
}

impl Error {
    /// Error code in the reference driver's numbering.
    ///
    /// Pre-engine failures report 0; engine failures report the engine code.
    pub fn code(&self) -> i64 {
        match self {
            Error::Connection(e) => e.code.map_or(0, i64::from),
            Error::Query(e) => e.code.map_or(0, i64::from),
            Error::Arity(_) | Error::Type(_) | Error::ClassNotFound(_) | Error::State(_) => 0,
        }
    }

    /// Get SQLSTATE if available.
    pub fn sqlstate(&self) -> Option<&str> {
        match self {
            Error::Query(q) => Some(q.sqlstate.as_str()),
            Error::Connection(c) if c.kind == ConnectionErrorKind::Open => Some("HY000"),
            _ => None,
        }
    }

    /// Get the SQL that caused this error, if available
    pub fn sql(&self) -> Option<&str> {
        match self {
            Error::Query(q) => q.sql.as_deref(),
            _ => None,
        }
    }

    /// Did this error arise while talking to the engine?
    ///
    /// Only these errors are subject to the connection's error mode; all
    /// others are raised before the engine is touched.
    pub fn is_engine_error(&self) -> bool {
        matches!(self, Error::Connection(_) | Error::Query(_))
    }
}

impl QueryError {
    /// A driver-level failure reported under SQLSTATE HY000 without an engine code.
    pub fn general(message: impl Into<String>) -> Self {
        Self {
            kind: QueryErrorKind::General,
            sql: None,
            sqlstate: "HY000".to_string(),
            code: None,
            message: message.into(),
        }
    }

    /// Is this a constraint violation?
    pub fn is_constraint_violation(&self) -> bool {
        self.sqlstate == "23000"
    }
}

impl StateError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl TypeError {
    pub fn new(argument: Option<usize>, message: impl Into<String>) -> Self {
        Self {
            argument,
            message: message.into(),
        }
    }
}

/// Human-readable class description for an SQLSTATE, as used in error text.
pub fn sqlstate_description(sqlstate: &str) -> &'static str {
    match sqlstate {
        "00000" => "No error",
        "01002" => "Disconnect error",
        "22001" => "String data, right truncated",
        "23000" => "Integrity constraint violation",
        "42000" => "Syntax error or access violation",
        "42S02" => "Base table or view not found",
        "HYC00" => "Optional feature not implemented",
        "HY000" => "General error",
        _ => "<<Unknown error>>",
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Connection(e) => write!(f, "{}", e),
            Error::Query(e) => write!(f, "{}", e),
            Error::Arity(e) => write!(f, "{}", e),
            Error::Type(e) => write!(f, "{}", e),
            Error::ClassNotFound(name) => write!(f, "Class \"{}\" not found", name),
            Error::State(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Connection(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            _ => None,
        }
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.kind, self.code) {
            (ConnectionErrorKind::Open, Some(code)) => {
                write!(f, "SQLSTATE[HY000] [{}] {}", code, self.message)
            }
            _ => write!(f, "{}", self.message),
        }
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let description = sqlstate_description(&self.sqlstate);
        match self.code {
            Some(code) => write!(
                f,
                "SQLSTATE[{}]: {}: {} {}",
                self.sqlstate, description, code, self.message
            ),
            None => write!(
                f,
                "SQLSTATE[{}]: {}: {}",
                self.sqlstate, description, self.message
            ),
        }
    }
}

impl fmt::Display for ArityBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ArityBound::Exactly => "exactly",
            ArityBound::AtLeast => "at least",
            ArityBound::AtMost => "at most",
        })
    }
}

impl fmt::Display for ArityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} expects {} {} arguments for the fetch mode provided, {} given",
            self.method, self.bound, self.expected, self.given
        )
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl From<ConnectionError> for Error {
    fn from(err: ConnectionError) -> Self {
        Error::Connection(err)
    }
}

impl From<QueryError> for Error {
    fn from(err: QueryError) -> Self {
        Error::Query(err)
    }
}

impl From<ArityError> for Error {
    fn from(err: ArityError) -> Self {
        Error::Arity(err)
    }
}

impl From<TypeError> for Error {
    fn from(err: TypeError) -> Self {
        Error::Type(err)
    }
}

impl From<StateError> for Error {
    fn from(err: StateError) -> Self {
        Error::State(err)
    }
}

/// Result type alias for mysqlite operations.
pub type Result<T> = std::result::Result<T, Error>;
