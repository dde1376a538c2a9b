//! Connection string parsing.
//!
//! A DSN looks like `mysql-on-sqlite:path=:memory:;dbname=wp`. Parsing is
//! total: malformed segments are skipped, and missing keys are reported by
//! [`Connection::connect`](crate::Connection::connect), not here.

use indexmap::IndexMap;

/// Driver prefix accepted by [`Connection::connect`](crate::Connection::connect).
pub const DRIVER_PREFIX: &str = "mysql-on-sqlite";

/// Characters skipped before a key: space, `\t`, `\n`, `\r`, `\v` and `\f`.
const KEY_WHITESPACE: [char; 6] = [' ', '\t', '\n', '\r', '\x0B', '\x0C'];

/// Key/value pairs parsed from a DSN, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionParams {
    params: IndexMap<String, String>,
}

impl ConnectionParams {
    /// Look up a raw parameter.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Storage location; `:memory:` selects an in-memory database.
    pub fn path(&self) -> Option<&str> {
        self.get("path")
    }

    /// Logical database name reported by `DATABASE()`.
    pub fn dbname(&self) -> Option<&str> {
        self.get("dbname")
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Iterate over `(key, value)` pairs in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Cut a DSN at its first NUL byte; nothing after it is ever seen.
pub fn truncate_at_nul(dsn: &str) -> &str {
    match dsn.find('\0') {
        Some(end) => &dsn[..end],
        None => dsn,
    }
}

/// Split `prefix:rest` at the first colon.
pub fn split_prefix(dsn: &str) -> Option<(&str, &str)> {
    truncate_at_nul(dsn).split_once(':')
}

/// Parse the part of a DSN after the driver prefix.
///
/// Segments are separated by `;` and split at their first `=`. Later
/// duplicates overwrite earlier values. Inside a `dbname` value a doubled
/// `;;` stands for one literal semicolon, so `dbname=w;;p` yields `w;p`.
pub fn parse(body: &str) -> ConnectionParams {
    let text = truncate_at_nul(body);
    let segments: Vec<&str> = text.split(';').collect();
    let mut params = IndexMap::new();

    let mut i = 0;
    while i < segments.len() {
        let segment = segments[i];
        i += 1;

        let Some((raw_key, raw_value)) = segment.split_once('=') else {
            continue;
        };
        let key = raw_key.trim_start_matches(KEY_WHITESPACE);
        let mut value = raw_value.to_string();

        if key == "dbname" {
            // an empty segment followed by another one is an escaped ';'
            while i + 1 < segments.len() && segments[i].is_empty() {
                value.push(';');
                value.push_str(segments[i + 1]);
                i += 2;
            }
        }

        params.insert(key.to_string(), value);
    }

    ConnectionParams { params }
}
