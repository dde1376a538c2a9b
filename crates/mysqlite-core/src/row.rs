//! Raw result rows and the result sets that carry them.

use crate::Result;
use crate::error::{Error, TypeError};
use crate::value::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Column metadata shared across all rows in a result set.
///
/// Wrapped in `Arc` so every row of one statement shares a single copy.
#[derive(Debug, Clone, Default)]
pub struct ColumnInfo {
    /// Column names in order, duplicates allowed
    names: Vec<String>,
    /// Declared column types as reported by the engine
    decl_types: Vec<Option<String>>,
    /// Name -> index of the last column carrying that name
    name_to_index: HashMap<String, usize>,
}

impl ColumnInfo {
    /// Create new column info from a list of column names.
    pub fn new(names: Vec<String>) -> Self {
        let decl_types = vec![None; names.len()];
        Self::with_decl_types(names, decl_types)
    }

    /// Create column info carrying the declared type of each column.
    ///
    /// Missing trailing declared types are treated as unknown.
    pub fn with_decl_types(names: Vec<String>, mut decl_types: Vec<Option<String>>) -> Self {
        decl_types.resize(names.len(), None);
        let name_to_index = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        Self {
            names,
            decl_types,
            name_to_index,
        }
    }

    /// Get the number of columns.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Check if there are no columns.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Index of the last column with this name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    /// Get the name of a column by index.
    pub fn name_at(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    /// Declared type of a column, `None` for expressions and unknown columns.
    pub fn decl_type_at(&self, index: usize) -> Option<&str> {
        self.decl_types.get(index).and_then(Option::as_deref)
    }

    /// Check if a column exists.
    pub fn contains(&self, name: &str) -> bool {
        self.name_to_index.contains_key(name)
    }

    /// Get all column names.
    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// A single row returned by the engine, before any fetch-mode shaping.
#[derive(Debug, Clone)]
pub struct Row {
    values: Vec<Value>,
    columns: Arc<ColumnInfo>,
}

impl Row {
    /// Create a new row with its own column metadata.
    ///
    /// For multiple rows from the same result set, prefer `with_columns`.
    pub fn new(column_names: Vec<String>, values: Vec<Value>) -> Self {
        let columns = Arc::new(ColumnInfo::new(column_names));
        Self { values, columns }
    }

    /// Create a new row with shared column metadata.
    pub fn with_columns(columns: Arc<ColumnInfo>, values: Vec<Value>) -> Self {
        Self { values, columns }
    }

    /// Get the shared column metadata.
    pub fn column_info(&self) -> Arc<ColumnInfo> {
        Arc::clone(&self.columns)
    }

    /// Get the number of columns in this row.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if this row is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Get a value by column index.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Get a value by column name; with duplicate names the last column wins.
    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        self.columns.index_of(name).and_then(|i| self.values.get(i))
    }

    /// Get a typed value by column index.
    pub fn get_as<T: FromValue>(&self, index: usize) -> Result<T> {
        let value = self.get(index).ok_or_else(|| {
            Error::Type(TypeError::new(
                None,
                format!(
                    "column index {} out of bounds (row has {} columns)",
                    index,
                    self.len()
                ),
            ))
        })?;
        T::from_value(value)
    }

    /// Get a typed value by column name.
    pub fn get_named<T: FromValue>(&self, name: &str) -> Result<T> {
        let value = self.get_by_name(name).ok_or_else(|| {
            Error::Type(TypeError::new(None, format!("column '{}' not found", name)))
        })?;
        T::from_value(value)
    }

    /// Get all column names.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.names().iter().map(String::as_str)
    }

    /// Iterate over all values.
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.values.iter()
    }

    /// Consume the row, returning its values in column order.
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Iterate over (column_name, value) pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .names()
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}

/// Everything one statement execution produced.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    pub columns: Arc<ColumnInfo>,
    pub rows: Vec<Row>,
    /// Rows inserted, updated or deleted; 0 for queries and DDL
    pub changes: u64,
}

impl ResultSet {
    /// Number of columns, known even when no rows came back.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
}

/// Trait for converting from a `Value` to a typed value.
pub trait FromValue: Sized {
    /// Convert from a Value, returning an error if the conversion fails.
    fn from_value(value: &Value) -> Result<Self>;
}

fn mismatch(expected: &str, value: &Value) -> Error {
    Error::Type(TypeError::new(
        None,
        format!("expected {}, found {}", expected, value.type_name()),
    ))
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self> {
        value.as_bool().ok_or_else(|| mismatch("bool", value))
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self> {
        value.as_i64().ok_or_else(|| mismatch("int", value))
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self> {
        value.as_f64().ok_or_else(|| mismatch("float", value))
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self> {
        value.to_text().ok_or_else(|| mismatch("string", value))
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self> {
        Ok(value.clone())
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_value(value).map(Some)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Row {
        Row::new(
            vec!["id".into(), "name".into(), "id".into()],
            vec![Value::Int(1), Value::from("alice"), Value::Int(9)],
        )
    }

    #[test]
    fn test_duplicate_names_resolve_to_last() {
        let row = sample();
        assert_eq!(row.get_by_name("id"), Some(&Value::Int(9)));
        assert_eq!(row.column_info().index_of("id"), Some(2));
        assert_eq!(row.len(), 3);
    }

    #[test]
    fn test_typed_access() {
        let row = sample();
        assert_eq!(row.get_as::<i64>(0).unwrap(), 1);
        assert_eq!(row.get_named::<String>("name").unwrap(), "alice");
        assert!(row.get_as::<i64>(5).is_err());
        assert!(row.get_named::<i64>("missing").is_err());
    }

    #[test]
    fn test_option_from_null() {
        let row = Row::new(vec!["x".into()], vec![Value::Null]);
        assert_eq!(row.get_as::<Option<i64>>(0).unwrap(), None);
    }

    #[test]
    fn test_iter_pairs_in_order() {
        let row = sample();
        let names: Vec<&str> = row.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["id", "name", "id"]);
    }

    #[test]
    fn test_decl_types() {
        let info = ColumnInfo::with_decl_types(
            vec!["a".into(), "b".into()],
            vec![Some("INTEGER".into())],
        );
        assert_eq!(info.decl_type_at(0), Some("INTEGER"));
        assert_eq!(info.decl_type_at(1), None);
        assert_eq!(info.decl_type_at(7), None);
    }
}
