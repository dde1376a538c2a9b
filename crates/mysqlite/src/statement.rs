//! Executed and prepared statements.

use crate::attribute::{route, ErrorInfo};
use crate::connection::Shared;
use crate::fetch::{shape, FetchMode, FetchStyle, ShapeContext, ShapedRow};
use crate::validate::{validate, Arg, CallSite};
use mysqlite_core::{ColumnInfo, Result, ResultSet, Row, Value};
use std::rc::Rc;
use std::sync::Arc;

/// Name and declared type of one result column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMeta {
    pub index: usize,
    pub name: String,
    /// Declared type of the underlying table column, when there is one
    pub decl_type: Option<String>,
}

/// A statement bound to its connection, holding the rows of its last run.
///
/// Rows are buffered when the statement executes and handed out one by one by
/// [`fetch`](Self::fetch). Shaping happens at fetch time, so attribute
/// changes made after execution still apply.
pub struct Statement {
    shared: Rc<Shared>,
    sql: String,
    columns: Arc<ColumnInfo>,
    rows: Vec<Row>,
    cursor: usize,
    changes: u64,
    mode: Option<FetchMode>,
    error: ErrorInfo,
}

impl Statement {
    pub(crate) fn new(shared: Rc<Shared>, sql: &str, mode: Option<FetchMode>) -> Self {
        Self {
            shared,
            sql: sql.to_string(),
            columns: Arc::new(ColumnInfo::default()),
            rows: Vec::new(),
            cursor: 0,
            changes: 0,
            mode,
            error: ErrorInfo::default(),
        }
    }

    /// Take over the output of an engine run.
    pub(crate) fn load(&mut self, result: ResultSet) {
        let columns = Arc::new(display_columns(&result.columns));
        self.rows = result
            .rows
            .into_iter()
            .map(|row| Row::with_columns(Arc::clone(&columns), row.into_values()))
            .collect();
        self.columns = columns;
        self.cursor = 0;
        self.changes = result.changes;
    }

    /// Run the statement with positional `?` parameters.
    ///
    /// Returns `Ok(false)` when the engine fails and the error mode is not
    /// EXCEPTION; the failure is then available from [`error_info`](Self::error_info).
    pub fn execute(&mut self, params: &[Value]) -> Result<bool> {
        tracing::trace!(sql = %self.sql, params = params.len(), "execute");
        self.rows.clear();
        self.cursor = 0;
        self.changes = 0;

        let result = self.shared.engine.run(&self.sql, params);
        let mode = self.shared.state.borrow().error_mode();
        match route(mode, "PDOStatement::execute()", result, &mut self.error)? {
            Some(set) => {
                self.load(set);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Fetch the next row, or `None` once every row has been returned.
    ///
    /// Without an explicit mode the statement's own mode is used, falling back
    /// to the connection's current default.
    pub fn fetch(&mut self, mode: Option<FetchMode>) -> Result<Option<ShapedRow>> {
        let Some(row) = self.rows.get(self.cursor) else {
            return Ok(None);
        };

        // No borrow of the connection state may outlive this block: class
        // constructors are free to call back into the connection.
        let (mode, stringify, compat, classes) = {
            let state = self.shared.state.borrow();
            let mode = match mode.or_else(|| self.mode.clone()) {
                Some(mode) => mode,
                None => state.default_fetch_mode().clone(),
            };
            (mode, state.stringify_fetches(), state.compat(), state.classes().clone())
        };
        let ctx = ShapeContext {
            stringify,
            compat,
            classes: &classes,
        };

        // a row that fails to shape stays current
        let shaped = shape(row, &mode, &ctx)?;
        self.cursor += 1;
        Ok(Some(shaped))
    }

    /// Fetch every remaining row.
    pub fn fetch_all(&mut self, mode: Option<FetchMode>) -> Result<Vec<ShapedRow>> {
        let mut rows = Vec::with_capacity(self.rows.len().saturating_sub(self.cursor));
        while let Some(row) = self.fetch(mode.clone())? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// Advance one row and return a single column of it.
    ///
    /// Returns `None` when the rows are exhausted or the index is out of range;
    /// an out-of-range index does not advance.
    pub fn fetch_column(&mut self, index: usize) -> Option<Value> {
        let value = self.rows.get(self.cursor)?.get(index)?.clone();
        self.cursor += 1;

        let state = self.shared.state.borrow();
        if state.shape_context().effective_stringify() {
            Some(value.stringify())
        } else {
            Some(value)
        }
    }

    /// Set the mode used by fetches that do not name one.
    ///
    /// The trailing arguments are checked the same way `PDO::query()` checks
    /// them, with argument numbering starting at the mode itself.
    pub fn set_fetch_mode(&mut self, style: FetchStyle, args: &[Arg]) -> Result<bool> {
        let mode = {
            let state = self.shared.state.borrow();
            validate(CallSite::SET_FETCH_MODE, Some(style), args, state.classes())?
        };
        self.mode = mode;
        Ok(true)
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Rows changed by the last run; 0 for queries and DDL.
    pub fn row_count(&self) -> u64 {
        self.changes
    }

    pub fn column_meta(&self, index: usize) -> Option<ColumnMeta> {
        let name = self.columns.name_at(index)?;
        Some(ColumnMeta {
            index,
            name: name.to_string(),
            decl_type: self.columns.decl_type_at(index).map(str::to_string),
        })
    }

    /// SQLSTATE of the last execution; `"00000"` after success.
    pub fn error_code(&self) -> &str {
        &self.error.sqlstate
    }

    pub fn error_info(&self) -> &ErrorInfo {
        &self.error
    }

    pub fn query_string(&self) -> &str {
        &self.sql
    }
}

impl std::fmt::Debug for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Statement")
            .field("sql", &self.sql)
            .field("columns", &self.columns.names())
            .field("rows", &self.rows.len())
            .field("cursor", &self.cursor)
            .field("mode", &self.mode)
            .finish()
    }
}

/// Column metadata with literal-derived names unquoted.
fn display_columns(columns: &ColumnInfo) -> ColumnInfo {
    let mut names = Vec::with_capacity(columns.len());
    let mut decl_types = Vec::with_capacity(columns.len());
    for (i, name) in columns.names().iter().enumerate() {
        names.push(display_name(name));
        decl_types.push(columns.decl_type_at(i).map(str::to_string));
    }
    ColumnInfo::with_decl_types(names, decl_types)
}

/// The engine names an unaliased string literal after its source text,
/// quotes included (`'abc'`). MySQL names it after the value (`abc`).
fn display_name(name: &str) -> String {
    for quote in ['\'', '"'] {
        if name.len() >= 2 && name.starts_with(quote) && name.ends_with(quote) {
            let inner = &name[1..name.len() - 1];
            let doubled: String = [quote, quote].iter().collect();
            // `'a' || 'b'` is an expression, not one literal
            if inner.replace(&doubled, "").contains(quote) {
                break;
            }
            return inner.replace(&doubled, &quote.to_string());
        }
    }
    name.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name() {
        assert_eq!(display_name("'abc'"), "abc");
        assert_eq!(display_name("\"abc\""), "abc");
        assert_eq!(display_name("'it''s'"), "it's");
        assert_eq!(display_name("''"), "");
        assert_eq!(display_name("'"), "'");
        assert_eq!(display_name("1"), "1");
        assert_eq!(display_name("DATABASE()"), "DATABASE()");
        assert_eq!(display_name("'a' || 'b'"), "'a' || 'b'");
    }

    #[test]
    fn test_display_columns_keeps_decl_types() {
        let info = ColumnInfo::with_decl_types(
            vec!["'x'".into(), "id".into()],
            vec![None, Some("INT".into())],
        );
        let shown = display_columns(&info);
        assert_eq!(shown.names(), ["x", "id"]);
        assert_eq!(shown.decl_type_at(1), Some("INT"));
        assert_eq!(shown.index_of("x"), Some(0));
    }
}
