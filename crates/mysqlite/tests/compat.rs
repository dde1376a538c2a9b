//! Behavior that changes with the emulated driver generation.

use mysqlite::{
    ArrayKey, Arg, Attribute, AttributeValue, CompatLevel, ConnectOptions, Connection, Error,
    ErrorMode, FetchMode, FetchStyle, ShapedRow, Value,
};

const DSN: &str = "mysql-on-sqlite:path=:memory:;dbname=wp;";

fn connect(compat: CompatLevel) -> Connection {
    Connection::connect_with(DSN, ConnectOptions::new().compat(compat)).expect("connect")
}

fn first_row(conn: &Connection, sql: &str, mode: Option<FetchMode>) -> ShapedRow {
    let mut stmt = conn.query(sql).expect("query").expect("statement");
    stmt.fetch(mode).expect("fetch").expect("a row")
}

fn entries(row: &ShapedRow) -> Vec<(ArrayKey, Value)> {
    row.as_map()
        .expect("array-shaped row")
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

fn int(key: i64, text: &str) -> (ArrayKey, Value) {
    (ArrayKey::Int(key), Value::from(text))
}

fn name(key: &str, text: &str) -> (ArrayKey, Value) {
    (ArrayKey::Str(key.to_string()), Value::from(text))
}

#[test]
fn legacy_both_appends_sequential_keys() {
    let conn = connect(CompatLevel::V7);

    assert_eq!(
        entries(&first_row(&conn, "SELECT 1, 'abc'", None)),
        vec![int(1, "1"), int(2, "1"), name("abc", "abc"), int(3, "abc")]
    );

    assert_eq!(
        entries(&first_row(&conn, "SELECT 1, 'abc', 2", None)),
        vec![
            int(1, "1"),
            int(2, "2"),
            name("abc", "abc"),
            int(3, "abc"),
            int(4, "2")
        ]
    );

    assert_eq!(
        entries(&first_row(&conn, "SELECT 1, 'abc', 2, 'two' as `2`", None)),
        vec![
            int(1, "1"),
            int(2, "two"),
            name("abc", "abc"),
            int(3, "abc"),
            int(4, "2"),
            int(5, "two")
        ]
    );

    assert_eq!(
        entries(&first_row(&conn, "SELECT 1", None)),
        vec![int(1, "1"), int(2, "1")]
    );
}

#[test]
fn modern_both_keeps_positions() {
    for compat in [CompatLevel::V80, CompatLevel::V81] {
        let conn = connect(compat);
        assert_eq!(
            entries(&first_row(&conn, "SELECT 1, 'abc', 2", None)),
            vec![int(1, "1"), int(0, "1"), name("abc", "abc"), int(2, "2")]
        );
    }
}

#[test]
fn explicit_null_mode_rejected_before_v81() {
    let options = ConnectOptions::new()
        .compat(CompatLevel::V80)
        .error_mode(ErrorMode::Exception);
    let conn = Connection::connect_with(DSN, options).expect("connect");

    let err = conn
        .query_with("SELECT 1", None, &[Arg::Int(1), Arg::Int(2), "abc".into()])
        .unwrap_err();
    assert!(matches!(err, Error::Query(_)));
    assert_eq!(
        err.to_string(),
        "SQLSTATE[HY000]: General error: mode must be an integer"
    );
    assert_eq!(conn.error_code(), "HY000");
}

#[test]
fn explicit_null_mode_is_silent_by_default_on_v7() {
    let conn = connect(CompatLevel::V7);
    assert_eq!(
        conn.get_attribute(Attribute::ErrorMode),
        Some(AttributeValue::ErrorMode(ErrorMode::Silent))
    );
    let result = conn
        .query_with("SELECT 1", None, &[])
        .expect("silent mode returns Ok");
    assert!(result.is_none());
    assert_eq!(
        conn.error_info().message.as_deref(),
        Some("mode must be an integer")
    );
}

#[test]
fn explicit_null_mode_accepted_on_v81() {
    let conn = connect(CompatLevel::V81);
    let mut stmt = conn
        .query_with("SELECT 1", None, &[Arg::Bool(true)])
        .expect("query")
        .expect("statement");
    assert_eq!(
        entries(&stmt.fetch(None).expect("fetch").expect("a row")),
        vec![int(1, "1"), int(0, "1")]
    );
}

#[test]
fn named_modes_validate_on_every_level() {
    for compat in [CompatLevel::V7, CompatLevel::V80, CompatLevel::V81] {
        let conn = connect(compat);
        let err = conn
            .query_with("SELECT 1", Some(FetchStyle::Class), &[])
            .unwrap_err();
        assert!(matches!(err, Error::Arity(_)), "{compat:?}");
    }
}

#[test]
fn stringify_cannot_be_disabled_before_v81() {
    for compat in [CompatLevel::V7, CompatLevel::V80] {
        let conn = connect(compat);
        assert!(conn.set_attribute(Attribute::StringifyFetches, false));
        let row = first_row(&conn, "SELECT 123, 1.23, NULL", Some(FetchMode::Num));
        assert_eq!(
            row.as_num().expect("list row"),
            [Value::from("123"), Value::from("1.23"), Value::Null],
            "{compat:?}"
        );
    }
}

#[test]
fn error_mode_defaults_per_level() {
    assert_eq!(
        connect(CompatLevel::V80).get_attribute(Attribute::ErrorMode),
        Some(AttributeValue::ErrorMode(ErrorMode::Exception))
    );
    assert_eq!(
        connect(CompatLevel::V81).get_attribute(Attribute::ErrorMode),
        Some(AttributeValue::ErrorMode(ErrorMode::Exception))
    );
}
