//! Fetch modes and row shaping.
//!
//! A [`Row`] straight from the engine is reshaped into one of several
//! [`ShapedRow`] layouts depending on the [`FetchMode`]:
//!
//! | mode | shape |
//! |------|-------|
//! | `Num` | values in column order |
//! | `Assoc` | name → value, last duplicate wins |
//! | `Both` | names and positions merged into one ordered map |
//! | `Named` | name → value, duplicates collected |
//! | `Obj` | `stdClass` object |
//! | `Class` | registered class, constructor run before or after properties |
//! | `Into` | properties written onto a caller-supplied object |

use crate::config::CompatLevel;
use crate::object::{ClassRegistry, Object, ObjectRef};
use indexmap::IndexMap;
use mysqlite_core::{Error, Result, Row, Value};
use std::fmt;
use std::rc::Rc;

pub const FETCH_ASSOC: i64 = 2;
pub const FETCH_NUM: i64 = 3;
pub const FETCH_BOTH: i64 = 4;
pub const FETCH_OBJ: i64 = 5;
pub const FETCH_CLASS: i64 = 8;
pub const FETCH_INTO: i64 = 9;
pub const FETCH_NAMED: i64 = 11;
/// Flag bit: run the CLASS constructor before assigning properties.
pub const FETCH_PROPS_LATE: i64 = 1 << 20;

/// The numeric face of a fetch mode, as passed in dynamic calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchStyle {
    Assoc,
    Num,
    Both,
    Obj,
    Class,
    /// `Class` combined with the props-late flag
    ClassPropsLate,
    Into,
    Named,
}

impl FetchStyle {
    /// Decode a mode code, including the props-late flag.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            FETCH_ASSOC => Some(FetchStyle::Assoc),
            FETCH_NUM => Some(FetchStyle::Num),
            FETCH_BOTH => Some(FetchStyle::Both),
            FETCH_OBJ => Some(FetchStyle::Obj),
            FETCH_CLASS => Some(FetchStyle::Class),
            c if c == FETCH_CLASS | FETCH_PROPS_LATE => Some(FetchStyle::ClassPropsLate),
            FETCH_INTO => Some(FetchStyle::Into),
            FETCH_NAMED => Some(FetchStyle::Named),
            _ => None,
        }
    }

    pub fn code(self) -> i64 {
        match self {
            FetchStyle::Assoc => FETCH_ASSOC,
            FetchStyle::Num => FETCH_NUM,
            FetchStyle::Both => FETCH_BOTH,
            FetchStyle::Obj => FETCH_OBJ,
            FetchStyle::Class => FETCH_CLASS,
            FetchStyle::ClassPropsLate => FETCH_CLASS | FETCH_PROPS_LATE,
            FetchStyle::Into => FETCH_INTO,
            FetchStyle::Named => FETCH_NAMED,
        }
    }

    /// Does this mode need a class name or target object alongside it?
    pub fn needs_aux(self) -> bool {
        matches!(
            self,
            FetchStyle::Class | FetchStyle::ClassPropsLate | FetchStyle::Into
        )
    }
}

/// A fully specified fetch mode, auxiliary data included.
#[derive(Debug, Clone)]
pub enum FetchMode {
    Both,
    Num,
    Assoc,
    Named,
    Obj,
    Class {
        class: String,
        ctor_args: Vec<Value>,
        props_late: bool,
    },
    Into(ObjectRef),
}

impl FetchMode {
    /// A CLASS mode with no constructor arguments.
    pub fn class(name: impl Into<String>) -> Self {
        FetchMode::Class {
            class: name.into(),
            ctor_args: Vec::new(),
            props_late: false,
        }
    }

    /// The mode for a style that carries no auxiliary data.
    pub fn from_style(style: FetchStyle) -> Option<Self> {
        match style {
            FetchStyle::Both => Some(FetchMode::Both),
            FetchStyle::Num => Some(FetchMode::Num),
            FetchStyle::Assoc => Some(FetchMode::Assoc),
            FetchStyle::Named => Some(FetchMode::Named),
            FetchStyle::Obj => Some(FetchMode::Obj),
            FetchStyle::Class | FetchStyle::ClassPropsLate | FetchStyle::Into => None,
        }
    }

    pub fn style(&self) -> FetchStyle {
        match self {
            FetchMode::Both => FetchStyle::Both,
            FetchMode::Num => FetchStyle::Num,
            FetchMode::Assoc => FetchStyle::Assoc,
            FetchMode::Named => FetchStyle::Named,
            FetchMode::Obj => FetchStyle::Obj,
            FetchMode::Class {
                props_late: false, ..
            } => FetchStyle::Class,
            FetchMode::Class {
                props_late: true, ..
            } => FetchStyle::ClassPropsLate,
            FetchMode::Into(_) => FetchStyle::Into,
        }
    }
}

impl PartialEq for FetchMode {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                FetchMode::Class {
                    class: a,
                    ctor_args: args_a,
                    props_late: late_a,
                },
                FetchMode::Class {
                    class: b,
                    ctor_args: args_b,
                    props_late: late_b,
                },
            ) => a.eq_ignore_ascii_case(b) && args_a == args_b && late_a == late_b,
            (FetchMode::Into(a), FetchMode::Into(b)) => Rc::ptr_eq(a, b),
            (a, b) => a.style() == b.style(),
        }
    }
}

/// Key of a BOTH or ASSOC map.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArrayKey {
    Int(i64),
    Str(String),
}

impl ArrayKey {
    /// Key for a column name: canonical decimal integers become `Int`.
    ///
    /// `"2"` and `"-7"` are integers; `"02"`, `"+2"`, `"-0"` and `"2.0"` stay text.
    pub fn from_name(name: &str) -> Self {
        match canonical_int(name) {
            Some(n) => ArrayKey::Int(n),
            None => ArrayKey::Str(name.to_string()),
        }
    }
}

fn canonical_int(s: &str) -> Option<i64> {
    let digits = s.strip_prefix('-').unwrap_or(s);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if digits.len() > 1 && digits.starts_with('0') {
        return None;
    }
    if s == "-0" {
        return None;
    }
    s.parse().ok()
}

impl From<i64> for ArrayKey {
    fn from(n: i64) -> Self {
        ArrayKey::Int(n)
    }
}

impl From<i32> for ArrayKey {
    fn from(n: i32) -> Self {
        ArrayKey::Int(i64::from(n))
    }
}

impl From<&str> for ArrayKey {
    fn from(name: &str) -> Self {
        ArrayKey::from_name(name)
    }
}

impl fmt::Display for ArrayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArrayKey::Int(n) => write!(f, "{}", n),
            ArrayKey::Str(s) => f.write_str(s),
        }
    }
}

/// One entry of a NAMED row.
#[derive(Debug, Clone, PartialEq)]
pub enum NamedValue {
    Single(Value),
    /// Every value of a name shared by several columns, in column order
    Multi(Vec<Value>),
}

impl NamedValue {
    fn push(&mut self, value: Value) {
        match self {
            NamedValue::Single(first) => {
                let first = std::mem::replace(first, Value::Null);
                *self = NamedValue::Multi(vec![first, value]);
            }
            NamedValue::Multi(values) => values.push(value),
        }
    }

    fn to_json(&self) -> serde_json::Value {
        match self {
            NamedValue::Single(v) => v.to_json(),
            NamedValue::Multi(vs) => vs.iter().map(Value::to_json).collect(),
        }
    }
}

/// A row after fetch-mode shaping.
#[derive(Debug, Clone)]
pub enum ShapedRow {
    Num(Vec<Value>),
    /// BOTH and ASSOC
    Map(IndexMap<ArrayKey, Value>),
    Named(IndexMap<String, NamedValue>),
    /// OBJ and CLASS
    Object(Object),
    /// The caller's own object, filled in place
    Into(ObjectRef),
}

impl ShapedRow {
    /// Look up one value by position or name, whatever the shape.
    ///
    /// NAMED entries holding several values yield `None`; use
    /// [`as_named`](Self::as_named) for those.
    pub fn get(&self, key: impl Into<ArrayKey>) -> Option<Value> {
        let key = key.into();
        match self {
            ShapedRow::Num(values) => match key {
                ArrayKey::Int(i) => usize::try_from(i).ok().and_then(|i| values.get(i)).cloned(),
                ArrayKey::Str(_) => None,
            },
            ShapedRow::Map(map) => map.get(&key).cloned(),
            ShapedRow::Named(map) => match map.get(&key.to_string()) {
                Some(NamedValue::Single(v)) => Some(v.clone()),
                _ => None,
            },
            ShapedRow::Object(obj) => obj.get(&key.to_string()).cloned(),
            ShapedRow::Into(obj) => obj.borrow().get(&key.to_string()).cloned(),
        }
    }

    pub fn as_num(&self) -> Option<&[Value]> {
        match self {
            ShapedRow::Num(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&IndexMap<ArrayKey, Value>> {
        match self {
            ShapedRow::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_named(&self) -> Option<&IndexMap<String, NamedValue>> {
        match self {
            ShapedRow::Named(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            ShapedRow::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_into(&self) -> Option<&ObjectRef> {
        match self {
            ShapedRow::Into(obj) => Some(obj),
            _ => None,
        }
    }

    /// Render as JSON: arrays for NUM, objects for everything else.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ShapedRow::Num(values) => values.iter().map(Value::to_json).collect(),
            ShapedRow::Map(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| (k.to_string(), v.to_json()))
                    .collect(),
            ),
            ShapedRow::Named(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            ShapedRow::Object(obj) => obj.to_json(),
            ShapedRow::Into(obj) => obj.borrow().to_json(),
        }
    }
}

/// Settings that shaping reads at fetch time.
#[derive(Debug, Clone, Copy)]
pub struct ShapeContext<'a> {
    pub stringify: bool,
    pub compat: CompatLevel,
    pub classes: &'a ClassRegistry,
}

impl ShapeContext<'_> {
    /// Stringify, forced on for generations whose engine only returns text.
    pub(crate) fn effective_stringify(&self) -> bool {
        self.stringify || !self.compat.native_types()
    }
}

/// Shape one engine row according to `mode`.
pub fn shape(row: &Row, mode: &FetchMode, ctx: &ShapeContext<'_>) -> Result<ShapedRow> {
    let stringify = ctx.effective_stringify();
    let pairs = row.iter().map(|(name, value)| {
        let value = if stringify {
            value.clone().stringify()
        } else {
            value.clone()
        };
        (name, value)
    });

    let shaped = match mode {
        FetchMode::Num => ShapedRow::Num(pairs.map(|(_, v)| v).collect()),
        FetchMode::Assoc => ShapedRow::Map(assoc(pairs)),
        FetchMode::Both => {
            let mut map = IndexMap::with_capacity(row.len() * 2);
            if ctx.compat.sequential_both_keys() {
                let mut next_free = 0i64;
                for (name, value) in pairs {
                    let key = ArrayKey::from_name(name);
                    if let ArrayKey::Int(n) = key {
                        next_free = next_free.max(n.saturating_add(1));
                    }
                    map.insert(key, value.clone());
                    map.insert(ArrayKey::Int(next_free), value);
                    next_free = next_free.saturating_add(1);
                }
            } else {
                for (i, (name, value)) in pairs.enumerate() {
                    map.insert(ArrayKey::from_name(name), value.clone());
                    map.entry(ArrayKey::Int(i as i64)).or_insert(value);
                }
            }
            ShapedRow::Map(map)
        }
        FetchMode::Named => {
            let mut map: IndexMap<String, NamedValue> = IndexMap::with_capacity(row.len());
            for (name, value) in pairs {
                match map.get_mut(name) {
                    Some(existing) => existing.push(value),
                    None => {
                        map.insert(name.to_string(), NamedValue::Single(value));
                    }
                }
            }
            ShapedRow::Named(map)
        }
        FetchMode::Obj => {
            let mut obj = Object::std_class();
            assign(&mut obj, pairs);
            ShapedRow::Object(obj)
        }
        FetchMode::Class {
            class,
            ctor_args,
            props_late,
        } => {
            let def = ctx
                .classes
                .resolve(class)
                .ok_or_else(|| Error::ClassNotFound(class.clone()))?;
            let mut obj = def.instantiate();
            if *props_late {
                def.construct(&mut obj, ctor_args)?;
                assign(&mut obj, pairs);
            } else {
                assign(&mut obj, pairs);
                def.construct(&mut obj, ctor_args)?;
            }
            ShapedRow::Object(obj)
        }
        FetchMode::Into(target) => {
            assign(&mut target.borrow_mut(), pairs);
            ShapedRow::Into(Rc::clone(target))
        }
    };
    Ok(shaped)
}

fn assoc<'a>(pairs: impl Iterator<Item = (&'a str, Value)>) -> IndexMap<ArrayKey, Value> {
    let mut map = IndexMap::new();
    for (name, value) in pairs {
        map.insert(ArrayKey::from_name(name), value);
    }
    map
}

fn assign<'a>(obj: &mut Object, pairs: impl Iterator<Item = (&'a str, Value)>) {
    for (name, value) in pairs {
        obj.set(name, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ClassDef;

    fn row() -> Row {
        // SELECT 1, 'abc', 2, 'two' AS `2`
        Row::new(
            vec!["1".into(), "abc".into(), "2".into(), "2".into()],
            vec![
                Value::Int(1),
                Value::from("abc"),
                Value::Int(2),
                Value::from("two"),
            ],
        )
    }

    fn ctx(classes: &ClassRegistry, compat: CompatLevel) -> ShapeContext<'_> {
        ShapeContext {
            stringify: true,
            compat,
            classes,
        }
    }

    fn entries(shaped: &ShapedRow) -> Vec<(ArrayKey, Value)> {
        shaped
            .as_map()
            .unwrap()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn s(text: &str) -> Value {
        Value::from(text)
    }

    #[test]
    fn test_style_codes() {
        for code in [2, 3, 4, 5, 8, 9, 11, 8 | (1 << 20)] {
            assert_eq!(FetchStyle::from_code(code).unwrap().code(), code);
        }
        assert_eq!(FetchStyle::from_code(7), None);
        assert!(FetchStyle::Into.needs_aux());
        assert!(!FetchStyle::Named.needs_aux());
    }

    #[test]
    fn test_array_key_normalization() {
        assert_eq!(ArrayKey::from_name("2"), ArrayKey::Int(2));
        assert_eq!(ArrayKey::from_name("-7"), ArrayKey::Int(-7));
        assert_eq!(ArrayKey::from_name("0"), ArrayKey::Int(0));
        assert_eq!(ArrayKey::from_name("02"), ArrayKey::Str("02".into()));
        assert_eq!(ArrayKey::from_name("+2"), ArrayKey::Str("+2".into()));
        assert_eq!(ArrayKey::from_name("-0"), ArrayKey::Str("-0".into()));
        assert_eq!(ArrayKey::from_name("2.0"), ArrayKey::Str("2.0".into()));
        assert_eq!(
            ArrayKey::from_name("99999999999999999999"),
            ArrayKey::Str("99999999999999999999".into())
        );
    }

    #[test]
    fn test_num() {
        let classes = ClassRegistry::new();
        let shaped = shape(&row(), &FetchMode::Num, &ctx(&classes, CompatLevel::V81)).unwrap();
        assert_eq!(shaped.as_num().unwrap(), [s("1"), s("abc"), s("2"), s("two")]);
    }

    #[test]
    fn test_assoc_last_duplicate_wins() {
        let classes = ClassRegistry::new();
        let shaped = shape(&row(), &FetchMode::Assoc, &ctx(&classes, CompatLevel::V81)).unwrap();
        assert_eq!(
            entries(&shaped),
            vec![
                (ArrayKey::Int(1), s("1")),
                (ArrayKey::from("abc"), s("abc")),
                (ArrayKey::Int(2), s("two")),
            ]
        );
    }

    #[test]
    fn test_both_modern_layout() {
        let classes = ClassRegistry::new();
        let shaped = shape(&row(), &FetchMode::Both, &ctx(&classes, CompatLevel::V80)).unwrap();
        assert_eq!(
            entries(&shaped),
            vec![
                (ArrayKey::Int(1), s("1")),
                (ArrayKey::Int(0), s("1")),
                (ArrayKey::from("abc"), s("abc")),
                (ArrayKey::Int(2), s("two")),
                (ArrayKey::Int(3), s("two")),
            ]
        );
    }

    #[test]
    fn test_both_legacy_layout() {
        let classes = ClassRegistry::new();
        let shaped = shape(&row(), &FetchMode::Both, &ctx(&classes, CompatLevel::V7)).unwrap();
        assert_eq!(
            entries(&shaped),
            vec![
                (ArrayKey::Int(1), s("1")),
                (ArrayKey::Int(2), s("two")),
                (ArrayKey::from("abc"), s("abc")),
                (ArrayKey::Int(3), s("abc")),
                (ArrayKey::Int(4), s("2")),
                (ArrayKey::Int(5), s("two")),
            ]
        );
    }

    #[test]
    fn test_named_collects_duplicates() {
        let classes = ClassRegistry::new();
        let shaped = shape(&row(), &FetchMode::Named, &ctx(&classes, CompatLevel::V81)).unwrap();
        let named = shaped.as_named().unwrap();
        let keys: Vec<&String> = named.keys().collect();
        assert_eq!(keys, ["1", "abc", "2"]);
        assert_eq!(named["2"], NamedValue::Multi(vec![s("2"), s("two")]));
        assert_eq!(named["1"], NamedValue::Single(s("1")));
        assert_eq!(
            shaped.to_json(),
            serde_json::json!({"1": "1", "abc": "abc", "2": ["2", "two"]})
        );
    }

    #[test]
    fn test_obj() {
        let classes = ClassRegistry::new();
        let shaped = shape(&row(), &FetchMode::Obj, &ctx(&classes, CompatLevel::V81)).unwrap();
        let obj = shaped.as_object().unwrap();
        assert_eq!(obj.class(), "stdClass");
        assert_eq!(obj.len(), 3);
        assert_eq!(obj.get("2"), Some(&s("two")));
    }

    #[test]
    fn test_native_types_without_stringify() {
        let classes = ClassRegistry::new();
        let mut context = ctx(&classes, CompatLevel::V81);
        context.stringify = false;
        let shaped = shape(&row(), &FetchMode::Num, &context).unwrap();
        assert_eq!(shaped.get(0), Some(Value::Int(1)));

        context.compat = CompatLevel::V80;
        let shaped = shape(&row(), &FetchMode::Num, &context).unwrap();
        assert_eq!(shaped.get(0), Some(s("1")));
    }

    #[test]
    fn test_class_constructor_order() {
        let classes = ClassRegistry::new().with_class(ClassDef::new("Tagged").with_constructor(
            |obj, args| {
                obj.set("abc", args.first().cloned().unwrap_or(Value::Null));
                Ok(())
            },
        ));
        let context = ctx(&classes, CompatLevel::V81);

        let mode = FetchMode::Class {
            class: "Tagged".into(),
            ctor_args: vec![s("from ctor")],
            props_late: false,
        };
        let shaped = shape(&row(), &mode, &context).unwrap();
        assert_eq!(shaped.get("abc"), Some(s("from ctor")));

        let late = FetchMode::Class {
            class: "Tagged".into(),
            ctor_args: vec![s("from ctor")],
            props_late: true,
        };
        let shaped = shape(&row(), &late, &context).unwrap();
        assert_eq!(shaped.get("abc"), Some(s("abc")));
        assert_eq!(shaped.as_object().unwrap().class(), "Tagged");
    }

    #[test]
    fn test_class_not_found() {
        let classes = ClassRegistry::new();
        let err = shape(
            &row(),
            &FetchMode::class("Missing"),
            &ctx(&classes, CompatLevel::V81),
        )
        .unwrap_err();
        assert!(matches!(err, Error::ClassNotFound(name) if name == "Missing"));
    }

    #[test]
    fn test_into_fills_caller_object() {
        let classes = ClassRegistry::new();
        let mut target = Object::new("Target");
        target.set("keep", Value::Int(5));
        target.set("abc", Value::Null);
        let target = target.into_ref();

        let shaped = shape(
            &row(),
            &FetchMode::Into(Rc::clone(&target)),
            &ctx(&classes, CompatLevel::V81),
        )
        .unwrap();
        assert!(Rc::ptr_eq(shaped.as_into().unwrap(), &target));
        let obj = target.borrow();
        assert_eq!(obj.get("keep"), Some(&Value::Int(5)));
        assert_eq!(obj.get("abc"), Some(&s("abc")));
        assert_eq!(obj.get("2"), Some(&s("two")));
    }

    #[test]
    fn test_shape_is_repeatable() {
        let classes = ClassRegistry::new();
        let context = ctx(&classes, CompatLevel::V81);
        for mode in [FetchMode::Num, FetchMode::Assoc, FetchMode::Both, FetchMode::Named, FetchMode::Obj] {
            let a = shape(&row(), &mode, &context).unwrap().to_json();
            let b = shape(&row(), &mode, &context).unwrap().to_json();
            assert_eq!(a, b);
        }
    }
}
