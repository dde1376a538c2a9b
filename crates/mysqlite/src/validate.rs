//! Pre-flight checks for fetch-mode arguments passed in dynamic calls.
//!
//! Runs before any engine interaction. Messages match the reference driver
//! word for word, including 1-based argument numbering that counts the SQL
//! string of `PDO::query()`.

use crate::fetch::{FetchMode, FetchStyle};
use crate::object::{ClassRegistry, ObjectRef};
use mysqlite_core::{ArityBound, ArityError, Result, TypeError, Value};
use std::rc::Rc;

/// An untyped trailing argument of a dynamic fetch-mode call.
#[derive(Debug, Clone)]
pub enum Arg {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Array(Vec<Value>),
    Object(ObjectRef),
}

impl Arg {
    /// Type name as used in argument type errors; objects report their class.
    pub fn type_name(&self) -> String {
        match self {
            Arg::Null => "null".to_string(),
            Arg::Bool(_) => "bool".to_string(),
            Arg::Int(_) => "int".to_string(),
            Arg::Float(_) => "float".to_string(),
            Arg::Str(_) => "string".to_string(),
            Arg::Array(_) => "array".to_string(),
            Arg::Object(obj) => obj.borrow().class().to_string(),
        }
    }
}

impl From<&str> for Arg {
    fn from(v: &str) -> Self {
        Arg::Str(v.to_string())
    }
}

impl From<String> for Arg {
    fn from(v: String) -> Self {
        Arg::Str(v)
    }
}

impl From<i64> for Arg {
    fn from(v: i64) -> Self {
        Arg::Int(v)
    }
}

impl From<i32> for Arg {
    fn from(v: i32) -> Self {
        Arg::Int(i64::from(v))
    }
}

impl From<bool> for Arg {
    fn from(v: bool) -> Self {
        Arg::Bool(v)
    }
}

impl From<f64> for Arg {
    fn from(v: f64) -> Self {
        Arg::Float(v)
    }
}

impl From<Vec<Value>> for Arg {
    fn from(v: Vec<Value>) -> Self {
        Arg::Array(v)
    }
}

impl From<ObjectRef> for Arg {
    fn from(v: ObjectRef) -> Self {
        Arg::Object(v)
    }
}

/// The method being validated and where its mode argument sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallSite {
    pub method: &'static str,
    /// 1-based position of the fetch-mode argument
    pub mode_position: usize,
}

impl CallSite {
    pub const QUERY: CallSite = CallSite {
        method: "PDO::query()",
        mode_position: 2,
    };

    pub const SET_FETCH_MODE: CallSite = CallSite {
        method: "PDOStatement::setFetchMode()",
        mode_position: 1,
    };

    fn arity(self, bound: ArityBound, expected: usize, extra: usize) -> ArityError {
        ArityError {
            method: self.method,
            bound,
            expected,
            given: self.mode_position + extra,
        }
    }

    fn type_error(self, argument: usize, detail: &str) -> TypeError {
        TypeError::new(
            Some(argument),
            format!("{}: Argument #{} {}", self.method, argument, detail),
        )
    }
}

/// Check a fetch mode and its trailing arguments, producing the mode to use.
///
/// `None` as the mode means "use the default": nothing is checked and the
/// trailing arguments are ignored.
pub fn validate(
    call: CallSite,
    mode: Option<FetchStyle>,
    args: &[Arg],
    classes: &ClassRegistry,
) -> Result<Option<FetchMode>> {
    let Some(style) = mode else {
        return Ok(None);
    };
    let p = call.mode_position;
    let plain = |mode: FetchMode| -> Result<FetchMode> {
        if args.is_empty() {
            Ok(mode)
        } else {
            Err(call.arity(ArityBound::Exactly, p, args.len()).into())
        }
    };

    let mode = match style {
        FetchStyle::Class | FetchStyle::ClassPropsLate => {
            if args.is_empty() {
                return Err(call.arity(ArityBound::AtLeast, p + 1, 0).into());
            }
            if args.len() > 2 {
                return Err(call.arity(ArityBound::AtMost, p + 2, args.len()).into());
            }

            let class = match &args[0] {
                Arg::Str(name) => name,
                other => {
                    let detail = format!("must be of type string, {} given", other.type_name());
                    return Err(call.type_error(p + 1, &detail).into());
                }
            };
            let Some(def) = classes.resolve(class) else {
                return Err(call.type_error(p + 1, "must be a valid class").into());
            };

            let ctor_args = match args.get(1) {
                None | Some(Arg::Null) => Vec::new(),
                Some(Arg::Array(values)) => values.clone(),
                Some(other) => {
                    let detail = format!("must be of type ?array, {} given", other.type_name());
                    return Err(call.type_error(p + 2, &detail).into());
                }
            };
            if !ctor_args.is_empty() && !def.has_constructor() {
                let detail = format!(
                    "must be empty when class provided in argument #{} has no constructor",
                    p + 1
                );
                return Err(call.type_error(p + 2, &detail).into());
            }

            FetchMode::Class {
                class: def.name().to_string(),
                ctor_args,
                props_late: style == FetchStyle::ClassPropsLate,
            }
        }
        FetchStyle::Into => {
            if args.len() != 1 {
                return Err(call.arity(ArityBound::Exactly, p + 1, args.len()).into());
            }
            match &args[0] {
                Arg::Object(target) => FetchMode::Into(Rc::clone(target)),
                other => {
                    let detail = format!("must be of type object, {} given", other.type_name());
                    return Err(call.type_error(p + 1, &detail).into());
                }
            }
        }
        FetchStyle::Both => plain(FetchMode::Both)?,
        FetchStyle::Num => plain(FetchMode::Num)?,
        FetchStyle::Assoc => plain(FetchMode::Assoc)?,
        FetchStyle::Named => plain(FetchMode::Named)?,
        FetchStyle::Obj => plain(FetchMode::Obj)?,
    };

    Ok(Some(mode))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{ClassDef, Object};

    fn registry() -> ClassRegistry {
        ClassRegistry::new().with_class(ClassDef::new("WithCtor").with_constructor(|_, _| Ok(())))
    }

    fn message(call: CallSite, style: FetchStyle, args: &[Arg]) -> String {
        validate(call, Some(style), args, &registry())
            .unwrap_err()
            .to_string()
    }

    #[test]
    fn test_simple_modes_take_no_args() {
        assert_eq!(
            message(CallSite::QUERY, FetchStyle::Assoc, &[Arg::Int(0)]),
            "PDO::query() expects exactly 2 arguments for the fetch mode provided, 3 given"
        );
        assert_eq!(
            message(CallSite::SET_FETCH_MODE, FetchStyle::Num, &[Arg::Int(0), Arg::Null]),
            "PDOStatement::setFetchMode() expects exactly 1 arguments for the fetch mode provided, 3 given"
        );
        let mode = validate(CallSite::QUERY, Some(FetchStyle::Named), &[], &registry()).unwrap();
        assert_eq!(mode, Some(FetchMode::Named));
    }

    #[test]
    fn test_class_arity() {
        assert_eq!(
            message(CallSite::QUERY, FetchStyle::Class, &[]),
            "PDO::query() expects at least 3 arguments for the fetch mode provided, 2 given"
        );
        assert_eq!(
            message(
                CallSite::QUERY,
                FetchStyle::Class,
                &["\\stdClass".into(), Arg::Array(vec![]), Arg::Array(vec![])]
            ),
            "PDO::query() expects at most 4 arguments for the fetch mode provided, 5 given"
        );
    }

    #[test]
    fn test_class_argument_types() {
        assert_eq!(
            message(CallSite::QUERY, FetchStyle::Class, &[Arg::Int(1)]),
            "PDO::query(): Argument #3 must be of type string, int given"
        );
        assert_eq!(
            message(CallSite::QUERY, FetchStyle::Class, &["non-existent-class".into()]),
            "PDO::query(): Argument #3 must be a valid class"
        );
        assert_eq!(
            message(CallSite::QUERY, FetchStyle::Class, &["stdClass".into(), Arg::Int(1)]),
            "PDO::query(): Argument #4 must be of type ?array, int given"
        );
        assert_eq!(
            message(
                CallSite::QUERY,
                FetchStyle::Class,
                &["stdClass".into(), Arg::Array(vec![Value::Int(1)])]
            ),
            "PDO::query(): Argument #4 must be empty when class provided in argument #3 has no constructor"
        );
    }

    #[test]
    fn test_class_accepted() {
        let mode = validate(
            CallSite::QUERY,
            Some(FetchStyle::ClassPropsLate),
            &["withctor".into(), Arg::Array(vec![Value::Int(1)])],
            &registry(),
        )
        .unwrap();
        assert_eq!(
            mode,
            Some(FetchMode::Class {
                class: "WithCtor".into(),
                ctor_args: vec![Value::Int(1)],
                props_late: true,
            })
        );

        let mode = validate(
            CallSite::SET_FETCH_MODE,
            Some(FetchStyle::Class),
            &["\\stdClass".into(), Arg::Null],
            &registry(),
        )
        .unwrap();
        assert_eq!(mode, Some(FetchMode::class("stdClass")));
    }

    #[test]
    fn test_into() {
        assert_eq!(
            message(CallSite::QUERY, FetchStyle::Into, &[]),
            "PDO::query() expects exactly 3 arguments for the fetch mode provided, 2 given"
        );
        assert_eq!(
            message(CallSite::QUERY, FetchStyle::Into, &[Arg::Int(1)]),
            "PDO::query(): Argument #3 must be of type object, int given"
        );
        let target = Object::std_class().into_ref();
        let mode = validate(
            CallSite::QUERY,
            Some(FetchStyle::Into),
            &[Arg::Object(Rc::clone(&target))],
            &registry(),
        )
        .unwrap();
        assert_eq!(mode, Some(FetchMode::Into(target)));
    }

    #[test]
    fn test_object_type_name_is_class() {
        let target = Object::new("Widget").into_ref();
        assert_eq!(
            message(CallSite::QUERY, FetchStyle::Class, &[Arg::Object(target)]),
            "PDO::query(): Argument #3 must be of type string, Widget given"
        );
    }

    #[test]
    fn test_unset_mode_ignores_everything() {
        let args = [Arg::Int(1), Arg::Int(2), "abc".into(), Arg::Array(vec![]), Arg::Bool(true)];
        let mode = validate(CallSite::QUERY, None, &args, &registry()).unwrap();
        assert_eq!(mode, None);
    }
}
