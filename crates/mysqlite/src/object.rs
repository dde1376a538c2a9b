//! Objects produced by OBJ, CLASS and INTO fetches, and the registry that
//! maps class names to constructible classes.

use indexmap::IndexMap;
use mysqlite_core::{Result, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Name of the built-in property bag class.
pub const STD_CLASS: &str = "stdClass";

/// A dynamic object: a class name plus ordered, string-keyed properties.
#[derive(Debug, Clone, PartialEq)]
pub struct Object {
    class: String,
    properties: IndexMap<String, Value>,
}

/// Caller-owned object handle, as passed to INTO fetches.
pub type ObjectRef = Rc<RefCell<Object>>;

impl Object {
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            properties: IndexMap::new(),
        }
    }

    /// An empty `stdClass` instance.
    pub fn std_class() -> Self {
        Self::new(STD_CLASS)
    }

    /// Wrap this object in a shareable handle.
    pub fn into_ref(self) -> ObjectRef {
        Rc::new(RefCell::new(self))
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// Set a property, keeping the position of an existing one.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.properties.insert(name.into(), value);
    }

    pub fn properties(&self) -> &IndexMap<String, Value> {
        &self.properties
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Properties as a JSON object.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.properties
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }
}

/// Constructor body run against a freshly created (or pre-filled) object.
pub type Constructor = Rc<dyn Fn(&mut Object, &[Value]) -> Result<()>>;

/// A class that CLASS fetches can instantiate.
#[derive(Clone)]
pub struct ClassDef {
    name: String,
    constructor: Option<Constructor>,
}

impl ClassDef {
    /// A class without a constructor.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            constructor: None,
        }
    }

    /// Attach a constructor.
    pub fn with_constructor<F>(mut self, constructor: F) -> Self
    where
        F: Fn(&mut Object, &[Value]) -> Result<()> + 'static,
    {
        self.constructor = Some(Rc::new(constructor));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn has_constructor(&self) -> bool {
        self.constructor.is_some()
    }

    /// Create an empty instance of this class.
    pub fn instantiate(&self) -> Object {
        Object::new(self.name.clone())
    }

    /// Run the constructor, if any, on `object`.
    pub fn construct(&self, object: &mut Object, args: &[Value]) -> Result<()> {
        match &self.constructor {
            Some(constructor) => constructor(object, args),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for ClassDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassDef")
            .field("name", &self.name)
            .field("constructor", &self.constructor.is_some())
            .finish()
    }
}

/// Case-insensitive lookup of classes by name.
///
/// A fresh registry knows `stdClass`. Names may carry a leading `\`.
#[derive(Debug, Clone)]
pub struct ClassRegistry {
    classes: HashMap<String, Rc<ClassDef>>,
}

impl Default for ClassRegistry {
    fn default() -> Self {
        let mut registry = Self {
            classes: HashMap::new(),
        };
        registry.register(ClassDef::new(STD_CLASS));
        registry
    }
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a class.
    pub fn register(&mut self, class: ClassDef) -> &mut Self {
        self.classes.insert(normalize(&class.name), Rc::new(class));
        self
    }

    /// Builder-style [`register`](Self::register).
    pub fn with_class(mut self, class: ClassDef) -> Self {
        self.register(class);
        self
    }

    pub fn resolve(&self, name: &str) -> Option<Rc<ClassDef>> {
        self.classes.get(&normalize(name)).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.classes.contains_key(&normalize(name))
    }
}

fn normalize(name: &str) -> String {
    name.strip_prefix('\\').unwrap_or(name).to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_std_class_is_builtin() {
        let registry = ClassRegistry::new();
        assert!(registry.contains("stdClass"));
        assert!(registry.contains("\\STDCLASS"));
        assert!(!registry.contains("non-existent-class"));
    }

    #[test]
    fn test_constructor_runs() {
        let class = ClassDef::new("Point").with_constructor(|obj, args| {
            obj.set("x", args.first().cloned().unwrap_or(Value::Null));
            Ok(())
        });
        let mut obj = class.instantiate();
        class.construct(&mut obj, &[Value::Int(3)]).unwrap();
        assert_eq!(obj.class(), "Point");
        assert_eq!(obj.get("x"), Some(&Value::Int(3)));
    }

    #[test]
    fn test_set_keeps_position() {
        let mut obj = Object::std_class();
        obj.set("a", Value::Int(1));
        obj.set("b", Value::Int(2));
        obj.set("a", Value::Int(3));
        let keys: Vec<&String> = obj.properties().keys().collect();
        assert_eq!(keys, ["a", "b"]);
        assert_eq!(obj.to_json(), serde_json::json!({"a": 3, "b": 2}));
    }
}
