//! Runtime values exchanged between module bodies, host code and namespaces.
//!
//! Primitive values compare by content; objects, arrays, functions, errors
//! and namespaces are reference types and compare by identity, the way
//! `===` does.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::namespace::Namespace;

/// Shared handle to a host or script object
pub type ObjectRef = Arc<JsObject>;

/// Signature of a native function
pub type NativeFn = dyn Fn(&[Value]) -> Result<Value, Value> + Send + Sync;

/// A runtime value
#[derive(Clone, Default)]
pub enum Value {
    /// `undefined`
    #[default]
    Undefined,
    /// `null`
    Null,
    /// Boolean
    Bool(bool),
    /// Number
    Number(f64),
    /// String
    String(Arc<str>),
    /// Immutable array
    Array(Arc<[Value]>),
    /// Plain object
    Object(ObjectRef),
    /// Host function
    Function(NativeFunction),
    /// Error instance
    Error(Arc<ErrorObject>),
    /// Module namespace object
    Namespace(Arc<Namespace>),
}

/// Plain object with insertion-ordered own properties
#[derive(Default)]
pub struct JsObject {
    properties: RwLock<IndexMap<String, Value>>,
}

impl JsObject {
    /// Create an empty object
    pub fn new() -> ObjectRef {
        Arc::new(Self::default())
    }

    /// Create an object from key/value pairs
    pub fn from_entries<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> ObjectRef {
        let properties = entries.into_iter().map(|(k, v)| (k.into(), v)).collect();
        Arc::new(Self {
            properties: RwLock::new(properties),
        })
    }

    /// Get an own property
    pub fn get(&self, key: &str) -> Option<Value> {
        self.properties.read().get(key).cloned()
    }

    /// Set an own property
    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.properties.write().insert(key.into(), value);
    }

    /// Check if an own property exists
    pub fn has(&self, key: &str) -> bool {
        self.properties.read().contains_key(key)
    }

    /// Own property names in insertion order
    pub fn keys(&self) -> Vec<String> {
        self.properties.read().keys().cloned().collect()
    }

    /// Snapshot of own properties in insertion order
    pub fn entries(&self) -> Vec<(String, Value)> {
        self.properties
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// Host function callable from module bodies
#[derive(Clone)]
pub struct NativeFunction {
    name: Arc<str>,
    call: Arc<NativeFn>,
}

impl NativeFunction {
    /// Wrap a Rust closure
    pub fn new<F>(name: &str, f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, Value> + Send + Sync + 'static,
    {
        Self {
            name: Arc::from(name),
            call: Arc::new(f),
        }
    }

    /// Function name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke the function. `Err` carries the thrown value.
    pub fn call(&self, args: &[Value]) -> Result<Value, Value> {
        (self.call)(args)
    }

    fn ptr_eq(&self, other: &NativeFunction) -> bool {
        Arc::ptr_eq(&self.call, &other.call)
    }
}

/// Error instance (`new Error(message)`)
#[derive(Debug)]
pub struct ErrorObject {
    /// Constructor name, e.g. `TypeError`
    pub name: String,
    /// Message
    pub message: String,
}

impl Value {
    /// Create a new error value
    pub fn error(name: impl Into<String>, message: impl Into<String>) -> Self {
        Value::Error(Arc::new(ErrorObject {
            name: name.into(),
            message: message.into(),
        }))
    }

    /// Create an array value
    pub fn array(items: impl IntoIterator<Item = Value>) -> Self {
        Value::Array(items.into_iter().collect())
    }

    /// Create a function value
    pub fn function<F>(name: &str, f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, Value> + Send + Sync + 'static,
    {
        Value::Function(NativeFunction::new(name, f))
    }

    /// Check for `undefined`
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Borrow the string contents
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Get the object handle
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Get the array items
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Get the namespace
    pub fn as_namespace(&self) -> Option<&Arc<Namespace>> {
        match self {
            Value::Namespace(ns) => Some(ns),
            _ => None,
        }
    }

    /// Get the function
    pub fn as_function(&self) -> Option<&NativeFunction> {
        match self {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }

    /// JavaScript truthiness
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// Result of the `typeof` operator
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Function(_) => "function",
            Value::Null
            | Value::Array(_)
            | Value::Object(_)
            | Value::Error(_)
            | Value::Namespace(_) => "object",
        }
    }

    /// `===`: primitives by value, everything else by identity
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Arc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            (Value::Error(a), Value::Error(b)) => Arc::ptr_eq(a, b),
            (Value::Namespace(a), Value::Namespace(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Property read (`value.key`). Missing properties read as `undefined`.
    pub fn get_property(&self, key: &str) -> Value {
        match self {
            Value::Object(obj) => obj.get(key).unwrap_or_default(),
            Value::Namespace(ns) => ns.get(key).unwrap_or_default(),
            Value::Array(items) => match key {
                "length" => Value::Number(items.len() as f64),
                _ => key
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| items.get(i).cloned())
                    .unwrap_or_default(),
            },
            Value::String(s) => match key {
                "length" => Value::Number(s.chars().count() as f64),
                _ => key
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| s.chars().nth(i))
                    .map(|c| Value::from(c.to_string()))
                    .unwrap_or_default(),
            },
            Value::Error(err) => match key {
                "name" => Value::from(err.name.as_str()),
                "message" => Value::from(err.message.as_str()),
                _ => Value::Undefined,
            },
            Value::Function(f) => match key {
                "name" => Value::from(f.name()),
                _ => Value::Undefined,
            },
            _ => Value::Undefined,
        }
    }

    /// Convert to JSON for display and tooling.
    ///
    /// An object or namespace that contains itself is written as
    /// `"[Circular]"`.
    pub fn to_json(&self) -> serde_json::Value {
        self.to_json_within(&mut Vec::new())
    }

    /// `to_json` below the reference values in `ancestors`
    pub(crate) fn to_json_within(&self, ancestors: &mut Vec<usize>) -> serde_json::Value {
        use serde_json::Value as Json;

        match self {
            Value::Undefined | Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Number(n) if n.fract() == 0.0 && n.abs() < 9.0e15 => Json::from(*n as i64),
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Value::String(s) => Json::String(s.to_string()),
            Value::Array(items) => Json::Array(
                items
                    .iter()
                    .map(|item| item.to_json_within(ancestors))
                    .collect(),
            ),
            Value::Object(obj) => nested(ancestors, Arc::as_ptr(obj) as usize, |ancestors| {
                Json::Object(
                    obj.entries()
                        .into_iter()
                        .map(|(k, v)| (k, v.to_json_within(ancestors)))
                        .collect(),
                )
            }),
            Value::Function(f) => Json::String(format!("[Function: {}]", f.name())),
            Value::Error(_) => Json::String(self.to_string()),
            Value::Namespace(ns) => nested(ancestors, Arc::as_ptr(ns) as usize, |ancestors| {
                ns.to_json_within(ancestors)
            }),
        }
    }

    /// Convert parsed JSON into a value (used for JSON modules)
    pub fn from_json(json: &serde_json::Value) -> Value {
        use serde_json::Value as Json;

        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(*b),
            Json::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            Json::String(s) => Value::from(s.as_str()),
            Json::Array(items) => Value::array(items.iter().map(Value::from_json)),
            Json::Object(map) => Value::Object(JsObject::from_entries(
                map.iter().map(|(k, v)| (k.clone(), Value::from_json(v))),
            )),
        }
    }
}

/// Marker written in place of a value that contains itself
pub(crate) const CIRCULAR: &str = "[Circular]";

/// Serialize the reference value at `address` unless it is already being written
pub(crate) fn nested(
    ancestors: &mut Vec<usize>,
    address: usize,
    write: impl FnOnce(&mut Vec<usize>) -> serde_json::Value,
) -> serde_json::Value {
    if ancestors.contains(&address) {
        return serde_json::Value::String(CIRCULAR.to_string());
    }
    ancestors.push(address);
    let json = write(ancestors);
    ancestors.pop();
    json
}

fn format_number(n: f64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if n.is_nan() {
        write!(f, "NaN")
    } else if n.is_infinite() {
        write!(f, "{}", if n > 0.0 { "Infinity" } else { "-Infinity" })
    } else if n == 0.0 {
        write!(f, "0")
    } else if n == n.trunc() && n.abs() < 1e21 {
        write!(f, "{:.0}", n)
    } else {
        write!(f, "{}", n)
    }
}

/// JavaScript `ToString`
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => format_number(*n, f),
            Value::String(s) => write!(f, "{}", s),
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    if !matches!(item, Value::Undefined | Value::Null) {
                        write!(f, "{}", item)?;
                    }
                }
                Ok(())
            }
            Value::Object(_) => write!(f, "[object Object]"),
            Value::Function(func) => write!(f, "function {}() {{ [native code] }}", func.name()),
            Value::Error(err) if err.message.is_empty() => write!(f, "{}", err.name),
            Value::Error(err) => write!(f, "{}: {}", err.name, err.message),
            Value::Namespace(_) => write!(f, "[object Module]"),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{:?}", s),
            Value::Array(items) => f.debug_list().entries(items.iter()).finish(),
            Value::Object(obj) => f
                .debug_map()
                .entries(obj.entries().into_iter())
                .finish(),
            Value::Namespace(ns) => write!(f, "[Module: {}]", ns.url()),
            other => write!(f, "{}", other),
        }
    }
}

/// Equality follows `===`
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.strict_equals(other)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Arc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Arc::from(s))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<ObjectRef> for Value {
    fn from(obj: ObjectRef) -> Self {
        Value::Object(obj)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_string() {
        assert_eq!(Value::from(42).to_string(), "42");
        assert_eq!(Value::from(1.5).to_string(), "1.5");
        assert_eq!(Value::Undefined.to_string(), "undefined");
        assert_eq!(
            Value::array([Value::from("a"), Value::Null, Value::from(1)]).to_string(),
            "a,,1"
        );
        assert_eq!(Value::error("TypeError", "bad").to_string(), "TypeError: bad");
    }

    #[test]
    fn test_large_integers_format_without_saturating() {
        assert_eq!(Value::from(1e20).to_string(), "100000000000000000000");
        assert_eq!(Value::from(-9.3e18).to_string(), "-9300000000000000000");
        assert_eq!(Value::from(-0.0).to_string(), "0");
    }

    #[test]
    fn test_to_json_marks_self_containing_object() {
        let obj = JsObject::from_entries([("a", Value::from(1))]);
        obj.set("self", Value::Object(obj.clone()));
        let shared = JsObject::from_entries([("b", Value::from(2))]);
        obj.set("left", Value::Object(shared.clone()));
        obj.set("right", Value::Object(shared));

        assert_eq!(
            Value::Object(obj).to_json(),
            serde_json::json!({
                "a": 1,
                "self": "[Circular]",
                "left": { "b": 2 },
                "right": { "b": 2 },
            })
        );
    }

    #[test]
    fn test_strict_equality() {
        assert_eq!(Value::from("x"), Value::from("x"));
        assert_ne!(Value::from(1), Value::from("1"));

        let obj = JsObject::new();
        let a = Value::Object(obj.clone());
        let b = Value::Object(obj);
        assert_eq!(a, b);
        assert_ne!(a, Value::Object(JsObject::new()));

        let f = Value::function("f", |_| Ok(Value::Undefined));
        assert_eq!(f.clone(), f);
        assert_ne!(f, Value::function("f", |_| Ok(Value::Undefined)));
    }

    #[test]
    fn test_object_property_order() {
        let obj = JsObject::from_entries([("b", Value::from(1)), ("a", Value::from(2))]);
        obj.set("c", Value::from(3));
        assert_eq!(obj.keys(), vec!["b", "a", "c"]);
        assert_eq!(Value::Object(obj).get_property("a"), Value::from(2));
    }

    #[test]
    fn test_json_conversion() {
        let json = serde_json::json!({"name": "otter", "tags": ["a", 1, true], "none": null});
        let value = Value::from_json(&json);
        assert_eq!(value.get_property("name"), Value::from("otter"));
        assert_eq!(value.to_json(), json);
    }

    #[test]
    fn test_native_function_call() {
        let add = NativeFunction::new("add", |args| {
            let sum = args.iter().filter_map(Value::as_number).sum::<f64>();
            Ok(Value::from(sum))
        });
        assert_eq!(add.call(&[Value::from(1), Value::from(2)]), Ok(Value::from(3)));
        assert_eq!(add.name(), "add");
    }
}
