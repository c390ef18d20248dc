use indexmap::IndexMap;
use serde_json::{Map, Number, Value as Json};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// Key/value mapping carried by [`Value::Object`]. Keeps insertion order;
/// equality ignores it.
pub type Object = IndexMap<String, Value>;

/// Runtime value flowing through every compiled node.
///
/// `Undefined` is what a missing context path evaluates to and stays distinct
/// from an explicit `Null`. Strings, arrays and objects are `Arc`-shared so
/// cloning a value (or a compiled literal) never deep-copies.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    Array(Arc<Vec<Value>>),
    Object(Arc<Object>),
}

impl Value {
    pub fn string(s: impl AsRef<str>) -> Self {
        Value::Str(Arc::from(s.as_ref()))
    }

    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Arc::new(items))
    }

    pub fn object(entries: Object) -> Self {
        Value::Object(Arc::new(entries))
    }

    #[inline]
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Truthiness used by `if`, `not`, `and`, `or` and logic-map conditions.
    ///
    /// Arrays and objects are always truthy, empty or not.
    #[inline]
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(f) => *f != 0.0 && !f.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) => true,
        }
    }

    #[inline]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_ref()),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(entries) => Some(entries.as_ref()),
            _ => None,
        }
    }

    /// Name reported by the `typeof` operation.
    ///
    /// Unlike JavaScript, arrays report `"array"` and null reports `"null"`
    /// rather than `"object"`.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) | Value::Float(_) => "number",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    /// Ordering for `gt`/`gte`/`lt`/`lte`: numeric for two numbers,
    /// lexicographic for two strings, `None` for anything else. There is no
    /// JavaScript-style coercion, so `"10" > 9` and `null >= 0` are false.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => Some(a.as_ref().cmp(b.as_ref())),
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => a.partial_cmp(&b),
                _ => None,
            },
        }
    }

    /// String coercion used by `concat`, `join` and string templates.
    pub fn display_string(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(n) => n.to_string(),
            Value::Float(f) => format_f64(*f),
            Value::Str(s) => s.to_string(),
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::Undefined | Value::Null => String::new(),
                    other => other.display_string(),
                })
                .collect::<Vec<_>>()
                .join(","),
            Value::Object(_) => "[object Object]".to_string(),
        }
    }

    /// Convert back into JSON. `Undefined` becomes `null`, except as an
    /// object member where the key is dropped.
    pub fn to_json(&self) -> Json {
        match self {
            Value::Undefined | Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Int(n) => Json::Number(Number::from(*n)),
            Value::Float(f) => Number::from_f64(*f).map(Json::Number).unwrap_or(Json::Null),
            Value::Str(s) => Json::String(s.to_string()),
            Value::Array(items) => Json::Array(items.iter().map(Value::to_json).collect()),
            Value::Object(entries) => {
                let map: Map<String, Json> = entries
                    .iter()
                    .filter(|(_, v)| !v.is_undefined())
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect();
                Json::Object(map)
            }
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) => (*a as f64) == *b,
            (Value::Float(a), Value::Int(b)) => *a == (*b as f64),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_string())
    }
}

/// Number to string the way JavaScript prints it: exponent form from `1e21`
/// up and below `1e-6`, shortest round-trip digits otherwise.
pub(crate) fn format_f64(f: f64) -> String {
    if f.is_nan() {
        return "NaN".to_string();
    }
    if f.is_infinite() {
        let text = if f > 0.0 { "Infinity" } else { "-Infinity" };
        return text.to_string();
    }
    if f == 0.0 {
        return "0".to_string();
    }
    let abs = f.abs();
    if abs >= 1e21 || abs < 1e-6 {
        let text = format!("{f:e}");
        return match text.split_once('e') {
            Some((mantissa, exponent)) if !exponent.starts_with('-') => {
                format!("{mantissa}e+{exponent}")
            }
            _ => text,
        };
    }
    f.to_string()
}

impl From<Json> for Value {
    fn from(v: Json) -> Self {
        Value::from(&v)
    }
}

impl From<&Json> for Value {
    fn from(v: &Json) -> Self {
        match v {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(*b),
            Json::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else if let Some(f) = n.as_f64() {
                    Value::Float(f)
                } else {
                    Value::Null
                }
            }
            Json::String(s) => Value::string(s),
            Json::Array(items) => Value::array(items.iter().map(Value::from).collect()),
            Json::Object(entries) => Value::object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&Value> for Json {
    fn from(v: &Value) -> Self {
        v.to_json()
    }
}

impl From<Value> for Json {
    fn from(v: Value) -> Self {
        v.to_json()
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Arc::from(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn empty_collections_are_truthy() {
        assert!(Value::array(vec![]).is_truthy());
        assert!(Value::object(Object::new()).is_truthy());
        assert!(!Value::string("").is_truthy());
        assert!(!Value::Float(f64::NAN).is_truthy());
        assert!(!Value::Undefined.is_truthy());
    }

    #[test]
    fn undefined_members_are_dropped_from_json_objects() {
        let mut entries = Object::new();
        entries.insert("kept".into(), Value::Int(1));
        entries.insert("missing".into(), Value::Undefined);
        let value = Value::array(vec![Value::object(entries), Value::Undefined]);
        assert_eq!(value.to_json(), json!([{"kept": 1}, null]));
    }

    #[test]
    fn display_string_follows_string_coercion() {
        assert_eq!(Value::Float(5.0).display_string(), "5");
        assert_eq!(Value::Float(2.5).display_string(), "2.5");
        assert_eq!(Value::from(json!([1, null, "a"])).display_string(), "1,,a");
        assert_eq!(Value::from(json!({"a": 1})).display_string(), "[object Object]");
    }

    #[test]
    fn large_and_tiny_floats_use_exponent_form() {
        assert_eq!(format_f64(1e21), "1e+21");
        assert_eq!(format_f64(-2.5e22), "-2.5e+22");
        assert_eq!(format_f64(1e-7), "1e-7");
        assert_eq!(format_f64(1.5e-7), "1.5e-7");
        assert_eq!(format_f64(0.000001), "0.000001");
        assert_eq!(format_f64(123456789012345680000.0), "123456789012345680000");
        assert_eq!(format_f64(-0.0), "0");
    }

    #[test]
    fn objects_keep_insertion_order() {
        let value = Value::from(json!({"zeta": 1, "alpha": 2}));
        let keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["zeta", "alpha"]);
        assert_eq!(serde_json::to_string(&value.to_json()).unwrap(), r#"{"zeta":1,"alpha":2}"#);
        assert_eq!(value, Value::from(json!({"alpha": 2, "zeta": 1})));
    }

    #[test]
    fn mixed_kinds_do_not_order() {
        assert_eq!(Value::Int(3).compare(&Value::Float(2.5)), Some(Ordering::Greater));
        assert_eq!(Value::string("a").compare(&Value::string("b")), Some(Ordering::Less));
        assert_eq!(Value::string("3").compare(&Value::Int(2)), None);
    }

    #[test]
    fn int_and_float_compare_equal() {
        assert_eq!(Value::Int(5), Value::Float(5.0));
        assert_ne!(Value::Null, Value::Undefined);
    }
}
