//! Typed declarative values and conversion from dynamic API payloads.
//!
//! The platform API returns arbitrarily nested JSON. Before emission every
//! payload is converted into a closed [`ConfigValue`] tree so the emitter
//! never has to reason about dynamic typing. Conversion is total: a leaf
//! the converter cannot represent is dropped and reported as a
//! [`ConversionWarning`] rather than aborting the export.

use std::collections::BTreeMap;
use std::fmt;

/// A numeric attribute value.
///
/// Integers and floats are kept distinct so that an integral JSON number
/// round-trips as an integer instead of being reformatted as a float.
#[derive(Debug, Clone, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(i) => write!(f, "{}", i),
            Number::Float(x) => write!(f, "{}", x),
        }
    }
}

/// A typed declarative attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    String(String),
    Number(Number),
    Bool(bool),
    List(Vec<ConfigValue>),
    Object(BTreeMap<String, ConfigValue>),
    Null,
}

impl ConfigValue {
    /// Integer constructor, mostly for tests and fixtures.
    pub fn int(i: i64) -> Self {
        ConfigValue::Number(Number::Int(i))
    }

    /// String constructor.
    pub fn string(s: impl Into<String>) -> Self {
        ConfigValue::String(s.into())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&BTreeMap<String, ConfigValue>> {
        match self {
            ConfigValue::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Whether this value carries nothing worth emitting.
    pub fn is_empty(&self) -> bool {
        match self {
            ConfigValue::Null => true,
            ConfigValue::List(items) => items.is_empty(),
            ConfigValue::Object(map) => map.is_empty(),
            _ => false,
        }
    }
}

/// A non-fatal conversion issue, surfaced to the caller as data.
#[derive(Debug, Clone)]
pub struct ConversionWarning {
    /// Dotted path of the attribute that was dropped.
    pub path: String,
    /// What the converter could not represent.
    pub detail: String,
}

impl fmt::Display for ConversionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dropped `{}`: {}", self.path, self.detail)
    }
}

/// Convert a dynamic JSON value into a typed [`ConfigValue`] tree.
///
/// Returns `None` when the value converts to nothing emittable (an empty
/// list or object, or an unsupported leaf). Empty containers nested under
/// a key are omitted from their parent entirely, never emitted as
/// `[]`/`{}`. Unsupported leaves are dropped with a warning; the run
/// continues.
pub fn convert(value: &serde_json::Value) -> (Option<ConfigValue>, Vec<ConversionWarning>) {
    let mut warnings = Vec::new();
    let converted = convert_at(value, "", &mut warnings);
    (converted, warnings)
}

fn convert_at(
    value: &serde_json::Value,
    path: &str,
    warnings: &mut Vec<ConversionWarning>,
) -> Option<ConfigValue> {
    match value {
        serde_json::Value::Null => Some(ConfigValue::Null),
        serde_json::Value::Bool(b) => Some(ConfigValue::Bool(*b)),
        serde_json::Value::String(s) => Some(ConfigValue::String(s.clone())),
        serde_json::Value::Number(n) => convert_number(n, path, warnings),
        serde_json::Value::Array(items) => {
            let mut out = Vec::new();
            for (idx, item) in items.iter().enumerate() {
                let child_path = format!("{}[{}]", path, idx);
                if let Some(v) = convert_at(item, &child_path, warnings) {
                    if !v.is_empty() {
                        out.push(v);
                    }
                }
            }
            if out.is_empty() {
                None
            } else {
                Some(ConfigValue::List(out))
            }
        }
        serde_json::Value::Object(map) => {
            let mut out = BTreeMap::new();
            for (key, item) in map {
                let child_path = join_path(path, key);
                if let Some(v) = convert_at(item, &child_path, warnings) {
                    if !v.is_empty() {
                        out.insert(key.clone(), v);
                    }
                }
            }
            if out.is_empty() {
                None
            } else {
                Some(ConfigValue::Object(out))
            }
        }
    }
}

fn convert_number(
    n: &serde_json::Number,
    path: &str,
    warnings: &mut Vec<ConversionWarning>,
) -> Option<ConfigValue> {
    if let Some(i) = n.as_i64() {
        return Some(ConfigValue::Number(Number::Int(i)));
    }
    // u64 values beyond i64::MAX would lose precision as f64; drop them
    // instead of truncating.
    if n.as_u64().is_some() {
        warnings.push(ConversionWarning {
            path: path.to_string(),
            detail: format!("integer {} does not fit a 64-bit signed value", n),
        });
        return None;
    }
    match n.as_f64() {
        Some(f) if f.is_finite() => Some(ConfigValue::Number(Number::Float(f))),
        _ => {
            warnings.push(ConversionWarning {
                path: path.to_string(),
                detail: format!("unsupported numeric value {}", n),
            });
            None
        }
    }
}

/// Join a dotted attribute path with a child key.
pub fn join_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", parent, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalars_map_one_to_one() {
        let (v, w) = convert(&json!("hello"));
        assert_eq!(v, Some(ConfigValue::string("hello")));
        assert!(w.is_empty());

        let (v, _) = convert(&json!(true));
        assert_eq!(v, Some(ConfigValue::Bool(true)));

        let (v, _) = convert(&json!(3.5));
        assert_eq!(v, Some(ConfigValue::Number(Number::Float(3.5))));
    }

    #[test]
    fn test_integral_number_stays_integer() {
        let (v, w) = convert(&json!({"a": [], "b": {"c": 1}}));
        assert!(w.is_empty());
        let obj = match v {
            Some(ConfigValue::Object(map)) => map,
            other => panic!("expected object, got {:?}", other),
        };
        // The empty list under `a` is omitted entirely.
        assert!(!obj.contains_key("a"));
        let b = obj.get("b").and_then(|v| v.as_object()).unwrap();
        assert_eq!(b.get("c"), Some(&ConfigValue::int(1)));
    }

    #[test]
    fn test_empty_containers_dropped_recursively() {
        let (v, _) = convert(&json!({"outer": {"inner": []}}));
        // inner is empty, which empties outer, which empties the root.
        assert_eq!(v, None);
    }

    #[test]
    fn test_empty_list_elements_dropped() {
        let (v, _) = convert(&json!(["a", {}, "b"]));
        assert_eq!(
            v,
            Some(ConfigValue::List(vec![
                ConfigValue::string("a"),
                ConfigValue::string("b"),
            ]))
        );
    }

    #[test]
    fn test_oversized_integer_dropped_with_warning() {
        let raw = json!({"big": u64::MAX});
        let (v, w) = convert(&raw);
        assert_eq!(v, None);
        assert_eq!(w.len(), 1);
        assert_eq!(w[0].path, "big");
    }

    #[test]
    fn test_warning_paths_are_dotted() {
        let raw = json!({"nested": {"deep": [u64::MAX]}});
        let (_, w) = convert(&raw);
        assert_eq!(w.len(), 1);
        assert_eq!(w[0].path, "nested.deep[0]");
    }
}
