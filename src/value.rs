//! Typed node and site metadata.
//!
//! Metadata arrives from several places (YAML front matter, `site.toml`,
//! extensions) and is read back by extensions and templates. It is stored as
//! a small closed set of value kinds rather than an open-ended dynamic type:
//!
//! | Kind | Example source |
//! |------|----------------|
//! | `Null` | `title:` with no value |
//! | `Bool` | `draft: true` |
//! | `Int` / `Float` | `order: 10`, `weight: 0.5` |
//! | `String` | `title: About` |
//! | `List` | `tags: [rust, web]` |
//! | `Map` | `crumbs: {names: [...], links: [...]}` |
//!
//! The enum is `#[serde(untagged)]`, so YAML and TOML deserialize straight
//! into it and template engines receive plain values when it is serialized.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A metadata map keyed by normalized key (see [`normalize_keys`]).
pub type Metadata = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::String(s) => f.write_str(s),
            Value::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
            Value::Map(_) => f.write_str("[map]"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
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
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Value::Map(map)
    }
}

/// Normalize a metadata key: lower-case, spaces and hyphens become
/// underscores. `"Menu Title"`, `"menu-title"` and `"menu_title"` all map to
/// `"menu_title"`.
pub fn normalize_key(key: &str) -> String {
    key.to_lowercase().replace([' ', '-'], "_")
}

/// Normalize every top-level key of a metadata map. Nested maps are left as
/// authored. Later keys win when two keys normalize to the same string.
pub fn normalize_keys(meta: Metadata) -> Metadata {
    meta.into_iter()
        .map(|(key, value)| (normalize_key(&key), value))
        .collect()
}
