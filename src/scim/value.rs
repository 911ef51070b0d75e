//! Runtime attribute values.
//!
//! Resources reach the engine as untyped JSON. [`Attributes`] is the
//! semantic container the filter evaluator and PATCH validator work on: a
//! mapping from attribute name (matched case-insensitively) to a tagged
//! [`AttrValue`].
//!
//! ## Merge and coercion rules
//!
//! - [`Attributes::insert`] replaces an existing entry whose key matches
//!   case-insensitively; the spelling of the first insert is kept.
//! - [`Attributes::merge`] inserts every entry of the right-hand side, so
//!   right-hand values win.
//! - JSON numbers become [`AttrValue::Integer`] when they fit an `i64` and
//!   [`AttrValue::Decimal`] otherwise. Every Rust integer width converts to
//!   `Integer` and both float widths to `Decimal`, so the comparator sees one
//!   canonical representation per numeric kind.

use std::fmt;

use serde_json::{Map, Number, Value};

use super::error::ScimError;

/// A single runtime attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Null,
    String(String),
    Boolean(bool),
    Integer(i64),
    Decimal(f64),
    Complex(Attributes),
    List(Vec<AttrValue>),
}

impl AttrValue {
    pub fn is_null(&self) -> bool {
        matches!(self, AttrValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_complex(&self) -> Option<&Attributes> {
        match self {
            AttrValue::Complex(attrs) => Some(attrs),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[AttrValue]> {
        match self {
            AttrValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Presence per RFC 7644 `pr`: non-null, and non-empty for collections.
    pub fn is_present(&self) -> bool {
        match self {
            AttrValue::Null => false,
            AttrValue::List(items) => !items.is_empty(),
            _ => true,
        }
    }

    /// Short name of the variant, used in error details.
    pub fn kind(&self) -> &'static str {
        match self {
            AttrValue::Null => "null",
            AttrValue::String(_) => "string",
            AttrValue::Boolean(_) => "boolean",
            AttrValue::Integer(_) => "integer",
            AttrValue::Decimal(_) => "decimal",
            AttrValue::Complex(_) => "complex",
            AttrValue::List(_) => "list",
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            AttrValue::Null => Value::Null,
            AttrValue::String(s) => Value::String(s.clone()),
            AttrValue::Boolean(b) => Value::Bool(*b),
            AttrValue::Integer(i) => Value::Number((*i).into()),
            AttrValue::Decimal(d) => Number::from_f64(*d).map_or(Value::Null, Value::Number),
            AttrValue::Complex(attrs) => attrs.to_json(),
            AttrValue::List(items) => Value::Array(items.iter().map(AttrValue::to_json).collect()),
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Null => write!(f, "null"),
            AttrValue::String(s) => write!(f, "{}", s),
            AttrValue::Boolean(b) => write!(f, "{}", b),
            AttrValue::Integer(i) => write!(f, "{}", i),
            AttrValue::Decimal(d) => write!(f, "{}", d),
            AttrValue::Complex(_) | AttrValue::List(_) => write!(f, "{}", self.to_json()),
        }
    }
}

macro_rules! integer_from {
    ($($t:ty),*) => {
        $(impl From<$t> for AttrValue {
            fn from(v: $t) -> Self {
                AttrValue::Integer(i64::from(v))
            }
        })*
    };
}

integer_from!(i8, i16, i32, i64, u8, u16, u32);

impl From<u64> for AttrValue {
    fn from(v: u64) -> Self {
        i64::try_from(v).map_or(AttrValue::Decimal(v as f64), AttrValue::Integer)
    }
}

impl From<f32> for AttrValue {
    fn from(v: f32) -> Self {
        AttrValue::Decimal(f64::from(v))
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Decimal(v)
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        AttrValue::Boolean(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::String(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        AttrValue::String(v)
    }
}

impl From<Attributes> for AttrValue {
    fn from(v: Attributes) -> Self {
        AttrValue::Complex(v)
    }
}

impl<T: Into<AttrValue>> From<Vec<T>> for AttrValue {
    fn from(v: Vec<T>) -> Self {
        AttrValue::List(v.into_iter().map(Into::into).collect())
    }
}

impl From<&Number> for AttrValue {
    fn from(n: &Number) -> Self {
        if let Some(i) = n.as_i64() {
            AttrValue::Integer(i)
        } else {
            AttrValue::Decimal(n.as_f64().unwrap_or(f64::NAN))
        }
    }
}

impl From<Value> for AttrValue {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => AttrValue::Null,
            Value::Bool(b) => AttrValue::Boolean(b),
            Value::Number(n) => AttrValue::from(&n),
            Value::String(s) => AttrValue::String(s),
            Value::Array(items) => AttrValue::List(items.into_iter().map(Into::into).collect()),
            Value::Object(map) => AttrValue::Complex(Attributes::from(map)),
        }
    }
}

impl From<&Value> for AttrValue {
    fn from(v: &Value) -> Self {
        AttrValue::from(v.clone())
    }
}

/// Case-insensitive, insertion-ordered attribute map for one resource (or
/// one complex value within it).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes {
    entries: Vec<(String, AttrValue)>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a JSON document, which must be an object.
    pub fn from_json(value: &Value) -> Result<Self, ScimError> {
        match value {
            Value::Object(map) => Ok(Self::from(map.clone())),
            other => Err(ScimError::invalid_syntax(format!(
                "expected a JSON object for resource attributes, got {}",
                json_kind(other)
            ))),
        }
    }

    pub fn to_json(&self) -> Value {
        Value::Object(
            self.entries
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect::<Map<String, Value>>(),
        )
    }

    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Insert or replace, returning the previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<AttrValue>) -> Option<AttrValue> {
        let name = name.into();
        let value = value.into();
        match self
            .entries
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(&name))
        {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((name, value));
                None
            }
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<AttrValue> {
        let pos = self
            .entries
            .iter()
            .position(|(k, _)| k.eq_ignore_ascii_case(name))?;
        Some(self.entries.remove(pos).1)
    }

    /// Merge `other` into `self`; entries from `other` win.
    pub fn merge(&mut self, other: Attributes) {
        for (k, v) in other.entries {
            self.insert(k, v);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttrValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl From<Map<String, Value>> for Attributes {
    fn from(map: Map<String, Value>) -> Self {
        let mut attrs = Attributes::new();
        for (k, v) in map {
            attrs.insert(k, AttrValue::from(v));
        }
        attrs
    }
}

impl<K: Into<String>, V: Into<AttrValue>> FromIterator<(K, V)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut attrs = Attributes::new();
        for (k, v) in iter {
            attrs.insert(k, v);
        }
        attrs
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
