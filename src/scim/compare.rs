//! Type-aware comparison and value coercion.
//!
//! A [`Comparator`] is built once per filter node from the target
//! attribute's definition, the operator and the reference literal. Building
//! it validates that the operator is meaningful for the attribute type and
//! that the literal can be read as that type; evaluating it against a
//! runtime value returns `Ok(())` on a match or a [`Mismatch`] describing
//! why the value did not match.
//!
//! | type                         | eq/ne | co/sw/ew        | gt/ge/lt/le       |
//! |------------------------------|-------|-----------------|-------------------|
//! | string, reference, binary    | yes   | yes             | lexicographic     |
//! | boolean                      | yes   | `"true"/"false"`| `InvalidFilter`   |
//! | integer, decimal             | yes   | decimal string  | numeric           |
//! | dateTime                     | yes   | source literal  | chronological     |
//! | complex                      | `InvalidFilter` for every operator        |
//!
//! String comparisons fold case unless the attribute is `caseExact`.
//!
//! [`coerce_value`] applies the PATCH-side rules, which are looser: numeric
//! strings are accepted for numbers and `"true"`/`"false"` for booleans.

use std::cmp::Ordering;

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use serde_json::Value;

use super::{
    error::ScimError,
    filter::{CompareOp, FilterValue},
    types::{Attribute, AttributeType},
    value::{AttrValue, Attributes, json_kind},
};

/// Why a runtime value failed a comparison.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Mismatch {
    #[error("'{attribute}' value {actual} does not satisfy {op} {expected}")]
    Unsatisfied {
        attribute: String,
        op: CompareOp,
        expected: String,
        actual: String,
    },

    #[error("'{attribute}' expects a {expected} value but found {found}")]
    WrongType {
        attribute: String,
        expected: AttributeType,
        found: &'static str,
    },
}

/// Parsed form of the reference literal.
#[derive(Debug, Clone, PartialEq)]
enum Parsed {
    Text,
    Boolean(bool),
    Integer(i64),
    Decimal(f64),
    DateTime(DateTime<FixedOffset>),
}

/// A compiled predicate for one `attr op value` filter node.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparator {
    attribute: String,
    attr_type: AttributeType,
    op: CompareOp,
    fold_case: bool,
    /// Reference literal as text, already case-folded when `fold_case`
    text: String,
    parsed: Parsed,
}

impl Comparator {
    /// Build a comparator for `attr op reference`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidFilter` when the operator is not defined for the
    /// attribute type, the attribute is complex, or the reference literal
    /// cannot be read as the attribute type.
    pub fn new(attr: &Attribute, op: CompareOp, reference: &FilterValue) -> Result<Self, ScimError> {
        let invalid = |why: String| {
            ScimError::invalid_filter(format!(
                "cannot apply '{}' to {} attribute '{}': {}",
                op, attr.attr_type, attr.name, why
            ))
        };

        if matches!(reference, FilterValue::Null) {
            return Err(invalid("null is only comparable with eq or ne".into()));
        }

        let substring = matches!(op, CompareOp::Co | CompareOp::Sw | CompareOp::Ew);
        let literal = reference.as_text();

        let (fold_case, parsed) = match attr.attr_type {
            AttributeType::Complex => {
                return Err(invalid(
                    "complex attributes are only reachable through a sub-attribute or value path"
                        .into(),
                ));
            }
            AttributeType::String | AttributeType::Reference | AttributeType::Binary => {
                if !matches!(reference, FilterValue::String(_)) {
                    return Err(invalid(format!("expected a string, got {}", reference)));
                }
                (attr.folds_case(), Parsed::Text)
            }
            AttributeType::Boolean => {
                if op.is_ordering() {
                    return Err(invalid("booleans have no ordering".into()));
                }
                if substring {
                    (true, Parsed::Text)
                } else {
                    let b = match reference {
                        FilterValue::Bool(b) => *b,
                        FilterValue::String(s) => parse_bool(s)
                            .ok_or_else(|| invalid(format!("'{}' is not a boolean", s)))?,
                        other => return Err(invalid(format!("'{}' is not a boolean", other))),
                    };
                    (true, Parsed::Boolean(b))
                }
            }
            AttributeType::Integer if !substring => {
                let i = parse_integer(&literal)
                    .ok_or_else(|| invalid(format!("'{}' is not an integer", literal)))?;
                (false, Parsed::Integer(i))
            }
            AttributeType::Decimal if !substring => {
                let d = parse_decimal(&literal)
                    .ok_or_else(|| invalid(format!("'{}' is not a number", literal)))?;
                (false, Parsed::Decimal(d))
            }
            AttributeType::DateTime if !substring => {
                let t = parse_date_time(&literal)
                    .ok_or_else(|| invalid(format!("'{}' is not an xsd:dateTime", literal)))?;
                (false, Parsed::DateTime(t))
            }
            AttributeType::Integer | AttributeType::Decimal | AttributeType::DateTime => {
                (false, Parsed::Text)
            }
        };

        Ok(Self {
            attribute: attr.name.clone(),
            attr_type: attr.attr_type,
            op,
            fold_case,
            text: fold(&literal, fold_case),
            parsed,
        })
    }

    pub fn op(&self) -> CompareOp {
        self.op
    }

    pub fn matches(&self, value: &AttrValue) -> bool {
        self.check(value).is_ok()
    }

    /// Evaluate against one runtime value.
    pub fn check(&self, value: &AttrValue) -> Result<(), Mismatch> {
        let satisfied = match (&self.parsed, self.op) {
            (Parsed::Text, CompareOp::Co | CompareOp::Sw | CompareOp::Ew) => {
                let actual = fold(&self.render(value)?, self.fold_case);
                match self.op {
                    CompareOp::Co => actual.contains(&self.text),
                    CompareOp::Sw => actual.starts_with(&self.text),
                    _ => actual.ends_with(&self.text),
                }
            }
            (Parsed::Text, op) => {
                let actual = fold(&self.render(value)?, self.fold_case);
                ordering_holds(op, Some(actual.as_str().cmp(self.text.as_str())))
            }
            (Parsed::Boolean(expected), op) => match value {
                AttrValue::Boolean(b) => ordering_holds(op, Some(b.cmp(expected))),
                other => return Err(self.wrong_type(other)),
            },
            (Parsed::Integer(expected), op) => {
                let actual = as_integer(value).ok_or_else(|| self.wrong_type(value))?;
                ordering_holds(op, Some(actual.cmp(expected)))
            }
            (Parsed::Decimal(expected), op) => {
                let actual = as_decimal(value).ok_or_else(|| self.wrong_type(value))?;
                ordering_holds(op, actual.partial_cmp(expected))
            }
            (Parsed::DateTime(expected), op) => {
                let actual = value
                    .as_str()
                    .and_then(parse_date_time)
                    .ok_or_else(|| self.wrong_type(value))?;
                ordering_holds(op, Some(actual.cmp(expected)))
            }
        };

        if satisfied {
            Ok(())
        } else {
            Err(Mismatch::Unsatisfied {
                attribute: self.attribute.clone(),
                op: self.op,
                expected: self.text.clone(),
                actual: value.to_string(),
            })
        }
    }

    /// Textual form of `value` for string-style comparisons, checking that
    /// the runtime kind fits the attribute type.
    fn render(&self, value: &AttrValue) -> Result<String, Mismatch> {
        let fits = match (self.attr_type, value) {
            (
                AttributeType::String
                | AttributeType::Reference
                | AttributeType::Binary
                | AttributeType::DateTime,
                AttrValue::String(_),
            ) => true,
            (AttributeType::Boolean, AttrValue::Boolean(_)) => true,
            (AttributeType::Integer, v) => as_integer(v).is_some(),
            (AttributeType::Decimal, v) => as_decimal(v).is_some(),
            _ => false,
        };
        if !fits {
            return Err(self.wrong_type(value));
        }
        Ok(match (self.attr_type, value) {
            (AttributeType::Integer, v) => as_integer(v).map(|i| i.to_string()).unwrap_or_default(),
            (_, v) => v.to_string(),
        })
    }

    fn wrong_type(&self, value: &AttrValue) -> Mismatch {
        Mismatch::WrongType {
            attribute: self.attribute.clone(),
            expected: self.attr_type,
            found: value.kind(),
        }
    }
}

/// Build a comparator; shorthand for [`Comparator::new`].
pub fn compare(
    attr: &Attribute,
    op: CompareOp,
    reference: &FilterValue,
) -> Result<Comparator, ScimError> {
    Comparator::new(attr, op, reference)
}

fn ordering_holds(op: CompareOp, ordering: Option<Ordering>) -> bool {
    let Some(ordering) = ordering else {
        return op == CompareOp::Ne;
    };
    match op {
        CompareOp::Eq => ordering == Ordering::Equal,
        CompareOp::Ne => ordering != Ordering::Equal,
        CompareOp::Gt => ordering == Ordering::Greater,
        CompareOp::Ge => ordering != Ordering::Less,
        CompareOp::Lt => ordering == Ordering::Less,
        CompareOp::Le => ordering != Ordering::Greater,
        CompareOp::Co | CompareOp::Sw | CompareOp::Ew => false,
    }
}

fn fold(s: &str, fold_case: bool) -> String {
    if fold_case {
        s.to_lowercase()
    } else {
        s.to_string()
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    if s.eq_ignore_ascii_case("true") {
        Some(true)
    } else if s.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

fn parse_integer(s: &str) -> Option<i64> {
    let s = s.trim();
    s.parse::<i64>()
        .ok()
        .or_else(|| parse_decimal(s).and_then(integral))
}

fn parse_decimal(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|d| d.is_finite())
}

fn integral(d: f64) -> Option<i64> {
    // 2^63 is exactly representable and one past `i64::MAX`.
    (d.fract() == 0.0 && (-9_223_372_036_854_775_808.0..9_223_372_036_854_775_808.0).contains(&d))
        .then_some(d as i64)
}

fn as_integer(value: &AttrValue) -> Option<i64> {
    match value {
        AttrValue::Integer(i) => Some(*i),
        AttrValue::Decimal(d) => integral(*d),
        _ => None,
    }
}

fn as_decimal(value: &AttrValue) -> Option<f64> {
    match value {
        AttrValue::Integer(i) => Some(*i as f64),
        AttrValue::Decimal(d) => Some(*d),
        _ => None,
    }
}

/// Parse an xsd:dateTime. Values without an offset are taken as UTC.
pub fn parse_date_time(s: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(s).ok().or_else(|| {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc().fixed_offset())
    })
}

// =============================================================================
// PATCH value coercion
// =============================================================================

/// Coerce a client-supplied JSON value into the canonical representation
/// for `attr`.
///
/// Multi-valued attributes always yield [`AttrValue::List`]; a bare value is
/// wrapped as a single element. Unknown keys inside complex values are
/// dropped.
pub fn coerce_value(attr: &Attribute, value: &Value) -> Result<AttrValue, ScimError> {
    if attr.multi_valued {
        let items = match value {
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    coerce_single(attr, item).map_err(|e| e.with_context(format!("element {}", i)))
                })
                .collect::<Result<Vec<_>, _>>()?,
            single => vec![coerce_single(attr, single)?],
        };
        return Ok(AttrValue::List(items));
    }
    coerce_single(attr, value)
}

/// Coerce one value (or one element of a multi-valued attribute).
pub fn coerce_single(attr: &Attribute, value: &Value) -> Result<AttrValue, ScimError> {
    let reject = || {
        ScimError::invalid_value(format!(
            "attribute '{}' expects a {} value, got {}",
            attr.name,
            attr.attr_type,
            json_kind(value)
        ))
    };

    match (attr.attr_type, value) {
        (AttributeType::Integer, Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().and_then(integral))
            .map(AttrValue::Integer)
            .ok_or_else(reject),
        (AttributeType::Integer, Value::String(s)) => {
            parse_integer(s).map(AttrValue::Integer).ok_or_else(reject)
        }
        (AttributeType::Decimal, Value::Number(n)) => n
            .as_f64()
            .map(AttrValue::Decimal)
            .ok_or_else(reject),
        (AttributeType::Decimal, Value::String(s)) => {
            parse_decimal(s).map(AttrValue::Decimal).ok_or_else(reject)
        }
        (AttributeType::Boolean, Value::Bool(b)) => Ok(AttrValue::Boolean(*b)),
        (AttributeType::Boolean, Value::String(s)) => {
            parse_bool(s).map(AttrValue::Boolean).ok_or_else(reject)
        }
        (AttributeType::DateTime, Value::String(s)) => {
            if parse_date_time(s).is_none() {
                return Err(ScimError::invalid_value(format!(
                    "attribute '{}' expects an xsd:dateTime, got '{}'",
                    attr.name, s
                )));
            }
            Ok(AttrValue::String(s.clone()))
        }
        (
            AttributeType::String | AttributeType::Binary | AttributeType::Reference,
            Value::String(s),
        ) => Ok(AttrValue::String(s.clone())),
        (AttributeType::Complex, Value::Object(map)) => {
            let mut out = Attributes::new();
            for (key, item) in map {
                let Some(sub) = attr.sub_attribute(key) else {
                    tracing::trace!(attribute = %attr.name, key = %key, "ignoring unknown sub-attribute");
                    continue;
                };
                if item.is_null() {
                    continue;
                }
                let coerced = coerce_value(sub, item)
                    .map_err(|e| e.with_context(format!("{}.{}", attr.name, sub.name)))?;
                out.insert(sub.name.clone(), coerced);
            }
            if let Some(missing) = attr
                .sub_attributes
                .iter()
                .find(|sub| sub.required && !out.contains(&sub.name))
            {
                return Err(ScimError::invalid_value(format!(
                    "attribute '{}' requires sub-attribute '{}'",
                    attr.name, missing.name
                )));
            }
            Ok(AttrValue::Complex(out))
        }
        _ => Err(reject()),
    }
}

// =============================================================================
// Tests
// =============================================================================
