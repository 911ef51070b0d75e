//! Filter evaluation against in-memory resources.
//!
//! [`FilterEvaluator`] binds a base schema and its extensions and answers
//! whether a resource satisfies a parsed [`Filter`].
//!
//! ## Semantics
//!
//! - A multi-valued attribute matches if *any* element matches.
//! - An absent attribute (or explicit null) makes a comparison false, not an
//!   error. `eq null` tests absence and `ne null` presence.
//! - `and` stops at the first false operand. `or` evaluates both operands
//!   unless [`OrEvaluation::ShortCircuit`] is selected, so errors in either
//!   branch always surface by default.
//! - Unknown attributes and incompatible operators are errors
//!   (`invalidFilter`), regardless of the resource being evaluated.
//! - No filter (`None`) matches every resource.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{
    compare::Comparator,
    error::ScimError,
    filter::{AttrPath, CompareOp, Filter, FilterValue},
    path::{ResolvedPath, lookup, resolve},
    types::Schema,
    value::{AttrValue, Attributes},
};

/// How the evaluator treats the right operand of `or` once the left is true.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrEvaluation {
    /// Always evaluate both operands.
    #[default]
    Both,
    /// Skip the right operand when the left is true.
    ShortCircuit,
}

/// Validate `filter` against a schema set without evaluating it.
pub fn validate_filter(schema: &Schema, extensions: &[Schema], filter: &Filter) -> Result<(), ScimError> {
    FilterEvaluator::new(schema, extensions).validate(filter)
}

/// Evaluates filters against resources described by one schema set.
#[derive(Debug, Clone, Copy)]
pub struct FilterEvaluator<'s> {
    schema: &'s Schema,
    extensions: &'s [Schema],
    or_evaluation: OrEvaluation,
}

impl<'s> FilterEvaluator<'s> {
    pub fn new(schema: &'s Schema, extensions: &'s [Schema]) -> Self {
        Self {
            schema,
            extensions,
            or_evaluation: OrEvaluation::default(),
        }
    }

    pub fn with_or_evaluation(mut self, or_evaluation: OrEvaluation) -> Self {
        self.or_evaluation = or_evaluation;
        self
    }

    /// Check every attribute path and operator in `filter`.
    pub fn validate(&self, filter: &Filter) -> Result<(), ScimError> {
        match filter {
            Filter::Compare { attr, op, value } => {
                let resolved = self.resolve(attr)?;
                if is_null_check(*op, value) {
                    return Ok(());
                }
                Comparator::new(resolved.target(), *op, value).map(|_| ())
            }
            Filter::Present { attr } => self.resolve(attr).map(|_| ()),
            Filter::ValuePath { attr, filter } => {
                let resolved = self.resolve(attr)?;
                let scope = value_path_scope(&resolved, attr)?;
                self.scoped(&scope).validate(filter)
            }
            Filter::And(left, right) | Filter::Or(left, right) => {
                self.validate(left)?;
                self.validate(right)
            }
            Filter::Not(inner) => self.validate(inner),
        }
    }

    /// Evaluate `filter` against `resource`. `None` matches everything.
    pub fn evaluate(&self, filter: Option<&Filter>, resource: &Attributes) -> Result<bool, ScimError> {
        match filter {
            Some(filter) => self.eval(filter, resource),
            None => Ok(true),
        }
    }

    /// Evaluate against a JSON resource document.
    pub fn matches_json(&self, filter: &Filter, resource: &Value) -> Result<bool, ScimError> {
        let attrs = Attributes::from_json(resource)?;
        self.eval(filter, &attrs)
    }

    /// Keep the resources that match `filter`, preserving order.
    ///
    /// The filter is validated up front, so an invalid filter fails even
    /// for an empty input.
    pub fn reduce(&self, filter: Option<&Filter>, resources: Vec<Attributes>) -> Result<Vec<Attributes>, ScimError> {
        let Some(filter) = filter else {
            return Ok(resources);
        };
        self.validate(filter)?;

        let total = resources.len();
        let mut kept = Vec::with_capacity(total);
        for resource in resources {
            if self.eval(filter, &resource)? {
                kept.push(resource);
            }
        }
        tracing::debug!(filter = %filter, total, matched = kept.len(), "Reduced resources by filter");
        Ok(kept)
    }

    fn eval(&self, filter: &Filter, resource: &Attributes) -> Result<bool, ScimError> {
        match filter {
            Filter::Compare { attr, op, value } => {
                let resolved = self.resolve(attr)?;
                let candidates = self.candidates(&resolved, attr, resource)?;

                if is_null_check(*op, value) {
                    let present = candidates.iter().any(|v| v.is_present());
                    return Ok(present == (*op == CompareOp::Ne));
                }

                let comparator = Comparator::new(resolved.target(), *op, value)?;
                let matched = candidates.iter().any(|candidate| match comparator.check(candidate) {
                    Ok(()) => true,
                    Err(mismatch) => {
                        tracing::trace!(%mismatch, "Candidate did not match");
                        false
                    }
                });
                Ok(matched)
            }
            Filter::Present { attr } => {
                let resolved = self.resolve(attr)?;
                let candidates = self.candidates(&resolved, attr, resource)?;
                Ok(candidates.iter().any(|v| v.is_present()))
            }
            Filter::ValuePath { attr, filter } => {
                let resolved = self.resolve(attr)?;
                let scope = value_path_scope(&resolved, attr)?;
                let inner = self.scoped(&scope);
                inner.validate(filter)?;

                let Some(value) = lookup(resource, &resolved) else {
                    return Ok(false);
                };
                for element in elements(value) {
                    if inner.eval(filter, &element_scope(element))? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Filter::And(left, right) => {
                if !self.eval(left, resource)? {
                    return Ok(false);
                }
                self.eval(right, resource)
            }
            Filter::Or(left, right) => {
                let left = self.eval(left, resource)?;
                if left && self.or_evaluation == OrEvaluation::ShortCircuit {
                    return Ok(true);
                }
                let right = self.eval(right, resource)?;
                Ok(left || right)
            }
            Filter::Not(inner) => Ok(!self.eval(inner, resource)?),
        }
    }

    fn resolve(&self, path: &AttrPath) -> Result<ResolvedPath<'s>, ScimError> {
        Ok(resolve(self.schema, self.extensions, path)?)
    }

    fn scoped<'a>(&self, scope: &'a Schema) -> FilterEvaluator<'a> {
        FilterEvaluator::new(scope, &[]).with_or_evaluation(self.or_evaluation)
    }

    /// Flattened, non-null values at `path` after applying any value filter.
    fn candidates<'r>(
        &self,
        resolved: &ResolvedPath<'_>,
        path: &AttrPath,
        resource: &'r Attributes,
    ) -> Result<Vec<&'r AttrValue>, ScimError> {
        let Some(value) = lookup(resource, resolved) else {
            return Ok(Vec::new());
        };

        let mut selected: Vec<&'r AttrValue> = elements(value).collect();
        if let Some(filter) = &path.value_filter {
            let scope = Schema::for_sub_attributes(resolved.attribute);
            let inner = self.scoped(&scope);
            let mut kept = Vec::with_capacity(selected.len());
            for element in selected {
                if inner.eval(filter, &element_scope(element))? {
                    kept.push(element);
                }
            }
            selected = kept;
        }

        let values = match resolved.sub_attribute {
            Some(sub) => selected
                .into_iter()
                .filter_map(|element| element.as_complex().and_then(|c| c.get(&sub.name)))
                .flat_map(elements)
                .collect(),
            None => selected,
        };
        Ok(values.into_iter().filter(|v| !v.is_null()).collect())
    }
}

fn is_null_check(op: CompareOp, value: &FilterValue) -> bool {
    matches!(value, FilterValue::Null) && matches!(op, CompareOp::Eq | CompareOp::Ne)
}

fn value_path_scope(resolved: &ResolvedPath<'_>, path: &AttrPath) -> Result<Schema, ScimError> {
    if path.sub_attr.is_some() || path.value_filter.is_some() {
        return Err(ScimError::invalid_filter(format!(
            "value path '{}' must name a bare attribute",
            path
        )));
    }
    if !resolved.attribute.multi_valued {
        return Err(ScimError::invalid_filter(format!(
            "value filter on '{}' requires a multi-valued attribute",
            path
        )));
    }
    Ok(Schema::for_sub_attributes(resolved.attribute))
}

/// Elements of a value: the items of a list, or the value itself.
fn elements(value: &AttrValue) -> Box<dyn Iterator<Item = &AttrValue> + '_> {
    match value {
        AttrValue::List(items) => Box::new(items.iter()),
        other => Box::new(std::iter::once(other)),
    }
}

/// View one element of a multi-valued attribute as an attribute map.
///
/// Simple elements are exposed under the synthetic `value` sub-attribute.
fn element_scope(element: &AttrValue) -> Cow<'_, Attributes> {
    match element {
        AttrValue::Complex(attrs) => Cow::Borrowed(attrs),
        other => Cow::Owned([("value", other.clone())].into_iter().collect()),
    }
}

// =============================================================================
// Tests
// =============================================================================
