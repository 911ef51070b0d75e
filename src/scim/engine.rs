//! Configured entry point tying a schema set to filter and PATCH handling.

use serde_json::Value;

use super::{
    error::ScimError,
    evaluate::FilterEvaluator,
    filter::{Filter, parse_filter_with_limits},
    patch::{PatchRequest, PatchValidator, ValidatedOperation},
    types::{Schema, enterprise_user_schema, group_schema, user_schema},
    value::Attributes,
};
use crate::config::{FilterConfig, PatchConfig, ScimConfig};

/// A resource type's schemas together with engine settings.
///
/// Schemas are owned and immutable; evaluators and validators borrow them,
/// so one engine can serve any number of concurrent requests.
#[derive(Debug, Clone)]
pub struct ScimEngine {
    schema: Schema,
    extensions: Vec<Schema>,
    filter: FilterConfig,
    patch: PatchConfig,
}

impl ScimEngine {
    pub fn new(schema: Schema, extensions: Vec<Schema>) -> Self {
        Self {
            schema,
            extensions,
            filter: FilterConfig::default(),
            patch: PatchConfig::default(),
        }
    }

    /// User resources with the Enterprise User extension.
    pub fn users() -> Self {
        Self::new(user_schema(), vec![enterprise_user_schema()])
    }

    pub fn groups() -> Self {
        Self::new(group_schema(), Vec::new())
    }

    pub fn with_config(mut self, config: &ScimConfig) -> Self {
        self.filter = config.filter.clone();
        self.patch = config.patch.clone();
        self
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn extensions(&self) -> &[Schema] {
        &self.extensions
    }

    /// Parse and validate a filter against this resource type.
    pub fn parse_filter(&self, input: &str) -> Result<Filter, ScimError> {
        let filter = parse_filter_with_limits(input, self.filter.limits())?;
        self.evaluator().validate(&filter)?;
        Ok(filter)
    }

    pub fn evaluator(&self) -> FilterEvaluator<'_> {
        FilterEvaluator::new(&self.schema, &self.extensions)
            .with_or_evaluation(self.filter.or_evaluation)
    }

    pub fn patch_validator(&self) -> PatchValidator<'_> {
        PatchValidator::new(&self.schema, &self.extensions)
            .with_enforce_mutability(self.patch.enforce_mutability)
            .with_max_operations(self.patch.max_operations)
    }

    /// Filter a list of resources; `None` keeps them all.
    pub fn filter_resources(
        &self,
        filter: Option<&str>,
        resources: Vec<Attributes>,
    ) -> Result<Vec<Attributes>, ScimError> {
        let filter = filter.map(|f| self.parse_filter(f)).transpose()?;
        self.evaluator().reduce(filter.as_ref(), resources)
    }

    /// Decode and validate a PATCH request body.
    pub fn validate_patch(&self, body: &Value) -> Result<Vec<ValidatedOperation>, ScimError> {
        let request = PatchRequest::from_json(body)?;
        self.patch_validator().validate_request(&request)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::scim::types::SCHEMA_PATCH_OP;

    #[test]
    fn test_parse_filter_applies_limits_and_schema() {
        let config = ScimConfig::from_str("[filter]\nmax_length = 20").unwrap();
        let engine = ScimEngine::users().with_config(&config);

        assert!(engine.parse_filter("userName pr").is_ok());
        let err = engine.parse_filter(r#"displayName eq "far too long""#).unwrap_err();
        assert!(matches!(err, ScimError::InvalidFilter(_)));
        let err = engine.parse_filter("nope pr").unwrap_err();
        assert!(matches!(err, ScimError::InvalidFilter(_)));
    }

    #[test]
    fn test_filter_resources() {
        let engine = ScimEngine::groups();
        let groups: Vec<Attributes> = ["Admins", "Users", "Auditors"]
            .iter()
            .map(|name| Attributes::from_json(&json!({"displayName": name})).unwrap())
            .collect();

        let kept = engine
            .filter_resources(Some(r#"displayName ew "s" and not (displayName sw "u")"#), groups.clone())
            .unwrap();
        assert_eq!(kept.len(), 2);
        assert_eq!(engine.filter_resources(None, groups).unwrap().len(), 3);
    }

    #[test]
    fn test_patch_uses_config() {
        let config = ScimConfig::from_str("[patch]\nenforce_mutability = false").unwrap();
        let body = json!({
            "schemas": [SCHEMA_PATCH_OP],
            "Operations": [{"op": "add", "path": "groups", "value": {"value": "g1"}}]
        });

        assert!(matches!(
            ScimEngine::users().validate_patch(&body),
            Err(ScimError::Mutability(_))
        ));
        let ops = ScimEngine::users().with_config(&config).validate_patch(&body).unwrap();
        assert_eq!(ops.len(), 1);
    }
}
