//! SCIM 2.0 PATCH Operations
//!
//! This module parses PATCH requests and validates each operation against a
//! schema set per RFC 7644 Section 3.5.2. Validation produces normalized
//! values ready for storage; applying them is left to the resource handler.
//!
//! ## Operations
//!
//! - `add`: Add value(s) to an attribute. Without a path, the value is an
//!   object of path → value entries, each validated as its own `add`.
//! - `remove`: Remove an attribute or matching elements. A path is required.
//! - `replace`: Validated exactly like `add`.
//!
//! ## Path Syntax
//!
//! ```text
//! path = attrPath / valuePath / subAttrPath
//! attrPath = [URI ":"] ATTRNAME
//! subAttrPath = ATTRNAME "." ATTRNAME
//! valuePath = ATTRNAME "[" valueFilter "]" ["." ATTRNAME]
//! ```
//!
//! ## Examples
//!
//! ```json
//! {
//!   "schemas": ["urn:ietf:params:scim:api:messages:2.0:PatchOp"],
//!   "Operations": [
//!     { "op": "replace", "path": "displayName", "value": "New Name" },
//!     { "op": "add", "path": "emails", "value": [{"type": "home", "value": "home@example.com"}] },
//!     { "op": "remove", "path": "members[value eq \"user-123\"]" }
//!   ]
//! }
//! ```

use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::{
    compare::coerce_value,
    error::ScimError,
    filter::{AttrPath, Filter, parse_attr_path},
    path::{PathError, ResolvedPath, resolve},
    types::{Mutability, SCHEMA_PATCH_OP, Schema},
    value::{AttrValue, Attributes, json_kind},
};

/// Default cap on operations in one PATCH request.
pub const DEFAULT_MAX_OPERATIONS: usize = 1000;

/// A SCIM PATCH request containing one or more operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchRequest {
    /// SCIM schema URIs (should contain PatchOp schema)
    pub schemas: Vec<String>,

    /// List of patch operations to apply
    #[serde(rename = "Operations")]
    pub operations: Vec<PatchOp>,
}

impl PatchRequest {
    /// Create a new patch request with operations
    pub fn new(operations: Vec<PatchOp>) -> Self {
        Self {
            schemas: vec![SCHEMA_PATCH_OP.to_string()],
            operations,
        }
    }

    /// Decode a request body. Shape errors are `invalidSyntax`.
    pub fn from_json(value: &Value) -> Result<Self, ScimError> {
        Ok(Self::deserialize(value)?)
    }

    /// Check the request envelope: schema URI and operation count.
    pub fn validate(&self, max_operations: usize) -> Result<(), ScimError> {
        if !self
            .schemas
            .iter()
            .any(|s| s.eq_ignore_ascii_case(SCHEMA_PATCH_OP))
        {
            return Err(ScimError::invalid_syntax(
                "request must include the PatchOp schema",
            ));
        }
        if self.operations.is_empty() {
            return Err(ScimError::invalid_syntax("request contains no operations"));
        }
        if self.operations.len() > max_operations {
            return Err(ScimError::TooMany(format!(
                "request contains {} operations, max {}",
                self.operations.len(),
                max_operations
            )));
        }
        Ok(())
    }
}

/// PATCH operation verb.
///
/// Deserialized case-insensitively; some identity providers send `Add` or
/// `Replace`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOpKind {
    Add,
    Remove,
    Replace,
}

impl PatchOpKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatchOpKind::Add => "add",
            PatchOpKind::Remove => "remove",
            PatchOpKind::Replace => "replace",
        }
    }
}

impl fmt::Display for PatchOpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PatchOpKind {
    type Err = ScimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "add" => Ok(PatchOpKind::Add),
            "remove" => Ok(PatchOpKind::Remove),
            "replace" => Ok(PatchOpKind::Replace),
            _ => Err(ScimError::invalid_syntax(format!(
                "unknown patch operation '{}'",
                s
            ))),
        }
    }
}

impl<'de> Deserialize<'de> for PatchOpKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(|_| {
            serde::de::Error::unknown_variant(&raw, &["add", "remove", "replace"])
        })
    }
}

/// A single SCIM PATCH operation, as sent by the client.
///
/// `path` and `value` stay optional here so that a missing path on
/// `remove` surfaces as `noTarget` rather than a decoding error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchOp {
    pub op: PatchOpKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl PatchOp {
    /// Create an add operation
    pub fn add(path: impl Into<String>, value: Value) -> Self {
        Self {
            op: PatchOpKind::Add,
            path: Some(path.into()),
            value: Some(value),
        }
    }

    /// Create an add operation without a path
    pub fn add_root(value: Value) -> Self {
        Self {
            op: PatchOpKind::Add,
            path: None,
            value: Some(value),
        }
    }

    /// Create a replace operation
    pub fn replace(path: impl Into<String>, value: Value) -> Self {
        Self {
            op: PatchOpKind::Replace,
            path: Some(path.into()),
            value: Some(value),
        }
    }

    /// Create a remove operation
    pub fn remove(path: impl Into<String>) -> Self {
        Self {
            op: PatchOpKind::Remove,
            path: Some(path.into()),
            value: None,
        }
    }

    /// The trimmed path, if one was given and is non-empty.
    pub fn target(&self) -> Option<&str> {
        self.path.as_deref().map(str::trim).filter(|p| !p.is_empty())
    }
}

/// A parsed SCIM PATCH path.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchPath {
    /// Schema URI prefix, for qualified paths
    pub schema: Option<String>,
    /// Main attribute name
    pub attr: String,
    /// Sub-attribute (for nested paths like "name.familyName")
    pub sub_attr: Option<String>,
    /// Value filter for multi-valued attributes (e.g., `[type eq "work"]`)
    pub value_filter: Option<Filter>,
}

impl PatchPath {
    pub fn simple(attr: impl Into<String>) -> Self {
        Self {
            schema: None,
            attr: attr.into(),
            sub_attr: None,
            value_filter: None,
        }
    }

    pub fn nested(attr: impl Into<String>, sub_attr: impl Into<String>) -> Self {
        Self {
            sub_attr: Some(sub_attr.into()),
            ..Self::simple(attr)
        }
    }
}

impl From<AttrPath> for PatchPath {
    fn from(path: AttrPath) -> Self {
        Self {
            schema: path.schema,
            attr: path.attr,
            sub_attr: path.sub_attr,
            value_filter: path.value_filter.map(|f| *f),
        }
    }
}

impl fmt::Display for PatchPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref schema) = self.schema {
            write!(f, "{}:", schema)?;
        }
        write!(f, "{}", self.attr)?;
        if let Some(ref filter) = self.value_filter {
            write!(f, "[{}]", filter)?;
        }
        if let Some(ref sub) = self.sub_attr {
            write!(f, ".{}", sub)?;
        }
        Ok(())
    }
}

/// Parse a SCIM PATCH path string.
///
/// # Examples
///
/// ```
/// use hadrian_scim::scim::patch::parse_path;
///
/// let path = parse_path("displayName").unwrap();
/// let path = parse_path("name.familyName").unwrap();
/// let path = parse_path("emails[type eq \"work\"].value").unwrap();
/// ```
pub fn parse_path(input: &str) -> Result<PatchPath, ScimError> {
    parse_target(input).map(PatchPath::from)
}

fn parse_target(input: &str) -> Result<AttrPath, ScimError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ScimError::invalid_path("empty path"));
    }
    parse_attr_path(input)
        .map_err(|e| ScimError::invalid_path(format!("invalid path '{}': {}", input, e)))
}

/// An operation that passed validation, with its normalized value.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedOperation {
    pub op: PatchOpKind,
    /// Trimmed path, `None` for whole-resource add/replace
    pub path: Option<String>,
    /// Normalized value; `None` for a remove without a value
    pub value: Option<AttrValue>,
}

/// Validates PATCH operations against a base schema and its extensions.
#[derive(Debug, Clone, Copy)]
pub struct PatchValidator<'s> {
    schema: &'s Schema,
    extensions: &'s [Schema],
    enforce_mutability: bool,
    max_operations: usize,
}

impl<'s> PatchValidator<'s> {
    pub fn new(schema: &'s Schema, extensions: &'s [Schema]) -> Self {
        Self {
            schema,
            extensions,
            enforce_mutability: true,
            max_operations: DEFAULT_MAX_OPERATIONS,
        }
    }

    /// Reject writes to `readOnly` attributes and removal of required ones.
    pub fn with_enforce_mutability(mut self, enforce: bool) -> Self {
        self.enforce_mutability = enforce;
        self
    }

    pub fn with_max_operations(mut self, max_operations: usize) -> Self {
        self.max_operations = max_operations;
        self
    }

    /// Validate one operation and return its normalized value.
    ///
    /// Add and replace always return a value. Remove returns the
    /// normalized value only when the client sent one, which lets the
    /// caller tell whole-attribute removal from element removal.
    pub fn validate(&self, op: &PatchOp) -> Result<Option<AttrValue>, ScimError> {
        match op.op {
            PatchOpKind::Remove => self.validate_remove(op),
            PatchOpKind::Add | PatchOpKind::Replace => self.validate_write(op).map(Some),
        }
    }

    /// Validate a whole request. Operation errors carry the operation index.
    pub fn validate_request(
        &self,
        request: &PatchRequest,
    ) -> Result<Vec<ValidatedOperation>, ScimError> {
        request.validate(self.max_operations)?;

        let validated = request
            .operations
            .iter()
            .enumerate()
            .map(|(index, op)| {
                let value = self
                    .validate(op)
                    .map_err(|e| e.with_context(format_args!("operation {}", index)))?;
                Ok(ValidatedOperation {
                    op: op.op,
                    path: op.target().map(str::to_string),
                    value,
                })
            })
            .collect::<Result<Vec<_>, ScimError>>()?;

        tracing::debug!(
            schema = %self.schema.id,
            operations = validated.len(),
            "Validated PATCH request"
        );
        Ok(validated)
    }

    fn validate_write(&self, op: &PatchOp) -> Result<AttrValue, ScimError> {
        let value = op.value.as_ref().ok_or_else(|| {
            ScimError::invalid_value(format!("'{}' operation requires a value", op.op))
        })?;

        match op.target() {
            None => self.validate_root(op.op, value),
            Some(raw) => match self.extension(raw) {
                Some(extension) => self.validate_extension(op.op, extension, value),
                None => self.validate_at(op.op, raw, value),
            },
        }
    }

    fn validate_remove(&self, op: &PatchOp) -> Result<Option<AttrValue>, ScimError> {
        let raw = op
            .target()
            .ok_or_else(|| ScimError::no_target("'remove' operation requires a path"))?;

        if let Some(extension) = self.extension(raw) {
            return op
                .value
                .as_ref()
                .map(|v| self.validate_extension(op.op, extension, v))
                .transpose();
        }

        let path = parse_target(raw)?;
        let resolved = self.resolve(&path)?;
        self.check_mutability(op.op, &resolved)?;

        let target = resolved.target();
        if self.enforce_mutability
            && target.required
            && path.value_filter.is_none()
            && op.value.is_none()
        {
            return Err(ScimError::invalid_value(format!(
                "required attribute '{}' cannot be removed",
                raw
            )));
        }

        op.value
            .as_ref()
            .map(|v| coerce_value(target, v))
            .transpose()
    }

    /// Path-less add/replace: every key of the object is a path.
    fn validate_root(&self, kind: PatchOpKind, value: &Value) -> Result<AttrValue, ScimError> {
        let Value::Object(entries) = value else {
            return Err(ScimError::invalid_value(format!(
                "'{}' without a path requires an object value, got {}",
                kind,
                json_kind(value)
            )));
        };

        let mut normalized = Attributes::new();
        for (key, entry) in entries {
            let entry = match self.extension(key) {
                Some(extension) => self.validate_extension(kind, extension, entry)?,
                None => self.validate_at(kind, key, entry)?,
            };
            normalized.insert(key.clone(), entry);
        }
        Ok(AttrValue::Complex(normalized))
    }

    /// Whole-extension value: an object of that extension's attributes.
    fn validate_extension(
        &self,
        kind: PatchOpKind,
        extension: &Schema,
        value: &Value,
    ) -> Result<AttrValue, ScimError> {
        let Value::Object(entries) = value else {
            return Err(ScimError::invalid_value(format!(
                "extension '{}' requires an object value, got {}",
                extension.id,
                json_kind(value)
            )));
        };

        let mut normalized = Attributes::new();
        for (name, entry) in entries {
            let path = format!("{}:{}", extension.id, name);
            normalized.insert(name.clone(), self.validate_at(kind, &path, entry)?);
        }
        Ok(AttrValue::Complex(normalized))
    }

    fn validate_at(&self, kind: PatchOpKind, raw: &str, value: &Value) -> Result<AttrValue, ScimError> {
        let path = parse_target(raw)?;
        let resolved = self.resolve(&path)?;
        self.check_mutability(kind, &resolved)?;
        coerce_value(resolved.target(), value)
    }

    fn resolve(&self, path: &AttrPath) -> Result<ResolvedPath<'s>, ScimError> {
        resolve(self.schema, self.extensions, path).map_err(|e| match e {
            PathError::Filter(inner) => inner,
            other @ PathError::NotMultiValued(_) => ScimError::invalid_filter(other.to_string()),
            other => ScimError::invalid_value(other.to_string()),
        })
    }

    fn extension(&self, raw: &str) -> Option<&'s Schema> {
        self.extensions
            .iter()
            .find(|s| s.id.eq_ignore_ascii_case(raw))
    }

    fn check_mutability(&self, kind: PatchOpKind, resolved: &ResolvedPath<'_>) -> Result<(), ScimError> {
        if !self.enforce_mutability {
            return Ok(());
        }
        let read_only = [Some(resolved.attribute), resolved.sub_attribute]
            .into_iter()
            .flatten()
            .find(|a| a.mutability == Mutability::ReadOnly);
        match read_only {
            Some(attr) => Err(ScimError::mutability(format!(
                "attribute '{}' is readOnly and cannot be targeted by '{}'",
                attr.name, kind
            ))),
            None => Ok(()),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;
    use crate::scim::types::{
        Attribute, SCHEMA_ENTERPRISE_USER, enterprise_user_schema, group_schema, user_schema,
    };

    fn validate(op: PatchOp) -> Result<Option<AttrValue>, ScimError> {
        let user = user_schema();
        let ext = [enterprise_user_schema()];
        PatchValidator::new(&user, &ext).validate(&op)
    }

    fn op_from(json: Value) -> PatchOp {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_parse_simple_path() {
        let path = parse_path("displayName").unwrap();
        assert_eq!(path, PatchPath::simple("displayName"));
    }

    #[test]
    fn test_parse_nested_path() {
        let path = parse_path(" name.familyName ").unwrap();
        assert_eq!(path, PatchPath::nested("name", "familyName"));
    }

    #[test]
    fn test_parse_path_with_filter_and_subattr() {
        let path = parse_path("emails[type eq \"work\"].value").unwrap();
        assert_eq!(path.attr, "emails");
        assert!(path.value_filter.is_some());
        assert_eq!(path.sub_attr.as_deref(), Some("value"));
    }

    #[test]
    fn test_parse_qualified_path() {
        let raw = format!("{}:manager.value", SCHEMA_ENTERPRISE_USER);
        let path = parse_path(&raw).unwrap();
        assert_eq!(path.schema.as_deref(), Some(SCHEMA_ENTERPRISE_USER));
        assert_eq!(path.to_string(), raw);
    }

    #[rstest]
    #[case::empty("")]
    #[case::unclosed_bracket("emails[type eq \"work\"")]
    #[case::trailing_garbage("emails[type eq \"work\"]value")]
    #[case::dangling_dot("name.")]
    fn test_parse_path_rejects(#[case] input: &str) {
        let err = parse_path(input).unwrap_err();
        assert!(matches!(err, ScimError::InvalidPath(_)), "{:?}", err);
    }

    #[test]
    fn test_op_is_case_insensitive() {
        let op = op_from(json!({"op": "Replace", "path": "displayName", "value": "x"}));
        assert_eq!(op.op, PatchOpKind::Replace);
        let op = op_from(json!({"op": "ADD", "value": {}}));
        assert_eq!(op.op, PatchOpKind::Add);
    }

    #[test]
    fn test_unknown_op_is_invalid_syntax() {
        let err = PatchRequest::from_json(&json!({
            "schemas": [SCHEMA_PATCH_OP],
            "Operations": [{"op": "move", "path": "displayName"}]
        }))
        .unwrap_err();
        assert!(matches!(err, ScimError::InvalidSyntax(_)));
    }

    #[test]
    fn test_remove_without_path_is_no_target() {
        let err = validate(op_from(json!({"op": "remove"}))).unwrap_err();
        assert!(matches!(err, ScimError::NoTarget(_)));
        assert_eq!(err.status(), http::StatusCode::BAD_REQUEST);

        let err = validate(op_from(json!({"op": "remove", "path": "  "}))).unwrap_err();
        assert!(matches!(err, ScimError::NoTarget(_)));
    }

    #[test]
    fn test_add_single_valued_string() {
        let value = validate(PatchOp::add("nickname", json!("Babs"))).unwrap();
        assert_eq!(value, Some(AttrValue::from("Babs")));
    }

    #[rstest]
    #[case::bare_scalar(json!({"value": "a@example.com"}))]
    #[case::array(json!([{"value": "a@example.com"}]))]
    fn test_multi_valued_always_yields_list(#[case] value: Value) {
        let normalized = validate(PatchOp::add("emails", value)).unwrap().unwrap();
        let items = normalized.as_list().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(
            items[0].as_complex().unwrap().get("value"),
            Some(&AttrValue::from("a@example.com"))
        );
    }

    #[test]
    fn test_simple_multi_valued_scalar_wrapped() {
        let schema = Schema::new("urn:test", vec![Attribute::integer("ports").multi_valued()]);
        let validator = PatchValidator::new(&schema, &[]);
        let value = validator.validate(&PatchOp::add("ports", json!("8080"))).unwrap();
        assert_eq!(value, Some(AttrValue::List(vec![AttrValue::Integer(8080)])));
    }

    #[test]
    fn test_replace_matches_add() {
        let add = validate(PatchOp::add("active", json!("TRUE"))).unwrap();
        let replace = validate(PatchOp::replace("active", json!("TRUE"))).unwrap();
        assert_eq!(add, Some(AttrValue::Boolean(true)));
        assert_eq!(add, replace);
    }

    #[test]
    fn test_add_requires_value() {
        let err = validate(op_from(json!({"op": "add", "path": "displayName"}))).unwrap_err();
        assert!(matches!(err, ScimError::InvalidValue(_)));
    }

    #[test]
    fn test_type_mismatch_is_invalid_value() {
        let err = validate(PatchOp::replace("displayName", json!(42))).unwrap_err();
        assert!(matches!(err, ScimError::InvalidValue(_)));
    }

    #[rstest]
    #[case::attribute(PatchOp::replace("nope", json!("x")))]
    #[case::sub_attribute(PatchOp::replace("name.nope", json!("x")))]
    #[case::schema(PatchOp::add("urn:example:nope:name", json!("x")))]
    #[case::remove(PatchOp::remove("nope"))]
    fn test_unknown_attribute_is_invalid_value(#[case] op: PatchOp) {
        let err = validate(op).unwrap_err();
        assert!(matches!(err, ScimError::InvalidValue(_)), "{:?}", err);
    }

    #[rstest]
    #[case::remove(PatchOp::remove("name[givenName eq \"x\"]"))]
    #[case::replace(PatchOp::replace("name[givenName eq \"x\"].familyName", json!("x")))]
    fn test_value_filter_on_single_valued_is_invalid_filter(#[case] op: PatchOp) {
        let err = validate(op).unwrap_err();
        assert!(matches!(err, ScimError::InvalidFilter(_)), "{:?}", err);
    }

    #[test]
    fn test_value_filter_errors_propagate() {
        let err = validate(PatchOp::remove("emails[nope eq \"x\"]")).unwrap_err();
        assert!(matches!(err, ScimError::InvalidFilter(_)));
    }

    #[test]
    fn test_remove_with_filter_and_value() {
        let value = validate(PatchOp::remove("emails[type eq \"work\"]")).unwrap();
        assert_eq!(value, None);

        let op = op_from(json!({
            "op": "remove",
            "path": "emails",
            "value": [{"value": "a@example.com"}]
        }));
        let value = validate(op).unwrap().unwrap();
        assert!(value.as_list().is_some());
    }

    #[test]
    fn test_read_only_is_mutability_error() {
        let err = validate(PatchOp::add("groups", json!([{"value": "g1"}]))).unwrap_err();
        assert!(matches!(err, ScimError::Mutability(_)));
        let err = validate(PatchOp::remove("meta.created")).unwrap_err();
        assert!(matches!(err, ScimError::Mutability(_)));

        let user = user_schema();
        let relaxed = PatchValidator::new(&user, &[]).with_enforce_mutability(false);
        assert!(relaxed.validate(&PatchOp::add("groups", json!([{"value": "g1"}]))).is_ok());
    }

    #[test]
    fn test_remove_required_is_invalid_value() {
        let err = validate(PatchOp::remove("userName")).unwrap_err();
        assert!(matches!(err, ScimError::InvalidValue(_)));
    }

    #[test]
    fn test_root_add() {
        let value = validate(PatchOp::add_root(json!({
            "displayName": "Babs",
            "name.givenName": "Barbara",
            "emails": {"value": "babs@example.com"},
            SCHEMA_ENTERPRISE_USER: {"employeeNumber": "701984"}
        })))
        .unwrap()
        .unwrap();

        let attrs = value.as_complex().unwrap();
        assert_eq!(attrs.get("displayName"), Some(&AttrValue::from("Babs")));
        assert_eq!(attrs.get("name.givenName"), Some(&AttrValue::from("Barbara")));
        assert!(attrs.get("emails").unwrap().as_list().is_some());
        let ext = attrs.get(SCHEMA_ENTERPRISE_USER).unwrap().as_complex().unwrap();
        assert_eq!(ext.get("employeeNumber"), Some(&AttrValue::from("701984")));
    }

    #[test]
    fn test_root_add_requires_object() {
        let err = validate(PatchOp::add_root(json!("Babs"))).unwrap_err();
        assert!(matches!(err, ScimError::InvalidValue(_)));
        let err = validate(PatchOp::add_root(json!({"nope": 1}))).unwrap_err();
        assert!(matches!(err, ScimError::InvalidValue(_)));
    }

    #[test]
    fn test_extension_uri_path() {
        let value = validate(PatchOp::replace(
            SCHEMA_ENTERPRISE_USER,
            json!({"department": "Tour Operations"}),
        ))
        .unwrap()
        .unwrap();
        assert_eq!(
            value.as_complex().unwrap().get("department"),
            Some(&AttrValue::from("Tour Operations"))
        );
        assert_eq!(validate(PatchOp::remove(SCHEMA_ENTERPRISE_USER)).unwrap(), None);
    }

    #[test]
    fn test_complex_ignores_unknown_sub_attributes() {
        let value = validate(PatchOp::replace(
            "name",
            json!({"givenName": "Barbara", "favoriteColor": "green"}),
        ))
        .unwrap()
        .unwrap();
        let name = value.as_complex().unwrap();
        assert_eq!(name.len(), 1);
        assert!(!name.contains("favoriteColor"));
    }

    #[test]
    fn test_request_validation() {
        let user = user_schema();
        let validator = PatchValidator::new(&user, &[]);

        let request = PatchRequest::from_json(&json!({
            "schemas": [SCHEMA_PATCH_OP],
            "Operations": [
                {"op": "replace", "path": "displayName", "value": "New Name"},
                {"op": "remove", "path": "emails[type eq \"work\"]"}
            ]
        }))
        .unwrap();
        let validated = validator.validate_request(&request).unwrap();
        assert_eq!(validated.len(), 2);
        assert_eq!(validated[0].path.as_deref(), Some("displayName"));
        assert_eq!(validated[1].op, PatchOpKind::Remove);
        assert_eq!(validated[1].value, None);

        let wrong_schema = PatchRequest {
            schemas: vec!["urn:example".into()],
            operations: request.operations.clone(),
        };
        assert!(matches!(
            validator.validate_request(&wrong_schema),
            Err(ScimError::InvalidSyntax(_))
        ));

        let empty = PatchRequest::new(vec![]);
        assert!(matches!(
            validator.validate_request(&empty),
            Err(ScimError::InvalidSyntax(_))
        ));
    }

    #[test]
    fn test_request_errors_name_the_operation() {
        let group = group_schema();
        let validator = PatchValidator::new(&group, &[]);
        let request = PatchRequest::new(vec![
            PatchOp::replace("displayName", json!("Admins")),
            op_from(json!({"op": "remove"})),
        ]);
        let err = validator.validate_request(&request).unwrap_err();
        assert!(matches!(err, ScimError::NoTarget(_)));
        assert!(err.detail().starts_with("operation 1:"), "{}", err.detail());
    }

    #[test]
    fn test_too_many_operations() {
        let group = group_schema();
        let validator = PatchValidator::new(&group, &[]).with_max_operations(2);
        let request = PatchRequest::new(vec![
            PatchOp::replace("displayName", json!("a")),
            PatchOp::replace("displayName", json!("b")),
            PatchOp::replace("displayName", json!("c")),
        ]);
        let err = validator.validate_request(&request).unwrap_err();
        assert!(matches!(err, ScimError::TooMany(_)));
        assert_eq!(err.status(), http::StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn test_patch_request_serialization() {
        let request = PatchRequest::new(vec![
            PatchOp::replace("displayName", json!("New Name")),
            PatchOp::remove("members[value eq \"user-123\"]"),
        ]);

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["Operations"][0]["op"], "replace");
        assert_eq!(json["Operations"][1]["op"], "remove");
        assert!(json["Operations"][1].get("value").is_none());
        assert_eq!(PatchRequest::from_json(&json).unwrap(), request);
    }
}
