//! SCIM 2.0 Schema Types
//!
//! This module defines the attribute and schema model of RFC 7643 Section 7,
//! and the default User, Group and Enterprise User schemas.
//!
//! Schemas are immutable once built and carry no interior mutability, so a
//! single instance can be shared by any number of concurrent evaluations.

use serde::{Deserialize, Serialize};

// =============================================================================
// Schema URIs
// =============================================================================

/// SCIM Core User schema URI
pub const SCHEMA_USER: &str = "urn:ietf:params:scim:schemas:core:2.0:User";

/// SCIM Core Group schema URI
pub const SCHEMA_GROUP: &str = "urn:ietf:params:scim:schemas:core:2.0:Group";

/// SCIM Enterprise User extension schema URI
pub const SCHEMA_ENTERPRISE_USER: &str =
    "urn:ietf:params:scim:schemas:extension:enterprise:2.0:User";

/// SCIM Error schema URI
pub const SCHEMA_ERROR: &str = "urn:ietf:params:scim:api:messages:2.0:Error";

/// SCIM PatchOp schema URI
pub const SCHEMA_PATCH_OP: &str = "urn:ietf:params:scim:api:messages:2.0:PatchOp";

// =============================================================================
// Attribute characteristics
// =============================================================================

/// SCIM attribute data type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AttributeType {
    String,
    Boolean,
    Decimal,
    Integer,
    DateTime,
    Binary,
    Reference,
    Complex,
}

impl std::fmt::Display for AttributeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AttributeType::String => "string",
            AttributeType::Boolean => "boolean",
            AttributeType::Decimal => "decimal",
            AttributeType::Integer => "integer",
            AttributeType::DateTime => "dateTime",
            AttributeType::Binary => "binary",
            AttributeType::Reference => "reference",
            AttributeType::Complex => "complex",
        };
        write!(f, "{}", s)
    }
}

/// SCIM attribute mutability
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Mutability {
    ReadOnly,
    #[default]
    ReadWrite,
    Immutable,
    WriteOnly,
}

/// SCIM attribute return behavior
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Returned {
    Always,
    Never,
    #[default]
    Default,
    Request,
}

/// SCIM attribute uniqueness constraint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Uniqueness {
    #[default]
    None,
    Server,
    Global,
}

/// Schema construction errors.
///
/// These indicate a malformed schema definition, which is a deployment
/// problem rather than something a client request can trigger.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaError {
    #[error("duplicate attribute '{name}' in {parent}")]
    DuplicateAttribute { parent: String, name: String },

    #[error("complex attribute '{0}' has no sub-attributes")]
    EmptyComplex(String),

    #[error("attribute '{0}' has sub-attributes but is not complex")]
    UnexpectedSubAttributes(String),

    #[error("invalid schema document: {0}")]
    Parse(String),
}

// =============================================================================
// Attribute
// =============================================================================

/// SCIM attribute definition within a schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attribute {
    /// Attribute name, unique within its parent (case-insensitive)
    pub name: String,

    /// Attribute data type
    #[serde(rename = "type")]
    pub attr_type: AttributeType,

    #[serde(default)]
    pub multi_valued: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub required: bool,

    /// Only meaningful for string attributes; reference and binary
    /// attributes always compare case-exactly.
    #[serde(default)]
    pub case_exact: bool,

    #[serde(default)]
    pub mutability: Mutability,

    #[serde(default)]
    pub returned: Returned,

    #[serde(default)]
    pub uniqueness: Uniqueness,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub canonical_values: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reference_types: Vec<String>,

    /// Sub-attributes, non-empty iff the type is complex
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_attributes: Vec<Attribute>,
}

impl Attribute {
    fn simple(name: &str, attr_type: AttributeType) -> Self {
        Self {
            name: name.to_string(),
            attr_type,
            multi_valued: false,
            description: None,
            required: false,
            case_exact: false,
            mutability: Mutability::ReadWrite,
            returned: Returned::Default,
            uniqueness: Uniqueness::None,
            canonical_values: Vec::new(),
            reference_types: Vec::new(),
            sub_attributes: Vec::new(),
        }
    }

    pub fn string(name: &str) -> Self {
        Self::simple(name, AttributeType::String)
    }

    pub fn boolean(name: &str) -> Self {
        Self::simple(name, AttributeType::Boolean)
    }

    pub fn integer(name: &str) -> Self {
        Self::simple(name, AttributeType::Integer)
    }

    pub fn decimal(name: &str) -> Self {
        Self::simple(name, AttributeType::Decimal)
    }

    pub fn date_time(name: &str) -> Self {
        Self::simple(name, AttributeType::DateTime)
    }

    /// Binary attributes are base64 strings and compare case-exactly.
    pub fn binary(name: &str) -> Self {
        Self {
            case_exact: true,
            ..Self::simple(name, AttributeType::Binary)
        }
    }

    /// Reference attributes compare case-exactly per RFC 7643 2.3.7.
    pub fn reference(name: &str, reference_types: &[&str]) -> Self {
        Self {
            case_exact: true,
            reference_types: reference_types.iter().map(|s| s.to_string()).collect(),
            ..Self::simple(name, AttributeType::Reference)
        }
    }

    /// Create a complex attribute.
    ///
    /// # Panics
    ///
    /// Panics if two sub-attributes share a name (case-insensitively) or if
    /// `sub_attributes` is empty. Use [`Attribute::try_complex`] for schemas
    /// that come from untrusted input.
    pub fn complex(name: &str, sub_attributes: Vec<Attribute>) -> Self {
        match Self::try_complex(name, sub_attributes) {
            Ok(attr) => attr,
            Err(e) => panic!("invalid schema definition: {}", e),
        }
    }

    /// Create a complex attribute, reporting duplicate sub-attribute names.
    pub fn try_complex(name: &str, sub_attributes: Vec<Attribute>) -> Result<Self, SchemaError> {
        let attr = Self {
            sub_attributes,
            ..Self::simple(name, AttributeType::Complex)
        };
        attr.validate()?;
        Ok(attr)
    }

    pub fn multi_valued(mut self) -> Self {
        self.multi_valued = true;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn case_exact(mut self) -> Self {
        self.case_exact = true;
        self
    }

    pub fn mutability(mut self, mutability: Mutability) -> Self {
        self.mutability = mutability;
        self
    }

    pub fn returned(mut self, returned: Returned) -> Self {
        self.returned = returned;
        self
    }

    pub fn uniqueness(mut self, uniqueness: Uniqueness) -> Self {
        self.uniqueness = uniqueness;
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn canonical_values(mut self, values: &[&str]) -> Self {
        self.canonical_values = values.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn is_complex(&self) -> bool {
        self.attr_type == AttributeType::Complex
    }

    /// Case-insensitive sub-attribute lookup.
    pub fn sub_attribute(&self, name: &str) -> Option<&Attribute> {
        self.sub_attributes
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
    }

    /// Whether string comparisons against this attribute fold case.
    ///
    /// Binary and reference values are case exact (RFC 7643 2.3.6, 2.3.7)
    /// whatever `caseExact` says.
    pub fn folds_case(&self) -> bool {
        !self.case_exact
            && !matches!(self.attr_type, AttributeType::Binary | AttributeType::Reference)
    }

    fn validate(&self) -> Result<(), SchemaError> {
        match (self.is_complex(), self.sub_attributes.is_empty()) {
            (true, true) => return Err(SchemaError::EmptyComplex(self.name.clone())),
            (false, false) => {
                return Err(SchemaError::UnexpectedSubAttributes(self.name.clone()));
            }
            _ => {}
        }
        check_unique_names(&self.name, &self.sub_attributes)?;
        for sub in &self.sub_attributes {
            sub.validate()?;
        }
        Ok(())
    }
}

fn check_unique_names(parent: &str, attributes: &[Attribute]) -> Result<(), SchemaError> {
    for (i, attr) in attributes.iter().enumerate() {
        if attributes[..i]
            .iter()
            .any(|prev| prev.name.eq_ignore_ascii_case(&attr.name))
        {
            return Err(SchemaError::DuplicateAttribute {
                parent: parent.to_string(),
                name: attr.name.clone(),
            });
        }
    }
    Ok(())
}

// =============================================================================
// Schema
// =============================================================================

/// SCIM Schema definition.
///
/// An ordered, URI-identified set of attributes describing one resource
/// type or one extension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    /// Schema URI (e.g., "urn:ietf:params:scim:schemas:core:2.0:User")
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub attributes: Vec<Attribute>,
}

impl Schema {
    /// Build a schema.
    ///
    /// # Panics
    ///
    /// Panics on duplicate top-level names or malformed complex attributes.
    pub fn new(id: &str, attributes: Vec<Attribute>) -> Self {
        match Self::try_new(id, attributes) {
            Ok(schema) => schema,
            Err(e) => panic!("invalid schema definition: {}", e),
        }
    }

    pub fn try_new(id: &str, attributes: Vec<Attribute>) -> Result<Self, SchemaError> {
        let schema = Self {
            id: id.to_string(),
            name: None,
            description: None,
            attributes,
        };
        schema.validate()?;
        Ok(schema)
    }

    /// Parse and validate an RFC 7643 schema document.
    pub fn from_json(value: serde_json::Value) -> Result<Self, SchemaError> {
        let schema: Schema =
            serde_json::from_value(value).map_err(|e| SchemaError::Parse(e.to_string()))?;
        schema.validate()?;
        Ok(schema)
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// Case-insensitive top-level attribute lookup.
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
    }

    /// Synthetic schema scoped to one attribute's sub-attributes.
    ///
    /// Used for value-path filters such as `emails[type eq "work"]`. A
    /// multi-valued simple attribute (e.g. a list of strings) is exposed
    /// through a single `value` sub-attribute of the same type.
    pub fn for_sub_attributes(attr: &Attribute) -> Self {
        let attributes = if attr.is_complex() {
            attr.sub_attributes.clone()
        } else {
            vec![Attribute {
                name: "value".to_string(),
                multi_valued: false,
                sub_attributes: Vec::new(),
                ..attr.clone()
            }]
        };
        Self {
            id: attr.name.clone(),
            name: None,
            description: None,
            attributes,
        }
    }

    fn validate(&self) -> Result<(), SchemaError> {
        check_unique_names(&self.id, &self.attributes)?;
        for attr in &self.attributes {
            attr.validate()?;
        }
        Ok(())
    }
}

// =============================================================================
// Default schemas (RFC 7643 Section 4)
// =============================================================================

fn multi_valued_typed(name: &str, value: Attribute, types: &[&str]) -> Attribute {
    Attribute::complex(
        name,
        vec![
            value,
            Attribute::string("display"),
            Attribute::string("type").canonical_values(types),
            Attribute::boolean("primary"),
        ],
    )
    .multi_valued()
}

/// Common attributes shared by every resource type (RFC 7643 Section 3.1).
fn with_common_attributes(attributes: Vec<Attribute>) -> Vec<Attribute> {
    let mut all = vec![
        Attribute::string("id")
            .case_exact()
            .mutability(Mutability::ReadOnly)
            .returned(Returned::Always)
            .uniqueness(Uniqueness::Server),
        Attribute::string("externalId").case_exact(),
        Attribute::complex(
            "meta",
            vec![
                Attribute::string("resourceType")
                    .case_exact()
                    .mutability(Mutability::ReadOnly),
                Attribute::date_time("created").mutability(Mutability::ReadOnly),
                Attribute::date_time("lastModified").mutability(Mutability::ReadOnly),
                Attribute::reference("location", &["uri"]).mutability(Mutability::ReadOnly),
                Attribute::string("version")
                    .case_exact()
                    .mutability(Mutability::ReadOnly),
            ],
        )
        .mutability(Mutability::ReadOnly),
    ];
    all.extend(attributes);
    all
}

/// Core User schema.
pub fn user_schema() -> Schema {
    Schema::new(
        SCHEMA_USER,
        with_common_attributes(vec![
            Attribute::string("userName")
                .required()
                .uniqueness(Uniqueness::Server)
                .description("Unique identifier for the user"),
            Attribute::complex(
                "name",
                vec![
                    Attribute::string("formatted"),
                    Attribute::string("familyName"),
                    Attribute::string("givenName"),
                    Attribute::string("middleName"),
                    Attribute::string("honorificPrefix"),
                    Attribute::string("honorificSuffix"),
                ],
            ),
            Attribute::string("displayName"),
            Attribute::string("nickName"),
            Attribute::reference("profileUrl", &["external"]),
            Attribute::string("title"),
            Attribute::string("userType"),
            Attribute::string("preferredLanguage"),
            Attribute::string("locale"),
            Attribute::string("timezone"),
            Attribute::boolean("active"),
            Attribute::string("password")
                .mutability(Mutability::WriteOnly)
                .returned(Returned::Never),
            multi_valued_typed(
                "emails",
                Attribute::string("value"),
                &["work", "home", "other"],
            ),
            multi_valued_typed(
                "phoneNumbers",
                Attribute::string("value"),
                &["work", "home", "mobile", "fax", "pager", "other"],
            ),
            multi_valued_typed(
                "ims",
                Attribute::string("value"),
                &["aim", "gtalk", "icq", "xmpp", "msn", "skype", "qq", "yahoo"],
            ),
            multi_valued_typed(
                "photos",
                Attribute::reference("value", &["external"]),
                &["photo", "thumbnail"],
            ),
            Attribute::complex(
                "addresses",
                vec![
                    Attribute::string("formatted"),
                    Attribute::string("streetAddress"),
                    Attribute::string("locality"),
                    Attribute::string("region"),
                    Attribute::string("postalCode"),
                    Attribute::string("country"),
                    Attribute::string("type").canonical_values(&["work", "home", "other"]),
                    Attribute::boolean("primary"),
                ],
            )
            .multi_valued(),
            Attribute::complex(
                "groups",
                vec![
                    Attribute::string("value").mutability(Mutability::ReadOnly),
                    Attribute::reference("$ref", &["User", "Group"])
                        .mutability(Mutability::ReadOnly),
                    Attribute::string("display").mutability(Mutability::ReadOnly),
                    Attribute::string("type").mutability(Mutability::ReadOnly),
                ],
            )
            .multi_valued()
            .mutability(Mutability::ReadOnly),
            multi_valued_typed("entitlements", Attribute::string("value"), &[]),
            multi_valued_typed("roles", Attribute::string("value"), &[]),
            multi_valued_typed("x509Certificates", Attribute::binary("value"), &[]),
        ]),
    )
    .with_name("User")
    .with_description("User Account")
}

/// Core Group schema.
pub fn group_schema() -> Schema {
    Schema::new(
        SCHEMA_GROUP,
        with_common_attributes(vec![
            Attribute::string("displayName").required(),
            Attribute::complex(
                "members",
                vec![
                    Attribute::string("value").mutability(Mutability::Immutable),
                    Attribute::reference("$ref", &["User", "Group"])
                        .mutability(Mutability::Immutable),
                    Attribute::string("display").mutability(Mutability::ReadOnly),
                    Attribute::string("type")
                        .canonical_values(&["User", "Group"])
                        .mutability(Mutability::Immutable),
                ],
            )
            .multi_valued(),
        ]),
    )
    .with_name("Group")
    .with_description("Group")
}

/// Enterprise User extension schema.
pub fn enterprise_user_schema() -> Schema {
    Schema::new(
        SCHEMA_ENTERPRISE_USER,
        vec![
            Attribute::string("employeeNumber"),
            Attribute::string("costCenter"),
            Attribute::string("organization"),
            Attribute::string("division"),
            Attribute::string("department"),
            Attribute::complex(
                "manager",
                vec![
                    Attribute::string("value"),
                    Attribute::reference("$ref", &["User"]),
                    Attribute::string("displayName").mutability(Mutability::ReadOnly),
                ],
            ),
        ],
    )
    .with_name("EnterpriseUser")
    .with_description("Enterprise User")
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_attribute_lookup_is_case_insensitive() {
        let schema = user_schema();
        assert_eq!(schema.attribute("USERNAME").unwrap().name, "userName");
        let name = schema.attribute("name").unwrap();
        assert_eq!(name.sub_attribute("familyname").unwrap().name, "familyName");
        assert!(schema.attribute("nope").is_none());
    }

    #[test]
    fn test_default_schemas_are_fresh_values() {
        let mut a = user_schema();
        a.attributes.clear();
        assert!(!user_schema().attributes.is_empty());
        assert_eq!(group_schema().id, SCHEMA_GROUP);
        assert_eq!(enterprise_user_schema().id, SCHEMA_ENTERPRISE_USER);
    }

    #[test]
    fn test_duplicate_sub_attribute_rejected() {
        let err = Attribute::try_complex(
            "name",
            vec![Attribute::string("given"), Attribute::string("GIVEN")],
        )
        .unwrap_err();
        assert_eq!(
            err,
            SchemaError::DuplicateAttribute {
                parent: "name".into(),
                name: "GIVEN".into()
            }
        );
    }

    #[test]
    #[should_panic(expected = "invalid schema definition")]
    fn test_duplicate_sub_attribute_panics_at_construction() {
        Attribute::complex(
            "name",
            vec![Attribute::string("given"), Attribute::string("Given")],
        );
    }

    #[test]
    fn test_duplicate_top_level_rejected() {
        let err = Schema::try_new(
            "urn:test",
            vec![Attribute::string("a"), Attribute::boolean("A")],
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateAttribute { .. }));
    }

    #[test]
    fn test_schema_from_json() {
        let schema = Schema::from_json(json!({
            "id": "urn:example:Device",
            "name": "Device",
            "attributes": [
                {"name": "serial", "type": "string", "caseExact": true, "required": true},
                {"name": "ports", "type": "integer", "multiValued": true},
                {"name": "lastSeen", "type": "dateTime", "mutability": "readOnly"},
                {"name": "owner", "type": "complex", "subAttributes": [
                    {"name": "value", "type": "string"}
                ]}
            ]
        }))
        .unwrap();

        let serial = schema.attribute("serial").unwrap();
        assert!(serial.case_exact && serial.required);
        assert!(schema.attribute("ports").unwrap().multi_valued);
        assert_eq!(
            schema.attribute("lastSeen").unwrap().mutability,
            Mutability::ReadOnly
        );
    }

    #[test]
    fn test_binary_and_reference_never_fold_case() {
        let schema = Schema::from_json(json!({
            "id": "urn:example:Photo",
            "attributes": [
                {"name": "photo", "type": "binary"},
                {"name": "owner", "type": "reference", "caseExact": false},
                {"name": "caption", "type": "string"}
            ]
        }))
        .unwrap();

        for name in ["photo", "owner"] {
            assert!(!schema.attribute(name).unwrap().folds_case(), "{}", name);
        }
        assert!(!Attribute::binary("photo").folds_case());
        assert!(!Attribute::reference("owner", &["User"]).folds_case());
        assert!(schema.attribute("caption").unwrap().folds_case());
    }

    #[test]
    fn test_schema_from_json_rejects_empty_complex() {
        let err = Schema::from_json(json!({
            "id": "urn:example:Bad",
            "attributes": [{"name": "blob", "type": "complex"}]
        }))
        .unwrap_err();
        assert_eq!(err, SchemaError::EmptyComplex("blob".into()));
    }

    #[test]
    fn test_for_sub_attributes_of_simple_multi_valued() {
        let attr = Attribute::string("tags").multi_valued();
        let scope = Schema::for_sub_attributes(&attr);
        let value = scope.attribute("value").unwrap();
        assert_eq!(value.attr_type, AttributeType::String);
        assert!(!value.multi_valued);
    }

    #[test]
    fn test_attribute_type_serde_spelling() {
        let json = serde_json::to_string(&AttributeType::DateTime).unwrap();
        assert_eq!(json, "\"dateTime\"");
        let m: Mutability = serde_json::from_str("\"readOnly\"").unwrap();
        assert_eq!(m, Mutability::ReadOnly);
    }
}
