//! Attribute path resolution.
//!
//! Resolves an [`AttrPath`] against a base schema and its extensions, and
//! locates the corresponding value in a resource.
//!
//! Unqualified names are looked up in the base schema first and then in
//! each extension in declaration order; the first match wins. A URI prefix
//! restricts the search to the schema with that id.

use super::{
    error::ScimError,
    evaluate::validate_filter,
    filter::AttrPath,
    types::{Attribute, Schema},
    value::{AttrValue, Attributes},
};

/// Reasons an attribute path does not resolve.
///
/// Converted to `invalidFilter` in filter context. The PATCH validator
/// reports unknown names as `invalidValue` and keeps `invalidFilter` for
/// value filters. Errors inside a bracketed value filter are carried as-is
/// in [`PathError::Filter`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PathError {
    #[error("unknown schema '{0}'")]
    UnknownSchema(String),

    #[error("unknown attribute '{0}'")]
    UnknownAttribute(String),

    #[error("attribute '{attr}' has no sub-attribute '{sub_attr}'")]
    UnknownSubAttribute { attr: String, sub_attr: String },

    #[error("value filter on '{0}' requires a multi-valued attribute")]
    NotMultiValued(String),

    #[error("{0}")]
    Filter(ScimError),
}

impl From<PathError> for ScimError {
    fn from(e: PathError) -> Self {
        match e {
            PathError::Filter(inner) => inner,
            other => ScimError::InvalidFilter(other.to_string()),
        }
    }
}

/// A path resolved against the schema set.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedPath<'s> {
    /// Schema that owns the top-level attribute
    pub schema: &'s Schema,
    pub attribute: &'s Attribute,
    pub sub_attribute: Option<&'s Attribute>,
}

impl<'s> ResolvedPath<'s> {
    /// The attribute a value at this path must conform to.
    pub fn target(&self) -> &'s Attribute {
        self.sub_attribute.unwrap_or(self.attribute)
    }
}

/// Resolve `path` against `schema` plus `extensions`.
///
/// A bracketed value filter is validated against the attribute's
/// sub-attributes, which requires the attribute to be multi-valued.
pub fn resolve<'s>(
    schema: &'s Schema,
    extensions: &'s [Schema],
    path: &AttrPath,
) -> Result<ResolvedPath<'s>, PathError> {
    let (owner, attribute) = match &path.schema {
        Some(uri) => {
            let owner = std::iter::once(schema)
                .chain(extensions)
                .find(|s| s.id.eq_ignore_ascii_case(uri))
                .ok_or_else(|| PathError::UnknownSchema(uri.clone()))?;
            let attribute = owner
                .attribute(&path.attr)
                .ok_or_else(|| PathError::UnknownAttribute(format!("{}:{}", uri, path.attr)))?;
            (owner, attribute)
        }
        None => std::iter::once(schema)
            .chain(extensions)
            .find_map(|s| s.attribute(&path.attr).map(|a| (s, a)))
            .ok_or_else(|| PathError::UnknownAttribute(path.attr.clone()))?,
    };

    let sub_attribute = match &path.sub_attr {
        Some(sub) => Some(attribute.sub_attribute(sub).ok_or_else(|| {
            PathError::UnknownSubAttribute {
                attr: attribute.name.clone(),
                sub_attr: sub.clone(),
            }
        })?),
        None => None,
    };

    if let Some(filter) = &path.value_filter {
        if !attribute.multi_valued {
            return Err(PathError::NotMultiValued(attribute.name.clone()));
        }
        let scope = Schema::for_sub_attributes(attribute);
        validate_filter(&scope, &[], filter).map_err(PathError::Filter)?;
    }

    Ok(ResolvedPath {
        schema: owner,
        attribute,
        sub_attribute,
    })
}

/// Find the value of a resolved top-level attribute in `resource`.
///
/// Tries the bare attribute name, then `"<schema-id>:<name>"`, then the
/// RFC 7643 extension object `{"<schema-id>": {"<name>": ...}}`. Explicit
/// nulls count as absent.
pub fn lookup<'r>(resource: &'r Attributes, resolved: &ResolvedPath<'_>) -> Option<&'r AttrValue> {
    let name = &resolved.attribute.name;
    let schema_id = &resolved.schema.id;

    resource
        .get(name)
        .or_else(|| resource.get(&format!("{}:{}", schema_id, name)))
        .or_else(|| {
            resource
                .get(schema_id)
                .and_then(AttrValue::as_complex)
                .and_then(|ext| ext.get(name))
        })
        .filter(|v| !v.is_null())
}
