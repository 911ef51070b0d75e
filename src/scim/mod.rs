//! SCIM 2.0 Schema-Driven Engine
//!
//! This module interprets SCIM filter expressions and PATCH operations
//! against runtime-supplied schemas. Resources are plain attribute maps; the
//! engine never needs compile-time knowledge of a resource's shape.
//!
//! ## RFC References
//!
//! - RFC 7643: SCIM Core Schema
//! - RFC 7644: SCIM Protocol
//!
//! ## Module Structure
//!
//! - [`types`]: Attribute and schema definitions, default User/Group schemas
//! - [`value`]: Runtime attribute values and the resource attribute map
//! - [`filter`]: Filter expression tree and parser
//! - [`compare`]: Type-aware comparators and PATCH value coercion
//! - [`path`]: Attribute path resolution against a schema set
//! - [`evaluate`]: Filter evaluation against resources
//! - [`patch`]: PATCH request parsing and validation
//! - [`error`]: SCIM error taxonomy and RFC 7644 error responses
//! - [`engine`]: Configured facade over all of the above
//!
//! ## Example
//!
//! ```
//! use hadrian_scim::scim::{Attributes, ScimEngine};
//! use serde_json::json;
//!
//! let engine = ScimEngine::users();
//! let filter = engine.parse_filter(r#"emails[type eq "work"]"#).unwrap();
//! let babs = Attributes::from_json(&json!({
//!     "userName": "bjensen",
//!     "emails": [{"type": "home"}, {"type": "work"}]
//! }))
//! .unwrap();
//! assert!(engine.evaluator().evaluate(Some(&filter), &babs).unwrap());
//! ```

pub mod compare;
pub mod engine;
pub mod error;
pub mod evaluate;
pub mod filter;
pub mod patch;
pub mod path;
pub mod types;
pub mod value;

pub use compare::{Comparator, Mismatch, coerce_value, compare};
pub use engine::ScimEngine;
pub use error::*;
pub use evaluate::{FilterEvaluator, OrEvaluation, validate_filter};
pub use filter::{
    AttrPath, CompareOp, Filter, FilterLimits, FilterParseError, FilterValue, parse_filter,
};
pub use patch::{
    PatchOp, PatchOpKind, PatchPath, PatchRequest, PatchValidator, ValidatedOperation, parse_path,
};
pub use path::{PathError, ResolvedPath, resolve};
pub use types::*;
pub use value::{AttrValue, Attributes};
