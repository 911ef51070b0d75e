use serde::{Deserialize, Serialize};

use crate::scim::{
    evaluate::OrEvaluation,
    filter::{FilterLimits, MAX_FILTER_DEPTH, MAX_FILTER_LENGTH},
    patch::DEFAULT_MAX_OPERATIONS,
};

/// Hard ceiling for `filter.max_depth`; the parser recurses once per level.
pub const MAX_CONFIGURABLE_DEPTH: usize = 256;

/// Filter parsing and evaluation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterConfig {
    /// Maximum filter length in bytes. Default: 4096.
    #[serde(default = "default_max_length")]
    pub max_length: usize,

    /// Maximum nesting depth of parentheses, `not`, and value paths.
    /// Default: 32, at most 256.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Whether `or` evaluates its right operand when the left is true.
    #[serde(default)]
    pub or_evaluation: OrEvaluation,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            max_length: default_max_length(),
            max_depth: default_max_depth(),
            or_evaluation: OrEvaluation::default(),
        }
    }
}

impl FilterConfig {
    pub fn limits(&self) -> FilterLimits {
        FilterLimits {
            max_length: self.max_length,
            max_depth: self.max_depth,
        }
    }

    pub(super) fn validate(&self) -> Result<(), String> {
        if self.max_length == 0 {
            return Err("filter.max_length must be greater than 0".into());
        }
        if self.max_depth == 0 {
            return Err("filter.max_depth must be greater than 0".into());
        }
        if self.max_depth > MAX_CONFIGURABLE_DEPTH {
            return Err(format!(
                "filter.max_depth must be at most {} (got {})",
                MAX_CONFIGURABLE_DEPTH, self.max_depth
            ));
        }
        Ok(())
    }
}

fn default_max_length() -> usize {
    MAX_FILTER_LENGTH
}

fn default_max_depth() -> usize {
    MAX_FILTER_DEPTH
}

/// PATCH validation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatchConfig {
    /// Maximum operations per PATCH request. Default: 1000.
    #[serde(default = "default_max_operations")]
    pub max_operations: usize,

    /// Reject writes to readOnly attributes and removal of required ones.
    #[serde(default = "default_true")]
    pub enforce_mutability: bool,
}

impl Default for PatchConfig {
    fn default() -> Self {
        Self {
            max_operations: default_max_operations(),
            enforce_mutability: true,
        }
    }
}

impl PatchConfig {
    pub(super) fn validate(&self) -> Result<(), String> {
        if self.max_operations == 0 {
            return Err("patch.max_operations must be greater than 0".into());
        }
        Ok(())
    }
}

fn default_max_operations() -> usize {
    DEFAULT_MAX_OPERATIONS
}

fn default_true() -> bool {
    true
}
