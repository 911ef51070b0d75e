//! Configuration for the SCIM engine.
//!
//! The engine is configured via a TOML file, with support for environment
//! variable interpolation using `${VAR_NAME}` syntax. Every section is
//! optional.
//!
//! # Example
//!
//! ```toml
//! [filter]
//! max_length = 4096
//! max_depth = 32
//! or_evaluation = "both"
//!
//! [patch]
//! max_operations = ${SCIM_MAX_PATCH_OPERATIONS}
//! enforce_mutability = true
//!
//! [observability.logging]
//! level = "info"
//! format = "json"
//! ```

mod engine;
mod observability;

use std::path::Path;

pub use engine::*;
pub use observability::*;
use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScimConfig {
    /// Filter parsing and evaluation.
    #[serde(default)]
    pub filter: FilterConfig,

    /// PATCH validation.
    #[serde(default)]
    pub patch: PatchConfig,

    /// Observability configuration (logging).
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl ScimConfig {
    /// Load configuration from a TOML file.
    ///
    /// Environment variables in the format `${VAR_NAME}` are expanded.
    /// Missing variables cause an error.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e, path.as_ref().to_path_buf()))?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(contents: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(contents)?;
        let config: ScimConfig = toml::from_str(&expanded).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.filter.validate().map_err(ConfigError::Validation)?;
        self.patch.validate().map_err(ConfigError::Validation)?;

        if self.filter.or_evaluation == crate::scim::OrEvaluation::ShortCircuit {
            tracing::debug!(
                "filter.or_evaluation = \"short_circuit\": errors in the right operand of a \
                 true `or` will not be reported"
            );
        }
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {1}: {0}")]
    Io(std::io::Error, std::path::PathBuf),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}

/// Expand environment variables in the format `${VAR_NAME}`.
/// Variables after a `#` on the same line are left alone.
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let re = env_var_pattern();
    let mut result = String::with_capacity(input.len());

    for line in input.lines() {
        let comment_pos = line.find('#');
        let mut last_end = 0;

        for cap in re.captures_iter(line) {
            let Some(whole) = cap.get(0) else { continue };
            if comment_pos.is_some_and(|pos| whole.start() >= pos) {
                continue;
            }

            result.push_str(&line[last_end..whole.start()]);
            let var_name = &cap[1];
            let value = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;
            result.push_str(&value);
            last_end = whole.end();
        }

        result.push_str(&line[last_end..]);
        result.push('\n');
    }

    if !input.ends_with('\n') && result.ends_with('\n') {
        result.pop();
    }

    Ok(result)
}

fn env_var_pattern() -> &'static regex::Regex {
    static PATTERN: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
    PATTERN.get_or_init(|| regex::Regex::new(r"\$\{([^}]+)\}").expect("valid env var pattern"))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::scim::OrEvaluation;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = ScimConfig::from_str("").unwrap();
        assert_eq!(config, ScimConfig::default());
        assert_eq!(config.filter.max_length, 4096);
        assert_eq!(config.filter.max_depth, 32);
        assert_eq!(config.filter.or_evaluation, OrEvaluation::Both);
        assert_eq!(config.patch.max_operations, 1000);
        assert!(config.patch.enforce_mutability);
        assert_eq!(config.observability.logging.format, LogFormat::Compact);
    }

    #[test]
    fn test_full_config() {
        let config = ScimConfig::from_str(
            r#"
            [filter]
            max_length = 1024
            max_depth = 8
            or_evaluation = "short_circuit"

            [patch]
            max_operations = 50
            enforce_mutability = false

            [observability.logging]
            level = "debug"
            format = "json"
            filter = "hadrian_scim=trace"
        "#,
        )
        .unwrap();

        assert_eq!(config.filter.limits().max_length, 1024);
        assert_eq!(config.filter.limits().max_depth, 8);
        assert_eq!(config.filter.or_evaluation, OrEvaluation::ShortCircuit);
        assert_eq!(config.patch.max_operations, 50);
        assert!(!config.patch.enforce_mutability);
        assert_eq!(config.observability.logging.level, LogLevel::Debug);
        assert_eq!(config.observability.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let err = ScimConfig::from_str("[filter]\nmax_len = 10").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_validation_errors() {
        for toml in [
            "[filter]\nmax_length = 0",
            "[filter]\nmax_depth = 0",
            "[filter]\nmax_depth = 1000",
            "[patch]\nmax_operations = 0",
        ] {
            let err = ScimConfig::from_str(toml).unwrap_err();
            assert!(matches!(err, ConfigError::Validation(_)), "{}: {:?}", toml, err);
        }
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[patch]\nmax_operations = 7").unwrap();
        let config = ScimConfig::from_file(file.path()).unwrap();
        assert_eq!(config.patch.max_operations, 7);

        let err = ScimConfig::from_file("/nonexistent/scim.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(..)));
    }

    #[test]
    fn test_env_var_expansion() {
        temp_env::with_var("SCIM_TEST_MAX_OPS", Some("12"), || {
            let config =
                ScimConfig::from_str("[patch]\nmax_operations = ${SCIM_TEST_MAX_OPS}").unwrap();
            assert_eq!(config.patch.max_operations, 12);
        });
    }

    #[test]
    fn test_missing_env_var() {
        temp_env::with_var_unset("SCIM_TEST_UNSET", || {
            let err = expand_env_vars("level = \"${SCIM_TEST_UNSET}\"").unwrap_err();
            assert!(matches!(err, ConfigError::EnvVarNotFound(name) if name == "SCIM_TEST_UNSET"));
        });
    }

    #[test]
    fn test_env_var_in_comment_ignored() {
        let result = expand_env_vars("# level = \"${NONEXISTENT_VAR}\"").unwrap();
        assert_eq!(result, "# level = \"${NONEXISTENT_VAR}\"");
    }

    #[test]
    fn test_env_var_after_comment_ignored() {
        let result = expand_env_vars("level = \"info\" # ${NONEXISTENT_VAR}").unwrap();
        assert_eq!(result, "level = \"info\" # ${NONEXISTENT_VAR}");
    }

    #[test]
    fn test_multiline_with_comments() {
        temp_env::with_var("SCIM_TEST_MULTI", Some("debug"), || {
            let input = r#"level = "${SCIM_TEST_MULTI}"
# format = "${NONEXISTENT}"
format = "json""#;
            let result = expand_env_vars(input).unwrap();
            assert_eq!(
                result,
                r#"level = "debug"
# format = "${NONEXISTENT}"
format = "json""#
            );
        });
    }
}
