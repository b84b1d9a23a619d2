//! Materialization settings loaded from TOML.
//!
//! ```toml
//! max_fetch_depth = 3
//! batch_fetch_size = 16
//! unique_semantic = "filter"
//! metrics = true
//! ```

use crate::exec::UniqueSemantic;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error as ThisError;

///
/// ConfigError
///

#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config value '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

///
/// MaterializeConfig
///
/// Settings shared by plan building and row processing.
/// Missing keys take their defaults; unknown keys are rejected.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct MaterializeConfig {
    /// Association depth beyond which join fetches are not joined.
    pub max_fetch_depth: Option<u32>,

    /// Group size for pending select loads.
    pub batch_fetch_size: u32,

    /// Overrides the de-duplication policy derived from the plan.
    pub unique_semantic: Option<UniqueSemantic>,

    pub metrics: bool,
}

impl Default for MaterializeConfig {
    fn default() -> Self {
        Self {
            max_fetch_depth: None,
            batch_fetch_size: 1,
            unique_semantic: None,
            metrics: true,
        }
    }
}

impl MaterializeConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;

        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_fetch_size == 0 {
            return Err(ConfigError::Invalid {
                field: "batch_fetch_size",
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(())
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = MaterializeConfig::from_toml_str("").expect("empty config should parse");

        assert_eq!(config, MaterializeConfig::default());
        assert_eq!(config.batch_fetch_size, 1);
        assert!(config.metrics);
    }

    #[test]
    fn all_keys_are_read() {
        let config = MaterializeConfig::from_toml_str(
            r#"
            max_fetch_depth = 2
            batch_fetch_size = 8
            unique_semantic = "assert"
            metrics = false
            "#,
        )
        .expect("full config should parse");

        assert_eq!(config.max_fetch_depth, Some(2));
        assert_eq!(config.batch_fetch_size, 8);
        assert_eq!(config.unique_semantic, Some(UniqueSemantic::Assert));
        assert!(!config.metrics);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = MaterializeConfig::from_toml_str("max_depth = 2")
            .expect_err("unknown key should be rejected");

        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn zero_batch_size_is_invalid() {
        let err = MaterializeConfig::from_toml_str("batch_fetch_size = 0")
            .expect_err("zero batch size should be rejected");

        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "batch_fetch_size",
                ..
            }
        ));
    }

    #[test]
    fn load_reports_missing_file_with_path() {
        let err = MaterializeConfig::load("/nonexistent/rowgraph.toml")
            .expect_err("missing file should fail");

        assert!(matches!(err, ConfigError::Io { ref path, .. } if path.ends_with("rowgraph.toml")));
    }
}
