//! Session configuration, read from a TOML file.
//!
//! Every field has a default, so an empty file (or no file at all) is a
//! valid configuration.

use crate::executor::ExecutorConfig;
use crate::security::{CodeValidator, NameRules};
use crate::store::{StoreLimits, DEFAULT_NAME};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid denylist pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaygroundConfig {
    /// Extension of the typed dialect; picks the transpiler and is shown in listings
    pub extension: String,
    /// Store key for uploads whose name is only an extension
    pub default_name: String,
    /// File name used when a download prompt is left empty
    pub download_name: String,
    pub color: bool,
    pub executor: ExecutorConfig,
    pub store: StoreLimits,
    /// Patterns rejected in addition to the built-in denylist
    pub denylist: Vec<String>,
}

impl Default for PlaygroundConfig {
    fn default() -> Self {
        Self {
            extension: "ts".to_string(),
            default_name: DEFAULT_NAME.to_string(),
            download_name: format!("{}.ts", DEFAULT_NAME),
            color: true,
            executor: ExecutorConfig::default(),
            store: StoreLimits::default(),
            denylist: Vec::new(),
        }
    }
}

impl PlaygroundConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), "config loaded");
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let extension = self.extension.trim_start_matches('.');
        if extension.is_empty() || extension.contains(['/', '\\', '.']) {
            return Err(ConfigError::Invalid {
                field: "extension",
                reason: format!("{:?} is not a file extension", self.extension),
            });
        }
        for (field, value) in [
            ("default_name", &self.default_name),
            ("download_name", &self.download_name),
        ] {
            NameRules::validate(value).map_err(|e| ConfigError::Invalid {
                field,
                reason: e.to_string(),
            })?;
        }
        self.validator()?;
        Ok(())
    }

    /// Extension without a leading dot
    pub fn extension(&self) -> &str {
        self.extension.trim_start_matches('.')
    }

    pub fn validator(&self) -> Result<CodeValidator, ConfigError> {
        Ok(CodeValidator::with_extra_patterns(&self.denylist)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Write;

    #[test]
    fn test_empty_file_is_default() {
        let config = PlaygroundConfig::from_toml_str("").unwrap();
        assert_eq!(config, PlaygroundConfig::default());
        assert_eq!(config.executor.timeout_ms, 2000);
        assert_eq!(config.download_name, "untitled.ts");
    }

    #[test]
    fn test_partial_tables_keep_defaults() {
        let text = r#"
            extension = "js"
            denylist = ["document\\."]

            [executor]
            timeout_ms = 500

            [executor.limits]
            max_output_lines = 10
        "#;
        let config = PlaygroundConfig::from_toml_str(text).unwrap();
        assert_eq!(config.extension(), "js");
        assert_eq!(config.executor.timeout_ms, 500);
        assert_eq!(config.executor.limits.max_output_lines, 10);
        assert_eq!(config.executor.limits.max_call_depth, 256);
        assert_eq!(config.store, StoreLimits::default());
        assert!(!config.validator().unwrap().is_valid("document.title"));
    }

    #[rstest]
    #[case("extension = \"\"")]
    #[case("extension = \"a/b\"")]
    #[case("default_name = \"../x\"")]
    #[case("download_name = \"  \"")]
    #[case("denylist = [\"(\"]")]
    #[case("color = \"yes\"")]
    fn test_invalid_config(#[case] text: &str) {
        assert!(PlaygroundConfig::from_toml_str(text).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "color = false").unwrap();
        let config = PlaygroundConfig::load(file.path()).unwrap();
        assert!(!config.color);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = PlaygroundConfig::load(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
