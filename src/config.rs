use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::writer::{DEFAULT_INDENT_WIDTH, MAX_INDENT_WIDTH};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("JSON parsing error: {0}")]
    JsonParsing(#[from] serde_json::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Unsupported configuration file format: {0}")]
    UnsupportedFormat(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Reader and writer configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ProcessorConfig {
    pub schemas: SchemaConfig,
    pub writer: WriterConfig,
}

/// Validating schemas
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct SchemaConfig {
    /// Schema files, relative paths resolved against the configuration file
    pub files: Vec<PathBuf>,
}

/// Writer output settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WriterConfig {
    /// Indent nested elements
    pub formatted_output: bool,
    /// Spaces per nesting level
    pub indent_width: usize,
    /// Write CDATA-wrapped values unescaped
    pub cdata_sections: bool,
    /// Schema location hint for the root element
    pub schema_location: Option<SchemaLocationConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SchemaLocationConfig {
    pub namespace: String,
    pub url: String,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            formatted_output: false,
            indent_width: DEFAULT_INDENT_WIDTH,
            cdata_sections: false,
            schema_location: None,
        }
    }
}

/// Loads and checks configuration files
pub struct ConfigManager;

impl ConfigManager {
    /// Load configuration from a file (TOML or JSON)
    pub fn load_from_file(path: &Path) -> Result<ProcessorConfig> {
        let content = fs::read_to_string(path)?;

        let mut config: ProcessorConfig = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => toml::from_str(&content)?,
            Some("json") => serde_json::from_str(&content)?,
            Some(ext) => return Err(ConfigError::UnsupportedFormat(ext.to_string())),
            None => {
                // Try to parse as TOML first, then JSON
                match toml::from_str::<ProcessorConfig>(&content) {
                    Ok(config) => config,
                    Err(_) => serde_json::from_str(&content)?,
                }
            }
        };

        if let Some(base) = path.parent() {
            Self::resolve_schema_paths(&mut config, base);
        }
        Self::validate_config(&config)?;

        tracing::debug!(
            path = %path.display(),
            schemas = config.schemas.files.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Make relative schema paths relative to `base`
    pub fn resolve_schema_paths(config: &mut ProcessorConfig, base: &Path) {
        for file in &mut config.schemas.files {
            if file.is_relative() {
                *file = base.join(&*file);
            }
        }
    }

    /// Validate configuration values
    pub fn validate_config(config: &ProcessorConfig) -> Result<()> {
        for file in &config.schemas.files {
            if file.as_os_str().is_empty() {
                return Err(ConfigError::Validation(
                    "Schema file paths cannot be empty".to_string(),
                ));
            }
        }

        let writer = &config.writer;
        if !(1..=MAX_INDENT_WIDTH).contains(&writer.indent_width) {
            return Err(ConfigError::Validation(format!(
                "Indent width must be between 1 and {}",
                MAX_INDENT_WIDTH
            )));
        }

        if let Some(location) = &writer.schema_location {
            for (what, value) in [("namespace", &location.namespace), ("URL", &location.url)] {
                if value.is_empty() || value.chars().any(char::is_whitespace) {
                    return Err(ConfigError::Validation(format!(
                        "Invalid schema location {}: '{}'",
                        what, value
                    )));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = ProcessorConfig::default();

        assert!(config.schemas.files.is_empty());
        assert!(!config.writer.formatted_output);
        assert_eq!(config.writer.indent_width, 4);
        assert!(!config.writer.cdata_sections);
        assert_eq!(config.writer.schema_location, None);
        assert!(ConfigManager::validate_config(&config).is_ok());
    }

    #[test]
    fn test_load_toml_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("binder.toml");

        let toml_content = r#"
[schemas]
files = ["schemas/person.xsd", "/abs/library.xsd"]

[writer]
formatted_output = true
indent_width = 2
cdata_sections = true

[writer.schema_location]
namespace = "urn:example:library"
url = "http://example.com/library.xsd"
"#;
        fs::write(&config_path, toml_content).unwrap();

        let config = ConfigManager::load_from_file(&config_path).unwrap();

        assert_eq!(
            config.schemas.files,
            vec![
                temp_dir.path().join("schemas/person.xsd"),
                PathBuf::from("/abs/library.xsd"),
            ]
        );
        assert!(config.writer.formatted_output);
        assert_eq!(config.writer.indent_width, 2);
        assert!(config.writer.cdata_sections);
        assert_eq!(
            config.writer.schema_location,
            Some(SchemaLocationConfig {
                namespace: "urn:example:library".to_string(),
                url: "http://example.com/library.xsd".to_string(),
            })
        );
    }

    #[test]
    fn test_load_json_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("binder.json");

        let json_content = r#"{
  "writer": {
    "formatted_output": true,
    "indent_width": 8
  }
}"#;
        fs::write(&config_path, json_content).unwrap();

        let config = ConfigManager::load_from_file(&config_path).unwrap();

        assert!(config.schemas.files.is_empty());
        assert!(config.writer.formatted_output);
        assert_eq!(config.writer.indent_width, 8);
        assert!(!config.writer.cdata_sections);
    }

    #[test]
    fn test_load_without_extension_falls_back_to_json() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("binderrc");
        fs::write(&config_path, r#"{"writer": {"cdata_sections": true}}"#).unwrap();

        let config = ConfigManager::load_from_file(&config_path).unwrap();
        assert!(config.writer.cdata_sections);
    }

    #[test]
    fn test_unsupported_format() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("binder.yaml");
        fs::write(&config_path, "writer: {}").unwrap();

        let result = ConfigManager::load_from_file(&config_path);
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(ext)) if ext == "yaml"));
    }

    #[test]
    fn test_missing_file() {
        let result = ConfigManager::load_from_file(Path::new("/nonexistent/binder.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_invalid_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("binder.toml");
        fs::write(&config_path, "[writer\nindent_width = ").unwrap();

        let result = ConfigManager::load_from_file(&config_path);
        assert!(matches!(result, Err(ConfigError::TomlParsing(_))));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = ProcessorConfig::default();
        config.writer.indent_width = 0;
        assert!(matches!(
            ConfigManager::validate_config(&config),
            Err(ConfigError::Validation(_))
        ));

        let mut config = ProcessorConfig::default();
        config.writer.indent_width = 17;
        assert!(ConfigManager::validate_config(&config).is_err());

        let mut config = ProcessorConfig::default();
        config.writer.schema_location = Some(SchemaLocationConfig {
            namespace: "urn:a".to_string(),
            url: "two words.xsd".to_string(),
        });
        assert!(ConfigManager::validate_config(&config).is_err());

        let mut config = ProcessorConfig::default();
        config.schemas.files.push(PathBuf::new());
        assert!(ConfigManager::validate_config(&config).is_err());
    }
}
