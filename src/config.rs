//! Configuration loading
//!
//! Settings live in a TOML file with a `[localization]` section and a
//! `[connection_strings]` table:
//!
//! ```toml
//! [localization]
//! default_culture = "en-US"
//! supported_cultures = ["en-US", "fr-FR"]
//! enable_culture_fallback = true
//! tenant_id = "acme"
//! provider = "sqlite"
//!
//! [connection_strings]
//! LocalizationDb = "localization.db"
//! ```
//!
//! Problems are reported when the file is loaded, never later: a service
//! that starts has a usable configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "TENANT_L10N_CONFIG";

/// Config file used when neither an argument nor the environment names one
pub const DEFAULT_CONFIG_PATH: &str = "l10n.toml";

/// Configuration loading or validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data
    #[error("invalid config: {0}")]
    Invalid(String),
    /// Named connection string is absent or blank
    #[error("Localization connection string '{0}' was not found.")]
    MissingConnection(String),
    /// Provider name not recognized
    #[error("Unsupported localization database provider {0}")]
    UnsupportedProvider(String),
}

fn default_culture() -> String {
    "en-US".to_string()
}

fn default_true() -> bool {
    true
}

fn default_connection_string_name() -> String {
    "LocalizationDb".to_string()
}

fn default_provider() -> String {
    "sqlite".to_string()
}

/// Options controlling lookups and seeding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalizationOptions {
    /// Culture used when nothing else is requested, and the last fallback
    #[serde(default = "default_culture")]
    pub default_culture: String,
    /// Cultures offered to users; empty accepts any culture
    #[serde(default)]
    pub supported_cultures: Vec<String>,
    /// Walk parent cultures and then the default culture on a miss
    #[serde(default = "default_true")]
    pub enable_culture_fallback: bool,
    /// Tenant whose overrides apply; blank means global only
    #[serde(default)]
    pub tenant_id: Option<String>,
    /// Entry of `[connection_strings]` holding the database location
    #[serde(default = "default_connection_string_name")]
    pub connection_string_name: String,
    /// Store backend: `sqlite` or `memory`
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Prefix for keys generated from model and field names
    #[serde(default)]
    pub key_prefix: Option<String>,
}

impl Default for LocalizationOptions {
    fn default() -> Self {
        Self {
            default_culture: default_culture(),
            supported_cultures: Vec::new(),
            enable_culture_fallback: true,
            tenant_id: None,
            connection_string_name: default_connection_string_name(),
            provider: default_provider(),
            key_prefix: None,
        }
    }
}

impl LocalizationOptions {
    /// Whether `culture` may be selected
    ///
    /// An empty supported list accepts everything; otherwise membership is
    /// checked case-insensitively.
    pub fn is_supported(&self, culture: &str) -> bool {
        self.supported_cultures.is_empty()
            || self
                .supported_cultures
                .iter()
                .any(|c| c.trim().eq_ignore_ascii_case(culture.trim()))
    }

    /// Key generated for a model field: `"{prefix}{model}.{field}"`
    pub fn generated_key(&self, model: &str, field: &str) -> String {
        format!(
            "{}{}.{}",
            self.key_prefix.as_deref().unwrap_or(""),
            model,
            field
        )
    }

    /// Cultures to seed when the caller names none
    ///
    /// The supported list when configured, otherwise the default culture.
    pub fn seed_cultures(&self) -> Vec<String> {
        if self.supported_cultures.is_empty() {
            vec![self.default_culture.clone()]
        } else {
            self.supported_cultures.clone()
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.default_culture.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "localization.default_culture must be set".to_string(),
            ));
        }
        if self.supported_cultures.iter().any(|c| c.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "localization.supported_cultures must not contain blank entries".to_string(),
            ));
        }
        if !self.is_supported(&self.default_culture) {
            return Err(ConfigError::Invalid(format!(
                "localization.default_culture '{}' is not listed in supported_cultures",
                self.default_culture
            )));
        }
        if self.connection_string_name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "localization.connection_string_name must be set".to_string(),
            ));
        }
        Ok(())
    }
}

/// Top-level configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub localization: LocalizationOptions,
    #[serde(default)]
    pub connection_strings: HashMap<String, String>,
}

impl AppConfig {
    /// Load and validate configuration
    ///
    /// The file is `path` when given, else the file named by
    /// `TENANT_L10N_CONFIG`, else `l10n.toml`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when reading, parsing or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path);
        let content = fs::read_to_string(&resolved).map_err(|e| {
            ConfigError::Io(format!("Failed to read '{}': {}", resolved.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for internal consistency
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.localization.validate()
    }

    /// The connection string named by `localization.connection_string_name`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingConnection`] when absent or blank.
    pub fn connection_string(&self) -> Result<&str, ConfigError> {
        let name = self.localization.connection_string_name.trim();
        self.connection_strings
            .get(name)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ConfigError::MissingConnection(name.to_string()))
    }
}

fn resolve_path(path: Option<&Path>) -> PathBuf {
    if let Some(path) = path {
        return path.to_path_buf();
    }
    match std::env::var(CONFIG_ENV_VAR) {
        Ok(value) if !value.trim().is_empty() => PathBuf::from(value.trim()),
        _ => PathBuf::from(DEFAULT_CONFIG_PATH),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();
        let options = &config.localization;
        assert_eq!(options.default_culture, "en-US");
        assert!(options.enable_culture_fallback);
        assert_eq!(options.connection_string_name, "LocalizationDb");
        assert_eq!(options.provider, "sqlite");
        assert!(options.supported_cultures.is_empty());
        assert_eq!(options.tenant_id, None);
    }

    #[test]
    fn test_full_file() {
        let config = AppConfig::from_toml_str(
            r#"
            [localization]
            default_culture = "fr-FR"
            supported_cultures = ["en-US", "fr-FR"]
            enable_culture_fallback = false
            tenant_id = "acme"
            connection_string_name = "Main"
            provider = "memory"
            key_prefix = "App."

            [connection_strings]
            Main = "data.db"
            "#,
        )
        .unwrap();
        assert_eq!(config.localization.default_culture, "fr-FR");
        assert!(!config.localization.enable_culture_fallback);
        assert_eq!(config.localization.tenant_id.as_deref(), Some("acme"));
        assert_eq!(config.connection_string().unwrap(), "data.db");
        assert_eq!(
            config.localization.generated_key("Order", "Status"),
            "App.Order.Status"
        );
    }

    #[test]
    fn test_parse_error() {
        let err = AppConfig::from_toml_str("[localization\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_default_culture_must_be_supported() {
        let err = AppConfig::from_toml_str(
            r#"
            [localization]
            default_culture = "de-DE"
            supported_cultures = ["en-US"]
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_blank_default_culture_rejected() {
        let err = AppConfig::from_toml_str("[localization]\ndefault_culture = \" \"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_missing_connection_string() {
        let config = AppConfig::from_toml_str("").unwrap();
        let err = config.connection_string().unwrap_err();
        assert_eq!(err, ConfigError::MissingConnection("LocalizationDb".to_string()));
        assert_eq!(
            err.to_string(),
            "Localization connection string 'LocalizationDb' was not found."
        );
    }

    #[test]
    fn test_is_supported_case_insensitive() {
        let mut options = LocalizationOptions::default();
        assert!(options.is_supported("xx-YY"));
        options.supported_cultures = vec!["en-US".to_string(), "fr-FR".to_string()];
        assert!(options.is_supported("fr-fr"));
        assert!(!options.is_supported("de-DE"));
    }

    #[test]
    fn test_seed_cultures() {
        let mut options = LocalizationOptions::default();
        assert_eq!(options.seed_cultures(), vec!["en-US"]);
        options.supported_cultures = vec!["en-US".to_string(), "fr-FR".to_string()];
        assert_eq!(options.seed_cultures(), vec!["en-US", "fr-FR"]);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[localization]\ndefault_culture = \"en-GB\"").unwrap();
        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.localization.default_culture, "en-GB");

        let missing = AppConfig::load(Some(Path::new("/nonexistent/l10n.toml"))).unwrap_err();
        assert!(matches!(missing, ConfigError::Io(_)));
    }
}
