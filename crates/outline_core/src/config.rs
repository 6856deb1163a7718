//! Runtime configuration for the outline core.
//!
//! # Responsibility
//! - Load settings from a TOML file, falling back to defaults per field.
//! - Apply `OUTLINE_*` environment overrides on top of the file.
//!
//! # Invariants
//! - A loaded config has passed `validate()`.
//! - Invalid environment values are ignored with a warning, never fatal.

use crate::export::{ExportFormat, ExportOptions};
use log::warn;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const ENV_LOG_LEVEL: &str = "OUTLINE_LOG_LEVEL";
pub const ENV_DB_PATH: &str = "OUTLINE_DB_PATH";
pub const ENV_MAX_FETCH_ROUNDS: &str = "OUTLINE_MAX_FETCH_ROUNDS";

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse(toml::de::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "failed to read {}: {source}", path.display()),
            Self::Parse(err) => write!(f, "failed to parse config: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        Self::Parse(value)
    }
}

/// Export defaults from the `[export]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// MIME type, `text/plain` or `text/html`.
    pub format: String,
    pub exclude_meta: bool,
    pub exclude_archived: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            format: ExportFormat::PlainText.mime().to_string(),
            exclude_meta: false,
            exclude_archived: false,
        }
    }
}

impl ExportConfig {
    pub fn format(&self) -> Result<ExportFormat, ConfigError> {
        ExportFormat::from_str(&self.format).map_err(|err| ConfigError::Invalid(err.to_string()))
    }

    pub fn options(&self) -> ExportOptions {
        ExportOptions {
            exclude_meta: self.exclude_meta,
            exclude_archived: self.exclude_archived,
            title: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub log_level: String,
    /// Absolute directory for rolling log files; stderr when unset.
    pub log_dir: Option<PathBuf>,
    pub db_path: PathBuf,
    pub max_fetch_rounds: u32,
    pub export: ExportConfig,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            log_level: crate::logging::default_log_level().to_string(),
            log_dir: None,
            db_path: PathBuf::from("outline.sqlite3"),
            max_fetch_rounds: crate::service::outline_service::DEFAULT_MAX_FETCH_ROUNDS,
            export: ExportConfig::default(),
        }
    }
}

impl CoreConfig {
    /// Parses TOML text; missing keys take their defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: CoreConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads `path` when it exists, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) if path.exists() => {
                let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                toml::from_str(&contents)?
            }
            _ => CoreConfig::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_from(|key| std::env::var(key).ok());
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F)
    where
        F: FnMut(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_LOG_LEVEL) {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                self.log_level = trimmed.to_string();
            }
        }
        if let Some(raw) = lookup(ENV_DB_PATH) {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                self.db_path = PathBuf::from(trimmed);
            }
        }
        if let Some(raw) = lookup(ENV_MAX_FETCH_ROUNDS) {
            match raw.trim().parse::<u32>() {
                Ok(value) if value > 0 => self.max_fetch_rounds = value,
                _ => warn!("event=config_env module=config status=ignored key={ENV_MAX_FETCH_ROUNDS}"),
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        crate::logging::normalize_level(&self.log_level).map_err(ConfigError::Invalid)?;
        if let Some(dir) = &self.log_dir {
            if !dir.is_absolute() {
                return Err(ConfigError::Invalid(format!(
                    "log_dir must be an absolute path, got `{}`",
                    dir.display()
                )));
            }
        }
        if self.db_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("db_path cannot be empty".to_string()));
        }
        if self.max_fetch_rounds == 0 {
            return Err(ConfigError::Invalid(
                "max_fetch_rounds must be at least 1".to_string(),
            ));
        }
        self.export.format()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{CoreConfig, ExportConfig, ENV_DB_PATH, ENV_LOG_LEVEL, ENV_MAX_FETCH_ROUNDS};
    use crate::export::ExportFormat;
    use std::path::PathBuf;

    #[test]
    fn env_overrides_replace_file_values() {
        let mut config = CoreConfig::default();
        config.apply_env_overrides_from(|key| match key {
            ENV_LOG_LEVEL => Some(" warn ".to_string()),
            ENV_DB_PATH => Some("/tmp/outline.db".to_string()),
            ENV_MAX_FETCH_ROUNDS => Some("zero".to_string()),
            _ => None,
        });
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.db_path, PathBuf::from("/tmp/outline.db"));
        assert_eq!(config.max_fetch_rounds, CoreConfig::default().max_fetch_rounds);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config = CoreConfig::from_toml_str(
            r#"
log_level = "debug"

[export]
format = "text/html"
exclude_archived = true
"#,
        )
        .unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.db_path, CoreConfig::default().db_path);
        assert_eq!(config.export.format().unwrap(), ExportFormat::Html);
        assert!(config.export.options().exclude_archived);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(CoreConfig::from_toml_str("max_fetch_rounds = 0").is_err());
        assert!(CoreConfig::from_toml_str("log_dir = \"relative/logs\"").is_err());
        assert!(CoreConfig::from_toml_str("[export]\nformat = \"text/csv\"").is_err());
        assert!(CoreConfig::from_toml_str("log_level = 3").is_err());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        let config = CoreConfig::load(Some(missing.as_path())).unwrap();
        assert_eq!(config.export, ExportConfig::default());
    }
}
