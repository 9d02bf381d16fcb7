//! Deployment configuration resolved from the environment.
//!
//! # Invariants
//! - Blank environment values fall back to defaults.
//! - `app_id` is a single path segment (no `/`).

use crate::store::{CollectionPath, StoreResult};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const APP_ID_ENV: &str = "TENDA_APP_ID";
pub const DB_PATH_ENV: &str = "TENDA_DB_PATH";
pub const DEFAULT_APP_ID: &str = "tenda-care-default";
pub const DEFAULT_DB_FILE_NAME: &str = "tenda_care.sqlite3";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidAppId(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidAppId(value) => {
                write!(f, "app id must be a single path segment, got `{value}`")
            }
        }
    }
}

impl Error for ConfigError {}

/// Settings shared by the FFI layer and the CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TendaConfig {
    /// Deployment namespace used in every collection path.
    pub app_id: String,
    /// SQLite file backing the persistent document store.
    pub db_path: PathBuf,
}

impl Default for TendaConfig {
    fn default() -> Self {
        Self {
            app_id: DEFAULT_APP_ID.to_string(),
            db_path: std::env::temp_dir().join(DEFAULT_DB_FILE_NAME),
        }
    }
}

impl TendaConfig {
    /// Reads `TENDA_APP_ID` and `TENDA_DB_PATH`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolves settings through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(app_id) = non_blank(lookup(APP_ID_ENV)) {
            config = config.with_app_id(app_id)?;
        }
        if let Some(db_path) = non_blank(lookup(DB_PATH_ENV)) {
            config.db_path = PathBuf::from(db_path);
        }

        Ok(config)
    }

    /// Replaces the app id after validating it.
    pub fn with_app_id(mut self, app_id: impl Into<String>) -> Result<Self, ConfigError> {
        let app_id = app_id.into();
        let trimmed = app_id.trim();
        if trimmed.is_empty() || trimmed.contains('/') {
            return Err(ConfigError::InvalidAppId(app_id));
        }
        self.app_id = trimmed.to_string();
        Ok(self)
    }

    pub fn exchange_collection(&self) -> StoreResult<CollectionPath> {
        CollectionPath::exchange(&self.app_id)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, TendaConfig, APP_ID_ENV, DB_PATH_ENV, DEFAULT_APP_ID};
    use std::path::PathBuf;

    #[test]
    fn missing_or_blank_values_use_defaults() {
        let config = TendaConfig::from_lookup(|key| match key {
            APP_ID_ENV => Some("   ".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.app_id, DEFAULT_APP_ID);
        assert_eq!(config, TendaConfig::default());
    }

    #[test]
    fn lookup_overrides_are_trimmed() {
        let config = TendaConfig::from_lookup(|key| match key {
            APP_ID_ENV => Some(" tenda-prod ".to_string()),
            DB_PATH_ENV => Some("/var/lib/tenda/store.sqlite3".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.app_id, "tenda-prod");
        assert_eq!(config.db_path, PathBuf::from("/var/lib/tenda/store.sqlite3"));
        assert_eq!(
            config.exchange_collection().unwrap().as_str(),
            "artifacts/tenda-prod/public/data/equipmentExchange"
        );
    }

    #[test]
    fn nested_app_id_is_rejected() {
        let err = TendaConfig::default().with_app_id("a/b").unwrap_err();
        assert_eq!(err, ConfigError::InvalidAppId("a/b".to_string()));
    }
}
