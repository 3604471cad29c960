use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::client::TodoClient;
use crate::error::ConfigError;
use crate::store::{RollbackPolicy, TodoStore};

/// Overrides `base_url` when set.
pub const API_URL_ENV: &str = "TODO_API_URL";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct StoreConfig {
    pub base_url: String,
    #[serde(default)]
    pub rollback: RollbackPolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3000".to_string(),
            rollback: RollbackPolicy::default(),
        }
    }
}

impl StoreConfig {
    pub fn from_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let p = path.as_ref();
        let contents = fs::read_to_string(p).map_err(|e| ConfigError::OpeningError(p.to_owned(), e))?;
        Self::from_str(&contents)
    }

    /// Apply `TODO_API_URL` if present.
    pub fn with_env(mut self) -> Self {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            self.base_url = url;
        }
        self
    }

    pub fn build_store(&self) -> TodoStore {
        TodoStore::new(TodoClient::new(&self.base_url), self.rollback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_config() {
        let config = StoreConfig::from_str(
            r#"
            base_url = "http://todos.local:8080/"
            rollback = "snapshot"
            "#,
        )
        .unwrap();
        assert_eq!(config.base_url, "http://todos.local:8080/");
        assert_eq!(config.rollback, RollbackPolicy::Snapshot);
        assert_eq!(config.build_store().policy(), RollbackPolicy::Snapshot);
    }

    #[test]
    fn rollback_defaults_to_rebase() {
        let config = StoreConfig::from_str(r#"base_url = "http://localhost:3000""#).unwrap();
        assert_eq!(config.rollback, RollbackPolicy::Rebase);
    }

    #[test]
    fn unknown_policy_is_a_format_error() {
        let err = StoreConfig::from_str(
            r#"
            base_url = "http://localhost:3000"
            rollback = "sometimes"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::FormatError(_)));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = StoreConfig::from_file("/nonexistent/todo.toml").unwrap_err();
        assert!(matches!(err, ConfigError::OpeningError(ref p, _) if p.ends_with("todo.toml")));
    }
}
