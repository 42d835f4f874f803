//! Configuration management
//!
//! This module handles loading and parsing configuration for the account layer.
//! Configuration can be loaded from:
//! - kesif.yml file
//! - Environment variables (override file settings)
//!
//! Missing optional values are filled with sensible defaults.

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Identity gateway configuration
    #[serde(default)]
    pub identity: IdentityConfig,
    /// Profile document store configuration
    #[serde(default)]
    pub profile_store: ProfileStoreConfig,
}

/// Identity gateway (Firebase Identity Toolkit) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Web API key of the Firebase project
    #[serde(default)]
    pub api_key: String,
    /// Identity Toolkit REST base URL
    #[serde(default = "default_auth_base_url")]
    pub auth_base_url: String,
    /// Timeout applied to every remote call, in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            auth_base_url: default_auth_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_auth_base_url() -> String {
    "https://identitytoolkit.googleapis.com/v1".to_string()
}

fn default_request_timeout_secs() -> u64 {
    15
}

/// Profile document store (Cloud Firestore) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileStoreConfig {
    /// Firebase project id
    #[serde(default)]
    pub project_id: String,
    /// Firestore REST base URL
    #[serde(default = "default_store_base_url")]
    pub base_url: String,
    /// Firestore database id
    #[serde(default = "default_database")]
    pub database: String,
    /// Collection holding one document per user
    #[serde(default = "default_collection")]
    pub collection: String,
}

impl Default for ProfileStoreConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            base_url: default_store_base_url(),
            database: default_database(),
            collection: default_collection(),
        }
    }
}

fn default_store_base_url() -> String {
    "https://firestore.googleapis.com/v1".to_string()
}

fn default_database() -> String {
    "(default)".to_string()
}

fn default_collection() -> String {
    "users".to_string()
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError {
        path: String,
        message: String,
    },
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl Config {
    /// Load configuration from file
    ///
    /// If the file doesn't exist, returns default configuration.
    /// If the file exists but is invalid YAML, returns an error with details.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(&content).map_err(|e| {
            ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            }
        })?;

        Ok(config)
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Environment variables follow the pattern:
    /// - KESIF_IDENTITY_API_KEY
    /// - KESIF_IDENTITY_AUTH_BASE_URL
    /// - KESIF_IDENTITY_REQUEST_TIMEOUT_SECS
    /// - KESIF_PROFILE_STORE_PROJECT_ID
    /// - KESIF_PROFILE_STORE_BASE_URL
    /// - KESIF_PROFILE_STORE_DATABASE
    /// - KESIF_PROFILE_STORE_COLLECTION
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Check the values the Firebase-backed collaborators cannot run without
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.identity.api_key.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "identity.api_key is required".to_string(),
            ));
        }
        if self.profile_store.project_id.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "profile_store.project_id is required".to_string(),
            ));
        }
        if self.profile_store.collection.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "profile_store.collection cannot be empty".to_string(),
            ));
        }
        if self.identity.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "identity.request_timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply environment variable overrides to the configuration
    fn apply_env_overrides(&mut self) {
        // Identity gateway
        if let Ok(api_key) = std::env::var("KESIF_IDENTITY_API_KEY") {
            self.identity.api_key = api_key;
        }
        if let Ok(url) = std::env::var("KESIF_IDENTITY_AUTH_BASE_URL") {
            self.identity.auth_base_url = url;
        }
        if let Ok(timeout) = std::env::var("KESIF_IDENTITY_REQUEST_TIMEOUT_SECS") {
            if let Ok(timeout) = timeout.parse::<u64>() {
                self.identity.request_timeout_secs = timeout;
            }
        }

        // Profile store
        if let Ok(project_id) = std::env::var("KESIF_PROFILE_STORE_PROJECT_ID") {
            self.profile_store.project_id = project_id;
        }
        if let Ok(url) = std::env::var("KESIF_PROFILE_STORE_BASE_URL") {
            self.profile_store.base_url = url;
        }
        if let Ok(database) = std::env::var("KESIF_PROFILE_STORE_DATABASE") {
            self.profile_store.database = database;
        }
        if let Ok(collection) = std::env::var("KESIF_PROFILE_STORE_COLLECTION") {
            self.profile_store.collection = collection;
        }
    }
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Shared by every test that touches KESIF_* variables.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
const ENV_KEYS: [&str; 7] = [
    "KESIF_IDENTITY_API_KEY",
    "KESIF_IDENTITY_AUTH_BASE_URL",
    "KESIF_IDENTITY_REQUEST_TIMEOUT_SECS",
    "KESIF_PROFILE_STORE_PROJECT_ID",
    "KESIF_PROFILE_STORE_BASE_URL",
    "KESIF_PROFILE_STORE_DATABASE",
    "KESIF_PROFILE_STORE_COLLECTION",
];
