//! TOML-based application configuration.
//!
//! Carries the OAuth client credentials, the credential encryption key,
//! and the AI model endpoint. Stored at `~/.config/studyflow/config.toml`;
//! individual values can be overridden through environment variables
//! (`STUDYFLOW_CREDENTIAL_KEY`, `STUDYFLOW_MODEL_ENDPOINT`).
//!
//! The credential key is REQUIRED: loading fails when it is absent instead
//! of generating an ephemeral key that would orphan previously encrypted
//! credentials.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{ConfigError, Result};

/// Returns `~/.config/studyflow[-dev]/` based on STUDYFLOW_ENV.
///
/// Set STUDYFLOW_ENV=dev to use a development data directory.
///
/// # Errors
/// Returns an error if the home directory cannot be determined or if
/// creating the config directory fails.
pub fn data_dir() -> Result<PathBuf> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("STUDYFLOW_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("studyflow-dev")
    } else {
        base_dir.join("studyflow")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// OAuth client configuration for the calendar provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthSettings {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
}

impl Default for OAuthSettings {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: default_redirect_uri(),
            auth_url: default_auth_url(),
            token_url: default_token_url(),
            scopes: default_scopes(),
        }
    }
}

/// AI model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSettings {
    #[serde(default = "default_model_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model_name")]
    pub model: String,
    /// Hard deadline on a single generation call, in seconds.
    #[serde(default = "default_model_timeout")]
    pub timeout_secs: u64,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            endpoint: default_model_endpoint(),
            model: default_model_name(),
            timeout_secs: default_model_timeout(),
        }
    }
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/studyflow/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub oauth: OAuthSettings,
    #[serde(default)]
    pub model: ModelSettings,
    /// Base64-encoded 256-bit key used to encrypt stored OAuth credentials.
    /// Required -- see [`Config::credential_key_bytes`].
    #[serde(default)]
    pub credential_key: String,
}

impl Config {
    /// Load configuration from the default path, applying env overrides.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, or if the
    /// credential key is missing after overrides are applied.
    pub fn load() -> Result<Self> {
        let path = data_dir()?.join("config.toml");
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::LoadFailed {
                path: path.clone(),
                message: e.to_string(),
            })?;
            toml::from_str(&content).map_err(|e| ConfigError::ParseFailed(e.to_string()))?
        } else {
            Config {
                oauth: OAuthSettings::default(),
                model: ModelSettings::default(),
                credential_key: String::new(),
            }
        };

        if let Ok(key) = std::env::var("STUDYFLOW_CREDENTIAL_KEY") {
            config.credential_key = key;
        }
        if let Ok(endpoint) = std::env::var("STUDYFLOW_MODEL_ENDPOINT") {
            config.model.endpoint = endpoint;
        }

        if config.credential_key.is_empty() {
            return Err(ConfigError::MissingKey("credential_key".to_string()).into());
        }

        Ok(config)
    }

    /// Decode the credential key into raw bytes.
    ///
    /// # Errors
    /// Returns an error if the key is missing, not valid base64, or not
    /// exactly 32 bytes.
    pub fn credential_key_bytes(&self) -> Result<[u8; 32]> {
        if self.credential_key.is_empty() {
            return Err(ConfigError::MissingKey("credential_key".to_string()).into());
        }

        let bytes = base64::Engine::decode(
            &base64::engine::general_purpose::STANDARD,
            self.credential_key.trim(),
        )
        .map_err(|e| ConfigError::InvalidValue {
            key: "credential_key".to_string(),
            message: format!("not valid base64: {e}"),
        })?;

        if bytes.len() != 32 {
            return Err(ConfigError::InvalidValue {
                key: "credential_key".to_string(),
                message: format!("expected 32 bytes, got {}", bytes.len()),
            }
            .into());
        }

        let mut key = [0u8; 32];
        key.copy_from_slice(&bytes);
        Ok(key)
    }
}

fn default_redirect_uri() -> String {
    "http://localhost:8000/api/calendar/oauth/callback".to_string()
}

fn default_auth_url() -> String {
    "https://accounts.google.com/o/oauth2/auth".to_string()
}

fn default_token_url() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

fn default_scopes() -> Vec<String> {
    vec![
        "https://www.googleapis.com/auth/calendar".to_string(),
        "https://www.googleapis.com/auth/calendar.events".to_string(),
    ]
}

fn default_model_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_model_name() -> String {
    "llama3".to_string()
}

fn default_model_timeout() -> u64 {
    20
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_key_round_trip() {
        let key = [7u8; 32];
        let config = Config {
            oauth: OAuthSettings::default(),
            model: ModelSettings::default(),
            credential_key: base64::Engine::encode(
                &base64::engine::general_purpose::STANDARD,
                key,
            ),
        };
        assert_eq!(config.credential_key_bytes().unwrap(), key);
    }

    #[test]
    fn missing_credential_key_is_an_error() {
        let config = Config {
            oauth: OAuthSettings::default(),
            model: ModelSettings::default(),
            credential_key: String::new(),
        };
        assert!(config.credential_key_bytes().is_err());
    }

    #[test]
    fn wrong_length_key_is_an_error() {
        let config = Config {
            oauth: OAuthSettings::default(),
            model: ModelSettings::default(),
            credential_key: base64::Engine::encode(
                &base64::engine::general_purpose::STANDARD,
                [1u8; 16],
            ),
        };
        assert!(config.credential_key_bytes().is_err());
    }

    #[test]
    fn defaults_parse_from_empty_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.model.endpoint, "http://localhost:11434");
        assert_eq!(config.model.timeout_secs, 20);
        assert!(config.credential_key.is_empty());
    }
}
