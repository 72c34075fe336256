//! Configuration loading
//!
//! Settings come from an [`EnvSource`] rather than from `std::env` directly,
//! so tests can hand in a plain map. The binary uses [`ProcessEnv`] after
//! [`load_env_file`] has merged a `.env` file into the process environment.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use secrecy::SecretString;
use thiserror::Error;
use tracing::{debug, info};

use crate::completion::{CompletionParams, DEFAULT_MODEL, DEFAULT_TEMPERATURE};

/// Variable holding the API credential
pub const API_KEY_VAR: &str = "OPENAI_API_KEY";
/// Variable overriding the endpoint base URL
pub const BASE_URL_VAR: &str = "OPENAI_BASE_URL";
/// Variable overriding the model
pub const MODEL_VAR: &str = "OPENAI_MODEL";
/// Variable overriding the sampling temperature
pub const TEMPERATURE_VAR: &str = "OPENAI_TEMPERATURE";
/// Variable overriding the request timeout in seconds
pub const TIMEOUT_VAR: &str = "MCPX_TIMEOUT_SECONDS";

/// Endpoint used when none is configured
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
/// Request timeout used when none is configured
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 60;

/// File name searched for when no env file is given
pub const ENV_FILE_NAME: &str = ".env";

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The credential is absent or blank
    #[error(
        "OPENAI_API_KEY not found in environment variables. \
Set it in your shell or add `OPENAI_API_KEY=<key>` to a .env file"
    )]
    MissingApiKey,

    /// A variable is present but unusable
    #[error("Invalid value for {var}: {reason}")]
    Invalid {
        /// Variable name
        var: String,
        /// Why the value was rejected
        reason: String,
    },

    /// An explicitly requested env file could not be loaded
    #[error("Failed to load env file {path}: {source}")]
    EnvFile {
        /// Requested path
        path: String,
        /// Underlying loader error
        #[source]
        source: dotenvy::Error,
    },
}

/// Read-only view of environment variables
pub trait EnvSource {
    /// Value of `key`, if set
    fn var(&self, key: &str) -> Option<String>;
}

/// The real process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Merge a `.env` file into the process environment
///
/// With `path = None` a `.env` file is searched from the current directory
/// upwards and its absence is not an error. An explicit path must exist.
/// Variables already set in the process are never overridden.
///
/// Returns the path that was loaded, if any.
pub fn load_env_file(path: Option<&Path>) -> Result<Option<PathBuf>, ConfigError> {
    match path {
        Some(p) => {
            dotenvy::from_path(p).map_err(|source| ConfigError::EnvFile {
                path: p.display().to_string(),
                source,
            })?;
            info!(path = %p.display(), "Loaded env file");
            Ok(Some(p.to_path_buf()))
        }
        None => {
            let found = std::env::current_dir()
                .ok()
                .and_then(|cwd| find_env_file(&cwd));
            match found {
                Some(p) => {
                    dotenvy::from_path(&p).map_err(|source| ConfigError::EnvFile {
                        path: p.display().to_string(),
                        source,
                    })?;
                    info!(path = %p.display(), "Loaded .env file");
                    Ok(Some(p))
                }
                None => {
                    debug!("No .env file found, using process environment only");
                    Ok(None)
                }
            }
        }
    }
}

/// Nearest `.env` file in `start` or one of its ancestors
pub fn find_env_file(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(ENV_FILE_NAME))
        .find(|candidate| candidate.is_file())
}

/// Runtime settings for one run
#[derive(Debug, Clone)]
pub struct Settings {
    /// API key for the completion endpoint
    pub api_key: SecretString,
    /// Base URL (e.g. "https://api.openai.com/v1")
    pub base_url: String,
    /// Model identifier
    pub model: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

/// Values given on the command line that win over the environment
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    /// Model identifier
    pub model: Option<String>,
    /// Sampling temperature
    pub temperature: Option<f32>,
}

impl Settings {
    /// Load settings from an environment source
    ///
    /// # Errors
    ///
    /// - [`ConfigError::MissingApiKey`] if the key is unset or blank
    /// - [`ConfigError::Invalid`] if an optional variable cannot be parsed
    pub fn from_env(env: &dyn EnvSource) -> Result<Self, ConfigError> {
        let api_key = env
            .var(API_KEY_VAR)
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::MissingApiKey)?;

        let base_url = non_empty(env, BASE_URL_VAR).unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let model = non_empty(env, MODEL_VAR).unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let temperature = match non_empty(env, TEMPERATURE_VAR) {
            Some(raw) => parse_temperature(TEMPERATURE_VAR, &raw)?,
            None => DEFAULT_TEMPERATURE,
        };

        let timeout_seconds = match non_empty(env, TIMEOUT_VAR) {
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => secs,
                _ => {
                    return Err(ConfigError::Invalid {
                        var: TIMEOUT_VAR.to_string(),
                        reason: format!("expected a positive number of seconds, got '{}'", raw),
                    })
                }
            },
            None => DEFAULT_TIMEOUT_SECONDS,
        };

        debug!(%base_url, %model, temperature, timeout_seconds, "Loaded settings");

        Ok(Self {
            api_key: SecretString::new(api_key.into()),
            base_url,
            model,
            temperature,
            timeout_seconds,
        })
    }

    /// Apply command-line overrides
    pub fn apply(mut self, overrides: &SettingsOverrides) -> Result<Self, ConfigError> {
        if let Some(model) = overrides.model.as_deref().filter(|m| !m.trim().is_empty()) {
            self.model = model.to_string();
        }
        if let Some(t) = overrides.temperature {
            self.temperature = check_temperature("--temperature", t)?;
        }
        Ok(self)
    }

    /// Model parameters derived from these settings
    pub fn params(&self) -> CompletionParams {
        CompletionParams {
            model: self.model.clone(),
            temperature: self.temperature,
            max_tokens: None,
        }
    }
}

fn non_empty(env: &dyn EnvSource, key: &str) -> Option<String> {
    env.var(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_temperature(var: &str, raw: &str) -> Result<f32, ConfigError> {
    let value = raw.parse::<f32>().map_err(|_| ConfigError::Invalid {
        var: var.to_string(),
        reason: format!("expected a number, got '{}'", raw),
    })?;
    check_temperature(var, value)
}

fn check_temperature(var: &str, value: f32) -> Result<f32, ConfigError> {
    if (0.0..=2.0).contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::Invalid {
            var: var.to_string(),
            reason: format!("temperature must be between 0.0 and 2.0, got {}", value),
        })
    }
}
