//! Process-global configuration.
//!
//! Lookup order is environment first, then an optional YAML file pointed at
//! by `SWITCHBOARD_CONFIG_PATH`. Values are coerced into the requested type,
//! so `SWITCHBOARD_SUMMARY_MAX_ATTEMPTS=5` deserializes as a `usize` and
//! `SWITCHBOARD_SUMMARY_PROVIDER=groq` as a `String`.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use once_cell::sync::OnceCell;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config key not found: {0}")]
    NotFound(String),

    #[error("failed to deserialize config key {key}: {source}")]
    Deserialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to load config file {path}: {reason}")]
    File { path: String, reason: String },
}

static GLOBAL: OnceCell<Config> = OnceCell::new();

pub struct Config {
    file_values: HashMap<String, Value>,
    // Test-only overrides layered on top of the environment.
    overrides: Mutex<HashMap<String, Value>>,
}

impl Config {
    /// The process-wide configuration, loading the optional file layer on
    /// first access.
    pub fn global() -> &'static Config {
        GLOBAL.get_or_init(|| {
            match std::env::var("SWITCHBOARD_CONFIG_PATH") {
                Ok(path) => Config::load(&path).unwrap_or_else(|err| {
                    tracing::warn!("ignoring config file: {err}");
                    Config::empty()
                }),
                Err(_) => Config::empty(),
            }
        })
    }

    fn empty() -> Self {
        Self {
            file_values: HashMap::new(),
            overrides: Mutex::new(HashMap::new()),
        }
    }

    /// Load the YAML file layer. Environment variables still win over file
    /// values at lookup time.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|err| ConfigError::File {
            path: path.display().to_string(),
            reason: err.to_string(),
        })?;
        let file_values: HashMap<String, Value> =
            serde_yaml::from_str(&text).map_err(|err| ConfigError::File {
                path: path.display().to_string(),
                reason: err.to_string(),
            })?;
        Ok(Self {
            file_values,
            overrides: Mutex::new(HashMap::new()),
        })
    }

    fn lookup(&self, key: &str) -> Option<Value> {
        if let Some(value) = self.overrides.lock().unwrap().get(key) {
            return Some(value.clone());
        }
        if let Ok(raw) = std::env::var(key) {
            // Bare strings are not valid JSON; fall back to treating the
            // variable as a string literal.
            return Some(serde_json::from_str(&raw).unwrap_or(Value::String(raw)));
        }
        self.file_values.get(key).cloned()
    }

    /// Typed parameter lookup.
    pub fn get_param<T: DeserializeOwned>(&self, key: &str) -> Result<T, ConfigError> {
        let value = self
            .lookup(key)
            .ok_or_else(|| ConfigError::NotFound(key.to_string()))?;
        serde_json::from_value(value).map_err(|source| ConfigError::Deserialize {
            key: key.to_string(),
            source,
        })
    }

    /// Secrets come from the environment (or overrides) only, never from the
    /// file layer.
    pub fn get_secret(&self, key: &str) -> Result<String, ConfigError> {
        if let Some(Value::String(value)) = self.overrides.lock().unwrap().get(key).cloned() {
            return Ok(value);
        }
        std::env::var(key).map_err(|_| ConfigError::NotFound(key.to_string()))
    }

    /// Layer a value over the environment. Intended for tests.
    pub fn set_param(&self, key: &str, value: Value) {
        let _ = self.overrides.lock().unwrap().insert(key.to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn param_coercion_from_override() {
        let config = Config::empty();
        config.set_param("SOME_COUNT", Value::from(5));
        let count: usize = config.get_param("SOME_COUNT").unwrap();
        assert_eq!(count, 5);
    }

    #[test]
    fn missing_key_is_not_found() {
        let config = Config::empty();
        let err = config.get_param::<String>("SWITCHBOARD_NO_SUCH_KEY").unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn string_values_pass_through() {
        let config = Config::empty();
        config.set_param("PROVIDER", Value::String("groq".to_string()));
        let provider: String = config.get_param("PROVIDER").unwrap();
        assert_eq!(provider, "groq");
    }
}
