use crate::error::ConfigError;
use crate::error::Result;
use serde::Deserialize;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_NAMESPACE: &str = "filtering";
pub const DEFAULT_FAVORITES_KEY: &str = "favorites";
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1_500;

/// Where favorites live in the preference store and how loading retries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilteringConfig {
    /// Preference namespace, one per feature instance.
    pub namespace: String,
    /// Key of the packed favorites record inside the namespace.
    pub favorites_key: String,
    /// Delay before the single retry of a failed load.
    pub retry_delay_ms: u64,
}

impl Default for FilteringConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            favorites_key: DEFAULT_FAVORITES_KEY.to_string(),
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
        }
    }
}

impl FilteringConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw).map_err(ConfigError::from)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(raw) => Self::from_toml_str(&raw),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::from(err).into()),
        }
    }

    fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.namespace.trim().is_empty() {
            return Err(ConfigError::Invalid("namespace must not be empty".to_string()));
        }
        if self.favorites_key.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "favorites_key must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
