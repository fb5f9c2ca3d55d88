//! Configuration for the event collector.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for the collector.
///
/// Defaults match the reference deployment: a 30-minute session window,
/// batches of 10 generic events flushed after 5 seconds of quiet, and
/// heatmap batches of 5 flushed after 10 seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Base URL of the collection endpoint, e.g. `http://localhost:5000/api`
    pub api_url: String,

    /// Whether page visits are tracked at all
    pub track_visits: bool,

    /// Whether element clicks are tracked at all
    pub track_clicks: bool,

    /// Whether consent gates data collection. Disabled only for
    /// deployments outside consent-regulated contexts.
    pub consent_required: bool,

    /// Inactivity window after which a new session id is minted
    #[serde(with = "duration_millis")]
    pub session_timeout: Duration,

    /// Generic event queue capacity
    pub batch_size: usize,

    /// Generic event queue debounce interval
    #[serde(with = "duration_millis")]
    pub batch_flush_interval: Duration,

    /// Heatmap queue capacity
    pub heatmap_batch_size: usize,

    /// Heatmap queue debounce interval
    #[serde(with = "duration_millis")]
    pub heatmap_flush_interval: Duration,

    /// Directory for persisted state (session id, consent flag)
    pub data_path: PathBuf,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        let data_path = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("fintrack-collector");

        Self {
            api_url: "http://localhost:5000/api".to_string(),
            track_visits: true,
            track_clicks: true,
            consent_required: true,
            session_timeout: Duration::from_secs(30 * 60),
            batch_size: 10,
            batch_flush_interval: Duration::from_secs(5),
            heatmap_batch_size: 5,
            heatmap_flush_interval: Duration::from_secs(10),
            data_path,
        }
    }
}

impl CollectorConfig {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .map_err(|e| ConfigError::IoError(e.to_string()))?;
            let config: CollectorConfig = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(&config_path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("fintrack-collector")
            .join("config.json")
    }

    /// Ensure the state directory exists.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.data_path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Ok(())
    }

    /// Path of the persisted state file under the data directory.
    pub fn state_path(&self) -> PathBuf {
        self.data_path.join("state.json")
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde support for millisecond durations.
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CollectorConfig::default();
        assert_eq!(config.session_timeout, Duration::from_secs(30 * 60));
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.batch_flush_interval, Duration::from_secs(5));
        assert_eq!(config.heatmap_batch_size, 5);
        assert_eq!(config.heatmap_flush_interval, Duration::from_secs(10));
        assert!(config.track_visits);
        assert!(config.track_clicks);
        assert!(config.consent_required);
    }

    #[test]
    fn test_config_json_roundtrip() {
        let mut config = CollectorConfig::default();
        config.api_url = "https://collect.example.com/api".to_string();
        config.batch_flush_interval = Duration::from_millis(2500);

        let json = serde_json::to_string(&config).unwrap();
        // Durations serialize as milliseconds.
        assert!(json.contains("\"batch_flush_interval\":2500"));

        let parsed: CollectorConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.api_url, "https://collect.example.com/api");
        assert_eq!(parsed.batch_flush_interval, Duration::from_millis(2500));
    }
}
