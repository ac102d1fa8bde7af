use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::history::DEFAULT_HISTORY_CAPACITY;
use crate::transform::DEFAULT_MIN_SELECTION;
use crate::window_detect::DEFAULT_MIN_CANDIDATE_SIZE;

/// Application configuration. Every field has a default so older or partial files still load.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    #[serde(default = "default_capture_timeout_ms")]
    pub capture_timeout_ms: u64,
    #[serde(default = "default_min_selection_size")]
    pub min_selection_size: f64,
    #[serde(default = "default_min_candidate_size")]
    pub min_candidate_size: f64,
    /// Where saved captures go. `None` means `<Pictures>/shotmark`.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    /// Font for text annotations. `None` probes a list of system fonts.
    #[serde(default)]
    pub font_path: Option<PathBuf>,
    #[serde(default = "default_text_size")]
    pub text_size: f32,
}

fn default_version() -> String {
    "1.0.0".to_string()
}

fn default_history_capacity() -> usize {
    DEFAULT_HISTORY_CAPACITY
}

fn default_settle_delay_ms() -> u64 {
    100
}

fn default_capture_timeout_ms() -> u64 {
    3000
}

fn default_min_selection_size() -> f64 {
    DEFAULT_MIN_SELECTION
}

fn default_min_candidate_size() -> f64 {
    DEFAULT_MIN_CANDIDATE_SIZE
}

fn default_text_size() -> f32 {
    20.0
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            history_capacity: default_history_capacity(),
            settle_delay_ms: default_settle_delay_ms(),
            capture_timeout_ms: default_capture_timeout_ms(),
            min_selection_size: default_min_selection_size(),
            min_candidate_size: default_min_candidate_size(),
            output_dir: None,
            font_path: None,
            text_size: default_text_size(),
        }
    }
}

impl AppConfig {
    /// Resolved output directory for saved captures.
    pub fn output_dir(&self) -> PathBuf {
        self.output_dir.clone().unwrap_or_else(default_output_dir)
    }
}

/// `<Pictures>/shotmark`, falling back to the home directory.
pub fn default_output_dir() -> PathBuf {
    dirs::picture_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("shotmark")
}

/// Get the config file path
pub fn get_config_path() -> PathBuf {
    let config_dir = dirs::config_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."));

    config_dir.join("shotmark").join("config.json")
}

/// Load configuration from the default path, or return (and persist) defaults
pub fn load_config() -> AppConfig {
    let path = get_config_path();
    match load_config_from(&path) {
        Ok(Some(config)) => config,
        Ok(None) => {
            let config = AppConfig::default();
            if let Err(e) = save_config_to(&config, &path) {
                log::warn!("[config] Failed to write defaults: {}", e);
            }
            config
        }
        Err(e) => {
            log::error!("[config] {}; using defaults", e);
            AppConfig::default()
        }
    }
}

/// `Ok(None)` when the file does not exist.
pub fn load_config_from(path: &Path) -> Result<Option<AppConfig>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config: AppConfig = serde_json::from_str(&content)?;
    log::debug!("[config] Loaded {:?}", path);
    Ok(Some(config))
}

/// Save configuration to the default path
pub fn save_config(config: &AppConfig) -> Result<(), ConfigError> {
    save_config_to(config, &get_config_path())
}

pub fn save_config_to(config: &AppConfig, path: &Path) -> Result<(), ConfigError> {
    let io_err = |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }

    let content = serde_json::to_string_pretty(config)?;
    fs::write(path, content).map_err(io_err)?;

    log::info!("[config] Saved to {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config_from(&dir.path().join("nope.json")).unwrap().is_none());
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "history_capacity": 3, "text_size": 32.0 }"#).unwrap();

        let config = load_config_from(&path).unwrap().unwrap();
        assert_eq!(config.history_capacity, 3);
        assert_eq!(config.text_size, 32.0);
        assert_eq!(config.settle_delay_ms, 100);
        assert_eq!(config.capture_timeout_ms, 3000);
        assert_eq!(config.min_selection_size, 4.0);
        assert_eq!(config.min_candidate_size, 100.0);
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = AppConfig {
            output_dir: Some(PathBuf::from("/tmp/shots")),
            settle_delay_ms: 250,
            ..AppConfig::default()
        };
        save_config_to(&config, &path).unwrap();
        assert_eq!(load_config_from(&path).unwrap(), Some(config));
    }

    #[test]
    fn invalid_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(load_config_from(&path), Err(ConfigError::Json(_))));
    }
}
