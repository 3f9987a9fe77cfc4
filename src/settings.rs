use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CuratelaError, Result};
use crate::retry::RetryPolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub data_dir: String,
    pub ai_base_url: String,
    pub ai_api_key: String,
    /// Files at or below this size are sent inline before falling back to
    /// an upload.
    pub inline_threshold_bytes: usize,
    pub analyze_attempts: u32,
    pub upload_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub log_capacity: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().to_string_lossy().to_string(),
            ai_base_url: String::new(),
            ai_api_key: String::new(),
            inline_threshold_bytes: 3 * 1024 * 1024,
            analyze_attempts: 2,
            upload_attempts: 3,
            retry_base_delay_ms: 500,
            log_capacity: crate::logging::DEFAULT_CAPACITY,
        }
    }
}

impl Settings {
    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("curatela.db")
    }

    pub fn bucket_dir(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("bucket")
    }

    pub fn analyze_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.analyze_attempts,
            Duration::from_millis(self.retry_base_delay_ms),
        )
    }

    pub fn upload_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.upload_attempts,
            Duration::from_millis(self.retry_base_delay_ms),
        )
    }

    /// Environment variables win over the settings file.
    fn apply_env(mut self) -> Self {
        if let Ok(v) = std::env::var("CURATELA_DATA_DIR") {
            if !v.is_empty() {
                self.data_dir = v;
            }
        }
        if let Ok(v) = std::env::var("CURATELA_AI_URL") {
            self.ai_base_url = v;
        }
        if let Ok(v) = std::env::var("CURATELA_AI_KEY") {
            self.ai_api_key = v;
        }
        self
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("curatela")
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("curatela")
}

/// Settings as stored on disk, without environment overrides. This is what
/// gets written back by `save_settings`.
pub fn load_file_settings() -> Settings {
    let path = settings_path();
    if path.exists() {
        let content = std::fs::read_to_string(&path).unwrap_or_default();
        serde_json::from_str(&content).unwrap_or_default()
    } else {
        Settings::default()
    }
}

pub fn load_settings() -> Settings {
    load_file_settings().apply_env()
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir)?;
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| CuratelaError::Settings(e.to_string()))?;
    std::fs::write(settings_path(), format!("{json}\n"))?;
    Ok(())
}

pub fn settings_file_exists() -> bool {
    settings_path().exists()
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| PathBuf::from(path))
        .to_string_lossy()
        .to_string()
}
