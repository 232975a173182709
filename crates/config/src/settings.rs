// Application settings
// Loaded from ~/.config/dbforestale/settings.json

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use dbforestale_engine::validation::ValidationLimits;

/// Storage backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// One JSON document per project (default)
    #[default]
    Json,
    /// Single SQLite database
    Sqlite,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // File
    #[serde(rename = "file.autoSaveInterval")]
    pub auto_save_interval: Option<u32>,  // seconds, None or 0 = disabled

    // Storage
    #[serde(rename = "storage.backend")]
    pub storage_backend: StorageBackend,

    #[serde(rename = "storage.dataDir")]
    pub data_dir: Option<PathBuf>,  // None = platform data dir

    // Validation
    #[serde(rename = "validation.percentageWarning")]
    pub percentage_warning: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            auto_save_interval: Some(30),
            storage_backend: StorageBackend::Json,
            data_dir: None,
            percentage_warning: 90.0,
        }
    }
}

const DEFAULT_CONFIG: &str = r#"{
    // Seconds between autosaves in an edit session (null or 0 disables)
    "file.autoSaveInterval": 30,

    // Storage: "json" (one document per project) or "sqlite"
    "storage.backend": "json",
    // Data directory; null uses the platform data directory
    "storage.dataDir": null,

    // Species percentages above this total are flagged (above 100 blocks saving)
    "validation.percentageWarning": 90
}
"#;

/// Drop lines that are `//` comments.
fn strip_comments(contents: &str) -> String {
    contents
        .lines()
        .filter(|line| !line.trim().starts_with("//"))
        .collect::<Vec<_>>()
        .join("\n")
}

impl Settings {
    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("dbforestale")
            .join("settings.json")
    }

    /// Load settings from the default path, falling back to defaults
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Load settings from `path`. A missing file is created with defaults;
    /// an unreadable one is reported and replaced by defaults in memory.
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            let settings = Self::default();
            create_default_file(path);
            return settings;
        }

        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&strip_comments(&contents)) {
                Ok(settings) => settings,
                Err(e) => {
                    log::warn!("error parsing {}: {}; using default settings", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                log::warn!("error reading {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Save current settings to the default path
    pub fn save(&self) -> Result<(), String> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| e.to_string())?;
        fs::write(path, json).map_err(|e| e.to_string())
    }

    /// Autosave period, or None when disabled.
    pub fn autosave_interval(&self) -> Option<Duration> {
        self.auto_save_interval
            .filter(|secs| *secs > 0)
            .map(|secs| Duration::from_secs(u64::from(secs)))
    }

    /// Configured data directory, or the platform default.
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("dbforestale")
        })
    }

    /// Percentage limits. A warning threshold outside (0, 100] falls back
    /// to the default.
    pub fn validation_limits(&self) -> ValidationLimits {
        let threshold = self.percentage_warning;
        if threshold > 0.0 && threshold <= 100.0 {
            ValidationLimits::with_warning_threshold(threshold)
        } else {
            log::warn!("validation.percentageWarning {} out of range, using default", threshold);
            ValidationLimits::default()
        }
    }

    /// Get the config file path for display
    pub fn config_path_display() -> String {
        Self::config_path().to_string_lossy().to_string()
    }
}

/// Create default settings file with comments
fn create_default_file(path: &Path) {
    if let Some(parent) = path.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            log::warn!("error creating config directory: {}", e);
            return;
        }
    }
    if let Err(e) = fs::write(path, DEFAULT_CONFIG) {
        log::warn!("error writing default {}: {}", path.display(), e);
    }
}
