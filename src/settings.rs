// 🔧 Settings - pipeline configuration from TOML plus environment
// Every path hangs off work_dir unless overridden; the API key can come
// from the environment so it never has to live in the config file

use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const API_KEY_ENV: &str = "ABP_API_KEY";

// ============================================================================
// SECTIONS
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    /// Root directory for all pipeline state.
    pub work_dir: PathBuf,
    pub downloads_dir: Option<PathBuf>,
    pub extracted_dir: Option<PathBuf>,
    pub tables_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
}

impl Default for PathSettings {
    fn default() -> Self {
        PathSettings {
            work_dir: PathBuf::from("work"),
            downloads_dir: None,
            extracted_dir: None,
            tables_dir: None,
            output_dir: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DownloadSettings {
    /// Ordnance Survey data package to fetch.
    pub package_id: String,
    /// Version of the package, as listed in the OS Downloads portal.
    pub version_id: String,
    /// API key; falls back to the ABP_API_KEY environment variable.
    pub api_key: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProcessingSettings {
    /// Number of output chunk files. 1 writes a single chunk.
    pub num_chunks: i64,
}

impl Default for ProcessingSettings {
    fn default() -> Self {
        ProcessingSettings { num_chunks: 1 }
    }
}

// ============================================================================
// SETTINGS
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub paths: PathSettings,
    pub downloads: DownloadSettings,
    pub processing: ProcessingSettings,
}

impl Settings {
    pub fn with_work_dir(work_dir: impl Into<PathBuf>) -> Self {
        Settings {
            paths: PathSettings {
                work_dir: work_dir.into(),
                ..PathSettings::default()
            },
            ..Settings::default()
        }
    }

    /// Load settings from a TOML file, or start from defaults when no
    /// file is given. The API key is filled from the environment if the
    /// file leaves it empty.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut settings = match config_path {
            Some(path) => {
                let raw = fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config: {}", path.display()))?;
                toml::from_str(&raw)
                    .with_context(|| format!("Failed to parse config: {}", path.display()))?
            }
            None => Settings::default(),
        };

        if settings.downloads.api_key.is_empty() {
            if let Ok(key) = env::var(API_KEY_ENV) {
                settings.downloads.api_key = key;
            }
        }

        Ok(settings)
    }

    pub fn downloads_dir(&self) -> PathBuf {
        self.resolved(&self.paths.downloads_dir, "downloads")
    }

    pub fn extracted_dir(&self) -> PathBuf {
        self.resolved(&self.paths.extracted_dir, "extracted")
    }

    pub fn tables_dir(&self) -> PathBuf {
        self.resolved(&self.paths.tables_dir, "tables")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.resolved(&self.paths.output_dir, "output")
    }

    fn resolved(&self, explicit: &Option<PathBuf>, subdir: &str) -> PathBuf {
        explicit
            .clone()
            .unwrap_or_else(|| self.paths.work_dir.join(subdir))
    }
}

// ============================================================================
// TESTS
// ============================================================================
