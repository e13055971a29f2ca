use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::error::{Result, TranslarrError};

// Default values for optional sections
fn default_batch_size() -> usize {
    100
}

fn default_timeout_secs() -> u64 {
    600
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub library: LibraryConfig,
    pub database: DatabaseConfig,
    pub media: MediaConfig,
    pub translate: TranslateConfig,
    #[serde(default)]
    pub daemon: DaemonConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// Root directory holding the series folders
    pub media_root: PathBuf,
    /// Maximum number of entries pulled into one translation batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database file
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Path to ffmpeg binary
    pub ffmpeg_path: String,
    /// Path to ffprobe binary
    pub ffprobe_path: String,
    /// Scratch directory for extracted subtitle streams
    pub work_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslateConfig {
    /// Gemini REST endpoint (without the model path)
    pub endpoint: String,
    /// Request timeout; whole-episode translations are slow
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Seconds between library scans
    pub scan_interval_secs: u64,
    /// Seconds between translation batches
    pub translate_interval_secs: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            scan_interval_secs: 6 * 60 * 60,
            translate_interval_secs: 15 * 60,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            library: LibraryConfig {
                media_root: PathBuf::from("/media"),
                batch_size: default_batch_size(),
            },
            database: DatabaseConfig {
                path: PathBuf::from(".translarr/translarr.db"),
            },
            media: MediaConfig {
                ffmpeg_path: "ffmpeg".to_string(),
                ffprobe_path: "ffprobe".to_string(),
                work_dir: PathBuf::from("/tmp/translarr"),
            },
            translate: TranslateConfig {
                endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
                timeout_secs: default_timeout_secs(),
            },
            daemon: DaemonConfig::default(),
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TranslarrError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| TranslarrError::Config(format!("Failed to parse config file: {}", e)))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| TranslarrError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| TranslarrError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Directory holding the log files, next to the database
    pub fn data_dir(&self) -> PathBuf {
        self.database
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}
