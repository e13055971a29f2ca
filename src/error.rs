use thiserror::Error;

#[derive(Error, Debug)]
pub enum TranslarrError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Media root path does not exist: {0}")]
    DirectoryNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Setting {0} not found")]
    MissingSetting(String),

    #[error("Invalid value for setting {key}, value: {value}")]
    InvalidSetting { key: String, value: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("API rate limit exceeded")]
    RateLimitExceeded,

    #[error("Media processing error: {0}")]
    Media(String),

    #[error("Failed to extract subtitles from video file: {0}")]
    Extraction(String),

    #[error(
        "Subtitle file too large after cleaning: {size} bytes (max: {max} bytes). \
         This file cannot be processed with the current translation API limits."
    )]
    ContentTooLarge { size: usize, max: usize },

    #[error("Translation blocked by safety filter: {0}")]
    SafetyBlocked(String),

    #[error("Translation API returned empty response")]
    EmptyResponse,

    #[error("Translation error: {0}")]
    Translation(String),

    #[error("A {0} job is already running")]
    JobAlreadyRunning(String),

    #[error("Background task failed: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, TranslarrError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_too_large_message_names_both_sizes() {
        let msg = TranslarrError::ContentTooLarge { size: 300, max: 200 }.to_string();
        assert!(msg.contains("300 bytes"));
        assert!(msg.contains("max: 200 bytes"));
    }
}
