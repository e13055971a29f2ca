use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// A video file found on disk during one scan pass. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFile {
    pub file_path: PathBuf,
    pub file_name: String,
    pub series: String,
    pub season: String,
}

/// Persistent translation status of one video file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleEntry {
    pub id: i64,
    pub series: String,
    pub season: String,
    pub file_name: String,
    pub file_path: String,
    pub is_processed: bool,
    pub is_wanted: bool,
    pub force_process: bool,
    pub already_had: bool,
    pub last_scanned: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl SubtitleEntry {
    /// Build a fresh, unsaved entry for a newly discovered file
    pub fn discovered(video: &VideoFile, is_wanted: bool, already_had: bool, now: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            series: video.series.clone(),
            season: video.season.clone(),
            file_name: video.file_name.clone(),
            file_path: video.file_path.to_string_lossy().into_owned(),
            is_processed: false,
            is_wanted,
            force_process: false,
            already_had,
            last_scanned: now,
            processed_at: None,
            error_message: None,
        }
    }

    pub fn is_eligible(&self) -> bool {
        is_eligible(self.is_processed, self.is_wanted, self.already_had, self.force_process)
    }
}

/// Whether an entry should be picked up by the next translation batch.
///
/// The SQLite store registers this exact function for its batch query.
pub fn is_eligible(is_processed: bool, is_wanted: bool, already_had: bool, force_process: bool) -> bool {
    (!is_processed && is_wanted && !already_had) || force_process
}

/// Standing rule marking files of a series (or one of its seasons) as wanted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesWatchConfig {
    pub id: i64,
    pub series_name: String,
    /// `None` covers every season of the series
    pub season_name: Option<String>,
    pub auto_watch: bool,
    pub created_at: DateTime<Utc>,
}

impl SeriesWatchConfig {
    pub fn scope_label(series_name: &str, season_name: Option<&str>) -> String {
        match season_name {
            Some(season) => format!("series '{}' season '{}'", series_name, season),
            None => format!("series '{}'", series_name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiUsageRecord {
    pub id: i64,
    pub model: String,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSetting {
    pub key: String,
    pub value: String,
    pub description: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Byte ceilings applied to subtitle text before it is sent for translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeLimits {
    /// Streams extracted directly in a plain text format
    pub plain_bytes: usize,
    /// Advanced-format streams, measured after cleaning and conversion
    pub advanced_bytes: usize,
}

impl SizeLimits {
    pub fn for_source(&self, advanced: bool) -> usize {
        if advanced { self.advanced_bytes } else { self.plain_bytes }
    }
}

/// Translation parameters, read once at the start of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationSettings {
    pub api_key: String,
    pub model: String,
    pub system_prompt: String,
    pub temperature: f32,
    pub preferred_lang: String,
    pub size_limits: SizeLimits,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    pub new_files: usize,
    pub updated_files: usize,
    pub removed_files: usize,
    pub error_files: usize,
    pub duration: Duration,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TranslationResult {
    pub success_count: usize,
    pub skipped_no_subtitles: usize,
    pub error_count: usize,
    pub duration: Duration,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesGroup {
    pub series_name: String,
    pub seasons: Vec<SeasonGroup>,
    pub total_files: usize,
    pub wanted_files: usize,
    pub processed_files: usize,
    pub is_watched: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonGroup {
    pub season_name: String,
    pub total_files: usize,
    pub wanted_files: usize,
    pub processed_files: usize,
    pub is_watched: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LibraryStats {
    pub total_files: usize,
    pub processed_files: usize,
    pub unprocessed_files: usize,
    pub wanted_files: usize,
    pub already_had_files: usize,
    pub error_files: usize,
    pub last_scanned: Option<DateTime<Utc>>,
}

impl LibraryStats {
    pub fn from_entries(entries: &[SubtitleEntry]) -> Self {
        let count = |f: fn(&SubtitleEntry) -> bool| entries.iter().filter(|e| f(e)).count();

        Self {
            total_files: entries.len(),
            processed_files: count(|e| e.is_processed),
            unprocessed_files: count(|e| !e.is_processed),
            wanted_files: count(|e| e.is_wanted),
            already_had_files: count(|e| e.already_had),
            error_files: count(|e| e.error_message.is_some()),
            last_scanned: entries.iter().map(|e| e.last_scanned).max(),
        }
    }
}

/// Stage of the per-entry translation state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TranslationStep {
    Starting,
    CheckingRateLimit,
    FindingSubtitles,
    ExtractingSubtitles,
    CleaningSubtitles,
    ValidatingSize,
    TranslatingWithGemini,
    SavingSubtitles,
    Completed,
}

impl fmt::Display for TranslationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TranslationStep::Starting => "Starting",
            TranslationStep::CheckingRateLimit => "Checking rate limit",
            TranslationStep::FindingSubtitles => "Finding subtitles",
            TranslationStep::ExtractingSubtitles => "Extracting subtitles",
            TranslationStep::CleaningSubtitles => "Cleaning subtitles",
            TranslationStep::ValidatingSize => "Validating size",
            TranslationStep::TranslatingWithGemini => "Translating with Gemini",
            TranslationStep::SavingSubtitles => "Saving subtitles",
            TranslationStep::Completed => "Completed",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationProgress {
    pub total_files: usize,
    pub processed_files: usize,
    pub current_file: String,
    pub step: TranslationStep,
}

impl fmt::Display for TranslationProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}/{}] {}: {}",
            (self.processed_files + 1).min(self.total_files.max(1)),
            self.total_files,
            self.step,
            self.current_file
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanProgress {
    pub total_files: usize,
    pub processed_files: usize,
    pub current_file: String,
}

impl fmt::Display for ScanProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}/{}] Analyzing: {}",
            self.processed_files, self.total_files, self.current_file
        )
    }
}
