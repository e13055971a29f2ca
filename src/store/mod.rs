// Persistence seams
//
// The scanning and translation services only talk to these traits:
// - EntryRepository: subtitle entries keyed by file path
// - WatchConfigRepository: series/season auto-watch rules
// - UsageRepository: append-only API usage log
// - SettingsStore: key-value application settings
//
// SqliteStore implements all of them on one connection.

pub mod schema;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use sqlite::SqliteStore;

use crate::error::Result;
use crate::models::{ApiUsageRecord, AppSetting, SeriesGroup, SeriesWatchConfig, SubtitleEntry};

#[async_trait]
pub trait EntryRepository: Send + Sync {
    /// Exact (case-sensitive) lookup by absolute file path
    async fn find_by_path(&self, file_path: &str) -> Result<Option<SubtitleEntry>>;

    async fn find_by_id(&self, id: i64) -> Result<Option<SubtitleEntry>>;

    /// Insert a new entry and return its assigned id
    async fn insert(&self, entry: &SubtitleEntry) -> Result<i64>;

    /// Persist every mutable field of an existing entry
    async fn update(&self, entry: &SubtitleEntry) -> Result<()>;

    async fn get_all(&self) -> Result<Vec<SubtitleEntry>>;

    /// Entries eligible for translation, oldest first
    async fn get_unprocessed_wanted(&self, limit: usize) -> Result<Vec<SubtitleEntry>>;

    /// Set `is_wanted` on every entry of a series, or of one season when given
    async fn bulk_set_wanted(&self, series: &str, season: Option<&str>, wanted: bool) -> Result<usize>;

    /// Delete entries by id and return the number of rows removed
    async fn delete_by_ids(&self, ids: &[i64]) -> Result<usize>;

    /// Per series and season file counts, ordered by series name
    async fn series_groups(&self) -> Result<Vec<SeriesGroup>>;
}

#[async_trait]
pub trait WatchConfigRepository: Send + Sync {
    async fn get_all_watch_configs(&self) -> Result<Vec<SeriesWatchConfig>>;

    async fn get_watch_config(&self, series: &str, season: Option<&str>) -> Result<Option<SeriesWatchConfig>>;

    /// Fails with `Conflict` when a config for the exact scope exists
    async fn add_watch_config(&self, series: &str, season: Option<&str>, auto_watch: bool) -> Result<SeriesWatchConfig>;

    /// Returns false when no config exists for the exact scope
    async fn delete_watch_config(&self, series: &str, season: Option<&str>) -> Result<bool>;
}

#[async_trait]
pub trait UsageRepository: Send + Sync {
    async fn record_usage(&self, model: &str, at: DateTime<Utc>) -> Result<()>;

    /// Count records for a model with `from <= at < to`
    async fn count_usage(&self, model: &str, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<usize>;

    async fn usage_between(&self, from: DateTime<Utc>, to: DateTime<Utc>, model: Option<&str>) -> Result<Vec<ApiUsageRecord>>;
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get_setting(&self, key: &str) -> Result<Option<String>>;

    /// Insert or overwrite a setting value
    async fn set_setting(&self, key: &str, value: &str) -> Result<()>;

    /// Insert a setting only if the key is absent; returns whether it was added
    async fn seed_setting(&self, key: &str, value: &str, description: &str) -> Result<bool>;

    async fn all_settings(&self) -> Result<Vec<AppSetting>>;
}
