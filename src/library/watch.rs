use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::error::{Result, TranslarrError};
use crate::models::{SeriesGroup, SeriesWatchConfig};
use crate::store::{EntryRepository, WatchConfigRepository};

/// Decides and manages which series/seasons are auto-marked as wanted.
#[derive(Clone)]
pub struct SeriesWatchService {
    watch_configs: Arc<dyn WatchConfigRepository>,
    entries: Arc<dyn EntryRepository>,
}

impl SeriesWatchService {
    pub fn new(watch_configs: Arc<dyn WatchConfigRepository>, entries: Arc<dyn EntryRepository>) -> Self {
        Self { watch_configs, entries }
    }

    /// True when the whole series or this exact season has an active watch rule
    pub async fn is_watched(&self, series: &str, season: &str) -> Result<bool> {
        if let Some(config) = self.watch_configs.get_watch_config(series, None).await? {
            if config.auto_watch {
                return Ok(true);
            }
        }

        Ok(self
            .watch_configs
            .get_watch_config(series, Some(season))
            .await?
            .map(|config| config.auto_watch)
            .unwrap_or(false))
    }

    /// Enable or disable auto-watch for a scope.
    ///
    /// Enabling creates the rule and marks every existing entry in scope as
    /// wanted, returning how many entries were updated. Disabling only removes
    /// the rule; entries keep their current `is_wanted`.
    pub async fn set_auto_watch(&self, series: &str, season: Option<&str>, enable: bool) -> Result<usize> {
        let scope = SeriesWatchConfig::scope_label(series, season);

        if enable {
            self.watch_configs.add_watch_config(series, season, true).await?;
            let updated = self.entries.bulk_set_wanted(series, season, true).await?;
            info!("Enabled auto-watch for {}, marked {} entries as wanted", scope, updated);
            Ok(updated)
        } else {
            if !self.watch_configs.delete_watch_config(series, season).await? {
                return Err(TranslarrError::NotFound(format!(
                    "Watch configuration not found for {}",
                    scope
                )));
            }
            info!("Disabled auto-watch for {}", scope);
            Ok(0)
        }
    }

    pub async fn watch_configs(&self) -> Result<Vec<SeriesWatchConfig>> {
        self.watch_configs.get_all_watch_configs().await
    }

    /// Per series/season statistics annotated with watch status.
    ///
    /// A season counts as watched when its series is.
    pub async fn series_groups_with_watch_status(&self) -> Result<Vec<SeriesGroup>> {
        let mut groups = self.entries.series_groups().await?;
        let configs = self.watch_configs.get_all_watch_configs().await?;

        let mut series_watch: HashMap<&str, bool> = HashMap::new();
        let mut season_watch: HashMap<(&str, &str), bool> = HashMap::new();
        for config in &configs {
            match config.season_name.as_deref() {
                None => {
                    series_watch.insert(config.series_name.as_str(), config.auto_watch);
                }
                Some(season) => {
                    season_watch.insert((config.series_name.as_str(), season), config.auto_watch);
                }
            }
        }

        for group in &mut groups {
            group.is_watched = series_watch.get(group.series_name.as_str()).copied().unwrap_or(false);

            for season in &mut group.seasons {
                season.is_watched = group.is_watched
                    || season_watch
                        .get(&(group.series_name.as_str(), season.season_name.as_str()))
                        .copied()
                        .unwrap_or(false);
            }
        }

        Ok(groups)
    }

    /// Set `is_wanted` for a series or season without creating a rule
    pub async fn bulk_set_wanted(&self, series: &str, season: Option<&str>, wanted: bool) -> Result<usize> {
        if series.trim().is_empty() {
            return Err(TranslarrError::Validation("Series name cannot be empty.".to_string()));
        }
        self.entries.bulk_set_wanted(series, season, wanted).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SubtitleEntry, VideoFile};
    use crate::store::SqliteStore;
    use chrono::Utc;
    use std::path::PathBuf;

    async fn store_with(paths: &[(&str, &str, &str)]) -> (Arc<SqliteStore>, SeriesWatchService) {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        for (path, series, season) in paths {
            let video = VideoFile {
                file_path: PathBuf::from(path),
                file_name: "e.mkv".to_string(),
                series: series.to_string(),
                season: season.to_string(),
            };
            store
                .insert(&SubtitleEntry::discovered(&video, false, false, Utc::now()))
                .await
                .unwrap();
        }
        let service = SeriesWatchService::new(store.clone(), store.clone());
        (store, service)
    }

    async fn wanted_paths(store: &SqliteStore) -> Vec<String> {
        store
            .get_all()
            .await
            .unwrap()
            .into_iter()
            .filter(|e| e.is_wanted)
            .map(|e| e.file_path)
            .collect()
    }

    const LIBRARY: &[(&str, &str, &str)] = &[
        ("/m/Show/S1/e01.mkv", "Show", "S1"),
        ("/m/Show/S2/e01.mkv", "Show", "S2"),
        ("/m/Other/S1/e01.mkv", "Other", "S1"),
    ];

    #[tokio::test]
    async fn test_series_watch_marks_every_season() {
        let (store, service) = store_with(LIBRARY).await;

        assert_eq!(service.set_auto_watch("Show", None, true).await.unwrap(), 2);
        assert_eq!(
            wanted_paths(&store).await,
            vec!["/m/Show/S1/e01.mkv".to_string(), "/m/Show/S2/e01.mkv".to_string()]
        );
        assert!(service.is_watched("Show", "S9").await.unwrap());
        assert!(!service.is_watched("Other", "S1").await.unwrap());
    }

    #[tokio::test]
    async fn test_season_watch_marks_only_that_season() {
        let (store, service) = store_with(LIBRARY).await;

        assert_eq!(service.set_auto_watch("Show", Some("S1"), true).await.unwrap(), 1);
        assert_eq!(wanted_paths(&store).await, vec!["/m/Show/S1/e01.mkv".to_string()]);
        assert!(service.is_watched("Show", "S1").await.unwrap());
        assert!(!service.is_watched("Show", "S2").await.unwrap());
    }

    #[tokio::test]
    async fn test_enable_twice_is_conflict() {
        let (_store, service) = store_with(LIBRARY).await;
        service.set_auto_watch("Show", None, true).await.unwrap();

        let err = service.set_auto_watch("Show", None, true).await.unwrap_err();
        assert!(matches!(err, TranslarrError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_disable_keeps_wanted_flags() {
        let (store, service) = store_with(LIBRARY).await;
        service.set_auto_watch("Show", None, true).await.unwrap();

        assert_eq!(service.set_auto_watch("Show", None, false).await.unwrap(), 0);
        assert!(!service.is_watched("Show", "S1").await.unwrap());
        assert_eq!(wanted_paths(&store).await.len(), 2);

        let err = service.set_auto_watch("Show", None, false).await.unwrap_err();
        assert!(matches!(err, TranslarrError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_groups_inherit_series_watch() {
        let (_store, service) = store_with(LIBRARY).await;
        service.set_auto_watch("Show", None, true).await.unwrap();
        service.set_auto_watch("Other", Some("S1"), true).await.unwrap();

        let groups = service.series_groups_with_watch_status().await.unwrap();
        let other = groups.iter().find(|g| g.series_name == "Other").unwrap();
        let show = groups.iter().find(|g| g.series_name == "Show").unwrap();

        assert!(show.is_watched);
        assert!(show.seasons.iter().all(|s| s.is_watched));
        assert!(!other.is_watched);
        assert!(other.seasons[0].is_watched);
    }

    #[tokio::test]
    async fn test_bulk_set_wanted_requires_series() {
        let (_store, service) = store_with(LIBRARY).await;
        assert!(matches!(
            service.bulk_set_wanted("  ", None, true).await,
            Err(TranslarrError::Validation(_))
        ));
        assert_eq!(service.bulk_set_wanted("Other", None, true).await.unwrap(), 1);
    }
}
