use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{Result, TranslarrError};
use crate::jobs::{run_scan_job, run_translation_job, scan_summary, translation_summary, JobRegistry};
use crate::library::{LibraryScanner, SeriesWatchService};
use crate::media::{SubtitleExtractor, SubtitleExtractorFactory};
use crate::models::{LibraryStats, SubtitleEntry};
use crate::settings::{SettingsService, AUTO_LIBRARY_SCAN, AUTO_TRANSLATE};
use crate::store::{EntryRepository, SqliteStore};
use crate::translate::{Translator, TranslatorFactory};
use crate::usage::UsageTracker;
use crate::workflow::TranslationWorkflow;

/// Fully wired services sharing one store
pub struct App {
    pub config: Config,
    pub store: Arc<SqliteStore>,
    pub settings: SettingsService,
    pub watch: SeriesWatchService,
    pub scanner: LibraryScanner,
    pub usage: UsageTracker,
    pub extractor: Arc<dyn SubtitleExtractor>,
    pub workflow: TranslationWorkflow,
    pub jobs: JobRegistry,
}

impl App {
    /// Open the database, seed default settings and build the ffmpeg/Gemini backed services
    pub async fn init(config: Config) -> Result<Self> {
        let store = Arc::new(SqliteStore::open(&config.database.path)?);
        let extractor = SubtitleExtractorFactory::create_extractor(config.media.clone());
        let translator = TranslatorFactory::create_translator(&config.translate)?;

        Self::from_parts(config, store, extractor, translator).await
    }

    pub async fn from_parts(
        config: Config,
        store: Arc<SqliteStore>,
        extractor: Arc<dyn SubtitleExtractor>,
        translator: Arc<dyn Translator>,
    ) -> Result<Self> {
        let settings = SettingsService::new(store.clone());
        settings.seed_defaults().await?;

        let watch = SeriesWatchService::new(store.clone(), store.clone());
        let scanner = LibraryScanner::new(
            config.library.media_root.clone(),
            store.clone(),
            settings.clone(),
            watch.clone(),
        );
        let usage = UsageTracker::new(store.clone(), settings.clone());
        let workflow = TranslationWorkflow::new(
            store.clone(),
            settings.clone(),
            usage.clone(),
            extractor.clone(),
            translator,
            config.media.work_dir.clone(),
        );

        Ok(Self {
            config,
            store,
            settings,
            watch,
            scanner,
            usage,
            extractor,
            workflow,
            jobs: JobRegistry::new(),
        })
    }

    pub async fn library_stats(&self) -> Result<LibraryStats> {
        let entries = self.store.get_all().await?;
        Ok(LibraryStats::from_entries(&entries))
    }

    /// Set the manual flags of one entry
    pub async fn set_entry_flags(&self, id: i64, wanted: Option<bool>, force: Option<bool>) -> Result<SubtitleEntry> {
        let mut entry = self
            .store
            .find_by_id(id)
            .await?
            .ok_or_else(|| TranslarrError::NotFound(format!("Subtitle entry {} not found", id)))?;

        if let Some(wanted) = wanted {
            entry.is_wanted = wanted;
        }
        if let Some(force) = force {
            entry.force_process = force;
        }

        self.store.update(&entry).await?;
        Ok(entry)
    }

    /// Run scans and translation batches on timers until Ctrl-C.
    ///
    /// Each tick checks its settings flag; a tick that finds its job still
    /// running is skipped.
    pub async fn run_daemon(self: Arc<Self>) -> Result<()> {
        let daemon = &self.config.daemon;
        info!(
            "Daemon started: scan every {}s, translate every {}s",
            daemon.scan_interval_secs, daemon.translate_interval_secs
        );

        let mut scan_tick = tokio::time::interval(Duration::from_secs(daemon.scan_interval_secs.max(1)));
        let mut translate_tick = tokio::time::interval(Duration::from_secs(daemon.translate_interval_secs.max(1)));
        scan_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        translate_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = scan_tick.tick() => self.clone().spawn_scheduled_scan().await,
                _ = translate_tick.tick() => self.clone().spawn_scheduled_translation().await,
                signal = tokio::signal::ctrl_c() => {
                    signal?;
                    info!("Shutting down daemon");
                    return Ok(());
                }
            }
        }
    }

    async fn flag_enabled(&self, key: &str) -> bool {
        match self.settings.get_flag(key).await {
            Ok(enabled) => enabled,
            Err(e) => {
                error!("Failed to read {}: {}", key, e);
                false
            }
        }
    }

    async fn spawn_scheduled_scan(self: Arc<Self>) {
        if !self.flag_enabled(AUTO_LIBRARY_SCAN).await {
            debug!("{} is off, skipping scheduled scan", AUTO_LIBRARY_SCAN);
            return;
        }

        tokio::spawn(async move {
            match run_scan_job(&self.jobs, &self.scanner, None).await {
                Ok(result) => info!("Scheduled scan finished: {}", scan_summary(&result)),
                Err(TranslarrError::JobAlreadyRunning(kind)) => {
                    warn!("A {} job is still running, skipping this tick", kind)
                }
                Err(e) => error!("Scheduled scan failed: {}", e),
            }
        });
    }

    async fn spawn_scheduled_translation(self: Arc<Self>) {
        if !self.flag_enabled(AUTO_TRANSLATE).await {
            debug!("{} is off, skipping scheduled translation", AUTO_TRANSLATE);
            return;
        }

        tokio::spawn(async move {
            let batch_size = self.config.library.batch_size;
            match run_translation_job(&self.jobs, &self.workflow, batch_size, None).await {
                Ok(result) => info!("Scheduled translation finished: {}", translation_summary(&result)),
                Err(TranslarrError::JobAlreadyRunning(kind)) => {
                    warn!("A {} job is still running, skipping this tick", kind)
                }
                Err(e) => error!("Scheduled translation failed: {}", e),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MockSubtitleExtractor;
    use crate::settings::GEMINI_MODEL;
    use crate::translate::MockTranslator;
    use assert_fs::prelude::*;
    use assert_fs::TempDir;
    use tokio_test::{assert_err, assert_ok};

    async fn app(root: &TempDir) -> App {
        let mut config = Config::default();
        config.library.media_root = root.path().to_path_buf();
        config.media.work_dir = root.path().join("work");

        App::from_parts(
            config,
            Arc::new(SqliteStore::open_in_memory().unwrap()),
            Arc::new(MockSubtitleExtractor::new()),
            Arc::new(MockTranslator::new()),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_from_parts_seeds_settings() {
        let root = TempDir::new().unwrap();
        let app = app(&root).await;

        let model = assert_ok!(app.settings.get_required(GEMINI_MODEL).await);
        assert_eq!(model, "gemini-2.5-pro");
        assert!(!app.jobs.is_running(crate::jobs::JobKind::Scan));
    }

    #[tokio::test]
    async fn test_set_entry_flags_updates_only_given_flags() {
        let root = TempDir::new().unwrap();
        root.child("Show/S1/e01.mkv").touch().unwrap();
        let app = app(&root).await;
        app.scanner.scan_library(None).await;
        let id = app.store.get_all().await.unwrap()[0].id;

        let entry = assert_ok!(app.set_entry_flags(id, Some(true), None).await);
        assert!(entry.is_wanted);
        assert!(!entry.force_process);

        let entry = assert_ok!(app.set_entry_flags(id, None, Some(true)).await);
        assert!(entry.is_wanted);
        assert!(entry.force_process);

        let stored = app.store.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored, entry);
    }

    #[tokio::test]
    async fn test_set_entry_flags_unknown_id() {
        let root = TempDir::new().unwrap();
        let app = app(&root).await;

        let err = assert_err!(app.set_entry_flags(42, Some(true), None).await);
        assert_eq!(err.to_string(), "Not found: Subtitle entry 42 not found");
    }

    #[tokio::test]
    async fn test_library_stats_after_scan() {
        let root = TempDir::new().unwrap();
        root.child("Show/S1/e01.mkv").touch().unwrap();
        root.child("Show/S1/e02.mkv").touch().unwrap();
        root.child("Show/S1/e02.pl.srt").touch().unwrap();
        let app = app(&root).await;

        assert_eq!(app.library_stats().await.unwrap(), LibraryStats::default());

        app.scanner.scan_library(None).await;
        let stats = app.library_stats().await.unwrap();
        assert_eq!(stats.total_files, 2);
        assert_eq!(stats.already_had_files, 1);
        assert_eq!(stats.unprocessed_files, 2);
        assert!(stats.last_scanned.is_some());
    }
}
