use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{error, info, warn};

use super::scanner::scan_filesystem;
use super::watch::SeriesWatchService;
use crate::error::{Result, TranslarrError};
use crate::models::{ScanProgress, ScanResult, SubtitleEntry, VideoFile};
use crate::settings::SettingsService;
use crate::store::EntryRepository;
use crate::subtitle::companion_subtitle_path;

enum Analysis {
    New,
    Changed,
    Unchanged,
}

/// Keeps the persisted entry set in step with the media root.
#[derive(Clone)]
pub struct LibraryScanner {
    media_root: PathBuf,
    entries: Arc<dyn EntryRepository>,
    settings: SettingsService,
    watch: SeriesWatchService,
}

impl LibraryScanner {
    pub fn new(
        media_root: PathBuf,
        entries: Arc<dyn EntryRepository>,
        settings: SettingsService,
        watch: SeriesWatchService,
    ) -> Self {
        Self {
            media_root,
            entries,
            settings,
            watch,
        }
    }

    /// Scan the media root and reconcile it with stored entries.
    ///
    /// Always returns a result; a fatal failure is recorded as one more error.
    pub async fn scan_library(&self, progress: Option<&UnboundedSender<ScanProgress>>) -> ScanResult {
        info!("Starting media scan");
        let started = Instant::now();
        let mut result = ScanResult::default();

        if let Err(e) = self.run_scan(&mut result, progress).await {
            error!("Critical error during scan: {}", e);
            result.errors.push(format!("Critical error during scan: {}", e));
        }

        result.duration = started.elapsed();
        info!(
            "Media scan complete: {} new, {} updated, {} removed, {} errors",
            result.new_files, result.updated_files, result.removed_files, result.error_files
        );
        result
    }

    async fn run_scan(&self, result: &mut ScanResult, progress: Option<&UnboundedSender<ScanProgress>>) -> Result<()> {
        let preferred_lang = self.settings.preferred_language().await?;

        let media_root = self.media_root.clone();
        let video_files = tokio::task::spawn_blocking(move || scan_filesystem(&media_root))
            .await
            .map_err(|e| TranslarrError::Task(format!("Filesystem scan panicked: {}", e)))??;

        self.remove_missing_entries(&video_files, result).await;
        self.analyze_video_files(&video_files, &preferred_lang, result, progress).await;
        Ok(())
    }

    async fn remove_missing_entries(&self, video_files: &[VideoFile], result: &mut ScanResult) {
        info!("Removing stale entries");

        if let Err(e) = self.try_remove_missing_entries(video_files, result).await {
            error!("Failed to remove stale entries: {}", e);
            result.errors.push(format!("Failed to remove stale entries: {}", e));
        }
    }

    async fn try_remove_missing_entries(&self, video_files: &[VideoFile], result: &mut ScanResult) -> Result<()> {
        let existing = self.entries.get_all().await?;
        if existing.is_empty() {
            return Ok(());
        }

        let present: HashSet<String> = video_files
            .iter()
            .map(|v| v.file_path.to_string_lossy().to_lowercase())
            .collect();

        let stale: Vec<i64> = existing
            .iter()
            .filter(|entry| !present.contains(&entry.file_path.to_lowercase()))
            .map(|entry| entry.id)
            .collect();

        if stale.is_empty() {
            return Ok(());
        }

        let removed = self.entries.delete_by_ids(&stale).await?;
        result.removed_files += removed;
        info!("Removed {} stale entries", removed);

        if removed < stale.len() {
            warn!("Some database entries could not be removed during cleanup.");
            result
                .errors
                .push("Some database entries could not be removed during cleanup.".to_string());
        }
        Ok(())
    }

    async fn analyze_video_files(
        &self,
        video_files: &[VideoFile],
        preferred_lang: &str,
        result: &mut ScanResult,
        progress: Option<&UnboundedSender<ScanProgress>>,
    ) {
        info!("Analyzing {} video files", video_files.len());
        let total_files = video_files.len();

        for (processed_files, video) in video_files.iter().enumerate() {
            if let Some(tx) = progress {
                let _ = tx.send(ScanProgress {
                    total_files,
                    processed_files,
                    current_file: video.file_name.clone(),
                });
            }

            match self.analyze_video_file(video, preferred_lang, Utc::now()).await {
                Ok(Analysis::New) => result.new_files += 1,
                Ok(Analysis::Changed) => result.updated_files += 1,
                Ok(Analysis::Unchanged) => {}
                Err(e) => {
                    error!("Error processing {}: {}", video.file_name, e);
                    result.errors.push(format!("Error processing {}: {}", video.file_name, e));
                    result.error_files += 1;
                }
            }
        }
    }

    async fn analyze_video_file(&self, video: &VideoFile, preferred_lang: &str, now: DateTime<Utc>) -> Result<Analysis> {
        let subtitle_path = companion_subtitle_path(&video.file_path, preferred_lang);
        let already_has = tokio::fs::try_exists(&subtitle_path).await?;
        let file_path = video.file_path.to_string_lossy();

        match self.entries.find_by_path(&file_path).await? {
            None => {
                let wanted = self.watch.is_watched(&video.series, &video.season).await?;
                let entry = SubtitleEntry::discovered(video, wanted, already_has, now);
                self.entries.insert(&entry).await?;
                Ok(Analysis::New)
            }
            Some(mut entry) => {
                let had_subtitles = entry.already_had;
                entry.already_had = already_has;
                entry.last_scanned = now;

                // Subtitle disappeared: make the entry eligible again
                if had_subtitles && !already_has {
                    entry.is_processed = false;
                    entry.error_message = None;
                }

                self.entries.update(&entry).await?;

                if had_subtitles != already_has {
                    Ok(Analysis::Changed)
                } else {
                    Ok(Analysis::Unchanged)
                }
            }
        }
    }
}
