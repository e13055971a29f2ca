use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};

use crate::error::{Result, TranslarrError};
use crate::media::{find_best_subtitle_stream, SubtitleExtractor};
use crate::models::{SubtitleEntry, TranslationProgress, TranslationResult, TranslationSettings, TranslationStep};
use crate::settings::SettingsService;
use crate::store::EntryRepository;
use crate::subtitle::{clean_ass_file, extracted_subtitle_path, save_translation};
use crate::translate::Translator;
use crate::usage::UsageTracker;

/// Error text stored on entries whose video has nothing to translate
pub const SKIPPED_NO_SUBTITLES: &str = "No suitable embedded subtitles found - skipped";

/// Terminal states of one entry's run; retryable failures are `Err`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryOutcome {
    Translated,
    SkippedNoSubtitles,
}

struct ProgressReporter<'a> {
    tx: Option<&'a UnboundedSender<TranslationProgress>>,
    total_files: usize,
    processed_files: usize,
    current_file: &'a str,
}

impl ProgressReporter<'_> {
    fn step(&self, step: TranslationStep) {
        debug!("[{}/{}] {}: {}", self.processed_files + 1, self.total_files, step, self.current_file);

        if let Some(tx) = self.tx {
            let _ = tx.send(TranslationProgress {
                total_files: self.total_files,
                processed_files: self.processed_files,
                current_file: self.current_file.to_string(),
                step,
            });
        }
    }
}

/// Intermediate files of one entry, removed when the entry finishes
struct TempFiles(Vec<PathBuf>);

impl TempFiles {
    fn track(&mut self, path: PathBuf) {
        self.0.push(path);
    }
}

impl Drop for TempFiles {
    fn drop(&mut self) {
        debug!("Removing temporary files");
        for path in &self.0 {
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
            }
        }
    }
}

/// Drives wanted entries through extraction, cleaning and translation.
pub struct TranslationWorkflow {
    entries: Arc<dyn EntryRepository>,
    settings: SettingsService,
    usage: UsageTracker,
    extractor: Arc<dyn SubtitleExtractor>,
    translator: Arc<dyn Translator>,
    work_dir: PathBuf,
}

impl TranslationWorkflow {
    pub fn new(
        entries: Arc<dyn EntryRepository>,
        settings: SettingsService,
        usage: UsageTracker,
        extractor: Arc<dyn SubtitleExtractor>,
        translator: Arc<dyn Translator>,
        work_dir: PathBuf,
    ) -> Self {
        Self {
            entries,
            settings,
            usage,
            extractor,
            translator,
            work_dir,
        }
    }

    /// Translate up to `batch_size` eligible entries, one at a time.
    ///
    /// Per-entry failures are stored on the entry and counted; only a failure
    /// outside an entry (loading the batch or its settings) ends the batch early.
    pub async fn translate_next_batch(
        &self,
        batch_size: usize,
        progress: Option<&UnboundedSender<TranslationProgress>>,
    ) -> TranslationResult {
        info!("Starting translation");
        let started = Instant::now();
        let mut result = TranslationResult::default();

        if let Err(e) = self.run_batch(batch_size, progress, &mut result).await {
            error!("Critical error during translation: {}", e);
            result.errors.push(format!("Critical error during translation: {}", e));
        }

        result.duration = started.elapsed();
        info!(
            "Translation complete: {} translated, {} skipped, {} errors",
            result.success_count, result.skipped_no_subtitles, result.error_count
        );
        result
    }

    async fn run_batch(
        &self,
        batch_size: usize,
        progress: Option<&UnboundedSender<TranslationProgress>>,
        result: &mut TranslationResult,
    ) -> Result<()> {
        let entries = self.entries.get_unprocessed_wanted(batch_size).await?;
        if entries.is_empty() {
            info!("No unprocessed entries found");
            return Ok(());
        }
        info!("Found {} unprocessed entries", entries.len());

        let settings = self.settings.translation_settings().await?;
        info!("Using Gemini model {}", settings.model);

        let total_files = entries.len();
        for (processed_files, mut entry) in entries.into_iter().enumerate() {
            let file_name = entry.file_name.clone();
            let reporter = ProgressReporter {
                tx: progress,
                total_files,
                processed_files,
                current_file: &file_name,
            };
            reporter.step(TranslationStep::Starting);

            match self.process_entry(&mut entry, &settings, &reporter).await {
                Ok(EntryOutcome::Translated) => result.success_count += 1,
                Ok(EntryOutcome::SkippedNoSubtitles) => result.skipped_no_subtitles += 1,
                Err(e) => {
                    error!("Error processing {}: {}", file_name, e);
                    result.errors.push(format!("Error processing {}: {}", file_name, e));
                    result.error_count += 1;

                    // Stays unprocessed so the next batch retries it
                    entry.error_message = Some(e.to_string());
                    if let Err(save_err) = self.entries.update(&entry).await {
                        error!("Failed to store error for {}: {}", file_name, save_err);
                    }
                }
            }
        }

        if let Some(tx) = progress {
            let _ = tx.send(TranslationProgress {
                total_files,
                processed_files: total_files,
                current_file: String::new(),
                step: TranslationStep::Completed,
            });
        }
        Ok(())
    }

    async fn process_entry(
        &self,
        entry: &mut SubtitleEntry,
        settings: &TranslationSettings,
        reporter: &ProgressReporter<'_>,
    ) -> Result<EntryOutcome> {
        let video_path = PathBuf::from(&entry.file_path);

        reporter.step(TranslationStep::CheckingRateLimit);
        if !self.usage.can_make_request(&settings.model).await? {
            return Err(TranslarrError::RateLimitExceeded);
        }

        reporter.step(TranslationStep::FindingSubtitles);
        let Some(stream) = find_best_subtitle_stream(self.extractor.as_ref(), &video_path).await? else {
            warn!("No suitable subtitles found for {}, skipping", entry.file_name);
            self.finish_entry(entry, Some(SKIPPED_NO_SUBTITLES.to_string())).await?;
            reporter.step(TranslationStep::Completed);
            return Ok(EntryOutcome::SkippedNoSubtitles);
        };

        reporter.step(TranslationStep::ExtractingSubtitles);
        tokio::fs::create_dir_all(&self.work_dir).await?;
        let extracted = extracted_subtitle_path(
            &self.work_dir,
            &entry.file_name,
            stream.language_or_und(),
            stream.codec.extension(),
        );
        let mut temp_files = TempFiles(vec![extracted.clone()]);

        self.extractor
            .extract(&video_path, stream.index, &extracted, &stream.codec)
            .await
            .map_err(|e| match e {
                TranslarrError::Extraction(_) => e,
                other => TranslarrError::Extraction(other.to_string()),
            })?;

        let advanced = stream.codec.is_advanced();
        let text_path = if advanced {
            reporter.step(TranslationStep::CleaningSubtitles);
            info!("Detected ASS/SSA subtitle format, cleaning file before conversion");
            clean_ass_file(&extracted).await?;

            let srt_path = extracted.with_extension("srt");
            temp_files.track(srt_path.clone());
            self.extractor.convert_to_plain_subtitle(&extracted, &srt_path).await?;
            srt_path
        } else {
            extracted
        };

        reporter.step(TranslationStep::ValidatingSize);
        let content = read_subtitle(&text_path).await?;
        let max = settings.size_limits.for_source(advanced);
        if content.len() > max {
            return Err(TranslarrError::ContentTooLarge {
                size: content.len(),
                max,
            });
        }

        reporter.step(TranslationStep::TranslatingWithGemini);
        let translated = self.translator.translate(&content, settings).await?;

        reporter.step(TranslationStep::SavingSubtitles);
        save_translation(&video_path, &settings.preferred_lang, &translated).await?;
        self.finish_entry(entry, None).await?;

        // The subtitle is already written; a lost usage record must not fail the entry
        if let Err(e) = self.usage.record_usage(&settings.model).await {
            warn!("Failed to record API usage for {}: {}", entry.file_name, e);
        }

        reporter.step(TranslationStep::Completed);
        Ok(EntryOutcome::Translated)
    }

    /// Store the terminal state; `entry` is only changed once the update succeeds
    async fn finish_entry(&self, entry: &mut SubtitleEntry, message: Option<String>) -> Result<()> {
        let finished = SubtitleEntry {
            is_processed: true,
            force_process: false,
            processed_at: Some(Utc::now()),
            error_message: message,
            ..entry.clone()
        };
        self.entries.update(&finished).await?;
        *entry = finished;
        Ok(())
    }
}

async fn read_subtitle(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path).await?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
