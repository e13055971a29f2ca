use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Result, TranslarrError};
use crate::library::LibraryScanner;
use crate::models::{ScanProgress, ScanResult, TranslationProgress, TranslationResult};
use crate::workflow::TranslationWorkflow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum JobKind {
    Scan,
    Translation,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobKind::Scan => f.write_str("scan"),
            JobKind::Translation => f.write_str("translation"),
        }
    }
}

/// Point-in-time view of one job slot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobStatus {
    pub kind: JobKind,
    pub run_id: Option<Uuid>,
    pub is_running: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub total_files: usize,
    pub processed_files: usize,
    pub current_file: Option<String>,
    pub current_step: Option<String>,
    pub summary: Option<String>,
}

impl JobStatus {
    fn idle(kind: JobKind) -> Self {
        Self {
            kind,
            run_id: None,
            is_running: false,
            started_at: None,
            finished_at: None,
            total_files: 0,
            processed_files: 0,
            current_file: None,
            current_step: None,
            summary: None,
        }
    }
}

/// Progress event that can be folded into a job status
pub trait ProgressEvent: Clone + Send + 'static {
    fn apply(&self, status: &mut JobStatus);
}

impl ProgressEvent for TranslationProgress {
    fn apply(&self, status: &mut JobStatus) {
        status.total_files = self.total_files;
        status.processed_files = self.processed_files;
        status.current_file = Some(self.current_file.clone()).filter(|f| !f.is_empty());
        status.current_step = Some(self.step.to_string());
    }
}

impl ProgressEvent for ScanProgress {
    fn apply(&self, status: &mut JobStatus) {
        status.total_files = self.total_files;
        status.processed_files = self.processed_files;
        status.current_file = Some(self.current_file.clone());
        status.current_step = Some("Analyzing".to_string());
    }
}

/// Single-flight job slots, one per job kind, starting idle.
#[derive(Debug, Clone, Default)]
pub struct JobRegistry {
    slots: Arc<Mutex<HashMap<JobKind, JobStatus>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<JobKind, JobStatus>> {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Claim the slot for `kind`; a second claim while running is rejected
    pub fn try_begin(&self, kind: JobKind) -> Result<JobGuard> {
        let mut slots = self.lock();
        let slot = slots.entry(kind).or_insert_with(|| JobStatus::idle(kind));

        if slot.is_running {
            return Err(TranslarrError::JobAlreadyRunning(kind.to_string()));
        }

        let run_id = Uuid::new_v4();
        *slot = JobStatus {
            run_id: Some(run_id),
            is_running: true,
            started_at: Some(Utc::now()),
            ..JobStatus::idle(kind)
        };
        info!("Started {} job {}", kind, run_id);

        Ok(JobGuard {
            registry: self.clone(),
            kind,
            run_id,
            finished: false,
        })
    }

    pub fn snapshot(&self, kind: JobKind) -> JobStatus {
        self.lock().get(&kind).cloned().unwrap_or_else(|| JobStatus::idle(kind))
    }

    pub fn is_running(&self, kind: JobKind) -> bool {
        self.snapshot(kind).is_running
    }

    fn update(&self, kind: JobKind, run_id: Uuid, f: impl FnOnce(&mut JobStatus)) {
        let mut slots = self.lock();
        match slots.get_mut(&kind) {
            Some(status) if status.run_id == Some(run_id) => f(status),
            _ => debug!("Ignoring update for stale {} run {}", kind, run_id),
        }
    }

    /// Fold progress events into the slot until the sender side closes,
    /// forwarding each event to `observer` afterwards
    pub fn spawn_listener<E: ProgressEvent>(
        &self,
        guard: &JobGuard,
        mut rx: UnboundedReceiver<E>,
        observer: Option<UnboundedSender<E>>,
    ) -> JoinHandle<()> {
        let registry = self.clone();
        let (kind, run_id) = (guard.kind, guard.run_id);

        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                registry.update(kind, run_id, |status| event.apply(status));
                if let Some(observer) = &observer {
                    let _ = observer.send(event);
                }
            }
        })
    }
}

/// Held for the lifetime of a running job; dropping it frees the slot
#[derive(Debug)]
pub struct JobGuard {
    registry: JobRegistry,
    kind: JobKind,
    run_id: Uuid,
    finished: bool,
}

impl JobGuard {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn finish(mut self, summary: String) {
        self.close(summary);
    }

    fn close(&mut self, summary: String) {
        self.finished = true;
        info!("Finished {} job {}: {}", self.kind, self.run_id, summary);
        self.registry.update(self.kind, self.run_id, |status| {
            status.is_running = false;
            status.finished_at = Some(Utc::now());
            status.current_file = None;
            status.current_step = None;
            status.summary = Some(summary);
        });
    }
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        if !self.finished {
            warn!("{} job {} ended without a result", self.kind, self.run_id);
            self.close("Interrupted".to_string());
        }
    }
}

pub fn scan_summary(result: &ScanResult) -> String {
    format!(
        "{} new, {} updated, {} removed, {} errors",
        result.new_files, result.updated_files, result.removed_files, result.error_files
    )
}

pub fn translation_summary(result: &TranslationResult) -> String {
    format!(
        "{} translated, {} skipped, {} errors",
        result.success_count, result.skipped_no_subtitles, result.error_count
    )
}

/// Run a library scan through the registry's scan slot
pub async fn run_scan_job(
    registry: &JobRegistry,
    scanner: &LibraryScanner,
    observer: Option<UnboundedSender<ScanProgress>>,
) -> Result<ScanResult> {
    let guard = registry.try_begin(JobKind::Scan)?;
    let (tx, rx) = mpsc::unbounded_channel();
    let listener = registry.spawn_listener(&guard, rx, observer);

    let result = scanner.scan_library(Some(&tx)).await;

    drop(tx);
    if let Err(e) = listener.await {
        warn!("Scan progress listener failed: {}", e);
    }
    guard.finish(scan_summary(&result));
    Ok(result)
}

/// Run one translation batch through the registry's translation slot
pub async fn run_translation_job(
    registry: &JobRegistry,
    workflow: &TranslationWorkflow,
    batch_size: usize,
    observer: Option<UnboundedSender<TranslationProgress>>,
) -> Result<TranslationResult> {
    let guard = registry.try_begin(JobKind::Translation)?;
    let (tx, rx) = mpsc::unbounded_channel();
    let listener = registry.spawn_listener(&guard, rx, observer);

    let result = workflow.translate_next_batch(batch_size, Some(&tx)).await;

    drop(tx);
    if let Err(e) = listener.await {
        warn!("Translation progress listener failed: {}", e);
    }
    guard.finish(translation_summary(&result));
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TranslationStep;

    #[test]
    fn test_registry_starts_idle() {
        let registry = JobRegistry::new();
        let status = registry.snapshot(JobKind::Scan);
        assert!(!status.is_running);
        assert!(status.run_id.is_none());
    }

    #[test]
    fn test_second_start_of_same_kind_is_rejected() {
        let registry = JobRegistry::new();
        let guard = registry.try_begin(JobKind::Translation).unwrap();

        let err = registry.try_begin(JobKind::Translation).unwrap_err();
        assert_eq!(err.to_string(), "A translation job is already running");
        assert!(format!("{:?}", guard).contains("Translation"));

        // Other kinds have their own slot
        let scan = registry.try_begin(JobKind::Scan).unwrap();

        guard.finish("done".to_string());
        assert!(registry.try_begin(JobKind::Translation).is_ok());
        scan.finish("done".to_string());
    }

    #[test]
    fn test_dropped_guard_frees_slot() {
        let registry = JobRegistry::new();
        {
            let _guard = registry.try_begin(JobKind::Scan).unwrap();
            assert!(registry.is_running(JobKind::Scan));
        }
        let status = registry.snapshot(JobKind::Scan);
        assert!(!status.is_running);
        assert_eq!(status.summary.as_deref(), Some("Interrupted"));
    }

    #[tokio::test]
    async fn test_listener_folds_progress_and_forwards() {
        let registry = JobRegistry::new();
        let guard = registry.try_begin(JobKind::Translation).unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        let (observer_tx, mut observer_rx) = mpsc::unbounded_channel();
        let listener = registry.spawn_listener(&guard, rx, Some(observer_tx));

        for (processed, step) in [(0, TranslationStep::Starting), (1, TranslationStep::TranslatingWithGemini)] {
            tx.send(TranslationProgress {
                total_files: 3,
                processed_files: processed,
                current_file: "e02.mkv".to_string(),
                step,
            })
            .unwrap();
        }
        drop(tx);
        listener.await.unwrap();

        let status = registry.snapshot(JobKind::Translation);
        assert!(status.is_running);
        assert_eq!(status.total_files, 3);
        assert_eq!(status.processed_files, 1);
        assert_eq!(status.current_step.as_deref(), Some("Translating with Gemini"));
        assert_eq!(status.current_file.as_deref(), Some("e02.mkv"));

        assert_eq!(observer_rx.recv().await.unwrap().step, TranslationStep::Starting);
        assert_eq!(observer_rx.recv().await.unwrap().processed_files, 1);

        guard.finish("1 translated, 0 skipped, 0 errors".to_string());
        let done = registry.snapshot(JobKind::Translation);
        assert!(!done.is_running);
        assert!(done.finished_at.is_some());
        assert!(done.current_step.is_none());
    }

    #[test]
    fn test_stale_run_updates_are_ignored() {
        let registry = JobRegistry::new();
        let first = registry.try_begin(JobKind::Scan).unwrap();
        let stale_id = first.run_id();
        first.finish("done".to_string());

        let second = registry.try_begin(JobKind::Scan).unwrap();
        registry.update(JobKind::Scan, stale_id, |s| s.processed_files = 99);
        assert_eq!(registry.snapshot(JobKind::Scan).processed_files, 0);
        second.finish("done".to_string());
    }
}
