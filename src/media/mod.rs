// Embedded subtitle access
//
// - probe: stream model, ffprobe output parsing and best-stream selection
// - commands: ffmpeg/ffprobe command builders
// - processor: the ffmpeg-backed SubtitleExtractor

pub mod commands;
pub mod probe;
pub mod processor;

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

pub use commands::*;
pub use probe::{parse_probe_output, select_best_stream, SubtitleCodec, SubtitleStream, UNDETERMINED_LANGUAGE};
pub use processor::FfmpegSubtitleExtractor;

use crate::config::MediaConfig;
use crate::error::Result;

/// Subtitle stream discovery and extraction from video containers
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SubtitleExtractor: Send + Sync {
    /// List every embedded subtitle stream
    async fn list_subtitle_streams(&self, video_path: &Path) -> Result<Vec<SubtitleStream>>;

    /// Write one subtitle stream to `output_path` in the codec's native text format
    async fn extract(
        &self,
        video_path: &Path,
        stream_index: u32,
        output_path: &Path,
        codec: &SubtitleCodec,
    ) -> Result<()>;

    /// Convert a subtitle file to the format implied by the output extension
    async fn convert_to_plain_subtitle(&self, input_path: &Path, output_path: &Path) -> Result<()>;

    /// Check that the media binaries can be executed
    fn check_availability(&self) -> Result<()>;

    async fn get_version_info(&self) -> Result<String>;
}

/// Probe a video and pick the stream worth translating, if any
pub async fn find_best_subtitle_stream(
    extractor: &dyn SubtitleExtractor,
    video_path: &Path,
) -> Result<Option<SubtitleStream>> {
    let streams = extractor.list_subtitle_streams(video_path).await?;
    Ok(select_best_stream(&streams).cloned())
}

/// Factory for creating subtitle extractor instances
pub struct SubtitleExtractorFactory;

impl SubtitleExtractorFactory {
    /// Create the default extractor implementation (FFmpeg-based)
    pub fn create_extractor(config: MediaConfig) -> Arc<dyn SubtitleExtractor> {
        Arc::new(FfmpegSubtitleExtractor::new(config))
    }
}
