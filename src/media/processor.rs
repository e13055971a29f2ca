use async_trait::async_trait;
use std::path::Path;
use std::process::Command;
use tracing::{debug, info};

use super::probe::{parse_probe_output, SubtitleCodec, SubtitleStream};
use super::{MediaCommandBuilder, SubtitleExtractor};
use crate::config::MediaConfig;
use crate::error::{Result, TranslarrError};

/// ffmpeg/ffprobe backed subtitle extractor
pub struct FfmpegSubtitleExtractor {
    config: MediaConfig,
    command_builder: MediaCommandBuilder,
}

impl FfmpegSubtitleExtractor {
    pub fn new(config: MediaConfig) -> Self {
        let command_builder = MediaCommandBuilder::new(&config.ffmpeg_path, &config.ffprobe_path);

        Self {
            config,
            command_builder,
        }
    }

    async fn ensure_output(output_path: &Path) -> Result<()> {
        match tokio::fs::metadata(output_path).await {
            Ok(meta) if meta.len() > 0 => Ok(()),
            _ => Err(TranslarrError::Extraction(format!(
                "{} was not created",
                output_path.display()
            ))),
        }
    }
}

#[async_trait]
impl SubtitleExtractor for FfmpegSubtitleExtractor {
    async fn list_subtitle_streams(&self, video_path: &Path) -> Result<Vec<SubtitleStream>> {
        debug!("Probing subtitle streams of {}", video_path.display());

        let stdout = self
            .command_builder
            .probe_subtitle_streams(video_path)
            .execute_capture()
            .await?;

        let streams = parse_probe_output(&stdout)?;
        debug!("Found {} subtitle streams in {}", streams.len(), video_path.display());
        Ok(streams)
    }

    async fn extract(
        &self,
        video_path: &Path,
        stream_index: u32,
        output_path: &Path,
        codec: &SubtitleCodec,
    ) -> Result<()> {
        info!(
            "Extracting subtitle stream {} ({}) from {} to {}",
            stream_index,
            codec.name(),
            video_path.display(),
            output_path.display()
        );

        if let Some(parent) = output_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        self.command_builder
            .extract_subtitle(video_path, stream_index, output_path, codec.encoder())
            .execute()
            .await
            .map_err(|e| TranslarrError::Extraction(e.to_string()))?;

        Self::ensure_output(output_path).await
    }

    async fn convert_to_plain_subtitle(&self, input_path: &Path, output_path: &Path) -> Result<()> {
        info!("Converting {} to {}", input_path.display(), output_path.display());

        self.command_builder
            .convert_subtitle(input_path, output_path)
            .execute()
            .await
            .map_err(|e| TranslarrError::Extraction(e.to_string()))?;

        Self::ensure_output(output_path).await
    }

    fn check_availability(&self) -> Result<()> {
        for binary in [&self.config.ffmpeg_path, &self.config.ffprobe_path] {
            let output = Command::new(binary)
                .arg("-version")
                .output()
                .map_err(|e| TranslarrError::Media(format!("{} not found: {}", binary, e)))?;

            if !output.status.success() {
                return Err(TranslarrError::Media(format!("{} version check failed", binary)));
            }
        }

        info!("ffmpeg and ffprobe are available");
        Ok(())
    }

    async fn get_version_info(&self) -> Result<String> {
        let stdout = self.command_builder.version_check().execute_capture().await?;
        Ok(stdout.lines().next().unwrap_or("Unknown version").to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn missing_binaries() -> MediaConfig {
        MediaConfig {
            ffmpeg_path: "/nonexistent/ffmpeg".to_string(),
            ffprobe_path: "/nonexistent/ffprobe".to_string(),
            work_dir: PathBuf::from("/tmp/translarr"),
        }
    }

    #[test]
    fn test_check_availability_reports_missing_binary() {
        let extractor = FfmpegSubtitleExtractor::new(missing_binaries());
        assert!(matches!(extractor.check_availability(), Err(TranslarrError::Media(_))));
    }

    #[tokio::test]
    async fn test_failed_extraction_is_extraction_error() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = FfmpegSubtitleExtractor::new(missing_binaries());

        let err = extractor
            .extract(
                &dir.path().join("e01.mkv"),
                2,
                &dir.path().join("out/e01.eng.srt"),
                &SubtitleCodec::SubRip,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, TranslarrError::Extraction(_)));
        assert!(err.to_string().starts_with("Failed to extract subtitles from video file"));
    }
}
