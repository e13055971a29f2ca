use std::path::Path;
use tokio::process::Command;
use tracing::debug;

use crate::error::{Result, TranslarrError};

/// Abstract media processing command representation
#[derive(Debug, Clone)]
pub struct MediaCommand {
    pub binary_path: String,
    pub args: Vec<String>,
    pub description: String,
}

impl MediaCommand {
    /// Create a new media processing command
    pub fn new<S1: Into<String>, S2: Into<String>>(binary_path: S1, description: S2) -> Self {
        Self {
            binary_path: binary_path.into(),
            args: Vec::new(),
            description: description.into(),
        }
    }

    /// Add an argument
    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(|s| s.into()));
        self
    }

    /// Add input file
    pub fn input<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg("-i").arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Add output file
    pub fn output<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Force overwrite output
    pub fn overwrite(self) -> Self {
        self.arg("-y")
    }

    /// Only report errors
    pub fn quiet(self) -> Self {
        self.arg("-v").arg("error")
    }

    /// Select a single stream of the first input by absolute index
    pub fn map_stream(self, index: u32) -> Self {
        self.arg("-map").arg(format!("0:{}", index))
    }

    /// Set subtitle codec (`copy` keeps the native format)
    pub fn subtitle_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:s").arg(codec)
    }

    /// Disable video
    pub fn no_video(self) -> Self {
        self.arg("-vn")
    }

    /// Disable audio
    pub fn no_audio(self) -> Self {
        self.arg("-an")
    }

    async fn run(&self) -> Result<std::process::Output> {
        debug!("Executing media processing command: {} {:?}", self.binary_path, self.args);
        debug!("Description: {}", self.description);

        let output = Command::new(&self.binary_path)
            .args(&self.args)
            .output()
            .await
            .map_err(|e| TranslarrError::Media(format!("Failed to execute {}: {}", self.binary_path, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TranslarrError::Media(format!(
                "{} failed: {}",
                self.description,
                stderr.trim()
            )));
        }

        Ok(output)
    }

    /// Execute the command
    pub async fn execute(&self) -> Result<()> {
        self.run().await.map(|_| ())
    }

    /// Execute the command and return its standard output
    pub async fn execute_capture(&self) -> Result<String> {
        let output = self.run().await?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Builder for the ffmpeg/ffprobe invocations used on subtitle streams
pub struct MediaCommandBuilder {
    ffmpeg_path: String,
    ffprobe_path: String,
}

impl MediaCommandBuilder {
    /// Create a new command builder
    pub fn new<S1: Into<String>, S2: Into<String>>(ffmpeg_path: S1, ffprobe_path: S2) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            ffprobe_path: ffprobe_path.into(),
        }
    }

    /// Build subtitle stream listing command (JSON on stdout)
    pub fn probe_subtitle_streams<P: AsRef<Path>>(&self, video_path: P) -> MediaCommand {
        MediaCommand::new(&self.ffprobe_path, "Subtitle stream probe")
            .quiet()
            .arg("-print_format")
            .arg("json")
            .arg("-show_streams")
            .arg("-select_streams")
            .arg("s")
            .output(video_path)
    }

    /// Build single subtitle stream extraction command
    pub fn extract_subtitle<P: AsRef<Path>>(
        &self,
        video_path: P,
        stream_index: u32,
        output_path: P,
        encoder: &str,
    ) -> MediaCommand {
        MediaCommand::new(&self.ffmpeg_path, "Subtitle extraction")
            .overwrite()
            .quiet()
            .input(video_path)
            .map_stream(stream_index)
            .no_video()
            .no_audio()
            .subtitle_codec(encoder)
            .output(output_path)
    }

    /// Build subtitle format conversion command; the format follows the output extension
    pub fn convert_subtitle<P: AsRef<Path>>(&self, input_path: P, output_path: P) -> MediaCommand {
        MediaCommand::new(&self.ffmpeg_path, "Subtitle conversion")
            .overwrite()
            .quiet()
            .input(input_path)
            .output(output_path)
    }

    /// Build version check command
    pub fn version_check(&self) -> MediaCommand {
        MediaCommand::new(&self.ffmpeg_path, "Version check").arg("-version")
    }
}
