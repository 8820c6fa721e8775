//! Extraction stage
//!
//! Pulls the audio track out of video containers as 16-bit PCM WAV,
//! 44.1 kHz stereo. Audio-only inputs pass through untouched.

use std::path::{Path, PathBuf};

use super::errors::{PipelineError, PipelineResult};
use super::media::MediaExtension;
use super::runner::{CommandSpec, ProcessRunner};
use super::workspace::Workspace;

pub const SAMPLE_RATE_HZ: u32 = 44_100;
pub const CHANNELS: u32 = 2;
pub const PCM_CODEC: &str = "pcm_s16le";

pub struct ExtractionStage<'a> {
    transcoder: &'a str,
}

impl<'a> ExtractionStage<'a> {
    pub fn new(transcoder: &'a str) -> Self {
        Self { transcoder }
    }

    /// Transcoder invocation writing `target` from `source`
    pub fn command(&self, source: &Path, target: &Path) -> CommandSpec {
        CommandSpec::new(self.transcoder)
            .args(["-y", "-i"])
            .arg(source)
            .args(["-vn", "-acodec", PCM_CODEC])
            .arg("-ar")
            .arg(SAMPLE_RATE_HZ.to_string())
            .arg("-ac")
            .arg(CHANNELS.to_string())
            .arg(target)
    }

    /// Return the path of an audio file the separation tool can read
    pub fn run(
        &self,
        runner: &dyn ProcessRunner,
        source: &Path,
        extension: MediaExtension,
        workspace: &Workspace,
    ) -> PipelineResult<PathBuf> {
        if !extension.has_video() {
            tracing::debug!("{} is audio-only, skipping extraction", source.display());
            return Ok(source.to_path_buf());
        }

        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio".to_string());
        let target = workspace.join(format!("{}.wav", stem));
        let cmd = self.command(source, &target);

        let result = runner.run(&cmd).map_err(|e| {
            PipelineError::extraction(None, format!("Failed to run {}: {}", self.transcoder, e))
        })?;

        if !result.success() {
            return Err(PipelineError::extraction(result.exit_code, result.output));
        }

        if !target.is_file() {
            return Err(PipelineError::extraction(
                result.exit_code,
                format!(
                    "{} reported success but wrote no audio to {}",
                    self.transcoder,
                    target.display()
                ),
            ));
        }

        tracing::info!("Extracted audio {} -> {}", source.display(), target.display());
        Ok(target)
    }
}
