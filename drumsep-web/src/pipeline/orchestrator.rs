//! Per-file pipeline: Validating → Extracting → Separating → Committing → Done.
//!
//! The first failing stage ends the run. A fresh [`Workspace`] is acquired
//! before extraction and released as the last action of every run.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use super::commit::{CommitStage, CommittedArtifact};
use super::errors::{PipelineError, PipelineResult};
use super::extract::ExtractionStage;
use super::media::MediaExtension;
use super::runner::ProcessRunner;
use super::separate::SeparationStage;
use super::workspace::Workspace;
use crate::config::SeparationConfig;

/// Position of a run in the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineState {
    Validating,
    Extracting,
    Separating,
    Committing,
    Done,
    Failed(String),
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Validating => f.write_str("validating"),
            PipelineState::Extracting => f.write_str("extracting"),
            PipelineState::Separating => f.write_str("separating"),
            PipelineState::Committing => f.write_str("committing"),
            PipelineState::Done => f.write_str("done"),
            PipelineState::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Tracks and logs the state of one run
struct RunTracker<'a> {
    label: &'a str,
    state: PipelineState,
}

impl<'a> RunTracker<'a> {
    fn new(label: &'a str) -> Self {
        tracing::debug!("[{}] -> {}", label, PipelineState::Validating);
        Self {
            label,
            state: PipelineState::Validating,
        }
    }

    fn advance(&mut self, next: PipelineState) {
        tracing::debug!("[{}] {} -> {}", self.label, self.state, next);
        self.state = next;
    }

    fn fail(&mut self, error: &PipelineError) {
        self.advance(PipelineState::Failed(error.to_string()));
    }
}

/// Runs the separation pipeline for single files
#[derive(Clone)]
pub struct Pipeline {
    config: Arc<SeparationConfig>,
    runner: Arc<dyn ProcessRunner>,
}

impl Pipeline {
    pub fn new(config: Arc<SeparationConfig>, runner: Arc<dyn ProcessRunner>) -> Self {
        Self { config, runner }
    }

    pub fn config(&self) -> &SeparationConfig {
        &self.config
    }

    /// Process `source`, naming the committed artifact after `original_filename`
    ///
    /// `source` is where the media currently lives (usually a materialized
    /// upload with a random name); `original_filename` is the name the user
    /// supplied.
    pub fn run(&self, source: &Path, original_filename: &str) -> PipelineResult<CommittedArtifact> {
        let mut tracker = RunTracker::new(original_filename);
        let result = self.run_tracked(&mut tracker, source, original_filename);

        match &result {
            Ok(_) => tracker.advance(PipelineState::Done),
            Err(e) => tracker.fail(e),
        }
        result
    }

    fn run_tracked(
        &self,
        tracker: &mut RunTracker<'_>,
        source: &Path,
        original_filename: &str,
    ) -> PipelineResult<CommittedArtifact> {
        let extension = self.validate(source, original_filename)?;

        let workspace = match &self.config.scratch_dir {
            Some(dir) => Workspace::create_in(dir)?,
            None => Workspace::create()?,
        };

        let result = self.run_stages(tracker, &workspace, source, extension, original_filename);

        if let Err(e) = workspace.close() {
            tracing::warn!("[{}] Workspace cleanup failed: {}", original_filename, e);
        }
        result
    }

    fn validate(&self, source: &Path, original_filename: &str) -> PipelineResult<MediaExtension> {
        match MediaExtension::from_path(source) {
            Some(ext) if self.config.is_allowed(ext) => Ok(ext),
            _ => Err(PipelineError::validation(original_filename)),
        }
    }

    fn run_stages(
        &self,
        tracker: &mut RunTracker<'_>,
        workspace: &Workspace,
        source: &Path,
        extension: MediaExtension,
        original_filename: &str,
    ) -> PipelineResult<CommittedArtifact> {
        let runner = self.runner.as_ref();

        tracker.advance(PipelineState::Extracting);
        let audio = ExtractionStage::new(&self.config.transcoder)
            .run(runner, source, extension, workspace)?;

        tracker.advance(PipelineState::Separating);
        let separation = SeparationStage::new(&self.config).run(runner, &audio, workspace)?;

        tracker.advance(PipelineState::Committing);
        CommitStage::new(
            &self.config.output_dir,
            &self.config.component,
            &self.config.output_format,
        )
        .run(&separation.remainder, original_filename)
    }
}
