//! Batch coordinator
//!
//! Runs the pipeline over every uploaded file and gathers the results into
//! one [`BatchOutcome`]. A failing file never stops the batch.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::errors::{FailureKind, PipelineError, PipelineResult};
use super::media::MediaExtension;
use super::orchestrator::Pipeline;
use super::runner::{CommandSpec, ProcessRunner};
use crate::config::SeparationConfig;

/// A file received from the client
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Name declared by the client (unsanitized)
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }
}

/// Result for one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileResult {
    Success { output: PathBuf },
    Failure { kind: FailureKind, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileOutcome {
    pub filename: String,
    #[serde(flatten)]
    pub result: FileResult,
}

impl FileOutcome {
    fn success(filename: String, output: PathBuf) -> Self {
        Self {
            filename,
            result: FileResult::Success { output },
        }
    }

    fn failure(filename: String, err: &PipelineError, max_diagnostic_len: usize) -> Self {
        let message = match err {
            PipelineError::Validation { .. } => err.to_string(),
            other => format!(
                "{}: error: {}",
                filename,
                truncate_diagnostic(&other.diagnostic(), max_diagnostic_len)
            ),
        };
        Self {
            filename,
            result: FileResult::Failure {
                kind: err.kind(),
                message,
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.result, FileResult::Success { .. })
    }
}

/// Aggregate result of one batch, in upload order
#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome {
    pub output_dir: PathBuf,
    pub successes: usize,
    pub failures: usize,
    pub files: Vec<FileOutcome>,
}

impl BatchOutcome {
    fn from_files(output_dir: PathBuf, files: Vec<FileOutcome>) -> Self {
        let successes = files.iter().filter(|f| f.is_success()).count();
        Self {
            output_dir,
            successes,
            failures: files.len() - successes,
            files,
        }
    }

    /// Human-readable failure lines, one per failed file
    pub fn failure_messages(&self) -> Vec<&str> {
        self.files
            .iter()
            .filter_map(|f| match &f.result {
                FileResult::Failure { message, .. } => Some(message.as_str()),
                FileResult::Success { .. } => None,
            })
            .collect()
    }

    /// Committed artifact paths, in upload order
    pub fn outputs(&self) -> Vec<&Path> {
        self.files
            .iter()
            .filter_map(|f| match &f.result {
                FileResult::Success { output } => Some(output.as_path()),
                FileResult::Failure { .. } => None,
            })
            .collect()
    }
}

/// Keep at most `max_chars` characters of `text`
pub fn truncate_diagnostic(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}

/// Reduce a client-supplied filename to a safe single path component
///
/// Directory parts are dropped, characters outside `[A-Za-z0-9._-]` become
/// `_`, and leading dots are removed. May return an empty string.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    cleaned.trim_start_matches('.').to_string()
}

/// Runs the pipeline over batches of uploads
pub struct BatchCoordinator {
    config: Arc<SeparationConfig>,
    runner: Arc<dyn ProcessRunner>,
    pipeline: Pipeline,
}

impl BatchCoordinator {
    pub fn new(config: SeparationConfig, runner: Arc<dyn ProcessRunner>) -> Self {
        let config = Arc::new(config);
        let pipeline = Pipeline::new(Arc::clone(&config), Arc::clone(&runner));
        Self {
            config,
            runner,
            pipeline,
        }
    }

    pub fn config(&self) -> &SeparationConfig {
        &self.config
    }

    /// Process every file and return the aggregate outcome
    ///
    /// Files with an empty name are skipped and do not appear in the outcome.
    pub fn process_batch(&self, files: Vec<UploadedFile>) -> BatchOutcome {
        let batch_id = Uuid::new_v4();
        let span = tracing::info_span!("batch", id = %batch_id);
        let _guard = span.enter();

        info!("Processing batch of {} file(s)", files.len());
        let outcomes: Vec<FileOutcome> = self.run_all(&files).into_iter().flatten().collect();
        let outcome = BatchOutcome::from_files(self.config.output_dir.clone(), outcomes);

        info!(
            "Batch finished: {} succeeded, {} failed",
            outcome.successes, outcome.failures
        );

        if self.config.reveal_output && outcome.successes > 0 {
            self.reveal_output_dir();
        }
        outcome
    }

    fn run_all(&self, files: &[UploadedFile]) -> Vec<Option<FileOutcome>> {
        let workers = self.config.workers.min(files.len()).max(1);
        if workers == 1 {
            return files.iter().map(|f| self.process_file(f)).collect();
        }

        let next = AtomicUsize::new(0);
        let slots = Mutex::new(vec![None; files.len()]);

        thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| loop {
                    let index = next.fetch_add(1, Ordering::SeqCst);
                    let Some(file) = files.get(index) else {
                        break;
                    };
                    let outcome = self.process_file(file);
                    slots.lock().unwrap_or_else(|p| p.into_inner())[index] = outcome;
                });
            }
        });

        slots.into_inner().unwrap_or_else(|p| p.into_inner())
    }

    fn process_file(&self, file: &UploadedFile) -> Option<FileOutcome> {
        if file.filename.trim().is_empty() {
            return None;
        }

        let name = sanitize_filename(&file.filename);
        let display_name = if name.is_empty() {
            file.filename.clone()
        } else {
            name.clone()
        };

        let outcome = match self.process_named(&name, &display_name, &file.bytes) {
            Ok(output) => FileOutcome::success(display_name, output),
            Err(e) => {
                match e.kind() {
                    FailureKind::Environment => {
                        error!(environment = true, "{}: {}", display_name, e)
                    }
                    FailureKind::Processing => warn!("{}: {}", display_name, e),
                    FailureKind::Input => info!("Rejected {}: {}", display_name, e),
                }
                FileOutcome::failure(display_name, &e, self.config.max_diagnostic_len)
            }
        };
        Some(outcome)
    }

    fn process_named(&self, name: &str, display_name: &str, bytes: &[u8]) -> PipelineResult<PathBuf> {
        let extension = MediaExtension::from_path(Path::new(name))
            .filter(|ext| self.config.is_allowed(*ext))
            .ok_or_else(|| PipelineError::validation(display_name))?;

        // Removed when dropped, whatever the pipeline outcome.
        let upload = self.materialize(extension, bytes)?;
        let result = self.pipeline.run(upload.path(), name);

        if let Err(e) = upload.close() {
            warn!("Could not remove materialized upload for {}: {}", name, e);
        }
        result.map(|artifact| artifact.path)
    }

    fn materialize(
        &self,
        extension: MediaExtension,
        bytes: &[u8],
    ) -> PipelineResult<tempfile::NamedTempFile> {
        let suffix = format!(".{}", extension);
        let mut builder = tempfile::Builder::new();
        builder.prefix("upload-").suffix(&suffix);

        let mut file = match &self.config.scratch_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .map_err(|e| PipelineError::workspace("materialize upload", e))?;

        file.write_all(bytes)
            .and_then(|_| file.flush())
            .map_err(|e| PipelineError::workspace("materialize upload", e))?;
        Ok(file)
    }

    fn reveal_output_dir(&self) {
        let program = if cfg!(target_os = "macos") {
            "open"
        } else if cfg!(target_os = "windows") {
            "explorer"
        } else {
            "xdg-open"
        };
        let cmd = CommandSpec::new(program).arg(&self.config.output_dir);

        match self.runner.run(&cmd) {
            Ok(out) if out.success() => {}
            Ok(out) => warn!("{} exited with {:?}", program, out.exit_code),
            Err(e) => warn!("Could not open output folder: {}", e),
        }
    }
}
