//! Error types for the separation pipeline.
//!
//! Every variant is recovered at the per-file boundary; none of them stops
//! a batch or the service.

use std::io;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Broad class of a failure, used to route log severity and reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The upload itself is unacceptable (unsupported type, bad name)
    Input,
    /// An external tool rejected or failed on the media
    Processing,
    /// The host is misconfigured: wrong tool layout, unwritable folders
    Environment,
}

/// Failure of one pipeline run
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Extension outside the accepted set; no process was spawned.
    #[error("Unsupported file type: {filename}")]
    Validation { filename: String },

    /// Transcoder exited non-zero or could not be launched.
    #[error("Audio extraction failed ({}): {output}", describe_exit(*exit_code))]
    Extraction {
        exit_code: Option<i32>,
        output: String,
    },

    /// Separation tool exited non-zero or could not be launched.
    #[error("Separation failed ({}): {output}", describe_exit(*exit_code))]
    Separation {
        exit_code: Option<i32>,
        output: String,
    },

    /// Separation tool exited zero but the remainder file is not where the
    /// configured layout says it should be.
    #[error("Remainder artifact not found at {}; the separation tool output layout does not match", path.display())]
    MissingArtifact { path: PathBuf },

    /// Copying the remainder into the output folder failed.
    #[error("Could not write {}: {source}", destination.display())]
    Commit {
        destination: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Scratch space (workspace or materialized upload) could not be prepared.
    #[error("Scratch space setup failed in {operation}: {source}")]
    Workspace {
        operation: String,
        #[source]
        source: io::Error,
    },
}

fn describe_exit(code: Option<i32>) -> String {
    match code {
        Some(c) => format!("exit code {}", c),
        None => "no exit code".to_string(),
    }
}

impl PipelineError {
    /// Create a validation error.
    pub fn validation(filename: impl Into<String>) -> Self {
        Self::Validation {
            filename: filename.into(),
        }
    }

    /// Create an extraction error from a tool exit.
    pub fn extraction(exit_code: Option<i32>, output: impl Into<String>) -> Self {
        Self::Extraction {
            exit_code,
            output: output.into(),
        }
    }

    /// Create a separation error from a tool exit.
    pub fn separation(exit_code: Option<i32>, output: impl Into<String>) -> Self {
        Self::Separation {
            exit_code,
            output: output.into(),
        }
    }

    /// Create a missing artifact error.
    pub fn missing_artifact(path: impl Into<PathBuf>) -> Self {
        Self::MissingArtifact { path: path.into() }
    }

    /// Create a commit error.
    pub fn commit(destination: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Commit {
            destination: destination.into(),
            source,
        }
    }

    /// Create a workspace setup error.
    pub fn workspace(operation: impl Into<String>, source: io::Error) -> Self {
        Self::Workspace {
            operation: operation.into(),
            source,
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            PipelineError::Validation { .. } => FailureKind::Input,
            PipelineError::Extraction { .. } | PipelineError::Separation { .. } => {
                FailureKind::Processing
            }
            PipelineError::MissingArtifact { .. }
            | PipelineError::Commit { .. }
            | PipelineError::Workspace { .. } => FailureKind::Environment,
        }
    }

    /// True when the failure points at host configuration rather than input
    pub fn is_environment(&self) -> bool {
        self.kind() == FailureKind::Environment
    }

    /// The text shown to users: tool output for tool failures, the error
    /// message otherwise
    pub fn diagnostic(&self) -> String {
        match self {
            PipelineError::Extraction { output, .. } | PipelineError::Separation { output, .. } => {
                if output.trim().is_empty() {
                    self.to_string()
                } else {
                    output.clone()
                }
            }
            other => other.to_string(),
        }
    }
}

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;
