//! Media separation pipeline
//!
//! Leaf-first:
//! - `runner`: external process execution behind [`ProcessRunner`]
//! - `media`: accepted input types
//! - `workspace`: per-run scratch directory, removed on drop
//! - `extract`: audio extraction from video containers
//! - `separate`: separation tool invocation and remainder lookup
//! - `commit`: atomic publish into the output folder
//! - `orchestrator`: per-file state machine
//! - `batch`: per-upload coordination and aggregate reporting

pub mod batch;
pub mod commit;
pub mod errors;
pub mod extract;
pub mod media;
pub mod orchestrator;
pub mod runner;
pub mod separate;
pub mod workspace;

pub use batch::{BatchCoordinator, BatchOutcome, FileOutcome, FileResult, UploadedFile};
pub use commit::CommittedArtifact;
pub use errors::{FailureKind, PipelineError, PipelineResult};
pub use media::MediaExtension;
pub use orchestrator::{Pipeline, PipelineState};
pub use runner::{CommandSpec, ProcessOutput, ProcessRunner, SystemRunner};
pub use separate::{RemainderLayout, SeparationResult};
pub use workspace::Workspace;
