//! Test Helper Utilities
//!
//! Shared utilities for drumsep-web integration tests

pub mod fake_runner;

use std::path::Path;
use std::sync::Arc;

use drumsep_web::pipeline::BatchCoordinator;
use drumsep_web::SeparationConfig;

pub use fake_runner::FakeRunner;

/// Config writing into `out` with workspaces and uploads under `scratch`
pub fn test_config(out: &Path, scratch: &Path) -> SeparationConfig {
    SeparationConfig::new(out).with_scratch_dir(scratch)
}

pub fn test_coordinator(config: SeparationConfig, runner: Arc<FakeRunner>) -> BatchCoordinator {
    BatchCoordinator::new(config, runner)
}

/// Number of entries directly inside `dir`
pub fn entry_count(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}
