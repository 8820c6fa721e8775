//! Per-run scratch directory
//!
//! A [`Workspace`] owns a freshly created temporary directory. The directory
//! and everything in it is removed when the workspace is dropped, so every
//! exit path of a pipeline run (success, error, panic unwind) cleans up.

use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use super::errors::{PipelineError, PipelineResult};

/// Exclusively owned scratch directory for one pipeline run
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Create a new workspace under the system temp directory
    pub fn create() -> PipelineResult<Self> {
        Self::build(tempfile::Builder::new().prefix("drumsep-").tempdir())
    }

    /// Create a new workspace under `parent`
    pub fn create_in(parent: &Path) -> PipelineResult<Self> {
        Self::build(tempfile::Builder::new().prefix("drumsep-").tempdir_in(parent))
    }

    fn build(dir: io::Result<TempDir>) -> PipelineResult<Self> {
        let dir = dir.map_err(|e| PipelineError::workspace("create workspace", e))?;
        tracing::debug!("Workspace created: {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path for a file directly inside the workspace
    pub fn join(&self, name: impl AsRef<Path>) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Remove the workspace now, reporting removal errors
    ///
    /// Dropping the workspace has the same effect but cannot report failure.
    pub fn close(self) -> io::Result<()> {
        let path = self.dir.path().to_path_buf();
        self.dir.close()?;
        tracing::debug!("Workspace removed: {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drop_removes_directory_and_contents() {
        let parent = TempDir::new().unwrap();
        let workspace = Workspace::create_in(parent.path()).unwrap();
        let path = workspace.path().to_path_buf();

        std::fs::create_dir_all(workspace.join("htdemucs/song")).unwrap();
        std::fs::write(workspace.join("htdemucs/song/no_drums.mp3"), b"data").unwrap();
        assert!(path.exists());

        drop(workspace);
        assert!(!path.exists());
    }

    #[test]
    fn close_removes_directory() {
        let parent = TempDir::new().unwrap();
        let workspace = Workspace::create_in(parent.path()).unwrap();
        let path = workspace.path().to_path_buf();

        workspace.close().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn workspaces_are_distinct() {
        let parent = TempDir::new().unwrap();
        let a = Workspace::create_in(parent.path()).unwrap();
        let b = Workspace::create_in(parent.path()).unwrap();
        assert_ne!(a.path(), b.path());
    }

    #[test]
    fn missing_parent_is_workspace_error() {
        let parent = TempDir::new().unwrap();
        let err = Workspace::create_in(&parent.path().join("absent")).unwrap_err();
        assert!(matches!(err, PipelineError::Workspace { .. }));
    }
}
