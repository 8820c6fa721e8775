//! Commit stage
//!
//! Publishes the remainder artifact into the output folder. The bytes are
//! first copied into a hidden temporary file in the output folder and then
//! renamed over the destination, so readers only ever see a complete file.
//! Concurrent commits to the same name resolve as last-write-wins.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::errors::{PipelineError, PipelineResult};

/// A file published to the output folder
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommittedArtifact {
    pub path: PathBuf,
    pub bytes: u64,
}

pub struct CommitStage<'a> {
    output_dir: &'a Path,
    component: &'a str,
    extension: &'a str,
}

impl<'a> CommitStage<'a> {
    /// `extension` is the separation tool's output encoding, not the
    /// remainder file's own suffix
    pub fn new(output_dir: &'a Path, component: &'a str, extension: &'a str) -> Self {
        Self {
            output_dir,
            component,
            extension,
        }
    }

    /// `<output_dir>/<original-stem>_no_<component>.<extension>`
    pub fn destination_for(&self, original_filename: &str) -> PathBuf {
        let stem = Path::new(original_filename)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());

        self.output_dir
            .join(format!("{}_no_{}.{}", stem, self.component, self.extension))
    }

    pub fn run(&self, remainder: &Path, original_filename: &str) -> PipelineResult<CommittedArtifact> {
        // An empty file counts as absent: the tool did not deliver its output.
        match std::fs::metadata(remainder) {
            Ok(meta) if meta.is_file() && meta.len() > 0 => {}
            _ => return Err(PipelineError::missing_artifact(remainder)),
        }

        let destination = self.destination_for(original_filename);

        let bytes = self
            .copy_atomically(remainder, &destination)
            .map_err(|e| PipelineError::commit(&destination, e))?;

        tracing::info!("Committed {} ({} bytes)", destination.display(), bytes);
        Ok(CommittedArtifact {
            path: destination,
            bytes,
        })
    }

    fn copy_atomically(&self, source: &Path, destination: &Path) -> io::Result<u64> {
        let mut reader = File::open(source)?;
        let mut staged = tempfile::Builder::new()
            .prefix(".drumsep-")
            .suffix(".partial")
            .tempfile_in(self.output_dir)?;

        let bytes = io::copy(&mut reader, staged.as_file_mut())?;
        staged.as_file_mut().flush()?;
        // Staging files are created owner-only; publish with the source's mode.
        staged
            .as_file()
            .set_permissions(reader.metadata()?.permissions())?;
        staged.as_file().sync_all()?;

        staged.persist(destination).map_err(|e| e.error)?;
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn destination_uses_original_stem() {
        let stage = CommitStage::new(Path::new("/out"), "drums", "mp3");
        assert_eq!(
            stage.destination_for("My Song.flac"),
            PathBuf::from("/out/My Song_no_drums.mp3")
        );
        assert_eq!(
            stage.destination_for("clip.final.mkv"),
            PathBuf::from("/out/clip.final_no_drums.mp3")
        );
    }

    #[test]
    fn copies_and_leaves_no_staging_files() {
        let scratch = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let remainder = scratch.path().join("no_drums.mp3");
        std::fs::write(&remainder, b"remainder-bytes").unwrap();

        let stage = CommitStage::new(out.path(), "drums", "mp3");
        let artifact = stage.run(&remainder, "song.wav").unwrap();

        assert_eq!(artifact.path, out.path().join("song_no_drums.mp3"));
        assert_eq!(artifact.bytes, 15);
        assert_eq!(std::fs::read(&artifact.path).unwrap(), b"remainder-bytes");
        assert_eq!(std::fs::read_dir(out.path()).unwrap().count(), 1);
    }

    #[test]
    fn overwrites_existing_destination() {
        let scratch = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let remainder = scratch.path().join("no_drums.mp3");
        std::fs::write(out.path().join("song_no_drums.mp3"), b"old").unwrap();
        std::fs::write(&remainder, b"new").unwrap();

        let artifact = CommitStage::new(out.path(), "drums", "mp3")
            .run(&remainder, "song.mp3")
            .unwrap();
        assert_eq!(std::fs::read(artifact.path).unwrap(), b"new");
    }

    #[test]
    fn empty_or_absent_remainder_is_missing_artifact() {
        let scratch = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let stage = CommitStage::new(out.path(), "drums", "mp3");

        let absent = scratch.path().join("no_drums.mp3");
        assert!(matches!(
            stage.run(&absent, "a.mp3"),
            Err(PipelineError::MissingArtifact { .. })
        ));

        std::fs::write(&absent, b"").unwrap();
        assert!(matches!(
            stage.run(&absent, "a.mp3"),
            Err(PipelineError::MissingArtifact { .. })
        ));
        assert_eq!(std::fs::read_dir(out.path()).unwrap().count(), 0);
    }

    #[test]
    fn unwritable_destination_is_commit_error() {
        let scratch = TempDir::new().unwrap();
        let remainder = scratch.path().join("no_drums.mp3");
        std::fs::write(&remainder, b"data").unwrap();
        let missing_out = scratch.path().join("does-not-exist");

        let err = CommitStage::new(&missing_out, "drums", "mp3")
            .run(&remainder, "a.mp3")
            .unwrap_err();
        assert!(matches!(err, PipelineError::Commit { .. }));
        assert!(err.is_environment());
    }

    #[test]
    fn extension_comes_from_output_format_not_remainder_name() {
        let scratch = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let bare = scratch.path().join("remainder");
        let odd = scratch.path().join("remainder.part");
        std::fs::write(&bare, b"bare").unwrap();
        std::fs::write(&odd, b"odd").unwrap();

        let stage = CommitStage::new(out.path(), "drums", "flac");
        assert_eq!(
            stage.run(&bare, "song.mp3").unwrap().path,
            out.path().join("song_no_drums.flac")
        );
        assert_eq!(
            stage.run(&odd, "take.wav").unwrap().path,
            out.path().join("take_no_drums.flac")
        );
    }

    #[cfg(unix)]
    #[test]
    fn committed_file_keeps_source_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let scratch = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let remainder = scratch.path().join("no_drums.mp3");
        std::fs::write(&remainder, b"data").unwrap();
        std::fs::set_permissions(&remainder, std::fs::Permissions::from_mode(0o644)).unwrap();

        let artifact = CommitStage::new(out.path(), "drums", "mp3")
            .run(&remainder, "song.mp3")
            .unwrap();

        let mode = std::fs::metadata(&artifact.path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }
}
