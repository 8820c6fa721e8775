//! Separation stage
//!
//! Runs the source-separation tool in two-stem mode and locates the
//! "everything except the component" file it leaves in the workspace.
//!
//! Where that file lands is a convention of the tool version in use, so it
//! is described by a configurable [`RemainderLayout`] instead of being
//! hard-coded.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::errors::{PipelineError, PipelineResult};
use super::runner::{CommandSpec, ProcessRunner};
use super::workspace::Workspace;
use crate::config::SeparationConfig;

/// Environment defaults for the separation tool, applied only when the
/// service's own environment does not already set them
pub const SEPARATOR_ENV_DEFAULTS: [(&str, &str); 2] = [
    ("PYTHONWARNINGS", "ignore"),
    ("TORCHAUDIO_USE_SOUNDFILE", "1"),
];

/// Layout used by current separation tool releases
pub const DEFAULT_REMAINDER_LAYOUT: &str = "{model}/{stem}/no_{component}.{ext}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Model,
    Stem,
    Component,
    Ext,
}

impl Field {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "model" => Some(Field::Model),
            "stem" => Some(Field::Stem),
            "component" => Some(Field::Component),
            "ext" => Some(Field::Ext),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(Field),
}

/// Relative location of the remainder artifact inside the workspace
///
/// A template such as `{model}/{stem}/no_{component}.{ext}`. Placeholders:
/// `{model}`, `{stem}` (input audio file stem), `{component}`, `{ext}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemainderLayout {
    template: String,
    segments: Vec<Segment>,
}

impl RemainderLayout {
    /// Parse a layout template
    ///
    /// Rejects unknown placeholders, unbalanced braces, absolute paths,
    /// parent-directory components, and templates without `{stem}`.
    pub fn parse(template: &str) -> Result<Self, String> {
        if template.starts_with('/') || template.starts_with('\\') {
            return Err(format!("layout must be relative: {}", template));
        }
        if template.split(['/', '\\']).any(|part| part == "..") {
            return Err(format!("layout must not contain '..': {}", template));
        }

        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = template.chars();

        while let Some(c) = chars.next() {
            match c {
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for inner in chars.by_ref() {
                        if inner == '}' {
                            closed = true;
                            break;
                        }
                        name.push(inner);
                    }
                    if !closed {
                        return Err(format!("unclosed '{{' in layout: {}", template));
                    }
                    let field = Field::parse(&name)
                        .ok_or_else(|| format!("unknown placeholder {{{}}} in layout", name))?;
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Field(field));
                }
                '}' => return Err(format!("unmatched '}}' in layout: {}", template)),
                other => literal.push(other),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        if !segments.contains(&Segment::Field(Field::Stem)) {
            return Err(format!("layout must contain {{stem}}: {}", template));
        }

        Ok(Self {
            template: template.to_string(),
            segments,
        })
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Expected remainder path under `root`
    pub fn resolve(&self, root: &Path, model: &str, stem: &str, component: &str, ext: &str) -> PathBuf {
        let relative: String = self
            .segments
            .iter()
            .map(|segment| match segment {
                Segment::Literal(text) => text.as_str(),
                Segment::Field(Field::Model) => model,
                Segment::Field(Field::Stem) => stem,
                Segment::Field(Field::Component) => component,
                Segment::Field(Field::Ext) => ext,
            })
            .collect();
        root.join(relative)
    }
}

impl Default for RemainderLayout {
    fn default() -> Self {
        Self {
            template: DEFAULT_REMAINDER_LAYOUT.to_string(),
            segments: vec![
                Segment::Field(Field::Model),
                Segment::Literal("/".to_string()),
                Segment::Field(Field::Stem),
                Segment::Literal("/no_".to_string()),
                Segment::Field(Field::Component),
                Segment::Literal(".".to_string()),
                Segment::Field(Field::Ext),
            ],
        }
    }
}

impl fmt::Display for RemainderLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.template)
    }
}

/// The located remainder artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeparationResult {
    pub remainder: PathBuf,
}

/// Invokes the separation tool and locates its remainder output
pub struct SeparationStage<'a> {
    config: &'a SeparationConfig,
}

impl<'a> SeparationStage<'a> {
    pub fn new(config: &'a SeparationConfig) -> Self {
        Self { config }
    }

    /// Flag selecting the output encoding; the tool writes WAV by default
    fn format_flag(&self) -> Option<String> {
        match self.config.output_format.as_str() {
            "wav" => None,
            other => Some(format!("--{}", other)),
        }
    }

    /// Build the separation tool invocation for `audio`
    pub fn command(&self, audio: &Path, workspace: &Path) -> CommandSpec {
        let mut cmd = CommandSpec::new(&self.config.separator)
            .args(["-n", self.config.model.as_str()])
            .args(["--two-stems", self.config.component.as_str()]);

        if let Some(flag) = self.format_flag() {
            cmd = cmd.arg(flag);
        }

        cmd = cmd.arg("-o").arg(workspace).arg(audio);

        for (key, value) in SEPARATOR_ENV_DEFAULTS {
            if std::env::var_os(key).is_none() {
                cmd = cmd.env(key, value);
            }
        }

        cmd
    }

    /// Where the tool is expected to write the remainder for `audio`
    pub fn expected_remainder(&self, audio: &Path, workspace: &Path) -> PathBuf {
        let stem = audio
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        self.config.remainder_layout.resolve(
            workspace,
            &self.config.model,
            &stem,
            &self.config.component,
            &self.config.output_format,
        )
    }

    pub fn run(
        &self,
        runner: &dyn ProcessRunner,
        audio: &Path,
        workspace: &Workspace,
    ) -> PipelineResult<SeparationResult> {
        let cmd = self.command(audio, workspace.path());

        let result = runner
            .run(&cmd)
            .map_err(|e| PipelineError::separation(None, format!("Failed to run {}: {}", cmd.program, e)))?;

        if !result.success() {
            return Err(PipelineError::separation(result.exit_code, result.output));
        }

        let remainder = self.expected_remainder(audio, workspace.path());
        if !remainder.is_file() {
            tracing::error!(
                "{} exited successfully but {} is missing (layout {})",
                cmd.program,
                remainder.display(),
                self.config.remainder_layout
            );
            return Err(PipelineError::missing_artifact(remainder));
        }

        tracing::info!("Separated {} -> {}", audio.display(), remainder.display());
        Ok(SeparationResult { remainder })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout_matches_tool_convention() {
        let layout = RemainderLayout::default();
        let path = layout.resolve(Path::new("/ws"), "htdemucs", "song", "drums", "mp3");
        assert_eq!(path, PathBuf::from("/ws/htdemucs/song/no_drums.mp3"));
    }

    #[test]
    fn default_layout_equals_parsed_constant() {
        assert_eq!(
            RemainderLayout::default(),
            RemainderLayout::parse(DEFAULT_REMAINDER_LAYOUT).unwrap()
        );
    }

    #[test]
    fn placeholders_in_values_are_not_expanded() {
        let layout = RemainderLayout::default();
        let path = layout.resolve(Path::new("/ws"), "m", "{ext}", "bass", "wav");
        assert_eq!(path, PathBuf::from("/ws/m/{ext}/no_bass.wav"));
    }

    #[test]
    fn custom_flat_layout() {
        let layout = RemainderLayout::parse("separated/{stem}-no_{component}.{ext}").unwrap();
        let path = layout.resolve(Path::new("/ws"), "htdemucs", "take1", "vocals", "flac");
        assert_eq!(path, PathBuf::from("/ws/separated/take1-no_vocals.flac"));
    }

    #[test]
    fn rejects_bad_layouts() {
        assert!(RemainderLayout::parse("{model}/no_{component}.{ext}").is_err());
        assert!(RemainderLayout::parse("{model}/{stem}/{track}.mp3").is_err());
        assert!(RemainderLayout::parse("{model/{stem}").is_err());
        assert!(RemainderLayout::parse("{stem}}.mp3").is_err());
        assert!(RemainderLayout::parse("/abs/{stem}.mp3").is_err());
        assert!(RemainderLayout::parse("../{stem}.mp3").is_err());
    }

    #[test]
    fn command_requests_two_stem_compressed_output() {
        let config = SeparationConfig::new("/out");
        let stage = SeparationStage::new(&config);
        let cmd = stage.command(Path::new("/ws/song.wav"), Path::new("/ws"));

        assert_eq!(cmd.program, "demucs");
        assert_eq!(
            cmd.args_lossy(),
            vec!["-n", "htdemucs", "--two-stems", "drums", "--mp3", "-o", "/ws", "/ws/song.wav"]
        );
    }

    #[test]
    fn wav_output_omits_format_flag() {
        let mut config = SeparationConfig::new("/out");
        config.output_format = "wav".to_string();
        let stage = SeparationStage::new(&config);
        let cmd = stage.command(Path::new("/ws/a.wav"), Path::new("/ws"));

        assert!(!cmd.args_lossy().iter().any(|a| a == "--wav"));
        assert_eq!(
            stage.expected_remainder(Path::new("/ws/a.wav"), Path::new("/ws")),
            PathBuf::from("/ws/htdemucs/a/no_drums.wav")
        );
    }
}
