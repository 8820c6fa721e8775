//! Separation service configuration
//!
//! Everything the pipeline needs is carried by [`SeparationConfig`], built
//! once at startup and handed to the batch coordinator. Nothing in the
//! pipeline reads process-wide state.

use std::path::PathBuf;

use drumsep_common::config::{CompiledDefaults, TomlConfig};
use drumsep_common::{Error, Result};

use crate::pipeline::media::MediaExtension;
use crate::pipeline::separate::RemainderLayout;

/// Output encodings the separation tool can write
pub const SUPPORTED_OUTPUT_FORMATS: [&str; 3] = ["mp3", "flac", "wav"];

#[derive(Debug, Clone)]
pub struct SeparationConfig {
    /// Folder receiving committed artifacts
    pub output_dir: PathBuf,
    /// Parent folder for workspaces and materialized uploads; system temp
    /// directory when `None`
    pub scratch_dir: Option<PathBuf>,
    /// Separation model identifier
    pub model: String,
    /// Component removed from the output
    pub component: String,
    /// Separation tool output encoding, also the committed file extension
    pub output_format: String,
    /// Transcoder program
    pub transcoder: String,
    /// Separation tool program
    pub separator: String,
    /// Location of the remainder file inside a workspace
    pub remainder_layout: RemainderLayout,
    /// Accepted input types
    pub allowed_extensions: Vec<MediaExtension>,
    /// Maximum characters of diagnostic text per failure message
    pub max_diagnostic_len: usize,
    /// Files processed concurrently within one batch
    pub workers: usize,
    /// Ask the desktop to open the output folder after a successful batch
    pub reveal_output: bool,
}

impl SeparationConfig {
    /// Compiled defaults with the given output folder
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        let defaults = CompiledDefaults::for_current_platform();
        Self {
            output_dir: output_dir.into(),
            scratch_dir: None,
            model: defaults.model,
            component: defaults.component,
            output_format: defaults.output_format,
            transcoder: defaults.transcoder,
            separator: defaults.separator,
            remainder_layout: RemainderLayout::default(),
            allowed_extensions: MediaExtension::ALL.to_vec(),
            max_diagnostic_len: defaults.max_diagnostic_len,
            workers: defaults.workers,
            reveal_output: false,
        }
    }

    /// Apply TOML values over the compiled defaults
    pub fn from_toml(output_dir: impl Into<PathBuf>, toml: &TomlConfig) -> Result<Self> {
        let mut config = Self::new(output_dir);
        config.scratch_dir = toml.scratch_dir.clone();

        if let Some(model) = &toml.model {
            config.model = model.clone();
        }
        if let Some(component) = &toml.component {
            config.component = component.clone();
        }
        if let Some(format) = &toml.output_format {
            config.output_format = format.to_ascii_lowercase();
        }
        if let Some(transcoder) = &toml.transcoder {
            config.transcoder = transcoder.clone();
        }
        if let Some(separator) = &toml.separator {
            config.separator = separator.clone();
        }
        if let Some(layout) = &toml.remainder_layout {
            config.remainder_layout = RemainderLayout::parse(layout)
                .map_err(|e| Error::Config(format!("remainder_layout: {}", e)))?;
        }
        if let Some(extensions) = &toml.allowed_extensions {
            config.allowed_extensions = extensions
                .iter()
                .map(|ext| ext.parse::<MediaExtension>().map_err(Error::Config))
                .collect::<Result<Vec<_>>>()?;
        }
        if let Some(len) = toml.max_diagnostic_len {
            config.max_diagnostic_len = len;
        }
        if let Some(workers) = toml.workers {
            config.workers = workers;
        }
        if let Some(reveal) = toml.reveal_output {
            config.reveal_output = reveal;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_remainder_layout(mut self, layout: RemainderLayout) -> Self {
        self.remainder_layout = layout;
        self
    }

    pub fn with_allowed_extensions(mut self, extensions: Vec<MediaExtension>) -> Self {
        self.allowed_extensions = extensions;
        self
    }

    pub fn is_allowed(&self, extension: MediaExtension) -> bool {
        self.allowed_extensions.contains(&extension)
    }

    /// Check invariants that cannot be expressed in the types
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(Error::Config("model must not be empty".to_string()));
        }
        if self.component.trim().is_empty() {
            return Err(Error::Config("component must not be empty".to_string()));
        }
        if !SUPPORTED_OUTPUT_FORMATS.contains(&self.output_format.as_str()) {
            return Err(Error::Config(format!(
                "output_format must be one of {}, got '{}'",
                SUPPORTED_OUTPUT_FORMATS.join(", "),
                self.output_format
            )));
        }
        if self.transcoder.trim().is_empty() || self.separator.trim().is_empty() {
            return Err(Error::Config("tool programs must not be empty".to_string()));
        }
        if self.allowed_extensions.is_empty() {
            return Err(Error::Config("allowed_extensions must not be empty".to_string()));
        }
        if self.max_diagnostic_len == 0 {
            return Err(Error::Config("max_diagnostic_len must be positive".to_string()));
        }
        if self.workers == 0 {
            return Err(Error::Config("workers must be at least 1".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = SeparationConfig::new("/out");
        config.validate().unwrap();
        assert_eq!(config.allowed_extensions.len(), 9);
        assert_eq!(config.remainder_layout.template(), "{model}/{stem}/no_{component}.{ext}");
    }

    #[test]
    fn toml_overrides_defaults() {
        let toml = TomlConfig {
            model: Some("mdx_extra".to_string()),
            component: Some("vocals".to_string()),
            output_format: Some("FLAC".to_string()),
            allowed_extensions: Some(vec!["wav".to_string(), ".MP3".to_string()]),
            workers: Some(4),
            scratch_dir: Some(PathBuf::from("/scratch")),
            ..Default::default()
        };

        let config = SeparationConfig::from_toml("/out", &toml).unwrap();
        assert_eq!(config.model, "mdx_extra");
        assert_eq!(config.component, "vocals");
        assert_eq!(config.output_format, "flac");
        assert_eq!(
            config.allowed_extensions,
            vec![MediaExtension::Wav, MediaExtension::Mp3]
        );
        assert_eq!(config.workers, 4);
        assert_eq!(config.scratch_dir, Some(PathBuf::from("/scratch")));
    }

    #[test]
    fn rejects_invalid_values() {
        let bad_layout = TomlConfig {
            remainder_layout: Some("{model}/out.mp3".to_string()),
            ..Default::default()
        };
        assert!(SeparationConfig::from_toml("/out", &bad_layout).is_err());

        let bad_ext = TomlConfig {
            allowed_extensions: Some(vec!["exe".to_string()]),
            ..Default::default()
        };
        assert!(SeparationConfig::from_toml("/out", &bad_ext).is_err());

        let zero_workers = TomlConfig {
            workers: Some(0),
            ..Default::default()
        };
        assert!(SeparationConfig::from_toml("/out", &zero_workers).is_err());

        let bad_format = TomlConfig {
            output_format: Some("ogg".to_string()),
            ..Default::default()
        };
        assert!(SeparationConfig::from_toml("/out", &bad_format).is_err());
    }
}
