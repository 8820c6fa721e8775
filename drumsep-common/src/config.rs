//! Configuration loading and output folder resolution
//!
//! Settings are resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing or malformed TOML file never stops startup: it is logged as a
//! warning and the compiled defaults are used instead.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Directory name used under the platform config directory
pub const CONFIG_DIR_NAME: &str = "drumsep";

/// Environment variable overriding the output folder
pub const ENV_OUTPUT_DIR: &str = "DRUMSEP_OUTPUT_DIR";

/// Environment variable pointing at an explicit TOML config file
pub const ENV_CONFIG_FILE: &str = "DRUMSEP_CONFIG";

/// Logging section of the TOML file
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default tracing filter when `RUST_LOG` is not set
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Contents of `config.toml`
///
/// Every field is optional; absent fields fall through to environment
/// variables or compiled defaults.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TomlConfig {
    /// Folder receiving committed artifacts
    pub output_dir: Option<PathBuf>,
    /// Parent folder for workspaces and materialized uploads
    pub scratch_dir: Option<PathBuf>,
    /// Separation model identifier (e.g. "htdemucs")
    pub model: Option<String>,
    /// Component removed from the output (e.g. "drums")
    pub component: Option<String>,
    /// Encoding of the separation tool output (e.g. "mp3")
    pub output_format: Option<String>,
    /// Transcoder program name or path
    pub transcoder: Option<String>,
    /// Separation tool program name or path
    pub separator: Option<String>,
    /// Location of the remainder artifact inside the workspace
    pub remainder_layout: Option<String>,
    /// Maximum characters of tool output kept per failure message
    pub max_diagnostic_len: Option<usize>,
    /// Files processed concurrently within one batch
    pub workers: Option<usize>,
    /// Open the output folder after a successful batch
    pub reveal_output: Option<bool>,
    /// HTTP listen address
    pub bind: Option<String>,
    /// Request body limit for upload routes, in megabytes
    pub max_upload_mb: Option<usize>,
    /// Accepted input extensions (without leading dot)
    pub allowed_extensions: Option<Vec<String>>,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Compiled defaults used when no other source provides a value
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub output_dir: PathBuf,
    pub model: String,
    pub component: String,
    pub output_format: String,
    pub transcoder: String,
    pub separator: String,
    pub max_diagnostic_len: usize,
    pub workers: usize,
    pub bind: String,
    pub max_upload_mb: usize,
}

impl CompiledDefaults {
    /// Defaults for the platform this binary was built for
    pub fn for_current_platform() -> Self {
        Self {
            output_dir: default_output_dir(),
            model: "htdemucs".to_string(),
            component: "drums".to_string(),
            output_format: "mp3".to_string(),
            transcoder: "ffmpeg".to_string(),
            separator: "demucs".to_string(),
            max_diagnostic_len: 1200,
            workers: 1,
            bind: "127.0.0.1:5000".to_string(),
            max_upload_mb: 1024,
        }
    }
}

/// `<home>/Desktop/DrumExports`, or a relative folder when no home exists
fn default_output_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join("Desktop").join("DrumExports"))
        .unwrap_or_else(|| PathBuf::from("./DrumExports"))
}

/// Locate the TOML config file, if any
///
/// `DRUMSEP_CONFIG` wins; otherwise the per-user config directory is tried,
/// then `/etc/drumsep/config.toml` on Linux.
pub fn default_config_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(ENV_CONFIG_FILE) {
        return Some(PathBuf::from(path));
    }

    let user_config = dirs::config_dir().map(|d| d.join(CONFIG_DIR_NAME).join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/drumsep/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Parse TOML text into a [`TomlConfig`]
pub fn parse_toml_config(content: &str) -> Result<TomlConfig> {
    toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
}

/// Load the TOML config from `path`, or from [`default_config_path`] when
/// `path` is `None`
///
/// Never fails: unreadable or malformed files produce a warning and defaults.
pub fn load_toml_config(path: Option<&Path>) -> TomlConfig {
    let path = match path.map(Path::to_path_buf).or_else(default_config_path) {
        Some(p) => p,
        None => {
            info!("No config file found, using defaults");
            return TomlConfig::default();
        }
    };

    let content = match std::fs::read_to_string(&path) {
        Ok(c) => c,
        Err(e) => {
            warn!("Could not read config file {}: {}. Using defaults.", path.display(), e);
            return TomlConfig::default();
        }
    };

    match parse_toml_config(&content) {
        Ok(config) => {
            info!("Loaded config from {}", path.display());
            config
        }
        Err(e) => {
            warn!("{} ({}). Using defaults.", e, path.display());
            TomlConfig::default()
        }
    }
}

/// Resolve the output folder
///
/// Priority: CLI argument → `DRUMSEP_OUTPUT_DIR` → TOML `output_dir` →
/// `<home>/Desktop/DrumExports`.
pub fn resolve_output_dir(cli_arg: Option<&Path>, toml_config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Some(path) = std::env::var_os(ENV_OUTPUT_DIR) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &toml_config.output_dir {
        return path.clone();
    }

    CompiledDefaults::for_current_platform().output_dir
}

/// Create `path` (and parents) if missing
///
/// Fails when `path` exists but is not a directory.
pub fn ensure_directory_exists(path: &Path) -> Result<()> {
    if path.exists() {
        if !path.is_dir() {
            return Err(Error::Config(format!(
                "{} exists but is not a directory",
                path.display()
            )));
        }
        return Ok(());
    }

    std::fs::create_dir_all(path)?;
    info!("Created output directory: {}", path.display());
    Ok(())
}
