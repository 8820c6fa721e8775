//! drumsep-web - Stem removal web service
//!
//! Accepts uploaded audio/video files, removes one separated component
//! (drums by default) with an external source-separation tool, and writes
//! `<name>_no_<component>.<ext>` into the output folder.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use drumsep_common::config::{
    ensure_directory_exists, load_toml_config, resolve_output_dir, CompiledDefaults,
};
use drumsep_web::pipeline::{BatchCoordinator, SystemRunner};
use drumsep_web::{build_router, upload_limit_from_mb, AppState, SeparationConfig};

/// Command-line arguments for drumsep-web
#[derive(Parser, Debug)]
#[command(name = "drumsep-web")]
#[command(about = "Removes a separated stem from uploaded media files")]
#[command(version)]
struct Args {
    /// Address to listen on
    #[arg(short, long, env = "DRUMSEP_BIND")]
    bind: Option<String>,

    /// Folder receiving processed files
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Separation model identifier
    #[arg(long, env = "DRUMSEP_MODEL")]
    model: Option<String>,

    /// Component to remove
    #[arg(long, env = "DRUMSEP_COMPONENT")]
    component: Option<String>,

    /// Files processed concurrently within one upload
    #[arg(long, env = "DRUMSEP_WORKERS")]
    workers: Option<usize>,

    /// Open the output folder after a successful upload
    #[arg(long)]
    reveal_output: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let toml_config = load_toml_config(args.config.as_deref());
    let defaults = CompiledDefaults::for_current_platform();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| toml_config.logging.level.as_str().into()),
        )
        .init();

    info!(
        "Starting drumsep-web v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    // Output folder is resolved once and reused for every batch
    let output_dir = resolve_output_dir(args.output_dir.as_deref(), &toml_config);
    ensure_directory_exists(&output_dir)
        .with_context(|| format!("Failed to prepare output folder {}", output_dir.display()))?;
    info!("Output folder: {}", output_dir.display());

    let mut config = SeparationConfig::from_toml(&output_dir, &toml_config)
        .context("Invalid configuration")?;
    if let Some(model) = args.model {
        config.model = model;
    }
    if let Some(component) = args.component {
        config.component = component;
    }
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    config.reveal_output |= args.reveal_output;
    config.validate().context("Invalid configuration")?;

    info!(
        "Removing '{}' with model '{}' via {} (transcoder: {}, workers: {})",
        config.component, config.model, config.separator, config.transcoder, config.workers
    );
    info!("Remainder layout: {}", config.remainder_layout);

    let upload_limit_mb = toml_config.max_upload_mb.unwrap_or(defaults.max_upload_mb);
    let coordinator = BatchCoordinator::new(config, Arc::new(SystemRunner::new()));
    let state =
        AppState::new(coordinator).with_upload_limit(upload_limit_from_mb(upload_limit_mb));
    let app = build_router(state);

    let bind = args
        .bind
        .or(toml_config.bind)
        .unwrap_or(defaults.bind);
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    info!("Listening on http://{}", bind);
    info!("Health check: http://{}/health", bind);

    axum::serve(listener, app).await?;

    Ok(())
}
