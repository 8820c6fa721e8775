//! Upload endpoints
//!
//! Both routes accept a multipart form with one or more files under the
//! `files` field. `/upload` reports through flash messages and redirects to
//! the status page; `/api/separate` returns the batch outcome as JSON.

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    response::Redirect,
    routing::post,
    Json, Router,
};
use tracing::{error, info};

use crate::api::flash::FlashStore;
use crate::pipeline::{BatchOutcome, FailureKind, FileResult, UploadedFile};
use crate::{ApiError, ApiResult, AppState};

/// Multipart field carrying the uploaded files
pub const UPLOAD_FIELD: &str = "files";

/// Flash text when a submission carries no named files
pub const NO_FILES_MESSAGE: &str = "No files selected.";

/// Collect every file under [`UPLOAD_FIELD`]
async fn read_uploads(mut multipart: Multipart) -> ApiResult<Vec<UploadedFile>> {
    let mut files = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await?;
        files.push(UploadedFile::new(filename, bytes));
    }

    Ok(files)
}

fn has_named_file(files: &[UploadedFile]) -> bool {
    files.iter().any(|f| !f.filename.trim().is_empty())
}

/// Run a batch on the blocking pool and record diagnostics
async fn run_batch(state: &AppState, files: Vec<UploadedFile>) -> ApiResult<BatchOutcome> {
    let coordinator = Arc::clone(&state.coordinator);

    let outcome = tokio::task::spawn_blocking(move || coordinator.process_batch(files))
        .await
        .map_err(|e| {
            error!("Batch processing aborted: {}", e);
            ApiError::Internal(format!("batch processing aborted: {}", e))
        })?;

    let last_environment_failure = outcome.files.iter().rev().find_map(|f| match &f.result {
        FileResult::Failure {
            kind: FailureKind::Environment,
            message,
        } => Some(message.clone()),
        _ => None,
    });
    if let Some(message) = last_environment_failure {
        *state.last_error.write().await = Some(message);
    }

    Ok(outcome)
}

async fn flash_outcome(flash: &FlashStore, outcome: &BatchOutcome) {
    if outcome.successes > 0 {
        flash
            .ok(format!(
                "{} file(s) processed successfully. Output: {}",
                outcome.successes,
                outcome.output_dir.display()
            ))
            .await;
    }
    for message in outcome.failure_messages() {
        flash.err(message).await;
    }
}

/// POST /upload
///
/// Form submission from the status page. Always redirects back to `/`.
pub async fn upload(State(state): State<AppState>, multipart: Multipart) -> Redirect {
    let files = match read_uploads(multipart).await {
        Ok(files) => files,
        Err(e) => {
            state.flash.err(e.to_string()).await;
            return Redirect::to("/");
        }
    };

    if !has_named_file(&files) {
        state.flash.err(NO_FILES_MESSAGE).await;
        return Redirect::to("/");
    }

    info!("Upload received: {} file(s)", files.len());
    match run_batch(&state, files).await {
        Ok(outcome) => flash_outcome(&state.flash, &outcome).await,
        Err(e) => state.flash.err(e.to_string()).await,
    }

    Redirect::to("/")
}

/// POST /api/separate
///
/// Same processing as `/upload`, answering with the batch outcome.
pub async fn separate(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Json<BatchOutcome>> {
    let files = read_uploads(multipart).await?;

    if !has_named_file(&files) {
        return Err(ApiError::BadRequest(NO_FILES_MESSAGE.to_string()));
    }

    let outcome = run_batch(&state, files).await?;
    Ok(Json(outcome))
}

/// Build upload routes with the given request body limit
pub fn upload_routes(limit_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/upload", post(upload))
        .route("/api/separate", post(separate))
        .layer(DefaultBodyLimit::max(limit_bytes))
}
