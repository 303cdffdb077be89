//! Status HTTP server
//!
//! Lists active compilations and accepts submissions over HTTP. Workers
//! started here are detached; their progress is only visible through the
//! registry until they finish.

use axum::{
    extract::{Path as UrlPath, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::registry::JobRecord;
use crate::stitcher::{by_file_name, default_output_path, StitchRequest, Stitcher, SubmitError};

/// Errors that can occur when running the status server
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind to address: {0}")]
    BindError(#[from] std::io::Error),
}

/// Input ordering selectable over HTTP
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputOrder {
    /// Oldest modification time first
    #[default]
    Modified,
    /// File name, lexicographic
    Name,
}

/// Body of POST /jobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitBody {
    pub name: String,
    pub folder: PathBuf,
    #[serde(default)]
    pub output: Option<PathBuf>,
    #[serde(default)]
    pub order: InputOrder,
    #[serde(default)]
    pub cleanup_sources: Option<bool>,
}

/// Response to an accepted submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub output: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

fn error_response(status: StatusCode, message: String) -> Response {
    (status, Json(ErrorBody { error: message })).into_response()
}

impl IntoResponse for SubmitError {
    fn into_response(self) -> Response {
        let status = match &self {
            SubmitError::Duplicate(_) => StatusCode::CONFLICT,
            SubmitError::Io { .. } | SubmitError::NoRuntime => StatusCode::INTERNAL_SERVER_ERROR,
            SubmitError::InvalidName
            | SubmitError::FolderNotFound(_)
            | SubmitError::NotADirectory(_)
            | SubmitError::NoMediaFiles(_) => StatusCode::UNPROCESSABLE_ENTITY,
        };
        error_response(status, self.to_string())
    }
}

/// Handler for GET /jobs
async fn list_jobs(State(stitcher): State<Arc<Stitcher>>) -> Json<Vec<JobRecord>> {
    Json(stitcher.registry().snapshot())
}

/// Handler for GET /jobs/:name
async fn get_job(
    State(stitcher): State<Arc<Stitcher>>,
    UrlPath(name): UrlPath<String>,
) -> Response {
    match stitcher.registry().get(&name) {
        Some(record) => Json(record).into_response(),
        None => error_response(
            StatusCode::NOT_FOUND,
            format!("No active compilation named '{}'", name),
        ),
    }
}

/// Handler for POST /jobs
async fn submit_job(
    State(stitcher): State<Arc<Stitcher>>,
    Json(body): Json<SubmitBody>,
) -> Result<(StatusCode, Json<SubmitResponse>), SubmitError> {
    let output = body.output.unwrap_or_else(|| {
        default_output_path(
            &body.folder,
            &body.name,
            &stitcher.config().stitch.media_extension,
        )
    });

    let mut request = StitchRequest::new(body.name, body.folder, output)
        .cleanup_sources(body.cleanup_sources.unwrap_or(true));
    if body.order == InputOrder::Name {
        request = request.with_comparator(by_file_name());
    }

    let submitted = stitcher.submit(request)?;
    info!(
        name = submitted.handle.name(),
        output = %submitted.output.display(),
        "Accepted stitch request"
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            output: submitted.output,
        }),
    ))
}

/// Creates the axum Router with the job endpoints
pub fn create_status_router(stitcher: Arc<Stitcher>) -> Router {
    Router::new()
        .route("/jobs", get(list_jobs).post(submit_job))
        .route("/jobs/:name", get(get_job))
        .with_state(stitcher)
}

/// Runs the status HTTP server
///
/// # Arguments
/// * `stitcher` - Shared stitcher that accepts submissions
/// * `addr` - Address to bind
///
/// # Returns
/// * `Ok(())` if server shuts down gracefully
/// * `Err(ServerError)` if server fails to start
pub async fn run_status_server(stitcher: Arc<Stitcher>, addr: SocketAddr) -> Result<(), ServerError> {
    let app = create_status_router(stitcher);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Status server listening");
    axum::serve(listener, app).await?;

    Ok(())
}
