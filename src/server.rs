//! HTTP front end: upload a video, get the analysis report back.
//!
//! ## Endpoints
//! - `GET /health` - liveness check
//! - `POST /analyze_video` - multipart form with a `file` field and optional
//!   `fps_sample`, `conf_thresh`, `iou_thresh` text fields

use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use axum::{
    extract::{
        multipart::{Field, MultipartRejection},
        DefaultBodyLimit, Multipart, State,
    },
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use opencv::core::Mat;
use serde_derive::Serialize;
use tokio::io::AsyncWriteExt;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::AnalysisConfig;
use crate::detector::Detector;
use crate::error::Error;
use crate::report::AnalysisReport;
use crate::video::analyze_video;
use crate::yolo::{YoloDetector, YoloTracker};

pub const DEFAULT_BODY_LIMIT: usize = 512 * 1024 * 1024;

/// Builds the detector for one request. Tracking state must not leak
/// between scans, so every call returns a fresh instance.
pub type DetectorFactory = dyn Fn() -> Box<dyn Detector<Mat> + Send> + Send + Sync;

#[derive(Clone)]
pub struct AppState {
    detectors: Arc<DetectorFactory>,
    uploads_dir: PathBuf,
    output_dir: PathBuf,
}

impl AppState {
    /// Every request gets its own tracker around the shared model.
    pub fn new(detector: Arc<YoloDetector>, uploads_dir: PathBuf, output_dir: PathBuf) -> Self {
        Self::with_detectors(
            move || -> Box<dyn Detector<Mat> + Send> {
                Box::new(YoloTracker::new(detector.clone()))
            },
            uploads_dir,
            output_dir,
        )
    }

    pub fn with_detectors<F>(factory: F, uploads_dir: PathBuf, output_dir: PathBuf) -> Self
    where
        F: Fn() -> Box<dyn Detector<Mat> + Send> + Send + Sync + 'static,
    {
        Self {
            detectors: Arc::new(factory),
            uploads_dir,
            output_dir,
        }
    }
}

pub fn create_router(state: AppState, body_limit: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/analyze_video", post(analyze))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, state: AppState, body_limit: usize) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "listening");

    axum::serve(listener, create_router(state, body_limit))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(%err, "cannot listen for shutdown signal");
    }

    info!("shutting down");
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    message: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        message: "API is running",
    })
}

#[derive(Serialize, Debug, PartialEq)]
struct FailureResponse {
    error: String,
    status: &'static str,
}

#[derive(Debug)]
enum RequestError {
    BadRequest(String),
    Analysis(Error),
    Internal(String),
}

impl RequestError {
    fn status_code(&self) -> StatusCode {
        match self {
            RequestError::BadRequest(_) => StatusCode::BAD_REQUEST,
            RequestError::Analysis(Error::InvalidConfig(_)) => StatusCode::BAD_REQUEST,
            RequestError::Analysis(_) | RequestError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn bad_request<E: fmt::Display>(err: E) -> Self {
        RequestError::BadRequest(err.to_string())
    }
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestError::BadRequest(msg) | RequestError::Internal(msg) => f.write_str(msg),
            RequestError::Analysis(err) => err.fmt(f),
        }
    }
}

impl From<Error> for RequestError {
    fn from(err: Error) -> Self {
        RequestError::Analysis(err)
    }
}

impl From<std::io::Error> for RequestError {
    fn from(err: std::io::Error) -> Self {
        RequestError::Analysis(Error::Io(err))
    }
}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        let body = FailureResponse {
            error: self.to_string(),
            status: "failed",
        };

        (self.status_code(), Json(body)).into_response()
    }
}

/// Uploaded input on disk under a random name; deleted when dropped.
struct TempUpload {
    path: PathBuf,
}

impl TempUpload {
    fn new(dir: &Path) -> Self {
        Self {
            path: dir.join(format!("{}.mp4", Uuid::new_v4())),
        }
    }

    #[inline]
    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempUpload {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => warn!(path = %self.path.display(), %err, "cannot remove upload"),
        }
    }
}

async fn analyze(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let multipart = match multipart {
        Ok(multipart) => multipart,
        Err(rejection) => {
            warn!(%rejection, "rejected upload");
            return RequestError::bad_request(rejection).into_response();
        }
    };

    let upload = TempUpload::new(&state.uploads_dir);

    match process(&state, &upload, multipart).await {
        Ok(report) => {
            info!(
                frames = report.frames_processed(),
                tracks = report.unique_tracks(),
                "analysis finished"
            );
            Json(report).into_response()
        }
        Err(err) => {
            error!(%err, "analysis failed");
            err.into_response()
        }
    }
}

async fn process(
    state: &AppState,
    upload: &TempUpload,
    mut multipart: Multipart,
) -> Result<AnalysisReport, RequestError> {
    tokio::fs::create_dir_all(&state.uploads_dir).await?;

    let mut config = AnalysisConfig {
        output_dir: state.output_dir.clone(),
        ..Default::default()
    };
    let mut received = false;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(RequestError::bad_request)?
    {
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            "file" => {
                let mut file = tokio::fs::File::create(upload.path()).await?;

                while let Some(chunk) = field.chunk().await.map_err(RequestError::bad_request)? {
                    file.write_all(&chunk).await?;
                }

                file.flush().await?;
                received = true;
            }
            "fps_sample" => config.frame_stride = parse_field(field, "fps_sample").await?,
            "conf_thresh" => config.confidence_threshold = parse_field(field, "conf_thresh").await?,
            "iou_thresh" => config.overlap_threshold = parse_field(field, "iou_thresh").await?,
            _ => {}
        }
    }

    if !received {
        return Err(RequestError::BadRequest("missing `file` field".into()));
    }

    config.validate()?;

    let detector = (state.detectors)();
    let input = upload.path().to_path_buf();

    let report = tokio::task::spawn_blocking(move || analyze_video(&input, detector, &config))
    .await
    .map_err(|err| RequestError::Internal(format!("analysis task failed: {}", err)))??;

    Ok(report)
}

async fn parse_field<T>(field: Field<'_>, name: &str) -> Result<T, RequestError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    let text = field.text().await.map_err(RequestError::bad_request)?;

    text.trim()
        .parse()
        .map_err(|err| RequestError::BadRequest(format!("invalid `{}`: {}", name, err)))
}
