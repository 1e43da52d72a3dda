use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use flockcount::server::{self, AppState, DEFAULT_BODY_LIMIT};
use flockcount::yolo::{YoloDetector, YoloDetectorConfig};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "flockcount-server", about = "HTTP service for video counting")]
struct Args {
    #[arg(long, default_value = "0.0.0.0:8000")]
    listen: SocketAddr,
    /// ONNX YOLO model, loaded once at startup
    #[arg(long, value_name = "PATH")]
    model: PathBuf,
    #[arg(long, default_value = "uploads")]
    uploads_dir: PathBuf,
    #[arg(long, default_value = "outputs")]
    output_dir: PathBuf,
    /// Maximum request body size in bytes
    #[arg(long, default_value_t = DEFAULT_BODY_LIMIT)]
    body_limit: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("flockcount=info".parse()?)
                .add_directive("tower_http=info".parse()?),
        )
        .with_target(false)
        .init();

    let args = Args::parse();

    let model = args.model.to_string_lossy().into_owned();
    let detector = tokio::task::spawn_blocking(move || {
        YoloDetector::load(&model, YoloDetectorConfig::default())
    })
    .await?
    .with_context(|| format!("Failed to load model {}", args.model.display()))?;

    tracing::info!(model = %args.model.display(), "model loaded");

    let state = AppState::new(Arc::new(detector), args.uploads_dir, args.output_dir);

    server::serve(args.listen, state, args.body_limit)
        .await
        .context("Server error")
}
