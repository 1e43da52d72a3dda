use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use flockcount::replay::Recording;
use flockcount::{analyze_video, AnalysisConfig, AnalysisReport, Detector, ReplayDetector};
use opencv::core::Mat;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "flockcount", about = "Count and size tracked objects in a video")]
struct Args {
    /// Input video
    video: PathBuf,
    /// JSON file with analysis settings; flags below override it
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Process every Nth frame
    #[arg(long)]
    frame_stride: Option<usize>,
    #[arg(long)]
    conf_thresh: Option<f32>,
    #[arg(long)]
    iou_thresh: Option<f32>,
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,
    /// Write the report here instead of stdout
    #[arg(long, value_name = "PATH")]
    json: Option<PathBuf>,
    /// Play detections back from a `<ordinal>: <json>` file instead of running a model
    #[arg(long, value_name = "PATH")]
    replay: Option<PathBuf>,
    /// ONNX YOLO model
    #[cfg(feature = "yolo")]
    #[arg(long, value_name = "PATH", conflicts_with = "replay")]
    model: Option<PathBuf>,
    /// Save every frame's detections in the replay format
    #[arg(long, value_name = "PATH")]
    record: Option<PathBuf>,
}

impl Args {
    fn analysis_config(&self) -> Result<AnalysisConfig> {
        let mut config = match &self.config {
            Some(path) => AnalysisConfig::from_json_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => AnalysisConfig::default(),
        };

        if let Some(stride) = self.frame_stride {
            config.frame_stride = stride;
        }
        if let Some(conf) = self.conf_thresh {
            config.confidence_threshold = conf;
        }
        if let Some(iou) = self.iou_thresh {
            config.overlap_threshold = iou;
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }

        config.validate().context("Invalid analysis settings")?;

        Ok(config)
    }

    fn detector(&self) -> Result<Box<dyn Detector<Mat>>> {
        if let Some(path) = &self.replay {
            let replay = ReplayDetector::open(path)
                .with_context(|| format!("Failed to load detections {}", path.display()))?;
            tracing::info!(frames = replay.len(), "replaying detections");

            return Ok(Box::new(replay));
        }

        if let Some(detector) = self.model_detector()? {
            return Ok(detector);
        }

        bail!("no detector: pass --replay or --model")
    }

    #[cfg(feature = "yolo")]
    fn model_detector(&self) -> Result<Option<Box<dyn Detector<Mat>>>> {
        use flockcount::yolo::{YoloDetector, YoloDetectorConfig, YoloTracker};

        let Some(path) = &self.model else {
            return Ok(None);
        };

        let detector = YoloDetector::load(&path.to_string_lossy(), YoloDetectorConfig::default())
            .with_context(|| format!("Failed to load model {}", path.display()))?;
        tracing::info!(model = %path.display(), "model loaded");

        Ok(Some(Box::new(YoloTracker::new(std::sync::Arc::new(detector)))))
    }

    #[cfg(not(feature = "yolo"))]
    fn model_detector(&self) -> Result<Option<Box<dyn Detector<Mat>>>> {
        Ok(None)
    }
}

fn print_summary(report: &AnalysisReport) {
    tracing::info!(frames = report.frames_processed(), "frames processed");

    if let Some(summary) = report.count_summary() {
        tracing::info!(
            min = summary.min,
            max = summary.max,
            avg = summary.mean,
            "count per frame"
        );
    }

    tracing::info!(tracks = report.unique_tracks(), "unique tracks");

    if let Some((lo, hi)) = report.weight_index_range() {
        tracing::info!(min = lo, max = hi, "weight index range");
    }

    tracing::info!(
        path = %report.artifacts.annotated_video_path,
        "annotated video written"
    );
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("flockcount=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = args.analysis_config()?;
    let detector = args.detector()?;

    let report = match &args.record {
        Some(path) => {
            let out = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            let mut recording = Recording::new(detector, BufWriter::new(out));

            let report = analyze_video(&args.video, &mut recording, &config)
                .with_context(|| format!("Failed to analyze {}", args.video.display()))?;

            recording
                .flush()
                .with_context(|| format!("Failed to write {}", path.display()))?;
            tracing::info!(path = %path.display(), "detections recorded");

            report
        }
        None => analyze_video(&args.video, detector, &config)
            .with_context(|| format!("Failed to analyze {}", args.video.display()))?,
    };

    print_summary(&report);

    let json = serde_json::to_string_pretty(&report)?;
    match &args.json {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            tracing::info!(path = %path.display(), "report saved");
        }
        None => println!("{}", json),
    }

    Ok(())
}
