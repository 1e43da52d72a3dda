//! Counting and sizing of tracked objects in video.
//!
//! A scan samples every Nth frame of a video, asks a [`Detector`] for boxes
//! with track ids, and folds the results into per-frame counts, a few sample
//! sightings per track and a per-track *weight index* (mean box area, an
//! uncalibrated size proxy). Sampled frames are annotated and written out as
//! a video of their own.

pub mod aggregator;
pub mod annotator;
pub mod bbox;
pub mod config;
pub mod detection;
pub mod detector;
pub mod error;
pub mod frame;
pub mod pipeline;
pub mod replay;
pub mod report;
pub mod sampler;
pub mod track;
pub mod tracker;

#[cfg(feature = "video")]
pub mod video;

#[cfg(feature = "yolo")]
pub mod yolo;

#[cfg(feature = "server")]
pub mod server;

pub use aggregator::Aggregator;
pub use annotator::FrameSink;
pub use config::{AnalysisConfig, DetectionConfig};
pub use detection::{Detection, RawDetection, TrackId};
pub use detector::Detector;
pub use error::Error;
pub use frame::FrameObservation;
pub use replay::ReplayDetector;
pub use report::AnalysisReport;
pub use sampler::{FrameSampler, FrameSource, SampledFrame};
pub use track::TrackHistory;

#[cfg(feature = "video")]
pub use video::{analyze_video, VideoFileSource};
