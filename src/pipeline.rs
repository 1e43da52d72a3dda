use tracing::{debug, info};

use crate::aggregator::Aggregator;
use crate::annotator::FrameSink;
use crate::config::AnalysisConfig;
use crate::detection::normalize;
use crate::detector::Detector;
use crate::error::Error;
use crate::frame::FrameObservation;
use crate::report::AnalysisReport;
use crate::sampler::{FrameSampler, FrameSource};

/// Scans `source` to the end: every selected frame is detected, aggregated
/// and handed to `sink`, in that order.
///
/// Any failure aborts the scan and the partial state is dropped; there is no
/// partial report.
pub fn run<S, D, W>(
    source: &mut S,
    mut detector: D,
    mut sink: W,
    config: &AnalysisConfig,
) -> Result<AnalysisReport, Error>
where
    S: FrameSource,
    D: Detector<S::Frame>,
    W: FrameSink<S::Frame>,
{
    config.validate()?;

    let sampler = FrameSampler::new(config.frame_stride, source.fps())?;
    let det_config = config.detection();

    info!(
        fps = sampler.fps(),
        frames = ?source.frame_count(),
        stride = sampler.stride(),
        expected = ?source.frame_count().map(|n| sampler.expected_samples(n)),
        "scan started"
    );

    let mut aggregator = Aggregator::new();

    for frame in sampler.sample(source) {
        let mut frame = frame?;

        let raw = detector
            .detect(&frame, &det_config)
            .map_err(Error::into_detection_failure)?;

        let obs = FrameObservation::new(frame.timestamp, normalize(raw));
        aggregator.update(&obs);

        debug!(
            ordinal = frame.ordinal,
            timestamp = frame.timestamp,
            count = obs.count(),
            "frame aggregated"
        );

        sink.write(&mut frame.image, &obs)?;
    }

    sink.finish()?;

    info!(
        frames = aggregator.frames(),
        tracks = aggregator.tracks().count(),
        "scan finished"
    );

    Ok(aggregator.into_report(sink.artifact_path()))
}
