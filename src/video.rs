use std::path::Path;

use opencv::{core::Mat, prelude::*, videoio};

use crate::annotator::AnnotatedVideoWriter;
use crate::config::AnalysisConfig;
use crate::detector::Detector;
use crate::error::Error;
use crate::pipeline;
use crate::report::AnalysisReport;
use crate::sampler::{FrameSampler, FrameSource};

/// Frames of a video file decoded with OpenCV. The capture is released when
/// the source is dropped.
pub struct VideoFileSource {
    cap: videoio::VideoCapture,
    fps: f64,
    frame_count: Option<usize>,
    size: (u32, u32),
}

impl VideoFileSource {
    pub fn open(path: &Path) -> Result<Self, Error> {
        if !path.is_file() {
            return Err(Error::SourceUnavailable(format!(
                "no such file: {}",
                path.display()
            )));
        }

        let filename = path.to_string_lossy();
        let cap = videoio::VideoCapture::from_file(&filename, videoio::CAP_ANY)
            .map_err(Error::source_unavailable)?;

        let opened = videoio::VideoCapture::is_opened(&cap).map_err(Error::source_unavailable)?;
        if !opened {
            return Err(Error::SourceUnavailable(format!(
                "cannot open video: {}",
                path.display()
            )));
        }

        let prop = |id| cap.get(id).map_err(Error::source_unavailable);

        let fps = prop(videoio::CAP_PROP_FPS)?;
        let width = prop(videoio::CAP_PROP_FRAME_WIDTH)?;
        let height = prop(videoio::CAP_PROP_FRAME_HEIGHT)?;
        let total = prop(videoio::CAP_PROP_FRAME_COUNT)?;

        let frame_count = if total > 0.0 {
            Some(total as usize)
        } else {
            None
        };

        tracing::debug!(
            path = %path.display(),
            fps,
            width,
            height,
            ?frame_count,
            "video opened"
        );

        Ok(Self {
            cap,
            fps,
            frame_count,
            size: (width as u32, height as u32),
        })
    }
}

impl FrameSource for VideoFileSource {
    type Frame = Mat;

    #[inline]
    fn fps(&self) -> f64 {
        self.fps
    }

    #[inline]
    fn frame_count(&self) -> Option<usize> {
        self.frame_count
    }

    #[inline]
    fn frame_size(&self) -> (u32, u32) {
        self.size
    }

    fn next_frame(&mut self) -> Result<Option<Mat>, Error> {
        let mut frame = Mat::default();

        if !self.cap.read(&mut frame).map_err(Error::source_unavailable)? {
            return Ok(None);
        }

        if frame.rows() == 0 || frame.cols() == 0 {
            return Ok(None);
        }

        Ok(Some(frame))
    }

    fn skip_frame(&mut self) -> Result<bool, Error> {
        self.cap.grab().map_err(Error::source_unavailable)
    }
}

impl Drop for VideoFileSource {
    fn drop(&mut self) {
        if let Err(err) = self.cap.release() {
            tracing::warn!(%err, "releasing video capture failed");
        }
    }
}

/// Runs a full scan over the video at `input`, writing the annotated copy to
/// [`AnalysisConfig::annotated_path`].
pub fn analyze_video<D: Detector<Mat>>(
    input: &Path,
    detector: D,
    config: &AnalysisConfig,
) -> Result<AnalysisReport, Error> {
    config.validate()?;

    let mut source = VideoFileSource::open(input)?;
    let sampler = FrameSampler::new(config.frame_stride, source.fps())?;

    std::fs::create_dir_all(&config.output_dir).map_err(|err| {
        Error::WriteFailure(format!(
            "cannot create {}: {}",
            config.output_dir.display(),
            err
        ))
    })?;

    let out_path = config.annotated_path(input);
    let writer = AnnotatedVideoWriter::create(&out_path, sampler.output_fps(), source.frame_size())?;

    pipeline::run(&mut source, detector, writer, config)
}
