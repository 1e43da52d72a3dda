use crate::error::Error;
use crate::frame::FrameObservation;

/// Receives every sampled frame together with what was found on it.
pub trait FrameSink<F> {
    fn write(&mut self, frame: &mut F, observation: &FrameObservation) -> Result<(), Error>;

    /// Flushes and closes the output. Called once after the last frame.
    fn finish(&mut self) -> Result<(), Error>;

    /// Where the output ends up, as reported to callers.
    fn artifact_path(&self) -> String;
}

impl<F, S: FrameSink<F> + ?Sized> FrameSink<F> for &mut S {
    #[inline]
    fn write(&mut self, frame: &mut F, observation: &FrameObservation) -> Result<(), Error> {
        (**self).write(frame, observation)
    }

    #[inline]
    fn finish(&mut self) -> Result<(), Error> {
        (**self).finish()
    }

    #[inline]
    fn artifact_path(&self) -> String {
        (**self).artifact_path()
    }
}

#[cfg(feature = "video")]
pub use self::video_sink::{annotate, AnnotatedVideoWriter};

#[cfg(feature = "video")]
mod video_sink {
    use std::path::{Path, PathBuf};

    use opencv::{
        core::{self, Mat},
        imgproc,
        prelude::*,
        videoio,
    };

    use super::FrameSink;
    use crate::error::Error;
    use crate::frame::FrameObservation;

    /// Draws boxes, track labels and the frame count onto `frame`.
    pub fn annotate(frame: &mut Mat, obs: &FrameObservation) -> opencv::Result<()> {
        let green = core::Scalar::new(0.0, 255.0, 0.0, 0.0);

        for det in obs.iter() {
            let bbox = det.bbox.as_ltwh();
            let rect = core::Rect::new(
                bbox.left() as i32,
                bbox.top() as i32,
                bbox.width() as i32,
                bbox.height() as i32,
            );

            imgproc::rectangle(frame, rect, green, 2, imgproc::LINE_8, 0)?;

            imgproc::put_text(
                frame,
                &det.track_id.to_string(),
                core::Point::new(rect.x, rect.y - 5),
                imgproc::FONT_HERSHEY_SIMPLEX,
                0.5,
                green,
                1,
                imgproc::LINE_8,
                false,
            )?;
        }

        imgproc::put_text(
            frame,
            &format!("Count: {}", obs.count()),
            core::Point::new(20, 40),
            imgproc::FONT_HERSHEY_SIMPLEX,
            1.0,
            core::Scalar::new(0.0, 0.0, 255.0, 0.0),
            2,
            imgproc::LINE_8,
            false,
        )?;

        Ok(())
    }

    /// Annotates frames and appends them to an mp4 file. The file is released
    /// on [`FrameSink::finish`] or, failing that, on drop.
    pub struct AnnotatedVideoWriter {
        writer: Option<videoio::VideoWriter>,
        size: (i32, i32),
        out_file: PathBuf,
    }

    impl AnnotatedVideoWriter {
        pub fn create(out_file: &Path, fps: f64, size: (u32, u32)) -> Result<Self, Error> {
            let size = (size.0 as i32, size.1 as i32);
            let fourcc = videoio::VideoWriter::fourcc(b'm' as _, b'p' as _, b'4' as _, b'v' as _)
                .map_err(Error::write)?;

            let filename = out_file.to_string_lossy();
            let writer = videoio::VideoWriter::new(
                &filename,
                fourcc,
                fps,
                core::Size::new(size.0, size.1),
                true,
            )
            .map_err(Error::write)?;

            if !writer.is_opened().map_err(Error::write)? {
                return Err(Error::WriteFailure(format!(
                    "cannot open {} for writing",
                    out_file.display()
                )));
            }

            tracing::debug!(path = %out_file.display(), fps, ?size, "annotated video opened");

            Ok(Self {
                writer: Some(writer),
                size,
                out_file: out_file.to_path_buf(),
            })
        }

        pub fn release(&mut self) -> Result<(), Error> {
            if let Some(mut w) = self.writer.take() {
                w.release().map_err(Error::write)?;
            }

            Ok(())
        }
    }

    impl FrameSink<Mat> for AnnotatedVideoWriter {
        fn write(&mut self, frame: &mut Mat, obs: &FrameObservation) -> Result<(), Error> {
            let size = (frame.cols(), frame.rows());
            if size != self.size {
                return Err(Error::WriteFailure(format!(
                    "frame size {:?} does not match video size {:?}",
                    size, self.size
                )));
            }

            annotate(frame, obs).map_err(Error::write)?;

            let writer = self
                .writer
                .as_mut()
                .ok_or_else(|| Error::WriteFailure("video writer already released".into()))?;

            writer.write(&*frame).map_err(Error::write)
        }

        fn finish(&mut self) -> Result<(), Error> {
            self.release()
        }

        fn artifact_path(&self) -> String {
            self.out_file.to_string_lossy().into_owned()
        }
    }

    impl Drop for AnnotatedVideoWriter {
        fn drop(&mut self) {
            if let Err(err) = self.release() {
                tracing::warn!(%err, "releasing annotated video failed");
            }
        }
    }
}
