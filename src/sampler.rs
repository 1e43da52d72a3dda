use crate::error::Error;

/// Decoded frame supply, e.g. a video file.
pub trait FrameSource {
    type Frame;

    /// Nominal frame rate of the source.
    fn fps(&self) -> f64;

    /// Number of frames announced by the container, when known. Only a hint:
    /// scanning always runs until [`FrameSource::next_frame`] returns `None`.
    fn frame_count(&self) -> Option<usize>;

    /// (width, height) in pixels
    fn frame_size(&self) -> (u32, u32);

    fn next_frame(&mut self) -> Result<Option<Self::Frame>, Error>;

    /// Advances past one frame without handing it out. Returns `false` once
    /// the source is exhausted.
    fn skip_frame(&mut self) -> Result<bool, Error> {
        Ok(self.next_frame()?.is_some())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SampledFrame<F> {
    pub ordinal: usize,
    pub timestamp: f64, // in seconds
    pub image: F,
}

/// Selects frames `0, S, 2S, ...` and stamps them with `ordinal / fps`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameSampler {
    stride: usize,
    fps: f64,
}

impl FrameSampler {
    pub fn new(stride: usize, fps: f64) -> Result<Self, Error> {
        if stride == 0 {
            return Err(Error::InvalidConfig(
                "frame_stride must be a positive integer".into(),
            ));
        }

        if !fps.is_finite() || fps <= 0.0 {
            return Err(Error::SourceUnavailable(format!(
                "source reports unusable frame rate {}",
                fps
            )));
        }

        Ok(Self { stride, fps })
    }

    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }

    #[inline]
    pub fn fps(&self) -> f64 {
        self.fps
    }

    /// Frame rate of a video made of the selected frames only, so that it
    /// plays back at the source's speed.
    #[inline]
    pub fn output_fps(&self) -> f64 {
        self.fps / self.stride as f64
    }

    #[inline]
    pub fn is_selected(&self, ordinal: usize) -> bool {
        ordinal % self.stride == 0
    }

    #[inline]
    pub fn timestamp(&self, ordinal: usize) -> f64 {
        ordinal as f64 / self.fps
    }

    /// Number of frames selected out of `total`.
    #[inline]
    pub fn expected_samples(&self, total: usize) -> usize {
        (total + self.stride - 1) / self.stride
    }

    pub fn sample<'a, S: FrameSource>(&self, source: &'a mut S) -> Sampled<'a, S> {
        Sampled {
            source,
            sampler: *self,
            ordinal: 0,
            done: false,
        }
    }
}

/// Iterator over the selected frames of a source; stops at the first error.
pub struct Sampled<'a, S: FrameSource> {
    source: &'a mut S,
    sampler: FrameSampler,
    ordinal: usize,
    done: bool,
}

impl<'a, S: FrameSource> Iterator for Sampled<'a, S> {
    type Item = Result<SampledFrame<S::Frame>, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let ordinal = self.ordinal;

            if self.sampler.is_selected(ordinal) {
                match self.source.next_frame() {
                    Ok(Some(image)) => {
                        self.ordinal += 1;

                        return Some(Ok(SampledFrame {
                            ordinal,
                            timestamp: self.sampler.timestamp(ordinal),
                            image,
                        }));
                    }
                    Ok(None) => self.done = true,
                    Err(err) => {
                        self.done = true;
                        return Some(Err(err));
                    }
                }
            } else {
                match self.source.skip_frame() {
                    Ok(true) => self.ordinal += 1,
                    Ok(false) => self.done = true,
                    Err(err) => {
                        self.done = true;
                        return Some(Err(err));
                    }
                }
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    struct Counter {
        total: usize,
        next: usize,
        decoded: usize,
    }

    impl Counter {
        fn new(total: usize) -> Self {
            Self {
                total,
                next: 0,
                decoded: 0,
            }
        }
    }

    impl FrameSource for Counter {
        type Frame = usize;

        fn fps(&self) -> f64 {
            30.0
        }

        fn frame_count(&self) -> Option<usize> {
            Some(self.total)
        }

        fn frame_size(&self) -> (u32, u32) {
            (640, 480)
        }

        fn next_frame(&mut self) -> Result<Option<usize>, Error> {
            if self.next == self.total {
                return Ok(None);
            }

            self.next += 1;
            self.decoded += 1;
            Ok(Some(self.next - 1))
        }

        fn skip_frame(&mut self) -> Result<bool, Error> {
            if self.next == self.total {
                return Ok(false);
            }

            self.next += 1;
            Ok(true)
        }
    }

    #[test]
    fn rejects_zero_stride() {
        assert!(matches!(
            FrameSampler::new(0, 30.0),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn rejects_unusable_frame_rate() {
        assert!(matches!(
            FrameSampler::new(1, 0.0),
            Err(Error::SourceUnavailable(_))
        ));
        assert!(FrameSampler::new(1, f64::NAN).is_err());
    }

    #[test]
    fn selects_every_nth_frame_with_timestamps() {
        let sampler = FrameSampler::new(3, 30.0).unwrap();
        let mut source = Counter::new(10);

        let picked: Vec<_> = sampler
            .sample(&mut source)
            .map(|f| f.map(|f| (f.ordinal, f.timestamp)))
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(
            picked,
            vec![(0, 0.0), (3, 0.1), (6, 0.2), (9, 0.3)]
        );
    }

    #[test]
    fn sampling_decodes_only_selected_frames() {
        let sampler = FrameSampler::new(2, 30.0).unwrap();
        let mut source = Counter::new(7);

        let frames: Vec<_> = sampler
            .sample(&mut source)
            .collect::<Result<_, _>>()
            .unwrap();

        let ordinals: Vec<_> = frames.iter().map(|f| f.ordinal).collect();
        assert_eq!(ordinals, vec![0, 2, 4, 6]);
        assert!(frames.iter().all(|f| f.image == f.ordinal));
        assert_eq!(source.decoded, 4);
    }

    #[test]
    fn empty_source_yields_nothing() {
        let sampler = FrameSampler::new(1, 25.0).unwrap();
        let mut source = Counter::new(0);

        assert_eq!(sampler.sample(&mut source).count(), 0);
    }

    #[test]
    fn output_rate_follows_stride() {
        let one = FrameSampler::new(1, 30.0).unwrap();
        let two = FrameSampler::new(2, 30.0).unwrap();

        assert_eq!(one.output_fps(), 30.0);
        assert_eq!(two.output_fps(), 15.0);
    }

    proptest! {
        #[test]
        fn prop_sample_count_is_ceil(total in 0usize..500, stride in 1usize..20) {
            let sampler = FrameSampler::new(stride, 30.0).unwrap();
            let mut source = Counter::new(total);

            let n = sampler.sample(&mut source).count();
            prop_assert_eq!(n, (total + stride - 1) / stride);
            prop_assert_eq!(n, sampler.expected_samples(total));
        }
    }
}
