use crate::config::DetectionConfig;
use crate::detection::RawDetection;
use crate::error::Error;
use crate::sampler::SampledFrame;

/// Detection-and-tracking capability consulted once per sampled frame.
///
/// Implementations may keep tracking state between calls, which is why
/// `detect` takes `&mut self`; one instance serves exactly one scan.
pub trait Detector<F> {
    fn detect(
        &mut self,
        frame: &SampledFrame<F>,
        config: &DetectionConfig,
    ) -> Result<Vec<RawDetection>, Error>;
}

impl<F, D: Detector<F> + ?Sized> Detector<F> for &mut D {
    #[inline]
    fn detect(
        &mut self,
        frame: &SampledFrame<F>,
        config: &DetectionConfig,
    ) -> Result<Vec<RawDetection>, Error> {
        (**self).detect(frame, config)
    }
}

impl<F, D: Detector<F> + ?Sized> Detector<F> for Box<D> {
    #[inline]
    fn detect(
        &mut self,
        frame: &SampledFrame<F>,
        config: &DetectionConfig,
    ) -> Result<Vec<RawDetection>, Error> {
        (**self).detect(frame, config)
    }
}
