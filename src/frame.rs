use crate::detection::Detection;

/// Detections of one sampled frame, stamped with the frame's position in time.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameObservation {
    pub timestamp: f64, // in seconds
    pub detections: Vec<Detection>,
}

impl FrameObservation {
    #[inline]
    pub fn new(timestamp: f64, detections: Vec<Detection>) -> Self {
        Self {
            timestamp,
            detections,
        }
    }

    /// Number of objects seen on the frame.
    #[inline]
    pub fn count(&self) -> usize {
        self.detections.len()
    }

    /// Sum of the box areas of every detection on the frame.
    pub fn aggregate_area(&self) -> f64 {
        self.detections.iter().map(Detection::area).sum()
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Detection> {
        self.detections.iter()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }
}
