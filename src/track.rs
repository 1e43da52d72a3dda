use serde_derive::{Deserialize, Serialize};

use crate::detection::{Detection, TrackId};

/// Sightings kept per track for inspection.
pub const SAMPLE_CAPACITY: usize = 5;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct TrackSample {
    pub timestamp: f64,
    pub bbox: [f32; 4],
    #[serde(rename = "conf")]
    pub confidence: f32,
}

/// Everything recorded about one track during a scan.
///
/// `samples` holds the first [`SAMPLE_CAPACITY`] sightings and is frozen once
/// full. `areas` holds the box area of every sighting in order.
#[derive(Debug, Clone)]
pub struct TrackHistory {
    pub track_id: TrackId,
    samples: Vec<TrackSample>,
    areas: Vec<f64>,
}

impl TrackHistory {
    pub fn new(track_id: TrackId) -> Self {
        Self {
            track_id,
            samples: Vec::with_capacity(SAMPLE_CAPACITY),
            areas: Vec::new(),
        }
    }

    pub fn observe(&mut self, timestamp: f64, det: &Detection) {
        self.areas.push(det.area());

        if self.samples.len() < SAMPLE_CAPACITY {
            self.samples.push(TrackSample {
                timestamp,
                bbox: det.bbox.into(),
                confidence: det.confidence,
            });
        }
    }

    #[inline]
    pub fn samples(&self) -> &[TrackSample] {
        &self.samples
    }

    #[inline]
    pub fn areas(&self) -> &[f64] {
        &self.areas
    }

    #[inline]
    pub fn sightings(&self) -> usize {
        self.areas.len()
    }

    /// Mean box area over all sightings. Relative size only: pixels squared,
    /// not a mass.
    pub fn weight_index(&self) -> f64 {
        if self.areas.is_empty() {
            return 0.0;
        }

        self.areas.iter().sum::<f64>() / self.areas.len() as f64
    }
}
