use indexmap::IndexMap;

use crate::detection::TrackId;
use crate::frame::FrameObservation;
use crate::report::{self, AnalysisReport, FrameWeight};
use crate::track::TrackHistory;

/// Running state of one scan.
///
/// Each call to [`Aggregator::update`] appends one entry to every per-frame
/// series before touching track state, so the series always stay parallel
/// and a scan stopped between frames leaves a valid prefix behind.
#[derive(Debug, Default, Clone)]
pub struct Aggregator {
    tracks: IndexMap<TrackId, TrackHistory>,
    timestamps: Vec<f64>,
    counts: Vec<usize>,
    per_frame: Vec<FrameWeight>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, obs: &FrameObservation) {
        self.timestamps.push(obs.timestamp);
        self.counts.push(obs.count());
        self.per_frame.push(FrameWeight {
            timestamp: obs.timestamp,
            aggregate_weight_index: obs.aggregate_area(),
        });

        for det in obs.iter() {
            self.tracks
                .entry(det.track_id)
                .or_insert_with(|| TrackHistory::new(det.track_id))
                .observe(obs.timestamp, det);
        }
    }

    #[inline]
    pub fn frames(&self) -> usize {
        self.timestamps.len()
    }

    #[inline]
    pub fn timestamps(&self) -> &[f64] {
        &self.timestamps
    }

    #[inline]
    pub fn counts(&self) -> &[usize] {
        &self.counts
    }

    #[inline]
    pub fn per_frame(&self) -> &[FrameWeight] {
        &self.per_frame
    }

    /// Tracks in order of first sighting.
    #[inline]
    pub fn tracks(&self) -> impl Iterator<Item = &TrackHistory> {
        self.tracks.values()
    }

    #[inline]
    pub fn track(&self, id: TrackId) -> Option<&TrackHistory> {
        self.tracks.get(&id)
    }

    pub fn into_report<S: Into<String>>(self, annotated_video_path: S) -> AnalysisReport {
        report::assemble(
            self.timestamps,
            self.counts,
            self.tracks.into_values(),
            self.per_frame,
            annotated_video_path.into(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{normalize, RawDetection};

    fn obs(ts: f64, raw: Vec<RawDetection>) -> FrameObservation {
        FrameObservation::new(ts, normalize(raw))
    }

    fn boxed(x: f32, side: f32, id: Option<u32>) -> RawDetection {
        RawDetection::new([x, 0.0, x + side, side], 0.8, id)
    }

    #[test]
    fn series_stay_parallel() {
        let mut agg = Aggregator::new();
        agg.update(&obs(0.0, vec![boxed(0.0, 10.0, Some(1))]));
        agg.update(&obs(0.5, vec![]));
        agg.update(&obs(1.0, vec![boxed(0.0, 10.0, Some(1)), boxed(50.0, 2.0, Some(2))]));

        assert_eq!(agg.timestamps(), &[0.0, 0.5, 1.0]);
        assert_eq!(agg.counts(), &[1, 0, 2]);
        assert_eq!(agg.per_frame().len(), 3);
        assert_eq!(agg.per_frame()[2].aggregate_weight_index, 104.0);
    }

    #[test]
    fn empty_frame_creates_no_tracks() {
        let mut agg = Aggregator::new();
        agg.update(&obs(0.0, vec![]));

        assert_eq!(agg.counts(), &[0]);
        assert_eq!(agg.per_frame()[0].aggregate_weight_index, 0.0);
        assert_eq!(agg.tracks().count(), 0);
    }

    #[test]
    fn every_detection_lands_in_one_history() {
        let mut agg = Aggregator::new();
        agg.update(&obs(0.0, vec![boxed(0.0, 4.0, Some(3)), boxed(10.0, 4.0, Some(9))]));
        agg.update(&obs(0.1, vec![boxed(1.0, 4.0, Some(3))]));

        let sightings: usize = agg.tracks().map(|t| t.sightings()).sum();
        let detections: usize = agg.counts().iter().sum();
        assert_eq!(sightings, detections);
        assert_eq!(agg.track(TrackId::Persistent(3)).unwrap().sightings(), 2);
    }

    #[test]
    fn tracks_keep_first_seen_order() {
        let mut agg = Aggregator::new();
        agg.update(&obs(0.0, vec![boxed(0.0, 4.0, Some(42))]));
        agg.update(&obs(0.1, vec![boxed(0.0, 4.0, Some(7)), boxed(9.0, 4.0, Some(42))]));

        let order: Vec<_> = agg.tracks().map(|t| t.track_id.value()).collect();
        assert_eq!(order, vec![42, 7]);
    }

    #[test]
    fn ephemeral_and_persistent_ids_do_not_collide() {
        let mut agg = Aggregator::new();
        agg.update(&obs(0.0, vec![boxed(0.0, 4.0, Some(0))]));
        agg.update(&obs(0.1, vec![boxed(0.0, 4.0, None)]));

        assert_eq!(agg.tracks().count(), 2);
        assert!(agg.track(TrackId::Ephemeral(0)).is_some());
        assert!(agg.track(TrackId::Persistent(0)).is_some());
    }

    #[test]
    fn report_carries_everything() {
        let mut agg = Aggregator::new();
        agg.update(&obs(0.0, vec![boxed(0.0, 10.0, Some(1))]));
        agg.update(&obs(1.0, vec![boxed(0.0, 20.0, Some(1))]));

        let report = agg.into_report("outputs/a_annotated.mp4");
        assert_eq!(report.counts.counts, vec![1, 1]);
        assert_eq!(report.tracks_sample.len(), 1);
        assert_eq!(report.weight_estimates.per_track[0].weight_index, 250.0);
        assert_eq!(report.artifacts.annotated_video_path, "outputs/a_annotated.mp4");
    }
}
