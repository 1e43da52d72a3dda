//! Final result of a scan, in the JSON shape handed to callers.
//!
//! The weight figures here are a *weight index*: the mean pixel area of a
//! track's bounding box. It ranks objects by apparent size within one video
//! and says nothing about grams until a camera calibration is applied.

use serde_derive::{Deserialize, Serialize};

use crate::track::{TrackHistory, TrackSample};

pub const WEIGHT_UNIT: &str = "index";
pub const WEIGHT_NOTE: &str = "uncalibrated proxy; requires calibration to convert to physical mass";
/// Confidence attached to every per-track weight index.
pub const NOMINAL_WEIGHT_CONFIDENCE: f64 = 0.5;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AnalysisReport {
    pub counts: CountSeries,
    pub tracks_sample: Vec<TrackSamples>,
    pub weight_estimates: WeightEstimates,
    pub artifacts: Artifacts,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct CountSeries {
    pub timestamps: Vec<f64>,
    pub counts: Vec<usize>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TrackSamples {
    pub track_id: u32,
    #[serde(default = "persistent_default")]
    pub persistent: bool,
    pub samples: Vec<TrackSample>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct FrameWeight {
    pub timestamp: f64,
    pub aggregate_weight_index: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TrackWeight {
    pub track_id: u32,
    #[serde(default = "persistent_default")]
    pub persistent: bool,
    pub weight_index: f64,
    pub unit: String,
    pub confidence: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WeightEstimates {
    pub per_frame: Vec<FrameWeight>,
    pub per_track: Vec<TrackWeight>,
    pub unit: String,
    pub note: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Artifacts {
    pub annotated_video_path: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CountSummary {
    pub min: usize,
    pub max: usize,
    pub mean: f64,
}

fn persistent_default() -> bool {
    true
}

/// Folds the per-scan state into the report; tracks keep the order they are
/// given in.
pub fn assemble<I>(
    timestamps: Vec<f64>,
    counts: Vec<usize>,
    tracks: I,
    per_frame: Vec<FrameWeight>,
    annotated_video_path: String,
) -> AnalysisReport
where
    I: IntoIterator<Item = TrackHistory>,
{
    let (tracks_sample, per_track) = tracks
        .into_iter()
        .map(|hist| {
            let track_id = hist.track_id.value();
            let persistent = hist.track_id.is_persistent();

            let weight = TrackWeight {
                track_id,
                persistent,
                weight_index: hist.weight_index(),
                unit: WEIGHT_UNIT.to_string(),
                confidence: NOMINAL_WEIGHT_CONFIDENCE,
            };

            let samples = TrackSamples {
                track_id,
                persistent,
                samples: hist.samples().to_vec(),
            };

            (samples, weight)
        })
        .unzip();

    AnalysisReport {
        counts: CountSeries { timestamps, counts },
        tracks_sample,
        weight_estimates: WeightEstimates {
            per_frame,
            per_track,
            unit: WEIGHT_UNIT.to_string(),
            note: WEIGHT_NOTE.to_string(),
        },
        artifacts: Artifacts {
            annotated_video_path,
        },
    }
}

impl AnalysisReport {
    #[inline]
    pub fn frames_processed(&self) -> usize {
        self.counts.counts.len()
    }

    #[inline]
    pub fn unique_tracks(&self) -> usize {
        self.weight_estimates.per_track.len()
    }

    pub fn count_summary(&self) -> Option<CountSummary> {
        let counts = &self.counts.counts;
        let min = *counts.iter().min()?;
        let max = *counts.iter().max()?;
        let mean = counts.iter().sum::<usize>() as f64 / counts.len() as f64;

        Some(CountSummary { min, max, mean })
    }

    pub fn weight_index_range(&self) -> Option<(f64, f64)> {
        self.weight_estimates
            .per_track
            .iter()
            .map(|t| t.weight_index)
            .fold(None, |acc, w| match acc {
                None => Some((w, w)),
                Some((lo, hi)) => Some((lo.min(w), hi.max(w))),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bbox::BBox;
    use crate::detection::{Detection, TrackId};

    fn history(id: TrackId, areas: &[f32]) -> TrackHistory {
        let mut hist = TrackHistory::new(id);
        for (i, a) in areas.iter().enumerate() {
            hist.observe(
                i as f64,
                &Detection {
                    bbox: BBox::ltrb(0.0, 0.0, *a, 1.0),
                    confidence: 0.7,
                    track_id: id,
                },
            );
        }
        hist
    }

    fn sample_report() -> AnalysisReport {
        assemble(
            vec![0.0, 0.5],
            vec![2, 1],
            vec![
                history(TrackId::Persistent(4), &[10.0, 20.0]),
                history(TrackId::Ephemeral(1), &[5.0]),
            ],
            vec![
                FrameWeight {
                    timestamp: 0.0,
                    aggregate_weight_index: 15.0,
                },
                FrameWeight {
                    timestamp: 0.5,
                    aggregate_weight_index: 20.0,
                },
            ],
            "outputs/clip_annotated.mp4".to_string(),
        )
    }

    #[test]
    fn assemble_keeps_track_order_and_weights() {
        let report = sample_report();
        let per_track = &report.weight_estimates.per_track;

        assert_eq!(per_track[0].track_id, 4);
        assert!(per_track[0].persistent);
        assert_eq!(per_track[0].weight_index, 15.0);
        assert_eq!(per_track[0].unit, "index");
        assert_eq!(per_track[0].confidence, NOMINAL_WEIGHT_CONFIDENCE);
        assert_eq!(per_track[1].track_id, 1);
        assert!(!per_track[1].persistent);
        assert_eq!(report.tracks_sample[0].samples.len(), 2);
    }

    #[test]
    fn json_shape() {
        let value = serde_json::to_value(sample_report()).unwrap();

        assert_eq!(value["counts"]["counts"], serde_json::json!([2, 1]));
        assert_eq!(value["tracks_sample"][0]["track_id"], 4);
        assert_eq!(
            value["tracks_sample"][0]["samples"][0]["bbox"],
            serde_json::json!([0.0, 0.0, 10.0, 1.0])
        );
        assert!(value["tracks_sample"][0]["samples"][0]["conf"].is_number());
        assert_eq!(value["weight_estimates"]["unit"], "index");
        assert_eq!(value["weight_estimates"]["note"], WEIGHT_NOTE);
        assert_eq!(
            value["weight_estimates"]["per_frame"][1]["aggregate_weight_index"],
            20.0
        );
        assert_eq!(
            value["artifacts"]["annotated_video_path"],
            "outputs/clip_annotated.mp4"
        );
    }

    #[test]
    fn json_round_trip_is_lossless() {
        let report = sample_report();
        let text = serde_json::to_string(&report).unwrap();
        let back: AnalysisReport = serde_json::from_str(&text).unwrap();

        assert_eq!(back, report);
    }

    #[test]
    fn persistent_flag_defaults_when_absent() {
        let t: TrackWeight = serde_json::from_str(
            r#"{"track_id":1,"weight_index":3.0,"unit":"index","confidence":0.5}"#,
        )
        .unwrap();
        assert!(t.persistent);
    }

    #[test]
    fn summaries() {
        let report = sample_report();
        let summary = report.count_summary().unwrap();

        assert_eq!(summary.min, 1);
        assert_eq!(summary.max, 2);
        assert_eq!(summary.mean, 1.5);
        assert_eq!(report.weight_index_range(), Some((5.0, 15.0)));
        assert_eq!(report.frames_processed(), 2);
        assert_eq!(report.unique_tracks(), 2);
    }

    #[test]
    fn empty_report() {
        let report = assemble(
            Vec::new(),
            Vec::new(),
            Vec::<TrackHistory>::new(),
            Vec::new(),
            String::new(),
        );

        assert!(report.count_summary().is_none());
        assert!(report.weight_index_range().is_none());
        assert!(report.tracks_sample.is_empty());
    }

    #[test]
    fn fractional_timestamps_survive_json_exactly() {
        let timestamps: Vec<f64> = (0..300).map(|n| n as f64 / 30.0).collect();
        let per_frame = timestamps
            .iter()
            .map(|&timestamp| FrameWeight {
                timestamp,
                aggregate_weight_index: timestamp * 1234.5,
            })
            .collect();
        let report = assemble(
            timestamps.clone(),
            vec![0; 300],
            Vec::<TrackHistory>::new(),
            per_frame,
            String::new(),
        );

        let back: AnalysisReport =
            serde_json::from_str(&serde_json::to_string(&report).unwrap()).unwrap();

        for (a, b) in back.counts.timestamps.iter().zip(&timestamps) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
        assert_eq!(back, report);
    }
}
