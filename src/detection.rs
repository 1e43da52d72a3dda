use std::fmt;

use serde_derive::{Deserialize, Serialize};

use crate::bbox::{BBox, Ltrb};

/// Detector output as it comes off the wire: left-top-right-bottom box in
/// pixels, confidence and, when the tracker could keep one, a track id.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct RawDetection {
    pub bbox: [f32; 4],
    #[serde(rename = "conf")]
    pub confidence: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
}

impl RawDetection {
    #[inline]
    pub fn new(bbox: [f32; 4], confidence: f32, id: Option<u32>) -> Self {
        Self {
            bbox,
            confidence,
            id,
        }
    }
}

/// Where a track identifier came from.
///
/// `Persistent` ids are assigned by the tracker and stay attached to the same
/// object across frames. `Ephemeral` ids are positional indices synthesized for
/// a single frame when the tracker produced none; two ephemeral ids with the
/// same value on different frames need not refer to the same object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackId {
    Persistent(u32),
    Ephemeral(u32),
}

impl TrackId {
    #[inline]
    pub fn value(&self) -> u32 {
        match *self {
            TrackId::Persistent(id) | TrackId::Ephemeral(id) => id,
        }
    }

    #[inline]
    pub fn is_persistent(&self) -> bool {
        matches!(self, TrackId::Persistent(_))
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackId::Persistent(id) => write!(f, "ID {}", id),
            TrackId::Ephemeral(id) => write!(f, "#{}", id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub bbox: BBox<Ltrb>,
    pub confidence: f32,
    pub track_id: TrackId,
}

impl Detection {
    #[inline(always)]
    pub fn area(&self) -> f64 {
        self.bbox.area()
    }
}

/// Turns one frame worth of detector output into [`Detection`]s.
///
/// Ids are trusted only when every detection of the frame carries one;
/// otherwise the whole frame falls back to positional indices `0..k`.
pub fn normalize(raw: Vec<RawDetection>) -> Vec<Detection> {
    let tracked = raw.iter().all(|r| r.id.is_some());

    raw.into_iter()
        .enumerate()
        .map(|(idx, r)| {
            let track_id = match r.id {
                Some(id) if tracked => TrackId::Persistent(id),
                _ => TrackId::Ephemeral(idx as u32),
            };

            Detection {
                bbox: BBox::assigned(&r.bbox),
                confidence: r.confidence,
                track_id,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracked_frame_keeps_ids() {
        let dets = normalize(vec![
            RawDetection::new([0.0, 0.0, 10.0, 10.0], 0.9, Some(7)),
            RawDetection::new([20.0, 0.0, 30.0, 10.0], 0.8, Some(3)),
        ]);

        assert_eq!(dets[0].track_id, TrackId::Persistent(7));
        assert_eq!(dets[1].track_id, TrackId::Persistent(3));
        assert_eq!(dets[0].area(), 100.0);
    }

    #[test]
    fn untracked_frame_falls_back_to_positions() {
        let dets = normalize(vec![
            RawDetection::new([0.0, 0.0, 10.0, 10.0], 0.9, None),
            RawDetection::new([20.0, 0.0, 30.0, 10.0], 0.8, None),
            RawDetection::new([40.0, 0.0, 50.0, 10.0], 0.7, None),
        ]);

        let ids: Vec<_> = dets.iter().map(|d| d.track_id).collect();
        assert_eq!(
            ids,
            vec![
                TrackId::Ephemeral(0),
                TrackId::Ephemeral(1),
                TrackId::Ephemeral(2)
            ]
        );
        assert!(dets.iter().all(|d| !d.track_id.is_persistent()));
    }

    #[test]
    fn partially_tracked_frame_is_untracked() {
        let dets = normalize(vec![
            RawDetection::new([0.0, 0.0, 10.0, 10.0], 0.9, Some(5)),
            RawDetection::new([20.0, 0.0, 30.0, 10.0], 0.8, None),
        ]);

        assert_eq!(dets[0].track_id, TrackId::Ephemeral(0));
        assert_eq!(dets[1].track_id, TrackId::Ephemeral(1));
    }

    #[test]
    fn empty_frame_normalizes_to_nothing() {
        assert!(normalize(Vec::new()).is_empty());
    }

    #[test]
    fn raw_detection_wire_format() {
        let raw: RawDetection =
            serde_json::from_str(r#"{"bbox":[1,2,3,4],"conf":0.5,"id":9}"#).unwrap();
        assert_eq!(raw, RawDetection::new([1.0, 2.0, 3.0, 4.0], 0.5, Some(9)));

        let raw: RawDetection = serde_json::from_str(r#"{"bbox":[1,2,3,4],"conf":0.5}"#).unwrap();
        assert_eq!(raw.id, None);
    }

    #[test]
    fn labels() {
        assert_eq!(TrackId::Persistent(4).to_string(), "ID 4");
        assert_eq!(TrackId::Ephemeral(2).to_string(), "#2");
    }
}
