use munkres::{solve_assignment, WeightMatrix};

use crate::bbox::{BBox, Ltrb};

pub const DEFAULT_MATCH_IOU: f32 = 0.3;
pub const DEFAULT_MAX_MISSES: u32 = 30;

const MAX_ASSIGNMENT_SIZE: usize = 512;
const UNREACHABLE_COST: f32 = 100000.0;

#[derive(Debug, Clone)]
struct Tracklet {
    id: u32,
    bbox: BBox<Ltrb>,
    misses: u32,
}

/// Assigns persistent ids to boxes by matching them against the boxes of the
/// previous frames.
///
/// Matching is a minimum-cost assignment over `1 - IoU`. A pair is accepted
/// only when its overlap reaches `match_iou`; everything else starts a new
/// track. Tracks that go unmatched for more than `max_misses` frames are
/// forgotten, and their ids are never handed out again.
#[derive(Debug, Clone)]
pub struct IouTracker {
    tracks: Vec<Tracklet>,
    next_id: u32,
    match_iou: f32,
    max_misses: u32,
}

impl Default for IouTracker {
    fn default() -> Self {
        Self::new(DEFAULT_MATCH_IOU, DEFAULT_MAX_MISSES)
    }
}

impl IouTracker {
    pub fn new(match_iou: f32, max_misses: u32) -> Self {
        Self {
            tracks: Vec::with_capacity(64),
            next_id: 1,
            match_iou,
            max_misses,
        }
    }

    /// Number of tracks still alive.
    #[inline]
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Returns one id per box, in input order.
    pub fn update(&mut self, boxes: &[BBox<Ltrb>]) -> Vec<u32> {
        let mut ids: Vec<Option<u32>> = vec![None; boxes.len()];
        let mut matched = vec![false; self.tracks.len()];

        for (row, col) in self.assignment(boxes) {
            let track = &mut self.tracks[row];
            track.bbox = boxes[col];
            track.misses = 0;
            matched[row] = true;
            ids[col] = Some(track.id);
        }

        for (track, hit) in self.tracks.iter_mut().zip(matched) {
            if !hit {
                track.misses += 1;
            }
        }

        let max_misses = self.max_misses;
        self.tracks.retain(|t| t.misses <= max_misses);

        ids.into_iter()
            .zip(boxes)
            .map(|(id, bbox)| match id {
                Some(id) => id,
                None => {
                    let id = self.next_id;
                    self.next_id += 1;
                    self.tracks.push(Tracklet {
                        id,
                        bbox: *bbox,
                        misses: 0,
                    });

                    id
                }
            })
            .collect()
    }

    fn assignment(&self, boxes: &[BBox<Ltrb>]) -> Vec<(usize, usize)> {
        if self.tracks.is_empty() || boxes.is_empty() {
            return Vec::new();
        }

        let n = boxes.len().max(self.tracks.len());
        if n > MAX_ASSIGNMENT_SIZE {
            tracing::warn!(size = n, "assignment matrix too big, starting fresh tracks");
            return Vec::new();
        }

        let mut mat = WeightMatrix::from_fn(n, |(r, c)| {
            if r < self.tracks.len() && c < boxes.len() {
                1.0 - self.tracks[r].bbox.iou(&boxes[c])
            } else {
                UNREACHABLE_COST
            }
        });

        match solve_assignment(&mut mat) {
            Ok(positions) => positions
                .into_iter()
                .filter_map(|p| {
                    let (row, column) = (p.row, p.column);

                    if row < self.tracks.len()
                        && column < boxes.len()
                        && self.tracks[row].bbox.iou(&boxes[column]) >= self.match_iou
                    {
                        Some((row, column))
                    } else {
                        None
                    }
                })
                .collect(),
            Err(err) => {
                tracing::warn!(?err, "assignment could not be solved");
                Vec::new()
            }
        }
    }
}
