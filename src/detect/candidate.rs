//! Geometric plausibility checks for stanchion candidates.

use serde::{Deserialize, Serialize};

use crate::detect::result::{BoundingBox, Point};

/// Thresholds a polygon's bounding box must satisfy.
///
/// Width and height minimums are exclusive; ratio and vertex bounds are
/// inclusive. The ratio is the integer percentage `100 * height / width`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CandidatePolicy {
    pub min_width: i32,
    pub min_height: i32,
    pub min_ratio_pct: i32,
    pub max_ratio_pct: i32,
    pub min_vertices: usize,
    pub max_vertices: usize,
    /// Largest allowed |frame center x - box center x|, exclusive.
    pub max_center_offset: i32,
}

impl Default for CandidatePolicy {
    fn default() -> Self {
        Self {
            min_width: 15,
            min_height: 40,
            min_ratio_pct: 50,
            max_ratio_pct: 800,
            min_vertices: 4,
            max_vertices: 19,
            max_center_offset: 50,
        }
    }
}

/// First rule a rejected polygon failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rejection {
    TooNarrow { width: i32 },
    TooShort { height: i32 },
    AspectRatio { ratio_pct: i32 },
    VertexCount { vertices: usize },
    VerticalPlacement { top: i32, bottom: i32 },
    OffCenter { offset: i32 },
}

/// A polygon that passed every rule, with its box.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Candidate {
    pub polygon: Vec<Point>,
    pub bbox: BoundingBox,
}

#[derive(Clone, Debug, Default)]
pub struct CandidateEvaluator {
    policy: CandidatePolicy,
}

impl CandidateEvaluator {
    pub fn new(policy: CandidatePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &CandidatePolicy {
        &self.policy
    }

    /// Checks `polygon` against a frame of `frame_width` x `frame_height`.
    ///
    /// Vertical rule: with `mid` the frame's middle row, the gap above the
    /// box (`top`) must exceed `mid - bottom`, which goes negative once the
    /// box reaches below the middle, and the box must start above `mid`.
    pub fn evaluate(
        &self,
        polygon: &[Point],
        frame_width: u32,
        frame_height: u32,
    ) -> Result<BoundingBox, Rejection> {
        let p = &self.policy;
        let bbox = BoundingBox::of(polygon);

        if bbox.width <= p.min_width {
            return Err(Rejection::TooNarrow { width: bbox.width });
        }
        if bbox.height <= p.min_height {
            return Err(Rejection::TooShort {
                height: bbox.height,
            });
        }
        let ratio_pct = 100 * bbox.height / bbox.width;
        if !(p.min_ratio_pct..=p.max_ratio_pct).contains(&ratio_pct) {
            return Err(Rejection::AspectRatio { ratio_pct });
        }
        if !(p.min_vertices..=p.max_vertices).contains(&polygon.len()) {
            return Err(Rejection::VertexCount {
                vertices: polygon.len(),
            });
        }

        let mid_y = frame_height as i32 / 2;
        let top = bbox.y;
        let bottom = bbox.bottom();
        if top <= mid_y - bottom || top >= mid_y {
            return Err(Rejection::VerticalPlacement { top, bottom });
        }

        let offset = (frame_width as i32 / 2 - bbox.x_mid()).abs();
        if offset >= p.max_center_offset {
            return Err(Rejection::OffCenter { offset });
        }

        Ok(bbox)
    }

    pub fn is_possible_stanchion(
        &self,
        polygon: &[Point],
        frame_width: u32,
        frame_height: u32,
    ) -> Option<BoundingBox> {
        match self.evaluate(polygon, frame_width, frame_height) {
            Ok(bbox) => Some(bbox),
            Err(reason) => {
                log::trace!("candidate rejected: {:?}", reason);
                None
            }
        }
    }
}
