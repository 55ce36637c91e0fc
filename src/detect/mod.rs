//! Stanchion detection core.
//!
//! Every stage here is total: degenerate input yields an empty mask, no
//! contours and finally `Found::None`, never an error.

pub mod candidate;
pub mod color;
pub mod contour;
mod engine;
pub mod morphology;
mod result;

pub use candidate::{Candidate, CandidateEvaluator, CandidatePolicy, Rejection};
pub use color::{ColorRange, HsvImage};
pub use engine::{DetectionEngine, SelectionMode, SelectionPolicy, StageImages};
pub use morphology::Kernel;
pub use result::{BoundingBox, Detection, DetectionResult, Found, Point, TargetColor};
