//! Stanchion vision
//!
//! Finds a colored vertical marker ("stanchion") in camera frames and
//! publishes its geometry through a small fixed-layout record file that a
//! control process polls.
//!
//! # Pipeline
//!
//! crop -> optional blur -> HSV -> per color mask -> opening -> external
//! contours -> polygon simplification -> candidate checks -> tallest box.
//! Colors are tried in priority order (yellow before red by default) and the
//! first color with a plausible candidate wins.
//!
//! # Module Structure
//!
//! - `frame`: owned BGR frames and regions of interest
//! - `pipeline`: pre-processing stages applied before detection
//! - `detect`: segmentation, morphology, contours, candidate evaluation, engine
//! - `publish`: result record layout, writer and torn-read aware reader
//! - `ingest`: camera and still image frame sources
//! - `capture`: cancellable capture loop with retry backoff
//! - `diagnostics`: intermediate image dumps
//! - `config`: color ranges file and daemon configuration

pub mod capture;
pub mod config;
pub mod detect;
pub mod diagnostics;
pub mod frame;
pub mod ingest;
pub mod pipeline;
pub mod publish;

pub use capture::{Backoff, CancellationToken, CaptureLoop, LoopSummary};
pub use config::{
    CameraSettings, ColorRangeConfig, DetectorSettings, RetrySettings, Tunables, VisionConfig,
};
pub use detect::{
    BoundingBox, CandidateEvaluator, CandidatePolicy, ColorRange, Detection, DetectionEngine,
    DetectionResult, Found, Kernel, Point, Rejection, SelectionMode, SelectionPolicy,
    StageImages, TargetColor,
};
pub use diagnostics::DiagnosticsWriter;
pub use frame::{BgrFrame, Roi};
pub use ingest::{CameraSource, FrameSource, ImageFileSource, SourceStats};
pub use pipeline::{CropRegion, Preprocess, Stage};
pub use publish::{ReadOutcome, ResultPublisher, ResultReader, ResultRecord, RECORD_LEN};
