//! Frame sources.
//!
//! - Camera devices through V4L2 (feature: ingest-v4l2)
//! - Synthetic camera (`stub://` device names) for tests and demos
//! - Still image files, for single-file mode
//!
//! Every source hands out owned `BgrFrame`s. A failed capture is returned to
//! the caller, which decides whether to back off and retry.

pub mod camera;
pub mod file;
#[cfg(feature = "ingest-v4l2")]
mod normalize;

use anyhow::Result;

use crate::frame::BgrFrame;

pub use camera::CameraSource;
pub use file::ImageFileSource;

/// Capture counters for a source.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub errors: u64,
    pub name: String,
}

pub trait FrameSource {
    /// Opens (or reopens) the underlying device.
    fn connect(&mut self) -> Result<()>;

    /// Blocks until the next frame is available.
    fn next_frame(&mut self) -> Result<BgrFrame>;

    fn is_healthy(&self) -> bool;

    fn stats(&self) -> SourceStats;
}
