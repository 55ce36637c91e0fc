//! Intermediate image dumps for tuning color ranges.
//!
//! Writes `<base>-orig.jpg`, `<base>-hsv.jpg`, `<base>-mask.jpg` and
//! `<base>-bw.jpg` under the output directory. A failed write is logged and
//! otherwise ignored.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::detect::StageImages;

#[derive(Clone, Debug)]
pub struct DiagnosticsWriter {
    output_dir: PathBuf,
    /// Dump every N frames in continuous mode.
    every: Option<u64>,
    written: u64,
}

impl DiagnosticsWriter {
    pub fn new(output_dir: impl Into<PathBuf>, every: Option<u64>) -> Self {
        Self {
            output_dir: output_dir.into(),
            every: every.filter(|n| *n > 0),
            written: 0,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    /// True when a periodic dump is due after `frames` processed frames.
    pub fn is_due(&self, frames: u64) -> bool {
        matches!(self.every, Some(n) if frames > 0 && frames % n == 0)
    }

    /// Writes all four images. Never fails; problems are logged.
    pub fn dump(&mut self, base: &str, stages: &StageImages) {
        match self.try_dump(base, stages) {
            Ok(()) => {
                self.written += 1;
                log::debug!(
                    "wrote diagnostics {}/{}-*.jpg",
                    self.output_dir.display(),
                    base
                );
            }
            Err(err) => log::warn!("diagnostics dump {} failed: {:#}", base, err),
        }
    }

    fn try_dump(&self, base: &str, stages: &StageImages) -> Result<()> {
        if stages.cropped.is_empty() {
            anyhow::bail!("no frame processed yet");
        }
        std::fs::create_dir_all(&self.output_dir)
            .with_context(|| format!("create {}", self.output_dir.display()))?;

        let orig = self.path_for(base, "orig");
        stages
            .cropped
            .to_rgb_image()
            .save(&orig)
            .with_context(|| format!("write {}", orig.display()))?;
        let hsv = self.path_for(base, "hsv");
        stages
            .hsv
            .to_rgb_image()
            .save(&hsv)
            .with_context(|| format!("write {}", hsv.display()))?;
        let mask = self.path_for(base, "mask");
        stages
            .mask
            .save(&mask)
            .with_context(|| format!("write {}", mask.display()))?;
        let bw = self.path_for(base, "bw");
        stages
            .opened
            .save(&bw)
            .with_context(|| format!("write {}", bw.display()))?;
        Ok(())
    }

    pub fn path_for(&self, base: &str, stage: &str) -> PathBuf {
        self.output_dir.join(format!("{}-{}.jpg", base, stage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ColorRangeConfig, DetectorSettings};
    use crate::detect::DetectionEngine;
    use crate::frame::BgrFrame;

    #[test]
    fn periodic_schedule() {
        let writer = DiagnosticsWriter::new("/tmp", Some(10));
        assert!(!writer.is_due(0));
        assert!(!writer.is_due(9));
        assert!(writer.is_due(10));
        assert!(writer.is_due(20));
        assert!(!DiagnosticsWriter::new("/tmp", None).is_due(10));
        assert!(!DiagnosticsWriter::new("/tmp", Some(0)).is_due(10));
    }

    #[test]
    fn writes_four_images() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut engine =
            DetectionEngine::new(ColorRangeConfig::default(), &DetectorSettings::default());
        engine.filter(&BgrFrame::filled(320, 240, [90, 90, 90]));

        let mut writer = DiagnosticsWriter::new(dir.path(), None);
        writer.dump("frame", engine.stage_images());
        assert_eq!(writer.written(), 1);
        for stage in ["orig", "hsv", "mask", "bw"] {
            assert!(writer.path_for("frame", stage).exists(), "{} missing", stage);
        }
        Ok(())
    }

    #[test]
    fn nothing_processed_is_logged_not_fatal() {
        let dir = std::env::temp_dir().join("stanchion-diag-unused");
        let mut writer = DiagnosticsWriter::new(dir, None);
        writer.dump("frame", &StageImages::default());
        assert_eq!(writer.written(), 0);
    }
}
