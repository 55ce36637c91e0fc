//! Still image frame source.
//!
//! Decodes one image file (any format the `image` crate was built with) and
//! hands out the same frame on every call.

use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};

use super::{FrameSource, SourceStats};
use crate::frame::BgrFrame;

pub struct ImageFileSource {
    path: PathBuf,
    frame: Option<BgrFrame>,
    frames_captured: u64,
    errors: u64,
}

impl ImageFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if path.as_os_str().is_empty() {
            return Err(anyhow!("image path must not be empty"));
        }
        if path.to_string_lossy().contains("://") {
            return Err(anyhow!(
                "image source only supports local paths, got {}",
                path.display()
            ));
        }
        Ok(Self {
            path,
            frame: None,
            frames_captured: 0,
            errors: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Loads an image file as a BGR frame.
pub fn load_bgr(path: &Path) -> Result<BgrFrame> {
    let img = image::open(path)
        .with_context(|| format!("failed to decode image {}", path.display()))?;
    Ok(BgrFrame::from_rgb_image(&img.to_rgb8()))
}

impl FrameSource for ImageFileSource {
    fn connect(&mut self) -> Result<()> {
        match load_bgr(&self.path) {
            Ok(frame) => {
                log::info!(
                    "ImageFileSource: loaded {} ({}x{})",
                    self.path.display(),
                    frame.width(),
                    frame.height()
                );
                self.frame = Some(frame);
                Ok(())
            }
            Err(err) => {
                self.errors += 1;
                Err(err)
            }
        }
    }

    fn next_frame(&mut self) -> Result<BgrFrame> {
        if self.frame.is_none() {
            self.connect()?;
        }
        let frame = self
            .frame
            .clone()
            .context("image source has no frame loaded")?;
        self.frames_captured += 1;
        Ok(frame)
    }

    fn is_healthy(&self) -> bool {
        self.frame.is_some()
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frames_captured,
            errors: self.errors,
            name: self.path.display().to_string(),
        }
    }
}
