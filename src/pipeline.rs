//! Frame pre-processing stages.
//!
//! Stages are plain data configured once at startup and applied in order.
//! Each one consumes its input frame and hands a fresh frame to the next.

use image::{GrayImage, Luma};
use imageproc::filter;
use serde::{Deserialize, Serialize};

use crate::frame::{BgrFrame, Roi};

/// Rows removed at the bottom of every frame by default (camera mount
/// offset).
const DEFAULT_BOTTOM_MARGIN: u32 = 40;

/// Region of the source frame handed to detection.
///
/// Geometry is reported relative to this region, so the horizontal center
/// used by the candidate checks is the center of the region, not of the
/// source frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CropRegion {
    Full,
    /// Full width, minus this many rows at the bottom.
    BottomMargin(u32),
    /// Fixed rectangle in source-frame pixels.
    Fixed(Roi),
}

impl Default for CropRegion {
    fn default() -> Self {
        CropRegion::BottomMargin(DEFAULT_BOTTOM_MARGIN)
    }
}

impl CropRegion {
    /// Rectangle kept from a `width` x `height` frame.
    pub fn region_for(&self, width: u32, height: u32) -> Roi {
        match *self {
            CropRegion::Full => Roi::new(0, 0, width, height),
            CropRegion::BottomMargin(rows) => Roi::new(0, 0, width, height.saturating_sub(rows)),
            CropRegion::Fixed(roi) => roi.clamp_to(width, height),
        }
    }

    /// Whether the region is non-empty and lies inside a `width` x `height`
    /// frame.
    pub fn fits(&self, width: u32, height: u32) -> bool {
        match *self {
            CropRegion::Full => width > 0 && height > 0,
            CropRegion::BottomMargin(rows) => width > 0 && rows < height,
            CropRegion::Fixed(roi) => {
                roi.width > 0 && roi.height > 0 && roi.clamp_to(width, height) == roi
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Stage {
    Crop(CropRegion),
    /// Mean filter over a square `k` x `k` window (`k` odd, >= 3).
    BoxBlur(u32),
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Crop(_) => "crop",
            Stage::BoxBlur(_) => "box_blur",
        }
    }

    pub fn apply(&self, frame: BgrFrame) -> BgrFrame {
        match self {
            Stage::Crop(region) => frame.crop(region.region_for(frame.width(), frame.height())),
            Stage::BoxBlur(k) => box_blur(frame, *k),
        }
    }
}

/// Ordered list of stages run on every frame before color conversion.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Preprocess {
    stages: Vec<Stage>,
}

impl Preprocess {
    pub fn new(stages: Vec<Stage>) -> Self {
        Self { stages }
    }

    /// Crop first, then optional blur.
    pub fn from_settings(crop: CropRegion, blur: Option<u32>) -> Self {
        let mut stages = Vec::new();
        if crop != CropRegion::Full {
            stages.push(Stage::Crop(crop));
        }
        if let Some(k) = blur.filter(|k| *k >= 3) {
            stages.push(Stage::BoxBlur(k | 1));
        }
        Self { stages }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn run(&self, frame: BgrFrame) -> BgrFrame {
        self.stages
            .iter()
            .fold(frame, |frame, stage| stage.apply(frame))
    }
}

// imageproc filters single-channel images, so each BGR plane is blurred on
// its own.
fn box_blur(mut frame: BgrFrame, k: u32) -> BgrFrame {
    if frame.is_empty() || k < 2 {
        return frame;
    }
    let (w, h) = (frame.width(), frame.height());
    let radius = k / 2;
    let planes: Vec<GrayImage> = (0..3)
        .map(|c| {
            let plane = GrayImage::from_fn(w, h, |x, y| Luma([frame.pixel(x, y)[c]]));
            filter::box_filter(&plane, radius, radius)
        })
        .collect();
    for y in 0..h {
        for x in 0..w {
            let px = [
                planes[0].get_pixel(x, y).0[0],
                planes[1].get_pixel(x, y).0[0],
                planes[2].get_pixel(x, y).0[0],
            ];
            frame.put_pixel(x, y, px);
        }
    }
    frame
}
