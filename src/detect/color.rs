//! Color-space conversion and range thresholding.
//!
//! HSV follows the 8-bit convention: hue is stored as degrees / 2 (0..=179),
//! saturation and value span 0..=255.

use image::{GrayImage, Luma, RgbImage};

use crate::detect::result::TargetColor;
use crate::frame::BgrFrame;

/// Largest stored hue value.
pub const HUE_MAX: u8 = 179;

/// Inclusive per-channel HSV bounds for one target color.
///
/// A lower hue above the upper hue describes a band that wraps through 0.
/// The all-zero range is treated as unset and matches nothing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ColorRange {
    pub lower: [u8; 3],
    pub upper: [u8; 3],
}

impl ColorRange {
    pub const fn new(lower: [u8; 3], upper: [u8; 3]) -> Self {
        Self { lower, upper }
    }

    /// Builds a range from `lower0, upper0, lower1, upper1, lower2, upper2`.
    pub fn from_interleaved(values: [u8; 6]) -> Self {
        Self {
            lower: [values[0], values[2], values[4]],
            upper: [values[1], values[3], values[5]],
        }
    }

    pub fn is_unset(&self) -> bool {
        self.lower == [0; 3] && self.upper == [0; 3]
    }

    pub fn wraps(&self) -> bool {
        self.lower[0] > self.upper[0]
    }

    /// Same saturation/value bounds over the hue band `lo..=hi`.
    pub fn with_hue(&self, lo: u8, hi: u8) -> Self {
        Self {
            lower: [lo, self.lower[1], self.lower[2]],
            upper: [hi, self.upper[1], self.upper[2]],
        }
    }

    pub fn contains(&self, hsv: [u8; 3]) -> bool {
        let hue_ok = if self.wraps() {
            hsv[0] >= self.lower[0] || hsv[0] <= self.upper[0]
        } else {
            hsv[0] >= self.lower[0] && hsv[0] <= self.upper[0]
        };
        hue_ok
            && (self.lower[1]..=self.upper[1]).contains(&hsv[1])
            && (self.lower[2]..=self.upper[2]).contains(&hsv[2])
    }
}

/// Packed HSV image with the same geometry as its source frame.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HsvImage {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl HsvImage {
    pub fn from_bgr(frame: &BgrFrame) -> Self {
        let data = frame
            .as_bytes()
            .chunks_exact(3)
            .flat_map(|px| bgr_to_hsv([px[0], px[1], px[2]]))
            .collect();
        Self {
            data,
            width: frame.width(),
            height: frame.height(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let i = (y as usize * self.width as usize + x as usize) * 3;
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }

    /// Raw channels written as RGB, for diagnostic dumps only.
    pub fn to_rgb_image(&self) -> RgbImage {
        RgbImage::from_fn(self.width, self.height, |x, y| image::Rgb(self.pixel(x, y)))
    }

    fn pixels(&self) -> impl Iterator<Item = [u8; 3]> + '_ {
        self.data.chunks_exact(3).map(|c| [c[0], c[1], c[2]])
    }
}

/// Converts one BGR sample to 8-bit HSV.
pub fn bgr_to_hsv(bgr: [u8; 3]) -> [u8; 3] {
    let [b, g, r] = bgr.map(|c| c as f32);
    let v = r.max(g).max(b);
    let min = r.min(g).min(b);
    let diff = v - min;
    let s = if v > 0.0 { 255.0 * diff / v } else { 0.0 };
    let mut h = if diff == 0.0 {
        0.0
    } else if v == r {
        60.0 * (g - b) / diff
    } else if v == g {
        120.0 + 60.0 * (b - r) / diff
    } else {
        240.0 + 60.0 * (r - g) / diff
    };
    if h < 0.0 {
        h += 360.0;
    }
    let hue = (h / 2.0).round() as u32 % (HUE_MAX as u32 + 1);
    [hue as u8, s.round() as u8, v as u8]
}

/// 255 where the pixel lies inside `range`, 0 elsewhere.
pub fn threshold(hsv: &HsvImage, range: &ColorRange) -> GrayImage {
    if range.is_unset() {
        return GrayImage::new(hsv.width(), hsv.height());
    }
    let data = hsv
        .pixels()
        .map(|px| if range.contains(px) { 255 } else { 0 })
        .collect();
    GrayImage::from_raw(hsv.width(), hsv.height(), data)
        .unwrap_or_else(|| GrayImage::new(hsv.width(), hsv.height()))
}

/// Binary mask for one target color.
///
/// Red sits on both ends of the hue circle, so its mask is the configured
/// band OR-ed with the low band `0..=red_wrap_hue` at the same
/// saturation/value bounds.
pub fn segment(
    hsv: &HsvImage,
    color: TargetColor,
    range: &ColorRange,
    red_wrap_hue: u8,
) -> GrayImage {
    let mut mask = threshold(hsv, range);
    if color == TargetColor::Red && !range.is_unset() {
        let low = threshold(hsv, &range.with_hue(0, red_wrap_hue));
        or_into(&mut mask, &low);
    }
    mask
}

fn or_into(dst: &mut GrayImage, src: &GrayImage) {
    for (d, s) in dst.pixels_mut().zip(src.pixels()) {
        *d = Luma([d.0[0] | s.0[0]]);
    }
}
