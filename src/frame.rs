//! Owned BGR frames.
//!
//! Every pipeline stage takes a `BgrFrame` by value and returns a new one, so
//! a raw capture, the cropped frame and any later intermediate never alias
//! the same buffer.

use anyhow::{anyhow, Result};
use image::RgbImage;
use serde::{Deserialize, Serialize};

/// Packed 8-bit BGR image, row-major, no padding.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BgrFrame {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl BgrFrame {
    /// Wraps raw BGR bytes. A length that does not match `width * height * 3`
    /// is a caller bug and is rejected here rather than inside detection.
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("BGR frame dimensions overflow"))?;
        if data.len() != expected {
            return Err(anyhow!(
                "BGR frame length mismatch: expected {}, got {}",
                expected,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Frame with every pixel set to one BGR color.
    pub fn filled(width: u32, height: u32, bgr: [u8; 3]) -> Self {
        let count = width as usize * height as usize;
        let mut data = Vec::with_capacity(count * 3);
        for _ in 0..count {
            data.extend_from_slice(&bgr);
        }
        Self {
            data,
            width,
            height,
        }
    }

    pub fn from_rgb_image(img: &RgbImage) -> Self {
        let (width, height) = img.dimensions();
        let mut data = Vec::with_capacity(width as usize * height as usize * 3);
        for px in img.pixels() {
            let [r, g, b] = px.0;
            data.extend_from_slice(&[b, g, r]);
        }
        Self {
            data,
            width,
            height,
        }
    }

    pub fn to_rgb_image(&self) -> RgbImage {
        RgbImage::from_fn(self.width, self.height, |x, y| {
            let [b, g, r] = self.pixel(x, y);
            image::Rgb([r, g, b])
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let i = (y as usize * self.width as usize + x as usize) * 3;
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }

    pub fn put_pixel(&mut self, x: u32, y: u32, bgr: [u8; 3]) {
        let i = (y as usize * self.width as usize + x as usize) * 3;
        self.data[i..i + 3].copy_from_slice(&bgr);
    }

    /// Paints a solid rectangle, clipped to the frame.
    pub fn fill_rect(&mut self, roi: Roi, bgr: [u8; 3]) {
        let clipped = roi.clamp_to(self.width, self.height);
        for y in clipped.y..clipped.y + clipped.height {
            for x in clipped.x..clipped.x + clipped.width {
                self.put_pixel(x, y, bgr);
            }
        }
    }

    /// Copies out the region of interest. Parts outside the frame are
    /// dropped; a region entirely outside yields an empty frame.
    pub fn crop(&self, roi: Roi) -> BgrFrame {
        let clipped = roi.clamp_to(self.width, self.height);
        let row_bytes = clipped.width as usize * 3;
        let mut data = Vec::with_capacity(row_bytes * clipped.height as usize);
        for y in clipped.y..clipped.y + clipped.height {
            let start = (y as usize * self.width as usize + clipped.x as usize) * 3;
            data.extend_from_slice(&self.data[start..start + row_bytes]);
        }
        BgrFrame {
            data,
            width: clipped.width,
            height: clipped.height,
        }
    }
}

/// Fixed region of interest in source-frame pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roi {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Roi {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Intersection with a `width` x `height` frame anchored at the origin.
    pub fn clamp_to(&self, width: u32, height: u32) -> Roi {
        let x0 = self.x.min(width);
        let y0 = self.y.min(height);
        let x1 = self.x.saturating_add(self.width).min(width);
        let y1 = self.y.saturating_add(self.height).min(height);
        Roi {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_rejects_length_mismatch() {
        assert!(BgrFrame::new(vec![0u8; 11], 2, 2).is_err());
        assert!(BgrFrame::new(vec![0u8; 12], 2, 2).is_ok());
        assert!(BgrFrame::new(Vec::new(), 0, 0).unwrap().is_empty());
    }

    #[test]
    fn crop_clamps_to_frame() {
        let mut frame = BgrFrame::filled(8, 6, [1, 2, 3]);
        frame.put_pixel(7, 5, [9, 9, 9]);

        let cropped = frame.crop(Roi::new(4, 3, 10, 10));
        assert_eq!((cropped.width(), cropped.height()), (4, 3));
        assert_eq!(cropped.pixel(3, 2), [9, 9, 9]);
        assert_eq!(cropped.pixel(0, 0), [1, 2, 3]);

        let outside = frame.crop(Roi::new(20, 20, 5, 5));
        assert!(outside.is_empty());
    }

    #[test]
    fn rgb_round_trip_swaps_channels() {
        let frame = BgrFrame::filled(2, 1, [10, 20, 30]);
        let rgb = frame.to_rgb_image();
        assert_eq!(rgb.get_pixel(0, 0).0, [30, 20, 10]);
        assert_eq!(BgrFrame::from_rgb_image(&rgb), frame);
    }
}
