//! Binary morphology on 0/255 masks.
//!
//! Structuring elements are solid rectangles anchored at their center
//! (`size / 2` on each axis).

use image::{GrayImage, Luma};
use imageproc::morphology::{grayscale_dilate, grayscale_erode, Mask};
use serde::{Deserialize, Serialize};

/// Rectangular structuring element size in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Kernel {
    pub width: u32,
    pub height: u32,
}

impl Kernel {
    /// Largest side a structuring element may have.
    pub const MAX_SIDE: u32 = 255;

    pub const fn square(size: u32) -> Self {
        Self {
            width: size,
            height: size,
        }
    }

    /// Kernel grown by `by` pixels in each dimension.
    pub const fn grown(self, by: u32) -> Self {
        Self {
            width: self.width + by,
            height: self.height + by,
        }
    }

    fn mask(self) -> Mask {
        let w = self.width.clamp(1, Self::MAX_SIDE);
        let h = self.height.clamp(1, Self::MAX_SIDE);
        let solid = GrayImage::from_pixel(w, h, Luma([255]));
        Mask::from_image(&solid, (w / 2) as u8, (h / 2) as u8)
    }
}

pub fn erode(mask: &GrayImage, kernel: Kernel) -> GrayImage {
    if mask.width() == 0 || mask.height() == 0 {
        return mask.clone();
    }
    grayscale_erode(mask, &kernel.mask())
}

pub fn dilate(mask: &GrayImage, kernel: Kernel) -> GrayImage {
    if mask.width() == 0 || mask.height() == 0 {
        return mask.clone();
    }
    grayscale_dilate(mask, &kernel.mask())
}

/// Erode then dilate. Specks smaller than the erosion kernel disappear
/// before the (larger) dilation kernel closes gaps inside the survivors.
pub fn open(mask: &GrayImage, erode_kernel: Kernel, dilate_kernel: Kernel) -> GrayImage {
    dilate(&erode(mask, erode_kernel), dilate_kernel)
}
