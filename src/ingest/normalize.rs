use anyhow::{anyhow, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PixelFormat {
    Bgr24,
    Rgb24,
    Nv12,
    Yuyv,
}

/// Converts a captured buffer to packed BGR.
pub(crate) fn normalize_to_bgr(
    pixels: &[u8],
    width: u32,
    height: u32,
    format: PixelFormat,
) -> Result<Vec<u8>> {
    match format {
        PixelFormat::Bgr24 => {
            check_len(pixels, packed_len(width, height)?, "BGR")?;
            Ok(pixels.to_vec())
        }
        PixelFormat::Rgb24 => rgb_to_bgr(pixels, width, height),
        PixelFormat::Nv12 => nv12_to_bgr(pixels, width, height),
        PixelFormat::Yuyv => yuyv_to_bgr(pixels, width, height),
    }
}

fn plane_len(width: u32, height: u32, what: &str) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .ok_or_else(|| anyhow!("{} frame dimensions overflow", what))
}

fn check_len(pixels: &[u8], expected: usize, what: &str) -> Result<()> {
    if pixels.len() != expected {
        return Err(anyhow!(
            "{} frame length mismatch: expected {}, got {}",
            what,
            expected,
            pixels.len()
        ));
    }
    Ok(())
}

fn packed_len(width: u32, height: u32) -> Result<usize> {
    plane_len(width, height, "packed")?
        .checked_mul(3)
        .ok_or_else(|| anyhow!("packed frame dimensions overflow"))
}

fn rgb_to_bgr(pixels: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    check_len(pixels, packed_len(width, height)?, "RGB")?;
    Ok(pixels
        .chunks_exact(3)
        .flat_map(|px| [px[2], px[1], px[0]])
        .collect())
}

fn nv12_to_bgr(pixels: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let w = width as usize;
    let h = height as usize;
    let y_plane = plane_len(width, height, "NV12")?;
    let expected = y_plane
        .checked_add(y_plane / 2)
        .ok_or_else(|| anyhow!("NV12 frame dimensions overflow"))?;
    check_len(pixels, expected, "NV12")?;

    let mut bgr = vec![0u8; y_plane * 3];
    for j in 0..h {
        for i in 0..w {
            let y = pixels[j * w + i];
            let uv_index = y_plane + (j / 2) * w + (i / 2) * 2;
            let offset = (j * w + i) * 3;
            bgr[offset..offset + 3]
                .copy_from_slice(&yuv_to_bgr(y, pixels[uv_index], pixels[uv_index + 1]));
        }
    }
    Ok(bgr)
}

// Packed 4:2:2, two pixels per Y0 U Y1 V group.
fn yuyv_to_bgr(pixels: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    if width % 2 != 0 {
        return Err(anyhow!("YUYV frame width must be even, got {}", width));
    }
    let count = plane_len(width, height, "YUYV")?;
    check_len(pixels, count * 2, "YUYV")?;

    let mut bgr = Vec::with_capacity(count * 3);
    for group in pixels.chunks_exact(4) {
        let (y0, u, y1, v) = (group[0], group[1], group[2], group[3]);
        bgr.extend_from_slice(&yuv_to_bgr(y0, u, v));
        bgr.extend_from_slice(&yuv_to_bgr(y1, u, v));
    }
    Ok(bgr)
}

fn yuv_to_bgr(y: u8, u: u8, v: u8) -> [u8; 3] {
    let y = y as f32;
    let u = u as f32 - 128.0;
    let v = v as f32 - 128.0;

    let r = y + 1.402_f32 * v;
    let g = y - 0.344_136_f32 * u - 0.714_136_f32 * v;
    let b = y + 1.772_f32 * u;
    [clamp_to_u8(b), clamp_to_u8(g), clamp_to_u8(r)]
}

fn clamp_to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nv12_conversion_produces_gray() -> Result<()> {
        let y_plane = vec![128u8; 4];
        let uv_plane = vec![128u8; 2];
        let nv12 = [y_plane, uv_plane].concat();

        let bgr = normalize_to_bgr(&nv12, 2, 2, PixelFormat::Nv12)?;
        assert_eq!(bgr, vec![128u8; 12]);
        Ok(())
    }

    #[test]
    fn rgb_is_swapped_to_bgr() -> Result<()> {
        let pixels = vec![10, 20, 30, 1, 2, 3];
        let bgr = normalize_to_bgr(&pixels, 2, 1, PixelFormat::Rgb24)?;
        assert_eq!(bgr, vec![30, 20, 10, 3, 2, 1]);
        assert!(normalize_to_bgr(&pixels, 1, 1, PixelFormat::Rgb24).is_err());
        Ok(())
    }

    #[test]
    fn yuyv_expands_two_pixels_per_group() -> Result<()> {
        let yuyv = vec![50, 128, 200, 128];
        let bgr = normalize_to_bgr(&yuyv, 2, 1, PixelFormat::Yuyv)?;
        assert_eq!(bgr, vec![50, 50, 50, 200, 200, 200]);
        assert!(normalize_to_bgr(&yuyv, 1, 2, PixelFormat::Yuyv).is_err());
        Ok(())
    }
}
