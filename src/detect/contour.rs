//! Outer contour extraction and polygon simplification.
//!
//! Only outer borders of top-level components are kept; blobs sitting
//! inside another blob's hole are skipped.

use image::GrayImage;
use imageproc::contours::{find_contours, BorderType, Contour};
use imageproc::geometry::approximate_polygon_dp;
use imageproc::point::Point as PixelPoint;

use crate::detect::result::Point;

/// Outer boundaries of every external component, in discovery (raster)
/// order. Any non-zero mask pixel is foreground.
pub fn external_contours(mask: &GrayImage) -> Vec<Vec<Point>> {
    if mask.width() == 0 || mask.height() == 0 {
        return Vec::new();
    }
    find_contours::<i32>(mask)
        .into_iter()
        .filter(is_external)
        .map(|c| c.points.iter().map(|p| Point::new(p.x, p.y)).collect())
        .collect()
}

fn is_external(contour: &Contour<i32>) -> bool {
    contour.border_type == BorderType::Outer && contour.parent.is_none()
}

/// Douglas–Peucker simplification of a closed contour. The closing vertex
/// is not repeated in the output.
pub fn approx_polygon(contour: &[Point], epsilon: f64) -> Vec<Point> {
    if contour.len() <= 2 || epsilon <= 0.0 {
        return contour.to_vec();
    }
    let curve: Vec<PixelPoint<i32>> = contour
        .iter()
        .map(|p| PixelPoint::new(p.x, p.y))
        .collect();
    let mut polygon: Vec<Point> = approximate_polygon_dp(&curve, epsilon, true)
        .into_iter()
        .map(|p| Point::new(p.x, p.y))
        .collect();
    while polygon.len() > 1 && polygon.first() == polygon.last() {
        polygon.pop();
    }
    polygon
}

/// External contours of `mask`, each reduced to a simplified polygon.
pub fn extract_polygons(mask: &GrayImage, epsilon: f64) -> Vec<Vec<Point>> {
    external_contours(mask)
        .iter()
        .map(|c| approx_polygon(c, epsilon))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::result::BoundingBox;

    fn mask_with_rects(w: u32, h: u32, rects: &[(u32, u32, u32, u32)]) -> GrayImage {
        let mut m = GrayImage::new(w, h);
        for &(x, y, rw, rh) in rects {
            for yy in y..y + rh {
                for xx in x..x + rw {
                    m.put_pixel(xx, yy, image::Luma([255]));
                }
            }
        }
        m
    }

    #[test]
    fn empty_mask_has_no_contours() {
        assert!(external_contours(&GrayImage::new(10, 10)).is_empty());
        assert!(external_contours(&GrayImage::new(0, 0)).is_empty());
    }

    #[test]
    fn solid_rectangle_simplifies_to_its_corners() {
        let mask = mask_with_rects(40, 60, &[(10, 5, 20, 41)]);
        let polys = extract_polygons(&mask, 6.0);
        assert_eq!(polys.len(), 1);
        let poly = &polys[0];
        // the contour's closing neighbour of the start corner may survive
        assert!((4..=5).contains(&poly.len()), "{:?}", poly);
        for corner in [
            Point::new(10, 5),
            Point::new(29, 5),
            Point::new(29, 45),
            Point::new(10, 45),
        ] {
            assert!(poly.contains(&corner), "missing {:?} in {:?}", corner, poly);
        }
        assert_eq!(
            BoundingBox::of(poly),
            BoundingBox { x: 10, y: 5, width: 20, height: 41 }
        );
    }

    #[test]
    fn outline_covers_component_bounds() {
        let mask = mask_with_rects(6, 6, &[(1, 1, 3, 2)]);
        let contours = external_contours(&mask);
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0][0], Point::new(1, 1));
        assert_eq!(
            BoundingBox::of(&contours[0]),
            BoundingBox { x: 1, y: 1, width: 3, height: 2 }
        );
    }

    #[test]
    fn contours_come_in_raster_order() {
        let mask = mask_with_rects(12, 12, &[(8, 6, 2, 2), (5, 1, 1, 4), (1, 1, 2, 2)]);
        let starts: Vec<Point> = external_contours(&mask).iter().map(|c| c[0]).collect();
        assert_eq!(
            starts,
            vec![Point::new(1, 1), Point::new(5, 1), Point::new(8, 6)]
        );
    }

    #[test]
    fn blob_inside_hole_is_not_reported() {
        // 12x12 ring with a 2x2 island in the middle
        let mut mask = mask_with_rects(20, 20, &[(2, 2, 12, 12)]);
        for y in 4..12 {
            for x in 4..12 {
                mask.put_pixel(x, y, image::Luma([0]));
            }
        }
        for y in 7..9 {
            for x in 7..9 {
                mask.put_pixel(x, y, image::Luma([255]));
            }
        }
        let contours = external_contours(&mask);
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0][0], Point::new(2, 2));
    }

    #[test]
    fn components_touching_edges_are_external() {
        let mask = mask_with_rects(10, 10, &[(0, 0, 3, 10), (7, 0, 3, 10)]);
        assert_eq!(external_contours(&mask).len(), 2);
    }

    #[test]
    fn short_contours_pass_through() {
        let single = vec![Point::new(2, 2)];
        assert_eq!(approx_polygon(&single, 6.0), single);
    }
}
