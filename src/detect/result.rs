use std::fmt;

use serde::{Deserialize, Serialize};

/// A color the engine knows how to look for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetColor {
    Red,
    Yellow,
}

impl TargetColor {
    pub fn name(self) -> &'static str {
        match self {
            TargetColor::Red => "red",
            TargetColor::Yellow => "yellow",
        }
    }
}

/// Color reported for the last frame.
///
/// `None` is the zero value and orders below every found color.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(i32)]
pub enum Found {
    #[default]
    None = 0,
    Red = 1,
    Yellow = 2,
}

impl Found {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Unknown discriminants decode as `None`.
    pub fn from_i32(value: i32) -> Self {
        match value {
            1 => Found::Red,
            2 => Found::Yellow,
            _ => Found::None,
        }
    }

    pub fn is_found(self) -> bool {
        self != Found::None
    }

    pub fn color(self) -> Option<TargetColor> {
        match self {
            Found::None => None,
            Found::Red => Some(TargetColor::Red),
            Found::Yellow => Some(TargetColor::Yellow),
        }
    }
}

impl From<TargetColor> for Found {
    fn from(color: TargetColor) -> Self {
        match color {
            TargetColor::Red => Found::Red,
            TargetColor::Yellow => Found::Yellow,
        }
    }
}

/// Integer pixel coordinate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned box in cropped-frame pixel coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl BoundingBox {
    /// Smallest box covering every point, both extreme pixels included.
    /// An empty slice yields a zero-sized box.
    pub fn of(points: &[Point]) -> Self {
        let Some(first) = points.first() else {
            return Self::default();
        };
        let (mut min_x, mut max_x, mut min_y, mut max_y) = (first.x, first.x, first.y, first.y);
        for p in &points[1..] {
            min_x = min_x.min(p.x);
            max_x = max_x.max(p.x);
            min_y = min_y.min(p.y);
            max_y = max_y.max(p.y);
        }
        Self {
            x: min_x,
            y: min_y,
            width: max_x - min_x + 1,
            height: max_y - min_y + 1,
        }
    }

    pub fn x_mid(&self) -> i32 {
        self.x + self.width / 2
    }

    /// First row below the box.
    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn area(&self) -> i64 {
        self.width as i64 * self.height as i64
    }
}

/// Tagged view of the last frame's outcome.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Detection {
    None,
    Found {
        color: TargetColor,
        bbox: BoundingBox,
    },
}

/// Latest-result state owned by the engine and overwritten every frame.
///
/// When `color_found` is `Found::None` every geometry field is zero.
/// `consistency_marker` equals `frame_index` only once a frame has been
/// fully evaluated; the published record relies on that pairing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DetectionResult {
    pub frame_index: i32,
    pub color_found: Found,
    pub box_width: i32,
    pub box_height: i32,
    pub x_mid: i32,
    pub y_bottom: i32,
    pub consistency_marker: i32,
}

impl DetectionResult {
    /// Clears the outcome and advances the frame counter. The counter wraps
    /// at `i32::MAX` because the wire field is a signed 32-bit integer.
    pub(crate) fn begin_frame(&mut self) {
        self.frame_index = self.frame_index.wrapping_add(1);
        self.color_found = Found::None;
        self.box_width = 0;
        self.box_height = 0;
        self.x_mid = 0;
        self.y_bottom = 0;
    }

    pub(crate) fn record_hit(&mut self, color: TargetColor, bbox: &BoundingBox) {
        self.color_found = color.into();
        self.box_width = bbox.width;
        self.box_height = bbox.height;
        self.x_mid = bbox.x_mid();
        self.y_bottom = bbox.bottom();
    }

    pub(crate) fn seal(&mut self) {
        self.consistency_marker = self.frame_index;
    }

    pub fn is_consistent(&self) -> bool {
        self.frame_index == self.consistency_marker
    }

    /// Left edge reconstructed from the midpoint and width.
    pub fn box_x(&self) -> i32 {
        self.x_mid - self.box_width / 2
    }

    /// Top edge reconstructed from the bottom and height.
    pub fn box_y(&self) -> i32 {
        self.y_bottom - self.box_height
    }

    pub fn detection(&self) -> Detection {
        match self.color_found.color() {
            None => Detection::None,
            Some(color) => Detection::Found {
                color,
                bbox: BoundingBox {
                    x: self.box_x(),
                    y: self.box_y(),
                    width: self.box_width,
                    height: self.box_height,
                },
            },
        }
    }
}

impl fmt::Display for DetectionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Filter frames processed: {}  Found: ",
            self.frame_index
        )?;
        match self.color_found {
            Found::None => return write!(f, " Nothing"),
            Found::Red => writeln!(f, " Red Stanchion")?,
            Found::Yellow => writeln!(f, " Yellow Stanchion")?,
        }
        write!(
            f,
            "  Width: {}  Height: {}  X-Mid: {}  Y-Bot: {}",
            self.box_width, self.box_height, self.x_mid, self.y_bottom
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn found_none_is_default_and_smallest() {
        assert_eq!(Found::default(), Found::None);
        assert!(Found::None < Found::Red);
        assert!(Found::None < Found::Yellow);
        assert_eq!(Found::from_i32(7), Found::None);
        assert_eq!(Found::from_i32(Found::Yellow.as_i32()), Found::Yellow);
    }

    #[test]
    fn bounding_box_includes_both_extremes() {
        let pts = [
            Point::new(10, 5),
            Point::new(29, 5),
            Point::new(29, 45),
            Point::new(10, 45),
        ];
        let bbox = BoundingBox::of(&pts);
        assert_eq!(bbox, BoundingBox { x: 10, y: 5, width: 20, height: 41 });
        assert_eq!(bbox.x_mid(), 20);
        assert_eq!(bbox.bottom(), 46);
        assert_eq!(BoundingBox::of(&[]), BoundingBox::default());
    }

    #[test]
    fn begin_frame_clears_geometry() {
        let mut result = DetectionResult::default();
        result.begin_frame();
        result.record_hit(
            TargetColor::Red,
            &BoundingBox { x: 4, y: 2, width: 20, height: 50 },
        );
        result.seal();
        assert!(result.is_consistent());
        assert_eq!(
            result.detection(),
            Detection::Found {
                color: TargetColor::Red,
                bbox: BoundingBox { x: 4, y: 2, width: 20, height: 50 },
            }
        );

        result.begin_frame();
        assert_eq!(result.frame_index, 2);
        assert_eq!(result.color_found, Found::None);
        assert_eq!(
            (result.box_width, result.box_height, result.x_mid, result.y_bottom),
            (0, 0, 0, 0)
        );
        assert!(!result.is_consistent());
        assert_eq!(result.detection(), Detection::None);
    }

    #[test]
    fn display_matches_summary_format() {
        let mut result = DetectionResult::default();
        result.begin_frame();
        result.seal();
        assert_eq!(result.to_string(), "Filter frames processed: 1  Found:  Nothing");

        result.record_hit(
            TargetColor::Yellow,
            &BoundingBox { x: 0, y: 0, width: 20, height: 60 },
        );
        let text = result.to_string();
        assert!(text.contains("Yellow Stanchion"));
        assert!(text.contains("Height: 60"));
    }
}
