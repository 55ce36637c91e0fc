use crate::detect::{DetectionResult, Found};

/// Size of one serialized record in bytes.
pub const RECORD_LEN: usize = 28;

/// Wire form of a detection result: seven little-endian `i32`s at fixed
/// offsets, in declaration order.
///
/// A reader that sees `frame_index != consistency_marker` has caught the
/// file mid-write and must read again.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResultRecord {
    pub frame_index: i32,
    pub color_found: i32,
    pub box_width: i32,
    pub box_height: i32,
    pub x_mid: i32,
    pub y_bottom: i32,
    pub consistency_marker: i32,
}

impl ResultRecord {
    fn fields(&self) -> [i32; 7] {
        [
            self.frame_index,
            self.color_found,
            self.box_width,
            self.box_height,
            self.x_mid,
            self.y_bottom,
            self.consistency_marker,
        ]
    }

    pub fn to_bytes(&self) -> [u8; RECORD_LEN] {
        let mut out = [0u8; RECORD_LEN];
        for (chunk, value) in out.chunks_exact_mut(4).zip(self.fields()) {
            chunk.copy_from_slice(&value.to_le_bytes());
        }
        out
    }

    pub fn from_bytes(bytes: &[u8; RECORD_LEN]) -> Self {
        let mut fields = [0i32; 7];
        for (value, chunk) in fields.iter_mut().zip(bytes.chunks_exact(4)) {
            *value = i32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        let [frame_index, color_found, box_width, box_height, x_mid, y_bottom, consistency_marker] =
            fields;
        Self {
            frame_index,
            color_found,
            box_width,
            box_height,
            x_mid,
            y_bottom,
            consistency_marker,
        }
    }

    pub fn is_consistent(&self) -> bool {
        self.frame_index == self.consistency_marker
    }

    /// Unknown color codes read as `Found::None`.
    pub fn found(&self) -> Found {
        Found::from_i32(self.color_found)
    }
}

impl From<&DetectionResult> for ResultRecord {
    fn from(result: &DetectionResult) -> Self {
        Self {
            frame_index: result.frame_index,
            color_found: result.color_found.as_i32(),
            box_width: result.box_width,
            box_height: result.box_height,
            x_mid: result.x_mid,
            y_bottom: result.y_bottom,
            consistency_marker: result.consistency_marker,
        }
    }
}
