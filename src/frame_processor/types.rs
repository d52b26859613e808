// SPDX-License-Identifier: MPL-2.0

//! Core types for detection results
//!
//! These types represent the output of the detector and are shared between
//! the scheduler, the result cache, the overlay renderer and the event sink.

use crate::media::frame::Rotation;

/// An axis-aligned rectangle reported by the detector
///
/// Coordinates are in pixels of the detector's upright (rotation-corrected)
/// space. They may lie outside the frame; consumers clamp before use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoundingBox {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
    /// Identity assigned by the detector, if it tracks objects
    pub tracking_id: Option<i32>,
}

impl BoundingBox {
    /// Create a box, swapping edges so that `left <= right` and `top <= bottom`
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left: left.min(right),
            top: top.min(bottom),
            right: left.max(right),
            bottom: top.max(bottom),
            tracking_id: None,
        }
    }

    /// Attach a tracking id
    pub fn with_tracking_id(mut self, id: i32) -> Self {
        self.tracking_id = Some(id);
        self
    }

    /// Horizontal extent, saturating at `i32::MAX`
    pub fn width(&self) -> i32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> i32 {
        self.bottom.saturating_sub(self.top)
    }

    /// Centre point, rounded towards the top-left
    pub fn center(&self) -> (i32, i32) {
        (
            self.left + self.width() / 2,
            self.top + self.height() / 2,
        )
    }

    /// Clamp every edge into `[0, width-1] x [0, height-1]`
    ///
    /// Returns `None` for a zero-sized area or a box that does not intersect
    /// it.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }
        let max_x = (width - 1).min(i32::MAX as u32) as i32;
        let max_y = (height - 1).min(i32::MAX as u32) as i32;
        if self.right < 0 || self.bottom < 0 || self.left > max_x || self.top > max_y {
            return None;
        }
        Some(Self {
            left: self.left.clamp(0, max_x),
            top: self.top.clamp(0, max_y),
            right: self.right.clamp(0, max_x),
            bottom: self.bottom.clamp(0, max_y),
            tracking_id: self.tracking_id,
        })
    }
}

/// Detections for one source frame
///
/// Immutable once built; the cache and event sink share it behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DetectionResult {
    boxes: Vec<BoundingBox>,
    /// Frame width at detection time (buffer space)
    frame_width: u32,
    /// Frame height at detection time (buffer space)
    frame_height: u32,
    /// Timestamp of the frame the detections belong to
    timestamp_ns: i64,
}

impl DetectionResult {
    pub fn new(boxes: Vec<BoundingBox>, frame_width: u32, frame_height: u32, timestamp_ns: i64) -> Self {
        Self {
            boxes,
            frame_width,
            frame_height,
            timestamp_ns,
        }
    }

    pub fn boxes(&self) -> &[BoundingBox] {
        &self.boxes
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    pub fn frame_width(&self) -> u32 {
        self.frame_width
    }

    pub fn frame_height(&self) -> u32 {
        self.frame_height
    }

    pub fn timestamp_ns(&self) -> i64 {
        self.timestamp_ns
    }
}

/// Image handed to the detector: tightly packed NV21 plus frame metadata
#[derive(Debug, Clone)]
pub struct DetectorImage {
    /// Y plane followed by interleaved V/U samples
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Rotation reported by the capture source, in degrees
    pub rotation_degrees: i32,
    pub timestamp_ns: i64,
}

impl DetectorImage {
    /// Parsed rotation, `None` for unsupported values
    pub fn rotation(&self) -> Option<Rotation> {
        Rotation::from_degrees(self.rotation_degrees)
    }

    /// Size of the upright image the detector reasons about
    pub fn upright_dims(&self) -> (u32, u32) {
        self.rotation()
            .unwrap_or_default()
            .rotate_dims(self.width, self.height)
    }

    /// Luma sample at buffer coordinates
    pub fn luma_at(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_box_normalises_swapped_edges() {
        let b = BoundingBox::new(200, 50, 100, 10);
        assert_eq!((b.left, b.top, b.right, b.bottom), (100, 10, 200, 50));
        assert_eq!(b.width(), 100);
        assert_eq!(b.height(), 40);
        assert_eq!(b.center(), (150, 30));
    }

    #[test]
    fn test_clamp_extreme_box() {
        let b = BoundingBox::new(i32::MIN, -5, i32::MAX, 10_000).with_tracking_id(3);
        let clamped = b.clamp_to(640, 480).unwrap();
        assert_eq!(
            (clamped.left, clamped.top, clamped.right, clamped.bottom),
            (0, 0, 639, 479)
        );
        assert_eq!(clamped.tracking_id, Some(3));
        assert!(b.clamp_to(0, 480).is_none());
    }

    #[test]
    fn test_clamp_rejects_boxes_outside_frame() {
        assert!(BoundingBox::new(5000, 5000, 6000, 6000).clamp_to(640, 480).is_none());
        assert!(BoundingBox::new(-50, -50, -10, -10).clamp_to(640, 480).is_none());
        assert!(BoundingBox::new(640, 0, 700, 10).clamp_to(640, 480).is_none());
        assert!(BoundingBox::new(0, -20, 10, -1).clamp_to(640, 480).is_none());

        // Touching the last row or column still counts
        let edge = BoundingBox::new(639, 479, 900, 900).clamp_to(640, 480).unwrap();
        assert_eq!((edge.left, edge.top, edge.right, edge.bottom), (639, 479, 639, 479));
    }

    #[test]
    fn test_extent_saturates() {
        let b = BoundingBox::new(i32::MIN, i32::MIN, i32::MAX, i32::MAX);
        assert_eq!(b.width(), i32::MAX);
        assert_eq!(b.height(), i32::MAX);
        let (cx, cy) = b.center();
        assert!(cx < 0 && cy < 0);
    }

    #[test]
    fn test_detector_image_upright_dims() {
        let image = DetectorImage {
            data: vec![0; 640 * 480 * 3 / 2],
            width: 640,
            height: 480,
            rotation_degrees: 90,
            timestamp_ns: 0,
        };
        assert_eq!(image.upright_dims(), (480, 640));

        let odd = DetectorImage {
            rotation_degrees: 45,
            ..image
        };
        assert_eq!(odd.upright_dims(), (640, 480));
    }

    #[test]
    fn test_result_accessors() {
        let result = DetectionResult::new(vec![BoundingBox::new(0, 0, 1, 1)], 4, 2, 99);
        assert_eq!(result.len(), 1);
        assert!(!result.is_empty());
        assert_eq!(result.frame_width(), 4);
        assert_eq!(result.timestamp_ns(), 99);
        assert!(DetectionResult::default().is_empty());
    }
}
