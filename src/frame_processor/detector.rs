// SPDX-License-Identifier: GPL-3.0-only

//! Detector capability
//!
//! The pipeline treats object detection as an opaque capability: given an
//! NV21 image it returns bounding boxes in the upright (rotation-corrected)
//! space. Implementations run on the scheduler's blocking pool and may take
//! as long as they need.
//!
//! Two implementations ship with the crate:
//! - [`FixedDetector`] returns the same boxes for every frame
//! - [`BrightRegionDetector`] finds the bounding box of bright luma pixels,
//!   used by the demo binary with synthetic frames

use crate::errors::DetectionError;
use crate::frame_processor::types::{BoundingBox, DetectorImage};
use crate::overlay::rotation::buffer_to_detector;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{debug, trace};

/// A detection model
pub trait Detector: Send + Sync {
    /// Run detection on one image (blocking)
    fn detect(&self, image: &DetectorImage) -> Result<Vec<BoundingBox>, DetectionError>;

    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Release model resources; called once when the scheduler shuts down
    fn close(&self) {}
}

/// Detector that reports a fixed set of boxes
#[derive(Debug, Default)]
pub struct FixedDetector {
    boxes: Vec<BoundingBox>,
    calls: AtomicU64,
    closed: AtomicBool,
}

impl FixedDetector {
    pub fn new(boxes: Vec<BoundingBox>) -> Self {
        Self {
            boxes,
            calls: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Number of completed `detect` calls
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    /// Whether `close` was called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl Detector for FixedDetector {
    fn detect(&self, _image: &DetectorImage) -> Result<Vec<BoundingBox>, DetectionError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(self.boxes.clone())
    }

    fn name(&self) -> &'static str {
        "fixed"
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

/// Detects the bounding box of pixels at or above a luma threshold
///
/// Scans the Y part of the NV21 image, then reports the box in the upright
/// space so it can be drawn back through the regular rotation transform.
#[derive(Debug, Clone)]
pub struct BrightRegionDetector {
    threshold: u8,
    /// Regions with fewer matching pixels are ignored
    min_pixels: usize,
}

impl Default for BrightRegionDetector {
    fn default() -> Self {
        Self::new(200, 16)
    }
}

impl BrightRegionDetector {
    pub fn new(threshold: u8, min_pixels: usize) -> Self {
        Self {
            threshold,
            min_pixels,
        }
    }
}

impl Detector for BrightRegionDetector {
    fn detect(&self, image: &DetectorImage) -> Result<Vec<BoundingBox>, DetectionError> {
        let start = std::time::Instant::now();
        let width = image.width as usize;
        let height = image.height as usize;

        if image.data.len() < width * height {
            return Err(DetectionError::Failed(format!(
                "image holds {} bytes, need {} for luma",
                image.data.len(),
                width * height
            )));
        }

        let mut min_x = usize::MAX;
        let mut min_y = usize::MAX;
        let mut max_x = 0usize;
        let mut max_y = 0usize;
        let mut count = 0usize;

        for (row, line) in image.data[..width * height].chunks_exact(width.max(1)).enumerate() {
            for (col, &luma) in line.iter().enumerate() {
                if luma >= self.threshold {
                    min_x = min_x.min(col);
                    max_x = max_x.max(col);
                    min_y = min_y.min(row);
                    max_y = max_y.max(row);
                    count += 1;
                }
            }
        }

        trace!(
            count,
            elapsed_us = start.elapsed().as_micros(),
            "Bright region scan complete"
        );

        if count < self.min_pixels.max(1) {
            return Ok(Vec::new());
        }

        let in_buffer = BoundingBox::new(min_x as i32, min_y as i32, max_x as i32, max_y as i32);
        let upright = buffer_to_detector(
            &in_buffer,
            image.rotation().unwrap_or_default(),
            image.width,
            image.height,
        );

        debug!(
            left = upright.left,
            top = upright.top,
            right = upright.right,
            bottom = upright.bottom,
            "Detected bright region"
        );

        Ok(vec![upright])
    }

    fn name(&self) -> &'static str {
        "bright-region"
    }
}
