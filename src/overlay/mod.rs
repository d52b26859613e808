// SPDX-License-Identifier: MPL-2.0

//! Detection overlay burned into frame pixels
//!
//! The renderer takes the latest cached detections, maps them from the
//! detector's upright space into buffer space and hands them to an
//! [`OverlayStrategy`] that draws a rectangular stroke plus a centre marker.
//!
//! # Strategies
//!
//! - [`LumaStrokeOverlay`]: writes only the Y plane. Marks are achromatic and
//!   the chroma planes are shared with the input frame.
//! - [`ColorBoxOverlay`]: converts to packed RGB, draws coloured marks and
//!   re-encodes to I420. Higher cost, full colour.
//!
//! A pipeline uses exactly one strategy for its whole lifetime.
//!
//! # Coordinate System
//!
//! Boxes are clamped to the upright frame, rotated into buffer space (see
//! [`rotation`]) and clamped again to the buffer. Edges are inclusive pixel
//! coordinates and strokes grow inward from them.

pub mod color;
pub mod luma;
pub mod rotation;

pub use color::ColorBoxOverlay;
pub use luma::LumaStrokeOverlay;

use crate::config::OverlayConfig;
use crate::constants::OverlayKind;
use crate::errors::RenderError;
use crate::frame_processor::types::{BoundingBox, DetectionResult};
use crate::media::frame::{I420Buffer, Rotation, VideoFrame};
use rotation::detector_to_buffer;
use tracing::{trace, warn};

/// Pixel drawing strategy
pub trait OverlayStrategy: Send + Sync {
    /// Draw `boxes` (buffer space, already clamped) into a copy of `buffer`
    fn draw(
        &self,
        buffer: &I420Buffer,
        boxes: &[BoundingBox],
        style: &OverlayConfig,
    ) -> Result<I420Buffer, RenderError>;

    /// Short name used in logs
    fn name(&self) -> &'static str;
}

/// Maps detections into buffer space and dispatches to a strategy
pub struct OverlayRenderer {
    strategy: Box<dyn OverlayStrategy>,
}

impl Default for OverlayRenderer {
    fn default() -> Self {
        Self::new(Box::new(LumaStrokeOverlay))
    }
}

impl std::fmt::Debug for OverlayRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayRenderer")
            .field("strategy", &self.strategy.name())
            .finish()
    }
}

impl OverlayRenderer {
    pub fn new(strategy: Box<dyn OverlayStrategy>) -> Self {
        Self { strategy }
    }

    /// Renderer for one of the built-in strategies
    pub fn for_kind(kind: OverlayKind) -> Self {
        match kind {
            OverlayKind::LumaStroke => Self::new(Box::new(LumaStrokeOverlay)),
            OverlayKind::ColorBox => Self::new(Box::new(ColorBoxOverlay)),
        }
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Draw the overlay, returning the new frame or the input unchanged
    ///
    /// On a drawing error the working copy is discarded and the original
    /// frame comes back unmodified.
    pub fn render(
        &self,
        frame: VideoFrame,
        result: Option<&DetectionResult>,
        config: &OverlayConfig,
    ) -> VideoFrame {
        match self.try_render(&frame, result, config) {
            Ok(Some(buffer)) => frame.replace_buffer(buffer),
            Ok(None) => frame,
            Err(e) => {
                warn!(error = %e, strategy = self.strategy.name(), "Overlay render failed");
                frame
            }
        }
    }

    /// Draw the overlay into a new buffer
    ///
    /// Returns `Ok(None)` when there is nothing to draw: the overlay is
    /// disabled or the result holds no boxes.
    pub fn try_render(
        &self,
        frame: &VideoFrame,
        result: Option<&DetectionResult>,
        config: &OverlayConfig,
    ) -> Result<Option<I420Buffer>, RenderError> {
        if !config.enabled {
            return Ok(None);
        }
        let Some(result) = result.filter(|r| !r.is_empty()) else {
            return Ok(None);
        };

        let rotation = frame.rotation().unwrap_or_else(|| {
            warn!(
                rotation = frame.rotation_degrees(),
                "Unsupported frame rotation, drawing without transform"
            );
            Rotation::Deg0
        });

        if result.frame_width() != frame.width() || result.frame_height() != frame.height() {
            trace!(
                detected_width = result.frame_width(),
                detected_height = result.frame_height(),
                width = frame.width(),
                height = frame.height(),
                "Detection belongs to a differently sized frame, clamping to current size"
            );
        }

        let boxes = map_to_buffer(result.boxes(), rotation, frame.width(), frame.height());
        if boxes.is_empty() {
            return Ok(None);
        }

        self.strategy.draw(frame.buffer(), &boxes, config).map(Some)
    }
}

/// Clamp, rotate and re-clamp detector boxes into buffer space
pub fn map_to_buffer(
    boxes: &[BoundingBox],
    rotation: Rotation,
    width: u32,
    height: u32,
) -> Vec<BoundingBox> {
    let (dw, dh) = rotation.rotate_dims(width, height);
    boxes
        .iter()
        .filter_map(|b| b.clamp_to(dw, dh))
        .map(|b| detector_to_buffer(&b, rotation, width, height))
        .filter_map(|b| b.clamp_to(width, height))
        .collect()
}

/// Visit every pixel covered by a box's stroke and centre marker
///
/// `rect` must already be clamped to `width x height`. Pixels may be visited
/// more than once where the bands and the marker overlap.
pub(crate) fn for_each_mark_pixel(
    rect: &BoundingBox,
    thickness: u32,
    marker_radius: u32,
    width: u32,
    height: u32,
    mut plot: impl FnMut(u32, u32),
) {
    let left = rect.left.max(0) as u32;
    let top = rect.top.max(0) as u32;
    let right = (rect.right.max(0) as u32).min(width.saturating_sub(1));
    let bottom = (rect.bottom.max(0) as u32).min(height.saturating_sub(1));
    if width == 0 || height == 0 || left > right || top > bottom {
        return;
    }

    let inset = thickness.max(1) - 1;
    let top_band_end = top.saturating_add(inset).min(bottom);
    let bottom_band_start = bottom.saturating_sub(inset).max(top);
    let left_band_end = left.saturating_add(inset).min(right);
    let right_band_start = right.saturating_sub(inset).max(left);

    for y in top..=bottom {
        let horizontal = y <= top_band_end || y >= bottom_band_start;
        if horizontal {
            for x in left..=right {
                plot(x, y);
            }
        } else {
            for x in left..=left_band_end {
                plot(x, y);
            }
            for x in right_band_start..=right {
                plot(x, y);
            }
        }
    }

    if marker_radius == 0 {
        return;
    }
    let (cx, cy) = rect.center();
    let r = marker_radius as i64;
    for dy in -r..=r {
        let y = cy as i64 + dy;
        if y < 0 || y >= height as i64 {
            continue;
        }
        for dx in -r..=r {
            let x = cx as i64 + dx;
            if x < 0 || x >= width as i64 || dx * dx + dy * dy > r * r {
                continue;
            }
            plot(x as u32, y as u32);
        }
    }
}
