// SPDX-License-Identifier: GPL-3.0-only

//! Achromatic overlay drawn into the luma plane only

use super::{OverlayStrategy, for_each_mark_pixel};
use crate::config::OverlayConfig;
use crate::errors::{PlaneKind, RenderError};
use crate::frame_processor::types::BoundingBox;
use crate::media::frame::{I420Buffer, Plane};

/// Writes `stroke_luma` into Y for every mark pixel
///
/// U and V are carried over by reference, so marks show as bright (or dark)
/// regardless of the underlying colour.
#[derive(Debug, Clone, Copy, Default)]
pub struct LumaStrokeOverlay;

impl OverlayStrategy for LumaStrokeOverlay {
    fn draw(
        &self,
        buffer: &I420Buffer,
        boxes: &[BoundingBox],
        style: &OverlayConfig,
    ) -> Result<I420Buffer, RenderError> {
        let width = buffer.width();
        let height = buffer.height();
        let y_plane = buffer.y();
        let stride = y_plane.stride() as usize;

        let required = y_plane.required_len(height);
        if y_plane.stride() < width || y_plane.len() < required {
            return Err(RenderError::PlaneTooSmall {
                plane: PlaneKind::Y,
                len: y_plane.len(),
                required: required.max(width as usize * height as usize),
            });
        }

        let mut luma = y_plane.data().to_vec();
        for rect in boxes {
            for_each_mark_pixel(
                rect,
                style.stroke_thickness,
                style.marker_radius,
                width,
                height,
                |x, y| luma[y as usize * stride + x as usize] = style.stroke_luma,
            );
        }

        Ok(I420Buffer::new(
            width,
            height,
            Plane::new(luma, y_plane.stride()),
            buffer.u().clone(),
            buffer.v().clone(),
        ))
    }

    fn name(&self) -> &'static str {
        "luma-stroke"
    }
}
