// SPDX-License-Identifier: GPL-3.0-only

//! Coloured overlay drawn through a packed RGB round trip

use super::{OverlayStrategy, for_each_mark_pixel};
use crate::config::OverlayConfig;
use crate::errors::RenderError;
use crate::frame_processor::types::BoundingBox;
use crate::media::convert::{from_rgb_image, i420_to_rgb};
use crate::media::frame::I420Buffer;
use image::Rgb;

/// Draws `stroke_color` boxes on an RGB copy and re-encodes to I420
///
/// Every pixel goes through YUV → RGB → YUV, so untouched areas pick up
/// quantization noise (luma within ±2) and chroma is re-averaged.
#[derive(Debug, Clone, Copy, Default)]
pub struct ColorBoxOverlay;

impl OverlayStrategy for ColorBoxOverlay {
    fn draw(
        &self,
        buffer: &I420Buffer,
        boxes: &[BoundingBox],
        style: &OverlayConfig,
    ) -> Result<I420Buffer, RenderError> {
        let mut rgb = i420_to_rgb(buffer)?;
        let width = rgb.width();
        let height = rgb.height();
        let color = Rgb(style.stroke_color);

        for rect in boxes {
            for_each_mark_pixel(
                rect,
                style.stroke_thickness,
                style.marker_radius,
                width,
                height,
                |x, y| rgb.put_pixel(x, y, color),
            );
        }

        Ok(from_rgb_image(&rgb)?)
    }

    fn name(&self) -> &'static str {
        "color-box"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ConversionError;
    use crate::media::convert::yuv_to_rgb;
    use crate::media::frame::Plane;

    #[test]
    fn test_draws_colored_border() {
        let buffer = I420Buffer::filled(16, 16, 60);
        let style = OverlayConfig {
            enabled: true,
            stroke_thickness: 2,
            marker_radius: 0,
            stroke_color: [255, 0, 0],
            ..OverlayConfig::default()
        };
        let out = ColorBoxOverlay
            .draw(&buffer, &[BoundingBox::new(4, 4, 11, 11)], &style)
            .unwrap();

        let rgb = i420_to_rgb(&out).unwrap();
        // Border pixel is dominated by red
        let border = rgb.get_pixel(4, 4).0;
        assert!(border[0] > border[1] && border[0] > border[2], "{:?}", border);
        // Far corner stays gray
        let corner = rgb.get_pixel(0, 0).0;
        let expected = yuv_to_rgb(60, 128, 128);
        for c in 0..3 {
            assert!((corner[c] as i32 - expected[c] as i32).abs() <= 2);
        }
        assert_eq!((out.width(), out.height()), (16, 16));
    }

    #[test]
    fn test_conversion_failure_becomes_render_error() {
        let buffer = I420Buffer::new(
            4,
            4,
            Plane::new(vec![0u8; 16], 4),
            Plane::new(vec![128u8; 1], 2),
            Plane::new(vec![128u8; 4], 2),
        );
        let err = ColorBoxOverlay
            .draw(&buffer, &[BoundingBox::new(0, 0, 1, 1)], &OverlayConfig::default())
            .unwrap_err();
        assert!(matches!(
            err,
            RenderError::Conversion(ConversionError::PlaneTooSmall { .. })
        ));
    }
}
