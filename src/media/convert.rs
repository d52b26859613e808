// SPDX-License-Identifier: GPL-3.0-only
//! Pixel format conversion between planar, semi-planar and packed layouts
//!
//! - I420 → NV21/NV12 for the detector (row-by-row copy honouring strides)
//! - I420 → packed RGB for drawing paths that need colour
//! - packed RGB → I420 to re-encode a drawn frame
//!
//! YUV ↔ RGB uses full-range BT.601 coefficients with rounding and clamping.
//! Chroma subsampling on the way back averages each 2x2 block (edge blocks of
//! odd-sized frames average only the samples that exist), so repeated round
//! trips settle instead of drifting.

use crate::errors::{ConversionError, PlaneKind};
use crate::media::frame::{I420Buffer, Plane, VideoFrame, chroma_dim};
use image::RgbImage;

/// Interleave order of the chroma plane in semi-planar output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SemiPlanarLayout {
    /// V first, then U (what the detector expects)
    #[default]
    Nv21,
    /// U first, then V
    Nv12,
}

/// Exact byte length of a semi-planar 4:2:0 image
pub fn semi_planar_len(width: u32, height: u32) -> usize {
    let luma = width as usize * height as usize;
    let chroma = chroma_dim(width) as usize * chroma_dim(height) as usize;
    luma + 2 * chroma
}

/// Check that every plane can be read with its stride for the frame geometry
pub fn validate_planes(buffer: &I420Buffer) -> Result<(), ConversionError> {
    let width = buffer.width();
    let height = buffer.height();
    if width == 0 || height == 0 {
        return Err(ConversionError::EmptyFrame { width, height });
    }

    let cw = buffer.chroma_width();
    let ch = buffer.chroma_height();
    check_plane(PlaneKind::Y, buffer.y(), width, height)?;
    check_plane(PlaneKind::U, buffer.u(), cw, ch)?;
    check_plane(PlaneKind::V, buffer.v(), cw, ch)?;
    Ok(())
}

fn check_plane(
    kind: PlaneKind,
    plane: &Plane,
    row_width: u32,
    rows: u32,
) -> Result<(), ConversionError> {
    if plane.stride() < row_width {
        return Err(ConversionError::StrideTooSmall {
            plane: kind,
            stride: plane.stride(),
            row_width,
        });
    }
    let required = plane.required_len(rows);
    if plane.len() < required {
        return Err(ConversionError::PlaneTooSmall {
            plane: kind,
            len: plane.len(),
            required,
        });
    }
    Ok(())
}

/// Convert a frame to NV21 for the detector
pub fn to_semi_planar(frame: &VideoFrame) -> Result<Vec<u8>, ConversionError> {
    to_semi_planar_with(frame, SemiPlanarLayout::Nv21)
}

/// Convert a frame to the given semi-planar layout
pub fn to_semi_planar_with(
    frame: &VideoFrame,
    layout: SemiPlanarLayout,
) -> Result<Vec<u8>, ConversionError> {
    i420_to_semi_planar(frame.buffer(), layout)
}

/// Convert a planar buffer to a semi-planar byte sequence
///
/// Output is tightly packed: `width*height` luma bytes followed by
/// `ceil(width/2)*ceil(height/2)` interleaved chroma pairs.
pub fn i420_to_semi_planar(
    buffer: &I420Buffer,
    layout: SemiPlanarLayout,
) -> Result<Vec<u8>, ConversionError> {
    validate_planes(buffer)?;

    let width = buffer.width() as usize;
    let height = buffer.height() as usize;
    let cw = buffer.chroma_width() as usize;
    let ch = buffer.chroma_height() as usize;

    let mut output = Vec::with_capacity(semi_planar_len(buffer.width(), buffer.height()));

    // Copy Y plane without stride padding
    let y_plane = buffer.y().data();
    let y_stride = buffer.y().stride() as usize;
    for row in 0..height {
        let start = row * y_stride;
        output.extend_from_slice(&y_plane[start..start + width]);
    }

    let (first, second) = match layout {
        SemiPlanarLayout::Nv21 => (buffer.v(), buffer.u()),
        SemiPlanarLayout::Nv12 => (buffer.u(), buffer.v()),
    };
    let first_stride = first.stride() as usize;
    let second_stride = second.stride() as usize;

    for row in 0..ch {
        let first_row = &first.data()[row * first_stride..row * first_stride + cw];
        let second_row = &second.data()[row * second_stride..row * second_stride + cw];
        for (a, b) in first_row.iter().zip(second_row) {
            output.push(*a);
            output.push(*b);
        }
    }

    Ok(output)
}

/// Convert a frame to packed RGB
pub fn to_packed_color(frame: &VideoFrame) -> Result<RgbImage, ConversionError> {
    i420_to_rgb(frame.buffer())
}

/// Convert a planar buffer to packed RGB (3 bytes per pixel)
pub fn i420_to_rgb(buffer: &I420Buffer) -> Result<RgbImage, ConversionError> {
    validate_planes(buffer)?;

    let width = buffer.width() as usize;
    let height = buffer.height() as usize;
    let y_plane = buffer.y().data();
    let u_plane = buffer.u().data();
    let v_plane = buffer.v().data();
    let y_stride = buffer.y().stride() as usize;
    let u_stride = buffer.u().stride() as usize;
    let v_stride = buffer.v().stride() as usize;

    let mut rgb_data = vec![0u8; width * height * 3];

    for row in 0..height {
        let y_row = row * y_stride;
        let u_row = (row / 2) * u_stride;
        let v_row = (row / 2) * v_stride;
        let rgb_row = row * width * 3;

        for col in 0..width {
            let y = y_plane[y_row + col];
            let u = u_plane[u_row + col / 2];
            let v = v_plane[v_row + col / 2];

            let [r, g, b] = yuv_to_rgb(y, u, v);
            let offset = rgb_row + col * 3;
            rgb_data[offset] = r;
            rgb_data[offset + 1] = g;
            rgb_data[offset + 2] = b;
        }
    }

    RgbImage::from_raw(buffer.width(), buffer.height(), rgb_data).ok_or(
        ConversionError::PackedSizeMismatch {
            len: width * height * 3,
            expected: width * height * 3,
        },
    )
}

/// Convert packed RGB back to a fresh planar buffer
pub fn from_packed_color(
    pixels: &[u8],
    width: u32,
    height: u32,
) -> Result<I420Buffer, ConversionError> {
    if width == 0 || height == 0 {
        return Err(ConversionError::EmptyFrame { width, height });
    }
    let w = width as usize;
    let h = height as usize;
    let expected = w * h * 3;
    if pixels.len() != expected {
        return Err(ConversionError::PackedSizeMismatch {
            len: pixels.len(),
            expected,
        });
    }

    let cw = chroma_dim(width) as usize;
    let ch = chroma_dim(height) as usize;

    let mut y_plane = vec![0u8; w * h];
    // Accumulated chroma per 2x2 block plus sample count
    let mut u_sum = vec![0f32; cw * ch];
    let mut v_sum = vec![0f32; cw * ch];
    let mut counts = vec![0u8; cw * ch];

    for row in 0..h {
        for col in 0..w {
            let offset = (row * w + col) * 3;
            let (y, u, v) = rgb_to_yuv(pixels[offset], pixels[offset + 1], pixels[offset + 2]);
            y_plane[row * w + col] = quantize(y);

            let block = (row / 2) * cw + col / 2;
            u_sum[block] += u;
            v_sum[block] += v;
            counts[block] += 1;
        }
    }

    let u_plane: Vec<u8> = u_sum
        .iter()
        .zip(&counts)
        .map(|(sum, &n)| quantize(sum / n.max(1) as f32))
        .collect();
    let v_plane: Vec<u8> = v_sum
        .iter()
        .zip(&counts)
        .map(|(sum, &n)| quantize(sum / n.max(1) as f32))
        .collect();

    Ok(I420Buffer::new(
        width,
        height,
        Plane::new(y_plane, width),
        Plane::new(u_plane, cw as u32),
        Plane::new(v_plane, cw as u32),
    ))
}

/// Convert an [`RgbImage`] back to a planar buffer
pub fn from_rgb_image(image: &RgbImage) -> Result<I420Buffer, ConversionError> {
    from_packed_color(image.as_raw(), image.width(), image.height())
}

/// Full-range BT.601 YUV → RGB for one pixel
#[inline]
pub fn yuv_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let y = y as f32;
    let u = u as f32 - 128.0;
    let v = v as f32 - 128.0;

    let r = y + 1.402 * v;
    let g = y - 0.344_136 * u - 0.714_136 * v;
    let b = y + 1.772 * u;

    [quantize(r), quantize(g), quantize(b)]
}

/// Full-range BT.601 RGB → YUV for one pixel (unquantized)
#[inline]
pub fn rgb_to_yuv(r: u8, g: u8, b: u8) -> (f32, f32, f32) {
    let r = r as f32;
    let g = g as f32;
    let b = b as f32;

    let y = 0.299 * r + 0.587 * g + 0.114 * b;
    let u = -0.168_736 * r - 0.331_264 * g + 0.5 * b + 128.0;
    let v = 0.5 * r - 0.418_688 * g - 0.081_312 * b + 128.0;

    (y, u, v)
}

#[inline]
fn quantize(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}
