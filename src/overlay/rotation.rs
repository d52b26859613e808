// SPDX-License-Identifier: MPL-2.0

//! Coordinate transforms between detector space and buffer space
//!
//! The detector reasons about the upright image, i.e. the buffer rotated
//! clockwise by the frame rotation. A box of a `src_width x src_height` space
//! maps through `rotate_rect` as follows:
//!
//! | rotation | left | top | right | bottom |
//! |---|---|---|---|---|
//! | 0 | l | t | r | b |
//! | 90 | t | src_width - r | b | src_width - l |
//! | 180 | src_width - r | src_height - b | src_width - l | src_height - t |
//! | 270 | src_height - b | l | src_height - t | r |
//!
//! Transforming detector → buffer uses the frame rotation with the upright
//! dimensions as source; the reverse direction uses the inverse rotation with
//! buffer dimensions. The two are exact inverses of each other.
//!
//! Edges are treated as continuous coordinates, not inclusive pixel indices:
//! `extent - x` rather than `extent - 1 - x`. A rotated box therefore sits one
//! pixel further along the reflected axis than its pixel mirror image, and an
//! edge that lands on `extent` is clipped by the caller. At 180° on 640x480,
//! `(0, 0, 9, 9)` maps to `(631, 471, 640, 480)`, drawn as `631..=639`.

use crate::frame_processor::types::BoundingBox;
use crate::media::frame::Rotation;

#[inline]
fn reflect(extent: u32, coord: i32) -> i32 {
    (extent as i64 - coord as i64).clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

/// Map a rectangle of a `src_width x src_height` space through `rotation`
pub fn rotate_rect(rect: &BoundingBox, rotation: Rotation, src_width: u32, src_height: u32) -> BoundingBox {
    let BoundingBox {
        left: l,
        top: t,
        right: r,
        bottom: b,
        tracking_id,
    } = *rect;

    let rotated = match rotation {
        Rotation::Deg0 => BoundingBox::new(l, t, r, b),
        Rotation::Deg90 => BoundingBox::new(t, reflect(src_width, r), b, reflect(src_width, l)),
        Rotation::Deg180 => BoundingBox::new(
            reflect(src_width, r),
            reflect(src_height, b),
            reflect(src_width, l),
            reflect(src_height, t),
        ),
        Rotation::Deg270 => BoundingBox::new(reflect(src_height, b), l, reflect(src_height, t), r),
    };

    BoundingBox {
        tracking_id,
        ..rotated
    }
}

/// Map a detector-space box into buffer space of a `frame_width x frame_height`
/// buffer
pub fn detector_to_buffer(
    rect: &BoundingBox,
    rotation: Rotation,
    frame_width: u32,
    frame_height: u32,
) -> BoundingBox {
    let (dw, dh) = rotation.rotate_dims(frame_width, frame_height);
    rotate_rect(rect, rotation, dw, dh)
}

/// Map a buffer-space box into the detector's upright space
pub fn buffer_to_detector(
    rect: &BoundingBox,
    rotation: Rotation,
    frame_width: u32,
    frame_height: u32,
) -> BoundingBox {
    rotate_rect(rect, rotation.inverse(), frame_width, frame_height)
}
