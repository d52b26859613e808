// SPDX-License-Identifier: MPL-2.0

//! Integration tests for frame format conversion

use detection_overlay::errors::{ConversionError, PlaneKind};
use detection_overlay::media::convert::{
    from_packed_color, from_rgb_image, i420_to_semi_planar, semi_planar_len,
};
use detection_overlay::media::{
    I420Buffer, Plane, SemiPlanarLayout, VideoFrame, to_packed_color, to_semi_planar,
};

/// Buffer whose Y/U/V bytes encode their own coordinates
fn patterned(width: u32, height: u32, padding: u32) -> I420Buffer {
    let cw = width.div_ceil(2);
    let ch = height.div_ceil(2);
    let y_stride = width + padding;
    let c_stride = cw + padding;

    let mut y = vec![0xEEu8; (y_stride * height) as usize];
    for row in 0..height {
        for col in 0..width {
            y[(row * y_stride + col) as usize] = ((row * 7 + col) % 256) as u8;
        }
    }
    let mut u = vec![0xEEu8; (c_stride * ch) as usize];
    let mut v = vec![0xEEu8; (c_stride * ch) as usize];
    for row in 0..ch {
        for col in 0..cw {
            let index = (row * cw + col) % 100;
            u[(row * c_stride + col) as usize] = (10 + index) as u8;
            v[(row * c_stride + col) as usize] = (200 - index) as u8;
        }
    }

    I420Buffer::new(
        width,
        height,
        Plane::new(y, y_stride),
        Plane::new(u, c_stride),
        Plane::new(v, c_stride),
    )
}

#[test]
fn test_output_length_matches_formula() {
    // Odd sizes round chroma up
    for (w, h) in [(1, 1), (2, 2), (3, 5), (17, 9), (640, 480), (641, 481)] {
        let frame = VideoFrame::new(patterned(w, h, 3), 0, 0);
        let out = to_semi_planar(&frame).unwrap();
        let expected = (w * h + 2 * w.div_ceil(2) * h.div_ceil(2)) as usize;
        assert_eq!(out.len(), expected, "{}x{}", w, h);
        assert_eq!(semi_planar_len(w, h), expected);
    }
}

#[test]
fn test_padding_never_leaks_into_output() {
    let frame = VideoFrame::new(patterned(6, 4, 10), 0, 0);
    let out = to_semi_planar(&frame).unwrap();
    assert!(!out.contains(&0xEE));
}

#[test]
fn test_nv21_and_nv12_interleave_order() {
    let buffer = patterned(4, 4, 0);
    let nv21 = i420_to_semi_planar(&buffer, SemiPlanarLayout::Nv21).unwrap();
    let nv12 = i420_to_semi_planar(&buffer, SemiPlanarLayout::Nv12).unwrap();

    assert_eq!(nv21[..16], nv12[..16]);
    // First chroma pair: V then U for NV21
    assert_eq!((nv21[16], nv21[17]), (200, 10));
    assert_eq!((nv12[16], nv12[17]), (10, 200));
    // Last pair at chroma (1, 1)
    assert_eq!((nv21[22], nv21[23]), (197, 13));
}

#[test]
fn test_undersized_chroma_is_rejected() {
    let buffer = I420Buffer::new(
        8,
        8,
        Plane::new(vec![0u8; 64], 8),
        Plane::new(vec![0u8; 15], 4),
        Plane::new(vec![0u8; 16], 4),
    );
    let err = to_semi_planar(&VideoFrame::new(buffer, 0, 0)).unwrap_err();
    assert_eq!(
        err,
        ConversionError::PlaneTooSmall {
            plane: PlaneKind::U,
            len: 15,
            required: 16,
        }
    );
}

#[test]
fn test_color_round_trip_preserves_smooth_content() {
    // Chroma constant per 2x2 block so subsampling loses nothing
    let width = 16;
    let height = 12;
    let cw = width / 2;
    let ch = height / 2;
    let y: Vec<u8> = (0..width * height).map(|i| (60 + i % 120) as u8).collect();
    let u: Vec<u8> = (0..cw * ch).map(|i| (110 + i % 20) as u8).collect();
    let v: Vec<u8> = (0..cw * ch).map(|i| (140 - i % 20) as u8).collect();
    let buffer = I420Buffer::new(
        width,
        height,
        Plane::new(y.clone(), width),
        Plane::new(u.clone(), cw),
        Plane::new(v.clone(), cw),
    );

    let rgb = to_packed_color(&VideoFrame::new(buffer, 0, 0)).unwrap();
    assert_eq!(rgb.dimensions(), (width, height));

    let back = from_rgb_image(&rgb).unwrap();
    for (a, b) in back.y().data().iter().zip(&y) {
        assert!(a.abs_diff(*b) <= 2, "luma {} vs {}", a, b);
    }
    for (a, b) in back.u().data().iter().zip(&u) {
        assert!(a.abs_diff(*b) <= 2, "u {} vs {}", a, b);
    }
    for (a, b) in back.v().data().iter().zip(&v) {
        assert!(a.abs_diff(*b) <= 2, "v {} vs {}", a, b);
    }
}

#[test]
fn test_packed_size_mismatch() {
    let err = from_packed_color(&[0u8; 10], 2, 2).unwrap_err();
    assert_eq!(
        err,
        ConversionError::PackedSizeMismatch {
            len: 10,
            expected: 12,
        }
    );
}
