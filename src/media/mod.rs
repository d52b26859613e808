// SPDX-License-Identifier: MPL-2.0

//! Frame types and pixel format handling
//!
//! # Frames
//!
//! Capture sources deliver planar I420 frames ([`frame::VideoFrame`]) with
//! independent per-plane strides and a rotation tag.
//!
//! # Color Space Conversion
//!
//! The detector consumes NV21 (Y plane followed by interleaved V/U), while the
//! colour overlay path needs packed RGB. The [`convert`] module provides both
//! directions on the CPU.
//!
//! # Modules
//!
//! - [`frame`]: Planes, buffers, rotation and frame metadata
//! - [`convert`]: I420 → NV21/NV12 and I420 ↔ RGB conversion
//! - [`diagnostics`]: Optional plane sampling for blank-buffer detection

pub mod convert;
pub mod diagnostics;
pub mod frame;

// Re-export commonly used types
pub use convert::{SemiPlanarLayout, from_packed_color, to_packed_color, to_semi_planar};
pub use frame::{I420Buffer, Plane, Rotation, VideoFrame};
