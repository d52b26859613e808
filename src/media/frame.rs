// SPDX-License-Identifier: GPL-3.0-only

//! Planar video frame types
//!
//! A [`VideoFrame`] is the unit of work flowing through the pipeline: an
//! [`I420Buffer`] (three independently strided planes) plus rotation and
//! timestamp metadata.
//!
//! Frames are moved between stages, never shared mutably. A capture buffer may
//! carry a release hook (for example to return the buffer to a capture pool);
//! the hook runs exactly once, when the buffer is dropped.

use std::sync::Arc;

/// Release callback attached to a capture buffer
type ReleaseFn = Box<dyn FnOnce() + Send + 'static>;

/// A single image plane: pixel bytes plus row stride
///
/// Plane bytes are reference counted so untouched planes can be carried into
/// a derived frame without copying (the luma overlay only rewrites Y).
#[derive(Clone)]
pub struct Plane {
    data: Arc<[u8]>,
    stride: u32,
}

impl Plane {
    /// Wrap plane bytes with the given row stride
    pub fn new(data: impl Into<Arc<[u8]>>, stride: u32) -> Self {
        Self {
            data: data.into(),
            stride,
        }
    }

    /// Bytes per row, including any alignment padding
    pub fn stride(&self) -> u32 {
        self.stride
    }

    /// Raw plane bytes
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Length of the plane in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the plane holds no bytes
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes required to hold `rows` rows at this stride
    pub fn required_len(&self, rows: u32) -> usize {
        self.stride as usize * rows as usize
    }
}

impl std::fmt::Debug for Plane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Plane({} bytes, stride {})", self.data.len(), self.stride)
    }
}

impl AsRef<[u8]> for Plane {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl std::ops::Deref for Plane {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data
    }
}

/// Width or height of a 4:2:0 chroma plane for a given luma dimension
#[inline]
pub fn chroma_dim(luma_dim: u32) -> u32 {
    luma_dim.div_ceil(2)
}

/// Planar 4:2:0 pixel buffer (I420)
///
/// U and V planes cover `ceil(width/2) x ceil(height/2)` samples.
pub struct I420Buffer {
    width: u32,
    height: u32,
    y: Plane,
    u: Plane,
    v: Plane,
    release: Option<ReleaseFn>,
}

impl I420Buffer {
    /// Create a buffer from three planes
    ///
    /// Plane sizes are not validated here; the converter and renderer check
    /// them before touching pixels so malformed buffers from a capture source
    /// degrade to pass-through instead of panicking.
    pub fn new(width: u32, height: u32, y: Plane, u: Plane, v: Plane) -> Self {
        Self {
            width,
            height,
            y,
            u,
            v,
            release: None,
        }
    }

    /// Allocate a tightly packed buffer filled with a constant luma and
    /// neutral chroma
    pub fn filled(width: u32, height: u32, luma: u8) -> Self {
        let cw = chroma_dim(width);
        let ch = chroma_dim(height);
        let y = vec![luma; width as usize * height as usize];
        let chroma = vec![128u8; cw as usize * ch as usize];
        Self::new(
            width,
            height,
            Plane::new(y, width),
            Plane::new(chroma.clone(), cw),
            Plane::new(chroma, cw),
        )
    }

    /// Attach a hook that runs once when this buffer is dropped
    pub fn with_release<F>(mut self, release: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.release = Some(Box::new(release));
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Width of the U and V planes in samples
    pub fn chroma_width(&self) -> u32 {
        chroma_dim(self.width)
    }

    /// Height of the U and V planes in rows
    pub fn chroma_height(&self) -> u32 {
        chroma_dim(self.height)
    }

    pub fn y(&self) -> &Plane {
        &self.y
    }

    pub fn u(&self) -> &Plane {
        &self.u
    }

    pub fn v(&self) -> &Plane {
        &self.v
    }

    /// Read a luma sample, `None` outside the frame or past the plane end
    pub fn luma_at(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = y as usize * self.y.stride as usize + x as usize;
        self.y.data.get(idx).copied()
    }
}

impl std::fmt::Debug for I420Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("I420Buffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("y", &self.y)
            .field("u", &self.u)
            .field("v", &self.v)
            .field("has_release", &self.release.is_some())
            .finish()
    }
}

impl Drop for I420Buffer {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

/// Frame rotation in degrees (clockwise)
///
/// The rotation describes how the buffer must be rotated to appear upright.
/// Detector coordinates live in that upright space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Rotation {
    /// No rotation
    #[default]
    Deg0,
    /// 90 degrees clockwise
    Deg90,
    /// 180 degrees
    Deg180,
    /// 270 degrees clockwise (90 degrees counter-clockwise)
    Deg270,
}

impl Rotation {
    /// All supported rotations
    pub const ALL: [Rotation; 4] = [
        Rotation::Deg0,
        Rotation::Deg90,
        Rotation::Deg180,
        Rotation::Deg270,
    ];

    /// Parse a degree value; only exact multiples of 90 in `[0, 360)` are
    /// accepted
    pub fn from_degrees(degrees: i32) -> Option<Self> {
        match degrees {
            0 => Some(Rotation::Deg0),
            90 => Some(Rotation::Deg90),
            180 => Some(Rotation::Deg180),
            270 => Some(Rotation::Deg270),
            _ => None,
        }
    }

    /// Get the rotation in degrees
    pub fn degrees(&self) -> i32 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }

    /// Rotation that undoes this one
    pub fn inverse(&self) -> Self {
        match self {
            Rotation::Deg0 => Rotation::Deg0,
            Rotation::Deg90 => Rotation::Deg270,
            Rotation::Deg180 => Rotation::Deg180,
            Rotation::Deg270 => Rotation::Deg90,
        }
    }

    /// Check if rotation swaps width and height
    pub fn swaps_dimensions(&self) -> bool {
        matches!(self, Rotation::Deg90 | Rotation::Deg270)
    }

    /// Apply this rotation to a `(width, height)` pair
    pub fn rotate_dims(&self, width: u32, height: u32) -> (u32, u32) {
        if self.swaps_dimensions() {
            (height, width)
        } else {
            (width, height)
        }
    }
}

impl std::fmt::Display for Rotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

/// A single frame from the capture source
#[derive(Debug)]
pub struct VideoFrame {
    buffer: I420Buffer,
    /// Rotation as reported by the source; may be an unsupported value
    rotation_degrees: i32,
    /// Capture timestamp in nanoseconds
    timestamp_ns: i64,
}

impl VideoFrame {
    pub fn new(buffer: I420Buffer, rotation_degrees: i32, timestamp_ns: i64) -> Self {
        Self {
            buffer,
            rotation_degrees,
            timestamp_ns,
        }
    }

    pub fn width(&self) -> u32 {
        self.buffer.width
    }

    pub fn height(&self) -> u32 {
        self.buffer.height
    }

    pub fn rotation_degrees(&self) -> i32 {
        self.rotation_degrees
    }

    /// Parsed rotation, `None` for unsupported values
    pub fn rotation(&self) -> Option<Rotation> {
        Rotation::from_degrees(self.rotation_degrees)
    }

    pub fn timestamp_ns(&self) -> i64 {
        self.timestamp_ns
    }

    pub fn buffer(&self) -> &I420Buffer {
        &self.buffer
    }

    /// Build a frame with new pixel data but this frame's metadata
    ///
    /// Consumes `self`, so the old buffer (and its release hook) is dropped
    /// here.
    pub fn replace_buffer(self, buffer: I420Buffer) -> Self {
        Self {
            buffer,
            rotation_degrees: self.rotation_degrees,
            timestamp_ns: self.timestamp_ns,
        }
    }

    /// Take the pixel buffer out of the frame
    pub fn into_buffer(self) -> I420Buffer {
        self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_chroma_dims_round_up() {
        assert_eq!(chroma_dim(640), 320);
        assert_eq!(chroma_dim(641), 321);
        assert_eq!(chroma_dim(1), 1);
        assert_eq!(chroma_dim(0), 0);
    }

    #[test]
    fn test_filled_buffer_layout() {
        let buffer = I420Buffer::filled(5, 3, 42);
        assert_eq!(buffer.y().len(), 15);
        assert_eq!(buffer.u().len(), 3 * 2);
        assert_eq!(buffer.v().stride(), 3);
        assert_eq!(buffer.luma_at(4, 2), Some(42));
        assert_eq!(buffer.luma_at(5, 0), None);
    }

    #[test]
    fn test_release_runs_once_on_drop() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let buffer = I420Buffer::filled(4, 4, 0).with_release(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let frame = VideoFrame::new(buffer, 0, 0);
        let frame = frame.replace_buffer(I420Buffer::filled(4, 4, 1));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        drop(frame);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_rotation_parsing() {
        assert_eq!(Rotation::from_degrees(90), Some(Rotation::Deg90));
        assert_eq!(Rotation::from_degrees(45), None);
        assert_eq!(Rotation::from_degrees(360), None);
        for rotation in Rotation::ALL {
            assert_eq!(Rotation::from_degrees(rotation.degrees()), Some(rotation));
            assert_eq!(rotation.inverse().inverse(), rotation);
        }
    }

    #[test]
    fn test_rotate_dims() {
        assert_eq!(Rotation::Deg90.rotate_dims(640, 480), (480, 640));
        assert_eq!(Rotation::Deg180.rotate_dims(640, 480), (640, 480));
    }
}
