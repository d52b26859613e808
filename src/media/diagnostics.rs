// SPDX-License-Identifier: GPL-3.0-only

//! Capture buffer sampling for debugging corrupt or blank frames.
//!
//! Only runs when `diagnostics` is enabled in the pipeline config. Sampling
//! reads the first bytes of each plane and never changes the frame.

use crate::errors::PlaneKind;
use crate::media::frame::I420Buffer;
use tracing::{trace, warn};

/// Head bytes of one plane
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaneSample {
    pub plane: PlaneKind,
    pub head: Vec<u8>,
}

impl PlaneSample {
    /// A non-empty head where every byte is zero
    pub fn is_all_zero(&self) -> bool {
        !self.head.is_empty() && self.head.iter().all(|&b| b == 0)
    }
}

/// Take up to `sample_bytes` from the start of every plane
pub fn sample_planes(buffer: &I420Buffer, sample_bytes: usize) -> [PlaneSample; 3] {
    let take = |plane: PlaneKind, data: &[u8]| PlaneSample {
        plane,
        head: data[..data.len().min(sample_bytes)].to_vec(),
    };
    [
        take(PlaneKind::Y, buffer.y().data()),
        take(PlaneKind::U, buffer.u().data()),
        take(PlaneKind::V, buffer.v().data()),
    ]
}

/// Sample a frame and log planes that look blank.
///
/// Returns `true` when at least one plane head was all zero. An all-zero
/// luma head usually means the capture source handed over an unfilled buffer
/// (fully black frames still carry chroma 128).
pub fn inspect_frame(buffer: &I420Buffer, sample_bytes: usize, frame_index: u64) -> bool {
    let samples = sample_planes(buffer, sample_bytes);
    let mut suspicious = false;

    for sample in &samples {
        if sample.is_all_zero() {
            suspicious = true;
            warn!(
                frame = frame_index,
                plane = %sample.plane,
                sampled = sample.head.len(),
                "Plane head is all zero, buffer may be unfilled"
            );
        }
    }

    trace!(
        frame = frame_index,
        width = buffer.width(),
        height = buffer.height(),
        y_head = ?samples[0].head.get(..samples[0].head.len().min(8)),
        "Sampled frame planes"
    );

    suspicious
}
