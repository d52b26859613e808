// SPDX-License-Identifier: GPL-3.0-only

//! Pipeline-wide constants

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Emit a `noFaces` event once every this many empty detections
pub const DEFAULT_NO_DETECTION_EVENT_INTERVAL: u64 = 30;

/// Detections allowed in flight under the default backpressure policy
pub const DEFAULT_MAX_IN_FLIGHT: usize = 1;

/// Detector calls allowed to run in parallel
pub const DEFAULT_DETECTION_THREADS: usize = 1;

/// Overlay drawing strategies
///
/// The luma stroke writes only the Y plane and is cheap; the colour box goes
/// through a full RGB round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlayKind {
    /// Achromatic marks in the luma plane (default)
    #[default]
    LumaStroke,
    /// Coloured marks through packed RGB
    ColorBox,
}

impl OverlayKind {
    /// All strategies, cheapest first
    pub const ALL: [OverlayKind; 2] = [OverlayKind::LumaStroke, OverlayKind::ColorBox];

    /// Get display name for the strategy
    pub fn display_name(&self) -> &'static str {
        match self {
            OverlayKind::LumaStroke => "Luma stroke",
            OverlayKind::ColorBox => "Colour box",
        }
    }

    /// Whether the strategy changes chroma
    pub fn is_chromatic(&self) -> bool {
        matches!(self, OverlayKind::ColorBox)
    }
}

/// Overlay drawing defaults and limits
pub mod overlay {
    /// Stroke width in pixels
    pub const DEFAULT_STROKE_THICKNESS: u32 = 4;

    /// Largest accepted stroke width
    pub const MAX_STROKE_THICKNESS: u32 = 64;

    /// Centre marker radius in pixels (0 disables the marker)
    pub const DEFAULT_MARKER_RADIUS: u32 = 6;

    /// Largest accepted marker radius
    pub const MAX_MARKER_RADIUS: u32 = 256;

    /// Luma written by the achromatic strategy
    pub const DEFAULT_STROKE_LUMA: u8 = 255;

    /// RGB written by the colour strategy
    pub const DEFAULT_STROKE_COLOR: [u8; 3] = [0, 230, 118];
}

/// Buffer sampling settings
pub mod diagnostics {
    /// Bytes read from the head of each plane
    pub const DEFAULT_SAMPLE_BYTES: usize = 64;
}

/// Timing constants
pub mod timing {
    /// Log pipeline statistics every N frames
    pub const FRAME_LOG_INTERVAL: u64 = 30;
}

/// Synthetic source used by the demo binary
pub mod demo {
    use super::Duration;

    pub const DEFAULT_WIDTH: u32 = 640;
    pub const DEFAULT_HEIGHT: u32 = 480;
    pub const DEFAULT_FPS: u32 = 30;
    pub const DEFAULT_FRAMES: u64 = 300;

    /// Background luma of generated frames
    pub const BACKGROUND_LUMA: u8 = 96;

    /// Luma of the moving square the demo detector looks for
    pub const SQUARE_LUMA: u8 = 235;

    /// Side of the moving square as a fraction of the shorter frame edge
    pub const SQUARE_FRACTION: f32 = 0.2;

    /// Square is hidden for this many frames out of every cycle so the
    /// no-detection path runs too
    pub const HIDDEN_FRAMES: u64 = 45;
    pub const CYCLE_FRAMES: u64 = 150;

    /// Slowest acceptable frame period before warnings are logged
    pub const SLOW_FRAME: Duration = Duration::from_millis(50);
}

/// Application info
pub mod app_info {
    /// Crate version with git metadata from the build script
    pub fn version() -> &'static str {
        env!("GIT_VERSION")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlay_kind_serde_names() {
        assert_eq!(
            serde_json::to_string(&OverlayKind::ColorBox).unwrap(),
            r#""color_box""#
        );
        assert_eq!(OverlayKind::default(), OverlayKind::LumaStroke);
    }

    #[test]
    fn test_defaults_within_limits() {
        assert!(overlay::DEFAULT_STROKE_THICKNESS <= overlay::MAX_STROKE_THICKNESS);
        assert!(overlay::DEFAULT_MARKER_RADIUS <= overlay::MAX_MARKER_RADIUS);
        assert!(demo::HIDDEN_FRAMES < demo::CYCLE_FRAMES);
    }
}
