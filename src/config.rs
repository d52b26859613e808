// SPDX-License-Identifier: GPL-3.0-only

//! Pipeline configuration
//!
//! Configuration is plain serde data. Every field has a default, so a JSON
//! document only needs the keys it wants to change:
//!
//! ```json
//! { "overlay": { "kind": "color_box" }, "detection_threads": 2 }
//! ```

use crate::constants::{self, OverlayKind, overlay};
use crate::errors::ConfigError;
use crate::frame_processor::scheduler::BackpressurePolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How detections are burned into frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// Draw boxes into outgoing frames
    pub enabled: bool,
    /// Drawing strategy, fixed for the pipeline's lifetime
    pub kind: OverlayKind,
    /// Stroke width in pixels, growing inward from the box edges
    pub stroke_thickness: u32,
    /// Radius of the filled centre marker (0 disables it)
    pub marker_radius: u32,
    /// Luma written by the luma strategy
    pub stroke_luma: u8,
    /// RGB written by the colour strategy
    pub stroke_color: [u8; 3],
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            kind: OverlayKind::default(),
            stroke_thickness: overlay::DEFAULT_STROKE_THICKNESS,
            marker_radius: overlay::DEFAULT_MARKER_RADIUS,
            stroke_luma: overlay::DEFAULT_STROKE_LUMA,
            stroke_color: overlay::DEFAULT_STROKE_COLOR,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub overlay: OverlayConfig,
    /// Emit `noFaces` once every this many empty detections
    pub no_detection_event_interval: u64,
    /// Submission policy while detections are in flight
    pub backpressure: BackpressurePolicy,
    /// Detector calls allowed to run in parallel
    pub detection_threads: usize,
    /// Sample plane heads and warn about blank buffers
    pub diagnostics: bool,
    /// Bytes sampled per plane when diagnostics are on
    pub diagnostics_sample_bytes: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            overlay: OverlayConfig::default(),
            no_detection_event_interval: constants::DEFAULT_NO_DETECTION_EVENT_INTERVAL,
            backpressure: BackpressurePolicy::default(),
            detection_threads: constants::DEFAULT_DETECTION_THREADS,
            diagnostics: false,
            diagnostics_sample_bytes: constants::diagnostics::DEFAULT_SAMPLE_BYTES,
        }
    }
}

impl PipelineConfig {
    /// Parse and validate a JSON document
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&contents)
    }

    /// Pretty-printed JSON
    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.no_detection_event_interval == 0 {
            return Err(ConfigError::Invalid(
                "no_detection_event_interval must be at least 1".into(),
            ));
        }
        if self.detection_threads == 0 {
            return Err(ConfigError::Invalid(
                "detection_threads must be at least 1".into(),
            ));
        }
        if let BackpressurePolicy::DropWhileBusy { max_in_flight: 0 } = self.backpressure {
            return Err(ConfigError::Invalid(
                "backpressure max_in_flight must be at least 1".into(),
            ));
        }

        let thickness = self.overlay.stroke_thickness;
        if thickness == 0 || thickness > overlay::MAX_STROKE_THICKNESS {
            return Err(ConfigError::Invalid(format!(
                "stroke_thickness {} outside 1..={}",
                thickness,
                overlay::MAX_STROKE_THICKNESS
            )));
        }
        if self.overlay.marker_radius > overlay::MAX_MARKER_RADIUS {
            return Err(ConfigError::Invalid(format!(
                "marker_radius {} exceeds {}",
                self.overlay.marker_radius,
                overlay::MAX_MARKER_RADIUS
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_document_keeps_defaults() {
        let config =
            PipelineConfig::from_json_str(r#"{"overlay":{"kind":"color_box"}}"#).unwrap();
        assert_eq!(config.overlay.kind, OverlayKind::ColorBox);
        assert_eq!(
            config.overlay.stroke_thickness,
            overlay::DEFAULT_STROKE_THICKNESS
        );
        assert_eq!(config.no_detection_event_interval, 30);
    }

    #[test]
    fn test_rejects_zero_thickness() {
        let err = PipelineConfig::from_json_str(r#"{"overlay":{"stroke_thickness":0}}"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_malformed_json() {
        let err = PipelineConfig::from_json_str("{ overlay").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = PipelineConfig::from_file("/nonexistent/detection-overlay.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
