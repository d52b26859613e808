// SPDX-License-Identifier: MPL-2.0

//! Detection Overlay - real-time detection overlay for planar video frames
//!
//! This library intercepts I420 frames at capture rate, runs an object
//! detector asynchronously and burns the latest detections into outgoing
//! frames, while reporting results to an observer as structured events.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`media`]: Frame types, pixel format conversion, buffer diagnostics
//! - [`frame_processor`]: Detector capability, background scheduling and the
//!   latest-result cache
//! - [`overlay`]: Rotation-aware drawing of boxes into frame planes
//! - [`events`]: Detection events and observer delivery
//! - [`pipeline`]: Per-frame orchestration tying the above together
//! - [`config`]: Pipeline configuration
//!
//! # Example
//!
//! ```no_run
//! use detection_overlay::{FixedDetector, FramePipeline, PipelineConfig};
//! use detection_overlay::media::{I420Buffer, VideoFrame};
//! use std::sync::Arc;
//!
//! let detector = Arc::new(FixedDetector::new(Vec::new()));
//! let pipeline = FramePipeline::new(detector, PipelineConfig::default()).unwrap();
//! let frame = VideoFrame::new(I420Buffer::filled(640, 480, 128), 0, 0);
//! let output = pipeline.on_frame(frame);
//! assert_eq!(output.width(), 640);
//! ```

pub mod config;
pub mod constants;
pub mod errors;
pub mod events;
pub mod frame_processor;
pub mod media;
pub mod overlay;
pub mod pipeline;

// Re-export commonly used types
pub use config::{OverlayConfig, PipelineConfig};
pub use constants::OverlayKind;
pub use errors::{PipelineError, PipelineResult};
pub use events::{ChannelObserver, DetectionEvent, DetectionObserver, EventSink};
pub use frame_processor::{BoundingBox, DetectionResult, Detector, FixedDetector};
pub use pipeline::{FramePipeline, PipelineStats};
