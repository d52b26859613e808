// SPDX-License-Identifier: MPL-2.0

//! Asynchronous frame analysis
//!
//! Frames are converted to NV21 and handed to a [`Detector`] running on a
//! background runtime. Finished results land in a single-slot cache that the
//! capture thread reads without waiting.

pub mod cache;
pub mod detector;
pub mod scheduler;
pub mod types;

pub use cache::DetectionResultCache;
pub use detector::{BrightRegionDetector, Detector, FixedDetector};
pub use scheduler::{BackpressurePolicy, DetectionScheduler, SubmitOutcome};
pub use types::{BoundingBox, DetectionResult, DetectorImage};
