// SPDX-License-Identifier: GPL-3.0-only

//! Per-frame orchestration
//!
//! `on_frame` is called on the capture thread for every frame and must return
//! quickly. It:
//!
//! 1. converts the frame to NV21 (on failure the frame passes through),
//! 2. submits it for detection; the result is published to the cache and
//!    reported to the event sink when the detector finishes,
//! 3. draws whatever result is cached at that moment (normally from an
//!    earlier frame) if the overlay is enabled,
//! 4. returns the drawn frame, or the original one.
//!
//! No error stops the pipeline. After `dispose` frames pass through
//! untouched.

use crate::config::{OverlayConfig, PipelineConfig};
use crate::constants::timing::FRAME_LOG_INTERVAL;
use crate::errors::PipelineResult;
use crate::events::EventSink;
use crate::frame_processor::cache::DetectionResultCache;
use crate::frame_processor::detector::Detector;
use crate::frame_processor::scheduler::{DetectionScheduler, SubmitOutcome};
use crate::frame_processor::types::{DetectionResult, DetectorImage};
use crate::media::convert::to_semi_planar;
use crate::media::diagnostics;
use crate::media::frame::VideoFrame;
use crate::overlay::OverlayRenderer;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

/// Per-pipeline counters
///
/// Updated from both the capture thread and the detection runtime, so every
/// field is atomic.
#[derive(Debug, Default)]
struct PipelineState {
    frame_count: AtomicU64,
    submitted: AtomicU64,
    dropped_submissions: AtomicU64,
    detection_failures: AtomicU64,
    conversion_failures: AtomicU64,
    render_failures: AtomicU64,
    suspicious_frames: AtomicU64,
}

/// Snapshot of pipeline counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PipelineStats {
    /// Frames passed to `on_frame` before dispose
    pub frame_count: u64,
    /// Detections that found nothing
    pub no_detection_count: u64,
    /// Frames handed to the detector
    pub submitted: u64,
    /// Frames rejected by the backpressure policy
    pub dropped_submissions: u64,
    pub detection_failures: u64,
    pub conversion_failures: u64,
    pub render_failures: u64,
    /// Frames flagged by diagnostics sampling
    pub suspicious_frames: u64,
    /// Detections currently running
    pub in_flight: usize,
}

/// Detection overlay pipeline for one video track
pub struct FramePipeline {
    id: Uuid,
    config: PipelineConfig,
    overlay_enabled: AtomicBool,
    renderer: OverlayRenderer,
    scheduler: DetectionScheduler,
    cache: Arc<DetectionResultCache>,
    events: Arc<EventSink>,
    state: Arc<PipelineState>,
    disposed: AtomicBool,
}

impl std::fmt::Debug for FramePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FramePipeline")
            .field("id", &self.id)
            .field("detector", &self.scheduler.detector_name())
            .field("renderer", &self.renderer)
            .field("overlay_enabled", &self.overlay_enabled())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl FramePipeline {
    /// Build a pipeline with the overlay strategy named in the config and a
    /// fresh event sink
    pub fn new(detector: Arc<dyn Detector>, config: PipelineConfig) -> PipelineResult<Self> {
        let renderer = OverlayRenderer::for_kind(config.overlay.kind);
        let events = Arc::new(EventSink::new(config.no_detection_event_interval));
        Self::from_parts(detector, config, renderer, events)
    }

    /// Build a pipeline with an explicit renderer and event sink
    pub fn from_parts(
        detector: Arc<dyn Detector>,
        config: PipelineConfig,
        renderer: OverlayRenderer,
        events: Arc<EventSink>,
    ) -> PipelineResult<Self> {
        config.validate()?;
        let scheduler =
            DetectionScheduler::new(detector, config.detection_threads, config.backpressure)?;
        let id = Uuid::new_v4();

        info!(
            pipeline = %id,
            detector = scheduler.detector_name(),
            strategy = renderer.strategy_name(),
            overlay = config.overlay.enabled,
            "Frame pipeline created"
        );

        Ok(Self {
            id,
            overlay_enabled: AtomicBool::new(config.overlay.enabled),
            config,
            renderer,
            scheduler,
            cache: Arc::new(DetectionResultCache::new()),
            events,
            state: Arc::new(PipelineState::default()),
            disposed: AtomicBool::new(false),
        })
    }

    /// Instance id used in log fields
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Process one captured frame
    pub fn on_frame(&self, frame: VideoFrame) -> VideoFrame {
        if self.is_disposed() {
            debug!(pipeline = %self.id, "Frame received after dispose, passing through");
            return frame;
        }

        let start = std::time::Instant::now();
        let frame_index = self.state.frame_count.fetch_add(1, Ordering::Relaxed) + 1;

        if self.config.diagnostics
            && diagnostics::inspect_frame(
                frame.buffer(),
                self.config.diagnostics_sample_bytes,
                frame_index,
            )
        {
            self.state.suspicious_frames.fetch_add(1, Ordering::Relaxed);
        }

        let nv21 = match to_semi_planar(&frame) {
            Ok(data) => data,
            Err(e) => {
                self.state
                    .conversion_failures
                    .fetch_add(1, Ordering::Relaxed);
                warn!(pipeline = %self.id, error = %e, "Frame conversion failed, passing through");
                return frame;
            }
        };

        self.submit_detection(DetectorImage {
            data: nv21,
            width: frame.width(),
            height: frame.height(),
            rotation_degrees: frame.rotation_degrees(),
            timestamp_ns: frame.timestamp_ns(),
        });

        let output = self.render(frame);

        trace!(
            pipeline = %self.id,
            frame = frame_index,
            elapsed_us = start.elapsed().as_micros(),
            "Frame processed"
        );
        if frame_index % FRAME_LOG_INTERVAL == 0 {
            let stats = self.stats();
            debug!(
                pipeline = %self.id,
                frames = stats.frame_count,
                submitted = stats.submitted,
                dropped = stats.dropped_submissions,
                in_flight = stats.in_flight,
                "Pipeline progress"
            );
        }

        output
    }

    fn submit_detection(&self, image: DetectorImage) {
        let width = image.width;
        let height = image.height;
        let cache = Arc::clone(&self.cache);
        let events = Arc::clone(&self.events);
        let state = Arc::clone(&self.state);
        let id = self.id;

        let outcome = self.scheduler.submit(
            image,
            move |result: DetectionResult| {
                let result = cache.publish(result);
                events.notify_detections(&result, width, height);
            },
            move |error| {
                state.detection_failures.fetch_add(1, Ordering::Relaxed);
                warn!(pipeline = %id, error = %error, "Detection failed");
            },
        );

        match outcome {
            SubmitOutcome::Submitted => {
                self.state.submitted.fetch_add(1, Ordering::Relaxed);
            }
            SubmitOutcome::Dropped => {
                self.state
                    .dropped_submissions
                    .fetch_add(1, Ordering::Relaxed);
            }
            SubmitOutcome::ShutDown => {
                debug!(pipeline = %self.id, "Scheduler shut down, frame not submitted");
            }
        }
    }

    fn render(&self, frame: VideoFrame) -> VideoFrame {
        let enabled = self.overlay_enabled();
        if !enabled {
            return frame;
        }

        let latest = self.cache.read();
        let style = OverlayConfig {
            enabled,
            ..self.config.overlay
        };

        match self.renderer.try_render(&frame, latest.as_deref(), &style) {
            Ok(Some(buffer)) => frame.replace_buffer(buffer),
            Ok(None) => frame,
            Err(e) => {
                self.state.render_failures.fetch_add(1, Ordering::Relaxed);
                warn!(pipeline = %self.id, error = %e, "Overlay render failed, returning original frame");
                frame
            }
        }
    }

    /// Toggle overlay drawing; takes effect from the next frame
    pub fn set_overlay_enabled(&self, enabled: bool) {
        let previous = self.overlay_enabled.swap(enabled, Ordering::AcqRel);
        if previous != enabled {
            info!(pipeline = %self.id, enabled, "Detection overlay toggled");
        }
    }

    pub fn overlay_enabled(&self) -> bool {
        self.overlay_enabled.load(Ordering::Acquire)
    }

    /// Most recently published detection
    pub fn latest_detection(&self) -> Option<Arc<DetectionResult>> {
        self.cache.read()
    }

    /// Receiver notified whenever a detection is published
    pub fn subscribe_detections(&self) -> watch::Receiver<Option<Arc<DetectionResult>>> {
        self.cache.subscribe()
    }

    /// Sink to attach or detach observers on
    pub fn event_sink(&self) -> &Arc<EventSink> {
        &self.events
    }

    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            frame_count: self.state.frame_count.load(Ordering::Relaxed),
            no_detection_count: self.events.no_detection_count(),
            submitted: self.state.submitted.load(Ordering::Relaxed),
            dropped_submissions: self.state.dropped_submissions.load(Ordering::Relaxed),
            detection_failures: self.state.detection_failures.load(Ordering::Relaxed),
            conversion_failures: self.state.conversion_failures.load(Ordering::Relaxed),
            render_failures: self.state.render_failures.load(Ordering::Relaxed),
            suspicious_frames: self.state.suspicious_frames.load(Ordering::Relaxed),
            in_flight: self.scheduler.in_flight(),
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Shut down detection
    ///
    /// Once this returns no detection callback will touch the cache or the
    /// event sink. Later frames pass through. Idempotent.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.scheduler.shutdown();
        let stats = self.stats();
        info!(
            pipeline = %self.id,
            frames = stats.frame_count,
            submitted = stats.submitted,
            dropped = stats.dropped_submissions,
            failures = stats.detection_failures,
            "Frame pipeline disposed"
        );
    }
}

impl Drop for FramePipeline {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame_processor::detector::FixedDetector;
    use crate::frame_processor::types::BoundingBox;
    use crate::media::frame::{I420Buffer, Plane};
    use std::time::Duration;

    fn wait_for(cond: impl Fn() -> bool) -> bool {
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while std::time::Instant::now() < deadline {
            if cond() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        false
    }

    fn pipeline(boxes: Vec<BoundingBox>) -> (FramePipeline, Arc<FixedDetector>) {
        let detector = Arc::new(FixedDetector::new(boxes));
        let pipeline = FramePipeline::new(detector.clone(), PipelineConfig::default()).unwrap();
        (pipeline, detector)
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = PipelineConfig {
            detection_threads: 0,
            ..PipelineConfig::default()
        };
        let result = FramePipeline::new(Arc::new(FixedDetector::default()), config);
        assert!(matches!(
            result,
            Err(crate::errors::PipelineError::Config(_))
        ));
    }

    #[test]
    fn test_conversion_failure_passes_frame_through() {
        let (pipeline, detector) = pipeline(vec![BoundingBox::new(0, 0, 4, 4)]);
        let broken = I420Buffer::new(
            8,
            8,
            Plane::new(vec![1u8; 8], 8),
            Plane::new(vec![128u8; 16], 4),
            Plane::new(vec![128u8; 16], 4),
        );
        let out = pipeline.on_frame(VideoFrame::new(broken, 0, 5));
        assert_eq!(out.timestamp_ns(), 5);
        assert_eq!(out.buffer().y().len(), 8);

        let stats = pipeline.stats();
        assert_eq!(stats.frame_count, 1);
        assert_eq!(stats.conversion_failures, 1);
        assert_eq!(stats.submitted, 0);
        assert_eq!(detector.calls(), 0);
    }

    #[test]
    fn test_toggle_overlay() {
        let (pipeline, _) = pipeline(Vec::new());
        assert!(pipeline.overlay_enabled());
        pipeline.set_overlay_enabled(false);
        assert!(!pipeline.overlay_enabled());
    }

    #[test]
    fn test_disabled_overlay_returns_frame_untouched() {
        let (pipeline, _) = pipeline(vec![BoundingBox::new(1, 1, 6, 6)]);
        pipeline.set_overlay_enabled(false);

        pipeline.on_frame(VideoFrame::new(I420Buffer::filled(16, 16, 40), 0, 0));
        assert!(wait_for(|| pipeline.latest_detection().is_some()));

        let out = pipeline.on_frame(VideoFrame::new(I420Buffer::filled(16, 16, 40), 0, 1));
        assert!(out.buffer().y().data().iter().all(|&b| b == 40));
    }

    #[test]
    fn test_dispose_is_idempotent_and_passes_through() {
        let (pipeline, detector) = pipeline(Vec::new());
        pipeline.dispose();
        pipeline.dispose();
        assert!(pipeline.is_disposed());
        assert!(detector.is_closed());

        let out = pipeline.on_frame(VideoFrame::new(I420Buffer::filled(4, 4, 9), 0, 3));
        assert_eq!(out.timestamp_ns(), 3);
        assert_eq!(pipeline.stats().frame_count, 0);
    }

    #[test]
    fn test_diagnostics_flag_counts_blank_frames() {
        let config = PipelineConfig {
            diagnostics: true,
            ..PipelineConfig::default()
        };
        let pipeline = FramePipeline::new(Arc::new(FixedDetector::default()), config).unwrap();
        let blank = I420Buffer::new(
            4,
            4,
            Plane::new(vec![0u8; 16], 4),
            Plane::new(vec![0u8; 4], 2),
            Plane::new(vec![0u8; 4], 2),
        );
        pipeline.on_frame(VideoFrame::new(blank, 0, 0));
        pipeline.on_frame(VideoFrame::new(I420Buffer::filled(4, 4, 128), 0, 1));
        assert_eq!(pipeline.stats().suspicious_frames, 1);
    }
}
