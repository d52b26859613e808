// SPDX-License-Identifier: GPL-3.0-only

//! Detection events delivered to an external observer
//!
//! Every completed detection produces either a `faces` event carrying the
//! boxes, or counts towards a throttled `noFaces` heartbeat that is emitted
//! once every `interval` empty results.
//!
//! Events serialise to JSON as
//! `{"type":"faces","frameWidth":..,"frameHeight":..,"boxes":[..]}` or
//! `{"type":"noFaces"}`.
//!
//! Observers can be attached and detached at any time. Without an observer
//! notifications are dropped, but the no-detection counter still advances.

use crate::frame_processor::types::{BoundingBox, DetectionResult};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// One box as reported to observers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoxPayload {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
    pub width: i32,
    pub height: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking_id: Option<i32>,
}

impl From<&BoundingBox> for BoxPayload {
    fn from(b: &BoundingBox) -> Self {
        Self {
            left: b.left,
            top: b.top,
            right: b.right,
            bottom: b.bottom,
            width: b.width(),
            height: b.height(),
            tracking_id: b.tracking_id,
        }
    }
}

/// Structured detection event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DetectionEvent {
    #[serde(rename = "faces", rename_all = "camelCase")]
    Detections {
        frame_width: u32,
        frame_height: u32,
        boxes: Vec<BoxPayload>,
    },
    #[serde(rename = "noFaces")]
    NoDetections,
}

impl DetectionEvent {
    /// Serialise to a JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Receiver of detection events
///
/// Called on the detection runtime; implementations that need another
/// context should hand the event off (see [`ChannelObserver`]). An observer
/// may dispose the pipeline that reported the event.
pub trait DetectionObserver: Send + Sync {
    fn on_event(&self, event: DetectionEvent);
}

impl<F> DetectionObserver for F
where
    F: Fn(DetectionEvent) + Send + Sync,
{
    fn on_event(&self, event: DetectionEvent) {
        self(event)
    }
}

/// Forwards events into an unbounded channel read on the consumer's context
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<DetectionEvent>,
}

impl ChannelObserver {
    /// Create an observer and the receiving half of its channel
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<DetectionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl DetectionObserver for ChannelObserver {
    fn on_event(&self, event: DetectionEvent) {
        if self.tx.send(event).is_err() {
            debug!("Detection event receiver closed, dropping event");
        }
    }
}

/// Routes detection outcomes to the attached observer
pub struct EventSink {
    observer: Mutex<Option<Arc<dyn DetectionObserver>>>,
    /// Emit `noFaces` every this many empty results
    interval: u64,
    no_detection_count: AtomicU64,
    delivered: AtomicU64,
}

impl std::fmt::Debug for EventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSink")
            .field("interval", &self.interval)
            .field("has_observer", &self.has_observer())
            .field("no_detection_count", &self.no_detection_count())
            .finish()
    }
}

impl Default for EventSink {
    fn default() -> Self {
        Self::new(crate::constants::DEFAULT_NO_DETECTION_EVENT_INTERVAL)
    }
}

impl EventSink {
    /// Create a sink; an `interval` of 0 is treated as 1
    pub fn new(interval: u64) -> Self {
        Self {
            observer: Mutex::new(None),
            interval: interval.max(1),
            no_detection_count: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
        }
    }

    /// Attach an observer, replacing any previous one
    pub fn attach(&self, observer: Arc<dyn DetectionObserver>) {
        match self.observer.lock() {
            Ok(mut slot) => *slot = Some(observer),
            Err(poisoned) => *poisoned.into_inner() = Some(observer),
        }
        debug!("Detection observer attached");
    }

    /// Detach the current observer; returns whether one was attached
    pub fn detach(&self) -> bool {
        let previous = match self.observer.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if previous.is_some() {
            debug!("Detection observer detached");
        }
        previous.is_some()
    }

    pub fn has_observer(&self) -> bool {
        self.current_observer().is_some()
    }

    fn current_observer(&self) -> Option<Arc<dyn DetectionObserver>> {
        match self.observer.lock() {
            Ok(slot) => slot.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn deliver(&self, event: DetectionEvent) {
        // Slot lock is released before the observer runs
        if let Some(observer) = self.current_observer() {
            observer.on_event(event);
            self.delivered.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Report a completed detection
    ///
    /// Empty results count as a no-detection instead.
    pub fn notify_detections(&self, result: &DetectionResult, frame_width: u32, frame_height: u32) {
        if result.is_empty() {
            self.notify_no_detections();
            return;
        }

        trace!(count = result.len(), "Reporting detections");
        self.deliver(DetectionEvent::Detections {
            frame_width,
            frame_height,
            boxes: result.boxes().iter().map(BoxPayload::from).collect(),
        });
    }

    /// Count an empty detection, emitting `noFaces` every `interval` calls
    pub fn notify_no_detections(&self) {
        let count = self.no_detection_count.fetch_add(1, Ordering::AcqRel) + 1;
        if count % self.interval == 0 {
            trace!(count, "Reporting no detections");
            self.deliver(DetectionEvent::NoDetections);
        }
    }

    /// Empty detections seen since creation
    pub fn no_detection_count(&self) -> u64 {
        self.no_detection_count.load(Ordering::Acquire)
    }

    /// Events handed to an observer since creation
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn interval(&self) -> u64 {
        self.interval
    }
}
