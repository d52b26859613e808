// SPDX-License-Identifier: GPL-3.0-only

//! Background detection scheduling
//!
//! Detection runs on a dedicated tokio runtime so a slow detector never
//! stalls the capture thread. `submit` returns immediately; the detector runs
//! on the runtime's blocking pool and one of the two callbacks fires when it
//! finishes.
//!
//! Submissions are never serialised or cancelled by newer ones. How many may
//! be in flight at once is governed by [`BackpressurePolicy`].
//!
//! Shutdown closes a gate whose read side is held by every submit and every
//! callback, then waits on the write side for running callbacks. Once
//! `shutdown` returns, no callback can start. A callback may itself shut the
//! scheduler down; the runtime is then torn down on a helper thread and the
//! calling callback is the last one to run.

use crate::errors::DetectionError;
use crate::frame_processor::detector::Detector;
use crate::frame_processor::types::{BoundingBox, DetectionResult, DetectorImage};
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard};
use tokio::runtime::{Handle, Runtime};
use tracing::{debug, info, trace, warn};

/// How to treat submissions while earlier detections are still running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum BackpressurePolicy {
    /// Drop new submissions while `max_in_flight` detections are running
    DropWhileBusy { max_in_flight: usize },
    /// Accept every submission
    Unbounded,
}

impl Default for BackpressurePolicy {
    fn default() -> Self {
        BackpressurePolicy::DropWhileBusy {
            max_in_flight: crate::constants::DEFAULT_MAX_IN_FLIGHT,
        }
    }
}

/// What happened to a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Detection was queued; exactly one callback will fire unless the
    /// scheduler shuts down first
    Submitted,
    /// Rejected by the backpressure policy; no callback fires
    Dropped,
    /// The scheduler is shut down; no callback fires
    ShutDown,
}

/// Decrements the in-flight count when a detection task ends or is abandoned
struct InFlightGuard(Arc<AtomicUsize>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

thread_local! {
    /// Gate of the scheduler whose callback is running on this thread, or 0
    static DELIVERING: Cell<usize> = const { Cell::new(0) };
}

/// Closed once on shutdown; readers hold it while submitting or delivering
#[derive(Debug, Default)]
struct ShutdownGate {
    lock: RwLock<()>,
    closed: AtomicBool,
}

impl ShutdownGate {
    fn id(&self) -> usize {
        self as *const Self as usize
    }

    fn read(&self) -> RwLockReadGuard<'_, ()> {
        match self.lock.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Whether the current thread is inside one of this gate's callbacks
    fn in_callback(&self) -> bool {
        DELIVERING.with(|current| current.get() == self.id())
    }

    /// Close the gate; `false` if it was already closed
    ///
    /// Waits for running callbacks unless called from one of them.
    fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        if !self.in_callback() {
            drop(match self.lock.write() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            });
        }
        true
    }
}

/// Marks the current thread as delivering for one gate until dropped
struct DeliveringScope(usize);

impl DeliveringScope {
    fn enter(gate: &ShutdownGate) -> Self {
        Self(DELIVERING.with(|current| current.replace(gate.id())))
    }
}

impl Drop for DeliveringScope {
    fn drop(&mut self) {
        DELIVERING.with(|current| current.set(self.0));
    }
}

/// Runs a [`Detector`] off the capture thread
pub struct DetectionScheduler {
    detector: Arc<dyn Detector>,
    runtime: Mutex<Option<Runtime>>,
    handle: Handle,
    policy: BackpressurePolicy,
    in_flight: Arc<AtomicUsize>,
    gate: Arc<ShutdownGate>,
}

impl DetectionScheduler {
    /// Start a detection runtime
    ///
    /// `detection_threads` bounds how many detector calls run in parallel.
    pub fn new(
        detector: Arc<dyn Detector>,
        detection_threads: usize,
        policy: BackpressurePolicy,
    ) -> Result<Self, DetectionError> {
        let threads = detection_threads.max(1);
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(threads)
            .thread_name("detection")
            .enable_all()
            .build()
            .map_err(|e| DetectionError::Runtime(e.to_string()))?;
        let handle = runtime.handle().clone();

        info!(
            detector = detector.name(),
            threads,
            ?policy,
            "Detection scheduler started"
        );

        Ok(Self {
            detector,
            runtime: Mutex::new(Some(runtime)),
            handle,
            policy,
            in_flight: Arc::new(AtomicUsize::new(0)),
            gate: Arc::new(ShutdownGate::default()),
        })
    }

    /// Queue a detection
    ///
    /// The image carries the frame rotation so the detector can report boxes
    /// in upright space. On success `on_result` receives the boxes tagged
    /// with the image's width, height and timestamp; on failure `on_failure`
    /// receives the error.
    pub fn submit<R, F>(&self, image: DetectorImage, on_result: R, on_failure: F) -> SubmitOutcome
    where
        R: FnOnce(DetectionResult) + Send + 'static,
        F: FnOnce(DetectionError) + Send + 'static,
    {
        let _gate = self.gate.read();
        if self.gate.is_closed() {
            return SubmitOutcome::ShutDown;
        }

        if !self.reserve_slot() {
            trace!(
                in_flight = self.in_flight.load(Ordering::Relaxed),
                "Detector busy, dropping submission"
            );
            return SubmitOutcome::Dropped;
        }
        let guard = InFlightGuard(Arc::clone(&self.in_flight));

        let detector = Arc::clone(&self.detector);
        let callback_gate = Arc::clone(&self.gate);
        let width = image.width;
        let height = image.height;
        let timestamp_ns = image.timestamp_ns;

        self.handle.spawn(async move {
            let start = std::time::Instant::now();
            let outcome = tokio::task::spawn_blocking(move || detector.detect(&image))
                .await
                .unwrap_or_else(|e| {
                    warn!(error = %e, "Detection task panicked");
                    Err(DetectionError::Panicked(e.to_string()))
                });
            drop(guard);

            trace!(
                elapsed_ms = start.elapsed().as_millis(),
                ok = outcome.is_ok(),
                "Detection finished"
            );

            deliver(
                &callback_gate,
                outcome,
                move |boxes| on_result(DetectionResult::new(boxes, width, height, timestamp_ns)),
                on_failure,
            );
        });

        SubmitOutcome::Submitted
    }

    fn reserve_slot(&self) -> bool {
        match self.policy {
            BackpressurePolicy::DropWhileBusy { max_in_flight } => self
                .in_flight
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                    (n < max_in_flight).then_some(n + 1)
                })
                .is_ok(),
            BackpressurePolicy::Unbounded => {
                self.in_flight.fetch_add(1, Ordering::AcqRel);
                true
            }
        }
    }

    /// Detections currently running or queued
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn policy(&self) -> BackpressurePolicy {
        self.policy
    }

    pub fn detector_name(&self) -> &'static str {
        self.detector.name()
    }

    pub fn is_shut_down(&self) -> bool {
        self.gate.is_closed()
    }

    /// Stop the runtime and close the detector
    ///
    /// Queued detections are abandoned; a detector call already running on
    /// the blocking pool finishes in the background but its result is
    /// discarded. Safe to call more than once, from async contexts and from
    /// inside a result or failure callback.
    pub fn shutdown(&self) {
        let from_callback = self.gate.in_callback();
        if !self.gate.close() {
            return;
        }

        let runtime = match self.runtime.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(runtime) = runtime {
            if from_callback {
                // The calling task still runs on this runtime's worker
                std::thread::spawn(move || runtime.shutdown_background());
            } else {
                runtime.shutdown_background();
            }
        }

        self.detector.close();
        info!(
            detector = self.detector.name(),
            abandoned = self.in_flight(),
            "Detection scheduler shut down"
        );
    }
}

impl Drop for DetectionScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Run the matching callback unless the scheduler shut down meanwhile
fn deliver<R, F>(
    gate: &ShutdownGate,
    outcome: Result<Vec<BoundingBox>, DetectionError>,
    on_result: R,
    on_failure: F,
) where
    R: FnOnce(Vec<BoundingBox>),
    F: FnOnce(DetectionError),
{
    let _gate = gate.read();
    if gate.is_closed() {
        debug!("Discarding detection completed after shutdown");
        return;
    }
    let _scope = DeliveringScope::enter(gate);
    match outcome {
        Ok(boxes) => on_result(boxes),
        Err(e) => on_failure(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame_processor::detector::FixedDetector;
    use std::sync::Condvar;
    use std::sync::mpsc;
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(5);

    /// Blocks every detect call until released
    #[derive(Default)]
    struct GatedDetector {
        open: Mutex<bool>,
        cv: Condvar,
        started: AtomicUsize,
    }

    impl GatedDetector {
        fn release(&self) {
            *self.open.lock().unwrap() = true;
            self.cv.notify_all();
        }
    }

    impl Detector for GatedDetector {
        fn detect(&self, _image: &DetectorImage) -> Result<Vec<BoundingBox>, DetectionError> {
            self.started.fetch_add(1, Ordering::SeqCst);
            let mut open = self.open.lock().unwrap();
            while !*open {
                open = self.cv.wait(open).unwrap();
            }
            Ok(vec![BoundingBox::new(1, 1, 2, 2)])
        }

        fn name(&self) -> &'static str {
            "gated"
        }
    }

    struct FailingDetector;

    impl Detector for FailingDetector {
        fn detect(&self, _image: &DetectorImage) -> Result<Vec<BoundingBox>, DetectionError> {
            Err(DetectionError::Failed("model not loaded".into()))
        }

        fn name(&self) -> &'static str {
            "failing"
        }
    }

    struct PanickingDetector;

    impl Detector for PanickingDetector {
        fn detect(&self, _image: &DetectorImage) -> Result<Vec<BoundingBox>, DetectionError> {
            panic!("detector bug");
        }

        fn name(&self) -> &'static str {
            "panicking"
        }
    }

    fn image(timestamp_ns: i64) -> DetectorImage {
        DetectorImage {
            data: vec![0; 8 * 4 * 3 / 2],
            width: 8,
            height: 4,
            rotation_degrees: 0,
            timestamp_ns,
        }
    }

    fn wait_for(cond: impl Fn() -> bool) -> bool {
        let deadline = std::time::Instant::now() + WAIT;
        while std::time::Instant::now() < deadline {
            if cond() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn test_result_is_keyed_to_submitted_image() {
        let detector = Arc::new(FixedDetector::new(vec![BoundingBox::new(1, 2, 3, 4)]));
        let scheduler =
            DetectionScheduler::new(detector.clone(), 1, BackpressurePolicy::default()).unwrap();
        let (tx, rx) = mpsc::channel();

        let outcome = scheduler.submit(
            image(42),
            move |result| tx.send(result).unwrap(),
            |e| panic!("unexpected failure: {}", e),
        );
        assert_eq!(outcome, SubmitOutcome::Submitted);

        let result = rx.recv_timeout(WAIT).unwrap();
        assert_eq!(result.frame_width(), 8);
        assert_eq!(result.frame_height(), 4);
        assert_eq!(result.timestamp_ns(), 42);
        assert_eq!(result.boxes(), &[BoundingBox::new(1, 2, 3, 4)]);
        assert_eq!(detector.calls(), 1);
    }

    #[test]
    fn test_failure_callback() {
        let scheduler =
            DetectionScheduler::new(Arc::new(FailingDetector), 1, BackpressurePolicy::Unbounded)
                .unwrap();
        let (tx, rx) = mpsc::channel();
        scheduler.submit(image(0), |_| panic!("no result expected"), move |e| {
            tx.send(e).unwrap()
        });
        assert_eq!(
            rx.recv_timeout(WAIT).unwrap(),
            DetectionError::Failed("model not loaded".into())
        );
    }

    #[test]
    fn test_panicking_detector_reports_failure() {
        let scheduler =
            DetectionScheduler::new(Arc::new(PanickingDetector), 1, BackpressurePolicy::default())
                .unwrap();
        let (tx, rx) = mpsc::channel();
        scheduler.submit(image(0), |_| panic!("no result expected"), move |e| {
            tx.send(e).unwrap()
        });
        assert!(matches!(
            rx.recv_timeout(WAIT).unwrap(),
            DetectionError::Panicked(_)
        ));
        assert!(wait_for(|| scheduler.in_flight() == 0));
    }

    #[test]
    fn test_drop_while_busy() {
        let detector = Arc::new(GatedDetector::default());
        let scheduler = DetectionScheduler::new(
            detector.clone(),
            1,
            BackpressurePolicy::DropWhileBusy { max_in_flight: 1 },
        )
        .unwrap();
        let (tx, rx) = mpsc::channel();

        let tx1 = tx.clone();
        assert_eq!(
            scheduler.submit(image(1), move |r| tx1.send(r).unwrap(), |_| {}),
            SubmitOutcome::Submitted
        );
        assert_eq!(
            scheduler.submit(image(2), |_| panic!("dropped work ran"), |_| {}),
            SubmitOutcome::Dropped
        );

        detector.release();
        assert_eq!(rx.recv_timeout(WAIT).unwrap().timestamp_ns(), 1);
        assert!(wait_for(|| scheduler.in_flight() == 0));

        assert_eq!(
            scheduler.submit(image(3), move |r| tx.send(r).unwrap(), |_| {}),
            SubmitOutcome::Submitted
        );
        assert_eq!(rx.recv_timeout(WAIT).unwrap().timestamp_ns(), 3);
    }

    #[test]
    fn test_unbounded_allows_overlap() {
        let detector = Arc::new(GatedDetector::default());
        let scheduler =
            DetectionScheduler::new(detector.clone(), 4, BackpressurePolicy::Unbounded).unwrap();
        let (tx, rx) = mpsc::channel();

        for ts in 0..3 {
            let tx = tx.clone();
            assert_eq!(
                scheduler.submit(image(ts), move |r| tx.send(r).unwrap(), |_| {}),
                SubmitOutcome::Submitted
            );
        }
        assert!(wait_for(|| detector.started.load(Ordering::SeqCst) == 3));
        assert_eq!(scheduler.in_flight(), 3);

        detector.release();
        let mut seen: Vec<i64> = (0..3)
            .map(|_| rx.recv_timeout(WAIT).unwrap().timestamp_ns())
            .collect();
        seen.sort();
        assert_eq!(seen, vec![0, 1, 2]);
    }

    #[test]
    fn test_shutdown_discards_late_completion() {
        let detector = Arc::new(GatedDetector::default());
        let scheduler =
            DetectionScheduler::new(detector.clone(), 1, BackpressurePolicy::default()).unwrap();
        let (tx, rx) = mpsc::channel::<DetectionResult>();

        scheduler.submit(image(1), move |r| tx.send(r).unwrap(), |_| {});
        assert!(wait_for(|| detector.started.load(Ordering::SeqCst) == 1));

        scheduler.shutdown();
        detector.release();

        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
        assert!(scheduler.is_shut_down());
        assert_eq!(
            scheduler.submit(image(2), |_| {}, |_| {}),
            SubmitOutcome::ShutDown
        );

        // Idempotent
        scheduler.shutdown();
    }

    #[test]
    fn test_shutdown_closes_detector() {
        let detector = Arc::new(FixedDetector::default());
        let scheduler =
            DetectionScheduler::new(detector.clone(), 1, BackpressurePolicy::default()).unwrap();
        assert!(!detector.is_closed());
        drop(scheduler);
        assert!(detector.is_closed());
    }

    #[test]
    fn test_shutdown_from_result_callback() {
        let detector = Arc::new(FixedDetector::new(vec![BoundingBox::new(0, 0, 1, 1)]));
        let scheduler = Arc::new(
            DetectionScheduler::new(detector.clone(), 1, BackpressurePolicy::Unbounded).unwrap(),
        );
        let weak = Arc::downgrade(&scheduler);
        let (tx, rx) = mpsc::channel();

        scheduler.submit(
            image(0),
            move |_| {
                if let Some(scheduler) = weak.upgrade() {
                    scheduler.shutdown();
                }
                tx.send(()).unwrap();
            },
            |e| panic!("unexpected failure: {}", e),
        );

        rx.recv_timeout(WAIT).unwrap();
        assert!(scheduler.is_shut_down());
        assert!(detector.is_closed());
        assert_eq!(
            scheduler.submit(image(1), |_| {}, |_| {}),
            SubmitOutcome::ShutDown
        );
    }

    #[tokio::test]
    async fn test_shutdown_from_async_context() {
        let scheduler = DetectionScheduler::new(
            Arc::new(FixedDetector::default()),
            1,
            BackpressurePolicy::default(),
        )
        .unwrap();
        scheduler.shutdown();
        assert!(scheduler.is_shut_down());
    }

    #[test]
    fn test_policy_serde() {
        let json = serde_json::to_string(&BackpressurePolicy::default()).unwrap();
        assert_eq!(json, r#"{"mode":"drop_while_busy","max_in_flight":1}"#);
        let parsed: BackpressurePolicy = serde_json::from_str(r#"{"mode":"unbounded"}"#).unwrap();
        assert_eq!(parsed, BackpressurePolicy::Unbounded);
    }
}
