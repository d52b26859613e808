// SPDX-License-Identifier: GPL-3.0-only

//! Latest-detection cell shared between the detection runtime and the
//! capture thread.
//!
//! Writes replace the slot unconditionally (last write wins, no ordering by
//! frame timestamp). Reads clone an `Arc` out of a `watch` channel and never
//! wait on a writer for longer than the pointer swap.

use crate::frame_processor::types::DetectionResult;
use std::sync::Arc;
use tokio::sync::watch;

/// Single-slot cache holding the most recent detection result
#[derive(Debug)]
pub struct DetectionResultCache {
    tx: watch::Sender<Option<Arc<DetectionResult>>>,
}

impl Default for DetectionResultCache {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectionResultCache {
    /// Create an empty cache
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// Replace the cached value, returning the shared result
    pub fn publish(&self, result: impl Into<Arc<DetectionResult>>) -> Arc<DetectionResult> {
        let result = result.into();
        self.tx.send_replace(Some(Arc::clone(&result)));
        result
    }

    /// Current value, if any
    pub fn read(&self) -> Option<Arc<DetectionResult>> {
        self.tx.borrow().clone()
    }

    /// Empty the slot
    pub fn clear(&self) {
        self.tx.send_replace(None);
    }

    /// Receiver that is notified on every publish or clear
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<DetectionResult>>> {
        self.tx.subscribe()
    }
}
