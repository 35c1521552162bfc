//! # Sample Queue
//!
//! Unbounded thread-safe FIFO hand-off buffer between the link-handling
//! task and the consumption loop. This is the only shared mutable state
//! in the pipeline.

use crate::frame::Sample;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Cloneable handle to the shared sample buffer.
///
/// `push` never blocks and never fails; `drain` returns everything
/// currently buffered without blocking, preserving arrival order.
#[derive(Debug, Clone, Default)]
pub struct SampleQueue {
    inner: Arc<Mutex<VecDeque<Sample>>>,
}

impl SampleQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one sample at the tail.
    pub fn push(&self, sample: Sample) {
        self.lock().push_back(sample);
    }

    /// Remove and return all buffered samples, oldest first.
    pub fn drain(&self) -> Vec<Sample> {
        self.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Sample>> {
        // A poisoned lock only means a holder panicked mid-operation;
        // the deque itself is still coherent.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
