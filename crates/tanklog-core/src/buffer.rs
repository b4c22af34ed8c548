//! Bounded in-memory queue of samples awaiting a flush.

use alloc::collections::VecDeque;
use alloc::vec::Vec;

use crate::sample::Sample;

/// Result of an append, telling the caller whether a flush is now due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferStatus {
    Ok,
    /// The buffer has reached capacity; it must be flushed before the next
    /// append.
    Full,
}

/// FIFO sample queue with a fixed capacity.
///
/// Appends are never refused and never drop data; the `Full` status is the
/// signal that the caller owes a flush, not a rejection.
pub struct SampleBuffer {
    queue: VecDeque<Sample>,
    capacity: usize,
}

impl SampleBuffer {
    pub fn new(capacity: usize) -> Self {
        debug_assert!(capacity >= 1);
        Self {
            queue: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample, reporting `Full` exactly when the post-append length
    /// has reached capacity.
    pub fn append(&mut self, sample: Sample) -> BufferStatus {
        self.queue.push_back(sample);
        if self.queue.len() >= self.capacity {
            BufferStatus::Full
        } else {
            BufferStatus::Ok
        }
    }

    /// Remove and return every buffered sample, oldest first. Draining an
    /// empty buffer is a no-op that returns an empty batch.
    pub fn drain(&mut self) -> Vec<Sample> {
        self.queue.drain(..).collect()
    }

    /// Contiguous view of the buffered samples in arrival order.
    pub fn samples(&mut self) -> &[Sample] {
        self.queue.make_contiguous()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
