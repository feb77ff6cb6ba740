//! Lock-free sample ring between device callbacks and lane threads
//!
//! Single-producer single-consumer: the cpal callback is on one side, the
//! lane thread doing a bounded blocking read or write is on the other.

use crossbeam::queue::ArrayQueue;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::constants::BYTES_PER_SAMPLE;

/// Lock-free ring of 16-bit PCM samples
#[derive(Debug)]
pub struct SampleRing {
    queue: ArrayQueue<i16>,
    overflow_count: AtomicUsize,
    underrun_count: AtomicUsize,
}

impl SampleRing {
    /// Create a new ring holding up to `capacity` samples
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: ArrayQueue::new(capacity),
            overflow_count: AtomicUsize::new(0),
            underrun_count: AtomicUsize::new(0),
        }
    }

    /// Push a sample
    /// Returns false if the ring is full (overflow)
    pub fn push(&self, sample: i16) -> bool {
        match self.queue.push(sample) {
            Ok(()) => true,
            Err(_) => {
                self.overflow_count.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Pop a sample
    /// Returns None if the ring is empty (underrun)
    pub fn pop(&self) -> Option<i16> {
        match self.queue.pop() {
            Some(sample) => Some(sample),
            None => {
                self.underrun_count.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Push whole little-endian samples from `pcm` until the ring is full.
    /// Returns the number of bytes consumed.
    pub fn push_pcm(&self, pcm: &[u8]) -> usize {
        let mut consumed = 0;
        for chunk in pcm.chunks_exact(BYTES_PER_SAMPLE) {
            if self.queue.push(i16::from_le_bytes([chunk[0], chunk[1]])).is_err() {
                break;
            }
            consumed += BYTES_PER_SAMPLE;
        }
        consumed
    }

    /// Pop samples into `pcm` as little-endian bytes.
    /// Returns the number of bytes written.
    pub fn pop_pcm_into(&self, pcm: &mut [u8]) -> usize {
        let mut written = 0;
        for chunk in pcm.chunks_exact_mut(BYTES_PER_SAMPLE) {
            match self.queue.pop() {
                Some(sample) => chunk.copy_from_slice(&sample.to_le_bytes()),
                None => break,
            }
            written += BYTES_PER_SAMPLE;
        }
        written
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.queue.is_full()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    pub fn overflow_count(&self) -> usize {
        self.overflow_count.load(Ordering::Relaxed)
    }

    pub fn underrun_count(&self) -> usize {
        self.underrun_count.load(Ordering::Relaxed)
    }
}

/// Thread-safe handle to a sample ring
pub type SharedSampleRing = Arc<SampleRing>;

pub fn create_shared_ring(capacity: usize) -> SharedSampleRing {
    Arc::new(SampleRing::new(capacity))
}
