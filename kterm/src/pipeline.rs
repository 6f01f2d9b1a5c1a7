//! Input pipeline
//!
//! Bytes written to a session land in a bounded [`InputRing`]. Each tick
//! drains part of it under a [`FrameBudget`]: a byte target that doubles
//! during bursts, cut short when the time budget runs out.

use std::collections::VecDeque;
use std::time::Duration;

use crate::config::PipelineConfig;

/// Bounded FIFO of pending input bytes
#[derive(Debug, Clone)]
pub struct InputRing {
    buf: VecDeque<u8>,
    capacity: usize,
    overflowed: bool,
    dropped: u64,
}

impl InputRing {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buf: VecDeque::with_capacity(capacity.min(1 << 16)),
            capacity,
            overflowed: false,
            dropped: 0,
        }
    }

    /// Append a byte; a full ring drops it and sets the overflow flag
    pub fn push(&mut self, byte: u8) -> bool {
        if self.buf.len() >= self.capacity {
            if !self.overflowed {
                log::warn!("input ring full ({} bytes), dropping input", self.capacity);
            }
            self.overflowed = true;
            self.dropped += 1;
            return false;
        }
        self.buf.push_back(byte);
        true
    }

    /// Append as many bytes as fit; returns how many were accepted
    pub fn extend(&mut self, bytes: &[u8]) -> usize {
        let room = self.capacity - self.buf.len();
        let accepted = bytes.len().min(room);
        self.buf.extend(&bytes[..accepted]);
        if accepted < bytes.len() {
            if !self.overflowed {
                log::warn!("input ring full ({} bytes), dropping input", self.capacity);
            }
            self.overflowed = true;
            self.dropped += (bytes.len() - accepted) as u64;
        }
        accepted
    }

    pub fn pop(&mut self) -> Option<u8> {
        self.buf.pop_front()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn overflowed(&self) -> bool {
        self.overflowed
    }

    /// Bytes dropped since creation
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn clear_overflow(&mut self) {
        self.overflowed = false;
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

/// Per-tick byte and time budget
#[derive(Debug, Clone)]
pub struct FrameBudget {
    chars_per_frame: usize,
    burst_threshold: usize,
    budget: Duration,
    /// Moving average cost of one byte, in nanoseconds
    avg_ns_per_byte: f64,
}

impl FrameBudget {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            chars_per_frame: config.chars_per_frame.max(1),
            burst_threshold: config.burst_threshold,
            budget: Duration::from_micros(config.frame_budget_us),
            avg_ns_per_byte: 0.0,
        }
    }

    /// Bytes to process this tick for a given backlog
    pub fn target(&self, backlog: usize) -> usize {
        let mut target = self.chars_per_frame;
        if backlog > self.burst_threshold {
            target *= 2;
        }
        if backlog < target {
            return backlog;
        }
        target
    }

    /// Fold one measurement into the moving average
    pub fn record(&mut self, bytes: usize, elapsed: Duration) {
        if bytes == 0 {
            return;
        }
        let sample = elapsed.as_nanos() as f64 / bytes as f64;
        self.avg_ns_per_byte = if self.avg_ns_per_byte == 0.0 {
            sample
        } else {
            self.avg_ns_per_byte * 0.9 + sample * 0.1
        };
    }

    pub fn avg_ns_per_byte(&self) -> f64 {
        self.avg_ns_per_byte
    }

    /// Whether the time spent so far leaves room for more bytes
    pub fn has_time(&self, elapsed: Duration) -> bool {
        let projected = elapsed.as_nanos() as f64 + self.avg_ns_per_byte;
        projected <= self.budget.as_nanos() as f64
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }
}
