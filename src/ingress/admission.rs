//! Backpressure policy for the outbound queue.
//!
//! Depth is sampled once per message and no slot is reserved, so concurrent
//! admitters may overshoot `max_queue` by at most their own number. The
//! producer's own buffer limit still rejects anything beyond its capacity.

/// Warn about near-capacity queues on every Nth received message only.
pub const WARN_SAMPLE_EVERY: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admit,
    /// Admit, but the queue is above the warning threshold.
    AdmitWithWarning,
    Drop,
}

#[derive(Debug, Clone, Copy)]
pub struct AdmissionGate {
    max_queue: usize,
    warn_threshold: usize,
}

impl AdmissionGate {
    pub fn new(max_queue: usize, warn_threshold: usize) -> Self {
        Self {
            max_queue,
            warn_threshold,
        }
    }

    /// Gate with the warning threshold at 80 % of `max_queue`.
    pub fn with_max(max_queue: usize) -> Self {
        Self::new(max_queue, max_queue.saturating_mul(8) / 10)
    }

    pub fn max_queue(&self) -> usize {
        self.max_queue
    }

    /// `received` is the running inbound total, used to sample warnings.
    pub fn decide(&self, depth: usize, received: u64) -> Admission {
        if depth >= self.max_queue {
            Admission::Drop
        } else if depth > self.warn_threshold && received % WARN_SAMPLE_EVERY == 0 {
            Admission::AdmitWithWarning
        } else {
            Admission::Admit
        }
    }
}
