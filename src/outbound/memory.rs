//! In-memory sink used by the tests in place of Kafka.
//!
//! Accepted records stay pending until the test resolves them, which makes
//! queue depth and delivery ordering fully controllable.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use super::{DeliveryOutcome, DeliveryTracker, OutboundRecord, OutboundSink, ProduceError};

#[derive(Debug)]
pub struct MemorySink {
    tracker: DeliveryTracker,
    pending: Mutex<VecDeque<OutboundRecord>>,
    produced: Mutex<Vec<OutboundRecord>>,
    next_error: Mutex<Option<ProduceError>>,
    /// Records beyond this depth are rejected with `QueueFull`, like a
    /// bounded client buffer.
    capacity: usize,
    panic_on_produce: bool,
}

impl MemorySink {
    pub fn new(tracker: DeliveryTracker) -> Self {
        Self::with_capacity(tracker, usize::MAX)
    }

    pub fn with_capacity(tracker: DeliveryTracker, capacity: usize) -> Self {
        Self {
            tracker,
            pending: Mutex::new(VecDeque::new()),
            produced: Mutex::new(Vec::new()),
            next_error: Mutex::new(None),
            capacity,
            panic_on_produce: false,
        }
    }

    /// A sink whose `produce` panics, to exercise the handler's last-resort
    /// boundary.
    pub fn panicking(tracker: DeliveryTracker) -> Self {
        Self {
            panic_on_produce: true,
            ..Self::new(tracker)
        }
    }

    /// Makes the next `produce` call fail with `err`.
    pub fn fail_next(&self, err: ProduceError) {
        *self.next_error.lock().unwrap() = Some(err);
    }

    /// Every record ever accepted, in hand-off order.
    pub fn produced(&self) -> Vec<OutboundRecord> {
        self.produced.lock().unwrap().clone()
    }

    /// Reports the oldest pending record with `outcome`. Returns false when
    /// nothing is pending.
    pub fn resolve_next(&self, outcome: DeliveryOutcome) -> bool {
        let (record, remaining) = {
            let mut pending = self.pending.lock().unwrap();
            match pending.pop_front() {
                Some(record) => (record, pending.len()),
                None => return false,
            }
        };
        self.tracker.on_delivery(&record.key, outcome, remaining);
        true
    }

    pub fn resolve_all(&self, outcome: DeliveryOutcome) -> usize {
        let mut resolved = 0;
        while self.resolve_next(outcome.clone()) {
            resolved += 1;
        }
        resolved
    }
}

impl OutboundSink for MemorySink {
    fn queue_len(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    fn produce(&self, key: &[u8], value: &[u8]) -> Result<(), ProduceError> {
        if self.panic_on_produce {
            panic!("memory sink configured to panic");
        }
        if let Some(err) = self.next_error.lock().unwrap().take() {
            return Err(err);
        }
        let mut pending = self.pending.lock().unwrap();
        if pending.len() >= self.capacity {
            return Err(ProduceError::QueueFull);
        }
        let record = OutboundRecord {
            key: key.to_vec(),
            value: value.to_vec(),
        };
        pending.push_back(record.clone());
        self.produced.lock().unwrap().push(record);
        Ok(())
    }

    fn flush(&self, _timeout: Duration) -> Result<(), ProduceError> {
        if self.queue_len() == 0 {
            Ok(())
        } else {
            Err(ProduceError::Rejected("flush timed out".to_string()))
        }
    }
}
