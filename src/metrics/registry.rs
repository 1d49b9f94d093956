use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;

/// Sentinel for "no message observed yet" in `last_message_at`.
const NO_MESSAGE: i64 = i64::MIN;

/// Upper bound on the number of distinct device ids remembered for `/devices`.
pub const MAX_TRACKED_DEVICES: usize = 10_000;

/// Counters and gauges shared by the ingress path, the delivery tracker and
/// the health surface.
///
/// Counters only ever go up. `connected` and `last_message_at` are plain
/// gauges that are overwritten.
#[derive(Debug)]
pub struct Metrics {
    received: AtomicU64,
    sent: AtomicU64,
    dropped: AtomicU64,
    failed: AtomicU64,
    invalid_topic: AtomicU64,
    outbound_errors: AtomicU64,
    connected: AtomicBool,
    /// Unix milliseconds of the last inbound message, or `NO_MESSAGE`.
    last_message_at: AtomicI64,
    start_time: DateTime<Utc>,
    devices: Mutex<HashSet<String>>,
}

/// Point-in-time copy of every metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub received: u64,
    pub sent: u64,
    pub dropped: u64,
    pub failed: u64,
    pub invalid_topic: u64,
    pub outbound_errors: u64,
    pub connected: bool,
    pub last_message_at: Option<DateTime<Utc>>,
    pub start_time: DateTime<Utc>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self::with_start_time(Utc::now())
    }

    pub fn with_start_time(start_time: DateTime<Utc>) -> Self {
        Self {
            received: AtomicU64::new(0),
            sent: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            invalid_topic: AtomicU64::new(0),
            outbound_errors: AtomicU64::new(0),
            connected: AtomicBool::new(false),
            last_message_at: AtomicI64::new(NO_MESSAGE),
            start_time,
            devices: Mutex::new(HashSet::new()),
        }
    }

    /// Counts an inbound message and stamps `last_message_at`.
    ///
    /// Returns the new `received` total, which callers use for log sampling.
    pub fn record_received(&self, at: DateTime<Utc>) -> u64 {
        self.last_message_at
            .store(at.timestamp_millis(), Ordering::Relaxed);
        self.received.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Returns the new `sent` total.
    pub fn incr_sent(&self) -> u64 {
        self.sent.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn incr_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_invalid_topic(&self) {
        self.invalid_topic.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_outbound_errors(&self) {
        self.outbound_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Relaxed);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    pub fn last_message_at(&self) -> Option<DateTime<Utc>> {
        match self.last_message_at.load(Ordering::Relaxed) {
            NO_MESSAGE => None,
            millis => Utc.timestamp_millis_opt(millis).single(),
        }
    }

    /// Remembers a forwarded device id. Ids past `MAX_TRACKED_DEVICES` are
    /// ignored.
    ///
    /// Runs on the ingress path, so it never waits: when the set is locked
    /// by a reader (or poisoned) the id is simply not recorded this time.
    pub fn record_device(&self, device_id: &str) {
        if let Ok(mut devices) = self.devices.try_lock() {
            if devices.len() < MAX_TRACKED_DEVICES && !devices.contains(device_id) {
                devices.insert(device_id.to_string());
            }
        }
    }

    #[cfg(test)]
    pub(super) fn lock_devices(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.devices.lock().unwrap()
    }

    /// Device ids seen so far, sorted.
    pub fn devices(&self) -> Vec<String> {
        let mut devices: Vec<String> = match self.devices.lock() {
            Ok(devices) => devices.iter().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().iter().cloned().collect(),
        };
        devices.sort();
        devices
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            sent: self.sent.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            invalid_topic: self.invalid_topic.load(Ordering::Relaxed),
            outbound_errors: self.outbound_errors.load(Ordering::Relaxed),
            connected: self.is_connected(),
            last_message_at: self.last_message_at(),
            start_time: self.start_time,
        }
    }
}

impl MetricsSnapshot {
    /// Percentage of received messages acknowledged by the outbound log,
    /// rounded to two decimals.
    pub fn success_rate(&self) -> f64 {
        let rate = self.sent as f64 / self.received.max(1) as f64 * 100.0;
        (rate * 100.0).round() / 100.0
    }

    /// Seconds elapsed since `start_time`, as seen at `now`.
    pub fn uptime_secs(&self, now: DateTime<Utc>) -> f64 {
        (now - self.start_time).num_milliseconds().max(0) as f64 / 1000.0
    }

    /// Seconds since the last inbound message, if any.
    pub fn last_message_ago(&self, now: DateTime<Utc>) -> Option<f64> {
        self.last_message_at
            .map(|at| (now - at).num_milliseconds() as f64 / 1000.0)
    }
}
