//! Request counters for the /health endpoint. Updated by the report
//! handlers, read by the health handler.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

#[derive(Default)]
pub struct HealthState {
    requests_served: AtomicU64,
    requests_failed: AtomicU64,
    /// Unix seconds of the last served report (0 = none).
    last_request_at: AtomicU64,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self, ok: bool) {
        self.requests_served.fetch_add(1, Ordering::Relaxed);
        if !ok {
            self.requests_failed.fetch_add(1, Ordering::Relaxed);
        }
        let now = u64::try_from(Utc::now().timestamp()).unwrap_or(0);
        self.last_request_at.store(now, Ordering::Relaxed);
    }

    pub fn requests_served(&self) -> u64 {
        self.requests_served.load(Ordering::Relaxed)
    }

    pub fn requests_failed(&self) -> u64 {
        self.requests_failed.load(Ordering::Relaxed)
    }

    pub fn last_request_at(&self) -> Option<u64> {
        match self.last_request_at.load(Ordering::Relaxed) {
            0 => None,
            t => Some(t),
        }
    }
}
