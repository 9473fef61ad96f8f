//! Report computation latency, one histogram per endpoint.

use std::sync::Mutex;
use std::time::Duration;

use hdrhistogram::Histogram;
use serde::Serialize;

use crate::error::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Analytics,
    Rankings,
}

/// Percentiles in milliseconds; None until the first sample.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LatencySummary {
    pub samples: u64,
    pub p50_ms: Option<f64>,
    pub p95_ms: Option<f64>,
    pub p99_ms: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LatencySnapshot {
    pub analytics: LatencySummary,
    pub rankings: LatencySummary,
}

/// Values are stored in microseconds, 1us to 60s, 3 significant figures.
pub struct LatencyStats {
    analytics: Mutex<Histogram<u64>>,
    rankings: Mutex<Histogram<u64>>,
}

fn histogram() -> Result<Histogram<u64>> {
    Histogram::new_with_bounds(1, 60_000_000, 3)
        .map_err(|e| AppError::Metrics(format!("histogram bounds: {e}")))
}

fn summarize(h: &Mutex<Histogram<u64>>) -> LatencySummary {
    let Ok(h) = h.lock() else {
        return LatencySummary::default();
    };
    if h.len() == 0 {
        return LatencySummary::default();
    }
    let ms = |q: f64| Some(h.value_at_quantile(q) as f64 / 1_000.0);
    LatencySummary {
        samples: h.len(),
        p50_ms: ms(0.5),
        p95_ms: ms(0.95),
        p99_ms: ms(0.99),
    }
}

impl LatencyStats {
    pub fn new() -> Result<Self> {
        Ok(Self {
            analytics: Mutex::new(histogram()?),
            rankings: Mutex::new(histogram()?),
        })
    }

    pub fn record(&self, kind: ReportKind, elapsed: Duration) {
        let us = elapsed.as_micros().clamp(1, 60_000_000) as u64;
        let slot = match kind {
            ReportKind::Analytics => &self.analytics,
            ReportKind::Rankings => &self.rankings,
        };
        if let Ok(mut h) = slot.lock() {
            let _ = h.record(us);
        }
    }

    pub fn snapshot(&self) -> LatencySnapshot {
        LatencySnapshot {
            analytics: summarize(&self.analytics),
            rankings: summarize(&self.rankings),
        }
    }
}
