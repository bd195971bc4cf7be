//! Event processing duration histogram
//!
//! One histogram per framework instance, labeled by event kind. Snapshots
//! serialize to JSON for the `status` surface.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Upper bounds (seconds) of the histogram buckets
pub const BUCKETS: [f64; 11] = [
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Label value for an observed event
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Delete,
    Update,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Delete => "delete",
            EventKind::Update => "update",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HistogramSnapshot {
    pub count: u64,
    pub sum_seconds: f64,
    /// Cumulative counts per bucket upper bound, in [`BUCKETS`] order
    pub buckets: Vec<u64>,
}

impl HistogramSnapshot {
    fn empty() -> Self {
        Self {
            count: 0,
            sum_seconds: 0.0,
            buckets: vec![0; BUCKETS.len()],
        }
    }

    fn record(&mut self, seconds: f64) {
        self.count += 1;
        self.sum_seconds += seconds;
        for (bound, slot) in BUCKETS.iter().zip(self.buckets.iter_mut()) {
            if seconds <= *bound {
                *slot += 1;
            }
        }
    }
}

/// Histogram of event processing durations, labeled by [`EventKind`]
#[derive(Debug, Default)]
pub struct EventHistogram {
    series: Mutex<BTreeMap<EventKind, HistogramSnapshot>>,
}

impl EventHistogram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&self, kind: EventKind, elapsed: Duration) {
        let mut series = match self.series.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        series
            .entry(kind)
            .or_insert_with(HistogramSnapshot::empty)
            .record(elapsed.as_secs_f64());
    }

    /// Start timing an event; the duration is recorded when the timer drops.
    pub fn start_timer(&self, kind: EventKind) -> Timer<'_> {
        Timer {
            histogram: self,
            kind,
            started: Instant::now(),
        }
    }

    pub fn snapshot(&self) -> BTreeMap<EventKind, HistogramSnapshot> {
        match self.series.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Number of observations for one kind
    pub fn count(&self, kind: EventKind) -> u64 {
        self.snapshot().get(&kind).map_or(0, |s| s.count)
    }
}

/// Drop guard returned by [`EventHistogram::start_timer`]
pub struct Timer<'a> {
    histogram: &'a EventHistogram,
    kind: EventKind,
    started: Instant,
}

impl Drop for Timer<'_> {
    fn drop(&mut self) {
        self.histogram.observe(self.kind, self.started.elapsed());
    }
}
