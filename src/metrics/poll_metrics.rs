//! Poll loop metrics using OpenTelemetry.

use opentelemetry::KeyValue;
use opentelemetry::metrics::{Counter, Gauge, Histogram, Meter};
use std::sync::Arc;
use std::time::Instant;

/// Metrics collector shared by every poll loop of a client.
///
/// # Examples
///
/// ```rust,no_run
/// use apollo_watch::metrics::PollMetrics;
/// use opentelemetry::global;
///
/// let metrics = PollMetrics::new(global::meter("apollo-watch"));
///
/// let timer = metrics.start_fetch();
/// // ... fetch a namespace ...
/// metrics.record_fetch_success("A1", timer);
/// ```
#[derive(Clone)]
pub struct PollMetrics {
    polls: Counter<u64>,
    poll_failures: Counter<u64>,
    changes: Counter<u64>,
    fetch_success: Counter<u64>,
    fetch_failures: Counter<u64>,
    fetch_duration: Histogram<f64>,
    failure_storms: Counter<u64>,
    change_age_seconds: Gauge<i64>,
    last_change: Arc<parking_lot::Mutex<Instant>>,
}

impl PollMetrics {
    /// Create a collector that registers its instruments on `meter`.
    pub fn new(meter: Meter) -> Self {
        let polls = meter
            .u64_counter("apollo_watch.poll.requests")
            .with_description("Number of long polls issued")
            .build();

        let poll_failures = meter
            .u64_counter("apollo_watch.poll.failures")
            .with_description("Number of failed long polls")
            .build();

        let changes = meter
            .u64_counter("apollo_watch.poll.changes")
            .with_description("Number of namespaces reported changed")
            .build();

        let fetch_success = meter
            .u64_counter("apollo_watch.fetch.success")
            .with_description("Number of successful namespace re-fetches")
            .build();

        let fetch_failures = meter
            .u64_counter("apollo_watch.fetch.failures")
            .with_description("Number of failed namespace re-fetches")
            .build();

        let fetch_duration = meter
            .f64_histogram("apollo_watch.fetch.duration")
            .with_description("Duration of namespace re-fetches in seconds")
            .with_unit("s")
            .build();

        let failure_storms = meter
            .u64_counter("apollo_watch.poll.failure_storms")
            .with_description("Number of poll loops stopped by a failure storm")
            .build();

        let change_age_seconds = meter
            .i64_gauge("apollo_watch.change.age")
            .with_description("Time since the last observed change in seconds")
            .with_unit("s")
            .build();

        Self {
            polls,
            poll_failures,
            changes,
            fetch_success,
            fetch_failures,
            fetch_duration,
            failure_storms,
            change_age_seconds,
            last_change: Arc::new(parking_lot::Mutex::new(Instant::now())),
        }
    }

    fn app(app_id: &str) -> [KeyValue; 1] {
        [KeyValue::new("app_id", app_id.to_string())]
    }

    /// Count a long poll and refresh the change age gauge.
    pub fn record_poll(&self, app_id: &str) {
        let attrs = Self::app(app_id);
        self.polls.add(1, &attrs);
        let age = self.last_change.lock().elapsed().as_secs() as i64;
        self.change_age_seconds.record(age, &attrs);
    }

    /// Count a failed long poll.
    pub fn record_poll_failure(&self, app_id: &str) {
        self.poll_failures.add(1, &Self::app(app_id));
    }

    /// Count namespaces reported changed by one poll.
    pub fn record_changes(&self, app_id: &str, count: usize) {
        if count == 0 {
            return;
        }
        self.changes.add(count as u64, &Self::app(app_id));
        *self.last_change.lock() = Instant::now();
    }

    /// Start a re-fetch timer.
    pub fn start_fetch(&self) -> Instant {
        Instant::now()
    }

    /// Record a successful re-fetch started at `start`.
    pub fn record_fetch_success(&self, app_id: &str, start: Instant) {
        let attrs = Self::app(app_id);
        self.fetch_success.add(1, &attrs);
        self.fetch_duration
            .record(start.elapsed().as_secs_f64(), &attrs);
    }

    /// Record a failed re-fetch started at `start`.
    pub fn record_fetch_failure(&self, app_id: &str, start: Instant) {
        let attrs = Self::app(app_id);
        self.fetch_failures.add(1, &attrs);
        self.fetch_duration
            .record(start.elapsed().as_secs_f64(), &attrs);
    }

    /// Count a loop stopped by a failure storm.
    pub fn record_failure_storm(&self, app_id: &str) {
        self.failure_storms.add(1, &Self::app(app_id));
    }
}

impl std::fmt::Debug for PollMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollMetrics").finish_non_exhaustive()
    }
}
