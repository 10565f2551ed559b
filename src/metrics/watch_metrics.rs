//! Watch loop metrics tracking using OpenTelemetry.

use opentelemetry::KeyValue;
use opentelemetry::metrics::{Counter, Histogram, Meter};
use std::time::Instant;

/// Metrics collector for the background watch loop.
///
/// Tracks backend queries, decodes, and how many snapshots were published or
/// suppressed as duplicate errors. Every measurement is tagged with the watched
/// variable name.
///
/// # Examples
///
/// ```rust,no_run
/// use runtimevar::metrics::WatchMetrics;
/// use opentelemetry::global;
///
/// let meter = global::meter("runtimevar");
/// let metrics = WatchMetrics::new(meter, "cfg/v1");
///
/// let timer = metrics.start_query();
/// // ... query the backend ...
/// metrics.record_query_success(timer);
/// ```
#[derive(Clone)]
pub struct WatchMetrics {
    query_attempts: Counter<u64>,
    query_failures: Counter<u64>,
    query_duration: Histogram<f64>,
    decodes: Counter<u64>,
    decode_failures: Counter<u64>,
    published: Counter<u64>,
    suppressed: Counter<u64>,
    attributes: [KeyValue; 1],
}

impl WatchMetrics {
    /// Create a new metrics collector for the variable `name`.
    pub fn new(meter: Meter, name: impl Into<String>) -> Self {
        let query_attempts = meter
            .u64_counter("runtimevar.query.attempts")
            .with_description("Total number of backend queries")
            .build();

        let query_failures = meter
            .u64_counter("runtimevar.query.failures")
            .with_description("Number of backend queries that failed or timed out")
            .build();

        let query_duration = meter
            .f64_histogram("runtimevar.query.duration")
            .with_description("Duration of backend queries in seconds")
            .with_unit("s")
            .build();

        let decodes = meter
            .u64_counter("runtimevar.decode.attempts")
            .with_description("Number of decoder invocations")
            .build();

        let decode_failures = meter
            .u64_counter("runtimevar.decode.failures")
            .with_description("Number of decoder failures")
            .build();

        let published = meter
            .u64_counter("runtimevar.snapshots.published")
            .with_description("Snapshots pushed to consumers")
            .build();

        let suppressed = meter
            .u64_counter("runtimevar.snapshots.suppressed")
            .with_description("Error snapshots suppressed as duplicates")
            .build();

        Self {
            query_attempts,
            query_failures,
            query_duration,
            decodes,
            decode_failures,
            published,
            suppressed,
            attributes: [KeyValue::new("variable", name.into())],
        }
    }

    /// Start a query timer.
    pub fn start_query(&self) -> Instant {
        self.query_attempts.add(1, &self.attributes);
        Instant::now()
    }

    /// Record a successful query.
    pub fn record_query_success(&self, start: Instant) {
        self.query_duration
            .record(start.elapsed().as_secs_f64(), &self.attributes);
    }

    /// Record a failed or timed-out query.
    pub fn record_query_failure(&self, start: Instant) {
        self.query_failures.add(1, &self.attributes);
        self.query_duration
            .record(start.elapsed().as_secs_f64(), &self.attributes);
    }

    /// Record a decoder invocation and whether it failed.
    pub fn record_decode(&self, failed: bool) {
        self.decodes.add(1, &self.attributes);
        if failed {
            self.decode_failures.add(1, &self.attributes);
        }
    }

    /// Record a snapshot pushed to the mailbox.
    pub fn record_published(&self) {
        self.published.add(1, &self.attributes);
    }

    /// Record an error snapshot suppressed as a duplicate.
    pub fn record_suppressed(&self) {
        self.suppressed.add(1, &self.attributes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::global;

    #[test]
    fn test_metrics_creation() {
        let metrics = WatchMetrics::new(global::meter("test"), "cfg");

        // Test basic operations don't panic
        let timer = metrics.start_query();
        metrics.record_query_success(timer);

        let timer = metrics.start_query();
        metrics.record_query_failure(timer);

        metrics.record_decode(false);
        metrics.record_decode(true);
        metrics.record_published();
        metrics.record_suppressed();
    }

    #[test]
    fn test_metrics_clone() {
        let metrics = WatchMetrics::new(global::meter("test"), "cfg");
        let metrics2 = metrics.clone();

        let timer1 = metrics.start_query();
        let timer2 = metrics2.start_query();

        metrics.record_query_success(timer1);
        metrics2.record_query_failure(timer2);
    }
}
