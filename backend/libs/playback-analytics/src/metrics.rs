use std::time::Duration;

use once_cell::sync::Lazy;
use prometheus::{Histogram, HistogramOpts, IntCounterVec, Opts};

static AGGREGATIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "playback_analytics_aggregations_total",
            "Stream aggregation runs by outcome",
        ),
        &["outcome"],
    )
    .expect("failed to create playback_analytics_aggregations_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register playback_analytics_aggregations_total");
    counter
});

static AGGREGATION_DURATION_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    let histogram = Histogram::with_opts(
        HistogramOpts::new(
            "playback_analytics_aggregation_duration_seconds",
            "Wall time spent fetching, rebuilding and persisting one stream",
        )
        .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
    )
    .expect("failed to create playback_analytics_aggregation_duration_seconds");
    prometheus::default_registry()
        .register(Box::new(histogram.clone()))
        .expect("failed to register playback_analytics_aggregation_duration_seconds");
    histogram
});

static SESSIONS_BUILT: Lazy<Histogram> = Lazy::new(|| {
    let histogram = Histogram::with_opts(
        HistogramOpts::new(
            "playback_analytics_sessions_built",
            "Viewer sessions reconstructed per aggregation run",
        )
        .buckets(prometheus::exponential_buckets(1.0, 4.0, 10).unwrap_or_default()),
    )
    .expect("failed to create playback_analytics_sessions_built");
    prometheus::default_registry()
        .register(Box::new(histogram.clone()))
        .expect("failed to register playback_analytics_sessions_built");
    histogram
});

pub fn observe_aggregation(outcome: &str, elapsed: Duration) {
    AGGREGATIONS_TOTAL.with_label_values(&[outcome]).inc();
    AGGREGATION_DURATION_SECONDS.observe(elapsed.as_secs_f64());
}

pub fn observe_sessions_built(count: usize) {
    SESSIONS_BUILT.observe(count as f64);
}
