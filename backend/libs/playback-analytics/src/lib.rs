//! Playback analytics core
//!
//! Rebuilds per-viewer sessions from client playback telemetry and derives
//! stream-level viewership and QoE statistics: unique viewers, watch time,
//! peak concurrency, buffer ratio and error rate.
//!
//! ```text
//! EventSource → StreamAggregator → build_sessions → compute_metrics → StatsStore
//! ```

pub mod aggregator;
pub mod config;
pub mod constants;
pub mod error;
pub mod metrics;
pub mod models;
pub mod reconcile;
pub mod sessions;
pub mod source;
pub mod stats;
pub mod store;

pub use aggregator::{AggregationReport, FailedStream, StreamAggregator};
pub use config::{AggregatorConfig, DatabaseConfig, SessionPolicy};
pub use error::{AggregationError, Result};
pub use models::*;
pub use sessions::{build_sessions, SessionBuilder};
pub use source::{EventSource, PostgresEventSource};
pub use stats::{compute_metrics, peak_concurrent_viewers};
pub use store::{PostgresStatsStore, StatsStore};
