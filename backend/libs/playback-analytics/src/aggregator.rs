//! Stream aggregation orchestrator
//!
//! Pulls a stream's telemetry from the event source, rebuilds viewer
//! sessions, derives statistics and upserts them into the stats store.
//! This is the only layer that talks to collaborators.

use crate::config::SessionPolicy;
use crate::error::{AggregationError, Result};
use crate::metrics;
use crate::models::StreamStats;
use crate::sessions::build_sessions;
use crate::source::EventSource;
use crate::stats::compute_metrics;
use crate::store::StatsStore;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Aggregation engine bound to one event source and one stats store
///
/// Holds no per-stream state between calls. Concurrent calls for the same
/// stream are not serialized here.
pub struct StreamAggregator {
    source: Arc<dyn EventSource>,
    store: Arc<dyn StatsStore>,
    policy: SessionPolicy,
}

impl StreamAggregator {
    pub fn new(
        source: Arc<dyn EventSource>,
        store: Arc<dyn StatsStore>,
        policy: SessionPolicy,
    ) -> Self {
        Self {
            source,
            store,
            policy,
        }
    }

    pub fn policy(&self) -> SessionPolicy {
        self.policy
    }

    /// Recompute and persist statistics for one stream
    ///
    /// Returns [`AggregationError::NoData`] when the window holds no events.
    /// Collaborator failures are returned as-is; nothing is retried and
    /// nothing is written unless the full record was computed.
    pub async fn aggregate(
        &self,
        stream_id: Uuid,
        since: Option<DateTime<Utc>>,
    ) -> Result<StreamStats> {
        let started = Instant::now();
        let result = self.run(stream_id, since).await;

        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) => e.outcome(),
        };
        metrics::observe_aggregation(outcome, started.elapsed());

        result
    }

    async fn run(&self, stream_id: Uuid, since: Option<DateTime<Utc>>) -> Result<StreamStats> {
        let events = self
            .source
            .list_events_since(stream_id, since)
            .await
            .map_err(|e| {
                warn!(stream_id = %stream_id, error = %e, "Failed to load playback events");
                e
            })?;

        if events.is_empty() {
            debug!(stream_id = %stream_id, since = ?since, "No playback events in window");
            return Err(AggregationError::NoData { stream_id });
        }

        let sessions = build_sessions(&events, self.policy);
        metrics::observe_sessions_built(sessions.len());

        let stats = StreamStats::new(stream_id, compute_metrics(&sessions), Utc::now());

        self.store.upsert(&stats).await.map_err(|e| {
            error!(stream_id = %stream_id, error = %e, "Failed to persist stream stats");
            e
        })?;

        info!(
            stream_id = %stream_id,
            events = events.len(),
            sessions = sessions.len(),
            unique_viewers = stats.metrics.unique_viewers,
            peak_concurrent = stats.metrics.peak_concurrent_viewers,
            "Stream stats aggregated"
        );

        Ok(stats)
    }

    /// Aggregate several streams one after another
    ///
    /// Streams without data are skipped; other failures are recorded and do
    /// not stop the batch.
    pub async fn aggregate_many(
        &self,
        stream_ids: &[Uuid],
        since: Option<DateTime<Utc>>,
    ) -> AggregationReport {
        let mut report = AggregationReport::default();

        for &stream_id in stream_ids {
            match self.aggregate(stream_id, since).await {
                Ok(_) => report.updated.push(stream_id),
                Err(e) if e.is_no_data() => report.skipped.push(stream_id),
                Err(e) => report.failed.push(FailedStream {
                    stream_id,
                    retryable: e.is_retryable(),
                    error: e.to_string(),
                }),
            }
        }

        info!(
            updated = report.updated.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "Aggregation batch finished"
        );
        report
    }
}

/// Outcome of a batch run
#[derive(Debug, Clone, Default, Serialize)]
pub struct AggregationReport {
    pub updated: Vec<Uuid>,
    pub skipped: Vec<Uuid>,
    pub failed: Vec<FailedStream>,
}

impl AggregationReport {
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedStream {
    pub stream_id: Uuid,
    pub retryable: bool,
    pub error: String,
}
