//! Downstream watch-time reconciliation
//!
//! CDN analytics can report more watch time than telemetry heartbeats
//! capture. Consumers take the larger of the two figures; the engine's own
//! output is never modified by this step.

use crate::error::Result;
use crate::models::StreamStats;
use crate::stats::{average_watch_seconds, ratio};
use crate::store::StatsStore;
use tracing::{debug, info};
use uuid::Uuid;

/// Merge an externally reported watch-time total into computed stats
///
/// Total watch time becomes `max(local, external)`; the per-viewer average
/// and buffer ratio are derived again from the merged total. Negative
/// external figures count as zero.
pub fn merge_external_watch_time(stats: &StreamStats, external_watch_seconds: i64) -> StreamStats {
    let mut merged = stats.clone();
    let metrics = &mut merged.metrics;

    metrics.total_watch_seconds = metrics
        .total_watch_seconds
        .max(external_watch_seconds.max(0));
    metrics.avg_watch_seconds =
        average_watch_seconds(metrics.total_watch_seconds, metrics.unique_viewers);
    metrics.buffer_ratio = ratio(metrics.total_buffer_seconds, metrics.total_watch_seconds);

    merged
}

/// Apply an external watch-time figure to a stream's persisted stats
///
/// Returns `Ok(None)` when the stream has never been aggregated.
pub async fn reconcile_stored(
    store: &dyn StatsStore,
    stream_id: Uuid,
    external_watch_seconds: i64,
) -> Result<Option<StreamStats>> {
    let Some(stored) = store.get_by_stream_id(stream_id).await? else {
        debug!(stream_id = %stream_id, "No stored stats to reconcile");
        return Ok(None);
    };

    let merged = merge_external_watch_time(&stored, external_watch_seconds);
    if merged != stored {
        store.upsert(&merged).await?;
        info!(
            stream_id = %stream_id,
            local_watch_seconds = stored.metrics.total_watch_seconds,
            external_watch_seconds,
            "Reconciled stream watch time"
        );
    }

    Ok(Some(merged))
}
