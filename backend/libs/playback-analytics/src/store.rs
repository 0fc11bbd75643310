use crate::error::{AggregationError, Result};
use crate::models::{StreamStats, ViewershipMetrics};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Durable home of computed stream statistics
#[async_trait]
pub trait StatsStore: Send + Sync {
    /// Insert or replace the row keyed by `stats.stream_id`
    async fn upsert(&self, stats: &StreamStats) -> Result<()>;

    /// Load the persisted row for a stream, if any
    async fn get_by_stream_id(&self, stream_id: Uuid) -> Result<Option<StreamStats>>;
}

/// PostgreSQL-backed stats store over the `stream_stats` table
pub struct PostgresStatsStore {
    pool: PgPool,
}

impl PostgresStatsStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StatsStore for PostgresStatsStore {
    async fn upsert(&self, stats: &StreamStats) -> Result<()> {
        let metrics = &stats.metrics;

        sqlx::query(
            r#"
            INSERT INTO stream_stats (
                stream_id, unique_viewers, total_watch_seconds, avg_watch_seconds,
                peak_concurrent_viewers, viewers_by_country, viewers_by_device,
                total_buffer_seconds, buffer_ratio, error_rate, computed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (stream_id) DO UPDATE SET
                unique_viewers = EXCLUDED.unique_viewers,
                total_watch_seconds = EXCLUDED.total_watch_seconds,
                avg_watch_seconds = EXCLUDED.avg_watch_seconds,
                peak_concurrent_viewers = EXCLUDED.peak_concurrent_viewers,
                viewers_by_country = EXCLUDED.viewers_by_country,
                viewers_by_device = EXCLUDED.viewers_by_device,
                total_buffer_seconds = EXCLUDED.total_buffer_seconds,
                buffer_ratio = EXCLUDED.buffer_ratio,
                error_rate = EXCLUDED.error_rate,
                computed_at = EXCLUDED.computed_at
            "#,
        )
        .bind(stats.stream_id)
        .bind(metrics.unique_viewers)
        .bind(metrics.total_watch_seconds)
        .bind(metrics.avg_watch_seconds)
        .bind(metrics.peak_concurrent_viewers)
        .bind(Json(&metrics.viewers_by_country))
        .bind(Json(&metrics.viewers_by_device))
        .bind(metrics.total_buffer_seconds)
        .bind(metrics.buffer_ratio)
        .bind(metrics.error_rate)
        .bind(stats.computed_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AggregationError::SinkFailure(e.to_string()))?;

        Ok(())
    }

    async fn get_by_stream_id(&self, stream_id: Uuid) -> Result<Option<StreamStats>> {
        let row = sqlx::query_as::<_, StreamStatsRow>(
            r#"
            SELECT
                stream_id, unique_viewers, total_watch_seconds, avg_watch_seconds,
                peak_concurrent_viewers, viewers_by_country, viewers_by_device,
                total_buffer_seconds, buffer_ratio, error_rate, computed_at
            FROM stream_stats
            WHERE stream_id = $1
            "#,
        )
        .bind(stream_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AggregationError::SinkFailure(e.to_string()))?;

        Ok(row.map(Into::into))
    }
}

// Database row representation
#[derive(sqlx::FromRow)]
struct StreamStatsRow {
    stream_id: Uuid,
    unique_viewers: i64,
    total_watch_seconds: i64,
    avg_watch_seconds: i64,
    peak_concurrent_viewers: i64,
    viewers_by_country: Json<BTreeMap<String, i64>>,
    viewers_by_device: Json<BTreeMap<String, i64>>,
    total_buffer_seconds: i64,
    buffer_ratio: f64,
    error_rate: f64,
    computed_at: DateTime<Utc>,
}

impl From<StreamStatsRow> for StreamStats {
    fn from(row: StreamStatsRow) -> Self {
        StreamStats {
            stream_id: row.stream_id,
            metrics: ViewershipMetrics {
                unique_viewers: row.unique_viewers,
                total_watch_seconds: row.total_watch_seconds,
                avg_watch_seconds: row.avg_watch_seconds,
                peak_concurrent_viewers: row.peak_concurrent_viewers,
                viewers_by_country: row.viewers_by_country.0,
                viewers_by_device: row.viewers_by_device.0,
                total_buffer_seconds: row.total_buffer_seconds,
                buffer_ratio: row.buffer_ratio,
                error_rate: row.error_rate,
            },
            computed_at: row.computed_at,
        }
    }
}
