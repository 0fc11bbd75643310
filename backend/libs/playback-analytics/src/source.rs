use crate::error::{AggregationError, Result};
use crate::models::{PlaybackEvent, PlaybackEventType};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

/// Read side of the playback event log
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Load a stream's events with `occurred_at >= since` (all history when
    /// `since` is `None`), ascending by timestamp
    async fn list_events_since(
        &self,
        stream_id: Uuid,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<PlaybackEvent>>;
}

/// PostgreSQL-backed event source over the `playback_events` table
pub struct PostgresEventSource {
    pool: PgPool,
}

impl PostgresEventSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventSource for PostgresEventSource {
    async fn list_events_since(
        &self,
        stream_id: Uuid,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<PlaybackEvent>> {
        let events = sqlx::query_as::<_, PlaybackEventRow>(
            r#"
            SELECT stream_id, client_id, event_type, country, device, occurred_at
            FROM playback_events
            WHERE stream_id = $1
              AND ($2::timestamptz IS NULL OR occurred_at >= $2)
            ORDER BY occurred_at ASC, id ASC
            "#,
        )
        .bind(stream_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AggregationError::SourceUnavailable(e.to_string()))?
        .into_iter()
        .map(|row| row.into())
        .collect();

        Ok(events)
    }
}

// Database row representation
#[derive(sqlx::FromRow)]
struct PlaybackEventRow {
    stream_id: Uuid,
    client_id: String,
    event_type: String,
    country: Option<String>,
    device: Option<String>,
    occurred_at: DateTime<Utc>,
}

impl From<PlaybackEventRow> for PlaybackEvent {
    fn from(row: PlaybackEventRow) -> Self {
        PlaybackEvent {
            stream_id: row.stream_id,
            client_id: row.client_id,
            event_type: PlaybackEventType::from(row.event_type.as_str()),
            country: row.country.unwrap_or_default(),
            device: row.device.unwrap_or_default(),
            occurred_at: row.occurred_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_conversion() {
        let now = Utc::now();
        let row = PlaybackEventRow {
            stream_id: Uuid::nil(),
            client_id: "c1".to_string(),
            event_type: "buffer_end".to_string(),
            country: None,
            device: Some("android".to_string()),
            occurred_at: now,
        };

        let event: PlaybackEvent = row.into();

        assert_eq!(event.event_type, PlaybackEventType::BufferEnd);
        assert_eq!(event.country, "");
        assert_eq!(event.device, "android");
        assert_eq!(event.occurred_at, now);
    }
}
