//! Playback telemetry and viewership data models

use crate::constants::UNKNOWN_TAG;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use uuid::Uuid;

/// Playback event type emitted by clients
///
/// The set is open: anything unrecognized parses to `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackEventType {
    Play,
    Heartbeat,
    BufferStart,
    BufferEnd,
    Error,
    Ended,
    #[serde(other)]
    Unknown,
}

impl PlaybackEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackEventType::Play => "play",
            PlaybackEventType::Heartbeat => "heartbeat",
            PlaybackEventType::BufferStart => "buffer_start",
            PlaybackEventType::BufferEnd => "buffer_end",
            PlaybackEventType::Error => "error",
            PlaybackEventType::Ended => "ended",
            PlaybackEventType::Unknown => "unknown",
        }
    }

    /// Events credited with one heartbeat interval of watch time
    pub fn counts_as_watch_time(&self) -> bool {
        matches!(
            self,
            PlaybackEventType::Play | PlaybackEventType::Heartbeat | PlaybackEventType::Ended
        )
    }
}

impl FromStr for PlaybackEventType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = match s.trim().to_ascii_lowercase().as_str() {
            "play" => PlaybackEventType::Play,
            "heartbeat" => PlaybackEventType::Heartbeat,
            "buffer_start" => PlaybackEventType::BufferStart,
            "buffer_end" => PlaybackEventType::BufferEnd,
            "error" => PlaybackEventType::Error,
            "ended" => PlaybackEventType::Ended,
            _ => PlaybackEventType::Unknown,
        };
        Ok(kind)
    }
}

impl From<&str> for PlaybackEventType {
    fn from(s: &str) -> Self {
        s.parse().unwrap_or(PlaybackEventType::Unknown)
    }
}

/// Raw client telemetry event, immutable once recorded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackEvent {
    pub stream_id: Uuid,
    pub client_id: String,
    pub event_type: PlaybackEventType,
    pub country: String,
    pub device: String,
    pub occurred_at: DateTime<Utc>,
}

impl PlaybackEvent {
    pub fn new(
        stream_id: Uuid,
        client_id: impl Into<String>,
        event_type: PlaybackEventType,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            stream_id,
            client_id: client_id.into(),
            event_type,
            country: String::new(),
            device: String::new(),
            occurred_at,
        }
    }

    /// Attach country and device tags
    pub fn with_origin(mut self, country: impl Into<String>, device: impl Into<String>) -> Self {
        self.country = country.into();
        self.device = device.into();
        self
    }
}

/// Reconstructed viewing occasion for one client
///
/// Only lives for the duration of a single aggregation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewerSession {
    pub client_id: String,
    pub country: String,
    pub device: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub watch_seconds: i64,
    pub buffer_seconds: i64,
    pub error_count: i64,
    pub buffer_started_at: Option<DateTime<Utc>>,
}

impl ViewerSession {
    /// Open a session seeded from the client's first event
    pub fn open(event: &PlaybackEvent) -> Self {
        Self {
            client_id: event.client_id.clone(),
            country: tag_or_unknown(&event.country),
            device: tag_or_unknown(&event.device),
            started_at: event.occurred_at,
            ended_at: event.occurred_at,
            last_seen: event.occurred_at,
            watch_seconds: 0,
            buffer_seconds: 0,
            error_count: 0,
            buffer_started_at: None,
        }
    }

    /// Flush any open buffering interval and pin the end time to last-seen
    pub fn close(&mut self) {
        if let Some(buffer_start) = self.buffer_started_at.take() {
            self.buffer_seconds = self
                .buffer_seconds
                .saturating_add(elapsed_secs(buffer_start, self.last_seen));
        }
        self.ended_at = self.last_seen;
    }

    pub fn duration(&self) -> Duration {
        self.ended_at - self.started_at
    }

    pub fn had_error(&self) -> bool {
        self.error_count > 0
    }
}

/// Aggregate viewership and QoE figures derived from a session set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewershipMetrics {
    pub unique_viewers: i64,
    pub total_watch_seconds: i64,
    pub avg_watch_seconds: i64,
    pub peak_concurrent_viewers: i64,
    pub viewers_by_country: BTreeMap<String, i64>,
    pub viewers_by_device: BTreeMap<String, i64>,
    pub total_buffer_seconds: i64,
    pub buffer_ratio: f64,
    pub error_rate: f64,
}

/// Persisted statistics row, one per stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamStats {
    pub stream_id: Uuid,
    #[serde(flatten)]
    pub metrics: ViewershipMetrics,
    pub computed_at: DateTime<Utc>,
}

impl StreamStats {
    pub fn new(stream_id: Uuid, metrics: ViewershipMetrics, computed_at: DateTime<Utc>) -> Self {
        Self {
            stream_id,
            metrics,
            computed_at,
        }
    }
}

/// Whole seconds between two instants, never negative
pub(crate) fn elapsed_secs(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    (to - from).num_seconds().max(0)
}

fn tag_or_unknown(tag: &str) -> String {
    let tag = tag.trim();
    if tag.is_empty() {
        UNKNOWN_TAG.to_string()
    } else {
        tag.to_string()
    }
}
