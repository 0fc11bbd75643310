//! Viewer session reconstruction
//!
//! Replays a stream's time-ordered telemetry and keeps one open session per
//! client. A session closes when the same client shows up again after the
//! idle threshold, or when the input runs out.
//!
//! Input ordering is trusted, not checked: events must arrive in
//! non-decreasing `occurred_at` order.

use crate::config::SessionPolicy;
use crate::models::{elapsed_secs, PlaybackEvent, PlaybackEventType, ViewerSession};
use std::collections::HashMap;
use tracing::trace;

/// Incremental session builder for a single stream
#[derive(Debug)]
pub struct SessionBuilder {
    policy: SessionPolicy,
    open: HashMap<String, ViewerSession>,
    closed: Vec<ViewerSession>,
}

impl SessionBuilder {
    pub fn new(policy: SessionPolicy) -> Self {
        Self {
            policy,
            open: HashMap::new(),
            closed: Vec::new(),
        }
    }

    /// Feed one event into the client's running session
    pub fn push(&mut self, event: &PlaybackEvent) {
        let idle_expired = self
            .open
            .get(&event.client_id)
            .map(|session| event.occurred_at - session.last_seen > self.policy.idle_timeout)
            .unwrap_or(false);

        if idle_expired {
            if let Some(mut expired) = self.open.remove(&event.client_id) {
                trace!(
                    client_id = %event.client_id,
                    last_seen = %expired.last_seen,
                    resumed_at = %event.occurred_at,
                    "Idle gap exceeded, splitting session"
                );
                expired.close();
                self.closed.push(expired);
            }
        }

        let session = self
            .open
            .entry(event.client_id.clone())
            .or_insert_with(|| ViewerSession::open(event));

        match event.event_type {
            kind if kind.counts_as_watch_time() => {
                session.watch_seconds = session
                    .watch_seconds
                    .saturating_add(self.policy.heartbeat_interval_secs);
            }
            PlaybackEventType::BufferStart => {
                if session.buffer_started_at.is_none() {
                    session.buffer_started_at = Some(event.occurred_at);
                }
            }
            PlaybackEventType::BufferEnd => {
                if let Some(buffer_start) = session.buffer_started_at.take() {
                    session.buffer_seconds = session
                        .buffer_seconds
                        .saturating_add(elapsed_secs(buffer_start, event.occurred_at));
                }
            }
            PlaybackEventType::Error => {
                session.error_count = session.error_count.saturating_add(1);
            }
            _ => {}
        }

        session.last_seen = event.occurred_at;
    }

    /// Close every open session and return the full session set
    ///
    /// Sessions closed by an idle split come first, in the order they were
    /// closed; sessions still open at end of input follow, ordered by client id.
    pub fn finish(mut self) -> Vec<ViewerSession> {
        let mut remaining: Vec<ViewerSession> = self.open.into_values().collect();
        remaining.sort_by(|a, b| a.client_id.cmp(&b.client_id));

        for mut session in remaining {
            session.close();
            self.closed.push(session);
        }
        self.closed
    }
}

/// Rebuild all sessions covered by a time-ordered event sequence
pub fn build_sessions<'a, I>(events: I, policy: SessionPolicy) -> Vec<ViewerSession>
where
    I: IntoIterator<Item = &'a PlaybackEvent>,
{
    let mut builder = SessionBuilder::new(policy);
    for event in events {
        builder.push(event);
    }
    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use uuid::Uuid;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 20, 0, 0).unwrap()
    }

    fn event(client: &str, kind: PlaybackEventType, offset_secs: i64) -> PlaybackEvent {
        PlaybackEvent::new(
            Uuid::nil(),
            client,
            kind,
            t0() + Duration::seconds(offset_secs),
        )
        .with_origin("US", "web")
    }

    #[test]
    fn test_single_viewer_watch_time() {
        let events = vec![
            event("c1", PlaybackEventType::Play, 0),
            event("c1", PlaybackEventType::Heartbeat, 15),
            event("c1", PlaybackEventType::Ended, 30),
        ];

        let sessions = build_sessions(&events, SessionPolicy::default());

        assert_eq!(sessions.len(), 1);
        let session = &sessions[0];
        assert_eq!(session.client_id, "c1");
        assert_eq!(session.watch_seconds, 45);
        assert_eq!(session.buffer_seconds, 0);
        assert_eq!(session.error_count, 0);
        assert_eq!(session.started_at, t0());
        assert_eq!(session.ended_at, t0() + Duration::seconds(30));
    }

    #[test]
    fn test_idle_gap_splits_session() {
        let events = vec![
            event("c1", PlaybackEventType::Play, 0),
            event("c1", PlaybackEventType::Heartbeat, 30 * 60 + 1),
        ];

        let sessions = build_sessions(&events, SessionPolicy::default());

        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].ended_at, t0());
        assert_eq!(sessions[1].started_at, t0() + Duration::seconds(30 * 60 + 1));
        assert!(sessions.iter().all(|s| s.watch_seconds == 15));
    }

    #[test]
    fn test_gap_at_threshold_keeps_session() {
        let events = vec![
            event("c1", PlaybackEventType::Play, 0),
            event("c1", PlaybackEventType::Heartbeat, 30 * 60),
        ];

        let sessions = build_sessions(&events, SessionPolicy::default());

        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].watch_seconds, 30);
    }

    #[test]
    fn test_buffer_interval_accumulates() {
        let events = vec![
            event("c1", PlaybackEventType::BufferStart, 0),
            event("c1", PlaybackEventType::BufferStart, 2),
            event("c1", PlaybackEventType::BufferEnd, 5),
            event("c1", PlaybackEventType::BufferEnd, 9),
        ];

        let sessions = build_sessions(&events, SessionPolicy::default());

        assert_eq!(sessions[0].buffer_seconds, 5);
        assert!(sessions[0].buffer_started_at.is_none());
    }

    #[test]
    fn test_open_buffer_flushed_on_idle_split() {
        let events = vec![
            event("c1", PlaybackEventType::Play, 0),
            event("c1", PlaybackEventType::BufferStart, 10),
            event("c1", PlaybackEventType::Heartbeat, 25),
            event("c1", PlaybackEventType::Play, 4000),
        ];

        let sessions = build_sessions(&events, SessionPolicy::default());

        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].buffer_seconds, 15);
        assert_eq!(sessions[1].buffer_seconds, 0);
    }

    #[test]
    fn test_open_buffer_flushed_at_end_of_input() {
        let events = vec![
            event("c1", PlaybackEventType::Play, 0),
            event("c1", PlaybackEventType::BufferStart, 20),
            event("c1", PlaybackEventType::Heartbeat, 32),
        ];

        let sessions = build_sessions(&events, SessionPolicy::default());

        assert_eq!(sessions.len(), 1);
        let session = &sessions[0];
        assert_eq!(session.buffer_seconds, 12);
        assert_eq!(
            session.buffer_seconds,
            (session.last_seen - (t0() + Duration::seconds(20))).num_seconds()
        );
        assert!(session.buffer_started_at.is_none());
        assert_eq!(session.ended_at, t0() + Duration::seconds(32));
    }

    #[test]
    fn test_large_heartbeat_saturates_watch_time() {
        let policy = SessionPolicy {
            idle_timeout: Duration::minutes(30),
            heartbeat_interval_secs: i64::MAX,
        };
        let events = vec![
            event("c1", PlaybackEventType::Play, 0),
            event("c1", PlaybackEventType::Heartbeat, 15),
        ];

        let sessions = build_sessions(&events, policy);

        assert_eq!(sessions[0].watch_seconds, i64::MAX);
    }

    #[test]
    fn test_errors_and_unknown_events() {
        let events = vec![
            event("c1", PlaybackEventType::Error, 0),
            event("c1", PlaybackEventType::Unknown, 5),
            event("c1", PlaybackEventType::Error, 10),
        ];

        let sessions = build_sessions(&events, SessionPolicy::default());

        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].error_count, 2);
        assert_eq!(sessions[0].watch_seconds, 0);
        assert_eq!(sessions[0].last_seen, t0() + Duration::seconds(10));
    }

    #[test]
    fn test_interleaved_clients_are_independent() {
        let events = vec![
            event("c2", PlaybackEventType::Play, 0),
            event("c1", PlaybackEventType::Play, 1),
            event("c2", PlaybackEventType::Heartbeat, 15),
            event("c1", PlaybackEventType::Error, 16),
        ];

        let sessions = build_sessions(&events, SessionPolicy::default());

        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].client_id, "c1");
        assert_eq!(sessions[0].watch_seconds, 15);
        assert_eq!(sessions[0].error_count, 1);
        assert_eq!(sessions[1].client_id, "c2");
        assert_eq!(sessions[1].watch_seconds, 30);
    }

    #[test]
    fn test_custom_policy() {
        let policy = SessionPolicy {
            idle_timeout: Duration::seconds(60),
            heartbeat_interval_secs: 10,
        };
        let events = vec![
            event("c1", PlaybackEventType::Play, 0),
            event("c1", PlaybackEventType::Heartbeat, 61),
        ];

        let sessions = build_sessions(&events, policy);

        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].watch_seconds, 10);
    }

    #[test]
    fn test_empty_input() {
        let events: Vec<PlaybackEvent> = Vec::new();
        let sessions = build_sessions(&events, SessionPolicy::default());
        assert!(sessions.is_empty());
    }
}
