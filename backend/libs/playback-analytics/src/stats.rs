//! Viewership statistics over a reconstructed session set

use crate::constants::SWEEP_CLOSE_NUDGE_SECS;
use crate::models::{ViewerSession, ViewershipMetrics};
use chrono::Duration;
use std::collections::BTreeMap;

/// Compute aggregate viewership and QoE figures
///
/// Total for every input, including an empty session set.
pub fn compute_metrics(sessions: &[ViewerSession]) -> ViewershipMetrics {
    let unique_viewers = sessions.len() as i64;
    let total_watch_seconds = sessions
        .iter()
        .fold(0i64, |acc, s| acc.saturating_add(s.watch_seconds));
    let total_buffer_seconds = sessions
        .iter()
        .fold(0i64, |acc, s| acc.saturating_add(s.buffer_seconds));
    let sessions_with_errors = sessions.iter().filter(|s| s.had_error()).count() as i64;

    let mut viewers_by_country = BTreeMap::new();
    let mut viewers_by_device = BTreeMap::new();
    for session in sessions {
        *viewers_by_country
            .entry(session.country.clone())
            .or_insert(0) += 1;
        *viewers_by_device.entry(session.device.clone()).or_insert(0) += 1;
    }

    ViewershipMetrics {
        unique_viewers,
        total_watch_seconds,
        avg_watch_seconds: average_watch_seconds(total_watch_seconds, unique_viewers),
        peak_concurrent_viewers: peak_concurrent_viewers(sessions),
        viewers_by_country,
        viewers_by_device,
        total_buffer_seconds,
        buffer_ratio: ratio(total_buffer_seconds, total_watch_seconds),
        error_rate: ratio(sessions_with_errors, unique_viewers),
    }
}

/// Peak number of simultaneously open sessions (sweep line)
///
/// Each session covers `[started_at, ended_at + 1s)`. Deltas at the same
/// instant apply closes before opens, so a session ending exactly where
/// another begins is never counted alongside it.
pub fn peak_concurrent_viewers(sessions: &[ViewerSession]) -> i64 {
    let nudge = Duration::seconds(SWEEP_CLOSE_NUDGE_SECS);

    let mut deltas = Vec::with_capacity(sessions.len() * 2);
    for session in sessions {
        deltas.push((session.started_at, 1i64));
        deltas.push((session.ended_at + nudge, -1i64));
    }
    deltas.sort_unstable_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));

    let mut current = 0i64;
    let mut peak = 0i64;
    for (_, delta) in deltas {
        current += delta;
        peak = peak.max(current);
    }
    peak
}

/// Floor of total watch time per viewer, 0 without viewers
pub(crate) fn average_watch_seconds(total_watch_seconds: i64, unique_viewers: i64) -> i64 {
    if unique_viewers > 0 {
        total_watch_seconds / unique_viewers
    } else {
        0
    }
}

/// Non-negative ratio that is 0.0 for a zero denominator
pub(crate) fn ratio(numerator: i64, denominator: i64) -> f64 {
    if denominator > 0 {
        numerator.max(0) as f64 / denominator as f64
    } else {
        0.0
    }
}
