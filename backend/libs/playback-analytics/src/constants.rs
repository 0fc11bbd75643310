//! Playback analytics constants

/// Default idle gap before a client's session is closed (30 minutes)
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 30 * 60;

/// Default watch time credited per qualifying telemetry event
pub const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 15;

/// Upper bound for the heartbeat credit (one day)
pub const MAX_HEARTBEAT_INTERVAL_SECS: u64 = 24 * 60 * 60;

/// Offset added to a session's end before the concurrency sweep
pub const SWEEP_CLOSE_NUDGE_SECS: i64 = 1;

/// Label used for sessions with a blank country or device tag
pub const UNKNOWN_TAG: &str = "unknown";

/// Environment prefix for aggregator settings
pub const ENV_PREFIX: &str = "PLAYBACK_ANALYTICS_";
