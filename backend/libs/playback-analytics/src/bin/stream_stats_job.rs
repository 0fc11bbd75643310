//! Stream stats job - one-shot aggregation over the playback event log
//!
//! Usage: `stream-stats-job <stream-uuid>...`
//!
//! Environment variables:
//! - DATABASE_URL: PostgreSQL URL holding `playback_events` and `stream_stats`
//! - DATABASE_MAX_CONNECTIONS: pool size (default: 5)
//! - AGGREGATE_SINCE: optional RFC 3339 watermark; events before it are ignored
//! - PLAYBACK_ANALYTICS_IDLE_TIMEOUT_SECS: session idle threshold (default: 1800)
//! - PLAYBACK_ANALYTICS_HEARTBEAT_INTERVAL_SECS: watch credit per event (default: 15)

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use playback_analytics::{
    AggregatorConfig, DatabaseConfig, PostgresEventSource, PostgresStatsStore, StreamAggregator,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

fn parse_stream_ids(args: impl Iterator<Item = String>) -> Result<Vec<Uuid>> {
    args.map(|arg| {
        Uuid::parse_str(arg.trim()).with_context(|| format!("invalid stream id: {}", arg))
    })
    .collect()
}

fn parse_since() -> Result<Option<DateTime<Utc>>> {
    match std::env::var("AGGREGATE_SINCE") {
        Ok(raw) if !raw.trim().is_empty() => {
            let since = DateTime::parse_from_rfc3339(raw.trim())
                .with_context(|| format!("AGGREGATE_SINCE is not RFC 3339: {}", raw))?;
            Ok(Some(since.with_timezone(&Utc)))
        }
        _ => Ok(None),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sqlx=warn".into()),
        )
        .init();

    let stream_ids = parse_stream_ids(std::env::args().skip(1))?;
    if stream_ids.is_empty() {
        return Err(anyhow!("usage: stream-stats-job <stream-uuid>..."));
    }

    let config = AggregatorConfig::from_env().context("failed to load aggregator config")?;
    let db_config = DatabaseConfig::from_env().context("failed to load database config")?;
    let since = parse_since()?;

    info!(
        streams = stream_ids.len(),
        since = ?since,
        idle_timeout_secs = config.idle_timeout_secs,
        heartbeat_interval_secs = config.heartbeat_interval_secs,
        "Starting stream stats job"
    );

    let pool = PgPoolOptions::new()
        .max_connections(db_config.max_connections)
        .connect(&db_config.database_url)
        .await
        .context("failed to connect to PostgreSQL")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("failed to run migrations")?;

    let aggregator = StreamAggregator::new(
        Arc::new(PostgresEventSource::new(pool.clone())),
        Arc::new(PostgresStatsStore::new(pool.clone())),
        config.session_policy(),
    );

    let policy = aggregator.policy();
    info!(
        idle_timeout_secs = policy.idle_timeout.num_seconds(),
        heartbeat_interval_secs = policy.heartbeat_interval_secs,
        "Session policy in effect"
    );

    let report = aggregator.aggregate_many(&stream_ids, since).await;

    for stream_id in &report.skipped {
        info!(stream_id = %stream_id, "Skipped stream: no playback events");
    }
    for failure in &report.failed {
        error!(
            stream_id = %failure.stream_id,
            retryable = failure.retryable,
            error = %failure.error,
            "Stream aggregation failed"
        );
    }

    pool.close().await;

    if report.has_failures() {
        return Err(anyhow!(
            "{} of {} streams failed to aggregate",
            report.failed.len(),
            stream_ids.len()
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_stream_ids() {
        let id = Uuid::new_v4();
        let ids = parse_stream_ids(vec![id.to_string()].into_iter()).unwrap();
        assert_eq!(ids, vec![id]);

        assert!(parse_stream_ids(vec!["not-a-uuid".to_string()].into_iter()).is_err());
    }
}
