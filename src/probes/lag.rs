//! Replication lag probe
//!
//! For each monitored table, compares the newest `updated_at` on the source
//! side against its mirror on the target side and records the absolute delta
//! in seconds. A table with no timestamp on either side is skipped for the
//! cycle — its gauge keeps the previous value.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::config::DatabaseKind;
use crate::db::{mirror_table, SyncEndpoints};
use crate::error::Result;
use crate::metrics::SyncMetrics;

/// Absolute delta between two mutation timestamps, in fractional seconds.
pub fn lag_seconds(a: DateTime<Utc>, b: DateTime<Utc>) -> f64 {
    (a - b).num_milliseconds().abs() as f64 / 1000.0
}

/// Measures per-table replication lag between the sync pair.
pub struct ReplicationLagProbe {
    source: DatabaseKind,
    target: DatabaseKind,
    metrics: Arc<SyncMetrics>,
}

impl ReplicationLagProbe {
    pub fn new(metrics: Arc<SyncMetrics>) -> Self {
        Self {
            source: DatabaseKind::Mysql,
            target: DatabaseKind::Postgres,
            metrics,
        }
    }

    /// Sweep all monitored tables once.
    ///
    /// Fails only when a side cannot be opened (the connection gauge is
    /// already 0 by then). Per-table errors are logged and isolated.
    /// Both connections are released after the sweep on every path.
    pub async fn poll(&self, endpoints: &dyn SyncEndpoints, tables: &[String]) -> Result<()> {
        let mut source = endpoints.open_source().await?;
        let mut target = match endpoints.open_target().await {
            Ok(handle) => handle,
            Err(e) => {
                if let Err(close_err) = source.close().await {
                    debug!("failed to close source connection: {}", close_err);
                }
                return Err(e);
            }
        };

        for table in tables {
            let mirror = mirror_table(self.source, table);

            let source_ts = match source.latest_mutation(table).await {
                Ok(ts) => ts,
                Err(e) => {
                    error!("failed to check sync delay for table {}: {}", table, e);
                    continue;
                }
            };
            let target_ts = match target.latest_mutation(&mirror).await {
                Ok(ts) => ts,
                Err(e) => {
                    error!("failed to check sync delay for table {}: {}", table, e);
                    continue;
                }
            };

            match (source_ts, target_ts) {
                (Some(a), Some(b)) => {
                    let delay = lag_seconds(a, b);
                    self.metrics
                        .sync_delay
                        .with_label_values(&[
                            self.source.short_name(),
                            self.target.short_name(),
                            table,
                        ])
                        .set(delay);
                    info!("sync delay for {}: {} seconds", table, delay);
                }
                _ => {
                    warn!("no mutation timestamp on one side for table {}, skipping", table);
                }
            }
        }

        if let Err(e) = source.close().await {
            debug!("failed to close source connection: {}", e);
        }
        if let Err(e) = target.close().await {
            debug!("failed to close target connection: {}", e);
        }

        Ok(())
    }
}
