//! Data consistency probe
//!
//! Same sweep shape as the lag probe, but compares `COUNT(*)` on both sides
//! and records the absolute difference per table. A nonzero divergence is a
//! warning, never fatal; it stays visible until a later poll overwrites it.

use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::config::DatabaseKind;
use crate::db::{mirror_table, SyncEndpoints};
use crate::error::Result;
use crate::metrics::SyncMetrics;

/// Measures per-table row-count divergence between the sync pair.
pub struct ConsistencyProbe {
    source: DatabaseKind,
    metrics: Arc<SyncMetrics>,
}

impl ConsistencyProbe {
    pub fn new(metrics: Arc<SyncMetrics>) -> Self {
        Self {
            source: DatabaseKind::Mysql,
            metrics,
        }
    }

    /// Sweep all monitored tables once; per-table errors are isolated.
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

            let source_count = match source.row_count(table).await {
                Ok(count) => count,
                Err(e) => {
                    error!("failed to check consistency for table {}: {}", table, e);
                    continue;
                }
            };
            let target_count = match target.row_count(&mirror).await {
                Ok(count) => count,
                Err(e) => {
                    error!("failed to check consistency for table {}: {}", table, e);
                    continue;
                }
            };

            let divergence = (source_count - target_count).abs();
            self.metrics
                .data_inconsistency
                .with_label_values(&[table])
                .set(divergence as f64);

            if divergence > 0 {
                warn!(
                    "data inconsistency in {}: mysql={}, postgres={}",
                    table, source_count, target_count
                );
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
