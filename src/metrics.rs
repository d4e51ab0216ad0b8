//! Sync metric registry
//!
//! Process-wide store of the monitor's metric series. Probes write into it
//! concurrently; the exposition server reads snapshots from it. The registry
//! is owned by the supervisor and passed around as an `Arc` rather than
//! living in the prometheus global default registry, so tests and multiple
//! monitor instances never share series.

use prometheus::{Encoder, GaugeVec, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};

use crate::error::{Error, Result};

// =============================================================================
// Registry
// =============================================================================

/// All metric series exposed by the monitor.
///
/// Gauges are last-write-wins per label set; counters are monotonic. The
/// prometheus vecs synchronize internally, so probe workers and the
/// exposition path never need an outer lock.
pub struct SyncMetrics {
    registry: Registry,

    /// `sync_delay_seconds{source_db,target_db,table}`
    pub sync_delay: GaugeVec,

    /// `data_inconsistency_count{table}`
    pub data_inconsistency: GaugeVec,

    /// `conflict_resolution_failures_total{table}`
    ///
    /// Reserved: declared for dashboard compatibility, no probe produces it.
    pub conflict_failures: IntCounterVec,

    /// `database_connection_status{database}` — 1 connected, 0 failed
    pub connection_status: IntGaugeVec,

    /// `sync_throughput_records_per_second{direction}`
    pub throughput: GaugeVec,

    /// `kafka_connect_connector_status{connector,state}` — 1 healthy, 0 not
    pub connector_status: IntGaugeVec,
}

impl SyncMetrics {
    /// Create and register all series on a fresh registry.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let sync_delay = GaugeVec::new(
            Opts::new("sync_delay_seconds", "Sync delay between databases"),
            &["source_db", "target_db", "table"],
        )?;
        registry.register(Box::new(sync_delay.clone()))?;

        let data_inconsistency = GaugeVec::new(
            Opts::new(
                "data_inconsistency_count",
                "Number of data inconsistencies detected",
            ),
            &["table"],
        )?;
        registry.register(Box::new(data_inconsistency.clone()))?;

        let conflict_failures = IntCounterVec::new(
            Opts::new(
                "conflict_resolution_failures_total",
                "Total conflict resolution failures",
            ),
            &["table"],
        )?;
        registry.register(Box::new(conflict_failures.clone()))?;

        let connection_status = IntGaugeVec::new(
            Opts::new("database_connection_status", "Database connection status"),
            &["database"],
        )?;
        registry.register(Box::new(connection_status.clone()))?;

        let throughput = GaugeVec::new(
            Opts::new(
                "sync_throughput_records_per_second",
                "Sync throughput in records per second",
            ),
            &["direction"],
        )?;
        registry.register(Box::new(throughput.clone()))?;

        let connector_status = IntGaugeVec::new(
            Opts::new(
                "kafka_connect_connector_status",
                "Kafka Connect connector status",
            ),
            &["connector", "state"],
        )?;
        registry.register(Box::new(connector_status.clone()))?;

        Ok(Self {
            registry,
            sync_delay,
            data_inconsistency,
            conflict_failures,
            connection_status,
            throughput,
            connector_status,
        })
    }

    /// Record the connection-status gauge for one database.
    pub fn set_connection_status(&self, database: &str, connected: bool) {
        self.connection_status
            .with_label_values(&[database])
            .set(if connected { 1 } else { 0 });
    }

    /// Encode the current snapshot in Prometheus text exposition format.
    pub fn encode(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| Error::Internal(format!("non-utf8 exposition: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_creation() {
        let metrics = SyncMetrics::new().unwrap();

        // Nothing observed yet, so only the registered counter family with
        // zero children shows up in gather.
        let families = metrics.registry.gather();
        assert!(families.len() <= 6);
    }

    #[test]
    fn test_connection_status_gauge() {
        let metrics = SyncMetrics::new().unwrap();

        metrics.set_connection_status("mysql", true);
        assert_eq!(
            metrics.connection_status.with_label_values(&["mysql"]).get(),
            1
        );

        metrics.set_connection_status("mysql", false);
        assert_eq!(
            metrics.connection_status.with_label_values(&["mysql"]).get(),
            0
        );
    }

    #[test]
    fn test_gauge_is_last_write_wins() {
        let metrics = SyncMetrics::new().unwrap();
        let gauge = metrics
            .sync_delay
            .with_label_values(&["mysql", "postgres", "users"]);

        gauge.set(3.0);
        gauge.set(1.5);
        assert_eq!(gauge.get(), 1.5);
    }

    #[test]
    fn test_series_keyed_by_label_set() {
        let metrics = SyncMetrics::new().unwrap();

        metrics
            .data_inconsistency
            .with_label_values(&["users"])
            .set(3.0);
        metrics
            .data_inconsistency
            .with_label_values(&["orders"])
            .set(0.0);

        assert_eq!(
            metrics.data_inconsistency.with_label_values(&["users"]).get(),
            3.0
        );
        assert_eq!(
            metrics
                .data_inconsistency
                .with_label_values(&["orders"])
                .get(),
            0.0
        );
    }

    #[test]
    fn test_conflict_counter_is_monotonic() {
        let metrics = SyncMetrics::new().unwrap();
        let counter = metrics.conflict_failures.with_label_values(&["users"]);

        counter.inc();
        counter.inc_by(2);
        assert_eq!(counter.get(), 3);
    }

    #[test]
    fn test_encode_contains_series_names() {
        let metrics = SyncMetrics::new().unwrap();

        metrics
            .sync_delay
            .with_label_values(&["mysql", "postgres", "users"])
            .set(3.0);
        metrics.set_connection_status("postgres", true);
        metrics
            .throughput
            .with_label_values(&["mysql_to_postgres"])
            .set(0.5);
        metrics
            .connector_status
            .with_label_values(&["mysql-connector", "RUNNING"])
            .set(1);

        let text = metrics.encode().unwrap();

        assert!(text.contains("sync_delay_seconds"));
        assert!(text.contains("database_connection_status"));
        assert!(text.contains("sync_throughput_records_per_second"));
        assert!(text.contains("kafka_connect_connector_status"));
        assert!(text.contains(r#"source_db="mysql""#));
        assert!(text.contains(r#"direction="mysql_to_postgres""#));
    }

    #[test]
    fn test_registries_are_independent() {
        let a = SyncMetrics::new().unwrap();
        let b = SyncMetrics::new().unwrap();

        a.set_connection_status("mysql", true);

        assert_eq!(a.connection_status.with_label_values(&["mysql"]).get(), 1);
        assert_eq!(b.connection_status.with_label_values(&["mysql"]).get(), 0);
    }
}
