//! Probe supervisor
//!
//! Owns the probe lifecycles: launches the exposition endpoint, one worker
//! for the periodic probe group (connector status → lag → consistency, in
//! that order so connector-state freshness is never staler than lag
//! freshness within a cycle), and one worker for the streaming throughput
//! probe. Workers share nothing but the metric registry and the shutdown
//! token; a stall or failure in one never delays another.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::MonitorConfig;
use crate::db::{ConnectionSource, SyncEndpoints};
use crate::error::{Error, Result};
use crate::metrics::SyncMetrics;
use crate::probes::{ConnectorStatusProbe, ConsistencyProbe, ReplicationLagProbe, ThroughputProbe};
use crate::server;

// =============================================================================
// State Machine
// =============================================================================

/// Lifecycle state of the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Starting,
    Running,
    Stopping,
}

// =============================================================================
// Periodic Probe Group
// =============================================================================

/// The three periodic probes, executed sequentially within one cycle.
pub struct PeriodicProbes {
    connector: ConnectorStatusProbe,
    lag: ReplicationLagProbe,
    consistency: ConsistencyProbe,
    endpoints: Arc<dyn SyncEndpoints>,
    tables: Vec<String>,
    poll_interval: Duration,
    error_backoff: Duration,
}

impl PeriodicProbes {
    pub fn new(
        connector: ConnectorStatusProbe,
        lag: ReplicationLagProbe,
        consistency: ConsistencyProbe,
        endpoints: Arc<dyn SyncEndpoints>,
        tables: Vec<String>,
        poll_interval: Duration,
        error_backoff: Duration,
    ) -> Self {
        Self {
            connector,
            lag,
            consistency,
            endpoints,
            tables,
            poll_interval,
            error_backoff,
        }
    }

    /// Run one cycle. Each sub-probe's failure is logged and isolated so the
    /// remaining probes still complete and write their metrics; the first
    /// error is surfaced after the sweep so the scheduler applies its
    /// backoff pause instead of the regular interval.
    pub async fn run_cycle(&self) -> Result<()> {
        let mut first_error = None;

        if let Err(e) = self.connector.poll().await {
            error!("failed to check connector status: {}", e);
            first_error.get_or_insert(e);
        }
        if let Err(e) = self.lag.poll(self.endpoints.as_ref(), &self.tables).await {
            error!("failed to monitor sync delay: {}", e);
            first_error.get_or_insert(e);
        }
        if let Err(e) = self
            .consistency
            .poll(self.endpoints.as_ref(), &self.tables)
            .await
        {
            error!("failed to check data consistency: {}", e);
            first_error.get_or_insert(e);
        }

        match first_error {
            None => Ok(()),
            Some(e) => Err(e),
        }
    }

    /// Fixed-cadence loop; a shorter backoff pause follows a failed cycle.
    async fn run(&self, shutdown: CancellationToken) {
        loop {
            if shutdown.is_cancelled() {
                break;
            }
            let pause = match self.run_cycle().await {
                Ok(()) => self.poll_interval,
                Err(e) => {
                    error!("error in monitoring loop: {}", e);
                    self.error_backoff
                }
            };
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(pause) => {}
            }
        }
        info!("periodic probe worker stopped");
    }
}

// =============================================================================
// Supervisor
// =============================================================================

/// Starts and stops all probe workers plus the exposition server.
pub struct Supervisor {
    config: MonitorConfig,
    metrics: Arc<SyncMetrics>,
    state: RwLock<SupervisorState>,
    shutdown: CancellationToken,
}

impl Supervisor {
    pub fn new(config: MonitorConfig, metrics: Arc<SyncMetrics>) -> Self {
        Self {
            config,
            metrics,
            state: RwLock::new(SupervisorState::Starting),
            shutdown: CancellationToken::new(),
        }
    }

    /// Token an external signal handler cancels to stop the monitor.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn state(&self) -> SupervisorState {
        *self.state.read()
    }

    /// Run until the shutdown token is cancelled.
    ///
    /// Workers are signalled cooperatively; in-flight database and HTTP
    /// calls complete or error naturally, bounded by their timeout budgets.
    pub async fn run(self: Arc<Self>) -> Result<()> {
        let addr = self
            .config
            .metrics_addr
            .parse()
            .map_err(|e| Error::Config(format!("invalid metrics address: {}", e)))?;

        // Exposition endpoint comes up before any probe writes.
        let server_handle = {
            let metrics = self.metrics.clone();
            let shutdown = self.shutdown.clone();
            tokio::spawn(async move {
                if let Err(e) = server::serve(addr, metrics, shutdown).await {
                    error!("metrics server error: {}", e);
                }
            })
        };

        let endpoints: Arc<dyn SyncEndpoints> = Arc::new(ConnectionSource::new(
            self.config.mysql.clone(),
            self.config.postgres.clone(),
            self.metrics.clone(),
            self.config.query_timeout,
        ));

        let connector = ConnectorStatusProbe::new(
            self.config.kafka_connect_url.clone(),
            self.metrics.clone(),
            self.config.query_timeout,
        )?;

        let periodic = PeriodicProbes::new(
            connector,
            ReplicationLagProbe::new(self.metrics.clone()),
            ConsistencyProbe::new(self.metrics.clone()),
            endpoints,
            self.config.tables.clone(),
            self.config.poll_interval,
            self.config.error_backoff,
        );

        let throughput = ThroughputProbe::new(
            self.config.kafka_bootstrap_servers.clone(),
            self.metrics.clone(),
        );

        let periodic_handle = {
            let shutdown = self.shutdown.clone();
            tokio::spawn(async move { periodic.run(shutdown).await })
        };
        let throughput_handle = {
            let shutdown = self.shutdown.clone();
            tokio::spawn(async move { throughput.run(shutdown).await })
        };

        *self.state.write() = SupervisorState::Running;
        info!("sync health monitoring started");

        self.shutdown.cancelled().await;
        *self.state.write() = SupervisorState::Stopping;
        info!("shutting down...");

        let _ = periodic_handle.await;
        let _ = throughput_handle.await;
        let _ = server_handle.await;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probes::testutil::MockEndpoints;
    use chrono::TimeZone;

    fn cycle_with(endpoints: MockEndpoints, connect_url: &str) -> (PeriodicProbes, Arc<SyncMetrics>) {
        let metrics = Arc::new(SyncMetrics::new().unwrap());
        let connector = ConnectorStatusProbe::new(
            connect_url.to_string(),
            metrics.clone(),
            Duration::from_millis(300),
        )
        .unwrap();
        let probes = PeriodicProbes::new(
            connector,
            ReplicationLagProbe::new(metrics.clone()),
            ConsistencyProbe::new(metrics.clone()),
            Arc::new(endpoints),
            vec!["users".to_string()],
            Duration::from_secs(30),
            Duration::from_secs(10),
        );
        (probes, metrics)
    }

    #[tokio::test]
    async fn test_cycle_isolates_control_plane_failure() {
        let source_ts = chrono::Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 5).unwrap();
        let target_ts = chrono::Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 2).unwrap();

        let endpoints = MockEndpoints::new()
            .with_source_timestamp("users", source_ts)
            .with_target_timestamp("mysql_users", target_ts)
            .with_source_count("users", 100)
            .with_target_count("mysql_users", 97);

        // Control plane unreachable: the connector probe fails, yet lag and
        // consistency must still complete and write their metrics. The cycle
        // surfaces the failure so the scheduler can back off.
        let (probes, metrics) = cycle_with(endpoints, "http://localhost:19999");
        assert!(probes.run_cycle().await.is_err());

        assert_eq!(
            metrics
                .sync_delay
                .with_label_values(&["mysql", "postgres", "users"])
                .get(),
            3.0
        );
        assert_eq!(
            metrics
                .data_inconsistency
                .with_label_values(&["users"])
                .get(),
            3.0
        );
    }

    #[tokio::test]
    async fn test_cycle_isolates_database_failure() {
        let endpoints = MockEndpoints::new().with_source_open_failure();
        let (probes, _metrics) = cycle_with(endpoints, "http://localhost:19999");

        // All three sub-probes fail; the cycle completes the full sweep and
        // reports the first failure.
        assert!(probes.run_cycle().await.is_err());
    }

    #[test]
    fn test_supervisor_starts_in_starting_state() {
        let metrics = Arc::new(SyncMetrics::new().unwrap());
        let supervisor = Supervisor::new(MonitorConfig::default(), metrics);

        assert_eq!(supervisor.state(), SupervisorState::Starting);
    }

    #[tokio::test]
    async fn test_supervisor_reaches_stopping_on_cancel() {
        let metrics = Arc::new(SyncMetrics::new().unwrap());
        let config = MonitorConfig {
            // Ephemeral port so parallel tests never collide.
            metrics_addr: "127.0.0.1:0".to_string(),
            ..MonitorConfig::default()
        };
        let supervisor = Arc::new(Supervisor::new(config, metrics));

        let token = supervisor.shutdown_token();
        let handle = tokio::spawn(supervisor.clone().run());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(supervisor.state(), SupervisorState::Running);

        token.cancel();
        handle.await.unwrap().unwrap();
        assert_eq!(supervisor.state(), SupervisorState::Stopping);
    }
}
