//! Connector status probe
//!
//! Polls the Kafka Connect REST interface, enumerates the active connectors,
//! and records a liveness gauge per `(connector, state)` pair. Gauges are
//! label-addressed by the state the control plane reports, so a connector
//! that flips from `RUNNING` to `FAILED` leaves its old `RUNNING` series at
//! its last-written value; consumers must key off the freshest series per
//! connector.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::metrics::SyncMetrics;

// =============================================================================
// Connector State
// =============================================================================

/// Run state reported by the control plane for a connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectorState {
    Running,
    Paused,
    Failed,
    Unassigned,
    Unknown,
}

impl ConnectorState {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "RUNNING" => ConnectorState::Running,
            "PAUSED" => ConnectorState::Paused,
            "FAILED" => ConnectorState::Failed,
            "UNASSIGNED" => ConnectorState::Unassigned,
            _ => ConnectorState::Unknown,
        }
    }

    /// Only `RUNNING` maps to healthy.
    pub fn is_healthy(&self) -> bool {
        matches!(self, ConnectorState::Running)
    }
}

// =============================================================================
// Control Plane Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct ConnectorStatusResponse {
    connector: ConnectorRunState,
}

#[derive(Debug, Deserialize)]
struct ConnectorRunState {
    #[serde(default = "unknown_state")]
    state: String,
}

fn unknown_state() -> String {
    "UNKNOWN".to_string()
}

// =============================================================================
// Probe
// =============================================================================

/// Polls Kafka Connect for connector liveness.
pub struct ConnectorStatusProbe {
    client: Client,
    connect_url: String,
    metrics: Arc<SyncMetrics>,
}

impl ConnectorStatusProbe {
    pub fn new(connect_url: String, metrics: Arc<SyncMetrics>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Internal(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            connect_url,
            metrics,
        })
    }

    /// Run one polling cycle.
    ///
    /// An error listing the connectors aborts the cycle (stale gauges persist
    /// until the next successful poll). A status failure for one connector is
    /// logged and skipped without aborting the rest of the enumeration.
    pub async fn poll(&self) -> Result<()> {
        let connectors = self.list_connectors().await?;

        for name in &connectors {
            match self.fetch_state(name).await {
                Ok(state) => {
                    self.record(name, &state);
                    info!("connector {}: {}", name, state);
                }
                Err(e) => {
                    warn!("failed to check status of connector {}: {}", name, e);
                }
            }
        }

        Ok(())
    }

    async fn list_connectors(&self) -> Result<Vec<String>> {
        let url = format!("{}/connectors", self.connect_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(Error::ApiTransport)?;

        if !response.status().is_success() {
            return Err(Error::ApiStatus(response.status()));
        }

        response
            .json::<Vec<String>>()
            .await
            .map_err(|e| Error::ApiParse(e.to_string()))
    }

    async fn fetch_state(&self, connector: &str) -> Result<String> {
        let url = format!("{}/connectors/{}/status", self.connect_url, connector);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(Error::ApiTransport)?;

        if !response.status().is_success() {
            return Err(Error::ApiStatus(response.status()));
        }

        let status: ConnectorStatusResponse = response
            .json()
            .await
            .map_err(|e| Error::ApiParse(e.to_string()))?;

        Ok(status.connector.state)
    }

    /// Write the liveness gauge for one `(connector, state)` pair.
    ///
    /// Prior-state series for the same connector are intentionally left at
    /// their last-written value.
    fn record(&self, connector: &str, raw_state: &str) {
        let healthy = ConnectorState::parse(raw_state).is_healthy();
        self.metrics
            .connector_status
            .with_label_values(&[connector, raw_state])
            .set(if healthy { 1 } else { 0 });
    }
}
