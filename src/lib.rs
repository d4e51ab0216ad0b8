//! Sync Health Monitor
//!
//! Continuous health monitor for a bidirectional MySQL ⇄ PostgreSQL sync
//! pipeline built on Debezium connectors and Kafka. Three independent health
//! signals plus a throughput signal are published as Prometheus metrics:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        Sync Health Monitor                        │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐  ┌───────────┐  ┌─────────────┐  ┌─────────────┐  │
//! │  │ Connector │  │    Lag    │  │ Consistency │  │ Throughput  │  │
//! │  │  Status   │  │   Probe   │  │    Probe    │  │    Probe    │  │
//! │  └─────┬─────┘  └─────┬─────┘  └──────┬──────┘  └──────┬──────┘  │
//! │        └──────────────┴───────┬───────┴────────────────┘         │
//! │                               ▼                                   │
//! │                        Metric Registry ──▶ GET /metrics          │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The periodic probes poll the Kafka Connect control plane and both
//! databases on a fixed cadence; the throughput probe streams from the
//! broker's sync-event topics. A supervisor isolates failures so one probe's
//! error never stops another, and all state lives in live queries — the
//! databases and the control plane are always the source of truth.
//!
//! # Modules
//!
//! - [`config`] - Environment-supplied monitor configuration
//! - [`db`] - Connection source and table query ports
//! - [`error`] - Error types
//! - [`metrics`] - Metric registry and exposition encoding
//! - [`probes`] - The four health probes
//! - [`server`] - Prometheus exposition endpoint
//! - [`supervisor`] - Probe lifecycle and scheduling

pub mod config;
pub mod db;
pub mod error;
pub mod metrics;
pub mod probes;
pub mod server;
pub mod supervisor;

// Re-export commonly used types
pub use config::{DatabaseConfig, DatabaseKind, MonitorConfig};
pub use error::{Error, Result};
pub use metrics::SyncMetrics;
pub use supervisor::{Supervisor, SupervisorState};
