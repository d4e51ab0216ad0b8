//! Monitor configuration
//!
//! One `DatabaseConfig` per side of the sync pair, plus the broker, control
//! plane, and scheduling knobs. All values are environment-supplied via the
//! CLI layer in `main.rs`; nothing here reads the environment directly.

use std::time::Duration;

// =============================================================================
// Database Configuration
// =============================================================================

/// Which side of the sync pair a database sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseKind {
    Mysql,
    Postgres,
}

impl DatabaseKind {
    /// Short name used as the `database` metric label and as the
    /// mirror-table prefix on the target side.
    pub fn short_name(&self) -> &'static str {
        match self {
            DatabaseKind::Mysql => "mysql",
            DatabaseKind::Postgres => "postgres",
        }
    }
}

/// Connection parameters for one side of the sync pair.
///
/// Immutable after construction; probes only read it.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub kind: DatabaseKind,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
}

// =============================================================================
// Monitor Configuration
// =============================================================================

/// Top-level configuration for the monitor.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Source side (CDC origin)
    pub mysql: DatabaseConfig,

    /// Target side (mirror)
    pub postgres: DatabaseConfig,

    /// Kafka bootstrap servers for the throughput consumer
    pub kafka_bootstrap_servers: String,

    /// Kafka Connect REST endpoint
    pub kafka_connect_url: String,

    /// Tables monitored for lag and consistency
    pub tables: Vec<String>,

    /// Cadence of the periodic probe cycle
    pub poll_interval: Duration,

    /// Pause after an uncaught cycle-level error
    pub error_backoff: Duration,

    /// Timeout budget for individual database and control-plane calls
    pub query_timeout: Duration,

    /// Metrics exposition bind address
    pub metrics_addr: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            mysql: DatabaseConfig {
                kind: DatabaseKind::Mysql,
                host: "localhost".to_string(),
                port: 3306,
                database: "codeigniter_db".to_string(),
                username: "mysql".to_string(),
                password: "mysql".to_string(),
            },
            postgres: DatabaseConfig {
                kind: DatabaseKind::Postgres,
                host: "localhost".to_string(),
                port: 5432,
                database: "nestjs_db".to_string(),
                username: "postgres".to_string(),
                password: "postgres".to_string(),
            },
            kafka_bootstrap_servers: "localhost:9092".to_string(),
            kafka_connect_url: "http://localhost:8083".to_string(),
            tables: vec!["users".to_string()],
            poll_interval: Duration::from_secs(30),
            error_backoff: Duration::from_secs(10),
            query_timeout: Duration::from_secs(10),
            metrics_addr: "0.0.0.0:8084".to_string(),
        }
    }
}

/// Parse a comma-separated table list, dropping empty segments.
pub fn parse_tables(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}
