//! Sync Health Monitor entry point
//!
//! Wires environment-supplied configuration into the supervisor and runs
//! until interrupted.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sync_health_monitor::config::{parse_tables, DatabaseConfig, DatabaseKind, MonitorConfig};
use sync_health_monitor::error::Result;
use sync_health_monitor::metrics::SyncMetrics;
use sync_health_monitor::supervisor::Supervisor;

// =============================================================================
// CLI Arguments
// =============================================================================

/// Sync Health Monitor - health metrics for bidirectional database sync
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// MySQL host (source side)
    #[arg(long, env = "MYSQL_HOST", default_value = "localhost")]
    mysql_host: String,

    /// MySQL port
    #[arg(long, env = "MYSQL_PORT", default_value = "3306")]
    mysql_port: u16,

    /// MySQL database name
    #[arg(long, env = "MYSQL_DATABASE", default_value = "codeigniter_db")]
    mysql_database: String,

    /// MySQL user
    #[arg(long, env = "MYSQL_USER", default_value = "mysql")]
    mysql_user: String,

    /// MySQL password
    #[arg(long, env = "MYSQL_PASSWORD", default_value = "mysql")]
    mysql_password: String,

    /// PostgreSQL host (target side)
    #[arg(long, env = "POSTGRES_HOST", default_value = "localhost")]
    postgres_host: String,

    /// PostgreSQL port
    #[arg(long, env = "POSTGRES_PORT", default_value = "5432")]
    postgres_port: u16,

    /// PostgreSQL database name
    #[arg(long, env = "POSTGRES_DATABASE", default_value = "nestjs_db")]
    postgres_database: String,

    /// PostgreSQL user
    #[arg(long, env = "POSTGRES_USER", default_value = "postgres")]
    postgres_user: String,

    /// PostgreSQL password
    #[arg(long, env = "POSTGRES_PASSWORD", default_value = "postgres")]
    postgres_password: String,

    /// Kafka bootstrap servers
    #[arg(long, env = "KAFKA_BOOTSTRAP_SERVERS", default_value = "localhost:9092")]
    kafka_bootstrap_servers: String,

    /// Kafka Connect REST endpoint
    #[arg(long, env = "KAFKA_CONNECT_URL", default_value = "http://localhost:8083")]
    kafka_connect_url: String,

    /// Comma-separated list of monitored tables
    #[arg(long, env = "MONITOR_TABLES", default_value = "users")]
    tables: String,

    /// Periodic probe interval in seconds
    #[arg(long, env = "POLL_INTERVAL_SECONDS", default_value = "30")]
    poll_interval_seconds: u64,

    /// Timeout budget per database/control-plane call in seconds
    #[arg(long, env = "QUERY_TIMEOUT_SECONDS", default_value = "10")]
    query_timeout_seconds: u64,

    /// Metrics server bind address
    #[arg(long, env = "METRICS_ADDR", default_value = "0.0.0.0:8084")]
    metrics_addr: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

impl Args {
    fn into_config(self) -> MonitorConfig {
        MonitorConfig {
            mysql: DatabaseConfig {
                kind: DatabaseKind::Mysql,
                host: self.mysql_host,
                port: self.mysql_port,
                database: self.mysql_database,
                username: self.mysql_user,
                password: self.mysql_password,
            },
            postgres: DatabaseConfig {
                kind: DatabaseKind::Postgres,
                host: self.postgres_host,
                port: self.postgres_port,
                database: self.postgres_database,
                username: self.postgres_user,
                password: self.postgres_password,
            },
            kafka_bootstrap_servers: self.kafka_bootstrap_servers,
            kafka_connect_url: self.kafka_connect_url,
            tables: parse_tables(&self.tables),
            poll_interval: Duration::from_secs(self.poll_interval_seconds),
            error_backoff: Duration::from_secs(10),
            query_timeout: Duration::from_secs(self.query_timeout_seconds),
            metrics_addr: self.metrics_addr,
        }
    }
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args);

    info!("Starting Sync Health Monitor");
    info!("  Kafka Connect URL: {}", args.kafka_connect_url);
    info!("  Kafka bootstrap servers: {}", args.kafka_bootstrap_servers);
    info!("  Monitored tables: {}", args.tables);
    info!("  Poll interval: {}s", args.poll_interval_seconds);
    info!("  Metrics address: {}", args.metrics_addr);

    let config = args.into_config();
    let metrics = Arc::new(SyncMetrics::new()?);
    let supervisor = Arc::new(Supervisor::new(config, metrics));

    // An interrupt flips the shutdown token; workers exit cooperatively.
    let shutdown = supervisor.shutdown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, shutting down");
            shutdown.cancel();
        }
    });

    supervisor.run().await?;

    info!("monitor shutdown complete");
    Ok(())
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(level.into())
        .add_directive("hyper=warn".parse().unwrap())
        .add_directive("rdkafka=warn".parse().unwrap())
        .add_directive("sqlx=warn".parse().unwrap());

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}
