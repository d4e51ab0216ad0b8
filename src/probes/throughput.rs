//! Throughput probe
//!
//! Blocks on a continuous Kafka subscription over the sync-event topics and
//! maintains a rolling per-direction message rate. The window is flushed when
//! 60 seconds have elapsed, checked per received message — an idle topic
//! therefore delays the flush. The subscription runs inside a supervised
//! restart loop with exponential backoff so a broker outage never silently
//! kills throughput metrics for the rest of the process lifetime.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::Message;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::Result;
use crate::metrics::SyncMetrics;

/// Wall-clock window over which rates are computed.
pub const THROUGHPUT_WINDOW: Duration = Duration::from_secs(60);

const CONSUMER_GROUP: &str = "sync-monitor";
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// A subscription that stayed up at least this long counts as healthy and
/// resets the restart backoff.
const BACKOFF_RESET_UPTIME: Duration = Duration::from_secs(60);

/// Delay before the next restart and the backoff to carry forward.
///
/// A failure after a healthy stretch starts the ladder over at
/// `INITIAL_BACKOFF` instead of whatever ceiling earlier outages reached.
fn next_backoff(current: Duration, uptime: Duration) -> (Duration, Duration) {
    let delay = if uptime >= BACKOFF_RESET_UPTIME {
        INITIAL_BACKOFF
    } else {
        current
    };
    (delay, (delay * 2).min(MAX_BACKOFF))
}

// =============================================================================
// Direction
// =============================================================================

/// Sync direction, classified from the topic name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    MysqlToPostgres,
    PostgresToMysql,
}

impl Direction {
    pub const ALL: [Direction; 2] = [Direction::MysqlToPostgres, Direction::PostgresToMysql];

    pub fn from_topic(topic: &str) -> Option<Self> {
        if topic.contains("mysql-to-postgres") {
            Some(Direction::MysqlToPostgres)
        } else if topic.contains("postgres-to-mysql") {
            Some(Direction::PostgresToMysql)
        } else {
            None
        }
    }

    pub fn as_label(&self) -> &'static str {
        match self {
            Direction::MysqlToPostgres => "mysql_to_postgres",
            Direction::PostgresToMysql => "postgres_to_mysql",
        }
    }

    fn index(&self) -> usize {
        match self {
            Direction::MysqlToPostgres => 0,
            Direction::PostgresToMysql => 1,
        }
    }
}

// =============================================================================
// Window Accumulator
// =============================================================================

/// Per-direction message counts since the window started.
struct ThroughputWindow {
    started: Instant,
    counts: [u64; 2],
}

impl ThroughputWindow {
    fn new() -> Self {
        Self {
            started: Instant::now(),
            counts: [0; 2],
        }
    }

    fn record(&mut self, direction: Direction) {
        self.counts[direction.index()] += 1;
    }

    fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Rates for both directions over the given window length.
    fn rates(&self, window: Duration) -> [(Direction, f64); 2] {
        Direction::ALL
            .map(|d| (d, self.counts[d.index()] as f64 / window.as_secs_f64()))
    }

    fn reset(&mut self) {
        self.counts = [0; 2];
        self.started = Instant::now();
    }
}

// =============================================================================
// Probe
// =============================================================================

/// Streams sync-event messages and publishes per-direction rates.
pub struct ThroughputProbe {
    bootstrap_servers: String,
    metrics: Arc<SyncMetrics>,
    window: Duration,
}

impl ThroughputProbe {
    pub fn new(bootstrap_servers: String, metrics: Arc<SyncMetrics>) -> Self {
        Self {
            bootstrap_servers,
            metrics,
            window: THROUGHPUT_WINDOW,
        }
    }

    /// Run for the process lifetime, restarting the subscription with
    /// exponential backoff after a consume failure.
    pub async fn run(&self, shutdown: CancellationToken) {
        let mut backoff = INITIAL_BACKOFF;

        loop {
            let started = Instant::now();
            match self.consume(&shutdown).await {
                Ok(()) => break,
                Err(e) => {
                    error!("kafka throughput monitoring failed: {}", e);
                    if shutdown.is_cancelled() {
                        break;
                    }
                    let (delay, next) = next_backoff(backoff, started.elapsed());
                    backoff = next;
                    warn!("restarting throughput consumer in {:?}", delay);
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        info!("throughput probe stopped");
    }

    /// One subscription lifetime; returns Ok only on cooperative shutdown.
    async fn consume(&self, shutdown: &CancellationToken) -> Result<()> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("group.id", CONSUMER_GROUP)
            .set("bootstrap.servers", &self.bootstrap_servers)
            .set("auto.offset.reset", "latest")
            .set("enable.auto.commit", "true")
            .create()?;

        consumer.subscribe(&[r"^mysql-to-postgres\..*", r"^postgres-to-mysql\..*"])?;
        info!(
            "subscribed to sync topics on {} as group {}",
            self.bootstrap_servers, CONSUMER_GROUP
        );

        let mut window = ThroughputWindow::new();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return Ok(()),
                received = consumer.recv() => {
                    let message = received?;
                    if let Some(direction) = Direction::from_topic(message.topic()) {
                        window.record(direction);
                    }
                    if window.elapsed() >= self.window {
                        self.flush(&mut window);
                    }
                }
            }
        }
    }

    /// Publish both direction rates and reset the accumulator.
    fn flush(&self, window: &mut ThroughputWindow) {
        for (direction, rate) in window.rates(self.window) {
            self.metrics
                .throughput
                .with_label_values(&[direction.as_label()])
                .set(rate);
            info!("throughput {}: {:.2} records/sec", direction.as_label(), rate);
        }
        window.reset();
    }
}
