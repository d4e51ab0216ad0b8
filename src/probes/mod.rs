//! Health probes
//!
//! - [`connector`] - Kafka Connect connector liveness
//! - [`lag`] - cross-database replication lag
//! - [`consistency`] - row-count divergence
//! - [`throughput`] - per-direction message rates from the broker
//!
//! The connector, lag, and consistency probes are periodic and run
//! sequentially within one supervisor cycle; the throughput probe streams
//! for the process lifetime.

pub mod connector;
pub mod consistency;
pub mod lag;
pub mod throughput;

pub use connector::{ConnectorState, ConnectorStatusProbe};
pub use consistency::ConsistencyProbe;
pub use lag::ReplicationLagProbe;
pub use throughput::{Direction, ThroughputProbe};

#[cfg(test)]
pub(crate) mod testutil {
    //! Fixture endpoints for probe tests.

    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};

    use crate::db::{SyncEndpoints, TableQueries};
    use crate::error::{Error, Result};

    #[derive(Default, Clone)]
    struct SideFixture {
        timestamps: HashMap<String, Option<DateTime<Utc>>>,
        counts: HashMap<String, i64>,
        failing_tables: HashSet<String>,
    }

    /// In-memory stand-in for both sides of the sync pair.
    #[derive(Default)]
    pub struct MockEndpoints {
        source: SideFixture,
        target: SideFixture,
        fail_source_open: bool,
        fail_target_open: bool,
        closed: Arc<AtomicUsize>,
    }

    impl MockEndpoints {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_source_timestamp(mut self, table: &str, ts: DateTime<Utc>) -> Self {
            self.source.timestamps.insert(table.to_string(), Some(ts));
            self
        }

        pub fn with_target_timestamp(mut self, table: &str, ts: DateTime<Utc>) -> Self {
            self.target.timestamps.insert(table.to_string(), Some(ts));
            self
        }

        /// Table exists on the target but has no rows (NULL MAX).
        pub fn with_empty_target_table(mut self, table: &str) -> Self {
            self.target.timestamps.insert(table.to_string(), None);
            self
        }

        pub fn with_source_count(mut self, table: &str, count: i64) -> Self {
            self.source.counts.insert(table.to_string(), count);
            self
        }

        pub fn with_target_count(mut self, table: &str, count: i64) -> Self {
            self.target.counts.insert(table.to_string(), count);
            self
        }

        pub fn with_failing_source_table(mut self, table: &str) -> Self {
            self.source.failing_tables.insert(table.to_string());
            self
        }

        pub fn with_source_open_failure(mut self) -> Self {
            self.fail_source_open = true;
            self
        }

        pub fn with_target_open_failure(mut self) -> Self {
            self.fail_target_open = true;
            self
        }

        /// How many handles have been released so far.
        pub fn closed_handles(&self) -> usize {
            self.closed.load(Ordering::SeqCst)
        }
    }

    struct MockHandle {
        fixture: SideFixture,
        closed: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl TableQueries for MockHandle {
        async fn latest_mutation(&mut self, table: &str) -> Result<Option<DateTime<Utc>>> {
            if self.fixture.failing_tables.contains(table) {
                return Err(Error::Internal(format!("query failed for {}", table)));
            }
            Ok(self.fixture.timestamps.get(table).cloned().flatten())
        }

        async fn row_count(&mut self, table: &str) -> Result<i64> {
            if self.fixture.failing_tables.contains(table) {
                return Err(Error::Internal(format!("query failed for {}", table)));
            }
            self.fixture
                .counts
                .get(table)
                .copied()
                .ok_or_else(|| Error::Internal(format!("no such table: {}", table)))
        }

        async fn close(self: Box<Self>) -> Result<()> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[async_trait]
    impl SyncEndpoints for MockEndpoints {
        async fn open_source(&self) -> Result<Box<dyn TableQueries>> {
            if self.fail_source_open {
                return Err(Error::Internal("source unavailable".to_string()));
            }
            Ok(Box::new(MockHandle {
                fixture: self.source.clone(),
                closed: self.closed.clone(),
            }))
        }

        async fn open_target(&self) -> Result<Box<dyn TableQueries>> {
            if self.fail_target_open {
                return Err(Error::Internal("target unavailable".to_string()));
            }
            Ok(Box::new(MockHandle {
                fixture: self.target.clone(),
                closed: self.closed.clone(),
            }))
        }
    }
}
