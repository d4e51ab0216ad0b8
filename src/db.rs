//! Database connection source and table query ports
//!
//! `ConnectionSource` opens a fresh connection on every call — deliberately
//! no pooling, so a transient outage is retried on the very next cycle
//! instead of being cached. The only externally observable effect of a failed
//! open is the `database_connection_status` gauge dropping to 0; the caller
//! then skips the rest of its cycle.
//!
//! The `SyncEndpoints` / `TableQueries` ports keep the lag and consistency
//! probes independent of sqlx so tests can inject fixture endpoints.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::Connection;
use tracing::debug;

use crate::config::{DatabaseConfig, DatabaseKind};
use crate::error::{Error, Result};
use crate::metrics::SyncMetrics;

// =============================================================================
// Ports
// =============================================================================

/// Query surface every monitored side must expose.
#[async_trait]
pub trait TableQueries: Send {
    /// `SELECT MAX(updated_at)` — `None` when the table is empty.
    async fn latest_mutation(&mut self, table: &str) -> Result<Option<DateTime<Utc>>>;

    /// `SELECT COUNT(*)`.
    async fn row_count(&mut self, table: &str) -> Result<i64>;

    /// Release the underlying connection.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Opens handles to both sides of the sync pair.
#[async_trait]
pub trait SyncEndpoints: Send + Sync {
    async fn open_source(&self) -> Result<Box<dyn TableQueries>>;
    async fn open_target(&self) -> Result<Box<dyn TableQueries>>;
}

/// Target-side name of a mirrored table: the source database's short name
/// prefixes the source table name (`users` → `mysql_users`).
pub fn mirror_table(source: DatabaseKind, table: &str) -> String {
    format!("{}_{}", source.short_name(), table)
}

// =============================================================================
// Connection Source
// =============================================================================

/// On-demand, reconnecting handles to both databases.
pub struct ConnectionSource {
    mysql: DatabaseConfig,
    postgres: DatabaseConfig,
    metrics: Arc<SyncMetrics>,
    query_timeout: Duration,
}

impl ConnectionSource {
    pub fn new(
        mysql: DatabaseConfig,
        postgres: DatabaseConfig,
        metrics: Arc<SyncMetrics>,
        query_timeout: Duration,
    ) -> Self {
        Self {
            mysql,
            postgres,
            metrics,
            query_timeout,
        }
    }

    async fn open_mysql(&self) -> Result<MySqlConnection> {
        let options = MySqlConnectOptions::new()
            .host(&self.mysql.host)
            .port(self.mysql.port)
            .database(&self.mysql.database)
            .username(&self.mysql.username)
            .password(&self.mysql.password);

        with_timeout(self.query_timeout, MySqlConnection::connect_with(&options))
            .await?
            .map_err(Error::Connection)
    }

    async fn open_postgres(&self) -> Result<PgConnection> {
        let options = PgConnectOptions::new()
            .host(&self.postgres.host)
            .port(self.postgres.port)
            .database(&self.postgres.database)
            .username(&self.postgres.username)
            .password(&self.postgres.password);

        with_timeout(self.query_timeout, PgConnection::connect_with(&options))
            .await?
            .map_err(Error::Connection)
    }

    /// Record the connection gauge and unwrap the attempt result.
    fn observe<C>(&self, kind: DatabaseKind, attempt: Result<C>) -> Result<C> {
        match attempt {
            Ok(conn) => {
                self.metrics.set_connection_status(kind.short_name(), true);
                Ok(conn)
            }
            Err(e) => {
                self.metrics.set_connection_status(kind.short_name(), false);
                Err(e)
            }
        }
    }
}

#[async_trait]
impl SyncEndpoints for ConnectionSource {
    async fn open_source(&self) -> Result<Box<dyn TableQueries>> {
        let conn = self.observe(self.mysql.kind, self.open_mysql().await)?;
        debug!("opened mysql connection to {}", self.mysql.host);
        Ok(Box::new(DbHandle {
            conn: SideConnection::MySql(conn),
            query_timeout: self.query_timeout,
        }))
    }

    async fn open_target(&self) -> Result<Box<dyn TableQueries>> {
        let conn = self.observe(self.postgres.kind, self.open_postgres().await)?;
        debug!("opened postgres connection to {}", self.postgres.host);
        Ok(Box::new(DbHandle {
            conn: SideConnection::Postgres(conn),
            query_timeout: self.query_timeout,
        }))
    }
}

// =============================================================================
// Live Handle
// =============================================================================

enum SideConnection {
    MySql(MySqlConnection),
    Postgres(PgConnection),
}

/// A live connection to one side, with a per-call timeout budget.
struct DbHandle {
    conn: SideConnection,
    query_timeout: Duration,
}

impl DbHandle {
    async fn fetch_latest(&mut self, sql: &str) -> Result<Option<NaiveDateTime>> {
        let budget = self.query_timeout;
        let conn = &mut self.conn;
        let fut = async move {
            match conn {
                SideConnection::MySql(conn) => {
                    sqlx::query_scalar(sql).fetch_one(&mut *conn).await
                }
                SideConnection::Postgres(conn) => {
                    sqlx::query_scalar(sql).fetch_one(&mut *conn).await
                }
            }
        };
        with_timeout(budget, fut).await?.map_err(Error::Query)
    }

    async fn fetch_count(&mut self, sql: &str) -> Result<i64> {
        let budget = self.query_timeout;
        let conn = &mut self.conn;
        let fut = async move {
            match conn {
                SideConnection::MySql(conn) => {
                    sqlx::query_scalar(sql).fetch_one(&mut *conn).await
                }
                SideConnection::Postgres(conn) => {
                    sqlx::query_scalar(sql).fetch_one(&mut *conn).await
                }
            }
        };
        with_timeout(budget, fut).await?.map_err(Error::Query)
    }
}

#[async_trait]
impl TableQueries for DbHandle {
    async fn latest_mutation(&mut self, table: &str) -> Result<Option<DateTime<Utc>>> {
        let sql = format!("SELECT MAX(updated_at) FROM {}", table);
        let latest = self.fetch_latest(&sql).await?;
        Ok(latest.map(|ts| ts.and_utc()))
    }

    async fn row_count(&mut self, table: &str) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", table);
        self.fetch_count(&sql).await
    }

    async fn close(self: Box<Self>) -> Result<()> {
        match self.conn {
            SideConnection::MySql(conn) => conn.close().await.map_err(Error::Connection),
            SideConnection::Postgres(conn) => conn.close().await.map_err(Error::Connection),
        }
    }
}

/// Apply the per-call timeout budget to a database future.
async fn with_timeout<F, T>(budget: Duration, fut: F) -> Result<T>
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(budget, fut)
        .await
        .map_err(|_| Error::QueryTimeout(budget))
}
