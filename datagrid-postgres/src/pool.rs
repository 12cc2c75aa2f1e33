//! Connection pool for PostgreSQL.

use std::sync::Arc;
use std::time::Duration;

use datagrid_query::config::DatabaseConfig;
use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, PoolError, RecyclingMethod, Runtime};
use tokio_postgres::NoTls;
use tracing::{debug, info, warn};

use crate::cache::PreparedStatementCache;
use crate::config::{PgConfig, PoolConfig};
use crate::error::{PgError, PgResult};

/// A connection pool for PostgreSQL.
///
/// Connections are opened lazily, on the first [`PgPool::get`].
#[derive(Clone)]
pub struct PgPool {
    inner: Pool,
    config: Arc<PgConfig>,
    pool_config: Arc<PoolConfig>,
    statements: Arc<PreparedStatementCache>,
}

impl PgPool {
    /// Create a pool with default pool settings.
    pub fn new(config: PgConfig) -> PgResult<Self> {
        Self::with_pool_config(config, PoolConfig::default())
    }

    /// Create a pool from a grid configuration's database section.
    pub fn from_database_config(database: &DatabaseConfig) -> PgResult<Self> {
        Self::with_pool_config(
            PgConfig::from_database_config(database)?,
            PoolConfig::from_database_config(database),
        )
    }

    /// Create a pool with custom pool settings.
    pub fn with_pool_config(config: PgConfig, pool_config: PoolConfig) -> PgResult<Self> {
        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };
        let mgr = Manager::from_config(config.to_pg_config(), NoTls, mgr_config);

        let inner = Pool::builder(mgr)
            .max_size(pool_config.max_connections)
            .wait_timeout(pool_config.wait_timeout)
            .create_timeout(Some(config.connect_timeout))
            .recycle_timeout(pool_config.recycle_timeout)
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| PgError::config(format!("failed to create pool: {}", e)))?;

        info!(
            host = %config.host,
            port = config.port,
            database = %config.database,
            max_connections = pool_config.max_connections,
            "PostgreSQL connection pool created"
        );

        Ok(Self {
            inner,
            statements: Arc::new(PreparedStatementCache::new(pool_config.statement_cache_size)),
            config: Arc::new(config),
            pool_config: Arc::new(pool_config),
        })
    }

    /// Create a builder for configuring the pool.
    pub fn builder() -> PgPoolBuilder {
        PgPoolBuilder::new()
    }

    /// Get a connection from the pool.
    pub async fn get(&self) -> PgResult<Object> {
        debug!("Acquiring connection from pool");
        match self.inner.get().await {
            Ok(conn) => Ok(conn),
            Err(PoolError::Timeout(_)) if self.is_saturated() => {
                warn!(max_size = self.pool_config.max_connections, "Connection pool exhausted");
                Err(PgError::PoolExhausted(self.pool_config.max_connections))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Whether every connection the pool may open is open and checked out.
    fn is_saturated(&self) -> bool {
        let status = self.inner.status();
        status.size >= status.max_size && status.available == 0
    }

    /// The tracked prepared statements.
    pub fn statements(&self) -> &Arc<PreparedStatementCache> {
        &self.statements
    }

    /// The connection configuration.
    pub fn config(&self) -> &PgConfig {
        &self.config
    }

    /// The pool settings.
    pub fn pool_config(&self) -> &PoolConfig {
        &self.pool_config
    }

    /// Get the current pool status.
    pub fn status(&self) -> PoolStatus {
        let status = self.inner.status();
        PoolStatus {
            available: status.available,
            size: status.size,
            max_size: status.max_size,
            waiting: status.waiting,
        }
    }

    /// Check that a connection can be acquired and answers a query.
    pub async fn is_healthy(&self) -> bool {
        match self.inner.get().await {
            Ok(client) => client.query_one("SELECT 1", &[]).await.is_ok(),
            Err(_) => false,
        }
    }

    /// Close the pool and all connections.
    pub fn close(&self) {
        self.inner.close();
        self.statements.clear();
        info!("PostgreSQL connection pool closed");
    }

    /// Whether the pool was closed.
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

impl std::fmt::Debug for PgPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgPool")
            .field("host", &self.config.host)
            .field("database", &self.config.database)
            .field("status", &self.status())
            .finish()
    }
}

/// Pool status information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStatus {
    /// Idle connections.
    pub available: usize,
    /// Open connections.
    pub size: usize,
    /// Maximum size of the pool.
    pub max_size: usize,
    /// Tasks waiting for a connection.
    pub waiting: usize,
}

/// Builder for creating a connection pool.
#[derive(Debug, Default)]
pub struct PgPoolBuilder {
    config: Option<PgConfig>,
    url: Option<String>,
    pool_config: PoolConfig,
}

impl PgPoolBuilder {
    /// Create a new pool builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the database URL.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Set the configuration.
    pub fn config(mut self, config: PgConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the maximum number of connections.
    pub fn max_connections(mut self, n: usize) -> Self {
        self.pool_config.max_connections = n;
        self
    }

    /// Set the time to wait for a free connection.
    pub fn wait_timeout(mut self, timeout: Duration) -> Self {
        self.pool_config.wait_timeout = Some(timeout);
        self
    }

    /// Set the prepared statement cache size.
    pub fn statement_cache_size(mut self, size: usize) -> Self {
        self.pool_config.statement_cache_size = size;
        self
    }

    /// Build the connection pool.
    pub fn build(self) -> PgResult<PgPool> {
        let config = match (self.config, self.url) {
            (Some(config), _) => config,
            (None, Some(url)) => PgConfig::from_url(&url)?,
            (None, None) => return Err(PgError::config("no database URL or config provided")),
        };
        PgPool::with_pool_config(config, self.pool_config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_pool_is_lazy() {
        let pool = PgPool::builder()
            .url("postgres://localhost:1/grids")
            .max_connections(3)
            .statement_cache_size(8)
            .build()
            .unwrap();

        assert_eq!(
            pool.status(),
            PoolStatus {
                available: 0,
                size: 0,
                max_size: 3,
                waiting: 0,
            }
        );
        assert!(!pool.is_saturated());
        assert_eq!(pool.statements().max_size(), 8);
        assert_eq!(pool.config().database, "grids");

        pool.close();
        assert!(pool.is_closed());
    }

    #[test]
    fn test_builder_requires_target() {
        assert!(PgPoolBuilder::new().max_connections(2).build().is_err());
        assert!(PgPoolBuilder::new().url("mysql://localhost/grids").build().is_err());
    }
}
