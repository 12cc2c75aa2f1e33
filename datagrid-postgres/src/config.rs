//! PostgreSQL connection configuration.

use datagrid_query::config::DatabaseConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{PgError, PgResult};

const DEFAULT_PORT: u16 = 5432;
const DEFAULT_USER: &str = "postgres";
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection parameters parsed from a `postgres://` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PgConfig {
    /// Host.
    pub host: String,
    /// Port.
    pub port: u16,
    /// Database name.
    pub database: String,
    /// User.
    pub user: String,
    /// Password.
    pub password: Option<String>,
    /// TLS negotiation.
    pub ssl_mode: SslMode,
    /// Time allowed to establish a connection.
    pub connect_timeout: Duration,
    /// Server-side limit for each statement.
    pub statement_timeout: Option<Duration>,
    /// Name reported in `pg_stat_activity`.
    pub application_name: Option<String>,
}

/// TLS negotiation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SslMode {
    /// Never use TLS.
    Disable,
    /// Use TLS when the server offers it.
    #[default]
    Prefer,
    /// Fail without TLS.
    Require,
}

impl PgConfig {
    /// Parse a connection URL.
    ///
    /// Recognized query parameters are `sslmode`, `connect_timeout`
    /// (seconds), `statement_timeout` (milliseconds) and `application_name`.
    pub fn from_url(url: &str) -> PgResult<Self> {
        let parsed = url::Url::parse(url).map_err(|e| PgError::config(format!("invalid database URL: {}", e)))?;

        if !matches!(parsed.scheme(), "postgres" | "postgresql") {
            return Err(PgError::config(format!(
                "unsupported scheme '{}', expected postgres or postgresql",
                parsed.scheme()
            )));
        }

        let host = parsed
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| PgError::config("database URL has no host"))?
            .to_string();
        let database = parsed.path().trim_start_matches('/').to_string();
        if database.is_empty() {
            return Err(PgError::config("database URL has no database name"));
        }

        let mut config = Self {
            host,
            port: parsed.port().unwrap_or(DEFAULT_PORT),
            database,
            user: match parsed.username() {
                "" => DEFAULT_USER.to_string(),
                user => user.to_string(),
            },
            password: parsed.password().map(String::from),
            ssl_mode: SslMode::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            statement_timeout: None,
            application_name: None,
        };

        for (key, value) in parsed.query_pairs() {
            match key.as_ref() {
                "sslmode" => {
                    config.ssl_mode = match value.as_ref() {
                        "disable" => SslMode::Disable,
                        "prefer" => SslMode::Prefer,
                        "require" => SslMode::Require,
                        other => return Err(PgError::config(format!("invalid sslmode '{}'", other))),
                    }
                }
                "connect_timeout" => {
                    config.connect_timeout = Duration::from_secs(parse_number(&key, &value)?);
                }
                "statement_timeout" => {
                    config.statement_timeout = Some(Duration::from_millis(parse_number(&key, &value)?));
                }
                "application_name" => config.application_name = Some(value.into_owned()),
                other => tracing::warn!(parameter = %other, "Ignoring unknown database URL parameter"),
            }
        }

        Ok(config)
    }

    /// Take the URL from a grid configuration's database section.
    pub fn from_database_config(database: &DatabaseConfig) -> PgResult<Self> {
        let url = database
            .url
            .as_deref()
            .ok_or_else(|| PgError::config("no database url configured"))?;
        Self::from_url(url)
    }

    /// Convert to a driver configuration.
    pub fn to_pg_config(&self) -> tokio_postgres::Config {
        let mut config = tokio_postgres::Config::new();
        config
            .host(&self.host)
            .port(self.port)
            .dbname(&self.database)
            .user(&self.user)
            .connect_timeout(self.connect_timeout)
            .ssl_mode(match self.ssl_mode {
                SslMode::Disable => tokio_postgres::config::SslMode::Disable,
                SslMode::Prefer => tokio_postgres::config::SslMode::Prefer,
                SslMode::Require => tokio_postgres::config::SslMode::Require,
            });

        if let Some(password) = &self.password {
            config.password(password);
        }
        if let Some(name) = &self.application_name {
            config.application_name(name);
        }
        if let Some(timeout) = self.statement_timeout {
            config.options(&format!("-c statement_timeout={}", timeout.as_millis()));
        }
        config
    }
}

fn parse_number(key: &str, value: &str) -> PgResult<u64> {
    value
        .parse()
        .map_err(|_| PgError::config(format!("invalid {} '{}'", key, value)))
}

/// Connection pool settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Maximum number of connections.
    pub max_connections: usize,
    /// Time to wait for a free connection.
    pub wait_timeout: Option<Duration>,
    /// Time allowed to recycle an idle connection.
    pub recycle_timeout: Option<Duration>,
    /// Prepared statements tracked before the cache is trimmed.
    pub statement_cache_size: usize,
    /// Lifetime of cached results without an explicit lifetime.
    pub result_cache_lifetime: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            wait_timeout: Some(Duration::from_secs(30)),
            recycle_timeout: Some(Duration::from_secs(5)),
            statement_cache_size: 100,
            result_cache_lifetime: Duration::from_secs(60),
        }
    }
}

impl PoolConfig {
    /// Take the pool size from a grid configuration's database section.
    pub fn from_database_config(database: &DatabaseConfig) -> Self {
        Self {
            max_connections: database.max_connections,
            ..Self::default()
        }
    }

    /// Set the maximum number of connections.
    pub fn max_connections(mut self, n: usize) -> Self {
        self.max_connections = n;
        self
    }

    /// Set the statement cache size.
    pub fn statement_cache_size(mut self, n: usize) -> Self {
        self.statement_cache_size = n;
        self
    }

    /// Set the default result cache lifetime.
    pub fn result_cache_lifetime(mut self, lifetime: Duration) -> Self {
        self.result_cache_lifetime = lifetime;
        self
    }
}
