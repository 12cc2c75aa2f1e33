//! Prepared statement tracking and result caching.

use datagrid_query::{FilterValue, ResultCacheOptions, Row};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};
use tracing::debug;

/// Tracks which query texts have been prepared through the pool.
///
/// The statements themselves live in each connection's own cache; this
/// only bounds how many distinct texts are kept prepared.
#[derive(Debug)]
pub struct PreparedStatementCache {
    max_size: usize,
    prepared: RwLock<HashSet<String>>,
}

impl PreparedStatementCache {
    /// Create a cache holding at most `max_size` query texts.
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            prepared: RwLock::new(HashSet::new()),
        }
    }

    /// Record a query text. Returns `true` when it was already known.
    pub fn track(&self, sql: &str) -> bool {
        if self.prepared.read().contains(sql) {
            debug!(sql = %sql, "Using cached prepared statement");
            return true;
        }

        debug!(sql = %sql, "Preparing new statement");
        let mut prepared = self.prepared.write();
        if prepared.len() >= self.max_size {
            let evict: Vec<String> = prepared.iter().take(prepared.len() / 2 + 1).cloned().collect();
            for key in evict {
                prepared.remove(&key);
            }
        }
        prepared.insert(sql.to_string());
        false
    }

    /// Forget every tracked text.
    pub fn clear(&self) {
        self.prepared.write().clear();
        debug!("Statement cache cleared");
    }

    /// Number of tracked texts.
    pub fn len(&self) -> usize {
        self.prepared.read().len()
    }

    /// Whether nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The maximum number of tracked texts.
    pub fn max_size(&self) -> usize {
        self.max_size
    }
}

/// A cached query outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum CachedValue {
    /// Rows of a select.
    Rows(Vec<Row>),
    /// Result of a count.
    Count(u64),
}

/// Which kind of query a cache entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheKind {
    /// A row query.
    Rows,
    /// A count query.
    Count,
}

impl CacheKind {
    fn prefix(self) -> &'static str {
        match self {
            Self::Rows => "rows",
            Self::Count => "count",
        }
    }
}

/// Results kept in memory for a limited time.
#[derive(Debug)]
pub struct ResultCache {
    default_lifetime: Duration,
    entries: Mutex<HashMap<String, (Instant, CachedValue)>>,
}

impl ResultCache {
    /// Create a cache whose entries live `default_lifetime` unless told otherwise.
    pub fn new(default_lifetime: Duration) -> Self {
        Self {
            default_lifetime,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// The key of a query: its explicit id, or the text and parameters.
    pub fn key(kind: CacheKind, sql: &str, params: &[FilterValue], options: &ResultCacheOptions) -> String {
        match &options.id {
            Some(id) => format!("{}:{}", kind.prefix(), id),
            None => {
                let params: Vec<_> = params.iter().map(FilterValue::to_json).collect();
                format!("{}:{}:{}", kind.prefix(), sql, serde_json::Value::Array(params))
            }
        }
    }

    /// A live entry.
    pub fn get(&self, key: &str) -> Option<CachedValue> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some((expires, value)) if *expires > Instant::now() => Some(value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Store an entry for `lifetime`, or the default lifetime.
    pub fn insert(&self, key: String, value: CachedValue, lifetime: Option<Duration>) {
        let expires = Instant::now() + lifetime.unwrap_or(self.default_lifetime);
        self.entries.lock().insert(key, (expires, value));
    }

    /// Drop expired entries.
    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.entries.lock().retain(|_, (expires, _)| *expires > now);
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
