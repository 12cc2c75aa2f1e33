//! Logging setup for the grid pipeline.
//!
//! The `[logging]` section of `datagrid.toml` picks the level and output
//! format. The environment overrides it:
//!
//! - `DATAGRID_DEBUG=true|1|yes` - Enable debug logging
//! - `DATAGRID_LOG_LEVEL=trace|debug|info|warn|error` - Set a specific level
//! - `DATAGRID_LOG_FORMAT=json|pretty|compact` - Output format
//!
//! ```rust,no_run
//! use datagrid_query::GridConfig;
//! use datagrid_query::logging;
//!
//! let config = GridConfig::from_file("datagrid.toml").unwrap();
//! logging::init_with(&config.logging);
//! ```
//!
//! Inside the crates, components log through the `tracing` macros with
//! structured fields. Per-row detail goes through [`datagrid_trace!`], which
//! stays silent unless debug logging was switched on.

use serde::{Deserialize, Serialize};
use std::env;
use std::sync::Once;
use std::sync::atomic::{AtomicBool, Ordering};

static INIT: Once = Once::new();
static DEBUG: AtomicBool = AtomicBool::new(false);

/// Verbosity threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Everything, including per-row detail.
    Trace,
    /// Statements and resolution steps.
    Debug,
    /// One line per response.
    Info,
    /// Problems only.
    #[default]
    Warn,
    /// Failures only.
    Error,
}

impl LogLevel {
    /// The filter directive name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "trace" => Some(Self::Trace),
            "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warn" => Some(Self::Warn),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

/// Subscriber output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per event.
    #[default]
    Json,
    /// Multi-line, human readable.
    Pretty,
    /// Single-line, human readable.
    Compact,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "pretty" => Self::Pretty,
            "compact" => Self::Compact,
            _ => Self::Json,
        }
    }
}

/// The `[logging]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Debug logging, including the `datagrid_debug!` and `datagrid_trace!` output.
    pub debug: bool,
    /// Explicit level. Defaults to debug when `debug` is set, warn otherwise.
    pub level: Option<LogLevel>,
    /// Output format.
    pub format: LogFormat,
}

impl LoggingConfig {
    /// Apply `DATAGRID_*` overrides read through `lookup`.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(debug) = lookup("DATAGRID_DEBUG") {
            self.debug = matches!(debug.to_lowercase().as_str(), "true" | "1" | "yes");
        }
        if let Some(level) = lookup("DATAGRID_LOG_LEVEL").as_deref().and_then(LogLevel::parse) {
            self.level = Some(level);
        }
        if let Some(format) = lookup("DATAGRID_LOG_FORMAT") {
            self.format = LogFormat::parse(&format);
        }
        self
    }

    /// Apply overrides from the process environment.
    pub fn with_env(self) -> Self {
        self.with_overrides(|key| env::var(key).ok())
    }

    /// Whether a subscriber should be installed at all.
    pub fn is_enabled(&self) -> bool {
        self.debug || self.level.is_some()
    }

    /// The level in effect.
    pub fn effective_level(&self) -> LogLevel {
        self.level
            .unwrap_or(if self.debug { LogLevel::Debug } else { LogLevel::Warn })
    }

    /// The `EnvFilter` directive covering every datagrid crate.
    pub fn filter_directive(&self) -> String {
        let level = self.effective_level().as_str();
        ["datagrid", "datagrid_query", "datagrid_search", "datagrid_postgres"]
            .iter()
            .map(|target| format!("{}={}", target, level))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Whether debug logging was switched on by [`init_with`].
#[doc(hidden)]
#[inline]
pub fn debug_enabled() -> bool {
    DEBUG.load(Ordering::Relaxed)
}

/// Initialize logging from the environment alone.
pub fn init() {
    init_with(&LoggingConfig::default());
}

/// Initialize logging from a configuration section. Subsequent calls are no-ops.
///
/// Nothing is installed unless debug or a level is set, so applications with
/// their own subscriber are left alone.
pub fn init_with(config: &LoggingConfig) {
    INIT.call_once(|| {
        let config = config.clone().with_env();
        DEBUG.store(config.debug, Ordering::Relaxed);
        if !config.is_enabled() {
            return;
        }

        #[cfg(feature = "tracing-subscriber")]
        {
            use tracing_subscriber::{EnvFilter, fmt, prelude::*};

            let filter = EnvFilter::try_new(config.filter_directive())
                .unwrap_or_else(|_| EnvFilter::new("warn"));
            let registry = tracing_subscriber::registry().with(filter);
            match config.format {
                LogFormat::Json => registry.with(fmt::layer().json()).init(),
                LogFormat::Compact => registry.with(fmt::layer().compact()).init(),
                LogFormat::Pretty => registry.with(fmt::layer().pretty()).init(),
            }

            tracing::info!(
                level = config.effective_level().as_str(),
                format = ?config.format,
                "Datagrid logging initialized"
            );
        }
    });
}

/// Log at debug level only when debug logging is enabled.
#[macro_export]
macro_rules! datagrid_debug {
    ($($arg:tt)*) => {
        if $crate::logging::debug_enabled() {
            tracing::debug!($($arg)*);
        }
    };
}

/// Log at trace level only when debug logging is enabled.
#[macro_export]
macro_rules! datagrid_trace {
    ($($arg:tt)*) => {
        if $crate::logging::debug_enabled() {
            tracing::trace!($($arg)*);
        }
    };
}
