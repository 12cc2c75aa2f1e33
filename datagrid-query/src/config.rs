//! Configuration file parsing for `datagrid.toml`.
//!
//! ```toml
//! [options]
//! individual_filtering = true
//! global_search_type = "like"
//!
//! [features]
//! paging = true
//!
//! [ajax]
//! method = "POST"
//!
//! [database]
//! url = "${DATABASE_URL}"
//!
//! [logging]
//! level = "info"
//! format = "compact"
//!
//! [environments.production.database]
//! max_connections = 32
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::{QueryError, QueryResult};
use crate::filter::SearchOperator;
use crate::logging::{LogFormat, LogLevel, LoggingConfig};
use crate::options::{Ajax, AjaxMethod, Features, GridOptions, ResponseDefaults};

/// Main configuration structure for `datagrid.toml`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GridConfig {
    /// Search options applied to every grid view.
    #[serde(default)]
    pub options: GridOptions,

    /// Client features.
    #[serde(default)]
    pub features: Features,

    /// Ajax source settings.
    #[serde(default)]
    pub ajax: Ajax,

    /// Initial response flags.
    #[serde(default)]
    pub response: ResponseDefaults,

    /// Backing store connection.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Log level and output format, see [`crate::logging::init_with`].
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Environment-specific overrides.
    #[serde(default)]
    pub environments: HashMap<String, EnvironmentOverride>,
}

impl GridConfig {
    /// Load configuration from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> QueryResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            QueryError::configuration(format!("Cannot read {}", path.display())).with_source(e)
        })?;

        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> QueryResult<Self> {
        let expanded = expand_env_vars(content)?;

        toml::from_str(&expanded).map_err(|e| {
            QueryError::configuration(format!("Invalid datagrid configuration: {}", e.message()))
                .with_source(e)
        })
    }

    /// Get the database URL.
    pub fn database_url(&self) -> Option<&str> {
        self.database.url.as_deref()
    }

    /// Apply environment-specific overrides.
    pub fn with_environment(mut self, env: &str) -> Self {
        if let Some(overrides) = self.environments.remove(env) {
            if let Some(options) = overrides.options {
                if let Some(enabled) = options.individual_filtering {
                    self.options.individual_filtering = enabled;
                }
                if let Some(operator) = options.global_search_type {
                    self.options.global_search_type = operator;
                }
                if let Some(enabled) = options.search_in_non_visible_columns {
                    self.options.search_in_non_visible_columns = enabled;
                }
                if let Some(enabled) = options.search_column_group_filtering {
                    self.options.search_column_group_filtering = enabled;
                }
            }
            if let Some(paging) = overrides.features.and_then(|f| f.paging) {
                self.features.paging = Some(paging);
            }
            if let Some(ajax) = overrides.ajax {
                if let Some(method) = ajax.method {
                    self.ajax.method = method;
                }
                if let Some(pipeline) = ajax.pipeline {
                    self.ajax.pipeline = pipeline;
                }
            }
            if let Some(db) = overrides.database {
                if let Some(url) = db.url {
                    self.database.url = Some(url);
                }
                if let Some(max) = db.max_connections {
                    self.database.max_connections = max;
                }
            }
            if let Some(logging) = overrides.logging {
                if let Some(debug) = logging.debug {
                    self.logging.debug = debug;
                }
                if let Some(level) = logging.level {
                    self.logging.level = Some(level);
                }
                if let Some(format) = logging.format {
                    self.logging.format = format;
                }
            }
        }
        self
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Connection URL (supports `${ENV_VAR}` interpolation).
    pub url: Option<String>,

    /// Maximum pool size.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
        }
    }
}

fn default_max_connections() -> usize {
    10
}

/// Environment-specific overrides.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EnvironmentOverride {
    /// Search option overrides.
    pub options: Option<OptionsOverride>,
    /// Feature overrides.
    pub features: Option<FeaturesOverride>,
    /// Ajax overrides.
    pub ajax: Option<AjaxOverride>,
    /// Database overrides.
    pub database: Option<DatabaseOverride>,
    /// Logging overrides.
    pub logging: Option<LoggingOverride>,
}

/// Search option overrides.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OptionsOverride {
    /// Override individual filtering.
    pub individual_filtering: Option<bool>,
    /// Override the global search operator.
    pub global_search_type: Option<SearchOperator>,
    /// Override hidden column search.
    pub search_in_non_visible_columns: Option<bool>,
    /// Override search column groups.
    pub search_column_group_filtering: Option<bool>,
}

/// Feature overrides.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FeaturesOverride {
    /// Override paging.
    pub paging: Option<bool>,
}

/// Ajax overrides.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AjaxOverride {
    /// Override the method.
    pub method: Option<AjaxMethod>,
    /// Override the pipeline page count.
    pub pipeline: Option<u32>,
}

/// Database overrides.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseOverride {
    /// Override the URL.
    pub url: Option<String>,
    /// Override the pool size.
    pub max_connections: Option<usize>,
}

/// Logging overrides.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingOverride {
    /// Override debug logging.
    pub debug: Option<bool>,
    /// Override the level.
    pub level: Option<LogLevel>,
    /// Override the output format.
    pub format: Option<LogFormat>,
}

/// Expand `${VAR}` references with environment values.
///
/// Unknown variables are left untouched.
fn expand_env_vars(content: &str) -> QueryResult<String> {
    let re = regex_lite::Regex::new(r"\$\{([^}]+)\}")
        .map_err(|e| QueryError::internal(format!("invalid interpolation pattern: {}", e)))?;

    let mut result = content.to_string();
    for cap in re.captures_iter(content) {
        let var_name = &cap[1];
        let full_match = &cap[0];

        if let Ok(value) = std::env::var(var_name) {
            result = result.replace(full_match, &value);
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GridConfig::default();
        assert!(!config.options.individual_filtering);
        assert!(config.response.count_all_results);
        assert_eq!(config.database.max_connections, 10);
    }

    #[test]
    fn test_parse_minimal_config() {
        let toml = r#"
            [options]
            individual_filtering = true
            global_search_type = "eq"

            [features]
            paging = false
        "#;

        let config = GridConfig::from_str(toml).unwrap();
        assert!(config.options.individual_filtering);
        assert_eq!(config.options.global_search_type, SearchOperator::Eq);
        assert_eq!(config.features.paging, Some(false));
    }

    #[test]
    fn test_unknown_section_rejected() {
        let err = GridConfig::from_str("[bogus]\nvalue = 1").unwrap_err();
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_env_var_expansion() {
        // SAFETY: This test runs single-threaded and we clean up after
        unsafe {
            std::env::set_var("DATAGRID_TEST_DB_URL", "postgres://test");
        }
        let expanded = expand_env_vars("url = \"${DATAGRID_TEST_DB_URL}\"").unwrap();
        assert_eq!(expanded, "url = \"postgres://test\"");
        assert_eq!(expand_env_vars("${DATAGRID_UNSET_VAR}").unwrap(), "${DATAGRID_UNSET_VAR}");
        unsafe {
            std::env::remove_var("DATAGRID_TEST_DB_URL");
        }
    }

    #[test]
    fn test_environment_override() {
        let toml = r#"
            [ajax]
            pipeline = 0

            [environments.production.ajax]
            pipeline = 5

            [environments.production.database]
            url = "postgres://prod/app"
        "#;

        let config = GridConfig::from_str(toml).unwrap().with_environment("production");
        assert_eq!(config.ajax.pipeline, 5);
        assert_eq!(config.database_url(), Some("postgres://prod/app"));
    }

    #[test]
    fn test_logging_section() {
        let toml = r#"
            [logging]
            level = "info"
            format = "compact"

            [environments.dev.logging]
            debug = true
            level = "trace"
        "#;

        let config = GridConfig::from_str(toml).unwrap();
        assert_eq!(config.logging.effective_level(), LogLevel::Info);
        assert_eq!(config.logging.format, LogFormat::Compact);
        assert!(!config.logging.debug);

        let dev = config.with_environment("dev");
        assert!(dev.logging.debug);
        assert_eq!(dev.logging.effective_level(), LogLevel::Trace);
        assert_eq!(dev.logging.format, LogFormat::Compact);

        let err = GridConfig::from_str("[logging]\nformat = \"xml\"").unwrap_err();
        assert!(err.is_configuration_error());
    }
}
