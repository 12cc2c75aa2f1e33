//! Grid views.
//!
//! A [`GridView`] binds a named grid to its root entity, its column model and
//! its options. Views are built once and shared read-only between requests;
//! the column model sits behind an [`Arc`] for that reason.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::builder::ColumnModel;
use crate::config::GridConfig;
use crate::error::{QueryError, QueryResult};
use crate::options::{Ajax, Features, GridOptions};
use crate::traits::Row;

/// A row-level transform applied before cell rendering.
#[derive(Clone)]
pub struct LineFormatter(Arc<dyn Fn(Row) -> Row + Send + Sync>);

impl LineFormatter {
    /// Wrap a closure.
    pub fn new(f: impl Fn(Row) -> Row + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Transform a row.
    pub fn call(&self, row: Row) -> Row {
        (self.0)(row)
    }
}

impl fmt::Debug for LineFormatter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LineFormatter(..)")
    }
}

/// Hands out unique grid names for the lifetime of the application.
///
/// The first view named `posts` keeps its name, the second one becomes
/// `posts-2`, and so on.
#[derive(Debug, Default)]
pub struct GridRegistry {
    counts: Mutex<HashMap<String, usize>>,
}

impl GridRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one more instance of `name` and return its unique name.
    pub fn register(&self, name: &str) -> String {
        let mut counts = self.counts.lock();
        let count = counts.entry(name.to_string()).or_insert(0);
        *count += 1;
        if *count > 1 {
            format!("{}-{}", name, count)
        } else {
            name.to_string()
        }
    }

    /// Number of instances registered under `name`.
    pub fn count(&self, name: &str) -> usize {
        self.counts.lock().get(name).copied().unwrap_or(0)
    }
}

/// A configured grid.
#[derive(Debug, Clone)]
pub struct GridView {
    name: String,
    unique_name: String,
    entity: String,
    columns: Arc<ColumnModel>,
    options: GridOptions,
    features: Features,
    ajax: Ajax,
    line_formatter: Option<LineFormatter>,
}

impl GridView {
    /// Create a view, validating its name and registering it.
    pub fn new(
        registry: &GridRegistry,
        name: impl Into<String>,
        entity: impl Into<String>,
        columns: ColumnModel,
    ) -> QueryResult<Self> {
        let name = name.into();
        if !is_valid_name(&name) {
            return Err(QueryError::invalid_grid_name(name));
        }
        let unique_name = registry.register(&name);
        let entity = entity.into();

        debug!(grid = %unique_name, entity = %entity, columns = columns.len(), "Grid view created");
        Ok(Self {
            name,
            unique_name,
            entity,
            columns: Arc::new(columns),
            options: GridOptions::default(),
            features: Features::default(),
            ajax: Ajax::default(),
            line_formatter: None,
        })
    }

    /// Set the options.
    pub fn with_options(mut self, options: GridOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the features.
    pub fn with_features(mut self, features: Features) -> Self {
        self.features = features;
        self
    }

    /// Set the ajax settings.
    pub fn with_ajax(mut self, ajax: Ajax) -> Self {
        self.ajax = ajax;
        self
    }

    /// Take options, features and ajax settings from a loaded configuration.
    pub fn with_config(self, config: &GridConfig) -> Self {
        self.with_options(config.options.clone())
            .with_features(config.features.clone())
            .with_ajax(config.ajax.clone())
    }

    /// Set the row-level transform.
    pub fn with_line_formatter(mut self, f: impl Fn(Row) -> Row + Send + Sync + 'static) -> Self {
        self.line_formatter = Some(LineFormatter::new(f));
        self
    }

    /// The declared name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The name made unique by the registry.
    pub fn unique_name(&self) -> &str {
        &self.unique_name
    }

    /// The root entity.
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// The column model.
    pub fn columns(&self) -> &Arc<ColumnModel> {
        &self.columns
    }

    /// The options.
    pub fn options(&self) -> &GridOptions {
        &self.options
    }

    /// The features.
    pub fn features(&self) -> &Features {
        &self.features
    }

    /// The ajax settings.
    pub fn ajax(&self) -> &Ajax {
        &self.ajax
    }

    /// The row-level transform, if any.
    pub fn line_formatter(&self) -> Option<&LineFormatter> {
        self.line_formatter.as_ref()
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'))
}
