//! Filter strategies.
//!
//! Each column carries a [`FilterStrategy`] that turns a search value into a
//! predicate fragment. Strategies bind their values into a shared
//! [`Parameters`] set under numeric keys:
//!
//! - the global search pass keys parameters by column index
//!   ([`FilterStrategy::or_expression`]);
//! - the individual filtering pass threads a counter seeded with
//!   [`INIT_PARAMETER_COUNTER`] through every strategy
//!   ([`FilterStrategy::and_expression`]), each strategy advancing it by the
//!   number of keys it consumes.
//!
//! ```rust
//! use datagrid_query::filter::{FieldRef, Parameters, SearchOperator};
//! use datagrid_query::strategy::{FilterStrategy, INIT_PARAMETER_COUNTER, TextFilter};
//! use datagrid_query::types::FieldType;
//!
//! let filter = FilterStrategy::from(TextFilter::new().search_type(SearchOperator::Eq));
//! let mut params = Parameters::new();
//! let mut counter = INIT_PARAMETER_COUNTER;
//!
//! let expr = filter
//!     .and_expression(&FieldRef::path("post", "id"), "42", Some(&FieldType::Integer), &mut params, &mut counter)
//!     .unwrap()
//!     .unwrap();
//! assert_eq!(expr.to_string(), "post.id = ?101");
//! ```

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{QueryError, QueryResult};
use crate::filter::{Expr, FieldRef, FilterValue, Parameters, SearchOperator};
use crate::types::FieldType;

/// First parameter key used by the individual filtering pass.
pub const INIT_PARAMETER_COUNTER: usize = 100;

/// Free-text input filter.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TextFilter {
    /// Operator applied to the search value.
    pub search_type: SearchOperator,
    /// Input placeholder text.
    pub placeholder: Option<String>,
    /// Initial search value.
    pub initial_search: Option<String>,
}

impl TextFilter {
    /// Create a `like` text filter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the operator.
    pub fn search_type(mut self, search_type: SearchOperator) -> Self {
        self.search_type = search_type;
        self
    }

    /// Set the placeholder text.
    pub fn placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }
}

/// Input type of a number filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NumberInputType {
    /// A number input.
    #[default]
    Number,
    /// A slider.
    Range,
}

/// Numeric input filter. Searches like a [`TextFilter`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NumberFilter {
    /// Operator applied to the search value.
    pub search_type: SearchOperator,
    /// Minimum value.
    pub min: String,
    /// Maximum value.
    pub max: String,
    /// Step size.
    pub step: String,
    /// Display the current value next to a slider.
    pub show_label: bool,
    /// Pre-defined values.
    pub datalist: Option<Vec<String>>,
    /// Input type.
    #[serde(rename = "type")]
    pub input_type: NumberInputType,
}

impl Default for NumberFilter {
    fn default() -> Self {
        Self {
            search_type: SearchOperator::Like,
            min: "0".to_string(),
            max: "100".to_string(),
            step: "1".to_string(),
            show_label: false,
            datalist: None,
            input_type: NumberInputType::Number,
        }
    }
}

impl NumberFilter {
    /// Create a number filter with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the operator.
    pub fn search_type(mut self, search_type: SearchOperator) -> Self {
        self.search_type = search_type;
        self
    }

    /// Set the bounds.
    pub fn bounds(mut self, min: impl Into<String>, max: impl Into<String>) -> Self {
        self.min = min.into();
        self.max = max.into();
        self
    }

    /// Set the step size.
    pub fn step(mut self, step: impl Into<String>) -> Self {
        self.step = step.into();
        self
    }

    /// Use a slider.
    pub fn range(mut self) -> Self {
        self.input_type = NumberInputType::Range;
        self
    }
}

/// Select list filter.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectFilter {
    /// Default operator.
    pub search_type: SearchOperator,
    /// Option value to label.
    pub select_options: IndexMap<String, String>,
    /// Option value to operator, one entry per option when set.
    pub select_search_types: IndexMap<String, SearchOperator>,
    /// Allow several options to be selected.
    pub multiple: bool,
}

impl SelectFilter {
    /// Create an empty select filter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default operator.
    pub fn search_type(mut self, search_type: SearchOperator) -> Self {
        self.search_type = search_type;
        self
    }

    /// Add an option.
    pub fn option(mut self, value: impl Into<String>, label: impl Into<String>) -> Self {
        self.select_options.insert(value.into(), label.into());
        self
    }

    /// Set the operator used for one option value.
    pub fn option_search_type(mut self, value: impl Into<String>, search_type: SearchOperator) -> Self {
        self.select_search_types.insert(value.into(), search_type);
        self
    }

    /// Allow multiple selections.
    pub fn multiple(mut self, multiple: bool) -> Self {
        self.multiple = multiple;
        self
    }

    /// Check that the per-option operator map covers the options.
    pub fn validate(&self) -> QueryResult<()> {
        let types = self.select_search_types.len();
        if types > 0 && types != self.select_options.len() {
            return Err(QueryError::invalid_filter_options(
                "The search types array is not valid",
            )
            .with_suggestion("Declare exactly one search type per select option"));
        }
        Ok(())
    }

    /// Operator for a submitted value.
    fn search_type_for(&self, value: &str) -> QueryResult<SearchOperator> {
        if self.select_search_types.is_empty() {
            return Ok(self.search_type);
        }
        self.validate()?;
        Ok(self
            .select_search_types
            .get(value)
            .copied()
            .unwrap_or(self.search_type))
    }

    fn and_expression(
        &self,
        field: &FieldRef,
        value: &str,
        type_of_field: Option<&FieldType>,
        params: &mut Parameters,
        counter: &mut usize,
    ) -> QueryResult<Option<Expr>> {
        let values: Vec<&str> = value.split(',').collect();
        if self.multiple && values.len() > 1 {
            let mut members = Vec::with_capacity(values.len());
            for elem in values {
                let operator = self.search_type_for(elem)?;
                if let Some(expr) = expression(operator, field, elem, type_of_field, params, counter) {
                    members.push(expr);
                }
            }
            let group = Expr::or(members);
            return Ok((!group.is_none()).then_some(group));
        }

        let operator = self.search_type_for(value)?;
        Ok(expression(operator, field, value, type_of_field, params, counter))
    }
}

/// Select2 widget filter. Searches like a [`SelectFilter`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Select2Filter {
    /// Select semantics.
    #[serde(flatten)]
    pub select: SelectFilter,
    /// Placeholder text.
    pub placeholder: Option<String>,
    /// Show a reset icon, requires a placeholder.
    pub allow_clear: Option<bool>,
    /// Allow free tagging.
    pub tags: Option<bool>,
    /// Language code.
    pub language: Option<String>,
    /// Remote data url.
    pub url: Option<String>,
    /// Request delay in milliseconds.
    pub delay: u32,
    /// Cache remote responses.
    pub cache: bool,
}

impl Default for Select2Filter {
    fn default() -> Self {
        Self {
            select: SelectFilter::default(),
            placeholder: None,
            allow_clear: None,
            tags: None,
            language: None,
            url: None,
            delay: 250,
            cache: true,
        }
    }
}

impl Select2Filter {
    /// Wrap select semantics.
    pub fn new(select: SelectFilter) -> Self {
        Self {
            select,
            ..Self::default()
        }
    }

    /// Set the placeholder.
    pub fn placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    /// Show a reset icon.
    pub fn allow_clear(mut self, allow_clear: bool) -> Self {
        self.allow_clear = Some(allow_clear);
        self
    }

    /// Load options from a url.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Check option consistency.
    pub fn validate(&self) -> QueryResult<()> {
        if self.allow_clear == Some(true) && self.placeholder.is_none() {
            return Err(QueryError::invalid_filter_options(
                "The allow_clear option will only work if a placeholder is set",
            ));
        }
        self.select.validate()
    }
}

/// Date range filter accepting `"start - end"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DateRangeFilter;

impl DateRangeFilter {
    fn and_expression(
        &self,
        field: &FieldRef,
        value: &str,
        params: &mut Parameters,
        counter: &mut usize,
    ) -> Option<Expr> {
        let (start, end) = value.split_once(" - ")?;
        let (Some(start), Some(end)) = (parse_date_time(start), parse_date_time(end)) else {
            debug!(value = %value, "Ignoring unparseable date range");
            return None;
        };
        let end = end.date().and_time(NaiveTime::from_hms_opt(23, 59, 59)?);

        let low = *counter + 1;
        let high = low + 1;
        *counter = high;
        params.set(low, start.format("%Y-%m-%d %H:%M:%S").to_string());
        params.set(high, end.format("%Y-%m-%d %H:%M:%S").to_string());

        Some(Expr::Between {
            field: field.clone(),
            low,
            high,
        })
    }
}

/// A pluggable predicate generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FilterStrategy {
    /// Free text.
    Text(TextFilter),
    /// Numeric input.
    Number(NumberFilter),
    /// Select list.
    Select(SelectFilter),
    /// Select2 widget.
    Select2(Select2Filter),
    /// Date range.
    DateRange(DateRangeFilter),
}

impl Default for FilterStrategy {
    fn default() -> Self {
        Self::Text(TextFilter::default())
    }
}

impl From<TextFilter> for FilterStrategy {
    fn from(f: TextFilter) -> Self {
        Self::Text(f)
    }
}

impl From<NumberFilter> for FilterStrategy {
    fn from(f: NumberFilter) -> Self {
        Self::Number(f)
    }
}

impl From<SelectFilter> for FilterStrategy {
    fn from(f: SelectFilter) -> Self {
        Self::Select(f)
    }
}

impl From<Select2Filter> for FilterStrategy {
    fn from(f: Select2Filter) -> Self {
        Self::Select2(f)
    }
}

impl From<DateRangeFilter> for FilterStrategy {
    fn from(f: DateRangeFilter) -> Self {
        Self::DateRange(f)
    }
}

impl FilterStrategy {
    /// The default operator of this strategy.
    pub fn search_type(&self) -> SearchOperator {
        match self {
            Self::Text(f) => f.search_type,
            Self::Number(f) => f.search_type,
            Self::Select(f) => f.search_type,
            Self::Select2(f) => f.select.search_type,
            Self::DateRange(_) => SearchOperator::Like,
        }
    }

    /// Select semantics, if this is a select-like strategy.
    pub fn as_select(&self) -> Option<&SelectFilter> {
        match self {
            Self::Select(f) => Some(f),
            Self::Select2(f) => Some(&f.select),
            _ => None,
        }
    }

    /// Check the strategy's options.
    pub fn validate(&self) -> QueryResult<()> {
        match self {
            Self::Select(f) => f.validate(),
            Self::Select2(f) => f.validate(),
            _ => Ok(()),
        }
    }

    /// Build an individual filtering fragment.
    ///
    /// Returns `Ok(None)` when the value cannot be used for this field.
    pub fn and_expression(
        &self,
        field: &FieldRef,
        value: &str,
        type_of_field: Option<&FieldType>,
        params: &mut Parameters,
        counter: &mut usize,
    ) -> QueryResult<Option<Expr>> {
        match self {
            Self::Text(f) => Ok(expression(f.search_type, field, value, type_of_field, params, counter)),
            Self::Number(f) => Ok(expression(f.search_type, field, value, type_of_field, params, counter)),
            Self::Select(f) => f.and_expression(field, value, type_of_field, params, counter),
            Self::Select2(f) => f.select.and_expression(field, value, type_of_field, params, counter),
            Self::DateRange(f) => Ok(f.and_expression(field, value, params, counter)),
        }
    }

    /// Build a global search fragment with parameters keyed by column index.
    pub fn or_expression(
        &self,
        operator: SearchOperator,
        field: &FieldRef,
        value: &str,
        type_of_field: Option<&FieldType>,
        params: &mut Parameters,
        key: usize,
    ) -> Option<Expr> {
        let mut counter = key;
        expression(operator, field, value, type_of_field, params, &mut counter)
    }
}

/// Coerce a search value to the field type, `None` when it does not fit.
fn coerce(value: &str, type_of_field: Option<&FieldType>) -> Option<FilterValue> {
    match type_of_field {
        Some(ty) if ty.is_float() => value.trim().parse::<f64>().ok().map(FilterValue::Float),
        Some(ty) if ty.is_integer() => {
            let parsed = value.parse::<i64>().ok()?;
            (parsed.to_string() == value).then_some(FilterValue::Int(parsed))
        }
        _ => Some(FilterValue::String(value.to_string())),
    }
}

/// Build one comparison. Advances the counter before binding.
fn expression(
    operator: SearchOperator,
    field: &FieldRef,
    value: &str,
    type_of_field: Option<&FieldType>,
    params: &mut Parameters,
    counter: &mut usize,
) -> Option<Expr> {
    *counter += 1;
    let key = *counter;
    let is_string = type_of_field.is_none_or(FieldType::is_string);

    let (operator, bound) = match operator {
        SearchOperator::IsNull | SearchOperator::IsNotNull => (operator, None),
        SearchOperator::In | SearchOperator::NotIn => {
            let values: Vec<FilterValue> = value
                .split(',')
                .filter_map(|v| coerce(v.trim(), type_of_field))
                .collect();
            if values.is_empty() {
                return None;
            }
            (operator, Some(FilterValue::List(values)))
        }
        SearchOperator::Like | SearchOperator::NotLike if is_string => {
            (operator, Some(FilterValue::String(format!("%{}%", value))))
        }
        SearchOperator::Like => (SearchOperator::Eq, Some(coerce(value, type_of_field)?)),
        SearchOperator::NotLike => (SearchOperator::Neq, Some(coerce(value, type_of_field)?)),
        _ => (operator, Some(coerce(value, type_of_field)?)),
    };

    let param = bound.map(|value| {
        params.set(key, value);
        key
    });

    Some(Expr::Condition {
        field: field.clone(),
        operator,
        param,
    })
}

fn parse_date_time(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    const DATE_TIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];
    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%d.%m.%Y"];

    DATE_TIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(value, f).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|f| NaiveDate::parse_from_str(value, f).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}
