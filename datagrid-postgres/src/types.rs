//! Type conversions for PostgreSQL.
//!
//! Parameters are converted to the type the server inferred for each
//! placeholder when the statement was prepared, so a search value of
//! `"12"` binds as an integer against an integer column. Rows come back
//! as JSON objects keyed by column label.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use datagrid_query::{FilterValue, Row};
use postgres_types::{ToSql, Type};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::error::{PgError, PgResult};

/// A boxed statement parameter.
pub type SqlParam = Box<dyn ToSql + Sync + Send>;

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const TIME_FORMAT: &str = "%H:%M:%S";

/// Convert a filter value to a parameter of the given PostgreSQL type.
pub fn filter_value_to_sql(value: &FilterValue, ty: &Type) -> PgResult<SqlParam> {
    if let FilterValue::List(_) = value {
        return Err(PgError::type_conversion(
            "list values must be expanded into one placeholder per element",
        ));
    }

    let param: SqlParam = match *ty {
        Type::BOOL => Box::new(to_bool(value)?),
        Type::INT2 => Box::new(to_i64(value)?.map(narrow::<i16>).transpose()?),
        Type::INT4 => Box::new(to_i64(value)?.map(narrow::<i32>).transpose()?),
        Type::INT8 => Box::new(to_i64(value)?),
        Type::FLOAT4 => Box::new(to_f64(value)?.map(|f| f as f32)),
        Type::FLOAT8 => Box::new(to_f64(value)?),
        Type::DATE => Box::new(text(value).map(parse_date).transpose()?),
        Type::TIMESTAMP => Box::new(text(value).map(parse_datetime).transpose()?),
        Type::TIMESTAMPTZ => Box::new(text(value).map(parse_datetime_utc).transpose()?),
        Type::TIME => Box::new(text(value).map(parse_time).transpose()?),
        Type::UUID => Box::new(text(value).map(parse_uuid).transpose()?),
        Type::JSON | Type::JSONB => Box::new(match value {
            FilterValue::Null => None,
            other => Some(other.to_json()),
        }),
        _ => Box::new(text(value)),
    };
    Ok(param)
}

/// Convert parameters against the types of a prepared statement.
pub fn filter_values_to_params(values: &[FilterValue], types: &[Type]) -> PgResult<Vec<SqlParam>> {
    if values.len() != types.len() {
        return Err(PgError::type_conversion(format!(
            "statement expects {} parameters, {} given",
            types.len(),
            values.len()
        )));
    }
    values
        .iter()
        .zip(types)
        .map(|(value, ty)| filter_value_to_sql(value, ty))
        .collect()
}

fn text(value: &FilterValue) -> Option<String> {
    match value {
        FilterValue::Null => None,
        FilterValue::String(s) => Some(s.clone()),
        FilterValue::Json(Value::String(s)) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn to_bool(value: &FilterValue) -> PgResult<Option<bool>> {
    match value {
        FilterValue::Null => Ok(None),
        FilterValue::Bool(b) => Ok(Some(*b)),
        FilterValue::Int(i) => Ok(Some(*i != 0)),
        FilterValue::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "t" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "f" | "no" | "off" => Ok(Some(false)),
            _ => Err(PgError::type_conversion(format!("'{}' is not a boolean", s))),
        },
        other => Err(PgError::type_conversion(format!("{} is not a boolean", other))),
    }
}

fn to_i64(value: &FilterValue) -> PgResult<Option<i64>> {
    match value {
        FilterValue::Null => Ok(None),
        FilterValue::Bool(b) => Ok(Some(i64::from(*b))),
        FilterValue::Int(i) => Ok(Some(*i)),
        FilterValue::Float(f) if f.fract() == 0.0 => Ok(Some(*f as i64)),
        FilterValue::String(s) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| PgError::type_conversion(format!("'{}' is not an integer", s))),
        other => Err(PgError::type_conversion(format!("{} is not an integer", other))),
    }
}

fn narrow<T: TryFrom<i64>>(value: i64) -> PgResult<T> {
    T::try_from(value).map_err(|_| PgError::type_conversion(format!("{} is out of range", value)))
}

fn to_f64(value: &FilterValue) -> PgResult<Option<f64>> {
    match value {
        FilterValue::Null => Ok(None),
        FilterValue::Int(i) => Ok(Some(*i as f64)),
        FilterValue::Float(f) => Ok(Some(*f)),
        FilterValue::String(s) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| PgError::type_conversion(format!("'{}' is not a number", s))),
        other => Err(PgError::type_conversion(format!("{} is not a number", other))),
    }
}

/// Parse `YYYY-MM-DD`, ignoring a trailing time.
pub fn parse_date(s: String) -> PgResult<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s.get(..10).unwrap_or(s), DATE_FORMAT)
        .map_err(|_| PgError::type_conversion(format!("'{}' is not a date", s)))
}

/// Parse a local date and time. A bare date means midnight.
pub fn parse_datetime(s: String) -> PgResult<NaiveDateTime> {
    let s = s.trim();
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, DATE_FORMAT)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .ok_or_else(|| PgError::type_conversion(format!("'{}' is not a date and time", s)))
}

/// Parse an RFC 3339 timestamp, or a local one taken as UTC.
pub fn parse_datetime_utc(s: String) -> PgResult<DateTime<Utc>> {
    match DateTime::parse_from_rfc3339(s.trim()) {
        Ok(dt) => Ok(dt.with_timezone(&Utc)),
        Err(_) => parse_datetime(s).map(|naive| naive.and_utc()),
    }
}

/// Parse `HH:MM:SS` or `HH:MM`.
pub fn parse_time(s: String) -> PgResult<NaiveTime> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .map_err(|_| PgError::type_conversion(format!("'{}' is not a time", s)))
}

fn parse_uuid(s: String) -> PgResult<Uuid> {
    Uuid::parse_str(s.trim()).map_err(|_| PgError::type_conversion(format!("'{}' is not a UUID", s)))
}

/// Convert a result row to a JSON object keyed by column label.
///
/// Types without a JSON mapping are returned as `null`.
pub fn row_to_json(row: &tokio_postgres::Row) -> PgResult<Row> {
    let mut out = Row::new();
    for (idx, column) in row.columns().iter().enumerate() {
        let value = column_value(row, idx, column.type_())?;
        out.insert(column.name().to_string(), value);
    }
    Ok(out)
}

fn column_value(row: &tokio_postgres::Row, idx: usize, ty: &Type) -> PgResult<Value> {
    let value = match *ty {
        Type::BOOL => row.try_get::<_, Option<bool>>(idx)?.map(Value::from),
        Type::INT2 => row.try_get::<_, Option<i16>>(idx)?.map(Value::from),
        Type::INT4 => row.try_get::<_, Option<i32>>(idx)?.map(Value::from),
        Type::INT8 => row.try_get::<_, Option<i64>>(idx)?.map(Value::from),
        Type::FLOAT4 => row.try_get::<_, Option<f32>>(idx)?.map(Value::from),
        Type::FLOAT8 => row.try_get::<_, Option<f64>>(idx)?.map(Value::from),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => {
            row.try_get::<_, Option<String>>(idx)?.map(Value::from)
        }
        Type::DATE => row
            .try_get::<_, Option<NaiveDate>>(idx)?
            .map(|d| Value::from(d.format(DATE_FORMAT).to_string())),
        Type::TIMESTAMP => row
            .try_get::<_, Option<NaiveDateTime>>(idx)?
            .map(|d| Value::from(d.format(DATETIME_FORMAT).to_string())),
        Type::TIMESTAMPTZ => row
            .try_get::<_, Option<DateTime<Utc>>>(idx)?
            .map(|d| Value::from(d.to_rfc3339())),
        Type::TIME => row
            .try_get::<_, Option<NaiveTime>>(idx)?
            .map(|t| Value::from(t.format(TIME_FORMAT).to_string())),
        Type::UUID => row.try_get::<_, Option<Uuid>>(idx)?.map(|u| Value::from(u.to_string())),
        Type::JSON | Type::JSONB => row.try_get::<_, Option<Value>>(idx)?,
        _ => {
            debug!(column = idx, pg_type = %ty, "No JSON mapping for column type");
            None
        }
    };
    Ok(value.unwrap_or(Value::Null))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_filter_value_to_sql() {
        assert!(filter_value_to_sql(&FilterValue::String("12".into()), &Type::INT4).is_ok());
        assert!(filter_value_to_sql(&FilterValue::String("%ali%".into()), &Type::TEXT).is_ok());
        assert!(filter_value_to_sql(&FilterValue::Null, &Type::DATE).is_ok());
        assert!(filter_value_to_sql(&FilterValue::Int(1), &Type::BOOL).is_ok());
        assert!(filter_value_to_sql(&FilterValue::Int(1), &Type::JSONB).is_ok());

        assert!(filter_value_to_sql(&FilterValue::String("abc".into()), &Type::INT8).is_err());
        assert!(filter_value_to_sql(&FilterValue::Int(70_000), &Type::INT2).is_err());
        assert!(filter_value_to_sql(&FilterValue::String("yesterday".into()), &Type::DATE).is_err());
        assert!(filter_value_to_sql(&FilterValue::List(vec![FilterValue::Int(1)]), &Type::INT4).is_err());
    }

    #[test]
    fn test_params_must_match_statement() {
        let values = vec![FilterValue::Int(1), FilterValue::String("x".into())];
        assert_eq!(filter_values_to_params(&values, &[Type::INT4, Type::TEXT]).unwrap().len(), 2);
        assert!(filter_values_to_params(&values, &[Type::INT4]).is_err());
    }

    #[test]
    fn test_scalar_coercion() {
        assert_eq!(to_i64(&FilterValue::String(" 42 ".into())).unwrap(), Some(42));
        assert_eq!(to_i64(&FilterValue::Float(3.0)).unwrap(), Some(3));
        assert!(to_i64(&FilterValue::Float(3.5)).is_err());
        assert_eq!(to_bool(&FilterValue::String("TRUE".into())).unwrap(), Some(true));
        assert_eq!(to_bool(&FilterValue::String("0".into())).unwrap(), Some(false));
        assert_eq!(to_f64(&FilterValue::Int(2)).unwrap(), Some(2.0));
        assert_eq!(text(&FilterValue::Int(7)), Some("7".to_string()));
        assert_eq!(text(&FilterValue::Null), None);
    }

    #[test]
    fn test_temporal_parsing() {
        let date = parse_date("2024-03-05 10:00:00".into()).unwrap();
        assert_eq!((date.year(), date.month(), date.day()), (2024, 3, 5));

        let dt = parse_datetime("2024-03-05T10:20:30".into()).unwrap();
        assert_eq!((dt.hour(), dt.minute(), dt.second()), (10, 20, 30));
        assert_eq!(parse_datetime("2024-03-05".into()).unwrap().hour(), 0);

        let utc = parse_datetime_utc("2024-03-05T10:00:00+02:00".into()).unwrap();
        assert_eq!(utc.hour(), 8);

        assert_eq!(parse_time("09:15".into()).unwrap().minute(), 15);
        assert!(parse_time("9 o'clock".into()).is_err());
    }
}
