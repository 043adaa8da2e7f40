//! Value normalization for content comparison.
//!
//! Both sides are decoded into [`SqlValue`] first, so timestamps are already
//! UTC instants whatever layout the source string used. What remains is
//! precision: PostgreSQL keeps microseconds, a source string may carry more.

use std::collections::HashSet;

use chrono::{DateTime, Duration, DurationRound, Utc};

use crate::core::value::{Row, SqlValue};

/// Normalize one value so equal data compares equal across stores.
pub fn normalize_value(value: SqlValue) -> SqlValue {
    match value {
        SqlValue::Timestamp(ts) => SqlValue::Timestamp(truncate_micros(ts)),
        other => other,
    }
}

/// Normalize every value of a row.
pub fn normalize_row(row: Row) -> Row {
    Row::new(row.into_values().into_iter().map(normalize_value).collect())
}

/// Normalized rows as a set.
pub fn row_set(rows: Vec<Row>) -> HashSet<Row> {
    rows.into_iter().map(normalize_row).collect()
}

fn truncate_micros(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.duration_trunc(Duration::microseconds(1)).unwrap_or(ts)
}
