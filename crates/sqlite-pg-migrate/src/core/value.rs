//! SQL value types moved between the source and target stores.
//!
//! Values are hashable and comparable so that whole rows can be placed in
//! sets for content verification.

use std::hash::{Hash, Hasher};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use uuid::Uuid;

/// A single typed cell value.
#[derive(Debug, Clone)]
pub enum SqlValue {
    /// SQL NULL.
    Null,

    /// String, text and enum columns.
    Text(String),

    /// Double precision floating point.
    Float(f64),

    /// Identifier and foreign key columns.
    Uuid(Uuid),

    /// Calendar date without time component.
    Date(NaiveDate),

    /// Instant in time, always normalized to UTC.
    Timestamp(DateTime<Utc>),
}

impl SqlValue {
    /// Check if this value is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Float bits with both zeros and all NaNs folded together.
    fn float_key(v: f64) -> u64 {
        if v == 0.0 {
            0.0f64.to_bits()
        } else if v.is_nan() {
            f64::NAN.to_bits()
        } else {
            v.to_bits()
        }
    }
}

impl PartialEq for SqlValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (SqlValue::Null, SqlValue::Null) => true,
            (SqlValue::Text(a), SqlValue::Text(b)) => a == b,
            (SqlValue::Float(a), SqlValue::Float(b)) => {
                SqlValue::float_key(*a) == SqlValue::float_key(*b)
            }
            (SqlValue::Uuid(a), SqlValue::Uuid(b)) => a == b,
            (SqlValue::Date(a), SqlValue::Date(b)) => a == b,
            (SqlValue::Timestamp(a), SqlValue::Timestamp(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for SqlValue {}

impl Hash for SqlValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            SqlValue::Null => {}
            SqlValue::Text(v) => v.hash(state),
            SqlValue::Float(v) => SqlValue::float_key(*v).hash(state),
            SqlValue::Uuid(v) => v.hash(state),
            SqlValue::Date(v) => v.hash(state),
            SqlValue::Timestamp(v) => v.hash(state),
        }
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Float(v)
    }
}

impl From<Uuid> for SqlValue {
    fn from(v: Uuid) -> Self {
        SqlValue::Uuid(v)
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(v: NaiveDate) -> Self {
        SqlValue::Date(v)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(v: DateTime<Utc>) -> Self {
        SqlValue::Timestamp(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// An ordered tuple of values aligned with a table descriptor's fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Row(Vec<SqlValue>);

impl Row {
    /// Create a row from values in field order.
    pub fn new(values: Vec<SqlValue>) -> Self {
        Self(values)
    }

    /// Values in field order.
    pub fn values(&self) -> &[SqlValue] {
        &self.0
    }

    /// Value at a field position.
    pub fn get(&self, idx: usize) -> Option<&SqlValue> {
        self.0.get(idx)
    }

    /// Number of values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the row has no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consume the row, returning its values.
    pub fn into_values(self) -> Vec<SqlValue> {
        self.0
    }
}

impl From<Vec<SqlValue>> for Row {
    fn from(values: Vec<SqlValue>) -> Self {
        Self(values)
    }
}

/// One bounded batch of rows fetched at a given offset.
#[derive(Debug, Clone, Default)]
pub struct Page {
    /// Offset the page was fetched from.
    pub offset: i64,

    /// Rows in source order.
    pub rows: Vec<Row>,
}

impl Page {
    /// Create a page.
    pub fn new(offset: i64, rows: Vec<Row>) -> Self {
        Self { offset, rows }
    }

    /// Get the number of rows in this page.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// An empty page means the source table is exhausted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Offset-aware timestamp layouts, tried before the naive ones.
const OFFSET_TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f%#z",
    "%Y-%m-%dT%H:%M:%S%.f%#z",
    "%Y-%m-%d %H:%M:%S%.f %#z",
];

/// Layouts without an offset; these are taken as UTC.
const NAIVE_TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Parse a timestamp string in any of the layouts found in SQLite exports.
///
/// Accepts RFC 3339, a space or `T` separator, optional fractional seconds,
/// and offsets written as `Z`, `+00`, `+0000` or `+00:00`. A value without
/// an offset, or a bare date, is interpreted as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    for fmt in OFFSET_TIMESTAMP_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    for fmt in NAIVE_TIMESTAMP_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }

    parse_date(s).and_then(|d| d.and_hms_opt(0, 0, 0)).map(|n| n.and_utc())
}

/// Parse a calendar date, accepting a full timestamp and keeping its date.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d);
    }
    if s.len() > 10 && s.is_char_boundary(10) {
        if let Ok(d) = NaiveDate::parse_from_str(&s[..10], "%Y-%m-%d") {
            return Some(d);
        }
    }
    None
}
