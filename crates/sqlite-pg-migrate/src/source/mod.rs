//! SQLite source reader.
//!
//! Reads column metadata and bounded pages from the legacy SQLite file using
//! a single-connection SQLx pool opened read-only.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Row as _, TypeInfo, ValueRef};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::core::traits::PageSource;
use crate::core::value::{parse_date, parse_timestamp, Page, Row, SqlValue};
use crate::error::{MigrateError, Result};
use crate::schema::{Field, FieldType, EXCLUDED_COLUMN};

/// Connection pool timeout.
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// SQLite source reader.
pub struct SqliteSource {
    pool: SqlitePool,
}

impl SqliteSource {
    /// Open the SQLite file read-only. A missing file is an error; it is
    /// never created.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let options = SqliteConnectOptions::new()
            .filename(path)
            .read_only(true)
            .create_if_missing(false);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .acquire_timeout(POOL_CONNECTION_TIMEOUT)
            .connect_with(options)
            .await
            .map_err(|e| {
                error!("Cannot open SQLite source {}: {}", path.display(), e);
                MigrateError::Source(e)
            })?;

        // Test connection
        sqlx::query("SELECT 1").fetch_one(&pool).await?;

        info!("Connected to SQLite source: {}", path.display());

        Ok(Self { pool })
    }

    /// Wrap an already configured pool.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Number of rows in a table.
    pub async fn row_count(&self, table: &str) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(table));
        let row = sqlx::query(&sql)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| read_failed(table, e))?;
        Ok(row.try_get::<i64, _>(0)?)
    }

    /// Every row of a table projected onto `fields`.
    pub async fn fetch_all(&self, table: &str, fields: &[Field]) -> Result<Vec<Row>> {
        let sql = format!(
            "SELECT {} FROM {}",
            projection(fields),
            quote_ident(table)
        );
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| read_failed(table, e))?;

        let fields = projected_fields(fields);
        rows.iter()
            .map(|row| decode_row(table, &fields, row))
            .collect()
    }

    /// Release the connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl PageSource for SqliteSource {
    async fn columns(&self, table: &str) -> Result<Vec<String>> {
        let sql = format!("PRAGMA table_info({})", quote_ident(table));
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| read_failed(table, e))?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            columns.push(row.try_get::<String, _>("name")?);
        }
        Ok(columns)
    }

    async fn fetch_page(
        &self,
        table: &str,
        fields: &[Field],
        offset: i64,
        batch_size: i64,
    ) -> Result<Page> {
        let sql = format!(
            "SELECT {} FROM {} LIMIT ? OFFSET ?",
            projection(fields),
            quote_ident(table)
        );
        let rows = sqlx::query(&sql)
            .bind(batch_size)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| read_failed(table, e))?;

        let fields = projected_fields(fields);
        let rows = rows
            .iter()
            .map(|row| decode_row(table, &fields, row))
            .collect::<Result<Vec<_>>>()
            .inspect_err(|e| {
                error!("Failed to decode page of {} at offset {}: {}", table, offset, e)
            })?;

        debug!(
            "{}: fetched {} rows at offset {}",
            table,
            rows.len(),
            offset
        );

        Ok(Page::new(offset, rows))
    }

    fn db_type(&self) -> &str {
        "sqlite"
    }
}

fn read_failed(table: &str, e: sqlx::Error) -> MigrateError {
    error!("Failed to read from SQLite table {}: {}", table, e);
    MigrateError::Source(e)
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn projected_fields(fields: &[Field]) -> Vec<Field> {
    fields
        .iter()
        .filter(|f| f.name != EXCLUDED_COLUMN)
        .copied()
        .collect()
}

fn projection(fields: &[Field]) -> String {
    projected_fields(fields)
        .iter()
        .map(|f| quote_ident(f.name))
        .collect::<Vec<_>>()
        .join(", ")
}

fn decode_row(table: &str, fields: &[Field], row: &SqliteRow) -> Result<Row> {
    let mut values = Vec::with_capacity(fields.len());
    for (idx, field) in fields.iter().enumerate() {
        values.push(decode_cell(table, field, row, idx)?);
    }
    Ok(Row::new(values))
}

fn decode_cell(table: &str, field: &Field, row: &SqliteRow, idx: usize) -> Result<SqlValue> {
    let raw = row.try_get_raw(idx)?;
    if raw.is_null() {
        return Ok(SqlValue::Null);
    }

    // Decide by storage class, not declared type. Non-numeric storage in a
    // float column goes through the text parser.
    let numeric = matches!(raw.type_info().name(), "REAL" | "INTEGER");
    match field.field_type {
        FieldType::Float if numeric => {
            Ok(SqlValue::Float(row.try_get_unchecked::<f64, _>(idx)?))
        }
        _ => {
            let text: String = row.try_get_unchecked(idx)?;
            decode_text(table, field, text)
        }
    }
}

/// Decode a source text value according to its field type.
pub(crate) fn decode_text(table: &str, field: &Field, text: String) -> Result<SqlValue> {
    match field.field_type {
        FieldType::Identifier | FieldType::ForeignKey => Uuid::parse_str(text.trim())
            .map(SqlValue::Uuid)
            .map_err(|e| MigrateError::decode(table, field.name, format!("'{}': {}", text, e))),
        FieldType::Timestamp => parse_timestamp(&text)
            .map(SqlValue::Timestamp)
            .ok_or_else(|| {
                MigrateError::decode(table, field.name, format!("'{}' is not a timestamp", text))
            }),
        FieldType::Date => parse_date(&text).map(SqlValue::Date).ok_or_else(|| {
            MigrateError::decode(table, field.name, format!("'{}' is not a date", text))
        }),
        FieldType::Float => text
            .trim()
            .parse::<f64>()
            .map(SqlValue::Float)
            .map_err(|e| MigrateError::decode(table, field.name, format!("'{}': {}", text, e))),
        FieldType::String | FieldType::Text | FieldType::Enum => Ok(SqlValue::Text(text)),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! SQLite catalogue fixture shared by the live round-trip tests.

    use std::path::Path;

    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

    pub(crate) const GENRE_ID: &str = "3d8d9bf5-0d90-4353-88ba-4ccc5d2c07ff";

    /// Legacy DDL for the five catalogue tables, `file_path` included.
    pub(crate) const CATALOGUE_DDL: [&str; 5] = [
        "CREATE TABLE genre (id TEXT PRIMARY KEY, name TEXT NOT NULL, description TEXT,
            created_at TIMESTAMP, updated_at TIMESTAMP)",
        "CREATE TABLE person (id TEXT PRIMARY KEY, full_name TEXT NOT NULL,
            created_at TIMESTAMP, updated_at TIMESTAMP)",
        "CREATE TABLE film_work (id TEXT PRIMARY KEY, title TEXT NOT NULL, description TEXT,
            creation_date DATE, file_path TEXT, rating FLOAT, type TEXT NOT NULL,
            created_at TIMESTAMP, updated_at TIMESTAMP)",
        "CREATE TABLE genre_film_work (id TEXT PRIMARY KEY, film_work_id TEXT NOT NULL,
            genre_id TEXT NOT NULL, created_at TIMESTAMP)",
        "CREATE TABLE person_film_work (id TEXT PRIMARY KEY, film_work_id TEXT NOT NULL,
            person_id TEXT NOT NULL, role TEXT NOT NULL, created_at TIMESTAMP)",
    ];

    /// Six rows across the catalogue, mixing timestamp layouts.
    pub(crate) const CATALOGUE_ROWS: [&str; 6] = [
        "INSERT INTO genre VALUES ('3d8d9bf5-0d90-4353-88ba-4ccc5d2c07ff', 'Action', NULL,
            '2023-09-11T16:03:00+00:00', '2021-06-16 20:14:09.221838+00')",
        "INSERT INTO genre VALUES ('120a21cf-9097-479e-904a-13dd7198c1dd', 'Comedy', 'Funny',
            '2021-06-16 20:14:09.221958+00', '2021-06-16 20:14:09.221958+00')",
        "INSERT INTO person VALUES ('26e83050-29ef-4163-a99d-b546cac208f8', 'Ann Smith',
            '2021-06-16 20:14:09.309735+00', '2021-06-16 20:14:09.309735+00')",
        "INSERT INTO film_work VALUES ('3d825f60-9fff-4dfe-b294-1a45fa1e115d', 'Star Bound',
            'Space opera', '2021-01-02', '/films/star_bound.mp4', 8.5, 'movie',
            '2021-06-16 20:14:09.221838+00', '2021-06-16T20:14:09Z')",
        "INSERT INTO genre_film_work VALUES ('0031feab-8f53-412a-8f53-47098a60ac73',
            '3d825f60-9fff-4dfe-b294-1a45fa1e115d', '3d8d9bf5-0d90-4353-88ba-4ccc5d2c07ff',
            '2021-06-16 20:14:09.221838+00')",
        "INSERT INTO person_film_work VALUES ('002f3e6b-95a5-4a09-8dcf-8f0b3ee1b54b',
            '3d825f60-9fff-4dfe-b294-1a45fa1e115d', '26e83050-29ef-4163-a99d-b546cac208f8',
            'actor', '2021-06-16 20:14:09.221838+00')",
    ];

    /// Create a SQLite file holding the catalogue fixture.
    pub(crate) async fn seed_catalogue(path: &Path) {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .unwrap();
        for stmt in CATALOGUE_DDL.iter().chain(CATALOGUE_ROWS.iter()) {
            sqlx::query(stmt).execute(&pool).await.unwrap();
        }
        pool.close().await;
    }
}
