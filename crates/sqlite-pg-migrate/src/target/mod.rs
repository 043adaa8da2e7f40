//! PostgreSQL target database operations.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use tokio_postgres::{Config as PgConfig, NoTls};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::TargetConfig;
use crate::core::traits::PageSink;
use crate::core::value::{Row, SqlValue};
use crate::error::{MigrateError, Result};
use crate::schema::{Field, FieldType, TableDescriptor};

/// PostgreSQL connections kept by the target pool.
const MAX_CONNECTIONS: usize = 2;

/// PostgreSQL target pool.
pub struct PgTarget {
    pool: Pool,
    schema: String,
}

impl PgTarget {
    /// Connect to PostgreSQL and test the connection.
    pub async fn connect(config: &TargetConfig) -> Result<Self> {
        let mut pg_config = PgConfig::new();
        pg_config.host(&config.host);
        pg_config.port(config.port);
        pg_config.dbname(&config.database);
        pg_config.user(&config.user);
        pg_config.password(&config.password);

        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let mgr = Manager::from_config(pg_config, NoTls, mgr_config);
        let pool = Pool::builder(mgr)
            .max_size(MAX_CONNECTIONS)
            .build()
            .map_err(|e| MigrateError::pool(e, "creating PostgreSQL target pool"))?;

        // Test connection
        let client = pool
            .get()
            .await
            .map_err(|e| MigrateError::pool(e, "connecting to PostgreSQL target"))?;
        client.simple_query("SELECT 1").await?;

        info!(
            "Connected to PostgreSQL: {}:{}/{} (schema {})",
            config.host, config.port, config.database, config.schema
        );

        Ok(Self {
            pool,
            schema: config.schema.clone(),
        })
    }

    /// Namespace all tables are written into.
    pub fn schema(&self) -> &str {
        &self.schema
    }

    async fn client(&self, context: &str) -> Result<deadpool_postgres::Object> {
        self.pool
            .get()
            .await
            .map_err(|e| MigrateError::pool(e, context))
    }

    /// Physical column names of a destination table in ordinal order.
    pub async fn columns(&self, table: &str) -> Result<Vec<String>> {
        let client = self.client("loading PostgreSQL columns").await?;
        let rows = client
            .query(
                "SELECT column_name::text FROM information_schema.columns
                 WHERE table_schema = $1 AND table_name = $2
                 ORDER BY ordinal_position",
                &[&self.schema, &table],
            )
            .await?;

        Ok(rows.iter().map(|r| r.get::<_, String>(0)).collect())
    }

    /// Number of rows in a destination table.
    pub async fn row_count(&self, table: &str) -> Result<i64> {
        let client = self.client("counting PostgreSQL rows").await?;
        let sql = format!("SELECT COUNT(*) FROM {}", qualify_table(&self.schema, table));
        let row = client.query_one(&sql, &[]).await?;
        Ok(row.get(0))
    }

    /// Every row of a destination table read through its descriptor.
    pub async fn fetch_all(&self, descriptor: &TableDescriptor) -> Result<Vec<Row>> {
        let client = self.client("reading PostgreSQL rows").await?;
        let select_list: Vec<String> = descriptor
            .fields
            .iter()
            .map(|f| format!("{}::{}", quote_ident(f.name), f.field_type.pg_type()))
            .collect();
        let sql = format!(
            "SELECT {} FROM {}",
            select_list.join(", "),
            qualify_table(&self.schema, descriptor.name)
        );

        let rows = client.query(&sql, &[]).await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut values = Vec::with_capacity(descriptor.fields.len());
            for (idx, field) in descriptor.fields.iter().enumerate() {
                values.push(decode_pg_cell(row, idx, field)?);
            }
            out.push(Row::new(values));
        }
        Ok(out)
    }

    /// Close the pool.
    pub fn close(&self) {
        self.pool.close();
    }
}

#[async_trait]
impl PageSink for PgTarget {
    async fn write_page(&self, descriptor: &TableDescriptor, rows: &[Row]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut client = self.client("writing PostgreSQL page").await?;
        let sql = build_insert_sql_literals(&self.schema, descriptor, rows);

        let tx = client.transaction().await?;
        match tx.execute(sql.as_str(), &[]).await {
            Ok(inserted) => {
                tx.commit().await?;
                debug!(
                    "{}.{}: wrote {} of {} rows",
                    self.schema,
                    descriptor.name,
                    inserted,
                    rows.len()
                );
                Ok(inserted)
            }
            Err(e) => {
                if let Err(rb) = tx.rollback().await {
                    warn!("Rollback failed for {}.{}: {}", self.schema, descriptor.name, rb);
                }
                let row_preview: Vec<String> = rows[0]
                    .values()
                    .iter()
                    .take(5)
                    .map(|v| format!("{:?}", v))
                    .collect();
                error!(
                    "Insert failed for {}.{}: {} - first row preview: {:?}",
                    self.schema, descriptor.name, e, row_preview
                );
                Err(MigrateError::Target(e))
            }
        }
    }

    fn db_type(&self) -> &str {
        "postgres"
    }
}

fn decode_pg_cell(row: &tokio_postgres::Row, idx: usize, field: &Field) -> Result<SqlValue> {
    let value = match field.field_type {
        FieldType::Identifier | FieldType::ForeignKey => {
            SqlValue::from(row.try_get::<_, Option<Uuid>>(idx)?)
        }
        FieldType::String | FieldType::Text | FieldType::Enum => {
            SqlValue::from(row.try_get::<_, Option<String>>(idx)?)
        }
        FieldType::Float => SqlValue::from(row.try_get::<_, Option<f64>>(idx)?),
        FieldType::Date => SqlValue::from(row.try_get::<_, Option<NaiveDate>>(idx)?),
        FieldType::Timestamp => SqlValue::from(row.try_get::<_, Option<DateTime<Utc>>>(idx)?),
    };
    Ok(value)
}

/// Quote a PostgreSQL identifier.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Fully qualify a table name.
fn qualify_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(table))
}

/// Escape a string for SQL literal use.
fn escape_sql_string(s: &str) -> String {
    s.replace('\'', "''")
}

/// Render a value as a SQL literal cast to its field's PostgreSQL type.
fn sql_value_to_literal(value: &SqlValue, field_type: FieldType) -> String {
    match value {
        SqlValue::Null => format!("NULL::{}", field_type.pg_type()),
        SqlValue::Text(s) => format!("'{}'", escape_sql_string(s)),
        SqlValue::Float(n) if n.is_finite() => format!("{}::double precision", n),
        SqlValue::Float(n) if n.is_nan() => "'NaN'::double precision".to_string(),
        SqlValue::Float(n) if n.is_sign_positive() => "'Infinity'::double precision".to_string(),
        SqlValue::Float(_) => "'-Infinity'::double precision".to_string(),
        SqlValue::Uuid(u) => format!("'{}'::uuid", u),
        SqlValue::Date(d) => format!("'{}'::date", d),
        SqlValue::Timestamp(dt) => format!(
            "'{}'::timestamptz",
            dt.to_rfc3339_opts(SecondsFormat::Micros, true)
        ),
    }
}

/// Build a multi-row INSERT with literal values that skips existing keys.
fn build_insert_sql_literals(schema: &str, descriptor: &TableDescriptor, rows: &[Row]) -> String {
    let col_list: String = descriptor
        .fields
        .iter()
        .map(|f| quote_ident(f.name))
        .collect::<Vec<_>>()
        .join(", ");

    let value_rows: Vec<String> = rows
        .iter()
        .map(|row| {
            let values: Vec<String> = row
                .values()
                .iter()
                .zip(descriptor.fields)
                .map(|(v, f)| sql_value_to_literal(v, f.field_type))
                .collect();
            format!("({})", values.join(", "))
        })
        .collect();

    format!(
        "INSERT INTO {} ({}) VALUES {} ON CONFLICT ({}) DO NOTHING",
        qualify_table(schema, descriptor.name),
        col_list,
        value_rows.join(", "),
        quote_ident(descriptor.primary_key())
    )
}

#[cfg(test)]
pub(crate) mod testing {
    //! Live PostgreSQL helpers. Tests using them are `#[ignore]` and read
    //! `TEST_PG_*`.

    use super::PgTarget;
    use crate::config::TargetConfig;

    const CONTENT_DDL: &str = include_str!("../../../../sql/content_schema.sql");

    pub(crate) fn live_config(schema: &str) -> Option<TargetConfig> {
        let var = |k: &str| std::env::var(k).ok();
        Some(TargetConfig {
            host: var("TEST_PG_HOST")?,
            port: var("TEST_PG_PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(5432),
            database: var("TEST_PG_DBNAME")?,
            user: var("TEST_PG_USER")?,
            password: var("TEST_PG_PASSWORD").unwrap_or_default(),
            schema: schema.to_string(),
        })
    }

    /// Fresh namespace name so concurrent tests do not share tables.
    pub(crate) fn scratch_schema(prefix: &str) -> String {
        format!("{}_{}", prefix, uuid::Uuid::new_v4().simple())
    }

    /// Create the catalogue tables in the target's namespace.
    pub(crate) async fn create_schema(target: &PgTarget) {
        execute(target, &CONTENT_DDL.replace("content", target.schema())).await;
    }

    pub(crate) async fn drop_schema(target: &PgTarget) {
        execute(
            target,
            &format!("DROP SCHEMA IF EXISTS \"{}\" CASCADE", target.schema()),
        )
        .await;
    }

    pub(crate) async fn execute(target: &PgTarget, sql: &str) {
        let client = target.client("test setup").await.unwrap();
        client.batch_execute(sql).await.unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{GENRE, PERSON_FILM_WORK};
    use chrono::TimeZone;

    fn genre_row(id: Uuid, name: &str) -> Row {
        let ts = Utc.with_ymd_and_hms(2021, 6, 16, 20, 14, 9).unwrap();
        Row::new(vec![
            SqlValue::Uuid(id),
            SqlValue::Text(name.to_string()),
            SqlValue::Null,
            SqlValue::Timestamp(ts),
            SqlValue::Timestamp(ts),
        ])
    }

    #[test]
    fn test_escape_sql_string() {
        assert_eq!(escape_sql_string("Schindler's List"), "Schindler''s List");
    }

    #[test]
    fn test_literal_casts() {
        let id = Uuid::nil();
        assert_eq!(
            sql_value_to_literal(&SqlValue::Uuid(id), FieldType::Identifier),
            "'00000000-0000-0000-0000-000000000000'::uuid"
        );
        assert_eq!(
            sql_value_to_literal(&SqlValue::Null, FieldType::ForeignKey),
            "NULL::uuid"
        );
        assert_eq!(
            sql_value_to_literal(&SqlValue::Float(8.5), FieldType::Float),
            "8.5::double precision"
        );
        assert_eq!(
            sql_value_to_literal(&SqlValue::Float(f64::NAN), FieldType::Float),
            "'NaN'::double precision"
        );
        let d = NaiveDate::from_ymd_opt(2021, 1, 2).unwrap();
        assert_eq!(
            sql_value_to_literal(&SqlValue::Date(d), FieldType::Date),
            "'2021-01-02'::date"
        );
        let ts = Utc.with_ymd_and_hms(2023, 9, 11, 16, 3, 0).unwrap();
        assert_eq!(
            sql_value_to_literal(&SqlValue::Timestamp(ts), FieldType::Timestamp),
            "'2023-09-11T16:03:00.000000Z'::timestamptz"
        );
    }

    #[test]
    fn test_build_insert_sql() {
        let id = Uuid::nil();
        let sql = build_insert_sql_literals("content", &GENRE, &[genre_row(id, "O'Brien")]);
        assert!(sql.starts_with(
            "INSERT INTO \"content\".\"genre\" (\"id\", \"name\", \"description\", \"created_at\", \"updated_at\") VALUES ("
        ));
        assert!(sql.contains("'O''Brien'"));
        assert!(sql.contains("NULL::text"));
        assert!(sql.ends_with("ON CONFLICT (\"id\") DO NOTHING"));
        assert!(!sql.contains("file_path"));
    }

    #[test]
    fn test_build_insert_sql_multi_row() {
        let rows = vec![
            genre_row(Uuid::new_v4(), "Drama"),
            genre_row(Uuid::new_v4(), "Comedy"),
        ];
        let sql = build_insert_sql_literals("content", &GENRE, &rows);
        assert_eq!(sql.matches("::uuid").count(), 2);
        assert_eq!(sql.matches("), (").count(), 1);
    }

    #[test]
    fn test_build_insert_sql_association_table() {
        let row = Row::new(vec![
            SqlValue::Uuid(Uuid::new_v4()),
            SqlValue::Uuid(Uuid::new_v4()),
            SqlValue::Uuid(Uuid::new_v4()),
            SqlValue::Text("actor".into()),
            SqlValue::Null,
        ]);
        let sql = build_insert_sql_literals("content", &PERSON_FILM_WORK, &[row]);
        assert!(sql.contains("\"person_film_work\""));
        assert!(sql.contains("'actor'"));
        assert!(sql.contains("NULL::timestamptz"));
    }

    #[test]
    fn test_qualify_table_quotes_identifiers() {
        assert_eq!(qualify_table("content", "genre"), "\"content\".\"genre\"");
        assert_eq!(quote_ident("ty\"pe"), "\"ty\"\"pe\"");
    }

    #[tokio::test]
    #[ignore = "requires a PostgreSQL server (TEST_PG_* env)"]
    async fn test_write_page_skips_existing_ids() {
        let config = testing::live_config("content").expect("TEST_PG_* not set");
        let target = PgTarget::connect(&config).await.unwrap();
        testing::create_schema(&target).await;

        let id = Uuid::new_v4();
        let rows = vec![genre_row(id, &format!("genre-{}", id))];
        assert_eq!(target.write_page(&GENRE, &rows).await.unwrap(), 1);
        assert_eq!(target.write_page(&GENRE, &rows).await.unwrap(), 0);

        let stored = target.fetch_all(&GENRE).await.unwrap();
        assert!(stored.contains(&rows[0]));
        assert_eq!(target.columns("genre").await.unwrap(), GENRE.column_names());
        target.close();
    }
}
