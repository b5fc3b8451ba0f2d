//! Embedded backend: a single SQLite data file behind one connection.

use super::driver::BackendDriver;
use super::{DbError, Dialect, Row, RunResult, SqlParam};
use crate::config::EmbeddedConfig;
use async_trait::async_trait;
use sqlx::query::Query;
use sqlx::sqlite::{
    SqliteArguments, SqliteConnectOptions, SqliteConnection, SqlitePool, SqlitePoolOptions,
    SqliteRow,
};
use sqlx::{Column, Executor, Row as _, Sqlite, TypeInfo, ValueRef};
use std::path::Path;
use std::str::FromStr;
use tracing::{error, info};

const SCHEMA_SQL: &str = include_str!("embedded_schema.sql");

/// Path that selects a private in-memory database.
pub const MEMORY_PATH: &str = ":memory:";

#[derive(Debug, Clone)]
pub struct EmbeddedDriver {
    pool: SqlitePool,
    path: String,
}

impl EmbeddedDriver {
    /// Path of the data file backing this driver.
    pub fn path(&self) -> &str {
        &self.path
    }

    fn connect_options(path: &str) -> Result<SqliteConnectOptions, DbError> {
        if path == MEMORY_PATH {
            return SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| DbError::Configuration(e.to_string()));
        }

        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| DbError::Connection(sqlx::Error::Io(e)))?;
            }
        }

        Ok(SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true))
    }
}

#[async_trait]
impl BackendDriver for EmbeddedDriver {
    type Config = EmbeddedConfig;

    const DIALECT: Dialect = Dialect::Embedded;
    const NAME: &'static str = "SQLite";

    async fn connect(config: &EmbeddedConfig) -> Result<Self, DbError> {
        let options = Self::connect_options(&config.path)?;

        // One connection: an in-memory database lives and dies with it, and
        // the last insert rowid stays meaningful for the caller that wrote.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .after_connect(|conn, _meta| Box::pin(async move { configure_pragmas(conn).await }))
            .connect_with(options)
            .await
            .map_err(|e| {
                error!("Error opening SQLite database at {}: {}", config.path, e);
                DbError::Connection(e)
            })?;

        info!("Opened SQLite database at {}", config.path);
        Ok(Self {
            pool,
            path: config.path.clone(),
        })
    }

    async fn apply_schema(&self) -> Result<(), DbError> {
        self.pool.execute(SCHEMA_SQL).await.map_err(|e| {
            error!("Error creating SQLite tables: {}", e);
            DbError::Schema(e)
        })?;
        info!("SQLite tables created or verified");
        Ok(())
    }

    async fn exec_read(&self, sql: &str, params: &[SqlParam]) -> Result<Vec<Row>, sqlx::Error> {
        let rows = bind_all(sqlx::query(sql), params)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(decode_row).collect()
    }

    async fn exec_write(&self, sql: &str, params: &[SqlParam]) -> Result<RunResult, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;

        // The insert rowid belongs to the connection and survives UPDATE and
        // DELETE, so only report it when this statement moved it or inserted.
        let before: i64 = sqlx::query_scalar("SELECT last_insert_rowid()")
            .fetch_one(&mut *conn)
            .await?;
        let done = bind_all(sqlx::query(sql), params)
            .execute(&mut *conn)
            .await?;

        let rows_affected = done.rows_affected();
        let rowid = done.last_insert_rowid();
        let inserted = rowid != before || is_insert(sql);
        Ok(RunResult {
            id: (rows_affected > 0 && rowid > 0 && inserted).then_some(rowid),
            rows_affected,
        })
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// Per-connection pragmas. Foreign keys stay off: the embedded schema only
/// annotates references.
async fn configure_pragmas(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("PRAGMA foreign_keys = OFF")
        .execute(&mut *conn)
        .await?;

    // journal_mode returns the mode actually set; in-memory databases stay "memory".
    let row = sqlx::query("PRAGMA journal_mode = WAL")
        .fetch_one(&mut *conn)
        .await?;
    let journal_mode: String = row.get(0);
    info!("SQLite journal_mode set to: {}", journal_mode);

    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&mut *conn)
        .await?;
    sqlx::query("PRAGMA synchronous = NORMAL")
        .execute(&mut *conn)
        .await?;
    Ok(())
}

fn bind_all<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    params: &'q [SqlParam],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for param in params {
        query = match param {
            SqlParam::Null => query.bind(Option::<i64>::None),
            SqlParam::Int(v) => query.bind(*v),
            SqlParam::Real(v) => query.bind(*v),
            SqlParam::Text(v) => query.bind(v.as_str()),
            SqlParam::Bool(v) => query.bind(*v),
            SqlParam::Timestamp(v) => query.bind(*v),
        };
    }
    query
}

/// Whether the statement's leading keyword inserts rows. Catches an insert
/// whose new rowid happens to equal the previous one in another table.
fn is_insert(sql: &str) -> bool {
    let keyword = sql
        .trim_start()
        .split(|c: char| !c.is_ascii_alphabetic())
        .next()
        .unwrap_or_default();
    keyword.eq_ignore_ascii_case("INSERT") || keyword.eq_ignore_ascii_case("REPLACE")
}

/// Convert a row by each value's storage class; SQLite columns are not
/// strictly typed, so the declared column type is not trusted.
fn decode_row(row: &SqliteRow) -> Result<Row, sqlx::Error> {
    let mut out = Row::new();
    for column in row.columns() {
        let idx = column.ordinal();
        let raw = row.try_get_raw(idx)?;
        let value = if raw.is_null() {
            serde_json::Value::Null
        } else {
            match raw.type_info().name() {
                "INTEGER" | "BOOLEAN" => row.try_get_unchecked::<i64, _>(idx)?.into(),
                "REAL" | "NUMERIC" => row.try_get_unchecked::<f64, _>(idx)?.into(),
                "BLOB" => hex::encode(row.try_get_unchecked::<Vec<u8>, _>(idx)?).into(),
                _ => row.try_get_unchecked::<String, _>(idx)?.into(),
            }
        };
        out.insert(column.name().to_string(), value);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn open(temp_dir: &TempDir) -> EmbeddedDriver {
        let path = temp_dir
            .path()
            .join("data")
            .join("test.db")
            .to_string_lossy()
            .to_string();
        EmbeddedDriver::connect(&EmbeddedConfig { path })
            .await
            .expect("connect failed")
    }

    async fn table_names(driver: &EmbeddedDriver) -> Vec<String> {
        driver
            .exec_read(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
                &[],
            )
            .await
            .expect("query failed")
            .into_iter()
            .map(|row| row["name"].as_str().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_connect_creates_missing_file_and_parent_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let driver = open(&temp_dir).await;
        assert!(Path::new(driver.path()).exists());
    }

    #[tokio::test]
    async fn test_apply_schema_creates_four_tables() {
        let temp_dir = TempDir::new().unwrap();
        let driver = open(&temp_dir).await;
        driver.apply_schema().await.expect("schema failed");

        assert_eq!(
            table_names(&driver).await,
            vec!["parking_lots", "reservations", "users", "vehicles"]
        );
    }

    #[tokio::test]
    async fn test_apply_schema_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let driver = open(&temp_dir).await;
        driver.apply_schema().await.expect("first schema run failed");
        let first = table_names(&driver).await;

        driver
            .apply_schema()
            .await
            .expect("second schema run failed");
        assert_eq!(table_names(&driver).await, first);
    }

    #[tokio::test]
    async fn test_foreign_keys_not_enforced() {
        let temp_dir = TempDir::new().unwrap();
        let driver = open(&temp_dir).await;
        driver.apply_schema().await.unwrap();

        let rows = driver.exec_read("PRAGMA foreign_keys", &[]).await.unwrap();
        assert_eq!(rows[0]["foreign_keys"], 0);

        let result = driver
            .exec_write(
                "INSERT INTO vehicles (user_id, plate, model) VALUES (?, ?, ?)",
                &[SqlParam::Int(999), "ABC123".into(), "Mazda 3".into()],
            )
            .await
            .expect("soft reference should not be checked");
        assert_eq!(result.rows_affected, 1);
    }

    #[tokio::test]
    async fn test_write_reports_rowid_and_read_decodes_types() {
        let temp_dir = TempDir::new().unwrap();
        let driver = open(&temp_dir).await;
        driver.apply_schema().await.unwrap();

        let result = driver
            .exec_write(
                "INSERT INTO parking_lots (name, location, total_spaces, available_spaces, price_per_hour) VALUES (?, ?, ?, ?, ?)",
                &[
                    "Norte".into(),
                    "Carrera 7".into(),
                    SqlParam::Int(200),
                    SqlParam::Int(85),
                    SqlParam::Real(4000.5),
                ],
            )
            .await
            .unwrap();
        assert_eq!(result.id, Some(1));

        let rows = driver
            .exec_read("SELECT * FROM parking_lots WHERE id = ?", &[SqlParam::Int(1)])
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"], "Norte");
        assert_eq!(rows[0]["total_spaces"], 200);
        assert_eq!(rows[0]["price_per_hour"], 4000.5);
        assert!(rows[0]["created_at"].is_string());
    }

    #[tokio::test]
    async fn test_update_without_matches_has_no_id() {
        let temp_dir = TempDir::new().unwrap();
        let driver = open(&temp_dir).await;
        driver.apply_schema().await.unwrap();

        let result = driver
            .exec_write(
                "UPDATE parking_lots SET name = ? WHERE id = ?",
                &["x".into(), SqlParam::Int(42)],
            )
            .await
            .unwrap();
        assert_eq!(result, RunResult::default());
    }

    #[tokio::test]
    async fn test_update_and_delete_after_insert_have_no_id() {
        let temp_dir = TempDir::new().unwrap();
        let driver = open(&temp_dir).await;
        driver.apply_schema().await.unwrap();

        let inserted = driver
            .exec_write(
                "INSERT INTO parking_lots (name, location, total_spaces, available_spaces, price_per_hour) VALUES (?, ?, ?, ?, ?)",
                &["Centro".into(), "Calle 50".into(), SqlParam::Int(150), SqlParam::Int(150), SqlParam::Real(5000.0)],
            )
            .await
            .unwrap();
        assert_eq!(inserted.id, Some(1));

        let updated = driver
            .exec_write(
                "UPDATE parking_lots SET name = ? WHERE id = ?",
                &["Centro Norte".into(), SqlParam::Int(1)],
            )
            .await
            .unwrap();
        assert_eq!(
            updated,
            RunResult {
                id: None,
                rows_affected: 1
            }
        );

        let deleted = driver
            .exec_write("DELETE FROM parking_lots WHERE id = ?", &[SqlParam::Int(1)])
            .await
            .unwrap();
        assert_eq!(
            deleted,
            RunResult {
                id: None,
                rows_affected: 1
            }
        );
    }

    #[tokio::test]
    async fn test_insert_reusing_previous_rowid_reports_id() {
        let temp_dir = TempDir::new().unwrap();
        let driver = open(&temp_dir).await;
        driver.apply_schema().await.unwrap();

        let lot = driver
            .exec_write(
                "INSERT INTO parking_lots (name, location, total_spaces, available_spaces, price_per_hour) VALUES (?, ?, ?, ?, ?)",
                &["Norte".into(), "Carrera 7".into(), SqlParam::Int(200), SqlParam::Int(85), SqlParam::Real(4000.0)],
            )
            .await
            .unwrap();
        // First row of a different table gets the same rowid.
        let user = driver
            .exec_write(
                "insert into users (email, password, name) values (?, ?, ?)",
                &["ana@example.com".into(), "hash".into(), "Ana".into()],
            )
            .await
            .unwrap();
        assert_eq!(lot.id, Some(1));
        assert_eq!(user.id, Some(1));
    }

    #[test]
    fn test_is_insert_reads_leading_keyword() {
        assert!(is_insert("INSERT INTO users VALUES (?)"));
        assert!(is_insert("  replace into users VALUES (?)"));
        assert!(!is_insert("UPDATE users SET name = ?"));
        assert!(!is_insert("DELETE FROM users"));
        assert!(!is_insert(""));
    }

    #[tokio::test]
    async fn test_in_memory_database() {
        let driver = EmbeddedDriver::connect(&EmbeddedConfig {
            path: MEMORY_PATH.to_string(),
        })
        .await
        .unwrap();
        driver.apply_schema().await.unwrap();
        assert_eq!(table_names(&driver).await.len(), 4);
    }
}
