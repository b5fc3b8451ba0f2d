//! Networked backend: a pooled PostgreSQL server.

use super::driver::BackendDriver;
use super::{DbError, Dialect, Row, RunResult, SqlParam};
use crate::config::{NetworkedConfig, PgTarget};
use async_trait::async_trait;
use futures::TryStreamExt;
use rust_decimal::prelude::ToPrimitive;
use sqlx::encode::{Encode, IsNull};
use sqlx::postgres::types::Oid;
use sqlx::postgres::{
    PgArgumentBuffer, PgArguments, PgConnectOptions, PgPool, PgPoolOptions, PgRow, PgSslMode,
    PgTypeInfo,
};
use sqlx::query::Query;
use sqlx::{Column, Either, Postgres, Row as _, Type, TypeInfo, ValueRef};
use std::str::FromStr;
use tracing::{error, info};

const SCHEMA_SQL: &str = include_str!("networked_schema.sql");

#[derive(Debug, Clone)]
pub struct NetworkedDriver {
    pool: PgPool,
}

/// Build connection options from the configured target.
///
/// TLS is required without certificate verification when `require_tls` is
/// set (hosted servers behind self-signed chains), and disabled otherwise.
pub fn connect_options(config: &NetworkedConfig) -> Result<PgConnectOptions, DbError> {
    let options = match &config.target {
        PgTarget::Url(url) => PgConnectOptions::from_str(url)
            .map_err(|e| DbError::Configuration(format!("invalid DATABASE_URL: {}", e)))?,
        PgTarget::Discrete {
            host,
            port,
            user,
            password,
            database,
        } => PgConnectOptions::new()
            .host(host)
            .port(*port)
            .username(user)
            .password(password)
            .database(database),
    };

    let ssl_mode = if config.require_tls {
        PgSslMode::Require
    } else {
        PgSslMode::Disable
    };
    Ok(options.ssl_mode(ssl_mode))
}

#[async_trait]
impl BackendDriver for NetworkedDriver {
    type Config = NetworkedConfig;

    const DIALECT: Dialect = Dialect::Networked;
    const NAME: &'static str = "PostgreSQL";

    async fn connect(config: &NetworkedConfig) -> Result<Self, DbError> {
        let options = connect_options(config)?;
        let pool = PgPoolOptions::new()
            .max_connections(config.pool.max_connections)
            .acquire_timeout(config.pool.acquire_timeout)
            .idle_timeout(Some(config.pool.idle_timeout))
            .connect_lazy_with(options);

        // Check out one connection to prove the server is reachable; it goes
        // back to the pool when dropped.
        let conn = pool.acquire().await.map_err(|e| {
            error!("Error connecting to PostgreSQL: {}", e);
            DbError::Connection(e)
        })?;
        drop(conn);

        info!(
            max_connections = config.pool.max_connections,
            "Connected to PostgreSQL"
        );
        Ok(Self { pool })
    }

    async fn apply_schema(&self) -> Result<(), DbError> {
        let mut conn = self.pool.acquire().await.map_err(DbError::Connection)?;

        for statement in SCHEMA_SQL.split(';') {
            let trimmed = statement.trim();
            if trimmed.is_empty() {
                continue;
            }
            sqlx::query(trimmed)
                .execute(&mut *conn)
                .await
                .map_err(|e| {
                    error!("Error creating PostgreSQL tables: {}", e);
                    DbError::Schema(e)
                })?;
        }

        info!("PostgreSQL tables created or verified");
        Ok(())
    }

    async fn exec_read(&self, sql: &str, params: &[SqlParam]) -> Result<Vec<Row>, sqlx::Error> {
        let rows = bind_all(sqlx::query(sql), params)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(decode_row).collect()
    }

    async fn exec_write(&self, sql: &str, params: &[SqlParam]) -> Result<RunResult, sqlx::Error> {
        let mut result = RunResult::default();
        let mut stream = bind_all(sqlx::query(sql), params).fetch_many(&self.pool);

        while let Some(step) = stream.try_next().await? {
            match step {
                Either::Left(done) => result.rows_affected += done.rows_affected(),
                Either::Right(row) if result.id.is_none() => result.id = returned_id(&row),
                Either::Right(_) => {}
            }
        }
        Ok(result)
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// A NULL parameter declared with no type (OID 0), so the server infers
/// the type from where the marker appears.
#[derive(Debug, Clone, Copy)]
struct UntypedNull;

impl Type<Postgres> for UntypedNull {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_oid(Oid(0))
    }
}

impl Encode<'_, Postgres> for UntypedNull {
    fn encode_by_ref(&self, _buf: &mut PgArgumentBuffer) -> IsNull {
        IsNull::Yes
    }
}

fn bind_all<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: &'q [SqlParam],
) -> Query<'q, Postgres, PgArguments> {
    for param in params {
        query = match param {
            SqlParam::Null => query.bind(UntypedNull),
            SqlParam::Int(v) => query.bind(*v),
            SqlParam::Real(v) => query.bind(*v),
            SqlParam::Text(v) => query.bind(v.as_str()),
            SqlParam::Bool(v) => query.bind(*v),
            SqlParam::Timestamp(v) => query.bind(*v),
        };
    }

    // A statement prepared around an untyped NULL carries whatever type the
    // server inferred; keep it out of the per-connection statement cache so a
    // later typed value for the same SQL is not sent against it.
    if params.iter().any(|p| matches!(p, SqlParam::Null)) {
        query = query.persistent(false);
    }
    query
}

/// The `id` column of a `RETURNING` row, if the statement produced one.
fn returned_id(row: &PgRow) -> Option<i64> {
    row.try_get::<i32, _>("id")
        .map(i64::from)
        .or_else(|_| row.try_get::<i64, _>("id"))
        .ok()
}

fn decode_row(row: &PgRow) -> Result<Row, sqlx::Error> {
    use serde_json::Value;

    let mut out = Row::new();
    for column in row.columns() {
        let idx = column.ordinal();
        if row.try_get_raw(idx)?.is_null() {
            out.insert(column.name().to_string(), Value::Null);
            continue;
        }

        let value: Value = match column.type_info().name() {
            "INT2" => row.try_get::<i16, _>(idx)?.into(),
            "INT4" => row.try_get::<i32, _>(idx)?.into(),
            "INT8" => row.try_get::<i64, _>(idx)?.into(),
            "FLOAT4" => f64::from(row.try_get::<f32, _>(idx)?).into(),
            "FLOAT8" => row.try_get::<f64, _>(idx)?.into(),
            "NUMERIC" => row.try_get::<rust_decimal::Decimal, _>(idx)?.to_f64().into(),
            "BOOL" => row.try_get::<bool, _>(idx)?.into(),
            "TIMESTAMP" => row
                .try_get::<chrono::NaiveDateTime, _>(idx)?
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
                .into(),
            "TIMESTAMPTZ" => row
                .try_get::<chrono::DateTime<chrono::Utc>, _>(idx)?
                .to_rfc3339()
                .into(),
            "DATE" => row.try_get::<chrono::NaiveDate, _>(idx)?.to_string().into(),
            "BYTEA" => hex::encode(row.try_get::<Vec<u8>, _>(idx)?).into(),
            _ => row.try_get_unchecked::<String, _>(idx)?.into(),
        };
        out.insert(column.name().to_string(), value);
    }
    Ok(out)
}
