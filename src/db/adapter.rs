//! The database adapter: one `query`/`run` surface over either backend.

use super::driver::BackendDriver;
use super::embedded::EmbeddedDriver;
use super::networked::NetworkedDriver;
use super::placeholders::translate;
use super::{DbError, Dialect, Row, RunResult, SqlParam};
use crate::config::DbConfig;
use tracing::{error, info};

#[derive(Debug)]
enum Backend {
    Embedded(EmbeddedDriver),
    Networked(NetworkedDriver),
}

/// Uniform query interface bound to exactly one backend.
///
/// Immutable once opened; share it behind an `Arc`.
#[derive(Debug)]
pub struct Database {
    backend: Backend,
}

impl Database {
    /// Connect to the configured backend and apply the schema.
    ///
    /// # Errors
    /// Returns `Connection` or `Schema` on the first failure; nothing is
    /// retried. A backend whose schema step fails is closed before returning.
    pub async fn open(config: &DbConfig) -> Result<Self, DbError> {
        let backend = match config {
            DbConfig::Embedded(c) => Backend::Embedded(open_driver::<EmbeddedDriver>(c).await?),
            DbConfig::Networked(c) => {
                Backend::Networked(open_driver::<NetworkedDriver>(c).await?)
            }
        };
        Ok(Database { backend })
    }

    pub fn dialect(&self) -> Dialect {
        match &self.backend {
            Backend::Embedded(_) => EmbeddedDriver::DIALECT,
            Backend::Networked(_) => NetworkedDriver::DIALECT,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match &self.backend {
            Backend::Embedded(_) => EmbeddedDriver::NAME,
            Backend::Networked(_) => NetworkedDriver::NAME,
        }
    }

    /// Run a read statement written with `?` markers.
    ///
    /// No matching rows yields an empty vector, not an error.
    pub async fn query(&self, sql: &str, params: &[SqlParam]) -> Result<Vec<Row>, DbError> {
        let sql = translate(sql, self.dialect());
        let result = match &self.backend {
            Backend::Embedded(d) => d.exec_read(&sql, params).await,
            Backend::Networked(d) => d.exec_read(&sql, params).await,
        };
        result.map_err(|e| {
            error!("Database query error: {}", e);
            DbError::Query(e)
        })
    }

    /// Run a write statement written with `?` markers.
    ///
    /// On PostgreSQL the identifier is only reported when the statement ends
    /// in `RETURNING id`.
    pub async fn run(&self, sql: &str, params: &[SqlParam]) -> Result<RunResult, DbError> {
        let sql = translate(sql, self.dialect());
        let result = match &self.backend {
            Backend::Embedded(d) => d.exec_write(&sql, params).await,
            Backend::Networked(d) => d.exec_write(&sql, params).await,
        };
        result.map_err(|e| {
            error!("Database run error: {}", e);
            DbError::Query(e)
        })
    }

    /// Re-apply the schema. Safe to call on an initialized database.
    pub async fn apply_schema(&self) -> Result<(), DbError> {
        match &self.backend {
            Backend::Embedded(d) => d.apply_schema().await,
            Backend::Networked(d) => d.apply_schema().await,
        }
    }

    pub async fn close(&self) {
        match &self.backend {
            Backend::Embedded(d) => d.close().await,
            Backend::Networked(d) => d.close().await,
        }
    }
}

async fn open_driver<D: BackendDriver>(config: &D::Config) -> Result<D, DbError> {
    info!("Connecting to {}...", D::NAME);
    let driver = D::connect(config).await?;
    if let Err(e) = driver.apply_schema().await {
        driver.close().await;
        return Err(e);
    }
    Ok(driver)
}
