//! Capability interface shared by the concrete backends.

use super::{DbError, Dialect, Row, RunResult, SqlParam};
use async_trait::async_trait;

/// A concrete SQL backend owning its physical connection resource.
///
/// Statements handed to `exec_read`/`exec_write` are already in the driver's
/// dialect. Drivers never retry; connection and DDL failures are terminal for
/// the construction attempt.
#[async_trait]
pub trait BackendDriver: Send + Sync + Sized {
    /// Settings needed to open the connection resource.
    type Config: Sync;

    /// Marker style this driver expects.
    const DIALECT: Dialect;

    /// Human-readable engine name used in logs.
    const NAME: &'static str;

    /// Open the connection resource and verify the backend is reachable.
    async fn connect(config: &Self::Config) -> Result<Self, DbError>;

    /// Create the four relations if they do not exist yet. Idempotent.
    async fn apply_schema(&self) -> Result<(), DbError>;

    /// Run a statement and collect every row it yields.
    async fn exec_read(&self, sql: &str, params: &[SqlParam]) -> Result<Vec<Row>, sqlx::Error>;

    /// Run a statement for its effect.
    async fn exec_write(&self, sql: &str, params: &[SqlParam]) -> Result<RunResult, sqlx::Error>;

    /// Release the connection resource.
    async fn close(&self);
}
