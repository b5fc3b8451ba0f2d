//! How the gate obtains a database.

use crate::config::DbConfig;
use crate::db::{Database, DbError};
use async_trait::async_trait;
use std::fmt;

/// Builds a ready-to-use `Database`, including schema setup.
///
/// The gate calls `connect` at most once per attempt and never retries on its
/// own.
#[async_trait]
pub trait Connector: Send + Sync + fmt::Debug {
    async fn connect(&self) -> Result<Database, DbError>;
}

/// The production connector: opens whichever backend the configuration names.
#[async_trait]
impl Connector for DbConfig {
    async fn connect(&self) -> Result<Database, DbError> {
        Database::open(self).await
    }
}
