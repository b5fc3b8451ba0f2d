//! Persistence layer over SQLite and PostgreSQL.
//!
//! This module provides:
//! - Placeholder translation between the two dialects
//! - The embedded and networked backend drivers, each applying its own schema
//! - The `Database` adapter every caller goes through

pub mod adapter;
pub mod driver;
pub mod embedded;
pub mod error;
pub mod networked;
pub mod placeholders;
pub mod value;

pub use adapter::Database;
pub use error::DbError;
pub use placeholders::{translate, Dialect};
pub use value::{Row, RunResult, SqlParam};
