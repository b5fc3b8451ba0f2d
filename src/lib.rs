pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod gate;
pub mod seed;

pub use config::Config;
pub use db::{Database, DbError, Dialect, Row, RunResult, SqlParam};
pub use error::AppError;
pub use gate::{Connector, GateError, GateStatus, InitGate};
