use thiserror::Error;

/// Failures raised by the persistence layer.
///
/// `Connection` and `Schema` only occur while a backend is being constructed;
/// `Query` is raised per statement and carries the driver error as its source.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("invalid database configuration: {0}")]
    Configuration(String),
    #[error("could not connect to database: {0}")]
    Connection(#[source] sqlx::Error),
    #[error("could not apply database schema: {0}")]
    Schema(#[source] sqlx::Error),
    #[error("database query failed: {0}")]
    Query(#[source] sqlx::Error),
}

impl DbError {
    /// Whether this error came from backend construction rather than a
    /// single statement.
    pub fn is_construction_failure(&self) -> bool {
        !matches!(self, DbError::Query(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_query_error_preserves_cause() {
        let err = DbError::Query(sqlx::Error::RowNotFound);
        assert!(err.source().is_some());
        assert!(err.to_string().starts_with("database query failed"));
        assert!(!err.is_construction_failure());
    }

    #[test]
    fn test_construction_failures() {
        assert!(DbError::Configuration("bad url".into()).is_construction_failure());
        assert!(DbError::Connection(sqlx::Error::PoolTimedOut).is_construction_failure());
        assert!(DbError::Schema(sqlx::Error::PoolClosed).is_construction_failure());
    }
}
