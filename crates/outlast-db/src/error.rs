//! Error types for the storage adapters.
//!
//! Adapter failures are reported as [`DbError`] and converted into the
//! engine-facing [`PortError`] at the repository boundary.

use outlast_types::PortError;

/// Errors that can occur in the data layer.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A `PostgreSQL` operation failed.
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// A `PostgreSQL` migration failed.
    #[error("PostgreSQL migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization or deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored column held a value the domain does not know.
    #[error("Decode error: {0}")]
    Decode(String),

    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<DbError> for PortError {
    fn from(err: DbError) -> Self {
        match &err {
            DbError::Postgres(sqlx::Error::RowNotFound) => Self::NotFound,
            DbError::Postgres(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Self::Conflict
            }
            _ => Self::Backend(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_not_found_maps_to_not_found() {
        let err = PortError::from(DbError::Postgres(sqlx::Error::RowNotFound));
        assert_eq!(err, PortError::NotFound);
    }

    #[test]
    fn other_errors_become_backend() {
        let err = PortError::from(DbError::Decode("object kind: spaceship".into()));
        assert_eq!(
            err,
            PortError::Backend("Decode error: object kind: spaceship".into())
        );
    }
}
