//! Concierge Database Crate
//!
//! Connection management, the embedded migration set, and helpers for classifying
//! constraint failures raised by SQLite.

use concierge_config::DatabaseConfig;
use sqlx::SqlitePool;
use thiserror::Error;

pub mod connection;
pub mod migrations;

pub use connection::prepare_database;
pub use migrations::{run_migrations, MIGRATOR};

/// Re-export commonly used types for convenience
pub use sqlx::Pool;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Database connection error: {0}")]
    ConnectionError(String),

    #[error("Database migration error: {0}")]
    MigrationError(String),
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Initialize the database with migrations
pub async fn initialize_database(config: &DatabaseConfig) -> DatabaseResult<SqlitePool> {
    let pool = prepare_database(config)
        .await
        .map_err(|e| DatabaseError::ConnectionError(format!("{e:#}")))?;

    run_migrations(&pool)
        .await
        .map_err(|e| DatabaseError::MigrationError(format!("{e:#}")))?;

    Ok(pool)
}

/// True when the error is a UNIQUE or PRIMARY KEY constraint failure.
pub fn is_unique_violation(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Database(db) => db.is_unique_violation(),
        _ => false,
    }
}

/// True when the error is a FOREIGN KEY constraint failure.
pub fn is_foreign_key_violation(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Database(db) => db.is_foreign_key_violation(),
        _ => false,
    }
}
