//! `PostgreSQL` persistence for the carpool ride marketplace.
//!
//! This crate implements the provider traits from `carpool-core`:
//!
//! - [`PostgresRideRepository`]: rides with optimistic version checks
//! - [`PostgresRideContractRepository`]: booking contracts
//! - [`PostgresFleetDirectory`]: car, driver and owner lookups
//!
//! Seat maps, booked seats and rules are stored as JSONB and re-validated on
//! read. Money is `NUMERIC`.
//!
//! # Example
//!
//! ```no_run
//! use carpool_postgres::{PostgresRideRepository, migrate};
//! use sqlx::PgPool;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = PgPool::connect("postgres://localhost/carpool").await?;
//! migrate(&pool).await?;
//! let rides = PostgresRideRepository::new(pool);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod contracts;
mod fleet;
mod rides;

pub use contracts::PostgresRideContractRepository;
pub use fleet::PostgresFleetDirectory;
pub use rides::PostgresRideRepository;

use carpool_core::repository::StoreError;
use sqlx::PgPool;

/// Run the embedded schema migrations.
///
/// # Errors
///
/// Returns [`StoreError::Database`] if a migration fails.
pub async fn migrate(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| StoreError::Database(format!("Migration failed: {e}")))?;
    tracing::info!("Database migrations applied");
    Ok(())
}

/// Map a driver error, treating connection loss as unavailability.
pub(crate) fn db_error(e: sqlx::Error) -> StoreError {
    match e {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Unavailable(e.to_string())
        }
        other => StoreError::Database(other.to_string()),
    }
}

/// Map a stored value that failed domain validation.
pub(crate) fn decode_error(e: impl std::fmt::Display) -> StoreError {
    StoreError::Serialization(e.to_string())
}

