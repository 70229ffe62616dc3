//! Resource management for infrastructure setup.
//!
//! Centralizes connecting to `PostgreSQL` (with migrations) and Redis, and
//! wiring them into a [`RideService`].
//!
//! # Example
//!
//! ```rust,ignore
//! let config = Config::from_env();
//! let resources = Resources::from_config(&config).await?;
//! let service = resources.ride_service();
//! ```

use crate::config::{Config, PostgresConfig, RedisConfig};
use crate::error::{Result, RideError};
use crate::service::RideService;
use carpool_core::broker::{BrokerError, DisabledRideRequestBroker, RideRequestBroker};
use carpool_core::environment::{Clock, SystemClock};
use carpool_core::ids::{DriverId, RideRequestId};
use carpool_core::request::RideRequest;
use carpool_postgres::{
    PostgresFleetDirectory, PostgresRideContractRepository, PostgresRideRepository, migrate,
};
use carpool_redis::RedisRideRequestBroker;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Ride service over `PostgreSQL` and the configured broker.
pub type PgRideService = RideService<
    PostgresRideRepository,
    PostgresRideContractRepository,
    PostgresFleetDirectory,
    ConfiguredBroker,
>;

/// The broker chosen at startup.
///
/// Falls back to [`DisabledRideRequestBroker`] when Redis is switched off or
/// unreachable; proposals are then accepted and dropped.
#[derive(Clone)]
pub enum ConfiguredBroker {
    /// Redis-backed.
    Redis(RedisRideRequestBroker),
    /// Degraded mode.
    Disabled(DisabledRideRequestBroker),
}

impl ConfiguredBroker {
    /// Connect according to `config`.
    pub async fn connect(config: &RedisConfig) -> Self {
        if !config.enabled {
            warn!("Redis disabled by configuration, ride requests run in degraded mode");
            metrics::counter!("carpool.broker.degraded").increment(1);
            return Self::Disabled(DisabledRideRequestBroker);
        }

        match RedisRideRequestBroker::with_ttl(&config.url, config.request_ttl_secs).await {
            Ok(broker) => {
                info!(ttl_seconds = broker.ttl_secs(), "Ride request broker connected to Redis");
                Self::Redis(broker)
            }
            Err(e) => {
                warn!(error = %e, "Redis unreachable, ride requests run in degraded mode");
                metrics::counter!("carpool.broker.degraded").increment(1);
                Self::Disabled(DisabledRideRequestBroker)
            }
        }
    }
}

impl RideRequestBroker for ConfiguredBroker {
    fn is_enabled(&self) -> bool {
        match self {
            Self::Redis(broker) => broker.is_enabled(),
            Self::Disabled(broker) => broker.is_enabled(),
        }
    }

    async fn put(&self, driver: DriverId, request: &RideRequest) -> std::result::Result<(), BrokerError> {
        match self {
            Self::Redis(broker) => broker.put(driver, request).await,
            Self::Disabled(broker) => broker.put(driver, request).await,
        }
    }

    async fn list_for(&self, driver: DriverId) -> std::result::Result<Vec<RideRequest>, BrokerError> {
        match self {
            Self::Redis(broker) => broker.list_for(driver).await,
            Self::Disabled(broker) => broker.list_for(driver).await,
        }
    }

    async fn consume(
        &self,
        driver: DriverId,
        id: RideRequestId,
    ) -> std::result::Result<Option<RideRequest>, BrokerError> {
        match self {
            Self::Redis(broker) => broker.consume(driver, id).await,
            Self::Disabled(broker) => broker.consume(driver, id).await,
        }
    }
}

/// Connect a pool sized by `config`.
///
/// # Errors
///
/// [`RideError::Infrastructure`] if the database cannot be reached.
pub async fn connect_pool(config: &PostgresConfig) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout))
        .connect(&config.url)
        .await
        .map_err(|e| RideError::Infrastructure(format!("Failed to connect to PostgreSQL: {e}")))
}

/// All infrastructure the ride service needs.
#[derive(Clone)]
pub struct Resources {
    /// Application configuration
    pub config: Arc<Config>,
    /// System clock for timestamps
    pub clock: Arc<dyn Clock>,
    /// Ride database
    pub pool: PgPool,
    /// Request broker
    pub broker: ConfiguredBroker,
}

impl Resources {
    /// Connect to `PostgreSQL`, run migrations and pick a broker.
    ///
    /// # Errors
    ///
    /// [`RideError::Infrastructure`] if the database is unreachable or a
    /// migration fails. An unreachable Redis is not an error.
    pub async fn from_config(config: &Config) -> Result<Self> {
        info!("Connecting to ride database...");
        let pool = connect_pool(&config.postgres).await?;

        info!("Running ride migrations...");
        migrate(&pool).await?;

        let broker = ConfiguredBroker::connect(&config.redis).await;

        Ok(Self {
            config: Arc::new(config.clone()),
            clock: Arc::new(SystemClock),
            pool,
            broker,
        })
    }

    /// Build the ride service over these resources.
    #[must_use]
    pub fn ride_service(&self) -> PgRideService {
        RideService::new(
            PostgresRideRepository::new(self.pool.clone()),
            PostgresRideContractRepository::new(self.pool.clone()),
            PostgresFleetDirectory::new(self.pool.clone()),
            self.broker.clone(),
            Arc::clone(&self.clock),
        )
        .with_write_attempts(self.config.service.write_attempts)
    }
}
