//! Redis implementation of [`RideRequestBroker`].

use carpool_core::broker::{BrokerError, RideRequestBroker, driver_index_key, request_key};
use carpool_core::ids::{DriverId, RideRequestId};
use carpool_core::request::{REQUEST_TTL_SECS, RideRequest};
use chrono::Utc;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};

/// Redis-backed ride request broker.
///
/// Provides:
/// - Expiry via the entry TTL (default 300 seconds)
/// - Single-use claims via GETDEL
/// - Per-driver isolation through the key layout
/// - Connection pooling via `ConnectionManager`
#[derive(Clone)]
pub struct RedisRideRequestBroker {
    conn_manager: ConnectionManager,
    ttl_secs: u64,
}

fn connection_error(e: &redis::RedisError) -> BrokerError {
    BrokerError::Connection(e.to_string())
}

impl RedisRideRequestBroker {
    /// Connect to Redis with the default request TTL.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::Connection`] if Redis cannot be reached.
    pub async fn new(redis_url: &str) -> Result<Self, BrokerError> {
        Self::with_ttl(redis_url, REQUEST_TTL_SECS).await
    }

    /// Connect to Redis, keeping requests for `ttl_secs`.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::Connection`] if Redis cannot be reached.
    pub async fn with_ttl(redis_url: &str, ttl_secs: u64) -> Result<Self, BrokerError> {
        let client = Client::open(redis_url).map_err(|e| {
            BrokerError::Connection(format!("Failed to create Redis client: {e}"))
        })?;

        let conn_manager = ConnectionManager::new(client).await.map_err(|e| {
            BrokerError::Connection(format!("Failed to create Redis connection manager: {e}"))
        })?;

        Ok(Self {
            conn_manager,
            ttl_secs: ttl_secs.max(1),
        })
    }

    /// Request TTL in seconds.
    #[must_use]
    pub const fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    fn decode(payload: &str) -> Result<RideRequest, BrokerError> {
        serde_json::from_str(payload).map_err(|e| BrokerError::Serialization(e.to_string()))
    }
}

impl RideRequestBroker for RedisRideRequestBroker {
    fn is_enabled(&self) -> bool {
        true
    }

    async fn put(&self, driver: DriverId, request: &RideRequest) -> Result<(), BrokerError> {
        let mut conn = self.conn_manager.clone();
        let key = request_key(driver, request.id);
        let index = driver_index_key(driver);

        let payload =
            serde_json::to_string(request).map_err(|e| BrokerError::Serialization(e.to_string()))?;

        // Every put refreshes the index TTL, so the index outlives its entries.
        let index_ttl = i64::try_from(self.ttl_secs).unwrap_or(i64::MAX);

        let _: () = redis::pipe()
            .atomic()
            .set_ex(&key, payload, self.ttl_secs)
            .ignore()
            .sadd(&index, request.id.to_string())
            .ignore()
            .expire(&index, index_ttl)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(|e| connection_error(&e))?;

        metrics::counter!("carpool.redis.requests_stored").increment(1);
        tracing::info!(
            driver_id = %driver,
            request_id = %request.id,
            ttl_seconds = self.ttl_secs,
            "Stored ride request in Redis"
        );
        Ok(())
    }

    async fn list_for(&self, driver: DriverId) -> Result<Vec<RideRequest>, BrokerError> {
        let mut conn = self.conn_manager.clone();
        let index = driver_index_key(driver);

        let ids: Vec<String> = conn.smembers(&index).await.map_err(|e| connection_error(&e))?;

        let now = Utc::now();
        let mut live = Vec::with_capacity(ids.len());
        let mut dead = 0_usize;

        for id in ids {
            let payload: Option<String> = conn
                .get(format!("{index}:{id}"))
                .await
                .map_err(|e| connection_error(&e))?;

            match payload {
                Some(payload) => {
                    let request = Self::decode(&payload)?;
                    if !request.is_expired(self.ttl_secs, now) {
                        live.push(request);
                    }
                }
                None => {
                    // Expired or already consumed
                    let _: () = conn
                        .srem(&index, &id)
                        .await
                        .map_err(|e| {
                            tracing::warn!(
                                driver_id = %driver,
                                request_id = %id,
                                error = %e,
                                "Failed to clean up dead ride request reference"
                            );
                            e
                        })
                        .unwrap_or(());
                    dead += 1;
                }
            }
        }

        if dead > 0 {
            tracing::debug!(
                driver_id = %driver,
                dead_count = dead,
                live_count = live.len(),
                "Cleaned up dead ride request references"
            );
        }

        live.sort_by_key(|request| request.created_at);
        Ok(live)
    }

    async fn consume(
        &self,
        driver: DriverId,
        id: RideRequestId,
    ) -> Result<Option<RideRequest>, BrokerError> {
        let mut conn = self.conn_manager.clone();
        let key = request_key(driver, id);

        // GETDEL: only one caller ever sees the payload
        let payload: Option<String> = conn.get_del(&key).await.map_err(|e| connection_error(&e))?;

        let Some(payload) = payload else {
            return Ok(None);
        };

        // The entry is gone already; a stale index member is dropped by the
        // next listing.
        if let Err(e) = conn
            .srem::<_, _, ()>(driver_index_key(driver), id.to_string())
            .await
        {
            tracing::warn!(
                driver_id = %driver,
                request_id = %id,
                error = %e,
                "Failed to remove consumed ride request from the driver index"
            );
        }

        let request = Self::decode(&payload)?;

        if request.driver != driver {
            tracing::error!(
                expected = %driver,
                actual = %request.driver,
                "Ride request stored under the wrong driver"
            );
            return Ok(None);
        }

        if request.is_expired(self.ttl_secs, Utc::now()) {
            tracing::warn!(request_id = %id, "Ride request outlived its TTL");
            return Ok(None);
        }

        metrics::counter!("carpool.redis.requests_consumed").increment(1);
        tracing::info!(driver_id = %driver, request_id = %id, "Consumed ride request");
        Ok(Some(request))
    }
}
