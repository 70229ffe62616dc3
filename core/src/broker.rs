//! Ride request broker.
//!
//! A broker holds owner-to-driver proposals for a bounded window and lets each
//! one be claimed at most once.
//!
//! # Properties
//!
//! 1. **Single-use**: [`RideRequestBroker::consume`] is one atomic operation;
//!    two concurrent calls for the same id never both see the request
//! 2. **Expiration**: proposals vanish after their TTL
//! 3. **Isolation**: proposals are keyed per driver
//!
//! # Degraded mode
//!
//! When the backing store is not available the [`DisabledRideRequestBroker`]
//! stands in: it accepts puts, lists nothing and never finds anything. This
//! is a legal operating mode, not an error.

use crate::ids::{DriverId, RideRequestId};
use crate::request::RideRequest;
use std::future::Future;
use thiserror::Error;

/// Errors raised by a broker backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    /// Backend I/O failure.
    #[error("Broker connection error: {0}")]
    Connection(String),

    /// Stored payload could not be encoded or decoded.
    #[error("Broker serialization error: {0}")]
    Serialization(String),
}

/// Time-boxed store of ride requests.
pub trait RideRequestBroker: Send + Sync {
    /// Whether a real backend is wired in.
    fn is_enabled(&self) -> bool;

    /// Store `request` for `driver` for the broker's TTL.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError`] if the backend fails.
    fn put(
        &self,
        driver: DriverId,
        request: &RideRequest,
    ) -> impl Future<Output = Result<(), BrokerError>> + Send;

    /// Every live request targeting `driver`.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError`] if the backend fails.
    fn list_for(
        &self,
        driver: DriverId,
    ) -> impl Future<Output = Result<Vec<RideRequest>, BrokerError>> + Send;

    /// Atomically take request `id` for `driver`.
    ///
    /// Returns `None` if it was already taken, expired or never existed.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError`] if the backend fails.
    fn consume(
        &self,
        driver: DriverId,
        id: RideRequestId,
    ) -> impl Future<Output = Result<Option<RideRequest>, BrokerError>> + Send;
}

/// No-op broker used when no ephemeral store is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledRideRequestBroker;

impl RideRequestBroker for DisabledRideRequestBroker {
    fn is_enabled(&self) -> bool {
        false
    }

    async fn put(&self, _driver: DriverId, _request: &RideRequest) -> Result<(), BrokerError> {
        Ok(())
    }

    async fn list_for(&self, _driver: DriverId) -> Result<Vec<RideRequest>, BrokerError> {
        Ok(Vec::new())
    }

    async fn consume(
        &self,
        _driver: DriverId,
        _id: RideRequestId,
    ) -> Result<Option<RideRequest>, BrokerError> {
        Ok(None)
    }
}

/// Redis-style key of one request.
#[must_use]
pub fn request_key(driver: DriverId, id: RideRequestId) -> String {
    format!("ride_request:{driver}:{id}")
}

/// Redis-style key of a driver's request index.
#[must_use]
pub fn driver_index_key(driver: DriverId) -> String {
    format!("ride_request:{driver}")
}
