//! Persistence and fleet lookup traits.
//!
//! # Implementations
//!
//! - `PostgresRideRepository`, `PostgresRideContractRepository` and
//!   `PostgresFleetDirectory` (in `carpool-postgres`): production
//! - `InMemoryRideStore` and `InMemoryFleetDirectory` (in `carpool-testing`):
//!   fast, deterministic tests
//!
//! # Optimistic concurrency
//!
//! Every ride write carries the version the ride was read at
//! ([`Ride::version`]). A store applies the write only if the stored version
//! still matches, bumps it, and otherwise fails with
//! [`StoreError::ConcurrencyConflict`]. The caller reloads and retries.
//!
//! # Fleet side effects
//!
//! A ride holds its car and driver for as long as it is active. The ride
//! store therefore claims them when a ride is published
//! ([`RideRepository::publish`]) and hands them back when a status write moves
//! the ride to a terminal state, in the same unit of work as the ride row.
//! Counters on the driver row are only ever incremented in place.

use crate::contract::RideContract;
use crate::fleet::{Car, Driver, LicensePlate, Owner};
use crate::ids::{CarId, DriverId, OwnerId, RideContractId, RideId, UserId};
use crate::pagination::PageRequest;
use crate::rating::{DriverRating, Score};
use crate::ride::{Ride, RideSummary};
use crate::route::Location;
use chrono::NaiveDate;
use std::future::Future;
use thiserror::Error;

/// Squared-degree radius used by proximity search.
pub const NEARBY_DISTANCE_SQUARED: f64 = 25.0;

/// Errors raised by stores.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The ride changed since it was read.
    #[error("Concurrency conflict on ride {ride}: expected version {expected}")]
    ConcurrencyConflict {
        /// Ride being written.
        ride: RideId,
        /// Version the writer read.
        expected: i64,
    },

    /// The car is already serving a ride or was taken off the road.
    #[error("Car {0} is not idle")]
    CarUnavailable(CarId),

    /// The row to update does not exist.
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Database failure.
    #[error("Database error: {0}")]
    Database(String),

    /// A stored value could not be decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Backing service unreachable.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Ride persistence.
pub trait RideRepository: Send + Sync {
    /// Insert a ride row as is, without touching the fleet.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on failure.
    fn save(&self, ride: &Ride) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Insert a new ride and put its car and driver on the road, all or
    /// nothing.
    ///
    /// The car is claimed only if it is idle, so two rides can never be
    /// published on one car.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::CarUnavailable`] if the car is not idle,
    /// [`StoreError::NotFound`] for an unknown car or driver, and
    /// [`StoreError::Database`] on failure. Nothing is written on error.
    fn publish(&self, ride: &Ride) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Load a ride by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] or [`StoreError::Serialization`].
    fn find_by(&self, id: RideId) -> impl Future<Output = Result<Option<Ride>, StoreError>> + Send;

    /// Persist a booking: the ride's seat map, fee and contract flag, plus
    /// the contract row, as one unit.
    ///
    /// Returns the ride's new version.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ConcurrencyConflict`] if the ride moved on.
    fn update_seats(
        &self,
        ride: &Ride,
        contract: &RideContract,
    ) -> impl Future<Output = Result<i64, StoreError>> + Send;

    /// Persist a status transition. Returns the new version.
    ///
    /// Moving to `CANCELED` or `ENDED_SUCCESSFULLY` also sets the car back to
    /// idle and the driver to available in the same unit of work; a finished
    /// ride adds one to the driver's ride count.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ConcurrencyConflict`] if the ride moved on.
    fn update_status(&self, ride: &Ride) -> impl Future<Output = Result<i64, StoreError>> + Send;

    /// Persist a rule change. Returns the new version.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ConcurrencyConflict`] if the ride moved on.
    fn update_rules(&self, ride: &Ride) -> impl Future<Output = Result<i64, StoreError>> + Send;

    /// Rides `user` holds a contract on, newest departure first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on failure.
    fn page_by_passenger(
        &self,
        user: UserId,
        page: PageRequest,
    ) -> impl Future<Output = Result<Vec<RideSummary>, StoreError>> + Send;

    /// Rides run by `driver`, newest departure first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on failure.
    fn page_by_driver(
        &self,
        driver: DriverId,
        page: PageRequest,
    ) -> impl Future<Output = Result<Vec<RideSummary>, StoreError>> + Send;

    /// Rides created by `owner`, newest departure first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on failure.
    fn page_by_owner(
        &self,
        owner: OwnerId,
        page: PageRequest,
    ) -> impl Future<Output = Result<Vec<RideSummary>, StoreError>> + Send;

    /// Pending rides departing on `date`, earliest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on failure.
    fn page_by_date(
        &self,
        date: NaiveDate,
        page: PageRequest,
    ) -> impl Future<Output = Result<Vec<RideSummary>, StoreError>> + Send;

    /// Pending rides departing on or after `date` whose both ends lie within
    /// [`NEARBY_DISTANCE_SQUARED`] of `from` and `to`, earliest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on failure.
    fn page_nearby(
        &self,
        from: &Location,
        to: &Location,
        date: NaiveDate,
        page: PageRequest,
    ) -> impl Future<Output = Result<Vec<RideSummary>, StoreError>> + Send;
}

/// Contract persistence.
pub trait RideContractRepository: Send + Sync {
    /// Insert a contract.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on failure.
    fn save(&self, contract: &RideContract) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Load a contract by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] or [`StoreError::Serialization`].
    fn find_by(
        &self,
        id: RideContractId,
    ) -> impl Future<Output = Result<Option<RideContract>, StoreError>> + Send;

    /// Contracts on a ride.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on failure.
    fn page_by_ride(
        &self,
        ride: RideId,
        page: PageRequest,
    ) -> impl Future<Output = Result<Vec<RideContract>, StoreError>> + Send;

    /// Contracts held by a rider.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on failure.
    fn page_by_user(
        &self,
        user: UserId,
        page: PageRequest,
    ) -> impl Future<Output = Result<Vec<RideContract>, StoreError>> + Send;

    /// Whether `user` booked `ride`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on failure.
    fn exists(&self, user: UserId, ride: RideId) -> impl Future<Output = Result<bool, StoreError>> + Send;
}

/// Car, driver and owner lookups.
pub trait FleetDirectory: Send + Sync {
    /// Driver profile of `user`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on failure.
    fn driver_of(&self, user: UserId) -> impl Future<Output = Result<Option<Driver>, StoreError>> + Send;

    /// Driver by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on failure.
    fn driver(&self, id: DriverId) -> impl Future<Output = Result<Option<Driver>, StoreError>> + Send;

    /// Owner profile of `user`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on failure.
    fn owner_of(&self, user: UserId) -> impl Future<Output = Result<Option<Owner>, StoreError>> + Send;

    /// Car by registration plate.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on failure.
    fn car_by_plate(
        &self,
        plate: &LicensePlate,
    ) -> impl Future<Output = Result<Option<Car>, StoreError>> + Send;

    /// Car by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on failure.
    fn car(&self, id: CarId) -> impl Future<Output = Result<Option<Car>, StoreError>> + Send;

    /// Available drivers, for owners picking a proposal target.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on failure.
    fn available_drivers(
        &self,
        page: PageRequest,
    ) -> impl Future<Output = Result<Vec<Driver>, StoreError>> + Send;

    /// Add one review to a driver's rating in place and return the result.
    ///
    /// Concurrent reviews all count; nothing else on the driver is written.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for an unknown driver.
    fn record_rating(
        &self,
        driver: DriverId,
        score: Score,
    ) -> impl Future<Output = Result<DriverRating, StoreError>> + Send;
}

/// Squared planar distance in degrees between two locations.
#[must_use]
pub fn distance_squared(a: &Location, b: &Location) -> f64 {
    let dlat = a.latitude() - b.latitude();
    let dlon = a.longitude() - b.longitude();
    dlat.mul_add(dlat, dlon * dlon)
}
