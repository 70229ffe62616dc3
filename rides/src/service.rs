//! Ride service: the operations the presentation layer calls.
//!
//! Every command follows the same shape:
//! 1. Resolve the acting user to a driver or owner profile
//! 2. Load the ride and run the domain operation on a copy
//! 3. Write it back with the version the copy was loaded at
//! 4. On a version conflict, reload and try again
//!
//! A booking that loses the race therefore re-validates its seats against the
//! winner's seat map and fails with a seat conflict instead of overwriting it.

use crate::config::ServiceConfig;
use crate::error::{Result, RideError};
use carpool_core::broker::RideRequestBroker;
use carpool_core::contract::RideContract;
use carpool_core::environment::Clock;
use carpool_core::fleet::{Car, Driver, LicensePlate, Owner};
use carpool_core::ids::{DriverId, RideContractId, RideId, RideRequestId, UserId};
use carpool_core::money::Price;
use carpool_core::pagination::PageRequest;
use carpool_core::rating::{DriverRating, Score};
use carpool_core::repository::{FleetDirectory, RideContractRepository, RideRepository, StoreError};
use carpool_core::request::{RideRequest, RideRequestDraft};
use carpool_core::ride::{Manager, Ride, RideDraft, RideOwner, RideSummary};
use carpool_core::route::{Location, RideDesc, RideRule, RideRules, RideTime, Route};
use carpool_core::seat_map::{BookedSeats, SeatMap};
use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;

/// Input for publishing a ride or proposing one to a driver.
#[derive(Clone, Debug)]
pub struct RideForm {
    /// Plate of the car serving the ride.
    pub license_plate: LicensePlate,
    /// Origin and destination.
    pub route: Route,
    /// Departure.
    pub start: DateTime<Utc>,
    /// Arrival.
    pub end: DateTime<Utc>,
    /// Price of one seat.
    pub price: Price,
    /// Seat layout.
    pub seat_map: SeatMap,
    /// Free text.
    pub description: RideDesc,
    /// Passenger rules.
    pub rules: RideRules,
}

/// An owner's proposal for `driver`.
#[derive(Clone, Debug)]
pub struct ProposalForm {
    /// Target driver.
    pub driver: DriverId,
    /// The ride on offer.
    pub ride: RideForm,
}

#[derive(Clone, Copy, Debug)]
enum Column {
    Status,
    Rules,
}

/// Ride marketplace operations over injected stores, fleet lookups and a
/// request broker.
pub struct RideService<R, C, F, B> {
    rides: R,
    contracts: C,
    fleet: F,
    broker: B,
    clock: Arc<dyn Clock>,
    write_attempts: u32,
}

impl<R, C, F, B> RideService<R, C, F, B>
where
    R: RideRepository,
    C: RideContractRepository,
    F: FleetDirectory,
    B: RideRequestBroker,
{
    /// Wire a service with the default retry budget.
    #[must_use]
    pub fn new(rides: R, contracts: C, fleet: F, broker: B, clock: Arc<dyn Clock>) -> Self {
        Self {
            rides,
            contracts,
            fleet,
            broker,
            clock,
            write_attempts: ServiceConfig::default().write_attempts,
        }
    }

    /// Attempts per ride write before reporting a conflict.
    #[must_use]
    pub fn with_write_attempts(mut self, attempts: u32) -> Self {
        self.write_attempts = attempts.max(1);
        self
    }

    /// The request broker in use.
    #[must_use]
    pub const fn broker(&self) -> &B {
        &self.broker
    }

    // ------------------------------------------------------------------------
    // Rides
    // ------------------------------------------------------------------------

    /// Publish a driver-created ride on the caller's own car.
    ///
    /// The store claims the car and puts the driver on the road in the same
    /// write as the ride, so two rides racing for one car leave one winner.
    ///
    /// # Errors
    ///
    /// - [`RideError::Validation`] for a schedule that is not in the future
    /// - [`RideError::NotFound`] without a driver profile or for an unknown plate
    /// - [`RideError::Forbidden`] if the car belongs to someone else
    /// - [`RideError::StateConflict`] if the car is not idle
    /// - [`RideError::Infrastructure`] if the write fails; nothing is stored then
    pub async fn create_ride(&self, user: UserId, form: RideForm) -> Result<Ride> {
        let now = self.clock.now();
        let schedule = RideTime::new(form.start, form.end, now)?;
        let driver = self.driver_profile(user).await?;
        let car = self.usable_car(user, &form.license_plate).await?;

        let ride = Ride::of(
            RideDraft {
                car: car.id,
                owner: RideOwner::driver(driver.id),
                route: form.route,
                schedule,
                price: form.price,
                seat_map: form.seat_map,
                description: form.description,
                rules: form.rules,
            },
            now,
        );
        self.rides.publish(&ride).await?;

        metrics::counter!("carpool.rides.created").increment(1);
        tracing::info!(
            ride_id = %ride.id(),
            driver_id = %driver.id,
            car_id = %car.id,
            start = %ride.schedule().start(),
            "Ride created"
        );
        Ok(ride)
    }

    /// Reserve `seats` on a ride for `rider`.
    ///
    /// The seat map, fee and contract are written together. If another booking
    /// lands first the ride is reloaded and the seats checked again.
    ///
    /// # Errors
    ///
    /// - [`RideError::NotFound`] for an unknown ride
    /// - [`RideError::Validation`] for an empty or out-of-range batch
    /// - [`RideError::StateConflict`] if any seat is taken or the ride is not pending
    /// - [`RideError::Infrastructure`] if the write fails
    pub async fn book(&self, rider: UserId, ride_id: RideId, seats: BookedSeats) -> Result<RideContract> {
        for attempt in 1..=self.write_attempts {
            let mut ride = self.load(ride_id).await?;
            let contract = ride.book(rider, seats.clone(), self.clock.now()).inspect_err(|e| {
                metrics::counter!("carpool.bookings.rejected").increment(1);
                tracing::debug!(ride_id = %ride_id, rider = %rider, error = %e, "Booking rejected");
            })?;

            match self.rides.update_seats(&ride, &contract).await {
                Ok(_) => {
                    metrics::counter!("carpool.bookings.committed").increment(1);
                    tracing::info!(
                        ride_id = %ride_id,
                        contract_id = %contract.id(),
                        rider = %rider,
                        seats = contract.booked_seats().len(),
                        fee = %ride.fee(),
                        "Booking committed"
                    );
                    return Ok(contract);
                }
                Err(StoreError::ConcurrencyConflict { .. }) => {
                    metrics::counter!("carpool.bookings.conflicted").increment(1);
                    tracing::debug!(ride_id = %ride_id, attempt, "Seat map changed, retrying booking");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(self.exhausted(ride_id))
    }

    /// Add a passenger rule.
    ///
    /// # Errors
    ///
    /// [`RideError::Validation`] past twelve rules, [`RideError::StateConflict`]
    /// once the ride left `PENDING`, [`RideError::Forbidden`] for anyone but
    /// the ride's manager.
    pub async fn add_ride_rule(&self, user: UserId, ride_id: RideId, rule: RideRule) -> Result<Ride> {
        self.change(user, ride_id, Column::Rules, |ride, now| ride.add_ride_rule(rule, now))
            .await
    }

    /// Remove a passenger rule.
    ///
    /// # Errors
    ///
    /// As [`Self::add_ride_rule`], minus the rule limit.
    pub async fn remove_ride_rule(&self, user: UserId, ride_id: RideId, rule: RideRule) -> Result<Ride> {
        self.change(user, ride_id, Column::Rules, |ride, now| {
            ride.remove_ride_rule(rule, now)
        })
        .await
    }

    /// Depart.
    ///
    /// # Errors
    ///
    /// [`RideError::StateConflict`] unless `PENDING`.
    pub async fn start_ride(&self, user: UserId, ride_id: RideId) -> Result<Ride> {
        let ride = self
            .change(user, ride_id, Column::Status, |ride, now| ride.start(now))
            .await?;
        Self::record_transition(&ride);
        Ok(ride)
    }

    /// Cancel a ride nobody booked.
    ///
    /// The status write releases car and driver.
    ///
    /// # Errors
    ///
    /// [`RideError::StateConflict`] unless `PENDING` without contracts.
    pub async fn cancel_ride(&self, user: UserId, ride_id: RideId) -> Result<Ride> {
        let ride = self
            .change(user, ride_id, Column::Status, |ride, now| ride.cancel(now))
            .await?;
        Self::record_transition(&ride);
        Ok(ride)
    }

    /// Arrive.
    ///
    /// The status write releases car and driver and counts the ride for the
    /// driver.
    ///
    /// # Errors
    ///
    /// [`RideError::StateConflict`] unless `ON_THE_ROAD`.
    pub async fn finish_ride(&self, user: UserId, ride_id: RideId) -> Result<Ride> {
        let ride = self
            .change(user, ride_id, Column::Status, |ride, now| ride.finish(now))
            .await?;
        Self::record_transition(&ride);
        Ok(ride)
    }

    // ------------------------------------------------------------------------
    // Owner proposals
    // ------------------------------------------------------------------------

    /// Offer a ride on one of the caller's cars to a specific driver.
    ///
    /// The request lives in the broker for its TTL. With a disabled broker the
    /// proposal is accepted and dropped.
    ///
    /// # Errors
    ///
    /// - [`RideError::Validation`] for a schedule that is not in the future
    /// - [`RideError::NotFound`] without an owner profile, or for an unknown
    ///   plate or driver
    /// - [`RideError::Forbidden`] if the car belongs to someone else
    /// - [`RideError::StateConflict`] if the car or driver is busy
    pub async fn propose_ride(&self, user: UserId, form: ProposalForm) -> Result<RideRequest> {
        let now = self.clock.now();
        let ProposalForm { driver, ride } = form;
        let schedule = RideTime::new(ride.start, ride.end, now)?;

        let owner = self.owner_profile(user).await?;
        let car = self.usable_car(user, &ride.license_plate).await?;
        let driver = self
            .fleet
            .driver(driver)
            .await?
            .ok_or_else(|| RideError::not_found("driver", driver))?;
        if !driver.is_available() {
            return Err(RideError::StateConflict(format!("driver {} is on the road", driver.id)));
        }

        let request = RideRequest::new(
            RideRequestDraft {
                driver: driver.id,
                owner: owner.id,
                license_plate: car.license_plate,
                route: ride.route,
                schedule,
                price: ride.price,
                seat_map: ride.seat_map,
                description: ride.description,
                rules: ride.rules,
            },
            now,
        );
        self.broker.put(driver.id, &request).await?;

        if !self.broker.is_enabled() {
            tracing::warn!(
                request_id = %request.id,
                driver_id = %driver.id,
                "Ride request broker disabled, proposal will not reach the driver"
            );
        }

        metrics::counter!("carpool.requests.proposed").increment(1);
        tracing::info!(
            request_id = %request.id,
            owner_id = %owner.id,
            driver_id = %driver.id,
            "Ride proposed"
        );
        Ok(request)
    }

    /// Live proposals for the calling driver.
    ///
    /// # Errors
    ///
    /// [`RideError::NotFound`] without a driver profile,
    /// [`RideError::Infrastructure`] if the broker fails.
    pub async fn list_incoming_requests(&self, user: UserId) -> Result<Vec<RideRequest>> {
        let driver = self.driver_profile(user).await?;
        Ok(self.broker.list_for(driver.id).await?)
    }

    /// Accept a proposal, creating an owner-created `PENDING` ride.
    ///
    /// The request is claimed atomically; a second accept of the same id,
    /// concurrent or not, gets [`RideError::NotFound`].
    ///
    /// # Errors
    ///
    /// - [`RideError::NotFound`] if the request was taken, expired or never
    ///   addressed to this driver
    /// - [`RideError::Validation`] if the departure has passed meanwhile
    /// - [`RideError::StateConflict`] if the car went on the road meanwhile
    pub async fn accept_request(&self, user: UserId, request_id: RideRequestId) -> Result<Ride> {
        let driver = self.driver_profile(user).await?;
        let request = self
            .broker
            .consume(driver.id, request_id)
            .await?
            .ok_or_else(|| RideError::not_found("ride request", request_id))?;

        let car = self
            .fleet
            .car_by_plate(&request.license_plate)
            .await?
            .ok_or_else(|| RideError::not_found("car", &request.license_plate))?;

        let owner = request.owner;
        let ride = request.into_ride(car.id, self.clock.now())?;
        self.rides.publish(&ride).await?;

        metrics::counter!("carpool.requests.accepted").increment(1);
        tracing::info!(
            request_id = %request_id,
            ride_id = %ride.id(),
            owner_id = %owner,
            driver_id = %driver.id,
            "Ride request accepted"
        );
        Ok(ride)
    }

    // ------------------------------------------------------------------------
    // Rating
    // ------------------------------------------------------------------------

    /// Review the driver of a finished ride the caller travelled on.
    ///
    /// The score is added to the stored counts in place, so concurrent
    /// reviews all count.
    ///
    /// # Errors
    ///
    /// - [`RideError::StateConflict`] unless the ride ended successfully
    /// - [`RideError::Forbidden`] without a contract on the ride, or for the
    ///   driver rating itself
    pub async fn rate_driver(&self, user: UserId, ride_id: RideId, score: Score) -> Result<DriverRating> {
        let ride = self.load(ride_id).await?;
        if !ride.is_finished() {
            return Err(RideError::StateConflict(format!(
                "ride {ride_id} is {}, only finished rides can be rated",
                ride.status()
            )));
        }
        if !self.contracts.exists(user, ride_id).await? {
            return Err(RideError::forbidden(format!("user {user} did not travel on ride {ride_id}")));
        }

        let driver_id = ride.owner().driver;
        let driver = self
            .fleet
            .driver(driver_id)
            .await?
            .ok_or_else(|| RideError::not_found("driver", driver_id))?;
        if driver.user == user {
            return Err(RideError::forbidden("drivers cannot rate themselves"));
        }

        let rating = self.fleet.record_rating(driver_id, score).await?;

        tracing::info!(
            driver_id = %driver_id,
            score = score.value(),
            rating = %rating,
            "Driver rated"
        );
        Ok(rating)
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// A ride by id.
    ///
    /// # Errors
    ///
    /// [`RideError::NotFound`] for an unknown ride.
    pub async fn ride(&self, ride_id: RideId) -> Result<Ride> {
        self.load(ride_id).await
    }

    /// Rides the caller booked, latest departure first.
    ///
    /// # Errors
    ///
    /// [`RideError::Infrastructure`] if the store fails.
    pub async fn rides_for_passenger(&self, user: UserId, page: PageRequest) -> Result<Vec<RideSummary>> {
        Ok(self.rides.page_by_passenger(user, page).await?)
    }

    /// Rides the calling driver drives, latest departure first.
    ///
    /// # Errors
    ///
    /// [`RideError::NotFound`] without a driver profile.
    pub async fn rides_for_driver(&self, user: UserId, page: PageRequest) -> Result<Vec<RideSummary>> {
        let driver = self.driver_profile(user).await?;
        Ok(self.rides.page_by_driver(driver.id, page).await?)
    }

    /// Rides the calling owner created, latest departure first.
    ///
    /// # Errors
    ///
    /// [`RideError::NotFound`] without an owner profile.
    pub async fn rides_for_owner(&self, user: UserId, page: PageRequest) -> Result<Vec<RideSummary>> {
        let owner = self.owner_profile(user).await?;
        Ok(self.rides.page_by_owner(owner.id, page).await?)
    }

    /// Pending rides departing on `date`.
    ///
    /// # Errors
    ///
    /// [`RideError::Infrastructure`] if the store fails.
    pub async fn rides_on(&self, date: NaiveDate, page: PageRequest) -> Result<Vec<RideSummary>> {
        Ok(self.rides.page_by_date(date, page).await?)
    }

    /// Pending rides near both `from` and `to`, departing on or after `date`.
    ///
    /// # Errors
    ///
    /// [`RideError::Infrastructure`] if the store fails.
    pub async fn search(
        &self,
        from: &Location,
        to: &Location,
        date: NaiveDate,
        page: PageRequest,
    ) -> Result<Vec<RideSummary>> {
        Ok(self.rides.page_nearby(from, to, date, page).await?)
    }

    /// One of the caller's contracts.
    ///
    /// # Errors
    ///
    /// [`RideError::NotFound`] for an unknown id, [`RideError::Forbidden`] for
    /// someone else's contract.
    pub async fn contract(&self, user: UserId, contract_id: RideContractId) -> Result<RideContract> {
        let contract = self
            .contracts
            .find_by(contract_id)
            .await?
            .ok_or_else(|| RideError::not_found("contract", contract_id))?;
        if contract.rider() != user {
            return Err(RideError::forbidden(format!("contract {contract_id} belongs to another rider")));
        }
        Ok(contract)
    }

    /// Contracts on a ride, in booking order.
    ///
    /// The ride's manager sees all of them; anyone else only when every
    /// contract on the page is theirs.
    ///
    /// # Errors
    ///
    /// [`RideError::NotFound`] for an unknown ride, [`RideError::Forbidden`]
    /// otherwise.
    pub async fn contracts_for_ride(
        &self,
        user: UserId,
        ride_id: RideId,
        page: PageRequest,
    ) -> Result<Vec<RideContract>> {
        let ride = self.load(ride_id).await?;
        let contracts = self.contracts.page_by_ride(ride_id, page).await?;

        if self.manages(user, &ride).await? || contracts.iter().all(|c| c.rider() == user) {
            Ok(contracts)
        } else {
            Err(RideError::forbidden(format!("user {user} cannot view contracts of ride {ride_id}")))
        }
    }

    /// The caller's contracts, in booking order.
    ///
    /// # Errors
    ///
    /// [`RideError::Infrastructure`] if the store fails.
    pub async fn contracts_for_user(&self, user: UserId, page: PageRequest) -> Result<Vec<RideContract>> {
        Ok(self.contracts.page_by_user(user, page).await?)
    }

    /// Drivers an owner could propose a ride to.
    ///
    /// # Errors
    ///
    /// [`RideError::NotFound`] without an owner profile.
    pub async fn available_drivers(&self, user: UserId, page: PageRequest) -> Result<Vec<Driver>> {
        self.owner_profile(user).await?;
        Ok(self.fleet.available_drivers(page).await?)
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    async fn load(&self, ride_id: RideId) -> Result<Ride> {
        self.rides
            .find_by(ride_id)
            .await?
            .ok_or_else(|| RideError::not_found("ride", ride_id))
    }

    async fn driver_profile(&self, user: UserId) -> Result<Driver> {
        self.fleet
            .driver_of(user)
            .await?
            .ok_or_else(|| RideError::not_found("driver profile of user", user))
    }

    async fn owner_profile(&self, user: UserId) -> Result<Owner> {
        self.fleet
            .owner_of(user)
            .await?
            .ok_or_else(|| RideError::not_found("owner profile of user", user))
    }

    async fn usable_car(&self, user: UserId, plate: &LicensePlate) -> Result<Car> {
        let car = self
            .fleet
            .car_by_plate(plate)
            .await?
            .ok_or_else(|| RideError::not_found("car", plate))?;
        if !car.is_owned_by(user) {
            return Err(RideError::forbidden(format!("car {plate} belongs to another user")));
        }
        if !car.is_available() {
            return Err(RideError::StateConflict(format!("car {plate} is unavailable")));
        }
        Ok(car)
    }

    /// The role `user` acts in on `ride`: owner for owner-created rides when
    /// the user has an owner profile, driver otherwise.
    async fn manager_for(&self, user: UserId, ride: &Ride) -> Result<Manager> {
        if ride.is_owner_created() {
            if let Some(owner) = self.fleet.owner_of(user).await? {
                return Ok(Manager::Owner(owner.id));
            }
        }
        match self.fleet.driver_of(user).await? {
            Some(driver) => Ok(Manager::Driver(driver.id)),
            None => Err(RideError::forbidden(format!("user {user} cannot manage ride {}", ride.id()))),
        }
    }

    async fn manages(&self, user: UserId, ride: &Ride) -> Result<bool> {
        match self.manager_for(user, ride).await {
            Ok(manager) => Ok(ride.authorize(manager).is_ok()),
            Err(RideError::Forbidden(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Load, authorize, apply and write back with retries on version conflicts.
    async fn change<Op>(&self, user: UserId, ride_id: RideId, column: Column, mut apply: Op) -> Result<Ride>
    where
        Op: FnMut(&mut Ride, DateTime<Utc>) -> carpool_core::error::Result<()> + Send,
    {
        let mut manager = None;

        for attempt in 1..=self.write_attempts {
            let mut ride = self.load(ride_id).await?;
            let acting = match manager {
                Some(acting) => acting,
                None => {
                    let acting = self.manager_for(user, &ride).await?;
                    manager = Some(acting);
                    acting
                }
            };
            ride.authorize(acting)?;
            apply(&mut ride, self.clock.now())?;

            let written = match column {
                Column::Status => self.rides.update_status(&ride).await,
                Column::Rules => self.rides.update_rules(&ride).await,
            };
            match written {
                Ok(version) => {
                    ride.set_version(version);
                    return Ok(ride);
                }
                Err(StoreError::ConcurrencyConflict { .. }) => {
                    tracing::debug!(ride_id = %ride_id, attempt, ?column, "Ride changed, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(self.exhausted(ride_id))
    }

    fn exhausted(&self, ride_id: RideId) -> RideError {
        metrics::counter!("carpool.rides.write_retries_exhausted").increment(1);
        tracing::warn!(ride_id = %ride_id, attempts = self.write_attempts, "Ride write kept conflicting");
        RideError::StateConflict(format!(
            "ride {ride_id} changed concurrently, gave up after {} attempts",
            self.write_attempts
        ))
    }

    fn record_transition(ride: &Ride) {
        metrics::counter!("carpool.rides.transitions", "status" => ride.status().as_str()).increment(1);
        tracing::info!(ride_id = %ride.id(), status = %ride.status(), "Ride status changed");
    }
}
