//! The ride aggregate.
//!
//! A [`Ride`] owns its seat map and rule set and only changes through its own
//! operations. Status moves along
//!
//! ```text
//! PENDING ──start──▶ ON_THE_ROAD ──finish──▶ ENDED_SUCCESSFULLY
//!    │
//!    └──cancel──▶ CANCELED
//! ```
//!
//! Booking, rule edits and cancellation are only legal while `PENDING`.
//! The `version` field is a persistence concern: repositories compare it on
//! every write and bump it on success.

use crate::contract::RideContract;
use crate::error::{DomainError, Result};
use crate::fleet::status_strings;
use crate::ids::{CarId, DriverId, OwnerId, RideId, UserId};
use crate::money::{Fee, Price};
use crate::route::{Location, RideDesc, RideRule, RideRules, RideTime, Route};
use crate::seat_map::{BookedSeats, SeatMap};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Supporting types
// ============================================================================

/// Lifecycle status of a ride.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RideStatus {
    /// Published, accepting bookings.
    Pending,
    /// Under way.
    OnTheRoad,
    /// Completed.
    EndedSuccessfully,
    /// Called off before departure.
    Canceled,
}

status_strings!(RideStatus {
    Pending => "PENDING",
    OnTheRoad => "ON_THE_ROAD",
    EndedSuccessfully => "ENDED_SUCCESSFULLY",
    Canceled => "CANCELED",
});

/// Who runs the ride. A missing owner marks a driver-initiated ride.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RideOwner {
    /// Driving account.
    pub driver: DriverId,
    /// Fleet owner who proposed the ride, if any.
    pub owner: Option<OwnerId>,
}

impl RideOwner {
    /// Ride created by the driver.
    #[must_use]
    pub const fn driver(driver: DriverId) -> Self {
        Self {
            driver,
            owner: None,
        }
    }

    /// Ride created by a fleet owner for `driver`.
    #[must_use]
    pub const fn owned(driver: DriverId, owner: OwnerId) -> Self {
        Self {
            driver,
            owner: Some(owner),
        }
    }
}

/// Actor attempting to mutate a ride.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Manager {
    /// Acting as a driver.
    Driver(DriverId),
    /// Acting as a fleet owner.
    Owner(OwnerId),
}

/// Creation and last-modification timestamps.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dates {
    /// When the ride was created.
    pub created_at: DateTime<Utc>,
    /// Last mutation.
    pub last_updated: DateTime<Utc>,
}

impl Dates {
    /// Both timestamps set to `now`.
    #[must_use]
    pub const fn at(now: DateTime<Utc>) -> Self {
        Self {
            created_at: now,
            last_updated: now,
        }
    }

    const fn touch(&mut self, now: DateTime<Utc>) {
        self.last_updated = now;
    }
}

/// Everything needed to publish a ride.
#[derive(Clone, Debug)]
pub struct RideDraft {
    /// Car serving the ride.
    pub car: CarId,
    /// Driver and optional owner.
    pub owner: RideOwner,
    /// Origin and destination.
    pub route: Route,
    /// Departure and arrival.
    pub schedule: RideTime,
    /// Price of one seat.
    pub price: Price,
    /// Initial seat layout.
    pub seat_map: SeatMap,
    /// Free text.
    pub description: RideDesc,
    /// Passenger rules.
    pub rules: RideRules,
}

/// A ride as stored, used to rebuild the aggregate.
#[derive(Clone, Debug)]
pub struct RideParts {
    /// Identity.
    pub id: RideId,
    /// Car serving the ride.
    pub car: CarId,
    /// Driver and optional owner.
    pub owner: RideOwner,
    /// Origin and destination.
    pub route: Route,
    /// Departure and arrival.
    pub schedule: RideTime,
    /// Price of one seat.
    pub price: Price,
    /// Current seat layout.
    pub seat_map: SeatMap,
    /// Lifecycle status.
    pub status: RideStatus,
    /// Free text.
    pub description: RideDesc,
    /// Passenger rules.
    pub rules: RideRules,
    /// Timestamps.
    pub dates: Dates,
    /// Whether any booking exists.
    pub has_active_contract: bool,
    /// Fee of the latest booking.
    pub fee: Fee,
    /// Stored version.
    pub version: i64,
}

// ============================================================================
// Ride
// ============================================================================

/// The ride aggregate root.
#[derive(Clone, Debug, PartialEq)]
pub struct Ride {
    id: RideId,
    car: CarId,
    owner: RideOwner,
    route: Route,
    schedule: RideTime,
    price: Price,
    seat_map: SeatMap,
    status: RideStatus,
    description: RideDesc,
    rules: RideRules,
    dates: Dates,
    has_active_contract: bool,
    fee: Fee,
    version: i64,
}

impl Ride {
    /// Publish a new `PENDING` ride.
    #[must_use]
    pub fn of(draft: RideDraft, now: DateTime<Utc>) -> Self {
        Self {
            id: RideId::new(),
            car: draft.car,
            owner: draft.owner,
            route: draft.route,
            schedule: draft.schedule,
            price: draft.price,
            seat_map: draft.seat_map,
            status: RideStatus::Pending,
            description: draft.description,
            rules: draft.rules,
            dates: Dates::at(now),
            has_active_contract: false,
            fee: Fee::zero(),
            version: 0,
        }
    }

    /// Rebuild a stored ride.
    #[must_use]
    pub fn restore(parts: RideParts) -> Self {
        Self {
            id: parts.id,
            car: parts.car,
            owner: parts.owner,
            route: parts.route,
            schedule: parts.schedule,
            price: parts.price,
            seat_map: parts.seat_map,
            status: parts.status,
            description: parts.description,
            rules: parts.rules,
            dates: parts.dates,
            has_active_contract: parts.has_active_contract,
            fee: parts.fee,
            version: parts.version,
        }
    }

    // ------------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------------

    /// Depart.
    ///
    /// # Errors
    ///
    /// [`DomainError::InvalidTransition`] unless `PENDING`.
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.require(RideStatus::Pending, "start")?;
        self.status = RideStatus::OnTheRoad;
        self.dates.touch(now);
        Ok(())
    }

    /// Call the ride off.
    ///
    /// # Errors
    ///
    /// [`DomainError::ActiveContracts`] once anyone has booked, otherwise
    /// [`DomainError::InvalidTransition`] unless `PENDING`.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.has_active_contract {
            return Err(DomainError::ActiveContracts);
        }
        self.require(RideStatus::Pending, "cancel")?;
        self.status = RideStatus::Canceled;
        self.dates.touch(now);
        Ok(())
    }

    /// Arrive.
    ///
    /// # Errors
    ///
    /// [`DomainError::InvalidTransition`] unless `ON_THE_ROAD`.
    pub fn finish(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.require(RideStatus::OnTheRoad, "finish")?;
        self.status = RideStatus::EndedSuccessfully;
        self.dates.touch(now);
        Ok(())
    }

    /// Add a passenger rule.
    ///
    /// # Errors
    ///
    /// [`DomainError::InvalidTransition`] unless `PENDING`, or
    /// [`DomainError::TooManyRules`] if the set would exceed 12.
    pub fn add_ride_rule(&mut self, rule: RideRule, now: DateTime<Utc>) -> Result<()> {
        self.require(RideStatus::Pending, "add a rule to")?;
        self.rules = self.rules.with(rule)?;
        self.dates.touch(now);
        Ok(())
    }

    /// Remove a passenger rule.
    ///
    /// # Errors
    ///
    /// [`DomainError::InvalidTransition`] unless `PENDING`.
    pub fn remove_ride_rule(&mut self, rule: RideRule, now: DateTime<Utc>) -> Result<()> {
        self.require(RideStatus::Pending, "remove a rule from")?;
        self.rules = self.rules.without(rule);
        self.dates.touch(now);
        Ok(())
    }

    /// Reserve `seats` for `rider`.
    ///
    /// All seats are occupied on a working copy of the seat map; the ride is
    /// only changed if every seat succeeds. The fee is replaced by 2% of this
    /// booking's total.
    ///
    /// # Errors
    ///
    /// A validation error for an empty batch or an invalid seat,
    /// [`DomainError::InvalidTransition`] unless `PENDING`, and
    /// [`DomainError::SeatUnavailable`] if any seat is taken.
    pub fn book(
        &mut self,
        rider: UserId,
        seats: BookedSeats,
        now: DateTime<Utc>,
    ) -> Result<RideContract> {
        self.require(RideStatus::Pending, "book")?;
        if seats.is_empty() {
            return Err(DomainError::invalid("booked seats", "at least one seat is required"));
        }

        let mut seat_map = self.seat_map.clone();
        let mut total = Price::zero();
        for seat in seats.iter() {
            seat_map = seat_map.occupy(seat.index(), seat.status())?;
            total = total.checked_add(self.price)?;
        }

        self.seat_map = seat_map;
        self.fee = Fee::for_booking(total);
        self.has_active_contract = true;
        self.dates.touch(now);

        Ok(RideContract::new(rider, self.id, self.price, seats))
    }

    fn require(&self, expected: RideStatus, operation: &'static str) -> Result<()> {
        if self.status == expected {
            Ok(())
        } else {
            Err(DomainError::InvalidTransition {
                operation,
                status: self.status,
            })
        }
    }

    // ------------------------------------------------------------------------
    // Authorization
    // ------------------------------------------------------------------------

    /// Check that `manager` may mutate this ride.
    ///
    /// A driver manages only its own driver-created rides; an owner manages
    /// only the rides it created.
    ///
    /// # Errors
    ///
    /// [`DomainError::NotRideManager`] otherwise.
    pub fn authorize(&self, manager: Manager) -> Result<()> {
        let allowed = match manager {
            Manager::Driver(driver) => driver == self.owner.driver && !self.is_owner_created(),
            Manager::Owner(owner) => self.owner.owner == Some(owner),
        };
        if allowed {
            Ok(())
        } else {
            Err(DomainError::NotRideManager)
        }
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Whether bookings and rule edits are allowed.
    #[must_use]
    pub fn is_modifiable(&self) -> bool {
        self.status == RideStatus::Pending
    }

    /// Pending or on the road.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self.status, RideStatus::Pending | RideStatus::OnTheRoad)
    }

    /// Ended successfully.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.status == RideStatus::EndedSuccessfully
    }

    /// Whether `rule` is set.
    #[must_use]
    pub fn has_rule(&self, rule: RideRule) -> bool {
        self.rules.contains(rule)
    }

    /// Pending with at least one empty seat.
    #[must_use]
    pub fn can_accept_passenger(&self) -> bool {
        self.is_modifiable() && self.seat_map.has_available_seats()
    }

    /// Whether a fleet owner created the ride.
    #[must_use]
    pub const fn is_owner_created(&self) -> bool {
        self.owner.owner.is_some()
    }

    /// Identity.
    #[must_use]
    pub const fn id(&self) -> RideId {
        self.id
    }

    /// Car serving the ride.
    #[must_use]
    pub const fn car(&self) -> CarId {
        self.car
    }

    /// Driver and optional owner.
    #[must_use]
    pub const fn owner(&self) -> RideOwner {
        self.owner
    }

    /// Origin and destination.
    #[must_use]
    pub const fn route(&self) -> &Route {
        &self.route
    }

    /// Departure and arrival.
    #[must_use]
    pub const fn schedule(&self) -> RideTime {
        self.schedule
    }

    /// Price of one seat.
    #[must_use]
    pub const fn price(&self) -> Price {
        self.price
    }

    /// Copy of the current seat map.
    #[must_use]
    pub fn seat_map(&self) -> SeatMap {
        self.seat_map.clone()
    }

    /// Lifecycle status.
    #[must_use]
    pub const fn status(&self) -> RideStatus {
        self.status
    }

    /// Free text.
    #[must_use]
    pub const fn description(&self) -> &RideDesc {
        &self.description
    }

    /// Copy of the rule set.
    #[must_use]
    pub fn rules(&self) -> RideRules {
        self.rules.clone()
    }

    /// Timestamps.
    #[must_use]
    pub const fn dates(&self) -> Dates {
        self.dates
    }

    /// Whether anyone has booked.
    #[must_use]
    pub const fn has_active_contract(&self) -> bool {
        self.has_active_contract
    }

    /// Fee of the latest booking.
    #[must_use]
    pub const fn fee(&self) -> Fee {
        self.fee
    }

    /// Stored version this instance was read at.
    #[must_use]
    pub const fn version(&self) -> i64 {
        self.version
    }

    /// Set the version after a successful write.
    pub const fn set_version(&mut self, version: i64) {
        self.version = version;
    }
}

/// List projection of a ride.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RideSummary {
    /// Identity.
    pub id: RideId,
    /// Driving account.
    pub driver: DriverId,
    /// Proposing owner, if any.
    pub owner: Option<OwnerId>,
    /// Origin.
    pub from: Location,
    /// Destination.
    pub to: Location,
    /// Departure.
    pub start: DateTime<Utc>,
    /// Arrival.
    pub end: DateTime<Utc>,
    /// Price of one seat.
    pub price: Price,
    /// Lifecycle status.
    pub status: RideStatus,
    /// Whether a seat is still free.
    pub has_available_seats: bool,
}

impl From<&Ride> for RideSummary {
    fn from(ride: &Ride) -> Self {
        Self {
            id: ride.id,
            driver: ride.owner.driver,
            owner: ride.owner.owner,
            from: ride.route.from().clone(),
            to: ride.route.to().clone(),
            start: ride.schedule.start(),
            end: ride.schedule.end(),
            price: ride.price,
            status: ride.status,
            has_available_seats: ride.seat_map.has_available_seats(),
        }
    }
}
