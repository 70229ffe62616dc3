//! Owner-to-driver ride proposals.
//!
//! A [`RideRequest`] is never persisted with the rides. It lives in a broker
//! until the target driver accepts it or its time window runs out.

use crate::error::Result;
use crate::fleet::LicensePlate;
use crate::ids::{CarId, DriverId, OwnerId, RideRequestId};
use crate::money::Price;
use crate::ride::{Ride, RideDraft, RideOwner};
use crate::route::{RideDesc, RideRules, RideTime, Route};
use crate::seat_map::SeatMap;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// How long a proposal stays claimable, in seconds.
pub const REQUEST_TTL_SECS: u64 = 300;

/// An owner's proposal for a specific driver to run a ride.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RideRequest {
    /// Identity.
    pub id: RideRequestId,
    /// Target driver.
    pub driver: DriverId,
    /// Proposing owner.
    pub owner: OwnerId,
    /// Car the owner offers.
    pub license_plate: LicensePlate,
    /// Origin and destination.
    pub route: Route,
    /// Departure and arrival.
    pub schedule: RideTime,
    /// Price of one seat.
    pub price: Price,
    /// Seat layout.
    pub seat_map: SeatMap,
    /// Free text.
    pub description: RideDesc,
    /// Passenger rules.
    pub rules: RideRules,
    /// When the proposal was made.
    pub created_at: DateTime<Utc>,
}

/// Input for a proposal; identity and creation time are assigned.
#[derive(Clone, Debug)]
pub struct RideRequestDraft {
    /// Target driver.
    pub driver: DriverId,
    /// Proposing owner.
    pub owner: OwnerId,
    /// Car the owner offers.
    pub license_plate: LicensePlate,
    /// Origin and destination.
    pub route: Route,
    /// Departure and arrival.
    pub schedule: RideTime,
    /// Price of one seat.
    pub price: Price,
    /// Seat layout.
    pub seat_map: SeatMap,
    /// Free text.
    pub description: RideDesc,
    /// Passenger rules.
    pub rules: RideRules,
}

impl RideRequest {
    /// Make a proposal at `now`.
    #[must_use]
    pub fn new(draft: RideRequestDraft, now: DateTime<Utc>) -> Self {
        Self {
            id: RideRequestId::new(),
            driver: draft.driver,
            owner: draft.owner,
            license_plate: draft.license_plate,
            route: draft.route,
            schedule: draft.schedule,
            price: draft.price,
            seat_map: draft.seat_map,
            description: draft.description,
            rules: draft.rules,
            created_at: now,
        }
    }

    /// Whether the proposal is past its window of `ttl_secs` at `now`.
    #[must_use]
    pub fn is_expired(&self, ttl_secs: u64, now: DateTime<Utc>) -> bool {
        let ttl = i64::try_from(ttl_secs).unwrap_or(i64::MAX);
        now >= self.created_at + Duration::seconds(ttl)
    }

    /// Turn an accepted proposal into an owner-created ride served by `car`.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the departure is no longer in the future.
    pub fn into_ride(self, car: CarId, now: DateTime<Utc>) -> Result<Ride> {
        let schedule = RideTime::new(self.schedule.start(), self.schedule.end(), now)?;
        Ok(Ride::of(
            RideDraft {
                car,
                owner: RideOwner::owned(self.driver, self.owner),
                route: self.route,
                schedule,
                price: self.price,
                seat_map: self.seat_map,
                description: self.description,
                rules: self.rules,
            },
            now,
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Tests can unwrap
mod tests {
    use super::*;
    use crate::ride::RideStatus;
    use crate::route::Location;
    use chrono::TimeZone;
    use rust_decimal::Decimal;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap()
    }

    fn request() -> RideRequest {
        RideRequest::new(
            RideRequestDraft {
                driver: DriverId::new(),
                owner: OwnerId::new(),
                license_plate: LicensePlate::new("AA-100").unwrap(),
                route: Route::new(
                    Location::new("A", 1.0, 1.0).unwrap(),
                    Location::new("B", 1.5, 1.5).unwrap(),
                )
                .unwrap(),
                schedule: RideTime::new(
                    now() + Duration::minutes(30),
                    now() + Duration::hours(2),
                    now(),
                )
                .unwrap(),
                price: Price::new(Decimal::new(500, 2)).unwrap(),
                seat_map: SeatMap::of_empty(2, 2).unwrap(),
                description: RideDesc::default(),
                rules: RideRules::default(),
            },
            now(),
        )
    }

    #[test]
    fn expiry_window() {
        let request = request();
        assert!(!request.is_expired(REQUEST_TTL_SECS, now() + Duration::seconds(299)));
        assert!(request.is_expired(REQUEST_TTL_SECS, now() + Duration::seconds(300)));
    }

    #[test]
    fn accepted_request_becomes_owner_created_ride() {
        let request = request();
        let (driver, owner) = (request.driver, request.owner);
        let car = CarId::new();
        let ride = request.into_ride(car, now() + Duration::minutes(1)).unwrap();

        assert_eq!(ride.status(), RideStatus::Pending);
        assert_eq!(ride.owner(), RideOwner::owned(driver, owner));
        assert_eq!(ride.car(), car);
        assert!(ride.is_owner_created());
    }

    #[test]
    fn stale_departure_cannot_be_accepted() {
        let request = request();
        assert!(request.into_ride(CarId::new(), now() + Duration::hours(1)).is_err());
    }

    #[test]
    fn json_round_trip_preserves_request() {
        let request = request();
        let json = serde_json::to_string(&request).unwrap();
        let back: RideRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, request);
    }
}
