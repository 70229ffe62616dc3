//! Ready-made domain values.
//!
//! Schedules are placed relative to the given clock so they are always valid
//! "future" departures.

#![allow(clippy::unwrap_used)] // Fixtures: invalid hardcoded values are a test failure

use carpool_core::environment::Clock;
use carpool_core::fleet::LicensePlate;
use carpool_core::ids::{CarId, DriverId};
use carpool_core::money::Price;
use carpool_core::ride::{Ride, RideDraft, RideOwner};
use carpool_core::route::{Location, RideDesc, RideRules, RideTime, Route};
use carpool_core::seat_map::{BookedSeats, PassengerSeat, SeatMap, SeatStatus};
use chrono::Duration;
use rust_decimal::Decimal;

/// Baku city centre.
#[must_use]
pub fn baku() -> Location {
    Location::new("Baku", 40.4093, 49.8671).unwrap()
}

/// Ganja city centre.
#[must_use]
pub fn ganja() -> Location {
    Location::new("Ganja", 40.6828, 46.3606).unwrap()
}

/// Baku to Ganja.
#[must_use]
pub fn route() -> Route {
    Route::new(baku(), ganja()).unwrap()
}

/// Departure in two hours, arrival in six.
#[must_use]
pub fn schedule(clock: &impl Clock) -> RideTime {
    let now = clock.now();
    RideTime::new(now + Duration::hours(2), now + Duration::hours(6), now).unwrap()
}

/// Price from cents.
#[must_use]
pub fn price(cents: i64) -> Price {
    Price::new(Decimal::new(cents, 2)).unwrap()
}

/// A plate.
#[must_use]
pub fn plate() -> LicensePlate {
    LicensePlate::new("10-AZ-777").unwrap()
}

/// `[[DRIVER, EMPTY], [EMPTY, EMPTY]]`
#[must_use]
pub fn two_by_two() -> SeatMap {
    SeatMap::of_empty(2, 2).unwrap()
}

/// Male passengers on `indexes`.
#[must_use]
pub fn seats(indexes: &[usize]) -> BookedSeats {
    BookedSeats::new(
        indexes
            .iter()
            .map(|i| PassengerSeat::new(*i, SeatStatus::MaleOccupied).unwrap())
            .collect(),
    )
    .unwrap()
}

/// Driver-created draft on a 2x2 map at 10.00 per seat.
#[must_use]
pub fn draft(clock: &impl Clock, owner: RideOwner) -> RideDraft {
    RideDraft {
        car: CarId::new(),
        owner,
        route: route(),
        schedule: schedule(clock),
        price: price(1000),
        seat_map: two_by_two(),
        description: RideDesc::new("Fixture ride").unwrap(),
        rules: RideRules::default(),
    }
}

/// Pending driver-created ride from [`draft`].
#[must_use]
pub fn ride(clock: &impl Clock) -> Ride {
    Ride::of(draft(clock, RideOwner::driver(DriverId::new())), clock.now())
}
