//! Booking records.

use crate::error::Result;
use crate::ids::{RideContractId, RideId, UserId};
use crate::money::Price;
use crate::seat_map::BookedSeats;
use serde::{Deserialize, Serialize};

/// Immutable record of a rider's booking on a ride.
///
/// The total is derived from the per-seat price, never stored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RideContract {
    id: RideContractId,
    rider: UserId,
    ride: RideId,
    price_per_seat: Price,
    booked_seats: BookedSeats,
}

impl RideContract {
    /// New contract for a booking.
    #[must_use]
    pub fn new(rider: UserId, ride: RideId, price_per_seat: Price, booked_seats: BookedSeats) -> Self {
        Self::restore(RideContractId::new(), rider, ride, price_per_seat, booked_seats)
    }

    /// Rebuild a stored contract.
    #[must_use]
    pub const fn restore(
        id: RideContractId,
        rider: UserId,
        ride: RideId,
        price_per_seat: Price,
        booked_seats: BookedSeats,
    ) -> Self {
        Self {
            id,
            rider,
            ride,
            price_per_seat,
            booked_seats,
        }
    }

    /// `price_per_seat * seat count`.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the product overflows.
    pub fn total_price(&self) -> Result<Price> {
        self.price_per_seat.times(self.booked_seats.len())
    }

    /// Whether seat `index` belongs to this booking.
    #[must_use]
    pub fn has_seat(&self, index: usize) -> bool {
        self.booked_seats.contains_index(index)
    }

    /// Identity.
    #[must_use]
    pub const fn id(&self) -> RideContractId {
        self.id
    }

    /// Booking rider.
    #[must_use]
    pub const fn rider(&self) -> UserId {
        self.rider
    }

    /// Booked ride.
    #[must_use]
    pub const fn ride(&self) -> RideId {
        self.ride
    }

    /// Price of one seat at booking time.
    #[must_use]
    pub const fn price_per_seat(&self) -> Price {
        self.price_per_seat
    }

    /// Copy of the booked seats.
    #[must_use]
    pub fn booked_seats(&self) -> BookedSeats {
        self.booked_seats.clone()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Tests can unwrap
mod tests {
    use super::*;
    use crate::seat_map::{PassengerSeat, SeatStatus};
    use rust_decimal::Decimal;

    #[test]
    fn total_and_membership() {
        let seats = BookedSeats::new(vec![
            PassengerSeat::new(1, SeatStatus::ChildOccupied).unwrap(),
            PassengerSeat::new(3, SeatStatus::FemaleOccupied).unwrap(),
        ])
        .unwrap();
        let contract = RideContract::new(
            UserId::new(),
            RideId::new(),
            Price::new(Decimal::new(750, 2)).unwrap(),
            seats,
        );

        assert_eq!(contract.total_price().unwrap().amount(), Decimal::new(1500, 2));
        assert!(contract.has_seat(3));
        assert!(!contract.has_seat(2));
    }
}
