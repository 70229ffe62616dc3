//! Cars, drivers and owners as seen by the ride subsystem.
//!
//! These are resolved through the fleet directory to authorize actors. Only
//! the status and rating changes a ride causes are modelled here.

use crate::error::{DomainError, Result};
use crate::ids::{CarId, DriverId, OwnerId, UserId};
use crate::rating::{DriverRating, Score};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Vehicle registration plate: 3 to 12 of `A-Z`, `0-9`, `-`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LicensePlate(String);

impl LicensePlate {
    /// Create a plate.
    ///
    /// # Errors
    ///
    /// Returns a validation error on length or character set.
    pub fn new(plate: impl Into<String>) -> Result<Self> {
        let plate = plate.into();
        if !(3..=12).contains(&plate.len()) {
            return Err(DomainError::invalid("license plate", "must be 3 to 12 characters"));
        }
        if !plate
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(DomainError::invalid(
                "license plate",
                "only A-Z, 0-9 and '-' are allowed",
            ));
        }
        Ok(Self(plate))
    }

    /// Plate text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for LicensePlate {
    type Error = DomainError;

    fn try_from(plate: String) -> Result<Self> {
        Self::new(plate)
    }
}

impl From<LicensePlate> for String {
    fn from(plate: LicensePlate) -> Self {
        plate.0
    }
}

impl fmt::Display for LicensePlate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

macro_rules! status_strings {
    ($ty:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            /// Stored representation.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }

            /// Parse the stored representation.
            ///
            /// # Errors
            ///
            /// Returns a validation error for an unknown value.
            pub fn parse(s: &str) -> $crate::error::Result<Self> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err($crate::error::DomainError::invalid(
                        stringify!($ty),
                        format!("unknown value {other}"),
                    )),
                }
            }
        }

        impl ::std::fmt::Display for $ty {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

pub(crate) use status_strings;

// ============================================================================
// Car
// ============================================================================

/// Availability of a car.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CarStatus {
    /// Parked and free.
    Idle,
    /// Serving a ride.
    OnTheRoad,
    /// Out of service.
    Unavailable,
}

status_strings!(CarStatus {
    Idle => "IDLE",
    OnTheRoad => "ON_THE_ROAD",
    Unavailable => "UNAVAILABLE",
});

/// A registered car.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Car {
    /// Identity.
    pub id: CarId,
    /// User who owns the car.
    pub owner: UserId,
    /// Registration plate.
    pub license_plate: LicensePlate,
    /// Current availability.
    pub status: CarStatus,
}

impl Car {
    /// Register an idle car.
    #[must_use]
    pub fn new(owner: UserId, license_plate: LicensePlate) -> Self {
        Self {
            id: CarId::new(),
            owner,
            license_plate,
            status: CarStatus::Idle,
        }
    }

    /// Whether the car can be assigned a ride: only an idle car can.
    #[must_use]
    pub const fn is_available(&self) -> bool {
        matches!(self.status, CarStatus::Idle)
    }

    /// Whether `user` owns this car.
    #[must_use]
    pub fn is_owned_by(&self, user: UserId) -> bool {
        self.owner == user
    }

    /// Mark the car as serving a ride.
    pub const fn start_trip(&mut self) {
        self.status = CarStatus::OnTheRoad;
    }

    /// Return the car to idle if it was on the road.
    pub fn end_trip(&mut self) {
        if self.status == CarStatus::OnTheRoad {
            self.status = CarStatus::Idle;
        }
    }
}

// ============================================================================
// Driver / Owner
// ============================================================================

/// Availability of a driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DriverStatus {
    /// Free to take a ride.
    Available,
    /// Driving.
    OnTheRoad,
}

status_strings!(DriverStatus {
    Available => "AVAILABLE",
    OnTheRoad => "ON_THE_ROAD",
});

/// A registered driver.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Driver {
    /// Identity.
    pub id: DriverId,
    /// Account behind the driver profile.
    pub user: UserId,
    /// Current availability.
    pub status: DriverStatus,
    /// Completed rides.
    pub total_rides: u32,
    /// Passenger reviews.
    pub rating: DriverRating,
}

impl Driver {
    /// Register an available, unrated driver.
    #[must_use]
    pub fn new(user: UserId) -> Self {
        Self {
            id: DriverId::new(),
            user,
            status: DriverStatus::Available,
            total_rides: 0,
            rating: DriverRating::Unrated,
        }
    }

    /// Whether the driver can accept a proposal.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.status == DriverStatus::Available
    }

    /// Mark the driver as driving.
    pub const fn start_ride(&mut self) {
        self.status = DriverStatus::OnTheRoad;
    }

    /// Release the driver after a finished ride.
    pub const fn finish_ride(&mut self) {
        self.status = DriverStatus::Available;
        self.total_rides = self.total_rides.saturating_add(1);
    }

    /// Release the driver without counting a ride.
    pub const fn release(&mut self) {
        self.status = DriverStatus::Available;
    }

    /// Record a passenger review.
    pub const fn rate(&mut self, score: Score) {
        self.rating = self.rating.rate(score);
    }
}

/// A registered fleet owner.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Owner {
    /// Identity.
    pub id: OwnerId,
    /// Account behind the owner profile.
    pub user: UserId,
}

impl Owner {
    /// Register an owner.
    #[must_use]
    pub fn new(user: UserId) -> Self {
        Self {
            id: OwnerId::new(),
            user,
        }
    }
}
