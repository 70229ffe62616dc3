//! Seat layout and occupancy rules.
//!
//! A [`SeatMap`] is an immutable rectangular grid stored as a flat vector plus
//! a row stride. Seats are addressed by a linear index `row * columns + col`.
//! Index 0 is always the driver seat.
//!
//! Every construction path goes through the same validation, including the
//! new map produced by [`SeatMap::occupy`] and deserialization.

use crate::error::{DomainError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Smallest legal number of seats (driver plus one).
pub const MIN_SEATS: usize = 2;
/// Largest legal number of seats.
pub const MAX_SEATS: usize = 64;
/// Widest legal row.
pub const MAX_COLUMNS: usize = 4;

/// State of a single seat.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatStatus {
    /// Free seat.
    Empty,
    /// The driver seat.
    Driver,
    /// Taken by an adult male passenger.
    MaleOccupied,
    /// Taken by an adult female passenger.
    FemaleOccupied,
    /// Taken by a child.
    ChildOccupied,
}

impl SeatStatus {
    /// Whether this status is a passenger occupancy.
    #[must_use]
    pub const fn is_occupied(self) -> bool {
        matches!(
            self,
            Self::MaleOccupied | Self::FemaleOccupied | Self::ChildOccupied
        )
    }
}

/// Validated seat grid.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<SeatStatus>>", into = "Vec<Vec<SeatStatus>>")]
pub struct SeatMap {
    seats: Vec<SeatStatus>,
    columns: usize,
}

impl SeatMap {
    /// Build an all-empty grid with the driver seat at `(0, 0)`.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `rows * cols` is outside `[2, 64]` or
    /// `cols` exceeds 4.
    pub fn of_empty(rows: usize, cols: usize) -> Result<Self> {
        let total = rows
            .checked_mul(cols)
            .ok_or_else(|| DomainError::invalid("seat map", "dimensions out of range"))?;
        if !(MIN_SEATS..=MAX_SEATS).contains(&total) {
            return Err(DomainError::invalid(
                "seat map",
                format!("seat count must be between {MIN_SEATS} and {MAX_SEATS}"),
            ));
        }
        let mut seats = vec![SeatStatus::Empty; total];
        seats[0] = SeatStatus::Driver;
        Self::from_flat(seats, cols)
    }

    /// Build a grid from explicit rows.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the grid is empty or jagged, has a row
    /// wider than 4, a total outside `[2, 64]`, a non-driver seat at `(0, 0)`
    /// or a second driver seat.
    pub fn from_rows(rows: Vec<Vec<SeatStatus>>) -> Result<Self> {
        let columns = rows.first().map_or(0, Vec::len);
        if columns == 0 {
            return Err(DomainError::invalid("seat map", "must not be empty"));
        }
        if rows.iter().any(|row| row.len() != columns) {
            return Err(DomainError::invalid("seat map", "all rows must have the same width"));
        }
        Self::from_flat(rows.into_iter().flatten().collect(), columns)
    }

    fn from_flat(seats: Vec<SeatStatus>, columns: usize) -> Result<Self> {
        if columns == 0 || columns > MAX_COLUMNS {
            return Err(DomainError::invalid(
                "seat map",
                format!("rows must have between 1 and {MAX_COLUMNS} seats"),
            ));
        }
        if !(MIN_SEATS..=MAX_SEATS).contains(&seats.len()) {
            return Err(DomainError::invalid(
                "seat map",
                format!("seat count must be between {MIN_SEATS} and {MAX_SEATS}"),
            ));
        }
        if seats.first() != Some(&SeatStatus::Driver) {
            return Err(DomainError::invalid("seat map", "seat 0 must be the driver seat"));
        }
        if seats.iter().skip(1).any(|s| *s == SeatStatus::Driver) {
            return Err(DomainError::invalid("seat map", "only one driver seat is allowed"));
        }
        Ok(Self { seats, columns })
    }

    /// Return a new map with seat `index` taken by `occupant`.
    ///
    /// # Errors
    ///
    /// Fails with a validation error for the driver seat, an out of range
    /// index or a non-passenger status, and with
    /// [`DomainError::SeatUnavailable`] if the seat is not empty.
    pub fn occupy(&self, index: usize, occupant: SeatStatus) -> Result<Self> {
        if index == 0 {
            return Err(DomainError::invalid("seat index", "the driver seat cannot be booked"));
        }
        if !occupant.is_occupied() {
            return Err(DomainError::invalid(
                "seat status",
                "occupant must be a passenger status",
            ));
        }
        match self.seats.get(index) {
            None => Err(DomainError::invalid(
                "seat index",
                format!("{index} is outside a map of {} seats", self.seats.len()),
            )),
            Some(SeatStatus::Empty) => {
                let mut seats = self.seats.clone();
                seats[index] = occupant;
                Self::from_flat(seats, self.columns)
            }
            Some(_) => Err(DomainError::SeatUnavailable { index }),
        }
    }

    /// Status of seat `index`.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `index` is out of range.
    pub fn status(&self, index: usize) -> Result<SeatStatus> {
        self.seats.get(index).copied().ok_or_else(|| {
            DomainError::invalid(
                "seat index",
                format!("{index} is outside a map of {} seats", self.seats.len()),
            )
        })
    }

    /// Status at `(row, col)`, if inside the grid.
    #[must_use]
    pub fn status_at(&self, row: usize, col: usize) -> Option<SeatStatus> {
        if col >= self.columns {
            return None;
        }
        self.seats.get(row * self.columns + col).copied()
    }

    /// Whether seat `index` exists and is empty.
    #[must_use]
    pub fn is_available(&self, index: usize) -> bool {
        self.seats.get(index) == Some(&SeatStatus::Empty)
    }

    /// Whether any seat is still empty.
    #[must_use]
    pub fn has_available_seats(&self) -> bool {
        self.seats.contains(&SeatStatus::Empty)
    }

    /// Indexes of seats taken by passengers.
    #[must_use]
    pub fn occupied_indexes(&self) -> Vec<usize> {
        self.seats
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_occupied())
            .map(|(i, _)| i)
            .collect()
    }

    /// Total number of seats, driver included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.seats.len()
    }

    /// Always false: a valid map has at least two seats.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seats.is_empty()
    }

    /// Number of rows.
    #[must_use]
    pub fn rows(&self) -> usize {
        self.seats.len() / self.columns
    }

    /// Seats per row.
    #[must_use]
    pub const fn columns(&self) -> usize {
        self.columns
    }

    /// Copy of the grid as rows.
    #[must_use]
    pub fn to_rows(&self) -> Vec<Vec<SeatStatus>> {
        self.seats.chunks(self.columns).map(<[SeatStatus]>::to_vec).collect()
    }
}

impl TryFrom<Vec<Vec<SeatStatus>>> for SeatMap {
    type Error = DomainError;

    fn try_from(rows: Vec<Vec<SeatStatus>>) -> Result<Self> {
        Self::from_rows(rows)
    }
}

impl From<SeatMap> for Vec<Vec<SeatStatus>> {
    fn from(map: SeatMap) -> Self {
        map.to_rows()
    }
}

/// A single seat requested by a rider.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawPassengerSeat")]
pub struct PassengerSeat {
    index: usize,
    status: SeatStatus,
}

#[derive(Deserialize)]
struct RawPassengerSeat {
    index: usize,
    status: SeatStatus,
}

impl PassengerSeat {
    /// Create a passenger seat.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `status` is not a passenger occupancy.
    pub fn new(index: usize, status: SeatStatus) -> Result<Self> {
        if !status.is_occupied() {
            return Err(DomainError::invalid(
                "seat status",
                "occupant must be a passenger status",
            ));
        }
        Ok(Self { index, status })
    }

    /// Linear seat index.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Occupant status.
    #[must_use]
    pub const fn status(&self) -> SeatStatus {
        self.status
    }
}

impl TryFrom<RawPassengerSeat> for PassengerSeat {
    type Error = DomainError;

    fn try_from(raw: RawPassengerSeat) -> Result<Self> {
        Self::new(raw.index, raw.status)
    }
}

/// Seats requested in one booking, with unique indexes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<PassengerSeat>", into = "Vec<PassengerSeat>")]
pub struct BookedSeats(Vec<PassengerSeat>);

impl BookedSeats {
    /// Create a booking batch.
    ///
    /// # Errors
    ///
    /// Returns a validation error if two seats share an index.
    pub fn new(seats: Vec<PassengerSeat>) -> Result<Self> {
        let mut seen = BTreeSet::new();
        if let Some(dup) = seats.iter().find(|s| !seen.insert(s.index)) {
            return Err(DomainError::invalid(
                "booked seats",
                format!("seat {} requested twice", dup.index),
            ));
        }
        Ok(Self(seats))
    }

    /// Whether `index` is part of this booking.
    #[must_use]
    pub fn contains_index(&self, index: usize) -> bool {
        self.0.iter().any(|s| s.index == index)
    }

    /// Seat requested at `index`.
    #[must_use]
    pub fn get_by_index(&self, index: usize) -> Option<PassengerSeat> {
        self.0.iter().find(|s| s.index == index).copied()
    }

    /// Number of seats.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no seat was requested.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the seats.
    pub fn iter(&self) -> impl Iterator<Item = &PassengerSeat> {
        self.0.iter()
    }

    /// Copy of the seats.
    #[must_use]
    pub fn to_vec(&self) -> Vec<PassengerSeat> {
        self.0.clone()
    }
}

impl TryFrom<Vec<PassengerSeat>> for BookedSeats {
    type Error = DomainError;

    fn try_from(seats: Vec<PassengerSeat>) -> Result<Self> {
        Self::new(seats)
    }
}

impl From<BookedSeats> for Vec<PassengerSeat> {
    fn from(seats: BookedSeats) -> Self {
        seats.0
    }
}
