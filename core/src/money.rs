//! Monetary value objects.
//!
//! Amounts are exact decimals. A [`Fee`] is derived from the total of a single
//! booking and replaces the ride's previous fee rather than accumulating.

use crate::error::{DomainError, Result};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Platform cut of a booking total (2%).
pub const FEE_RATE: Decimal = Decimal::from_parts(2, 0, 0, false, 2);

/// Non-negative price of a single seat.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Price(Decimal);

impl Price {
    /// Create a price.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `amount` is negative.
    pub fn new(amount: Decimal) -> Result<Self> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(DomainError::invalid("price", "must not be negative"));
        }
        Ok(Self(amount))
    }

    /// Zero price.
    #[must_use]
    pub const fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// Inner amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Price of `seats` seats at this price.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the total overflows.
    pub fn times(&self, seats: usize) -> Result<Self> {
        let count = u64::try_from(seats)
            .map_err(|_| DomainError::invalid("price", "seat count out of range"))?;
        self.0
            .checked_mul(Decimal::from(count))
            .map(Self)
            .ok_or_else(|| DomainError::invalid("price", "total out of range"))
    }

    /// Sum of two prices.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the sum overflows.
    pub fn checked_add(&self, other: Self) -> Result<Self> {
        self.0
            .checked_add(other.0)
            .map(Self)
            .ok_or_else(|| DomainError::invalid("price", "total out of range"))
    }
}

impl TryFrom<Decimal> for Price {
    type Error = DomainError;

    fn try_from(value: Decimal) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Price> for Decimal {
    fn from(price: Price) -> Self {
        price.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            self.0.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        )
    }
}

/// Non-negative platform fee.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Fee(Decimal);

impl Fee {
    /// Create a fee.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `amount` is negative.
    pub fn new(amount: Decimal) -> Result<Self> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(DomainError::invalid("fee", "must not be negative"));
        }
        Ok(Self(amount))
    }

    /// Zero fee.
    #[must_use]
    pub const fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// Fee owed on a booking totalling `total`.
    #[must_use]
    pub fn for_booking(total: Price) -> Self {
        Self(total.amount() * FEE_RATE)
    }

    /// Inner amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Fee {
    type Error = DomainError;

    fn try_from(value: Decimal) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Fee> for Decimal {
    fn from(fee: Fee) -> Self {
        fee.0
    }
}

impl fmt::Display for Fee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            self.0.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        )
    }
}
