//! Domain errors raised by value objects and the ride aggregate.
//!
//! Every constructor and aggregate operation returns [`Result`]. The
//! [`ErrorKind`] classification is what the service layer uses to translate
//! a failure into a boundary error.

use crate::ride::RideStatus;
use thiserror::Error;

/// Classification of a [`DomainError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input rejected before any mutation.
    Validation,
    /// Operation not legal in the aggregate's current state.
    StateConflict,
    /// Actor does not manage the resource.
    Authorization,
}

/// Errors produced by the domain model.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value object failed validation at construction.
    #[error("Invalid {field}: {reason}")]
    InvalidValue {
        /// Name of the offending value.
        field: &'static str,
        /// Human readable reason.
        reason: String,
    },

    /// A ride already carries the maximum number of rules.
    #[error("A ride may carry at most {max} rules")]
    TooManyRules {
        /// Rule limit.
        max: usize,
    },

    /// Requested seat is taken, or is the driver seat.
    #[error("Seat {index} is not available")]
    SeatUnavailable {
        /// Linear seat index.
        index: usize,
    },

    /// The operation is not allowed from the ride's current status.
    #[error("Cannot {operation} a ride in status {status}")]
    InvalidTransition {
        /// Attempted operation.
        operation: &'static str,
        /// Status the ride was in.
        status: RideStatus,
    },

    /// The ride has booked passengers and cannot be canceled.
    #[error("Ride has active contracts")]
    ActiveContracts,

    /// The acting driver or owner does not manage this ride.
    #[error("Not permitted to manage this ride")]
    NotRideManager,
}

impl DomainError {
    /// Shorthand for [`DomainError::InvalidValue`].
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            reason: reason.into(),
        }
    }

    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidValue { .. } | Self::TooManyRules { .. } => ErrorKind::Validation,
            Self::SeatUnavailable { .. }
            | Self::InvalidTransition { .. }
            | Self::ActiveContracts => ErrorKind::StateConflict,
            Self::NotRideManager => ErrorKind::Authorization,
        }
    }
}

/// Result type for domain operations.
pub type Result<T> = std::result::Result<T, DomainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_classified() {
        assert_eq!(DomainError::invalid("price", "negative").kind(), ErrorKind::Validation);
        assert_eq!(DomainError::TooManyRules { max: 12 }.kind(), ErrorKind::Validation);
        assert_eq!(DomainError::SeatUnavailable { index: 3 }.kind(), ErrorKind::StateConflict);
        assert_eq!(DomainError::ActiveContracts.kind(), ErrorKind::StateConflict);
        assert_eq!(DomainError::NotRideManager.kind(), ErrorKind::Authorization);
    }

    #[test]
    fn messages_name_the_field() {
        let err = DomainError::invalid("license plate", "must be 3 to 12 characters");
        assert_eq!(err.to_string(), "Invalid license plate: must be 3 to 12 characters");
    }
}
