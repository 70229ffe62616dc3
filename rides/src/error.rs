//! Service-level errors.
//!
//! Domain, store and broker failures are translated into the five kinds a
//! caller has to tell apart. Only [`RideError::Infrastructure`] is worth
//! retrying.

use carpool_core::broker::BrokerError;
use carpool_core::repository::StoreError;
use carpool_core::{DomainError, ErrorKind};
use std::fmt;
use thiserror::Error;

/// Errors returned by [`crate::RideService`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RideError {
    /// Malformed input.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Operation not legal in the current state, including lost races.
    #[error("Conflict: {0}")]
    StateConflict(String),

    /// A referenced ride, contract, request, car, driver or owner is absent.
    #[error("{0} not found")]
    NotFound(String),

    /// The caller may not act on this resource.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Database or broker failure.
    #[error("Infrastructure error: {0}")]
    Infrastructure(String),
}

impl RideError {
    /// `"{resource} {id}"` was not found.
    #[must_use]
    pub fn not_found(resource: impl fmt::Display, id: impl fmt::Display) -> Self {
        Self::NotFound(format!("{resource} {id}"))
    }

    /// Caller is not allowed to do `action`.
    #[must_use]
    pub fn forbidden(action: impl Into<String>) -> Self {
        Self::Forbidden(action.into())
    }

    /// Stable code for the boundary layer.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::StateConflict(_) => "CONFLICT",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::Infrastructure(_) => "INFRASTRUCTURE_ERROR",
        }
    }

    /// Whether the caller may retry the same request.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Infrastructure(_))
    }
}

impl From<DomainError> for RideError {
    fn from(err: DomainError) -> Self {
        let message = err.to_string();
        match err.kind() {
            ErrorKind::Validation => Self::Validation(message),
            ErrorKind::StateConflict => Self::StateConflict(message),
            ErrorKind::Authorization => Self::Forbidden(message),
        }
    }
}

impl From<StoreError> for RideError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ConcurrencyConflict { .. } | StoreError::CarUnavailable(_) => {
                Self::StateConflict(err.to_string())
            }
            StoreError::NotFound(what) => Self::NotFound(what),
            StoreError::Database(_) | StoreError::Serialization(_) | StoreError::Unavailable(_) => {
                Self::Infrastructure(err.to_string())
            }
        }
    }
}

impl From<BrokerError> for RideError {
    fn from(err: BrokerError) -> Self {
        Self::Infrastructure(err.to_string())
    }
}

/// Result alias for service operations.
pub type Result<T> = std::result::Result<T, RideError>;

#[cfg(test)]
mod tests {
    use super::*;
    use carpool_core::ids::{CarId, RideId};
    use carpool_core::ride::RideStatus;

    #[test]
    fn domain_errors_map_by_kind() {
        let seat: RideError = DomainError::SeatUnavailable { index: 2 }.into();
        assert!(matches!(seat, RideError::StateConflict(_)));

        let transition: RideError = DomainError::InvalidTransition {
            operation: "finish",
            status: RideStatus::Pending,
        }
        .into();
        assert!(matches!(transition, RideError::StateConflict(_)));

        let invalid: RideError = DomainError::invalid("price", "negative").into();
        assert!(matches!(invalid, RideError::Validation(_)));

        let manager: RideError = DomainError::NotRideManager.into();
        assert_eq!(manager.code(), "FORBIDDEN");
    }

    #[test]
    fn only_infrastructure_is_retryable() {
        let down: RideError = StoreError::Unavailable("pool timed out".into()).into();
        assert!(down.is_retryable());

        let broker: RideError = BrokerError::Connection("refused".into()).into();
        assert!(broker.is_retryable());

        let raced: RideError = StoreError::ConcurrencyConflict {
            ride: RideId::new(),
            expected: 3,
        }
        .into();
        assert!(!raced.is_retryable());
        assert!(!RideError::not_found("ride", RideId::new()).is_retryable());
    }

    #[test]
    fn busy_car_is_a_conflict() {
        let busy: RideError = StoreError::CarUnavailable(CarId::new()).into();
        assert!(matches!(busy, RideError::StateConflict(ref msg) if msg.contains("not idle")));
        assert_eq!(busy.code(), "CONFLICT");
        assert!(!busy.is_retryable());
    }
}
