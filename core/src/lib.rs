//! # Carpool Core
//!
//! Domain model for the carpool ride marketplace.
//!
//! This crate holds everything that has invariants and no I/O:
//!
//! - **Value objects**: seat maps, money, routes, schedules, plates, rules
//! - **Ride**: the aggregate root with its state machine and booking operation
//! - **`RideContract`**: the immutable record produced by a booking
//! - **`RideRequest`**: an owner's proposal to a driver, held by a broker
//! - **`DriverRating`**: the tagged rating variant
//!
//! It also defines the provider traits the service layer is wired against
//! (persistence, fleet lookups, request broker) and the `Clock` environment
//! trait. Implementations live in `carpool-postgres`, `carpool-redis` and
//! `carpool-testing`.
//!
//! ## Example
//!
//! ```
//! use carpool_core::seat_map::{SeatMap, SeatStatus};
//!
//! let map = SeatMap::of_empty(2, 2)?;
//! let map = map.occupy(1, SeatStatus::FemaleOccupied)?;
//! assert!(!map.is_available(1));
//! assert_eq!(map.occupied_indexes(), vec![1]);
//! # Ok::<(), carpool_core::error::DomainError>(())
//! ```

pub mod broker;
pub mod contract;
pub mod error;
pub mod fleet;
pub mod ids;
pub mod money;
pub mod pagination;
pub mod rating;
pub mod repository;
pub mod request;
pub mod ride;
pub mod route;
pub mod seat_map;

pub use error::{DomainError, ErrorKind};

/// Environment traits injected into services.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use carpool_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// let _now = clock.now();
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
