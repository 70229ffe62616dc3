//! # Carpool Rides
//!
//! Service layer of the carpool marketplace.
//!
//! [`RideService`] exposes the operations the presentation layer calls:
//!
//! - **Rides**: `create_ride`, `book`, `add_ride_rule`, `remove_ride_rule`,
//!   `start_ride`, `cancel_ride`, `finish_ride`
//! - **Owner proposals**: `propose_ride`, `list_incoming_requests`,
//!   `accept_request`
//! - **Ratings**: `rate_driver`
//! - **Queries**: rides by passenger, driver, owner, date and proximity;
//!   contracts by id, ride and user; available drivers
//!
//! The service is generic over the store, fleet and broker traits from
//! `carpool-core`. [`bootstrap::Resources`] wires the `PostgreSQL` and Redis
//! implementations; tests use the in-memory ones from `carpool-testing`.
//!
//! ## Example
//!
//! ```
//! use carpool_core::broker::DisabledRideRequestBroker;
//! use carpool_rides::RideService;
//! use carpool_testing::memory::{InMemoryFleetDirectory, InMemoryRideStore};
//! use carpool_testing::mocks::test_clock;
//! use std::sync::Arc;
//!
//! let store = InMemoryRideStore::new();
//! let service = RideService::new(
//!     store.clone(),
//!     store,
//!     InMemoryFleetDirectory::new(),
//!     DisabledRideRequestBroker,
//!     Arc::new(test_clock()),
//! );
//! # let _ = service;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod service;
pub mod telemetry;

pub use config::Config;
pub use error::{Result, RideError};
pub use service::{ProposalForm, RideForm, RideService};
