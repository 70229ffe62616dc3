//! # Carpool Testing
//!
//! Testing utilities for the carpool crates.
//!
//! This crate provides:
//! - Mock implementations of environment traits (`FixedClock`, `ManualClock`)
//! - In-memory ride, contract, fleet and broker providers
//! - Fixtures for common domain values
//!
//! ## Example
//!
//! ```
//! use carpool_testing::{fixtures, memory::InMemoryRideStore, mocks::test_clock};
//!
//! let clock = test_clock();
//! let store = InMemoryRideStore::new();
//! let ride = fixtures::ride(&clock);
//! assert!(store.snapshot(ride.id()).is_none());
//! ```

use carpool_core::environment::Clock;
use chrono::{DateTime, Utc};

pub mod fixtures;
pub mod memory;

/// Mock implementations for testing.
///
/// This module provides mock implementations of environment traits:
/// - `FixedClock`: Deterministic time
/// - `ManualClock`: Time that tests move forward explicitly
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use chrono::Duration;
    use std::sync::{Arc, Mutex};

    /// Fixed clock for deterministic tests
    ///
    /// # Example
    ///
    /// ```
    /// use carpool_testing::mocks::FixedClock;
    /// use carpool_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }

    /// Clock that only moves when told to.
    ///
    /// Clones share the same time, so a test can hand one to a service and
    /// advance another.
    #[derive(Debug, Clone)]
    pub struct ManualClock {
        time: Arc<Mutex<DateTime<Utc>>>,
    }

    impl ManualClock {
        /// Start at `time`.
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(Mutex::new(time)),
            }
        }

        /// Start at the same instant as [`test_clock`].
        #[must_use]
        pub fn starting_at_test_time() -> Self {
            Self::new(test_clock().now())
        }

        /// Move time forward.
        #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
        pub fn advance(&self, by: Duration) {
            let mut time = self.time.lock().unwrap();
            *time += by;
        }
    }

    impl Clock for ManualClock {
        #[allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure
        fn now(&self) -> DateTime<Utc> {
            *self.time.lock().unwrap()
        }
    }
}

/// Install a test-friendly tracing subscriber once per process.
///
/// Honors `RUST_LOG`; repeated calls are ignored.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::mocks::{ManualClock, test_clock};
    use super::Clock;
    use chrono::Duration;

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::starting_at_test_time();
        let handle = clock.clone();
        handle.advance(Duration::seconds(301));
        assert_eq!(clock.now(), test_clock().now() + Duration::seconds(301));
    }
}
