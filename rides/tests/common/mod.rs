//! Shared setup for service tests.

#![allow(clippy::unwrap_used)] // Test setup: invalid fixtures are a test failure
#![allow(dead_code)] // Each test binary uses a different subset

use carpool_core::fleet::{Car, Driver, LicensePlate, Owner};
use carpool_core::ids::UserId;
use carpool_core::ride::Ride;
use carpool_core::route::{RideDesc, RideRules};
use carpool_rides::{ProposalForm, RideForm, RideService};
use carpool_testing::fixtures;
use carpool_testing::memory::{InMemoryFleetDirectory, InMemoryRideRequestBroker, InMemoryRideStore};
use carpool_testing::mocks::ManualClock;
use chrono::Duration;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

pub type TestService =
    RideService<InMemoryRideStore, InMemoryRideStore, InMemoryFleetDirectory, InMemoryRideRequestBroker>;

static PLATES: AtomicU32 = AtomicU32::new(100);

/// Service over in-memory providers, with handles to inspect them.
pub struct Harness {
    pub service: Arc<TestService>,
    pub store: InMemoryRideStore,
    pub fleet: InMemoryFleetDirectory,
    pub broker: InMemoryRideRequestBroker,
    pub clock: ManualClock,
}

/// A registered driver with a car of its own.
pub struct DriverAccount {
    pub user: UserId,
    pub driver: Driver,
    pub car: Car,
}

/// A registered owner with one car.
pub struct OwnerAccount {
    pub user: UserId,
    pub owner: Owner,
    pub car: Car,
}

impl Harness {
    pub fn new() -> Self {
        let clock = ManualClock::starting_at_test_time();
        let fleet = InMemoryFleetDirectory::new();
        let store = InMemoryRideStore::with_fleet(&fleet);
        let broker = InMemoryRideRequestBroker::new(Arc::new(clock.clone()));
        let service = RideService::new(
            store.clone(),
            store.clone(),
            fleet.clone(),
            broker.clone(),
            Arc::new(clock.clone()),
        );
        Self {
            service: Arc::new(service),
            store,
            fleet,
            broker,
            clock,
        }
    }

    fn next_plate() -> LicensePlate {
        let n = PLATES.fetch_add(1, Ordering::SeqCst);
        LicensePlate::new(format!("10-AZ-{n}")).unwrap()
    }

    /// Register a driver who owns a car.
    pub fn driver(&self) -> DriverAccount {
        let user = UserId::new();
        let driver = Driver::new(user);
        let car = Car::new(user, Self::next_plate());
        self.fleet.add_driver(driver.clone());
        self.fleet.add_car(car.clone());
        DriverAccount { user, driver, car }
    }

    /// Register an owner with a car.
    pub fn owner(&self) -> OwnerAccount {
        let user = UserId::new();
        let owner = Owner::new(user);
        let car = Car::new(user, Self::next_plate());
        self.fleet.add_owner(owner);
        self.fleet.add_car(car.clone());
        OwnerAccount { user, owner, car }
    }

    /// 2x2 ride at 10.00 a seat departing in two hours.
    pub fn form(&self, plate: &LicensePlate) -> RideForm {
        let now = carpool_core::environment::Clock::now(&self.clock);
        RideForm {
            license_plate: plate.clone(),
            route: fixtures::route(),
            start: now + Duration::hours(2),
            end: now + Duration::hours(6),
            price: fixtures::price(1000),
            seat_map: fixtures::two_by_two(),
            description: RideDesc::new("Baku to Ganja").unwrap(),
            rules: RideRules::default(),
        }
    }

    /// Proposal from `owner` to `driver`.
    pub fn proposal(&self, owner: &OwnerAccount, driver: &DriverAccount) -> ProposalForm {
        ProposalForm {
            driver: driver.driver.id,
            ride: self.form(&owner.car.license_plate),
        }
    }

    /// A driver and a published ride on its car.
    pub async fn published_ride(&self) -> (DriverAccount, Ride) {
        let account = self.driver();
        let ride = self
            .service
            .create_ride(account.user, self.form(&account.car.license_plate))
            .await
            .unwrap();
        (account, ride)
    }
}
