//! In-memory providers.
//!
//! Each store keeps its state behind one `Mutex`, so every trait call is
//! atomic with respect to the others. Version checks behave like the
//! `PostgreSQL` stores.
//!
//! A ride store built with [`InMemoryRideStore::with_fleet`] claims and
//! releases cars and drivers of that directory under its own lock, taking
//! the ride lock before the fleet lock.
//!
//! **WARNING**: Do NOT use in production. This is for testing only!

#![allow(clippy::unwrap_used)] // Test mock: mutex poisoning is a test failure

use carpool_core::broker::{BrokerError, RideRequestBroker};
use carpool_core::contract::RideContract;
use carpool_core::environment::Clock;
use carpool_core::fleet::{Car, Driver, LicensePlate, Owner};
use carpool_core::ids::{CarId, DriverId, OwnerId, RideContractId, RideId, RideRequestId, UserId};
use carpool_core::pagination::PageRequest;
use carpool_core::rating::{DriverRating, Score};
use carpool_core::repository::{
    FleetDirectory, NEARBY_DISTANCE_SQUARED, RideContractRepository, RideRepository, StoreError,
    distance_squared,
};
use carpool_core::request::{REQUEST_TTL_SECS, RideRequest};
use carpool_core::ride::{Ride, RideStatus, RideSummary};
use carpool_core::route::Location;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

fn paginate<T>(items: impl Iterator<Item = T>, page: PageRequest) -> Vec<T> {
    let skip = usize::try_from(page.offset()).unwrap_or(usize::MAX);
    let take = usize::try_from(page.limit()).unwrap_or(0);
    items.skip(skip).take(take).collect()
}

// ============================================================================
// Rides and contracts
// ============================================================================

#[derive(Default)]
struct RideTables {
    rides: HashMap<RideId, Ride>,
    contracts: Vec<RideContract>,
}

/// In-memory ride and contract store.
///
/// Implements both [`RideRepository`] and [`RideContractRepository`] over a
/// single lock so a booking writes ride and contract together.
#[derive(Clone, Default)]
pub struct InMemoryRideStore {
    tables: Arc<Mutex<RideTables>>,
    fleet: InMemoryFleetDirectory,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryRideStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose published rides claim cars and drivers of `fleet`.
    #[must_use]
    pub fn with_fleet(fleet: &InMemoryFleetDirectory) -> Self {
        Self {
            fleet: fleet.clone(),
            ..Self::default()
        }
    }

    /// Make every call fail with [`StoreError::Unavailable`] until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Stored copy of a ride.
    #[must_use]
    pub fn snapshot(&self, id: RideId) -> Option<Ride> {
        self.tables.lock().unwrap().rides.get(&id).cloned()
    }

    /// Number of stored rides.
    #[must_use]
    pub fn ride_count(&self) -> usize {
        self.tables.lock().unwrap().rides.len()
    }

    /// Number of stored contracts.
    #[must_use]
    pub fn contract_count(&self) -> usize {
        self.tables.lock().unwrap().contracts.len()
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory store switched off".to_string()));
        }
        Ok(())
    }

    /// Replace the stored ride if its version still matches.
    fn write_versioned(&self, ride: &Ride, contract: Option<&RideContract>) -> Result<i64, StoreError> {
        self.check_available()?;
        let mut tables = self.tables.lock().unwrap();
        Self::replace_versioned(&mut tables, ride, contract)
    }

    fn replace_versioned(
        tables: &mut RideTables,
        ride: &Ride,
        contract: Option<&RideContract>,
    ) -> Result<i64, StoreError> {
        let stored = tables
            .rides
            .get(&ride.id())
            .ok_or_else(|| StoreError::NotFound(format!("ride {}", ride.id())))?;
        if stored.version() != ride.version() {
            return Err(StoreError::ConcurrencyConflict {
                ride: ride.id(),
                expected: ride.version(),
            });
        }
        let mut next = ride.clone();
        let version = ride.version() + 1;
        next.set_version(version);
        tables.rides.insert(ride.id(), next);
        if let Some(contract) = contract {
            tables.contracts.push(contract.clone());
        }
        Ok(version)
    }

    fn summaries<F>(&self, filter: F, newest_first: bool, page: PageRequest) -> Result<Vec<RideSummary>, StoreError>
    where
        F: Fn(&Ride, &[RideContract]) -> bool,
    {
        self.check_available()?;
        let tables = self.tables.lock().unwrap();
        let mut rides: Vec<&Ride> = tables
            .rides
            .values()
            .filter(|ride| filter(ride, &tables.contracts))
            .collect();
        rides.sort_by_key(|ride| (ride.schedule().start(), ride.id()));
        if newest_first {
            rides.reverse();
        }
        Ok(paginate(rides.into_iter().map(RideSummary::from), page))
    }
}

impl RideRepository for InMemoryRideStore {
    async fn save(&self, ride: &Ride) -> Result<(), StoreError> {
        self.check_available()?;
        let mut tables = self.tables.lock().unwrap();
        if tables.rides.contains_key(&ride.id()) {
            return Err(StoreError::Database(format!("ride {} already exists", ride.id())));
        }
        tables.rides.insert(ride.id(), ride.clone());
        Ok(())
    }

    async fn publish(&self, ride: &Ride) -> Result<(), StoreError> {
        self.check_available()?;
        self.fleet.check_available()?;
        let mut tables = self.tables.lock().unwrap();
        let mut fleet = self.fleet.tables.lock().unwrap();

        let car = fleet
            .cars
            .get(&ride.car())
            .ok_or_else(|| StoreError::NotFound(format!("car {}", ride.car())))?;
        if !car.is_available() {
            return Err(StoreError::CarUnavailable(ride.car()));
        }
        let driver = ride.owner().driver;
        if !fleet.drivers.contains_key(&driver) {
            return Err(StoreError::NotFound(format!("driver {driver}")));
        }
        if tables.rides.contains_key(&ride.id()) {
            return Err(StoreError::Database(format!("ride {} already exists", ride.id())));
        }

        if let Some(car) = fleet.cars.get_mut(&ride.car()) {
            car.start_trip();
        }
        if let Some(driver) = fleet.drivers.get_mut(&driver) {
            driver.start_ride();
        }
        tables.rides.insert(ride.id(), ride.clone());
        Ok(())
    }

    async fn find_by(&self, id: RideId) -> Result<Option<Ride>, StoreError> {
        self.check_available()?;
        Ok(self.tables.lock().unwrap().rides.get(&id).cloned())
    }

    async fn update_seats(&self, ride: &Ride, contract: &RideContract) -> Result<i64, StoreError> {
        self.write_versioned(ride, Some(contract))
    }

    async fn update_status(&self, ride: &Ride) -> Result<i64, StoreError> {
        if ride.is_active() {
            return self.write_versioned(ride, None);
        }
        self.check_available()?;
        self.fleet.check_available()?;
        let mut tables = self.tables.lock().unwrap();
        let mut fleet = self.fleet.tables.lock().unwrap();
        let version = Self::replace_versioned(&mut tables, ride, None)?;

        if let Some(car) = fleet.cars.get_mut(&ride.car()) {
            car.end_trip();
        }
        if let Some(driver) = fleet.drivers.get_mut(&ride.owner().driver) {
            if ride.is_finished() {
                driver.finish_ride();
            } else {
                driver.release();
            }
        }
        Ok(version)
    }

    async fn update_rules(&self, ride: &Ride) -> Result<i64, StoreError> {
        self.write_versioned(ride, None)
    }

    async fn page_by_passenger(&self, user: UserId, page: PageRequest) -> Result<Vec<RideSummary>, StoreError> {
        self.summaries(
            |ride, contracts| contracts.iter().any(|c| c.ride() == ride.id() && c.rider() == user),
            true,
            page,
        )
    }

    async fn page_by_driver(&self, driver: DriverId, page: PageRequest) -> Result<Vec<RideSummary>, StoreError> {
        self.summaries(|ride, _| ride.owner().driver == driver, true, page)
    }

    async fn page_by_owner(&self, owner: OwnerId, page: PageRequest) -> Result<Vec<RideSummary>, StoreError> {
        self.summaries(|ride, _| ride.owner().owner == Some(owner), true, page)
    }

    async fn page_by_date(&self, date: NaiveDate, page: PageRequest) -> Result<Vec<RideSummary>, StoreError> {
        self.summaries(
            |ride, _| {
                ride.status() == RideStatus::Pending && ride.schedule().start().date_naive() == date
            },
            false,
            page,
        )
    }

    async fn page_nearby(
        &self,
        from: &Location,
        to: &Location,
        date: NaiveDate,
        page: PageRequest,
    ) -> Result<Vec<RideSummary>, StoreError> {
        self.summaries(
            |ride, _| {
                ride.status() == RideStatus::Pending
                    && ride.schedule().start().date_naive() >= date
                    && distance_squared(ride.route().from(), from) <= NEARBY_DISTANCE_SQUARED
                    && distance_squared(ride.route().to(), to) <= NEARBY_DISTANCE_SQUARED
            },
            false,
            page,
        )
    }
}

impl RideContractRepository for InMemoryRideStore {
    async fn save(&self, contract: &RideContract) -> Result<(), StoreError> {
        self.check_available()?;
        let mut tables = self.tables.lock().unwrap();
        if tables.contracts.iter().any(|c| c.id() == contract.id()) {
            return Err(StoreError::Database(format!("contract {} already exists", contract.id())));
        }
        tables.contracts.push(contract.clone());
        Ok(())
    }

    async fn find_by(&self, id: RideContractId) -> Result<Option<RideContract>, StoreError> {
        self.check_available()?;
        let tables = self.tables.lock().unwrap();
        Ok(tables.contracts.iter().find(|c| c.id() == id).cloned())
    }

    async fn page_by_ride(&self, ride: RideId, page: PageRequest) -> Result<Vec<RideContract>, StoreError> {
        self.check_available()?;
        let tables = self.tables.lock().unwrap();
        Ok(paginate(
            tables.contracts.iter().filter(|c| c.ride() == ride).cloned(),
            page,
        ))
    }

    async fn page_by_user(&self, user: UserId, page: PageRequest) -> Result<Vec<RideContract>, StoreError> {
        self.check_available()?;
        let tables = self.tables.lock().unwrap();
        Ok(paginate(
            tables.contracts.iter().filter(|c| c.rider() == user).cloned(),
            page,
        ))
    }

    async fn exists(&self, user: UserId, ride: RideId) -> Result<bool, StoreError> {
        self.check_available()?;
        let tables = self.tables.lock().unwrap();
        Ok(tables.contracts.iter().any(|c| c.rider() == user && c.ride() == ride))
    }
}

// ============================================================================
// Fleet
// ============================================================================

#[derive(Default)]
struct FleetTables {
    drivers: HashMap<DriverId, Driver>,
    owners: HashMap<OwnerId, Owner>,
    cars: HashMap<CarId, Car>,
}

/// In-memory fleet directory with registration helpers.
#[derive(Clone, Default)]
pub struct InMemoryFleetDirectory {
    tables: Arc<Mutex<FleetTables>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryFleetDirectory {
    /// Create an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail with [`StoreError::Unavailable`] until reset.
    ///
    /// Also fails ride store writes that touch this directory.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory fleet switched off".to_string()));
        }
        Ok(())
    }

    /// Register a driver.
    pub fn add_driver(&self, driver: Driver) {
        self.tables.lock().unwrap().drivers.insert(driver.id, driver);
    }

    /// Register an owner.
    pub fn add_owner(&self, owner: Owner) {
        self.tables.lock().unwrap().owners.insert(owner.id, owner);
    }

    /// Register a car.
    pub fn add_car(&self, car: Car) {
        self.tables.lock().unwrap().cars.insert(car.id, car);
    }

    /// Stored copy of a driver.
    #[must_use]
    pub fn driver_snapshot(&self, id: DriverId) -> Option<Driver> {
        self.tables.lock().unwrap().drivers.get(&id).cloned()
    }

    /// Stored copy of a car.
    #[must_use]
    pub fn car_snapshot(&self, id: CarId) -> Option<Car> {
        self.tables.lock().unwrap().cars.get(&id).cloned()
    }
}

impl FleetDirectory for InMemoryFleetDirectory {
    async fn driver_of(&self, user: UserId) -> Result<Option<Driver>, StoreError> {
        self.check_available()?;
        let tables = self.tables.lock().unwrap();
        Ok(tables.drivers.values().find(|d| d.user == user).cloned())
    }

    async fn driver(&self, id: DriverId) -> Result<Option<Driver>, StoreError> {
        self.check_available()?;
        Ok(self.tables.lock().unwrap().drivers.get(&id).cloned())
    }

    async fn owner_of(&self, user: UserId) -> Result<Option<Owner>, StoreError> {
        self.check_available()?;
        let tables = self.tables.lock().unwrap();
        Ok(tables.owners.values().find(|o| o.user == user).copied())
    }

    async fn car_by_plate(&self, plate: &LicensePlate) -> Result<Option<Car>, StoreError> {
        self.check_available()?;
        let tables = self.tables.lock().unwrap();
        Ok(tables.cars.values().find(|c| &c.license_plate == plate).cloned())
    }

    async fn car(&self, id: CarId) -> Result<Option<Car>, StoreError> {
        self.check_available()?;
        Ok(self.tables.lock().unwrap().cars.get(&id).cloned())
    }

    async fn available_drivers(&self, page: PageRequest) -> Result<Vec<Driver>, StoreError> {
        self.check_available()?;
        let tables = self.tables.lock().unwrap();
        let mut drivers: Vec<&Driver> = tables.drivers.values().filter(|d| d.is_available()).collect();
        drivers.sort_by_key(|d| d.id);
        Ok(paginate(drivers.into_iter().cloned(), page))
    }

    async fn record_rating(&self, driver: DriverId, score: Score) -> Result<DriverRating, StoreError> {
        self.check_available()?;
        let mut tables = self.tables.lock().unwrap();
        let stored = tables
            .drivers
            .get_mut(&driver)
            .ok_or_else(|| StoreError::NotFound(format!("driver {driver}")))?;
        stored.rate(score);
        Ok(stored.rating)
    }
}

// ============================================================================
// Broker
// ============================================================================

/// In-memory ride request broker.
///
/// Expiry is judged against the injected clock, so tests can move time past
/// the TTL. `consume` is a single `HashMap::remove` under the lock.
#[derive(Clone)]
pub struct InMemoryRideRequestBroker {
    entries: Arc<Mutex<HashMap<(DriverId, RideRequestId), RideRequest>>>,
    clock: Arc<dyn Clock>,
    ttl_secs: u64,
}

impl InMemoryRideRequestBroker {
    /// Broker with the default 300 second window.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_ttl(clock, REQUEST_TTL_SECS)
    }

    /// Broker with a custom window.
    #[must_use]
    pub fn with_ttl(clock: Arc<dyn Clock>, ttl_secs: u64) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            clock,
            ttl_secs,
        }
    }

    /// Drop expired entries (called internally on access).
    fn cleanup_expired(&self) {
        let now = self.clock.now();
        let ttl = self.ttl_secs;
        self.entries
            .lock()
            .unwrap()
            .retain(|_, request| !request.is_expired(ttl, now));
    }
}

impl RideRequestBroker for InMemoryRideRequestBroker {
    fn is_enabled(&self) -> bool {
        true
    }

    async fn put(&self, driver: DriverId, request: &RideRequest) -> Result<(), BrokerError> {
        self.cleanup_expired();
        self.entries
            .lock()
            .unwrap()
            .insert((driver, request.id), request.clone());
        Ok(())
    }

    async fn list_for(&self, driver: DriverId) -> Result<Vec<RideRequest>, BrokerError> {
        self.cleanup_expired();
        let entries = self.entries.lock().unwrap();
        let mut requests: Vec<RideRequest> = entries
            .iter()
            .filter(|((target, _), _)| *target == driver)
            .map(|(_, request)| request.clone())
            .collect();
        requests.sort_by_key(|r| r.created_at);
        Ok(requests)
    }

    async fn consume(&self, driver: DriverId, id: RideRequestId) -> Result<Option<RideRequest>, BrokerError> {
        self.cleanup_expired();
        // Atomic get-and-remove
        Ok(self.entries.lock().unwrap().remove(&(driver, id)))
    }
}
