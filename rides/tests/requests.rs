//! Owner proposals and driver acceptance.

#![allow(clippy::unwrap_used)] // Tests can unwrap

mod common;

use carpool_core::broker::DisabledRideRequestBroker;
use carpool_core::fleet::{CarStatus, DriverStatus};
use carpool_core::ids::RideRequestId;
use carpool_core::pagination::PageRequest;
use carpool_core::ride::RideStatus;
use carpool_rides::{RideError, RideService};
use carpool_testing::memory::{InMemoryFleetDirectory, InMemoryRideStore};
use carpool_testing::mocks::test_clock;
use chrono::Duration;
use common::Harness;
use std::sync::Arc;

#[tokio::test]
async fn test_propose_list_and_accept() {
    let harness = Harness::new();
    let owner = harness.owner();
    let driver = harness.driver();

    let request = harness
        .service
        .propose_ride(owner.user, harness.proposal(&owner, &driver))
        .await
        .unwrap();
    assert_eq!(request.driver, driver.driver.id);
    assert_eq!(request.owner, owner.owner.id);

    let incoming = harness.service.list_incoming_requests(driver.user).await.unwrap();
    assert_eq!(incoming, vec![request.clone()]);

    let ride = harness.service.accept_request(driver.user, request.id).await.unwrap();
    assert_eq!(ride.status(), RideStatus::Pending);
    assert!(ride.is_owner_created());
    assert_eq!(ride.owner().owner, Some(owner.owner.id));
    assert_eq!(ride.owner().driver, driver.driver.id);
    assert_eq!(ride.car(), owner.car.id);
    assert!(harness.store.snapshot(ride.id()).is_some());

    assert_eq!(
        harness.fleet.car_snapshot(owner.car.id).unwrap().status,
        CarStatus::OnTheRoad
    );
    assert_eq!(
        harness.fleet.driver_snapshot(driver.driver.id).unwrap().status,
        DriverStatus::OnTheRoad
    );
    assert!(harness.service.list_incoming_requests(driver.user).await.unwrap().is_empty());

    let page = PageRequest::default();
    let owned = harness.service.rides_for_owner(owner.user, page).await.unwrap();
    assert_eq!(owned.len(), 1);
    assert_eq!(owned[0].id, ride.id());
}

#[tokio::test]
async fn test_owner_manages_accepted_ride() {
    let harness = Harness::new();
    let owner = harness.owner();
    let driver = harness.driver();
    let request = harness
        .service
        .propose_ride(owner.user, harness.proposal(&owner, &driver))
        .await
        .unwrap();
    let ride = harness.service.accept_request(driver.user, request.id).await.unwrap();

    let by_driver = harness.service.start_ride(driver.user, ride.id()).await;
    assert!(matches!(by_driver, Err(RideError::Forbidden(_))));

    let canceled = harness.service.cancel_ride(owner.user, ride.id()).await.unwrap();
    assert_eq!(canceled.status(), RideStatus::Canceled);
    assert_eq!(
        harness.fleet.car_snapshot(owner.car.id).unwrap().status,
        CarStatus::Idle
    );
}

#[tokio::test]
async fn test_second_accept_is_not_found() {
    let harness = Harness::new();
    let owner = harness.owner();
    let driver = harness.driver();
    let request = harness
        .service
        .propose_ride(owner.user, harness.proposal(&owner, &driver))
        .await
        .unwrap();

    harness.service.accept_request(driver.user, request.id).await.unwrap();
    let again = harness.service.accept_request(driver.user, request.id).await;
    assert!(matches!(again, Err(RideError::NotFound(_))));
    assert_eq!(harness.store.ride_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_accepts_create_one_ride() {
    let harness = Harness::new();
    let owner = harness.owner();
    let driver = harness.driver();
    let request = harness
        .service
        .propose_ride(owner.user, harness.proposal(&owner, &driver))
        .await
        .unwrap();

    let handles: Vec<_> = (0..5)
        .map(|_| {
            let service = harness.service.clone();
            let (user, id) = (driver.user, request.id);
            tokio::spawn(async move { service.accept_request(user, id).await })
        })
        .collect();

    let results: Vec<_> = futures::future::join_all(handles)
        .await
        .into_iter()
        .map(Result::unwrap)
        .collect();
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, RideError::NotFound(_))));
    assert_eq!(harness.store.ride_count(), 1);
}

#[tokio::test]
async fn test_accept_while_car_is_busy_is_a_conflict() {
    let harness = Harness::new();
    let owner = harness.owner();
    let first = harness.driver();
    let second = harness.driver();
    let to_first = harness
        .service
        .propose_ride(owner.user, harness.proposal(&owner, &first))
        .await
        .unwrap();
    let to_second = harness
        .service
        .propose_ride(owner.user, harness.proposal(&owner, &second))
        .await
        .unwrap();

    harness.service.accept_request(first.user, to_first.id).await.unwrap();
    let err = harness
        .service
        .accept_request(second.user, to_second.id)
        .await
        .unwrap_err();
    assert!(matches!(err, RideError::StateConflict(_)));
    assert_eq!(harness.store.ride_count(), 1);
    assert_eq!(
        harness.fleet.driver_snapshot(second.driver.id).unwrap().status,
        DriverStatus::Available
    );
}

#[tokio::test]
async fn test_requests_expire() {
    let harness = Harness::new();
    let owner = harness.owner();
    let driver = harness.driver();
    let request = harness
        .service
        .propose_ride(owner.user, harness.proposal(&owner, &driver))
        .await
        .unwrap();

    harness.clock.advance(Duration::seconds(299));
    assert_eq!(harness.service.list_incoming_requests(driver.user).await.unwrap().len(), 1);

    harness.clock.advance(Duration::seconds(1));
    assert!(harness.service.list_incoming_requests(driver.user).await.unwrap().is_empty());
    let late = harness.service.accept_request(driver.user, request.id).await;
    assert!(matches!(late, Err(RideError::NotFound(_))));
}

#[tokio::test]
async fn test_requests_are_private_to_their_driver() {
    let harness = Harness::new();
    let owner = harness.owner();
    let driver = harness.driver();
    let bystander = harness.driver();
    let request = harness
        .service
        .propose_ride(owner.user, harness.proposal(&owner, &driver))
        .await
        .unwrap();

    assert!(harness.service.list_incoming_requests(bystander.user).await.unwrap().is_empty());
    let stolen = harness.service.accept_request(bystander.user, request.id).await;
    assert!(matches!(stolen, Err(RideError::NotFound(_))));

    // Still there for the addressee.
    harness.service.accept_request(driver.user, request.id).await.unwrap();
}

#[tokio::test]
async fn test_unknown_request_is_not_found() {
    let harness = Harness::new();
    let driver = harness.driver();
    let err = harness
        .service
        .accept_request(driver.user, RideRequestId::new())
        .await
        .unwrap_err();
    assert!(matches!(err, RideError::NotFound(_)));
}

#[tokio::test]
async fn test_proposal_preconditions() {
    let harness = Harness::new();
    let owner = harness.owner();
    let driver = harness.driver();

    // A driver without an owner profile cannot propose.
    let not_owner = harness
        .service
        .propose_ride(driver.user, harness.proposal(&owner, &driver))
        .await;
    assert!(matches!(not_owner, Err(RideError::NotFound(_))));

    // The driver is busy with a ride of its own.
    harness
        .service
        .create_ride(driver.user, harness.form(&driver.car.license_plate))
        .await
        .unwrap();
    let busy = harness
        .service
        .propose_ride(owner.user, harness.proposal(&owner, &driver))
        .await;
    assert!(matches!(busy, Err(RideError::StateConflict(_))));

    let mut past = harness.proposal(&owner, &harness.driver());
    past.ride.start = past.ride.end;
    let invalid = harness.service.propose_ride(owner.user, past).await;
    assert!(matches!(invalid, Err(RideError::Validation(_))));
}

#[tokio::test]
async fn test_available_drivers_for_owners_only() {
    let harness = Harness::new();
    let owner = harness.owner();
    let idle = harness.driver();
    let busy = harness.driver();
    harness
        .service
        .create_ride(busy.user, harness.form(&busy.car.license_plate))
        .await
        .unwrap();

    let page = PageRequest::default();
    let drivers = harness.service.available_drivers(owner.user, page).await.unwrap();
    assert_eq!(drivers.len(), 1);
    assert_eq!(drivers[0].id, idle.driver.id);

    let as_driver = harness.service.available_drivers(idle.user, page).await;
    assert!(matches!(as_driver, Err(RideError::NotFound(_))));
}

#[tokio::test]
async fn test_disabled_broker_accepts_and_drops_proposals() {
    let fleet = InMemoryFleetDirectory::new();
    let store = InMemoryRideStore::with_fleet(&fleet);
    let service = RideService::new(
        store.clone(),
        store,
        fleet.clone(),
        DisabledRideRequestBroker,
        Arc::new(test_clock()),
    );

    let owner_user = carpool_core::ids::UserId::new();
    let owner = carpool_core::fleet::Owner::new(owner_user);
    let car = carpool_core::fleet::Car::new(owner_user, carpool_testing::fixtures::plate());
    fleet.add_owner(owner);
    fleet.add_car(car.clone());

    let driver_user = carpool_core::ids::UserId::new();
    let driver = carpool_core::fleet::Driver::new(driver_user);
    fleet.add_driver(driver.clone());

    let now = carpool_core::environment::Clock::now(&test_clock());
    let form = carpool_rides::ProposalForm {
        driver: driver.id,
        ride: carpool_rides::RideForm {
            license_plate: car.license_plate.clone(),
            route: carpool_testing::fixtures::route(),
            start: now + Duration::hours(2),
            end: now + Duration::hours(6),
            price: carpool_testing::fixtures::price(1000),
            seat_map: carpool_testing::fixtures::two_by_two(),
            description: carpool_core::route::RideDesc::new("Baku to Ganja").unwrap(),
            rules: carpool_core::route::RideRules::default(),
        },
    };

    let request = service.propose_ride(owner_user, form).await.unwrap();
    assert!(service.list_incoming_requests(driver_user).await.unwrap().is_empty());
    let accept = service.accept_request(driver_user, request.id).await;
    assert!(matches!(accept, Err(RideError::NotFound(_))));
}
