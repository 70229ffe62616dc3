//! Booking through the service: pricing, seat conflicts and racing riders.

#![allow(clippy::unwrap_used)] // Tests can unwrap

mod common;

use carpool_core::ids::{RideId, UserId};
use carpool_core::pagination::PageRequest;
use carpool_core::seat_map::{PassengerSeat, SeatStatus};
use carpool_rides::RideError;
use carpool_testing::fixtures;
use common::Harness;
use rust_decimal::Decimal;

#[tokio::test]
async fn test_booking_two_seats_prices_contract_and_fee() {
    let harness = Harness::new();
    let (_driver, ride) = harness.published_ride().await;
    let rider = UserId::new();

    let contract = harness
        .service
        .book(rider, ride.id(), fixtures::seats(&[1, 2]))
        .await
        .unwrap();

    assert_eq!(contract.total_price().unwrap().amount(), Decimal::new(2000, 2));
    assert_eq!(contract.rider(), rider);

    let stored = harness.store.snapshot(ride.id()).unwrap();
    assert_eq!(stored.fee().amount(), Decimal::new(40, 2));
    assert_eq!(stored.seat_map().occupied_indexes(), vec![1, 2]);
    assert!(stored.has_active_contract());
    assert_eq!(stored.version(), 1);
    assert_eq!(harness.store.contract_count(), 1);
}

#[tokio::test]
async fn test_taken_seat_rejects_whole_batch() {
    let harness = Harness::new();
    let (_driver, ride) = harness.published_ride().await;

    harness
        .service
        .book(UserId::new(), ride.id(), fixtures::seats(&[2]))
        .await
        .unwrap();

    let err = harness
        .service
        .book(UserId::new(), ride.id(), fixtures::seats(&[1, 2]))
        .await
        .unwrap_err();
    assert!(matches!(err, RideError::StateConflict(_)));

    let stored = harness.store.snapshot(ride.id()).unwrap();
    assert_eq!(stored.seat_map().occupied_indexes(), vec![2]);
    assert_eq!(harness.store.contract_count(), 1);
}

#[tokio::test]
async fn test_driver_seat_and_out_of_range_are_validation_errors() {
    let harness = Harness::new();
    let (_driver, ride) = harness.published_ride().await;

    let driver_seat = harness
        .service
        .book(UserId::new(), ride.id(), fixtures::seats(&[0]))
        .await
        .unwrap_err();
    assert!(matches!(driver_seat, RideError::Validation(_)));

    let outside = harness
        .service
        .book(UserId::new(), ride.id(), fixtures::seats(&[9]))
        .await
        .unwrap_err();
    assert!(matches!(outside, RideError::Validation(_)));
    assert_eq!(harness.store.contract_count(), 0);
}

#[tokio::test]
async fn test_booking_unknown_ride_is_not_found() {
    let harness = Harness::new();
    let err = harness
        .service
        .book(UserId::new(), RideId::new(), fixtures::seats(&[1]))
        .await
        .unwrap_err();
    assert!(matches!(err, RideError::NotFound(_)));
}

#[tokio::test]
async fn test_booking_after_departure_is_a_conflict() {
    let harness = Harness::new();
    let (driver, ride) = harness.published_ride().await;
    harness.service.start_ride(driver.user, ride.id()).await.unwrap();

    let err = harness
        .service
        .book(UserId::new(), ride.id(), fixtures::seats(&[1]))
        .await
        .unwrap_err();
    assert!(matches!(err, RideError::StateConflict(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_overlapping_bookings_have_one_winner() {
    let harness = Harness::new();
    let (_driver, ride) = harness.published_ride().await;
    let ride_id = ride.id();

    let first = {
        let service = harness.service.clone();
        tokio::spawn(async move { service.book(UserId::new(), ride_id, fixtures::seats(&[1, 2])).await })
    };
    let second = {
        let service = harness.service.clone();
        tokio::spawn(async move { service.book(UserId::new(), ride_id, fixtures::seats(&[2, 3])).await })
    };

    let (first, second) = (first.await.unwrap(), second.await.unwrap());
    let winners: Vec<_> = [&first, &second].into_iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1, "exactly one booking must win");

    let loser = [&first, &second]
        .into_iter()
        .find_map(|r| r.as_ref().err())
        .unwrap();
    assert!(matches!(loser, RideError::StateConflict(_)));

    let mut expected: Vec<usize> = winners[0].booked_seats().iter().map(PassengerSeat::index).collect();
    expected.sort_unstable();
    let stored = harness.store.snapshot(ride_id).unwrap();
    assert_eq!(stored.seat_map().occupied_indexes(), expected);
    assert_eq!(harness.store.contract_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_disjoint_concurrent_bookings_all_land() {
    let harness = Harness::new();
    let (_driver, ride) = harness.published_ride().await;
    let ride_id = ride.id();

    let handles: Vec<_> = [1_usize, 2, 3]
        .into_iter()
        .map(|seat| {
            let service = harness.service.clone();
            tokio::spawn(async move {
                service
                    .book(UserId::new(), ride_id, fixtures::seats(&[seat]))
                    .await
            })
        })
        .collect();

    let results = futures::future::join_all(handles).await;
    let booked = results.into_iter().filter(|r| matches!(r, Ok(Ok(_)))).count();

    // A writer only retries after another one landed, so three attempts
    // cover three writers.
    assert_eq!(booked, 3);
    let stored = harness.store.snapshot(ride_id).unwrap();
    assert_eq!(stored.seat_map().occupied_indexes(), vec![1, 2, 3]);
    assert!(!stored.seat_map().has_available_seats());
    assert_eq!(harness.store.contract_count(), 3);
}

#[tokio::test]
async fn test_contract_queries() {
    let harness = Harness::new();
    let (driver, ride) = harness.published_ride().await;
    let rider = UserId::new();
    let other = UserId::new();

    let seat = PassengerSeat::new(3, SeatStatus::ChildOccupied).unwrap();
    let contract = harness
        .service
        .book(
            rider,
            ride.id(),
            carpool_core::seat_map::BookedSeats::new(vec![seat]).unwrap(),
        )
        .await
        .unwrap();

    let own = harness.service.contract(rider, contract.id()).await.unwrap();
    assert!(own.has_seat(3));
    assert!(matches!(
        harness.service.contract(other, contract.id()).await,
        Err(RideError::Forbidden(_))
    ));

    let page = PageRequest::default();
    assert_eq!(harness.service.contracts_for_user(rider, page).await.unwrap().len(), 1);
    assert_eq!(
        harness
            .service
            .contracts_for_ride(driver.user, ride.id(), page)
            .await
            .unwrap()
            .len(),
        1
    );
    assert_eq!(
        harness
            .service
            .contracts_for_ride(rider, ride.id(), page)
            .await
            .unwrap()
            .len(),
        1
    );
    assert!(matches!(
        harness.service.contracts_for_ride(other, ride.id(), page).await,
        Err(RideError::Forbidden(_))
    ));

    let trips = harness.service.rides_for_passenger(rider, page).await.unwrap();
    assert_eq!(trips.len(), 1);
    assert_eq!(trips[0].id, ride.id());
}
