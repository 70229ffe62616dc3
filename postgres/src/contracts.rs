//! `PostgreSQL` ride contract repository.

use crate::{db_error, decode_error};
use carpool_core::contract::RideContract;
use carpool_core::ids::{RideContractId, RideId, UserId};
use carpool_core::money::Price;
use carpool_core::pagination::PageRequest;
use carpool_core::repository::{RideContractRepository, StoreError};
use carpool_core::seat_map::BookedSeats;
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};

/// `PostgreSQL` contract repository.
#[derive(Clone)]
pub struct PostgresRideContractRepository {
    pool: PgPool,
}

impl PostgresRideContractRepository {
    /// Create a new repository over `pool`.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_contract(row: &PgRow) -> Result<RideContract, StoreError> {
        let price: Decimal = row.try_get("price_per_seat").map_err(db_error)?;
        let seats: Json<BookedSeats> = row.try_get("booked_seats").map_err(db_error)?;
        Ok(RideContract::restore(
            RideContractId::from_uuid(row.try_get("id").map_err(db_error)?),
            UserId::from_uuid(row.try_get("user_id").map_err(db_error)?),
            RideId::from_uuid(row.try_get("ride_id").map_err(db_error)?),
            Price::new(price).map_err(decode_error)?,
            seats.0,
        ))
    }
}

impl RideContractRepository for PostgresRideContractRepository {
    async fn save(&self, contract: &RideContract) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO ride_contracts (id, ride_id, user_id, price_per_seat, booked_seats)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(contract.id().as_uuid())
        .bind(contract.ride().as_uuid())
        .bind(contract.rider().as_uuid())
        .bind(contract.price_per_seat().amount())
        .bind(Json(contract.booked_seats()))
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn find_by(&self, id: RideContractId) -> Result<Option<RideContract>, StoreError> {
        let row = sqlx::query(
            r"
            SELECT id, ride_id, user_id, price_per_seat, booked_seats
            FROM ride_contracts
            WHERE id = $1
            ",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.as_ref().map(Self::row_to_contract).transpose()
    }

    async fn page_by_ride(&self, ride: RideId, page: PageRequest) -> Result<Vec<RideContract>, StoreError> {
        let rows = sqlx::query(
            r"
            SELECT id, ride_id, user_id, price_per_seat, booked_seats
            FROM ride_contracts
            WHERE ride_id = $1
            ORDER BY created_at ASC, id
            LIMIT $2 OFFSET $3
            ",
        )
        .bind(ride.as_uuid())
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.iter().map(Self::row_to_contract).collect()
    }

    async fn page_by_user(&self, user: UserId, page: PageRequest) -> Result<Vec<RideContract>, StoreError> {
        let rows = sqlx::query(
            r"
            SELECT id, ride_id, user_id, price_per_seat, booked_seats
            FROM ride_contracts
            WHERE user_id = $1
            ORDER BY created_at ASC, id
            LIMIT $2 OFFSET $3
            ",
        )
        .bind(user.as_uuid())
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.iter().map(Self::row_to_contract).collect()
    }

    async fn exists(&self, user: UserId, ride: RideId) -> Result<bool, StoreError> {
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM ride_contracts WHERE user_id = $1 AND ride_id = $2)",
        )
        .bind(user.as_uuid())
        .bind(ride.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(exists)
    }
}
