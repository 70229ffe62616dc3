//! `PostgreSQL` fleet directory.
//!
//! Registration lives with the identity side of the platform; the
//! `register_*` helpers exist for provisioning and tests.

use crate::{db_error, decode_error};
use carpool_core::fleet::{Car, CarStatus, Driver, DriverStatus, LicensePlate, Owner};
use carpool_core::ids::{CarId, DriverId, OwnerId, UserId};
use carpool_core::pagination::PageRequest;
use carpool_core::rating::{DriverRating, Score};
use carpool_core::repository::{FleetDirectory, StoreError};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

const DRIVER_COLUMNS: &str = "id, user_id, status, total_rides, rating_reviews, rating_score_sum";
const CAR_COLUMNS: &str = "id, owner_user_id, license_plate, status";

/// `PostgreSQL` fleet directory.
#[derive(Clone)]
pub struct PostgresFleetDirectory {
    pool: PgPool,
}

impl PostgresFleetDirectory {
    /// Create a new directory over `pool`.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a driver profile.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the insert fails.
    pub async fn register_driver(&self, driver: &Driver) -> Result<(), StoreError> {
        let (reviews, score_sum) = driver.rating.counts();
        sqlx::query(
            r"
            INSERT INTO drivers (id, user_id, status, total_rides, rating_reviews, rating_score_sum)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(driver.id.as_uuid())
        .bind(driver.user.as_uuid())
        .bind(driver.status.as_str())
        .bind(i64::from(driver.total_rides))
        .bind(i64::from(reviews))
        .bind(i64::from(score_sum))
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    /// Insert an owner profile.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the insert fails.
    pub async fn register_owner(&self, owner: &Owner) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO owners (id, user_id) VALUES ($1, $2)")
            .bind(owner.id.as_uuid())
            .bind(owner.user.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    /// Insert a car.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the insert fails, including a
    /// duplicate plate.
    pub async fn register_car(&self, car: &Car) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO cars (id, owner_user_id, license_plate, status) VALUES ($1, $2, $3, $4)",
        )
        .bind(car.id.as_uuid())
        .bind(car.owner.as_uuid())
        .bind(car.license_plate.as_str())
        .bind(car.status.as_str())
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    fn row_to_driver(row: &PgRow) -> Result<Driver, StoreError> {
        let counter = |column: &str| -> Result<u32, StoreError> {
            let value: i64 = row.try_get(column).map_err(db_error)?;
            u32::try_from(value).map_err(decode_error)
        };
        let status: String = row.try_get("status").map_err(db_error)?;
        Ok(Driver {
            id: DriverId::from_uuid(row.try_get("id").map_err(db_error)?),
            user: UserId::from_uuid(row.try_get("user_id").map_err(db_error)?),
            status: DriverStatus::parse(&status).map_err(decode_error)?,
            total_rides: counter("total_rides")?,
            rating: DriverRating::from_counts(counter("rating_reviews")?, counter("rating_score_sum")?),
        })
    }

    fn row_to_car(row: &PgRow) -> Result<Car, StoreError> {
        let plate: String = row.try_get("license_plate").map_err(db_error)?;
        let status: String = row.try_get("status").map_err(db_error)?;
        Ok(Car {
            id: CarId::from_uuid(row.try_get("id").map_err(db_error)?),
            owner: UserId::from_uuid(row.try_get("owner_user_id").map_err(db_error)?),
            license_plate: LicensePlate::new(plate).map_err(decode_error)?,
            status: CarStatus::parse(&status).map_err(decode_error)?,
        })
    }

    async fn fetch_driver(&self, column: &str, id: uuid::Uuid) -> Result<Option<Driver>, StoreError> {
        let row = sqlx::query(&format!("SELECT {DRIVER_COLUMNS} FROM drivers WHERE {column} = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        row.as_ref().map(Self::row_to_driver).transpose()
    }
}

impl FleetDirectory for PostgresFleetDirectory {
    async fn driver_of(&self, user: UserId) -> Result<Option<Driver>, StoreError> {
        self.fetch_driver("user_id", *user.as_uuid()).await
    }

    async fn driver(&self, id: DriverId) -> Result<Option<Driver>, StoreError> {
        self.fetch_driver("id", *id.as_uuid()).await
    }

    async fn owner_of(&self, user: UserId) -> Result<Option<Owner>, StoreError> {
        let row = sqlx::query("SELECT id, user_id FROM owners WHERE user_id = $1")
            .bind(user.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        row.map(|row| {
            Ok(Owner {
                id: OwnerId::from_uuid(row.try_get("id").map_err(db_error)?),
                user: UserId::from_uuid(row.try_get("user_id").map_err(db_error)?),
            })
        })
        .transpose()
    }

    async fn car_by_plate(&self, plate: &LicensePlate) -> Result<Option<Car>, StoreError> {
        let row = sqlx::query(&format!("SELECT {CAR_COLUMNS} FROM cars WHERE license_plate = $1"))
            .bind(plate.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        row.as_ref().map(Self::row_to_car).transpose()
    }

    async fn car(&self, id: CarId) -> Result<Option<Car>, StoreError> {
        let row = sqlx::query(&format!("SELECT {CAR_COLUMNS} FROM cars WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        row.as_ref().map(Self::row_to_car).transpose()
    }

    async fn available_drivers(&self, page: PageRequest) -> Result<Vec<Driver>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {DRIVER_COLUMNS} FROM drivers WHERE status = $1 ORDER BY id LIMIT $2 OFFSET $3"
        ))
        .bind(DriverStatus::Available.as_str())
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        rows.iter().map(Self::row_to_driver).collect()
    }

    async fn record_rating(
        &self,
        driver: DriverId,
        score: Score,
    ) -> Result<DriverRating, StoreError> {
        let row = sqlx::query(
            r"
            UPDATE drivers
            SET rating_reviews = rating_reviews + 1, rating_score_sum = rating_score_sum + $2
            WHERE id = $1
            RETURNING rating_reviews, rating_score_sum
            ",
        )
        .bind(driver.as_uuid())
        .bind(i64::from(score.value()))
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?
        .ok_or_else(|| StoreError::NotFound(format!("driver {driver}")))?;

        let counter = |column: &str| -> Result<u32, StoreError> {
            let value: i64 = row.try_get(column).map_err(db_error)?;
            u32::try_from(value).map_err(decode_error)
        };
        Ok(DriverRating::from_counts(counter("rating_reviews")?, counter("rating_score_sum")?))
    }
}
