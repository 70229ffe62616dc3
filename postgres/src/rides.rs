//! `PostgreSQL` ride repository.
//!
//! Writes to an existing ride are guarded by `WHERE id = $1 AND version = $2`
//! and bump the version. A concurrent writer blocks on the row lock, then
//! finds the version moved and affects zero rows.
//!
//! Publishing claims the car with `WHERE status = 'IDLE'` inside the same
//! transaction as the ride insert, and a terminal status write releases car
//! and driver inside its own.

use crate::{db_error, decode_error};
use carpool_core::contract::RideContract;
use carpool_core::fleet::{CarStatus, DriverStatus};
use carpool_core::ids::{CarId, DriverId, OwnerId, RideId, UserId};
use carpool_core::money::{Fee, Price};
use carpool_core::pagination::PageRequest;
use carpool_core::repository::{NEARBY_DISTANCE_SQUARED, RideRepository, StoreError};
use carpool_core::ride::{Dates, Ride, RideOwner, RideParts, RideStatus, RideSummary};
use carpool_core::route::{Location, RideDesc, RideRules, RideTime, Route};
use carpool_core::seat_map::SeatMap;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use uuid::Uuid;

const RIDE_COLUMNS: &str = r"
    id, car_id, driver_id, owner_id,
    from_description, from_latitude, from_longitude,
    to_description, to_latitude, to_longitude,
    start_time, end_time, price, seats, status, description, rules,
    created_at, last_updated, has_active_contract, fee, version
";

/// `PostgreSQL` ride repository.
#[derive(Clone)]
pub struct PostgresRideRepository {
    pool: PgPool,
}

impl PostgresRideRepository {
    /// Create a new repository over `pool`.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn conflict(ride: &Ride) -> StoreError {
        metrics::counter!("carpool.postgres.version_conflicts").increment(1);
        tracing::debug!(
            ride_id = %ride.id(),
            expected_version = ride.version(),
            "Ride version moved, write rejected"
        );
        StoreError::ConcurrencyConflict {
            ride: ride.id(),
            expected: ride.version(),
        }
    }

    fn row_to_ride(row: &PgRow) -> Result<Ride, StoreError> {
        let location = |prefix: &str| -> Result<Location, StoreError> {
            Location::new(
                row.try_get::<String, _>(format!("{prefix}_description").as_str())
                    .map_err(db_error)?,
                row.try_get::<f64, _>(format!("{prefix}_latitude").as_str())
                    .map_err(db_error)?,
                row.try_get::<f64, _>(format!("{prefix}_longitude").as_str())
                    .map_err(db_error)?,
            )
            .map_err(decode_error)
        };

        let driver: Uuid = row.try_get("driver_id").map_err(db_error)?;
        let owner: Option<Uuid> = row.try_get("owner_id").map_err(db_error)?;
        let status: String = row.try_get("status").map_err(db_error)?;
        let seats: Json<SeatMap> = row.try_get("seats").map_err(db_error)?;
        let rules: Json<RideRules> = row.try_get("rules").map_err(db_error)?;
        let price: Decimal = row.try_get("price").map_err(db_error)?;
        let fee: Decimal = row.try_get("fee").map_err(db_error)?;

        Ok(Ride::restore(RideParts {
            id: RideId::from_uuid(row.try_get("id").map_err(db_error)?),
            car: CarId::from_uuid(row.try_get("car_id").map_err(db_error)?),
            owner: RideOwner {
                driver: DriverId::from_uuid(driver),
                owner: owner.map(OwnerId::from_uuid),
            },
            route: Route::new(location("from")?, location("to")?).map_err(decode_error)?,
            schedule: RideTime::restore(
                row.try_get("start_time").map_err(db_error)?,
                row.try_get("end_time").map_err(db_error)?,
            )
            .map_err(decode_error)?,
            price: Price::new(price).map_err(decode_error)?,
            seat_map: seats.0,
            status: RideStatus::parse(&status).map_err(decode_error)?,
            description: RideDesc::new(row.try_get::<String, _>("description").map_err(db_error)?)
                .map_err(decode_error)?,
            rules: rules.0,
            dates: Dates {
                created_at: row.try_get("created_at").map_err(db_error)?,
                last_updated: row.try_get("last_updated").map_err(db_error)?,
            },
            has_active_contract: row.try_get("has_active_contract").map_err(db_error)?,
            fee: Fee::new(fee).map_err(decode_error)?,
            version: row.try_get("version").map_err(db_error)?,
        }))
    }

    fn row_to_summary(row: &PgRow) -> Result<RideSummary, StoreError> {
        Self::row_to_ride(row).map(|ride| RideSummary::from(&ride))
    }

    async fn fetch_summaries(
        &self,
        query: sqlx::query::Query<'_, sqlx::Postgres, sqlx::postgres::PgArguments>,
    ) -> Result<Vec<RideSummary>, StoreError> {
        let rows = query.fetch_all(&self.pool).await.map_err(db_error)?;
        rows.iter().map(Self::row_to_summary).collect()
    }

    fn day_bounds(date: NaiveDate) -> Result<(DateTime<Utc>, DateTime<Utc>), StoreError> {
        let midnight = date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| StoreError::Serialization(format!("invalid date {date}")))?;
        let start = Utc.from_utc_datetime(&midnight);
        Ok((start, start + Duration::days(1)))
    }

    async fn insert<'e, E>(executor: E, ride: &Ride) -> Result<(), StoreError>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let route = ride.route();
        sqlx::query(
            r"
            INSERT INTO rides (
                id, car_id, driver_id, owner_id,
                from_description, from_latitude, from_longitude,
                to_description, to_latitude, to_longitude,
                start_time, end_time, price, seats, status, description, rules,
                created_at, last_updated, has_active_contract, fee, version
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11,
                $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22
            )
            ",
        )
        .bind(ride.id().as_uuid())
        .bind(ride.car().as_uuid())
        .bind(ride.owner().driver.as_uuid())
        .bind(ride.owner().owner.map(|o| *o.as_uuid()))
        .bind(route.from().description())
        .bind(route.from().latitude())
        .bind(route.from().longitude())
        .bind(route.to().description())
        .bind(route.to().latitude())
        .bind(route.to().longitude())
        .bind(ride.schedule().start())
        .bind(ride.schedule().end())
        .bind(ride.price().amount())
        .bind(Json(ride.seat_map()))
        .bind(ride.status().as_str())
        .bind(ride.description().as_str())
        .bind(Json(ride.rules()))
        .bind(ride.dates().created_at)
        .bind(ride.dates().last_updated)
        .bind(ride.has_active_contract())
        .bind(ride.fee().amount())
        .bind(ride.version())
        .execute(executor)
        .await
        .map_err(db_error)?;
        Ok(())
    }
}

impl RideRepository for PostgresRideRepository {
    async fn save(&self, ride: &Ride) -> Result<(), StoreError> {
        Self::insert(&self.pool, ride).await?;
        tracing::info!(ride_id = %ride.id(), driver_id = %ride.owner().driver, "Ride stored");
        Ok(())
    }

    async fn publish(&self, ride: &Ride) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let claimed = sqlx::query("UPDATE cars SET status = $2 WHERE id = $1 AND status = $3")
            .bind(ride.car().as_uuid())
            .bind(CarStatus::OnTheRoad.as_str())
            .bind(CarStatus::Idle.as_str())
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        if claimed.rows_affected() == 0 {
            let exists = sqlx::query("SELECT 1 FROM cars WHERE id = $1")
                .bind(ride.car().as_uuid())
                .fetch_optional(&mut *tx)
                .await
                .map_err(db_error)?;
            return Err(match exists {
                Some(_) => StoreError::CarUnavailable(ride.car()),
                None => StoreError::NotFound(format!("car {}", ride.car())),
            });
        }

        let driver = sqlx::query("UPDATE drivers SET status = $2 WHERE id = $1")
            .bind(ride.owner().driver.as_uuid())
            .bind(DriverStatus::OnTheRoad.as_str())
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        if driver.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("driver {}", ride.owner().driver)));
        }

        Self::insert(&mut *tx, ride).await?;
        tx.commit().await.map_err(db_error)?;

        tracing::info!(
            ride_id = %ride.id(),
            driver_id = %ride.owner().driver,
            car_id = %ride.car(),
            "Ride published"
        );
        Ok(())
    }

    async fn find_by(&self, id: RideId) -> Result<Option<Ride>, StoreError> {
        let row = sqlx::query(&format!("SELECT {RIDE_COLUMNS} FROM rides WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

        row.as_ref().map(Self::row_to_ride).transpose()
    }

    async fn update_seats(&self, ride: &Ride, contract: &RideContract) -> Result<i64, StoreError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let result = sqlx::query(
            r"
            UPDATE rides
            SET seats = $3,
                fee = $4,
                has_active_contract = $5,
                last_updated = $6,
                version = version + 1
            WHERE id = $1 AND version = $2
            ",
        )
        .bind(ride.id().as_uuid())
        .bind(ride.version())
        .bind(Json(ride.seat_map()))
        .bind(ride.fee().amount())
        .bind(ride.has_active_contract())
        .bind(ride.dates().last_updated)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            // tx is rolled back on drop
            return Err(Self::conflict(ride));
        }

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
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        tx.commit().await.map_err(db_error)?;

        tracing::info!(
            ride_id = %ride.id(),
            contract_id = %contract.id(),
            seats = contract.booked_seats().len(),
            "Booking committed"
        );
        Ok(ride.version() + 1)
    }

    async fn update_status(&self, ride: &Ride) -> Result<i64, StoreError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let result = sqlx::query(
            r"
            UPDATE rides
            SET status = $3, last_updated = $4, version = version + 1
            WHERE id = $1 AND version = $2
            ",
        )
        .bind(ride.id().as_uuid())
        .bind(ride.version())
        .bind(ride.status().as_str())
        .bind(ride.dates().last_updated)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(Self::conflict(ride));
        }

        if !ride.is_active() {
            sqlx::query("UPDATE cars SET status = $2 WHERE id = $1 AND status = $3")
                .bind(ride.car().as_uuid())
                .bind(CarStatus::Idle.as_str())
                .bind(CarStatus::OnTheRoad.as_str())
                .execute(&mut *tx)
                .await
                .map_err(db_error)?;

            sqlx::query(
                r"
                UPDATE drivers
                SET status = $2, total_rides = total_rides + $3
                WHERE id = $1
                ",
            )
            .bind(ride.owner().driver.as_uuid())
            .bind(DriverStatus::Available.as_str())
            .bind(i64::from(ride.is_finished()))
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        }

        tx.commit().await.map_err(db_error)?;

        if !ride.is_active() {
            tracing::info!(
                ride_id = %ride.id(),
                car_id = %ride.car(),
                driver_id = %ride.owner().driver,
                status = %ride.status(),
                "Car and driver released"
            );
        }
        Ok(ride.version() + 1)
    }

    async fn update_rules(&self, ride: &Ride) -> Result<i64, StoreError> {
        let result = sqlx::query(
            r"
            UPDATE rides
            SET rules = $3, last_updated = $4, version = version + 1
            WHERE id = $1 AND version = $2
            ",
        )
        .bind(ride.id().as_uuid())
        .bind(ride.version())
        .bind(Json(ride.rules()))
        .bind(ride.dates().last_updated)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(Self::conflict(ride));
        }
        Ok(ride.version() + 1)
    }

    async fn page_by_passenger(&self, user: UserId, page: PageRequest) -> Result<Vec<RideSummary>, StoreError> {
        let sql = format!(
            r"
            SELECT {RIDE_COLUMNS} FROM rides
            WHERE id IN (SELECT ride_id FROM ride_contracts WHERE user_id = $1)
            ORDER BY start_time DESC, id
            LIMIT $2 OFFSET $3
            "
        );
        self.fetch_summaries(
            sqlx::query(&sql)
                .bind(user.as_uuid())
                .bind(page.limit())
                .bind(page.offset()),
        )
        .await
    }

    async fn page_by_driver(&self, driver: DriverId, page: PageRequest) -> Result<Vec<RideSummary>, StoreError> {
        let sql = format!(
            r"
            SELECT {RIDE_COLUMNS} FROM rides
            WHERE driver_id = $1
            ORDER BY start_time DESC, id
            LIMIT $2 OFFSET $3
            "
        );
        self.fetch_summaries(
            sqlx::query(&sql)
                .bind(driver.as_uuid())
                .bind(page.limit())
                .bind(page.offset()),
        )
        .await
    }

    async fn page_by_owner(&self, owner: OwnerId, page: PageRequest) -> Result<Vec<RideSummary>, StoreError> {
        let sql = format!(
            r"
            SELECT {RIDE_COLUMNS} FROM rides
            WHERE owner_id = $1
            ORDER BY start_time DESC, id
            LIMIT $2 OFFSET $3
            "
        );
        self.fetch_summaries(
            sqlx::query(&sql)
                .bind(owner.as_uuid())
                .bind(page.limit())
                .bind(page.offset()),
        )
        .await
    }

    async fn page_by_date(&self, date: NaiveDate, page: PageRequest) -> Result<Vec<RideSummary>, StoreError> {
        let (from, until) = Self::day_bounds(date)?;
        let sql = format!(
            r"
            SELECT {RIDE_COLUMNS} FROM rides
            WHERE status = $1 AND start_time >= $2 AND start_time < $3
            ORDER BY start_time ASC, id
            LIMIT $4 OFFSET $5
            "
        );
        self.fetch_summaries(
            sqlx::query(&sql)
                .bind(RideStatus::Pending.as_str())
                .bind(from)
                .bind(until)
                .bind(page.limit())
                .bind(page.offset()),
        )
        .await
    }

    async fn page_nearby(
        &self,
        from: &Location,
        to: &Location,
        date: NaiveDate,
        page: PageRequest,
    ) -> Result<Vec<RideSummary>, StoreError> {
        let (day, _) = Self::day_bounds(date)?;
        let sql = format!(
            r"
            SELECT {RIDE_COLUMNS} FROM rides
            WHERE status = $1
              AND start_time >= $2
              AND (from_latitude - $3) * (from_latitude - $3)
                + (from_longitude - $4) * (from_longitude - $4) <= $7
              AND (to_latitude - $5) * (to_latitude - $5)
                + (to_longitude - $6) * (to_longitude - $6) <= $7
            ORDER BY start_time ASC, id
            LIMIT $8 OFFSET $9
            "
        );
        self.fetch_summaries(
            sqlx::query(&sql)
                .bind(RideStatus::Pending.as_str())
                .bind(day)
                .bind(from.latitude())
                .bind(from.longitude())
                .bind(to.latitude())
                .bind(to.longitude())
                .bind(NEARBY_DISTANCE_SQUARED)
                .bind(page.limit())
                .bind(page.offset()),
        )
        .await
    }
}
