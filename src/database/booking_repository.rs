use crate::database::error::{DatabaseError, DatabaseErrorKind};
use crate::database::repository::{Repository, TransactionalRepository};
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{types::BigDecimal, FromRow, PgPool};
use std::str::FromStr;
use uuid::Uuid;

/// Booking lifecycle states. `rejected` and `cancelled` are terminal and
/// release the dates; whether `pending` blocks new admissions is decided
/// by the admission service's configuration, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Rejected,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Rejected => "rejected",
            BookingStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "pending" => Ok(BookingStatus::Pending),
            "confirmed" | "approved" => Ok(BookingStatus::Confirmed),
            "rejected" => Ok(BookingStatus::Rejected),
            "cancelled" | "canceled" => Ok(BookingStatus::Cancelled),
            other => Err(format!("unknown booking status: {}", other)),
        }
    }
}

/// Booking entity
#[derive(Debug, Clone, FromRow)]
pub struct Booking {
    pub id: Uuid,
    pub user_id: Uuid,
    pub room_id: Uuid,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub guests: i32,
    pub total_price: BigDecimal,
    pub status: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Fields for a new admission insert; status is always `pending`.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub user_id: Uuid,
    pub room_id: Uuid,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub guests: i32,
    pub total_price: BigDecimal,
}

/// Result of the atomic check-and-insert
#[derive(Debug)]
pub enum AdmissionOutcome {
    Admitted(Booking),
    /// Room row vanished between validation and the locked re-check
    RoomMissing,
    /// A blocking booking overlaps the requested interval
    Overlap,
}

/// Repository for booking rows
pub struct BookingRepository {
    pool: PgPool,
}

impl BookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Atomically admit a booking.
    ///
    /// Takes a row-level lock on the room, re-checks for overlapping
    /// bookings in a blocking status, and inserts, all in one
    /// transaction. Concurrent admissions for the same room serialize on
    /// the lock, so two requests for overlapping dates can never both
    /// pass the check.
    ///
    /// Overlap is half-open: `[check_in, check_out)`, so a check-out on
    /// the day of another booking's check-in does not conflict.
    pub async fn insert_if_vacant(
        &self,
        new: &NewBooking,
        blocking_statuses: &[String],
    ) -> Result<AdmissionOutcome, DatabaseError> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from_sqlx)?;

        let locked: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM rooms WHERE id = $1 FOR UPDATE")
                .bind(new.room_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(DatabaseError::from_sqlx)?;

        if locked.is_none() {
            tx.rollback().await.map_err(DatabaseError::from_sqlx)?;
            return Ok(AdmissionOutcome::RoomMissing);
        }

        let conflict: Option<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM bookings
             WHERE room_id = $1
               AND status = ANY($2)
               AND check_in < $3
               AND check_out > $4
             LIMIT 1",
        )
        .bind(new.room_id)
        .bind(blocking_statuses)
        .bind(new.check_out)
        .bind(new.check_in)
        .fetch_optional(&mut *tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        if conflict.is_some() {
            tx.rollback().await.map_err(DatabaseError::from_sqlx)?;
            return Ok(AdmissionOutcome::Overlap);
        }

        let booking = sqlx::query_as::<_, Booking>(
            "INSERT INTO bookings (user_id, room_id, check_in, check_out, guests, total_price, status)
             VALUES ($1, $2, $3, $4, $5, $6, 'pending')
             RETURNING id, user_id, room_id, check_in, check_out, guests, total_price,
                       status, created_at, updated_at",
        )
        .bind(new.user_id)
        .bind(new.room_id)
        .bind(new.check_in)
        .bind(new.check_out)
        .bind(new.guests)
        .bind(&new.total_price)
        .fetch_one(&mut *tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        tx.commit().await.map_err(DatabaseError::from_sqlx)?;
        Ok(AdmissionOutcome::Admitted(booking))
    }

    pub async fn find_by_uuid(&self, id: Uuid) -> Result<Option<Booking>, DatabaseError> {
        sqlx::query_as::<_, Booking>(
            "SELECT id, user_id, room_id, check_in, check_out, guests, total_price,
                    status, created_at, updated_at
             FROM bookings WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Booking>, DatabaseError> {
        sqlx::query_as::<_, Booking>(
            "SELECT id, user_id, room_id, check_in, check_out, guests, total_price,
                    status, created_at, updated_at
             FROM bookings WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Guarded `pending -> confirmed` transition. Returns `None` when the
    /// booking is absent or already out of `pending`; callers decide
    /// whether that is an error.
    pub async fn confirm_if_pending(&self, id: Uuid) -> Result<Option<Booking>, DatabaseError> {
        sqlx::query_as::<_, Booking>(
            "UPDATE bookings
             SET status = 'confirmed', updated_at = NOW()
             WHERE id = $1 AND status = 'pending'
             RETURNING id, user_id, room_id, check_in, check_out, guests, total_price,
                       status, created_at, updated_at",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}

#[async_trait]
impl Repository for BookingRepository {
    type Entity = Booking;

    async fn find_by_id(&self, id: &str) -> Result<Option<Self::Entity>, DatabaseError> {
        let uuid = Uuid::parse_str(id).map_err(|e| {
            DatabaseError::new(DatabaseErrorKind::Unknown {
                message: format!("Invalid UUID: {}", e),
            })
        })?;
        self.find_by_uuid(uuid).await
    }
}

impl TransactionalRepository for BookingRepository {
    fn pool(&self) -> &PgPool {
        &self.pool
    }
}
