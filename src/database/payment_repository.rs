use crate::database::error::{DatabaseError, DatabaseErrorKind};
use crate::database::repository::{Repository, TransactionalRepository};
use async_trait::async_trait;
use sqlx::{types::BigDecimal, FromRow, PgPool};
use std::str::FromStr;
use uuid::Uuid;

/// Payment lifecycle states. `completed` and `failed` are terminal;
/// every mutation below is guarded so a terminal row never changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentStatus::Completed | PaymentStatus::Failed)
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "pending" => Ok(PaymentStatus::Pending),
            "completed" => Ok(PaymentStatus::Completed),
            "failed" => Ok(PaymentStatus::Failed),
            "cancelled" | "canceled" => Ok(PaymentStatus::Cancelled),
            other => Err(format!("unknown payment status: {}", other)),
        }
    }
}

/// Payment entity. `checkout_request_id` is the gateway correlation key,
/// assigned exactly once at initiation; `mpesa_receipt_number` is set
/// only on the completed transition.
#[derive(Debug, Clone, FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: BigDecimal,
    pub currency: String,
    pub method: String,
    pub status: String,
    pub phone_number: String,
    pub checkout_request_id: Option<String>,
    pub merchant_request_id: Option<String>,
    pub mpesa_receipt_number: Option<String>,
    pub reference: Option<String>,
    pub description: String,
    pub failure_reason: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Fields for a new payment insert; status is always `pending` and the
/// gateway ids are attached later.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub user_id: Uuid,
    pub amount: BigDecimal,
    pub currency: String,
    pub phone_number: String,
    pub reference: Option<String>,
    pub description: String,
}

/// Repository for payment rows
pub struct PaymentRepository {
    pool: PgPool,
}

impl PaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_pending(&self, new: &NewPayment) -> Result<Payment, DatabaseError> {
        sqlx::query_as::<_, Payment>(
            "INSERT INTO payments (user_id, amount, currency, method, status, phone_number, reference, description)
             VALUES ($1, $2, $3, 'mpesa', 'pending', $4, $5, $6)
             RETURNING id, user_id, amount, currency, method, status, phone_number,
                       checkout_request_id, merchant_request_id, mpesa_receipt_number,
                       reference, description, failure_reason, created_at, completed_at",
        )
        .bind(new.user_id)
        .bind(&new.amount)
        .bind(&new.currency)
        .bind(&new.phone_number)
        .bind(&new.reference)
        .bind(&new.description)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Attach the gateway correlation ids after a synchronous acceptance.
    /// Guarded on `checkout_request_id IS NULL` so the correlation key is
    /// assigned exactly once.
    pub async fn attach_gateway_ids(
        &self,
        id: Uuid,
        checkout_request_id: &str,
        merchant_request_id: &str,
    ) -> Result<Option<Payment>, DatabaseError> {
        sqlx::query_as::<_, Payment>(
            "UPDATE payments
             SET checkout_request_id = $2, merchant_request_id = $3
             WHERE id = $1 AND checkout_request_id IS NULL
             RETURNING id, user_id, amount, currency, method, status, phone_number,
                       checkout_request_id, merchant_request_id, mpesa_receipt_number,
                       reference, description, failure_reason, created_at, completed_at",
        )
        .bind(id)
        .bind(checkout_request_id)
        .bind(merchant_request_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Guarded `pending -> completed` transition; records the receipt and
    /// the completion timestamp. Returns `None` when the row is already
    /// terminal; redelivered callbacks land here and no-op.
    pub async fn complete_if_pending(
        &self,
        id: Uuid,
        receipt_number: &str,
    ) -> Result<Option<Payment>, DatabaseError> {
        sqlx::query_as::<_, Payment>(
            "UPDATE payments
             SET status = 'completed', mpesa_receipt_number = $2, completed_at = NOW()
             WHERE id = $1 AND status = 'pending'
             RETURNING id, user_id, amount, currency, method, status, phone_number,
                       checkout_request_id, merchant_request_id, mpesa_receipt_number,
                       reference, description, failure_reason, created_at, completed_at",
        )
        .bind(id)
        .bind(receipt_number)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Guarded `pending -> failed` transition; no receipt is recorded
    /// and `completed_at` stays null.
    pub async fn fail_if_pending(
        &self,
        id: Uuid,
        reason: &str,
    ) -> Result<Option<Payment>, DatabaseError> {
        sqlx::query_as::<_, Payment>(
            "UPDATE payments
             SET status = 'failed', failure_reason = $2
             WHERE id = $1 AND status = 'pending'
             RETURNING id, user_id, amount, currency, method, status, phone_number,
                       checkout_request_id, merchant_request_id, mpesa_receipt_number,
                       reference, description, failure_reason, created_at, completed_at",
        )
        .bind(id)
        .bind(reason)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// The correlation lookup used by the callback handler.
    pub async fn find_by_checkout_request_id(
        &self,
        checkout_request_id: &str,
    ) -> Result<Option<Payment>, DatabaseError> {
        sqlx::query_as::<_, Payment>(
            "SELECT id, user_id, amount, currency, method, status, phone_number,
                    checkout_request_id, merchant_request_id, mpesa_receipt_number,
                    reference, description, failure_reason, created_at, completed_at
             FROM payments WHERE checkout_request_id = $1",
        )
        .bind(checkout_request_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    pub async fn find_by_uuid(&self, id: Uuid) -> Result<Option<Payment>, DatabaseError> {
        sqlx::query_as::<_, Payment>(
            "SELECT id, user_id, amount, currency, method, status, phone_number,
                    checkout_request_id, merchant_request_id, mpesa_receipt_number,
                    reference, description, failure_reason, created_at, completed_at
             FROM payments WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Payment>, DatabaseError> {
        sqlx::query_as::<_, Payment>(
            "SELECT id, user_id, amount, currency, method, status, phone_number,
                    checkout_request_id, merchant_request_id, mpesa_receipt_number,
                    reference, description, failure_reason, created_at, completed_at
             FROM payments WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}

#[async_trait]
impl Repository for PaymentRepository {
    type Entity = Payment;

    async fn find_by_id(&self, id: &str) -> Result<Option<Self::Entity>, DatabaseError> {
        let uuid = Uuid::parse_str(id).map_err(|e| {
            DatabaseError::new(DatabaseErrorKind::Unknown {
                message: format!("Invalid UUID: {}", e),
            })
        })?;
        self.find_by_uuid(uuid).await
    }
}

impl TransactionalRepository for PaymentRepository {
    fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_are_completed_and_failed() {
        assert!(PaymentStatus::Completed.is_terminal());
        assert!(PaymentStatus::Failed.is_terminal());
        assert!(!PaymentStatus::Pending.is_terminal());
        assert!(!PaymentStatus::Cancelled.is_terminal());
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            PaymentStatus::Pending,
            PaymentStatus::Completed,
            PaymentStatus::Failed,
            PaymentStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<PaymentStatus>().unwrap(), status);
        }
    }
}
