//! Payment endpoints: POST /api/payments/initiate, GET /api/payments,
//! GET /api/payments/:id, POST /api/payments/:id/query

use crate::database::payment_repository::Payment;
use crate::error::AppError;
use crate::middleware::auth::AuthenticatedUser;
use crate::payments::types::StkQueryResponse;
use crate::services::payment_orchestrator::{InitiatePaymentRequest, PaymentOrchestrator};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct PaymentsState {
    pub orchestrator: Arc<PaymentOrchestrator>,
}

#[derive(Debug, Deserialize)]
pub struct InitiatePaymentBody {
    pub phone_number: String,
    pub amount: BigDecimal,
    pub description: String,
    #[serde(default)]
    pub reference: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: BigDecimal,
    pub currency: String,
    pub method: String,
    pub status: String,
    pub phone_number: String,
    pub checkout_request_id: Option<String>,
    pub mpesa_receipt_number: Option<String>,
    pub reference: Option<String>,
    pub description: String,
    pub failure_reason: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<Payment> for PaymentResponse {
    fn from(payment: Payment) -> Self {
        Self {
            id: payment.id,
            user_id: payment.user_id,
            amount: payment.amount,
            currency: payment.currency,
            method: payment.method,
            status: payment.status,
            phone_number: payment.phone_number,
            checkout_request_id: payment.checkout_request_id,
            mpesa_receipt_number: payment.mpesa_receipt_number,
            reference: payment.reference,
            description: payment.description,
            failure_reason: payment.failure_reason,
            created_at: payment.created_at,
            completed_at: payment.completed_at,
        }
    }
}

/// POST /api/payments/initiate
pub async fn initiate_payment(
    State(state): State<PaymentsState>,
    requester: AuthenticatedUser,
    Json(body): Json<InitiatePaymentBody>,
) -> Result<impl IntoResponse, AppError> {
    let payment = state
        .orchestrator
        .initiate_payment(
            requester.id,
            InitiatePaymentRequest {
                phone_number: body.phone_number,
                amount: body.amount,
                description: body.description,
                reference: body.reference,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(PaymentResponse::from(payment))))
}

/// GET /api/payments: the requester's payment history, newest first
pub async fn list_payments(
    State(state): State<PaymentsState>,
    requester: AuthenticatedUser,
) -> Result<Json<Vec<PaymentResponse>>, AppError> {
    let payments = state
        .orchestrator
        .list_payment_history(requester.id)
        .await?;
    Ok(Json(
        payments.into_iter().map(PaymentResponse::from).collect(),
    ))
}

/// GET /api/payments/:id, owner or admin only
pub async fn get_payment(
    State(state): State<PaymentsState>,
    requester: AuthenticatedUser,
    Path(payment_id): Path<Uuid>,
) -> Result<Json<PaymentResponse>, AppError> {
    let payment = state
        .orchestrator
        .get_payment_status(payment_id, &requester)
        .await?;
    Ok(Json(PaymentResponse::from(payment)))
}

/// POST /api/payments/:id/query: ask the gateway for its view of the
/// push; does not mutate local state
pub async fn query_payment(
    State(state): State<PaymentsState>,
    requester: AuthenticatedUser,
    Path(payment_id): Path<Uuid>,
) -> Result<Json<StkQueryResponse>, AppError> {
    let status = state
        .orchestrator
        .query_gateway_status(payment_id, &requester)
        .await?;
    Ok(Json(status))
}
