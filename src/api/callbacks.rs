//! Gateway-facing callback endpoint
//!
//! POST /api/payments/mpesa/callback. The gateway expects nothing but an
//! acknowledgement: internal failures are logged, never surfaced, and
//! the response is always a 200 with `ResultCode: 0`.

use crate::payments::types::CallbackEnvelope;
use crate::services::payment_orchestrator::PaymentOrchestrator;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Clone)]
pub struct CallbackState {
    pub orchestrator: Arc<PaymentOrchestrator>,
}

fn ack() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({"ResultCode": 0, "ResultDesc": "Accepted"})),
    )
}

/// POST /api/payments/mpesa/callback
///
/// The body is taken raw so even a malformed delivery gets its
/// acknowledgement instead of an extractor rejection.
pub async fn handle_mpesa_callback(
    State(state): State<CallbackState>,
    body: String,
) -> impl IntoResponse {
    let envelope: CallbackEnvelope = match serde_json::from_str(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(error = %e, "malformed gateway callback payload");
            return ack().into_response();
        }
    };

    let checkout_request_id = envelope.body.stk_callback.checkout_request_id.clone();
    match state.orchestrator.handle_callback(envelope).await {
        Ok(outcome) => {
            info!(
                checkout_request_id = %checkout_request_id,
                outcome = ?outcome,
                "gateway callback processed"
            );
        }
        Err(e) => {
            // UnknownCorrelation lands here too; the gateway still gets
            // its acknowledgement
            error!(
                checkout_request_id = %checkout_request_id,
                error = %e,
                "gateway callback processing failed"
            );
        }
    }

    ack().into_response()
}
