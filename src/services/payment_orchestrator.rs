//! Payment orchestrator service
//!
//! Drives the mobile-money state machine: `pending -> completed` or
//! `pending -> failed`, nothing else. Initiation creates the pending row
//! and sends the STK push; the asynchronous gateway callback delivers
//! the terminal verdict. All terminal transitions are guarded updates in
//! the repository, so redelivered or contradictory callbacks can never
//! flip a finished payment.

use crate::database::booking_repository::BookingRepository;
use crate::database::payment_repository::{NewPayment, Payment, PaymentRepository};
use crate::error::{AppError, AppResult, DomainError, ValidationError};
use crate::middleware::auth::AuthenticatedUser;
use crate::payments::types::{CallbackEnvelope, PhoneNumber, StkQueryResponse};
use crate::payments::{DarajaClient, PaymentError, StkPushParams};
use bigdecimal::{BigDecimal, RoundingMode, ToPrimitive};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Inputs for one payment initiation.
#[derive(Debug, Clone)]
pub struct InitiatePaymentRequest {
    pub phone_number: String,
    pub amount: BigDecimal,
    pub description: String,
    /// Loose link back to a booking; free text by design.
    pub reference: Option<String>,
}

/// What the callback handler did with a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackOutcome {
    Completed,
    Failed,
    /// The payment was already terminal; the delivery was a no-op.
    AlreadyFinal,
    /// Success payload without a receipt number; left untouched.
    MissingReceipt,
}

pub struct PaymentOrchestrator {
    payments: Arc<PaymentRepository>,
    bookings: Arc<BookingRepository>,
    gateway: Arc<DarajaClient>,
}

impl PaymentOrchestrator {
    pub fn new(
        payments: Arc<PaymentRepository>,
        bookings: Arc<BookingRepository>,
        gateway: Arc<DarajaClient>,
    ) -> Self {
        Self {
            payments,
            bookings,
            gateway,
        }
    }

    /// Create a pending payment and push it to the payer's phone.
    ///
    /// Failure handling follows the gateway contract:
    /// - token fetch fails: the row stays `pending`; re-initiation makes
    ///   a fresh row, there is no automatic retry of this one
    /// - synchronous rejection: the row is marked `failed` so the
    ///   attempt stays auditable
    /// - transport failure or timeout: outcome unknown, the row stays
    ///   `pending` and the callback or a status query settles it
    pub async fn initiate_payment(
        &self,
        user_id: Uuid,
        request: InitiatePaymentRequest,
    ) -> AppResult<Payment> {
        if request.amount <= BigDecimal::from(0) {
            return Err(AppError::validation(ValidationError::InvalidAmount {
                amount: request.amount.to_string(),
                reason: "amount must be greater than zero".to_string(),
            }));
        }
        let gateway_amount = amount_in_gateway_units(&request.amount).ok_or_else(|| {
            AppError::validation(ValidationError::InvalidAmount {
                amount: request.amount.to_string(),
                reason: "amount is too large for the gateway".to_string(),
            })
        })?;

        if request.description.trim().is_empty() {
            return Err(AppError::validation(ValidationError::MissingField {
                field: "description".to_string(),
            }));
        }

        let phone = PhoneNumber::normalize(
            &request.phone_number,
            &self.gateway.config().country_prefix,
        )
        .map_err(|reason| {
            AppError::validation(ValidationError::InvalidPhoneNumber {
                phone: request.phone_number.clone(),
                reason,
            })
        })?;

        let payment = self
            .payments
            .create_pending(&NewPayment {
                user_id,
                amount: request.amount.clone(),
                currency: self.gateway.config().currency.clone(),
                phone_number: phone.as_str().to_string(),
                reference: request.reference.clone(),
                description: request.description.clone(),
            })
            .await?;

        info!(payment_id = %payment.id, amount = %payment.amount, "payment initiated");

        let push = StkPushParams {
            phone_number: phone.into_string(),
            amount: gateway_amount,
            // the account reference points back at this payment so the
            // statement line can be traced to the local row
            account_reference: payment.id.to_string(),
            description: request.description,
        };

        match self.gateway.stk_push(&push).await {
            Ok(acceptance) => {
                let updated = self
                    .payments
                    .attach_gateway_ids(
                        payment.id,
                        &acceptance.checkout_request_id,
                        &acceptance.merchant_request_id,
                    )
                    .await?;
                match updated {
                    Some(payment) => Ok(payment),
                    None => {
                        // correlation id already set; only reachable if the same
                        // row was pushed twice, which initiation never does
                        error!(payment_id = %payment.id, "correlation id was already assigned");
                        self.payments
                            .find_by_uuid(payment.id)
                            .await?
                            .ok_or_else(|| {
                                AppError::domain(DomainError::PaymentNotFound {
                                    payment_id: payment.id.to_string(),
                                })
                            })
                    }
                }
            }
            Err(PaymentError::Rejected {
                message,
                gateway_code,
            }) => {
                warn!(payment_id = %payment.id, gateway_code = ?gateway_code, "gateway rejected push");
                self.payments.fail_if_pending(payment.id, &message).await?;
                Err(PaymentError::Rejected {
                    message,
                    gateway_code,
                }
                .into())
            }
            Err(e @ PaymentError::Auth { .. }) => {
                warn!(payment_id = %payment.id, error = %e, "gateway auth failed; payment left pending");
                Err(e.into())
            }
            Err(e) => {
                warn!(
                    payment_id = %payment.id,
                    error = %e,
                    "push outcome unknown; payment left pending for callback or status query"
                );
                Err(e.into())
            }
        }
    }

    /// Reconcile an asynchronous gateway callback.
    ///
    /// Idempotent under at-least-once delivery: only a `pending` row can
    /// transition, so redelivery, with the same or a contradictory
    /// result, observes a terminal row and no-ops.
    pub async fn handle_callback(&self, envelope: CallbackEnvelope) -> AppResult<CallbackOutcome> {
        let callback = envelope.body.stk_callback;

        let payment = self
            .payments
            .find_by_checkout_request_id(&callback.checkout_request_id)
            .await?
            .ok_or_else(|| {
                AppError::domain(DomainError::UnknownCorrelation {
                    checkout_request_id: callback.checkout_request_id.clone(),
                })
            })?;

        if callback.is_success() {
            let receipt = match callback.receipt_number() {
                Some(receipt) => receipt,
                None => {
                    error!(
                        payment_id = %payment.id,
                        checkout_request_id = %callback.checkout_request_id,
                        "success callback without a receipt number; payment left pending"
                    );
                    return Ok(CallbackOutcome::MissingReceipt);
                }
            };

            match self
                .payments
                .complete_if_pending(payment.id, &receipt)
                .await?
            {
                Some(completed) => {
                    info!(
                        payment_id = %completed.id,
                        receipt = %receipt,
                        "payment completed"
                    );
                    self.confirm_linked_booking(&completed).await;
                    Ok(CallbackOutcome::Completed)
                }
                None => {
                    info!(payment_id = %payment.id, status = %payment.status, "callback replay ignored; payment already terminal");
                    Ok(CallbackOutcome::AlreadyFinal)
                }
            }
        } else {
            match self
                .payments
                .fail_if_pending(payment.id, &callback.result_desc)
                .await?
            {
                Some(failed) => {
                    info!(
                        payment_id = %failed.id,
                        result_code = callback.result_code,
                        reason = %callback.result_desc,
                        "payment failed"
                    );
                    Ok(CallbackOutcome::Failed)
                }
                None => {
                    info!(payment_id = %payment.id, status = %payment.status, "callback replay ignored; payment already terminal");
                    Ok(CallbackOutcome::AlreadyFinal)
                }
            }
        }
    }

    /// Best-effort booking confirmation after completion. The link is a
    /// loose reference, so every failure here is logged and swallowed -
    /// the payment result is already committed.
    async fn confirm_linked_booking(&self, payment: &Payment) {
        let Some(reference) = payment.reference.as_deref() else {
            return;
        };
        let Some(booking_id) = booking_reference_id(reference) else {
            return;
        };

        match self.bookings.confirm_if_pending(booking_id).await {
            Ok(Some(booking)) => {
                info!(
                    booking_id = %booking.id,
                    payment_id = %payment.id,
                    "booking confirmed on payment completion"
                );
            }
            Ok(None) => {
                warn!(
                    booking_id = %booking_id,
                    payment_id = %payment.id,
                    "referenced booking was not pending; left unchanged"
                );
            }
            Err(e) => {
                error!(
                    booking_id = %booking_id,
                    payment_id = %payment.id,
                    error = %e,
                    "failed to confirm referenced booking"
                );
            }
        }
    }

    /// Fetch one payment; only the owning user or an admin may view it.
    pub async fn get_payment_status(
        &self,
        payment_id: Uuid,
        requester: &AuthenticatedUser,
    ) -> AppResult<Payment> {
        let payment = self
            .payments
            .find_by_uuid(payment_id)
            .await?
            .ok_or_else(|| {
                AppError::domain(DomainError::PaymentNotFound {
                    payment_id: payment_id.to_string(),
                })
            })?;

        if !requester.may_view(payment.user_id) {
            return Err(AppError::domain(DomainError::Forbidden {
                reason: "Only the payment owner or an admin may view this payment".to_string(),
            }));
        }

        Ok(payment)
    }

    pub async fn list_payment_history(&self, user_id: Uuid) -> AppResult<Vec<Payment>> {
        Ok(self.payments.list_for_user(user_id).await?)
    }

    /// Ask the gateway for its view of a push. Read only; local state
    /// keeps being driven by the callback, never by this query.
    pub async fn query_gateway_status(
        &self,
        payment_id: Uuid,
        requester: &AuthenticatedUser,
    ) -> AppResult<StkQueryResponse> {
        let payment = self.get_payment_status(payment_id, requester).await?;

        let checkout_request_id =
            payment
                .checkout_request_id
                .as_deref()
                .ok_or_else(|| {
                    AppError::validation(ValidationError::MissingField {
                        field: "checkout_request_id".to_string(),
                    })
                })?;

        Ok(self.gateway.stk_query(checkout_request_id).await?)
    }
}

/// The gateway takes whole currency units; fractional amounts round up
/// so the payer is never prompted for less than the owed total.
pub fn amount_in_gateway_units(amount: &BigDecimal) -> Option<u64> {
    amount.with_scale_round(0, RoundingMode::Ceiling).to_u64()
}

/// Extract a booking id from the free-text payment reference. Accepts a
/// bare UUID or the `BOOKING-<uuid>` form the booking UI writes.
pub fn booking_reference_id(reference: &str) -> Option<Uuid> {
    let candidate = reference
        .trim()
        .strip_prefix("BOOKING-")
        .unwrap_or(reference.trim());
    Uuid::parse_str(candidate).ok()
}
