//! Unified error handling for the hostelpay backend
//!
//! Every failure surfaces as an [`AppError`] with an HTTP status mapping,
//! a machine-readable [`ErrorCode`] and a user-facing message. Booking
//! conflicts keep their own code and status (409) so clients can tell
//! "try different dates" apart from "fix your input".

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error codes for programmatic client handling
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorCode {
    // Domain errors (4xx)
    #[serde(rename = "ROOM_NOT_FOUND")]
    RoomNotFound,
    #[serde(rename = "BOOKING_NOT_FOUND")]
    BookingNotFound,
    #[serde(rename = "PAYMENT_NOT_FOUND")]
    PaymentNotFound,
    #[serde(rename = "INVALID_DATE_RANGE")]
    InvalidDateRange,
    #[serde(rename = "CAPACITY_EXCEEDED")]
    CapacityExceeded,
    #[serde(rename = "BOOKING_CONFLICT")]
    BookingConflict,
    #[serde(rename = "UNKNOWN_CORRELATION")]
    UnknownCorrelation,
    #[serde(rename = "FORBIDDEN")]
    Forbidden,
    #[serde(rename = "UNAUTHENTICATED")]
    Unauthenticated,

    // Infrastructure errors (5xx)
    #[serde(rename = "DATABASE_ERROR")]
    DatabaseError,
    #[serde(rename = "CONFIGURATION_ERROR")]
    ConfigurationError,

    // External errors (502, 503)
    #[serde(rename = "GATEWAY_AUTH_ERROR")]
    GatewayAuthError,
    #[serde(rename = "GATEWAY_REJECTED")]
    GatewayRejected,
    #[serde(rename = "GATEWAY_UNAVAILABLE")]
    GatewayUnavailable,

    // Generic
    #[serde(rename = "INTERNAL_ERROR")]
    InternalError,
    #[serde(rename = "VALIDATION_ERROR")]
    ValidationError,
}

/// Domain-specific business logic errors
#[derive(Debug, Clone)]
pub enum DomainError {
    /// Room referenced by a booking request doesn't exist
    RoomNotFound { room_id: String },
    /// Booking with the given id doesn't exist
    BookingNotFound { booking_id: String },
    /// Payment with the given id doesn't exist
    PaymentNotFound { payment_id: String },
    /// Check-in/check-out ordering or past-date violation
    InvalidDateRange { reason: String },
    /// Guest count exceeds the room's capacity
    CapacityExceeded { requested: i32, capacity: i32 },
    /// Requested dates overlap an existing blocking booking
    BookingConflict { room_id: String },
    /// Gateway callback carries a checkout request id we never issued
    UnknownCorrelation { checkout_request_id: String },
    /// Requester is not allowed to act on this resource
    Forbidden { reason: String },
}

/// Infrastructure-level errors (database, configuration)
#[derive(Debug, Clone)]
pub enum InfrastructureError {
    /// Database connection or query failure
    Database { message: String, is_retryable: bool },
    /// Missing or invalid configuration
    Configuration { message: String },
}

/// External service errors (the M-Pesa Daraja gateway)
#[derive(Debug, Clone)]
pub enum ExternalError {
    /// Could not obtain an OAuth access token from the gateway
    GatewayAuth { message: String },
    /// The gateway rejected the push request synchronously
    GatewayRejected {
        message: String,
        gateway_code: Option<String>,
    },
    /// Transport failure or timeout talking to the gateway
    GatewayUnavailable { message: String },
}

/// Input validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    /// Amount is not a positive number
    InvalidAmount { amount: String, reason: String },
    /// Phone number cannot be normalized to the canonical format
    InvalidPhoneNumber { phone: String, reason: String },
    /// Required field missing from the request
    MissingField { field: String },
    /// Identity headers missing or malformed on a protected route
    Unauthenticated { reason: String },
}

/// Unified application error type
#[derive(Debug, Clone)]
pub struct AppError {
    pub kind: AppErrorKind,
    pub request_id: Option<String>,
    pub context: Option<String>,
}

#[derive(Debug, Clone)]
pub enum AppErrorKind {
    Domain(DomainError),
    Infrastructure(InfrastructureError),
    External(ExternalError),
    Validation(ValidationError),
}

impl AppError {
    pub fn new(kind: AppErrorKind) -> Self {
        Self {
            kind,
            request_id: None,
            context: None,
        }
    }

    pub fn domain(err: DomainError) -> Self {
        Self::new(AppErrorKind::Domain(err))
    }

    pub fn validation(err: ValidationError) -> Self {
        Self::new(AppErrorKind::Validation(err))
    }

    pub fn external(err: ExternalError) -> Self {
        Self::new(AppErrorKind::External(err))
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Map error to HTTP status code
    pub fn status_code(&self) -> u16 {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::RoomNotFound { .. } => 404,
                DomainError::BookingNotFound { .. } => 404,
                DomainError::PaymentNotFound { .. } => 404,
                DomainError::InvalidDateRange { .. } => 400,
                DomainError::CapacityExceeded { .. } => 422,
                DomainError::BookingConflict { .. } => 409,
                DomainError::UnknownCorrelation { .. } => 404,
                DomainError::Forbidden { .. } => 403,
            },
            AppErrorKind::Infrastructure(err) => match err {
                InfrastructureError::Database { .. } => 500,
                InfrastructureError::Configuration { .. } => 500,
            },
            AppErrorKind::External(err) => match err {
                ExternalError::GatewayAuth { .. } => 502,
                ExternalError::GatewayRejected { .. } => 502,
                ExternalError::GatewayUnavailable { .. } => 503,
            },
            AppErrorKind::Validation(err) => match err {
                ValidationError::Unauthenticated { .. } => 401,
                _ => 400,
            },
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> ErrorCode {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::RoomNotFound { .. } => ErrorCode::RoomNotFound,
                DomainError::BookingNotFound { .. } => ErrorCode::BookingNotFound,
                DomainError::PaymentNotFound { .. } => ErrorCode::PaymentNotFound,
                DomainError::InvalidDateRange { .. } => ErrorCode::InvalidDateRange,
                DomainError::CapacityExceeded { .. } => ErrorCode::CapacityExceeded,
                DomainError::BookingConflict { .. } => ErrorCode::BookingConflict,
                DomainError::UnknownCorrelation { .. } => ErrorCode::UnknownCorrelation,
                DomainError::Forbidden { .. } => ErrorCode::Forbidden,
            },
            AppErrorKind::Infrastructure(err) => match err {
                InfrastructureError::Database { .. } => ErrorCode::DatabaseError,
                InfrastructureError::Configuration { .. } => ErrorCode::ConfigurationError,
            },
            AppErrorKind::External(err) => match err {
                ExternalError::GatewayAuth { .. } => ErrorCode::GatewayAuthError,
                ExternalError::GatewayRejected { .. } => ErrorCode::GatewayRejected,
                ExternalError::GatewayUnavailable { .. } => ErrorCode::GatewayUnavailable,
            },
            AppErrorKind::Validation(err) => match err {
                ValidationError::Unauthenticated { .. } => ErrorCode::Unauthenticated,
                _ => ErrorCode::ValidationError,
            },
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::RoomNotFound { room_id } => {
                    format!("Room '{}' not found", room_id)
                }
                DomainError::BookingNotFound { booking_id } => {
                    format!("Booking '{}' not found", booking_id)
                }
                DomainError::PaymentNotFound { payment_id } => {
                    format!("Payment '{}' not found", payment_id)
                }
                DomainError::InvalidDateRange { reason } => {
                    format!("Invalid date range: {}", reason)
                }
                DomainError::CapacityExceeded {
                    requested,
                    capacity,
                } => {
                    format!(
                        "Requested {} guests but the room sleeps at most {}",
                        requested, capacity
                    )
                }
                DomainError::BookingConflict { .. } => {
                    "Room is not available for the selected dates".to_string()
                }
                DomainError::UnknownCorrelation {
                    checkout_request_id,
                } => {
                    format!(
                        "No payment matches checkout request '{}'",
                        checkout_request_id
                    )
                }
                DomainError::Forbidden { reason } => reason.clone(),
            },
            AppErrorKind::Infrastructure(_) => {
                "Service temporarily unavailable. Please try again later".to_string()
            }
            AppErrorKind::External(err) => match err {
                ExternalError::GatewayAuth { .. } => {
                    "Could not authenticate with the payment gateway. Please try again".to_string()
                }
                ExternalError::GatewayRejected { message, .. } => {
                    format!("Payment request was rejected: {}", message)
                }
                ExternalError::GatewayUnavailable { .. } => {
                    "Payment gateway is temporarily unreachable. Please try again".to_string()
                }
            },
            AppErrorKind::Validation(err) => match err {
                ValidationError::InvalidAmount { amount, reason } => {
                    format!("Invalid amount '{}': {}", amount, reason)
                }
                ValidationError::InvalidPhoneNumber { phone, reason } => {
                    format!("Invalid phone number '{}': {}", phone, reason)
                }
                ValidationError::MissingField { field } => {
                    format!("Required field '{}' is missing", field)
                }
                ValidationError::Unauthenticated { reason } => {
                    format!("Authentication required: {}", reason)
                }
            },
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match &self.kind {
            AppErrorKind::Domain(_) => false,
            AppErrorKind::Infrastructure(err) => match err {
                InfrastructureError::Database { is_retryable, .. } => *is_retryable,
                InfrastructureError::Configuration { .. } => false,
            },
            AppErrorKind::External(err) => match err {
                ExternalError::GatewayAuth { .. } => true,
                ExternalError::GatewayRejected { .. } => false,
                ExternalError::GatewayUnavailable { .. } => true,
            },
            AppErrorKind::Validation(_) => false,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.user_message())
    }
}

impl std::error::Error for AppError {}

// Conversions from specific error types
// Note: From<DatabaseError> lives in database/error.rs, From<PaymentError>
// in payments/error.rs, to keep the dependency direction one-way.

/// Result type for operations that can fail with AppError
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booking_conflict_maps_to_409_not_400() {
        let error = AppError::domain(DomainError::BookingConflict {
            room_id: "room-1".to_string(),
        });

        assert_eq!(error.status_code(), 409);
        assert_eq!(error.error_code(), ErrorCode::BookingConflict);
        assert!(!error.is_retryable());
    }

    #[test]
    fn capacity_exceeded_is_unprocessable() {
        let error = AppError::domain(DomainError::CapacityExceeded {
            requested: 3,
            capacity: 2,
        });

        assert_eq!(error.status_code(), 422);
        assert!(error.user_message().contains("3 guests"));
    }

    #[test]
    fn gateway_rejection_is_bad_gateway_and_final() {
        let error = AppError::external(ExternalError::GatewayRejected {
            message: "insufficient balance".to_string(),
            gateway_code: Some("1".to_string()),
        });

        assert_eq!(error.status_code(), 502);
        assert_eq!(error.error_code(), ErrorCode::GatewayRejected);
        assert!(!error.is_retryable());
    }

    #[test]
    fn gateway_unavailable_is_retryable() {
        let error = AppError::external(ExternalError::GatewayUnavailable {
            message: "connect timeout".to_string(),
        });

        assert_eq!(error.status_code(), 503);
        assert!(error.is_retryable());
    }

    #[test]
    fn unauthenticated_maps_to_401() {
        let error = AppError::validation(ValidationError::Unauthenticated {
            reason: "missing x-user-id header".to_string(),
        });

        assert_eq!(error.status_code(), 401);
        assert_eq!(error.error_code(), ErrorCode::Unauthenticated);
    }
}
