use thiserror::Error;

pub type PaymentResult<T> = Result<T, PaymentError>;

/// Failures from the Daraja gateway client.
///
/// `Http` is the raw non-success response before the client has decided
/// what it means; `DarajaClient` maps it to `Rejected` (4xx with a
/// gateway message) or `Network` (5xx).
#[derive(Debug, Clone, Error)]
pub enum PaymentError {
    #[error("Gateway configuration error: {message}")]
    Config { message: String },

    #[error("Gateway authentication failed: {message}")]
    Auth { message: String },

    #[error("Gateway rejected the request: {message}")]
    Rejected {
        message: String,
        gateway_code: Option<String>,
    },

    #[error("Gateway network error: {message}")]
    Network { message: String },

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Invalid gateway response: {message}")]
    InvalidResponse { message: String },
}

impl PaymentError {
    pub fn is_retryable(&self) -> bool {
        match self {
            PaymentError::Config { .. } => false,
            PaymentError::Auth { .. } => true,
            PaymentError::Rejected { .. } => false,
            PaymentError::Network { .. } => true,
            PaymentError::Http { status, .. } => *status >= 500,
            PaymentError::InvalidResponse { .. } => false,
        }
    }
}

impl From<PaymentError> for crate::error::AppError {
    fn from(err: PaymentError) -> Self {
        use crate::error::{AppError, AppErrorKind, ExternalError, InfrastructureError};

        let kind = match err {
            PaymentError::Config { message } => {
                AppErrorKind::Infrastructure(InfrastructureError::Configuration { message })
            }
            PaymentError::Auth { message } => {
                AppErrorKind::External(ExternalError::GatewayAuth { message })
            }
            PaymentError::Rejected {
                message,
                gateway_code,
            } => AppErrorKind::External(ExternalError::GatewayRejected {
                message,
                gateway_code,
            }),
            PaymentError::Network { message } | PaymentError::InvalidResponse { message } => {
                AppErrorKind::External(ExternalError::GatewayUnavailable { message })
            }
            PaymentError::Http { status, body } => {
                AppErrorKind::External(ExternalError::GatewayUnavailable {
                    message: format!("HTTP {}: {}", status, body),
                })
            }
        };

        AppError::new(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_is_not_retryable() {
        let err = PaymentError::Rejected {
            message: "The balance is insufficient".to_string(),
            gateway_code: Some("1".to_string()),
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn server_errors_are_retryable() {
        assert!(PaymentError::Http {
            status: 503,
            body: "unavailable".to_string()
        }
        .is_retryable());
        assert!(!PaymentError::Http {
            status: 400,
            body: "bad request".to_string()
        }
        .is_retryable());
    }
}
