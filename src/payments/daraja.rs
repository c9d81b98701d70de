//! Daraja (M-Pesa) gateway client
//!
//! Wraps the three endpoints this service uses: the OAuth
//! client-credentials token endpoint, STK push initiation, and the STK
//! push status query. Credentials come in through [`DarajaConfig`] at
//! construction time; nothing here reads globals after startup.

use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::types::{
    DarajaErrorBody, StkPushRequest, StkPushResponse, StkQueryRequest, StkQueryResponse,
    TokenResponse,
};
use crate::payments::utils::{AuthScheme, PaymentHttpClient};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{FixedOffset, Utc};
use std::time::Duration;
use tracing::info;

/// Gateway timestamps are East Africa Time, UTC+3 year-round.
const EAT_OFFSET_SECS: i32 = 3 * 3600;

#[derive(Debug, Clone)]
pub struct DarajaConfig {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub shortcode: String,
    pub passkey: String,
    pub base_url: String,
    pub callback_url: String,
    pub country_prefix: String,
    pub currency: String,
    pub transaction_type: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for DarajaConfig {
    fn default() -> Self {
        Self {
            consumer_key: String::new(),
            consumer_secret: String::new(),
            shortcode: String::new(),
            passkey: String::new(),
            base_url: "https://sandbox.safaricom.co.ke".to_string(),
            callback_url: String::new(),
            country_prefix: "254".to_string(),
            currency: "KES".to_string(),
            transaction_type: "CustomerPayBillOnline".to_string(),
            timeout_secs: 30,
            max_retries: 2,
        }
    }
}

impl DarajaConfig {
    pub fn from_env() -> PaymentResult<Self> {
        let defaults = Self::default();
        let config = Self {
            consumer_key: std::env::var("MPESA_CONSUMER_KEY").unwrap_or_default(),
            consumer_secret: std::env::var("MPESA_CONSUMER_SECRET").unwrap_or_default(),
            shortcode: std::env::var("MPESA_SHORTCODE").unwrap_or_default(),
            passkey: std::env::var("MPESA_PASSKEY").unwrap_or_default(),
            base_url: std::env::var("MPESA_BASE_URL").unwrap_or(defaults.base_url),
            callback_url: std::env::var("MPESA_CALLBACK_URL").unwrap_or_default(),
            country_prefix: std::env::var("MPESA_COUNTRY_PREFIX").unwrap_or(defaults.country_prefix),
            currency: std::env::var("MPESA_CURRENCY").unwrap_or(defaults.currency),
            transaction_type: defaults.transaction_type,
            timeout_secs: std::env::var("MPESA_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.timeout_secs),
            max_retries: std::env::var("MPESA_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_retries),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> PaymentResult<()> {
        for (value, name) in [
            (&self.consumer_key, "MPESA_CONSUMER_KEY"),
            (&self.consumer_secret, "MPESA_CONSUMER_SECRET"),
            (&self.shortcode, "MPESA_SHORTCODE"),
            (&self.passkey, "MPESA_PASSKEY"),
            (&self.callback_url, "MPESA_CALLBACK_URL"),
        ] {
            if value.trim().is_empty() {
                return Err(PaymentError::Config {
                    message: format!("{} is required", name),
                });
            }
        }
        if !self.callback_url.starts_with("https://") {
            return Err(PaymentError::Config {
                message: "MPESA_CALLBACK_URL must be an https URL".to_string(),
            });
        }
        Ok(())
    }
}

/// Inputs for one push request; the phone number is already normalized.
#[derive(Debug, Clone)]
pub struct StkPushParams {
    pub phone_number: String,
    pub amount: u64,
    pub account_reference: String,
    pub description: String,
}

/// Synchronous acceptance from the gateway; `checkout_request_id` is the
/// correlation key the asynchronous callback will carry.
#[derive(Debug, Clone)]
pub struct StkPushAcceptance {
    pub merchant_request_id: String,
    pub checkout_request_id: String,
    pub customer_message: Option<String>,
}

pub struct DarajaClient {
    config: DarajaConfig,
    http: PaymentHttpClient,
}

impl DarajaClient {
    pub fn new(config: DarajaConfig) -> PaymentResult<Self> {
        config.validate()?;
        let http =
            PaymentHttpClient::new(Duration::from_secs(config.timeout_secs), config.max_retries)?;
        Ok(Self { config, http })
    }

    pub fn from_env() -> PaymentResult<Self> {
        Self::new(DarajaConfig::from_env()?)
    }

    pub fn config(&self) -> &DarajaConfig {
        &self.config
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    /// Fetch a short-lived OAuth access token. Every failure here is an
    /// auth failure from the caller's point of view: the push was never
    /// sent, so the payment row can stay pending.
    pub async fn access_token(&self) -> PaymentResult<String> {
        let token: TokenResponse = self
            .http
            .request_json(
                reqwest::Method::GET,
                &self.endpoint("/oauth/v1/generate?grant_type=client_credentials"),
                Some(AuthScheme::Basic {
                    username: &self.config.consumer_key,
                    password: &self.config.consumer_secret,
                }),
                None,
            )
            .await
            .map_err(|e| PaymentError::Auth {
                message: e.to_string(),
            })?;

        if token.access_token.is_empty() {
            return Err(PaymentError::Auth {
                message: "gateway returned an empty access token".to_string(),
            });
        }
        Ok(token.access_token)
    }

    /// Initiate an STK push. Not retried on transport errors: a replay
    /// could prompt the payer twice for the same payment.
    pub async fn stk_push(&self, params: &StkPushParams) -> PaymentResult<StkPushAcceptance> {
        let token = self.access_token().await?;
        let timestamp = self.timestamp_now();
        let password = stk_password(&self.config.shortcode, &self.config.passkey, &timestamp);

        let request = StkPushRequest {
            business_short_code: self.config.shortcode.clone(),
            password,
            timestamp,
            transaction_type: self.config.transaction_type.clone(),
            amount: params.amount,
            party_a: params.phone_number.clone(),
            party_b: self.config.shortcode.clone(),
            phone_number: params.phone_number.clone(),
            callback_url: self.config.callback_url.clone(),
            account_reference: params.account_reference.clone(),
            transaction_desc: params.description.clone(),
        };
        let body = serde_json::to_value(&request).map_err(|e| PaymentError::InvalidResponse {
            message: format!("failed to encode push request: {}", e),
        })?;

        let response: StkPushResponse = self
            .http
            .request_json_once(
                reqwest::Method::POST,
                &self.endpoint("/mpesa/stkpush/v1/processrequest"),
                Some(AuthScheme::Bearer(&token)),
                Some(&body),
            )
            .await
            .map_err(|e| self.map_push_error(e))?;

        if !response.is_accepted() {
            return Err(PaymentError::Rejected {
                message: response.response_description,
                gateway_code: Some(response.response_code),
            });
        }

        info!(
            checkout_request_id = %response.checkout_request_id,
            "STK push accepted by gateway"
        );

        Ok(StkPushAcceptance {
            merchant_request_id: response.merchant_request_id,
            checkout_request_id: response.checkout_request_id,
            customer_message: response.customer_message,
        })
    }

    /// Query the gateway's view of a previously-initiated push. Read
    /// only; local state transitions stay driven by the callback.
    pub async fn stk_query(&self, checkout_request_id: &str) -> PaymentResult<StkQueryResponse> {
        let token = self.access_token().await?;
        let timestamp = self.timestamp_now();
        let password = stk_password(&self.config.shortcode, &self.config.passkey, &timestamp);

        let request = StkQueryRequest {
            business_short_code: self.config.shortcode.clone(),
            password,
            timestamp,
            checkout_request_id: checkout_request_id.to_string(),
        };
        let body = serde_json::to_value(&request).map_err(|e| PaymentError::InvalidResponse {
            message: format!("failed to encode query request: {}", e),
        })?;

        self.http
            .request_json(
                reqwest::Method::POST,
                &self.endpoint("/mpesa/stkpushquery/v1/query"),
                Some(AuthScheme::Bearer(&token)),
                Some(&body),
            )
            .await
            .map_err(|e| self.map_push_error(e))
    }

    /// A 4xx from the gateway is a rejection with a message worth
    /// surfacing; 5xx and transport failures stay network errors.
    fn map_push_error(&self, err: PaymentError) -> PaymentError {
        match err {
            PaymentError::Http { status, body } if (400..500).contains(&status) => {
                let parsed: Option<DarajaErrorBody> = serde_json::from_str(&body).ok();
                let (message, code) = match parsed {
                    Some(e) => (
                        e.error_message.unwrap_or_else(|| body.clone()),
                        e.error_code,
                    ),
                    None => (body, None),
                };
                PaymentError::Rejected {
                    message,
                    gateway_code: code,
                }
            }
            PaymentError::Http { status, body } => PaymentError::Network {
                message: format!("gateway returned HTTP {}: {}", status, body),
            },
            other => other,
        }
    }

    fn timestamp_now(&self) -> String {
        let eat = FixedOffset::east_opt(EAT_OFFSET_SECS).expect("valid offset");
        Utc::now().with_timezone(&eat).format("%Y%m%d%H%M%S").to_string()
    }
}

/// STK password: base64(shortcode + passkey + timestamp).
pub fn stk_password(shortcode: &str, passkey: &str, timestamp: &str) -> String {
    BASE64.encode(format!("{}{}{}", shortcode, passkey, timestamp))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> DarajaConfig {
        DarajaConfig {
            consumer_key: "key".to_string(),
            consumer_secret: "secret".to_string(),
            shortcode: "174379".to_string(),
            passkey: "passkey".to_string(),
            callback_url: "https://example.com/api/payments/mpesa/callback".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn password_is_base64_of_concatenation() {
        let password = stk_password("174379", "passkey", "20260301120000");
        let decoded = BASE64.decode(password).unwrap();
        assert_eq!(decoded, b"174379passkey20260301120000");
    }

    #[test]
    fn config_requires_credentials() {
        let mut incomplete = config();
        incomplete.consumer_secret = String::new();
        assert!(incomplete.validate().is_err());
        assert!(config().validate().is_ok());
    }

    #[test]
    fn config_requires_https_callback() {
        let mut bad = config();
        bad.callback_url = "http://example.com/cb".to_string();
        assert!(bad.validate().is_err());
    }

    #[test]
    fn timestamp_has_gateway_shape() {
        let client = DarajaClient::new(config()).unwrap();
        let ts = client.timestamp_now();
        assert_eq!(ts.len(), 14);
        assert!(ts.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn gateway_4xx_maps_to_rejection_with_message() {
        let client = DarajaClient::new(config()).unwrap();
        let mapped = client.map_push_error(PaymentError::Http {
            status: 400,
            body: r#"{"requestId":"1","errorCode":"400.002.02","errorMessage":"Bad Request - Invalid Amount"}"#
                .to_string(),
        });
        match mapped {
            PaymentError::Rejected {
                message,
                gateway_code,
            } => {
                assert_eq!(message, "Bad Request - Invalid Amount");
                assert_eq!(gateway_code.as_deref(), Some("400.002.02"));
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[test]
    fn gateway_5xx_stays_a_network_error() {
        let client = DarajaClient::new(config()).unwrap();
        let mapped = client.map_push_error(PaymentError::Http {
            status: 503,
            body: "unavailable".to_string(),
        });
        assert!(matches!(mapped, PaymentError::Network { .. }));
    }
}
