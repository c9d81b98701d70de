//! Wire types for the Daraja STK-push API
//!
//! Request/response DTOs use the gateway's PascalCase field names via
//! serde renames; the rest of the crate only sees the snake_case Rust
//! side. The callback metadata is a heterogeneous name/value list, so
//! it gets a typed lookup instead of ad hoc scanning at the call sites.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::OnceLock;

/// A phone number normalized to the canonical international form the
/// gateway expects: digits only, country prefix, no leading `+` or `0`
/// (e.g. `254712345678`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Normalize a raw user-supplied number against a country prefix.
    ///
    /// Accepts `+254712345678`, `254712345678`, `0712345678` and bare
    /// `712345678`; strips spaces and dashes first.
    pub fn normalize(raw: &str, country_prefix: &str) -> Result<Self, String> {
        let cleaned: String = raw
            .trim()
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-')
            .collect();
        let cleaned = cleaned.strip_prefix('+').unwrap_or(&cleaned);

        if cleaned.is_empty() {
            return Err("number is empty".to_string());
        }
        if !cleaned.chars().all(|c| c.is_ascii_digit()) {
            return Err("number contains non-digit characters".to_string());
        }

        let candidate = if let Some(national) = cleaned.strip_prefix('0') {
            format!("{}{}", country_prefix, national)
        } else if cleaned.starts_with(country_prefix) {
            cleaned.to_string()
        } else {
            format!("{}{}", country_prefix, cleaned)
        };

        static SHAPE: OnceLock<regex::Regex> = OnceLock::new();
        let shape = SHAPE.get_or_init(|| regex::Regex::new(r"^\d{11,13}$").expect("valid regex"));
        if !shape.is_match(&candidate) {
            return Err(format!(
                "normalized form '{}' is not a valid subscriber number",
                candidate
            ));
        }

        Ok(PhoneNumber(candidate))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// OAuth token endpoint response
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<String>,
}

/// STK push request body
#[derive(Debug, Clone, Serialize)]
pub struct StkPushRequest {
    #[serde(rename = "BusinessShortCode")]
    pub business_short_code: String,
    #[serde(rename = "Password")]
    pub password: String,
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "TransactionType")]
    pub transaction_type: String,
    #[serde(rename = "Amount")]
    pub amount: u64,
    #[serde(rename = "PartyA")]
    pub party_a: String,
    #[serde(rename = "PartyB")]
    pub party_b: String,
    #[serde(rename = "PhoneNumber")]
    pub phone_number: String,
    #[serde(rename = "CallBackURL")]
    pub callback_url: String,
    #[serde(rename = "AccountReference")]
    pub account_reference: String,
    #[serde(rename = "TransactionDesc")]
    pub transaction_desc: String,
}

/// Synchronous STK push response
#[derive(Debug, Clone, Deserialize)]
pub struct StkPushResponse {
    #[serde(rename = "MerchantRequestID")]
    pub merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    #[serde(rename = "ResponseCode")]
    pub response_code: String,
    #[serde(rename = "ResponseDescription")]
    pub response_description: String,
    #[serde(rename = "CustomerMessage", default)]
    pub customer_message: Option<String>,
}

impl StkPushResponse {
    pub fn is_accepted(&self) -> bool {
        self.response_code.trim() == "0"
    }
}

/// STK push status query request body
#[derive(Debug, Clone, Serialize)]
pub struct StkQueryRequest {
    #[serde(rename = "BusinessShortCode")]
    pub business_short_code: String,
    #[serde(rename = "Password")]
    pub password: String,
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
}

/// STK push status query response
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StkQueryResponse {
    #[serde(rename = "ResponseCode")]
    pub response_code: String,
    #[serde(rename = "ResponseDescription", default)]
    pub response_description: Option<String>,
    #[serde(rename = "MerchantRequestID", default)]
    pub merchant_request_id: Option<String>,
    #[serde(rename = "CheckoutRequestID", default)]
    pub checkout_request_id: Option<String>,
    #[serde(rename = "ResultCode", default)]
    pub result_code: Option<String>,
    #[serde(rename = "ResultDesc", default)]
    pub result_desc: Option<String>,
}

/// Error body Daraja returns on non-2xx responses
#[derive(Debug, Clone, Deserialize)]
pub struct DarajaErrorBody {
    #[serde(rename = "requestId", default)]
    pub request_id: Option<String>,
    #[serde(rename = "errorCode", default)]
    pub error_code: Option<String>,
    #[serde(rename = "errorMessage", default)]
    pub error_message: Option<String>,
}

/// Asynchronous callback envelope: `Body.stkCallback.{...}`
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackEnvelope {
    #[serde(rename = "Body")]
    pub body: CallbackBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackBody {
    #[serde(rename = "stkCallback")]
    pub stk_callback: StkCallback,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StkCallback {
    #[serde(rename = "MerchantRequestID")]
    pub merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    #[serde(rename = "ResultCode")]
    pub result_code: i64,
    #[serde(rename = "ResultDesc")]
    pub result_desc: String,
    #[serde(rename = "CallbackMetadata", default)]
    pub callback_metadata: Option<CallbackMetadata>,
}

impl StkCallback {
    /// Result code 0 is the gateway's only success signal.
    pub fn is_success(&self) -> bool {
        self.result_code == 0
    }

    /// The receipt number, present in the metadata list on success.
    pub fn receipt_number(&self) -> Option<String> {
        self.callback_metadata
            .as_ref()
            .and_then(|m| m.get_str("MpesaReceiptNumber"))
    }
}

/// The callback's heterogeneous name/value metadata list
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackMetadata {
    #[serde(rename = "Item", default)]
    pub items: Vec<MetadataItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetadataItem {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Value", default)]
    pub value: Option<JsonValue>,
}

impl CallbackMetadata {
    /// Find an item's value by name, order-independent.
    pub fn get(&self, name: &str) -> Option<&JsonValue> {
        self.items
            .iter()
            .find(|item| item.name == name)
            .and_then(|item| item.value.as_ref())
    }

    /// String-valued lookup; numbers are stringified since the gateway
    /// is loose about value types.
    pub fn get_str(&self, name: &str) -> Option<String> {
        match self.get(name)? {
            JsonValue::String(s) => Some(s.clone()),
            JsonValue::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get(name)?.as_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn phone_normalization_accepts_common_forms() {
        for raw in ["+254712345678", "254712345678", "0712345678", "712345678"] {
            let normalized = PhoneNumber::normalize(raw, "254").unwrap();
            assert_eq!(normalized.as_str(), "254712345678", "input: {}", raw);
        }
    }

    #[test]
    fn phone_normalization_strips_separators() {
        let normalized = PhoneNumber::normalize("0712 345-678", "254").unwrap();
        assert_eq!(normalized.as_str(), "254712345678");
    }

    #[test]
    fn phone_normalization_rejects_garbage() {
        assert!(PhoneNumber::normalize("", "254").is_err());
        assert!(PhoneNumber::normalize("not-a-number", "254").is_err());
        assert!(PhoneNumber::normalize("+2547", "254").is_err());
    }

    #[test]
    fn stk_push_request_serializes_gateway_field_names() {
        let request = StkPushRequest {
            business_short_code: "174379".to_string(),
            password: "cGFzcw==".to_string(),
            timestamp: "20260301120000".to_string(),
            transaction_type: "CustomerPayBillOnline".to_string(),
            amount: 2000,
            party_a: "254712345678".to_string(),
            party_b: "174379".to_string(),
            phone_number: "254712345678".to_string(),
            callback_url: "https://example.com/api/payments/mpesa/callback".to_string(),
            account_reference: "BOOKING-1".to_string(),
            transaction_desc: "Hostel booking".to_string(),
        };
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["BusinessShortCode"], "174379");
        assert_eq!(body["Amount"], 2000);
        assert_eq!(body["CallBackURL"], "https://example.com/api/payments/mpesa/callback");
    }

    #[test]
    fn success_callback_parses_and_finds_receipt() {
        let payload = json!({
            "Body": {
                "stkCallback": {
                    "MerchantRequestID": "29115-34620561-1",
                    "CheckoutRequestID": "ws_CO_191220191020363925",
                    "ResultCode": 0,
                    "ResultDesc": "The service request is processed successfully.",
                    "CallbackMetadata": {
                        "Item": [
                            {"Name": "Amount", "Value": 2000.0},
                            {"Name": "MpesaReceiptNumber", "Value": "NLJ7RT61SV"},
                            {"Name": "TransactionDate", "Value": 20191219102115u64},
                            {"Name": "PhoneNumber", "Value": 254712345678u64}
                        ]
                    }
                }
            }
        });

        let envelope: CallbackEnvelope = serde_json::from_value(payload).unwrap();
        let callback = envelope.body.stk_callback;
        assert!(callback.is_success());
        assert_eq!(callback.receipt_number().as_deref(), Some("NLJ7RT61SV"));
        assert_eq!(
            callback.callback_metadata.as_ref().unwrap().get_f64("Amount"),
            Some(2000.0)
        );
    }

    #[test]
    fn receipt_lookup_is_order_independent() {
        let metadata: CallbackMetadata = serde_json::from_value(json!({
            "Item": [
                {"Name": "PhoneNumber", "Value": 254712345678u64},
                {"Name": "MpesaReceiptNumber", "Value": "ABC123"},
                {"Name": "Amount", "Value": 1000}
            ]
        }))
        .unwrap();
        assert_eq!(metadata.get_str("MpesaReceiptNumber").as_deref(), Some("ABC123"));
    }

    #[test]
    fn failure_callback_has_no_metadata_and_no_receipt() {
        let payload = json!({
            "Body": {
                "stkCallback": {
                    "MerchantRequestID": "29115-34620561-1",
                    "CheckoutRequestID": "ws_CO_191220191020363925",
                    "ResultCode": 1032,
                    "ResultDesc": "Request cancelled by user"
                }
            }
        });

        let envelope: CallbackEnvelope = serde_json::from_value(payload).unwrap();
        let callback = envelope.body.stk_callback;
        assert!(!callback.is_success());
        assert_eq!(callback.receipt_number(), None);
    }

    #[test]
    fn missing_metadata_value_is_tolerated() {
        let metadata: CallbackMetadata = serde_json::from_value(json!({
            "Item": [{"Name": "Amount"}]
        }))
        .unwrap();
        assert_eq!(metadata.get("Amount"), None);
    }
}
