#[cfg(test)]
mod mpesa_callback_tests {
    use hostelpay_backend::database::payment_repository::PaymentStatus;
    use hostelpay_backend::error::{AppError, DomainError, ErrorCode};
    use hostelpay_backend::payments::daraja::stk_password;
    use hostelpay_backend::payments::types::{
        CallbackEnvelope, PhoneNumber, StkPushResponse,
    };
    use serde_json::json;

    fn success_payload(checkout_request_id: &str, receipt: &str) -> serde_json::Value {
        json!({
            "Body": {
                "stkCallback": {
                    "MerchantRequestID": "29115-34620561-1",
                    "CheckoutRequestID": checkout_request_id,
                    "ResultCode": 0,
                    "ResultDesc": "The service request is processed successfully.",
                    "CallbackMetadata": {
                        "Item": [
                            {"Name": "Amount", "Value": 2000.0},
                            {"Name": "MpesaReceiptNumber", "Value": receipt},
                            {"Name": "TransactionDate", "Value": 20260301120000u64},
                            {"Name": "PhoneNumber", "Value": 254712345678u64}
                        ]
                    }
                }
            }
        })
    }

    fn failure_payload(checkout_request_id: &str) -> serde_json::Value {
        json!({
            "Body": {
                "stkCallback": {
                    "MerchantRequestID": "29115-34620561-1",
                    "CheckoutRequestID": checkout_request_id,
                    "ResultCode": 1032,
                    "ResultDesc": "Request cancelled by user"
                }
            }
        })
    }

    #[test]
    fn success_callback_yields_receipt_for_correlation_key() {
        let envelope: CallbackEnvelope =
            serde_json::from_value(success_payload("ws_CO_123", "ABC123")).unwrap();
        let callback = envelope.body.stk_callback;

        assert_eq!(callback.checkout_request_id, "ws_CO_123");
        assert!(callback.is_success());
        assert_eq!(callback.receipt_number().as_deref(), Some("ABC123"));
    }

    #[test]
    fn failure_callback_yields_no_receipt() {
        let envelope: CallbackEnvelope =
            serde_json::from_value(failure_payload("ws_CO_123")).unwrap();
        let callback = envelope.body.stk_callback;

        assert!(!callback.is_success());
        assert_eq!(callback.receipt_number(), None);
        assert_eq!(callback.result_desc, "Request cancelled by user");
    }

    #[test]
    fn terminal_payment_states_accept_no_further_transitions() {
        // the repository only matches `status = 'pending'` on update, so
        // the allowed-transition predicate is exactly "not terminal"
        let can_transition = |status: PaymentStatus| !status.is_terminal();

        assert!(can_transition(PaymentStatus::Pending));
        assert!(!can_transition(PaymentStatus::Completed));
        assert!(!can_transition(PaymentStatus::Failed));
    }

    #[test]
    fn receipt_is_paired_with_completion_only() {
        // a failure payload can never produce a receipt, so the
        // "receipt set iff completed" invariant holds at the source
        let envelope: CallbackEnvelope =
            serde_json::from_value(failure_payload("ws_CO_456")).unwrap();
        assert!(envelope.body.stk_callback.receipt_number().is_none());

        let envelope: CallbackEnvelope =
            serde_json::from_value(success_payload("ws_CO_456", "XYZ789")).unwrap();
        assert!(envelope.body.stk_callback.receipt_number().is_some());
    }

    #[test]
    fn unknown_correlation_is_a_distinct_error_but_not_a_client_rejection() {
        let err = AppError::domain(DomainError::UnknownCorrelation {
            checkout_request_id: "ws_CO_999".to_string(),
        });
        assert_eq!(err.error_code(), ErrorCode::UnknownCorrelation);
        // logged internally; the HTTP handler still acks 200 to the gateway
        assert_eq!(err.status_code(), 404);
    }

    #[test]
    fn push_acceptance_is_response_code_zero() {
        let accepted: StkPushResponse = serde_json::from_value(json!({
            "MerchantRequestID": "29115-34620561-1",
            "CheckoutRequestID": "ws_CO_191220191020363925",
            "ResponseCode": "0",
            "ResponseDescription": "Success. Request accepted for processing",
            "CustomerMessage": "Success. Request accepted for processing"
        }))
        .unwrap();
        assert!(accepted.is_accepted());

        let rejected: StkPushResponse = serde_json::from_value(json!({
            "MerchantRequestID": "29115-34620561-1",
            "CheckoutRequestID": "ws_CO_191220191020363925",
            "ResponseCode": "1",
            "ResponseDescription": "The balance is insufficient"
        }))
        .unwrap();
        assert!(!rejected.is_accepted());
    }

    #[test]
    fn stk_password_matches_sandbox_derivation() {
        use base64::{engine::general_purpose::STANDARD, Engine};

        let password = stk_password("174379", "bfb279f9aa9bdbcf", "20260301120000");
        assert_eq!(
            STANDARD.decode(password).unwrap(),
            b"174379bfb279f9aa9bdbcf20260301120000"
        );
    }

    #[test]
    fn phone_numbers_normalize_to_gateway_form() {
        for raw in ["0712345678", "+254712345678", "712345678", "254712345678"] {
            assert_eq!(
                PhoneNumber::normalize(raw, "254").unwrap().as_str(),
                "254712345678"
            );
        }
        assert!(PhoneNumber::normalize("07-12", "254").is_err());
    }
}
