use crate::payments::error::{PaymentError, PaymentResult};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::warn;

/// Authentication schemes the gateway endpoints use: Basic for the
/// token endpoint, Bearer everywhere else.
#[derive(Debug, Clone, Copy)]
pub enum AuthScheme<'a> {
    Bearer(&'a str),
    Basic {
        username: &'a str,
        password: &'a str,
    },
}

#[derive(Clone)]
pub struct PaymentHttpClient {
    client: Client,
    timeout: Duration,
    max_retries: u32,
}

impl PaymentHttpClient {
    pub fn new(timeout: Duration, max_retries: u32) -> PaymentResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PaymentError::Network {
                message: format!("failed to initialize HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            timeout,
            max_retries,
        })
    }

    /// Issue a JSON request, retrying transport errors, 429s and 5xx
    /// responses with exponential backoff up to the configured limit.
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        url: &str,
        auth: Option<AuthScheme<'_>>,
        body: Option<&JsonValue>,
    ) -> PaymentResult<T> {
        self.request_json_with_retries(method, url, auth, body, self.max_retries)
            .await
    }

    /// Single-shot variant for requests that are not safe to replay
    /// (the STK push itself; a retried push can prompt the payer twice).
    pub async fn request_json_once<T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        url: &str,
        auth: Option<AuthScheme<'_>>,
        body: Option<&JsonValue>,
    ) -> PaymentResult<T> {
        self.request_json_with_retries(method, url, auth, body, 0)
            .await
    }

    async fn request_json_with_retries<T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        url: &str,
        auth: Option<AuthScheme<'_>>,
        body: Option<&JsonValue>,
        retries: u32,
    ) -> PaymentResult<T> {
        let mut last_error = None;
        for attempt in 0..=retries {
            let mut request = self.client.request(method.clone(), url);
            request = request.timeout(self.timeout);

            match auth {
                Some(AuthScheme::Bearer(token)) => {
                    request = request.bearer_auth(token);
                }
                Some(AuthScheme::Basic { username, password }) => {
                    request = request.basic_auth(username, Some(password));
                }
                None => {}
            }
            if let Some(payload) = body {
                request = request.json(payload);
            }

            let response = request.send().await.map_err(|e| PaymentError::Network {
                message: format!("gateway request failed: {}", e),
            });

            match response {
                Ok(resp) => {
                    let status = resp.status();
                    let text = resp.text().await.unwrap_or_default();
                    if status.is_success() {
                        return serde_json::from_str::<T>(&text).map_err(|e| {
                            PaymentError::InvalidResponse {
                                message: format!("invalid gateway JSON response: {}", e),
                            }
                        });
                    }

                    if (status.as_u16() == 429 || status.is_server_error()) && attempt < retries {
                        warn!(
                            status = %status,
                            attempt = attempt + 1,
                            "gateway error, retrying"
                        );
                        tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
                        continue;
                    }

                    return Err(PaymentError::Http {
                        status: status.as_u16(),
                        body: text,
                    });
                }
                Err(e) => {
                    last_error = Some(e);
                    if attempt < retries {
                        tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
                        continue;
                    }
                }
            }
        }

        Err(last_error.unwrap_or(PaymentError::Network {
            message: "gateway request failed".to_string(),
        }))
    }
}
