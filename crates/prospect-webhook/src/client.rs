// SPDX-FileCopyrightText: 2026 Prospect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the webhook endpoint.
//!
//! Provides [`WebhookClient`], which posts one message per request and
//! classifies every failure as transient or permanent.

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use tracing::debug;

use prospect_core::ProspectError;
use prospect_core::types::SendReceipt;

use crate::types::{WebhookPayload, WebhookReply};

/// Longest provider response kept on the delivery event.
const MAX_RESPONSE_CHARS: usize = 500;

#[derive(Debug, Clone)]
pub struct WebhookClient {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl WebhookClient {
    pub fn new(
        url: String,
        bearer_token: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, ProspectError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = bearer_token {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|e| {
                ProspectError::Config(format!("invalid provider bearer token: {e}"))
            })?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| ProspectError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            url,
            timeout,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Post one message. No retries here; the queue owns retry policy.
    pub async fn post(&self, payload: &WebhookPayload) -> Result<SendReceipt, ProspectError> {
        let response = self
            .client
            .post(&self.url)
            .header("Idempotency-Key", payload.idempotency_key())
            .json(payload)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        debug!(status = %status, entry_id = payload.entry_id, "webhook response received");

        if status.is_success() {
            let reply: WebhookReply = serde_json::from_str(&body).unwrap_or_default();
            return Ok(SendReceipt {
                provider_message_id: reply.id,
                provider_response: (!body.is_empty()).then(|| truncate(&body)),
            });
        }

        let message = format!("provider returned {status}: {}", truncate(&body));
        if is_transient_status(status) {
            Err(ProspectError::TransientSend { message })
        } else {
            Err(ProspectError::PermanentSend { message })
        }
    }

    fn request_error(&self, e: reqwest::Error) -> ProspectError {
        if e.is_timeout() {
            ProspectError::Timeout {
                duration: self.timeout,
            }
        } else {
            // Connection refused, reset, DNS: the target may come back.
            ProspectError::TransientSend {
                message: format!("HTTP request failed: {e}"),
            }
        }
    }
}

/// Status codes worth another attempt later.
fn is_transient_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 408 | 425 | 429) || status.is_server_error()
}

fn truncate(body: &str) -> String {
    body.chars().take(MAX_RESPONSE_CHARS).collect()
}
