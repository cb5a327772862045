// SPDX-FileCopyrightText: 2026 Prospect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP webhook send provider for the Prospect campaign engine.
//!
//! This crate implements [`SendProvider`] by posting each rendered message as
//! JSON to a configured endpoint. The endpoint's answer decides the outcome:
//! 2xx is sent; 408, 425, 429, 5xx, timeouts and connection failures are
//! transient; any other status is permanent.

pub mod client;
pub mod types;

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use prospect_config::model::ProviderConfig;
use prospect_core::ProspectError;
use prospect_core::redact::{mask_email, mask_phone};
use prospect_core::traits::{PluginAdapter, SendProvider};
use prospect_core::types::{
    AdapterType, Channel, Contact, HealthStatus, OutboundMessage, SendReceipt,
};

use crate::client::WebhookClient;
use crate::types::WebhookPayload;

/// Send provider backed by an HTTP webhook.
pub struct WebhookProvider {
    client: WebhookClient,
}

impl WebhookProvider {
    pub fn new(
        url: impl Into<String>,
        bearer_token: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, ProspectError> {
        let client = WebhookClient::new(url.into(), bearer_token, timeout)?;
        Ok(Self { client })
    }

    /// Build from the `[provider]` section. Fails when no URL is configured.
    pub fn from_config(config: &ProviderConfig) -> Result<Self, ProspectError> {
        let url = config.webhook_url.clone().ok_or_else(|| {
            ProspectError::Config("provider.webhook_url is not set".to_string())
        })?;
        let provider = Self::new(
            url,
            config.bearer_token.as_deref(),
            Duration::from_secs(config.timeout_secs),
        )?;
        info!(url = provider.client.url(), "webhook provider initialized");
        Ok(provider)
    }
}

#[async_trait]
impl PluginAdapter for WebhookProvider {
    fn name(&self) -> &str {
        "webhook"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::SendProvider
    }

    async fn health_check(&self) -> Result<HealthStatus, ProspectError> {
        // Probing would post a message; the endpoint is only checked by sending.
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ProspectError> {
        debug!("webhook provider shutting down");
        Ok(())
    }
}

#[async_trait]
impl SendProvider for WebhookProvider {
    async fn send(
        &self,
        contact: &Contact,
        message: &OutboundMessage,
    ) -> Result<SendReceipt, ProspectError> {
        let payload = WebhookPayload::new(&contact.id, message);
        let masked = match message.channel {
            Channel::Email => mask_email(&message.recipient),
            _ => mask_phone(&message.recipient),
        };
        debug!(
            entry_id = message.entry_id,
            campaign_id = %message.campaign_id,
            recipient = %masked,
            "posting message to webhook"
        );
        self.client.post(&payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prospect_core::types::ContactSource;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn contact() -> Contact {
        Contact {
            id: "c-1".into(),
            display_name: Some("Jean".into()),
            company_name: None,
            phone: Some("+33612345678".into()),
            email: Some("jean@example.fr".into()),
            department: None,
            city: None,
            external_id: None,
            source: ContactSource::Manual,
            fingerprint: "email:jean@example.fr".into(),
            opt_out: false,
            opted_out_at: None,
            last_contacted_at: None,
            created_at: "2026-01-01T00:00:00.000Z".into(),
            updated_at: "2026-01-01T00:00:00.000Z".into(),
        }
    }

    fn message() -> OutboundMessage {
        OutboundMessage {
            entry_id: 7,
            campaign_id: "camp-1".into(),
            channel: Channel::Sms,
            recipient: "+33612345678".into(),
            subject: None,
            body: "Bonjour Jean".into(),
        }
    }

    fn provider(server: &MockServer, timeout: Duration) -> WebhookProvider {
        WebhookProvider::new(format!("{}/send", server.uri()), Some("secret"), timeout).unwrap()
    }

    async fn respond(status: u16) -> Result<SendReceipt, ProspectError> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/send"))
            .respond_with(ResponseTemplate::new(status).set_body_string("nope"))
            .mount(&server)
            .await;
        provider(&server, Duration::from_secs(5))
            .send(&contact(), &message())
            .await
    }

    #[tokio::test]
    async fn accepted_message_returns_receipt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/send"))
            .and(header("authorization", "Bearer secret"))
            .and(header("idempotency-key", "camp-1:7"))
            .and(body_partial_json(serde_json::json!({
                "entry_id": 7,
                "contact_id": "c-1",
                "channel": "sms",
                "recipient": "+33612345678",
                "body": "Bonjour Jean",
            })))
            .respond_with(
                ResponseTemplate::new(202).set_body_json(serde_json::json!({"message_id": "m-42"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let receipt = provider(&server, Duration::from_secs(5))
            .send(&contact(), &message())
            .await
            .unwrap();
        assert_eq!(receipt.provider_message_id.as_deref(), Some("m-42"));
        assert!(receipt.provider_response.unwrap().contains("m-42"));
    }

    #[tokio::test]
    async fn retryable_statuses_are_transient() {
        for status in [408, 425, 429, 500, 503] {
            let err = respond(status).await.unwrap_err();
            assert!(
                matches!(err, ProspectError::TransientSend { .. }),
                "{status}: {err:?}"
            );
            assert!(err.is_retryable());
        }
    }

    #[tokio::test]
    async fn client_errors_are_permanent() {
        for status in [400, 404, 410, 422] {
            let err = respond(status).await.unwrap_err();
            assert!(
                matches!(err, ProspectError::PermanentSend { .. }),
                "{status}: {err:?}"
            );
            assert!(!err.is_retryable());
        }
    }

    #[tokio::test]
    async fn slow_endpoint_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;
        let err = provider(&server, Duration::from_millis(100))
            .send(&contact(), &message())
            .await
            .unwrap_err();
        assert!(matches!(err, ProspectError::Timeout { .. }));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_transient() {
        // Port 9 (discard) is closed on test machines.
        let provider =
            WebhookProvider::new("http://127.0.0.1:9/send", None, Duration::from_secs(2)).unwrap();
        let err = provider.send(&contact(), &message()).await.unwrap_err();
        assert!(err.is_retryable(), "{err:?}");
    }

    #[test]
    fn missing_url_is_a_config_error() {
        let err = WebhookProvider::from_config(&ProviderConfig::default()).err().unwrap();
        assert!(matches!(err, ProspectError::Config(_)));
    }
}
