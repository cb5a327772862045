// SPDX-FileCopyrightText: 2026 Prospect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prometheus metrics adapter for the Prospect campaign engine.
//!
//! Uses the metrics-rs facade with the Prometheus exporter.
//! Metrics are rendered as Prometheus text format via the `render()` method,
//! which is exposed through the gateway's /metrics endpoint.

pub mod recording;

use async_trait::async_trait;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use prospect_core::traits::adapter::PluginAdapter;
use prospect_core::types::{AdapterType, HealthStatus};
use prospect_core::ProspectError;

pub use recording::{
    record_claims, record_contacts_synced, record_outbox_event, record_reclaimed, record_send,
    record_send_latency, record_transition, register_metrics, set_outbox_backlog,
    set_queue_pending,
};

/// Prometheus metrics adapter.
///
/// Installs the Prometheus recorder and exposes a handle for rendering
/// metrics in Prometheus text format.
pub struct PrometheusAdapter {
    handle: PrometheusHandle,
}

impl PrometheusAdapter {
    /// Create a new PrometheusAdapter.
    ///
    /// Installs the Prometheus recorder globally. Only one recorder can be
    /// installed per process. Returns an error if a recorder is already installed.
    pub fn new() -> Result<Self, ProspectError> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| ProspectError::Internal(format!("failed to install Prometheus recorder: {e}")))?;

        recording::register_metrics();

        tracing::info!("prometheus metrics recorder installed");

        Ok(Self { handle })
    }

    /// Get a reference to the Prometheus handle for rendering.
    pub fn handle(&self) -> &PrometheusHandle {
        &self.handle
    }

    /// Render all collected metrics in Prometheus text format.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

#[async_trait]
impl PluginAdapter for PrometheusAdapter {
    fn name(&self) -> &str {
        "prometheus"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Observability
    }

    async fn health_check(&self) -> Result<HealthStatus, ProspectError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ProspectError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The recorder can only be installed once per process, so `new()` is
    // exercised by the binary rather than here.

    #[tokio::test]
    async fn renders_what_the_helpers_record() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let adapter = PrometheusAdapter {
            handle: recorder.handle(),
        };
        metrics::with_local_recorder(&recorder, || {
            record_send("sms", "sent");
            record_claims(3);
            set_outbox_backlog(2.0);
        });
        let rendered = adapter.render();
        assert!(rendered.contains("prospect_sends_total"), "{rendered}");
        assert!(rendered.contains("channel=\"sms\""), "{rendered}");
        assert_eq!(adapter.name(), "prometheus");
        assert_eq!(adapter.adapter_type(), AdapterType::Observability);
        assert_eq!(adapter.health_check().await.unwrap(), HealthStatus::Healthy);
    }
}
