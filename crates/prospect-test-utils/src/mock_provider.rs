// SPDX-FileCopyrightText: 2026 Prospect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock send provider for deterministic testing.
//!
//! `MockSendProvider` implements `SendProvider` with scripted outcomes,
//! enabling dispatcher tests without a real messaging backend.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use prospect_core::traits::adapter::PluginAdapter;
use prospect_core::traits::provider::SendProvider;
use prospect_core::types::{AdapterType, Contact, HealthStatus, OutboundMessage, SendReceipt};
use prospect_core::ProspectError;

/// What the mock does with one send call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOutcome {
    /// Accept the message.
    Accept,
    /// Fail with `TransientSend`.
    Transient(String),
    /// Fail with `PermanentSend`.
    Permanent(String),
    /// Never answer within any reasonable timeout.
    Hang,
}

/// A mock send provider.
///
/// Outcomes are taken, in order, from a per-recipient script first and then
/// from a shared FIFO queue. When both are empty the message is accepted.
pub struct MockSendProvider {
    script: Arc<Mutex<VecDeque<MockOutcome>>>,
    by_recipient: Arc<Mutex<HashMap<String, VecDeque<MockOutcome>>>>,
    sent: Arc<Mutex<Vec<OutboundMessage>>>,
    delay: Duration,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MockSendProvider {
    /// Create a mock that accepts everything.
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::new())),
            by_recipient: Arc::new(Mutex::new(HashMap::new())),
            sent: Arc::new(Mutex::new(Vec::new())),
            delay: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    /// Create a mock that plays `outcomes` in order, then accepts.
    pub fn with_outcomes(outcomes: Vec<MockOutcome>) -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::from(outcomes))),
            ..Self::new()
        }
    }

    /// Sleep this long inside every send call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Script outcomes for one recipient address.
    pub async fn script_recipient(&self, recipient: &str, outcomes: Vec<MockOutcome>) {
        self.by_recipient
            .lock()
            .await
            .entry(recipient.to_string())
            .or_default()
            .extend(outcomes);
    }

    /// Append to the shared script.
    pub async fn push_outcome(&self, outcome: MockOutcome) {
        self.script.lock().await.push_back(outcome);
    }

    /// Messages that were accepted, in acceptance order.
    pub async fn sent_messages(&self) -> Vec<OutboundMessage> {
        self.sent.lock().await.clone()
    }

    /// Number of calls accepted.
    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    /// Highest number of concurrent send calls observed.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    async fn next_outcome(&self, recipient: &str) -> MockOutcome {
        if let Some(outcome) = self
            .by_recipient
            .lock()
            .await
            .get_mut(recipient)
            .and_then(VecDeque::pop_front)
        {
            return outcome;
        }
        self.script
            .lock()
            .await
            .pop_front()
            .unwrap_or(MockOutcome::Accept)
    }
}

impl Default for MockSendProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockSendProvider {
    fn name(&self) -> &str {
        "mock-send-provider"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::SendProvider
    }

    async fn health_check(&self) -> Result<HealthStatus, ProspectError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ProspectError> {
        Ok(())
    }
}

#[async_trait]
impl SendProvider for MockSendProvider {
    async fn send(
        &self,
        _contact: &Contact,
        message: &OutboundMessage,
    ) -> Result<SendReceipt, ProspectError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        let outcome = self.next_outcome(&message.recipient).await;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let result = match outcome {
            MockOutcome::Accept => {
                self.sent.lock().await.push(message.clone());
                Ok(SendReceipt {
                    provider_message_id: Some(format!("mock-{}", uuid::Uuid::new_v4())),
                    provider_response: Some("accepted".to_string()),
                })
            }
            MockOutcome::Transient(message) => Err(ProspectError::TransientSend { message }),
            MockOutcome::Permanent(message) => Err(ProspectError::PermanentSend { message }),
            MockOutcome::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(ProspectError::TransientSend {
                    message: "mock hang elapsed".to_string(),
                })
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
