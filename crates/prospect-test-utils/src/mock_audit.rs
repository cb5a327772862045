// SPDX-FileCopyrightText: 2026 Prospect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory audit sink and outbox handler.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use prospect_core::traits::audit::AuditSink;
use prospect_core::traits::outbox::OutboxHandler;
use prospect_core::types::OutboxEvent;
use prospect_core::ProspectError;

/// One captured `log_admin_action` call.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditRecord {
    pub admin_id: String,
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    pub metadata: Option<serde_json::Value>,
}

/// Audit sink that keeps every call in memory.
///
/// With [`MemoryAuditSink::failing`] every call records and then returns an
/// error, for checking that audit failures never undo a transition.
#[derive(Clone, Default)]
pub struct MemoryAuditSink {
    records: Arc<Mutex<Vec<AuditRecord>>>,
    fail: Arc<AtomicBool>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let sink = Self::default();
        sink.fail.store(true, Ordering::SeqCst);
        sink
    }

    pub async fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().await.clone()
    }

    /// Actions recorded, in call order.
    pub async fn actions(&self) -> Vec<String> {
        self.records
            .lock()
            .await
            .iter()
            .map(|r| r.action.clone())
            .collect()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn log_admin_action(
        &self,
        admin_id: &str,
        action: &str,
        entity_type: &str,
        entity_id: &str,
        metadata: Option<serde_json::Value>,
    ) -> Result<(), ProspectError> {
        self.records.lock().await.push(AuditRecord {
            admin_id: admin_id.to_string(),
            action: action.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            metadata,
        });
        if self.fail.load(Ordering::SeqCst) {
            return Err(ProspectError::Internal("audit sink unavailable".to_string()));
        }
        Ok(())
    }
}

/// Outbox handler that records every event it is handed.
///
/// The first `fail_times` calls return an error.
#[derive(Clone, Default)]
pub struct RecordingOutboxHandler {
    seen: Arc<Mutex<Vec<OutboxEvent>>>,
    remaining_failures: Arc<AtomicUsize>,
}

impl RecordingOutboxHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_times(fail_times: usize) -> Self {
        let handler = Self::default();
        handler
            .remaining_failures
            .store(fail_times, Ordering::SeqCst);
        handler
    }

    pub async fn seen(&self) -> Vec<OutboxEvent> {
        self.seen.lock().await.clone()
    }

    pub async fn topics(&self) -> Vec<String> {
        self.seen
            .lock()
            .await
            .iter()
            .map(|e| e.topic.clone())
            .collect()
    }
}

#[async_trait]
impl OutboxHandler for RecordingOutboxHandler {
    async fn handle(&self, event: &OutboxEvent) -> Result<(), ProspectError> {
        self.seen.lock().await.push(event.clone());
        let failed = self
            .remaining_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(ProspectError::Internal(format!(
                "handler rejected event {}",
                event.id
            )));
        }
        Ok(())
    }
}
