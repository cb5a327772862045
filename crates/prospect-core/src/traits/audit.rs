// SPDX-FileCopyrightText: 2026 Prospect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Audit sink for admin-triggered actions.

use async_trait::async_trait;

use crate::error::ProspectError;

/// Records administrator actions (pause, resume, sync, ...).
///
/// Callers invoke this once per action after the action has committed.
/// A failing sink never undoes the action.
#[async_trait]
pub trait AuditSink: Send + Sync + 'static {
    async fn log_admin_action(
        &self,
        admin_id: &str,
        action: &str,
        entity_type: &str,
        entity_id: &str,
        metadata: Option<serde_json::Value>,
    ) -> Result<(), ProspectError>;
}
