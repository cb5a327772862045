// SPDX-FileCopyrightText: 2026 Prospect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Consumer seam for relayed outbox events.

use async_trait::async_trait;

use crate::error::ProspectError;
use crate::types::OutboxEvent;

/// Receives domain events after they have been durably committed.
///
/// Delivery is at-least-once: a handler may see the same event again after
/// a failure or restart and must tolerate that.
#[async_trait]
pub trait OutboxHandler: Send + Sync + 'static {
    async fn handle(&self, event: &OutboxEvent) -> Result<(), ProspectError>;
}
