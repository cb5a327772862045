// SPDX-FileCopyrightText: 2026 Prospect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Send provider adapter trait (email/SMS/WhatsApp gateways).

use async_trait::async_trait;

use crate::error::ProspectError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{Contact, OutboundMessage, SendReceipt};

/// Adapter that hands one rendered message to an external delivery service.
///
/// Implementations classify failures: [`ProspectError::TransientSend`] or
/// [`ProspectError::Timeout`] for anything worth retrying,
/// [`ProspectError::PermanentSend`] for an invalid or refused target.
#[async_trait]
pub trait SendProvider: PluginAdapter {
    /// Sends a message to `contact`.
    async fn send(
        &self,
        contact: &Contact,
        message: &OutboundMessage,
    ) -> Result<SendReceipt, ProspectError>;
}
