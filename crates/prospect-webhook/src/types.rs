// SPDX-FileCopyrightText: 2026 Prospect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire types for the webhook provider.

use serde::{Deserialize, Serialize};

use prospect_core::types::{Channel, OutboundMessage};

/// JSON body posted for each message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub entry_id: i64,
    pub campaign_id: String,
    pub contact_id: String,
    pub channel: Channel,
    pub recipient: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub body: String,
}

impl WebhookPayload {
    pub fn new(contact_id: &str, message: &OutboundMessage) -> Self {
        Self {
            entry_id: message.entry_id,
            campaign_id: message.campaign_id.clone(),
            contact_id: contact_id.to_string(),
            channel: message.channel,
            recipient: message.recipient.clone(),
            subject: message.subject.clone(),
            body: message.body.clone(),
        }
    }

    /// Key the provider can use to drop a redelivered message.
    pub fn idempotency_key(&self) -> String {
        format!("{}:{}", self.campaign_id, self.entry_id)
    }
}

/// Accepted-message reply. Every field is optional; providers vary.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookReply {
    #[serde(default, alias = "message_id", alias = "messageId")]
    pub id: Option<String>,
}
