// SPDX-FileCopyrightText: 2026 Prospect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared across the Prospect crates.
//!
//! Status and outcome enums are stored as their `Display` strings in SQLite,
//! so the strum and serde spellings must stay identical.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter behind a [`PluginAdapter`](crate::PluginAdapter).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    SendProvider,
    Storage,
    Directory,
    Observability,
}

/// Outbound delivery channel of a campaign.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Email,
    Sms,
    Whatsapp,
}

impl Channel {
    /// All channels, in reporting order.
    pub const ALL: [Channel; 3] = [Channel::Email, Channel::Sms, Channel::Whatsapp];
}

/// Lifecycle status of a campaign.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    Draft,
    Sending,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl CampaignStatus {
    /// Terminal statuses accept no further transitions and no new entries.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// State of a single queue entry.
///
/// `pending -> in_flight -> {sent | pending (retry) | failed}`. `skipped` is
/// reached only when a campaign is cancelled with entries still pending.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EntryState {
    Pending,
    InFlight,
    Sent,
    Failed,
    Skipped,
}

impl EntryState {
    /// Absorbing states: no transition leaves them.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Sent | Self::Failed | Self::Skipped)
    }
}

/// Outcome recorded on an append-only delivery event.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EventOutcome {
    /// The provider accepted the message.
    Sent,
    /// A transient failure; the entry went back to `pending`.
    RetryScheduled,
    /// Terminal failure (permanent error or retries exhausted).
    Failed,
    /// The entry was never attempted (campaign cancelled).
    Skipped,
    /// Provider callback: handed to the recipient's device or mailbox.
    Delivered,
    /// Provider callback: opened or read.
    Opened,
    /// Provider callback: the recipient answered.
    Replied,
    /// Provider callback: bounced after acceptance.
    Bounced,
}

impl EventOutcome {
    /// Outcomes that arrive from provider callbacks rather than send attempts.
    pub fn is_engagement(self) -> bool {
        matches!(
            self,
            Self::Delivered | Self::Opened | Self::Replied | Self::Bounced
        )
    }
}

/// Where a contact row came from.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ContactSource {
    Directory,
    Import,
    Manual,
}

/// A prospect that campaigns can target.
///
/// Unique on `fingerprint`. Never hard-deleted: opting out sets `opt_out`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    pub display_name: Option<String>,
    pub company_name: Option<String>,
    /// Canonical E.164 phone number.
    pub phone: Option<String>,
    /// Lowercased email address.
    pub email: Option<String>,
    pub department: Option<String>,
    pub city: Option<String>,
    /// Identifier in the primary provider directory, when synced from it.
    pub external_id: Option<String>,
    pub source: ContactSource,
    pub fingerprint: String,
    pub opt_out: bool,
    pub opted_out_at: Option<String>,
    pub last_contacted_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Contact {
    /// The address this contact is reachable at on `channel`, if any.
    pub fn address_for(&self, channel: Channel) -> Option<&str> {
        match channel {
            Channel::Email => self.email.as_deref(),
            Channel::Sms | Channel::Whatsapp => self.phone.as_deref(),
        }
    }
}

/// Fields for inserting a contact; identity and timestamps are assigned by storage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewContact {
    pub display_name: Option<String>,
    pub company_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub department: Option<String>,
    pub city: Option<String>,
    pub external_id: Option<String>,
    pub fingerprint: String,
}

/// A named set of contacts that a campaign targets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactList {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: String,
}

/// A named batch of messages targeting one contact list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: String,
    pub name: String,
    pub channel: Channel,
    pub list_id: Option<String>,
    pub subject_template: Option<String>,
    pub body_template: String,
    pub status: CampaignStatus,
    /// Per-campaign send ceiling; `None` uses the dispatcher default.
    pub rate_limit_per_sec: Option<u32>,
    /// Optimistic concurrency version, bumped on every status transition.
    pub version: i64,
    pub created_at: String,
    pub started_at: Option<String>,
    pub paused_at: Option<String>,
    pub completed_at: Option<String>,
}

/// Fields for creating a draft campaign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCampaign {
    pub name: String,
    pub channel: Channel,
    pub list_id: Option<String>,
    pub subject_template: Option<String>,
    pub body_template: String,
    pub rate_limit_per_sec: Option<u32>,
}

/// One scheduled send within a campaign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: i64,
    pub campaign_id: String,
    pub contact_id: String,
    pub state: EntryState,
    pub attempt_count: u32,
    pub scheduled_at: String,
    pub claimed_at: Option<String>,
    pub last_error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Immutable record of something that happened to a queue entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryEvent {
    pub id: i64,
    pub queue_entry_id: i64,
    pub campaign_id: String,
    pub channel: Channel,
    pub outcome: EventOutcome,
    pub provider_response: Option<String>,
    pub occurred_at: String,
}

/// A domain event awaiting asynchronous relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxEvent {
    pub id: i64,
    pub topic: String,
    pub aggregate_id: String,
    /// JSON payload.
    pub payload: String,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub created_at: String,
    pub processed_at: Option<String>,
}

/// Result of a send attempt as reported to the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// The provider accepted the message.
    Sent { provider_response: Option<String> },
    /// Timeout, 5xx, rate limit: eligible for retry.
    Transient { reason: String },
    /// Invalid target or opted out: terminal on first attempt.
    Permanent { reason: String },
}

impl SendOutcome {
    /// Classify a send error into an outcome.
    pub fn from_error(err: &crate::ProspectError) -> Self {
        let reason = err.to_string();
        if err.is_retryable() {
            Self::Transient { reason }
        } else {
            Self::Permanent { reason }
        }
    }
}

/// A rendered message handed to a [`SendProvider`](crate::SendProvider).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub entry_id: i64,
    pub campaign_id: String,
    pub channel: Channel,
    /// Email address or E.164 phone number.
    pub recipient: String,
    pub subject: Option<String>,
    pub body: String,
}

/// What a provider returns for an accepted message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SendReceipt {
    pub provider_message_id: Option<String>,
    pub provider_response: Option<String>,
}

/// The already-authorized administrator on whose behalf an action runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminContext {
    pub admin_id: String,
}

impl AdminContext {
    pub fn new(admin_id: impl Into<String>) -> Self {
        Self {
            admin_id: admin_id.into(),
        }
    }
}

/// One row of the primary provider directory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DirectoryRecord {
    pub external_id: String,
    pub name: Option<String>,
    pub company_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub city: Option<String>,
}

/// Partition selector for directory sync runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncFilter {
    pub department: Option<String>,
}
