// SPDX-FileCopyrightText: 2026 Prospect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain model types for storage entities.
//!
//! Records that cross adapter boundaries live in `prospect-core::types` and are
//! re-exported here. Types below are storage-level inputs and reports.

use serde::{Deserialize, Serialize};

pub use prospect_core::types::{
    Campaign, CampaignStatus, Channel, Contact, ContactList, ContactSource, DeliveryEvent,
    EntryState, EventOutcome, NewCampaign, NewContact, OutboxEvent, QueueEntry,
};

/// Outcome of enqueueing a set of contacts for a campaign.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnqueueReport {
    /// New entries created.
    pub enqueued: usize,
    /// Contacts that already had an entry for this campaign.
    pub already_queued: usize,
    /// Opted-out contacts, never queued.
    pub opted_out: usize,
    /// Contact ids that do not exist.
    pub missing: usize,
}

/// Live histogram of queue entry states for one campaign.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryCounts {
    pub pending: u64,
    pub in_flight: u64,
    pub sent: u64,
    pub failed: u64,
    pub skipped: u64,
}

impl EntryCounts {
    pub fn total(&self) -> u64 {
        self.pending + self.in_flight + self.sent + self.failed + self.skipped
    }

    /// Entries that still need work.
    pub fn outstanding(&self) -> u64 {
        self.pending + self.in_flight
    }

    pub(crate) fn add(&mut self, state: EntryState, n: u64) {
        match state {
            EntryState::Pending => self.pending += n,
            EntryState::InFlight => self.in_flight += n,
            EntryState::Sent => self.sent += n,
            EntryState::Failed => self.failed += n,
            EntryState::Skipped => self.skipped += n,
        }
    }
}

/// A domain event to be written to the outbox in the same transaction as a state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOutboxEvent {
    pub topic: String,
    pub aggregate_id: String,
    pub payload: String,
}

impl NewOutboxEvent {
    pub fn new(
        topic: impl Into<String>,
        aggregate_id: impl Into<String>,
        payload: &serde_json::Value,
    ) -> Self {
        Self {
            topic: topic.into(),
            aggregate_id: aggregate_id.into(),
            payload: payload.to_string(),
        }
    }
}

/// A compare-and-swap campaign status change.
#[derive(Debug, Clone)]
pub struct CampaignTransition {
    pub campaign_id: String,
    pub from: CampaignStatus,
    pub expected_version: i64,
    pub to: CampaignStatus,
    /// Turn remaining `pending` entries into `skipped` (cancellation).
    pub skip_pending: bool,
    /// Admin who triggered the change, recorded in the outbox payload.
    pub actor: Option<String>,
}

/// Result of a committed campaign transition.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionOutcome {
    pub campaign: Campaign,
    /// Entries moved to `skipped` by this transition.
    pub skipped: usize,
}

/// The resolved next state of an in-flight entry after a send attempt.
///
/// Applied only while the entry is still `in_flight` with `expected_attempts`;
/// otherwise the update is rejected as a conflict.
#[derive(Debug, Clone)]
pub struct EntryResolution {
    pub entry_id: i64,
    pub expected_attempts: u32,
    pub state: EntryState,
    pub attempt_count: u32,
    pub scheduled_at: String,
    pub last_error: Option<String>,
    pub outcome: EventOutcome,
    pub provider_response: Option<String>,
}

/// Changes computed by a sync or import run, applied in one transaction.
#[derive(Debug, Clone, Default)]
pub struct ContactChanges {
    pub inserts: Vec<NewContact>,
    /// `(contact_id, new field values)`.
    pub updates: Vec<(String, NewContact)>,
}

impl ContactChanges {
    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.updates.is_empty()
    }
}

/// Identity keys of an incoming record. A stored contact matches when it
/// shares any one of them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactKeys {
    pub fingerprint: String,
    /// Canonical email.
    pub email: Option<String>,
    /// E.164 phone.
    pub phone: Option<String>,
    pub external_id: Option<String>,
}

impl From<&NewContact> for ContactKeys {
    fn from(contact: &NewContact) -> Self {
        Self {
            fingerprint: contact.fingerprint.clone(),
            email: contact.email.clone(),
            phone: contact.phone.clone(),
            external_id: contact.external_id.clone(),
        }
    }
}

/// One row of the admin audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: i64,
    pub admin_id: String,
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    /// JSON metadata.
    pub metadata: Option<String>,
    pub created_at: String,
}

/// Delivery event counts for one outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeCount {
    pub outcome: EventOutcome,
    /// Number of events.
    pub events: u64,
    /// Number of distinct queue entries with at least one such event.
    pub entries: u64,
}

/// Delivery event counts for one outcome on one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelOutcomeCount {
    pub channel: Channel,
    pub outcome: EventOutcome,
    pub events: u64,
    pub entries: u64,
}
