// SPDX-FileCopyrightText: 2026 Prospect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The per-campaign send queue.
//!
//! Entries move `pending -> in_flight -> {sent | pending (retry) | failed}`.
//! Claims are atomic in storage, and outcomes are applied with a
//! compare-and-swap on the entry's attempt count, so a late or duplicate
//! result for an entry is rejected instead of double-counted.

use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use prospect_core::time::format_timestamp;
use prospect_core::types::{EntryState, EventOutcome, QueueEntry, SendOutcome};
use prospect_core::ProspectError;
use prospect_storage::queries::queue as entries;
use prospect_storage::{Database, EnqueueReport, EntryCounts, EntryResolution};

use crate::retry::RetryPolicy;

/// Most expired claims handled in one reclaim pass.
const RECLAIM_BATCH: u32 = 500;

const LEASE_EXPIRED: &str = "claim lease expired";

/// Message queue over the `queue_entries` table.
#[derive(Clone)]
pub struct MessageQueue {
    db: Database,
    policy: RetryPolicy,
}

impl MessageQueue {
    pub fn new(db: Database, policy: RetryPolicy) -> Self {
        Self { db, policy }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Queue contacts for a campaign.
    ///
    /// Opted-out contacts are never queued and re-enqueueing a contact is a
    /// no-op; both are reported rather than treated as errors.
    pub async fn enqueue(
        &self,
        campaign_id: &str,
        contact_ids: &[String],
    ) -> Result<EnqueueReport, ProspectError> {
        let report = entries::enqueue(&self.db, campaign_id, contact_ids).await?;
        info!(
            campaign_id,
            enqueued = report.enqueued,
            already_queued = report.already_queued,
            opted_out = report.opted_out,
            missing = report.missing,
            "contacts enqueued"
        );
        Ok(report)
    }

    /// Atomically claim up to `max_n` due entries of a sending campaign.
    ///
    /// Returns an empty batch for `max_n == 0` and for campaigns that are not
    /// `sending`.
    pub async fn dequeue_batch(
        &self,
        campaign_id: &str,
        max_n: u32,
    ) -> Result<Vec<QueueEntry>, ProspectError> {
        let batch = entries::claim_batch(&self.db, campaign_id, max_n).await?;
        if !batch.is_empty() {
            debug!(campaign_id, claimed = batch.len(), "claimed queue entries");
            prospect_prometheus::record_claims(batch.len());
        }
        Ok(batch)
    }

    /// Apply the outcome of a send attempt to an in-flight entry.
    ///
    /// `Transient` outcomes go back to `pending` with a backoff delay until
    /// the retry budget is spent, then become `failed`. `Permanent` outcomes
    /// fail immediately. An entry that is no longer in flight (or was
    /// resolved concurrently) yields `StateConflict` and nothing is written.
    pub async fn mark_result(
        &self,
        entry_id: i64,
        outcome: SendOutcome,
    ) -> Result<QueueEntry, ProspectError> {
        let entry = entries::get_entry(&self.db, entry_id)
            .await?
            .ok_or_else(|| ProspectError::not_found("queue entry", entry_id.to_string()))?;
        if entry.state != EntryState::InFlight {
            return Err(ProspectError::StateConflict(format!(
                "queue entry {entry_id} is {}, not in_flight",
                entry.state
            )));
        }

        let resolution = self.resolve(&entry, outcome);
        let updated = entries::resolve_entry(&self.db, resolution).await?;
        debug!(
            entry_id,
            campaign_id = %updated.campaign_id,
            state = %updated.state,
            attempts = updated.attempt_count,
            "send outcome recorded"
        );
        Ok(updated)
    }

    fn resolve(&self, entry: &QueueEntry, outcome: SendOutcome) -> EntryResolution {
        let now = Utc::now();
        let base = EntryResolution {
            entry_id: entry.id,
            expected_attempts: entry.attempt_count,
            state: EntryState::Sent,
            attempt_count: entry.attempt_count,
            scheduled_at: entry.scheduled_at.clone(),
            last_error: None,
            outcome: EventOutcome::Sent,
            provider_response: None,
        };

        match outcome {
            SendOutcome::Sent { provider_response } => EntryResolution {
                attempt_count: entry.attempt_count + 1,
                provider_response,
                ..base
            },
            SendOutcome::Transient { reason } => {
                let attempts = entry.attempt_count + 1;
                if self.policy.should_retry(attempts) {
                    let delay = self.policy.delay_for(attempts);
                    let retry_at = chrono::Duration::from_std(delay)
                        .ok()
                        .and_then(|d| now.checked_add_signed(d))
                        .unwrap_or(now);
                    EntryResolution {
                        state: EntryState::Pending,
                        attempt_count: attempts,
                        scheduled_at: format_timestamp(retry_at),
                        last_error: Some(reason.clone()),
                        outcome: EventOutcome::RetryScheduled,
                        provider_response: Some(reason),
                        ..base
                    }
                } else {
                    EntryResolution {
                        state: EntryState::Failed,
                        attempt_count: attempts,
                        last_error: Some(reason.clone()),
                        outcome: EventOutcome::Failed,
                        provider_response: Some(reason),
                        ..base
                    }
                }
            }
            SendOutcome::Permanent { reason } => EntryResolution {
                state: EntryState::Failed,
                attempt_count: entry.attempt_count + 1,
                last_error: Some(reason.clone()),
                outcome: EventOutcome::Failed,
                provider_response: Some(reason),
                ..base
            },
        }
    }

    /// Restart the lease of a claimed entry right before sending it.
    ///
    /// `false` means the claim was lost (reclaimed after its lease expired)
    /// and the entry must not be sent by this holder.
    pub async fn renew_claim(&self, entry: &QueueEntry) -> Result<bool, ProspectError> {
        entries::renew_claim(&self.db, entry.id, entry.attempt_count).await
    }

    /// Treat entries in flight for longer than `lease` as transient failures.
    ///
    /// Recovers entries whose worker died mid-send. Returns how many were
    /// reclaimed; entries resolved concurrently are skipped.
    pub async fn reap_expired_claims(&self, lease: Duration) -> Result<usize, ProspectError> {
        let lease = chrono::Duration::from_std(lease)
            .map_err(|e| ProspectError::Validation(format!("invalid claim lease: {e}")))?;
        let cutoff = Utc::now()
            .checked_sub_signed(lease)
            .map(format_timestamp)
            .ok_or_else(|| ProspectError::Validation("claim lease out of range".to_string()))?;

        let expired = entries::expired_claims(&self.db, &cutoff, RECLAIM_BATCH).await?;
        let mut reclaimed = 0;
        for entry in expired {
            let outcome = SendOutcome::Transient {
                reason: LEASE_EXPIRED.to_string(),
            };
            match entries::resolve_entry(&self.db, self.resolve(&entry, outcome)).await {
                Ok(_) => reclaimed += 1,
                Err(ProspectError::StateConflict(_)) => {}
                Err(e) => return Err(e),
            }
        }
        if reclaimed > 0 {
            warn!(reclaimed, "reclaimed queue entries with expired leases");
            prospect_prometheus::record_reclaimed(reclaimed);
        }
        Ok(reclaimed)
    }

    /// Live state histogram for one campaign.
    pub async fn depth(&self, campaign_id: &str) -> Result<EntryCounts, ProspectError> {
        entries::entry_counts(&self.db, campaign_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prospect_core::types::CampaignStatus;
    use prospect_storage::queries::{campaigns, contacts, events};
    use prospect_storage::CampaignTransition;
    use prospect_test_utils::TestHarness;

    async fn sending(harness: &TestHarness, n: usize) -> (MessageQueue, String, Vec<String>) {
        let (campaign, seeded) = harness.seeded_campaign(n).await.unwrap();
        let queue = MessageQueue::new(harness.db.clone(), RetryPolicy::immediate(3));
        let ids: Vec<String> = seeded.iter().map(|c| c.id.clone()).collect();
        queue.enqueue(&campaign.id, &ids).await.unwrap();
        campaigns::transition(
            &harness.db,
            CampaignTransition {
                campaign_id: campaign.id.clone(),
                from: CampaignStatus::Draft,
                expected_version: campaign.version,
                to: CampaignStatus::Sending,
                skip_pending: false,
                actor: None,
            },
        )
        .await
        .unwrap();
        (queue, campaign.id, ids)
    }

    #[tokio::test]
    async fn sent_outcome_is_terminal_and_stamps_contact() {
        let harness = TestHarness::new().await.unwrap();
        let (queue, campaign_id, _) = sending(&harness, 1).await;
        let entry = queue.dequeue_batch(&campaign_id, 1).await.unwrap().remove(0);

        let done = queue
            .mark_result(
                entry.id,
                SendOutcome::Sent {
                    provider_response: Some("queued".into()),
                },
            )
            .await
            .unwrap();
        assert_eq!(done.state, EntryState::Sent);
        assert_eq!(done.attempt_count, 1);

        let contact = contacts::get_contact(&harness.db, &entry.contact_id)
            .await
            .unwrap()
            .unwrap();
        assert!(contact.last_contacted_at.is_some());

        let err = queue
            .mark_result(
                entry.id,
                SendOutcome::Sent {
                    provider_response: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ProspectError::StateConflict(_)));
        assert_eq!(events::list_events(&harness.db, &campaign_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn transient_backs_off_into_the_future() {
        let harness = TestHarness::new().await.unwrap();
        let (campaign, seeded) = harness.seeded_campaign(1).await.unwrap();
        let queue = MessageQueue::new(harness.db.clone(), RetryPolicy::default());
        queue.enqueue(&campaign.id, &[seeded[0].id.clone()]).await.unwrap();
        campaigns::transition(
            &harness.db,
            CampaignTransition {
                campaign_id: campaign.id.clone(),
                from: CampaignStatus::Draft,
                expected_version: campaign.version,
                to: CampaignStatus::Sending,
                skip_pending: false,
                actor: None,
            },
        )
        .await
        .unwrap();

        let entry = queue.dequeue_batch(&campaign.id, 1).await.unwrap().remove(0);
        let retried = queue
            .mark_result(
                entry.id,
                SendOutcome::Transient {
                    reason: "503".into(),
                },
            )
            .await
            .unwrap();
        assert_eq!(retried.state, EntryState::Pending);
        assert_eq!(retried.attempt_count, 1);
        assert_eq!(retried.last_error.as_deref(), Some("503"));
        assert!(retried.scheduled_at > entry.scheduled_at);
        // Not due yet, so nothing is claimable.
        assert!(queue.dequeue_batch(&campaign.id, 1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn permanent_fails_on_first_attempt() {
        let harness = TestHarness::new().await.unwrap();
        let (queue, campaign_id, _) = sending(&harness, 1).await;
        let entry = queue.dequeue_batch(&campaign_id, 1).await.unwrap().remove(0);
        let failed = queue
            .mark_result(
                entry.id,
                SendOutcome::Permanent {
                    reason: "invalid address".into(),
                },
            )
            .await
            .unwrap();
        assert_eq!(failed.state, EntryState::Failed);
        assert_eq!(failed.attempt_count, 1);
        let counts = queue.depth(&campaign_id).await.unwrap();
        assert_eq!(counts.failed, 1);
        assert_eq!(counts.outstanding(), 0);
    }

    #[tokio::test]
    async fn mark_result_on_pending_entry_conflicts() {
        let harness = TestHarness::new().await.unwrap();
        let (queue, campaign_id, _) = sending(&harness, 1).await;
        let pending = entries::list_entries(&harness.db, &campaign_id, None, 10)
            .await
            .unwrap()
            .remove(0);
        let err = queue
            .mark_result(
                pending.id,
                SendOutcome::Sent {
                    provider_response: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ProspectError::StateConflict(_)));
        let missing = queue
            .mark_result(
                9999,
                SendOutcome::Sent {
                    provider_response: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(missing, ProspectError::NotFound { .. }));
    }

    #[tokio::test]
    async fn reclaimed_entry_cannot_be_renewed_by_its_old_holder() {
        let harness = TestHarness::new().await.unwrap();
        let (queue, campaign_id, _) = sending(&harness, 1).await;
        let held = queue.dequeue_batch(&campaign_id, 1).await.unwrap().remove(0);
        assert!(queue.renew_claim(&held).await.unwrap());

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue
            .reap_expired_claims(Duration::from_millis(1))
            .await
            .unwrap();
        // Another worker picks the entry up again.
        let retaken = queue.dequeue_batch(&campaign_id, 1).await.unwrap().remove(0);
        assert_eq!(retaken.id, held.id);

        assert!(!queue.renew_claim(&held).await.unwrap());
        assert!(queue.renew_claim(&retaken).await.unwrap());
    }

    #[tokio::test]
    async fn expired_claims_are_reclaimed() {
        let harness = TestHarness::new().await.unwrap();
        let (queue, campaign_id, _) = sending(&harness, 2).await;
        let claimed = queue.dequeue_batch(&campaign_id, 2).await.unwrap();
        assert_eq!(claimed.len(), 2);

        // A generous lease leaves fresh claims alone.
        assert_eq!(
            queue.reap_expired_claims(Duration::from_secs(600)).await.unwrap(),
            0
        );

        tokio::time::sleep(Duration::from_millis(20)).await;
        let reclaimed = queue
            .reap_expired_claims(Duration::from_millis(1))
            .await
            .unwrap();
        assert_eq!(reclaimed, 2);
        let counts = queue.depth(&campaign_id).await.unwrap();
        assert_eq!(counts.pending, 2);
        assert_eq!(counts.in_flight, 0);

        let entry = entries::get_entry(&harness.db, claimed[0].id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.attempt_count, 1);
        assert_eq!(entry.last_error.as_deref(), Some(LEASE_EXPIRED));
    }
}
