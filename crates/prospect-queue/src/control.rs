// SPDX-FileCopyrightText: 2026 Prospect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Campaign lifecycle control.
//!
//! ```text
//! draft --start--> sending --pause--> paused --resume--> sending
//!                  sending --drained--> completed | failed
//! draft | sending | paused --cancel--> cancelled
//! ```
//!
//! Every transition is a compare-and-swap on the campaign's `(status,
//! version)`; losing a race surfaces as `StateConflict` with nothing written.
//! Pause and resume only gate future claims: entries already in flight finish
//! and record their outcome normally.

use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};

use prospect_core::template;
use prospect_core::traits::audit::AuditSink;
use prospect_core::types::{AdminContext, Campaign, CampaignStatus, NewCampaign};
use prospect_core::ProspectError;
use prospect_storage::queries::{campaigns, lists};
use prospect_storage::{CampaignTransition, Database, EnqueueReport, TransitionOutcome};

use crate::queue::MessageQueue;

const ENTITY: &str = "campaign";

/// Result of starting a campaign.
#[derive(Debug, Clone, PartialEq)]
pub struct StartReport {
    pub campaign: Campaign,
    pub enqueue: EnqueueReport,
}

/// Applies admin-triggered and automatic campaign status transitions.
#[derive(Clone)]
pub struct CampaignControl {
    db: Database,
    queue: MessageQueue,
    audit: Arc<dyn AuditSink>,
    unsubscribe_links: bool,
}

impl CampaignControl {
    pub fn new(queue: MessageQueue, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            db: queue.database().clone(),
            queue,
            audit,
            unsubscribe_links: false,
        }
    }

    /// Accept `{{unsubscribe_link}}` in templates. Only set when the
    /// dispatcher signs links.
    pub fn with_unsubscribe_links(mut self, enabled: bool) -> Self {
        self.unsubscribe_links = enabled;
        self
    }

    /// Create a campaign in `draft`.
    ///
    /// Subject and body may only reference known template variables.
    pub async fn create_campaign(
        &self,
        admin: &AdminContext,
        campaign: &NewCampaign,
    ) -> Result<Campaign, ProspectError> {
        if campaign.name.trim().is_empty() {
            return Err(ProspectError::Validation(
                "campaign name must not be empty".to_string(),
            ));
        }
        if campaign.body_template.trim().is_empty() {
            return Err(ProspectError::Validation(
                "campaign body template must not be empty".to_string(),
            ));
        }
        if campaign.rate_limit_per_sec == Some(0) {
            return Err(ProspectError::Validation(
                "rate_limit_per_sec must be at least 1".to_string(),
            ));
        }
        template::validate(&campaign.body_template, self.unsubscribe_links)?;
        if let Some(subject) = &campaign.subject_template {
            template::validate(subject, self.unsubscribe_links)?;
        }

        let created = campaigns::insert_campaign(&self.db, campaign).await?;
        info!(campaign_id = %created.id, channel = %created.channel, "campaign created");
        self.audit(
            admin,
            "campaign.create",
            &created.id,
            json!({ "name": created.name, "channel": created.channel }),
        )
        .await;
        Ok(created)
    }

    /// Queue every member of the campaign's list and move it to `sending`.
    ///
    /// Only a `draft` campaign can be started. Opted-out members are skipped
    /// at enqueue time.
    pub async fn start_campaign(
        &self,
        admin: &AdminContext,
        campaign_id: &str,
    ) -> Result<StartReport, ProspectError> {
        let current = self.load(campaign_id).await?;
        if current.status != CampaignStatus::Draft {
            return Err(ProspectError::StateConflict(format!(
                "campaign {campaign_id} is {}, only draft campaigns can be started",
                current.status
            )));
        }

        let enqueue = match &current.list_id {
            Some(list_id) => {
                let members = lists::member_ids(&self.db, list_id).await?;
                self.queue.enqueue(campaign_id, &members).await?
            }
            None => EnqueueReport::default(),
        };

        let outcome = self
            .apply(admin, &current, CampaignStatus::Sending, false)
            .await?;
        self.audit(
            admin,
            "campaign.start",
            campaign_id,
            json!({
                "enqueued": enqueue.enqueued,
                "opted_out": enqueue.opted_out,
                "missing": enqueue.missing,
            }),
        )
        .await;
        Ok(StartReport {
            campaign: outcome.campaign,
            enqueue,
        })
    }

    /// `sending -> paused`. Any other status is a `StateConflict`.
    pub async fn pause_campaign(
        &self,
        admin: &AdminContext,
        campaign_id: &str,
    ) -> Result<Campaign, ProspectError> {
        let current = self.load(campaign_id).await?;
        if current.status != CampaignStatus::Sending {
            return Err(ProspectError::StateConflict(format!(
                "campaign {campaign_id} is {}, only sending campaigns can be paused",
                current.status
            )));
        }
        let outcome = self
            .apply(admin, &current, CampaignStatus::Paused, false)
            .await?;
        self.audit(admin, "campaign.pause", campaign_id, json!({})).await;
        Ok(outcome.campaign)
    }

    /// `paused -> sending`. Any other status is a `StateConflict`.
    pub async fn resume_campaign(
        &self,
        admin: &AdminContext,
        campaign_id: &str,
    ) -> Result<Campaign, ProspectError> {
        let current = self.load(campaign_id).await?;
        if current.status != CampaignStatus::Paused {
            return Err(ProspectError::StateConflict(format!(
                "campaign {campaign_id} is {}, only paused campaigns can be resumed",
                current.status
            )));
        }
        let outcome = self
            .apply(admin, &current, CampaignStatus::Sending, false)
            .await?;
        self.audit(admin, "campaign.resume", campaign_id, json!({})).await;
        Ok(outcome.campaign)
    }

    /// Cancel a campaign that has not finished.
    ///
    /// Pending entries become `skipped`; in-flight entries finish normally.
    pub async fn cancel_campaign(
        &self,
        admin: &AdminContext,
        campaign_id: &str,
    ) -> Result<TransitionOutcome, ProspectError> {
        let current = self.load(campaign_id).await?;
        if current.status.is_terminal() {
            return Err(ProspectError::StateConflict(format!(
                "campaign {campaign_id} is already {}",
                current.status
            )));
        }
        let outcome = self
            .apply(admin, &current, CampaignStatus::Cancelled, true)
            .await?;
        self.audit(
            admin,
            "campaign.cancel",
            campaign_id,
            json!({ "skipped": outcome.skipped }),
        )
        .await;
        Ok(outcome)
    }

    /// Complete a `sending` campaign with no pending or in-flight entries.
    ///
    /// Returns the finished campaign, or `None` if it is not drained yet (or
    /// not sending).
    pub async fn finalize_if_drained(
        &self,
        campaign_id: &str,
    ) -> Result<Option<Campaign>, ProspectError> {
        let Some(outcome) = campaigns::finalize_if_drained(&self.db, campaign_id).await? else {
            return Ok(None);
        };
        info!(campaign_id, status = %outcome.campaign.status, "campaign finished");
        prospect_prometheus::record_transition(&outcome.campaign.status.to_string());
        Ok(Some(outcome.campaign))
    }

    async fn load(&self, campaign_id: &str) -> Result<Campaign, ProspectError> {
        campaigns::get_campaign(&self.db, campaign_id)
            .await?
            .ok_or_else(|| ProspectError::not_found(ENTITY, campaign_id))
    }

    async fn apply(
        &self,
        admin: &AdminContext,
        current: &Campaign,
        to: CampaignStatus,
        skip_pending: bool,
    ) -> Result<TransitionOutcome, ProspectError> {
        let outcome = campaigns::transition(
            &self.db,
            CampaignTransition {
                campaign_id: current.id.clone(),
                from: current.status,
                expected_version: current.version,
                to,
                skip_pending,
                actor: Some(admin.admin_id.clone()),
            },
        )
        .await?;
        info!(
            campaign_id = %current.id,
            from = %current.status,
            to = %to,
            admin_id = %admin.admin_id,
            "campaign status changed"
        );
        prospect_prometheus::record_transition(&to.to_string());
        Ok(outcome)
    }

    async fn audit(
        &self,
        admin: &AdminContext,
        action: &str,
        campaign_id: &str,
        metadata: serde_json::Value,
    ) {
        if let Err(e) = self
            .audit
            .log_admin_action(&admin.admin_id, action, ENTITY, campaign_id, Some(metadata))
            .await
        {
            warn!(action, campaign_id, error = %e, "audit log write failed");
        }
    }
}
