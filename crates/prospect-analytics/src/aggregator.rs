// SPDX-FileCopyrightText: 2026 Prospect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read-side aggregation over the event log.

use tracing::debug;

use prospect_core::types::{DeliveryEvent, EventOutcome};
use prospect_core::ProspectError;
use prospect_storage::Database;
use prospect_storage::queries::{campaigns, contacts, events, queue};

use crate::stats::{
    CampaignStats, ChannelPerformance, DateRange, OutcomeTotals, OverviewStats, QueueStats, ratio,
};

/// Computes statistics on demand.
#[derive(Clone)]
pub struct Analytics {
    db: Database,
}

impl Analytics {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Outcome counts and rates for one campaign.
    pub async fn campaign_stats(&self, campaign_id: &str) -> Result<CampaignStats, ProspectError> {
        let campaign = campaigns::get_campaign(&self.db, campaign_id)
            .await?
            .ok_or_else(|| ProspectError::not_found("campaign", campaign_id))?;
        let counts = events::outcome_counts(&self.db, campaign_id).await?;
        Ok(CampaignStats::new(
            campaign.id,
            campaign.status,
            campaign.channel,
            &counts,
        ))
    }

    /// Current entry-state histogram for one campaign.
    pub async fn queue_stats(&self, campaign_id: &str) -> Result<QueueStats, ProspectError> {
        if campaigns::get_campaign(&self.db, campaign_id).await?.is_none() {
            return Err(ProspectError::not_found("campaign", campaign_id));
        }
        Ok(queue::entry_counts(&self.db, campaign_id).await?.into())
    }

    /// Summary across all campaigns, with event figures limited to `range`.
    pub async fn overview_stats(&self, range: DateRange) -> Result<OverviewStats, ProspectError> {
        let (total_contacts, opted_out_contacts) = contacts::contact_counts(&self.db).await?;
        let (total_campaigns, active_campaigns) = campaigns::campaign_counts(&self.db).await?;
        let (from, to) = range.bounds();
        let counts =
            events::channel_outcome_counts(&self.db, from.as_deref(), to.as_deref()).await?;

        let mut totals = OutcomeTotals::default();
        let per_channel = ChannelPerformance::from_counts(&counts);
        for row in &per_channel {
            totals.sent += row.sent;
            totals.failed += row.failed;
            totals.replied += row.replied;
        }

        Ok(OverviewStats {
            total_contacts,
            opted_out_contacts,
            total_campaigns,
            active_campaigns,
            sent: totals.sent,
            failed: totals.failed,
            replied: totals.replied,
            sent_by_channel: per_channel.iter().map(|r| (r.channel, r.sent)).collect(),
            delivery_rate: totals.delivery_rate(),
            reply_rate: ratio(totals.replied, totals.sent),
        })
    }

    /// Per-channel sent, delivered, replied and failed counts within `range`.
    pub async fn channel_performance(
        &self,
        range: DateRange,
    ) -> Result<Vec<ChannelPerformance>, ProspectError> {
        let (from, to) = range.bounds();
        let counts =
            events::channel_outcome_counts(&self.db, from.as_deref(), to.as_deref()).await?;
        Ok(ChannelPerformance::from_counts(&counts))
    }

    /// Append a provider callback (delivered, opened, replied, bounced) to the log.
    ///
    /// The entry must have been sent.
    pub async fn record_engagement(
        &self,
        entry_id: i64,
        outcome: EventOutcome,
        provider_response: Option<&str>,
    ) -> Result<DeliveryEvent, ProspectError> {
        let event = events::insert_engagement(&self.db, entry_id, outcome, provider_response).await?;
        debug!(entry_id, outcome = %outcome, campaign_id = %event.campaign_id, "engagement recorded");
        Ok(event)
    }
}
