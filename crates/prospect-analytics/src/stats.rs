// SPDX-FileCopyrightText: 2026 Prospect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Statistics types and the arithmetic that builds them from raw counts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use prospect_core::time::format_timestamp;
use prospect_core::types::{CampaignStatus, Channel, EventOutcome};
use prospect_core::ProspectError;
use prospect_storage::{ChannelOutcomeCount, EntryCounts, OutcomeCount};

/// `numerator / denominator`, or `0.0` when the denominator is zero.
pub fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Entries per outcome (distinct queue entries, so retries count once).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeTotals {
    pub sent: u64,
    pub failed: u64,
    pub skipped: u64,
    pub delivered: u64,
    pub opened: u64,
    pub replied: u64,
    pub bounced: u64,
    /// Retry events, not entries: one entry can be retried several times.
    pub retries: u64,
}

impl OutcomeTotals {
    fn add(&mut self, outcome: EventOutcome, events: u64, entries: u64) {
        match outcome {
            EventOutcome::Sent => self.sent += entries,
            EventOutcome::Failed => self.failed += entries,
            EventOutcome::Skipped => self.skipped += entries,
            EventOutcome::Delivered => self.delivered += entries,
            EventOutcome::Opened => self.opened += entries,
            EventOutcome::Replied => self.replied += entries,
            EventOutcome::Bounced => self.bounced += entries,
            EventOutcome::RetryScheduled => self.retries += events,
        }
    }

    pub fn from_counts(counts: &[OutcomeCount]) -> Self {
        let mut totals = Self::default();
        for c in counts {
            totals.add(c.outcome, c.events, c.entries);
        }
        totals
    }

    /// Sent out of all attempts that reached a terminal send result.
    pub fn delivery_rate(&self) -> f64 {
        ratio(self.sent, self.sent + self.failed)
    }

    pub fn open_rate(&self) -> f64 {
        ratio(self.opened, self.sent)
    }

    pub fn reply_rate(&self) -> f64 {
        ratio(self.replied, self.sent)
    }

    pub fn bounce_rate(&self) -> f64 {
        ratio(self.bounced, self.sent)
    }
}

/// Event-log rollup for one campaign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignStats {
    pub campaign_id: String,
    pub status: CampaignStatus,
    pub channel: Channel,
    pub totals: OutcomeTotals,
    pub delivery_rate: f64,
    pub open_rate: f64,
    pub reply_rate: f64,
    pub bounce_rate: f64,
}

impl CampaignStats {
    pub fn new(
        campaign_id: String,
        status: CampaignStatus,
        channel: Channel,
        counts: &[OutcomeCount],
    ) -> Self {
        let totals = OutcomeTotals::from_counts(counts);
        Self {
            campaign_id,
            status,
            channel,
            delivery_rate: totals.delivery_rate(),
            open_rate: totals.open_rate(),
            reply_rate: totals.reply_rate(),
            bounce_rate: totals.bounce_rate(),
            totals,
        }
    }
}

/// Live histogram of a campaign's entry states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub pending: u64,
    pub in_flight: u64,
    pub sent: u64,
    pub failed: u64,
    pub skipped: u64,
    pub total: u64,
}

impl From<EntryCounts> for QueueStats {
    fn from(c: EntryCounts) -> Self {
        Self {
            pending: c.pending,
            in_flight: c.in_flight,
            sent: c.sent,
            failed: c.failed,
            skipped: c.skipped,
            total: c.total(),
        }
    }
}

/// Half-open time window `[from, to)`; a missing bound is unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn new(
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Self, ProspectError> {
        if let (Some(f), Some(t)) = (from, to)
            && f > t
        {
            return Err(ProspectError::Validation(format!(
                "date range starts after it ends ({f} > {t})"
            )));
        }
        Ok(Self { from, to })
    }

    /// Bounds in the storage timestamp format.
    pub(crate) fn bounds(&self) -> (Option<String>, Option<String>) {
        (self.from.map(format_timestamp), self.to.map(format_timestamp))
    }
}

/// Per-channel results within a date range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelPerformance {
    pub channel: Channel,
    pub sent: u64,
    pub delivered: u64,
    pub replied: u64,
    pub failed: u64,
    pub delivery_rate: f64,
    pub reply_rate: f64,
}

impl ChannelPerformance {
    /// One row per channel, in [`Channel::ALL`] order, zero-filled.
    pub fn from_counts(counts: &[ChannelOutcomeCount]) -> Vec<Self> {
        Channel::ALL
            .iter()
            .map(|&channel| {
                let mut totals = OutcomeTotals::default();
                for c in counts.iter().filter(|c| c.channel == channel) {
                    totals.add(c.outcome, c.events, c.entries);
                }
                Self {
                    channel,
                    sent: totals.sent,
                    delivered: totals.delivered,
                    replied: totals.replied,
                    failed: totals.failed,
                    delivery_rate: totals.delivery_rate(),
                    reply_rate: totals.reply_rate(),
                }
            })
            .collect()
    }
}

/// Dashboard summary across all campaigns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverviewStats {
    pub total_contacts: u64,
    pub opted_out_contacts: u64,
    pub total_campaigns: u64,
    /// Campaigns that are sending or paused.
    pub active_campaigns: u64,
    pub sent: u64,
    pub failed: u64,
    pub replied: u64,
    pub sent_by_channel: Vec<(Channel, u64)>,
    pub delivery_rate: f64,
    pub reply_rate: f64,
}
