// SPDX-FileCopyrightText: 2026 Prospect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The dispatch loop.
//!
//! Each poll reclaims expired leases, then drains every `sending` campaign
//! (a bounded number at a time). Pausing a campaign needs no coordination:
//! the claim itself checks the campaign status, so the next claim after a
//! pause returns nothing while sends already in flight complete normally.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use prospect_config::model::{DispatchConfig, QueueConfig};
use prospect_core::redact::{mask_email, mask_phone};
use prospect_core::template::{TemplateContext, render};
use prospect_core::traits::provider::SendProvider;
use prospect_core::types::{
    Campaign, CampaignStatus, Channel, EntryState, OutboundMessage, QueueEntry,
    SendOutcome,
};
use prospect_core::unsubscribe::UnsubscribeSigner;
use prospect_core::ProspectError;
use prospect_queue::{CampaignControl, MessageQueue};
use prospect_storage::queries::{campaigns, contacts};

use crate::limiter::RateLimiters;

/// Dispatcher tuning, usually built from configuration.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub poll_interval: Duration,
    pub batch_size: u32,
    pub default_rate_per_sec: u32,
    pub max_concurrent_campaigns: usize,
    pub max_in_flight_per_campaign: usize,
    pub send_timeout: Duration,
    pub claim_lease: Duration,
}

impl DispatchSettings {
    pub fn from_config(dispatch: &DispatchConfig, queue: &QueueConfig) -> Self {
        Self {
            poll_interval: Duration::from_millis(dispatch.poll_interval_ms),
            batch_size: dispatch.batch_size,
            default_rate_per_sec: dispatch.default_rate_per_sec,
            max_concurrent_campaigns: dispatch.max_concurrent_campaigns.max(1),
            max_in_flight_per_campaign: dispatch.max_in_flight_per_campaign.max(1),
            send_timeout: Duration::from_secs(dispatch.send_timeout_secs),
            claim_lease: Duration::from_secs(queue.claim_lease_secs),
        }
    }
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self::from_config(&DispatchConfig::default(), &QueueConfig::default())
    }
}

/// Totals from one dispatcher poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollReport {
    pub reclaimed: usize,
    /// Sending campaigns visited.
    pub campaigns: usize,
    pub claimed: usize,
    pub sent: usize,
    pub retried: usize,
    pub failed: usize,
    /// Campaigns that reached completed or failed.
    pub finished: usize,
}

impl PollReport {
    fn absorb(&mut self, other: PollReport) {
        self.campaigns += other.campaigns;
        self.claimed += other.claimed;
        self.sent += other.sent;
        self.retried += other.retried;
        self.failed += other.failed;
        self.finished += other.finished;
    }
}

/// Drains campaign queues into a send provider.
pub struct Dispatcher {
    queue: MessageQueue,
    control: CampaignControl,
    provider: Arc<dyn SendProvider>,
    limiters: RateLimiters,
    settings: DispatchSettings,
    unsubscribe: Option<Arc<UnsubscribeSigner>>,
}

impl Dispatcher {
    pub fn new(
        queue: MessageQueue,
        control: CampaignControl,
        provider: Arc<dyn SendProvider>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            queue,
            control,
            provider,
            limiters: RateLimiters::new(),
            settings,
            unsubscribe: None,
        }
    }

    /// Sign a fresh `{{unsubscribe_link}}` into every message.
    pub fn with_unsubscribe(mut self, signer: Arc<UnsubscribeSigner>) -> Self {
        self.unsubscribe = Some(signer);
        self
    }

    /// Run one dispatch pass over every sending campaign.
    pub async fn poll_once(&self) -> Result<PollReport, ProspectError> {
        let mut report = PollReport {
            reclaimed: self.queue.reap_expired_claims(self.settings.claim_lease).await?,
            ..PollReport::default()
        };

        let sending =
            campaigns::list_campaigns(self.queue.database(), Some(CampaignStatus::Sending)).await?;
        self.limiters.retain(|id| sending.iter().any(|c| c.id == id));

        let passes: Vec<(String, Result<(PollReport, u64), ProspectError>)> =
            stream::iter(sending)
                .map(|campaign| async move {
                    let id = campaign.id.clone();
                    (id, self.drain_campaign(campaign).await)
                })
                .buffer_unordered(self.settings.max_concurrent_campaigns)
                .collect()
                .await;

        let mut pending = 0u64;
        for (campaign_id, pass) in passes {
            match pass {
                Ok((pass, campaign_pending)) => {
                    report.absorb(pass);
                    pending += campaign_pending;
                }
                Err(e) => error!(%campaign_id, error = %e, "campaign dispatch pass failed"),
            }
        }
        prospect_prometheus::set_queue_pending(pending as f64);

        if report.claimed > 0 || report.finished > 0 {
            debug!(
                campaigns = report.campaigns,
                claimed = report.claimed,
                sent = report.sent,
                retried = report.retried,
                failed = report.failed,
                finished = report.finished,
                "dispatch poll complete"
            );
        }
        Ok(report)
    }

    /// Poll on an interval until `cancel` fires.
    ///
    /// A poll that is already running completes (its sends are bounded by the
    /// send timeout) before the loop exits.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), ProspectError> {
        info!(
            interval_ms = self.settings.poll_interval.as_millis() as u64,
            batch_size = self.settings.batch_size,
            "dispatcher started"
        );
        let mut interval = tokio::time::interval(self.settings.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("dispatcher stopping");
                    return Ok(());
                }
                _ = interval.tick() => {
                    if let Err(e) = self.poll_once().await {
                        warn!(error = %e, "dispatch poll failed");
                    }
                }
            }
        }
    }

    /// Claim and send one rate-limited batch for a campaign.
    ///
    /// Returns the pass totals and the campaign's remaining pending count.
    async fn drain_campaign(&self, campaign: Campaign) -> Result<(PollReport, u64), ProspectError> {
        let mut report = PollReport {
            campaigns: 1,
            ..PollReport::default()
        };
        let rate = campaign
            .rate_limit_per_sec
            .unwrap_or(self.settings.default_rate_per_sec);

        let tokens = self
            .limiters
            .take(&campaign.id, rate, self.settings.batch_size);
        let batch = if tokens > 0 {
            self.queue.dequeue_batch(&campaign.id, tokens).await?
        } else {
            Vec::new()
        };
        self.limiters
            .give_back(&campaign.id, tokens.saturating_sub(batch.len() as u32));
        report.claimed = batch.len();

        let states: Vec<Option<EntryState>> = stream::iter(batch)
            .map(|entry| self.process(&campaign, entry))
            .buffer_unordered(self.settings.max_in_flight_per_campaign)
            .collect()
            .await;
        for state in states.into_iter().flatten() {
            match state {
                EntryState::Sent => report.sent += 1,
                EntryState::Pending => report.retried += 1,
                EntryState::Failed => report.failed += 1,
                EntryState::InFlight | EntryState::Skipped => {}
            }
        }

        let counts = self.queue.depth(&campaign.id).await?;
        if counts.outstanding() == 0
            && self
                .control
                .finalize_if_drained(&campaign.id)
                .await?
                .is_some()
        {
            report.finished += 1;
        }
        Ok((report, counts.pending))
    }

    /// Send one claimed entry and record its outcome.
    ///
    /// Returns the entry's new state, or `None` if the entry was not sent or
    /// its outcome could not be recorded (for example because the lease
    /// expired and the entry was reclaimed meanwhile).
    async fn process(&self, campaign: &Campaign, entry: QueueEntry) -> Option<EntryState> {
        let entry_id = entry.id;
        // A batch is sent a few entries at a time, so later entries may wait
        // in the buffer for a while. Restart the lease before sending and give
        // up the entry if it was reclaimed meanwhile.
        match self.queue.renew_claim(&entry).await {
            Ok(true) => {}
            Ok(false) => {
                warn!(entry_id, "claim lost before send, entry left to its new holder");
                return None;
            }
            Err(e) => {
                error!(entry_id, error = %e, "failed to renew claim");
                return None;
            }
        }
        let outcome = match self.attempt(campaign, &entry).await {
            Ok(outcome) => outcome,
            Err(e) => SendOutcome::from_error(&e),
        };
        let label = match &outcome {
            SendOutcome::Sent { .. } => "sent",
            SendOutcome::Transient { .. } => "transient",
            SendOutcome::Permanent { .. } => "permanent",
        };
        prospect_prometheus::record_send(&campaign.channel.to_string(), label);

        match self.queue.mark_result(entry_id, outcome).await {
            Ok(updated) => Some(updated.state),
            Err(ProspectError::StateConflict(reason)) => {
                warn!(entry_id, %reason, "send outcome discarded, entry changed meanwhile");
                None
            }
            Err(e) => {
                error!(entry_id, error = %e, "failed to record send outcome");
                None
            }
        }
    }

    async fn attempt(
        &self,
        campaign: &Campaign,
        entry: &QueueEntry,
    ) -> Result<SendOutcome, ProspectError> {
        let Some(contact) = contacts::get_contact(self.queue.database(), &entry.contact_id).await?
        else {
            return Ok(SendOutcome::Permanent {
                reason: "contact no longer exists".to_string(),
            });
        };
        if contact.opt_out {
            debug!(entry_id = entry.id, contact_id = %contact.id, "skipping opted-out target");
            return Ok(SendOutcome::Permanent {
                reason: "opted-out target".to_string(),
            });
        }
        let Some(recipient) = contact.address_for(campaign.channel) else {
            return Ok(SendOutcome::Permanent {
                reason: "invalid address".to_string(),
            });
        };

        let mut ctx = TemplateContext::new(&contact, campaign);
        if let Some(signer) = &self.unsubscribe {
            ctx = ctx.with_unsubscribe_link(signer.link(&contact.id, campaign.channel, Utc::now())?);
        }
        let message = build_message(campaign, entry, &ctx, recipient);
        let started = Instant::now();
        let result =
            tokio::time::timeout(self.settings.send_timeout, self.provider.send(&contact, &message))
                .await;
        prospect_prometheus::record_send_latency(started.elapsed().as_secs_f64());

        let outcome = match result {
            Err(_) => SendOutcome::from_error(&ProspectError::Timeout {
                duration: self.settings.send_timeout,
            }),
            Ok(Err(e)) => SendOutcome::from_error(&e),
            Ok(Ok(receipt)) => SendOutcome::Sent {
                provider_response: receipt.provider_response.or(receipt.provider_message_id),
            },
        };
        debug!(
            entry_id = entry.id,
            campaign_id = %campaign.id,
            recipient = %masked(campaign.channel, recipient),
            outcome = ?outcome,
            "send attempted"
        );
        Ok(outcome)
    }
}

fn build_message(
    campaign: &Campaign,
    entry: &QueueEntry,
    ctx: &TemplateContext<'_>,
    recipient: &str,
) -> OutboundMessage {
    OutboundMessage {
        entry_id: entry.id,
        campaign_id: campaign.id.clone(),
        channel: campaign.channel,
        recipient: recipient.to_string(),
        subject: match campaign.channel {
            Channel::Email => campaign
                .subject_template
                .as_deref()
                .map(|t| render(t, ctx)),
            Channel::Sms | Channel::Whatsapp => None,
        },
        body: render(&campaign.body_template, ctx),
    }
}

fn masked(channel: Channel, recipient: &str) -> String {
    match channel {
        Channel::Email => mask_email(recipient),
        Channel::Sms | Channel::Whatsapp => mask_phone(recipient),
    }
}
