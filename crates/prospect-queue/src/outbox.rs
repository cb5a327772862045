// SPDX-FileCopyrightText: 2026 Prospect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Relay for the transactional outbox.
//!
//! State changes write their domain event into the `outbox` table in the same
//! transaction. The relay reads those rows in id order and hands each to an
//! [`OutboxHandler`]; a failing handler is retried on later passes and never
//! affects the state change that produced the event. Processed rows older
//! than `outbox.retention_days` are pruned once an hour.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use prospect_config::model::OutboxConfig;
use prospect_core::traits::outbox::OutboxHandler;
use prospect_core::time::format_timestamp;
use prospect_core::types::OutboxEvent;
use prospect_core::ProspectError;
use prospect_storage::queries::outbox;
use prospect_storage::Database;

/// How often the relay prunes processed events.
const PRUNE_INTERVAL: Duration = Duration::from_secs(3600);

/// Counts from one relay pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayReport {
    pub handled: usize,
    pub failed: usize,
    /// Events closed after exhausting their attempts.
    pub abandoned: usize,
}

/// Drains the outbox into a handler.
pub struct OutboxRelay {
    db: Database,
    handler: Arc<dyn OutboxHandler>,
    batch_size: u32,
    max_attempts: u32,
    poll_interval: Duration,
    /// `None` keeps processed events forever.
    retention: Option<chrono::Duration>,
}

impl OutboxRelay {
    pub fn new(db: Database, handler: Arc<dyn OutboxHandler>, config: &OutboxConfig) -> Self {
        Self {
            db,
            handler,
            batch_size: config.batch_size,
            max_attempts: config.max_attempts,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            retention: (config.retention_days > 0)
                .then(|| chrono::Duration::days(i64::from(config.retention_days))),
        }
    }

    /// Delete events processed more than the retention period before `now`.
    pub async fn prune(&self, now: DateTime<Utc>) -> Result<u64, ProspectError> {
        let Some(retention) = self.retention else {
            return Ok(0);
        };
        let cutoff = format_timestamp(now - retention);
        let removed = outbox::prune_processed(&self.db, &cutoff).await?;
        if removed > 0 {
            info!(removed, %cutoff, "pruned processed outbox events");
        }
        Ok(removed)
    }

    /// Handle one batch of unprocessed events.
    pub async fn run_once(&self) -> Result<RelayReport, ProspectError> {
        let batch = outbox::fetch_unprocessed(&self.db, self.batch_size).await?;
        let mut report = RelayReport::default();

        for event in batch {
            match self.handler.handle(&event).await {
                Ok(()) => {
                    outbox::mark_processed(&self.db, event.id).await?;
                    prospect_prometheus::record_outbox_event(&event.topic, "ok");
                    report.handled += 1;
                }
                Err(e) => {
                    let give_up = event.attempts + 1 >= self.max_attempts;
                    let attempts =
                        outbox::record_failure(&self.db, event.id, &e.to_string(), give_up)
                            .await?;
                    if give_up {
                        warn!(
                            event_id = event.id,
                            topic = %event.topic,
                            attempts,
                            error = %e,
                            "outbox event abandoned"
                        );
                        prospect_prometheus::record_outbox_event(&event.topic, "abandoned");
                        report.abandoned += 1;
                    } else {
                        debug!(event_id = event.id, attempts, error = %e, "outbox handler failed");
                        prospect_prometheus::record_outbox_event(&event.topic, "error");
                        report.failed += 1;
                    }
                }
            }
        }

        prospect_prometheus::set_outbox_backlog(outbox::backlog(&self.db).await? as f64);
        Ok(report)
    }

    /// Relay on an interval until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), ProspectError> {
        info!(interval_ms = self.poll_interval.as_millis() as u64, "outbox relay started");
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut prune_interval = tokio::time::interval(PRUNE_INTERVAL);
        prune_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("outbox relay stopping");
                    return Ok(());
                }
                _ = interval.tick() => {
                    if let Err(e) = self.run_once().await {
                        warn!(error = %e, "outbox relay pass failed");
                    }
                }
                _ = prune_interval.tick() => {
                    if let Err(e) = self.prune(Utc::now()).await {
                        warn!(error = %e, "outbox prune failed");
                    }
                }
            }
        }
    }
}

/// Handler that writes each event to the log.
///
/// The default sink for `prospect serve`; downstream consumers read the
/// structured `outbox_event` records.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingOutboxHandler;

#[async_trait]
impl OutboxHandler for LoggingOutboxHandler {
    async fn handle(&self, event: &OutboxEvent) -> Result<(), ProspectError> {
        info!(
            target: "prospect::outbox_event",
            event_id = event.id,
            topic = %event.topic,
            aggregate_id = %event.aggregate_id,
            payload = %event.payload,
            "domain event"
        );
        Ok(())
    }
}
