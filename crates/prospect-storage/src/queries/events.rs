// SPDX-FileCopyrightText: 2026 Prospect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delivery event log reads and engagement callbacks.
//!
//! Events are append-only (enforced by triggers). Send-attempt events are
//! written by the queue; this module appends provider callbacks and reads
//! aggregates for analytics.

use prospect_core::ProspectError;
use prospect_core::time::now_timestamp;
use rusqlite::{Row, params};
use serde_json::json;

use crate::database::{Database, map_tr_err};
use crate::models::{ChannelOutcomeCount, DeliveryEvent, EventOutcome, NewOutboxEvent, OutcomeCount};
use crate::queries::outbox::{self, TOPIC_ENGAGEMENT};
use crate::queries::{optional, parse_column, queue};

fn event_from_row(row: &Row<'_>) -> rusqlite::Result<DeliveryEvent> {
    Ok(DeliveryEvent {
        id: row.get(0)?,
        queue_entry_id: row.get(1)?,
        campaign_id: row.get(2)?,
        channel: parse_column(row, 3)?,
        outcome: parse_column(row, 4)?,
        provider_response: row.get(5)?,
        occurred_at: row.get(6)?,
    })
}

/// Append an engagement event (delivered, opened, replied, bounced) for an entry.
///
/// Only entries that were actually sent can receive engagement events.
pub async fn insert_engagement(
    db: &Database,
    entry_id: i64,
    outcome: EventOutcome,
    provider_response: Option<&str>,
) -> Result<DeliveryEvent, ProspectError> {
    if !outcome.is_engagement() {
        return Err(ProspectError::Validation(format!(
            "{outcome} is not an engagement outcome"
        )));
    }
    let provider_response = provider_response.map(|s| s.to_string());
    let result = db
        .connection()
        .call(
            move |conn| -> Result<Result<DeliveryEvent, ProspectError>, rusqlite::Error> {
                let tx = conn.transaction()?;
                let state: Option<(String, String)> = optional(tx.query_row(
                    "SELECT state, campaign_id FROM queue_entries WHERE id = ?1",
                    params![entry_id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                ))?;
                let Some((state, campaign_id)) = state else {
                    return Ok(Err(ProspectError::not_found(
                        "queue entry",
                        entry_id.to_string(),
                    )));
                };
                if state != "sent" {
                    return Ok(Err(ProspectError::StateConflict(format!(
                        "queue entry {entry_id} is {state}; engagement requires a sent entry"
                    ))));
                }
                let now = now_timestamp();
                let event_id = queue::insert_event_tx(
                    &tx,
                    entry_id,
                    outcome,
                    provider_response.as_deref(),
                    &now,
                )?;
                outbox::insert_tx(
                    &tx,
                    &NewOutboxEvent::new(
                        TOPIC_ENGAGEMENT,
                        campaign_id.clone(),
                        &json!({
                            "entry_id": entry_id,
                            "campaign_id": campaign_id,
                            "outcome": outcome,
                        }),
                    ),
                    &now,
                )?;
                let event = tx.query_row(
                    "SELECT id, queue_entry_id, campaign_id, channel, outcome,
                            provider_response, occurred_at
                     FROM delivery_events WHERE id = ?1",
                    params![event_id],
                    event_from_row,
                )?;
                tx.commit()?;
                Ok(Ok(event))
            },
        )
        .await
        .map_err(map_tr_err)?;
    result
}

/// All events of a campaign, in append order.
pub async fn list_events(
    db: &Database,
    campaign_id: &str,
) -> Result<Vec<DeliveryEvent>, ProspectError> {
    let campaign_id = campaign_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Vec<DeliveryEvent>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT id, queue_entry_id, campaign_id, channel, outcome,
                        provider_response, occurred_at
                 FROM delivery_events WHERE campaign_id = ?1 ORDER BY id ASC",
            )?;
            let rows = stmt.query_map(params![campaign_id], event_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Per-outcome event counts for one campaign.
pub async fn outcome_counts(
    db: &Database,
    campaign_id: &str,
) -> Result<Vec<OutcomeCount>, ProspectError> {
    let campaign_id = campaign_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Vec<OutcomeCount>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT outcome, COUNT(*), COUNT(DISTINCT queue_entry_id)
                 FROM delivery_events WHERE campaign_id = ?1
                 GROUP BY outcome ORDER BY outcome",
            )?;
            let rows = stmt.query_map(params![campaign_id], |row| {
                Ok(OutcomeCount {
                    outcome: parse_column(row, 0)?,
                    events: row.get(1)?,
                    entries: row.get(2)?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Per-channel, per-outcome event counts with `occurred_at` in `[from, to)`.
///
/// A `None` bound is open.
pub async fn channel_outcome_counts(
    db: &Database,
    from: Option<&str>,
    to: Option<&str>,
) -> Result<Vec<ChannelOutcomeCount>, ProspectError> {
    let from = from.map(|s| s.to_string());
    let to = to.map(|s| s.to_string());
    db.connection()
        .call(move |conn| -> Result<Vec<ChannelOutcomeCount>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT channel, outcome, COUNT(*), COUNT(DISTINCT queue_entry_id)
                 FROM delivery_events
                 WHERE (?1 IS NULL OR occurred_at >= ?1)
                   AND (?2 IS NULL OR occurred_at < ?2)
                 GROUP BY channel, outcome ORDER BY channel, outcome",
            )?;
            let rows = stmt.query_map(params![from, to], |row| {
                Ok(ChannelOutcomeCount {
                    channel: parse_column(row, 0)?,
                    outcome: parse_column(row, 1)?,
                    events: row.get(2)?,
                    entries: row.get(3)?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}
