// SPDX-FileCopyrightText: 2026 Prospect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Campaign send queue.
//!
//! Entry lifecycle: `pending -> in_flight -> {sent | pending (retry) | failed}`,
//! plus `pending -> skipped` on cancellation. `sent`, `failed` and `skipped`
//! are absorbing. Claiming is a single conditional `UPDATE ... RETURNING`, so
//! no two callers can ever receive the same entry.

use prospect_core::ProspectError;
use prospect_core::time::now_timestamp;
use rusqlite::{Row, Transaction, params};
use serde_json::json;

use crate::database::{Database, map_tr_err};
use crate::models::{
    EnqueueReport, EntryCounts, EntryResolution, EntryState, EventOutcome, NewOutboxEvent,
    QueueEntry,
};
use crate::queries::outbox::{self, TOPIC_DELIVERY};
use crate::queries::{campaigns, optional, parse_column};

const ENTRY_COLUMNS: &str = "id, campaign_id, contact_id, state, attempt_count, scheduled_at, \
     claimed_at, last_error, created_at, updated_at";

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<QueueEntry> {
    Ok(QueueEntry {
        id: row.get(0)?,
        campaign_id: row.get(1)?,
        contact_id: row.get(2)?,
        state: parse_column(row, 3)?,
        attempt_count: row.get(4)?,
        scheduled_at: row.get(5)?,
        claimed_at: row.get(6)?,
        last_error: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

fn get_tx(tx: &Transaction<'_>, id: i64) -> rusqlite::Result<Option<QueueEntry>> {
    optional(tx.query_row(
        &format!("SELECT {ENTRY_COLUMNS} FROM queue_entries WHERE id = ?1"),
        params![id],
        entry_from_row,
    ))
}

/// Queue `contact_ids` for a campaign.
///
/// Opted-out contacts never get an entry, and a contact already queued for
/// the campaign is left alone. Unknown campaign is `NotFound`; a campaign in a
/// terminal status is `StateConflict`.
pub async fn enqueue(
    db: &Database,
    campaign_id: &str,
    contact_ids: &[String],
) -> Result<EnqueueReport, ProspectError> {
    let campaign_id = campaign_id.to_string();
    let contact_ids = contact_ids.to_vec();
    let result = db
        .connection()
        .call(
            move |conn| -> Result<Result<EnqueueReport, ProspectError>, rusqlite::Error> {
                let tx = conn.transaction()?;
                let Some(campaign) = campaigns::get_tx(&tx, &campaign_id)? else {
                    return Ok(Err(ProspectError::not_found("campaign", campaign_id)));
                };
                if campaign.status.is_terminal() {
                    return Ok(Err(ProspectError::StateConflict(format!(
                        "campaign {} is {} and accepts no new entries",
                        campaign.id, campaign.status
                    ))));
                }

                let now = now_timestamp();
                let mut report = EnqueueReport::default();
                {
                    let mut lookup = tx.prepare("SELECT opt_out FROM contacts WHERE id = ?1")?;
                    let mut insert = tx.prepare(
                        "INSERT OR IGNORE INTO queue_entries
                            (campaign_id, contact_id, scheduled_at, created_at, updated_at)
                         VALUES (?1, ?2, ?3, ?3, ?3)",
                    )?;
                    for contact_id in &contact_ids {
                        let opt_out: Option<bool> =
                            optional(lookup.query_row(params![contact_id], |row| row.get(0)))?;
                        match opt_out {
                            None => report.missing += 1,
                            Some(true) => report.opted_out += 1,
                            Some(false) => {
                                if insert.execute(params![campaign_id, contact_id, now])? == 1 {
                                    report.enqueued += 1;
                                } else {
                                    report.already_queued += 1;
                                }
                            }
                        }
                    }
                }
                tx.commit()?;
                Ok(Ok(report))
            },
        )
        .await
        .map_err(map_tr_err)?;
    result
}

/// Claim up to `max_n` due `pending` entries of a `sending` campaign.
///
/// Claimed entries move to `in_flight` with `claimed_at = now`. If the
/// campaign is not `sending` (paused, cancelled, ...) nothing is claimed.
pub async fn claim_batch(
    db: &Database,
    campaign_id: &str,
    max_n: u32,
) -> Result<Vec<QueueEntry>, ProspectError> {
    if max_n == 0 {
        return Ok(Vec::new());
    }
    let campaign_id = campaign_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Vec<QueueEntry>, rusqlite::Error> {
            let now = now_timestamp();
            let mut stmt = conn.prepare(&format!(
                "UPDATE queue_entries
                 SET state = 'in_flight', claimed_at = ?1, updated_at = ?1
                 WHERE state = 'pending' AND id IN (
                     SELECT q.id FROM queue_entries q
                     JOIN campaigns c ON c.id = q.campaign_id
                     WHERE q.campaign_id = ?2
                       AND c.status = 'sending'
                       AND q.state = 'pending'
                       AND q.scheduled_at <= ?1
                     ORDER BY q.scheduled_at ASC, q.id ASC
                     LIMIT ?3
                 )
                 RETURNING {ENTRY_COLUMNS}"
            ))?;
            let mut entries = stmt
                .query_map(params![now, campaign_id, max_n], entry_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            entries.sort_by(|a, b| (&a.scheduled_at, a.id).cmp(&(&b.scheduled_at, b.id)));
            Ok(entries)
        })
        .await
        .map_err(map_tr_err)
}

/// Restart the lease of an entry still held by this claim.
///
/// The claim is identified by `(in_flight, expected_attempts)`: once an entry
/// is reclaimed its attempt count moves on, so a stale holder gets `false`
/// and must not send.
pub async fn renew_claim(
    db: &Database,
    entry_id: i64,
    expected_attempts: u32,
) -> Result<bool, ProspectError> {
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let now = now_timestamp();
            let changed = conn.execute(
                "UPDATE queue_entries SET claimed_at = ?1, updated_at = ?1
                 WHERE id = ?2 AND state = 'in_flight' AND attempt_count = ?3",
                params![now, entry_id, expected_attempts],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Get a queue entry by ID.
pub async fn get_entry(db: &Database, id: i64) -> Result<Option<QueueEntry>, ProspectError> {
    db.connection()
        .call(move |conn| -> Result<Option<QueueEntry>, rusqlite::Error> {
            optional(conn.query_row(
                &format!("SELECT {ENTRY_COLUMNS} FROM queue_entries WHERE id = ?1"),
                params![id],
                entry_from_row,
            ))
        })
        .await
        .map_err(map_tr_err)
}

/// List a campaign's entries, optionally by state, in id order.
pub async fn list_entries(
    db: &Database,
    campaign_id: &str,
    state: Option<EntryState>,
    limit: u32,
) -> Result<Vec<QueueEntry>, ProspectError> {
    let campaign_id = campaign_id.to_string();
    let state = state.map(|s| s.to_string());
    db.connection()
        .call(move |conn| -> Result<Vec<QueueEntry>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ENTRY_COLUMNS} FROM queue_entries
                 WHERE campaign_id = ?1 AND (?2 IS NULL OR state = ?2)
                 ORDER BY id ASC LIMIT ?3"
            ))?;
            let rows = stmt.query_map(params![campaign_id, state, limit], entry_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Apply the outcome of a send attempt to an in-flight entry.
///
/// Compare-and-swap on `(state = 'in_flight', attempt_count)`: if another
/// writer resolved the entry first the call fails with `StateConflict` and has
/// no effect. The delivery event, the outbox event and (on `sent`) the
/// contact's `last_contacted_at` commit together with the state change.
pub async fn resolve_entry(
    db: &Database,
    resolution: EntryResolution,
) -> Result<QueueEntry, ProspectError> {
    let result = db
        .connection()
        .call(
            move |conn| -> Result<Result<QueueEntry, ProspectError>, rusqlite::Error> {
                let tx = conn.transaction()?;
                let Some(current) = get_tx(&tx, resolution.entry_id)? else {
                    return Ok(Err(ProspectError::not_found(
                        "queue entry",
                        resolution.entry_id.to_string(),
                    )));
                };
                let now = now_timestamp();
                let changed = tx.execute(
                    "UPDATE queue_entries
                     SET state = ?1, attempt_count = ?2, scheduled_at = ?3, last_error = ?4,
                         claimed_at = NULL, updated_at = ?5
                     WHERE id = ?6 AND state = 'in_flight' AND attempt_count = ?7",
                    params![
                        resolution.state.to_string(),
                        resolution.attempt_count,
                        resolution.scheduled_at,
                        resolution.last_error,
                        now,
                        resolution.entry_id,
                        resolution.expected_attempts,
                    ],
                )?;
                if changed == 0 {
                    return Ok(Err(ProspectError::StateConflict(format!(
                        "queue entry {} is {} with {} attempts, expected in_flight with {}",
                        current.id,
                        current.state,
                        current.attempt_count,
                        resolution.expected_attempts
                    ))));
                }

                insert_event_tx(
                    &tx,
                    resolution.entry_id,
                    resolution.outcome,
                    resolution.provider_response.as_deref(),
                    &now,
                )?;
                if resolution.outcome == EventOutcome::Sent {
                    tx.execute(
                        "UPDATE contacts SET last_contacted_at = ?1 WHERE id = ?2",
                        params![now, current.contact_id],
                    )?;
                }
                outbox::insert_tx(
                    &tx,
                    &NewOutboxEvent::new(
                        TOPIC_DELIVERY,
                        current.campaign_id.clone(),
                        &json!({
                            "entry_id": current.id,
                            "campaign_id": current.campaign_id,
                            "contact_id": current.contact_id,
                            "outcome": resolution.outcome,
                            "state": resolution.state,
                            "attempt_count": resolution.attempt_count,
                        }),
                    ),
                    &now,
                )?;
                let updated = get_tx(&tx, resolution.entry_id)?
                    .ok_or(rusqlite::Error::QueryReturnedNoRows)?;
                tx.commit()?;
                Ok(Ok(updated))
            },
        )
        .await
        .map_err(map_tr_err)?;
    result
}

/// Append a delivery event for an entry, copying campaign and channel from it.
pub(crate) fn insert_event_tx(
    tx: &Transaction<'_>,
    entry_id: i64,
    outcome: EventOutcome,
    provider_response: Option<&str>,
    now: &str,
) -> rusqlite::Result<i64> {
    tx.execute(
        "INSERT INTO delivery_events
            (queue_entry_id, campaign_id, channel, outcome, provider_response, occurred_at)
         SELECT q.id, q.campaign_id, c.channel, ?2, ?3, ?4
         FROM queue_entries q JOIN campaigns c ON c.id = q.campaign_id
         WHERE q.id = ?1",
        params![entry_id, outcome.to_string(), provider_response, now],
    )?;
    Ok(tx.last_insert_rowid())
}

/// In-flight entries claimed before `claimed_before`, oldest first.
pub async fn expired_claims(
    db: &Database,
    claimed_before: &str,
    limit: u32,
) -> Result<Vec<QueueEntry>, ProspectError> {
    let claimed_before = claimed_before.to_string();
    db.connection()
        .call(move |conn| -> Result<Vec<QueueEntry>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ENTRY_COLUMNS} FROM queue_entries
                 WHERE state = 'in_flight' AND claimed_at < ?1
                 ORDER BY claimed_at ASC, id ASC LIMIT ?2"
            ))?;
            let rows = stmt.query_map(params![claimed_before, limit], entry_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

pub(crate) fn entry_counts_tx(
    tx: &Transaction<'_>,
    campaign_id: &str,
) -> rusqlite::Result<EntryCounts> {
    let mut stmt = tx.prepare(
        "SELECT state, COUNT(*) FROM queue_entries WHERE campaign_id = ?1 GROUP BY state",
    )?;
    let rows = stmt.query_map(params![campaign_id], |row| {
        Ok((parse_column::<EntryState>(row, 0)?, row.get::<_, u64>(1)?))
    })?;
    let mut counts = EntryCounts::default();
    for row in rows {
        let (state, n) = row?;
        counts.add(state, n);
    }
    Ok(counts)
}

/// Histogram of entry states for one campaign.
pub async fn entry_counts(db: &Database, campaign_id: &str) -> Result<EntryCounts, ProspectError> {
    let campaign_id = campaign_id.to_string();
    db.connection()
        .call(move |conn| -> Result<EntryCounts, rusqlite::Error> {
            let tx = conn.transaction()?;
            let counts = entry_counts_tx(&tx, &campaign_id)?;
            tx.commit()?;
            Ok(counts)
        })
        .await
        .map_err(map_tr_err)
}

/// Move every `pending` entry of a campaign to `skipped`, with a `skipped` event each.
pub(crate) fn skip_pending_tx(
    tx: &Transaction<'_>,
    campaign_id: &str,
    now: &str,
) -> rusqlite::Result<usize> {
    tx.execute(
        "INSERT INTO delivery_events
            (queue_entry_id, campaign_id, channel, outcome, provider_response, occurred_at)
         SELECT q.id, q.campaign_id, c.channel, 'skipped', NULL, ?2
         FROM queue_entries q JOIN campaigns c ON c.id = q.campaign_id
         WHERE q.campaign_id = ?1 AND q.state = 'pending'",
        params![campaign_id, now],
    )?;
    tx.execute(
        "UPDATE queue_entries SET state = 'skipped', last_error = 'campaign cancelled',
                updated_at = ?2
         WHERE campaign_id = ?1 AND state = 'pending'",
        params![campaign_id, now],
    )
}
