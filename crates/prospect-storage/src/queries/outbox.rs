// SPDX-FileCopyrightText: 2026 Prospect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transactional outbox.
//!
//! Rows are written inside the same transaction as the state change they
//! describe and relayed later. `processed_at` marks a row done (successfully
//! or abandoned after too many attempts); only done rows are ever pruned.

use prospect_core::ProspectError;
use prospect_core::time::now_timestamp;
use rusqlite::{Transaction, params};

use crate::database::{Database, map_tr_err};
use crate::models::{NewOutboxEvent, OutboxEvent};

/// Campaign status transitions.
pub const TOPIC_CAMPAIGN_STATUS: &str = "campaign.status_changed";
/// Send attempt outcomes (sent, retry scheduled, failed, skipped).
pub const TOPIC_DELIVERY: &str = "delivery.recorded";
/// Provider callbacks (delivered, opened, replied, bounced).
pub const TOPIC_ENGAGEMENT: &str = "delivery.engagement";

/// Append an outbox row inside an open transaction.
pub(crate) fn insert_tx(
    tx: &Transaction<'_>,
    event: &NewOutboxEvent,
    now: &str,
) -> rusqlite::Result<i64> {
    tx.execute(
        "INSERT INTO outbox (topic, aggregate_id, payload, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![event.topic, event.aggregate_id, event.payload, now],
    )?;
    Ok(tx.last_insert_rowid())
}

/// Oldest unprocessed events, in id order.
pub async fn fetch_unprocessed(
    db: &Database,
    limit: u32,
) -> Result<Vec<OutboxEvent>, ProspectError> {
    db.connection()
        .call(move |conn| -> Result<Vec<OutboxEvent>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT id, topic, aggregate_id, payload, attempts, last_error,
                        created_at, processed_at
                 FROM outbox WHERE processed_at IS NULL
                 ORDER BY id ASC LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![limit], |row| {
                Ok(OutboxEvent {
                    id: row.get(0)?,
                    topic: row.get(1)?,
                    aggregate_id: row.get(2)?,
                    payload: row.get(3)?,
                    attempts: row.get(4)?,
                    last_error: row.get(5)?,
                    created_at: row.get(6)?,
                    processed_at: row.get(7)?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Mark an event as handled.
pub async fn mark_processed(db: &Database, id: i64) -> Result<(), ProspectError> {
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "UPDATE outbox SET processed_at = ?1 WHERE id = ?2 AND processed_at IS NULL",
                params![now_timestamp(), id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Record a failed handling attempt. With `give_up`, the event is also closed.
///
/// Returns the new attempt count.
pub async fn record_failure(
    db: &Database,
    id: i64,
    error: &str,
    give_up: bool,
) -> Result<u32, ProspectError> {
    let error = error.to_string();
    db.connection()
        .call(move |conn| -> Result<u32, rusqlite::Error> {
            let now = now_timestamp();
            conn.query_row(
                "UPDATE outbox SET attempts = attempts + 1, last_error = ?1,
                        processed_at = CASE WHEN ?2 THEN ?3 ELSE processed_at END
                 WHERE id = ?4
                 RETURNING attempts",
                params![error, give_up, now, id],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Delete events processed before `cutoff` (a stored timestamp).
///
/// Returns the number of rows removed. Unprocessed rows are kept whatever
/// their age.
pub async fn prune_processed(db: &Database, cutoff: &str) -> Result<u64, ProspectError> {
    let cutoff = cutoff.to_string();
    db.connection()
        .call(move |conn| -> Result<u64, rusqlite::Error> {
            let removed = conn.execute(
                "DELETE FROM outbox WHERE processed_at IS NOT NULL AND processed_at < ?1",
                params![cutoff],
            )?;
            Ok(removed as u64)
        })
        .await
        .map_err(map_tr_err)
}

/// Number of events not yet processed.
pub async fn backlog(db: &Database) -> Result<u64, ProspectError> {
    db.connection()
        .call(|conn| -> Result<u64, rusqlite::Error> {
            conn.query_row(
                "SELECT COUNT(*) FROM outbox WHERE processed_at IS NULL",
                [],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)
}
