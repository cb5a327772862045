// SPDX-FileCopyrightText: 2026 Prospect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Campaign persistence and compare-and-swap status transitions.
//!
//! A campaign's status only changes through [`transition`] or
//! [`finalize_if_drained`]. Both match on `(id, status, version)` and bump the
//! version, so two racing transitions cannot both succeed.

use prospect_core::ProspectError;
use prospect_core::time::now_timestamp;
use rusqlite::{Row, Transaction, params};
use serde_json::json;

use crate::database::{Database, map_tr_err};
use crate::models::{
    Campaign, CampaignStatus, CampaignTransition, EntryCounts, NewCampaign, NewOutboxEvent,
    TransitionOutcome,
};
use crate::queries::outbox::{self, TOPIC_CAMPAIGN_STATUS};
use crate::queries::{optional, parse_column, queue};

const CAMPAIGN_COLUMNS: &str = "id, name, channel, list_id, subject_template, body_template, \
     status, rate_limit_per_sec, version, created_at, started_at, paused_at, completed_at";

fn campaign_from_row(row: &Row<'_>) -> rusqlite::Result<Campaign> {
    Ok(Campaign {
        id: row.get(0)?,
        name: row.get(1)?,
        channel: parse_column(row, 2)?,
        list_id: row.get(3)?,
        subject_template: row.get(4)?,
        body_template: row.get(5)?,
        status: parse_column(row, 6)?,
        rate_limit_per_sec: row.get(7)?,
        version: row.get(8)?,
        created_at: row.get(9)?,
        started_at: row.get(10)?,
        paused_at: row.get(11)?,
        completed_at: row.get(12)?,
    })
}

pub(crate) fn get_tx(tx: &Transaction<'_>, id: &str) -> rusqlite::Result<Option<Campaign>> {
    optional(tx.query_row(
        &format!("SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE id = ?1"),
        params![id],
        campaign_from_row,
    ))
}

/// Insert a campaign in `draft` status.
pub async fn insert_campaign(
    db: &Database,
    campaign: &NewCampaign,
) -> Result<Campaign, ProspectError> {
    let campaign = campaign.clone();
    let created = db
        .connection()
        .call(
            move |conn| -> Result<Result<Campaign, ProspectError>, rusqlite::Error> {
                let tx = conn.transaction()?;
                if let Some(list_id) = &campaign.list_id {
                    let exists: Option<i64> = optional(tx.query_row(
                        "SELECT 1 FROM contact_lists WHERE id = ?1",
                        params![list_id],
                        |row| row.get(0),
                    ))?;
                    if exists.is_none() {
                        return Ok(Err(ProspectError::not_found("contact list", list_id)));
                    }
                }
                let id = uuid::Uuid::new_v4().to_string();
                tx.execute(
                    "INSERT INTO campaigns (id, name, channel, list_id, subject_template,
                                            body_template, rate_limit_per_sec, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        id,
                        campaign.name,
                        campaign.channel.to_string(),
                        campaign.list_id,
                        campaign.subject_template,
                        campaign.body_template,
                        campaign.rate_limit_per_sec,
                        now_timestamp(),
                    ],
                )?;
                let created = get_tx(&tx, &id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)?;
                tx.commit()?;
                Ok(Ok(created))
            },
        )
        .await
        .map_err(map_tr_err)?;
    created
}

/// Get a campaign by ID.
pub async fn get_campaign(db: &Database, id: &str) -> Result<Option<Campaign>, ProspectError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<Campaign>, rusqlite::Error> {
            optional(conn.query_row(
                &format!("SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE id = ?1"),
                params![id],
                campaign_from_row,
            ))
        })
        .await
        .map_err(map_tr_err)
}

/// List campaigns, optionally filtered by status, oldest first.
pub async fn list_campaigns(
    db: &Database,
    status: Option<CampaignStatus>,
) -> Result<Vec<Campaign>, ProspectError> {
    let status = status.map(|s| s.to_string());
    db.connection()
        .call(move |conn| -> Result<Vec<Campaign>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CAMPAIGN_COLUMNS} FROM campaigns
                 WHERE (?1 IS NULL OR status = ?1)
                 ORDER BY created_at ASC, id ASC"
            ))?;
            let rows = stmt.query_map(params![status], campaign_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// `(total, active)` campaign counts, where active means `sending` or `paused`.
pub async fn campaign_counts(db: &Database) -> Result<(u64, u64), ProspectError> {
    db.connection()
        .call(|conn| -> Result<(u64, u64), rusqlite::Error> {
            conn.query_row(
                "SELECT COUNT(*),
                        COALESCE(SUM(CASE WHEN status IN ('sending', 'paused') THEN 1 ELSE 0 END), 0)
                 FROM campaigns",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
        })
        .await
        .map_err(map_tr_err)
}

/// CAS update of status and lifecycle timestamps. Returns rows changed (0 or 1).
fn cas_status_tx(
    tx: &Transaction<'_>,
    id: &str,
    from: CampaignStatus,
    expected_version: i64,
    to: CampaignStatus,
    now: &str,
) -> rusqlite::Result<usize> {
    tx.execute(
        "UPDATE campaigns SET
            status = ?1,
            version = version + 1,
            started_at = CASE WHEN ?1 = 'sending' AND started_at IS NULL THEN ?2 ELSE started_at END,
            paused_at = CASE WHEN ?1 = 'paused' THEN ?2 ELSE NULL END,
            completed_at = CASE WHEN ?1 IN ('completed', 'failed', 'cancelled') THEN ?2
                                ELSE completed_at END
         WHERE id = ?3 AND status = ?4 AND version = ?5",
        params![to.to_string(), now, id, from.to_string(), expected_version],
    )
}

fn status_event(
    campaign: &Campaign,
    from: CampaignStatus,
    actor: Option<&str>,
    skipped: usize,
) -> NewOutboxEvent {
    NewOutboxEvent::new(
        TOPIC_CAMPAIGN_STATUS,
        campaign.id.clone(),
        &json!({
            "campaign_id": campaign.id,
            "from": from,
            "to": campaign.status,
            "version": campaign.version,
            "actor": actor,
            "skipped": skipped,
        }),
    )
}

/// Apply a status transition with compare-and-swap on `(status, version)`.
///
/// Fails with `NotFound` if the campaign does not exist and `StateConflict` if
/// its status or version no longer match; nothing is written in either case.
/// The outbox event (and, for cancellation, the skipped entries and their
/// events) commit in the same transaction.
pub async fn transition(
    db: &Database,
    change: CampaignTransition,
) -> Result<TransitionOutcome, ProspectError> {
    let result = db
        .connection()
        .call(
            move |conn| -> Result<Result<TransitionOutcome, ProspectError>, rusqlite::Error> {
                let tx = conn.transaction()?;
                let Some(current) = get_tx(&tx, &change.campaign_id)? else {
                    return Ok(Err(ProspectError::not_found(
                        "campaign",
                        change.campaign_id.clone(),
                    )));
                };
                let now = now_timestamp();
                let changed = cas_status_tx(
                    &tx,
                    &change.campaign_id,
                    change.from,
                    change.expected_version,
                    change.to,
                    &now,
                )?;
                if changed == 0 {
                    return Ok(Err(ProspectError::StateConflict(format!(
                        "campaign {} is {} (version {}), expected {} (version {})",
                        current.id,
                        current.status,
                        current.version,
                        change.from,
                        change.expected_version
                    ))));
                }
                let skipped = if change.skip_pending {
                    queue::skip_pending_tx(&tx, &change.campaign_id, &now)?
                } else {
                    0
                };
                let campaign =
                    get_tx(&tx, &change.campaign_id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)?;
                outbox::insert_tx(
                    &tx,
                    &status_event(&campaign, change.from, change.actor.as_deref(), skipped),
                    &now,
                )?;
                tx.commit()?;
                Ok(Ok(TransitionOutcome { campaign, skipped }))
            },
        )
        .await
        .map_err(map_tr_err)?;
    result
}

/// Complete a `sending` campaign once it has no pending or in-flight entries.
///
/// The campaign becomes `failed` when no entry was sent and at least one
/// failed, `completed` otherwise. Returns `None` when nothing changed.
pub async fn finalize_if_drained(
    db: &Database,
    id: &str,
) -> Result<Option<TransitionOutcome>, ProspectError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<TransitionOutcome>, rusqlite::Error> {
            let tx = conn.transaction()?;
            let Some(current) = get_tx(&tx, &id)? else {
                return Ok(None);
            };
            if current.status != CampaignStatus::Sending {
                return Ok(None);
            }
            let counts: EntryCounts = queue::entry_counts_tx(&tx, &id)?;
            if counts.outstanding() > 0 {
                return Ok(None);
            }
            let target = if counts.sent == 0 && counts.failed > 0 {
                CampaignStatus::Failed
            } else {
                CampaignStatus::Completed
            };
            let now = now_timestamp();
            if cas_status_tx(&tx, &id, current.status, current.version, target, &now)? == 0 {
                return Ok(None);
            }
            let campaign = get_tx(&tx, &id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)?;
            outbox::insert_tx(&tx, &status_event(&campaign, current.status, None, 0), &now)?;
            tx.commit()?;
            Ok(Some(TransitionOutcome {
                campaign,
                skipped: 0,
            }))
        })
        .await
        .map_err(map_tr_err)
}
