// SPDX-FileCopyrightText: 2026 Prospect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Contact list operations.

use prospect_core::ProspectError;
use prospect_core::time::now_timestamp;
use rusqlite::params;

use crate::database::{Database, map_tr_err};
use crate::models::ContactList;
use crate::queries::optional;

/// Create a named contact list.
pub async fn create_list(
    db: &Database,
    name: &str,
    description: Option<&str>,
) -> Result<ContactList, ProspectError> {
    let list = ContactList {
        id: uuid::Uuid::new_v4().to_string(),
        name: name.to_string(),
        description: description.map(|d| d.to_string()),
        created_at: now_timestamp(),
    };
    let row = list.clone();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO contact_lists (id, name, description, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![row.id, row.name, row.description, row.created_at],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;
    Ok(list)
}

/// Get a list by ID.
pub async fn get_list(db: &Database, id: &str) -> Result<Option<ContactList>, ProspectError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<ContactList>, rusqlite::Error> {
            optional(conn.query_row(
                "SELECT id, name, description, created_at FROM contact_lists WHERE id = ?1",
                params![id],
                |row| {
                    Ok(ContactList {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        description: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                },
            ))
        })
        .await
        .map_err(map_tr_err)
}

/// Add contacts to a list. Existing members and unknown contacts are skipped.
///
/// Returns the number of members added.
pub async fn add_members(
    db: &Database,
    list_id: &str,
    contact_ids: &[String],
) -> Result<usize, ProspectError> {
    let list_id = list_id.to_string();
    let contact_ids = contact_ids.to_vec();
    let added = db
        .connection()
        .call(
            move |conn| -> Result<Result<usize, ProspectError>, rusqlite::Error> {
                let tx = conn.transaction()?;
                let exists: Option<i64> = optional(tx.query_row(
                    "SELECT 1 FROM contact_lists WHERE id = ?1",
                    params![list_id],
                    |row| row.get(0),
                ))?;
                if exists.is_none() {
                    return Ok(Err(ProspectError::not_found("contact list", list_id)));
                }
                let now = now_timestamp();
                let mut added = 0;
                {
                    let mut stmt = tx.prepare(
                        "INSERT OR IGNORE INTO list_members (list_id, contact_id, added_at)
                         SELECT ?1, id, ?3 FROM contacts WHERE id = ?2",
                    )?;
                    for contact_id in &contact_ids {
                        added += stmt.execute(params![list_id, contact_id, now])?;
                    }
                }
                tx.commit()?;
                Ok(Ok(added))
            },
        )
        .await
        .map_err(map_tr_err)?;
    added
}

/// Contact IDs in a list, in insertion order.
pub async fn member_ids(db: &Database, list_id: &str) -> Result<Vec<String>, ProspectError> {
    let list_id = list_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Vec<String>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT contact_id FROM list_members WHERE list_id = ?1
                 ORDER BY added_at ASC, rowid ASC",
            )?;
            let rows = stmt.query_map(params![list_id], |row| row.get(0))?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}
