// SPDX-FileCopyrightText: 2026 Prospect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Admin audit log.

use prospect_core::ProspectError;
use prospect_core::time::now_timestamp;
use rusqlite::params;

use crate::database::{Database, map_tr_err};
use crate::models::AuditLogEntry;

/// Append an audit row. Returns its ID.
pub async fn insert_audit(
    db: &Database,
    admin_id: &str,
    action: &str,
    entity_type: &str,
    entity_id: &str,
    metadata: Option<&serde_json::Value>,
) -> Result<i64, ProspectError> {
    let admin_id = admin_id.to_string();
    let action = action.to_string();
    let entity_type = entity_type.to_string();
    let entity_id = entity_id.to_string();
    let metadata = metadata.map(|m| m.to_string());
    db.connection()
        .call(move |conn| -> Result<i64, rusqlite::Error> {
            conn.execute(
                "INSERT INTO audit_log (admin_id, action, entity_type, entity_id, metadata, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![admin_id, action, entity_type, entity_id, metadata, now_timestamp()],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_tr_err)
}

/// Most recent audit rows, newest first.
pub async fn recent_audit(db: &Database, limit: u32) -> Result<Vec<AuditLogEntry>, ProspectError> {
    db.connection()
        .call(move |conn| -> Result<Vec<AuditLogEntry>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT id, admin_id, action, entity_type, entity_id, metadata, created_at
                 FROM audit_log ORDER BY id DESC LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![limit], |row| {
                Ok(AuditLogEntry {
                    id: row.get(0)?,
                    admin_id: row.get(1)?,
                    action: row.get(2)?,
                    entity_type: row.get(3)?,
                    entity_id: row.get(4)?,
                    metadata: row.get(5)?,
                    created_at: row.get(6)?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support::setup_db;

    #[tokio::test]
    async fn audit_rows_come_back_newest_first() {
        let (db, _dir) = setup_db().await;
        insert_audit(&db, "admin-1", "campaign.pause", "campaign", "c1", None)
            .await
            .unwrap();
        let meta = serde_json::json!({"department": "75"});
        insert_audit(&db, "admin-2", "contacts.sync", "contacts", "all", Some(&meta))
            .await
            .unwrap();

        let rows = recent_audit(&db, 10).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].action, "contacts.sync");
        assert_eq!(rows[0].metadata.as_deref(), Some(r#"{"department":"75"}"#));
        assert_eq!(rows[1].admin_id, "admin-1");
        db.close().await.unwrap();
    }
}
