// SPDX-FileCopyrightText: 2026 Prospect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Contact store operations.
//!
//! Contacts are never deleted. Opting out flips `opt_out` and stamps
//! `opted_out_at`; the row stays for dedup and audit.

use prospect_core::time::now_timestamp;
use prospect_core::{ProspectError, types::ContactSource};
use rusqlite::{Connection, Row, Transaction, params};

use crate::database::{Database, map_tr_err};
use crate::models::{Contact, ContactChanges, ContactKeys, NewContact};
use crate::queries::{optional, parse_column};

pub(crate) const CONTACT_COLUMNS: &str = "id, display_name, company_name, phone, email, \
     department, city, external_id, source, fingerprint, opt_out, opted_out_at, \
     last_contacted_at, created_at, updated_at";

pub(crate) fn contact_from_row(row: &Row<'_>) -> rusqlite::Result<Contact> {
    Ok(Contact {
        id: row.get(0)?,
        display_name: row.get(1)?,
        company_name: row.get(2)?,
        phone: row.get(3)?,
        email: row.get(4)?,
        department: row.get(5)?,
        city: row.get(6)?,
        external_id: row.get(7)?,
        source: parse_column(row, 8)?,
        fingerprint: row.get(9)?,
        opt_out: row.get(10)?,
        opted_out_at: row.get(11)?,
        last_contacted_at: row.get(12)?,
        created_at: row.get(13)?,
        updated_at: row.get(14)?,
    })
}

fn insert_tx(
    tx: &Transaction<'_>,
    contact: &NewContact,
    source: ContactSource,
    now: &str,
) -> rusqlite::Result<String> {
    let id = uuid::Uuid::new_v4().to_string();
    tx.execute(
        "INSERT INTO contacts (id, display_name, company_name, phone, email, department,
                               city, external_id, source, fingerprint, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
        params![
            id,
            contact.display_name,
            contact.company_name,
            contact.phone,
            contact.email,
            contact.department,
            contact.city,
            contact.external_id,
            source.to_string(),
            contact.fingerprint,
            now,
        ],
    )?;
    Ok(id)
}

/// Insert a new contact. Fails with `Validation` if the fingerprint is taken.
pub async fn insert_contact(
    db: &Database,
    contact: &NewContact,
    source: ContactSource,
) -> Result<Contact, ProspectError> {
    let contact = contact.clone();
    let inserted = db
        .connection()
        .call(
            move |conn| -> Result<Result<Contact, ProspectError>, rusqlite::Error> {
                let tx = conn.transaction()?;
                let taken: Option<String> = optional(tx.query_row(
                    "SELECT id FROM contacts WHERE fingerprint = ?1",
                    params![contact.fingerprint],
                    |row| row.get(0),
                ))?;
                if let Some(existing) = taken {
                    return Ok(Err(ProspectError::Validation(format!(
                        "contact with fingerprint {} already exists ({existing})",
                        contact.fingerprint
                    ))));
                }
                let now = now_timestamp();
                let id = insert_tx(&tx, &contact, source, &now)?;
                let created = tx.query_row(
                    &format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE id = ?1"),
                    params![id],
                    contact_from_row,
                )?;
                tx.commit()?;
                Ok(Ok(created))
            },
        )
        .await
        .map_err(map_tr_err)?;
    inserted
}

/// Get a contact by ID.
pub async fn get_contact(db: &Database, id: &str) -> Result<Option<Contact>, ProspectError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<Contact>, rusqlite::Error> {
            optional(conn.query_row(
                &format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE id = ?1"),
                params![id],
                contact_from_row,
            ))
        })
        .await
        .map_err(map_tr_err)
}

/// Look up a contact by dedup fingerprint.
pub async fn find_by_fingerprint(
    db: &Database,
    fingerprint: &str,
) -> Result<Option<Contact>, ProspectError> {
    let fingerprint = fingerprint.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<Contact>, rusqlite::Error> {
            optional(conn.query_row(
                &format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE fingerprint = ?1"),
                params![fingerprint],
                contact_from_row,
            ))
        })
        .await
        .map_err(map_tr_err)
}

/// Contacts sharing the fingerprint, email, phone or external id of `keys`.
fn matching(conn: &Connection, keys: &ContactKeys) -> rusqlite::Result<Vec<Contact>> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {CONTACT_COLUMNS} FROM contacts
         WHERE fingerprint = ?1
            OR (?2 IS NOT NULL AND email = ?2)
            OR (?3 IS NOT NULL AND phone = ?3)
            OR (?4 IS NOT NULL AND external_id = ?4)
         ORDER BY created_at ASC, id ASC"
    ))?;
    let rows = stmt.query_map(
        params![keys.fingerprint, keys.email, keys.phone, keys.external_id],
        contact_from_row,
    )?;
    rows.collect()
}

/// Stored contacts matching each entry of `keys`, in the same order.
///
/// A contact matches on any shared key, so a person first stored by phone
/// is still found once an email is known for them.
pub async fn find_matching(
    db: &Database,
    keys: Vec<ContactKeys>,
) -> Result<Vec<Vec<Contact>>, ProspectError> {
    if keys.is_empty() {
        return Ok(Vec::new());
    }
    db.connection()
        .call(move |conn| -> Result<Vec<Vec<Contact>>, rusqlite::Error> {
            keys.iter().map(|k| matching(conn, k)).collect()
        })
        .await
        .map_err(map_tr_err)
}

/// List contacts, optionally restricted to one department, ordered by creation.
pub async fn list_contacts(
    db: &Database,
    department: Option<&str>,
) -> Result<Vec<Contact>, ProspectError> {
    let department = department.map(|d| d.to_string());
    db.connection()
        .call(move |conn| -> Result<Vec<Contact>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CONTACT_COLUMNS} FROM contacts
                 WHERE (?1 IS NULL OR department = ?1)
                 ORDER BY created_at ASC, id ASC"
            ))?;
            let rows = stmt.query_map(params![department], contact_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Apply a batch of inserts and field updates in one transaction.
///
/// Updates never touch `opt_out`, `opted_out_at` or `last_contacted_at`.
/// Returns `(inserted, updated)`.
pub async fn apply_contact_changes(
    db: &Database,
    changes: ContactChanges,
    source: ContactSource,
) -> Result<(usize, usize), ProspectError> {
    if changes.is_empty() {
        return Ok((0, 0));
    }
    db.connection()
        .call(move |conn| -> Result<(usize, usize), rusqlite::Error> {
            let tx = conn.transaction()?;
            let now = now_timestamp();
            let mut inserted = 0;
            for contact in &changes.inserts {
                // Two records in one batch may share a contact point; first wins.
                if matching(&tx, &ContactKeys::from(contact))?.is_empty() {
                    insert_tx(&tx, contact, source, &now)?;
                    inserted += 1;
                }
            }
            let mut updated = 0;
            for (id, fields) in &changes.updates {
                updated += tx.execute(
                    "UPDATE contacts SET display_name = ?1, company_name = ?2, phone = ?3,
                            email = ?4, department = ?5, city = ?6, external_id = ?7,
                            updated_at = ?8
                     WHERE id = ?9 AND opt_out = 0",
                    params![
                        fields.display_name,
                        fields.company_name,
                        fields.phone,
                        fields.email,
                        fields.department,
                        fields.city,
                        fields.external_id,
                        now,
                        id,
                    ],
                )?;
            }
            tx.commit()?;
            Ok((inserted, updated))
        })
        .await
        .map_err(map_tr_err)
}

/// Mark a contact as opted out. Idempotent: a second call keeps the original timestamp.
pub async fn set_opt_out(db: &Database, id: &str) -> Result<Contact, ProspectError> {
    let id = id.to_string();
    let result = db
        .connection()
        .call(
            move |conn| -> Result<Result<Contact, ProspectError>, rusqlite::Error> {
                let now = now_timestamp();
                conn.execute(
                    "UPDATE contacts SET opt_out = 1, opted_out_at = ?1, updated_at = ?1
                     WHERE id = ?2 AND opt_out = 0",
                    params![now, id],
                )?;
                let contact = optional(conn.query_row(
                    &format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE id = ?1"),
                    params![id],
                    contact_from_row,
                ))?;
                Ok(contact.ok_or_else(|| ProspectError::not_found("contact", id)))
            },
        )
        .await
        .map_err(map_tr_err)?;
    result
}

/// `(total, opted_out)` contact counts.
pub async fn contact_counts(db: &Database) -> Result<(u64, u64), ProspectError> {
    db.connection()
        .call(|conn| -> Result<(u64, u64), rusqlite::Error> {
            conn.query_row(
                "SELECT COUNT(*), COALESCE(SUM(opt_out), 0) FROM contacts",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support::{new_contact, setup_db};

    #[tokio::test]
    async fn insert_and_get_contact() {
        let (db, _dir) = setup_db().await;
        let created = insert_contact(&db, &new_contact("a@artisan.fr"), ContactSource::Manual)
            .await
            .unwrap();
        assert!(!created.opt_out);
        assert_eq!(created.source, ContactSource::Manual);

        let fetched = get_contact(&db, &created.id).await.unwrap().unwrap();
        assert_eq!(fetched, created);
        assert!(get_contact(&db, "nope").await.unwrap().is_none());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn duplicate_fingerprint_is_rejected() {
        let (db, _dir) = setup_db().await;
        insert_contact(&db, &new_contact("a@artisan.fr"), ContactSource::Manual)
            .await
            .unwrap();
        let err = insert_contact(&db, &new_contact("a@artisan.fr"), ContactSource::Import)
            .await
            .unwrap_err();
        assert!(matches!(err, ProspectError::Validation(_)));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn opt_out_is_sticky_and_idempotent() {
        let (db, _dir) = setup_db().await;
        let c = insert_contact(&db, &new_contact("b@artisan.fr"), ContactSource::Manual)
            .await
            .unwrap();
        let first = set_opt_out(&db, &c.id).await.unwrap();
        assert!(first.opt_out);
        let stamped = first.opted_out_at.clone().unwrap();

        let second = set_opt_out(&db, &c.id).await.unwrap();
        assert_eq!(second.opted_out_at.as_deref(), Some(stamped.as_str()));

        let (total, opted_out) = contact_counts(&db).await.unwrap();
        assert_eq!((total, opted_out), (1, 1));

        let err = set_opt_out(&db, "missing").await.unwrap_err();
        assert!(matches!(err, ProspectError::NotFound { .. }));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn batch_changes_skip_opted_out_rows() {
        let (db, _dir) = setup_db().await;
        let kept = insert_contact(&db, &new_contact("c@artisan.fr"), ContactSource::Directory)
            .await
            .unwrap();
        let out = insert_contact(&db, &new_contact("d@artisan.fr"), ContactSource::Directory)
            .await
            .unwrap();
        set_opt_out(&db, &out.id).await.unwrap();

        let mut renamed = new_contact("c@artisan.fr");
        renamed.display_name = Some("Renamed".into());
        let mut renamed_out = new_contact("d@artisan.fr");
        renamed_out.display_name = Some("Ignored".into());

        let changes = ContactChanges {
            inserts: vec![new_contact("e@artisan.fr"), new_contact("e@artisan.fr")],
            updates: vec![(kept.id.clone(), renamed), (out.id.clone(), renamed_out)],
        };
        let (inserted, updated) = apply_contact_changes(&db, changes, ContactSource::Directory)
            .await
            .unwrap();
        assert_eq!(inserted, 1);
        assert_eq!(updated, 1);

        let out_after = get_contact(&db, &out.id).await.unwrap().unwrap();
        assert_ne!(out_after.display_name.as_deref(), Some("Ignored"));
        assert_eq!(list_contacts(&db, None).await.unwrap().len(), 3);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn contacts_match_on_any_contact_point() {
        let (db, _dir) = setup_db().await;
        let by_phone = NewContact {
            phone: Some("+33612345678".into()),
            external_id: Some("SIRET-1".into()),
            fingerprint: "phone:+33612345678".into(),
            ..Default::default()
        };
        let stored = insert_contact(&db, &by_phone, ContactSource::Directory)
            .await
            .unwrap();
        insert_contact(&db, &new_contact("other@artisan.fr"), ContactSource::Manual)
            .await
            .unwrap();

        let keys = vec![
            ContactKeys {
                fingerprint: "email:jean@artisan.fr".into(),
                email: Some("jean@artisan.fr".into()),
                phone: Some("+33612345678".into()),
                external_id: None,
            },
            ContactKeys {
                fingerprint: "email:new@artisan.fr".into(),
                email: Some("new@artisan.fr".into()),
                phone: None,
                external_id: Some("SIRET-1".into()),
            },
            ContactKeys {
                fingerprint: "email:nobody@artisan.fr".into(),
                email: Some("nobody@artisan.fr".into()),
                ..Default::default()
            },
        ];
        let matches = find_matching(&db, keys).await.unwrap();
        assert_eq!(matches[0].iter().map(|c| &c.id).collect::<Vec<_>>(), vec![&stored.id]);
        assert_eq!(matches[1].iter().map(|c| &c.id).collect::<Vec<_>>(), vec![&stored.id]);
        assert!(matches[2].is_empty());

        // A batch insert sharing the phone is dropped.
        let same_phone = NewContact {
            email: Some("jean@artisan.fr".into()),
            phone: Some("+33612345678".into()),
            fingerprint: "email:jean@artisan.fr".into(),
            ..Default::default()
        };
        let changes = ContactChanges {
            inserts: vec![same_phone],
            updates: vec![],
        };
        let (inserted, _) = apply_contact_changes(&db, changes, ContactSource::Directory)
            .await
            .unwrap();
        assert_eq!(inserted, 0);
        db.close().await.unwrap();
    }
}
