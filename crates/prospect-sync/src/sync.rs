// SPDX-FileCopyrightText: 2026 Prospect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delta sync of the contact store against the provider directory.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use prospect_core::traits::audit::AuditSink;
use prospect_core::traits::directory::ProviderDirectory;
use prospect_core::types::{AdminContext, Contact, ContactSource, DirectoryRecord, NewContact, SyncFilter};
use prospect_core::unsubscribe::UnsubscribeSigner;
use prospect_core::ProspectError;
use prospect_storage::queries::contacts;
use prospect_storage::{ContactChanges, ContactKeys, Database};

use crate::normalize::Identity;

/// What a sync run did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub department: Option<String>,
    /// Records returned by the directory.
    pub fetched: usize,
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// Records matching an opted-out contact; left untouched.
    pub opted_out: usize,
    /// Records with neither a usable email nor phone.
    pub invalid: usize,
    /// Records sharing a fingerprint with an earlier record of the same run.
    pub duplicates: usize,
}

/// Reconciles contacts with the directory and applies opt-outs.
#[derive(Clone)]
pub struct ContactSync {
    pub(crate) db: Database,
    directory: Option<Arc<dyn ProviderDirectory>>,
    pub(crate) audit: Arc<dyn AuditSink>,
    pub(crate) default_cc: String,
    unsubscribe: Option<Arc<UnsubscribeSigner>>,
}

/// Audit actor recorded for opt-outs made through a signed link.
pub const UNSUBSCRIBE_ACTOR: &str = "unsubscribe-link";

impl ContactSync {
    pub fn new(
        db: Database,
        directory: Arc<dyn ProviderDirectory>,
        audit: Arc<dyn AuditSink>,
        default_cc: impl Into<String>,
    ) -> Self {
        Self {
            db,
            directory: Some(directory),
            audit,
            default_cc: default_cc.into(),
            unsubscribe: None,
        }
    }

    /// A service that can import and opt out but has no directory to sync from.
    pub fn without_directory(
        db: Database,
        audit: Arc<dyn AuditSink>,
        default_cc: impl Into<String>,
    ) -> Self {
        Self {
            db,
            directory: None,
            audit,
            default_cc: default_cc.into(),
            unsubscribe: None,
        }
    }

    /// Accept signed unsubscribe tokens.
    pub fn with_unsubscribe(mut self, signer: Arc<UnsubscribeSigner>) -> Self {
        self.unsubscribe = Some(signer);
        self
    }

    /// Pull the directory (one department or all) and apply the delta.
    ///
    /// A record matches a stored contact on any shared key: fingerprint,
    /// email, phone or directory id. Unmatched records are inserted. A record
    /// matching an opted-out contact is skipped, and opted-out rows are never
    /// touched. Other matches are updated only when a directory field
    /// differs; fields the directory leaves blank keep their stored value and
    /// the stored fingerprint never changes. A second run over unchanged
    /// input writes nothing.
    pub async fn sync(
        &self,
        admin: &AdminContext,
        filter: SyncFilter,
    ) -> Result<SyncReport, ProspectError> {
        let directory = self.directory.as_ref().ok_or_else(|| {
            ProspectError::Config(
                "no provider directory configured (set sync.directory_csv)".to_string(),
            )
        })?;
        let records = directory.fetch(&filter).await?;

        let mut report = SyncReport {
            department: filter.department.clone(),
            fetched: records.len(),
            ..Default::default()
        };

        let mut candidates = Vec::with_capacity(records.len());
        for record in &records {
            match Identity::resolve(
                record.email.as_deref(),
                record.phone.as_deref(),
                &self.default_cc,
            ) {
                Ok(identity) => candidates.push((record, identity)),
                Err(_) => report.invalid += 1,
            }
        }
        let keys = candidates
            .iter()
            .map(|(record, identity)| identity.keys(external_id(record)))
            .collect();
        let matches = contacts::find_matching(&self.db, keys).await?;

        let mut changes = ContactChanges::default();
        let mut seen = SeenKeys::default();
        let mut touched = HashSet::new();

        for ((record, identity), matched) in candidates.into_iter().zip(matches) {
            if !seen.insert(&identity.keys(external_id(record))) {
                report.duplicates += 1;
                continue;
            }
            // Any opted-out row sharing a contact point blocks the record.
            if matched.iter().any(|c| c.opt_out) {
                report.opted_out += 1;
                continue;
            }
            let primary = matched
                .iter()
                .find(|c| c.fingerprint == identity.fingerprint)
                .or_else(|| matched.first());
            let Some(contact) = primary else {
                changes.inserts.push(from_record(record, identity));
                continue;
            };
            if !touched.insert(contact.id.clone()) {
                report.duplicates += 1;
                continue;
            }
            let merged = merge(contact, record, identity);
            if differs(contact, &merged) {
                changes.updates.push((contact.id.clone(), merged));
            } else {
                report.unchanged += 1;
            }
        }

        let (inserted, updated) =
            contacts::apply_contact_changes(&self.db, changes, ContactSource::Directory).await?;
        report.inserted = inserted;
        report.updated = updated;
        prospect_prometheus::record_contacts_synced("directory", inserted, updated);

        info!(
            directory = directory.name(),
            department = report.department.as_deref().unwrap_or("all"),
            fetched = report.fetched,
            inserted,
            updated,
            unchanged = report.unchanged,
            opted_out = report.opted_out,
            invalid = report.invalid,
            "contact sync finished"
        );
        self.audit(
            admin,
            "contacts.sync",
            report.department.as_deref().unwrap_or("all"),
            serde_json::to_value(&report).unwrap_or_default(),
        )
        .await;
        Ok(report)
    }

    /// Opt a contact out of all future campaigns. The row is kept.
    pub async fn set_opt_out(
        &self,
        admin: &AdminContext,
        contact_id: &str,
    ) -> Result<Contact, ProspectError> {
        let contact = contacts::set_opt_out(&self.db, contact_id).await?;
        info!(contact_id, "contact opted out");
        self.audit(
            admin,
            "contact.opt_out",
            contact_id,
            serde_json::json!({ "opted_out_at": contact.opted_out_at }),
        )
        .await;
        Ok(contact)
    }

    /// Opt out the contact named by a signed unsubscribe token.
    ///
    /// A forged, garbled or expired token is a `Validation` error and changes
    /// nothing. Repeating a valid token keeps the first opt-out time.
    pub async fn unsubscribe(&self, token: &str) -> Result<Contact, ProspectError> {
        let signer = self.unsubscribe.as_ref().ok_or_else(|| {
            ProspectError::Config("unsubscribe links are not configured".to_string())
        })?;
        let claim = signer.verify(token, Utc::now())?;
        let contact = contacts::set_opt_out(&self.db, &claim.contact_id).await?;
        info!(contact_id = %contact.id, channel = %claim.channel, "contact unsubscribed by link");
        self.audit(
            &AdminContext::new(UNSUBSCRIBE_ACTOR),
            "contact.unsubscribe",
            &contact.id,
            serde_json::json!({
                "channel": claim.channel,
                "opted_out_at": contact.opted_out_at,
            }),
        )
        .await;
        Ok(contact)
    }

    pub(crate) async fn audit(
        &self,
        admin: &AdminContext,
        action: &str,
        entity_id: &str,
        metadata: serde_json::Value,
    ) {
        if let Err(e) = self
            .audit
            .log_admin_action(&admin.admin_id, action, "contact", entity_id, Some(metadata))
            .await
        {
            warn!(action, entity_id, error = %e, "audit log write failed");
        }
    }
}

fn external_id(record: &DirectoryRecord) -> Option<&str> {
    Some(record.external_id.as_str()).filter(|id| !id.is_empty())
}

/// Identity keys already taken by an earlier record of the same run.
#[derive(Debug, Default)]
pub(crate) struct SeenKeys(HashSet<String>);

impl SeenKeys {
    /// Records `keys`; `false` if any of them was seen before.
    pub(crate) fn insert(&mut self, keys: &ContactKeys) -> bool {
        let tagged: Vec<String> = [
            Some(format!("fp:{}", keys.fingerprint)),
            keys.email.as_ref().map(|e| format!("email:{e}")),
            keys.phone.as_ref().map(|p| format!("phone:{p}")),
            keys.external_id.as_ref().map(|x| format!("ext:{x}")),
        ]
        .into_iter()
        .flatten()
        .collect();
        if tagged.iter().any(|k| self.0.contains(k)) {
            return false;
        }
        self.0.extend(tagged);
        true
    }
}

fn from_record(record: &DirectoryRecord, identity: Identity) -> NewContact {
    NewContact {
        display_name: record.name.clone(),
        company_name: record.company_name.clone(),
        phone: identity.phone,
        email: identity.email,
        department: record.department.clone(),
        city: record.city.clone(),
        external_id: external_id(record).map(str::to_string),
        fingerprint: identity.fingerprint,
    }
}

/// Directory values over stored ones, keeping stored values the directory lacks.
fn merge(contact: &Contact, record: &DirectoryRecord, identity: Identity) -> NewContact {
    let pick = |new: &Option<String>, old: &Option<String>| new.clone().or_else(|| old.clone());
    NewContact {
        display_name: pick(&record.name, &contact.display_name),
        company_name: pick(&record.company_name, &contact.company_name),
        phone: pick(&identity.phone, &contact.phone),
        email: pick(&identity.email, &contact.email),
        department: pick(&record.department, &contact.department),
        city: pick(&record.city, &contact.city),
        external_id: external_id(record)
            .map(str::to_string)
            .or_else(|| contact.external_id.clone()),
        fingerprint: contact.fingerprint.clone(),
    }
}

fn differs(contact: &Contact, merged: &NewContact) -> bool {
    contact.display_name != merged.display_name
        || contact.company_name != merged.company_name
        || contact.phone != merged.phone
        || contact.email != merged.email
        || contact.department != merged.department
        || contact.city != merged.city
        || contact.external_id != merged.external_id
}

#[cfg(test)]
mod tests {
    use super::*;
    use prospect_test_utils::{MockDirectory, TestHarness};

    fn record(id: &str, email: Option<&str>, phone: Option<&str>, dept: &str) -> DirectoryRecord {
        DirectoryRecord {
            external_id: id.into(),
            name: Some(format!("Contact {id}")),
            company_name: Some(format!("Company {id}")),
            email: email.map(str::to_string),
            phone: phone.map(str::to_string),
            department: Some(dept.into()),
            city: None,
        }
    }

    fn service(harness: &TestHarness) -> ContactSync {
        ContactSync::new(
            harness.db.clone(),
            Arc::new(harness.directory.clone()),
            Arc::new(harness.audit.clone()),
            "33",
        )
    }

    fn admin() -> AdminContext {
        AdminContext::new("ops")
    }

    #[tokio::test]
    async fn inserts_new_records() {
        let harness = TestHarness::builder()
            .with_directory(vec![
                record("1", Some("A@x.fr"), None, "75"),
                record("2", None, Some("06 12 34 56 78"), "75"),
            ])
            .build()
            .await
            .unwrap();
        let report = service(&harness).sync(&admin(), SyncFilter::default()).await.unwrap();
        assert_eq!((report.fetched, report.inserted, report.updated), (2, 2, 0));

        let stored = contacts::find_by_fingerprint(&harness.db, "phone:+33612345678")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.source, ContactSource::Directory);
        assert_eq!(stored.external_id.as_deref(), Some("2"));
        assert!(
            contacts::find_by_fingerprint(&harness.db, "email:a@x.fr")
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn invalid_and_duplicate_records_are_counted() {
        let harness = TestHarness::builder()
            .with_directory(vec![
                record("1", Some("a@x.fr"), None, "75"),
                record("2", Some("A@X.FR"), None, "75"),
                record("3", Some("nope"), Some("12"), "75"),
            ])
            .build()
            .await
            .unwrap();
        let report = service(&harness).sync(&admin(), SyncFilter::default()).await.unwrap();
        assert_eq!(report.inserted, 1);
        assert_eq!(report.duplicates, 1);
        assert_eq!(report.invalid, 1);
    }

    #[tokio::test]
    async fn changed_fields_update_and_blanks_keep_stored_values() {
        let mut first = record("1", Some("a@x.fr"), Some("0612345678"), "75");
        first.city = Some("Paris".into());
        let harness = TestHarness::builder()
            .with_directory(vec![first.clone()])
            .build()
            .await
            .unwrap();
        let sync = service(&harness);
        sync.sync(&admin(), SyncFilter::default()).await.unwrap();

        let mut changed = first;
        changed.name = Some("Renamed".into());
        changed.city = None;
        harness.directory.set_records(vec![changed]).await;
        let report = sync.sync(&admin(), SyncFilter::default()).await.unwrap();
        assert_eq!((report.updated, report.unchanged), (1, 0));

        let stored = contacts::find_by_fingerprint(&harness.db, "email:a@x.fr")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.display_name.as_deref(), Some("Renamed"));
        assert_eq!(stored.city.as_deref(), Some("Paris"));
    }

    #[tokio::test]
    async fn opted_out_contacts_are_left_alone() {
        let harness = TestHarness::builder()
            .with_directory(vec![record("1", Some("a@x.fr"), None, "75")])
            .build()
            .await
            .unwrap();
        let sync = service(&harness);
        sync.sync(&admin(), SyncFilter::default()).await.unwrap();
        let contact = contacts::find_by_fingerprint(&harness.db, "email:a@x.fr")
            .await
            .unwrap()
            .unwrap();
        let opted = sync.set_opt_out(&admin(), &contact.id).await.unwrap();
        assert!(opted.opt_out);
        assert!(opted.opted_out_at.is_some());

        let mut renamed = record("1", Some("a@x.fr"), None, "75");
        renamed.name = Some("Someone else".into());
        harness.directory.set_records(vec![renamed]).await;
        let report = sync.sync(&admin(), SyncFilter::default()).await.unwrap();
        assert_eq!((report.opted_out, report.updated), (1, 0));

        let after = contacts::get_contact(&harness.db, &contact.id).await.unwrap().unwrap();
        assert_eq!(after, opted);
    }

    #[tokio::test]
    async fn opted_out_phone_stays_blocked_when_an_email_appears() {
        let harness = TestHarness::builder()
            .with_directory(vec![record("1", None, Some("06 12 34 56 78"), "75")])
            .build()
            .await
            .unwrap();
        let sync = service(&harness);
        sync.sync(&admin(), SyncFilter::default()).await.unwrap();
        let stored = contacts::find_by_fingerprint(&harness.db, "phone:+33612345678")
            .await
            .unwrap()
            .unwrap();
        sync.set_opt_out(&admin(), &stored.id).await.unwrap();

        // Same person, new directory id, now with an email.
        harness
            .directory
            .set_records(vec![record("1b", Some("jean@x.fr"), Some("0612345678"), "75")])
            .await;
        let report = sync.sync(&admin(), SyncFilter::default()).await.unwrap();
        assert_eq!((report.inserted, report.opted_out), (0, 1));

        let with_phone: Vec<Contact> = contacts::list_contacts(&harness.db, None)
            .await
            .unwrap()
            .into_iter()
            .filter(|c| c.phone.as_deref() == Some("+33612345678"))
            .collect();
        assert_eq!(with_phone.len(), 1);
        assert!(with_phone.iter().all(|c| c.opt_out));
    }

    #[tokio::test]
    async fn new_email_updates_the_phone_contact_in_place() {
        let harness = TestHarness::builder()
            .with_directory(vec![record("1", None, Some("0612345678"), "75")])
            .build()
            .await
            .unwrap();
        let sync = service(&harness);
        sync.sync(&admin(), SyncFilter::default()).await.unwrap();

        harness
            .directory
            .set_records(vec![record("1", Some("Jean@X.fr"), Some("0612345678"), "75")])
            .await;
        let report = sync.sync(&admin(), SyncFilter::default()).await.unwrap();
        assert_eq!((report.inserted, report.updated), (0, 1));

        let all = contacts::list_contacts(&harness.db, None).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].email.as_deref(), Some("jean@x.fr"));
        assert_eq!(all[0].fingerprint, "phone:+33612345678");

        let again = sync.sync(&admin(), SyncFilter::default()).await.unwrap();
        assert_eq!((again.updated, again.unchanged), (0, 1));
    }

    #[tokio::test]
    async fn records_sharing_a_phone_in_one_run_are_duplicates() {
        let harness = TestHarness::builder()
            .with_directory(vec![
                record("1", Some("a@x.fr"), Some("0612345678"), "75"),
                record("2", None, Some("+33 6 12 34 56 78"), "75"),
            ])
            .build()
            .await
            .unwrap();
        let report = service(&harness).sync(&admin(), SyncFilter::default()).await.unwrap();
        assert_eq!((report.inserted, report.duplicates), (1, 1));
    }

    #[tokio::test]
    async fn department_filter_reaches_the_directory() {
        let directory = MockDirectory::new(vec![
            record("1", Some("a@x.fr"), None, "75"),
            record("2", Some("b@x.fr"), None, "69"),
        ]);
        let harness = TestHarness::builder()
            .with_directory(vec![])
            .build()
            .await
            .unwrap();
        let sync = ContactSync::new(
            harness.db.clone(),
            Arc::new(directory.clone()),
            Arc::new(harness.audit.clone()),
            "33",
        );
        let report = sync
            .sync(
                &admin(),
                SyncFilter {
                    department: Some("69".into()),
                },
            )
            .await
            .unwrap();
        assert_eq!(report.inserted, 1);
        assert_eq!(report.department.as_deref(), Some("69"));
        assert_eq!(directory.fetches().await[0].department.as_deref(), Some("69"));
    }

    #[tokio::test]
    async fn one_audit_record_per_run() {
        let harness = TestHarness::builder()
            .with_directory(vec![
                record("1", Some("a@x.fr"), None, "75"),
                record("2", Some("b@x.fr"), None, "75"),
            ])
            .build()
            .await
            .unwrap();
        service(&harness).sync(&admin(), SyncFilter::default()).await.unwrap();
        assert_eq!(harness.audit.actions().await, vec!["contacts.sync".to_string()]);
    }

    #[tokio::test]
    async fn opt_out_of_unknown_contact_is_not_found() {
        let harness = TestHarness::new().await.unwrap();
        let err = service(&harness).set_opt_out(&admin(), "ghost").await.unwrap_err();
        assert!(matches!(err, ProspectError::NotFound { .. }));
        assert!(harness.audit.records().await.is_empty());
    }

    #[tokio::test]
    async fn sync_without_directory_is_a_config_error() {
        let harness = TestHarness::new().await.unwrap();
        let service = ContactSync::without_directory(
            harness.db.clone(),
            Arc::new(harness.audit.clone()),
            "33",
        );
        let err = service.sync(&admin(), SyncFilter::default()).await.unwrap_err();
        assert!(matches!(err, ProspectError::Config(_)));
    }

    fn signer() -> Arc<UnsubscribeSigner> {
        Arc::new(
            UnsubscribeSigner::new(
                "sync-test-secret-0001",
                "https://prospect.example.com",
                chrono::Duration::days(30),
            )
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn signed_token_opts_the_contact_out() {
        let harness = TestHarness::new().await.unwrap();
        let seeded = harness.seed_contacts(2).await.unwrap();
        let signer = signer();
        let service = service(&harness).with_unsubscribe(Arc::clone(&signer));

        let token = signer
            .sign(&seeded[1].id, prospect_core::Channel::Email, Utc::now())
            .unwrap();
        let contact = service.unsubscribe(&token).await.unwrap();
        assert_eq!(contact.id, seeded[1].id);
        assert!(contact.opt_out);
        let first_opt_out = contact.opted_out_at.clone();

        // Clicking twice keeps the original time.
        let again = service.unsubscribe(&token).await.unwrap();
        assert_eq!(again.opted_out_at, first_opt_out);

        let untouched = contacts::get_contact(&harness.db, &seeded[0].id)
            .await
            .unwrap()
            .unwrap();
        assert!(!untouched.opt_out);
        let records = harness.audit.records().await;
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.admin_id == UNSUBSCRIBE_ACTOR));
        assert_eq!(harness.audit.actions().await[0], "contact.unsubscribe");
    }

    #[tokio::test]
    async fn forged_token_changes_nothing() {
        let harness = TestHarness::new().await.unwrap();
        let seeded = harness.seed_contacts(1).await.unwrap();
        let forger = UnsubscribeSigner::new(
            "not-the-real-secret!",
            "https://prospect.example.com",
            chrono::Duration::days(30),
        )
        .unwrap();
        let token = forger
            .sign(&seeded[0].id, prospect_core::Channel::Sms, Utc::now())
            .unwrap();

        let err = service(&harness)
            .with_unsubscribe(signer())
            .unsubscribe(&token)
            .await
            .unwrap_err();
        assert!(matches!(err, ProspectError::Validation(_)));
        let stored = contacts::get_contact(&harness.db, &seeded[0].id)
            .await
            .unwrap()
            .unwrap();
        assert!(!stored.opt_out);
        assert!(harness.audit.records().await.is_empty());

        let err = service(&harness).unsubscribe(&token).await.unwrap_err();
        assert!(matches!(err, ProspectError::Config(_)));
    }
}
