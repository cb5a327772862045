// SPDX-FileCopyrightText: 2026 Prospect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! CSV contact import with column mapping, validation and dedup.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use prospect_core::types::{AdminContext, ContactSource, NewContact};
use prospect_core::ProspectError;
use prospect_storage::{ContactChanges, ContactKeys};
use prospect_storage::queries::contacts;

use crate::directory::sniff_delimiter;
use crate::normalize::{Identity, canonical_email, canonical_phone};
use crate::sync::{ContactSync, SeenKeys};

/// A contact attribute a CSV column can feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactField {
    DisplayName,
    CompanyName,
    Email,
    Phone,
    Department,
    City,
    ExternalId,
}

/// CSV header to contact field. Unmapped headers are ignored.
pub type ColumnMapping = BTreeMap<String, ContactField>;

/// Header fragments per field, tried in this order. A header feeds one field.
const FIELD_PATTERNS: &[(ContactField, &[&str])] = &[
    (ContactField::Email, &["email", "mail", "courriel"]),
    (ContactField::Phone, &["telephone", "phone", "tel", "portable", "mobile"]),
    (
        ContactField::CompanyName,
        &["entreprise", "company", "societe", "raison", "denomination", "enseigne"],
    ),
    (ContactField::DisplayName, &["nom", "name", "contact", "prenom"]),
    (ContactField::Department, &["departement", "department", "dept"]),
    (ContactField::City, &["ville", "city", "commune", "localite"]),
    (ContactField::ExternalId, &["siret", "siren", "external_id"]),
];

/// Lowercase and strip the accents found in French headers.
fn fold(header: &str) -> String {
    header
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'à' | 'â' | 'ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'î' | 'ï' => 'i',
            'ô' | 'ö' => 'o',
            'ù' | 'û' | 'ü' => 'u',
            'ç' => 'c',
            other => other,
        })
        .collect()
}

/// Guess a mapping from header names.
pub fn suggest_mapping<S: AsRef<str>>(headers: &[S]) -> ColumnMapping {
    let folded: Vec<String> = headers.iter().map(|h| fold(h.as_ref())).collect();
    let mut mapping = ColumnMapping::new();
    for (field, patterns) in FIELD_PATTERNS {
        let hit = folded.iter().enumerate().find(|(i, header)| {
            let header_name = headers[*i].as_ref();
            !mapping.contains_key(header_name) && patterns.iter().any(|p| header.contains(p))
        });
        if let Some((i, _)) = hit {
            mapping.insert(headers[i].as_ref().to_string(), *field);
        }
    }
    mapping
}

/// Header names of a CSV export, in file order.
pub fn csv_headers(content: &str) -> Result<Vec<String>, ProspectError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(sniff_delimiter(content))
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());
    let headers = reader
        .headers()
        .map_err(|e| ProspectError::Validation(format!("unreadable CSV header: {e}")))?;
    Ok(headers.iter().map(str::to_string).collect())
}

/// A rejected value or row. `row` is the 1-based file line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRowError {
    pub row: usize,
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    /// Data rows read, header excluded.
    pub rows: usize,
    pub inserted: usize,
    /// Rows sharing an email, phone or external id with an earlier row.
    pub duplicates_in_file: usize,
    /// Rows matching a stored contact, including opted-out ones.
    pub duplicates_existing: usize,
    pub errors: Vec<ImportRowError>,
}

impl ContactSync {
    /// Import contacts from CSV text using `mapping`.
    ///
    /// A row needs a valid email or phone. An invalid email or phone is
    /// reported but does not drop the row when the other one is usable.
    /// Existing contacts are never modified.
    pub async fn import_csv(
        &self,
        admin: &AdminContext,
        content: &str,
        mapping: &ColumnMapping,
    ) -> Result<ImportReport, ProspectError> {
        if !mapping
            .values()
            .any(|f| matches!(f, ContactField::Email | ContactField::Phone))
        {
            return Err(ProspectError::Validation(
                "column mapping needs an email or phone column".to_string(),
            ));
        }

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(sniff_delimiter(content))
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());
        let headers = reader
            .headers()
            .map_err(|e| ProspectError::Validation(format!("unreadable CSV header: {e}")))?
            .clone();
        let columns: Vec<(usize, ContactField)> = headers
            .iter()
            .enumerate()
            .filter_map(|(i, h)| mapping.get(h).map(|f| (i, *f)))
            .collect();

        let mut report = ImportReport::default();
        let mut seen = SeenKeys::default();
        let mut rows = Vec::new();

        for (index, result) in reader.records().enumerate() {
            let row = index + 2;
            report.rows += 1;
            let record = match result {
                Ok(record) => record,
                Err(e) => {
                    report.errors.push(row_error(row, "row", e.to_string()));
                    continue;
                }
            };

            let mut fields: BTreeMap<ContactField, String> = BTreeMap::new();
            for (i, field) in &columns {
                if let Some(value) = record.get(*i).filter(|v| !v.is_empty()) {
                    fields.insert(*field, value.to_string());
                }
            }
            let get = |f: ContactField| fields.get(&f).cloned();

            let email = get(ContactField::Email);
            if let Some(raw) = &email
                && canonical_email(raw).is_none()
            {
                report
                    .errors
                    .push(row_error(row, "email", format!("invalid email: {raw}")));
            }
            let phone = get(ContactField::Phone);
            if let Some(raw) = &phone
                && canonical_phone(raw, &self.default_cc).is_none()
            {
                report
                    .errors
                    .push(row_error(row, "phone", format!("invalid phone: {raw}")));
            }

            let Ok(identity) =
                Identity::resolve(email.as_deref(), phone.as_deref(), &self.default_cc)
            else {
                report.errors.push(row_error(
                    row,
                    "email/phone",
                    "neither a valid email nor a valid phone".to_string(),
                ));
                continue;
            };
            let external_id = get(ContactField::ExternalId);
            if !seen.insert(&identity.keys(external_id.as_deref())) {
                report.duplicates_in_file += 1;
                continue;
            }

            rows.push(NewContact {
                display_name: get(ContactField::DisplayName),
                company_name: get(ContactField::CompanyName),
                phone: identity.phone,
                email: identity.email,
                department: get(ContactField::Department),
                city: get(ContactField::City),
                external_id,
                fingerprint: identity.fingerprint,
            });
        }

        // Rows matching a stored contact on any key, opted out or not, are left out.
        let keys = rows.iter().map(ContactKeys::from).collect();
        let matches = contacts::find_matching(&self.db, keys).await?;
        let mut changes = ContactChanges::default();
        for (row, matched) in rows.into_iter().zip(matches) {
            if matched.is_empty() {
                changes.inserts.push(row);
            } else {
                report.duplicates_existing += 1;
            }
        }

        let (inserted, _) =
            contacts::apply_contact_changes(&self.db, changes, ContactSource::Import).await?;
        report.inserted = inserted;
        prospect_prometheus::record_contacts_synced("import", inserted, 0);

        info!(
            rows = report.rows,
            inserted,
            duplicates_in_file = report.duplicates_in_file,
            duplicates_existing = report.duplicates_existing,
            errors = report.errors.len(),
            "contact import finished"
        );
        self.audit(
            admin,
            "contacts.import",
            "import",
            serde_json::json!({
                "rows": report.rows,
                "inserted": report.inserted,
                "errors": report.errors.len(),
            }),
        )
        .await;
        Ok(report)
    }
}

fn row_error(row: usize, field: &str, message: String) -> ImportRowError {
    ImportRowError {
        row,
        field: field.to_string(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use prospect_test_utils::TestHarness;

    fn service(harness: &TestHarness) -> ContactSync {
        ContactSync::new(
            harness.db.clone(),
            Arc::new(harness.directory.clone()),
            Arc::new(harness.audit.clone()),
            "33",
        )
    }

    #[test]
    fn reads_semicolon_headers() {
        let headers = csv_headers("Raison sociale;Courriel;Téléphone\nA;a@b.fr;0612345678\n").unwrap();
        assert_eq!(headers, vec!["Raison sociale", "Courriel", "Téléphone"]);
    }

    #[test]
    fn suggests_french_and_english_headers() {
        let mapping = suggest_mapping(&[
            "Raison sociale",
            "Nom du contact",
            "E-mail",
            "Téléphone",
            "Département",
            "Ville",
            "Remarques",
        ]);
        assert_eq!(mapping.get("E-mail"), Some(&ContactField::Email));
        assert_eq!(mapping.get("Téléphone"), Some(&ContactField::Phone));
        assert_eq!(mapping.get("Nom du contact"), Some(&ContactField::DisplayName));
        assert_eq!(mapping.get("Département"), Some(&ContactField::Department));
        assert_eq!(mapping.get("Ville"), Some(&ContactField::City));
        assert_eq!(mapping.get("Remarques"), None);

        let english = suggest_mapping(&["company_name", "name", "email"]);
        assert_eq!(english.get("company_name"), Some(&ContactField::CompanyName));
        assert_eq!(english.get("name"), Some(&ContactField::DisplayName));
    }

    #[tokio::test]
    async fn imports_validates_and_dedups() {
        let harness = TestHarness::new().await.unwrap();
        harness.seed_contacts(1).await.unwrap();
        let csv = "\
nom;email;telephone
Alice;alice@example.com;
Bob;broken;06 12 34 56 78
Carol;;
Dup;ALICE@example.com;
Old;prospect0@example.com;
";
        let sync = service(&harness);
        let mapping = suggest_mapping(&["nom", "email", "telephone"]);
        let report = sync.import_csv(&AdminContext::new("ops"), csv, &mapping).await.unwrap();

        assert_eq!(report.rows, 5);
        assert_eq!(report.inserted, 2);
        assert_eq!(report.duplicates_in_file, 1);
        assert_eq!(report.duplicates_existing, 1);
        let fields: Vec<(usize, &str)> =
            report.errors.iter().map(|e| (e.row, e.field.as_str())).collect();
        assert_eq!(fields, vec![(3, "email"), (4, "email/phone")]);

        let bob = contacts::find_by_fingerprint(&harness.db, "phone:+33612345678")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(bob.display_name.as_deref(), Some("Bob"));
        assert_eq!(bob.email, None);
        assert_eq!(bob.source, ContactSource::Import);
        assert_eq!(harness.audit.actions().await, vec!["contacts.import".to_string()]);
    }

    #[tokio::test]
    async fn rows_sharing_an_opted_out_phone_are_not_imported() {
        let harness = TestHarness::new().await.unwrap();
        let sync = service(&harness);
        let mapping = suggest_mapping(&["nom", "email", "telephone"]);
        sync.import_csv(
            &AdminContext::new("ops"),
            "nom;email;telephone\nJean;;06 12 34 56 78\n",
            &mapping,
        )
        .await
        .unwrap();
        let jean = contacts::find_by_fingerprint(&harness.db, "phone:+33612345678")
            .await
            .unwrap()
            .unwrap();
        sync.set_opt_out(&AdminContext::new("ops"), &jean.id).await.unwrap();

        let report = sync
            .import_csv(
                &AdminContext::new("ops"),
                "nom;email;telephone\nJean;jean@x.fr;+33 6 12 34 56 78\n",
                &mapping,
            )
            .await
            .unwrap();
        assert_eq!((report.inserted, report.duplicates_existing), (0, 1));
        assert_eq!(contacts::list_contacts(&harness.db, None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn mapping_without_contact_points_is_rejected() {
        let harness = TestHarness::new().await.unwrap();
        let mapping = ColumnMapping::from([("nom".to_string(), ContactField::DisplayName)]);
        let err = service(&harness)
            .import_csv(&AdminContext::new("ops"), "nom\nA\n", &mapping)
            .await
            .unwrap_err();
        assert!(matches!(err, ProspectError::Validation(_)));
    }
}
