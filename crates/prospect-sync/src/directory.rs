// SPDX-FileCopyrightText: 2026 Prospect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider directory read from a CSV export.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use prospect_core::traits::adapter::PluginAdapter;
use prospect_core::traits::directory::ProviderDirectory;
use prospect_core::types::{AdapterType, DirectoryRecord, HealthStatus, SyncFilter};
use prospect_core::ProspectError;

/// One row of the directory export. Headers are matched by alias.
#[derive(Debug, Deserialize)]
struct DirectoryRow {
    #[serde(default, alias = "id", alias = "siret", alias = "provider_id")]
    external_id: Option<String>,
    #[serde(default, alias = "contact_name", alias = "nom")]
    name: Option<String>,
    #[serde(default, alias = "company", alias = "entreprise", alias = "raison_sociale")]
    company_name: Option<String>,
    #[serde(default, alias = "mail", alias = "courriel")]
    email: Option<String>,
    #[serde(default, alias = "telephone", alias = "tel")]
    phone: Option<String>,
    #[serde(default, alias = "departement", alias = "dept")]
    department: Option<String>,
    #[serde(default, alias = "ville")]
    city: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Guess the delimiter from the header line: `;`, then tab, else `,`.
pub(crate) fn sniff_delimiter(content: &str) -> u8 {
    let header = content.lines().next().unwrap_or_default();
    if header.contains(';') {
        b';'
    } else if header.contains('\t') {
        b'\t'
    } else {
        b','
    }
}

/// Parse a directory export. Rows without an external id are rejected.
pub fn parse_directory_csv(content: &str) -> Result<Vec<DirectoryRecord>, ProspectError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(sniff_delimiter(content))
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let mut records = Vec::new();
    for (index, result) in reader.deserialize::<DirectoryRow>().enumerate() {
        // Header is line 1.
        let line = index + 2;
        let row = result.map_err(|e| {
            ProspectError::Validation(format!("directory export line {line}: {e}"))
        })?;
        let external_id = non_empty(row.external_id).ok_or_else(|| {
            ProspectError::Validation(format!("directory export line {line}: missing id"))
        })?;
        records.push(DirectoryRecord {
            external_id,
            name: non_empty(row.name),
            company_name: non_empty(row.company_name),
            email: non_empty(row.email),
            phone: non_empty(row.phone),
            department: non_empty(row.department),
            city: non_empty(row.city),
        });
    }
    Ok(records)
}

/// A [`ProviderDirectory`] over a CSV export of the provider table.
///
/// The file is re-read on every fetch so a refreshed export is picked up
/// without a restart.
pub struct CsvDirectory {
    path: PathBuf,
}

impl CsvDirectory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<String, ProspectError> {
        tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            ProspectError::Provider {
                message: format!("cannot read directory export {}", self.path.display()),
                source: Some(Box::new(e)),
            }
        })
    }
}

#[async_trait]
impl PluginAdapter for CsvDirectory {
    fn name(&self) -> &str {
        "csv-directory"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Directory
    }

    async fn health_check(&self) -> Result<HealthStatus, ProspectError> {
        match tokio::fs::metadata(&self.path).await {
            Ok(meta) if meta.is_file() => Ok(HealthStatus::Healthy),
            Ok(_) => Ok(HealthStatus::Unhealthy(format!(
                "{} is not a file",
                self.path.display()
            ))),
            Err(e) => Ok(HealthStatus::Unhealthy(format!(
                "{}: {e}",
                self.path.display()
            ))),
        }
    }

    async fn shutdown(&self) -> Result<(), ProspectError> {
        Ok(())
    }
}

#[async_trait]
impl ProviderDirectory for CsvDirectory {
    async fn fetch(&self, filter: &SyncFilter) -> Result<Vec<DirectoryRecord>, ProspectError> {
        let content = self.read().await?;
        let mut records = parse_directory_csv(&content)?;
        if let Some(dept) = &filter.department {
            records.retain(|r| r.department.as_deref() == Some(dept.as_str()));
        }
        debug!(
            path = %self.path.display(),
            department = filter.department.as_deref().unwrap_or("all"),
            records = records.len(),
            "directory export read"
        );
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPORT: &str = "\
siret;nom;entreprise;email;telephone;departement;ville
123;Jean Martin;Martin Plomberie;jean@martin.fr;06 12 34 56 78;75;Paris
456;;Lyon Elec;;04 78 00 00 00;69;Lyon
";

    #[test]
    fn parses_semicolon_export_with_french_headers() {
        let records = parse_directory_csv(EXPORT).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].external_id, "123");
        assert_eq!(records[0].name.as_deref(), Some("Jean Martin"));
        assert_eq!(records[0].company_name.as_deref(), Some("Martin Plomberie"));
        assert_eq!(records[1].name, None);
        assert_eq!(records[1].email, None);
        assert_eq!(records[1].city.as_deref(), Some("Lyon"));
    }

    #[test]
    fn comma_export_with_english_headers() {
        let content = "id,name,email\n9,Ann,ann@x.io\n";
        assert_eq!(sniff_delimiter(content), b',');
        let records = parse_directory_csv(content).unwrap();
        assert_eq!(records[0].external_id, "9");
        assert_eq!(records[0].department, None);
    }

    #[test]
    fn missing_id_names_the_line() {
        let err = parse_directory_csv("id,name\n1,A\n,B\n").unwrap_err();
        assert!(err.to_string().contains("line 3"), "{err}");
    }

    #[tokio::test]
    async fn fetch_filters_by_department() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("directory.csv");
        std::fs::write(&path, EXPORT).unwrap();
        let directory = CsvDirectory::new(&path);

        assert_eq!(directory.health_check().await.unwrap(), HealthStatus::Healthy);
        let lyon = directory
            .fetch(&SyncFilter {
                department: Some("69".into()),
            })
            .await
            .unwrap();
        assert_eq!(lyon.len(), 1);
        assert_eq!(lyon[0].external_id, "456");
    }

    #[tokio::test]
    async fn missing_file_is_a_provider_error() {
        let directory = CsvDirectory::new("/nonexistent/directory.csv");
        let err = directory.fetch(&SyncFilter::default()).await.unwrap_err();
        assert!(matches!(err, ProspectError::Provider { .. }));
        assert!(matches!(
            directory.health_check().await.unwrap(),
            HealthStatus::Unhealthy(_)
        ));
    }
}
