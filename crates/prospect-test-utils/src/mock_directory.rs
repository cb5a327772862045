// SPDX-FileCopyrightText: 2026 Prospect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory provider directory.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use prospect_core::traits::adapter::PluginAdapter;
use prospect_core::traits::directory::ProviderDirectory;
use prospect_core::types::{AdapterType, DirectoryRecord, HealthStatus, SyncFilter};
use prospect_core::ProspectError;

/// A provider directory backed by a mutable in-memory record list.
///
/// Honours the department filter the way a real directory query would.
#[derive(Clone, Default)]
pub struct MockDirectory {
    records: Arc<Mutex<Vec<DirectoryRecord>>>,
    fetches: Arc<Mutex<Vec<SyncFilter>>>,
}

impl MockDirectory {
    pub fn new(records: Vec<DirectoryRecord>) -> Self {
        Self {
            records: Arc::new(Mutex::new(records)),
            fetches: Arc::default(),
        }
    }

    /// Replace the directory content.
    pub async fn set_records(&self, records: Vec<DirectoryRecord>) {
        *self.records.lock().await = records;
    }

    /// Filters passed to every `fetch` so far.
    pub async fn fetches(&self) -> Vec<SyncFilter> {
        self.fetches.lock().await.clone()
    }
}

#[async_trait]
impl PluginAdapter for MockDirectory {
    fn name(&self) -> &str {
        "mock-directory"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Directory
    }

    async fn health_check(&self) -> Result<HealthStatus, ProspectError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ProspectError> {
        Ok(())
    }
}

#[async_trait]
impl ProviderDirectory for MockDirectory {
    async fn fetch(&self, filter: &SyncFilter) -> Result<Vec<DirectoryRecord>, ProspectError> {
        self.fetches.lock().await.push(filter.clone());
        let records = self.records.lock().await;
        Ok(records
            .iter()
            .filter(|r| match &filter.department {
                Some(dept) => r.department.as_deref() == Some(dept.as_str()),
                None => true,
            })
            .cloned()
            .collect())
    }
}
