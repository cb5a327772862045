// SPDX-FileCopyrightText: 2026 Prospect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` opens a temp SQLite database through the storage adapter and
//! bundles the mock adapters a pipeline test needs, plus helpers that seed
//! contacts, lists and draft campaigns.

use std::sync::Arc;
use std::time::Duration;

use prospect_config::ProspectConfig;
use prospect_config::model::StorageConfig;
use prospect_core::types::{
    Campaign, Channel, Contact, ContactList, ContactSource, DirectoryRecord, NewCampaign,
    NewContact,
};
use prospect_core::{ProspectError, StorageAdapter};
use prospect_storage::queries::{campaigns, contacts, lists};
use prospect_storage::{Database, SqliteStorage};

use crate::mock_audit::MemoryAuditSink;
use crate::mock_directory::MockDirectory;
use crate::mock_provider::{MockOutcome, MockSendProvider};

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    outcomes: Vec<MockOutcome>,
    provider_delay: Duration,
    directory: Vec<DirectoryRecord>,
    failing_audit: bool,
    config: ProspectConfig,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            outcomes: Vec::new(),
            provider_delay: Duration::ZERO,
            directory: Vec::new(),
            failing_audit: false,
            config: ProspectConfig::default(),
        }
    }

    /// Script the mock send provider.
    pub fn with_outcomes(mut self, outcomes: Vec<MockOutcome>) -> Self {
        self.outcomes = outcomes;
        self
    }

    /// Make every mock send take this long.
    pub fn with_provider_delay(mut self, delay: Duration) -> Self {
        self.provider_delay = delay;
        self
    }

    /// Seed the mock provider directory.
    pub fn with_directory(mut self, records: Vec<DirectoryRecord>) -> Self {
        self.directory = records;
        self
    }

    /// Use an audit sink that fails every call.
    pub fn with_failing_audit(mut self) -> Self {
        self.failing_audit = true;
        self
    }

    /// Adjust the configuration before build.
    pub fn with_config(mut self, edit: impl FnOnce(&mut ProspectConfig)) -> Self {
        edit(&mut self.config);
        self
    }

    /// Build the test harness, opening a fresh database.
    pub async fn build(mut self) -> Result<TestHarness, ProspectError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| ProspectError::Storage { source: e.into() })?;
        let db_path = temp_dir.path().join("test.db");

        self.config.storage = StorageConfig {
            database_path: db_path.to_string_lossy().to_string(),
            wal_mode: true,
        };
        let storage = SqliteStorage::new(self.config.storage.clone());
        storage.initialize().await?;
        let db = storage.database()?.clone();

        let provider = Arc::new(
            MockSendProvider::with_outcomes(self.outcomes).with_delay(self.provider_delay),
        );
        let audit = if self.failing_audit {
            MemoryAuditSink::failing()
        } else {
            MemoryAuditSink::new()
        };

        Ok(TestHarness {
            db,
            storage: Arc::new(storage),
            provider,
            audit,
            directory: MockDirectory::new(self.directory),
            config: self.config,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete test environment with mock adapters and temp storage.
pub struct TestHarness {
    /// Database handle (temp file, removed on drop).
    pub db: Database,
    /// The storage adapter that opened `db`.
    pub storage: Arc<SqliteStorage>,
    /// The mock send provider.
    pub provider: Arc<MockSendProvider>,
    /// In-memory audit sink.
    pub audit: MemoryAuditSink,
    /// In-memory provider directory.
    pub directory: MockDirectory,
    /// Configuration, with `storage` pointing at the temp database.
    pub config: ProspectConfig,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// A harness with all defaults.
    pub async fn new() -> Result<Self, ProspectError> {
        Self::builder().build().await
    }

    /// Insert `n` reachable contacts with distinct email and phone.
    pub async fn seed_contacts(&self, n: usize) -> Result<Vec<Contact>, ProspectError> {
        let mut out = Vec::with_capacity(n);
        for i in 0..n {
            let email = format!("prospect{i}@example.com");
            let contact = contacts::insert_contact(
                &self.db,
                &NewContact {
                    display_name: Some(format!("Artisan {i}")),
                    company_name: Some(format!("Atelier {i}")),
                    phone: Some(format!("+336120{i:05}")),
                    email: Some(email.clone()),
                    department: Some("75".to_string()),
                    city: Some("Paris".to_string()),
                    external_id: None,
                    fingerprint: format!("email:{email}"),
                },
                ContactSource::Manual,
            )
            .await?;
            out.push(contact);
        }
        Ok(out)
    }

    /// Create a list holding `members`.
    pub async fn seed_list(&self, members: &[Contact]) -> Result<ContactList, ProspectError> {
        let list = lists::create_list(&self.db, "test list", None).await?;
        let ids: Vec<String> = members.iter().map(|c| c.id.clone()).collect();
        lists::add_members(&self.db, &list.id, &ids).await?;
        Ok(list)
    }

    /// Insert a draft campaign on `channel` targeting `list_id`.
    pub async fn draft_campaign(
        &self,
        channel: Channel,
        list_id: Option<&str>,
    ) -> Result<Campaign, ProspectError> {
        campaigns::insert_campaign(
            &self.db,
            &NewCampaign {
                name: "Spring outreach".to_string(),
                channel,
                list_id: list_id.map(str::to_string),
                subject_template: Some("Hello {{contact_name}}".to_string()),
                body_template: "Hi {{contact_name}} from {{company_name}}".to_string(),
                rate_limit_per_sec: None,
            },
        )
        .await
    }

    /// `n` contacts, a list of them, and a draft email campaign on that list.
    pub async fn seeded_campaign(
        &self,
        n: usize,
    ) -> Result<(Campaign, Vec<Contact>), ProspectError> {
        let contacts = self.seed_contacts(n).await?;
        let list = self.seed_list(&contacts).await?;
        let campaign = self.draft_campaign(Channel::Email, Some(&list.id)).await?;
        Ok((campaign, contacts))
    }
}
