// SPDX-FileCopyrightText: 2026 Prospect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Component wiring shared by `prospect serve` and the one-shot commands.

use std::sync::Arc;

use prospect_analytics::Analytics;
use prospect_config::ProspectConfig;
use prospect_core::types::AdminContext;
use prospect_core::{ProspectError, StorageAdapter, UnsubscribeSigner};
use prospect_queue::{CampaignControl, MessageQueue, RetryPolicy};
use prospect_storage::{Database, SqliteAuditLog, SqliteStorage};
use prospect_sync::{ContactSync, CsvDirectory};
use tracing::{debug, info};

/// Opened storage and the services built on it.
pub struct App {
    pub config: ProspectConfig,
    pub storage: Arc<SqliteStorage>,
    pub db: Database,
    pub queue: MessageQueue,
    pub control: CampaignControl,
    pub analytics: Analytics,
    pub sync: ContactSync,
    /// Set when `unsubscribe.secret` is configured.
    pub unsubscribe: Option<Arc<UnsubscribeSigner>>,
}

impl App {
    /// Open the database (running migrations) and build every service.
    pub async fn open(config: ProspectConfig) -> Result<Self, ProspectError> {
        let storage = SqliteStorage::new(config.storage.clone());
        storage.initialize().await?;
        let db = storage.database()?.clone();
        debug!(path = %config.storage.database_path, "storage opened");

        let unsubscribe = match &config.unsubscribe.secret {
            Some(secret) => Some(Arc::new(UnsubscribeSigner::new(
                secret,
                config.unsubscribe.base_url.as_str(),
                chrono::Duration::days(i64::from(config.unsubscribe.max_age_days)),
            )?)),
            None => {
                debug!("no unsubscribe secret, {{{{unsubscribe_link}}}} disabled");
                None
            }
        };

        let audit = Arc::new(SqliteAuditLog::new(db.clone()));
        let queue = MessageQueue::new(db.clone(), RetryPolicy::from_config(&config.queue));
        let control = CampaignControl::new(queue.clone(), audit.clone())
            .with_unsubscribe_links(unsubscribe.is_some());
        let analytics = Analytics::new(db.clone());

        let cc = config.sync.default_country_code.clone();
        let sync = match &config.sync.directory_csv {
            Some(path) => {
                info!(path = path.as_str(), "provider directory: csv export");
                ContactSync::new(db.clone(), Arc::new(CsvDirectory::new(path)), audit, cc)
            }
            None => {
                debug!("no provider directory configured");
                ContactSync::without_directory(db.clone(), audit, cc)
            }
        };
        let sync = match &unsubscribe {
            Some(signer) => sync.with_unsubscribe(Arc::clone(signer)),
            None => sync,
        };

        Ok(Self {
            config,
            storage: Arc::new(storage),
            db,
            queue,
            control,
            analytics,
            sync,
            unsubscribe,
        })
    }

    /// The admin identity recorded for CLI and scheduled actions.
    pub fn admin(&self) -> AdminContext {
        AdminContext::new(self.config.service.admin_id.clone())
    }

    /// Checkpoint the WAL before exit.
    pub async fn close(&self) -> Result<(), ProspectError> {
        self.storage.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prospect_storage::queries::campaigns;

    fn config_in(dir: &tempfile::TempDir) -> ProspectConfig {
        let mut config = ProspectConfig::default();
        config.storage.database_path = dir.path().join("app.db").to_string_lossy().into_owned();
        config
    }

    #[tokio::test]
    async fn open_runs_migrations() {
        let dir = tempfile::tempdir().unwrap();
        let app = App::open(config_in(&dir)).await.unwrap();
        assert!(campaigns::list_campaigns(&app.db, None).await.unwrap().is_empty());
        assert_eq!(app.admin().admin_id, "system");
        app.close().await.unwrap();
    }

    #[tokio::test]
    async fn sync_without_directory_reports_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let app = App::open(config_in(&dir)).await.unwrap();
        let err = app
            .sync
            .sync(&app.admin(), Default::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ProspectError::Config(_)));
    }

    #[tokio::test]
    async fn unsubscribe_secret_enables_links() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(&dir);
        config.unsubscribe.secret = Some("app-test-secret-0001".to_string());
        let app = App::open(config).await.unwrap();
        let signer = app.unsubscribe.clone().expect("signer built from config");

        let campaign = app
            .control
            .create_campaign(
                &app.admin(),
                &prospect_core::types::NewCampaign {
                    name: "Relance".into(),
                    channel: prospect_core::Channel::Sms,
                    list_id: None,
                    subject_template: None,
                    body_template: "STOP: {{unsubscribe_link}}".into(),
                    rate_limit_per_sec: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(campaign.body_template, "STOP: {{unsubscribe_link}}");

        let token = signer
            .sign("missing-contact", prospect_core::Channel::Sms, chrono::Utc::now())
            .unwrap();
        let err = app.sync.unsubscribe(&token).await.unwrap_err();
        assert!(matches!(err, ProspectError::NotFound { .. }));
    }
}
