// SPDX-FileCopyrightText: 2026 Prospect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementations of the storage and audit adapter traits.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use prospect_config::model::StorageConfig;
use prospect_core::{
    AdapterType, AuditSink, HealthStatus, PluginAdapter, ProspectError, StorageAdapter,
};

use crate::database::{Database, map_tr_err};
use crate::queries;

/// SQLite-backed storage adapter.
///
/// Wraps a [`Database`] handle that is opened on the first call to
/// [`StorageAdapter::initialize`]. Components get the handle through
/// [`SqliteStorage::database`].
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    /// Create a new SqliteStorage with the given configuration.
    ///
    /// The database connection is not opened until [`StorageAdapter::initialize`] is called.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Returns the underlying Database, or an error if not initialized.
    pub fn database(&self) -> Result<&Database, ProspectError> {
        self.db.get().ok_or_else(|| ProspectError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }

    async fn checkpoint(db: &Database) -> Result<(), ProspectError> {
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        debug!("WAL checkpoint complete");
        Ok(())
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, ProspectError> {
        let db = self.database()?;
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ProspectError> {
        if let Some(db) = self.db.get() {
            Self::checkpoint(db).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn initialize(&self) -> Result<(), ProspectError> {
        let db =
            Database::open_with_options(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| ProspectError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), ProspectError> {
        Self::checkpoint(self.database()?).await
    }
}

/// [`AuditSink`] that appends to the `audit_log` table.
#[derive(Clone)]
pub struct SqliteAuditLog {
    db: Database,
}

impl SqliteAuditLog {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AuditSink for SqliteAuditLog {
    async fn log_admin_action(
        &self,
        admin_id: &str,
        action: &str,
        entity_type: &str,
        entity_id: &str,
        metadata: Option<serde_json::Value>,
    ) -> Result<(), ProspectError> {
        queries::audit::insert_audit(
            &self.db,
            admin_id,
            action,
            entity_type,
            entity_id,
            metadata.as_ref(),
        )
        .await?;
        Ok(())
    }
}
