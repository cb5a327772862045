// SPDX-FileCopyrightText: 2026 Prospect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Primary provider directory trait.

use async_trait::async_trait;

use crate::error::ProspectError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{DirectoryRecord, SyncFilter};

/// Read access to the system of record that contacts are synced from.
#[async_trait]
pub trait ProviderDirectory: PluginAdapter {
    /// Returns every record matching `filter`. A `None` department means all.
    async fn fetch(&self, filter: &SyncFilter) -> Result<Vec<DirectoryRecord>, ProspectError>;
}
