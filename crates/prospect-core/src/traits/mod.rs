// SPDX-FileCopyrightText: 2026 Prospect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions for the Prospect campaign engine.
//!
//! External collaborators (send providers, the provider directory, storage)
//! extend the [`PluginAdapter`] base trait and use `#[async_trait]` for
//! dynamic dispatch compatibility. The audit sink and outbox handler are
//! plain async seams.

pub mod adapter;
pub mod audit;
pub mod directory;
pub mod outbox;
pub mod provider;
pub mod storage;

// Re-export all traits at the traits module level for convenience.
pub use adapter::PluginAdapter;
pub use audit::AuditSink;
pub use directory::ProviderDirectory;
pub use outbox::OutboxHandler;
pub use provider::SendProvider;
pub use storage::StorageAdapter;
