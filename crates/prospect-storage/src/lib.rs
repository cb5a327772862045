// SPDX-FileCopyrightText: 2026 Prospect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Prospect campaign engine.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a single-writer
//! concurrency model via `tokio-rusqlite`, and typed operations for contacts,
//! lists, campaigns, the send queue, the append-only delivery event log, the
//! transactional outbox and the admin audit log.

pub mod adapter;
pub mod database;
pub mod migrations;
pub mod models;
pub mod queries;

pub use adapter::{SqliteAuditLog, SqliteStorage};
pub use database::Database;
pub use models::*;
