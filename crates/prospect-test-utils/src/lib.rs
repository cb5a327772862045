// SPDX-FileCopyrightText: 2026 Prospect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Prospect integration tests.
//!
//! Provides mock adapters and test harness infrastructure for fast,
//! deterministic, CI-runnable tests without external services.
//!
//! # Components
//!
//! - [`MockSendProvider`] - Mock send provider with scripted outcomes
//! - [`MockDirectory`] - In-memory provider directory
//! - [`MemoryAuditSink`] - Audit sink that keeps actions in memory
//! - [`RecordingOutboxHandler`] - Outbox handler that records what it saw
//! - [`TestHarness`] - Temp database with seeding helpers

pub mod harness;
pub mod mock_audit;
pub mod mock_directory;
pub mod mock_provider;

pub use harness::TestHarness;
pub use mock_audit::{AuditRecord, MemoryAuditSink, RecordingOutboxHandler};
pub use mock_directory::MockDirectory;
pub use mock_provider::{MockOutcome, MockSendProvider};
