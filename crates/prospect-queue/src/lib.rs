// SPDX-FileCopyrightText: 2026 Prospect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message queue and campaign lifecycle for the Prospect campaign engine.
//!
//! - [`MessageQueue`] enqueues contacts, claims batches atomically and applies
//!   send outcomes with retry backoff.
//! - [`CampaignControl`] owns campaign status transitions (start, pause,
//!   resume, cancel, completion) and their audit trail.
//! - [`OutboxRelay`] hands committed domain events to an [`OutboxHandler`].
//!
//! [`OutboxHandler`]: prospect_core::OutboxHandler

pub mod control;
pub mod outbox;
pub mod queue;
pub mod retry;

pub use control::{CampaignControl, StartReport};
pub use outbox::{LoggingOutboxHandler, OutboxRelay, RelayReport};
pub use queue::MessageQueue;
pub use retry::RetryPolicy;
