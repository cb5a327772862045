// SPDX-FileCopyrightText: 2026 Prospect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dispatcher and worker pool for the Prospect campaign engine.
//!
//! The [`Dispatcher`] polls `sending` campaigns, claims due entries within
//! each campaign's rate budget, renders and sends the messages through a
//! [`SendProvider`](prospect_core::SendProvider), and records every outcome
//! on the queue.

pub mod dispatcher;
pub mod limiter;

pub use dispatcher::{DispatchSettings, Dispatcher, PollReport};
pub use limiter::{RateLimiters, TokenBucket};
pub use prospect_core::template::{TemplateContext, render};
