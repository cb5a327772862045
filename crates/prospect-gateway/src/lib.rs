// SPDX-FileCopyrightText: 2026 Prospect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway for the Prospect campaign engine.
//!
//! A thin axum surface over campaign control, analytics and contact sync.
//! Every `/v1` route requires a bearer token; `/health` and `/metrics` are
//! public for process supervisors and Prometheus scrapers. Domain errors map
//! to HTTP statuses through [`ProspectError::http_status`] and are returned as
//! `{ "error": "..." }`.
//!
//! [`ProspectError::http_status`]: prospect_core::ProspectError::http_status

pub mod auth;
pub mod handlers;
pub mod server;

pub use auth::AuthConfig;
pub use server::{GatewayState, HealthState, ServerConfig, build_router, start_server};
