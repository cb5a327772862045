// SPDX-FileCopyrightText: 2026 Prospect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use prospect_analytics::Analytics;
use prospect_core::ProspectError;
use prospect_core::unsubscribe::UNSUBSCRIBE_PATH;
use prospect_queue::CampaignControl;
use prospect_sync::ContactSync;

use crate::auth::{AuthConfig, auth_middleware};
use crate::handlers;

/// Health state for unauthenticated health/metrics endpoints.
#[derive(Clone)]
pub struct HealthState {
    /// Process start time for uptime calculation.
    pub start_time: std::time::Instant,
    /// Optional Prometheus metrics render function.
    pub prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>>,
}

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub control: CampaignControl,
    pub analytics: Analytics,
    /// Directory sync (a `Config` error when no directory is configured)
    /// and signed unsubscribe links.
    pub contacts: ContactSync,
    pub auth: AuthConfig,
    pub health: HealthState,
}

/// Gateway listen address.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Build the gateway router.
///
/// - GET /health, GET /metrics (public)
/// - GET|POST /unsubscribe?token= (public, the token is the credential)
/// - POST /v1/campaigns/{id}/pause, POST /v1/campaigns/{id}/resume
/// - GET /v1/campaigns/{id}/stats, GET /v1/campaigns/{id}/queue
/// - POST /v1/contacts/sync
pub fn build_router(state: GatewayState) -> Router {
    let auth_state = state.auth.clone();

    let public_routes = Router::new()
        .route("/health", get(handlers::get_health))
        .route("/metrics", get(handlers::get_metrics))
        .route(
            UNSUBSCRIBE_PATH,
            get(handlers::unsubscribe).post(handlers::unsubscribe),
        )
        .with_state(state.clone());

    let api_routes = Router::new()
        .route("/v1/campaigns/{id}/pause", post(handlers::pause_campaign))
        .route("/v1/campaigns/{id}/resume", post(handlers::resume_campaign))
        .route("/v1/campaigns/{id}/stats", get(handlers::campaign_stats))
        .route("/v1/campaigns/{id}/queue", get(handlers::queue_stats))
        .route("/v1/contacts/sync", post(handlers::sync_contacts))
        .route_layer(axum_middleware::from_fn_with_state(
            auth_state,
            auth_middleware,
        ))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .layer(TraceLayer::new_for_http())
}

/// Serve the gateway until `cancel` fires.
pub async fn start_server(
    config: &ServerConfig,
    state: GatewayState,
    cancel: CancellationToken,
) -> Result<(), ProspectError> {
    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ProspectError::Provider {
            message: format!("failed to bind gateway to {addr}: {e}"),
            source: Some(Box::new(e)),
        })?;

    tracing::info!("gateway listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
        .map_err(|e| ProspectError::Provider {
            message: format!("gateway server error: {e}"),
            source: Some(Box::new(e)),
        })?;

    tracing::info!("gateway stopped");
    Ok(())
}
