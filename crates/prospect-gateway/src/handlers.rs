// SPDX-FileCopyrightText: 2026 Prospect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the gateway REST API.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use prospect_analytics::{CampaignStats, QueueStats};
use prospect_core::ProspectError;
use prospect_core::types::{AdminContext, Campaign, SyncFilter};
use prospect_sync::SyncReport;

use crate::server::GatewayState;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Handler error: a [`ProspectError`] rendered with its HTTP status.
#[derive(Debug)]
pub struct ApiError(pub ProspectError);

impl From<ProspectError> for ApiError {
    fn from(err: ProspectError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(status = %status, error = %self.0, "request failed");
        } else {
            tracing::debug!(status = %status, error = %self.0, "request rejected");
        }
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

/// Campaign status after a pause or resume.
#[derive(Debug, Serialize)]
pub struct CampaignStatusResponse {
    pub id: String,
    pub status: String,
    pub version: i64,
    pub paused_at: Option<String>,
}

impl From<Campaign> for CampaignStatusResponse {
    fn from(c: Campaign) -> Self {
        Self {
            id: c.id,
            status: c.status.to_string(),
            version: c.version,
            paused_at: c.paused_at,
        }
    }
}

/// Optional body for POST /v1/contacts/sync.
#[derive(Debug, Default, Deserialize)]
pub struct SyncRequest {
    #[serde(default)]
    pub department: Option<String>,
}

/// Query string of an unsubscribe link.
#[derive(Debug, Deserialize)]
pub struct UnsubscribeQuery {
    pub token: String,
}

/// Response body for /unsubscribe.
#[derive(Debug, Serialize)]
pub struct UnsubscribeResponse {
    pub contact_id: String,
    pub opted_out: bool,
}

/// GET /health
pub async fn get_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.health.start_time.elapsed().as_secs(),
    })
}

/// GET /metrics
///
/// Prometheus text exposition, or 404 when no recorder is installed.
pub async fn get_metrics(State(state): State<GatewayState>) -> Response {
    match &state.health.prometheus_render {
        Some(render) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// POST /v1/campaigns/{id}/pause
pub async fn pause_campaign(
    State(state): State<GatewayState>,
    Extension(admin): Extension<AdminContext>,
    Path(id): Path<String>,
) -> Result<Json<CampaignStatusResponse>, ApiError> {
    let campaign = state.control.pause_campaign(&admin, &id).await?;
    Ok(Json(campaign.into()))
}

/// POST /v1/campaigns/{id}/resume
pub async fn resume_campaign(
    State(state): State<GatewayState>,
    Extension(admin): Extension<AdminContext>,
    Path(id): Path<String>,
) -> Result<Json<CampaignStatusResponse>, ApiError> {
    let campaign = state.control.resume_campaign(&admin, &id).await?;
    Ok(Json(campaign.into()))
}

/// GET /v1/campaigns/{id}/stats
pub async fn campaign_stats(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> Result<Json<CampaignStats>, ApiError> {
    Ok(Json(state.analytics.campaign_stats(&id).await?))
}

/// GET /v1/campaigns/{id}/queue
pub async fn queue_stats(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> Result<Json<QueueStats>, ApiError> {
    Ok(Json(state.analytics.queue_stats(&id).await?))
}

/// POST /v1/contacts/sync
///
/// Runs the sync inline and returns its report. An empty body syncs every
/// department.
pub async fn sync_contacts(
    State(state): State<GatewayState>,
    Extension(admin): Extension<AdminContext>,
    body: Option<Json<SyncRequest>>,
) -> Result<Json<SyncReport>, ApiError> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let report = state
        .contacts
        .sync(
            &admin,
            SyncFilter {
                department: request.department,
            },
        )
        .await?;
    Ok(Json(report))
}

/// GET|POST /unsubscribe?token=
///
/// Opts out the contact the token was signed for. A bad or expired token is
/// a 400 and changes nothing.
pub async fn unsubscribe(
    State(state): State<GatewayState>,
    Query(query): Query<UnsubscribeQuery>,
) -> Result<Json<UnsubscribeResponse>, ApiError> {
    let contact = state.contacts.unsubscribe(&query.token).await?;
    Ok(Json(UnsubscribeResponse {
        contact_id: contact.id,
        opted_out: contact.opt_out,
    }))
}
