// SPDX-FileCopyrightText: 2026 Prospect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Authentication middleware for the gateway.
//!
//! Requests to `/v1` must carry `Authorization: Bearer <token>`. When no token
//! is configured, all requests are rejected (fail-closed).
//!
//! On success the middleware attaches an [`AdminContext`] to the request. The
//! admin id comes from the `X-Admin-Id` header, falling back to the configured
//! default, and ends up in the audit log.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};

use prospect_core::types::AdminContext;

/// Header naming the administrator behind an authenticated request.
pub const ADMIN_HEADER: &str = "x-admin-id";

/// Authentication configuration for the gateway.
#[derive(Clone)]
pub struct AuthConfig {
    /// Expected bearer token. `None` rejects everything.
    pub bearer_token: Option<String>,
    /// Admin id used when a request does not name one.
    pub default_admin_id: String,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field(
                "bearer_token",
                &self.bearer_token.as_ref().map(|_| "[redacted]"),
            )
            .field("default_admin_id", &self.default_admin_id)
            .finish()
    }
}

/// Middleware that validates the bearer token and attaches the admin context.
pub async fn auth_middleware(
    State(auth): State<AuthConfig>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(expected_token) = auth.bearer_token.as_deref() else {
        tracing::error!("gateway has no bearer token configured -- rejecting request");
        return Err(StatusCode::UNAUTHORIZED);
    };

    let presented = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    if presented != Some(expected_token) {
        return Err(StatusCode::UNAUTHORIZED);
    }

    let admin_id = request
        .headers()
        .get(ADMIN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(&auth.default_admin_id)
        .to_string();
    request.extensions_mut().insert(AdminContext::new(admin_id));
    Ok(next.run(request).await)
}
