// SPDX-FileCopyrightText: 2026 Prospect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Signed one-click unsubscribe tokens.
//!
//! A token is `base64url(claim JSON).base64url(HMAC-SHA256(claim JSON))`.
//! The claim names the contact, the channel the message went out on and the
//! issue time; tokens older than the configured maximum age are rejected.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::ProspectError;
use crate::types::Channel;

type HmacSha256 = Hmac<Sha256>;

/// Path the gateway serves unsubscribe links on.
pub const UNSUBSCRIBE_PATH: &str = "/unsubscribe";

/// What a verified token asserts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsubscribeClaim {
    #[serde(rename = "cid")]
    pub contact_id: String,
    #[serde(rename = "ch")]
    pub channel: Channel,
    /// Unix seconds.
    #[serde(rename = "t")]
    pub issued_at: i64,
}

/// Signs and verifies unsubscribe tokens with a shared secret.
#[derive(Clone)]
pub struct UnsubscribeSigner {
    key: Vec<u8>,
    base_url: String,
    max_age: Duration,
}

impl std::fmt::Debug for UnsubscribeSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnsubscribeSigner")
            .field("key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("max_age", &self.max_age)
            .finish()
    }
}

impl UnsubscribeSigner {
    pub fn new(
        secret: &str,
        base_url: impl Into<String>,
        max_age: Duration,
    ) -> Result<Self, ProspectError> {
        if secret.is_empty() {
            return Err(ProspectError::Config(
                "unsubscribe secret must not be empty".to_string(),
            ));
        }
        Ok(Self {
            key: secret.as_bytes().to_vec(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            max_age,
        })
    }

    fn mac(&self) -> Result<HmacSha256, ProspectError> {
        HmacSha256::new_from_slice(&self.key)
            .map_err(|e| ProspectError::Internal(format!("hmac key rejected: {e}")))
    }

    /// Token for `contact_id` issued at `at`.
    pub fn sign(
        &self,
        contact_id: &str,
        channel: Channel,
        at: DateTime<Utc>,
    ) -> Result<String, ProspectError> {
        let claim = UnsubscribeClaim {
            contact_id: contact_id.to_string(),
            channel,
            issued_at: at.timestamp(),
        };
        let payload = serde_json::to_vec(&claim)
            .map_err(|e| ProspectError::Internal(format!("unsubscribe claim: {e}")))?;
        let mut mac = self.mac()?;
        mac.update(&payload);
        let signature = mac.finalize().into_bytes();
        Ok(format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(&payload),
            URL_SAFE_NO_PAD.encode(signature)
        ))
    }

    /// Full URL carrying a fresh token.
    pub fn link(
        &self,
        contact_id: &str,
        channel: Channel,
        at: DateTime<Utc>,
    ) -> Result<String, ProspectError> {
        let token = self.sign(contact_id, channel, at)?;
        Ok(format!("{}{UNSUBSCRIBE_PATH}?token={token}", self.base_url))
    }

    /// Check the signature and age of `token`.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<UnsubscribeClaim, ProspectError> {
        let invalid = || ProspectError::Validation("invalid unsubscribe token".to_string());

        let (payload, signature) = token.trim().split_once('.').ok_or_else(invalid)?;
        let payload = URL_SAFE_NO_PAD.decode(payload).map_err(|_| invalid())?;
        let signature = URL_SAFE_NO_PAD.decode(signature).map_err(|_| invalid())?;

        let mut mac = self.mac()?;
        mac.update(&payload);
        mac.verify_slice(&signature).map_err(|_| invalid())?;

        let claim: UnsubscribeClaim = serde_json::from_slice(&payload).map_err(|_| invalid())?;
        let age = now.timestamp() - claim.issued_at;
        if age > self.max_age.num_seconds() {
            return Err(ProspectError::Validation(
                "unsubscribe token expired".to_string(),
            ));
        }
        Ok(claim)
    }
}
