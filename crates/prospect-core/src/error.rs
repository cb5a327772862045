// SPDX-FileCopyrightText: 2026 Prospect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Prospect campaign engine.

use thiserror::Error;

/// The primary error type used across all Prospect crates and adapter traits.
#[derive(Debug, Error)]
pub enum ProspectError {
    /// Bad identifiers or malformed input. Surfaced to callers as 4xx, never retried.
    #[error("validation error: {0}")]
    Validation(String),

    /// A campaign, contact, or queue entry does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The requested transition is not allowed from the current state.
    /// Rejected with no partial effect.
    #[error("state conflict: {0}")]
    StateConflict(String),

    /// Provider timeout, 5xx, or rate-limit response. Retried per backoff policy.
    #[error("transient send failure: {message}")]
    TransientSend { message: String },

    /// Invalid target or opted-out recipient. Terminal on first attempt.
    #[error("permanent send failure: {message}")]
    PermanentSend { message: String },

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Send provider or directory errors that are not classified yet.
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ProspectError {
    /// Shorthand for a [`ProspectError::NotFound`].
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Whether a failed send attempt with this error should be rescheduled.
    ///
    /// Unclassified provider and storage failures count as transient: the
    /// retry ceiling still bounds them.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::TransientSend { .. }
            | Self::Timeout { .. }
            | Self::Provider { .. }
            | Self::Storage { .. } => true,
            Self::PermanentSend { .. }
            | Self::Validation(_)
            | Self::NotFound { .. }
            | Self::StateConflict(_)
            | Self::Config(_)
            | Self::Internal(_) => false,
        }
    }

    /// HTTP status code used by the gateway when this error reaches a caller.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::NotFound { .. } => 404,
            Self::StateConflict(_) => 409,
            Self::TransientSend { .. } | Self::PermanentSend { .. } | Self::Provider { .. } => 502,
            Self::Timeout { .. } => 504,
            Self::Storage { .. } | Self::Config(_) | Self::Internal(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn only_transient_kinds_are_retryable() {
        assert!(
            ProspectError::TransientSend {
                message: "503".into()
            }
            .is_retryable()
        );
        assert!(
            ProspectError::Timeout {
                duration: Duration::from_secs(10)
            }
            .is_retryable()
        );
        assert!(
            !ProspectError::PermanentSend {
                message: "invalid address".into()
            }
            .is_retryable()
        );
        assert!(!ProspectError::Validation("bad id".into()).is_retryable());
        assert!(!ProspectError::StateConflict("draft".into()).is_retryable());
    }

    #[test]
    fn http_status_follows_taxonomy() {
        assert_eq!(ProspectError::Validation("x".into()).http_status(), 400);
        assert_eq!(ProspectError::not_found("campaign", "c1").http_status(), 404);
        assert_eq!(ProspectError::StateConflict("x".into()).http_status(), 409);
        assert_eq!(ProspectError::Internal("x".into()).http_status(), 500);
    }

    #[test]
    fn not_found_message_names_entity() {
        let err = ProspectError::not_found("campaign", "camp-42");
        assert_eq!(err.to_string(), "campaign not found: camp-42");
    }
}
