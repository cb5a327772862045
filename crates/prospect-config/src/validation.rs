// SPDX-FileCopyrightText: 2026 Prospect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks semantic constraints that serde attributes cannot express: positive
//! rates and batch sizes, a sane retry curve, parseable URLs and addresses.

use crate::diagnostic::ConfigError;
use crate::model::ProspectConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &ProspectConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if !LOG_LEVELS.contains(&config.service.log_level.as_str()) {
        fail(format!(
            "service.log_level must be one of {}, got `{}`",
            LOG_LEVELS.join(", "),
            config.service.log_level
        ));
    }

    if config.service.admin_id.trim().is_empty() {
        fail("service.admin_id must not be empty".to_string());
    }

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }

    // Retry curve
    let queue = &config.queue;
    if queue.max_attempts == 0 {
        fail("queue.max_attempts must be at least 1".to_string());
    }
    if queue.backoff_multiplier < 1.0 {
        fail(format!(
            "queue.backoff_multiplier must be at least 1.0, got {}",
            queue.backoff_multiplier
        ));
    }
    if queue.max_retry_delay_secs < queue.base_retry_delay_secs {
        fail(format!(
            "queue.max_retry_delay_secs ({}) must not be below queue.base_retry_delay_secs ({})",
            queue.max_retry_delay_secs, queue.base_retry_delay_secs
        ));
    }
    if !(0.0..=1.0).contains(&queue.jitter_factor) {
        fail(format!(
            "queue.jitter_factor must be between 0.0 and 1.0, got {}",
            queue.jitter_factor
        ));
    }
    if queue.claim_lease_secs == 0 {
        fail("queue.claim_lease_secs must be positive".to_string());
    }

    let dispatch = &config.dispatch;
    if dispatch.batch_size == 0 {
        fail("dispatch.batch_size must be at least 1".to_string());
    }
    if dispatch.default_rate_per_sec == 0 {
        fail("dispatch.default_rate_per_sec must be at least 1".to_string());
    }
    if dispatch.max_concurrent_campaigns == 0 {
        fail("dispatch.max_concurrent_campaigns must be at least 1".to_string());
    }
    if dispatch.max_in_flight_per_campaign == 0 {
        fail("dispatch.max_in_flight_per_campaign must be at least 1".to_string());
    }
    if dispatch.send_timeout_secs == 0 {
        fail("dispatch.send_timeout_secs must be positive".to_string());
    }
    // The dispatcher renews the lease before each send, so one send (not a
    // whole buffered batch) has to fit inside it.
    if dispatch.send_timeout_secs >= queue.claim_lease_secs {
        fail(format!(
            "dispatch.send_timeout_secs ({}) must be shorter than queue.claim_lease_secs ({})",
            dispatch.send_timeout_secs, queue.claim_lease_secs
        ));
    }

    let cc = &config.sync.default_country_code;
    if cc.is_empty() || cc.len() > 3 || !cc.chars().all(|c| c.is_ascii_digit()) {
        fail(format!(
            "sync.default_country_code must be 1-3 digits without `+`, got `{cc}`"
        ));
    }

    if let Some(url) = &config.provider.webhook_url
        && !(url.starts_with("http://") || url.starts_with("https://"))
    {
        fail(format!(
            "provider.webhook_url must start with http:// or https://, got `{url}`"
        ));
    }

    let host = config.gateway.host.trim();
    if host.is_empty() {
        fail("gateway.host must not be empty".to_string());
    } else {
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-');
        if !is_valid_ip && !is_valid_hostname {
            fail(format!(
                "gateway.host `{host}` is not a valid IP address or hostname"
            ));
        }
    }

    if config.outbox.batch_size == 0 {
        fail("outbox.batch_size must be at least 1".to_string());
    }
    if config.outbox.max_attempts == 0 {
        fail("outbox.max_attempts must be at least 1".to_string());
    }

    let unsubscribe = &config.unsubscribe;
    if unsubscribe.secret.as_deref().is_some_and(|s| s.len() < 16) {
        fail("unsubscribe.secret must be at least 16 bytes".to_string());
    }
    if unsubscribe.max_age_days == 0 {
        fail("unsubscribe.max_age_days must be at least 1".to_string());
    }
    let base = &unsubscribe.base_url;
    if !(base.starts_with("http://") || base.starts_with("https://")) {
        fail(format!(
            "unsubscribe.base_url must start with http:// or https://, got `{base}`"
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messages(config: &ProspectConfig) -> Vec<String> {
        validate_config(config)
            .unwrap_err()
            .into_iter()
            .map(|e| e.to_string())
            .collect()
    }

    #[test]
    fn default_config_validates() {
        let config = ProspectConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn empty_database_path_fails_validation() {
        let mut config = ProspectConfig::default();
        config.storage.database_path = "".to_string();
        assert!(messages(&config).iter().any(|m| m.contains("database_path")));
    }

    #[test]
    fn zero_rate_fails_validation() {
        let mut config = ProspectConfig::default();
        config.dispatch.default_rate_per_sec = 0;
        assert!(
            messages(&config)
                .iter()
                .any(|m| m.contains("default_rate_per_sec"))
        );
    }

    #[test]
    fn send_timeout_must_fit_inside_lease() {
        let mut config = ProspectConfig::default();
        config.queue.claim_lease_secs = 5;
        config.dispatch.send_timeout_secs = 10;
        assert!(messages(&config).iter().any(|m| m.contains("claim_lease_secs")));
    }

    #[test]
    fn collects_every_error() {
        let mut config = ProspectConfig::default();
        config.queue.max_attempts = 0;
        config.dispatch.batch_size = 0;
        config.service.log_level = "loud".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn short_unsubscribe_secret_and_bad_base_url_fail() {
        let mut config = ProspectConfig::default();
        config.unsubscribe.secret = Some("short".to_string());
        config.unsubscribe.base_url = "example.com".to_string();
        config.unsubscribe.max_age_days = 0;
        let msgs = messages(&config);
        assert_eq!(msgs.len(), 3, "{msgs:?}");
        assert!(msgs.iter().all(|m| m.contains("unsubscribe.")));
    }

    #[test]
    fn bad_country_code_and_url_fail() {
        let mut config = ProspectConfig::default();
        config.sync.default_country_code = "+33".to_string();
        config.provider.webhook_url = Some("ftp://example.com".to_string());
        let msgs = messages(&config);
        assert!(msgs.iter().any(|m| m.contains("default_country_code")));
        assert!(msgs.iter().any(|m| m.contains("webhook_url")));
    }

    #[test]
    fn unknown_queue_key_is_rejected() {
        let toml_str = r#"
[queue]
max_attempts = 3
retry_forever = true
"#;
        assert!(toml::from_str::<ProspectConfig>(toml_str).is_err());
    }
}
