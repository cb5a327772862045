// SPDX-FileCopyrightText: 2026 Prospect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Prospect configuration system.

use std::io::Write;

use prospect_config::diagnostic::ConfigError;
use prospect_config::model::ProspectConfig;
use prospect_config::{load_and_validate_path, load_and_validate_str, load_config_from_str};

/// Valid TOML with all known sections deserializes successfully.
#[test]
fn valid_toml_deserializes_into_prospect_config() {
    let toml = r#"
[service]
name = "prospect-test"
log_level = "debug"
admin_id = "admin-1"

[storage]
database_path = "/tmp/prospect-test.db"
wal_mode = false

[queue]
max_attempts = 5
base_retry_delay_secs = 10
backoff_multiplier = 2.0
max_retry_delay_secs = 600
jitter_factor = 0.1
claim_lease_secs = 300

[dispatch]
poll_interval_ms = 250
batch_size = 20
default_rate_per_sec = 80
max_concurrent_campaigns = 2
max_in_flight_per_campaign = 4
send_timeout_secs = 5
shutdown_grace_secs = 10

[sync]
default_country_code = "32"
directory_csv = "/srv/artisans.csv"

[provider]
webhook_url = "https://sender.example.com/v1/messages"
bearer_token = "tok"
timeout_secs = 3

[gateway]
enabled = false
host = "0.0.0.0"
port = 8080
bearer_token = "secret"

[outbox]
poll_interval_ms = 500
batch_size = 10
max_attempts = 2
retention_days = 14

[unsubscribe]
secret = "0123456789abcdef0123"
base_url = "https://prospect.example.com"
max_age_days = 10
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.service.name, "prospect-test");
    assert_eq!(config.service.admin_id, "admin-1");
    assert_eq!(config.storage.database_path, "/tmp/prospect-test.db");
    assert!(!config.storage.wal_mode);
    assert_eq!(config.queue.max_attempts, 5);
    assert_eq!(config.queue.backoff_multiplier, 2.0);
    assert_eq!(config.dispatch.default_rate_per_sec, 80);
    assert_eq!(config.dispatch.max_in_flight_per_campaign, 4);
    assert_eq!(config.sync.default_country_code, "32");
    assert_eq!(config.sync.directory_csv.as_deref(), Some("/srv/artisans.csv"));
    assert_eq!(
        config.provider.webhook_url.as_deref(),
        Some("https://sender.example.com/v1/messages")
    );
    assert!(!config.gateway.enabled);
    assert_eq!(config.gateway.port, 8080);
    assert_eq!(config.outbox.max_attempts, 2);
    assert_eq!(config.outbox.retention_days, 14);
    assert_eq!(config.unsubscribe.base_url, "https://prospect.example.com");
    assert_eq!(config.unsubscribe.max_age_days, 10);
}

/// An empty document yields the compiled defaults.
#[test]
fn empty_toml_uses_defaults() {
    let config = load_config_from_str("").expect("empty config is valid");
    assert_eq!(config.queue.max_attempts, 3);
    assert_eq!(config.queue.base_retry_delay_secs, 30);
    assert_eq!(config.queue.backoff_multiplier, 4.0);
    assert_eq!(config.queue.jitter_factor, 0.0);
    assert_eq!(config.dispatch.batch_size, 50);
    assert_eq!(config.sync.default_country_code, "33");
    assert!(config.provider.webhook_url.is_none());
    assert!(config.gateway.bearer_token.is_none());
}

/// Unknown field in a section produces an UnknownKey diagnostic with a suggestion.
#[test]
fn unknown_field_produces_suggestion() {
    let toml = r#"
[dispatch]
batch_sise = 10
"#;

    let errors = load_and_validate_str(toml).expect_err("should reject unknown field");
    let suggestion = errors.iter().find_map(|e| match e {
        ConfigError::UnknownKey {
            key, suggestion, ..
        } if key == "dispatch.batch_sise" => suggestion.clone(),
        _ => None,
    });
    assert_eq!(suggestion.as_deref(), Some("dispatch.batch_size"));
}

/// A key written under the wrong section points at the section that owns it.
#[test]
fn misplaced_key_names_its_section_and_env_var() {
    let toml = r#"
[queue]
max_in_flight_per_campaign = 2
"#;

    let errors = load_and_validate_str(toml).expect_err("key belongs to [dispatch]");
    let error = errors
        .iter()
        .find(|e| matches!(e, ConfigError::UnknownKey { .. }))
        .expect("unknown key diagnostic");
    match error {
        ConfigError::UnknownKey {
            key,
            suggestion,
            span,
            ..
        } => {
            assert_eq!(key, "queue.max_in_flight_per_campaign");
            assert_eq!(
                suggestion.as_deref(),
                Some("dispatch.max_in_flight_per_campaign")
            );
            if let Some(span) = span {
                assert_eq!(&toml[span.offset()..span.offset() + 10], "max_in_fli");
            }
        }
        _ => unreachable!(),
    }
    let help = miette::Diagnostic::help(error)
        .map(|h| h.to_string())
        .unwrap_or_default();
    assert!(help.contains("PROSPECT_DISPATCH_MAX_IN_FLIGHT_PER_CAMPAIGN"), "{help}");
}

/// Every key the schema lists is accepted by the config structs.
#[test]
fn schema_lists_only_accepted_keys() {
    let defaults = toml::Value::try_from(ProspectConfig::default()).expect("serializes");
    for (section, keys) in prospect_config::model::SCHEMA {
        let table = defaults
            .get(section)
            .and_then(|v| v.as_table())
            .unwrap_or_else(|| panic!("section [{section}] missing from defaults"));
        for key in *keys {
            let value = match table.get(*key) {
                Some(value) => value.clone(),
                // Optional keys serialize as absent; a string fits all of them.
                None => toml::Value::String("https://value.example.com/0123456789".into()),
            };
            let doc = format!("[{section}]\n{key} = {value}\n");
            load_config_from_str(&doc).unwrap_or_else(|e| panic!("{section}.{key}: {e}"));
        }
    }
}

/// Unknown top-level section is rejected.
#[test]
fn unknown_section_is_rejected() {
    let toml = r#"
[telemetry]
enabled = true
"#;
    assert!(load_config_from_str(toml).is_err());
    let errors = load_and_validate_str(toml).expect_err("unknown section");
    assert!(errors.iter().any(|e| matches!(
        e,
        ConfigError::UnknownSection { section, .. } if section == "telemetry"
    )));
}

/// Wrong value type produces an InvalidType diagnostic naming the key.
#[test]
fn wrong_type_produces_invalid_type() {
    let toml = r#"
[gateway]
port = "eighty"
"#;
    let errors = load_and_validate_str(toml).expect_err("should reject string port");
    assert!(errors.iter().any(|e| matches!(
        e,
        ConfigError::InvalidType { key, .. } if key.contains("port")
    )));
}

/// Semantic validation runs after a successful parse.
#[test]
fn semantic_errors_surface_from_load_and_validate() {
    let toml = r#"
[queue]
backoff_multiplier = 0.5
"#;
    let errors = load_and_validate_str(toml).expect_err("multiplier below 1 is invalid");
    assert!(
        errors
            .iter()
            .any(|e| e.to_string().contains("backoff_multiplier"))
    );
}

/// Default config round-trips through TOML serialization.
#[test]
fn default_config_serializes_to_toml() {
    let config = ProspectConfig::default();
    let rendered = toml::to_string(&config).expect("serializes");
    let parsed = load_config_from_str(&rendered).expect("parses back");
    assert_eq!(parsed.dispatch.batch_size, config.dispatch.batch_size);
    assert_eq!(parsed.storage.database_path, config.storage.database_path);
}

/// A config file on disk is loaded and validated.
#[test]
#[serial_test::serial]
fn loads_file_from_path() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(file, "[dispatch]\nbatch_size = 7").expect("write");
    let config = load_and_validate_path(file.path()).expect("valid file");
    assert_eq!(config.dispatch.batch_size, 7);
}

/// Environment variables override file values.
#[test]
#[serial_test::serial]
fn env_overrides_file_values() {
    figment::Jail::expect_with(|jail| {
        jail.create_file("prospect.toml", "[queue]\nmax_attempts = 4\n")?;
        jail.set_env("PROSPECT_QUEUE_MAX_ATTEMPTS", "6");
        jail.set_env("PROSPECT_GATEWAY_BEARER_TOKEN", "from-env");
        let config = prospect_config::load_config_from_path(std::path::Path::new("prospect.toml"))?;
        assert_eq!(config.queue.max_attempts, 6);
        assert_eq!(config.gateway.bearer_token.as_deref(), Some("from-env"));
        Ok(())
    });
}
