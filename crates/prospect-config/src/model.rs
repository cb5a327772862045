// SPDX-FileCopyrightText: 2026 Prospect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Prospect campaign engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Keys accepted in each config section, in file order.
///
/// Drives typo suggestions and the `PROSPECT_*` environment mapping.
pub const SCHEMA: &[(&str, &[&str])] = &[
    ("service", &["name", "log_level", "admin_id"]),
    ("storage", &["database_path", "wal_mode"]),
    (
        "queue",
        &[
            "max_attempts",
            "base_retry_delay_secs",
            "backoff_multiplier",
            "max_retry_delay_secs",
            "jitter_factor",
            "claim_lease_secs",
        ],
    ),
    (
        "dispatch",
        &[
            "poll_interval_ms",
            "batch_size",
            "default_rate_per_sec",
            "max_concurrent_campaigns",
            "max_in_flight_per_campaign",
            "send_timeout_secs",
            "shutdown_grace_secs",
        ],
    ),
    ("sync", &["default_country_code", "directory_csv"]),
    ("provider", &["webhook_url", "bearer_token", "timeout_secs"]),
    ("gateway", &["enabled", "host", "port", "bearer_token"]),
    ("outbox", &["poll_interval_ms", "batch_size", "max_attempts", "retention_days"]),
    ("unsubscribe", &["secret", "base_url", "max_age_days"]),
];

/// Top-level Prospect configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProspectConfig {
    /// Service identity and logging.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Message queue retry and lease settings.
    #[serde(default)]
    pub queue: QueueConfig,

    /// Dispatcher worker pool settings.
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Contact sync settings.
    #[serde(default)]
    pub sync: SyncConfig,

    /// Outbound send provider settings.
    #[serde(default)]
    pub provider: ProviderConfig,

    /// HTTP gateway settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Outbox relay settings.
    #[serde(default)]
    pub outbox: OutboxConfig,

    /// Signed unsubscribe links.
    #[serde(default)]
    pub unsubscribe: UnsubscribeConfig,
}

/// Service identity configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Display name used in logs and health output.
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Admin identity recorded in the audit log for CLI and scheduled actions.
    #[serde(default = "default_admin_id")]
    pub admin_id: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
            admin_id: default_admin_id(),
        }
    }
}

fn default_service_name() -> String {
    "prospect".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_admin_id() -> String {
    "system".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("prospect").join("prospect.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("prospect.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Message queue configuration: retry backoff and claim leases.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QueueConfig {
    /// Attempts before a transiently failing entry becomes terminally failed.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry.
    #[serde(default = "default_base_retry_delay_secs")]
    pub base_retry_delay_secs: u64,

    /// Factor applied to the delay for each further attempt.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Upper bound on any single retry delay.
    #[serde(default = "default_max_retry_delay_secs")]
    pub max_retry_delay_secs: u64,

    /// Random spread applied to each delay, as a fraction (0.0 disables jitter).
    #[serde(default)]
    pub jitter_factor: f64,

    /// How long an entry may stay in flight before it is reclaimed.
    #[serde(default = "default_claim_lease_secs")]
    pub claim_lease_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_retry_delay_secs: default_base_retry_delay_secs(),
            backoff_multiplier: default_backoff_multiplier(),
            max_retry_delay_secs: default_max_retry_delay_secs(),
            jitter_factor: 0.0,
            claim_lease_secs: default_claim_lease_secs(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_retry_delay_secs() -> u64 {
    30
}

fn default_backoff_multiplier() -> f64 {
    4.0
}

fn default_max_retry_delay_secs() -> u64 {
    3600
}

fn default_claim_lease_secs() -> u64 {
    600
}

/// Dispatcher worker pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DispatchConfig {
    /// Interval between dispatcher polls.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Maximum entries claimed per campaign per poll.
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// Send rate for campaigns without their own `rate_limit_per_sec`.
    #[serde(default = "default_rate_per_sec")]
    pub default_rate_per_sec: u32,

    /// Campaigns drained concurrently within one poll.
    #[serde(default = "default_max_concurrent_campaigns")]
    pub max_concurrent_campaigns: usize,

    /// Concurrent provider calls per campaign.
    #[serde(default = "default_max_in_flight_per_campaign")]
    pub max_in_flight_per_campaign: usize,

    /// Upper bound on a single provider call.
    #[serde(default = "default_send_timeout_secs")]
    pub send_timeout_secs: u64,

    /// Time allowed for in-flight sends to finish on shutdown.
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            batch_size: default_batch_size(),
            default_rate_per_sec: default_rate_per_sec(),
            max_concurrent_campaigns: default_max_concurrent_campaigns(),
            max_in_flight_per_campaign: default_max_in_flight_per_campaign(),
            send_timeout_secs: default_send_timeout_secs(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_batch_size() -> u32 {
    50
}

fn default_rate_per_sec() -> u32 {
    10
}

fn default_max_concurrent_campaigns() -> usize {
    4
}

fn default_max_in_flight_per_campaign() -> usize {
    8
}

fn default_send_timeout_secs() -> u64 {
    10
}

fn default_shutdown_grace_secs() -> u64 {
    30
}

/// Contact sync configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    /// Country calling code used to canonicalize national phone numbers.
    #[serde(default = "default_country_code")]
    pub default_country_code: String,

    /// CSV export of the provider directory. `None` disables directory sync.
    #[serde(default)]
    pub directory_csv: Option<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            default_country_code: default_country_code(),
            directory_csv: None,
        }
    }
}

fn default_country_code() -> String {
    "33".to_string()
}

/// Outbound send provider configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// HTTP endpoint that accepts outbound messages. `None` disables sending.
    #[serde(default)]
    pub webhook_url: Option<String>,

    /// Bearer token sent to the provider endpoint.
    #[serde(default)]
    pub bearer_token: Option<String>,

    /// HTTP request timeout.
    #[serde(default = "default_provider_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            bearer_token: None,
            timeout_secs: default_provider_timeout_secs(),
        }
    }
}

fn default_provider_timeout_secs() -> u64 {
    10
}

/// HTTP gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Whether the gateway is started by `prospect serve`.
    #[serde(default = "default_gateway_enabled")]
    pub enabled: bool,

    /// Host address to bind to.
    #[serde(default = "default_gateway_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bearer token required on `/v1` routes. Requests are rejected when unset.
    #[serde(default)]
    pub bearer_token: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: default_gateway_enabled(),
            host: default_gateway_host(),
            port: default_gateway_port(),
            bearer_token: None,
        }
    }
}

fn default_gateway_enabled() -> bool {
    true
}

fn default_gateway_host() -> String {
    "127.0.0.1".to_string()
}

fn default_gateway_port() -> u16 {
    3000
}

/// Outbox relay configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OutboxConfig {
    /// Interval between relay passes.
    #[serde(default = "default_outbox_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Events handled per pass.
    #[serde(default = "default_outbox_batch_size")]
    pub batch_size: u32,

    /// Handler attempts before an event is abandoned.
    #[serde(default = "default_outbox_max_attempts")]
    pub max_attempts: u32,

    /// Processed events older than this are deleted. 0 keeps them forever.
    #[serde(default = "default_outbox_retention_days")]
    pub retention_days: u32,
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_outbox_poll_interval_ms(),
            batch_size: default_outbox_batch_size(),
            max_attempts: default_outbox_max_attempts(),
            retention_days: default_outbox_retention_days(),
        }
    }
}

fn default_outbox_poll_interval_ms() -> u64 {
    2000
}

fn default_outbox_batch_size() -> u32 {
    100
}

fn default_outbox_max_attempts() -> u32 {
    5
}

fn default_outbox_retention_days() -> u32 {
    7
}

/// Signed unsubscribe link configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct UnsubscribeConfig {
    /// HMAC key for unsubscribe tokens. Without it, templates cannot use
    /// `{{unsubscribe_link}}`.
    #[serde(default)]
    pub secret: Option<String>,

    /// Public URL of the gateway; links point at `{base_url}/unsubscribe`.
    #[serde(default = "default_unsubscribe_base_url")]
    pub base_url: String,

    /// Token lifetime.
    #[serde(default = "default_unsubscribe_max_age_days")]
    pub max_age_days: u32,
}

impl Default for UnsubscribeConfig {
    fn default() -> Self {
        Self {
            secret: None,
            base_url: default_unsubscribe_base_url(),
            max_age_days: default_unsubscribe_max_age_days(),
        }
    }
}

fn default_unsubscribe_base_url() -> String {
    "http://127.0.0.1:3000".to_string()
}

fn default_unsubscribe_max_age_days() -> u32 {
    30
}
