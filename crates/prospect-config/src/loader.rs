// SPDX-FileCopyrightText: 2026 Prospect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./prospect.toml` > `~/.config/prospect/prospect.toml` > `/etc/prospect/prospect.toml`
//! with environment variable overrides via `PROSPECT_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::{ProspectConfig, SCHEMA};

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/prospect/prospect.toml` (system-wide)
/// 3. `~/.config/prospect/prospect.toml` (user XDG config)
/// 4. `./prospect.toml` (local directory)
/// 5. `PROSPECT_*` environment variables
pub fn load_config() -> Result<ProspectConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and for an explicit `--config` file.
pub fn load_config_from_str(toml_content: &str) -> Result<ProspectConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ProspectConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<ProspectConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ProspectConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading (exposed for diagnostic use).
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(ProspectConfig::default()))
        .merge(Toml::file("/etc/prospect/prospect.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("prospect/prospect.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("prospect.toml"))
        .merge(env_provider())
}

/// Create the environment variable provider using explicit `map()` for section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` because key names contain
/// underscores: `PROSPECT_QUEUE_MAX_ATTEMPTS` must map to `queue.max_attempts`.
fn env_provider() -> Env {
    Env::prefixed("PROSPECT_").map(|key| map_env_key(key.as_str()).into())
}

/// Map a lowercased, prefix-stripped env var name to its dotted config path.
pub(crate) fn map_env_key(key: &str) -> String {
    for (section, _) in SCHEMA {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|r| r.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_map_to_sections() {
        assert_eq!(map_env_key("queue_max_attempts"), "queue.max_attempts");
        assert_eq!(
            map_env_key("dispatch_max_in_flight_per_campaign"),
            "dispatch.max_in_flight_per_campaign"
        );
        assert_eq!(map_env_key("gateway_bearer_token"), "gateway.bearer_token");
        assert_eq!(map_env_key("unsubscribe_secret"), "unsubscribe.secret");
    }

    #[test]
    fn unknown_prefix_is_left_alone() {
        assert_eq!(map_env_key("verbose"), "verbose");
    }
}
