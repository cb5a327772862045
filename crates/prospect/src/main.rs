// SPDX-FileCopyrightText: 2026 Prospect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prospect - outbound prospection campaign engine.
//!
//! This is the binary entry point: the long-running `serve` daemon plus
//! one-shot admin commands that share its storage.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod app;
mod campaign;
mod contacts;
mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use prospect_config::ProspectConfig;
use prospect_core::ProspectError;

use crate::app::App;

/// Prospect - outbound prospection campaign engine.
#[derive(Parser, Debug)]
#[command(name = "prospect", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the dispatcher, outbox relay and HTTP gateway.
    Serve,
    /// Create and control campaigns, and read their statistics.
    #[command(subcommand)]
    Campaign(campaign::CampaignCommand),
    /// Sync, import and opt out contacts.
    #[command(subcommand)]
    Contacts(contacts::ContactsCommand),
    /// Manage contact lists.
    #[command(subcommand)]
    Lists(contacts::ListsCommand),
    /// Inspect configuration.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate configuration and exit.
    Check,
    /// Print the effective configuration with secrets redacted.
    Show,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => prospect_config::load_and_validate_path(path),
        None => prospect_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            prospect_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(cli.command, config).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run(command: Option<Commands>, config: ProspectConfig) -> Result<(), ProspectError> {
    match command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::Config(ConfigCommand::Check)) => {
            println!(
                "prospect: config OK (service.name={}, database={})",
                config.service.name, config.storage.database_path
            );
            Ok(())
        }
        Some(Commands::Config(ConfigCommand::Show)) => {
            println!("{}", render_config(&config)?);
            Ok(())
        }
        Some(Commands::Campaign(cmd)) => {
            let app = open(config).await?;
            let result = campaign::run(&app, cmd).await;
            app.close().await?;
            result
        }
        Some(Commands::Contacts(cmd)) => {
            let app = open(config).await?;
            let result = contacts::run(&app, cmd).await;
            app.close().await?;
            result
        }
        Some(Commands::Lists(cmd)) => {
            let app = open(config).await?;
            let result = contacts::run_lists(&app, cmd).await;
            app.close().await?;
            result
        }
        None => {
            println!("prospect: use --help for available commands");
            Ok(())
        }
    }
}

async fn open(config: ProspectConfig) -> Result<App, ProspectError> {
    serve::init_tracing(&config.service.log_level);
    App::open(config).await
}

/// TOML rendering of `config` with every token replaced.
fn render_config(config: &ProspectConfig) -> Result<String, ProspectError> {
    let mut redacted = config.clone();
    let mask = |token: &mut Option<String>| {
        if token.is_some() {
            *token = Some("[REDACTED]".to_string());
        }
    };
    mask(&mut redacted.provider.bearer_token);
    mask(&mut redacted.gateway.bearer_token);
    mask(&mut redacted.unsubscribe.secret);
    toml::to_string_pretty(&redacted)
        .map_err(|e| ProspectError::Internal(format!("failed to render config: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        // Only jemalloc supports advancing the epoch.
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    fn binary_loads_config_defaults() {
        let config = prospect_config::load_and_validate_str("")
            .expect("default config should be valid");
        assert_eq!(config.service.name, "prospect");
    }

    #[test]
    fn shown_config_redacts_tokens() {
        let mut config = ProspectConfig::default();
        config.gateway.bearer_token = Some("gw-secret".to_string());
        config.provider.bearer_token = Some("provider-secret".to_string());
        config.unsubscribe.secret = Some("link-signing-secret".to_string());
        let rendered = render_config(&config).unwrap();
        for value in ["gw-secret", "provider-secret", "link-signing-secret"] {
            assert!(!rendered.contains(value), "{value} leaked");
        }
        assert!(rendered.contains("[REDACTED]"));
        assert!(rendered.contains("[dispatch]"));
    }

    #[test]
    fn cli_parses_nested_subcommands() {
        let cli = Cli::try_parse_from([
            "prospect",
            "--config",
            "/tmp/p.toml",
            "campaign",
            "pause",
            "c-1",
        ])
        .unwrap();
        assert_eq!(cli.config.as_deref(), Some(std::path::Path::new("/tmp/p.toml")));
        assert!(matches!(
            cli.command,
            Some(Commands::Campaign(campaign::CampaignCommand::Pause { ref id })) if id == "c-1"
        ));

        let cli =
            Cli::try_parse_from(["prospect", "contacts", "sync", "--department", "69"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Contacts(contacts::ContactsCommand::Sync { department: Some(ref d) })) if d == "69"
        ));

        let cli = Cli::try_parse_from(["prospect", "contacts", "unsubscribe", "abc.def"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Contacts(contacts::ContactsCommand::Unsubscribe { ref token })) if token == "abc.def"
        ));
    }

    #[test]
    fn create_rejects_body_and_body_file_together() {
        let parsed = Cli::try_parse_from([
            "prospect", "campaign", "create", "--name", "x", "--channel", "sms", "--body", "hi",
            "--body-file", "b.txt",
        ]);
        assert!(parsed.is_err());
    }
}
