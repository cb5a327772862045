// SPDX-FileCopyrightText: 2026 Prospect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `prospect campaign` subcommands.

use std::io::IsTerminal;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};
use prospect_analytics::DateRange;
use prospect_core::ProspectError;
use prospect_core::types::{Campaign, CampaignStatus, Channel, EventOutcome, NewCampaign};
use prospect_storage::queries::campaigns;

use crate::app::App;

#[derive(Subcommand, Debug)]
pub enum CampaignCommand {
    /// Create a draft campaign.
    Create(CreateArgs),
    /// Queue the target list and start sending.
    Start { id: String },
    /// Stop claiming new sends; in-flight sends finish.
    Pause { id: String },
    /// Resume a paused campaign.
    Resume { id: String },
    /// Cancel a campaign; pending sends are skipped.
    Cancel { id: String },
    /// Delivery and engagement statistics from the event log.
    Stats { id: String },
    /// Live queue depth by entry state.
    Queue { id: String },
    /// List campaigns, optionally by status.
    List {
        #[arg(long, value_parser = parse_status)]
        status: Option<CampaignStatus>,
        /// Disable colored output.
        #[arg(long)]
        plain: bool,
    },
    /// Totals and per-channel performance across all campaigns.
    Overview {
        /// Inclusive lower bound (RFC 3339).
        #[arg(long, value_parser = parse_time)]
        from: Option<DateTime<Utc>>,
        /// Exclusive upper bound (RFC 3339).
        #[arg(long, value_parser = parse_time)]
        to: Option<DateTime<Utc>>,
    },
    /// Record a provider callback (delivered, opened, replied, bounced) for a sent entry.
    Event {
        entry_id: i64,
        #[arg(value_parser = parse_outcome)]
        outcome: EventOutcome,
        /// Raw provider payload to keep with the event.
        #[arg(long)]
        response: Option<String>,
    },
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    #[arg(long)]
    pub name: String,
    #[arg(long, value_parser = parse_channel)]
    pub channel: Channel,
    /// Target contact list id.
    #[arg(long)]
    pub list: Option<String>,
    #[arg(long)]
    pub subject: Option<String>,
    /// Message body template, e.g. "Hello {{contact_name}}".
    #[arg(long, conflicts_with = "body_file")]
    pub body: Option<String>,
    /// Read the body template from a file.
    #[arg(long)]
    pub body_file: Option<PathBuf>,
    /// Sends per second for this campaign.
    #[arg(long)]
    pub rate: Option<u32>,
}

fn parse_channel(s: &str) -> Result<Channel, String> {
    s.parse()
        .map_err(|_| format!("unknown channel `{s}` (expected email, sms or whatsapp)"))
}

fn parse_status(s: &str) -> Result<CampaignStatus, String> {
    s.parse().map_err(|_| format!("unknown campaign status `{s}`"))
}

fn parse_outcome(s: &str) -> Result<EventOutcome, String> {
    s.parse().map_err(|_| format!("unknown outcome `{s}`"))
}

fn parse_time(s: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("invalid RFC 3339 timestamp `{s}`: {e}"))
}

pub async fn run(app: &App, command: CampaignCommand) -> Result<(), ProspectError> {
    let admin = app.admin();
    match command {
        CampaignCommand::Create(args) => {
            let body_template = match (args.body, args.body_file) {
                (Some(body), _) => body,
                (None, Some(path)) => tokio::fs::read_to_string(&path).await.map_err(|e| {
                    ProspectError::Validation(format!("cannot read {}: {e}", path.display()))
                })?,
                (None, None) => {
                    return Err(ProspectError::Validation(
                        "one of --body or --body-file is required".to_string(),
                    ));
                }
            };
            let campaign = app
                .control
                .create_campaign(
                    &admin,
                    &NewCampaign {
                        name: args.name,
                        channel: args.channel,
                        list_id: args.list,
                        subject_template: args.subject,
                        body_template,
                        rate_limit_per_sec: args.rate,
                    },
                )
                .await?;
            print_json(&campaign)
        }
        CampaignCommand::Start { id } => {
            let report = app.control.start_campaign(&admin, &id).await?;
            println!(
                "campaign {} is {} (enqueued {}, already queued {}, opted out {}, missing {})",
                report.campaign.id,
                report.campaign.status,
                report.enqueue.enqueued,
                report.enqueue.already_queued,
                report.enqueue.opted_out,
                report.enqueue.missing,
            );
            Ok(())
        }
        CampaignCommand::Pause { id } => {
            let campaign = app.control.pause_campaign(&admin, &id).await?;
            println!("campaign {} is {}", campaign.id, campaign.status);
            Ok(())
        }
        CampaignCommand::Resume { id } => {
            let campaign = app.control.resume_campaign(&admin, &id).await?;
            println!("campaign {} is {}", campaign.id, campaign.status);
            Ok(())
        }
        CampaignCommand::Cancel { id } => {
            let outcome = app.control.cancel_campaign(&admin, &id).await?;
            println!(
                "campaign {} is {} ({} pending sends skipped)",
                outcome.campaign.id, outcome.campaign.status, outcome.skipped
            );
            Ok(())
        }
        CampaignCommand::Stats { id } => print_json(&app.analytics.campaign_stats(&id).await?),
        CampaignCommand::Queue { id } => print_json(&app.analytics.queue_stats(&id).await?),
        CampaignCommand::List { status, plain } => {
            let list = campaigns::list_campaigns(&app.db, status).await?;
            let color = !plain && std::io::stdout().is_terminal();
            for campaign in &list {
                println!("{}", format_row(campaign, color));
            }
            if list.is_empty() {
                println!("no campaigns");
            }
            Ok(())
        }
        CampaignCommand::Overview { from, to } => {
            let range = DateRange::new(from, to)?;
            print_json(&serde_json::json!({
                "overview": app.analytics.overview_stats(range).await?,
                "channels": app.analytics.channel_performance(range).await?,
            }))
        }
        CampaignCommand::Event {
            entry_id,
            outcome,
            response,
        } => {
            let event = app
                .analytics
                .record_engagement(entry_id, outcome, response.as_deref())
                .await?;
            print_json(&event)
        }
    }
}

fn format_row(campaign: &Campaign, color: bool) -> String {
    let status = format!("{:<9}", campaign.status.to_string());
    let status = if color {
        use colored::Colorize;
        match campaign.status {
            CampaignStatus::Sending => status.green().to_string(),
            CampaignStatus::Paused => status.yellow().to_string(),
            CampaignStatus::Failed => status.red().to_string(),
            CampaignStatus::Completed | CampaignStatus::Cancelled => status.dimmed().to_string(),
            CampaignStatus::Draft => status,
        }
    } else {
        status
    };
    format!(
        "{}  {status}  {:<8}  {}",
        campaign.id, campaign.channel, campaign.name
    )
}

pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> Result<(), ProspectError> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|e| ProspectError::Internal(format!("failed to render JSON: {e}")))?;
    println!("{rendered}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_channel_and_status_names() {
        assert_eq!(parse_channel("whatsapp").unwrap(), Channel::Whatsapp);
        assert!(parse_channel("fax").unwrap_err().contains("fax"));
        assert_eq!(parse_status("paused").unwrap(), CampaignStatus::Paused);
        assert_eq!(parse_outcome("replied").unwrap(), EventOutcome::Replied);
    }

    #[test]
    fn parses_rfc3339_bounds() {
        let t = parse_time("2026-03-01T08:00:00+01:00").unwrap();
        assert_eq!(t.to_rfc3339(), "2026-03-01T07:00:00+00:00");
        assert!(parse_time("yesterday").is_err());
    }

    #[test]
    fn plain_rows_have_no_escape_codes() {
        let campaign = Campaign {
            id: "c1".into(),
            name: "Spring".into(),
            channel: Channel::Sms,
            list_id: None,
            subject_template: None,
            body_template: "hi".into(),
            status: CampaignStatus::Paused,
            rate_limit_per_sec: None,
            version: 2,
            created_at: "2026-03-01T07:00:00.000Z".into(),
            started_at: None,
            paused_at: None,
            completed_at: None,
        };
        let row = format_row(&campaign, false);
        assert!(row.contains("paused"));
        assert!(row.contains("Spring"));
        assert!(!row.contains('\u{1b}'));
    }
}
