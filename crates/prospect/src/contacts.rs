// SPDX-FileCopyrightText: 2026 Prospect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `prospect contacts` and `prospect lists` subcommands.

use std::path::PathBuf;

use clap::Subcommand;
use prospect_core::ProspectError;
use prospect_core::types::{Contact, SyncFilter};
use prospect_storage::queries::{contacts, lists};
use prospect_sync::{ContactField, csv_headers, suggest_mapping};

use crate::app::App;
use crate::campaign::print_json;

#[derive(Subcommand, Debug)]
pub enum ContactsCommand {
    /// Reconcile contacts with the provider directory.
    Sync {
        /// Only sync this department.
        #[arg(long)]
        department: Option<String>,
    },
    /// Import contacts from a CSV file; columns are mapped from header names.
    Import {
        file: PathBuf,
        /// Show the column mapping without importing.
        #[arg(long)]
        dry_run: bool,
    },
    /// Opt a contact out of all future campaigns.
    OptOut { id: String },
    /// Apply a signed unsubscribe token, as the /unsubscribe link does.
    Unsubscribe { token: String },
    /// List contacts, optionally in one department.
    List {
        #[arg(long)]
        department: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ListsCommand {
    /// Create a contact list, filled with the contacts of a department.
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: Option<String>,
        /// Add every reachable contact of this department.
        #[arg(long)]
        department: Option<String>,
    },
    /// Add contacts to a list by id.
    Add {
        list_id: String,
        #[arg(required = true)]
        contact_ids: Vec<String>,
    },
}

pub async fn run(app: &App, command: ContactsCommand) -> Result<(), ProspectError> {
    let admin = app.admin();
    match command {
        ContactsCommand::Sync { department } => {
            let report = app.sync.sync(&admin, SyncFilter { department }).await?;
            print_json(&report)
        }
        ContactsCommand::Import { file, dry_run } => {
            let content = tokio::fs::read_to_string(&file).await.map_err(|e| {
                ProspectError::Validation(format!("cannot read {}: {e}", file.display()))
            })?;
            let mapping = suggest_mapping(&csv_headers(&content)?);
            for (header, field) in &mapping {
                println!("  {header:<24} -> {}", field_name(*field));
            }
            if dry_run {
                return Ok(());
            }
            let report = app.sync.import_csv(&admin, &content, &mapping).await?;
            print_json(&report)
        }
        ContactsCommand::OptOut { id } => {
            let contact = app.sync.set_opt_out(&admin, &id).await?;
            println!(
                "contact {} opted out at {}",
                contact.id,
                contact.opted_out_at.as_deref().unwrap_or("-")
            );
            Ok(())
        }
        ContactsCommand::Unsubscribe { token } => {
            let contact = app.sync.unsubscribe(&token).await?;
            println!(
                "contact {} unsubscribed at {}",
                contact.id,
                contact.opted_out_at.as_deref().unwrap_or("-")
            );
            Ok(())
        }
        ContactsCommand::List { department } => {
            let all = contacts::list_contacts(&app.db, department.as_deref()).await?;
            for contact in &all {
                println!("{}", format_contact(contact));
            }
            println!("{} contacts", all.len());
            Ok(())
        }
    }
}

pub async fn run_lists(app: &App, command: ListsCommand) -> Result<(), ProspectError> {
    match command {
        ListsCommand::Create {
            name,
            description,
            department,
        } => {
            let list = lists::create_list(&app.db, &name, description.as_deref()).await?;
            let added = match department {
                Some(dept) => {
                    let ids: Vec<String> = contacts::list_contacts(&app.db, Some(&dept))
                        .await?
                        .into_iter()
                        .filter(|c| !c.opt_out)
                        .map(|c| c.id)
                        .collect();
                    lists::add_members(&app.db, &list.id, &ids).await?
                }
                None => 0,
            };
            println!("list {} created with {added} members", list.id);
            Ok(())
        }
        ListsCommand::Add {
            list_id,
            contact_ids,
        } => {
            if lists::get_list(&app.db, &list_id).await?.is_none() {
                return Err(ProspectError::not_found("contact list", list_id));
            }
            let added = lists::add_members(&app.db, &list_id, &contact_ids).await?;
            println!("{added} members added to {list_id}");
            Ok(())
        }
    }
}

fn field_name(field: ContactField) -> &'static str {
    match field {
        ContactField::DisplayName => "display_name",
        ContactField::CompanyName => "company_name",
        ContactField::Email => "email",
        ContactField::Phone => "phone",
        ContactField::Department => "department",
        ContactField::City => "city",
        ContactField::ExternalId => "external_id",
    }
}

fn format_contact(contact: &Contact) -> String {
    let name = contact
        .company_name
        .as_deref()
        .or(contact.display_name.as_deref())
        .unwrap_or("-");
    format!(
        "{}  {:<30}  {:<32}  {:<16}  {:<4}{}",
        contact.id,
        name,
        contact.email.as_deref().unwrap_or("-"),
        contact.phone.as_deref().unwrap_or("-"),
        contact.department.as_deref().unwrap_or("-"),
        if contact.opt_out { "  opted out" } else { "" },
    )
}
