// SPDX-FileCopyrightText: 2026 Prospect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `{{variable}}` substitution for campaign templates.
//!
//! Substituted values are stripped of markup and template braces and capped
//! at [`MAX_VALUE_CHARS`], so contact data can neither inject HTML nor
//! smuggle in further placeholders. [`validate`] rejects templates naming a
//! variable outside [`KNOWN_VARIABLES`]; at render time a value that is
//! missing renders empty.

use std::sync::LazyLock;

use chrono::{NaiveDate, Utc};
use regex::Regex;

use crate::error::ProspectError;
use crate::types::{Campaign, Contact};

/// Longest substituted value, in characters.
pub const MAX_VALUE_CHARS: usize = 500;

/// Every variable a template may reference.
pub const KNOWN_VARIABLES: &[&str] = &[
    "contact_name",
    "company_name",
    "email",
    "phone",
    "city",
    "department",
    "campaign_name",
    "date",
    "unsubscribe_link",
];

/// Variable replaced by a signed opt-out URL.
pub const UNSUBSCRIBE_VARIABLE: &str = "unsubscribe_link";

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([A-Za-z0-9_]+)\s*\}\}").expect("valid placeholder regex"));

static MARKUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid markup regex"));

/// The values a template can reference.
#[derive(Debug, Clone)]
pub struct TemplateContext<'a> {
    pub contact: &'a Contact,
    pub campaign: &'a Campaign,
    /// Rendered as `dd/mm/yyyy`.
    pub date: NaiveDate,
    pub unsubscribe_link: Option<String>,
}

impl<'a> TemplateContext<'a> {
    /// Context dated today (UTC) with no unsubscribe link.
    pub fn new(contact: &'a Contact, campaign: &'a Campaign) -> Self {
        Self {
            contact,
            campaign,
            date: Utc::now().date_naive(),
            unsubscribe_link: None,
        }
    }

    pub fn with_unsubscribe_link(mut self, link: impl Into<String>) -> Self {
        self.unsubscribe_link = Some(link.into());
        self
    }

    pub fn on(mut self, date: NaiveDate) -> Self {
        self.date = date;
        self
    }

    fn lookup(&self, name: &str) -> Option<String> {
        let c = self.contact;
        let value = match name {
            "contact_name" => c.display_name.as_deref(),
            "company_name" => c.company_name.as_deref(),
            "email" => c.email.as_deref(),
            "phone" => c.phone.as_deref(),
            "city" => c.city.as_deref(),
            "department" => c.department.as_deref(),
            "campaign_name" => Some(self.campaign.name.as_str()),
            "unsubscribe_link" => self.unsubscribe_link.as_deref(),
            "date" => return Some(self.date.format("%d/%m/%Y").to_string()),
            _ => None,
        };
        value.map(sanitize)
    }
}

/// Render `template` against `ctx`.
pub fn render(template: &str, ctx: &TemplateContext<'_>) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &regex::Captures<'_>| {
            ctx.lookup(&caps[1]).unwrap_or_default()
        })
        .into_owned()
}

/// Names of the variables a template references, in first-use order.
pub fn variables(template: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for caps in PLACEHOLDER.captures_iter(template) {
        let name = &caps[1];
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

/// Reject a template that references an unknown variable, or the
/// unsubscribe link when no signing secret is configured.
pub fn validate(template: &str, unsubscribe_links: bool) -> Result<(), ProspectError> {
    for name in variables(template) {
        if !KNOWN_VARIABLES.contains(&name.as_str()) {
            return Err(ProspectError::Validation(format!(
                "unknown template variable `{{{{{name}}}}}`; known: {}",
                KNOWN_VARIABLES.join(", ")
            )));
        }
        if name == UNSUBSCRIBE_VARIABLE && !unsubscribe_links {
            return Err(ProspectError::Validation(
                "`{{unsubscribe_link}}` needs unsubscribe.secret to be configured".to_string(),
            ));
        }
    }
    Ok(())
}

fn sanitize(value: &str) -> String {
    let stripped = MARKUP.replace_all(value, "");
    let unbraced = stripped.replace("{{", "").replace("}}", "");
    unbraced.trim().chars().take(MAX_VALUE_CHARS).collect()
}
