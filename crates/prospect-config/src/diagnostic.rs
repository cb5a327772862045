// SPDX-FileCopyrightText: 2026 Prospect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! miette diagnostics for configuration errors.
//!
//! Unknown keys are checked against every section of [`SCHEMA`], so a key
//! written under the wrong table (`batch_size` in `[queue]` instead of
//! `[dispatch]`) points at the table that owns it. Every suggestion also
//! names the `PROSPECT_*` variable that sets the same key.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

use crate::model::SCHEMA;

/// Jaro-Winkler score a known key needs to be offered as a correction.
const SUGGESTION_THRESHOLD: f64 = 0.8;

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// A key no section accepts, as a dotted path (`dispatch.batch_sise`).
    #[error("unknown configuration key `{key}`")]
    #[diagnostic(
        code(prospect::config::unknown_key),
        help("{}", key_help(suggestion.as_deref()))
    )]
    UnknownKey {
        key: String,
        /// Dotted path of the closest known key.
        suggestion: Option<String>,
        #[label("not a key of this section")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("unknown configuration section `[{section}]`")]
    #[diagnostic(
        code(prospect::config::unknown_section),
        help("{}", section_help(suggestion.as_deref()))
    )]
    UnknownSection {
        section: String,
        suggestion: Option<String>,
        #[label("not a section")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("invalid value for `{key}`: {detail}")]
    #[diagnostic(
        code(prospect::config::invalid_type),
        help("expected {expected} (file key `{key}` or env `{}`)", env_var_for(key))
    )]
    InvalidType {
        key: String,
        detail: String,
        expected: String,
    },

    /// A value that parsed but breaks a semantic rule.
    #[error("validation error: {message}")]
    #[diagnostic(code(prospect::config::validation))]
    Validation { message: String },

    #[error("configuration error: {0}")]
    #[diagnostic(code(prospect::config::other))]
    Other(String),
}

fn key_help(suggestion: Option<&str>) -> String {
    match suggestion {
        Some(key) => format!("did you mean `{key}` (env `{}`)?", env_var_for(key)),
        None => "see `prospect config show` for every accepted key".to_string(),
    }
}

fn section_help(suggestion: Option<&str>) -> String {
    let sections: Vec<&str> = SCHEMA.iter().map(|(s, _)| *s).collect();
    match suggestion {
        Some(s) => format!("did you mean `[{s}]`? Sections: {}", sections.join(", ")),
        None => format!("sections: {}", sections.join(", ")),
    }
}

/// The `PROSPECT_*` variable for a dotted key (`queue.max_attempts` ->
/// `PROSPECT_QUEUE_MAX_ATTEMPTS`).
pub fn env_var_for(dotted_key: &str) -> String {
    format!("PROSPECT_{}", dotted_key.replace('.', "_").to_uppercase())
}

/// Keys accepted by `section`, or `None` for an unknown section.
fn section_keys(section: &str) -> Option<&'static [&'static str]> {
    SCHEMA
        .iter()
        .find(|(name, _)| *name == section)
        .map(|(_, keys)| *keys)
}

fn closest<'a>(unknown: &str, candidates: impl Iterator<Item = &'a str>) -> Option<&'a str> {
    candidates
        .map(|c| (strsim::jaro_winkler(unknown, c), c))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, c)| c)
}

/// Closest known key for `key` found under `[section]`, as a dotted path.
///
/// An exact name from another section wins, then a near match in the same
/// section, then a near match anywhere.
pub fn suggest_key(section: &str, key: &str) -> Option<String> {
    if let Some((owner, _)) = SCHEMA.iter().find(|(_, keys)| keys.contains(&key)) {
        return Some(format!("{owner}.{key}"));
    }
    if let Some(hit) = section_keys(section).and_then(|keys| closest(key, keys.iter().copied())) {
        return Some(format!("{section}.{hit}"));
    }
    let dotted: Vec<String> = SCHEMA
        .iter()
        .flat_map(|(s, keys)| keys.iter().map(move |k| format!("{s}.{k}")))
        .collect();
    SCHEMA
        .iter()
        .flat_map(|(_, keys)| keys.iter().copied())
        .zip(dotted.iter())
        .map(|(k, full)| (strsim::jaro_winkler(key, k), full))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, full)| full.clone())
}

/// Closest known section name.
pub fn suggest_section(section: &str) -> Option<String> {
    closest(section, SCHEMA.iter().map(|(s, _)| *s)).map(str::to_string)
}

/// Convert a figment error into diagnostics, one per underlying error.
///
/// `sources` holds `(path, content)` of the TOML files that were read, used
/// to point at the offending line.
pub fn figment_to_config_errors(
    err: figment::Error,
    sources: &[(String, String)],
) -> Vec<ConfigError> {
    use figment::error::Kind;

    err.into_iter()
        .map(|error| {
            let mut path: Vec<String> = error.path.clone();
            match &error.kind {
                Kind::UnknownField(field, _) => {
                    if path.last() == Some(field) {
                        path.pop();
                    }
                    let source = source_of(&error, sources);
                    match path.first() {
                        None => {
                            let (span, src) =
                                locate(source, |c| find_section_offset(c, field), field.len());
                            ConfigError::UnknownSection {
                                section: field.clone(),
                                suggestion: suggest_section(field),
                                span,
                                src,
                            }
                        }
                        Some(section) => {
                            let (span, src) = locate(
                                source,
                                |c| find_key_offset(c, Some(section), field),
                                field.len(),
                            );
                            ConfigError::UnknownKey {
                                key: format!("{section}.{field}"),
                                suggestion: suggest_key(section, field),
                                span,
                                src,
                            }
                        }
                    }
                }
                Kind::InvalidType(actual, expected) => ConfigError::InvalidType {
                    key: path.join("."),
                    detail: format!("found {actual}"),
                    expected: expected.to_string(),
                },
                _ => ConfigError::Other(error.to_string()),
            }
        })
        .collect()
}

/// Name under which an in-memory TOML document is passed as a source.
pub const INLINE_SOURCE: &str = "<inline>";

/// The `(path, content)` an error came from. Errors from a TOML string map to
/// the [`INLINE_SOURCE`] entry.
fn source_of<'a>(
    error: &figment::error::Error,
    sources: &'a [(String, String)],
) -> Option<&'a (String, String)> {
    let path = match error.metadata.as_ref()?.source.as_ref() {
        Some(figment::Source::File(path)) => path.display().to_string(),
        _ if error.metadata.as_ref()?.name.contains("TOML") => INLINE_SOURCE.to_string(),
        _ => return None,
    };
    sources.iter().find(|(p, _)| *p == path)
}

fn locate(
    source: Option<&(String, String)>,
    find: impl Fn(&str) -> Option<usize>,
    len: usize,
) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
    source
        .and_then(|(path, content)| {
            find(content).map(|offset| {
                (
                    Some(SourceSpan::new(offset.into(), len)),
                    Some(NamedSource::new(path, content.clone())),
                )
            })
        })
        .unwrap_or((None, None))
}

/// Byte offset of `key` inside `[section]` (or before any table for `None`).
pub fn find_key_offset(content: &str, section: Option<&str>, key: &str) -> Option<usize> {
    let mut current: Option<&str> = None;
    let mut offset = 0;
    for line in content.split_inclusive('\n') {
        let body = line.trim_start();
        let indent = line.len() - body.len();
        if let Some(name) = table_name(body) {
            current = Some(name);
        } else if current == section
            && body
                .strip_prefix(key)
                .is_some_and(|rest| rest.trim_start().starts_with('='))
        {
            return Some(offset + indent);
        }
        offset += line.len();
    }
    None
}

/// Byte offset of the name inside a `[section]` header.
pub fn find_section_offset(content: &str, section: &str) -> Option<usize> {
    let mut offset = 0;
    for line in content.split_inclusive('\n') {
        let body = line.trim_start();
        if table_name(body) == Some(section) {
            let name_start = body.find(section)?;
            return Some(offset + (line.len() - body.len()) + name_start);
        }
        offset += line.len();
    }
    None
}

fn table_name(line: &str) -> Option<&str> {
    let line = line.trim_end();
    line.strip_prefix('[')?.strip_suffix(']').map(str::trim)
}

/// Render diagnostics to stderr with miette's graphical handler.
pub fn render_errors(errors: &[ConfigError]) {
    use miette::GraphicalReportHandler;

    let handler = GraphicalReportHandler::new();
    for error in errors {
        let mut buf = String::new();
        if handler.render_report(&mut buf, error as &dyn Diagnostic).is_ok() {
            eprint!("{buf}");
        } else {
            eprintln!("Error: {error}");
        }
    }
}
