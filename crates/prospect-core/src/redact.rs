// SPDX-FileCopyrightText: 2026 Prospect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Redaction helpers for log output.

/// Masks a phone number for logging, keeping the leading `+` and two digits
/// and the last two digits: `+33612345678` becomes `+33****78`.
///
/// Values too short to mask meaningfully are fully hidden.
pub fn mask_phone(phone: &str) -> String {
    let chars: Vec<char> = phone.chars().collect();
    if chars.len() < 6 {
        return "****".to_string();
    }
    let head_len = if chars[0] == '+' { 3 } else { 2 };
    let head: String = chars[..head_len].iter().collect();
    let tail: String = chars[chars.len() - 2..].iter().collect();
    format!("{head}****{tail}")
}

/// Masks an email address for logging: `jean.dupont@example.fr` becomes
/// `j***@example.fr`.
pub fn mask_email(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() => {
            let first: String = local.chars().take(1).collect();
            format!("{first}***@{domain}")
        }
        _ => "***".to_string(),
    }
}
