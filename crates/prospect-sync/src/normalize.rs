// SPDX-FileCopyrightText: 2026 Prospect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Email and phone canonicalization and the dedup fingerprint.

use std::sync::LazyLock;

use regex::Regex;

use prospect_core::ProspectError;
use prospect_storage::ContactKeys;

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid regex"));

/// Characters dropped from phone numbers before parsing.
const PHONE_SEPARATORS: &[char] = &[' ', '.', '-', '(', ')', '/', '\u{a0}'];

/// Trimmed, lowercased email, or `None` if it does not look like an address.
pub fn canonical_email(raw: &str) -> Option<String> {
    let email = raw.trim().to_lowercase();
    EMAIL.is_match(&email).then_some(email)
}

/// E.164 form of `raw`, or `None` if it cannot be read as a phone number.
///
/// `00` prefixes become `+`; national numbers with a leading `0` take
/// `default_cc` (digits only, e.g. `33`). The result must carry 8 to 15 digits.
pub fn canonical_phone(raw: &str, default_cc: &str) -> Option<String> {
    // "+33 (0)6 ..." is a common way of writing the trunk prefix.
    let cleaned: String = raw
        .trim()
        .replace("(0)", "")
        .chars()
        .filter(|c| !PHONE_SEPARATORS.contains(c))
        .collect();

    let digits = if let Some(rest) = cleaned.strip_prefix('+') {
        rest.to_string()
    } else if let Some(rest) = cleaned.strip_prefix("00") {
        rest.to_string()
    } else if let Some(rest) = cleaned.strip_prefix('0') {
        format!("{default_cc}{rest}")
    } else {
        cleaned
    };

    let valid = (8..=15).contains(&digits.len())
        && digits.chars().all(|c| c.is_ascii_digit())
        && !digits.starts_with('0');
    valid.then(|| format!("+{digits}"))
}

/// Dedup key: `email:<canonical email>` when a valid email exists, otherwise
/// `phone:<E.164>`. `None` when neither is usable.
pub fn fingerprint(email: Option<&str>, phone: Option<&str>, default_cc: &str) -> Option<String> {
    Identity::resolve(email, phone, default_cc)
        .ok()
        .map(|id| id.fingerprint)
}

/// The canonical contact points of a record and the fingerprint they yield.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub fingerprint: String,
}

impl Identity {
    /// Canonicalize both contact points. Unparseable values are dropped;
    /// a record with neither is rejected.
    pub fn resolve(
        email: Option<&str>,
        phone: Option<&str>,
        default_cc: &str,
    ) -> Result<Self, ProspectError> {
        let email = email.and_then(canonical_email);
        let phone = phone.and_then(|p| canonical_phone(p, default_cc));
        let fingerprint = match (&email, &phone) {
            (Some(e), _) => format!("email:{e}"),
            (None, Some(p)) => format!("phone:{p}"),
            (None, None) => {
                return Err(ProspectError::Validation(
                    "record has neither a valid email nor a valid phone".to_string(),
                ));
            }
        };
        Ok(Self {
            email,
            phone,
            fingerprint,
        })
    }

    /// Store lookup keys for this identity.
    pub fn keys(&self, external_id: Option<&str>) -> ContactKeys {
        ContactKeys {
            fingerprint: self.fingerprint.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            external_id: external_id.map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_is_trimmed_and_lowercased() {
        assert_eq!(
            canonical_email("  Jean.Dupont@Example.FR "),
            Some("jean.dupont@example.fr".to_string())
        );
        assert_eq!(canonical_email("not-an-email"), None);
        assert_eq!(canonical_email("a@b"), None);
        assert_eq!(canonical_email("a b@c.fr"), None);
    }

    #[test]
    fn french_numbers_in_every_spelling() {
        for raw in [
            "06 12 34 56 78",
            "06.12.34.56.78",
            "0612345678",
            "+33 6 12 34 56 78",
            "+33 (0)6 12 34 56 78",
            "0033612345678",
        ] {
            assert_eq!(
                canonical_phone(raw, "33").as_deref(),
                Some("+33612345678"),
                "{raw}"
            );
        }
    }

    #[test]
    fn bad_phones_are_rejected() {
        assert_eq!(canonical_phone("", "33"), None);
        assert_eq!(canonical_phone("12", "33"), None);
        assert_eq!(canonical_phone("06 12 AB 56 78", "33"), None);
        assert_eq!(canonical_phone("+1234567890123456", "33"), None);
        assert_eq!(canonical_phone("+0612345678", "33"), None);
    }

    #[test]
    fn email_wins_over_phone() {
        assert_eq!(
            fingerprint(Some("A@B.fr"), Some("0612345678"), "33").as_deref(),
            Some("email:a@b.fr")
        );
        assert_eq!(
            fingerprint(Some("broken"), Some("0612345678"), "33").as_deref(),
            Some("phone:+33612345678")
        );
        assert_eq!(fingerprint(None, None, "33"), None);
    }

    #[test]
    fn identity_keeps_valid_points_only() {
        let id = Identity::resolve(Some("broken"), Some("06 12 34 56 78"), "33").unwrap();
        assert_eq!(id.email, None);
        assert_eq!(id.phone.as_deref(), Some("+33612345678"));

        let err = Identity::resolve(Some(""), Some("abc"), "33").unwrap_err();
        assert!(matches!(err, ProspectError::Validation(_)));
    }
}
