// SPDX-FileCopyrightText: 2026 Prospect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Property tests for fingerprint normalization.

use proptest::prelude::*;

use prospect_sync::{canonical_email, canonical_phone, fingerprint};

/// A French mobile number as nine national digits after the trunk `0`.
fn national_digits() -> impl Strategy<Value = String> {
    "[67][0-9]{8}"
}

fn separator() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just(""), Just(" "), Just("."), Just("-")]
}

fn spell(digits: &str, sep: &str) -> String {
    let chars: Vec<char> = digits.chars().collect();
    chars
        .chunks(2)
        .map(|pair| pair.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join(sep)
}

proptest! {
    /// National, `+cc` and `00cc` spellings with any separator share one fingerprint.
    #[test]
    fn phone_spellings_converge(digits in national_digits(), sep in separator()) {
        let national = format!("0{}", spell(&digits, sep));
        let plus = format!("+33{sep}{}", spell(&digits, sep));
        let zeros = format!("0033{digits}");
        let expected = format!("+33{digits}");

        prop_assert_eq!(canonical_phone(&national, "33"), Some(expected.clone()));
        prop_assert_eq!(canonical_phone(&plus, "33"), Some(expected.clone()));
        prop_assert_eq!(canonical_phone(&zeros, "33"), Some(expected.clone()));
        prop_assert_eq!(
            fingerprint(None, Some(&national), "33"),
            fingerprint(None, Some(&zeros), "33")
        );
    }

    /// Canonicalizing a canonical phone changes nothing.
    #[test]
    fn phone_canonicalization_is_idempotent(raw in "[+0-9 .-]{0,20}") {
        if let Some(once) = canonical_phone(&raw, "33") {
            prop_assert_eq!(canonical_phone(&once, "33"), Some(once.clone()));
        }
    }

    /// Case and surrounding whitespace never split an email fingerprint.
    #[test]
    fn email_case_is_irrelevant(local in "[a-z][a-z0-9.]{0,10}", domain in "[a-z]{2,8}\\.(fr|com)") {
        let lower = format!("{local}@{domain}");
        let shouted = format!("  {}  ", lower.to_uppercase());
        prop_assert_eq!(canonical_email(&shouted), Some(lower.clone()));
        prop_assert_eq!(
            fingerprint(Some(&shouted), Some("0612345678"), "33"),
            Some(format!("email:{lower}"))
        );
    }
}
