// SPDX-FileCopyrightText: 2026 Prospect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Contact sync for the Prospect campaign engine.
//!
//! Keeps the contact store aligned with the primary provider directory and
//! imports CSV files. Every contact is keyed by a dedup fingerprint derived
//! from its canonical email or phone number, so re-running a sync or an
//! import over unchanged input leaves the store untouched.

pub mod directory;
pub mod import;
pub mod normalize;
pub mod sync;

pub use directory::{CsvDirectory, parse_directory_csv};
pub use import::{
    ColumnMapping, ContactField, ImportReport, ImportRowError, csv_headers, suggest_mapping,
};
pub use normalize::{Identity, canonical_email, canonical_phone, fingerprint};
pub use sync::{ContactSync, SyncReport};
