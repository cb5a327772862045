// SPDX-FileCopyrightText: 2026 Prospect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Prospect campaign engine.
//!
//! This crate provides the error taxonomy, domain types, and adapter trait
//! definitions used throughout the Prospect workspace. Send providers, the
//! provider directory, and storage backends implement traits defined here.

pub mod error;
pub mod redact;
pub mod template;
pub mod time;
pub mod traits;
pub mod types;
pub mod unsubscribe;

// Re-export key items at crate root for ergonomic imports.
pub use error::ProspectError;
pub use unsubscribe::{UnsubscribeClaim, UnsubscribeSigner};
pub use types::{
    AdapterType, AdminContext, Campaign, CampaignStatus, Channel, Contact, ContactList, ContactSource,
    DeliveryEvent, DirectoryRecord, EntryState, EventOutcome, HealthStatus,
    NewCampaign, NewContact, OutboundMessage, OutboxEvent, QueueEntry, SendOutcome, SendReceipt,
    SyncFilter,
};

// Re-export all adapter traits at crate root.
pub use traits::{
    AuditSink, OutboxHandler, PluginAdapter, ProviderDirectory,
    SendProvider, StorageAdapter,
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn campaign_status_round_trips_through_display() {
        let variants = [
            CampaignStatus::Draft,
            CampaignStatus::Sending,
            CampaignStatus::Paused,
            CampaignStatus::Completed,
            CampaignStatus::Failed,
            CampaignStatus::Cancelled,
        ];
        for variant in &variants {
            let s = variant.to_string();
            let parsed = CampaignStatus::from_str(&s).expect("should parse back");
            assert_eq!(*variant, parsed);
        }
        assert_eq!(CampaignStatus::Sending.to_string(), "sending");
    }

    #[test]
    fn entry_state_uses_snake_case_in_storage_and_json() {
        assert_eq!(EntryState::InFlight.to_string(), "in_flight");
        let json = serde_json::to_string(&EntryState::InFlight).expect("should serialize");
        assert_eq!(json, "\"in_flight\"");
        assert_eq!(
            EventOutcome::from_str("retry_scheduled").expect("should parse"),
            EventOutcome::RetryScheduled
        );
    }

    #[test]
    fn terminal_statuses() {
        assert!(CampaignStatus::Completed.is_terminal());
        assert!(CampaignStatus::Cancelled.is_terminal());
        assert!(!CampaignStatus::Paused.is_terminal());
        assert!(EntryState::Skipped.is_terminal());
        assert!(!EntryState::InFlight.is_terminal());
    }

    #[test]
    fn engagement_outcomes() {
        assert!(EventOutcome::Replied.is_engagement());
        assert!(!EventOutcome::Sent.is_engagement());
    }

    #[test]
    fn send_outcome_classifies_errors() {
        let transient = SendOutcome::from_error(&ProspectError::TransientSend {
            message: "429".into(),
        });
        assert!(matches!(transient, SendOutcome::Transient { .. }));

        let permanent = SendOutcome::from_error(&ProspectError::PermanentSend {
            message: "invalid address".into(),
        });
        assert!(matches!(permanent, SendOutcome::Permanent { .. }));
    }

    #[test]
    fn contact_address_depends_on_channel() {
        let contact = Contact {
            id: "c1".into(),
            display_name: None,
            company_name: None,
            phone: Some("+33612345678".into()),
            email: Some("a@b.fr".into()),
            department: None,
            city: None,
            external_id: None,
            source: ContactSource::Manual,
            fingerprint: "email:a@b.fr".into(),
            opt_out: false,
            opted_out_at: None,
            last_contacted_at: None,
            created_at: String::new(),
            updated_at: String::new(),
        };
        assert_eq!(contact.address_for(Channel::Email), Some("a@b.fr"));
        assert_eq!(contact.address_for(Channel::Whatsapp), Some("+33612345678"));
    }

    #[test]
    fn all_traits_are_exported() {
        fn _assert_plugin_adapter<T: PluginAdapter>() {}
        fn _assert_send_provider<T: SendProvider>() {}
        fn _assert_directory<T: ProviderDirectory>() {}
        fn _assert_storage_adapter<T: StorageAdapter>() {}
        fn _assert_audit_sink<T: AuditSink>() {}
        fn _assert_outbox_handler<T: OutboxHandler>() {}
    }
}
