// SPDX-FileCopyrightText: 2026 Prospect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Uses the metrics-rs facade so any recorder (Prometheus, statsd, etc.)
//! can collect these metrics. Without an installed recorder every helper is a
//! no-op, which is what library tests rely on.

use metrics::{describe_counter, describe_gauge, describe_histogram};

/// Register all Prospect metric descriptions.
///
/// Called once at startup after the recorder is installed.
pub fn register_metrics() {
    describe_counter!(
        "prospect_sends_total",
        "Send attempts resolved, by channel and outcome"
    );
    describe_counter!("prospect_claims_total", "Queue entries claimed for sending");
    describe_counter!(
        "prospect_campaign_transitions_total",
        "Campaign status transitions, by target status"
    );
    describe_counter!(
        "prospect_reclaimed_total",
        "In-flight entries reclaimed after their lease expired"
    );
    describe_counter!(
        "prospect_outbox_events_total",
        "Outbox events relayed, by topic and result"
    );
    describe_counter!(
        "prospect_contacts_synced_total",
        "Contacts written by directory sync and CSV import"
    );
    describe_gauge!("prospect_queue_pending", "Pending entries across sending campaigns");
    describe_gauge!("prospect_outbox_backlog", "Outbox events not yet relayed");
    describe_histogram!(
        "prospect_send_latency_seconds",
        "Provider send latency in seconds"
    );
}

/// Record a resolved send attempt.
pub fn record_send(channel: &str, outcome: &str) {
    metrics::counter!(
        "prospect_sends_total",
        "channel" => channel.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record entries claimed from a campaign queue.
pub fn record_claims(count: usize) {
    metrics::counter!("prospect_claims_total").increment(count as u64);
}

/// Record a campaign status transition.
pub fn record_transition(to: &str) {
    metrics::counter!("prospect_campaign_transitions_total", "to" => to.to_string()).increment(1);
}

/// Record entries reclaimed from expired leases.
pub fn record_reclaimed(count: usize) {
    metrics::counter!("prospect_reclaimed_total").increment(count as u64);
}

/// Record a relayed outbox event.
pub fn record_outbox_event(topic: &str, result: &str) {
    metrics::counter!(
        "prospect_outbox_events_total",
        "topic" => topic.to_string(),
        "result" => result.to_string()
    )
    .increment(1);
}

/// Record contacts inserted or updated by a sync or import run.
pub fn record_contacts_synced(kind: &str, inserted: usize, updated: usize) {
    metrics::counter!("prospect_contacts_synced_total", "source" => kind.to_string(), "op" => "insert")
        .increment(inserted as u64);
    metrics::counter!("prospect_contacts_synced_total", "source" => kind.to_string(), "op" => "update")
        .increment(updated as u64);
}

/// Set the number of pending entries.
pub fn set_queue_pending(count: f64) {
    metrics::gauge!("prospect_queue_pending").set(count);
}

/// Set the outbox backlog.
pub fn set_outbox_backlog(count: f64) {
    metrics::gauge!("prospect_outbox_backlog").set(count);
}

/// Record provider send latency.
pub fn record_send_latency(seconds: f64) {
    metrics::histogram!("prospect_send_latency_seconds").record(seconds);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn helpers_are_noops_without_recorder() {
        register_metrics();
        record_send("email", "sent");
        record_claims(3);
        record_transition("paused");
        record_reclaimed(0);
        record_outbox_event("campaign.status_changed", "ok");
        record_contacts_synced("directory", 2, 1);
        set_queue_pending(7.0);
        set_outbox_backlog(0.0);
        record_send_latency(0.25);
    }
}
