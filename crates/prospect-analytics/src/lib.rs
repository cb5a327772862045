// SPDX-FileCopyrightText: 2026 Prospect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Analytics for the Prospect campaign engine.
//!
//! Statistics are never stored: every figure is recomputed from the
//! append-only delivery event log (or, for queue depth, the live entry
//! states), so repeated calls over an unchanged log return identical results.

pub mod aggregator;
pub mod stats;

pub use aggregator::Analytics;
pub use stats::{
    CampaignStats, ChannelPerformance, DateRange, OutcomeTotals, OverviewStats, QueueStats, ratio,
};
