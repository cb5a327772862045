// SPDX-FileCopyrightText: 2026 Prospect Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pause and resume against a live dispatcher.

use std::sync::Arc;
use std::time::Duration;

use prospect_core::types::{AdminContext, CampaignStatus};
use prospect_dispatch::{DispatchSettings, Dispatcher};
use prospect_queue::{CampaignControl, MessageQueue, RetryPolicy};
use prospect_storage::queries::campaigns;
use prospect_test_utils::TestHarness;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn pause_mid_batch_lets_claimed_sends_finish() {
    let harness = TestHarness::builder()
        .with_provider_delay(Duration::from_millis(150))
        .build()
        .await
        .unwrap();
    let (campaign, _) = harness.seeded_campaign(10).await.unwrap();
    let admin = AdminContext::new("admin-1");

    let queue = MessageQueue::new(harness.db.clone(), RetryPolicy::default());
    let control = CampaignControl::new(queue.clone(), Arc::new(harness.audit.clone()));
    control.start_campaign(&admin, &campaign.id).await.unwrap();

    let dispatcher = Arc::new(Dispatcher::new(
        queue.clone(),
        control.clone(),
        harness.provider.clone(),
        DispatchSettings {
            batch_size: 3,
            default_rate_per_sec: 100,
            send_timeout: Duration::from_secs(5),
            ..DispatchSettings::default()
        },
    ));

    let poll = {
        let dispatcher = Arc::clone(&dispatcher);
        tokio::spawn(async move { dispatcher.poll_once().await })
    };
    // Let the batch get claimed and handed to the provider.
    tokio::time::sleep(Duration::from_millis(50)).await;
    control.pause_campaign(&admin, &campaign.id).await.unwrap();

    let report = poll.await.unwrap().unwrap();
    assert_eq!(report.claimed, 3);
    assert_eq!(report.sent, 3);

    let counts = queue.depth(&campaign.id).await.unwrap();
    assert_eq!(counts.sent, 3);
    assert_eq!(counts.pending, 7);
    assert_eq!(counts.in_flight, 0);

    // Paused campaigns are not polled at all.
    let idle = dispatcher.poll_once().await.unwrap();
    assert_eq!(idle.campaigns, 0);
    assert_eq!(queue.depth(&campaign.id).await.unwrap().pending, 7);

    control.resume_campaign(&admin, &campaign.id).await.unwrap();
    let mut rounds = 0;
    loop {
        dispatcher.poll_once().await.unwrap();
        let stored = campaigns::get_campaign(&harness.db, &campaign.id)
            .await
            .unwrap()
            .unwrap();
        if stored.status == CampaignStatus::Completed {
            break;
        }
        rounds += 1;
        assert!(rounds < 20, "campaign never completed");
    }
    assert_eq!(harness.provider.sent_count().await, 10);
}
