// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn subscribers_see_transitions_in_order() {
    let hub = BroadcastHub::new();
    let mut rx = hub.subscribe("job-a");

    hub.publish_status("job-a", JobStatus::Building);
    hub.publish_status("job-a", JobStatus::Checking);

    assert_eq!(rx.recv().await, Some(StreamMessage::StatusUpdate { status: JobStatus::Building }));
    assert_eq!(rx.recv().await, Some(StreamMessage::StatusUpdate { status: JobStatus::Checking }));
}

#[tokio::test]
async fn independent_buffers_per_subscriber() {
    let hub = BroadcastHub::new();
    let mut a = hub.subscribe("job-a");
    let mut b = hub.subscribe("job-a");

    hub.publish_status("job-a", JobStatus::Building);

    assert!(matches!(a.recv().await, Some(StreamMessage::StatusUpdate { .. })));
    assert!(matches!(b.recv().await, Some(StreamMessage::StatusUpdate { .. })));
}

#[tokio::test]
async fn laggard_is_disconnected_not_blocked() {
    let hub = BroadcastHub::new();
    let mut slow = hub.subscribe("job-a");

    for _ in 0..SUBSCRIBER_BUFFER {
        hub.publish_log("job-a", "line".into());
    }
    assert_eq!(hub.subscriber_count("job-a"), 1);

    // One more overflows the buffer and drops the subscriber
    hub.publish_log("job-a", "overflow".into());
    assert_eq!(hub.subscriber_count("job-a"), 0);

    // The slow reader still drains what was buffered, then the stream ends
    for _ in 0..SUBSCRIBER_BUFFER {
        assert!(slow.recv().await.is_some());
    }
    assert_eq!(slow.recv().await, None);
}

#[tokio::test]
async fn late_subscriber_gets_terminal_then_close() {
    let hub = BroadcastHub::new();
    hub.publish_status("job-a", JobStatus::Completed);

    let mut rx = hub.subscribe("job-a");
    assert_eq!(rx.recv().await, Some(StreamMessage::StatusUpdate { status: JobStatus::Completed }));
    assert_eq!(rx.recv().await, None);
}

#[tokio::test]
async fn no_logs_after_terminal() {
    let hub = BroadcastHub::new();
    let mut rx = hub.subscribe("job-a");

    hub.publish_status("job-a", JobStatus::Failed);
    hub.publish_log("job-a", "straggler".into());
    hub.close_after_grace("job-a");

    assert_eq!(rx.recv().await, Some(StreamMessage::StatusUpdate { status: JobStatus::Failed }));
    // The grace close drops the sender; the terminal status was the last message
    assert_eq!(rx.recv().await, None);
}

#[tokio::test]
async fn logs_reach_subscribers() {
    let hub = BroadcastHub::new();
    let mut rx = hub.subscribe("job-a");

    hub.publish_log("job-a", "cargo build".into());
    assert_eq!(rx.recv().await, Some(StreamMessage::Log { message: "cargo build".into() }));
}

#[test]
fn stream_messages_serialize_with_type_tags() {
    let msg = StreamMessage::StatusUpdate { status: JobStatus::AwaitingApproval };
    let json = serde_json::to_value(&msg).unwrap();
    assert_eq!(json["type"], "status_update");
    assert_eq!(json["status"], "awaiting_approval");

    let msg = StreamMessage::Log { message: "hi".into() };
    let json = serde_json::to_value(&msg).unwrap();
    assert_eq!(json["type"], "log");
    assert_eq!(json["message"], "hi");
}
