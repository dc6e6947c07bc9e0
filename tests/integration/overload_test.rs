// tests/integration/overload_test.rs

//! Integration tests for response shedding when a client stops reading.

use super::test_helpers::{TestClient, start_server, test_config};
use std::time::Duration;

const VALUE_SIZE: usize = 32 * 1024;
const GETS: usize = 2_000;

#[tokio::test]
async fn test_unread_responses_are_shed_and_other_clients_stay_served() {
    let mut config = test_config();
    config.outgoing_queue_capacity = 8;
    config.max_line_length = 2 * VALUE_SIZE;
    let server = start_server(config).await;

    let mut slow = TestClient::connect(server.local_addr()).await;
    let mut fast = TestClient::connect(server.local_addr()).await;
    fast.round_trip("fast-ready").await;

    slow.send(&format!("Put:big:{}", "v".repeat(VALUE_SIZE))).await;
    // Far more response bytes than socket buffers can hold, none of them read.
    for _ in 0..GETS {
        slow.send("Get:big").await;
    }

    // The serializer keeps answering other clients while `slow` is backed up.
    for i in 0..20 {
        fast.round_trip(&format!("fast-{i}")).await;
    }
    assert_eq!(server.count_active().await.unwrap(), 2);

    // Now drain what actually made it through to the slow client.
    let mut received = 0;
    while let Ok(Some(line)) = slow.read_line(Duration::from_secs(1)).await {
        assert_eq!(line.len(), "big:".len() + VALUE_SIZE);
        received += 1;
    }
    assert!(received > 0, "slow client should receive some responses");
    assert!(
        received < GETS,
        "expected some of the {GETS} responses to be shed, all arrived"
    );

    server.close().await;
}
