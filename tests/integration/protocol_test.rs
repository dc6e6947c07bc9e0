// tests/integration/protocol_test.rs

//! Integration tests for the line protocol over real TCP connections.
//! Tests: Put, Get, Update, Delete, malformed lines, line framing

use super::test_helpers::{TestClient, start_server, test_config};

#[tokio::test]
async fn test_put_get_update_delete_scenario() {
    let server = start_server(test_config()).await;
    let mut client = TestClient::connect(server.local_addr()).await;

    client.send("Put:a:1").await;
    client.send("Get:a").await;
    assert_eq!(client.expect_line().await, "a:1");

    client.send("Update:a:1:2").await;
    client.send("Get:a").await;
    assert_eq!(client.expect_line().await, "a:2");

    client.send("Delete:a").await;
    client.send("Get:a").await;
    client.expect_silence().await;

    server.close().await;
}

#[tokio::test]
async fn test_get_returns_every_value_in_store_order() {
    let server = start_server(test_config()).await;
    let mut client = TestClient::connect(server.local_addr()).await;

    client.send("Put:k:x").await;
    client.send("Put:k:y").await;
    client.send("Put:k:z").await;
    client.send("Get:k").await;

    assert_eq!(client.expect_line().await, "k:x");
    assert_eq!(client.expect_line().await, "k:y");
    assert_eq!(client.expect_line().await, "k:z");
    client.expect_silence().await;

    server.close().await;
}

#[tokio::test]
async fn test_get_on_missing_key_sends_nothing() {
    let server = start_server(test_config()).await;
    let mut client = TestClient::connect(server.local_addr()).await;

    client.send("Get:nothing-here").await;
    client.expect_silence().await;

    server.close().await;
}

#[tokio::test]
async fn test_writes_from_one_client_are_visible_to_another() {
    let server = start_server(test_config()).await;
    let mut writer = TestClient::connect(server.local_addr()).await;
    let mut reader = TestClient::connect(server.local_addr()).await;

    // A round trip on the writer guarantees its Put was processed first.
    writer.send("Put:shared:v").await;
    writer.round_trip("writer-sync").await;

    reader.send("Get:shared").await;
    assert_eq!(reader.expect_line().await, "shared:v");

    server.close().await;
}

#[tokio::test]
async fn test_malformed_lines_are_dropped_and_connection_stays_open() {
    let server = start_server(test_config()).await;
    let mut client = TestClient::connect(server.local_addr()).await;

    client.send("Foo").await;
    client.send("Bogus:a:1").await;
    client.send("Put:a").await;
    client.send("Update:a:1").await;
    client.send("").await;
    client.send_raw(b"Put:bad:\xff\n").await;

    client.send("Put:a:1").await;
    client.send("Get:a").await;
    assert_eq!(client.expect_line().await, "a:1");
    assert_eq!(server.count_active().await.unwrap(), 1);
    assert_eq!(server.count_dropped().await.unwrap(), 0);

    server.close().await;
}

#[tokio::test]
async fn test_crlf_terminated_lines_are_accepted() {
    let server = start_server(test_config()).await;
    let mut client = TestClient::connect(server.local_addr()).await;

    client.send_raw(b"Put:a:1\r\nGet:a\r\n").await;
    assert_eq!(client.expect_line().await, "a:1");

    server.close().await;
}

#[tokio::test]
async fn test_requests_split_across_writes_are_reassembled() {
    let server = start_server(test_config()).await;
    let mut client = TestClient::connect(server.local_addr()).await;

    client.send_raw(b"Pu").await;
    client.send_raw(b"t:a:hel").await;
    client.send_raw(b"lo\nGet:").await;
    client.send_raw(b"a\n").await;
    assert_eq!(client.expect_line().await, "a:hello");

    server.close().await;
}

#[tokio::test]
async fn test_overlong_line_is_dropped_and_the_connection_stays_open() {
    let mut config = test_config();
    config.max_line_length = 16;
    let server = start_server(config).await;
    let mut client = TestClient::connect(server.local_addr()).await;
    client.round_trip("k").await;

    client.send(&format!("Put:k:{}", "x".repeat(64))).await;
    client.send("Get:k").await;
    assert_eq!(client.expect_line().await, "k:ok");
    client.expect_silence().await;

    assert_eq!(server.count_active().await.unwrap(), 1);
    assert_eq!(server.count_dropped().await.unwrap(), 0);

    server.close().await;
}

#[tokio::test]
async fn test_put_larger_than_a_socket_read_is_stored_under_the_default_limit() {
    let server = start_server(test_config()).await;
    let mut client = TestClient::connect(server.local_addr()).await;

    let value = "v".repeat(60 * 1024);
    client.send(&format!("Put:big:{value}")).await;
    client.send("Get:big").await;
    assert_eq!(client.expect_line().await, format!("big:{value}"));
    assert_eq!(server.count_dropped().await.unwrap(), 0);

    server.close().await;
}
