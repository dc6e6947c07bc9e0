// tests/integration/lifecycle_test.rs

//! Integration tests for the server lifecycle and connection accounting.
//! Tests: start, bind failure, CountActive, CountDropped, close

use super::test_helpers::{TestClient, eventually, start_server, test_config};
use kvserver::config::Config;
use kvserver::{KvError, MemoryStore, Server};
use tokio::net::TcpStream;

#[tokio::test]
async fn test_start_reports_bound_address() {
    let server = start_server(test_config()).await;
    assert_ne!(server.local_addr().port(), 0);
    assert_eq!(server.count_active().await.unwrap(), 0);
    assert_eq!(server.count_dropped().await.unwrap(), 0);
    server.close().await;
}

#[tokio::test]
async fn test_start_fails_when_port_is_taken() {
    let first = start_server(test_config()).await;

    let config = Config {
        port: first.local_addr().port(),
        ..test_config()
    };
    let err = match Server::start(config, MemoryStore::new()).await {
        Ok(_) => panic!("second server should not bind the same port"),
        Err(e) => e,
    };
    assert!(matches!(err, KvError::Bind { .. }), "unexpected error: {err:?}");

    first.close().await;
}

#[tokio::test]
async fn test_count_active_after_concurrent_connects() {
    const CLIENTS: usize = 16;
    let server = start_server(test_config()).await;
    let addr = server.local_addr();

    let handles: Vec<_> = (0..CLIENTS)
        .map(|i| {
            tokio::spawn(async move {
                let mut client = TestClient::connect(addr).await;
                client.round_trip(&format!("client-{i}")).await;
                client
            })
        })
        .collect();

    let mut clients = Vec::with_capacity(CLIENTS);
    for handle in handles {
        clients.push(handle.await.unwrap());
    }

    assert_eq!(server.count_active().await.unwrap(), CLIENTS);
    assert_eq!(server.count_dropped().await.unwrap(), 0);

    server.close().await;
}

#[tokio::test]
async fn test_clean_disconnects_are_counted_as_dropped() {
    const CLIENTS: usize = 5;
    const LEAVING: usize = 3;
    let server = start_server(test_config()).await;

    let mut clients = Vec::new();
    for i in 0..CLIENTS {
        let mut client = TestClient::connect(server.local_addr()).await;
        client.round_trip(&format!("c{i}")).await;
        clients.push(client);
    }
    assert_eq!(server.count_active().await.unwrap(), CLIENTS);

    for client in clients.drain(..LEAVING) {
        client.close().await;
    }

    let server_ref = &server;
    let settled = eventually(|| async move {
        server_ref.count_dropped().await.unwrap() == LEAVING as u64
    })
    .await;
    assert!(settled, "dropped count never reached {LEAVING}");
    assert_eq!(server.count_active().await.unwrap(), CLIENTS - LEAVING);

    // The remaining clients are unaffected.
    for (i, client) in clients.iter_mut().enumerate() {
        client.round_trip(&format!("still-{i}")).await;
    }

    server.close().await;
}

#[tokio::test]
async fn test_close_disconnects_clients_and_stops_listening() {
    let server = start_server(test_config()).await;
    let addr = server.local_addr();
    let mut client = TestClient::connect(addr).await;
    client.round_trip("before-close").await;

    server.close().await;

    client.expect_closed().await;
    assert!(TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn test_close_with_no_connections() {
    let server = Server::start_on_port(0, MemoryStore::new())
        .await
        .expect("Failed to start server");
    server.close().await;
}
