// src/server/acceptor.rs

//! Contains the accept loop, which hands every new socket to the core serializer.

use crate::core::metrics;
use crate::core::{ConnectionId, NewConnection, Request};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info};

/// Pause after a failed accept so a persistent error (e.g. out of file
/// descriptors) does not spin the loop.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// Accepts inbound connections and submits a registration request for each.
/// It never touches the registry itself.
pub struct Acceptor {
    listener: TcpListener,
    requests: mpsc::Sender<Request>,
    next_id: ConnectionId,
}

impl Acceptor {
    pub fn new(listener: TcpListener, requests: mpsc::Sender<Request>) -> Self {
        Self {
            listener,
            requests,
            next_id: 0,
        }
    }

    /// Runs until shutdown is broadcast or the core serializer stops taking
    /// requests. The listener is closed when this returns.
    pub async fn run(mut self, mut shutdown_rx: broadcast::Receiver<()>) {
        loop {
            let accepted = tokio::select! {
                biased;
                _ = shutdown_rx.recv() => break,
                res = self.listener.accept() => res,
            };

            match accepted {
                Ok((stream, addr)) => {
                    metrics::CONNECTIONS_RECEIVED_TOTAL.inc();
                    self.next_id = self.next_id.wrapping_add(1);
                    let id = self.next_id;
                    debug!("Accepted connection {} from {}", id, addr);

                    let register = Request::RegisterConnection(NewConnection { id, addr, stream });
                    let sent = tokio::select! {
                        biased;
                        _ = shutdown_rx.recv() => break,
                        sent = self.requests.send(register) => sent,
                    };
                    if sent.is_err() {
                        debug!("Core serializer is gone; acceptor exiting.");
                        break;
                    }
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                }
            }
        }
        info!("Acceptor stopped; listener closed.");
    }
}
