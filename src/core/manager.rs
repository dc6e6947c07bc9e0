// src/core/manager.rs

//! The core serializer.
//!
//! `Manager` is the only task that touches the connection registry, the
//! dropped-connection counter, or the store. Everything else reaches that
//! state by sending a [`Request`] down one bounded queue, and the manager
//! handles those requests one at a time, to completion. That single owner is
//! what keeps all mutations and lookups totally ordered without a lock.

use crate::connection::{ConnectionRecord, Delivery};
use crate::core::metrics;
use crate::core::protocol::Response;
use crate::core::storage::KvStore;
use crate::core::{ConnectionId, Disconnect, NewConnection, Request};
use bytes::Bytes;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Per-connection limits applied when a connection is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub outgoing_queue_capacity: usize,
    pub max_line_length: usize,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            outgoing_queue_capacity: 500,
            max_line_length: crate::core::protocol::line_codec::DEFAULT_MAX_LINE_LENGTH,
        }
    }
}

/// Owns all shared server state and serializes every operation on it.
pub struct Manager<S: KvStore> {
    store: S,
    registry: HashMap<ConnectionId, ConnectionRecord>,
    dropped: u64,
    requests_rx: mpsc::Receiver<Request>,
    /// Cloned into every reader so they can reach this task.
    requests_tx: mpsc::Sender<Request>,
    connection_tasks: JoinSet<()>,
    settings: ConnectionSettings,
}

impl<S: KvStore> Manager<S> {
    pub fn new(
        store: S,
        settings: ConnectionSettings,
        requests_rx: mpsc::Receiver<Request>,
        requests_tx: mpsc::Sender<Request>,
    ) -> Self {
        Self {
            store,
            registry: HashMap::new(),
            dropped: 0,
            requests_rx,
            requests_tx,
            connection_tasks: JoinSet::new(),
            settings,
        }
    }

    /// Runs the request loop until the shutdown broadcast fires (or its sender
    /// is dropped), then closes every live connection.
    ///
    /// `shutdown_grace` bounds how long the drain waits for connection tasks.
    pub async fn run(mut self, mut shutdown_rx: broadcast::Receiver<()>, shutdown_grace: Duration) {
        info!("Core serializer started.");
        loop {
            tokio::select! {
                // Shutdown wins over any queued request.
                biased;

                _ = shutdown_rx.recv() => {
                    info!("Core serializer received shutdown signal.");
                    break;
                }
                Some(request) = self.requests_rx.recv() => {
                    self.handle_request(request);
                }
                Some(res) = self.connection_tasks.join_next() => {
                    if let Err(e) = res
                        && e.is_panic()
                    {
                        error!("A connection task panicked: {e:?}");
                    }
                }
            }
        }

        self.drain(shutdown_grace).await;
    }

    /// Handles a single request to completion. Never waits on a client.
    pub fn handle_request(&mut self, request: Request) {
        let _timer = metrics::REQUEST_LATENCY_SECONDS.start_timer();
        metrics::REQUESTS_PROCESSED_TOTAL
            .with_label_values(&[request.kind()])
            .inc();

        match request {
            Request::RegisterConnection(conn) => self.register(conn),
            Request::UnregisterConnection { id, cause } => self.unregister(id, cause),
            Request::Insert { key, value } => self.store.insert(&key, value),
            Request::Delete { key } => self.store.delete(&key),
            Request::Update { key, old, new } => self.store.update(&key, old, new),
            Request::Lookup { key, reply_to } => self.lookup(key, reply_to),
            Request::QueryActiveCount(reply) => {
                // The caller may have given up waiting; that is not our problem.
                let _ = reply.send(self.registry.len());
            }
            Request::QueryDroppedCount(reply) => {
                let _ = reply.send(self.dropped);
            }
        }
    }

    pub fn active_count(&self) -> usize {
        self.registry.len()
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped
    }

    fn register(&mut self, conn: NewConnection) {
        let (record, reader, writer) =
            ConnectionRecord::open(conn, self.requests_tx.clone(), &self.settings);
        debug!("Registering connection {} from {}", record.id, record.addr);

        self.connection_tasks.spawn(reader.run());
        self.connection_tasks.spawn(writer.run());
        metrics::CONNECTED_CLIENTS.inc();

        if let Some(stale) = self.registry.insert(record.id, record) {
            // Ids are never reused, so this only happens on a bug upstream.
            warn!("Connection id {} was registered twice.", stale.id);
            stale.close();
            metrics::CONNECTED_CLIENTS.dec();
        }
    }

    /// Removes a connection whose reader has stopped. A connection that is
    /// already gone (closed by shutdown, or unregistered before) is left
    /// alone, so its tasks are signalled and the counter bumped at most once.
    /// Only a stream ended by the client counts as dropped.
    fn unregister(&mut self, id: ConnectionId, cause: Disconnect) {
        let Some(record) = self.registry.remove(&id) else {
            debug!("Connection {} already unregistered.", id);
            return;
        };

        record.close();
        metrics::CONNECTED_CLIENTS.dec();
        if cause == Disconnect::StreamEnded {
            self.dropped += 1;
            metrics::CONNECTIONS_DROPPED_TOTAL.inc();
        }
        debug!(
            "Connection {} from {} unregistered ({:?}) after {:?}.",
            record.id,
            record.addr,
            cause,
            record.opened_at.elapsed()
        );
    }

    fn lookup(&mut self, key: String, reply_to: ConnectionId) {
        let Some(record) = self.registry.get(&reply_to) else {
            debug!("Lookup from unknown connection {} ignored.", reply_to);
            return;
        };

        let values: Vec<Bytes> = self.store.lookup(&key);
        let responses = values
            .into_iter()
            .map(|value| Response::new(key.clone(), value))
            .collect();

        match record.try_deliver(responses) {
            Delivery::Queued(_) => {}
            Delivery::Truncated { queued, shed } => {
                metrics::RESPONSES_SHED_TOTAL.inc_by(shed as f64);
                debug!(
                    "Outgoing queue for connection {} filled up; queued {} and shed {} response(s) for key '{}'.",
                    reply_to, queued, shed, key
                );
            }
            Delivery::Shed(count) => {
                metrics::RESPONSES_SHED_TOTAL.inc_by(count as f64);
                debug!(
                    "Outgoing queue for connection {} is full; shed {} response(s) for key '{}'.",
                    reply_to, count, key
                );
            }
            Delivery::Closed => {
                debug!(
                    "Writer for connection {} has stopped; lookup result discarded.",
                    reply_to
                );
            }
        }
    }

    /// Closes every registered connection and waits (bounded) for their tasks.
    async fn drain(mut self, shutdown_grace: Duration) {
        let open = self.registry.len();
        for (_, record) in self.registry.drain() {
            record.close();
        }
        metrics::CONNECTED_CLIENTS.sub(open as f64);
        info!("Closed {} active connection(s).", open);

        // Anything still queued is abandoned; blocked senders see the queue close.
        self.requests_rx.close();

        if tokio::time::timeout(shutdown_grace, async {
            while self.connection_tasks.join_next().await.is_some() {}
        })
        .await
        .is_err()
        {
            warn!("Timed out waiting for connection tasks to finish; aborting the rest.");
            self.connection_tasks.shutdown().await;
        }
        info!("Core serializer stopped.");
    }
}
