// src/server/mod.rs

//! The public face of the server: start it, ask it for counts, close it.
//!
//! Every call here goes through the same request queue the connections use,
//! so the counts a caller sees are consistent with everything processed
//! before them.

use crate::config::Config;
use crate::core::{ConnectionSettings, KvError, KvStore, Manager, Request};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinSet;
use tracing::{error, info};

mod acceptor;
mod metrics_server;

pub use acceptor::Acceptor;

/// A running key-value server.
///
/// Dropping a `Server` without calling [`Server::close`] aborts its tasks
/// instead of shutting them down in order.
pub struct Server {
    local_addr: SocketAddr,
    requests: mpsc::Sender<Request>,
    shutdown_tx: broadcast::Sender<()>,
    tasks: JoinSet<()>,
}

impl Server {
    /// Binds the listener and launches the acceptor and core serializer.
    ///
    /// Fails with [`KvError::Bind`] if the address cannot be bound; nothing
    /// is spawned in that case.
    pub async fn start<S: KvStore>(config: Config, store: S) -> Result<Self, KvError> {
        let bind_addr = format!("{}:{}", config.host, config.port);
        let listener = TcpListener::bind(&bind_addr)
            .await
            .map_err(|e| KvError::Bind {
                addr: bind_addr.clone(),
                source: Arc::new(e),
            })?;
        let local_addr = listener.local_addr()?;
        info!("Key-value server listening on {}", local_addr);

        let (shutdown_tx, _) = broadcast::channel(1);
        let (requests_tx, requests_rx) = mpsc::channel(config.request_queue_capacity);
        let settings = ConnectionSettings {
            outgoing_queue_capacity: config.outgoing_queue_capacity,
            max_line_length: config.max_line_length,
        };

        let mut tasks = JoinSet::new();

        let manager = Manager::new(store, settings, requests_rx, requests_tx.clone());
        let shutdown_rx_manager = shutdown_tx.subscribe();
        let grace = config.shutdown_grace();
        tasks.spawn(async move {
            manager.run(shutdown_rx_manager, grace).await;
        });

        let acceptor = Acceptor::new(listener, requests_tx.clone());
        let shutdown_rx_acceptor = shutdown_tx.subscribe();
        tasks.spawn(async move {
            acceptor.run(shutdown_rx_acceptor).await;
        });

        if config.metrics.enabled {
            let port = config.metrics.port;
            let shutdown_rx_metrics = shutdown_tx.subscribe();
            tasks.spawn(async move {
                metrics_server::run_metrics_server(port, shutdown_rx_metrics).await;
            });
        } else {
            info!("Prometheus metrics server is disabled in the configuration.");
        }

        Ok(Self {
            local_addr,
            requests: requests_tx,
            shutdown_tx,
            tasks,
        })
    }

    /// Starts a server with default settings on `port` (all interfaces).
    pub async fn start_on_port<S: KvStore>(port: u16, store: S) -> Result<Self, KvError> {
        Self::start(Config::with_port(port), store).await
    }

    /// The address the listener is bound to, with the real port when `0` was requested.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The number of currently registered connections.
    pub async fn count_active(&self) -> Result<usize, KvError> {
        let (reply, answer) = oneshot::channel();
        self.submit(Request::QueryActiveCount(reply)).await?;
        answer.await.map_err(|_| KvError::ServerClosed)
    }

    /// The number of connections that ended because their client closed the stream.
    pub async fn count_dropped(&self) -> Result<u64, KvError> {
        let (reply, answer) = oneshot::channel();
        self.submit(Request::QueryDroppedCount(reply)).await?;
        answer.await.map_err(|_| KvError::ServerClosed)
    }

    /// Broadcasts shutdown and waits for the acceptor, the core serializer and
    /// the metrics exporter to stop. The listener is closed and every live
    /// connection is closed by the time this returns.
    pub async fn close(mut self) {
        info!("Shutting down. Sending signal to all tasks.");
        if self.shutdown_tx.send(()).is_err() {
            error!("Failed to send shutdown signal. Server tasks have already stopped.");
        }

        while let Some(res) = self.tasks.join_next().await {
            if let Err(e) = res
                && e.is_panic()
            {
                error!("A server task panicked: {e:?}");
            }
        }
        info!("Server shutdown complete.");
    }

    async fn submit(&self, request: Request) -> Result<(), KvError> {
        self.requests
            .send(request)
            .await
            .map_err(|_| KvError::ServerClosed)
    }
}
