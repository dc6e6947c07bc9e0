// src/connection/writer.rs

//! Defines the `ConnectionWriter`, which drains one connection's outgoing
//! queue onto its socket.

use crate::core::KvError;
use crate::core::protocol::{RequestLineCodec, Response};
use futures::SinkExt;
use std::net::SocketAddr;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::mpsc;
use tokio_util::codec::FramedWrite;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Writes queued responses to one client until cancelled.
///
/// Write failures are not retried. The writer just stops; unregistering the
/// connection is left to the reader or to server shutdown.
pub struct ConnectionWriter {
    id: u64,
    addr: SocketAddr,
    sink: FramedWrite<OwnedWriteHalf, RequestLineCodec>,
    outbox: mpsc::Receiver<Response>,
    cancel: CancellationToken,
}

impl ConnectionWriter {
    pub(crate) fn new(
        id: u64,
        addr: SocketAddr,
        sink: FramedWrite<OwnedWriteHalf, RequestLineCodec>,
        outbox: mpsc::Receiver<Response>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id,
            addr,
            sink,
            outbox,
            cancel,
        }
    }

    pub async fn run(mut self) {
        loop {
            let response = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                response = self.outbox.recv() => response,
            };

            // The record was dropped, so nothing more will ever be queued.
            let Some(response) = response else { break };

            let written = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                written = Self::write_batch(&mut self.sink, &mut self.outbox, response) => written,
            };

            if let Err(e) = written {
                debug!(
                    "Write to connection {} ({}) failed, stopping writer: {}",
                    self.id, self.addr, e
                );
                break;
            }
        }
        debug!("Writer for connection {} ({}) stopped.", self.id, self.addr);
    }

    /// Writes `first` plus whatever else is already queued, then flushes once.
    async fn write_batch(
        sink: &mut FramedWrite<OwnedWriteHalf, RequestLineCodec>,
        outbox: &mut mpsc::Receiver<Response>,
        first: Response,
    ) -> Result<(), KvError> {
        sink.feed(first).await?;
        while let Ok(next) = outbox.try_recv() {
            sink.feed(next).await?;
        }
        sink.flush().await
    }
}
