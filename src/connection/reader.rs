// src/connection/reader.rs

//! Defines the `ConnectionReader`, which turns inbound lines into requests for
//! the core serializer.

use crate::core::metrics;
use crate::core::protocol::{ClientRequest, RequestLine, RequestLineCodec};
use crate::core::{ConnectionId, Disconnect, KvError, Request};
use futures::StreamExt;
use std::net::SocketAddr;
use tokio::net::tcp::OwnedReadHalf;
use tokio::sync::mpsc;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Why the read loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadEnd {
    /// The client closed its stream or the stream broke.
    Disconnected(Disconnect),
    /// The connection was closed from the server side.
    Cancelled,
}

/// Reads newline-terminated requests from one client and forwards them to the
/// core serializer.
pub struct ConnectionReader {
    id: ConnectionId,
    addr: SocketAddr,
    frames: FramedRead<OwnedReadHalf, RequestLineCodec>,
    requests: mpsc::Sender<Request>,
    cancel: CancellationToken,
}

impl ConnectionReader {
    pub(crate) fn new(
        id: ConnectionId,
        addr: SocketAddr,
        frames: FramedRead<OwnedReadHalf, RequestLineCodec>,
        requests: mpsc::Sender<Request>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id,
            addr,
            frames,
            requests,
            cancel,
        }
    }

    /// Runs until the stream ends, the stream fails, or the connection is cancelled.
    ///
    /// Malformed and overlong lines are dropped and reading continues. When
    /// the stream ends or fails the reader asks the core serializer to
    /// unregister its connection.
    pub async fn run(mut self) {
        if let ReadEnd::Disconnected(cause) = self.read_loop().await {
            let id = self.id;
            self.submit(Request::UnregisterConnection { id, cause }).await;
        }
        debug!("Reader for connection {} ({}) stopped.", self.id, self.addr);
    }

    async fn read_loop(&mut self) -> ReadEnd {
        loop {
            let frame = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return ReadEnd::Cancelled,
                frame = self.frames.next() => frame,
            };

            match frame {
                Some(Ok(RequestLine::Complete(line))) => match ClientRequest::parse(&line) {
                    Ok(request) => {
                        debug!(
                            "Connection {}: received {} for key '{}'",
                            self.id,
                            request.name(),
                            request.key()
                        );
                        let request = Request::from_client(self.id, request);
                        if !self.submit(request).await {
                            return ReadEnd::Cancelled;
                        }
                    }
                    Err(e) => self.discard_malformed(&e),
                },
                Some(Ok(RequestLine::TooLong(limit))) => {
                    self.discard_malformed(&KvError::LineTooLong(limit));
                }
                Some(Err(e)) => {
                    log_read_failure(self.addr, &e);
                    return ReadEnd::Disconnected(Disconnect::ReadFailed);
                }
                None => {
                    debug!("Connection from {} closed by peer.", self.addr);
                    return ReadEnd::Disconnected(Disconnect::StreamEnded);
                }
            }
        }
    }

    fn discard_malformed(&self, e: &KvError) {
        metrics::MALFORMED_REQUESTS_TOTAL.inc();
        debug!("Connection {}: dropping malformed line: {}", self.id, e);
    }

    /// Hands a request to the core serializer, giving up if the connection is
    /// cancelled or the serializer has stopped. Returns whether it was sent.
    async fn submit(&self, request: Request) -> bool {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            sent = self.requests.send(request) => sent.is_ok(),
        }
    }
}

fn log_read_failure(addr: SocketAddr, e: &KvError) {
    match e {
        KvError::Io(io) if is_normal_disconnect(io) => {
            debug!("Connection from {} reset by peer: {}", addr, e);
        }
        _ => warn!("Read error on connection from {}: {}", addr, e),
    }
}

fn is_normal_disconnect(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::UnexpectedEof
    )
}
