// src/connection/record.rs

//! Defines `ConnectionRecord`, the registry entry for one live client.

use super::{ConnectionReader, ConnectionWriter};
use crate::core::protocol::{RequestLineCodec, Response};
use crate::core::{ConnectionId, ConnectionSettings, NewConnection, Request};
use std::net::SocketAddr;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;

/// The outcome of handing a lookup's result set to a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Every line was queued for the writer.
    Queued(usize),
    /// The queue filled up part way through; the leading lines were queued
    /// and the rest were dropped.
    Truncated { queued: usize, shed: usize },
    /// The queue was already at capacity, so none of the set was queued.
    Shed(usize),
    /// The writer is gone and nothing can be delivered.
    Closed,
}

/// Everything the core serializer holds for one connection.
///
/// The socket itself is split between the reader and writer tasks; the record
/// keeps the handles needed to stop them and the sending side of the
/// outgoing queue. Dropping the record closes that queue.
#[derive(Debug)]
pub struct ConnectionRecord {
    pub id: ConnectionId,
    pub addr: SocketAddr,
    pub opened_at: Instant,
    reader_cancel: CancellationToken,
    writer_cancel: CancellationToken,
    outbox: mpsc::Sender<Response>,
}

impl ConnectionRecord {
    /// Splits an accepted socket into a record plus the reader and writer
    /// tasks bound to it. Nothing is spawned here.
    pub fn open(
        conn: NewConnection,
        requests: mpsc::Sender<Request>,
        settings: &ConnectionSettings,
    ) -> (Self, ConnectionReader, ConnectionWriter) {
        let NewConnection { id, addr, stream } = conn;
        let (read_half, write_half) = stream.into_split();
        let (outbox, outbox_rx) = mpsc::channel(settings.outgoing_queue_capacity);
        let reader_cancel = CancellationToken::new();
        let writer_cancel = CancellationToken::new();
        let codec = RequestLineCodec::new(settings.max_line_length);

        let reader = ConnectionReader::new(
            id,
            addr,
            FramedRead::new(read_half, codec.clone()),
            requests,
            reader_cancel.clone(),
        );
        let writer = ConnectionWriter::new(
            id,
            addr,
            FramedWrite::new(write_half, codec),
            outbox_rx,
            writer_cancel.clone(),
        );

        let record = Self {
            id,
            addr,
            opened_at: Instant::now(),
            reader_cancel,
            writer_cancel,
            outbox,
        };
        (record, reader, writer)
    }

    /// Signals both tasks to stop. Once both have returned, their socket
    /// halves are dropped and the connection is closed. Repeated calls are no-ops.
    pub fn close(&self) {
        self.reader_cancel.cancel();
        self.writer_cancel.cancel();
    }

    /// Queues a lookup's result set in order without ever waiting.
    ///
    /// A queue that is already at capacity sheds the whole set. Otherwise as
    /// many leading lines as there are free slots are queued and only the
    /// remainder is shed.
    pub fn try_deliver(&self, responses: Vec<Response>) -> Delivery {
        let count = responses.len();
        if count == 0 {
            return Delivery::Queued(0);
        }
        if self.outbox.is_closed() {
            return Delivery::Closed;
        }

        let free = self.outbox.capacity();
        if free == 0 {
            return Delivery::Shed(count);
        }

        let fits = free.min(count);
        match self.outbox.try_reserve_many(fits) {
            Ok(permits) => {
                for (permit, response) in permits.zip(responses) {
                    permit.send(response);
                }
                if fits == count {
                    Delivery::Queued(count)
                } else {
                    Delivery::Truncated {
                        queued: fits,
                        shed: count - fits,
                    }
                }
            }
            Err(TrySendError::Full(())) => Delivery::Shed(count),
            Err(TrySendError::Closed(())) => Delivery::Closed,
        }
    }

    /// Builds a record with no socket behind it, returning the receiving end
    /// of its outgoing queue.
    #[cfg(test)]
    pub(crate) fn detached(
        id: ConnectionId,
        outgoing_queue_capacity: usize,
    ) -> (Self, mpsc::Receiver<Response>) {
        let (outbox, outbox_rx) = mpsc::channel(outgoing_queue_capacity);
        let record = Self {
            id,
            addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            opened_at: Instant::now(),
            reader_cancel: CancellationToken::new(),
            writer_cancel: CancellationToken::new(),
            outbox,
        };
        (record, outbox_rx)
    }
}
