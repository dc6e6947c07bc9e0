// src/core/request.rs

//! The messages accepted by the core serializer.

use crate::core::protocol::ClientRequest;
use bytes::Bytes;
use std::net::SocketAddr;
use tokio::net::TcpStream;
use tokio::sync::oneshot;

/// Identifies a connection for as long as the server runs. Never reused.
pub type ConnectionId = u64;

/// A freshly accepted socket waiting to be registered.
#[derive(Debug)]
pub struct NewConnection {
    pub id: ConnectionId,
    pub addr: SocketAddr,
    pub stream: TcpStream,
}

/// Why a connection reader stopped reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disconnect {
    /// The client closed its stream. Counted as a dropped connection.
    StreamEnded,
    /// Reading failed, e.g. the peer reset the connection. The connection is
    /// cleaned up but not counted as dropped.
    ReadFailed,
}

/// A request to the core serializer. Each variant carries exactly the fields
/// its handling needs.
#[derive(Debug)]
pub enum Request {
    Insert {
        key: String,
        value: Bytes,
    },
    /// Results are queued on the outgoing queue of connection `reply_to`.
    Lookup {
        key: String,
        reply_to: ConnectionId,
    },
    Delete {
        key: String,
    },
    Update {
        key: String,
        old: Bytes,
        new: Bytes,
    },
    RegisterConnection(NewConnection),
    /// Sent by a connection reader once it stops reading from its client.
    UnregisterConnection {
        id: ConnectionId,
        cause: Disconnect,
    },
    QueryActiveCount(oneshot::Sender<usize>),
    QueryDroppedCount(oneshot::Sender<u64>),
}

impl Request {
    /// Converts a parsed client line into a request from connection `from`.
    pub fn from_client(from: ConnectionId, request: ClientRequest) -> Self {
        match request {
            ClientRequest::Put { key, value } => Request::Insert { key, value },
            ClientRequest::Get { key } => Request::Lookup {
                key,
                reply_to: from,
            },
            ClientRequest::Delete { key } => Request::Delete { key },
            ClientRequest::Update { key, old, new } => Request::Update { key, old, new },
        }
    }

    /// A stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Request::Insert { .. } => "insert",
            Request::Lookup { .. } => "lookup",
            Request::Delete { .. } => "delete",
            Request::Update { .. } => "update",
            Request::RegisterConnection(_) => "register_connection",
            Request::UnregisterConnection { .. } => "unregister_connection",
            Request::QueryActiveCount(_) => "query_active_count",
            Request::QueryDroppedCount(_) => "query_dropped_count",
        }
    }
}
