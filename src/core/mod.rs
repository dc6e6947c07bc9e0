// src/core/mod.rs

//! The central module containing the core logic and data structures of the server.

pub mod errors;
pub mod manager;
pub mod metrics;
pub mod protocol;
pub mod request;
pub mod storage;

pub use errors::KvError;
pub use manager::{ConnectionSettings, Manager};
pub use request::{ConnectionId, Disconnect, NewConnection, Request};
pub use storage::{KvStore, MemoryStore};
