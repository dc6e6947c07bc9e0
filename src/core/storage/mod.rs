// src/core/storage/mod.rs

//! The store adapter seam. The core serializer talks to the key-value backend
//! only through [`KvStore`]; storage layout is the backend's business.

pub mod memory;

pub use memory::MemoryStore;

use bytes::Bytes;

/// A key-value backend that may hold several values per key.
///
/// Implementations are owned by, and only ever called from, the core
/// serializer task, so they need `Send` but no internal synchronization.
pub trait KvStore: Send + 'static {
    /// Adds `value` under `key`.
    fn insert(&mut self, key: &str, value: Bytes);

    /// Returns every value stored under `key`, in the backend's order.
    fn lookup(&self, key: &str) -> Vec<Bytes>;

    /// Removes `key` and all its values.
    fn delete(&mut self, key: &str);

    /// Replaces `old` with `new` under `key`. What happens when `old` is not
    /// stored is up to the backend.
    fn update(&mut self, key: &str, old: Bytes, new: Bytes);
}
