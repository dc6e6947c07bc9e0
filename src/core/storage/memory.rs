// src/core/storage/memory.rs

//! An in-memory multimap backend, the default store for the server binary.

use super::KvStore;
use bytes::Bytes;
use std::collections::HashMap;

/// Keeps every value ever inserted under a key, in insertion order.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: HashMap<String, Vec<Bytes>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of distinct keys currently stored.
    pub fn key_count(&self) -> usize {
        self.entries.len()
    }
}

impl KvStore for MemoryStore {
    fn insert(&mut self, key: &str, value: Bytes) {
        self.entries.entry(key.to_string()).or_default().push(value);
    }

    fn lookup(&self, key: &str) -> Vec<Bytes> {
        self.entries.get(key).cloned().unwrap_or_default()
    }

    fn delete(&mut self, key: &str) {
        self.entries.remove(key);
    }

    /// Every stored copy of `old` becomes `new`. Unknown keys and values that
    /// are not present are left alone.
    fn update(&mut self, key: &str, old: Bytes, new: Bytes) {
        if let Some(values) = self.entries.get_mut(key) {
            for value in values.iter_mut().filter(|v| **v == old) {
                *value = new.clone();
            }
        }
    }
}
