// src/core/errors.rs

//! Defines the primary error type for the entire application.

use std::sync::Arc;
use thiserror::Error;

/// The main error enum, representing all possible failures within the server.
///
/// Only `Bind` ever reaches the owner of a running server. Everything else is
/// handled inside the connection it happened on.
#[derive(Error, Debug, Clone)]
pub enum KvError {
    #[error("IO Error: {0}")]
    Io(Arc<std::io::Error>),

    #[error("Failed to bind listener on {addr}: {source}")]
    Bind {
        addr: String,
        source: Arc<std::io::Error>,
    },

    #[error("Empty request line")]
    EmptyRequest,

    #[error("Unknown request type '{0}'")]
    UnknownRequestType(String),

    #[error("Request has no key field")]
    MissingKey,

    #[error("Wrong number of arguments for '{0}' request")]
    WrongArgumentCount(String),

    #[error("Request line is not valid UTF-8")]
    InvalidUtf8,

    #[error("Request line exceeds the maximum length of {0} bytes")]
    LineTooLong(usize),

    #[error("Server is closed")]
    ServerClosed,
}

impl PartialEq for KvError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (KvError::Io(e1), KvError::Io(e2)) => e1.kind() == e2.kind(),
            (
                KvError::Bind { addr: a1, source: s1 },
                KvError::Bind { addr: a2, source: s2 },
            ) => a1 == a2 && s1.kind() == s2.kind(),
            (KvError::UnknownRequestType(s1), KvError::UnknownRequestType(s2)) => s1 == s2,
            (KvError::WrongArgumentCount(s1), KvError::WrongArgumentCount(s2)) => s1 == s2,
            (KvError::LineTooLong(n1), KvError::LineTooLong(n2)) => n1 == n2,
            _ => core::mem::discriminant(self) == core::mem::discriminant(other),
        }
    }
}

impl From<std::io::Error> for KvError {
    fn from(e: std::io::Error) -> Self {
        KvError::Io(Arc::new(e))
    }
}

impl From<std::str::Utf8Error> for KvError {
    fn from(_: std::str::Utf8Error) -> Self {
        KvError::InvalidUtf8
    }
}
