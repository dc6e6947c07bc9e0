// src/core/protocol/client_request.rs

//! Parses a single request line (`Type:Key:Arg1:Arg2...`) into a typed request.

use crate::core::KvError;
use bytes::Bytes;

/// The field separator within a request line.
const FIELD_SEPARATOR: char = ':';

/// A request sent by a client, with the arguments each type requires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientRequest {
    Put { key: String, value: Bytes },
    Get { key: String },
    Delete { key: String },
    Update { key: String, old: Bytes, new: Bytes },
}

impl ClientRequest {
    /// Parses a line with its terminator already stripped.
    ///
    /// Type names are case-sensitive. The key is the second field and may be
    /// empty, but it must be present. Each type takes an exact number of
    /// arguments after the key.
    pub fn parse(line: &[u8]) -> Result<Self, KvError> {
        if line.is_empty() {
            return Err(KvError::EmptyRequest);
        }
        let line = std::str::from_utf8(line)?;

        let mut fields = line.split(FIELD_SEPARATOR);
        let kind = fields.next().unwrap_or_default();
        let key = fields.next().ok_or(KvError::MissingKey)?.to_string();
        let args: Vec<&str> = fields.collect();

        match kind {
            "Put" => match args.as_slice() {
                [value] => Ok(ClientRequest::Put {
                    key,
                    value: Bytes::copy_from_slice(value.as_bytes()),
                }),
                _ => Err(KvError::WrongArgumentCount(kind.to_string())),
            },
            "Get" => match args.as_slice() {
                [] => Ok(ClientRequest::Get { key }),
                _ => Err(KvError::WrongArgumentCount(kind.to_string())),
            },
            "Delete" => match args.as_slice() {
                [] => Ok(ClientRequest::Delete { key }),
                _ => Err(KvError::WrongArgumentCount(kind.to_string())),
            },
            "Update" => match args.as_slice() {
                [old, new] => Ok(ClientRequest::Update {
                    key,
                    old: Bytes::copy_from_slice(old.as_bytes()),
                    new: Bytes::copy_from_slice(new.as_bytes()),
                }),
                _ => Err(KvError::WrongArgumentCount(kind.to_string())),
            },
            other => Err(KvError::UnknownRequestType(other.to_string())),
        }
    }

    /// The wire name of this request type.
    pub fn name(&self) -> &'static str {
        match self {
            ClientRequest::Put { .. } => "Put",
            ClientRequest::Get { .. } => "Get",
            ClientRequest::Delete { .. } => "Delete",
            ClientRequest::Update { .. } => "Update",
        }
    }

    pub fn key(&self) -> &str {
        match self {
            ClientRequest::Put { key, .. }
            | ClientRequest::Get { key }
            | ClientRequest::Delete { key }
            | ClientRequest::Update { key, .. } => key,
        }
    }
}
