// src/core/protocol/mod.rs

pub mod client_request;
pub mod line_codec;
pub use client_request::ClientRequest;
pub use line_codec::{RequestLine, RequestLineCodec, Response};
