// src/connection/mod.rs

//! Manages the lifecycle of a single client TCP connection: the registry
//! record kept by the core serializer, and the reader and writer tasks that
//! move bytes between the socket and the serializer.

mod reader;
mod record;
mod writer;

pub use reader::ConnectionReader;
pub use record::{ConnectionRecord, Delivery};
pub use writer::ConnectionWriter;
