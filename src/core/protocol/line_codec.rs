// src/core/protocol/line_codec.rs

//! Implements the newline-delimited framing used on client connections and
//! the corresponding `Encoder` and `Decoder` for network communication.

use crate::core::KvError;
use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// The byte that terminates every request and response line.
const LINE_FEED: u8 = b'\n';
const CARRIAGE_RETURN: u8 = b'\r';

/// The default upper bound on a single request line.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 64 * 1024;

/// A single `Key:Value` line written back to a client in answer to a `Get`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub key: String,
    pub value: Bytes,
}

impl Response {
    pub fn new(key: impl Into<String>, value: Bytes) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }

    /// The on-wire length of this response, including the separator and line feed.
    pub fn encoded_len(&self) -> usize {
        self.key.len() + 1 + self.value.len() + 1
    }
}

/// One decoded request line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestLine {
    /// A complete line with its terminator stripped.
    Complete(Bytes),
    /// A line longer than the limit carried here. Its bytes are skipped up to
    /// and including the next line feed.
    TooLong(usize),
}

/// A `tokio_util::codec` implementation that splits the inbound byte stream
/// into request lines and encodes outbound `Response`s.
///
/// Decoding yields the raw line; turning it into a request is left to
/// [`ClientRequest::parse`](super::ClientRequest::parse) so that a malformed
/// line can be dropped without tearing down the stream. An overlong line is
/// reported once and then discarded, after which decoding resumes at the
/// following line.
#[derive(Debug, Clone)]
pub struct RequestLineCodec {
    max_line_length: usize,
    /// Where to resume scanning for a line feed in the buffer.
    next_index: usize,
    /// Set while skipping the rest of an overlong line.
    is_discarding: bool,
}

impl Default for RequestLineCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINE_LENGTH)
    }
}

impl RequestLineCodec {
    pub fn new(max_line_length: usize) -> Self {
        Self {
            max_line_length,
            next_index: 0,
            is_discarding: false,
        }
    }
}

impl Decoder for RequestLineCodec {
    type Item = RequestLine;
    type Error = KvError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            // A line feed right after `max_line_length` bytes still ends a valid line.
            let read_to = self.max_line_length.saturating_add(1).min(src.len());
            let newline_offset = src[self.next_index..read_to]
                .iter()
                .position(|b| *b == LINE_FEED);

            match (self.is_discarding, newline_offset) {
                (true, Some(offset)) => {
                    src.advance(self.next_index + offset + 1);
                    self.is_discarding = false;
                    self.next_index = 0;
                }
                (true, None) => {
                    src.advance(read_to);
                    self.next_index = 0;
                    if src.is_empty() {
                        return Ok(None);
                    }
                }
                (false, Some(offset)) => {
                    let newline_at = self.next_index + offset;
                    self.next_index = 0;
                    let mut line = src.split_to(newline_at + 1);
                    line.truncate(newline_at);
                    if line.last() == Some(&CARRIAGE_RETURN) {
                        line.truncate(newline_at - 1);
                    }
                    return Ok(Some(RequestLine::Complete(line.freeze())));
                }
                (false, None) if src.len() > self.max_line_length => {
                    self.is_discarding = true;
                    return Ok(Some(RequestLine::TooLong(self.max_line_length)));
                }
                (false, None) => {
                    self.next_index = read_to;
                    return Ok(None);
                }
            }
        }
    }

    /// A trailing fragment without a line feed is not a request. It is
    /// discarded so that end-of-stream is reported as a clean disconnect.
    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(buf)? {
            Some(line) => Ok(Some(line)),
            None => {
                buf.clear();
                self.next_index = 0;
                self.is_discarding = false;
                Ok(None)
            }
        }
    }
}

impl Encoder<Response> for RequestLineCodec {
    type Error = KvError;

    fn encode(&mut self, item: Response, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(item.encoded_len());
        dst.extend_from_slice(item.key.as_bytes());
        dst.extend_from_slice(b":");
        dst.extend_from_slice(&item.value);
        dst.extend_from_slice(&[LINE_FEED]);
        Ok(())
    }
}
