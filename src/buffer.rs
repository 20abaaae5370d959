//! Byte buffers shared between the socket layer and the HTTP engine.
//!
//! The parser only ever looks at what is already buffered and consumes whole
//! lines or whole bodies; the response builder only appends. Neither owns a
//! socket buffer of its own.

use bytes::{Buf, BufMut, BytesMut};

/// Read side of a connection buffer.
pub trait ByteSource {
    /// Returns every buffered byte without consuming anything.
    fn peek(&self) -> &[u8];

    /// Drops the first `n` buffered bytes.
    fn consume(&mut self, n: usize);
}

/// Write side of a connection buffer.
pub trait ByteSink {
    fn append(&mut self, bytes: &[u8]);

    fn append_str(&mut self, s: &str) {
        self.append(s.as_bytes());
    }
}

impl ByteSource for BytesMut {
    fn peek(&self) -> &[u8] {
        &self[..]
    }

    fn consume(&mut self, n: usize) {
        self.advance(n);
    }
}

impl ByteSink for BytesMut {
    fn append(&mut self, bytes: &[u8]) {
        self.put_slice(bytes);
    }
}

impl ByteSink for Vec<u8> {
    fn append(&mut self, bytes: &[u8]) {
        self.extend_from_slice(bytes);
    }
}
