//! Accumulating byte buffer with a read cursor.
//!
//! One `ChunkBuffer` holds the not-yet-consumed bytes of a single in-flight
//! response. Chunks are appended at the back as the transport delivers them;
//! the parser consumes from the front as tokens are recognised. Bytes behind
//! the cursor are dropped by [`ChunkBuffer::discard_consumed`] so memory
//! stays bounded by the largest unparsed field, not the whole response.

use bytes::{Buf, Bytes, BytesMut};

/// Growable buffer of unconsumed response bytes.
///
/// All offsets returned by the scan methods are relative to the current
/// cursor. A scan that finds nothing returns `None`, which means "wait for
/// more data", never an error. Scans never move the cursor; only
/// [`skip`](Self::skip) and [`read_slice`](Self::read_slice) do.
#[derive(Debug, Default)]
pub struct ChunkBuffer {
    buf: BytesMut,
    pos: usize,
}

impl ChunkBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk at the back. Never blocks, never fails.
    pub fn append(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Number of unconsumed bytes.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// The unconsumed bytes, cursor first.
    pub fn unread(&self) -> &[u8] {
        &self.buf[self.pos..]
    }

    /// Current cursor, for [`rewind_to`](Self::rewind_to).
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Move the cursor back to a previously saved [`position`](Self::position).
    ///
    /// Only valid between two points with no intervening
    /// [`discard_consumed`](Self::discard_consumed); discarding invalidates
    /// saved positions.
    pub fn rewind_to(&mut self, pos: usize) {
        debug_assert!(pos <= self.buf.len());
        self.pos = pos;
    }

    /// Offset of the first occurrence of `target`, relative to the cursor.
    pub fn bytes_before(&self, target: u8) -> Option<usize> {
        self.bytes_before_from(0, target)
    }

    /// Offset of the first occurrence of `target` at or after cursor-relative
    /// `start`. The returned offset is still relative to the cursor.
    pub fn bytes_before_from(&self, start: usize, target: u8) -> Option<usize> {
        let unread = self.unread();
        if start >= unread.len() {
            return None;
        }
        unread[start..]
            .iter()
            .position(|&b| b == target)
            .map(|i| start + i)
    }

    /// Advance the cursor by `n` bytes, clamped to the buffered extent.
    pub fn skip(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.buf.len());
    }

    /// Advance the cursor by `n` bytes and return them as a detached copy.
    ///
    /// The copy is what lets a sub-document outlive buffer trimming.
    pub fn read_slice(&mut self, n: usize) -> Bytes {
        let n = n.min(self.remaining());
        let out = Bytes::copy_from_slice(&self.buf[self.pos..self.pos + n]);
        self.pos += n;
        out
    }

    /// Borrow up to `len` bytes starting at cursor-relative `start`, without
    /// moving the cursor. Shorter than `len` if the buffer ends first.
    pub fn peek_range(&self, start: usize, len: usize) -> &[u8] {
        let unread = self.unread();
        let start = start.min(unread.len());
        let end = (start + len).min(unread.len());
        &unread[start..end]
    }

    /// Borrow up to `len` bytes at the cursor.
    pub fn peek_slice(&self, len: usize) -> &[u8] {
        self.peek_range(0, len)
    }

    /// Physically drop everything behind the cursor.
    ///
    /// Invoked after each field transition; saved positions from before the
    /// call must not be used afterwards.
    pub fn discard_consumed(&mut self) {
        self.buf.advance(self.pos);
        self.pos = 0;
    }
}
