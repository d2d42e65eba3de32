//! Byte source contract for the chunker
//!
//! A source yields interleaved signed-16 little-endian PCM at a fixed rate
//! and channel count. Reads never block; readiness is signalled out of band
//! (see `CaptureSource`).

use std::collections::VecDeque;

/// Outcome of a non-blocking source read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceRead {
    /// `len` bytes were written to the front of the buffer. A short fill
    /// only occurs for the final tail of an ended stream.
    Filled(usize),
    /// No data available right now
    Pending,
    /// The stream has ended and no bytes remain
    Closed,
}

/// Non-blocking byte-oriented PCM source
pub trait ByteSource {
    /// Attempt to fill `buf` completely without blocking.
    ///
    /// Returns `Filled(buf.len())` when a full read was satisfied,
    /// `Filled(n)` with `n < buf.len()` only once the stream has ended and
    /// `n` tail bytes remained, `Pending` when data may still arrive, and
    /// `Closed` once the stream has ended with nothing left.
    fn poll_read(&mut self, buf: &mut [u8]) -> SourceRead;
}

/// In-memory byte source, fed explicitly.
///
/// Used by tests and by callers that pipe PCM from elsewhere.
#[derive(Debug, Default)]
pub struct MemorySource {
    data: VecDeque<u8>,
    closed: bool,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes to the stream
    pub fn push(&mut self, bytes: &[u8]) {
        self.data.extend(bytes);
    }

    /// Mark the stream ended; remaining bytes become the tail
    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl ByteSource for MemorySource {
    fn poll_read(&mut self, buf: &mut [u8]) -> SourceRead {
        if self.data.len() >= buf.len() {
            let len = buf.len();
            for (slot, byte) in buf.iter_mut().zip(self.data.drain(..len)) {
                *slot = byte;
            }
            return SourceRead::Filled(len);
        }
        if !self.closed {
            return SourceRead::Pending;
        }
        if self.data.is_empty() {
            return SourceRead::Closed;
        }
        let len = self.data.len();
        for (slot, byte) in buf.iter_mut().zip(self.data.drain(..)) {
            *slot = byte;
        }
        SourceRead::Filled(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_read_when_enough_buffered() {
        let mut source = MemorySource::new();
        source.push(&[1, 2, 3, 4]);
        let mut buf = [0u8; 4];
        assert_eq!(source.poll_read(&mut buf), SourceRead::Filled(4));
        assert_eq!(buf, [1, 2, 3, 4]);
    }

    #[test]
    fn pending_while_open_and_short() {
        let mut source = MemorySource::new();
        source.push(&[1, 2]);
        let mut buf = [0u8; 4];
        assert_eq!(source.poll_read(&mut buf), SourceRead::Pending);
        assert_eq!(source.len(), 2);
    }

    #[test]
    fn tail_then_closed() {
        let mut source = MemorySource::new();
        source.push(&[7, 8, 9]);
        source.close();
        let mut buf = [0u8; 4];
        assert_eq!(source.poll_read(&mut buf), SourceRead::Filled(3));
        assert_eq!(&buf[..3], &[7, 8, 9]);
        assert_eq!(source.poll_read(&mut buf), SourceRead::Closed);
    }
}
