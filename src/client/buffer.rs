//! Accumulating read buffer.
//!
//! A single transport read is not guaranteed to hold a whole reply. The
//! buffer keeps appending reads until a parser reports a complete frame,
//! then drops exactly the bytes that frame occupied. Anything after it stays
//! buffered for the next reply.

use super::transport::Transport;
use crate::error::{Error, Result};
use crate::resp::{measure, ParseResult};
use bytes::{Buf, BytesMut};
use tracing::trace;

/// Default size of each transport read.
pub const DEFAULT_READ_SIZE: usize = 16 * 1024;

/// Default upper bound on buffered bytes for a single reply (512 MB, the
/// server's own bulk string limit).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 512 * 1024 * 1024;

#[derive(Debug)]
pub struct ReadBuffer {
    buf: BytesMut,
    read_size: usize,
    max_frame_size: usize,
}

impl ReadBuffer {
    pub fn new(read_size: usize, max_frame_size: usize) -> Self {
        let read_size = read_size.max(1);
        Self {
            buf: BytesMut::with_capacity(read_size),
            read_size,
            max_frame_size,
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Append one transport read. Returns the number of bytes read; 0 is EOF.
    pub fn fill<T: Transport>(&mut self, transport: &mut T) -> Result<usize> {
        let start = self.buf.len();
        self.buf.resize(start + self.read_size, 0);
        let result = transport.receive(&mut self.buf[start..]);
        let n = *result.as_ref().unwrap_or(&0);
        self.buf.truncate(start + n);
        result.map_err(Error::from)
    }

    /// Parse one frame with `parse`, reading from `transport` for as long as
    /// the buffered bytes are incomplete.
    pub fn read_frame<T, R, F>(&mut self, transport: &mut T, mut parse: F) -> Result<R>
    where
        T: Transport,
        F: FnMut(&[u8]) -> ParseResult<R>,
    {
        loop {
            match parse(&self.buf) {
                ParseResult::Complete(frame, consumed) => {
                    trace!(consumed, buffered = self.buf.len(), "Frame complete");
                    self.buf.advance(consumed);
                    return Ok(frame);
                }
                ParseResult::Incomplete => {
                    if self.buf.len() >= self.max_frame_size {
                        return Err(Error::FrameTooLarge {
                            limit: self.max_frame_size,
                        });
                    }
                    if self.fill(transport)? == 0 {
                        return Err(Error::ConnectionClosed);
                    }
                }
                ParseResult::Error(e) => return Err(Error::Protocol(e)),
            }
        }
    }

    /// Wait until [`measure`] finds a complete frame, then hand exactly
    /// that frame to `parse`.
    ///
    /// Partial reads only rescan frame headers, and `parse` runs once per
    /// frame however many reads it took to arrive.
    pub fn read_measured<T, R, F>(&mut self, transport: &mut T, mut parse: F) -> Result<R>
    where
        T: Transport,
        F: FnMut(&[u8]) -> ParseResult<R>,
    {
        self.read_frame(transport, |buf| match measure(buf) {
            ParseResult::Complete((), len) => parse(&buf[..len]),
            ParseResult::Incomplete => ParseResult::Incomplete,
            ParseResult::Error(e) => ParseResult::Error(e),
        })
    }
}

impl Default for ReadBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_READ_SIZE, DEFAULT_MAX_FRAME_SIZE)
    }
}
