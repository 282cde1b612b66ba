//! Buffered reader and writer over the transport boundary.
//!
//! The writer coalesces small writes so that each flush reaches the sink as a
//! single call. The reader serves bytes out of the spans a [`ByteSource`]
//! hands out and reports consumption back to it.

use bytes::{BufMut, BytesMut};

use super::sink::ByteSink;
use super::source::ByteSource;
use super::{impl_std_read, impl_std_write, BodyRead};
use crate::error::{Result, StreamError};

/// Default write buffer capacity (8KB)
pub const DEFAULT_WRITE_BUFFER_SIZE: usize = 8 * 1024;

// =============================================================================
// BufferedWriter
// =============================================================================

/// Coalesces writes into a fixed-capacity buffer.
///
/// Pending bytes reach the sink only when the buffer cannot take the next
/// write, when a `write_byte` fills it, or on `flush`/`close`. Writes at least
/// as large as the capacity bypass the buffer entirely.
pub struct BufferedWriter<K: ByteSink> {
    sink: K,
    buf: BytesMut,
    capacity: usize,
    failed: bool,
    closed: bool,
}

impl<K: ByteSink> BufferedWriter<K> {
    pub fn new(sink: K) -> Self {
        Self::with_capacity(DEFAULT_WRITE_BUFFER_SIZE, sink)
    }

    pub fn with_capacity(capacity: usize, sink: K) -> Self {
        let capacity = capacity.max(1);
        Self {
            sink,
            buf: BytesMut::with_capacity(capacity),
            capacity,
            failed: false,
            closed: false,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes buffered but not yet handed to the sink.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn get_ref(&self) -> &K {
        &self.sink
    }

    pub fn get_mut(&mut self) -> &mut K {
        &mut self.sink
    }

    fn check(&self) -> Result<()> {
        if self.failed {
            Err(StreamError::Poisoned)
        } else if self.closed {
            Err(StreamError::Closed)
        } else {
            Ok(())
        }
    }

    fn guard(&mut self, result: Result<()>) -> Result<()> {
        if let Err(ref e) = result {
            tracing::warn!("Buffered writer failed: {}", e);
            self.failed = true;
        }
        result
    }

    /// Hands pending bytes to the sink in one call.
    fn flush_buffer(&mut self) -> Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let result = self.sink.write(&self.buf);
        self.buf.clear();
        self.guard(result)
    }
}

impl<K: ByteSink> ByteSink for BufferedWriter<K> {
    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.check()?;
        if bytes.is_empty() {
            return Ok(());
        }

        if self.buf.len() + bytes.len() > self.capacity {
            self.flush_buffer()?;
        }

        if bytes.len() >= self.capacity {
            // Large writes go straight through instead of being copied twice
            let result = self.sink.write(bytes);
            return self.guard(result);
        }

        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    fn write_byte(&mut self, byte: u8) -> Result<()> {
        self.check()?;
        // A plain write may have filled the buffer exactly
        if self.buf.len() >= self.capacity {
            self.flush_buffer()?;
        }
        self.buf.put_u8(byte);
        if self.buf.len() >= self.capacity {
            self.flush_buffer()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.check()?;
        self.flush_buffer()?;
        let result = self.sink.flush();
        self.guard(result)
    }

    /// Flushes and closes the sink. Idempotent; writes afterwards fail.
    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.flush()?;
        let result = self.sink.close();
        self.guard(result)?;
        self.closed = true;
        Ok(())
    }
}

impl<K: ByteSink> Drop for BufferedWriter<K> {
    fn drop(&mut self) {
        if self.failed || self.closed || self.buf.is_empty() {
            return;
        }
        if let Err(e) = self.flush() {
            tracing::debug!("Best-effort flush on drop failed: {}", e);
        }
    }
}

impl_std_write!(BufferedWriter<K: ByteSink>);

// =============================================================================
// BufferedReader
// =============================================================================

/// Serves bytes out of source spans and tracks how many were consumed.
///
/// `[cursor, avail)` is the unconsumed part of the current span. Consumption
/// is reported to the source when the next span is pulled, on `commit`, and
/// on drop.
pub struct BufferedReader<S: ByteSource> {
    source: S,
    avail: usize,
    cursor: usize,
    eof: bool,
}

impl<S: ByteSource> BufferedReader<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            avail: 0,
            cursor: 0,
            eof: false,
        }
    }

    /// Unconsumed bytes left in the current span.
    pub fn buffered(&self) -> usize {
        self.avail - self.cursor
    }

    /// Whether the source has signalled end-of-stream.
    pub fn is_eof(&self) -> bool {
        self.eof && self.cursor == self.avail
    }

    pub fn get_ref(&self) -> &S {
        &self.source
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.source
    }
}

impl<S: ByteSource> BodyRead for BufferedReader<S> {
    fn fill_span(&mut self) -> Result<&[u8]> {
        if self.cursor == self.avail && !self.eof {
            let len = self
                .source
                .next(self.cursor, true)
                .map_err(StreamError::Source)?
                .len();
            self.cursor = 0;
            self.avail = len;
            if len == 0 {
                tracing::trace!("Byte source exhausted");
                self.eof = true;
            }
        }
        Ok(&self.source.span()[self.cursor..self.avail])
    }

    fn consume(&mut self, amount: usize) {
        debug_assert!(amount <= self.avail - self.cursor);
        self.cursor = (self.cursor + amount).min(self.avail);
    }

    fn read_byte(&mut self) -> Result<Option<u8>> {
        if self.cursor == self.avail && self.fill_span()?.is_empty() {
            return Ok(None);
        }
        let byte = self.source.span()[self.cursor];
        self.cursor += 1;
        Ok(Some(byte))
    }

    fn commit(&mut self) -> Result<()> {
        if self.cursor == 0 {
            return Ok(());
        }
        self.source
            .next(self.cursor, false)
            .map_err(StreamError::Source)?;
        // The source restarts right after the committed bytes
        self.cursor = 0;
        self.avail = 0;
        Ok(())
    }
}

impl<S: ByteSource> Drop for BufferedReader<S> {
    fn drop(&mut self) {
        if let Err(e) = self.commit() {
            tracing::debug!("Best-effort commit on drop failed: {}", e);
        }
    }
}

impl_std_read!(BufferedReader<S: ByteSource>);
