//! Chunked transfer-encoding writer.
//!
//! Wire format: `<hex-size>\r\n<payload>\r\n` per chunk, then the terminal
//! `0\r\n` header. In RFC 7230 framing the terminal header is followed by an
//! empty trailer section (`\r\n`).

use bytes::BytesMut;

use super::sink::ByteSink;
use super::{impl_std_write, ChunkFraming};
use crate::error::{Result, StreamError};

/// Default chunk-assembly buffer (4KB)
pub const DEFAULT_CHUNK_SIZE: usize = 4 * 1024;

const CRLF: &[u8] = b"\r\n";
const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

/// 16 hex digits cover any u64, plus CRLF
const MAX_HEADER_LEN: usize = 16 + 2;

/// A rendered chunk-size line: uppercase hex, no leading zeros, CRLF.
#[derive(Debug, Clone, Copy)]
pub struct ChunkHeader {
    buf: [u8; MAX_HEADER_LEN],
    start: usize,
}

impl ChunkHeader {
    pub fn new(size: u64) -> Self {
        let mut buf = [0u8; MAX_HEADER_LEN];
        let mut start = MAX_HEADER_LEN - CRLF.len();
        buf[start..].copy_from_slice(CRLF);

        let mut n = size;
        loop {
            start -= 1;
            buf[start] = HEX_DIGITS[(n & 0xF) as usize];
            n >>= 4;
            if n == 0 {
                break;
            }
        }
        Self { buf, start }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[self.start..]
    }
}

/// Frames everything written to it as chunked transfer-encoding.
///
/// Small writes are collected in a chunk-assembly buffer so they go out as
/// one chunk. A write that alone exceeds the buffer capacity is emitted as a
/// standalone chunk without being copied. Closing emits the terminal chunk
/// but leaves the downstream sink open, so the connection can carry the next
/// message.
pub struct ChunkedWriter<K: ByteSink> {
    sink: K,
    buf: BytesMut,
    capacity: usize,
    framing: ChunkFraming,
    closed: bool,
    failed: bool,
    chunks_written: u64,
    bytes_written: u64,
}

impl<K: ByteSink> ChunkedWriter<K> {
    pub fn new(sink: K) -> Self {
        Self::with_options(sink, DEFAULT_CHUNK_SIZE, ChunkFraming::default())
    }

    pub fn with_options(sink: K, chunk_size: usize, framing: ChunkFraming) -> Self {
        let capacity = chunk_size.max(1);
        Self {
            sink,
            buf: BytesMut::with_capacity(capacity),
            capacity,
            framing,
            closed: false,
            failed: false,
            chunks_written: 0,
            bytes_written: 0,
        }
    }

    /// Data chunks emitted so far, not counting the terminal chunk.
    pub fn chunks_written(&self) -> u64 {
        self.chunks_written
    }

    /// Payload bytes emitted so far.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn is_failed(&self) -> bool {
        self.failed
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

    /// Header, payload, CRLF: three sink calls.
    fn emit_chunk(sink: &mut K, payload: &[u8]) -> Result<()> {
        let header = ChunkHeader::new(payload.len() as u64);
        sink.write(header.as_bytes())?;
        sink.write(payload)?;
        sink.write(CRLF)
    }

    fn record(&mut self, result: Result<()>, len: usize) -> Result<()> {
        match result {
            Ok(()) => {
                self.chunks_written += 1;
                self.bytes_written += len as u64;
                tracing::trace!("Emitted chunk of {} bytes", len);
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Chunked writer failed: {}", e);
                self.failed = true;
                Err(e)
            }
        }
    }

    /// Emits the assembly buffer as one chunk. An empty buffer emits nothing,
    /// since a zero-size chunk would end the body.
    fn flush_chunk(&mut self) -> Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let len = self.buf.len();
        let result = Self::emit_chunk(&mut self.sink, &self.buf);
        self.buf.clear();
        self.record(result, len)
    }

    fn guard(&mut self, result: Result<()>) -> Result<()> {
        if let Err(ref e) = result {
            tracing::warn!("Chunked writer failed: {}", e);
            self.failed = true;
        }
        result
    }
}

impl<K: ByteSink> ByteSink for ChunkedWriter<K> {
    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.check()?;
        if bytes.is_empty() {
            return Ok(());
        }

        if self.buf.len() + bytes.len() <= self.capacity {
            self.buf.extend_from_slice(bytes);
            return Ok(());
        }

        self.flush_chunk()?;

        if bytes.len() > self.capacity {
            let result = Self::emit_chunk(&mut self.sink, bytes);
            return self.record(result, bytes.len());
        }

        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    fn write_byte(&mut self, byte: u8) -> Result<()> {
        self.write(&[byte])
    }

    /// Emits any pending bytes as a chunk and flushes the sink.
    fn flush(&mut self) -> Result<()> {
        self.check()?;
        self.flush_chunk()?;
        let result = self.sink.flush();
        self.guard(result)
    }

    /// Emits the pending chunk and the terminal chunk. Idempotent.
    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.check()?;
        self.flush_chunk()?;

        let terminal: &[u8] = match self.framing {
            ChunkFraming::Compact => b"0\r\n",
            ChunkFraming::Rfc7230 => b"0\r\n\r\n",
        };
        let result = self.sink.write(terminal);
        self.guard(result)?;
        let result = self.sink.flush();
        self.guard(result)?;

        self.closed = true;
        tracing::debug!(
            "Chunked body complete: {} chunks, {} bytes",
            self.chunks_written,
            self.bytes_written
        );
        Ok(())
    }
}

impl<K: ByteSink> Drop for ChunkedWriter<K> {
    fn drop(&mut self) {
        if self.closed || self.failed || self.buf.is_empty() {
            return;
        }
        if let Err(e) = self.flush_chunk() {
            tracing::debug!("Best-effort chunk flush on drop failed: {}", e);
        }
    }
}

impl_std_write!(ChunkedWriter<K: ByteSink>);
