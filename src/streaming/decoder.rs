//! Chunked transfer-encoding reader.
//!
//! Chunk headers are parsed one byte at a time by an explicit state machine
//! (see [`HeaderState`]). Payload bytes are served straight out of the
//! underlying reader's spans, capped at the size left in the current chunk.
//!
//! Any framing violation records a permanent [`ChunkError`]. From then on the
//! reader reports end-of-stream, and [`ChunkedReader::invalid_chunk`] lets the
//! caller tell a corrupt or truncated body apart from a clean finish.

use super::{impl_std_read, BodyRead, ChunkFraming};
use crate::error::{ChunkError, ChunkLocation, HeaderState, Result};

/// Longest trailer field line accepted in RFC 7230 framing (8KB)
const MAX_TRAILER_LINE: usize = 8 * 1024;

/// Most trailer fields accepted after the terminal chunk
const MAX_TRAILER_FIELDS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Parsing a chunk-size line
    Header,
    /// Serving payload of the current chunk
    Data,
    /// Expecting the CRLF after a payload
    Terminator,
    /// Reading trailer fields after the terminal chunk
    Trailer,
    Done,
}

/// Decodes a chunked body from the wrapped reader.
pub struct ChunkedReader<R: BodyRead> {
    inner: R,
    framing: ChunkFraming,
    max_chunk_size: Option<u64>,
    phase: Phase,
    state: HeaderState,
    acc: u64,
    remaining: u64,
    chunk_error: Option<ChunkError>,
    line: Vec<u8>,
    trailers: Vec<(String, String)>,
    chunks_read: u64,
    bytes_read: u64,
}

fn hex_value(byte: u8) -> Option<u64> {
    match byte {
        b'0'..=b'9' => Some((byte - b'0') as u64),
        b'a'..=b'f' => Some((byte - b'a' + 10) as u64),
        b'A'..=b'F' => Some((byte - b'A' + 10) as u64),
        _ => None,
    }
}

impl<R: BodyRead> ChunkedReader<R> {
    pub fn new(inner: R) -> Self {
        Self::with_options(inner, ChunkFraming::default(), None)
    }

    pub fn with_options(inner: R, framing: ChunkFraming, max_chunk_size: Option<u64>) -> Self {
        Self {
            inner,
            framing,
            max_chunk_size,
            phase: Phase::Header,
            state: HeaderState::SkipLeadingWhitespace,
            acc: 0,
            remaining: 0,
            chunk_error: None,
            line: Vec::new(),
            trailers: Vec::new(),
            chunks_read: 0,
            bytes_read: 0,
        }
    }

    /// True when the body was malformed or truncated, false while decoding
    /// and after a clean terminal chunk.
    pub fn invalid_chunk(&self) -> bool {
        self.chunk_error.is_some()
    }

    pub fn chunk_error(&self) -> Option<ChunkError> {
        self.chunk_error
    }

    /// Whether end-of-stream was reached, cleanly or not.
    pub fn is_finished(&self) -> bool {
        self.phase == Phase::Done
    }

    /// Trailer fields seen after the terminal chunk (RFC 7230 framing only).
    pub fn trailers(&self) -> &[(String, String)] {
        &self.trailers
    }

    /// Data chunks fully or partly delivered so far.
    pub fn chunks_read(&self) -> u64 {
        self.chunks_read
    }

    /// Payload bytes consumed by the caller.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Discards the rest of the body and reports whether it was valid.
    pub fn finish(mut self) -> Result<()> {
        loop {
            let n = self.fill_span()?.len();
            if n == 0 {
                break;
            }
            self.consume(n);
        }
        match self.chunk_error {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }

    fn fail(&mut self, err: ChunkError) {
        if self.chunk_error.is_none() {
            tracing::warn!("Rejecting chunked body: {}", err);
            self.chunk_error = Some(err);
        }
        self.phase = Phase::Done;
        self.remaining = 0;
    }

    fn finish_clean(&mut self) {
        tracing::debug!(
            "Chunked body complete: {} chunks, {} bytes",
            self.chunks_read,
            self.bytes_read
        );
        self.phase = Phase::Done;
    }

    /// Looks at the next byte without consuming it. End-of-stream here is
    /// always a truncation, recorded against `at`.
    fn peek_byte(&mut self, at: ChunkLocation) -> Result<Option<u8>> {
        match self.inner.fill_span().map(|span| span.first().copied()) {
            Ok(Some(byte)) => Ok(Some(byte)),
            Ok(None) => {
                self.fail(ChunkError::Truncated { at });
                Ok(None)
            }
            Err(e) => {
                self.fail(ChunkError::Truncated { at });
                Err(e)
            }
        }
    }

    fn reject(&mut self, byte: u8) -> Result<bool> {
        let at = ChunkLocation::Header(self.state);
        self.fail(ChunkError::Malformed { byte, at });
        Ok(false)
    }

    /// Runs the header state machine until a full size line was read.
    /// Returns `Ok(false)` if the body turned out to be invalid.
    fn parse_header(&mut self) -> Result<bool> {
        loop {
            let Some(byte) = self.peek_byte(ChunkLocation::Header(self.state))? else {
                return Ok(false);
            };

            match self.state {
                HeaderState::SkipLeadingWhitespace => {
                    if hex_value(byte).is_some() {
                        // The digit itself is accumulated in the next state
                        self.acc = 0;
                        self.state = HeaderState::AccumulateHexDigits;
                    } else if byte.is_ascii_whitespace() {
                        self.inner.consume(1);
                    } else {
                        return self.reject(byte);
                    }
                }
                HeaderState::AccumulateHexDigits => match hex_value(byte) {
                    Some(value) => {
                        let limit = self.max_chunk_size.unwrap_or(u64::MAX);
                        match self.acc.checked_mul(16).and_then(|a| a.checked_add(value)) {
                            Some(size) if size <= limit => self.acc = size,
                            Some(size) => {
                                self.fail(ChunkError::Oversized { size, limit });
                                return Ok(false);
                            }
                            None => {
                                self.fail(ChunkError::Oversized {
                                    size: u64::MAX,
                                    limit,
                                });
                                return Ok(false);
                            }
                        }
                        self.inner.consume(1);
                    }
                    // Re-examined as the CR position
                    None => self.state = HeaderState::ExpectCR,
                },
                HeaderState::ExpectCR => match byte {
                    b'\r' => {
                        self.inner.consume(1);
                        self.state = HeaderState::ExpectLF;
                    }
                    b';' if self.framing == ChunkFraming::Rfc7230 => {
                        self.inner.consume(1);
                        self.state = HeaderState::SkipExtension;
                    }
                    _ => return self.reject(byte),
                },
                HeaderState::SkipExtension => match byte {
                    b'\r' => {
                        self.inner.consume(1);
                        self.state = HeaderState::ExpectLF;
                    }
                    b'\n' => return self.reject(byte),
                    _ => self.inner.consume(1),
                },
                HeaderState::ExpectLF => {
                    if byte != b'\n' {
                        return self.reject(byte);
                    }
                    // Header complete: reset for the next chunk
                    self.inner.consume(1);
                    self.state = HeaderState::SkipLeadingWhitespace;
                    self.remaining = self.acc;
                    return Ok(true);
                }
            }
        }
    }

    /// Consumes the CRLF that closes a chunk payload.
    fn parse_terminator(&mut self) -> Result<bool> {
        for expected in [b'\r', b'\n'] {
            let Some(byte) = self.peek_byte(ChunkLocation::Payload)? else {
                return Ok(false);
            };
            if byte != expected {
                self.fail(ChunkError::BadTerminator { byte });
                return Ok(false);
            }
            self.inner.consume(1);
        }
        Ok(true)
    }

    /// Reads trailer lines up to and including the empty line.
    fn parse_trailers(&mut self) -> Result<bool> {
        loop {
            let Some(byte) = self.peek_byte(ChunkLocation::Trailer)? else {
                return Ok(false);
            };
            self.inner.consume(1);

            if byte != b'\n' {
                if self.line.len() >= MAX_TRAILER_LINE {
                    self.fail(ChunkError::Malformed {
                        byte,
                        at: ChunkLocation::Trailer,
                    });
                    return Ok(false);
                }
                self.line.push(byte);
                continue;
            }

            let mut line = std::mem::take(&mut self.line);
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            if line.is_empty() {
                return Ok(true);
            }

            match line.iter().position(|&b| b == b':') {
                Some(_) if self.trailers.len() >= MAX_TRAILER_FIELDS => {
                    self.fail(ChunkError::TooManyTrailers {
                        limit: MAX_TRAILER_FIELDS,
                    });
                    return Ok(false);
                }
                Some(colon) => {
                    let name = String::from_utf8_lossy(&line[..colon]).trim().to_string();
                    let value = String::from_utf8_lossy(&line[colon + 1..])
                        .trim()
                        .to_string();
                    tracing::trace!("Trailer field {}: {}", name, value);
                    self.trailers.push((name, value));
                }
                None => {
                    self.fail(ChunkError::Malformed {
                        byte,
                        at: ChunkLocation::Trailer,
                    });
                    return Ok(false);
                }
            }
        }
    }

    /// Drives framing until payload is available or the body has ended.
    fn advance(&mut self) -> Result<()> {
        loop {
            match self.phase {
                Phase::Data | Phase::Done => return Ok(()),
                Phase::Header => {
                    if !self.parse_header()? {
                        return Ok(());
                    }
                    if self.remaining > 0 {
                        self.chunks_read += 1;
                        self.phase = Phase::Data;
                    } else {
                        match self.framing {
                            ChunkFraming::Compact => self.finish_clean(),
                            ChunkFraming::Rfc7230 => self.phase = Phase::Trailer,
                        }
                    }
                }
                Phase::Terminator => {
                    if !self.parse_terminator()? {
                        return Ok(());
                    }
                    self.phase = Phase::Header;
                }
                Phase::Trailer => {
                    if !self.parse_trailers()? {
                        return Ok(());
                    }
                    self.finish_clean();
                }
            }
        }
    }
}

impl<R: BodyRead> BodyRead for ChunkedReader<R> {
    fn fill_span(&mut self) -> Result<&[u8]> {
        self.advance()?;
        if self.phase != Phase::Data {
            return Ok(&[]);
        }

        let available = match self.inner.fill_span() {
            Ok(span) => span.len(),
            Err(e) => {
                self.fail(ChunkError::Truncated {
                    at: ChunkLocation::Payload,
                });
                return Err(e);
            }
        };
        if available == 0 {
            self.fail(ChunkError::Truncated {
                at: ChunkLocation::Payload,
            });
            return Ok(&[]);
        }

        let len = (available as u64).min(self.remaining) as usize;
        // Same span as above; the inner reader only pulls when exhausted
        let span = self.inner.fill_span()?;
        Ok(&span[..len])
    }

    fn consume(&mut self, amount: usize) {
        if self.phase != Phase::Data {
            debug_assert_eq!(amount, 0);
            return;
        }
        let amount = (amount as u64).min(self.remaining);
        self.inner.consume(amount as usize);
        self.remaining -= amount;
        self.bytes_read += amount;
        if self.remaining == 0 {
            // The terminator is read lazily on the next pull
            self.phase = Phase::Terminator;
        }
    }

    fn commit(&mut self) -> Result<()> {
        self.inner.commit()
    }
}

impl_std_read!(ChunkedReader<R: BodyRead>);
