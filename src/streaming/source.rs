//! Pull side of the transport boundary.

use std::io::{self, BufRead, BufReader, Read};

/// Default read-ahead for [`IoSource`] (8KB)
pub const DEFAULT_READ_BUFFER_SIZE: usize = 8 * 1024;

/// A transport that hands out bytes in spans.
///
/// Each call commits `processed` bytes of the previously returned span.
/// With `want_more` the source also returns the span that starts right after
/// the committed bytes; an empty span then means end-of-stream. Without
/// `want_more` the call only commits and returns an empty span.
pub trait ByteSource {
    fn next(&mut self, processed: usize, want_more: bool) -> io::Result<&[u8]>;

    /// The span returned by the most recent call to [`next`](Self::next).
    fn span(&self) -> &[u8];
}

impl<S: ByteSource + ?Sized> ByteSource for &mut S {
    fn next(&mut self, processed: usize, want_more: bool) -> io::Result<&[u8]> {
        (**self).next(processed, want_more)
    }

    fn span(&self) -> &[u8] {
        (**self).span()
    }
}

impl<S: ByteSource + ?Sized> ByteSource for Box<S> {
    fn next(&mut self, processed: usize, want_more: bool) -> io::Result<&[u8]> {
        (**self).next(processed, want_more)
    }

    fn span(&self) -> &[u8] {
        (**self).span()
    }
}

/// In-memory source over a byte slice.
///
/// `max_span` caps the length of each returned span, which lets tests feed a
/// body in arbitrarily small fragments.
#[derive(Debug, Clone)]
pub struct SliceSource<'a> {
    data: &'a [u8],
    pos: usize,
    span_len: usize,
    max_span: usize,
}

impl<'a> SliceSource<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_max_span(data, usize::MAX)
    }

    pub fn with_max_span(data: &'a [u8], max_span: usize) -> Self {
        Self {
            data,
            pos: 0,
            span_len: 0,
            max_span: max_span.max(1),
        }
    }

    /// Number of bytes committed so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes not yet committed.
    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }
}

impl ByteSource for SliceSource<'_> {
    fn next(&mut self, processed: usize, want_more: bool) -> io::Result<&[u8]> {
        debug_assert!(processed <= self.span_len);
        self.pos += processed.min(self.span_len);
        self.span_len = if want_more {
            (self.data.len() - self.pos).min(self.max_span)
        } else {
            0
        };
        Ok(&self.data[self.pos..self.pos + self.span_len])
    }

    fn span(&self) -> &[u8] {
        &self.data[self.pos..self.pos + self.span_len]
    }
}

/// Source backed by any `std::io::Read`, buffered through `std::io::BufReader`.
pub struct IoSource<R> {
    inner: BufReader<R>,
    span_len: usize,
    committed: u64,
}

impl<R: Read> IoSource<R> {
    pub fn new(reader: R) -> Self {
        Self::with_capacity(DEFAULT_READ_BUFFER_SIZE, reader)
    }

    pub fn with_capacity(capacity: usize, reader: R) -> Self {
        Self {
            inner: BufReader::with_capacity(capacity.max(1), reader),
            span_len: 0,
            committed: 0,
        }
    }

    /// Total bytes committed by the consumer.
    pub fn committed(&self) -> u64 {
        self.committed
    }

    pub fn get_ref(&self) -> &R {
        self.inner.get_ref()
    }

    /// Returns the reader. Bytes read ahead but never committed are lost.
    pub fn into_inner(self) -> R {
        self.inner.into_inner()
    }
}

impl<R: Read> ByteSource for IoSource<R> {
    fn next(&mut self, processed: usize, want_more: bool) -> io::Result<&[u8]> {
        let processed = processed.min(self.span_len);
        self.inner.consume(processed);
        self.committed += processed as u64;
        self.span_len = 0;

        if !want_more {
            return Ok(&[]);
        }

        let len = loop {
            match self.inner.fill_buf() {
                Ok(buf) => break buf.len(),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        };
        self.span_len = len;
        Ok(&self.inner.buffer()[..len])
    }

    fn span(&self) -> &[u8] {
        &self.inner.buffer()[..self.span_len]
    }
}
