//! Byte-stream pipeline for HTTP/1.1 message bodies.
//!
//! Transport adapters sit at the bottom, decorators stack on top:
//!
//! ```text
//! Read side:
//! +------------+     +----------------+     +-------------------------------+
//! | ByteSource | --> | BufferedReader | --> | LimitedReader | ChunkedReader |
//! +------------+     +----------------+     +-------------------------------+
//!
//! Write side:
//! +-------------------------------+     +----------------+     +----------+
//! | LimitedWriter | ChunkedWriter | --> | BufferedWriter | --> | ByteSink |
//! +-------------------------------+     +----------------+     +----------+
//! ```
//!
//! All writers are [`ByteSink`]s and all readers are [`BodyRead`]ers, so any
//! decorator can wrap any other. Everything here is synchronous: a call only
//! blocks when the transport underneath blocks.

pub mod buffered;
pub mod decoder;
pub mod encoder;
pub mod limited;
pub mod sink;
pub mod source;

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use buffered::{BufferedReader, BufferedWriter, DEFAULT_WRITE_BUFFER_SIZE};
pub use decoder::ChunkedReader;
pub use encoder::{ChunkHeader, ChunkedWriter, DEFAULT_CHUNK_SIZE};
pub use limited::{LimitedReader, LimitedWriter};
pub use sink::{ByteSink, FnSink, IoSink, Lossy};
pub use source::{ByteSource, IoSource, SliceSource, DEFAULT_READ_BUFFER_SIZE};

/// How the end of a chunked body is framed on the wire.
///
/// `Compact` ends the body with the bare `0\r\n` terminal header and never
/// reads past it. `Rfc7230` appends the (empty) trailer section and its final
/// CRLF when writing, and accepts chunk extensions and trailer fields when
/// reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkFraming {
    #[default]
    Compact,
    Rfc7230,
}

/// Pull-side interface shared by every reader decorator.
///
/// Modeled on a span pull/commit protocol: [`fill_span`](Self::fill_span)
/// exposes the bytes currently available without consuming them, and
/// [`consume`](Self::consume) marks a prefix of that span as processed.
pub trait BodyRead {
    /// Returns the current unconsumed span. A new span is pulled only when the
    /// current one is exhausted. An empty span means end-of-stream.
    fn fill_span(&mut self) -> Result<&[u8]>;

    /// Marks `amount` bytes of the current span as consumed.
    fn consume(&mut self, amount: usize);

    /// Pushes consumed-byte accounting down to the underlying source.
    fn commit(&mut self) -> Result<()>;

    /// Consumes `processed` bytes of the previous span and returns the next one.
    fn peek_span(&mut self, processed: usize) -> Result<&[u8]> {
        self.consume(processed);
        self.fill_span()
    }

    /// Reads one byte. `None` is the end-of-stream sentinel.
    fn read_byte(&mut self) -> Result<Option<u8>> {
        let byte = match self.fill_span()?.first() {
            Some(&byte) => byte,
            None => return Ok(None),
        };
        self.consume(1);
        Ok(Some(byte))
    }

    /// Copies up to `buf.len()` bytes out of the current span.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let span = self.fill_span()?;
        let n = span.len().min(buf.len());
        buf[..n].copy_from_slice(&span[..n]);
        self.consume(n);
        Ok(n)
    }

    /// Reads until end-of-stream, appending to `out`. Returns the bytes added.
    fn read_to_end(&mut self, out: &mut Vec<u8>) -> Result<usize> {
        let start = out.len();
        loop {
            let span = self.fill_span()?;
            if span.is_empty() {
                break;
            }
            let n = span.len();
            out.extend_from_slice(span);
            self.consume(n);
        }
        Ok(out.len() - start)
    }
}

impl<R: BodyRead + ?Sized> BodyRead for &mut R {
    fn fill_span(&mut self) -> Result<&[u8]> {
        (**self).fill_span()
    }

    fn consume(&mut self, amount: usize) {
        (**self).consume(amount)
    }

    fn commit(&mut self) -> Result<()> {
        (**self).commit()
    }
}

/// Moves every remaining byte from `reader` into `writer` span by span.
/// The writer is not flushed or closed.
pub fn copy<R, W>(reader: &mut R, writer: &mut W) -> Result<u64>
where
    R: BodyRead + ?Sized,
    W: ByteSink + ?Sized,
{
    let mut total = 0u64;
    loop {
        let span = reader.fill_span()?;
        if span.is_empty() {
            break;
        }
        let n = span.len();
        writer.write(span)?;
        reader.consume(n);
        total += n as u64;
    }
    Ok(total)
}

/// Implements `std::io::Read` and `std::io::BufRead` on top of [`BodyRead`].
macro_rules! impl_std_read {
    ($name:ident<$param:ident: $bound:path>) => {
        impl<$param: $bound> std::io::Read for $name<$param> {
            fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
                Ok($crate::streaming::BodyRead::read(self, buf)?)
            }
        }

        impl<$param: $bound> std::io::BufRead for $name<$param> {
            fn fill_buf(&mut self) -> std::io::Result<&[u8]> {
                Ok($crate::streaming::BodyRead::fill_span(self)?)
            }

            fn consume(&mut self, amt: usize) {
                $crate::streaming::BodyRead::consume(self, amt)
            }
        }
    };
}

/// Implements `std::io::Write` on top of [`ByteSink`].
macro_rules! impl_std_write {
    ($name:ident<$param:ident: $bound:path>) => {
        impl<$param: $bound> std::io::Write for $name<$param> {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                $crate::streaming::ByteSink::write(self, buf)?;
                Ok(buf.len())
            }

            fn flush(&mut self) -> std::io::Result<()> {
                Ok($crate::streaming::ByteSink::flush(self)?)
            }
        }
    };
}

pub(crate) use impl_std_read;
pub(crate) use impl_std_write;

#[cfg(test)]
pub(crate) mod test_support {
    use super::ByteSink;
    use crate::error::{Result, StreamError};
    use std::io;

    /// Sink that records every call it receives, optionally failing after a
    /// number of successful writes.
    #[derive(Debug, Default)]
    pub struct RecordingSink {
        pub writes: Vec<Vec<u8>>,
        pub flushes: usize,
        pub closed: bool,
        pub fail_after: Option<usize>,
    }

    impl RecordingSink {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing_after(writes: usize) -> Self {
            Self {
                fail_after: Some(writes),
                ..Self::default()
            }
        }

        pub fn bytes(&self) -> Vec<u8> {
            self.writes.concat()
        }
    }

    impl ByteSink for RecordingSink {
        fn write(&mut self, bytes: &[u8]) -> Result<()> {
            if let Some(limit) = self.fail_after {
                if self.writes.len() >= limit {
                    return Err(StreamError::Sink(io::Error::new(
                        io::ErrorKind::BrokenPipe,
                        "recording sink refused write",
                    )));
                }
            }
            self.writes.push(bytes.to_vec());
            Ok(())
        }

        fn flush(&mut self) -> Result<()> {
            self.flushes += 1;
            Ok(())
        }

        fn close(&mut self) -> Result<()> {
            self.closed = true;
            Ok(())
        }
    }
}
