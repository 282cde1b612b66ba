//! Body framing: picks the decorator stack for one message body.
//!
//! The HTTP layer decides how a body is delimited (from `Transfer-Encoding`
//! and `Content-Length`); this module turns that decision into a reader or
//! writer:
//!
//! | Framing      | Stack                     |
//! |--------------|---------------------------|
//! | `Chunked`    | Buffered + Chunked        |
//! | `Length(n)`  | Buffered + Limited(n)     |
//! | `UntilClose` | Buffered                  |

use crate::config::StreamConfig;
use crate::error::Result;
use crate::streaming::{
    impl_std_read, impl_std_write, BodyRead, BufferedReader, BufferedWriter, ByteSink,
    ByteSource, ChunkedReader, ChunkedWriter, LimitedReader, LimitedWriter,
};

/// How the end of a message body is determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// `Transfer-Encoding: chunked`
    Chunked,
    /// `Content-Length: n`
    Length(u64),
    /// Body runs until the connection closes
    UntilClose,
}

// =============================================================================
// BodyWriter
// =============================================================================

pub enum BodyWriter<K: ByteSink> {
    Chunked(ChunkedWriter<BufferedWriter<K>>),
    Length(LimitedWriter<BufferedWriter<K>>),
    UntilClose(BufferedWriter<K>),
}

impl<K: ByteSink> BodyWriter<K> {
    pub fn new(sink: K, framing: Framing, config: &StreamConfig) -> Self {
        let buffered = BufferedWriter::with_capacity(config.write_buffer_size, sink);
        match framing {
            Framing::Chunked => BodyWriter::Chunked(ChunkedWriter::with_options(
                buffered,
                config.chunk_size,
                config.framing,
            )),
            Framing::Length(len) => BodyWriter::Length(LimitedWriter::new(buffered, len)),
            Framing::UntilClose => BodyWriter::UntilClose(buffered),
        }
    }

    pub fn framing(&self) -> Framing {
        match self {
            BodyWriter::Chunked(_) => Framing::Chunked,
            BodyWriter::Length(w) => Framing::Length(w.remaining()),
            BodyWriter::UntilClose(_) => Framing::UntilClose,
        }
    }

    /// The transport sink underneath the decorators.
    pub fn transport(&self) -> &K {
        match self {
            BodyWriter::Chunked(w) => w.get_ref().get_ref(),
            BodyWriter::Length(w) => w.get_ref().get_ref(),
            BodyWriter::UntilClose(w) => w.get_ref(),
        }
    }
}

impl<K: ByteSink> ByteSink for BodyWriter<K> {
    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        match self {
            BodyWriter::Chunked(w) => w.write(bytes),
            BodyWriter::Length(w) => w.write(bytes),
            BodyWriter::UntilClose(w) => w.write(bytes),
        }
    }

    fn write_byte(&mut self, byte: u8) -> Result<()> {
        match self {
            BodyWriter::Chunked(w) => w.write_byte(byte),
            BodyWriter::Length(w) => w.write_byte(byte),
            BodyWriter::UntilClose(w) => w.write_byte(byte),
        }
    }

    fn flush(&mut self) -> Result<()> {
        match self {
            BodyWriter::Chunked(w) => w.flush(),
            BodyWriter::Length(w) => w.flush(),
            BodyWriter::UntilClose(w) => w.flush(),
        }
    }

    /// Ends the body. Only `UntilClose` closes the transport; the other
    /// framings leave the connection open for the next message.
    fn close(&mut self) -> Result<()> {
        match self {
            BodyWriter::Chunked(w) => w.close(),
            BodyWriter::Length(w) => {
                if !w.is_exhausted() {
                    tracing::warn!(
                        "Content-Length body ended {} bytes short",
                        w.remaining()
                    );
                }
                w.flush()
            }
            BodyWriter::UntilClose(w) => w.close(),
        }
    }
}

impl_std_write!(BodyWriter<K: ByteSink>);

// =============================================================================
// BodyReader
// =============================================================================

pub enum BodyReader<S: ByteSource> {
    Chunked(ChunkedReader<BufferedReader<S>>),
    Length(LimitedReader<BufferedReader<S>>),
    UntilClose(BufferedReader<S>),
}

impl<S: ByteSource> BodyReader<S> {
    pub fn new(source: S, framing: Framing, config: &StreamConfig) -> Self {
        let buffered = BufferedReader::new(source);
        match framing {
            Framing::Chunked => BodyReader::Chunked(ChunkedReader::with_options(
                buffered,
                config.framing,
                config.max_chunk_size,
            )),
            Framing::Length(len) => BodyReader::Length(LimitedReader::new(buffered, len)),
            Framing::UntilClose => BodyReader::UntilClose(buffered),
        }
    }

    /// True only for a chunked body that was malformed or truncated.
    pub fn invalid_chunk(&self) -> bool {
        match self {
            BodyReader::Chunked(r) => r.invalid_chunk(),
            _ => false,
        }
    }

    /// The transport source underneath the decorators.
    pub fn transport(&self) -> &S {
        match self {
            BodyReader::Chunked(r) => r.get_ref().get_ref(),
            BodyReader::Length(r) => r.get_ref().get_ref(),
            BodyReader::UntilClose(r) => r.get_ref(),
        }
    }
}

impl<S: ByteSource> BodyRead for BodyReader<S> {
    fn fill_span(&mut self) -> Result<&[u8]> {
        match self {
            BodyReader::Chunked(r) => r.fill_span(),
            BodyReader::Length(r) => r.fill_span(),
            BodyReader::UntilClose(r) => r.fill_span(),
        }
    }

    fn consume(&mut self, amount: usize) {
        match self {
            BodyReader::Chunked(r) => r.consume(amount),
            BodyReader::Length(r) => r.consume(amount),
            BodyReader::UntilClose(r) => r.consume(amount),
        }
    }

    fn read_byte(&mut self) -> Result<Option<u8>> {
        match self {
            BodyReader::Chunked(r) => r.read_byte(),
            BodyReader::Length(r) => r.read_byte(),
            BodyReader::UntilClose(r) => r.read_byte(),
        }
    }

    fn commit(&mut self) -> Result<()> {
        match self {
            BodyReader::Chunked(r) => r.commit(),
            BodyReader::Length(r) => r.commit(),
            BodyReader::UntilClose(r) => r.commit(),
        }
    }
}

impl_std_read!(BodyReader<S: ByteSource>);
