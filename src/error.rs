use std::fmt;
use std::io;
use thiserror::Error;

/// Errors produced by the body transfer layer.
#[derive(Error, Debug)]
pub enum StreamError {
    /// The byte source failed while pulling or committing a span.
    #[error("Source read failed: {0}")]
    Source(#[source] io::Error),

    /// The byte sink rejected a write. The writer is unusable afterwards.
    #[error("Sink write failed: {0}")]
    Sink(#[source] io::Error),

    /// A previous sink failure left this writer permanently errored.
    #[error("Writer is errored after an earlier sink failure")]
    Poisoned,

    /// The writer was already closed.
    #[error("Write after close")]
    Closed,

    /// The chunked body was malformed or truncated.
    #[error("Invalid chunked body: {0}")]
    Chunk(ChunkError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, StreamError>;

impl From<StreamError> for io::Error {
    fn from(err: StreamError) -> Self {
        match err {
            StreamError::Source(e) | StreamError::Sink(e) | StreamError::Io(e) => e,
            chunk @ StreamError::Chunk(_) => io::Error::new(io::ErrorKind::InvalidData, chunk),
            poisoned @ StreamError::Poisoned => io::Error::new(io::ErrorKind::BrokenPipe, poisoned),
            other => io::Error::other(other),
        }
    }
}

/// Chunk-size line parser states.
///
/// The header is complete once the LF after the size is consumed; the parser
/// then resets to `SkipLeadingWhitespace` for the next chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderState {
    SkipLeadingWhitespace,
    AccumulateHexDigits,
    SkipExtension,
    ExpectCR,
    ExpectLF,
}

impl fmt::Display for HeaderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HeaderState::SkipLeadingWhitespace => "skipping whitespace before chunk size",
            HeaderState::AccumulateHexDigits => "reading chunk size digits",
            HeaderState::SkipExtension => "skipping chunk extension",
            HeaderState::ExpectCR => "expecting CR after chunk size",
            HeaderState::ExpectLF => "expecting LF after chunk size",
        };
        f.write_str(name)
    }
}

/// Where in a chunked body a [`ChunkError`] was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkLocation {
    Header(HeaderState),
    /// Inside a payload or its CRLF terminator
    Payload,
    /// Inside the trailer section after the terminal chunk
    Trailer,
}

impl fmt::Display for ChunkLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChunkLocation::Header(state) => fmt::Display::fmt(state, f),
            ChunkLocation::Payload => f.write_str("reading chunk payload"),
            ChunkLocation::Trailer => f.write_str("reading trailer section"),
        }
    }
}

/// Why a chunked body was rejected. Once recorded on a decoder it never clears.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkError {
    #[error("unexpected byte 0x{byte:02x} while {at}")]
    Malformed { byte: u8, at: ChunkLocation },

    #[error("stream ended while {at}")]
    Truncated { at: ChunkLocation },

    #[error("chunk size {size} exceeds limit {limit}")]
    Oversized { size: u64, limit: u64 },

    #[error("chunk payload not followed by CRLF (got 0x{byte:02x})")]
    BadTerminator { byte: u8 },

    #[error("trailer section exceeds {limit} fields")]
    TooManyTrailers { limit: usize },
}

impl From<ChunkError> for StreamError {
    fn from(err: ChunkError) -> Self {
        StreamError::Chunk(err)
    }
}
