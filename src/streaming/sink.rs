//! Push side of the transport boundary.
//!
//! Every writer decorator in this crate is itself a `ByteSink`, so they stack.

use bytes::BytesMut;
use std::io::{self, Write};

use crate::error::{Result, StreamError};

/// Destination for outgoing body bytes.
///
/// An `Err` from any method is a permanent failure for that sink instance.
pub trait ByteSink {
    fn write(&mut self, bytes: &[u8]) -> Result<()>;

    fn write_byte(&mut self, byte: u8) -> Result<()> {
        self.write(&[byte])
    }

    /// Pushes anything held in intermediate buffers further down.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    /// Signals that no more data follows.
    fn close(&mut self) -> Result<()> {
        self.flush()
    }
}

impl<K: ByteSink + ?Sized> ByteSink for &mut K {
    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).write(bytes)
    }

    fn write_byte(&mut self, byte: u8) -> Result<()> {
        (**self).write_byte(byte)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}

impl<K: ByteSink + ?Sized> ByteSink for Box<K> {
    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).write(bytes)
    }

    fn write_byte(&mut self, byte: u8) -> Result<()> {
        (**self).write_byte(byte)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}

impl ByteSink for Vec<u8> {
    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.extend_from_slice(bytes);
        Ok(())
    }
}

impl ByteSink for BytesMut {
    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.extend_from_slice(bytes);
        Ok(())
    }
}

/// Sink over any `std::io::Write`. Closing flushes; the writer itself is
/// closed when it is dropped.
#[derive(Debug)]
pub struct IoSink<W> {
    inner: W,
}

impl<W: Write> IoSink<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> ByteSink for IoSink<W> {
    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner.write_all(bytes).map_err(StreamError::Sink)
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush().map_err(StreamError::Sink)
    }
}

/// Boolean-returning sink built from a closure.
///
/// The closure receives `Some(bytes)` for data and `None` for end-of-stream,
/// and returns `false` to report a failed transport.
pub struct FnSink<F> {
    f: F,
}

impl<F> FnSink<F>
where
    F: FnMut(Option<&[u8]>) -> bool,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> ByteSink for FnSink<F>
where
    F: FnMut(Option<&[u8]>) -> bool,
{
    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        // An empty span would read as end-of-stream on the other side.
        if bytes.is_empty() || (self.f)(Some(bytes)) {
            Ok(())
        } else {
            Err(StreamError::Sink(io::Error::other("sink rejected write")))
        }
    }

    fn close(&mut self) -> Result<()> {
        if (self.f)(None) {
            Ok(())
        } else {
            Err(StreamError::Sink(io::Error::other("sink rejected close")))
        }
    }
}

/// Sink that never reports errors.
///
/// Wraps a reporting sink for callers whose transport cannot surface write
/// failures. The first failure is logged, after which every call is a no-op.
#[derive(Debug)]
pub struct Lossy<K> {
    inner: K,
    failed: bool,
}

impl<K: ByteSink> Lossy<K> {
    pub fn new(inner: K) -> Self {
        Self {
            inner,
            failed: false,
        }
    }

    /// Whether the wrapped sink has failed and output is being discarded.
    pub fn failed(&self) -> bool {
        self.failed
    }

    pub fn get_ref(&self) -> &K {
        &self.inner
    }

    fn absorb(&mut self, result: Result<()>) -> Result<()> {
        if let Err(e) = result {
            tracing::warn!("Discarding output after sink failure: {}", e);
            self.failed = true;
        }
        Ok(())
    }
}

impl<K: ByteSink> ByteSink for Lossy<K> {
    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        if self.failed {
            return Ok(());
        }
        let result = self.inner.write(bytes);
        self.absorb(result)
    }

    fn flush(&mut self) -> Result<()> {
        if self.failed {
            return Ok(());
        }
        let result = self.inner.flush();
        self.absorb(result)
    }

    fn close(&mut self) -> Result<()> {
        if self.failed {
            return Ok(());
        }
        let result = self.inner.close();
        self.absorb(result)
    }
}
