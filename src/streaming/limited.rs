//! Content-Length bounded streams.
//!
//! Both decorators carry a byte budget that only ever shrinks. Running out of
//! budget is not an error: the writer drops the excess, the reader reports
//! end-of-stream and leaves the rest of the source untouched.

use super::sink::ByteSink;
use super::{impl_std_read, impl_std_write, BodyRead};
use crate::error::Result;

/// Passes at most `limit` bytes to the wrapped writer and discards the rest.
pub struct LimitedWriter<K: ByteSink> {
    inner: K,
    remaining: u64,
    discarded: u64,
}

impl<K: ByteSink> LimitedWriter<K> {
    pub fn new(inner: K, limit: u64) -> Self {
        Self {
            inner,
            remaining: limit,
            discarded: 0,
        }
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }

    /// Bytes offered beyond the budget and dropped.
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    pub fn get_ref(&self) -> &K {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut K {
        &mut self.inner
    }
}

impl<K: ByteSink> ByteSink for LimitedWriter<K> {
    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let allowed = self.remaining.min(bytes.len() as u64) as usize;
        if allowed < bytes.len() {
            let dropped = bytes.len() - allowed;
            tracing::trace!("Dropping {} bytes past the content length", dropped);
            self.discarded += dropped as u64;
        }
        if allowed == 0 {
            return Ok(());
        }

        self.inner.write(&bytes[..allowed])?;
        self.remaining -= allowed as u64;
        Ok(())
    }

    fn write_byte(&mut self, byte: u8) -> Result<()> {
        if self.remaining == 0 {
            self.discarded += 1;
            return Ok(());
        }
        self.inner.write_byte(byte)?;
        self.remaining -= 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush()
    }

    fn close(&mut self) -> Result<()> {
        self.inner.close()
    }
}

impl_std_write!(LimitedWriter<K: ByteSink>);

/// Exposes at most `limit` bytes of the wrapped reader.
///
/// Once the budget is spent the reader stops pulling, so bytes that belong to
/// the next message on the same connection are never consumed.
pub struct LimitedReader<R: BodyRead> {
    inner: R,
    remaining: u64,
}

impl<R: BodyRead> LimitedReader<R> {
    pub fn new(inner: R, limit: u64) -> Self {
        Self {
            inner,
            remaining: limit,
        }
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }
}

impl<R: BodyRead> BodyRead for LimitedReader<R> {
    fn fill_span(&mut self) -> Result<&[u8]> {
        if self.remaining == 0 {
            return Ok(&[]);
        }
        let span = self.inner.fill_span()?;
        let len = (span.len() as u64).min(self.remaining) as usize;
        Ok(&span[..len])
    }

    fn consume(&mut self, amount: usize) {
        let amount = (amount as u64).min(self.remaining);
        self.inner.consume(amount as usize);
        self.remaining -= amount;
    }

    fn commit(&mut self) -> Result<()> {
        self.inner.commit()
    }
}

impl_std_read!(LimitedReader<R: BodyRead>);
