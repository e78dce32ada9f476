//! Buffered stream over any readable source
use super::{Stream, PAD};
use crate::Error;

use std::io::Read;

#[cfg(feature = "flate2")]
use flate2::read::GzDecoder;

const READ_CHUNK: usize = 8 * 1024;

/// [BufferedStream] keeps a sliding window over any [Read]
/// implementation: plain files, standard input, or gzip streams.
/// Discarded bytes are compacted away, the buffer doubles when a
/// request outgrows it, and the [PAD] zeros past the window are
/// re-established after every refill.
pub struct BufferedStream<R: Read> {
    inner: R,
    buf: Vec<u8>,
    start: usize,
    end: usize,
    eof: bool,
}

impl<R: Read> BufferedStream<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: vec![0; READ_CHUNK + PAD],
            start: 0,
            end: 0,
            eof: false,
        }
    }
}

impl BufferedStream<std::io::Stdin> {
    /// Stream over standard input
    pub fn stdin() -> Self {
        Self::new(std::io::stdin())
    }
}

#[cfg(feature = "flate2")]
impl<R: Read> BufferedStream<GzDecoder<R>> {
    /// Stream decompressing gzip'ed input on the fly
    pub fn gzip(inner: R) -> Self {
        Self::new(GzDecoder::new(inner))
    }
}

impl<R: Read> Stream for BufferedStream<R> {
    fn advance(&mut self, req: usize, step: usize) -> Result<usize, Error> {
        self.start = (self.start + step).min(self.end);
        while self.end - self.start < req && !self.eof {
            if self.start > 0 {
                self.buf.copy_within(self.start..self.end, 0);
                self.end -= self.start;
                self.start = 0;
            }
            let missing = req - self.end;
            let chunk = missing.max(READ_CHUNK);
            if self.buf.len() < self.end + chunk + PAD {
                let required = self.end + chunk + PAD;
                let doubled = self.buf.len() * 2;
                self.buf.resize(required.max(doubled), 0);
            }
            let read = self.inner.read(&mut self.buf[self.end..self.end + chunk])?;
            if read == 0 {
                self.eof = true;
            } else {
                self.end += read;
            }
        }
        // compaction and short reads may leave stale bytes where the
        // padding contract expects zeros
        for slot in &mut self.buf[self.end..self.end + PAD] {
            *slot = 0;
        }
        Ok(self.end - self.start)
    }

    fn window(&self) -> &[u8] {
        &self.buf[self.start..self.end + PAD]
    }

    fn len(&self) -> usize {
        self.end - self.start
    }
}
