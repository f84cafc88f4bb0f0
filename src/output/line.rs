//! Line splitting for captured child output.
//!
//! Each captured stream owns a fixed-size [`LineBuffer`]. Reads append raw
//! bytes; flushing emits every complete line as one log record and keeps the
//! unterminated tail for the next read.

use std::io;

use super::{LogSink, Severity};

/// Size of a line buffer, including the reserved byte.
pub const LINE_CAPACITY: usize = 1024;

/// Bytes a buffer can hold before it is force-flushed.
const USABLE: usize = LINE_CAPACITY - 1;

/// A source that can be read without blocking.
pub trait TryRead {
    /// Read into `buf`, returning `ErrorKind::WouldBlock` when no data is
    /// available.
    ///
    /// # Errors
    ///
    /// Returns any I/O error from the underlying source.
    fn try_read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

impl TryRead for tokio::net::unix::pipe::Receiver {
    fn try_read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        tokio::net::unix::pipe::Receiver::try_read(self, buf)
    }
}

/// Fixed-capacity accumulator that turns a byte stream into lines.
///
/// The filled length is always below [`LINE_CAPACITY`].
#[derive(Debug, Clone)]
pub struct LineBuffer {
    buf: Box<[u8; LINE_CAPACITY]>,
    len: usize,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl LineBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buf: Box::new([0; LINE_CAPACITY]),
            len: 0,
        }
    }

    /// Number of buffered bytes not yet emitted.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Buffered bytes not yet emitted.
    #[must_use]
    pub fn pending(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Perform one non-blocking read into the free space.
    ///
    /// Returns the number of bytes appended. A would-block condition
    /// appends nothing; any other error is logged and also appends nothing.
    pub fn fill<R, L>(&mut self, source: &mut R, sink: &L) -> usize
    where
        R: TryRead + ?Sized,
        L: LogSink + ?Sized,
    {
        match source.try_read(&mut self.buf[self.len..USABLE]) {
            Ok(read) => {
                self.len += read;
                read
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => 0,
            Err(e) => {
                sink.log(Severity::Error, &format!("read: {e}"));
                0
            }
        }
    }

    /// Emit every complete line at `severity` and compact the remainder.
    ///
    /// A buffer that is full without any newline is emitted whole and
    /// cleared, so a stream that never sends a newline still makes
    /// progress.
    pub fn flush<L>(&mut self, severity: Severity, sink: &L)
    where
        L: LogSink + ?Sized,
    {
        let mut start = 0;
        while let Some(offset) = self.buf[start..self.len].iter().position(|&b| b == b'\n') {
            let end = start + offset;
            emit(&self.buf[start..end], severity, sink);
            start = end + 1;
        }

        if start > 0 {
            self.buf.copy_within(start..self.len, 0);
            self.len -= start;
        }

        if self.len == USABLE {
            emit(&self.buf[..self.len], severity, sink);
            self.len = 0;
        }
    }

    /// Emit an unterminated remainder, if any.
    ///
    /// Only meant for shutdown, after the final [`flush`](Self::flush).
    pub fn finish<L>(&mut self, severity: Severity, sink: &L)
    where
        L: LogSink + ?Sized,
    {
        if self.len > 0 {
            emit(&self.buf[..self.len], severity, sink);
            self.len = 0;
        }
    }
}

fn emit<L: LogSink + ?Sized>(line: &[u8], severity: Severity, sink: &L) {
    sink.log(severity, &String::from_utf8_lossy(line));
}
