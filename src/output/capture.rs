//! Pipes that carry child output back to the supervisor.

use std::io::{self, PipeWriter};
use std::os::fd::OwnedFd;

use tokio::net::unix::pipe;

use super::{LineBuffer, LogSink, Severity};

/// Reads left to the final drain before giving up on a stream that keeps
/// producing output.
const FINAL_DRAIN_READS: usize = 64;

/// One captured stream: a pipe shared by every child, plus its line buffer.
///
/// The write end stays open for the supervisor's lifetime so the pipe never
/// reports end-of-file between children, and a partial line written by one
/// child is completed or flushed later rather than lost.
#[derive(Debug)]
pub struct CapturePipe {
    reader: pipe::Receiver,
    writer: PipeWriter,
    line: LineBuffer,
    severity: Severity,
}

impl CapturePipe {
    /// Create a pipe whose lines are logged at `severity`.
    ///
    /// Both ends are close-on-exec; the child receives a duplicate of the
    /// write end as its stdout or stderr. Must be called from within a tokio
    /// runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the pipe cannot be created or registered.
    pub fn new(severity: Severity) -> io::Result<Self> {
        let (reader, writer) = io::pipe()?;
        let reader = pipe::Receiver::from_owned_fd(OwnedFd::from(reader))?;
        Ok(Self {
            reader,
            writer,
            line: LineBuffer::new(),
            severity,
        })
    }

    /// Write end to hand to a child.
    #[must_use]
    pub fn writer(&self) -> &PipeWriter {
        &self.writer
    }

    /// Wait until the pipe may have data. Cancel safe.
    ///
    /// # Errors
    ///
    /// Returns an error if polling the pipe fails.
    pub async fn readable(&self) -> io::Result<()> {
        self.reader.readable().await
    }

    /// Read once and log every complete line.
    pub fn drain<L: LogSink + ?Sized>(&mut self, sink: &L) {
        self.line.fill(&mut self.reader, sink);
        self.line.flush(self.severity, sink);
    }

    /// Read whatever is immediately available, then log the partial line.
    pub fn finish<L: LogSink + ?Sized>(&mut self, sink: &L) {
        for _ in 0..FINAL_DRAIN_READS {
            let read = self.line.fill(&mut self.reader, sink);
            self.line.flush(self.severity, sink);
            if read == 0 {
                break;
            }
        }
        self.line.finish(self.severity, sink);
    }
}
