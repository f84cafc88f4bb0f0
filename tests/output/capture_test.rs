//! Line splitting over real pipes.

use std::cell::RefCell;
use std::io::Write;

use kitd::output::{CapturePipe, LineBuffer, LogSink, Severity, TryRead, LINE_CAPACITY};

#[derive(Default)]
struct Collect(RefCell<Vec<(Severity, String)>>);

impl LogSink for Collect {
    fn log(&self, severity: Severity, message: &str) {
        self.0.borrow_mut().push((severity, message.to_string()));
    }
}

impl Collect {
    fn messages(&self) -> Vec<String> {
        self.0.borrow().iter().map(|(_, m)| m.clone()).collect()
    }
}

/// Reader that hands out `data` in fixed-size chunks.
struct Chunked<'a> {
    data: &'a [u8],
    chunk: usize,
}

impl TryRead for Chunked<'_> {
    fn try_read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.data.is_empty() {
            return Err(std::io::ErrorKind::WouldBlock.into());
        }
        let n = self.chunk.min(buf.len()).min(self.data.len());
        buf[..n].copy_from_slice(&self.data[..n]);
        self.data = &self.data[n..];
        Ok(n)
    }
}

fn split(data: &[u8], chunk: usize) -> Vec<String> {
    let sink = Collect::default();
    let mut source = Chunked { data, chunk };
    let mut line = LineBuffer::new();
    while line.fill(&mut source, &sink) > 0 {
        line.flush(Severity::Info, &sink);
    }
    line.flush(Severity::Info, &sink);
    line.finish(Severity::Info, &sink);
    sink.messages()
}

#[test]
fn test_lines_never_contain_newlines_and_preserve_content() {
    let data = b"alpha\nbeta\n\ngamma delta\nunterminated";
    for chunk in [1, 3, 7, 64] {
        let lines = split(data, chunk);
        assert!(lines.iter().all(|l| !l.contains('\n')), "chunk {chunk}");
        assert_eq!(lines.join("\n").as_bytes(), data, "chunk {chunk}");
    }
}

#[test]
fn test_long_line_is_forced_out_in_full_buffers() {
    let data = vec![b'x'; 3000];
    let lines = split(&data, 500);

    assert_eq!(
        lines.iter().map(String::len).collect::<Vec<_>>(),
        vec![LINE_CAPACITY - 1, LINE_CAPACITY - 1, 3000 - 2 * (LINE_CAPACITY - 1)]
    );
    assert_eq!(lines.concat().len(), 3000);
}

#[tokio::test]
async fn test_pipe_lines_split_across_writes() {
    let sink = Collect::default();
    let mut pipe = CapturePipe::new(Severity::Notice).unwrap();

    let mut writer = pipe.writer();
    writer.write_all(b"first half, ").unwrap();
    pipe.readable().await.unwrap();
    pipe.drain(&sink);
    assert!(sink.messages().is_empty());

    let mut writer = pipe.writer();
    writer.write_all(b"second half\nnext").unwrap();
    pipe.readable().await.unwrap();
    pipe.drain(&sink);
    assert_eq!(sink.messages(), vec!["first half, second half"]);

    pipe.finish(&sink);
    assert_eq!(sink.messages(), vec!["first half, second half", "next"]);
    assert!(sink.0.borrow().iter().all(|(s, _)| *s == Severity::Notice));
}

#[tokio::test]
async fn test_invalid_utf8_is_logged_lossily() {
    let sink = Collect::default();
    let mut pipe = CapturePipe::new(Severity::Info).unwrap();

    let mut writer = pipe.writer();
    writer.write_all(b"caf\xe9\n").unwrap();
    pipe.readable().await.unwrap();
    pipe.drain(&sink);

    assert_eq!(sink.messages(), vec!["caf\u{fffd}"]);
}
