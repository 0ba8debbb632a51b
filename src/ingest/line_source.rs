//! line_source.rs
//!
//! Reads newline-delimited text and yields one `String` per line.
//!
//! Responsibilities:
//! - Strip the `\n` delimiter (and a `\r` right before it)
//! - Yield a final unterminated line
//! - Refuse lines longer than the configured limit
//! - Stop for good after the first error
//!
//! Invalid UTF-8 is replaced with U+FFFD instead of failing the stream.

use std::io;

use async_stream::stream;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Stdin};
use tokio_stream::Stream;
use thiserror::Error;

/// Longest line accepted by default (64 KiB).
pub const DEFAULT_MAX_LINE_BYTES: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("error reading input")]
    Read(#[from] io::Error),

    #[error("input line exceeds {limit} bytes")]
    LineTooLong { limit: usize },
}

pub struct LineSource<R> {
    reader: R,
    max_line_bytes: usize,
    finished: bool,
}

impl LineSource<BufReader<Stdin>> {
    /// Lines from the process's standard input.
    pub fn stdin(max_line_bytes: usize) -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), max_line_bytes)
    }
}

impl<R: AsyncBufRead + Unpin> LineSource<R> {
    pub fn new(reader: R, max_line_bytes: usize) -> Self {
        Self {
            reader,
            max_line_bytes,
            finished: false,
        }
    }

    /// Next line, `Ok(None)` at end of input.
    ///
    /// After an error the source is exhausted and keeps returning `Ok(None)`.
    pub async fn next_line(&mut self) -> Result<Option<String>, SourceError> {
        if self.finished {
            return Ok(None);
        }
        match self.read_line().await {
            Ok(Some(line)) => Ok(Some(line)),
            other => {
                self.finished = true;
                other
            }
        }
    }

    async fn read_line(&mut self) -> Result<Option<String>, SourceError> {
        let mut buf: Vec<u8> = Vec::new();
        let mut saw_any = false;

        loop {
            let (used, found_newline) = {
                let available = self.reader.fill_buf().await?;
                if available.is_empty() {
                    break;
                }
                saw_any = true;
                match available.iter().position(|b| *b == b'\n') {
                    Some(i) => {
                        buf.extend_from_slice(&available[..i]);
                        (i + 1, true)
                    }
                    None => {
                        buf.extend_from_slice(available);
                        (available.len(), false)
                    }
                }
            };
            self.reader.consume(used);

            // One extra byte for a `\r` that may still be stripped.
            if buf.len() > self.max_line_bytes + 1 {
                return Err(SourceError::LineTooLong {
                    limit: self.max_line_bytes,
                });
            }
            if found_newline {
                break;
            }
        }

        if !saw_any {
            return Ok(None);
        }
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
        if buf.len() > self.max_line_bytes {
            return Err(SourceError::LineTooLong {
                limit: self.max_line_bytes,
            });
        }
        Ok(Some(into_text(buf)))
    }

    /// The same sequence as a stream. Ends after the first error.
    pub fn into_stream(mut self) -> impl Stream<Item = Result<String, SourceError>> {
        stream! {
            loop {
                match self.next_line().await {
                    Ok(Some(line)) => yield Ok(line),
                    Ok(None) => break,
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                }
            }
        }
    }
}

fn into_text(buf: Vec<u8>) -> String {
    match String::from_utf8(buf) {
        Ok(s) => s,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::{AsyncRead, ReadBuf};
    use tokio_stream::StreamExt;

    fn source(input: &'static [u8], max: usize) -> LineSource<&'static [u8]> {
        LineSource::new(input, max)
    }

    async fn collect(mut src: LineSource<&'static [u8]>) -> Vec<String> {
        let mut out = Vec::new();
        while let Some(line) = src.next_line().await.unwrap() {
            out.push(line);
        }
        out
    }

    #[rstest]
    #[case(b"", &[])]
    #[case(b"a\nb\nc\n", &["a", "b", "c"])]
    #[case(b"a\nb", &["a", "b"])]
    #[case(b"win\r\nline\r\n", &["win", "line"])]
    #[case(b"\n\n", &["", ""])]
    #[case(b"  spaced \t\n", &["  spaced \t"])]
    #[tokio::test]
    async fn splits_lines(#[case] input: &'static [u8], #[case] expected: &[&str]) {
        assert_eq!(collect(source(input, 64)).await, expected);
    }

    #[tokio::test]
    async fn invalid_utf8_is_replaced() {
        let lines = collect(source(b"ok\xff\n", 64)).await;
        assert_eq!(lines, vec!["ok\u{FFFD}"]);
    }

    #[tokio::test]
    async fn line_at_limit_is_accepted() {
        let lines = collect(source(b"abcd\nabcd\r\n", 4)).await;
        assert_eq!(lines, vec!["abcd", "abcd"]);
    }

    #[tokio::test]
    async fn long_line_fails_closed() {
        let mut src = source(b"ok\ntoolong\nafter\n", 4);
        assert_eq!(src.next_line().await.unwrap().as_deref(), Some("ok"));
        let err = src.next_line().await.unwrap_err();
        assert!(matches!(err, SourceError::LineTooLong { limit: 4 }));
        assert!(src.next_line().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn long_line_spanning_reads_is_detected() {
        let reader = BufReader::with_capacity(2, &b"abcdefgh\n"[..]);
        let mut src = LineSource::new(reader, 3);
        assert!(matches!(
            src.next_line().await,
            Err(SourceError::LineTooLong { limit: 3 })
        ));
    }

    /// Yields some bytes, then fails.
    struct Broken {
        sent: bool,
    }

    impl AsyncRead for Broken {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            if self.sent {
                return Poll::Ready(Err(io::Error::other("disk on fire")));
            }
            self.sent = true;
            buf.put_slice(b"first\nsecond\n");
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn stream_yields_lines_then_read_error() {
        let src = LineSource::new(BufReader::new(Broken { sent: false }), 64);
        let items: Vec<_> = src.into_stream().collect().await;

        assert_eq!(items.len(), 3);
        assert_eq!(items[0].as_deref().unwrap(), "first");
        assert_eq!(items[1].as_deref().unwrap(), "second");
        assert!(matches!(items[2], Err(SourceError::Read(_))));
    }
}
