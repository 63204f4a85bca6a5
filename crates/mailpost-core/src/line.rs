//! Buffered line framing for protocol connections.
//!
//! Both servers speak line-oriented protocols. [`LineReader`] wraps a byte
//! stream with a bounded cache and hands out one LF-terminated line at a
//! time, no matter how the peer's bytes were split into TCP segments.
//! Content is never interpreted here; this is strictly byte framing.

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::Result;

/// Default cache size, which is also the longest line handed out at once.
pub const DEFAULT_LINE_CAPACITY: usize = 1024;

/// A single line read from a connection.
///
/// The bytes include the terminating LF (and CR, if the peer sent one). A
/// line without a trailing LF was cut short, either because it did not fit
/// in the reader's cache or because the peer closed the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line(Bytes);

impl Line {
    /// Wraps raw line bytes.
    #[must_use]
    pub const fn new(bytes: Bytes) -> Self {
        Self(bytes)
    }

    /// Returns the raw bytes, terminator included.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consumes the line and returns the raw bytes.
    #[must_use]
    pub fn into_bytes(self) -> Bytes {
        self.0
    }

    /// Number of raw bytes, terminator included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the line holds no bytes at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns true if the line ends with LF.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.0.last() == Some(&b'\n')
    }

    /// Returns true if the line was cut short before its LF.
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        !self.is_complete()
    }

    /// Returns the bytes without the trailing CR LF or LF.
    #[must_use]
    pub fn content(&self) -> &[u8] {
        let bytes = self.0.as_ref();
        let bytes = bytes.strip_suffix(b"\n").unwrap_or(bytes);
        bytes.strip_suffix(b"\r").unwrap_or(bytes)
    }

    /// Returns the line content as text, replacing invalid UTF-8.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(self.content()).into_owned()
    }
}

/// Line reader over an async byte stream.
///
/// Bytes received past the end of a line stay cached for the next call, so
/// several pipelined lines arriving in one segment are returned one by one.
pub struct LineReader<S> {
    stream: S,
    cache: BytesMut,
    capacity: usize,
}

impl<S> LineReader<S>
where
    S: AsyncRead + Unpin,
{
    /// Creates a reader with [`DEFAULT_LINE_CAPACITY`].
    pub fn new(stream: S) -> Self {
        Self::with_capacity(stream, DEFAULT_LINE_CAPACITY)
    }

    /// Creates a reader caching at most `capacity` bytes.
    ///
    /// `capacity` is also the maximum number of bytes a single call to
    /// [`read_line`](Self::read_line) returns. Zero is raised to one.
    pub fn with_capacity(stream: S, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            stream,
            cache: BytesMut::with_capacity(capacity),
            capacity,
        }
    }

    /// Returns the configured capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Reads the next line.
    ///
    /// Returns `Ok(None)` once the peer has closed the connection and no
    /// cached bytes remain. Unterminated bytes left at end of stream, or a
    /// full cache without any LF, come back as a truncated [`Line`].
    ///
    /// # Errors
    ///
    /// Returns an error as soon as the underlying stream fails.
    pub async fn read_line(&mut self) -> Result<Option<Line>> {
        let mut scanned = 0;

        loop {
            if let Some(pos) = self.cache[scanned..].iter().position(|&b| b == b'\n') {
                let line = self.cache.split_to(scanned + pos + 1);
                return Ok(Some(Line::new(line.freeze())));
            }
            scanned = self.cache.len();

            if self.cache.len() >= self.capacity {
                let line = self.cache.split_to(self.capacity);
                return Ok(Some(Line::new(line.freeze())));
            }

            let room = (self.capacity - self.cache.len()) as u64;
            let read = (&mut self.stream)
                .take(room)
                .read_buf(&mut self.cache)
                .await?;

            if read == 0 {
                if self.cache.is_empty() {
                    return Ok(None);
                }
                let line = self.cache.split();
                return Ok(Some(Line::new(line.freeze())));
            }
        }
    }

    /// Skips the remainder of a truncated line, up to and including its LF.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying stream fails.
    pub async fn discard_line(&mut self) -> Result<()> {
        while let Some(line) = self.read_line().await? {
            if line.is_complete() {
                break;
            }
        }
        Ok(())
    }

    /// Gets a reference to the underlying stream.
    pub const fn get_ref(&self) -> &S {
        &self.stream
    }

    /// Gets a mutable reference to the underlying stream.
    pub const fn get_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    /// Consumes the reader and returns the inner stream.
    ///
    /// Note: Any cached data will be lost.
    pub fn into_inner(self) -> S {
        self.stream
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use std::io;

    use proptest::prelude::*;
    use tokio_test::io::Builder;

    use super::*;

    #[test]
    fn test_line_content() {
        let line = Line::new(Bytes::from_static(b"USER alice\r\n"));
        assert_eq!(line.content(), b"USER alice");
        assert_eq!(line.text(), "USER alice");
        assert!(line.is_complete());

        let line = Line::new(Bytes::from_static(b"bare\n"));
        assert_eq!(line.content(), b"bare");

        let line = Line::new(Bytes::from_static(b"cut"));
        assert!(line.is_truncated());
        assert_eq!(line.content(), b"cut");
    }

    #[tokio::test]
    async fn test_read_simple_line() {
        let mock = Builder::new().read(b"NOOP\r\n").build();
        let mut reader = LineReader::new(mock);

        let line = reader.read_line().await.unwrap().unwrap();
        assert_eq!(line.as_bytes(), b"NOOP\r\n");
        assert!(reader.read_line().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_line_split_across_segments() {
        let mock = Builder::new()
            .read(b"RCPT TO:")
            .read(b"<bob@exa")
            .read(b"mple.com>\r\n")
            .build();
        let mut reader = LineReader::new(mock);

        let line = reader.read_line().await.unwrap().unwrap();
        assert_eq!(line.as_bytes(), b"RCPT TO:<bob@example.com>\r\n");
    }

    #[tokio::test]
    async fn test_pipelined_lines_in_one_segment() {
        let mock = Builder::new().read(b"STAT\r\nLIST\r\nQUI").read(b"T\r\n").build();
        let mut reader = LineReader::new(mock);

        assert_eq!(reader.read_line().await.unwrap().unwrap().as_bytes(), b"STAT\r\n");
        assert_eq!(reader.read_line().await.unwrap().unwrap().as_bytes(), b"LIST\r\n");
        assert_eq!(reader.read_line().await.unwrap().unwrap().as_bytes(), b"QUIT\r\n");
        assert!(reader.read_line().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_oversized_line_is_truncated() {
        let mock = Builder::new().read(b"0123456789abc\r\n").build();
        let mut reader = LineReader::with_capacity(mock, 8);

        let first = reader.read_line().await.unwrap().unwrap();
        assert_eq!(first.as_bytes(), b"01234567");
        assert!(first.is_truncated());

        let second = reader.read_line().await.unwrap().unwrap();
        assert_eq!(second.as_bytes(), b"89abc\r\n");
        assert!(second.is_complete());
    }

    #[tokio::test]
    async fn test_discard_line_resynchronizes() {
        let mock = Builder::new()
            .read(b"0123456789")
            .read(b"0123456789\r\nNOOP\r\n")
            .build();
        let mut reader = LineReader::with_capacity(mock, 8);

        assert!(reader.read_line().await.unwrap().unwrap().is_truncated());
        reader.discard_line().await.unwrap();
        assert_eq!(reader.read_line().await.unwrap().unwrap().as_bytes(), b"NOOP\r\n");
    }

    #[tokio::test]
    async fn test_unterminated_tail_at_end_of_stream() {
        let mock = Builder::new().read(b"QUIT\r\npartial").build();
        let mut reader = LineReader::new(mock);

        assert_eq!(reader.read_line().await.unwrap().unwrap().as_bytes(), b"QUIT\r\n");
        let tail = reader.read_line().await.unwrap().unwrap();
        assert_eq!(tail.as_bytes(), b"partial");
        assert!(tail.is_truncated());
        assert!(reader.read_line().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_stream_is_closed() {
        let mock = Builder::new().build();
        let mut reader = LineReader::new(mock);
        assert!(reader.read_line().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_io_error_is_propagated() {
        let mock = Builder::new()
            .read(b"HELO")
            .read_error(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
            .build();
        let mut reader = LineReader::new(mock);

        let err = reader.read_line().await.unwrap_err();
        assert!(matches!(err, crate::Error::Io(ref e) if e.kind() == io::ErrorKind::ConnectionReset));
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let reader = LineReader::with_capacity(Builder::new().build(), 0);
        assert_eq!(reader.capacity(), 1);
    }

    fn read_all(input: &[u8], chunk: usize, capacity: usize) -> Vec<Line> {
        let mut builder = Builder::new();
        for piece in input.chunks(chunk) {
            builder.read(piece);
        }
        let mock = builder.build();

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async move {
            let mut reader = LineReader::with_capacity(mock, capacity);
            let mut lines = Vec::new();
            while let Some(line) = reader.read_line().await.unwrap() {
                lines.push(line);
            }
            lines
        })
    }

    proptest! {
        #[test]
        fn framing_preserves_bytes_and_bounds_lines(
            input in proptest::collection::vec(
                prop_oneof![Just(b'\n'), Just(b'\r'), any::<u8>()],
                0..300,
            ),
            chunk in 1usize..40,
            capacity in 1usize..64,
        ) {
            let lines = read_all(&input, chunk, capacity);

            let joined: Vec<u8> = lines.iter().flat_map(|l| l.as_bytes().to_vec()).collect();
            prop_assert_eq!(&joined, &input);

            for (i, line) in lines.iter().enumerate() {
                prop_assert!(!line.is_empty());
                prop_assert!(line.len() <= capacity);
                let last = i + 1 == lines.len();
                let newlines = line.as_bytes().iter().filter(|&&b| b == b'\n').count();
                prop_assert!(newlines <= 1);
                if !last {
                    prop_assert!(line.is_complete() || line.len() == capacity);
                }
            }
        }
    }
}
