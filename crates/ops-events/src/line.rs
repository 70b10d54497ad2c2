use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::LineError;

const CHUNK_SIZE_BYTES: usize = 8192;

/// One framed line, or notice that a line was discarded for exceeding the bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    Text { line_number: usize, bytes: Vec<u8> },
    TooLong { line_number: usize, observed_bytes: usize },
}

/// Reads newline-delimited input in bounded memory, one chunk at a time.
///
/// Lines longer than `max_line_bytes` are discarded (not buffered) and
/// reported as [`Line::TooLong`] so a pathological peer can't grow memory
/// without bound. Used by the stdio transport and by the local log reader.
pub struct BoundedLineReader<R> {
    reader: R,
    max_line_bytes: usize,
    buffer: Box<[u8; CHUNK_SIZE_BYTES]>,
    buffer_pos: usize,
    buffer_len: usize,
    current_line: Vec<u8>,
    observed_bytes: usize,
    discard_mode: bool,
    line_number: usize,
    done: bool,
}

impl<R: AsyncRead + Unpin> BoundedLineReader<R> {
    pub fn new(reader: R, max_line_bytes: usize) -> Self {
        Self {
            reader,
            max_line_bytes,
            buffer: Box::new([0u8; CHUNK_SIZE_BYTES]),
            buffer_pos: 0,
            buffer_len: 0,
            current_line: Vec::new(),
            observed_bytes: 0,
            discard_mode: false,
            line_number: 0,
            done: false,
        }
    }

    /// Reads the next line, or `None` at clean end-of-stream.
    pub async fn next_line(&mut self) -> Result<Option<Line>, LineError> {
        if self.done {
            return Ok(None);
        }
        loop {
            if self.buffer_pos >= self.buffer_len {
                let n = self
                    .reader
                    .read(&mut self.buffer[..])
                    .await
                    .map_err(|source| LineError::Io {
                        line_number: self.line_number + 1,
                        source,
                    })?;
                if n == 0 {
                    self.done = true;
                    if self.current_line.is_empty() && !self.discard_mode {
                        return Ok(None);
                    }
                    return Ok(Some(self.finish_line()));
                }
                self.buffer_pos = 0;
                self.buffer_len = n;
            }

            let chunk = &self.buffer[self.buffer_pos..self.buffer_len];
            if let Some(newline_at) = chunk.iter().position(|&b| b == b'\n') {
                self.consume(&chunk[..newline_at]);
                self.buffer_pos += newline_at + 1;
                return Ok(Some(self.finish_line()));
            }
            let whole = chunk.to_vec();
            self.buffer_pos = self.buffer_len;
            self.consume(&whole);
        }
    }

    fn consume(&mut self, bytes: &[u8]) {
        self.observed_bytes += bytes.len();
        if self.discard_mode {
            return;
        }
        if self.current_line.len() + bytes.len() > self.max_line_bytes {
            self.discard_mode = true;
            self.current_line.clear();
            return;
        }
        self.current_line.extend_from_slice(bytes);
    }

    fn finish_line(&mut self) -> Line {
        let line_number = self.line_number + 1;
        self.line_number = line_number;
        let observed_bytes = self.observed_bytes;
        let discard_mode = self.discard_mode;
        let bytes = std::mem::take(&mut self.current_line);
        self.observed_bytes = 0;
        self.discard_mode = false;
        if discard_mode {
            Line::TooLong { line_number, observed_bytes }
        } else {
            Line::Text { line_number, bytes }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn splits_on_newlines() {
        let data = Cursor::new(b"first\nsecond\nthird".to_vec());
        let mut reader = BoundedLineReader::new(data, 1024);
        let mut lines = Vec::new();
        while let Some(line) = reader.next_line().await.unwrap() {
            lines.push(line);
        }
        assert_eq!(
            lines,
            vec![
                Line::Text { line_number: 1, bytes: b"first".to_vec() },
                Line::Text { line_number: 2, bytes: b"second".to_vec() },
                Line::Text { line_number: 3, bytes: b"third".to_vec() },
            ]
        );
    }

    #[tokio::test]
    async fn ignores_empty_trailing_line() {
        let data = Cursor::new(b"only\n".to_vec());
        let mut reader = BoundedLineReader::new(data, 1024);
        assert_eq!(
            reader.next_line().await.unwrap(),
            Some(Line::Text { line_number: 1, bytes: b"only".to_vec() })
        );
        assert_eq!(reader.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn flags_overlong_lines_without_buffering_them() {
        let long_line = vec![b'x'; 100];
        let mut data = long_line.clone();
        data.push(b'\n');
        data.extend_from_slice(b"ok\n");
        let mut reader = BoundedLineReader::new(Cursor::new(data), 10);
        assert_eq!(
            reader.next_line().await.unwrap(),
            Some(Line::TooLong { line_number: 1, observed_bytes: 100 })
        );
        assert_eq!(
            reader.next_line().await.unwrap(),
            Some(Line::Text { line_number: 2, bytes: b"ok".to_vec() })
        );
    }
}
